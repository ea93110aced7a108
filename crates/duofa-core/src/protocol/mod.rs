//! Protocol module containing the frame codec and message types.

pub mod codec;
pub mod messages;

pub use codec::{
    decode_frame, decode_header, decode_header_len, decode_payload, encode_frame, FrameError,
};
pub use messages::*;
