//! Protocol module containing the cross-frame message types and the JSON codec.

pub mod codec;
pub mod messages;

pub use codec::{decode_inbound, encode_outbound, InboundPayload, ProtocolError};
pub use messages::*;
