//! Embed handshake protocol reference implementation.
//! Host-driven: no I/O; host passes events and receives actions.

pub mod core;
pub mod nonce;
pub mod protocol;
pub mod wire;

pub use crate::core::{Config, EmbedState, HandshakeCore, HostAction, Presentation};
pub use nonce::{nonce_from_location, target_location, Nonce};
pub use protocol::{Action, EmbedMessage, MessageData, ValidMessage, NONCE_PARAM, SOURCE_TAG};
pub use wire::{decode_message, encode_message, MessageEncodeError, MessageError};
