//! Embed handshake wire protocol: message shape, discriminator tag and actions.

use serde::{Deserialize, Serialize};

/// Fixed discriminator carried in `source`. Messages with any other tag belong to
/// unrelated page traffic and are ignored.
pub const SOURCE_TAG: &str = "custom_embed";

/// Query parameter that carries the session nonce in the target location.
pub const NONCE_PARAM: &str = "k";

/// Recognized message actions.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    /// Peer finished initializing. Moves a loading session to ready.
    Ready,
    /// Height-only update. Never changes the session state.
    Resize,
}

impl Action {
    /// Wire name of the action.
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::Ready => "ready",
            Action::Resize => "resize",
        }
    }

    /// Look up an action by its wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "ready" => Some(Action::Ready),
            "resize" => Some(Action::Resize),
            _ => None,
        }
    }
}

/// Optional payload of a message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
}

/// A message as the embedded peer sends it (peer -> host).
/// The host never trusts this shape directly; inbound text goes through
/// [`crate::wire::decode_message`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbedMessage {
    pub key: String,
    pub source: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<MessageData>,
}

impl EmbedMessage {
    /// Ready notification keyed with `nonce`, optionally reporting content height.
    pub fn ready(nonce: &str, height: Option<u32>) -> Self {
        Self::with_action(nonce, Action::Ready, height)
    }

    /// Height-only update keyed with `nonce`.
    pub fn resize(nonce: &str, height: u32) -> Self {
        Self::with_action(nonce, Action::Resize, Some(height))
    }

    fn with_action(nonce: &str, action: Action, height: Option<u32>) -> Self {
        Self {
            key: nonce.to_string(),
            source: SOURCE_TAG.to_string(),
            action,
            data: height.map(|h| MessageData { height: Some(h) }),
        }
    }
}

/// Message that passed every validation step. Only this may influence a session.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct ValidMessage {
    pub action: Action,
    /// Reported content height, already normalized to a non-negative integer.
    pub height: Option<u32>,
}
