//! Host-driven API: HandshakeCore receives events from the host, returns actions.

use crate::nonce::{self, Nonce};
use crate::protocol::{Action, ValidMessage};
use crate::wire::{self, MessageError};

/// Height used until the peer reports one.
pub const DEFAULT_HEIGHT: u32 = 400;

/// Smallest height ever handed to the presentation layer.
pub const DEFAULT_MIN_HEIGHT: u32 = 25;

/// Per-session presentation settings.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Config {
    pub default_height: u32,
    pub min_height: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_height: DEFAULT_HEIGHT,
            min_height: DEFAULT_MIN_HEIGHT,
        }
    }
}

/// Handshake state. `Ready` and `TimedOut` are terminal.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub enum EmbedState {
    Loading,
    Ready,
    TimedOut,
}

impl EmbedState {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, EmbedState::Loading)
    }
}

/// What the rendering layer shows: loading indicator, sized frame or error.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct Presentation {
    pub state: EmbedState,
    /// Display height in pixels, never below the configured minimum.
    pub height: u32,
}

/// Action for host to perform.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum HostAction {
    /// Cancel the pending deadline timer. Emitted at most once per session.
    CancelDeadline,
    /// Presentation changed; push it to the rendering layer.
    Render(Presentation),
}

/// One embed session's protocol state. The host owns the message subscription
/// and the deadline timer and reports their events here.
pub struct HandshakeCore {
    nonce: Nonce,
    target: String,
    state: EmbedState,
    height: u32,
    deadline_armed: bool,
    config: Config,
}

impl HandshakeCore {
    /// New session for `source` with a fresh nonce. The deadline counts as armed:
    /// the host starts its timer the moment the session exists.
    pub fn new(source: &str) -> Self {
        Self::with_config(source, Config::default())
    }

    pub fn with_config(source: &str, config: Config) -> Self {
        Self::with_nonce(source, Nonce::generate(), config)
    }

    pub fn with_nonce(source: &str, nonce: Nonce, config: Config) -> Self {
        let target = nonce::target_location(source, &nonce);
        Self {
            nonce,
            target,
            state: EmbedState::Loading,
            height: config.default_height,
            deadline_armed: true,
            config,
        }
    }

    pub fn nonce(&self) -> &Nonce {
        &self.nonce
    }

    /// Location the frame should load (source plus nonce parameter).
    pub fn target_location(&self) -> &str {
        &self.target
    }

    pub fn state(&self) -> EmbedState {
        self.state
    }

    /// Last height accepted from the peer (or the default), before clamping.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Height to apply to the frame.
    pub fn display_height(&self) -> u32 {
        self.height.max(self.config.min_height)
    }

    pub fn presentation(&self) -> Presentation {
        Presentation {
            state: self.state,
            height: self.display_height(),
        }
    }

    /// Whether the deadline can still fire.
    pub fn deadline_armed(&self) -> bool {
        self.deadline_armed
    }

    /// Process one raw inbound payload. Invalid payloads are returned as errors
    /// for diagnostics and never touch state. Valid payloads after a timeout are
    /// accepted but have no effect.
    pub fn on_message_received(&mut self, raw: &str) -> Result<Vec<HostAction>, MessageError> {
        let msg = wire::decode_message(raw, &self.nonce)?;
        Ok(self.apply_message(msg))
    }

    fn apply_message(&mut self, msg: ValidMessage) -> Vec<HostAction> {
        let mut actions = Vec::new();
        if self.state == EmbedState::TimedOut {
            return actions;
        }
        let before = self.presentation();

        if msg.action == Action::Ready && self.state == EmbedState::Loading {
            self.state = EmbedState::Ready;
            if self.deadline_armed {
                self.deadline_armed = false;
                actions.push(HostAction::CancelDeadline);
            }
        }
        if let Some(height) = msg.height {
            self.height = height;
        }

        let after = self.presentation();
        if after != before {
            actions.push(HostAction::Render(after));
        }
        actions
    }

    /// Deadline timer fired. Times the session out if nothing valid arrived yet;
    /// inert once the deadline was cancelled or already consumed.
    pub fn on_deadline_elapsed(&mut self) -> Vec<HostAction> {
        if !self.deadline_armed {
            return vec![];
        }
        self.deadline_armed = false;
        if self.state != EmbedState::Loading {
            return vec![];
        }
        self.state = EmbedState::TimedOut;
        vec![HostAction::Render(self.presentation())]
    }
}
