//! Host session: one embed instance. Couples the handshake core with its bus
//! subscription, deadline timer and presentation channel. Both event sources are
//! polled from the same task, so handlers never race.

use std::time::Duration;

use embed_core::{EmbedState, HandshakeCore, HostAction, MessageError, Nonce, Presentation};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::bus::{MessageBus, Posted, Subscription};
use crate::deadline::Deadline;

/// Default time the peer gets to report ready.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(5000);

/// Settings a session is created with.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct SessionSettings {
    pub timeout: Duration,
    pub core: embed_core::Config,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            core: embed_core::Config::default(),
        }
    }
}

/// Outcome of one handled event.
#[derive(Debug)]
pub enum SessionEvent {
    /// Presentation changed.
    Rendered(Presentation),
    /// Valid message with nothing new to show (duplicate, or after a timeout).
    Unchanged,
    /// Payload dropped by validation.
    Rejected(MessageError),
}

pub struct HostSession {
    source: String,
    core: HandshakeCore,
    subscription: Subscription,
    deadline: Deadline,
    presentation: watch::Sender<Presentation>,
}

impl HostSession {
    /// Create a session for `source`: fresh nonce, listening and deadline both
    /// start immediately.
    pub fn start(bus: &MessageBus, source: &str, settings: SessionSettings) -> Self {
        let core = HandshakeCore::with_config(source, settings.core);
        let subscription = bus.subscribe();
        let deadline = Deadline::start(settings.timeout);
        let (presentation, _) = watch::channel(core.presentation());
        info!(
            target: "embed.session",
            source,
            timeout_ms = u64::try_from(settings.timeout.as_millis()).unwrap_or(u64::MAX),
            "session started"
        );
        Self {
            source: source.to_string(),
            core,
            subscription,
            deadline,
            presentation,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn nonce(&self) -> &Nonce {
        self.core.nonce()
    }

    /// Location the frame loads; carries the nonce for the peer to echo back.
    pub fn target_location(&self) -> &str {
        self.core.target_location()
    }

    pub fn state(&self) -> EmbedState {
        self.core.state()
    }

    pub fn presentation(&self) -> Presentation {
        self.core.presentation()
    }

    /// Observe presentation changes (rendering layer side).
    pub fn watch(&self) -> watch::Receiver<Presentation> {
        self.presentation.subscribe()
    }

    pub fn deadline_pending(&self) -> bool {
        self.deadline.is_pending()
    }

    pub fn is_listening(&self) -> bool {
        self.subscription.is_active()
    }

    /// Wait for the next inbound payload or the deadline and handle it.
    /// `None` once the session was torn down.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        if !self.subscription.is_active() {
            return None;
        }
        // Queued payloads are drained before the deadline is looked at; each is
        // ordered against the deadline by when it was posted, not when it is polled.
        tokio::select! {
            biased;
            posted = self.subscription.recv() => match posted {
                Some(posted) => Some(self.handle_posted(posted)),
                None => None,
            },
            () = self.deadline.elapsed() => {
                let actions = self.core.on_deadline_elapsed();
                Some(self.apply(actions))
            }
        }
    }

    /// Drive the session until it leaves `Loading` (or is torn down).
    pub async fn settle(&mut self) -> EmbedState {
        while !self.core.state().is_terminal() {
            if self.next_event().await.is_none() {
                break;
            }
        }
        self.core.state()
    }

    fn handle_posted(&mut self, posted: Posted) -> SessionEvent {
        let expired = self
            .deadline
            .expires_at()
            .is_some_and(|expiry| posted.at >= expiry);
        if !expired {
            return self.handle_payload(&posted.payload);
        }
        // Posted after expiry: the deadline fired first.
        self.deadline.cancel();
        let actions = self.core.on_deadline_elapsed();
        let event = self.apply(actions);
        self.handle_payload(&posted.payload);
        event
    }

    fn handle_payload(&mut self, payload: &str) -> SessionEvent {
        match self.core.on_message_received(payload) {
            Ok(actions) => {
                if self.core.state() == EmbedState::TimedOut {
                    debug!(target: "embed.session", source = %self.source, "ignoring message after timeout");
                }
                self.apply(actions)
            }
            Err(err) => {
                if err.is_suspicious() {
                    warn!(target: "embed.session", source = %self.source, error = %err, "dropping message");
                } else {
                    debug!(target: "embed.session", source = %self.source, error = %err, "dropping message");
                }
                SessionEvent::Rejected(err)
            }
        }
    }

    fn apply(&mut self, actions: Vec<HostAction>) -> SessionEvent {
        let mut event = SessionEvent::Unchanged;
        for action in actions {
            match action {
                HostAction::CancelDeadline => {
                    self.deadline.cancel();
                }
                HostAction::Render(presentation) => {
                    let previous = self.presentation.send_replace(presentation);
                    if previous.state != presentation.state {
                        info!(
                            target: "embed.session",
                            source = %self.source,
                            state = ?presentation.state,
                            height = presentation.height,
                            "state changed"
                        );
                    } else {
                        debug!(
                            target: "embed.session",
                            source = %self.source,
                            height = presentation.height,
                            "height changed"
                        );
                    }
                    event = SessionEvent::Rendered(presentation);
                }
            }
        }
        event
    }

    /// Detach from the bus and cancel the deadline. Safe to call any number of
    /// times; returns false when there was nothing left to release.
    pub fn teardown(&mut self) -> bool {
        let detached = self.subscription.unsubscribe();
        let cancelled = self.deadline.cancel();
        if detached {
            debug!(target: "embed.session", source = %self.source, "session torn down");
        }
        detached || cancelled
    }
}

impl Drop for HostSession {
    fn drop(&mut self) {
        self.teardown();
    }
}
