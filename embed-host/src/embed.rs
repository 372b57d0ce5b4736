//! Embed: owns the current session for one frame. A new source or timeout
//! always replaces the session (fresh nonce); the old one is torn down first.

use std::time::Duration;

use embed_core::Presentation;

use crate::bus::MessageBus;
use crate::session::{HostSession, SessionEvent, SessionSettings};

pub struct Embed {
    bus: MessageBus,
    settings: SessionSettings,
    session: Option<HostSession>,
}

impl Embed {
    pub fn new(bus: MessageBus, settings: SessionSettings) -> Self {
        Self {
            bus,
            settings,
            session: None,
        }
    }

    /// Show `source`. Re-mounting the source already shown keeps the running
    /// session; anything else starts a new one.
    pub fn mount(&mut self, source: &str) -> &HostSession {
        let keep = matches!(&self.session, Some(session) if session.source() == source);
        if !keep {
            self.unmount();
        }
        let (bus, settings) = (&self.bus, self.settings);
        self.session
            .get_or_insert_with(|| HostSession::start(bus, source, settings))
    }

    /// Change the timeout. A mounted embed restarts with the new deadline.
    pub fn set_timeout(&mut self, timeout: Duration) {
        if self.settings.timeout == timeout {
            return;
        }
        self.settings.timeout = timeout;
        if let Some(source) = self.session.as_ref().map(|s| s.source().to_string()) {
            self.restart(&source);
        }
    }

    /// Remove the embed from view. Returns false if nothing was mounted.
    pub fn unmount(&mut self) -> bool {
        match self.session.take() {
            Some(mut session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }

    pub fn session(&self) -> Option<&HostSession> {
        self.session.as_ref()
    }

    pub fn presentation(&self) -> Option<Presentation> {
        self.session.as_ref().map(HostSession::presentation)
    }

    /// Next event of the current session; `None` when nothing is mounted.
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        match self.session.as_mut() {
            Some(session) => session.next_event().await,
            None => None,
        }
    }

    fn restart(&mut self, source: &str) {
        // Old listener and timer are released before the new session subscribes.
        self.unmount();
        self.session = Some(HostSession::start(&self.bus, source, self.settings));
    }
}
