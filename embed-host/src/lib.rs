//! Embed handshake host runtime: drives `embed_core` sessions on tokio.
//! Owns the I/O side: page-wide message bus, deadline timer, presentation channel.

pub mod bus;
pub mod config;
pub mod deadline;
pub mod embed;
pub mod session;

pub use bus::{MessageBus, Subscription};
pub use embed::Embed;
pub use session::{HostSession, SessionEvent, SessionSettings};
