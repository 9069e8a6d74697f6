//! Peer-sync backend seam.
//!
//! A connector builds one provider per room; the provider reports its
//! connection status through a `watch` channel and releases its network
//! resources on `destroy`.

use std::error::Error;
use std::fmt::{Display, Formatter};
use tokio::sync::watch;
use yrs::Doc;

/// Connection status reported by a provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerStatus {
    Connecting,
    Connected,
    Disconnected,
}

/// Peer-sync failures. These are logged and never fail a session open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The backend cannot run here (no runtime, no endpoint, timeout).
    Unavailable(String),
    /// The transport failed after it was set up.
    Transport(String),
    InvalidEndpoint(String),
}

impl Display for SyncError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable(reason) => write!(f, "peer sync unavailable: {reason}"),
            Self::Transport(reason) => write!(f, "peer sync transport error: {reason}"),
            Self::InvalidEndpoint(url) => write!(f, "invalid peer sync endpoint `{url}`"),
        }
    }
}

impl Error for SyncError {}

/// Live peer-sync connection for one room.
pub trait PeerSyncProvider: Send + Sync {
    /// Receiver for status changes; the current value is readable at once.
    fn status(&self) -> watch::Receiver<PeerStatus>;
    /// Closes sockets and stops background work. Idempotent.
    fn destroy(&mut self);
}

/// Factory for per-room providers.
pub trait PeerSyncConnector: Send + Sync {
    /// Starts syncing `doc` for `room`. Called inside a tokio runtime.
    fn connect(&self, room: &str, doc: &Doc) -> Result<Box<dyn PeerSyncProvider>, SyncError>;
}
