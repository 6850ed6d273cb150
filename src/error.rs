//! Session error types

use thiserror::Error;

/// Errors on the session send/transport path.
///
/// None of these are fatal: a failed send is skipped and a transport failure
/// only marks the session closed.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Send attempted while the WebSocket is not open
    #[error("channel not open")]
    ChannelUnavailable,

    /// The WebSocket failed or was closed underneath us
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The session task has ended
    #[error("session closed")]
    Closed,
}
