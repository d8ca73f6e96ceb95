//! Error taxonomy for the client layer.
//!
//! Environmental failures (attachment, transport) are converted into `error`
//! events by the connection manager and never bubble out of a signal handler.
//! The one synchronous category is API misuse, reported straight back to the
//! caller from [`crate::BfcpClient::send`].

use thiserror::Error;

use crate::core::client::ConnectionState;

/// Failures reported by a transport or while constructing one.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid endpoint address: {0}")]
    Address(String),

    #[error("WebSocket handshake failed: {0}")]
    Handshake(String),

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Transport write failed: {0}")]
    Write(String),

    #[error("Transport is closed")]
    Closed,
}

/// Failures surfaced by the client facade.
#[derive(Debug, Error)]
pub enum ClientError {
    /// A transport could not be wired up. Caught by the connection manager
    /// and re-surfaced as an `error` event.
    #[error("Failed to attach transport: {0}")]
    Attachment(String),

    /// A failure reported by the transport itself, forwarded verbatim.
    #[error("Transport failure: {0}")]
    Transport(#[from] TransportError),

    /// `send` was called before the connection reached OPEN. This is a usage
    /// error and is the only category reported synchronously.
    #[error("Connection is {state:?}; no sender is bound yet")]
    NotOpen {
        /// Lifecycle state at the time of the call.
        state: ConnectionState,
    },

    /// An outbound message could not be encoded.
    #[error("Failed to encode outbound message: {0}")]
    Encode(#[from] serde_json::Error),
}
