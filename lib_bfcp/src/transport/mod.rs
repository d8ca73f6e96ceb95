//! Transport seam between the connection manager and a concrete socket.
//!
//! The contract is a compile-time trait rather than a runtime "does this look
//! like a socket" check: a transport reports readiness, hands over a one-shot
//! signal stream, produces clonable writer handles and can be shut down. The
//! WebSocket implementation lives in [`ws`]; unit tests drive the manager
//! through the channel-backed transport in `inmem`.

use tokio::sync::mpsc;

use crate::error::TransportError;

pub mod ws;

/// Signals a transport delivers to its connection manager, in production
/// order over a single channel.
#[derive(Debug, Clone)]
pub enum TransportSignal {
    /// The transport became usable; sent at most once, and never by
    /// transports that are already ready when attached.
    Ready,
    /// One inbound text frame.
    Data(String),
    /// The transport closed, locally or remotely.
    Closed,
    /// The transport failed, with the underlying detail.
    Errored(String),
}

/// Clonable handle that writes raw outbound frames.
pub trait TransportWriter: Send + Sync {
    /// Queues one text frame for the wire.
    fn write_text(&self, frame: String) -> Result<(), TransportError>;
}

/// Capability contract consumed by the connection manager.
pub trait Transport: Send + 'static {
    /// Whether the transport is usable right now. Ready transports are wired
    /// up synchronously at attach time; others announce via
    /// [`TransportSignal::Ready`].
    fn is_ready(&self) -> bool;

    /// Takes the signal stream. Yields `None` once already consumed, which
    /// the manager reports as an attachment failure.
    fn take_signals(&mut self) -> Option<mpsc::UnboundedReceiver<TransportSignal>>;

    /// A writer handle bound to this transport.
    fn writer(&self) -> Box<dyn TransportWriter>;

    /// Requests closure. Idempotent.
    fn shutdown(&self);
}
