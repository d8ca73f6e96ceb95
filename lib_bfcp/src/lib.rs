//! # lib_bfcp
//!
//! Connection management and event dispatch for floor-control (BFCP) clients
//! speaking JSON envelopes over WebSocket.
//!
//! The crate sits between a bidirectional transport and an application that
//! issues floor-control requests and needs asynchronous notifications routed
//! back to the request that caused them:
//!
//! - [`BfcpClient`] owns the connection lifecycle (`attach`/`connect`,
//!   `close`, `send`) and announces `open`/`close`/`error` through the same
//!   dispatch path as protocol events.
//! - [`EventDispatcher`] re-emits every decoded event to generic subscribers
//!   and then routes it through the identifier-scoped [`CallbackRegistry`],
//!   so a caller can wait for `floorGranted` on floor 530 without seeing
//!   every other floor multiplexed over the connection.
//! - [`Transport`] is the seam to the socket; [`WsTransport`] implements it
//!   over `tokio-tungstenite`.
//!
//! Wire framing of the binary protocol, floor-control policy and reconnection
//! are deliberately out of scope.

// Declare the modules to re-export
pub mod config;
pub mod core;
pub mod error;
pub mod messages;
pub mod transport;

// Re-export the public surface
pub use config::ClientConfig;
pub use core::client::{BfcpClient, ConnectionState};
pub use core::dispatcher::EventDispatcher;
pub use core::events::{EventName, EventPayload};
pub use core::registry::{field_resolver, CallbackRegistry, EventCallback, IdentifierResolver};
pub use error::{ClientError, TransportError};
pub use messages::receiver::MessageReceiver;
pub use messages::sender::MessageSender;
pub use messages::{OutboundMessage, WireEnvelope};
pub use transport::ws::WsTransport;
pub use transport::{Transport, TransportSignal, TransportWriter};
