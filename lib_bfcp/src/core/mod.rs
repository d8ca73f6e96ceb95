//! Core connection and dispatch machinery.
//!
//! - **`client`**: the connection manager and public facade.
//! - **`dispatcher`**: generic plus identifier-scoped event delivery.
//! - **`registry`**: the identifier-keyed callback registry.
//! - **`events`**: the typed event model.

pub mod client;
pub mod dispatcher;
pub mod events;
pub mod registry;
