//! Message layer: the JSON wire envelope and the typed outbound requests.
//!
//! Every frame on the wire is a text envelope `{"name": ..., "data": {...}}`.
//! Inbound envelopes become `(EventName, payload)` pairs via the
//! [`receiver::MessageReceiver`]; outbound requests are the
//! [`OutboundMessage`] variants, serialized into the same shape by the
//! [`sender::MessageSender`]. The protocol's binary grammar is out of scope
//! here; this layer stays envelope-thin.

use serde::{Deserialize, Serialize};

use crate::core::events::EventPayload;

pub mod receiver;
pub mod sender;

/// One decoded wire frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireEnvelope {
    /// camelCase event name.
    pub name: String,
    /// Event payload; absent data decodes to `Null`.
    #[serde(default)]
    pub data: EventPayload,
}

/// Structured floor-control requests a client can issue.
///
/// Identifier widths follow the floor-control protocol: 32-bit conference
/// identifiers, 16-bit user and floor identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", content = "data", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum OutboundMessage {
    /// Announce the client for a conference/user pair.
    Hello { conference_id: u32, user_id: u16 },
    /// Request a floor.
    FloorRequest {
        conference_id: u32,
        user_id: u16,
        floor_id: u16,
    },
    /// Release a held or requested floor.
    FloorRelease {
        conference_id: u32,
        user_id: u16,
        floor_id: u16,
    },
    /// Query the status of a floor.
    FloorQuery {
        conference_id: u32,
        user_id: u16,
        floor_id: u16,
    },
}
