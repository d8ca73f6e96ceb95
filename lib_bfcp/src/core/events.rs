//! Event model shared by the dispatcher, the callback registry and the
//! message layer.
//!
//! The original floor-control clients keyed their callback maps with bare
//! strings; here every event is a variant of [`EventName`] so a typo in a
//! subscription is a compile error instead of a silent no-op. Events decoded
//! off the wire that this crate does not know about are preserved as
//! [`EventName::Custom`] rather than dropped.

use std::fmt;

/// Opaque structured value accompanying an event. Its shape belongs to the
/// protocol layer; this crate only ever reads correlation fields out of it.
pub type EventPayload = serde_json::Value;

/// A named protocol or lifecycle occurrence multiplexed over one connection.
///
/// Wire names are the camelCase strings the upstream emits. The three
/// lifecycle names (`open`, `close`, `error`) are produced by the connection
/// manager itself, never decoded from a frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EventName {
    /// Connection reached the OPEN state.
    Open,
    /// Connection was closed by either side.
    Close,
    /// Attachment or transport failure.
    Error,
    /// A floor was granted to a requester.
    FloorGranted,
    /// A floor request was denied.
    FloorDenied,
    /// A previously held floor was released.
    FloorReleased,
    /// Progress update for an outstanding floor request.
    FloorRequestStatus,
    /// Status report for a floor.
    FloorStatus,
    /// Conference-wide status notification.
    ConferenceStatus,
    /// Any event name this crate has no variant for.
    Custom(String),
}

impl EventName {
    /// Maps a wire name onto its variant, falling back to [`EventName::Custom`].
    pub fn from_wire(name: &str) -> Self {
        match name {
            "open" => Self::Open,
            "close" => Self::Close,
            "error" => Self::Error,
            "floorGranted" => Self::FloorGranted,
            "floorDenied" => Self::FloorDenied,
            "floorReleased" => Self::FloorReleased,
            "floorRequestStatus" => Self::FloorRequestStatus,
            "floorStatus" => Self::FloorStatus,
            "conferenceStatus" => Self::ConferenceStatus,
            other => Self::Custom(other.to_string()),
        }
    }

    /// The camelCase name used on the wire.
    pub fn as_wire(&self) -> &str {
        match self {
            Self::Open => "open",
            Self::Close => "close",
            Self::Error => "error",
            Self::FloorGranted => "floorGranted",
            Self::FloorDenied => "floorDenied",
            Self::FloorReleased => "floorReleased",
            Self::FloorRequestStatus => "floorRequestStatus",
            Self::FloorStatus => "floorStatus",
            Self::ConferenceStatus => "conferenceStatus",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_wire())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        assert_eq!(EventName::from_wire("floorGranted"), EventName::FloorGranted);
        assert_eq!(EventName::FloorGranted.as_wire(), "floorGranted");
    }

    #[test]
    fn unknown_names_are_preserved_as_custom() {
        let event = EventName::from_wire("chairAction");
        assert_eq!(event, EventName::Custom("chairAction".to_string()));
        assert_eq!(event.as_wire(), "chairAction");
    }
}
