//! Decodes inbound frames and feeds the dispatcher.

use std::sync::Arc;

use crate::core::dispatcher::EventDispatcher;
use crate::core::events::EventName;

use super::WireEnvelope;

/// Consumes raw text frames from a ready transport and emits one named event
/// per decoded envelope, in arrival order.
pub struct MessageReceiver {
    dispatcher: Arc<EventDispatcher>,
}

impl MessageReceiver {
    /// Binds a receiver to the dispatcher it emits into.
    pub fn new(dispatcher: Arc<EventDispatcher>) -> Self {
        Self { dispatcher }
    }

    /// Decodes one frame and emits its event. Undecodable frames are logged
    /// and skipped; one bad frame must not take the connection down.
    pub fn on_frame(&self, frame: &str) {
        match serde_json::from_str::<WireEnvelope>(frame) {
            Ok(envelope) => {
                let event = EventName::from_wire(&envelope.name);
                log::debug!("Decoded '{}' event", event);
                self.dispatcher.emit(&event, &envelope.data);
            }
            Err(e) => {
                log::warn!("Failed to decode inbound frame, skipping: {}", e);
            }
        }
    }
}
