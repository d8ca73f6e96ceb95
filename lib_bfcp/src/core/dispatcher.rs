//! # Event Dispatcher
//!
//! Bridges every event decoded by the message receiver into two channels
//! within one synchronous delivery: generic subscribers listening for an
//! event name regardless of identifier, then the identifier-scoped entries
//! of the [`CallbackRegistry`]. There is no queuing or reordering; events go
//! out in the order the receiver produces them.
//!
//! The connection manager holds a dispatcher by composition rather than
//! inheriting emitter behavior, so the lifecycle events (`open`, `close`,
//! `error`) flow through exactly the same path as protocol events.

#![forbid(unsafe_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::events::{EventName, EventPayload};
use crate::core::registry::{CallbackRegistry, EventCallback};

/// Per-event generic subscribers plus the identifier-scoped registry.
pub struct EventDispatcher {
    subscribers: Mutex<HashMap<EventName, Vec<EventCallback>>>,
    registry: CallbackRegistry,
}

impl EventDispatcher {
    /// Creates a dispatcher with no subscribers and an empty registry.
    pub fn new() -> Self {
        Self {
            subscribers: Mutex::new(HashMap::new()),
            registry: CallbackRegistry::new(),
        }
    }

    /// The identifier-scoped registry routed after generic emission.
    pub fn registry(&self) -> &CallbackRegistry {
        &self.registry
    }

    /// Subscribes to every occurrence of `event`, whatever its identifier.
    pub fn subscribe(&self, event: EventName, callback: EventCallback) {
        let mut subscribers = self.subscribers.lock().expect("Dispatcher lock poisoned");
        subscribers.entry(event).or_default().push(callback);
    }

    /// Delivers one event: generic subscribers first, in subscription order,
    /// then the identifier-scoped callbacks.
    pub fn emit(&self, event: &EventName, payload: &EventPayload) {
        let generic: Vec<EventCallback> = {
            let subscribers = self.subscribers.lock().expect("Dispatcher lock poisoned");
            subscribers
                .get(event)
                .map(|list| list.iter().map(Arc::clone).collect())
                .unwrap_or_default()
        };

        log::trace!("Emitting '{}' to {} generic subscriber(s)", event, generic.len());
        for callback in generic {
            callback(payload);
        }

        self.registry.dispatch(event, payload);
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
