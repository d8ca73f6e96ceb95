//! # Identifier-Scoped Callback Registry
//!
//! One connection multiplexes events for many floors and conferences. A
//! caller that issued a request for floor 530 wants the answer for floor 530,
//! not every `floorGranted` the server ever sends. The registry keeps, per
//! [`EventName`], an ordered list of `(identifier, callback)` entries and on
//! each dispatch invokes only the entries whose identifier equals the one
//! resolved from the incoming payload.
//!
//! ## Resolution
//!
//! Different events carry their correlation key in different payload fields,
//! so resolution is a pluggable table: `set_resolver` installs a closure per
//! event name, and events without one resolve to the empty identifier. An
//! empty identifier is a value like any other: it matches only entries
//! registered under the empty identifier, never acts as a wildcard.
//!
//! ## Dispatch snapshot
//!
//! The matching entries are snapshotted at dispatch start and invoked after
//! the lock is released. Callbacks may therefore register further callbacks
//! or send messages freely; entries added during a pass only see later
//! events.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::core::events::{EventName, EventPayload};

/// Callback invoked with the payload of a matching event.
pub type EventCallback = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// Extracts the correlation identifier for one event name from its payload.
pub type IdentifierResolver = Arc<dyn Fn(&EventPayload) -> String + Send + Sync>;

/// Builds a resolver that reads a single payload field, stringifying numbers.
/// Missing or non-scalar fields resolve to the empty identifier.
pub fn field_resolver(field: &'static str) -> IdentifierResolver {
    Arc::new(move |payload: &EventPayload| match payload.get(field) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    })
}

struct CallbackEntry {
    identifier: String,
    callback: EventCallback,
}

/// Mapping from event name to an ordered list of identifier-scoped entries,
/// plus the per-event resolver table.
pub struct CallbackRegistry {
    entries: Mutex<HashMap<EventName, Vec<CallbackEntry>>>,
    resolvers: Mutex<HashMap<EventName, IdentifierResolver>>,
}

impl CallbackRegistry {
    /// Creates an empty registry with no resolvers installed.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            resolvers: Mutex::new(HashMap::new()),
        }
    }

    /// Appends an entry for `(event, identifier)`. Entries are never replaced
    /// or deduplicated; registering twice yields two invocations per match.
    pub fn register(&self, event: EventName, identifier: impl Into<String>, callback: EventCallback) {
        let identifier = identifier.into();
        log::debug!("Registering callback for '{}' under identifier '{}'", event, identifier);
        let mut entries = self.entries.lock().expect("Registry lock poisoned");
        entries
            .entry(event)
            .or_default()
            .push(CallbackEntry { identifier, callback });
    }

    /// Installs (or replaces) the resolver for one event name.
    pub fn set_resolver(&self, event: EventName, resolver: IdentifierResolver) {
        let mut resolvers = self.resolvers.lock().expect("Registry lock poisoned");
        resolvers.insert(event, resolver);
    }

    /// Resolves the correlation identifier for an incoming event. Events
    /// without an installed resolver yield the empty identifier.
    pub fn resolve(&self, event: &EventName, payload: &EventPayload) -> String {
        let resolver = {
            let resolvers = self.resolvers.lock().expect("Registry lock poisoned");
            resolvers.get(event).cloned()
        };
        match resolver {
            Some(resolver) => resolver(payload),
            None => String::new(),
        }
    }

    /// Invokes, in registration order, every entry matching the event name
    /// and its resolved identifier.
    pub fn dispatch(&self, event: &EventName, payload: &EventPayload) {
        let identifier = self.resolve(event, payload);

        // Snapshot under the lock so callbacks can mutate the registry while
        // running; entries added now are only eligible for later events.
        let matching: Vec<EventCallback> = {
            let entries = self.entries.lock().expect("Registry lock poisoned");
            match entries.get(event) {
                Some(list) => list
                    .iter()
                    .filter(|entry| entry.identifier == identifier)
                    .map(|entry| Arc::clone(&entry.callback))
                    .collect(),
                None => return,
            }
        };

        if !matching.is_empty() {
            log::trace!(
                "Dispatching '{}' (identifier '{}') to {} callback(s)",
                event,
                identifier,
                matching.len()
            );
        }
        for callback in matching {
            callback(payload);
        }
    }
}

impl Default for CallbackRegistry {
    fn default() -> Self {
        Self::new()
    }
}
