//! # Connection Manager
//!
//! Owns the lifecycle state machine, wires a transport to the message
//! receiver/sender once it is usable, and forwards transport failures as
//! lifecycle events through the dispatcher.
//!
//! ## Lifecycle
//!
//! ```text
//! UNATTACHED ──attach(ready)──────────────► OPEN ──► CLOSED
//!     │                                      ▲  \
//!     └──attach(pending)──► CONNECTING ──────┘   ──► ERRORED
//!                                │
//!                                └──────────────────► ERRORED
//! ```
//!
//! Readiness may be immediate (an already-open transport) or asynchronous (a
//! transport mid-handshake); both paths converge on the same open transition
//! and receiver/sender wiring, so consumers never need to know which one
//! occurred. `CLOSED` and `ERRORED` are terminal; further transport errors
//! are still forwarded for observability, but the state never progresses
//! again and this layer never reconnects on its own.

use std::sync::{Arc, Mutex};

use serde_json::json;
use tokio::sync::mpsc;

use crate::config::ClientConfig;
use crate::core::dispatcher::EventDispatcher;
use crate::core::events::{EventName, EventPayload};
use crate::core::registry::{field_resolver, EventCallback};
use crate::error::ClientError;
use crate::messages::receiver::MessageReceiver;
use crate::messages::sender::MessageSender;
use crate::messages::OutboundMessage;
use crate::transport::ws::WsTransport;
use crate::transport::{Transport, TransportSignal, TransportWriter};

/// Lifecycle states of a client connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No transport attached yet.
    Unattached,
    /// Transport attached, waiting for its readiness signal.
    Connecting,
    /// Transport usable; receiver and sender are bound.
    Open,
    /// Transport closed. Terminal.
    Closed,
    /// Transport or attachment failed. Terminal.
    Errored,
}

fn is_terminal(state: ConnectionState) -> bool {
    matches!(state, ConnectionState::Closed | ConnectionState::Errored)
}

/// Floor-control client: connection management plus event subscription.
///
/// One instance owns at most one transport. All environmental failures are
/// surfaced as `error` events rather than returned, because attach and the
/// transport signals run in contexts with no surrounding failure handler;
/// only API misuse ([`BfcpClient::send`] before OPEN) reports synchronously.
pub struct BfcpClient {
    config: ClientConfig,
    state: Arc<Mutex<ConnectionState>>,
    dispatcher: Arc<EventDispatcher>,
    sender: Arc<Mutex<Option<MessageSender>>>,
    transport: Mutex<Option<Box<dyn Transport>>>,
}

impl BfcpClient {
    /// Creates a detached client.
    ///
    /// Resolvers for the floor-scoped events (`floor` payload field) and for
    /// `conferenceStatus` (`conference` field) are installed here; callers
    /// may override any of them with [`BfcpClient::set_resolver`].
    pub fn new(config: ClientConfig) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new());
        for event in [
            EventName::FloorGranted,
            EventName::FloorDenied,
            EventName::FloorReleased,
            EventName::FloorRequestStatus,
            EventName::FloorStatus,
        ] {
            dispatcher.registry().set_resolver(event, field_resolver("floor"));
        }
        dispatcher
            .registry()
            .set_resolver(EventName::ConferenceStatus, field_resolver("conference"));

        Self {
            config,
            state: Arc::new(Mutex::new(ConnectionState::Unattached)),
            dispatcher,
            sender: Arc::new(Mutex::new(None)),
            transport: Mutex::new(None),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock().expect("Client state lock poisoned")
    }

    /// The dispatcher carrying this client's lifecycle and protocol events.
    /// Applications can emit synthetic events through it; the connection
    /// manager uses the same path for its own announcements.
    pub fn dispatcher(&self) -> &EventDispatcher {
        &self.dispatcher
    }

    /// Attaches an existing transport.
    ///
    /// Already-ready transports transition straight to OPEN and emit `open`
    /// before this call returns; pending ones move to CONNECTING and open
    /// when their readiness signal arrives. Attachment failures become
    /// `error` events.
    pub fn attach<T: Transport>(&self, mut transport: T) {
        {
            let state = self.state.lock().expect("Client state lock poisoned");
            if *state != ConnectionState::Unattached {
                let detail = format!("cannot attach a transport while {:?}", *state);
                drop(state);
                self.fail_attach(&detail);
                return;
            }
        }

        let signals = match transport.take_signals() {
            Some(rx) => rx,
            None => {
                self.fail_attach("transport signal stream already consumed");
                return;
            }
        };

        let ready = transport.is_ready();
        let writer = transport.writer();
        *self.transport.lock().expect("Client transport lock poisoned") = Some(Box::new(transport));

        if ready {
            bind_open(&self.state, &self.sender, &self.dispatcher, writer);
            self.spawn_driver(signals, None);
        } else {
            *self.state.lock().expect("Client state lock poisoned") = ConnectionState::Connecting;
            log::debug!("Transport not ready yet; waiting for readiness signal");
            self.spawn_driver(signals, Some(writer));
        }
    }

    /// Dials a new WebSocket transport for `uri` and attaches it.
    /// Construction failures surface as `error` events.
    pub async fn connect(&self, uri: &str) {
        match WsTransport::connect(uri, &self.config).await {
            Ok(transport) => self.attach(transport),
            Err(e) => {
                log::error!("Failed to connect to {}: {}", uri, e);
                self.dispatcher
                    .emit(&EventName::Error, &json!({ "error": e.to_string() }));
            }
        }
    }

    /// Requests closure of the attached transport. Calling with no transport
    /// attached is a no-op, not an error.
    pub fn close(&self) {
        let transport = self.transport.lock().expect("Client transport lock poisoned");
        if let Some(transport) = transport.as_ref() {
            log::debug!("Requesting transport closure");
            transport.shutdown();
        }
    }

    /// Sends a structured message over the open connection.
    ///
    /// Fails fast with [`ClientError::NotOpen`] before the connection reaches
    /// OPEN; nothing is written in that case.
    pub fn send(&self, message: &OutboundMessage) -> Result<(), ClientError> {
        let sender = self.sender.lock().expect("Client sender lock poisoned");
        match sender.as_ref() {
            Some(sender) => sender.send_message(message),
            None => Err(ClientError::NotOpen { state: self.state() }),
        }
    }

    /// Subscribes to every occurrence of `event`, whatever its identifier.
    pub fn on<F>(&self, event: EventName, callback: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.dispatcher.subscribe(event, Arc::new(callback));
    }

    /// Registers an identifier-scoped callback: invoked only for events whose
    /// resolved correlation identifier equals `identifier`.
    pub fn register_callback<F>(&self, event: EventName, identifier: impl Into<String>, callback: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.dispatcher
            .registry()
            .register(event, identifier, Arc::new(callback) as EventCallback);
    }

    /// Overrides how the correlation identifier is resolved for one event.
    pub fn set_resolver<F>(&self, event: EventName, resolver: F)
    where
        F: Fn(&EventPayload) -> String + Send + Sync + 'static,
    {
        self.dispatcher.registry().set_resolver(event, Arc::new(resolver));
    }

    fn fail_attach(&self, detail: &str) {
        log::error!("Attachment failed: {}", detail);
        let error = ClientError::Attachment(detail.to_string());
        self.dispatcher
            .emit(&EventName::Error, &json!({ "error": error.to_string() }));
    }

    /// Consumes transport signals until the connection ends. `pending_writer`
    /// is present only when the transport was attached before it was ready.
    fn spawn_driver(
        &self,
        mut signals: mpsc::UnboundedReceiver<TransportSignal>,
        mut pending_writer: Option<Box<dyn TransportWriter>>,
    ) {
        let state = Arc::clone(&self.state);
        let sender = Arc::clone(&self.sender);
        let dispatcher = Arc::clone(&self.dispatcher);
        let receiver = MessageReceiver::new(Arc::clone(&self.dispatcher));

        tokio::spawn(async move {
            while let Some(signal) = signals.recv().await {
                match signal {
                    TransportSignal::Ready => {
                        let connecting =
                            *state.lock().expect("Client state lock poisoned") == ConnectionState::Connecting;
                        if !connecting {
                            log::debug!("Ignoring redundant readiness signal");
                            continue;
                        }
                        if let Some(writer) = pending_writer.take() {
                            bind_open(&state, &sender, &dispatcher, writer);
                        }
                    }
                    TransportSignal::Data(frame) => {
                        let current = *state.lock().expect("Client state lock poisoned");
                        if current != ConnectionState::Open {
                            log::warn!("Dropping frame received while {:?}", current);
                            continue;
                        }
                        receiver.on_frame(&frame);
                    }
                    TransportSignal::Closed => {
                        let already_terminal = {
                            let mut current = state.lock().expect("Client state lock poisoned");
                            if is_terminal(*current) {
                                true
                            } else {
                                *current = ConnectionState::Closed;
                                false
                            }
                        };
                        *sender.lock().expect("Client sender lock poisoned") = None;
                        if !already_terminal {
                            log::info!("Connection closed");
                            dispatcher.emit(&EventName::Close, &EventPayload::Null);
                        }
                        break;
                    }
                    TransportSignal::Errored(detail) => {
                        {
                            let mut current = state.lock().expect("Client state lock poisoned");
                            if !is_terminal(*current) {
                                *current = ConnectionState::Errored;
                            }
                        }
                        *sender.lock().expect("Client sender lock poisoned") = None;
                        log::error!("Transport error: {}", detail);
                        dispatcher.emit(&EventName::Error, &json!({ "error": detail }));
                    }
                }
            }
        });
    }
}

impl Default for BfcpClient {
    fn default() -> Self {
        Self::new(ClientConfig::default())
    }
}

/// The single open path both attach flavors converge on: bind the sender,
/// move to OPEN, announce it. The state guard makes the announcement fire
/// exactly once even if readiness is signalled more than once.
fn bind_open(
    state: &Mutex<ConnectionState>,
    sender: &Mutex<Option<MessageSender>>,
    dispatcher: &EventDispatcher,
    writer: Box<dyn TransportWriter>,
) {
    {
        let mut current = state.lock().expect("Client state lock poisoned");
        if *current == ConnectionState::Open || is_terminal(*current) {
            return;
        }
        *current = ConnectionState::Open;
    }
    *sender.lock().expect("Client sender lock poisoned") = Some(MessageSender::new(writer));
    log::info!("Connection open");
    dispatcher.emit(&EventName::Open, &EventPayload::Null);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::inmem::InMemTransport;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn event_counter(client: &BfcpClient, event: EventName) -> Arc<AtomicUsize> {
        let count = Arc::new(AtomicUsize::new(0));
        let cloned = Arc::clone(&count);
        client.on(event, move |_| {
            cloned.fetch_add(1, Ordering::SeqCst);
        });
        count
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn ready_transport_opens_synchronously() {
        let client = BfcpClient::default();
        let opened = event_counter(&client, EventName::Open);

        let (transport, _handle) = InMemTransport::new(true);
        client.attach(transport);

        // No awaiting: the open announcement happened inside attach.
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn pending_transport_opens_on_readiness_signal_once() {
        let client = BfcpClient::default();
        let opened = event_counter(&client, EventName::Open);

        let (transport, handle) = InMemTransport::new(false);
        client.attach(transport);
        assert_eq!(client.state(), ConnectionState::Connecting);
        assert_eq!(opened.load(Ordering::SeqCst), 0);

        handle.signals.send(TransportSignal::Ready).unwrap();
        settle().await;
        assert_eq!(client.state(), ConnectionState::Open);
        assert_eq!(opened.load(Ordering::SeqCst), 1);

        handle.signals.send(TransportSignal::Ready).unwrap();
        settle().await;
        assert_eq!(opened.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn close_without_transport_is_a_noop() {
        let client = BfcpClient::default();
        let closed = event_counter(&client, EventName::Close);
        let errored = event_counter(&client, EventName::Error);

        client.close();

        assert_eq!(client.state(), ConnectionState::Unattached);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
        assert_eq!(errored.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn send_before_open_fails_fast_and_writes_nothing() {
        let client = BfcpClient::default();
        let message = OutboundMessage::Hello {
            conference_id: 1,
            user_id: 2,
        };

        match client.send(&message) {
            Err(ClientError::NotOpen { state }) => assert_eq!(state, ConnectionState::Unattached),
            other => panic!("expected NotOpen, got {:?}", other.map(|_| ())),
        }

        // Same while a pending transport is still connecting.
        let (transport, handle) = InMemTransport::new(false);
        client.attach(transport);
        assert!(matches!(
            client.send(&message),
            Err(ClientError::NotOpen { state: ConnectionState::Connecting })
        ));
        assert!(handle.written.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn send_after_open_writes_an_envelope() {
        let client = BfcpClient::default();
        let (transport, handle) = InMemTransport::new(true);
        client.attach(transport);

        client
            .send(&OutboundMessage::FloorRequest {
                conference_id: 10,
                user_id: 99,
                floor_id: 530,
            })
            .unwrap();

        let written = handle.written.lock().unwrap();
        assert_eq!(written.len(), 1);
        let frame: serde_json::Value = serde_json::from_str(&written[0]).unwrap();
        assert_eq!(frame["name"], "floorRequest");
        assert_eq!(frame["data"]["floorId"], 530);
    }

    #[tokio::test]
    async fn floor_granted_events_reach_only_their_identifier() {
        let client = BfcpClient::default();
        let (transport, handle) = InMemTransport::new(true);
        client.attach(transport);

        let payloads = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&payloads);
        client.register_callback(EventName::FloorGranted, "42", move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });

        let granted = |floor: u64| {
            TransportSignal::Data(json!({ "name": "floorGranted", "data": { "floor": floor } }).to_string())
        };
        handle.signals.send(granted(42)).unwrap();
        settle().await;
        {
            let payloads = payloads.lock().unwrap();
            assert_eq!(payloads.len(), 1);
            assert_eq!(payloads[0]["floor"], 42);
        }

        handle.signals.send(granted(7)).unwrap();
        settle().await;
        assert_eq!(payloads.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn scoped_callbacks_fire_per_matching_event_in_decode_order() {
        let client = BfcpClient::default();
        let (transport, handle) = InMemTransport::new(true);
        client.attach(transport);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        client.register_callback(EventName::FloorStatus, "5", move |payload| {
            sink.lock().unwrap().push(payload["seq"].as_u64().unwrap());
        });

        for (floor, seq) in [(5, 0u64), (8, 1), (5, 2), (5, 3), (9, 4)] {
            let frame = json!({ "name": "floorStatus", "data": { "floor": floor, "seq": seq } });
            handle
                .signals
                .send(TransportSignal::Data(frame.to_string()))
                .unwrap();
        }
        settle().await;

        assert_eq!(*seen.lock().unwrap(), vec![0, 2, 3]);
    }

    #[tokio::test]
    async fn transport_close_emits_close_and_clears_the_sender() {
        let client = BfcpClient::default();
        let closed = event_counter(&client, EventName::Close);
        let (transport, _handle) = InMemTransport::new(true);
        client.attach(transport);

        client.close();
        settle().await;

        assert_eq!(client.state(), ConnectionState::Closed);
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(matches!(
            client.send(&OutboundMessage::Hello { conference_id: 1, user_id: 2 }),
            Err(ClientError::NotOpen { state: ConnectionState::Closed })
        ));

        // Closing again is idempotent.
        client.close();
        settle().await;
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn transport_errors_are_forwarded_and_terminal() {
        let client = BfcpClient::default();
        let closed = event_counter(&client, EventName::Close);

        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        client.on(EventName::Error, move |payload| {
            sink.lock().unwrap().push(payload.clone());
        });

        let (transport, handle) = InMemTransport::new(true);
        client.attach(transport);

        handle
            .signals
            .send(TransportSignal::Errored("connection reset".to_string()))
            .unwrap();
        settle().await;

        assert_eq!(client.state(), ConnectionState::Errored);
        {
            let errors = errors.lock().unwrap();
            assert_eq!(errors.len(), 1);
            assert_eq!(errors[0]["error"], "connection reset");
        }

        // A late close signal is still drained but no lifecycle progress or
        // close event comes out of a terminal state.
        handle.signals.send(TransportSignal::Closed).unwrap();
        settle().await;
        assert_eq!(client.state(), ConnectionState::Errored);
        assert_eq!(closed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn attaching_twice_surfaces_an_attachment_error_event() {
        let client = BfcpClient::default();
        let errored = event_counter(&client, EventName::Error);

        let (first, _first_handle) = InMemTransport::new(true);
        client.attach(first);
        assert_eq!(errored.load(Ordering::SeqCst), 0);

        let (second, _second_handle) = InMemTransport::new(true);
        client.attach(second);
        assert_eq!(errored.load(Ordering::SeqCst), 1);
        assert_eq!(client.state(), ConnectionState::Open);
    }

    #[tokio::test]
    async fn consumed_signal_stream_surfaces_an_attachment_error_event() {
        let client = BfcpClient::default();
        let errored = event_counter(&client, EventName::Error);

        let (mut transport, _handle) = InMemTransport::new(true);
        let _stolen = transport.take_signals();
        client.attach(transport);

        assert_eq!(errored.load(Ordering::SeqCst), 1);
        assert_eq!(client.state(), ConnectionState::Unattached);
    }

    #[tokio::test]
    async fn callbacks_registered_mid_batch_catch_later_events() {
        let client = Arc::new(BfcpClient::default());
        let (transport, handle) = InMemTransport::new(true);
        client.attach(transport);

        let late_hits = Arc::new(AtomicUsize::new(0));
        let registrar = Arc::clone(&client);
        let late = Arc::clone(&late_hits);
        let armed = Arc::new(AtomicUsize::new(0));
        let armed_flag = Arc::clone(&armed);
        client.register_callback(EventName::FloorGranted, "1", move |_| {
            if armed_flag.fetch_add(1, Ordering::SeqCst) == 0 {
                let late = Arc::clone(&late);
                registrar.register_callback(EventName::FloorGranted, "1", move |_| {
                    late.fetch_add(1, Ordering::SeqCst);
                });
            }
        });

        let frame = json!({ "name": "floorGranted", "data": { "floor": 1 } }).to_string();
        handle.signals.send(TransportSignal::Data(frame.clone())).unwrap();
        handle.signals.send(TransportSignal::Data(frame)).unwrap();
        settle().await;

        // Registered during event #1: skipped it, caught event #2.
        assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    }
}
