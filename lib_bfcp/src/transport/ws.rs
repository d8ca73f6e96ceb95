//! WebSocket transport over `tokio-tungstenite`.
//!
//! One pump task per connection multiplexes outbound writes, inbound frames
//! and cancellation, forwarding everything to the connection manager through
//! the signal channel. The pump never reconnects; when the socket dies the
//! manager hears about it once and reconnection policy stays with the caller.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::USER_AGENT;
use tokio_tungstenite::tungstenite::protocol::Message as WsMessage;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::{Transport, TransportSignal, TransportWriter};
use crate::config::ClientConfig;
use crate::error::TransportError;

/// A connected WebSocket, ready as soon as construction succeeds.
pub struct WsTransport {
    signals_rx: Option<mpsc::UnboundedReceiver<TransportSignal>>,
    out_tx: mpsc::UnboundedSender<String>,
    cancel: CancellationToken,
}

impl WsTransport {
    /// Dials `uri` and completes the WebSocket handshake, bounded by the
    /// configured connect timeout.
    pub async fn connect(uri: &str, config: &ClientConfig) -> Result<Self, TransportError> {
        let url = Url::parse(uri).map_err(|e| TransportError::Address(format!("{}: {}", uri, e)))?;

        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| TransportError::Address(format!("{}: {}", uri, e)))?;
        if let Some(user_agent) = &config.user_agent {
            let value = user_agent
                .parse()
                .map_err(|_| TransportError::Address(format!("invalid user agent: {}", user_agent)))?;
            request.headers_mut().insert(USER_AGENT, value);
        }

        log::info!("Connecting to {}", uri);
        let connect = connect_async(request);
        let (stream, _) = timeout(config.connect_timeout(), connect)
            .await
            .map_err(|_| TransportError::ConnectTimeout(uri.to_string()))?
            .map_err(|e| TransportError::Handshake(e.to_string()))?;
        log::info!("Connected to {}", uri);

        Ok(Self::spawn_pump(stream))
    }

    fn spawn_pump(stream: WebSocketStream<MaybeTlsStream<TcpStream>>) -> Self {
        let (signals_tx, signals_rx) = mpsc::unbounded_channel();
        let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let (mut write, mut read) = stream.split();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        let _ = write.close().await;
                        let _ = signals_tx.send(TransportSignal::Closed);
                        break;
                    }
                    Some(frame) = out_rx.recv() => {
                        log::trace!("Writing frame ({} bytes)", frame.len());
                        if let Err(e) = write.send(WsMessage::Text(frame.into())).await {
                            log::error!("WebSocket write failed: {}", e);
                            let _ = signals_tx.send(TransportSignal::Errored(e.to_string()));
                            break;
                        }
                    }
                    inbound = read.next() => {
                        match inbound {
                            Some(Ok(WsMessage::Text(text))) => {
                                let _ = signals_tx.send(TransportSignal::Data(text.to_string()));
                            }
                            Some(Ok(WsMessage::Ping(_))) | Some(Ok(WsMessage::Pong(_))) => {}
                            Some(Ok(WsMessage::Close(_))) | None => {
                                let _ = signals_tx.send(TransportSignal::Closed);
                                break;
                            }
                            // Binary frames are not part of the envelope protocol.
                            Some(Ok(other)) => {
                                log::warn!("Ignoring non-text frame: {:?}", other);
                            }
                            Some(Err(e)) => {
                                log::error!("WebSocket read failed: {}", e);
                                let _ = signals_tx.send(TransportSignal::Errored(e.to_string()));
                                break;
                            }
                        }
                    }
                }
            }
        });

        Self {
            signals_rx: Some(signals_rx),
            out_tx,
            cancel,
        }
    }
}

impl Drop for WsTransport {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[derive(Clone)]
struct WsWriter {
    out_tx: mpsc::UnboundedSender<String>,
}

impl TransportWriter for WsWriter {
    fn write_text(&self, frame: String) -> Result<(), TransportError> {
        self.out_tx.send(frame).map_err(|_| TransportError::Closed)
    }
}

impl Transport for WsTransport {
    fn is_ready(&self) -> bool {
        // The handshake completed in `connect`; only shutdown revokes it.
        !self.cancel.is_cancelled()
    }

    fn take_signals(&mut self) -> Option<mpsc::UnboundedReceiver<TransportSignal>> {
        self.signals_rx.take()
    }

    fn writer(&self) -> Box<dyn TransportWriter> {
        Box::new(WsWriter {
            out_tx: self.out_tx.clone(),
        })
    }

    fn shutdown(&self) {
        self.cancel.cancel();
    }
}
