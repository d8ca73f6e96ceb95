//! Encodes outbound requests and writes them through the transport.

use crate::error::ClientError;
use crate::transport::TransportWriter;

use super::OutboundMessage;

/// Outbound facade bound to a ready transport. Exists only while the
/// connection is OPEN.
pub struct MessageSender {
    writer: Box<dyn TransportWriter>,
}

impl MessageSender {
    /// Binds a sender to a transport writer handle.
    pub fn new(writer: Box<dyn TransportWriter>) -> Self {
        Self { writer }
    }

    /// Encodes `message` as a wire envelope and queues it for the transport.
    pub fn send_message(&self, message: &OutboundMessage) -> Result<(), ClientError> {
        let frame = serde_json::to_string(message)?;
        log::debug!("Sending frame ({} bytes)", frame.len());
        self.writer.write_text(frame)?;
        Ok(())
    }
}
