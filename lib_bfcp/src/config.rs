//! Client configuration.
//!
//! Option-valued fields with a `merge` that lets a later source override an
//! earlier one, so applications can layer file, environment and hardcoded
//! defaults however they load them. The library itself never touches the
//! filesystem.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fallback handshake deadline when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    /// Milliseconds allowed for the WebSocket handshake.
    pub connect_timeout_ms: Option<u64>,
    /// User-Agent header sent with the handshake request.
    pub user_agent: Option<String>,
}

impl ClientConfig {
    /// Merge two configs, where `other` overrides `self` for Some values.
    pub fn merge(self, other: ClientConfig) -> ClientConfig {
        ClientConfig {
            connect_timeout_ms: other.connect_timeout_ms.or(self.connect_timeout_ms),
            user_agent: other.user_agent.or(self.user_agent),
        }
    }

    /// The effective handshake deadline.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms.unwrap_or(DEFAULT_CONNECT_TIMEOUT_MS))
    }
}
