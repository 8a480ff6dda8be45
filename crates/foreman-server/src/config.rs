//! Server configuration.

use std::net::SocketAddr;

/// Environment-driven server settings.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Address to bind.
    pub bind_addr: SocketAddr,
    /// Per-connection outbound frame buffer.
    pub connection_buffer: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8710".parse().expect("static addr"),
            connection_buffer: 256,
        }
    }
}

impl ServerConfig {
    /// Load from `FOREMAN_BIND` / `FOREMAN_CONNECTION_BUFFER`, falling back
    /// to defaults for unset or unparsable values.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bind_addr = std::env::var("FOREMAN_BIND")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.bind_addr);
        let connection_buffer = std::env::var("FOREMAN_CONNECTION_BUFFER")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(defaults.connection_buffer);
        Self {
            bind_addr,
            connection_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_addr.port(), 8710);
        assert_eq!(config.connection_buffer, 256);
    }

    #[test]
    fn from_env_falls_back_on_garbage() {
        // Unset/garbage env vars must not panic.
        let config = ServerConfig::from_env();
        assert!(config.connection_buffer > 0);
    }
}
