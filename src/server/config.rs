use crate::session::SupervisorConfig;
use axum::http::header::InvalidHeaderValue;
use axum::http::HeaderValue;
use clap::Parser;
use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

/// Command line and environment configuration for the signaling server.
#[derive(Parser, Debug, Clone)]
#[command(name = "match-signaling")]
#[command(version, about = "Signaling and matchmaking server for one-to-one video")]
pub struct Config {
    /// Port to listen on
    #[arg(long, env = "PORT", default_value_t = 3001)]
    pub port: u16,

    /// Interface to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Browser origin allowed by CORS
    #[arg(long, env = "FRONTEND_URL", default_value = "http://localhost:3000")]
    pub allowed_origin: String,

    /// Milliseconds a paired room may stay unconfirmed
    #[arg(long, env = "PAIRING_TIMEOUT_MS", default_value_t = 10_000)]
    pub pairing_timeout_ms: u64,

    /// Capacity of the supervisor command queue
    #[arg(long, env = "COMMAND_CAPACITY", default_value_t = 1024)]
    pub command_capacity: usize,

    /// Events a client may fall behind before it is disconnected
    #[arg(long, env = "OUTBOUND_CAPACITY", default_value_t = 64)]
    pub outbound_capacity: usize,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub log_json: bool,
}

impl Config {
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::new()
            .with_pairing_timeout(Duration::from_millis(self.pairing_timeout_ms))
            .with_command_capacity(self.command_capacity)
            .with_outbound_capacity(self.outbound_capacity)
    }

    pub fn allowed_origin(&self) -> Result<HeaderValue, InvalidHeaderValue> {
        HeaderValue::from_str(self.allowed_origin.trim_end_matches('/'))
    }
}
