use std::time::Duration;

pub const DEFAULT_PAIRING_TIMEOUT: Duration = Duration::from_millis(10_000);
pub const DEFAULT_COMMAND_CAPACITY: usize = 1024;
pub const DEFAULT_OUTBOUND_CAPACITY: usize = 64;

/// Configuration for the session supervisor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupervisorConfig {
    /// How long a room may stay unconfirmed before it is dissolved
    pub pairing_timeout: Duration,

    /// Capacity of the inbound command queue
    pub command_capacity: usize,

    /// Events a client may fall behind before it is disconnected
    pub outbound_capacity: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            pairing_timeout: DEFAULT_PAIRING_TIMEOUT,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            outbound_capacity: DEFAULT_OUTBOUND_CAPACITY,
        }
    }
}

impl SupervisorConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pairing_timeout(mut self, timeout: Duration) -> Self {
        self.pairing_timeout = timeout;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity.max(1);
        self
    }

    pub fn with_outbound_capacity(mut self, capacity: usize) -> Self {
        self.outbound_capacity = capacity.max(1);
        self
    }
}
