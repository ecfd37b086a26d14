use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Channel parameters for the simulated link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub loss_rate: f64,
    pub corrupt_rate: f64,
    pub min_latency: u64,
    pub max_latency: u64,
    pub seed: u64,
    /// Keep packets travelling in one direction in send order.
    pub fifo: bool,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            loss_rate: 0.0,
            corrupt_rate: 0.0,
            min_latency: 1,
            max_latency: 10,
            seed: 0,
            fifo: false,
        }
    }
}

/// Largest accepted sequence space. Each entity keeps one buffer slot per number.
pub const MAX_SEQ_SPACE: u32 = 1 << 16;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("window size must be at least 1")]
    EmptyWindow,
    #[error(
        "sequence space {seq_space} is too small for window {window_size}: it must hold two windows"
    )]
    SequenceSpaceTooSmall { window_size: u32, seq_space: u32 },
    #[error("sequence space {seq_space} exceeds the limit of {max}")]
    SequenceSpaceTooLarge { seq_space: u32, max: u32 },
    #[error("retransmission timeout must be positive")]
    ZeroTimeout,
}

/// Parameters shared by both protocol entities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolConfig {
    /// Maximum number of unacknowledged packets (W).
    pub window_size: u32,
    /// Size of the circular sequence space (N).
    pub seq_space: u32,
    /// Retransmission timeout in simulation ticks.
    pub timeout: u64,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            window_size: 6,
            seq_space: 20,
            timeout: 16,
        }
    }
}

impl ProtocolConfig {
    /// Reject parameter sets under which a new packet and a stale
    /// retransmission could carry the same sequence number.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_size == 0 {
            return Err(ConfigError::EmptyWindow);
        }
        if u64::from(self.seq_space) < 2 * u64::from(self.window_size) {
            return Err(ConfigError::SequenceSpaceTooSmall {
                window_size: self.window_size,
                seq_space: self.seq_space,
            });
        }
        if self.seq_space > MAX_SEQ_SPACE {
            return Err(ConfigError::SequenceSpaceTooLarge {
                seq_space: self.seq_space,
                max: MAX_SEQ_SPACE,
            });
        }
        if self.timeout == 0 {
            return Err(ConfigError::ZeroTimeout);
        }
        Ok(())
    }
}
