use serde::{Deserialize, Serialize};

/// Monotonic counters an entity exposes for instrumentation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStats {
    /// Application messages rejected because the send window was full.
    pub window_full: u32,
    /// Uncorrupted ACKs seen by the sender.
    pub acks_received: u32,
    /// ACKs that acknowledged a packet for the first time.
    pub new_acks: u32,
    /// Timeout-driven retransmissions.
    pub packets_resent: u32,
    /// Uncorrupted data packets seen by the receiver.
    pub packets_received: u32,
    /// Payloads handed to the application.
    pub delivered: u32,
    /// Inbound packets discarded on checksum mismatch.
    pub corrupted: u32,
}
