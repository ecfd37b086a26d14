use crate::config::{ProtocolConfig, SimConfig};
use serde::Deserialize;

#[derive(Deserialize, Debug, Clone)]
pub struct TestScenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub config: SimConfigOverride,
    #[serde(default)]
    pub protocol: ProtocolConfigOverride,
    pub actions: Vec<TestAction>,
    pub assertions: Vec<TestAssertion>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct SimConfigOverride {
    pub loss_rate: Option<f64>,
    pub corrupt_rate: Option<f64>,
    pub min_latency: Option<u64>,
    pub max_latency: Option<u64>,
    pub seed: Option<u64>,
    pub fifo: Option<bool>,
}

impl SimConfigOverride {
    pub fn apply_to(&self, config: &mut SimConfig) {
        if let Some(v) = self.loss_rate {
            config.loss_rate = v;
        }
        if let Some(v) = self.corrupt_rate {
            config.corrupt_rate = v;
        }
        if let Some(v) = self.min_latency {
            config.min_latency = v;
        }
        if let Some(v) = self.max_latency {
            config.max_latency = v;
        }
        if let Some(v) = self.seed {
            config.seed = v;
        }
        if let Some(v) = self.fifo {
            config.fifo = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct ProtocolConfigOverride {
    pub window_size: Option<u32>,
    pub seq_space: Option<u32>,
    pub timeout: Option<u64>,
}

impl ProtocolConfigOverride {
    pub fn apply_to(&self, config: &mut ProtocolConfig) {
        if let Some(v) = self.window_size {
            config.window_size = v;
        }
        if let Some(v) = self.seq_space {
            config.seq_space = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
    }
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAction {
    /// Application sends data at a specific time
    AppSend { time: u64, data: String },
    /// Application sends `count` generated messages, one every `interval` ticks
    AppSendBurst {
        start: u64,
        interval: u64,
        count: u32,
    },
    /// Deterministically drop the first packet sent by Sender with given seq number
    DropNextFromSenderSeq { seq: u32 },
    /// Deterministically drop the first ACK sent by Receiver with given ack number
    DropNextFromReceiverAck { ack: u32 },
    /// Deterministically corrupt the first packet sent by Sender with given seq number
    CorruptNextFromSenderSeq { seq: u32 },
    /// Deterministically corrupt the first ACK sent by Receiver with given ack number
    CorruptNextFromReceiverAck { ack: u32 },
}

#[derive(Deserialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TestAssertion {
    /// Assert that specific data was delivered to the application layer
    DataDelivered { data: String },
    /// Assert that every accepted message was delivered exactly once, in submission order
    DeliveredInOrder,
    /// Assert that the total number of packets sent by Sender is within range
    SenderPacketCount { min: u32, max: Option<u32> },
    /// Assert that the number of timeout retransmissions is within range
    Retransmissions { min: u32, max: Option<u32> },
    /// Assert that no entity started a running timer or stopped an idle one
    NoTimerViolations,
    /// Assert that simulation finishes within time
    MaxDuration { ticks: u64 },
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENARIO: &str = r#"
name = "lost base"
description = "drop the first copy of packet 0"

[config]
fifo = true

[protocol]
window_size = 4
seq_space = 8

[[actions]]
type = "app_send_burst"
start = 0
interval = 1
count = 4

[[actions]]
type = "drop_next_from_sender_seq"
seq = 0

[[assertions]]
type = "delivered_in_order"

[[assertions]]
type = "retransmissions"
min = 1
"#;

    #[test]
    fn parses_scenario_with_overrides() {
        let scenario: TestScenario = toml::from_str(SCENARIO).unwrap();
        assert_eq!(scenario.name, "lost base");
        assert_eq!(scenario.actions.len(), 2);
        assert!(matches!(
            scenario.actions[1],
            TestAction::DropNextFromSenderSeq { seq: 0 }
        ));
        assert!(matches!(
            scenario.assertions[1],
            TestAssertion::Retransmissions { min: 1, max: None }
        ));

        let mut sim = SimConfig::default();
        scenario.config.apply_to(&mut sim);
        assert!(sim.fifo);
        assert_eq!(sim.max_latency, 10);

        let mut protocol = ProtocolConfig::default();
        scenario.protocol.apply_to(&mut protocol);
        assert_eq!(protocol.window_size, 4);
        assert_eq!(protocol.seq_space, 8);
        assert_eq!(protocol.timeout, 16);
    }
}
