pub mod config;
pub mod interface;
pub mod packet;
pub mod scenario;
pub mod stats;

pub use interface::{SystemContext, TransportProtocol};
pub use packet::{Message, MessageError, PAYLOAD_SIZE, Packet};

pub use config::{ConfigError, MAX_SEQ_SPACE, ProtocolConfig, SimConfig};
pub use scenario::{
    ProtocolConfigOverride, SimConfigOverride, TestAction, TestAssertion, TestScenario,
};
pub use stats::ProtocolStats;
