//! Selective-Repeat sender and receiver entities.
//! Both implement [`TransportProtocol`] and talk to the outside world only through
//! the [`SystemContext`](sr_lab_abstract::SystemContext) they are handed per event.

pub mod checksum;
pub mod receiver;
pub mod sender;
pub mod sequence;

#[cfg(test)]
mod test_context;

pub use receiver::SrReceiver;
pub use sender::{SenderError, SrSender};
pub use sequence::{SequenceSpace, in_window};

use sr_lab_abstract::{ConfigError, ProtocolConfig, TransportProtocol};

pub fn sender(config: ProtocolConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrSender::new(config)?))
}

pub fn receiver(config: ProtocolConfig) -> Result<Box<dyn TransportProtocol>, ConfigError> {
    Ok(Box::new(SrReceiver::new(config)?))
}
