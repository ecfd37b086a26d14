use crate::packet::{Message, Packet};
use crate::stats::ProtocolStats;

/// The capability provided by the simulator to a protocol entity.
/// Entities call these methods to interact with the channel, the timer and the application layer.
pub trait SystemContext {
    /// Hand a packet to the unreliable channel, addressed to the peer entity.
    fn send_packet(&mut self, packet: Packet);

    /// Start this entity's retransmission timer.
    /// Each entity owns exactly one timer; starting it while it is running is a protocol bug
    /// that the simulator reports.
    fn start_timer(&mut self, delay: u64);

    /// Stop this entity's timer.
    fn stop_timer(&mut self);

    /// Deliver an in-order payload to the application layer.
    fn deliver_data(&mut self, data: &[u8]);

    /// Log a message to the simulator's debug output.
    fn log(&mut self, message: &str);

    /// Get current simulation time in ticks
    fn now(&self) -> u64;

    /// Record a numeric metric for inspection in the simulation report.
    fn record_metric(&mut self, _name: &str, _value: f64) {
        // Default no-op so test doubles don't need to care.
    }
}

/// Event entry points of a protocol entity.
pub trait TransportProtocol {
    /// Called when the simulation starts. Resets the entity to its session-start state.
    fn init(&mut self, _ctx: &mut dyn SystemContext) {}

    /// Called when a packet arrives from the channel.
    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet);

    /// Called when the entity's timer expires.
    fn on_timer(&mut self, ctx: &mut dyn SystemContext);

    /// Called when the application layer wants to send a message reliably.
    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: Message);

    /// Snapshot of the entity's counters.
    fn stats(&self) -> ProtocolStats {
        ProtocolStats::default()
    }
}
