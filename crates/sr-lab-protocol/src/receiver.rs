//! Selective-Repeat receive side (entity B).
//!
//! Packets inside the receive window `[expected, expected + W)` are acknowledged
//! individually and buffered until the gap before them closes. Packets from the
//! previous window `[expected - W, expected)` were already delivered; their ACK
//! was lost, so they are re-acknowledged and otherwise ignored.

use sr_lab_abstract::{
    ConfigError, Message, Packet, ProtocolConfig, ProtocolStats, SystemContext, TransportProtocol,
};

use crate::checksum::{is_corrupted, seal};
use crate::sequence::SequenceSpace;

#[derive(Debug)]
pub struct SrReceiver {
    config: ProtocolConfig,
    space: SequenceSpace,
    expected_seq: u32,
    recv_buffer: Vec<Option<Packet>>,
    stats: ProtocolStats,
}

impl SrReceiver {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            space: SequenceSpace::new(config.seq_space),
            expected_seq: 0,
            recv_buffer: vec![None; config.seq_space as usize],
            stats: ProtocolStats::default(),
        })
    }

    /// Next sequence number due for in-order release.
    pub fn expected_seq(&self) -> u32 {
        self.expected_seq
    }

    /// Number of out-of-order packets waiting for a gap to close.
    pub fn buffered(&self) -> usize {
        self.recv_buffer.iter().filter(|slot| slot.is_some()).count()
    }

    fn reset(&mut self) {
        self.expected_seq = 0;
        self.recv_buffer.fill(None);
    }

    fn send_ack(&self, ctx: &mut dyn SystemContext, seq: u32) {
        ctx.send_packet(seal(Packet::ack(seq)));
    }

    fn in_receive_window(&self, seq: u32) -> bool {
        self.space
            .contains(seq, self.expected_seq, self.config.window_size)
    }

    fn in_previous_window(&self, seq: u32) -> bool {
        let start = self.space.retreat(self.expected_seq, self.config.window_size);
        self.space.contains(seq, start, self.config.window_size)
    }

    fn buffer_and_release(&mut self, ctx: &mut dyn SystemContext, seq: u32, packet: Packet) {
        let slot = self.space.index(seq);
        if self.recv_buffer[slot].is_some() {
            ctx.log(&format!("packet {seq} already buffered"));
            return;
        }
        self.recv_buffer[slot] = Some(packet);

        while let Some(ready) = self.recv_buffer[self.space.index(self.expected_seq)].take() {
            ctx.deliver_data(&ready.payload);
            self.stats.delivered += 1;
            self.expected_seq = self.space.next(self.expected_seq);
        }
    }
}

impl TransportProtocol for SrReceiver {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.reset();
        ctx.log("SR receiver ready");
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if is_corrupted(&packet) {
            self.stats.corrupted += 1;
            ctx.log("corrupted packet is received, no ACK sent");
            return;
        }
        let Some(seq) = packet.seq_num else {
            ctx.log("packet without sequence number ignored");
            return;
        };
        self.stats.packets_received += 1;

        if self.in_receive_window(seq) {
            ctx.log(&format!("packet {seq} is correctly received, send ACK"));
            self.send_ack(ctx, seq);
            self.buffer_and_release(ctx, seq, packet);
        } else if self.in_previous_window(seq) {
            ctx.log(&format!("packet {seq} was already delivered, re-send ACK"));
            self.send_ack(ctx, seq);
        } else {
            ctx.log(&format!(
                "packet {seq} outside both windows (expecting {}), dropped",
                self.expected_seq
            ));
        }
    }

    fn on_timer(&mut self, _ctx: &mut dyn SystemContext) {}

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, _message: Message) {
        ctx.log("receiver does not originate data, message ignored");
    }

    fn stats(&self) -> ProtocolStats {
        self.stats
    }
}
