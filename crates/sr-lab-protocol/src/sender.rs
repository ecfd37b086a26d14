//! Selective-Repeat send side (entity A).
//!
//! The sender keeps up to `window_size` packets in flight, one buffer slot per
//! sequence number. ACKs are individual: each one marks a single slot, and the
//! window base only moves over a contiguous run of acknowledged slots.
//!
//! A single retransmission timer covers the whole window. It runs exactly while
//! the window is non-empty, and its expiry resends only the packet at the base.
//!
//! ```text
//!   base              next_seq
//!    │                    │
//! ───┼──┬──┬──┬──┬──┬─────┼──────────▶ seq space (mod N)
//!    │  │ack│  │ack│      │
//!    │<── in flight ─────▶│<── usable up to base + W
//! ```

use sr_lab_abstract::{
    ConfigError, Message, Packet, ProtocolConfig, ProtocolStats, SystemContext, TransportProtocol,
};
use thiserror::Error;

use crate::checksum::{is_corrupted, seal};
use crate::sequence::SequenceSpace;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SenderError {
    #[error("send window is full ({in_flight} packets in flight)")]
    WindowFull { in_flight: u32 },
}

#[derive(Debug)]
pub struct SrSender {
    config: ProtocolConfig,
    space: SequenceSpace,
    /// Oldest unacknowledged sequence number, or `next_seq` when idle.
    base: u32,
    next_seq: u32,
    send_buffer: Vec<Option<Packet>>,
    acked: Vec<bool>,
    stats: ProtocolStats,
}

impl SrSender {
    pub fn new(config: ProtocolConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let slots = config.seq_space as usize;
        Ok(Self {
            config,
            space: SequenceSpace::new(config.seq_space),
            base: 0,
            next_seq: 0,
            send_buffer: vec![None; slots],
            acked: vec![false; slots],
            stats: ProtocolStats::default(),
        })
    }

    pub fn base(&self) -> u32 {
        self.base
    }

    pub fn next_seq(&self) -> u32 {
        self.next_seq
    }

    pub fn in_flight(&self) -> u32 {
        self.space.distance(self.base, self.next_seq)
    }

    pub fn is_acked(&self, seq: u32) -> bool {
        self.acked[self.space.index(seq)]
    }

    fn window_is_empty(&self) -> bool {
        self.base == self.next_seq
    }

    fn reset(&mut self) {
        self.base = 0;
        self.next_seq = 0;
        self.send_buffer.fill(None);
        self.acked.fill(false);
    }

    /// Packetise and transmit `message` if the window has room.
    ///
    /// Returns the sequence number assigned to the message. A full window rejects the
    /// message outright; queueing is left to the caller.
    pub fn admit(
        &mut self,
        ctx: &mut dyn SystemContext,
        message: Message,
    ) -> Result<u32, SenderError> {
        let in_flight = self.in_flight();
        if in_flight >= self.config.window_size {
            self.stats.window_full += 1;
            return Err(SenderError::WindowFull { in_flight });
        }

        let seq = self.next_seq;
        let packet = seal(Packet::data(seq, message.data));
        let slot = self.space.index(seq);
        self.send_buffer[slot] = Some(packet.clone());
        self.acked[slot] = false;

        ctx.log(&format!("sending packet {seq}"));
        ctx.send_packet(packet);

        if self.window_is_empty() {
            ctx.start_timer(self.config.timeout);
        }
        self.next_seq = self.space.next(seq);
        ctx.record_metric("in_flight", f64::from(self.in_flight()));
        Ok(seq)
    }

    /// `true` when `ack` names a packet sent but not yet slid past.
    fn is_outstanding(&self, ack: u32) -> bool {
        self.space.contains(ack, self.base, self.in_flight())
    }

    fn handle_ack(&mut self, ctx: &mut dyn SystemContext, ack: u32) {
        if !self.is_outstanding(ack) {
            ctx.log(&format!("ACK {ack} is outside the send window, ignored"));
            return;
        }

        let slot = self.space.index(ack);
        if self.acked[slot] {
            ctx.log(&format!("duplicate ACK {ack}, do nothing"));
            return;
        }

        ctx.log(&format!("ACK {ack} is not a duplicate"));
        self.acked[slot] = true;
        self.stats.new_acks += 1;

        if ack != self.base {
            return;
        }

        ctx.stop_timer();
        while !self.window_is_empty() && self.acked[self.space.index(self.base)] {
            let slot = self.space.index(self.base);
            self.acked[slot] = false;
            self.send_buffer[slot] = None;
            self.base = self.space.next(self.base);
        }
        ctx.record_metric("in_flight", f64::from(self.in_flight()));

        if !self.window_is_empty() {
            ctx.start_timer(self.config.timeout);
        }
    }
}

impl TransportProtocol for SrSender {
    fn init(&mut self, ctx: &mut dyn SystemContext) {
        self.reset();
        ctx.log(&format!(
            "SR sender ready (window {}, sequence space {})",
            self.config.window_size, self.config.seq_space
        ));
    }

    fn on_packet(&mut self, ctx: &mut dyn SystemContext, packet: Packet) {
        if is_corrupted(&packet) {
            self.stats.corrupted += 1;
            ctx.log("corrupted ACK is received, do nothing");
            return;
        }
        let Some(ack) = packet.ack_num else {
            ctx.log("packet without ACK number ignored");
            return;
        };
        ctx.log(&format!("uncorrupted ACK {ack} is received"));
        self.stats.acks_received += 1;
        self.handle_ack(ctx, ack);
    }

    fn on_timer(&mut self, ctx: &mut dyn SystemContext) {
        if self.window_is_empty() {
            return;
        }
        let Some(packet) = self.send_buffer[self.space.index(self.base)].clone() else {
            ctx.log(&format!("no buffered packet for base {}", self.base));
            return;
        };

        ctx.log(&format!("time out, resending packet {}", self.base));
        ctx.send_packet(packet);
        self.stats.packets_resent += 1;
        ctx.start_timer(self.config.timeout);
    }

    fn on_app_data(&mut self, ctx: &mut dyn SystemContext, message: Message) {
        if let Err(e) = self.admit(ctx, message) {
            ctx.log(&e.to_string());
        }
    }

    fn stats(&self) -> ProtocolStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checksum::compute_checksum;
    use crate::test_context::RecordingContext;

    fn sender() -> SrSender {
        let mut sender = SrSender::new(ProtocolConfig::default()).unwrap();
        sender.init(&mut RecordingContext::default());
        sender
    }

    fn message(n: u8) -> Message {
        Message::filled(b'a' + n)
    }

    fn ack(n: u32) -> Packet {
        seal(Packet::ack(n))
    }

    /// Admit `count` messages and clear the recorded outputs.
    fn fill(sender: &mut SrSender, ctx: &mut RecordingContext, count: u8) {
        for n in 0..count {
            sender.admit(ctx, message(n)).unwrap();
        }
        ctx.sent.clear();
    }

    #[test]
    fn full_window_admission_starts_timer_once() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();

        for n in 0..6 {
            assert_eq!(s.admit(&mut ctx, message(n)), Ok(u32::from(n)));
        }

        assert_eq!(ctx.sent.len(), 6);
        assert_eq!(ctx.timer_starts, 1);
        assert!(ctx.timer_running);
        assert_eq!(s.in_flight(), 6);
        assert_eq!(s.stats().window_full, 0);
        for (n, packet) in ctx.sent.iter().enumerate() {
            assert_eq!(packet.seq_num, Some(n as u32));
            assert_eq!(packet.ack_num, None);
            assert_eq!(packet.checksum, compute_checksum(packet));
        }
    }

    #[test]
    fn admission_into_full_window_is_rejected() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 6);

        let result = s.admit(&mut ctx, message(6));

        assert_eq!(result, Err(SenderError::WindowFull { in_flight: 6 }));
        assert_eq!(s.stats().window_full, 1);
        assert!(ctx.sent.is_empty());
        assert_eq!(s.next_seq(), 6);
        assert!(s.send_buffer[6].is_none());
    }

    #[test]
    fn app_data_into_full_window_is_logged_and_dropped() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 6);
        ctx.logs.clear();

        s.on_app_data(&mut ctx, message(6));

        assert_eq!(s.stats().window_full, 1);
        assert!(ctx.sent.is_empty());
        assert_eq!(
            ctx.logs,
            vec!["send window is full (6 packets in flight)".to_string()]
        );
    }

    #[test]
    fn out_of_order_acks_slide_base_over_contiguous_run() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 6);

        s.on_packet(&mut ctx, ack(3));
        assert!(s.is_acked(3));
        assert_eq!(s.base(), 0);
        assert!(ctx.timer_running);
        assert_eq!(ctx.timer_stops, 0);

        s.on_packet(&mut ctx, ack(0));
        assert_eq!(s.base(), 1);
        s.on_packet(&mut ctx, ack(1));
        assert_eq!(s.base(), 2);
        s.on_packet(&mut ctx, ack(2));

        assert_eq!(s.base(), 4);
        assert!(!s.is_acked(3), "consumed flags are cleared for reuse");
        assert_eq!(s.in_flight(), 2);
        assert!(ctx.timer_running);
        assert_eq!(s.stats().new_acks, 4);
        assert!(ctx.sent.is_empty());
    }

    #[test]
    fn acking_everything_stops_the_timer() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 3);

        for n in [2, 1, 0] {
            s.on_packet(&mut ctx, ack(n));
        }

        assert_eq!(s.base(), 3);
        assert_eq!(s.in_flight(), 0);
        assert!(!ctx.timer_running);

        // The next admission finds an idle window and starts a fresh timer.
        s.admit(&mut ctx, message(3)).unwrap();
        assert!(ctx.timer_running);
    }

    #[test]
    fn duplicate_and_stale_acks_are_ignored() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 4);

        s.on_packet(&mut ctx, ack(2));
        s.on_packet(&mut ctx, ack(2));
        assert_eq!(s.stats().new_acks, 1);
        assert_eq!(s.stats().acks_received, 2);

        // Not yet sent.
        s.on_packet(&mut ctx, ack(4));
        s.on_packet(&mut ctx, ack(15));
        assert_eq!(s.stats().new_acks, 1);
        assert_eq!(s.base(), 0);

        s.on_packet(&mut ctx, ack(0));
        s.on_packet(&mut ctx, ack(1));
        assert_eq!(s.base(), 3);

        // Already slid past.
        s.on_packet(&mut ctx, ack(0));
        assert_eq!(s.stats().new_acks, 3);
        assert_eq!(s.base(), 3);
    }

    #[test]
    fn corrupted_ack_changes_nothing() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 2);

        let mut bad = ack(0);
        bad.ack_num = Some(1);
        s.on_packet(&mut ctx, bad);

        assert_eq!(s.stats().corrupted, 1);
        assert_eq!(s.stats().acks_received, 0);
        assert!(!s.is_acked(0));
        assert!(!s.is_acked(1));
        assert_eq!(s.base(), 0);
    }

    #[test]
    fn timeout_resends_only_the_base() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 6);
        s.on_packet(&mut ctx, ack(0));
        s.on_packet(&mut ctx, ack(1));
        assert_eq!(s.base(), 2);

        ctx.expire_timer();
        s.on_timer(&mut ctx);

        assert_eq!(ctx.sent.len(), 1);
        assert_eq!(ctx.sent[0].seq_num, Some(2));
        assert_eq!(ctx.sent[0].payload, message(2).data);
        assert!(ctx.timer_running);
        assert_eq!(s.stats().packets_resent, 1);
    }

    #[test]
    fn timeout_on_idle_window_is_a_no_op() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();

        s.on_timer(&mut ctx);

        assert!(ctx.sent.is_empty());
        assert!(!ctx.timer_running);
        assert_eq!(s.stats().packets_resent, 0);
    }

    #[test]
    fn window_wraps_around_the_sequence_space() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();

        // Walk the window to base 17.
        for n in 0..17u32 {
            s.admit(&mut ctx, message((n % 26) as u8)).unwrap();
            s.on_packet(&mut ctx, ack(n));
        }
        assert_eq!(s.base(), 17);
        assert!(!ctx.timer_running);
        ctx.sent.clear();

        for n in 0..6 {
            s.admit(&mut ctx, message(n)).unwrap();
        }
        let seqs: Vec<_> = ctx.sent.iter().map(|p| p.seq_num.unwrap()).collect();
        assert_eq!(seqs, vec![17, 18, 19, 0, 1, 2]);
        assert_eq!(s.in_flight(), 6);
        assert!(s.admit(&mut ctx, message(9)).is_err());

        s.on_packet(&mut ctx, ack(0));
        assert!(s.is_acked(0));
        for n in [17, 18, 19] {
            s.on_packet(&mut ctx, ack(n));
        }
        assert_eq!(s.base(), 1);
        assert_eq!(s.in_flight(), 2);

        // 17 is behind the base now.
        s.on_packet(&mut ctx, ack(17));
        assert_eq!(s.stats().new_acks, 17 + 4);
    }

    #[test]
    fn init_resets_session_state() {
        let mut s = sender();
        let mut ctx = RecordingContext::default();
        fill(&mut s, &mut ctx, 3);
        s.on_packet(&mut ctx, ack(1));

        s.init(&mut ctx);

        assert_eq!(s.base(), 0);
        assert_eq!(s.next_seq(), 0);
        assert!(!s.is_acked(1));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = ProtocolConfig {
            window_size: 8,
            seq_space: 10,
            ..Default::default()
        };
        assert!(SrSender::new(config).is_err());
    }
}
