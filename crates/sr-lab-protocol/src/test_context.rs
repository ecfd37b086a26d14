use sr_lab_abstract::{Packet, SystemContext};

/// Records every action an entity takes and enforces the single-timer discipline.
#[derive(Default)]
pub struct RecordingContext {
    pub sent: Vec<Packet>,
    pub delivered: Vec<Vec<u8>>,
    pub logs: Vec<String>,
    pub timer_running: bool,
    pub timer_starts: u32,
    pub timer_stops: u32,
}

impl RecordingContext {
    /// Simulate the timer firing.
    pub fn expire_timer(&mut self) {
        assert!(self.timer_running, "expired a timer that was not running");
        self.timer_running = false;
    }
}

impl SystemContext for RecordingContext {
    fn send_packet(&mut self, packet: Packet) {
        self.sent.push(packet);
    }

    fn start_timer(&mut self, _delay: u64) {
        assert!(!self.timer_running, "timer started while already running");
        self.timer_running = true;
        self.timer_starts += 1;
    }

    fn stop_timer(&mut self) {
        assert!(self.timer_running, "stopped a timer that was not running");
        self.timer_running = false;
        self.timer_stops += 1;
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.delivered.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        0
    }
}
