use crate::trace::SimulationReport;
use rand::Rng;
use serde::Serialize;
use sr_lab_abstract::{Message, Packet, SimConfig};
use sr_lab_abstract::{SystemContext, TransportProtocol};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use tracing::{debug, info, warn};

/// Value written into a header field by the channel's field corruption.
const GARBAGE_FIELD: u32 = 999_999;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeId {
    Sender,
    Receiver,
}

impl NodeId {
    pub fn peer(&self) -> Self {
        match self {
            NodeId::Sender => NodeId::Receiver,
            NodeId::Receiver => NodeId::Sender,
        }
    }
}

#[derive(Debug)]
pub enum EventType {
    PacketArrival { to: NodeId, packet: Packet },
    TimerExpiry { node: NodeId, generation: u64 },
    AppSend { message: Message },
}

#[derive(Debug)]
struct Event {
    time: u64,
    event_type: EventType,
    id: u64, // Unique ID to differentiate events at same time
}

// Custom Ord for Min-Heap (smallest time pops first)
impl PartialEq for Event {
    fn eq(&self, other: &Self) -> bool {
        self.time == other.time && self.id == other.id
    }
}

impl Eq for Event {}

impl PartialOrd for Event {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Event {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reverse comparison for time: smallest time is Greater in BinaryHeap
        other
            .time
            .cmp(&self.time)
            .then_with(|| other.id.cmp(&self.id))
    }
}

/// A compact textual summary of important link-layer events.
#[derive(Debug, Clone, Serialize)]
pub struct LinkEventSummary {
    pub time: u64,
    pub description: String,
}

#[derive(Debug, Clone, Copy)]
enum TimerOp {
    Start(u64),
    Stop,
}

/// Per-entity timer. A pending expiry only fires if its generation is current.
#[derive(Debug, Default, Clone, Copy)]
struct TimerState {
    running: bool,
    generation: u64,
}

/// Actions buffered during one handler invocation
#[derive(Default)]
struct ActionBuffer {
    outgoing_packets: Vec<Packet>,
    timer_ops: Vec<TimerOp>,
    logs: Vec<String>,
    delivered_data: Vec<Vec<u8>>,
    metrics: Vec<(String, f64)>,
}

/// Context implementation passed to the protocol entity
struct ScopedContext<'a> {
    buffer: &'a mut ActionBuffer,
    now: u64,
}

impl<'a> SystemContext for ScopedContext<'a> {
    fn send_packet(&mut self, packet: Packet) {
        self.buffer.outgoing_packets.push(packet);
    }

    fn start_timer(&mut self, delay: u64) {
        self.buffer.timer_ops.push(TimerOp::Start(delay));
    }

    fn stop_timer(&mut self) {
        self.buffer.timer_ops.push(TimerOp::Stop);
    }

    fn deliver_data(&mut self, data: &[u8]) {
        self.buffer.delivered_data.push(data.to_vec());
    }

    fn log(&mut self, message: &str) {
        self.buffer.logs.push(message.to_string());
    }

    fn now(&self) -> u64 {
        self.now
    }

    fn record_metric(&mut self, name: &str, value: f64) {
        self.buffer.metrics.push((name.to_string(), value));
    }
}

fn field(value: Option<u32>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}

/// Remove the first entry equal to `value`; `true` if one was found.
fn take_once(list: &mut Vec<u32>, value: Option<u32>) -> bool {
    let Some(value) = value else {
        return false;
    };
    match list.iter().position(|v| *v == value) {
        Some(pos) => {
            list.remove(pos);
            true
        }
        None => false,
    }
}

pub struct Simulator {
    time: u64,
    event_queue: BinaryHeap<Event>,
    event_id_counter: u64,

    config: SimConfig,
    rng: rand::rngs::StdRng,

    pub sender: Box<dyn TransportProtocol>,
    pub receiver: Box<dyn TransportProtocol>,

    pub app_messages: Vec<Vec<u8>>,
    /// The subset of `app_messages` the sender did not refuse as window-full.
    pub accepted_messages: Vec<Vec<u8>>,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,

    /// Starts of a running timer plus stops of an idle one.
    pub timer_violations: u32,

    /// Arbitrary time-series metrics recorded via `SystemContext::record_metric`
    /// Key: metric name (e.g., "in_flight"), Value: Vec<(time, value)>
    pub metrics: HashMap<String, Vec<(u64, f64)>>,

    // Deterministic fault injection, each entry consumed by the first matching packet
    drop_sender_seq_once: Vec<u32>,
    drop_receiver_ack_once: Vec<u32>,
    corrupt_sender_seq_once: Vec<u32>,
    corrupt_receiver_ack_once: Vec<u32>,

    /// Timeline of link events (drops, corruptions, sends, deliveries).
    pub link_events: Vec<LinkEventSummary>,

    timers: HashMap<NodeId, TimerState>,

    /// Latest scheduled arrival per destination, for FIFO channels.
    last_arrival: HashMap<NodeId, u64>,
}

impl Simulator {
    pub fn new(
        config: SimConfig,
        sender: Box<dyn TransportProtocol>,
        receiver: Box<dyn TransportProtocol>,
    ) -> Self {
        use rand::SeedableRng;
        let rng = rand::rngs::StdRng::seed_from_u64(config.seed);

        Self {
            time: 0,
            event_queue: BinaryHeap::new(),
            event_id_counter: 0,
            config,
            rng,
            sender,
            receiver,
            app_messages: Vec::new(),
            accepted_messages: Vec::new(),
            delivered_data: Vec::new(),
            sender_packet_count: 0,
            timer_violations: 0,
            metrics: HashMap::new(),
            drop_sender_seq_once: Vec::new(),
            drop_receiver_ack_once: Vec::new(),
            corrupt_sender_seq_once: Vec::new(),
            corrupt_receiver_ack_once: Vec::new(),
            link_events: Vec::new(),
            timers: HashMap::new(),
            last_arrival: HashMap::new(),
        }
    }

    /// Register a deterministic fault: drop the first packet sent by Sender whose seq equals `seq`.
    pub fn add_drop_sender_seq_once(&mut self, seq: u32) {
        self.drop_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: drop the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_drop_receiver_ack_once(&mut self, ack: u32) {
        self.drop_receiver_ack_once.push(ack);
    }

    /// Register a deterministic fault: corrupt the first packet sent by Sender whose seq equals `seq`.
    pub fn add_corrupt_sender_seq_once(&mut self, seq: u32) {
        self.corrupt_sender_seq_once.push(seq);
    }

    /// Register a deterministic fault: corrupt the first ACK sent by Receiver whose ack equals `ack`.
    pub fn add_corrupt_receiver_ack_once(&mut self, ack: u32) {
        self.corrupt_receiver_ack_once.push(ack);
    }

    /// Return a slice of (time, value) samples for a named metric, if present.
    pub fn metric_series(&self, name: &str) -> Option<&[(u64, f64)]> {
        self.metrics.get(name).map(|v| v.as_slice())
    }

    /// Whether `node`'s timer is currently armed.
    pub fn timer_running(&self, node: NodeId) -> bool {
        self.timers.get(&node).is_some_and(|t| t.running)
    }

    fn push_event(&mut self, time: u64, event_type: EventType) {
        self.event_queue.push(Event {
            time,
            event_type,
            id: self.event_id_counter,
        });
        self.event_id_counter += 1;
    }

    pub fn schedule_app_send(&mut self, time: u64, message: Message) {
        self.push_event(time, EventType::AppSend { message });
    }

    /// Schedule `count` generated messages starting at `start`.
    ///
    /// Message `k` is twenty copies of `'a' + k mod 26`; gaps between messages are
    /// uniform in `[0, 2 * mean_interval]`.
    pub fn schedule_message_stream(&mut self, start: u64, count: u32, mean_interval: u64) {
        let mut time = start;
        for k in 0..count {
            let letter = b'a' + (k % 26) as u8;
            self.schedule_app_send(time, Message::filled(letter));
            let gap = self.rng.random_range(0..=mean_interval.saturating_mul(2));
            time = time.saturating_add(gap);
        }
    }

    pub fn init(&mut self) {
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.sender.init(&mut ctx);
            self.process_actions(NodeId::Sender, buffer);
        }
        {
            let mut buffer = ActionBuffer::default();
            let mut ctx = ScopedContext {
                buffer: &mut buffer,
                now: self.time,
            };
            self.receiver.init(&mut ctx);
            self.process_actions(NodeId::Receiver, buffer);
        }
    }

    pub fn peek_next_event_time(&self) -> Option<u64> {
        self.event_queue.peek().map(|e| e.time)
    }

    pub fn current_time(&self) -> u64 {
        self.time
    }

    pub fn remaining_events(&self) -> usize {
        self.event_queue.len()
    }

    fn node_mut(&mut self, node: NodeId) -> &mut dyn TransportProtocol {
        match node {
            NodeId::Sender => self.sender.as_mut(),
            NodeId::Receiver => self.receiver.as_mut(),
        }
    }

    /// Process the next event. Returns true if an event was processed, false if queue is empty.
    pub fn step(&mut self) -> bool {
        let event = match self.event_queue.pop() {
            Some(e) => e,
            None => return false,
        };

        // Stale expiries are discarded without advancing the clock.
        if let EventType::TimerExpiry { node, generation } = event.event_type {
            let timer = self.timers.get(&node).copied().unwrap_or_default();
            if !timer.running || timer.generation != generation {
                debug!("Skipping stale timer event for {:?}", node);
                return true; // Event processed (by being ignored)
            }
        }

        self.time = event.time;
        debug!("Processing event at {}: {:?}", self.time, event.event_type);

        let now = self.time;
        let mut buffer = ActionBuffer::default();
        let node = match event.event_type {
            EventType::PacketArrival { to, packet } => {
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now,
                };
                self.node_mut(to).on_packet(&mut ctx, packet);
                to
            }
            EventType::TimerExpiry { node, .. } => {
                self.timers.entry(node).or_default().running = false;

                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now,
                };
                self.node_mut(node).on_timer(&mut ctx);
                node
            }
            EventType::AppSend { message } => {
                self.app_messages.push(message.data.to_vec());
                let refused_before = self.sender.stats().window_full;
                let mut ctx = ScopedContext {
                    buffer: &mut buffer,
                    now,
                };
                self.sender.on_app_data(&mut ctx, message);
                if self.sender.stats().window_full == refused_before {
                    self.accepted_messages.push(message.data.to_vec());
                }
                NodeId::Sender
            }
        };
        self.process_actions(node, buffer);
        true
    }

    /// Produce a serializable snapshot of the current simulation state.
    pub fn export_report(&self) -> SimulationReport {
        SimulationReport {
            config: self.config.clone(),
            duration: self.time,
            app_messages: self.app_messages.clone(),
            accepted_messages: self.accepted_messages.clone(),
            delivered_data: self.delivered_data.clone(),
            sender_packet_count: self.sender_packet_count,
            sender_stats: self.sender.stats(),
            receiver_stats: self.receiver.stats(),
            timer_violations: self.timer_violations,
            metrics: self.metrics.clone(),
            link_events: self.link_events.clone(),
        }
    }

    pub fn run_until_complete(&mut self) {
        self.init();
        while self.step() {}
    }

    /// Like [`run_until_complete`](Self::run_until_complete) but stops before the first
    /// event scheduled after `horizon`. Returns `true` if the queue drained.
    pub fn run_until(&mut self, horizon: u64) -> bool {
        self.init();
        while let Some(next) = self.peek_next_event_time() {
            if next > horizon {
                return false;
            }
            self.step();
        }
        true
    }

    fn apply_timer_op(&mut self, node: NodeId, op: TimerOp) {
        let timer = self.timers.entry(node).or_default();
        match op {
            TimerOp::Start(delay) => {
                if timer.running {
                    warn!("[{:?}] started its timer while it was already running", node);
                    self.timer_violations += 1;
                }
                timer.running = true;
                timer.generation += 1;
                let generation = timer.generation;
                self.push_event(
                    self.time.saturating_add(delay),
                    EventType::TimerExpiry { node, generation },
                );
            }
            TimerOp::Stop => {
                if !timer.running {
                    warn!("[{:?}] stopped its timer while it was not running", node);
                    self.timer_violations += 1;
                }
                timer.running = false;
                timer.generation += 1;
            }
        }
    }

    fn latency(&mut self) -> u64 {
        let (min, max) = (self.config.min_latency, self.config.max_latency);
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    fn corrupt(&mut self, packet: &mut Packet) {
        let x: f64 = self.rng.random();
        if x < 0.75 {
            packet.payload[0] = !packet.payload[0];
        } else if x < 0.875 {
            packet.seq_num = Some(GARBAGE_FIELD);
        } else {
            packet.ack_num = Some(GARBAGE_FIELD);
        }
    }

    fn process_actions(&mut self, source_node: NodeId, buffer: ActionBuffer) {
        for (name, value) in buffer.metrics {
            self.metrics
                .entry(name)
                .or_default()
                .push((self.time, value));
        }

        for log in buffer.logs {
            info!("[{:?}] {}", source_node, log);
        }

        for data in buffer.delivered_data {
            info!("[{:?}] DELIVERED DATA: {} bytes", source_node, data.len());
            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}] DELIVERED {} bytes to application",
                    source_node,
                    data.len()
                ),
            });
            self.delivered_data.push(data);
        }

        for op in buffer.timer_ops {
            self.apply_timer_op(source_node, op);
        }

        // Packet transmission logic (Channel)
        let target_node = source_node.peer();
        for mut packet in buffer.outgoing_packets {
            let (dropped, corrupted) = match source_node {
                NodeId::Sender => {
                    self.sender_packet_count += 1;
                    (
                        take_once(&mut self.drop_sender_seq_once, packet.seq_num),
                        take_once(&mut self.corrupt_sender_seq_once, packet.seq_num),
                    )
                }
                NodeId::Receiver => (
                    take_once(&mut self.drop_receiver_ack_once, packet.ack_num),
                    take_once(&mut self.corrupt_receiver_ack_once, packet.ack_num),
                ),
            };

            if dropped {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] DROP (deterministic) seq={} ack={}",
                        source_node,
                        target_node,
                        field(packet.seq_num),
                        field(packet.ack_num)
                    ),
                });
                debug!("Deterministically dropping {:?} packet", source_node);
                continue;
            }

            // 1. Check Loss
            if self.rng.random::<f64>() < self.config.loss_rate {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] DROP (random loss) seq={} ack={}",
                        source_node,
                        target_node,
                        field(packet.seq_num),
                        field(packet.ack_num)
                    ),
                });
                debug!("Packet lost in channel");
                continue;
            }

            // 2. Check Corruption
            let random_corruption =
                !corrupted && self.rng.random::<f64>() < self.config.corrupt_rate;
            if corrupted || random_corruption {
                self.link_events.push(LinkEventSummary {
                    time: self.time,
                    description: format!(
                        "[{:?}->{:?}] CORRUPT seq={} ack={}",
                        source_node,
                        target_node,
                        field(packet.seq_num),
                        field(packet.ack_num)
                    ),
                });
                debug!("Packet corrupted in channel");
                if corrupted {
                    packet.payload[0] = !packet.payload[0];
                } else {
                    self.corrupt(&mut packet);
                }
            }

            // 3. Calculate Latency
            let mut arrival_time = self.time.saturating_add(self.latency());
            if self.config.fifo {
                let last = self.last_arrival.entry(target_node).or_insert(0);
                arrival_time = arrival_time.max(*last);
                *last = arrival_time;
            }

            self.link_events.push(LinkEventSummary {
                time: self.time,
                description: format!(
                    "[{:?}->{:?}] SEND seq={} ack={} (arrives at {})",
                    source_node,
                    target_node,
                    field(packet.seq_num),
                    field(packet.ack_num),
                    arrival_time
                ),
            });

            self.push_event(
                arrival_time,
                EventType::PacketArrival {
                    to: target_node,
                    packet,
                },
            );
        }
    }
}
