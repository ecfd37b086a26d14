use serde::Serialize;
use sr_lab_abstract::{ProtocolStats, SimConfig};
use std::collections::HashMap;

use crate::engine::LinkEventSummary;

#[derive(Debug, Clone, Serialize)]
pub struct SimulationReport {
    pub config: SimConfig,
    pub duration: u64,
    /// Messages handed to the sender by the application, in submission order.
    pub app_messages: Vec<Vec<u8>>,
    /// Messages the sender took into its window, in submission order.
    pub accepted_messages: Vec<Vec<u8>>,
    pub delivered_data: Vec<Vec<u8>>,
    pub sender_packet_count: u32,
    pub sender_stats: ProtocolStats,
    pub receiver_stats: ProtocolStats,
    pub timer_violations: u32,
    pub metrics: HashMap<String, Vec<(u64, f64)>>,
    pub link_events: Vec<LinkEventSummary>,
}
