//! Loads TOML scenarios, drives them through the simulator and grades the outcome.

use anyhow::{Context, Result};
use sr_lab_abstract::{
    Message, ProtocolConfig, SimConfig, TestAction, TestAssertion, TestScenario,
    TransportProtocol,
};
use std::fs;
use std::path::Path;
use tracing::info;

use crate::engine::Simulator;
use crate::trace::SimulationReport;

pub fn load_scenario(path: &Path) -> Result<TestScenario> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read scenario file {}", path.display()))?;
    parse_scenario(&content)
        .with_context(|| format!("Failed to parse scenario file {}", path.display()))
}

pub fn parse_scenario(content: &str) -> Result<TestScenario> {
    Ok(toml::from_str(content)?)
}

/// Protocol parameters for `scenario`: defaults plus the scenario's `[protocol]` table.
pub fn protocol_config(scenario: &TestScenario) -> Result<ProtocolConfig> {
    let mut config = ProtocolConfig::default();
    scenario.protocol.apply_to(&mut config);
    config
        .validate()
        .with_context(|| format!("Scenario '{}' has invalid protocol parameters", scenario.name))?;
    Ok(config)
}

/// Build a simulator with the scenario's channel overrides and scheduled actions.
pub fn build_simulator(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<Simulator> {
    let mut config = SimConfig::default();
    scenario.config.apply_to(&mut config);
    let mut sim = Simulator::new(config, sender, receiver);
    configure_actions(&mut sim, &scenario.actions)?;
    Ok(sim)
}

pub fn configure_actions(sim: &mut Simulator, actions: &[TestAction]) -> Result<()> {
    for action in actions {
        match action {
            TestAction::AppSend { time, data } => {
                let message = Message::from_bytes(data.as_bytes())
                    .with_context(|| format!("Invalid app_send payload {data:?}"))?;
                sim.schedule_app_send(*time, message);
            }
            TestAction::AppSendBurst {
                start,
                interval,
                count,
            } => {
                for k in 0..*count {
                    let letter = b'a' + (k % 26) as u8;
                    sim.schedule_app_send(
                        start + u64::from(k) * interval,
                        Message::filled(letter),
                    );
                }
            }
            TestAction::DropNextFromSenderSeq { seq } => sim.add_drop_sender_seq_once(*seq),
            TestAction::DropNextFromReceiverAck { ack } => sim.add_drop_receiver_ack_once(*ack),
            TestAction::CorruptNextFromSenderSeq { seq } => {
                sim.add_corrupt_sender_seq_once(*seq)
            }
            TestAction::CorruptNextFromReceiverAck { ack } => {
                sim.add_corrupt_receiver_ack_once(*ack)
            }
        }
    }
    Ok(())
}

/// Run `scenario` to completion and fail if any assertion does not hold.
pub fn run(
    scenario: &TestScenario,
    sender: Box<dyn TransportProtocol>,
    receiver: Box<dyn TransportProtocol>,
) -> Result<SimulationReport> {
    info!("Running scenario '{}'", scenario.name);
    let mut sim = build_simulator(scenario, sender, receiver)?;
    sim.run_until_complete();
    let report = sim.export_report();
    check_assertions(scenario, &report)?;
    info!("Scenario '{}' passed", scenario.name);
    Ok(report)
}

pub fn check_assertions(scenario: &TestScenario, report: &SimulationReport) -> Result<()> {
    let failures: Vec<String> = scenario
        .assertions
        .iter()
        .filter_map(|assertion| check(assertion, report).err())
        .collect();
    if failures.is_empty() {
        return Ok(());
    }
    anyhow::bail!(
        "Scenario '{}' failed {} assertion(s):\n  {}",
        scenario.name,
        failures.len(),
        failures.join("\n  ")
    )
}

fn within(value: u32, min: u32, max: Option<u32>) -> bool {
    value >= min && max.is_none_or(|max| value <= max)
}

fn check(assertion: &TestAssertion, report: &SimulationReport) -> Result<(), String> {
    match assertion {
        TestAssertion::DataDelivered { data } => {
            let expected = Message::from_bytes(data.as_bytes()).map_err(|e| e.to_string())?;
            if report
                .delivered_data
                .iter()
                .any(|d| d.as_slice() == expected.as_bytes())
            {
                Ok(())
            } else {
                Err(format!("data {data:?} was never delivered"))
            }
        }
        TestAssertion::DeliveredInOrder => delivered_in_order(report),
        TestAssertion::SenderPacketCount { min, max } => {
            if within(report.sender_packet_count, *min, *max) {
                Ok(())
            } else {
                Err(format!(
                    "sender sent {} packets, expected {min}..={max:?}",
                    report.sender_packet_count
                ))
            }
        }
        TestAssertion::Retransmissions { min, max } => {
            let resent = report.sender_stats.packets_resent;
            if within(resent, *min, *max) {
                Ok(())
            } else {
                Err(format!(
                    "sender retransmitted {resent} packets, expected {min}..={max:?}"
                ))
            }
        }
        TestAssertion::NoTimerViolations => match report.timer_violations {
            0 => Ok(()),
            n => Err(format!("{n} timer start/stop violations")),
        },
        TestAssertion::MaxDuration { ticks } => {
            if report.duration <= *ticks {
                Ok(())
            } else {
                Err(format!(
                    "simulation ran for {} ticks, limit {ticks}",
                    report.duration
                ))
            }
        }
    }
}

/// Every message the sender accepted must reach the application exactly once, in
/// acceptance order. Messages refused by a full window are expected to be missing.
pub fn delivered_in_order(report: &SimulationReport) -> Result<(), String> {
    let accepted = &report.accepted_messages;
    let delivered = &report.delivered_data;
    if let Some(n) = accepted
        .iter()
        .zip(delivered)
        .position(|(sent, got)| sent != got)
    {
        return Err(format!(
            "delivery #{n} does not match accepted message #{n}: duplicated, reordered or lost"
        ));
    }
    if delivered.len() != accepted.len() {
        return Err(format!(
            "{} messages delivered, expected {} ({} submitted, {} rejected)",
            delivered.len(),
            accepted.len(),
            report.app_messages.len(),
            report.sender_stats.window_full
        ));
    }
    Ok(())
}
