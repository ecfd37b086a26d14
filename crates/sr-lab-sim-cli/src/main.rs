use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{Level, info, warn};

use sr_lab_abstract::{ProtocolConfig, SimConfig, TestScenario, TransportProtocol};
use sr_lab_simulator::{SimulationReport, Simulator, scenario_runner};

#[derive(Parser, Debug)]
#[command(author, version, about = "Selective-Repeat ARQ over a simulated unreliable link")]
struct Args {
    /// Run a scenario file instead of a generated message stream.
    #[arg(long)]
    scenario: Option<PathBuf>,

    /// Number of messages the application generates.
    #[arg(long, default_value_t = 20)]
    messages: u32,

    /// Probability that a packet is lost.
    #[arg(long, default_value_t = 0.0)]
    loss: f64,

    /// Probability that a packet is corrupted.
    #[arg(long, default_value_t = 0.0)]
    corrupt: f64,

    /// Mean ticks between application messages.
    #[arg(long, default_value_t = 10)]
    interval: u64,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Keep each direction of the link in order.
    #[arg(long, default_value_t = false)]
    fifo: bool,

    /// Send window size; overrides the scenario's value.
    #[arg(long)]
    window: Option<u32>,

    /// Sequence space size; overrides the scenario's value.
    #[arg(long)]
    seq_space: Option<u32>,

    /// Retransmission timeout in ticks; overrides the scenario's value.
    #[arg(long)]
    timeout: Option<u64>,

    /// Give up on a generated run after this many ticks.
    #[arg(long, default_value_t = 1_000_000)]
    max_time: u64,

    /// Write a JSON trace of the finished simulation.
    #[arg(long)]
    trace_out: Option<PathBuf>,

    #[arg(long, default_value_t = Level::INFO)]
    log_level: Level,
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.log_level)
        .init();
    info!("sr-lab-sim-cli starting…");

    let report = if let Some(path) = &args.scenario {
        let scenario = scenario_runner::load_scenario(path)?;
        run_scenario(&args, &scenario)?
    } else {
        run_generated(&args)?
    };

    print_summary(&report);

    if let Some(trace_path) = &args.trace_out {
        write_trace(trace_path, &report)?;
    }

    Ok(())
}

impl Args {
    fn protocol_config(&self, mut config: ProtocolConfig) -> Result<ProtocolConfig> {
        if let Some(v) = self.window {
            config.window_size = v;
        }
        if let Some(v) = self.seq_space {
            config.seq_space = v;
        }
        if let Some(v) = self.timeout {
            config.timeout = v;
        }
        config.validate().context("Invalid protocol parameters")?;
        Ok(config)
    }

    fn sim_config(&self) -> SimConfig {
        SimConfig {
            loss_rate: self.loss,
            corrupt_rate: self.corrupt,
            seed: self.seed,
            fifo: self.fifo,
            ..Default::default()
        }
    }
}

fn build_pair(
    config: ProtocolConfig,
) -> Result<(Box<dyn TransportProtocol>, Box<dyn TransportProtocol>)> {
    Ok((
        sr_lab_protocol::sender(config)?,
        sr_lab_protocol::receiver(config)?,
    ))
}

fn run_scenario(args: &Args, scenario: &TestScenario) -> Result<SimulationReport> {
    let config = args.protocol_config(scenario_runner::protocol_config(scenario)?)?;
    let (sender, receiver) = build_pair(config)?;
    scenario_runner::run(scenario, sender, receiver)
}

fn run_generated(args: &Args) -> Result<SimulationReport> {
    let config = args.protocol_config(ProtocolConfig::default())?;
    let (sender, receiver) = build_pair(config)?;
    let mut sim = Simulator::new(args.sim_config(), sender, receiver);
    sim.schedule_message_stream(0, args.messages, args.interval);

    info!(
        "Simulating {} messages (loss {}, corruption {}, window {}, sequence space {})",
        args.messages, args.loss, args.corrupt, config.window_size, config.seq_space
    );
    if !sim.run_until(args.max_time) {
        warn!(
            "Stopped at tick {} with {} events pending",
            sim.current_time(),
            sim.remaining_events()
        );
    }
    let report = sim.export_report();
    if let Err(reason) = scenario_runner::delivered_in_order(&report) {
        anyhow::bail!("Delivery check failed: {reason}");
    }
    Ok(report)
}

fn print_summary(report: &SimulationReport) {
    let sender = &report.sender_stats;
    let receiver = &report.receiver_stats;
    info!(
        "Simulation finished at tick {} | messages from application: {} | window full: {}",
        report.duration,
        report.app_messages.len(),
        sender.window_full
    );
    info!(
        "Sender: packets sent: {} | ACKs received: {} | new ACKs: {} | resent: {} | corrupted ACKs: {}",
        report.sender_packet_count,
        sender.acks_received,
        sender.new_acks,
        sender.packets_resent,
        sender.corrupted
    );
    info!(
        "Receiver: packets received: {} | corrupted: {} | delivered to application: {}",
        receiver.packets_received, receiver.corrupted, receiver.delivered
    );
    if report.timer_violations > 0 {
        warn!("{} timer violations recorded", report.timer_violations);
    }
}

fn write_trace(path: &Path, report: &SimulationReport) -> Result<()> {
    let data = serde_json::to_vec_pretty(report).context("Failed to serialize simulation trace")?;
    fs::write(path, &data)
        .with_context(|| format!("Failed to write trace file {}", path.display()))?;
    Ok(())
}
