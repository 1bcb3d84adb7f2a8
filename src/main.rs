use std::fs::File;
use std::io::{self, BufRead, Write};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::Local;
use clap::Parser;
use tracing::{info, warn};

use netpulse::config::{ConfigSource, RunConfig, resolve_config_path};
use netpulse::engine::{ProbeMode, run_cycle_with};
use netpulse::prober::ProbeSet;
use netpulse::scheduler::{Schedule, Scheduler};
use netpulse::{metrics, public_ip, report, target};

const BANNER: &str = r"
========================================
        NetPulse - Network Latency Analyzer
        ICMP / TCPing Hybrid Test Tool
========================================
";

/// Concurrent ICMP / TCP latency and loss probing over a target list
#[derive(Parser, Debug)]
#[command(name = "netpulse")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Probe mode: 1/icmp, 2/tcp, 3/hybrid (prompted when omitted)
    #[arg(short = 'm', long = "mode")]
    mode: Option<String>,

    /// JSON config file (default: $NETPULSE_CONFIG or config.json)
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Target list, overrides InputFile
    #[arg(short = 'i', long = "input")]
    input: Option<PathBuf>,

    /// Worker count, overrides Threads
    #[arg(short = 't', long = "threads")]
    threads: Option<usize>,

    /// Cron expression for recurring runs, overrides Schedule
    #[arg(short = 's', long = "schedule")]
    schedule: Option<String>,

    /// Directory for result and log files
    #[arg(short = 'o', long = "output-dir", default_value = ".")]
    output_dir: PathBuf,

    /// Log level, overrides LogLevel
    #[arg(long = "log-level")]
    log_level: Option<String>,

    /// Log to stderr instead of a log file
    #[arg(long = "log-stderr")]
    log_stderr: bool,

    /// Serve Prometheus metrics on this address
    #[arg(long = "metrics-addr")]
    metrics_addr: Option<SocketAddr>,

    /// Print the public address before probing
    #[arg(long = "show-public-ip")]
    show_public_ip: bool,
}

#[tokio::main(flavor = "multi_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config_path = resolve_config_path(args.config.clone());
    let (mut config, source) = RunConfig::load(&config_path).await?;
    apply_overrides(&mut config, &args);
    config.validate()?;
    let log_level = config.get_tracing_level()?;

    let log_file = init_tracing(&args, log_level)?;
    if source == ConfigSource::Defaults {
        warn!(path = %config_path.display(), "config file not found, using defaults");
        println!("Config file {} not found, using defaults", config_path.display());
    }

    println!("{BANNER}");
    print_config(&config, &config_path);
    info!(config = %config_path.display(), ?config, "netpulse starting");

    if args.show_public_ip {
        if let Some(ip_info) = public_ip::fetch_public_ip(public_ip::PUBLIC_IP_URL).await {
            println!("Public IP: {ip_info}\n");
        }
    }

    let mode = match &args.mode {
        Some(mode) => mode.parse::<ProbeMode>()?,
        None => prompt_mode()?,
    };
    info!(%mode, "mode selected");

    let schedule = Schedule::parse(config.schedule.as_deref())?;

    if let Some(addr) = args.metrics_addr {
        tokio::spawn(metrics::serve_metrics(addr));
    }

    let probers = ProbeSet::native();
    let output_dir = args.output_dir.clone();

    Scheduler::new(schedule)
        .run(|| {
            let config = config.clone();
            let probers = probers.clone();
            let output_dir = output_dir.clone();
            async move { run_once(&config, mode, &probers, &output_dir).await }
        })
        .await?;

    if let Some(path) = log_file {
        println!("Log: {}", path.display());
    }
    Ok(())
}

/// One full cycle: read targets, probe, persist, publish.
async fn run_once(
    config: &RunConfig,
    mode: ProbeMode,
    probers: &ProbeSet,
    output_dir: &Path,
) -> anyhow::Result<()> {
    let targets = target::load_targets(&config.input_path)
        .await
        .with_context(|| format!("reading targets from {}", config.input_path.display()))?;
    info!(count = targets.len(), "targets loaded");

    let report = run_cycle_with(&targets, config, mode, probers, |outcome| {
        println!("{outcome}");
    })
    .await?;

    let path = report::persist(&report, output_dir, &Local::now()).await?;
    metrics::record_report(&report);

    println!("\n{}", report.summary());
    println!("Results saved to: {}", path.display());
    Ok(())
}

fn apply_overrides(config: &mut RunConfig, args: &Args) {
    if let Some(input) = &args.input {
        config.input_path = input.clone();
    }
    if let Some(threads) = args.threads {
        config.max_concurrency = threads;
    }
    if let Some(schedule) = &args.schedule {
        config.schedule = Some(schedule.clone());
    }
    if let Some(level) = &args.log_level {
        config.log_level = level.clone();
    }
}

/// Logs go to `NetPulse_log_<ts>.log` unless `--log-stderr` is given.
fn init_tracing(args: &Args, level: tracing::Level) -> anyhow::Result<Option<PathBuf>> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("netpulse={}", level.as_str().to_lowercase()).parse()?);

    if args.log_stderr {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        return Ok(None);
    }

    std::fs::create_dir_all(&args.output_dir)?;
    let path = args.output_dir.join(format!(
        "NetPulse_log_{}.log",
        Local::now().format("%Y%m%d_%H%M%S")
    ));
    let file = File::create(&path).with_context(|| format!("creating log file {}", path.display()))?;

    // Mutex serializes writes from concurrent probe tasks.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(Some(path))
}

fn print_config(config: &RunConfig, path: &Path) {
    println!("=== NetPulse configuration ({}) ===", path.display());
    println!("PingCount      = {}", config.icmp_sample_count);
    println!("TcpingCount    = {}", config.tcp_sample_count);
    println!("DefaultTCPPort = {}", config.default_tcp_port);
    println!("Threads        = {}", config.max_concurrency);
    println!("InputFile      = {}", config.input_path.display());
    if let Some(schedule) = &config.schedule {
        println!("Schedule       = {}", schedule);
    }
    println!("===================================\n");
}

fn prompt_mode() -> anyhow::Result<ProbeMode> {
    for mode in ProbeMode::ALL {
        println!("[{}] {}", mode.menu_key(), mode.description());
    }
    print!("Select probe mode: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.parse::<ProbeMode>()?)
}
