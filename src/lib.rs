//! NetPulse: concurrent ICMP / TCP latency and loss probing over a target list.
//!
//! The probe cycle is `target list -> engine (per-target strategy) -> ordered
//! report`. Scheduling, config loading and file output sit around it.

pub mod config;
pub mod engine;
pub mod error;
pub mod metrics;
pub mod prober;
pub mod public_ip;
pub mod report;
pub mod scheduler;
pub mod target;
pub mod util;

pub use config::RunConfig;
pub use engine::{ProbeMode, route, run_cycle, run_cycle_with};
pub use error::{ConfigError, ProbeError, RunError};
pub use prober::{IcmpProber, Latency, LossPercent, ProbeSet, ProbeStats, Protocol, TcpProber};
pub use report::{ProbeOutcome, Report, Summary};
pub use target::{Target, parse_targets};
