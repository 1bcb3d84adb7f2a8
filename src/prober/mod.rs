use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::RunConfig;

pub mod icmp;
pub mod tcp;

/// Which strategy a target was probed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Icmp,
    Tcp(u16),
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Icmp => f.write_str("ICMP"),
            Protocol::Tcp(port) => write!(f, "TCP:{}", port),
        }
    }
}

/// Average round-trip time, or `Timeout` when nothing answered.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Latency {
    Millis(f64),
    Timeout,
}

impl Latency {
    pub fn as_millis(&self) -> Option<f64> {
        match self {
            Latency::Millis(ms) => Some(*ms),
            Latency::Timeout => None,
        }
    }
}

impl fmt::Display for Latency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Latency::Millis(ms) => write!(f, "{:.1}", ms),
            Latency::Timeout => f.write_str("Timeout"),
        }
    }
}

/// Packet/connect loss in percent, rounded to one decimal place.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct LossPercent(f64);

impl LossPercent {
    pub const NONE: LossPercent = LossPercent(0.0);
    pub const ALL: LossPercent = LossPercent(100.0);

    pub fn new(percent: f64) -> Self {
        let clamped = percent.clamp(0.0, 100.0);
        Self((clamped * 10.0).round() / 10.0)
    }

    /// `failed` out of `attempted`, as a percentage.
    pub fn from_ratio(failed: usize, attempted: usize) -> Self {
        if attempted == 0 {
            return Self::ALL;
        }
        Self::new(100.0 * failed as f64 / attempted as f64)
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl fmt::Display for LossPercent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.fract() == 0.0 {
            write!(f, "{:.0}%", self.0)
        } else {
            write!(f, "{:.1}%", self.0)
        }
    }
}

/// A strategy's reduced result for one target.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeStats {
    pub latency: Latency,
    pub loss: LossPercent,
}

impl ProbeStats {
    pub fn new(latency: Latency, loss: LossPercent) -> Self {
        Self { latency, loss }
    }

    /// The `(Timeout, 100%)` sentinel every failure collapses into.
    pub fn unreachable() -> Self {
        Self::new(Latency::Timeout, LossPercent::ALL)
    }

    /// Reduce per-sample results to average latency and loss.
    ///
    /// `expected` is the configured sample count and is the loss
    /// denominator; samples that were never taken count as lost.
    pub fn from_samples(samples: &[Option<Duration>], expected: u32) -> Self {
        let attempted = samples.len().max(expected as usize);
        let rtts: Vec<f64> = samples
            .iter()
            .flatten()
            .map(|d| d.as_micros() as f64 / 1000.0)
            .collect();

        if rtts.is_empty() {
            return Self::unreachable();
        }

        let avg = rtts.iter().sum::<f64>() / rtts.len() as f64;
        Self::new(
            Latency::Millis(avg),
            LossPercent::from_ratio(attempted - rtts.len(), attempted),
        )
    }
}

/// Sends ICMP echo requests to one host.
///
/// Implementations must never fail: every error becomes
/// [`ProbeStats::unreachable`].
#[async_trait]
pub trait IcmpProber: Send + Sync {
    async fn probe(&self, host: &str, config: &RunConfig) -> ProbeStats;
}

/// Opens TCP connections to one host and port.
#[async_trait]
pub trait TcpProber: Send + Sync {
    async fn probe(&self, host: &str, port: u16, config: &RunConfig) -> ProbeStats;
}

/// The pair of strategies the engine dispatches to.
#[derive(Clone)]
pub struct ProbeSet {
    pub icmp: Arc<dyn IcmpProber>,
    pub tcp: Arc<dyn TcpProber>,
}

impl ProbeSet {
    pub fn new(icmp: Arc<dyn IcmpProber>, tcp: Arc<dyn TcpProber>) -> Self {
        Self { icmp, tcp }
    }

    /// surge-ping for ICMP, tokio connect for TCP.
    pub fn native() -> Self {
        Self::new(Arc::new(icmp::SurgeIcmpProber), Arc::new(tcp::ConnectTcpProber))
    }
}

impl fmt::Debug for ProbeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProbeSet").finish_non_exhaustive()
    }
}
