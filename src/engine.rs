//! Bounded fan-out / fan-in over the target list.
//!
//! Every target gets its own task; a semaphore caps how many probe at once.
//! Each task owns the result slot at its target's index, so the report keeps
//! input order no matter which probe finishes first.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::config::RunConfig;
use crate::error::{ConfigError, RunError};
use crate::prober::{ProbeSet, ProbeStats, Protocol};
use crate::report::{ProbeOutcome, Report};
use crate::target::Target;

/// Slack on top of a strategy's own budget before the engine gives up on it.
const HARD_LIMIT_GRACE: Duration = Duration::from_secs(1);

/// How targets are mapped onto probe strategies for a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeMode {
    /// ICMP echo for every target.
    Icmp,
    /// TCP connect for every target, on its own port or the default one.
    Tcp,
    /// TCP when the target names a port, ICMP otherwise.
    Hybrid,
}

impl ProbeMode {
    pub const ALL: [ProbeMode; 3] = [ProbeMode::Icmp, ProbeMode::Tcp, ProbeMode::Hybrid];

    /// Menu number used by the interactive prompt.
    pub fn menu_key(&self) -> &'static str {
        match self {
            ProbeMode::Icmp => "1",
            ProbeMode::Tcp => "2",
            ProbeMode::Hybrid => "3",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ProbeMode::Icmp => "ICMP (ping)",
            ProbeMode::Tcp => "TCP (tcping)",
            ProbeMode::Hybrid => "Hybrid (tcping when a port is given, ping otherwise)",
        }
    }
}

impl FromStr for ProbeMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "1" | "icmp" => Ok(ProbeMode::Icmp),
            "2" | "tcp" => Ok(ProbeMode::Tcp),
            "3" | "hybrid" => Ok(ProbeMode::Hybrid),
            _ => Err(ConfigError::InvalidMode(s.to_string())),
        }
    }
}

impl fmt::Display for ProbeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeMode::Icmp => f.write_str("icmp"),
            ProbeMode::Tcp => f.write_str("tcp"),
            ProbeMode::Hybrid => f.write_str("hybrid"),
        }
    }
}

/// Pick the strategy (and effective port) for one target.
pub fn route(mode: ProbeMode, target: &Target, default_port: u16) -> Protocol {
    match (mode, target.port) {
        (ProbeMode::Icmp, _) => Protocol::Icmp,
        (ProbeMode::Tcp, port) => Protocol::Tcp(port.unwrap_or(default_port)),
        (ProbeMode::Hybrid, Some(port)) => Protocol::Tcp(port),
        (ProbeMode::Hybrid, None) => Protocol::Icmp,
    }
}

/// Probe every target once and return the ordered report.
pub async fn run_cycle(
    targets: &[Target],
    config: &RunConfig,
    mode: ProbeMode,
    probers: &ProbeSet,
) -> Result<Report, RunError> {
    run_cycle_with(targets, config, mode, probers, |_| {}).await
}

/// Like [`run_cycle`], calling `on_complete` for each outcome in completion order.
pub async fn run_cycle_with<F>(
    targets: &[Target],
    config: &RunConfig,
    mode: ProbeMode,
    probers: &ProbeSet,
    mut on_complete: F,
) -> Result<Report, RunError>
where
    F: FnMut(&ProbeOutcome),
{
    config.validate()?;
    if targets.is_empty() {
        return Err(RunError::EmptyRun(config.input_path.display().to_string()));
    }

    info!(
        targets = targets.len(),
        %mode,
        max_concurrency = config.max_concurrency,
        "starting probe cycle"
    );

    let shared = Arc::new(config.clone());
    let limit = Arc::new(Semaphore::new(config.max_concurrency));
    let mut slots: Vec<Option<ProbeOutcome>> = vec![None; targets.len()];
    let mut set = JoinSet::new();

    for (index, target) in targets.iter().enumerate() {
        let protocol = route(mode, target, config.default_tcp_port);
        let host = target.host.clone();
        let config = Arc::clone(&shared);
        let probers = probers.clone();
        let limit = Arc::clone(&limit);

        set.spawn(async move {
            let _permit = limit.acquire_owned().await.ok();
            debug!(index, host = %host, %protocol, "probe started");
            let stats = probe_target(&host, protocol, &config, &probers).await;
            ProbeOutcome::new(index, host, protocol, stats)
        });
    }

    while let Some(joined) = set.join_next().await {
        match joined {
            Ok(outcome) => {
                debug!(index = outcome.index, line = %outcome, "probe finished");
                on_complete(&outcome);
                let index = outcome.index;
                slots[index] = Some(outcome);
            }
            Err(e) => error!(error = %e, "probe task aborted"),
        }
    }

    let outcomes = slots
        .into_iter()
        .zip(targets)
        .enumerate()
        .map(|(index, (slot, target))| {
            slot.unwrap_or_else(|| {
                let protocol = route(mode, target, config.default_tcp_port);
                ProbeOutcome::new(index, target.host.clone(), protocol, ProbeStats::unreachable())
            })
        })
        .collect();

    Ok(Report::new(outcomes))
}

/// Run the routed strategy under a hard wall-clock limit.
async fn probe_target(host: &str, protocol: Protocol, config: &RunConfig, probers: &ProbeSet) -> ProbeStats {
    let (probe, budget) = match protocol {
        Protocol::Icmp => (probers.icmp.probe(host, config), config.icmp_budget()),
        Protocol::Tcp(port) => (probers.tcp.probe(host, port, config), config.tcp_budget()),
    };

    let limit = budget.saturating_add(HARD_LIMIT_GRACE);
    match timeout(limit, probe).await {
        Ok(stats) => stats,
        Err(_) => {
            warn!(host, %protocol, limit_ms = limit.as_millis() as u64, "probe exceeded hard limit");
            ProbeStats::unreachable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_menu_and_name() {
        assert_eq!("1".parse::<ProbeMode>().unwrap(), ProbeMode::Icmp);
        assert_eq!(" 2 ".parse::<ProbeMode>().unwrap(), ProbeMode::Tcp);
        assert_eq!("Hybrid".parse::<ProbeMode>().unwrap(), ProbeMode::Hybrid);
        assert!(matches!(
            "4".parse::<ProbeMode>(),
            Err(ConfigError::InvalidMode(_))
        ));
        assert!("".parse::<ProbeMode>().is_err());
    }

    #[test]
    fn test_menu_keys_round_trip() {
        for mode in ProbeMode::ALL {
            assert_eq!(mode.menu_key().parse::<ProbeMode>().unwrap(), mode);
        }
    }

    #[test]
    fn test_route_table() {
        let bare = Target::new("a.com", None);
        let ported = Target::new("a.com", Some(22));

        assert_eq!(route(ProbeMode::Icmp, &bare, 443), Protocol::Icmp);
        assert_eq!(route(ProbeMode::Icmp, &ported, 443), Protocol::Icmp);
        assert_eq!(route(ProbeMode::Tcp, &bare, 443), Protocol::Tcp(443));
        assert_eq!(route(ProbeMode::Tcp, &ported, 443), Protocol::Tcp(22));
        assert_eq!(route(ProbeMode::Hybrid, &bare, 443), Protocol::Icmp);
        assert_eq!(route(ProbeMode::Hybrid, &ported, 443), Protocol::Tcp(22));
    }
}
