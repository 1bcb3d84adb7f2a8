use std::net::IpAddr;
use std::time::Duration;

use async_trait::async_trait;
use surge_ping::{Client, Config, ICMP, PingIdentifier, PingSequence};
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::error::ProbeError;
use crate::prober::{IcmpProber, ProbeStats};
use crate::util::resolve_host_to_ip;

/// Echo payload, same size as the classic `ping` default.
const PAYLOAD: [u8; 56] = [0; 56];

/// ICMP echo via surge-ping's native sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct SurgeIcmpProber;

#[async_trait]
impl IcmpProber for SurgeIcmpProber {
    async fn probe(&self, host: &str, config: &RunConfig) -> ProbeStats {
        let budget = config.icmp_budget();
        match timeout(budget, ping_samples(host, config)).await {
            Ok(Ok(samples)) => ProbeStats::from_samples(&samples, config.icmp_sample_count),
            Ok(Err(e)) => {
                warn!(host, error = %e, "icmp probe failed");
                ProbeStats::unreachable()
            }
            Err(_) => {
                warn!(host, budget_ms = budget.as_millis() as u64, "icmp probe exceeded budget");
                ProbeStats::unreachable()
            }
        }
    }
}

fn icmp_client(ip: IpAddr) -> Result<Client, ProbeError> {
    let client = match ip {
        IpAddr::V4(_) => Client::new(&Config::default()),
        IpAddr::V6(_) => Client::new(&Config::builder().kind(ICMP::V6).build()),
    };
    client.map_err(|e| ProbeError::ToolUnavailable(format!("icmp socket: {e}")))
}

/// Send `icmp_sample_count` echoes, one `Option<rtt>` per echo.
async fn ping_samples(host: &str, config: &RunConfig) -> Result<Vec<Option<Duration>>, ProbeError> {
    let ip = resolve_host_to_ip(host).await?;
    let client = icmp_client(ip)?;

    let mut pinger = client.pinger(ip, PingIdentifier(rand::random())).await;
    pinger.timeout(config.probe_timeout());

    let count = config.icmp_sample_count;
    let mut samples = Vec::with_capacity(count as usize);
    for seq in 0..count {
        if seq > 0 {
            sleep(config.sample_interval()).await;
        }
        match pinger.ping(PingSequence(seq as u16), &PAYLOAD).await {
            Ok((_packet, rtt)) => {
                debug!(host, %ip, seq, rtt_ms = rtt.as_secs_f64() * 1000.0, "echo reply");
                samples.push(Some(rtt));
            }
            Err(e) => {
                debug!(host, %ip, seq, error = %e, "echo lost");
                samples.push(None);
            }
        }
    }
    Ok(samples)
}
