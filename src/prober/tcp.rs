use std::net::SocketAddr;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, warn};

use crate::config::RunConfig;
use crate::error::ProbeError;
use crate::prober::{ProbeStats, TcpProber};
use crate::util::resolve_socket_addr;

/// Deadline used when the configured budget does not fit in an `Instant`.
const FAR_FUTURE: Duration = Duration::from_secs(86_400 * 365 * 30);

/// TCP connect latency ("tcping") over tokio sockets.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConnectTcpProber;

#[async_trait]
impl TcpProber for ConnectTcpProber {
    async fn probe(&self, host: &str, port: u16, config: &RunConfig) -> ProbeStats {
        let start = Instant::now();
        let deadline = start
            .checked_add(config.tcp_budget())
            .unwrap_or_else(|| start + FAR_FUTURE);

        // Resolve once so DNS time never lands in the measured latency.
        let addr = match timeout(config.probe_timeout(), resolve_socket_addr(host, port)).await {
            Ok(Ok(addr)) => addr,
            Ok(Err(e)) => {
                warn!(host, port, error = %e, "tcp probe failed");
                return ProbeStats::unreachable();
            }
            Err(_) => {
                warn!(host, port, "tcp probe: name resolution timed out");
                return ProbeStats::unreachable();
            }
        };

        let count = config.tcp_sample_count;
        let mut samples = Vec::with_capacity(count as usize);
        for attempt in 0..count {
            if attempt > 0 {
                sleep(config.sample_interval()).await;
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(host, port, attempted = attempt, "tcp probe budget exhausted");
                break;
            }

            match connect_once(addr, config.probe_timeout().min(remaining)).await {
                Ok(rtt) => {
                    debug!(host, %addr, attempt, rtt_ms = rtt.as_secs_f64() * 1000.0, "connected");
                    samples.push(Some(rtt));
                }
                Err(e) => {
                    debug!(host, %addr, attempt, error = %e, "connect failed");
                    samples.push(None);
                }
            }
        }

        ProbeStats::from_samples(&samples, count)
    }
}

/// One connect attempt. The connection is closed as soon as it is established.
pub async fn connect_once(addr: SocketAddr, limit: Duration) -> Result<Duration, ProbeError> {
    let start = Instant::now();
    let conn = timeout(limit, TcpStream::connect(addr))
        .await
        .map_err(|_| ProbeError::Timeout)??;
    let elapsed = start.elapsed();
    drop(conn);
    Ok(elapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prober::{Latency, LossPercent};
    use tokio::net::TcpListener;

    fn fast_config(samples: u32) -> RunConfig {
        RunConfig {
            tcp_sample_count: samples,
            probe_timeout_ms: 500,
            sample_interval_ms: 10,
            ..RunConfig::default()
        }
    }

    #[tokio::test]
    async fn test_open_port_has_zero_loss() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            loop {
                if listener.accept().await.is_err() {
                    break;
                }
            }
        });

        let stats = ConnectTcpProber.probe("127.0.0.1", port, &fast_config(3)).await;
        assert!(matches!(stats.latency, Latency::Millis(_)));
        assert_eq!(stats.loss, LossPercent::NONE);
    }

    #[tokio::test]
    async fn test_closed_port_is_unreachable() {
        // Bind then drop to get a port nothing listens on.
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };

        let stats = ConnectTcpProber.probe("127.0.0.1", port, &fast_config(2)).await;
        assert_eq!(stats, ProbeStats::unreachable());
    }

    #[tokio::test]
    async fn test_oversized_budget_does_not_overflow() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = RunConfig {
            budget_secs_per_sample: u64::MAX,
            ..fast_config(2)
        };

        let stats = ConnectTcpProber.probe("127.0.0.1", port, &config).await;
        assert_eq!(stats, ProbeStats::unreachable());
    }

    #[tokio::test]
    async fn test_unresolvable_host_is_unreachable() {
        let stats = ConnectTcpProber
            .probe("no-such-host.invalid", 443, &fast_config(2))
            .await;
        assert_eq!(stats, ProbeStats::unreachable());
    }

    #[tokio::test]
    async fn test_connect_once_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let addr: SocketAddr = format!("127.0.0.1:{port}").parse().unwrap();
        assert!(connect_once(addr, Duration::from_millis(500)).await.is_err());
    }
}
