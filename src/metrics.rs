use prometheus::{Encoder, GaugeVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use warp::Filter;
use std::net::SocketAddr;
use once_cell::sync::Lazy;

use crate::report::Report;

/// Latency value exported for targets that timed out.
const FAILURE_LATENCY_MS: f64 = -1.0;

struct Metrics {
    registry: Registry,
    latency: GaugeVec,
    loss: GaugeVec,
    timeouts: IntCounterVec,
    last_cycle_targets: IntGauge,
}

impl Metrics {
    fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let latency = GaugeVec::new(
            Opts::new("netpulse_latency_milliseconds", "Average probe latency of the last cycle"),
            &["target", "protocol"],
        )?;
        let loss = GaugeVec::new(
            Opts::new("netpulse_loss_percent", "Probe loss of the last cycle in percent"),
            &["target", "protocol"],
        )?;
        let timeouts = IntCounterVec::new(
            Opts::new("netpulse_timeouts_total", "Total number of targets that timed out"),
            &["target", "protocol"],
        )?;
        let last_cycle_targets = IntGauge::new(
            "netpulse_last_cycle_targets",
            "Number of targets probed in the last cycle",
        )?;

        registry.register(Box::new(latency.clone()))?;
        registry.register(Box::new(loss.clone()))?;
        registry.register(Box::new(timeouts.clone()))?;
        registry.register(Box::new(last_cycle_targets.clone()))?;

        Ok(Self {
            registry,
            latency,
            loss,
            timeouts,
            last_cycle_targets,
        })
    }
}

static METRICS: Lazy<Option<Metrics>> = Lazy::new(|| match Metrics::new() {
    Ok(m) => Some(m),
    Err(e) => {
        tracing::error!(error = %e, "failed to register metrics");
        None
    }
});

/// Publish the outcome of one cycle. Per-target gauges only carry the
/// targets of this report; the timeout counter keeps accumulating.
pub fn record_report(report: &Report) {
    let Some(metrics) = METRICS.as_ref() else {
        return;
    };

    metrics.latency.reset();
    metrics.loss.reset();
    for outcome in report.outcomes() {
        let protocol = outcome.protocol.to_string();
        let labels = [outcome.host.as_str(), protocol.as_str()];
        metrics.latency.with_label_values(&labels).set(
            outcome.stats.latency.as_millis().unwrap_or(FAILURE_LATENCY_MS),
        );
        metrics
            .loss
            .with_label_values(&labels)
            .set(outcome.stats.loss.value());
        if outcome.is_timeout() {
            metrics.timeouts.with_label_values(&labels).inc();
        }
    }
    metrics.last_cycle_targets.set(report.len() as i64);
}

/// Prometheus text exposition of everything recorded so far.
pub fn render() -> Vec<u8> {
    let mut buf = Vec::new();
    let Some(metrics) = METRICS.as_ref() else {
        return buf;
    };
    let encoder = TextEncoder::new();
    if let Err(e) = encoder.encode(&metrics.registry.gather(), &mut buf) {
        tracing::error!(error = %e, "failed to encode metrics");
        buf.clear();
    }
    buf
}

pub async fn serve_metrics(addr: SocketAddr) {
    let metrics_route = warp::path!("metrics").map(|| {
        warp::reply::with_header(
            render(),
            "Content-Type",
            TextEncoder::new().format_type().to_string(),
        )
    });

    tracing::info!(%addr, "serving metrics");
    warp::serve(metrics_route).run(addr).await;
}
