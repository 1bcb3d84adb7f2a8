//! Report assembly and the `result_<timestamp>.txt` artifact.
//!
//! Line format: `host,<ICMP|TCP:port>,<latency|Timeout>,<loss%>`, one per
//! target, in input order, joined by `\n` without a trailing newline.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone};
use tokio::fs;

use crate::prober::{Latency, ProbeStats, Protocol};

/// Result for the target at position `index` of the input list.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeOutcome {
    pub index: usize,
    pub host: String,
    pub protocol: Protocol,
    pub stats: ProbeStats,
}

impl ProbeOutcome {
    pub fn new(index: usize, host: impl Into<String>, protocol: Protocol, stats: ProbeStats) -> Self {
        Self {
            index,
            host: host.into(),
            protocol,
            stats,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.stats.latency == Latency::Timeout
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.host, self.protocol, self.stats.latency, self.stats.loss
        )
    }
}

/// Ordered outcomes of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    outcomes: Vec<ProbeOutcome>,
}

impl Report {
    /// Outcomes are ordered by `index` regardless of the order given.
    pub fn new(mut outcomes: Vec<ProbeOutcome>) -> Self {
        outcomes.sort_by_key(|o| o.index);
        Self { outcomes }
    }

    pub fn outcomes(&self) -> &[ProbeOutcome] {
        &self.outcomes
    }

    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn lines(&self) -> Vec<String> {
        self.outcomes.iter().map(|o| o.to_string()).collect()
    }

    /// File body, bit-compatible with earlier result files.
    pub fn body(&self) -> String {
        self.lines().join("\n")
    }

    pub fn summary(&self) -> Summary {
        let latencies: Vec<f64> = self
            .outcomes
            .iter()
            .filter_map(|o| o.stats.latency.as_millis())
            .collect();
        let avg_latency_ms = if latencies.is_empty() {
            None
        } else {
            Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
        };

        Summary {
            total: self.outcomes.len(),
            reachable: latencies.len(),
            timeouts: self.outcomes.len() - latencies.len(),
            avg_latency_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Summary {
    pub total: usize,
    pub reachable: usize,
    pub timeouts: usize,
    /// Mean over reachable targets only.
    pub avg_latency_ms: Option<f64>,
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "probed {} targets: {} reachable, {} timeout",
            self.total, self.reachable, self.timeouts
        )?;
        match self.avg_latency_ms {
            Some(avg) => write!(f, ", average latency {:.1} ms", avg),
            None => f.write_str(", average latency n/a"),
        }
    }
}

/// `result_YYYYmmdd_HHMMSS.txt`
pub fn result_file_name<Tz: TimeZone>(at: &DateTime<Tz>) -> String
where
    Tz::Offset: fmt::Display,
{
    format!("result_{}.txt", at.format("%Y%m%d_%H%M%S"))
}

/// Write the report body into `dir` and return the file path.
pub async fn persist<Tz: TimeZone>(
    report: &Report,
    dir: &Path,
    at: &DateTime<Tz>,
) -> std::io::Result<PathBuf>
where
    Tz::Offset: fmt::Display,
{
    fs::create_dir_all(dir).await?;
    let path = dir.join(result_file_name(at));
    fs::write(&path, report.body()).await?;
    tracing::info!(path = %path.display(), lines = report.len(), "report written");
    Ok(path)
}
