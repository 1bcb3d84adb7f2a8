use std::future::Future;
use std::str::FromStr;

use anyhow::Result;
use chrono::{DateTime, Local, TimeZone};
use tokio::time::sleep;
use tracing::{error, info};

use crate::error::ConfigError;

/// When to run probe cycles.
#[derive(Debug, Clone)]
pub enum Schedule {
    /// A single cycle, then exit.
    Once,
    /// Repeat at every fire time of a cron expression until interrupted.
    Cron(cron::Schedule),
}

impl Schedule {
    /// `None` or a blank expression means [`Schedule::Once`].
    ///
    /// Accepts classic 5-field cron (`min hour dom month dow`) as well as the
    /// 6/7-field form with leading seconds.
    pub fn parse(expr: Option<&str>) -> Result<Self, ConfigError> {
        let Some(expr) = expr.map(str::trim).filter(|e| !e.is_empty()) else {
            return Ok(Self::Once);
        };

        let normalized = match expr.split_whitespace().count() {
            5 => format!("0 {expr}"),
            6 | 7 => expr.to_string(),
            n => {
                return Err(ConfigError::InvalidSchedule {
                    expr: expr.to_string(),
                    reason: format!("expected 5 fields, got {n}"),
                });
            }
        };

        cron::Schedule::from_str(&normalized)
            .map(Self::Cron)
            .map_err(|e| ConfigError::InvalidSchedule {
                expr: expr.to_string(),
                reason: e.to_string(),
            })
    }

    /// Next fire time strictly after `now`; `None` for `Once` or an exhausted schedule.
    pub fn next_after<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        match self {
            Self::Once => None,
            Self::Cron(schedule) => schedule.after(now).next(),
        }
    }
}

pub struct Scheduler {
    schedule: Schedule,
}

impl Scheduler {
    pub fn new(schedule: Schedule) -> Self {
        Self { schedule }
    }

    /// job: async closure for one full probe-and-report cycle
    ///
    /// With `Once` the job's error is returned. With `Cron` failures are
    /// logged and the loop waits for the next fire time; cycles never overlap.
    pub async fn run<J, F>(&self, mut job: J) -> Result<()>
    where
        J: FnMut() -> F,
        F: Future<Output = Result<()>>,
    {
        if matches!(self.schedule, Schedule::Once) {
            return job().await;
        }

        loop {
            let now = Local::now();
            let Some(next) = self.schedule.next_after(&now) else {
                info!("schedule has no further fire times");
                return Ok(());
            };
            let wait = (next.clone() - now).to_std().unwrap_or_default();
            info!(next = %next.format("%Y-%m-%d %H:%M:%S"), "waiting for next cycle");
            println!("Next run at {}", next.format("%Y-%m-%d %H:%M:%S"));

            tokio::select! {
                _ = sleep(wait) => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("interrupted, stopping schedule");
                    return Ok(());
                }
            }

            if let Err(e) = job().await {
                error!(error = %e, "probe cycle failed");
                eprintln!("cycle failed: {e:#}");
            }
        }
    }
}
