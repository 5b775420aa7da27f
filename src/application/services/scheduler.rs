//! Wall-clock aligned cycle scheduler
//!
//! Fires at every multiple of `interval_minutes` since the Unix epoch (the
//! top of every hour by default). Each trigger runs its cycle as a separate task,
//! so a slow cycle never pushes back the next trigger.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info};

use super::pipeline::TariffPipeline;
use crate::shared::ShutdownSignal;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub interval_minutes: u32,
    /// Run one cycle immediately instead of waiting for the first boundary.
    pub run_on_start: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            interval_minutes: 60,
            run_on_start: false,
        }
    }
}

/// The first interval boundary strictly after `now`.
pub fn next_trigger(now: DateTime<Utc>, interval_minutes: u32) -> DateTime<Utc> {
    let period = i64::from(interval_minutes.max(1)) * 60;
    let next = (now.timestamp().div_euclid(period) + 1) * period;
    DateTime::from_timestamp(next, 0).unwrap_or(now + TimeDelta::seconds(period))
}

/// Like [`next_trigger`], but never returns a boundary that already fired.
/// The timer runs on the monotonic clock and may wake just before the
/// wall-clock boundary it was aiming for.
fn upcoming_trigger(
    now: DateTime<Utc>,
    interval_minutes: u32,
    last_fired: Option<DateTime<Utc>>,
) -> DateTime<Utc> {
    let next = next_trigger(now, interval_minutes);
    match last_fired {
        Some(fired) if next <= fired => next_trigger(fired, interval_minutes),
        _ => next,
    }
}

/// The UTC calendar day a cycle started now belongs to. The provider's
/// tariff dates are UTC dates.
pub fn current_day() -> NaiveDate {
    Utc::now().date_naive()
}

pub struct Scheduler {
    pipeline: Arc<TariffPipeline>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(pipeline: Arc<TariffPipeline>, config: SchedulerConfig) -> Self {
        Self { pipeline, config }
    }

    /// Start the trigger loop. The returned task ends after `shutdown` fires
    /// and every cycle still in flight has finished.
    pub fn start(self, shutdown: ShutdownSignal) -> JoinHandle<()> {
        tokio::spawn(async move {
            let Scheduler { pipeline, config } = self;
            let mut cycles = JoinSet::new();
            let mut last_fired = None;

            info!(
                interval_minutes = config.interval_minutes,
                run_on_start = config.run_on_start,
                "⏰ Tariff scheduler started"
            );

            if config.run_on_start {
                spawn_cycle(&mut cycles, &pipeline);
            }

            loop {
                let now = Utc::now();
                let next = upcoming_trigger(now, config.interval_minutes, last_fired);
                let wait = (next - now).to_std().unwrap_or(Duration::ZERO);
                debug!(next = %next, "Next tariff cycle scheduled");

                tokio::select! {
                    _ = tokio::time::sleep(wait) => {
                        last_fired = Some(next);
                        spawn_cycle(&mut cycles, &pipeline);
                    }
                    Some(joined) = cycles.join_next(), if !cycles.is_empty() => {
                        log_join(joined);
                    }
                    _ = shutdown.wait() => {
                        info!(in_flight = cycles.len(), "⏰ Tariff scheduler shutting down");
                        break;
                    }
                }
            }

            while let Some(joined) = cycles.join_next().await {
                log_join(joined);
            }

            info!("⏰ Tariff scheduler stopped");
        })
    }
}

fn spawn_cycle(cycles: &mut JoinSet<()>, pipeline: &Arc<TariffPipeline>) {
    let pipeline = pipeline.clone();
    cycles.spawn(async move {
        pipeline.run_cycle(current_day()).await;
    });
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    if let Err(e) = joined {
        error!(error = %e, "Tariff cycle task aborted");
    }
}
