//! Daily trigger loop.
//!
//! The scheduler polls the wall clock on a coarse tick (≤ 1 s) and fires
//! each job once per day at its dispatch time, invoking the pipeline
//! synchronously with the job's deadline. A run's failure is logged and the
//! loop proceeds; only daemon shutdown stops it.
//!
//! Jobs whose dispatch windows overlap are a configuration hazard: runs are
//! serialized by the pipeline's run-lock, so a late-running job delays the
//! next one rather than racing it. Space the configured deadlines further
//! apart than a full download-encode-playback cycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Local, NaiveTime};
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::pipeline::Pipeline;
use crate::schedule::{local_datetime, Job};

/// Default trigger poll interval.
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

struct Trigger {
    job: Job,
    next_dispatch: DateTime<Local>,
}

/// Drives repeated pipeline runs from the configured daily deadlines.
pub struct Scheduler {
    pipeline: Arc<Pipeline>,
    offset: chrono::Duration,
    tick: Duration,
    triggers: Vec<Trigger>,
}

impl Scheduler {
    /// Builds jobs for `deadlines` with the given launch offset in minutes.
    ///
    /// Dispatch times already past today fire tomorrow.
    pub fn new(pipeline: Arc<Pipeline>, deadlines: &[NaiveTime], offset_minutes: i64) -> Self {
        let now = Local::now();
        let triggers = deadlines
            .iter()
            .map(|&deadline| {
                let job = Job::new(deadline, offset_minutes);
                let next_dispatch = initial_dispatch(now, job.dispatch_time);
                info!(
                    "job scheduled at {} to end playback at {}",
                    job.dispatch_time, job.time_of_day
                );
                Trigger { job, next_dispatch }
            })
            .collect();

        Self {
            pipeline,
            offset: chrono::Duration::minutes(offset_minutes),
            tick: DEFAULT_TICK,
            triggers,
        }
    }

    /// Replace the poll interval (capped at one second).
    #[must_use]
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick.min(Duration::from_secs(1));
        self
    }

    /// Configured jobs, in schedule order.
    pub fn jobs(&self) -> Vec<Job> {
        self.triggers.iter().map(|t| t.job).collect()
    }

    /// Runs the polling loop until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: &CancellationToken) {
        if self.triggers.is_empty() {
            info!("schedule is empty; nothing to do until restart");
        }
        info!("starting scheduling loop");

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = shutdown.cancelled() => {
                    info!("shutdown requested; leaving scheduling loop");
                    return;
                }
                _ = ticker.tick() => {}
            }

            let now = Local::now();
            let pipeline = Arc::clone(&self.pipeline);

            for trigger in &mut self.triggers {
                if now < trigger.next_dispatch {
                    continue;
                }

                let deadline = trigger.next_dispatch + self.offset;
                info!(
                    "dispatching run for the {} deadline",
                    trigger.job.time_of_day
                );

                // One cycle's failure must never take the loop down.
                match pipeline.run(Some(deadline), shutdown).await {
                    Ok(report) => info!(
                        "cycle complete: {} played for {:.1}s",
                        report.window.artifact_path.display(),
                        report.window.actual_duration_secs
                    ),
                    Err(e) => error!("cycle failed while {}: {e}", e.stage()),
                }

                trigger.next_dispatch += chrono::Duration::days(1);
            }
        }
    }
}

/// First firing for a daily dispatch time: today if still ahead, else
/// tomorrow.
fn initial_dispatch(now: DateTime<Local>, dispatch: NaiveTime) -> DateTime<Local> {
    let today = local_datetime(now.date_naive(), dispatch);
    if today > now {
        today
    } else {
        local_datetime(now.date_naive() + chrono::Duration::days(1), dispatch)
    }
}
