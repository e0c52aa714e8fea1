// SPDX-License-Identifier: Apache-2.0

//! Background task scheduling.
//!
//! Every poller runs in its own tokio task on a [`Schedule`]. A failed tick is
//! logged and the task waits for its next slot. [`TaskRunner::shutdown`]
//! interrupts pending sleeps and joins every task.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Datelike, Local, NaiveDate, TimeZone, Utc, Weekday};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::docgen::DocGenerator;
use crate::fetcher::Fetcher;
use crate::reporter::Reporter;
use crate::scheduler::IssueScheduler;

/// When a task runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Schedule {
    /// Immediately, then after every interval.
    Every(Duration),
    /// Daily at `hour:00` local time.
    DailyAt {
        /// Hour of day, 0-23.
        hour: u32,
    },
    /// Weekly on `weekday` at `hour:00` local time.
    WeeklyAt {
        /// Day of week.
        weekday: Weekday,
        /// Hour of day, 0-23.
        hour: u32,
    },
}

const ONE_DAY: Duration = Duration::from_secs(24 * 60 * 60);

fn at_hour<Tz: TimeZone>(tz: &Tz, date: NaiveDate, hour: u32) -> Option<DateTime<Tz>> {
    let naive = date.and_hms_opt(hour, 0, 0)?;
    tz.from_local_datetime(&naive).earliest()
}

impl Schedule {
    /// Wait before the first run after startup.
    #[must_use]
    pub fn first_delay<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        match self {
            Schedule::Every(_) => Duration::ZERO,
            _ => self.delay_from(now),
        }
    }

    /// Wait from `now` until the next run.
    ///
    /// Calendar schedules pick the first slot strictly after `now`.
    #[must_use]
    pub fn delay_from<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> Duration {
        let tz = now.timezone();
        let today = now.date_naive();
        let next = match *self {
            Schedule::Every(interval) => return interval,
            Schedule::DailyAt { hour } => (0..=1)
                .filter_map(|d| at_hour(&tz, today + chrono::Days::new(d), hour))
                .find(|t| t > now),
            Schedule::WeeklyAt { weekday, hour } => {
                let ahead = (7 + weekday.num_days_from_monday()
                    - now.weekday().num_days_from_monday())
                    % 7;
                [u64::from(ahead), u64::from(ahead) + 7]
                    .into_iter()
                    .filter_map(|d| at_hour(&tz, today + chrono::Days::new(d), hour))
                    .find(|t| t > now)
            }
        };
        next.and_then(|t| (t - now.clone()).to_std().ok())
            .unwrap_or(ONE_DAY)
    }
}

/// A unit of periodic work.
#[async_trait]
pub trait PeriodicTask: Send + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Runs one pass.
    async fn tick(&mut self) -> Result<()>;
}

#[async_trait]
impl PeriodicTask for Fetcher {
    fn name(&self) -> &'static str {
        "fetcher"
    }

    async fn tick(&mut self) -> Result<()> {
        self.run_once().await
    }
}

#[async_trait]
impl PeriodicTask for Reporter {
    fn name(&self) -> &'static str {
        "weekly-reporter"
    }

    async fn tick(&mut self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}

#[async_trait]
impl PeriodicTask for DocGenerator {
    fn name(&self) -> &'static str {
        "doc-generator"
    }

    async fn tick(&mut self) -> Result<()> {
        self.run_once(Local::now().date_naive()).await.map(|_| ())
    }
}

#[async_trait]
impl PeriodicTask for IssueScheduler {
    fn name(&self) -> &'static str {
        "issue-scheduler"
    }

    async fn tick(&mut self) -> Result<()> {
        self.close_out_of_date_issues(Utc::now()).await.map(|_| ())
    }
}

/// Owns the background tasks and their shutdown signal.
#[derive(Debug)]
pub struct TaskRunner {
    shutdown: watch::Sender<bool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
}

impl Default for TaskRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl TaskRunner {
    /// Creates a runner with no tasks.
    #[must_use]
    pub fn new() -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Spawns `task` on `schedule`.
    pub fn spawn<T: PeriodicTask>(&mut self, task: T, schedule: Schedule) {
        let name = task.name();
        info!(task = name, ?schedule, "Starting background task");
        let handle = tokio::spawn(run_task(task, schedule, self.shutdown.subscribe()));
        self.handles.push((name, handle));
    }

    /// Number of spawned tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Returns true if no task was spawned.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Signals every task to stop and waits for them.
    ///
    /// A tick in progress finishes first.
    pub async fn shutdown(self) {
        let _ = self.shutdown.send(true);
        for (name, handle) in self.handles {
            if let Err(e) = handle.await {
                error!(task = name, error = %e, "Background task panicked");
            }
        }
        info!("Background tasks stopped");
    }
}

async fn run_task<T: PeriodicTask>(
    mut task: T,
    schedule: Schedule,
    mut shutdown: watch::Receiver<bool>,
) {
    let name = task.name();
    let mut delay = schedule.first_delay(&Local::now());
    loop {
        if *shutdown.borrow() {
            break;
        }
        debug!(task = name, ?delay, "Waiting for next run");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }

        if let Err(e) = task.tick().await {
            error!(task = name, error = %format!("{e:#}"), "Task run failed");
        }
        delay = schedule.delay_from(&Local::now());
    }
    debug!(task = name, "Task stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn utc(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_daily_later_today() {
        let now = utc("2026-10-16T04:30:00Z");
        let delay = Schedule::DailyAt { hour: 6 }.delay_from(&now);
        assert_eq!(delay, Duration::from_secs(90 * 60));
    }

    #[test]
    fn test_daily_rolls_to_tomorrow() {
        let now = utc("2026-10-16T06:00:00Z");
        let delay = Schedule::DailyAt { hour: 6 }.delay_from(&now);
        assert_eq!(delay, ONE_DAY);
    }

    #[test]
    fn test_weekly_same_day_later() {
        // 2026-10-16 is a Friday.
        let now = utc("2026-10-16T07:00:00Z");
        let schedule = Schedule::WeeklyAt {
            weekday: Weekday::Fri,
            hour: 8,
        };
        assert_eq!(schedule.delay_from(&now), Duration::from_secs(3600));
    }

    #[test]
    fn test_weekly_same_day_passed() {
        let now = utc("2026-10-16T09:00:00Z");
        let schedule = Schedule::WeeklyAt {
            weekday: Weekday::Fri,
            hour: 8,
        };
        assert_eq!(
            schedule.delay_from(&now),
            Duration::from_secs(7 * 24 * 3600 - 3600)
        );
    }

    #[test]
    fn test_weekly_other_day() {
        let now = utc("2026-10-16T08:00:00Z");
        let schedule = Schedule::WeeklyAt {
            weekday: Weekday::Mon,
            hour: 8,
        };
        assert_eq!(schedule.delay_from(&now), Duration::from_secs(3 * 24 * 3600));
    }

    #[test]
    fn test_every_runs_immediately() {
        let now = utc("2026-10-16T08:00:00Z");
        let schedule = Schedule::Every(Duration::from_secs(180));
        assert_eq!(schedule.first_delay(&now), Duration::ZERO);
        assert_eq!(schedule.delay_from(&now), Duration::from_secs(180));
    }

    struct Counting {
        runs: Arc<AtomicUsize>,
        fail: bool,
    }

    #[async_trait]
    impl PeriodicTask for Counting {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn tick(&mut self) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("tick failed");
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_failing_task_keeps_running() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = TaskRunner::new();
        runner.spawn(
            Counting {
                runs: runs.clone(),
                fail: true,
            },
            Schedule::Every(Duration::from_millis(5)),
        );
        assert_eq!(runner.len(), 1);

        tokio::time::sleep(Duration::from_millis(100)).await;
        runner.shutdown().await;
        assert!(runs.load(Ordering::SeqCst) >= 2);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts_long_wait() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut runner = TaskRunner::new();
        runner.spawn(
            Counting {
                runs: runs.clone(),
                fail: false,
            },
            Schedule::Every(Duration::from_secs(3600)),
        );

        tokio::time::sleep(Duration::from_millis(50)).await;
        tokio::time::timeout(Duration::from_secs(5), runner.shutdown())
            .await
            .unwrap();
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }
}
