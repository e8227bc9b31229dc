//! Scheduler service that fires capture jobs at their weekly slot.
//!
//! One poll loop checks every trigger at most a second apart. A fired trigger
//! hands its job to a separate task, so a long recording never delays the
//! next check.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{Local, NaiveDateTime};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::trigger::WeeklyTrigger;
use crate::Result;
use crate::capture::{CaptureRequest, ProcessSupervisor};
use crate::config::{ScheduleEntry, weekday_to_string};

/// Default interval between trigger checks.
const DEFAULT_POLL_INTERVAL_MS: u64 = 1_000;

/// Runs one capture to completion.
#[async_trait]
pub trait CaptureRunner: Send + Sync + 'static {
    async fn run_capture(
        &self,
        request: CaptureRequest,
        started_at: NaiveDateTime,
    ) -> Result<PathBuf>;
}

#[async_trait]
impl CaptureRunner for ProcessSupervisor {
    async fn run_capture(
        &self,
        request: CaptureRequest,
        started_at: NaiveDateTime,
    ) -> Result<PathBuf> {
        self.run_at(&request, started_at).await
    }
}

/// Scheduler configuration.
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Interval between trigger checks in milliseconds. Capped at one second.
    pub poll_interval_ms: u64,
    /// Maximum simultaneous captures. `None` means unbounded.
    pub max_concurrent_captures: Option<usize>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_concurrent_captures: None,
        }
    }
}

/// Summary returned when the scheduler stops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShutdownReport {
    /// Captures that were still recording when polling stopped. They were
    /// awaited to completion before the report was produced.
    pub captures_in_flight: usize,
}

/// Maps weekly schedule entries to capture jobs.
pub struct TriggerScheduler<R: CaptureRunner> {
    triggers: Vec<WeeklyTrigger>,
    runner: Arc<R>,
    config: SchedulerConfig,
    capture_slots: Option<Arc<Semaphore>>,
    captures: JoinSet<()>,
    cancellation_token: CancellationToken,
}

impl<R: CaptureRunner> TriggerScheduler<R> {
    /// Arm a trigger for every entry relative to `now`.
    pub fn new(
        entries: &[ScheduleEntry],
        runner: Arc<R>,
        config: SchedulerConfig,
        now: NaiveDateTime,
    ) -> Self {
        let triggers = entries
            .iter()
            .cloned()
            .map(|entry| WeeklyTrigger::new(entry, now))
            .collect();
        let capture_slots = config
            .max_concurrent_captures
            .map(|max| Arc::new(Semaphore::new(max)));

        Self {
            triggers,
            runner,
            config,
            capture_slots,
            captures: JoinSet::new(),
            cancellation_token: CancellationToken::new(),
        }
    }

    /// Token that stops [`TriggerScheduler::run`] when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    pub fn triggers(&self) -> &[WeeklyTrigger] {
        &self.triggers
    }

    /// Number of captures currently recording.
    pub fn captures_in_flight(&self) -> usize {
        self.captures.len()
    }

    /// Check every trigger against `now` and fire those that are due.
    ///
    /// Each job is tagged with the occurrence that fired, not with `now`, so
    /// a late poll does not shift the file name. Returns the number of jobs
    /// handed off.
    pub fn tick(&mut self, now: NaiveDateTime) -> usize {
        while let Some(result) = self.captures.try_join_next() {
            if let Err(e) = result {
                error!(error = %e, "Capture task panicked");
            }
        }

        let mut fired = 0;
        for trigger in &mut self.triggers {
            let Some(occurrence) = trigger.poll(now) else {
                continue;
            };
            let entry = trigger.entry();

            let permit = match &self.capture_slots {
                Some(slots) => match slots.clone().try_acquire_owned() {
                    Ok(permit) => Some(permit),
                    Err(_) => {
                        warn!(
                            job = %entry.name(),
                            max = ?self.config.max_concurrent_captures,
                            "Concurrent capture limit reached, skipping this occurrence"
                        );
                        continue;
                    }
                },
                None => None,
            };

            info!(
                job = %entry.name(),
                scheduled = %occurrence,
                next_run = %trigger.next_run(),
                "Trigger fired"
            );

            let runner = self.runner.clone();
            let request = CaptureRequest::from_entry(entry);
            self.captures.spawn(async move {
                let _permit = permit;
                let name = request.name.clone();
                if let Err(e) = runner.run_capture(request, occurrence).await {
                    error!(job = %name, error = %e, "Capture job failed");
                }
            });
            fired += 1;
        }
        fired
    }

    /// Poll the triggers until cancelled.
    ///
    /// Captures still recording at shutdown are not interrupted. They run to
    /// their scheduled end and are finalized before this returns.
    pub async fn run(mut self) -> ShutdownReport {
        let poll_interval =
            Duration::from_millis(self.config.poll_interval_ms.clamp(1, DEFAULT_POLL_INTERVAL_MS));
        let mut interval = tokio::time::interval(poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(schedules = self.triggers.len(), "Scheduler started");
        for trigger in &self.triggers {
            debug!(
                job = %trigger.entry().name(),
                day = weekday_to_string(trigger.entry().day()),
                time = %trigger.entry().time().format("%H:%M"),
                next_run = %trigger.next_run(),
                "Trigger armed"
            );
        }

        let cancellation_token = self.cancellation_token.clone();
        loop {
            tokio::select! {
                _ = cancellation_token.cancelled() => break,
                _ = interval.tick() => {
                    self.tick(Local::now().naive_local());
                }
            }
        }

        let captures_in_flight = self.captures.len();
        if captures_in_flight > 0 {
            warn!(
                count = captures_in_flight,
                "Scheduler stopped with captures still recording, waiting for them to finish"
            );
        }
        while let Some(result) = self.captures.join_next().await {
            if let Err(e) = result {
                error!(error = %e, "Capture task panicked");
            }
        }

        info!("Scheduler stopped");
        ShutdownReport { captures_in_flight }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
    use parking_lot::Mutex;

    /// Records every capture and then blocks for a long time.
    #[derive(Default)]
    struct SlowRunner {
        started: Mutex<Vec<(String, NaiveDateTime)>>,
    }

    #[async_trait]
    impl CaptureRunner for SlowRunner {
        async fn run_capture(
            &self,
            request: CaptureRequest,
            started_at: NaiveDateTime,
        ) -> Result<PathBuf> {
            self.started.lock().push((request.name.clone(), started_at));
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(PathBuf::from(request.name))
        }
    }

    /// Records every capture and finishes shortly after.
    #[derive(Default)]
    struct QuickRunner {
        finished: Mutex<Vec<(String, NaiveDateTime)>>,
    }

    #[async_trait]
    impl CaptureRunner for QuickRunner {
        async fn run_capture(
            &self,
            request: CaptureRequest,
            started_at: NaiveDateTime,
        ) -> Result<PathBuf> {
            tokio::time::sleep(Duration::from_millis(200)).await;
            self.finished.lock().push((request.name.clone(), started_at));
            Ok(PathBuf::from(request.name))
        }
    }

    fn at(d: u32, h: u32, min: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, d)
            .unwrap()
            .and_hms_opt(h, min, s)
            .unwrap()
    }

    fn entry(name: &str, day: Weekday, h: u32, m: u32) -> ScheduleEntry {
        ScheduleEntry::new(
            format!("https://cdn.example.com/{name}.m3u8"),
            name,
            120,
            day,
            NaiveTime::from_hms_opt(h, m, 0).unwrap(),
        )
        .unwrap()
    }

    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn test_running_capture_does_not_delay_other_triggers() {
        let runner = Arc::new(SlowRunner::default());
        let entries = vec![
            entry("pv179", Weekday::Tue, 14, 0),
            entry("pv180", Weekday::Tue, 14, 0),
            entry("pv293", Weekday::Tue, 14, 1),
        ];
        let mut scheduler =
            TriggerScheduler::new(&entries, runner.clone(), SchedulerConfig::default(), at(1, 9, 0, 0));

        assert_eq!(scheduler.tick(at(2, 14, 0, 0)), 2);
        assert_eq!(scheduler.tick(at(2, 14, 1, 0)), 1);
        settle().await;

        let started = runner.started.lock().clone();
        assert_eq!(started.len(), 3);
        assert!(started.contains(&("pv179".to_string(), at(2, 14, 0, 0))));
        assert!(started.contains(&("pv293".to_string(), at(2, 14, 1, 0))));
        assert_eq!(scheduler.captures_in_flight(), 3);
    }

    #[tokio::test]
    async fn test_trigger_fires_once_per_occurrence() {
        let runner = Arc::new(SlowRunner::default());
        let entries = vec![entry("pv179", Weekday::Tue, 14, 0)];
        let mut scheduler =
            TriggerScheduler::new(&entries, runner.clone(), SchedulerConfig::default(), at(1, 9, 0, 0));

        let mut fired = 0;
        for s in 0..60 {
            fired += scheduler.tick(at(2, 14, 0, s));
        }
        assert_eq!(fired, 1);
        assert_eq!(fired + scheduler.tick(at(9, 14, 0, 0)), 2);
    }

    #[tokio::test]
    async fn test_concurrency_limit_skips_extra_captures() {
        let runner = Arc::new(SlowRunner::default());
        let entries = vec![
            entry("pv179", Weekday::Tue, 14, 0),
            entry("pv180", Weekday::Tue, 14, 0),
        ];
        let config = SchedulerConfig {
            max_concurrent_captures: Some(1),
            ..SchedulerConfig::default()
        };
        let mut scheduler = TriggerScheduler::new(&entries, runner.clone(), config, at(1, 9, 0, 0));

        assert_eq!(scheduler.tick(at(2, 14, 0, 0)), 1);
        settle().await;
        assert_eq!(runner.started.lock().len(), 1);
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel_and_reports_in_flight() {
        let runner = Arc::new(SlowRunner::default());
        let scheduler = TriggerScheduler::new(
            &[],
            runner,
            SchedulerConfig::default(),
            Local::now().naive_local(),
        );
        let token = scheduler.cancellation_token();

        let handle = tokio::spawn(scheduler.run());
        token.cancel();
        let report = handle.await.unwrap();
        assert_eq!(report.captures_in_flight, 0);
    }

    #[tokio::test]
    async fn test_late_poll_tags_capture_with_occurrence() {
        let runner = Arc::new(SlowRunner::default());
        let entries = vec![entry("pv179", Weekday::Tue, 14, 0)];
        let mut scheduler =
            TriggerScheduler::new(&entries, runner.clone(), SchedulerConfig::default(), at(1, 9, 0, 0));

        assert_eq!(scheduler.tick(at(2, 14, 1, 30)), 1);
        settle().await;

        assert_eq!(
            runner.started.lock().clone(),
            vec![("pv179".to_string(), at(2, 14, 0, 0))]
        );
    }

    #[test]
    fn test_shutdown_waits_for_running_capture() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        let runner = Arc::new(QuickRunner::default());
        let now = Local::now().naive_local();
        let entries = vec![entry("pv179", now.date().weekday(), 0, 0)];

        let report = runtime.block_on(async {
            let mut scheduler =
                TriggerScheduler::new(&entries, runner.clone(), SchedulerConfig::default(), now);
            assert_eq!(scheduler.tick(now + chrono::Duration::days(8)), 1);

            scheduler.cancellation_token().cancel();
            scheduler.run().await
        });
        drop(runtime);

        assert_eq!(report.captures_in_flight, 1);
        assert_eq!(runner.finished.lock().len(), 1);
    }
}
