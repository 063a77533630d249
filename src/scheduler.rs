// Scheduler — runs each job on wall-clock-aligned ticks.
//
// Every job gets its own task. The task computes the next boundary of its
// cadence (top of the next minute for a 1-minute job, top of the hour for a
// 60-minute job, counted from local midnight), sleeps until then, and starts
// a run. Runs happen in their own spawned task so a slow or panicking job
// never stalls the loop or the other jobs.
//
// Overlap policy is skip-if-running: a tick that arrives while the previous
// run is still going is skipped.
//
// Wall-clock time comes from a replaceable clock so tests can drive the
// loops under paused tokio time.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Duration, Local, TimeZone, Timelike};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub type JobFuture = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send>>;
type JobFn = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// Source of the current local time used to align ticks.
pub type Clock = Arc<dyn Fn() -> DateTime<Local> + Send + Sync>;

struct Job {
    name: &'static str,
    every_minutes: u32,
    run: JobFn,
}

pub struct Scheduler {
    jobs: Vec<Job>,
    clock: Clock,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            jobs: Vec::new(),
            clock: Arc::new(Local::now),
        }
    }
}

/// The first instant strictly after `now` that lies on a multiple of
/// `every_minutes` minutes since midnight (in `now`'s timezone).
pub fn next_tick<Tz: TimeZone>(now: &DateTime<Tz>, every_minutes: u32) -> DateTime<Tz> {
    let every = i64::from(every_minutes.max(1));
    let minute_of_day = i64::from(now.hour() * 60 + now.minute());
    let next_minute = (minute_of_day / every + 1) * every;

    let floor = now.clone()
        - Duration::seconds(i64::from(now.second()))
        - Duration::nanoseconds(i64::from(now.nanosecond()));
    floor + Duration::minutes(next_minute - minute_of_day)
}

/// Clears the running flag when a run ends, even by panic.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the wall clock ticks are aligned to.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Register a job to run every `every_minutes` minutes.
    pub fn every<F, Fut>(mut self, name: &'static str, every_minutes: u32, job: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.jobs.push(Job {
            name,
            every_minutes: every_minutes.max(1),
            run: Arc::new(move || Box::pin(job()) as JobFuture),
        });
        self
    }

    /// Start one task per job. Each stops when `shutdown` flips to true,
    /// after waiting for its in-flight run to finish.
    pub fn start(self, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        let clock = self.clock;
        self.jobs
            .into_iter()
            .map(|job| tokio::spawn(run_job_loop(job, clock.clone(), shutdown.clone())))
            .collect()
    }
}

async fn run_job_loop(job: Job, clock: Clock, mut shutdown: watch::Receiver<bool>) {
    let running = Arc::new(AtomicBool::new(false));
    let mut in_flight: Option<JoinHandle<()>> = None;
    info!(job = job.name, every_minutes = job.every_minutes, "Job scheduled");

    loop {
        let now = clock();
        let next = next_tick(&now, job.every_minutes);
        let wait = (next - now).to_std().unwrap_or_default();

        tokio::select! {
            _ = tokio::time::sleep(wait) => {}
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        }

        if running.swap(true, Ordering::AcqRel) {
            debug!(job = job.name, "Previous run still active, skipping tick");
            continue;
        }

        let guard = RunningGuard(running.clone());
        let run = (job.run)();
        let name = job.name;
        in_flight = Some(tokio::spawn(async move {
            let _guard = guard;
            if let Err(e) = run.await {
                warn!(job = name, error = %e, "Job failed");
            }
        }));
    }

    if let Some(handle) = in_flight {
        if let Err(e) = handle.await {
            warn!(job = job.name, error = %e, "Job run ended abnormally");
        }
    }
    info!(job = job.name, "Job stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::AtomicUsize;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, h, m, s).unwrap()
    }

    #[test]
    fn test_next_tick_top_of_next_minute() {
        assert_eq!(next_tick(&at(10, 15, 42), 1), at(10, 16, 0));
        // Exactly on a boundary moves to the following one
        assert_eq!(next_tick(&at(10, 15, 0), 1), at(10, 16, 0));
    }

    #[test]
    fn test_next_tick_hourly_and_day_rollover() {
        assert_eq!(next_tick(&at(10, 15, 42), 60), at(11, 0, 0));
        assert_eq!(
            next_tick(&at(23, 59, 1), 5),
            Utc.with_ymd_and_hms(2026, 3, 15, 0, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_next_tick_multi_minute_cadence() {
        assert_eq!(next_tick(&at(10, 12, 3), 5), at(10, 15, 0));
        assert_eq!(next_tick(&at(10, 15, 0), 5), at(10, 20, 0));
        // Zero is treated as every minute
        assert_eq!(next_tick(&at(10, 15, 30), 0), at(10, 16, 0));
    }

    #[tokio::test]
    async fn test_shutdown_stops_job_loops() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let scheduler = Scheduler::new().every("noop", 1, move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                anyhow::Ok(())
            }
        });
        let (tx, rx) = watch::channel(false);
        let handles = scheduler.start(rx);
        tx.send(true).unwrap();
        for handle in handles {
            tokio::time::timeout(std::time::Duration::from_secs(5), handle)
                .await
                .expect("job loop did not stop")
                .unwrap();
        }
    }

    /// A clock that starts at 10:00:30 and follows paused tokio time.
    fn paused_clock() -> Clock {
        let base = Local.with_ymd_and_hms(2026, 3, 14, 10, 0, 30).unwrap();
        let origin = tokio::time::Instant::now();
        Arc::new(move || base + Duration::from_std(origin.elapsed()).unwrap())
    }

    async fn stop(tx: watch::Sender<bool>, handles: Vec<JoinHandle<()>>) {
        tx.send(true).unwrap();
        for handle in handles {
            handle.await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_job_keeps_its_schedule() {
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let scheduler = Scheduler::new()
            .with_clock(paused_clock())
            .every("flaky", 1, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<(), _>(anyhow::anyhow!("upstream down"))
                }
            });
        let (tx, rx) = watch::channel(false);
        let handles = scheduler.start(rx);

        // Ticks at 10:01, 10:02 and 10:03
        tokio::time::sleep(std::time::Duration::from_secs(200)).await;
        assert_eq!(runs.load(Ordering::SeqCst), 3);
        stop(tx, handles).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_tick_is_skipped_while_previous_run_is_active() {
        let starts = Arc::new(AtomicUsize::new(0));
        let counter = starts.clone();
        let scheduler = Scheduler::new()
            .with_clock(paused_clock())
            .every("slow", 1, move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(std::time::Duration::from_secs(150)).await;
                    anyhow::Ok(())
                }
            });
        let (tx, rx) = watch::channel(false);
        let handles = scheduler.start(rx);

        // First run starts at 10:01 and lasts until 10:03:30, so the 10:02
        // and 10:03 ticks are skipped
        tokio::time::sleep(std::time::Duration::from_secs(200)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 1);

        // 10:04 finds it idle again
        tokio::time::sleep(std::time::Duration::from_secs(15)).await;
        assert_eq!(starts.load(Ordering::SeqCst), 2);

        // Shutdown waits for the in-flight run
        stop(tx, handles).await;
        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_running_guard_clears_flag() {
        let flag = Arc::new(AtomicBool::new(true));
        drop(RunningGuard(flag.clone()));
        assert!(!flag.load(Ordering::Acquire));
    }
}
