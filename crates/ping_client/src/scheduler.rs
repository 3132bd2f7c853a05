//! The per-process tick loop.
//!
//! ```text
//! Idle --tick--> CheckingQuota --denied--> Skipped --> Idle
//!                              \--granted-> Dispatching (spawned) --> Idle
//! ```
//!
//! A dispatch runs on its own task, so a slow responder never delays the next quota check.
//! Quota slots are attempt-based: a throttled or failed call does not give its slot back.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use bon::Builder;
use rate_limiter_shared::clock::{Clock, SystemClock};
use rate_limiter_shared::cross_process::CrossProcessLimiter;
use rate_limiter_shared::internal_event::InternalEvent;
use snafu::{Snafu, ensure};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tower::{Service, ServiceExt};

use crate::Error;
use crate::client::{PingRequest, PongReply};
use crate::internal_event::{DispatchCompleted, TickDispatched, TickSkipped};

#[derive(Debug, Snafu, PartialEq, Eq)]
#[snafu(visibility(pub(crate)))]
pub enum SchedulerSettingsError {
    #[snafu(display("tick period must be greater than zero"))]
    ZeroTickPeriod,
}

#[derive(Clone, Debug, Builder)]
pub struct SchedulerSettings {
    /// Sent as the `appName` query parameter.
    #[builder(into)]
    app_name: String,

    #[builder(default = Duration::from_secs(1))]
    tick_period: Duration,
}

impl SchedulerSettings {
    pub fn app_name(&self) -> &str {
        &self.app_name
    }

    pub fn tick_period(&self) -> Duration {
        self.tick_period
    }

    pub fn validate(&self) -> Result<(), SchedulerSettingsError> {
        ensure!(!self.tick_period.is_zero(), ZeroTickPeriodSnafu);
        Ok(())
    }
}

/// Running totals, shared with whoever wants to watch the loop.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    admitted: AtomicU64,
    skipped: AtomicU64,
    succeeded: AtomicU64,
    throttled: AtomicU64,
    failed: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub admitted: u64,
    pub skipped: u64,
    pub succeeded: u64,
    pub throttled: u64,
    pub failed: u64,
}

impl SchedulerStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            admitted: self.admitted.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            succeeded: self.succeeded.load(Ordering::Relaxed),
            throttled: self.throttled.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
        }
    }

    fn record(&self, result: &Result<PongReply, Error>) {
        let counter = match result {
            Ok(PongReply::Pong(_)) => &self.succeeded,
            Ok(PongReply::Throttled(_)) => &self.throttled,
            Err(_) => &self.failed,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

/// What one tick did.
#[derive(Debug)]
pub enum TickOutcome {
    /// The shared window had no slot left (or the record was busy).
    Skipped,
    /// A request is in flight; the handle yields its outcome. Dropping it detaches the task.
    Dispatched(JoinHandle<Result<PongReply, Error>>),
}

pub struct AdmissionScheduler<S, C = SystemClock> {
    limiter: CrossProcessLimiter<C>,
    service: S,
    settings: SchedulerSettings,
    stats: Arc<SchedulerStats>,
}

impl<S, C> AdmissionScheduler<S, C>
where
    S: Service<PingRequest, Response = PongReply> + Clone + Send + 'static,
    S::Error: Into<Error> + Send,
    S::Future: Send,
    C: Clock,
{
    pub fn new(
        limiter: CrossProcessLimiter<C>,
        service: S,
        settings: SchedulerSettings,
    ) -> Result<Self, SchedulerSettingsError> {
        settings.validate()?;
        Ok(Self {
            limiter,
            service,
            settings,
            stats: Arc::new(SchedulerStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// One quota check and, if granted, one spawned dispatch. Must be called inside a
    /// Tokio runtime.
    ///
    /// The quota check is blocking file I/O on the calling thread: one open, a non-blocking
    /// lock attempt and a 12-byte read (plus write when admitted). It never waits on the lock,
    /// but a record on a slow or network filesystem will hold up this worker for as long as
    /// that I/O takes.
    pub fn tick(&self) -> TickOutcome {
        let app_name = self.settings.app_name.as_str();

        if !self.limiter.try_admit() {
            self.stats.skipped.fetch_add(1, Ordering::Relaxed);
            TickSkipped { app_name }.emit();
            return TickOutcome::Skipped;
        }

        self.stats.admitted.fetch_add(1, Ordering::Relaxed);
        TickDispatched { app_name }.emit();

        let service = self.service.clone();
        let request = PingRequest::new(app_name);
        let stats = Arc::clone(&self.stats);
        TickOutcome::Dispatched(tokio::spawn(async move {
            let result = dispatch(service, request).await;
            stats.record(&result);
            match &result {
                Ok(PongReply::Pong(body)) => DispatchCompleted::Succeeded { body }.emit(),
                Ok(PongReply::Throttled(body)) => DispatchCompleted::Throttled { body }.emit(),
                Err(error) => DispatchCompleted::Failed { error }.emit(),
            }
            result
        }))
    }

    /// Ticks every `tick_period`, first one period after start, until `shutdown` resolves.
    ///
    /// In-flight dispatches are not cancelled.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        let period = self.settings.tick_period;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        let window = self.limiter.settings();
        info!(
            app_name = %self.settings.app_name,
            period_ms = period.as_millis() as u64,
            window_ms = window.get_window_length_ms(),
            max_per_window = window.get_max_requests_per_window(),
            "Admission scheduler started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!(app_name = %self.settings.app_name, "Admission scheduler stopping");
                    break;
                }
                _ = ticker.tick() => {
                    self.tick();
                }
            }
        }
    }
}

async fn dispatch<S>(mut service: S, request: PingRequest) -> Result<PongReply, Error>
where
    S: Service<PingRequest, Response = PongReply>,
    S::Error: Into<Error>,
{
    let ready = service.ready().await.map_err(Into::into)?;
    ready.call(request).await.map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use rate_limiter_shared::clock::ManualClock;
    use rate_limiter_shared::settings::WindowSettings;
    use rate_limiter_shared::shared_counter::SharedCounterStore;
    use tempfile::TempDir;
    use tokio::sync::oneshot;
    use tokio::time;
    use tokio_test::{assert_pending, assert_ready, task};
    use tower_test::mock;

    use super::*;

    type MockPong = mock::Mock<PingRequest, PongReply>;

    fn scheduler(
        dir: &TempDir,
        clock: Arc<ManualClock>,
    ) -> (
        AdmissionScheduler<MockPong, Arc<ManualClock>>,
        mock::Handle<PingRequest, PongReply>,
    ) {
        let limiter = CrossProcessLimiter::with_clock(
            SharedCounterStore::new(dir.path().join("ping-lock.bin")),
            WindowSettings::default(),
            clock,
        )
        .unwrap();
        let (service, handle) = mock::pair();
        let settings = SchedulerSettings::builder().app_name("ping-01").build();
        (
            AdmissionScheduler::new(limiter, service, settings).unwrap(),
            handle,
        )
    }

    #[tokio::test]
    async fn success_is_recorded() {
        let dir = TempDir::new().unwrap();
        let (scheduler, mut handle) = scheduler(&dir, Arc::new(ManualClock::new(0)));

        let TickOutcome::Dispatched(call) = scheduler.tick() else {
            panic!("first tick should dispatch");
        };
        let (request, respond) = handle.next_request().await.unwrap();
        assert_eq!(request, PingRequest::new("ping-01"));
        respond.send_response(PongReply::Pong("world".into()));

        assert_eq!(call.await.unwrap().unwrap(), PongReply::Pong("world".into()));
        assert_eq!(
            scheduler.stats().snapshot(),
            StatsSnapshot {
                admitted: 1,
                succeeded: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn throttled_reply_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let (scheduler, mut handle) = scheduler(&dir, Arc::new(ManualClock::new(0)));

        let TickOutcome::Dispatched(call) = scheduler.tick() else {
            panic!("first tick should dispatch");
        };
        let (_, respond) = handle.next_request().await.unwrap();
        respond.send_response(PongReply::Throttled("Too many requests.".into()));

        assert!(call.await.unwrap().is_ok());
        let stats = scheduler.stats().snapshot();
        assert_eq!(stats.throttled, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn failure_surfaces_and_next_tick_still_runs() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let (scheduler, mut handle) = scheduler(&dir, clock.clone());

        let TickOutcome::Dispatched(call) = scheduler.tick() else {
            panic!("first tick should dispatch");
        };
        let (_, respond) = handle.next_request().await.unwrap();
        respond.send_error("connection refused");

        let err = call.await.unwrap().unwrap_err();
        assert!(err.to_string().contains("connection refused"));
        assert_eq!(scheduler.stats().snapshot().failed, 1);

        clock.set(1_000);
        assert!(matches!(scheduler.tick(), TickOutcome::Dispatched(_)));
    }

    #[tokio::test]
    async fn exhausted_window_skips_without_calling() {
        let dir = TempDir::new().unwrap();
        let (scheduler, _handle) = scheduler(&dir, Arc::new(ManualClock::new(0)));

        assert!(matches!(scheduler.tick(), TickOutcome::Dispatched(_)));
        assert!(matches!(scheduler.tick(), TickOutcome::Dispatched(_)));
        assert!(matches!(scheduler.tick(), TickOutcome::Skipped));

        assert_eq!(
            scheduler.stats().snapshot(),
            StatsSnapshot {
                admitted: 2,
                skipped: 1,
                ..Default::default()
            }
        );
    }

    #[tokio::test]
    async fn loop_ticks_once_per_period_until_shutdown() {
        time::pause();

        let dir = TempDir::new().unwrap();
        let (scheduler, _handle) = scheduler(&dir, Arc::new(ManualClock::new(0)));
        let stats = scheduler.stats();
        let (stop, stopped) = oneshot::channel::<()>();
        let mut run = task::spawn(scheduler.run_until(async move {
            let _ = stopped.await;
        }));

        assert_pending!(run.poll());
        assert_eq!(stats.snapshot(), StatsSnapshot::default());

        time::advance(Duration::from_millis(1500)).await;
        assert_pending!(run.poll());
        assert_eq!(stats.snapshot().admitted, 1);

        time::advance(Duration::from_secs(1)).await;
        assert_pending!(run.poll());
        time::advance(Duration::from_secs(1)).await;
        assert_pending!(run.poll());

        // The limiter clock never moved, so the third tick found the window full.
        assert_eq!(
            stats.snapshot(),
            StatsSnapshot {
                admitted: 2,
                skipped: 1,
                ..Default::default()
            }
        );

        stop.send(()).unwrap();
        assert_ready!(run.poll());
    }

    #[test]
    fn default_tick_period_is_one_second() {
        let settings = SchedulerSettings::builder().app_name("ping").build();
        assert_eq!(settings.tick_period(), Duration::from_secs(1));
        assert_eq!(settings.validate(), Ok(()));
    }

    #[test]
    fn zero_tick_period_is_rejected_before_the_loop_starts() {
        let dir = TempDir::new().unwrap();
        let limiter = CrossProcessLimiter::with_clock(
            SharedCounterStore::new(dir.path().join("ping-lock.bin")),
            WindowSettings::default(),
            Arc::new(ManualClock::new(0)),
        )
        .unwrap();
        let (service, _handle) = mock::pair::<PingRequest, PongReply>();
        let settings = SchedulerSettings::builder()
            .app_name("ping-01")
            .tick_period(Duration::ZERO)
            .build();

        let err = AdmissionScheduler::new(limiter, service, settings)
            .err()
            .unwrap();
        assert_eq!(err, SchedulerSettingsError::ZeroTickPeriod);
    }
}
