//! Periodic fetch scheduling for the civilian and military feeds.
//!
//! Three phases tick independently (civilian fetch, military fetch, summary)
//! but every firing runs on one dispatcher task, so at most one upstream
//! request is in flight at any time. The military phase runs once right at
//! startup and then follows its own cadence offset by a stagger, so its
//! deadlines never coincide with the civilian ones.
//!
//! Shutdown is checked between firings only. A fetch that is already running
//! when shutdown is requested is allowed to finish and its batch is merged.
//! No request timeout is applied here; whatever the [`FeedSource`] enforces
//! is what bounds a firing.

use crate::client::{ClientError, FeedEndpoints, FeedSource};
use crate::dashboard::{Dashboard, Summary};
use crate::processor::{IngestionProcessor, ProcessResult};
use crate::protocol::ParseError;
use crate::types::FeedKind;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::time::{sleep_until, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Error)]
pub enum TickError {
    #[error("Fetch failed: {0}")]
    Fetch(#[from] ClientError),
    #[error("Decode failed: {0}")]
    Decode(#[from] ParseError),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("{0} interval must be non-zero")]
    ZeroInterval(Phase),
    #[error("Military stagger of {stagger:?} lets military and civilian deadlines coincide")]
    DeadlineCollision { stagger: Duration },
}

/// One of the independently timed activities of the scheduler.
///
/// The declaration order is the tie-break order when deadlines coincide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Phase {
    Civilian,
    Military,
    Summary,
}

impl Phase {
    pub const ALL: [Phase; 3] = [Phase::Civilian, Phase::Military, Phase::Summary];
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Civilian => f.write_str("civilian"),
            Self::Military => f.write_str("military"),
            Self::Summary => f.write_str("summary"),
        }
    }
}

/// Configuration for the scheduler.
#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub civilian_interval: Duration,
    pub military_interval: Duration,
    /// Offset of the military cadence relative to startup
    pub military_stagger: Duration,
    pub summary_interval: Duration,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            civilian_interval: Duration::from_secs(30),
            military_interval: Duration::from_secs(15 * 60),
            military_stagger: Duration::from_secs(15),
            summary_interval: Duration::from_secs(60 * 60),
        }
    }
}

impl ScheduleConfig {
    /// Check that all intervals are non-zero and that no military deadline
    /// (`stagger + k * military`) can ever land on a civilian deadline
    /// (`j * civilian`). That holds exactly when the stagger is not a
    /// multiple of `gcd(civilian, military)`.
    pub fn validate(&self) -> Result<(), ScheduleError> {
        for phase in Phase::ALL {
            if self.interval(phase).is_zero() {
                return Err(ScheduleError::ZeroInterval(phase));
            }
        }

        let step = gcd(
            self.civilian_interval.as_millis(),
            self.military_interval.as_millis(),
        );
        if step == 0 || self.military_stagger.as_millis() % step == 0 {
            return Err(ScheduleError::DeadlineCollision {
                stagger: self.military_stagger,
            });
        }

        Ok(())
    }

    pub fn interval(&self, phase: Phase) -> Duration {
        match phase {
            Phase::Civilian => self.civilian_interval,
            Phase::Military => self.military_interval,
            Phase::Summary => self.summary_interval,
        }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

#[derive(Debug, Clone, Copy)]
struct PhaseTimer {
    period: Duration,
    next: Instant,
}

/// Next deadline of every phase.
#[derive(Debug, Clone)]
pub struct ScheduleState {
    timers: [PhaseTimer; 3],
}

impl ScheduleState {
    pub fn new(config: &ScheduleConfig, start: Instant) -> Self {
        let timer = |phase: Phase, offset: Duration| PhaseTimer {
            period: config.interval(phase),
            next: start + offset + config.interval(phase),
        };

        Self {
            timers: [
                timer(Phase::Civilian, Duration::ZERO),
                timer(Phase::Military, config.military_stagger),
                timer(Phase::Summary, Duration::ZERO),
            ],
        }
    }

    /// The phase whose deadline elapses first, ties going to the phase
    /// declared first.
    pub fn next_due(&self) -> (Phase, Instant) {
        Phase::ALL
            .into_iter()
            .map(|phase| (phase, self.deadline(phase)))
            .min_by_key(|&(phase, deadline)| (deadline, phase))
            .unwrap_or((Phase::Civilian, self.deadline(Phase::Civilian)))
    }

    pub fn deadline(&self, phase: Phase) -> Instant {
        self.timers[phase as usize].next
    }

    pub fn remaining(&self, phase: Phase, now: Instant) -> Duration {
        self.deadline(phase).saturating_duration_since(now)
    }

    /// Move `phase` to its first deadline after `now`. Deadlines missed
    /// while a firing overran are skipped rather than queued.
    pub fn advance(&mut self, phase: Phase, now: Instant) {
        let timer = &mut self.timers[phase as usize];
        while timer.next <= now {
            timer.next += timer.period;
        }
    }
}

/// Statistics for the scheduler.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    pub civilian_fetches: AtomicU64,
    pub military_fetches: AtomicU64,
    pub fetch_failures: AtomicU64,
    pub decode_failures: AtomicU64,
    pub records_merged: AtomicU64,
    pub summaries: AtomicU64,
    pub last_fetch_ms: AtomicU64,
}

impl SchedulerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            civilian_fetches: self.civilian_fetches.load(Ordering::Relaxed),
            military_fetches: self.military_fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            records_merged: self.records_merged.load(Ordering::Relaxed),
            summaries: self.summaries.load(Ordering::Relaxed),
            last_fetch_ms: self.last_fetch_ms.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub civilian_fetches: u64,
    pub military_fetches: u64,
    pub fetch_failures: u64,
    pub decode_failures: u64,
    pub records_merged: u64,
    pub summaries: u64,
    pub last_fetch_ms: u64,
}

/// Single-dispatcher scheduler driving fetch, enrichment and summaries.
pub struct FetchScheduler<S> {
    source: S,
    processor: IngestionProcessor,
    endpoints: FeedEndpoints,
    config: ScheduleConfig,
    dashboard: Dashboard,
    stats: Arc<SchedulerStats>,
}

impl<S: FeedSource> FetchScheduler<S> {
    pub fn new(
        source: S,
        processor: IngestionProcessor,
        endpoints: FeedEndpoints,
        dashboard: Dashboard,
        config: ScheduleConfig,
    ) -> Result<Self, ScheduleError> {
        config.validate()?;

        Ok(Self {
            source,
            processor,
            endpoints,
            config,
            dashboard,
            stats: Arc::new(SchedulerStats::new()),
        })
    }

    /// Get a reference to the scheduler stats.
    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    pub fn dashboard(&self) -> &Dashboard {
        &self.dashboard
    }

    pub fn into_dashboard(self) -> Dashboard {
        self.dashboard
    }

    /// Run until `shutdown` is cancelled.
    pub async fn run(&mut self, shutdown: CancellationToken) {
        let start = Instant::now();
        let mut state = ScheduleState::new(&self.config, start);

        tracing::info!(
            civilian = ?self.config.civilian_interval,
            military = ?self.config.military_interval,
            stagger = ?self.config.military_stagger,
            summary = ?self.config.summary_interval,
            "Starting fetch scheduler"
        );

        // military feed runs once at boot, ahead of its staggered cadence
        self.fire(Phase::Military).await;

        loop {
            let (phase, deadline) = state.next_due();
            tracing::trace!(
                %phase,
                remaining = ?state.remaining(phase, Instant::now()),
                "Waiting for next deadline"
            );

            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping fetch scheduler");
                    break;
                }
                _ = sleep_until(deadline) => {}
            }

            self.fire(phase).await;
            state.advance(phase, Instant::now());
        }
    }

    async fn fire(&mut self, phase: Phase) {
        match phase {
            Phase::Civilian => self.fire_fetch(FeedKind::Civilian).await,
            Phase::Military => self.fire_fetch(FeedKind::Military).await,
            Phase::Summary => {
                self.summarize();
            }
        }
    }

    async fn fire_fetch(&mut self, kind: FeedKind) {
        let started = Instant::now();

        match self.fetch_and_process(kind).await {
            Ok(result) => {
                let elapsed = started.elapsed();
                self.stats
                    .records_merged
                    .fetch_add(result.merged as u64, Ordering::Relaxed);
                self.stats
                    .last_fetch_ms
                    .store(elapsed.as_millis() as u64, Ordering::Relaxed);

                tracing::info!(
                    feed = %kind,
                    aircraft = result.merged,
                    unknown_types = result.unknown_types,
                    elapsed = ?elapsed,
                    "Fetched aircraft"
                );
            }
            Err(e) => {
                let counter = match e {
                    TickError::Fetch(_) => &self.stats.fetch_failures,
                    TickError::Decode(_) => &self.stats.decode_failures,
                };
                counter.fetch_add(1, Ordering::Relaxed);

                tracing::error!(feed = %kind, error = %e, "Tick failed");
            }
        }
    }

    async fn fetch_and_process(&mut self, kind: FeedKind) -> Result<ProcessResult, TickError> {
        let url = match kind {
            FeedKind::Civilian => {
                self.stats.civilian_fetches.fetch_add(1, Ordering::Relaxed);
                self.endpoints.civilian_url()
            }
            FeedKind::Military => {
                self.stats.military_fetches.fetch_add(1, Ordering::Relaxed);
                self.endpoints.military_url()
            }
        };

        let data = self.source.fetch(&url).await?;
        let result = self.processor.process(kind, &data, &mut self.dashboard)?;
        Ok(result)
    }

    fn summarize(&self) -> Summary {
        self.stats.summaries.fetch_add(1, Ordering::Relaxed);
        self.dashboard.trigger_summary()
    }
}
