//! Polling cycles and the background timer.
//!
//! A cycle loads the delivery history, walks the configured feeds in order,
//! delivers the reconciled entries of each one and persists the history once
//! at the end if anything was recorded. Cycles never overlap: both the timer
//! and manual triggers go through [`Scheduler::run_cycle`], which refuses to
//! start while another cycle holds the lock.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{FeedConfig, SchedulerConfig, SkipReason};
use crate::error::{RelayError, Result};
use crate::feed::FeedSource;
use crate::history::{History, HistoryStore};
use crate::identity::identity;
use crate::notify::{DeliverySink, Notification};
use crate::reconcile::reconcile;

/// Timing and selection settings of the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerSettings {
    /// Delay before the first timer cycle.
    pub initial_delay: Duration,
    /// Period between timer cycles.
    pub interval: Duration,
    /// Pause between two fetched feeds.
    pub feed_pause: Duration,
    /// Maximum entries delivered per feed per cycle.
    pub max_per_cycle: usize,
}

impl From<&SchedulerConfig> for SchedulerSettings {
    fn from(config: &SchedulerConfig) -> Self {
        Self {
            initial_delay: Duration::from_secs(config.initial_delay_secs),
            interval: Duration::from_secs(config.interval_secs),
            feed_pause: Duration::from_secs(config.feed_pause_secs),
            max_per_cycle: config.max_per_cycle,
        }
    }
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self::from(&SchedulerConfig::default())
    }
}

/// What happened to one feed during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedOutcome {
    /// Not fetched at all.
    Skipped(SkipReason),
    /// The fetch failed; history was left untouched.
    FetchFailed(String),
    /// The feed was fetched and its new entries processed.
    Processed {
        fetched: usize,
        selected: usize,
        delivered: usize,
        failed: usize,
    },
}

/// Per-feed line of a cycle report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedReport {
    pub feed: String,
    pub outcome: FeedOutcome,
}

/// Summary of a finished cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub feeds: Vec<FeedReport>,
    /// Whether the history was written.
    pub saved: bool,
    /// Error of a failed history write.
    pub save_error: Option<String>,
}

impl CycleReport {
    /// Notifications accepted by their destination.
    pub fn delivered(&self) -> usize {
        self.processed().map(|(_, _, delivered, _)| delivered).sum()
    }

    /// Notifications rejected by their destination.
    pub fn failed(&self) -> usize {
        self.processed().map(|(_, _, _, failed)| failed).sum()
    }

    /// Feeds whose fetch failed.
    pub fn fetch_failures(&self) -> usize {
        self.feeds
            .iter()
            .filter(|r| matches!(r.outcome, FeedOutcome::FetchFailed(_)))
            .count()
    }

    /// Feeds skipped before fetching.
    pub fn skipped(&self) -> usize {
        self.feeds
            .iter()
            .filter(|r| matches!(r.outcome, FeedOutcome::Skipped(_)))
            .count()
    }

    /// Outcome for the named feed.
    pub fn outcome(&self, feed: &str) -> Option<&FeedOutcome> {
        self.feeds
            .iter()
            .find(|r| r.feed == feed)
            .map(|r| &r.outcome)
    }

    fn processed(&self) -> impl Iterator<Item = (usize, usize, usize, usize)> + '_ {
        self.feeds.iter().filter_map(|r| match r.outcome {
            FeedOutcome::Processed {
                fetched,
                selected,
                delivered,
                failed,
            } => Some((fetched, selected, delivered, failed)),
            _ => None,
        })
    }
}

impl fmt::Display for CycleReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} delivered, {} failed, {} feed(s) unreachable, {} skipped",
            self.delivered(),
            self.failed(),
            self.fetch_failures(),
            self.skipped()
        )
    }
}

/// Drives polling cycles over a fixed feed list.
pub struct Scheduler {
    feeds: Vec<FeedConfig>,
    source: Arc<dyn FeedSource>,
    sink: Arc<dyn DeliverySink>,
    store: Arc<dyn HistoryStore>,
    settings: SchedulerSettings,
    cycle_lock: Mutex<()>,
    busy: AtomicBool,
}

/// Raises the busy flag for as long as it lives.
///
/// Dropped when the cycle future completes or is abandoned.
struct BusyFlag<'a>(&'a AtomicBool);

impl<'a> BusyFlag<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for BusyFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl Scheduler {
    /// Create a scheduler over `feeds`, processed in the given order.
    pub fn new(
        feeds: Vec<FeedConfig>,
        source: Arc<dyn FeedSource>,
        sink: Arc<dyn DeliverySink>,
        store: Arc<dyn HistoryStore>,
        settings: SchedulerSettings,
    ) -> Self {
        Self {
            feeds,
            source,
            sink,
            store,
            settings,
            cycle_lock: Mutex::new(()),
            busy: AtomicBool::new(false),
        }
    }

    /// Configured feeds.
    pub fn feeds(&self) -> &[FeedConfig] {
        &self.feeds
    }

    /// Scheduler settings.
    pub fn settings(&self) -> &SchedulerSettings {
        &self.settings
    }

    /// Whether a cycle is currently running.
    ///
    /// Reads a flag only; it never contends with [`Scheduler::run_cycle`]
    /// for the cycle lock.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Run one polling cycle.
    ///
    /// Returns [`RelayError::CycleInProgress`] without doing anything if a
    /// cycle is already running.
    pub async fn run_cycle(&self) -> Result<CycleReport> {
        let _guard = self
            .cycle_lock
            .try_lock()
            .map_err(|_| RelayError::CycleInProgress)?;
        let _busy = BusyFlag::raise(&self.busy);

        info!("Checking {} feed(s)", self.feeds.len());
        let report = self.execute_cycle().await?;
        info!("Cycle finished: {}", report);
        Ok(report)
    }

    async fn execute_cycle(&self) -> Result<CycleReport> {
        let mut history = self.load_history().await?;
        let mut report = CycleReport::default();
        let mut fetched_before = false;

        for feed in &self.feeds {
            let destination = match feed.delivery_target() {
                Ok(destination) => destination,
                Err(reason) => {
                    debug!("Skipping feed {} ({})", feed.name, reason);
                    report.feeds.push(FeedReport {
                        feed: feed.name.clone(),
                        outcome: FeedOutcome::Skipped(reason),
                    });
                    continue;
                }
            };

            if fetched_before && !self.settings.feed_pause.is_zero() {
                sleep(self.settings.feed_pause).await;
            }
            fetched_before = true;

            let outcome = self.process_feed(feed, destination, &mut history).await;
            report.feeds.push(FeedReport {
                feed: feed.name.clone(),
                outcome,
            });
        }

        if history.recorded_count() > 0 {
            match self.save_history(history).await {
                Ok(()) => report.saved = true,
                Err(e) => {
                    error!("Failed to save delivery history: {}", e);
                    report.save_error = Some(e.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Load the history on the blocking pool.
    async fn load_history(&self) -> Result<History> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.load())
            .await
            .map_err(|e| RelayError::Persistence(format!("history load task failed: {}", e)))
    }

    /// Save the history on the blocking pool.
    async fn save_history(&self, history: History) -> Result<()> {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || store.save(&history))
            .await
            .map_err(|e| RelayError::Persistence(format!("history save task failed: {}", e)))?
    }

    async fn process_feed(
        &self,
        feed: &FeedConfig,
        destination: &str,
        history: &mut History,
    ) -> FeedOutcome {
        debug!("Checking feed {}: {}", feed.name, feed.url);

        let entries = match self.source.fetch(&feed.url).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(feed = %feed.name, error = %e, "Failed to fetch feed");
                return FeedOutcome::FetchFailed(e.to_string());
            }
        };

        let selected = reconcile(feed, &entries, history, self.settings.max_per_cycle);
        let mut delivered = 0;
        let mut failed = 0;

        for entry in &selected {
            let notification = Notification::from_entry(entry, feed, Utc::now());
            match self.sink.deliver(destination, &notification).await {
                Ok(()) => {
                    history.record(&feed.name, identity(entry));
                    delivered += 1;
                }
                Err(e) => {
                    warn!(
                        feed = %feed.name,
                        title = %notification.title,
                        error = %e,
                        "Failed to deliver entry"
                    );
                    failed += 1;
                }
            }
        }

        if delivered > 0 {
            info!("Feed {}: {} new entry(s) delivered", feed.name, delivered);
        } else {
            debug!("Feed {}: nothing new", feed.name);
        }

        FeedOutcome::Processed {
            fetched: entries.len(),
            selected: selected.len(),
            delivered,
            failed,
        }
    }

    /// Start the timer task.
    ///
    /// The first cycle runs after the initial delay, then one per interval.
    /// A tick that finds a cycle running is skipped.
    pub fn start(self: Arc<Self>) -> SchedulerHandle {
        let task = tokio::spawn(async move {
            self.run_timer().await;
        });
        SchedulerHandle { task }
    }

    async fn run_timer(&self) {
        info!(
            "Scheduler started (first check in {} seconds, then every {} seconds)",
            self.settings.initial_delay.as_secs(),
            self.settings.interval.as_secs()
        );

        sleep(self.settings.initial_delay).await;
        let mut timer = interval(self.settings.interval);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            timer.tick().await;
            match self.run_cycle().await {
                Ok(_) => {}
                Err(RelayError::CycleInProgress) => {
                    info!("Skipping scheduled check, a cycle is already running");
                }
                Err(e) => error!("Scheduled check failed: {}", e),
            }
        }
    }
}

/// Handle to a running timer task.
pub struct SchedulerHandle {
    task: JoinHandle<()>,
}

impl SchedulerHandle {
    /// Whether the timer task has ended.
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the timer. A cycle in progress is abandoned.
    pub async fn stop(self) {
        self.task.abort();
        let _ = self.task.await;
        info!("Scheduler stopped");
    }
}
