//! Test helpers for integration tests.
//!
//! Provides scripted feed sources, recording delivery sinks and builders for
//! schedulers wired to them.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use feedrelay::history::HistoryStore;
use feedrelay::{
    DeliverySink, Entry, FeedConfig, FeedSource, Notification, RelayError, Result, Scheduler,
    SchedulerSettings,
};

/// Default timeout for test operations.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Feed source answering from a per-URL script.
#[derive(Default)]
pub struct ScriptedSource {
    responses: Mutex<HashMap<String, std::result::Result<Vec<Entry>, String>>>,
    fetches: Mutex<Vec<String>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `entries` for `url`.
    pub fn set(&self, url: &str, entries: Vec<Entry>) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Ok(entries));
    }

    /// Fail every fetch of `url`.
    pub fn fail(&self, url: &str, message: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(message.to_string()));
    }

    /// Total number of fetches.
    pub fn fetch_count(&self) -> usize {
        self.fetches.lock().unwrap().len()
    }

    /// Number of fetches of `url`.
    pub fn fetches_of(&self, url: &str) -> usize {
        self.fetches
            .lock()
            .unwrap()
            .iter()
            .filter(|u| u.as_str() == url)
            .count()
    }
}

#[async_trait]
impl FeedSource for ScriptedSource {
    async fn fetch(&self, url: &str) -> Result<Vec<Entry>> {
        self.fetches.lock().unwrap().push(url.to_string());
        match self.responses.lock().unwrap().get(url) {
            Some(Ok(entries)) => Ok(entries.clone()),
            Some(Err(message)) => Err(RelayError::Fetch(message.clone())),
            None => Err(RelayError::Fetch(format!("HTTP error: 404 for {url}"))),
        }
    }
}

/// Sink that records deliveries and rejects chosen titles.
#[derive(Default)]
pub struct RecordingSink {
    delivered: Mutex<Vec<(String, Notification)>>,
    rejected_titles: Mutex<HashSet<String>>,
    max_title_chars: Mutex<Option<usize>>,
    attempts: AtomicUsize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject notifications with this title.
    pub fn reject(&self, title: &str) {
        self.rejected_titles.lock().unwrap().insert(title.to_string());
    }

    /// Reject notifications whose title is longer than `max` characters,
    /// the way Discord answers 400 for an oversized embed.
    pub fn limit_titles(&self, max: usize) {
        *self.max_title_chars.lock().unwrap() = Some(max);
    }

    /// Accept everything again.
    pub fn accept_all(&self) {
        self.rejected_titles.lock().unwrap().clear();
        *self.max_title_chars.lock().unwrap() = None;
    }

    /// Accepted notifications with their destination.
    pub fn delivered(&self) -> Vec<(String, Notification)> {
        self.delivered.lock().unwrap().clone()
    }

    /// Titles of accepted notifications, in delivery order.
    pub fn titles(&self) -> Vec<String> {
        self.delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, n)| n.title.clone())
            .collect()
    }

    /// Delivery attempts, accepted or not.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeliverySink for RecordingSink {
    async fn deliver(&self, destination: &str, notification: &Notification) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.rejected_titles.lock().unwrap().contains(&notification.title) {
            return Err(RelayError::Delivery(format!(
                "channel {destination} rejected message: 403 Forbidden"
            )));
        }
        if let Some(max) = *self.max_title_chars.lock().unwrap() {
            if notification.title.chars().count() > max {
                return Err(RelayError::Delivery(format!(
                    "channel {destination} rejected message: 400 Bad Request"
                )));
            }
        }
        self.delivered
            .lock()
            .unwrap()
            .push((destination.to_string(), notification.clone()));
        Ok(())
    }
}

/// Sink that parks every delivery until released.
#[derive(Default)]
pub struct GateSink {
    pub entered: Notify,
    pub release: Notify,
}

#[async_trait]
impl DeliverySink for GateSink {
    async fn deliver(&self, _destination: &str, _notification: &Notification) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        Ok(())
    }
}

/// URL used for a feed named `name`.
pub fn feed_url(name: &str) -> String {
    format!(
        "https://feeds.example.com/{}.rss",
        name.to_lowercase().replace(' ', "-")
    )
}

/// Enabled feed with a destination channel.
pub fn feed(name: &str, channel: &str) -> FeedConfig {
    FeedConfig::new(name, feed_url(name)).with_channel(channel)
}

/// Entries with the given guids, titled "Deal <guid>".
pub fn entries(guids: &[&str]) -> Vec<Entry> {
    guids
        .iter()
        .map(|g| Entry::new(format!("Deal {g}")).with_guid(*g))
        .collect()
}

/// Settings without delays.
pub fn fast_settings() -> SchedulerSettings {
    SchedulerSettings {
        initial_delay: Duration::ZERO,
        interval: Duration::from_secs(3600),
        feed_pause: Duration::ZERO,
        max_per_cycle: 3,
    }
}

/// Scheduler over the given collaborators.
pub fn scheduler(
    feeds: Vec<FeedConfig>,
    source: Arc<dyn FeedSource>,
    sink: Arc<dyn DeliverySink>,
    store: Arc<dyn HistoryStore>,
) -> Arc<Scheduler> {
    Arc::new(Scheduler::new(feeds, source, sink, store, fast_settings()))
}
