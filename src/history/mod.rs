//! Delivery history.
//!
//! The history remembers, per feed, the identities of the most recently
//! delivered entries (oldest first, bounded, FIFO eviction). A [`History`]
//! is the in-memory mapping a polling cycle works on; a [`HistoryStore`]
//! loads it at the start of a cycle and persists it at the end.
//!
//! An identity is recorded only after its notification was accepted by the
//! destination. A crash or failed save between delivery and persistence can
//! therefore cause a repeat delivery, never a lost entry.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::MemoryStore;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use crate::error::Result;
use crate::identity::EntryIdentity;

/// Default number of identities kept per feed.
pub const DEFAULT_HISTORY_CAP: usize = 100;

/// Serialized form of a history: feed name to identities, oldest first.
pub type HistorySnapshot = BTreeMap<String, Vec<String>>;

/// Durable backing for the delivery history.
pub trait HistoryStore: Send + Sync {
    /// Read the persisted history.
    ///
    /// Never fails: missing state yields an empty history, unreadable state
    /// yields an empty history and a logged warning.
    fn load(&self) -> History;

    /// Persist the full history atomically.
    fn save(&self, history: &History) -> Result<()>;
}

/// Bounded, ordered set of delivered identities for one feed.
#[derive(Debug, Clone)]
pub struct FeedHistory {
    order: VecDeque<EntryIdentity>,
    index: HashSet<EntryIdentity>,
    cap: usize,
}

impl FeedHistory {
    /// Create an empty history holding at most `cap` identities.
    pub fn new(cap: usize) -> Self {
        Self {
            order: VecDeque::with_capacity(cap.min(DEFAULT_HISTORY_CAP)),
            index: HashSet::new(),
            cap,
        }
    }

    /// Whether `identity` is remembered.
    pub fn contains(&self, identity: &EntryIdentity) -> bool {
        self.index.contains(identity)
    }

    /// Append an identity, evicting the oldest ones beyond the cap.
    ///
    /// Returns `false` if the identity was already present.
    pub fn push(&mut self, identity: EntryIdentity) -> bool {
        if self.index.contains(&identity) {
            return false;
        }
        self.index.insert(identity.clone());
        self.order.push_back(identity);

        while self.order.len() > self.cap {
            if let Some(oldest) = self.order.pop_front() {
                self.index.remove(&oldest);
            }
        }
        true
    }

    /// Identities, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &EntryIdentity> {
        self.order.iter()
    }

    /// Number of remembered identities.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing is remembered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Delivery history for all feeds.
#[derive(Debug, Clone)]
pub struct History {
    feeds: HashMap<String, FeedHistory>,
    cap: usize,
    recorded: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAP)
    }
}

impl History {
    /// Create an empty history with the given per-feed cap.
    pub fn new(cap: usize) -> Self {
        Self {
            feeds: HashMap::new(),
            cap,
            recorded: 0,
        }
    }

    /// Rebuild a history from its serialized form.
    ///
    /// Lists longer than the cap keep their newest identities; repeated
    /// identities keep their first position.
    pub fn from_snapshot(snapshot: HistorySnapshot, cap: usize) -> Self {
        let mut history = Self::new(cap);
        for (feed, ids) in snapshot {
            let entry = history
                .feeds
                .entry(feed)
                .or_insert_with(|| FeedHistory::new(cap));
            for id in ids {
                entry.push(EntryIdentity::from(id));
            }
        }
        history
    }

    /// Serialized form of this history.
    pub fn to_snapshot(&self) -> HistorySnapshot {
        self.feeds
            .iter()
            .map(|(feed, h)| {
                let ids = h.iter().map(|id| id.as_str().to_string()).collect();
                (feed.clone(), ids)
            })
            .collect()
    }

    /// Per-feed cap.
    pub fn cap(&self) -> usize {
        self.cap
    }

    /// Whether `identity` was delivered for `feed`.
    pub fn contains(&self, feed: &str, identity: &EntryIdentity) -> bool {
        self.feeds
            .get(feed)
            .is_some_and(|h| h.contains(identity))
    }

    /// Remember `identity` as delivered for `feed`.
    ///
    /// Returns `false` if it was already remembered.
    pub fn record(&mut self, feed: &str, identity: EntryIdentity) -> bool {
        let cap = self.cap;
        let added = self
            .feeds
            .entry(feed.to_string())
            .or_insert_with(|| FeedHistory::new(cap))
            .push(identity);
        if added {
            self.recorded += 1;
        }
        added
    }

    /// Identities recorded since this history was created or loaded.
    pub fn recorded_count(&self) -> usize {
        self.recorded
    }

    /// History of a single feed.
    pub fn feed(&self, feed: &str) -> Option<&FeedHistory> {
        self.feeds.get(feed)
    }

    /// Number of feeds with a history.
    pub fn feed_count(&self) -> usize {
        self.feeds.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> EntryIdentity {
        EntryIdentity::from(s)
    }

    #[test]
    fn test_record_and_contains() {
        let mut history = History::new(100);
        assert!(!history.contains("Games", &id("a")));

        assert!(history.record("Games", id("a")));
        assert!(history.contains("Games", &id("a")));
        assert!(!history.contains("Books", &id("a")));
        assert_eq!(history.recorded_count(), 1);
    }

    #[test]
    fn test_record_duplicate_is_noop() {
        let mut history = History::new(100);
        assert!(history.record("Games", id("a")));
        assert!(!history.record("Games", id("a")));
        assert_eq!(history.feed("Games").unwrap().len(), 1);
        assert_eq!(history.recorded_count(), 1);
    }

    #[test]
    fn test_fifo_eviction_at_cap() {
        let mut history = History::new(100);
        for i in 0..150 {
            history.record("Games", id(&format!("item-{i}")));
        }

        let feed = history.feed("Games").unwrap();
        assert_eq!(feed.len(), 100);
        assert_eq!(feed.iter().next().unwrap().as_str(), "item-50");
        assert_eq!(feed.iter().last().unwrap().as_str(), "item-149");
        assert!(!history.contains("Games", &id("item-49")));
        assert!(history.contains("Games", &id("item-50")));
    }

    #[test]
    fn test_eviction_with_small_cap() {
        let mut feed = FeedHistory::new(2);
        feed.push(id("a"));
        feed.push(id("b"));
        feed.push(id("c"));
        let ids: Vec<&str> = feed.iter().map(|i| i.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
        assert!(!feed.contains(&id("a")));

        // An evicted identity can be remembered again.
        assert!(feed.push(id("a")));
    }

    #[test]
    fn test_snapshot_roundtrip_preserves_order() {
        let mut history = History::new(100);
        history.record("Games", id("g1"));
        history.record("Games", id("g2"));
        history.record("Books", id("b1"));

        let snapshot = history.to_snapshot();
        assert_eq!(snapshot["Games"], vec!["g1", "g2"]);

        let restored = History::from_snapshot(snapshot, 100);
        assert!(restored.contains("Games", &id("g2")));
        assert!(restored.contains("Books", &id("b1")));
        assert_eq!(restored.recorded_count(), 0);
    }

    #[test]
    fn test_from_snapshot_applies_cap() {
        let mut snapshot = HistorySnapshot::new();
        snapshot.insert(
            "Games".to_string(),
            (0..120).map(|i| format!("item-{i}")).collect(),
        );

        let history = History::from_snapshot(snapshot, 100);
        let feed = history.feed("Games").unwrap();
        assert_eq!(feed.len(), 100);
        assert_eq!(feed.iter().next().unwrap().as_str(), "item-20");
    }

    #[test]
    fn test_from_snapshot_skips_duplicates() {
        let mut snapshot = HistorySnapshot::new();
        snapshot.insert(
            "Games".to_string(),
            vec!["a".to_string(), "b".to_string(), "a".to_string()],
        );

        let history = History::from_snapshot(snapshot, 100);
        let ids: Vec<&str> = history
            .feed("Games")
            .unwrap()
            .iter()
            .map(|i| i.as_str())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
