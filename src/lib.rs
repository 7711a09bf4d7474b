//! feedrelay - syndication feed to Discord relay
//!
//! Polls a fixed set of RSS/Atom feeds, works out which entries were not
//! delivered yet and posts each new one to a Discord channel, mentioning a
//! role where configured. Delivery is at-least-once: an entry is remembered
//! only after the channel accepted it.

pub mod admin;
pub mod config;
pub mod error;
pub mod feed;
pub mod history;
pub mod identity;
pub mod logging;
pub mod notify;
pub mod reconcile;
pub mod scheduler;

pub use admin::{AdminService, CheckOutcome};
pub use config::{Config, FeedConfig, SkipReason};
pub use error::{RelayError, Result};
pub use feed::{Entry, FeedSource, HttpFeedSource};
pub use history::{History, HistoryStore, JsonFileStore, MemoryStore};
pub use identity::{identity, EntryIdentity};
pub use notify::{DeliverySink, DiscordSink, Notification};
pub use reconcile::reconcile;
pub use scheduler::{CycleReport, FeedOutcome, Scheduler, SchedulerHandle, SchedulerSettings};
