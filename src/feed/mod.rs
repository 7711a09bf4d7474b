//! Feed entries and the fetcher boundary.

pub mod fetcher;
pub mod types;

pub use fetcher::{parse_feed, strip_html, validate_url, FeedSource, HttpFeedSource};
pub use types::Entry;
