//! Selection of entries that still need delivering.

use crate::config::FeedConfig;
use crate::feed::Entry;
use crate::history::History;
use crate::identity::identity;

/// Pick the entries of `feed` whose identity is not yet in `history`.
///
/// Fetch order is preserved and at most `max` entries are returned; the
/// rest stay unseen and are picked up by later cycles. Because the history
/// is only updated after delivery, calling this twice without recording
/// anything yields the same selection.
pub fn reconcile<'a>(
    feed: &FeedConfig,
    entries: &'a [Entry],
    history: &History,
    max: usize,
) -> Vec<&'a Entry> {
    entries
        .iter()
        .filter(|entry| !history.contains(&feed.name, &identity(entry)))
        .take(max)
        .collect()
}
