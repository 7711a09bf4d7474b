//! Notification formatting and delivery.

pub mod discord;
pub mod payload;

pub use discord::{DeliverySink, DiscordSink};
pub use payload::{
    truncate_body, truncate_chars, Notification, MAX_AUTHOR_CHARS, MAX_BODY_CHARS, MAX_TITLE_CHARS,
};
