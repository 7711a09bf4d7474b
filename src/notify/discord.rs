//! Discord delivery.
//!
//! Notifications are posted as a single embed through the Discord REST API.
//! Only the accept/reject signal of the destination matters to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::payload::Notification;
use crate::config::DiscordConfig;
use crate::error::{RelayError, Result};

/// Destination for formatted notifications.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Deliver `notification` to `destination`.
    ///
    /// `Ok` means the destination accepted the message.
    async fn deliver(&self, destination: &str, notification: &Notification) -> Result<()>;
}

/// Request body of a channel message.
#[derive(Debug, Serialize)]
pub struct MessageBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub embeds: Vec<Embed>,
    pub allowed_mentions: AllowedMentions,
}

/// Rich embed.
#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
    pub footer: EmbedFooter,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<EmbedAuthor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<EmbedThumbnail>,
}

#[derive(Debug, Serialize)]
pub struct EmbedFooter {
    pub text: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedAuthor {
    pub name: String,
}

#[derive(Debug, Serialize)]
pub struct EmbedThumbnail {
    pub url: String,
}

/// Mentions Discord is allowed to resolve.
///
/// `parse` stays empty so that only the listed role can ping.
#[derive(Debug, Serialize)]
pub struct AllowedMentions {
    pub parse: Vec<String>,
    pub roles: Vec<String>,
}

impl From<&Notification> for MessageBody {
    fn from(n: &Notification) -> Self {
        Self {
            content: n.content(),
            embeds: vec![Embed {
                title: n.title.clone(),
                url: n.url.clone(),
                description: n.body.clone(),
                color: n.color,
                timestamp: n.timestamp.to_rfc3339(),
                footer: EmbedFooter {
                    text: n.footer.clone(),
                },
                author: n.author.clone().map(|name| EmbedAuthor { name }),
                thumbnail: n.thumbnail_url.clone().map(|url| EmbedThumbnail { url }),
            }],
            allowed_mentions: AllowedMentions {
                parse: Vec::new(),
                roles: n.mention_role.iter().cloned().collect(),
            },
        }
    }
}

/// Delivery sink posting to Discord channels with a bot token.
pub struct DiscordSink {
    client: Client,
    api_base: String,
    token: String,
}

impl DiscordSink {
    /// Create a sink from Discord settings.
    pub fn new(config: &DiscordConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("feedrelay/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RelayError::Delivery(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        })
    }

    /// Endpoint for posting into `channel_id`.
    pub fn message_url(&self, channel_id: &str) -> String {
        format!("{}/channels/{}/messages", self.api_base, channel_id)
    }
}

#[async_trait]
impl DeliverySink for DiscordSink {
    async fn deliver(&self, destination: &str, notification: &Notification) -> Result<()> {
        let url = self.message_url(destination);
        let body = MessageBody::from(notification);

        let response = self
            .client
            .post(&url)
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Delivery(format!("failed to send message: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(RelayError::Delivery(format!(
                "channel {} rejected message: {} {}",
                destination,
                status,
                detail.trim()
            )));
        }

        debug!("Delivered \"{}\" to channel {}", notification.title, destination);
        Ok(())
    }
}
