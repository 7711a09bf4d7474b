//! Configuration module for feedrelay.
//!
//! Configuration is read once at startup from a TOML file, then patched with
//! environment variable overrides. Business logic only ever sees the
//! resulting [`Config`]; nothing below `main` reads the environment.

use serde::Deserialize;
use std::collections::HashSet;
use std::fmt;
use std::path::Path;

use crate::feed::validate_url;
use crate::{RelayError, Result};

/// Environment variable holding the Discord bot token.
pub const ENV_DISCORD_TOKEN: &str = "DISCORD_TOKEN";

/// Environment variable holding the admin API token.
pub const ENV_ADMIN_TOKEN: &str = "FEEDRELAY_ADMIN_TOKEN";

/// Environment variable naming the config file to load.
pub const ENV_CONFIG_PATH: &str = "FEEDRELAY_CONFIG";

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/feedrelay.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Polling cycle configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before the first timer-driven cycle, in seconds.
    #[serde(default = "default_initial_delay")]
    pub initial_delay_secs: u64,
    /// Interval between timer-driven cycles, in seconds.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,
    /// Pause between two fetched feeds, in seconds.
    #[serde(default = "default_feed_pause")]
    pub feed_pause_secs: u64,
    /// Maximum entries delivered per feed per cycle.
    #[serde(default = "default_max_per_cycle")]
    pub max_per_cycle: usize,
}

fn default_initial_delay() -> u64 {
    10
}

fn default_interval() -> u64 {
    2700 // 45 minutes
}

fn default_feed_pause() -> u64 {
    2
}

fn default_max_per_cycle() -> usize {
    3
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            initial_delay_secs: default_initial_delay(),
            interval_secs: default_interval(),
            feed_pause_secs: default_feed_pause(),
            max_per_cycle: default_max_per_cycle(),
        }
    }
}

/// Delivery history configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryConfig {
    /// Path to the JSON history file.
    #[serde(default = "default_history_path")]
    pub path: String,
    /// Identities remembered per feed.
    #[serde(default = "default_history_cap")]
    pub max_entries_per_feed: usize,
}

fn default_history_path() -> String {
    "data/sent_articles.json".to_string()
}

fn default_history_cap() -> usize {
    100
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            max_entries_per_feed: default_history_cap(),
        }
    }
}

/// HTTP fetch configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Connection timeout in seconds.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Read timeout in seconds.
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
    /// Total request timeout in seconds.
    #[serde(default = "default_total_timeout")]
    pub total_timeout_secs: u64,
    /// Maximum number of redirects.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,
    /// Maximum feed size in bytes.
    #[serde(default = "default_max_feed_size")]
    pub max_feed_size_bytes: u64,
    /// User agent sent with feed requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    20
}

fn default_total_timeout() -> u64 {
    30
}

fn default_max_redirects() -> usize {
    5
}

fn default_max_feed_size() -> u64 {
    5 * 1024 * 1024 // 5MB
}

fn default_user_agent() -> String {
    format!("feedrelay/{}", env!("CARGO_PKG_VERSION"))
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
            total_timeout_secs: default_total_timeout(),
            max_redirects: default_max_redirects(),
            max_feed_size_bytes: default_max_feed_size(),
            user_agent: default_user_agent(),
        }
    }
}

/// Discord delivery configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscordConfig {
    /// Bot token (usually supplied through `DISCORD_TOKEN`).
    #[serde(default)]
    pub token: String,
    /// REST API base URL.
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// Request timeout in seconds.
    #[serde(default = "default_discord_timeout")]
    pub timeout_secs: u64,
}

fn default_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}

fn default_discord_timeout() -> u64 {
    15
}

impl Default for DiscordConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            api_base: default_api_base(),
            timeout_secs: default_discord_timeout(),
        }
    }
}

/// Admin HTTP API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AdminConfig {
    /// Whether the admin API is served.
    #[serde(default)]
    pub enabled: bool,
    /// Host address to bind.
    #[serde(default = "default_admin_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_admin_port")]
    pub port: u16,
    /// Bearer token required on admin routes.
    #[serde(default)]
    pub token: String,
}

fn default_admin_host() -> String {
    "127.0.0.1".to_string()
}

fn default_admin_port() -> u16 {
    8080
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: default_admin_host(),
            port: default_admin_port(),
            token: String::new(),
        }
    }
}

/// Why a feed is left out of a polling cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The feed is switched off in the configuration.
    Disabled,
    /// No destination channel is configured.
    MissingDestination,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::Disabled => write!(f, "disabled"),
            SkipReason::MissingDestination => write!(f, "no destination channel"),
        }
    }
}

/// A single monitored feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FeedConfig {
    /// Unique feed name; keys the delivery history and appears in footers.
    pub name: String,
    /// Feed URL.
    pub url: String,
    /// Destination channel id.
    #[serde(default)]
    pub channel_id: Option<String>,
    /// Role mentioned on every notification, if any.
    #[serde(default)]
    pub role_id: Option<String>,
    /// Whether the feed is polled.
    #[serde(default = "default_feed_enabled")]
    pub enabled: bool,
    /// Prefix for `<KEY>_CHANNEL_ID` / `<KEY>_ROLE_ID` overrides.
    #[serde(default)]
    pub env_key: Option<String>,
}

fn default_feed_enabled() -> bool {
    true
}

impl FeedConfig {
    /// Create an enabled feed without a destination.
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            channel_id: None,
            role_id: None,
            enabled: true,
            env_key: None,
        }
    }

    /// Set the destination channel.
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    /// Set the mentioned role.
    pub fn with_role(mut self, role_id: impl Into<String>) -> Self {
        self.role_id = Some(role_id.into());
        self
    }

    /// Switch the feed off.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }

    /// Destination channel, if a usable one is configured.
    pub fn destination(&self) -> Option<&str> {
        usable(self.channel_id.as_deref())
    }

    /// Role to mention, if a usable one is configured.
    pub fn audience(&self) -> Option<&str> {
        usable(self.role_id.as_deref())
    }

    /// Channel this feed delivers to, or the reason it is not polled.
    pub fn delivery_target(&self) -> std::result::Result<&str, SkipReason> {
        if !self.enabled {
            return Err(SkipReason::Disabled);
        }
        self.destination().ok_or(SkipReason::MissingDestination)
    }

    /// Reason this feed is skipped, or `None` when it is polled.
    pub fn skip_reason(&self) -> Option<SkipReason> {
        self.delivery_target().err()
    }

    /// Whether the feed takes part in polling cycles.
    pub fn is_active(&self) -> bool {
        self.skip_reason().is_none()
    }

    /// Environment variable prefix for this feed.
    ///
    /// "Humble Games" becomes `HUMBLE_GAMES`.
    pub fn env_prefix(&self) -> String {
        match &self.env_key {
            Some(key) if !key.trim().is_empty() => key.trim().to_uppercase(),
            _ => self
                .name
                .chars()
                .map(|c| {
                    if c.is_ascii_alphanumeric() {
                        c.to_ascii_uppercase()
                    } else {
                        '_'
                    }
                })
                .collect(),
        }
    }
}

/// Treat empty and "undefined" ids as absent.
fn usable(value: Option<&str>) -> Option<&str> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != "undefined" && *v != "null")
}

fn default_feeds() -> Vec<FeedConfig> {
    vec![
        FeedConfig::new(
            "Humble Games",
            "https://feuerlord2.github.io/Humble-RSS-Site/games.rss",
        ),
        FeedConfig::new(
            "Humble Books",
            "https://feuerlord2.github.io/Humble-RSS-Site/books.rss",
        ),
        FeedConfig::new(
            "Humble Software",
            "https://feuerlord2.github.io/Humble-RSS-Site/software.rss",
        ),
        FeedConfig::new(
            "Fanatical Games",
            "https://feuerlord2.github.io/Fanatical-RSS-Site/games.rss",
        ),
        FeedConfig::new(
            "Fanatical Books",
            "https://feuerlord2.github.io/Fanatical-RSS-Site/books.rss",
        ),
        FeedConfig::new(
            "Fanatical Software",
            "https://feuerlord2.github.io/Fanatical-RSS-Site/software.rss",
        ),
    ]
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Polling cycle configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Delivery history configuration.
    #[serde(default)]
    pub history: HistoryConfig,
    /// HTTP fetch configuration.
    #[serde(default)]
    pub fetch: FetchConfig,
    /// Discord delivery configuration.
    #[serde(default)]
    pub discord: DiscordConfig,
    /// Admin API configuration.
    #[serde(default)]
    pub admin: AdminConfig,
    /// Monitored feeds, in polling order.
    #[serde(default = "default_feeds")]
    pub feeds: Vec<FeedConfig>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            scheduler: SchedulerConfig::default(),
            history: HistoryConfig::default(),
            fetch: FetchConfig::default(),
            discord: DiscordConfig::default(),
            admin: AdminConfig::default(),
            feeds: default_feeds(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file that may not exist.
    ///
    /// Returns `Ok(None)` only when the file is missing. An unreadable or
    /// malformed file is an error.
    pub fn load_optional<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        match Self::load(path) {
            Ok(config) => Ok(Some(config)),
            Err(RelayError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| RelayError::Config(format!("config parse error: {e}")))
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_env_overrides_with(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup.
    ///
    /// Supported variables:
    /// - `DISCORD_TOKEN`: bot token
    /// - `FEEDRELAY_ADMIN_TOKEN`: admin API token
    /// - `<KEY>_CHANNEL_ID`, `<KEY>_ROLE_ID`: per-feed destination and role
    pub fn apply_env_overrides_with<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| usable(Some(v.as_str())).is_some());

        if let Some(token) = get(ENV_DISCORD_TOKEN) {
            self.discord.token = token;
        }
        if let Some(token) = get(ENV_ADMIN_TOKEN) {
            self.admin.token = token;
        }

        for feed in &mut self.feeds {
            let prefix = feed.env_prefix();
            if let Some(channel) = get(&format!("{prefix}_CHANNEL_ID")) {
                feed.channel_id = Some(channel.trim().to_string());
            }
            if let Some(role) = get(&format!("{prefix}_ROLE_ID")) {
                feed.role_id = Some(role.trim().to_string());
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for feed in &self.feeds {
            if feed.name.trim().is_empty() {
                return Err(RelayError::Validation("feed name must not be empty".into()));
            }
            if !names.insert(feed.name.as_str()) {
                return Err(RelayError::Validation(format!(
                    "duplicate feed name: {}",
                    feed.name
                )));
            }
            validate_url(&feed.url).map_err(|e| {
                RelayError::Validation(format!("feed {}: {}", feed.name, e))
            })?;
        }

        if self.scheduler.interval_secs == 0 {
            return Err(RelayError::Validation(
                "scheduler.interval_secs must be greater than zero".into(),
            ));
        }
        if self.scheduler.max_per_cycle == 0 {
            return Err(RelayError::Validation(
                "scheduler.max_per_cycle must be greater than zero".into(),
            ));
        }
        if self.history.max_entries_per_feed == 0 {
            return Err(RelayError::Validation(
                "history.max_entries_per_feed must be greater than zero".into(),
            ));
        }
        if self.discord.token.is_empty() {
            return Err(RelayError::Validation(format!(
                "Discord bot token is not set. Set discord.token or {ENV_DISCORD_TOKEN}."
            )));
        }
        if self.admin.enabled && self.admin.token.is_empty() {
            return Err(RelayError::Validation(format!(
                "admin API is enabled but no token is set. Set admin.token or {ENV_ADMIN_TOKEN}."
            )));
        }
        Ok(())
    }

    /// Feeds that take part in polling cycles.
    pub fn active_feeds(&self) -> impl Iterator<Item = &FeedConfig> {
        self.feeds.iter().filter(|f| f.is_active())
    }
}
