use std::sync::Arc;

use tracing::{error, info, warn};

use feedrelay::admin::{http as admin_http, AdminService, AdminState};
use feedrelay::config::{Config, ENV_CONFIG_PATH};
use feedrelay::{DiscordSink, HttpFeedSource, JsonFileStore, Scheduler, SchedulerSettings};

#[tokio::main]
async fn main() {
    let config_path =
        std::env::var(ENV_CONFIG_PATH).unwrap_or_else(|_| "config.toml".to_string());

    // Load configuration
    let mut config = match Config::load_optional(&config_path) {
        Ok(Some(config)) => config,
        Ok(None) => {
            eprintln!("No {config_path} found, using default configuration.");
            Config::default()
        }
        Err(e) => {
            eprintln!("Failed to load {config_path}: {e}");
            std::process::exit(1);
        }
    };
    config.apply_env_overrides();

    // Initialize logging
    if let Err(e) = feedrelay::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        feedrelay::logging::init_console_only(&config.logging.level);
    }
    feedrelay::logging::install_panic_hook();

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        std::process::exit(1);
    }

    info!("feedrelay {} starting", env!("CARGO_PKG_VERSION"));
    if let Err(e) = run(config).await {
        error!("Fatal error: {}", e);
        std::process::exit(1);
    }
}

async fn run(config: Config) -> feedrelay::Result<()> {
    log_feed_summary(&config);

    let source = Arc::new(HttpFeedSource::new(&config.fetch)?);
    let sink = Arc::new(DiscordSink::new(&config.discord)?);
    let store = Arc::new(JsonFileStore::new(
        &config.history.path,
        config.history.max_entries_per_feed,
    ));

    let scheduler = Arc::new(Scheduler::new(
        config.feeds.clone(),
        source,
        sink,
        store,
        SchedulerSettings::from(&config.scheduler),
    ));
    let handle = Arc::clone(&scheduler).start();

    let admin_task = if config.admin.enabled {
        let addr = admin_http::bind_address(&config.admin)?;
        let listener = tokio::net::TcpListener::bind(addr).await?;
        let service = Arc::new(AdminService::new(Arc::clone(&scheduler)));
        let state = Arc::new(AdminState::new(service, config.admin.token.clone()));
        Some(tokio::spawn(async move {
            if let Err(e) = admin_http::serve(listener, state).await {
                error!("Admin API stopped: {}", e);
            }
        }))
    } else {
        None
    };

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
    }
    info!("Shutting down");

    if let Some(task) = admin_task {
        task.abort();
    }
    handle.stop().await;
    Ok(())
}

fn log_feed_summary(config: &Config) {
    let skipped: Vec<_> = config
        .feeds
        .iter()
        .filter_map(|feed| feed.skip_reason().map(|reason| (feed, reason)))
        .collect();

    if !skipped.is_empty() {
        warn!("The following feeds will be skipped:");
        for (feed, reason) in &skipped {
            warn!("  - {} ({})", feed.name, reason);
        }
    }

    info!("Monitoring {} feed(s)", config.active_feeds().count());
    for feed in config.active_feeds() {
        let destination = feed.destination().unwrap_or_default();
        match feed.audience() {
            Some(role) => info!("  - {} -> channel {} (mentions role {})", feed.name, destination, role),
            None => info!("  - {} -> channel {} (no role mention)", feed.name, destination),
        }
    }
}
