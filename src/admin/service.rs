//! Administrative operations over a running scheduler.

use std::sync::Arc;

use serde::Serialize;
use tracing::{error, info};

use crate::error::RelayError;
use crate::scheduler::{CycleReport, Scheduler};

/// A feed left out of polling and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InactiveFeed {
    pub name: String,
    pub reason: String,
}

/// Active and inactive feeds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub active: Vec<String>,
    pub inactive: Vec<InactiveFeed>,
}

/// Counts of a manually triggered cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckSummary {
    pub delivered: usize,
    pub failed: usize,
    pub unreachable: usize,
    pub skipped: usize,
    pub history_saved: bool,
}

impl From<&CycleReport> for CheckSummary {
    fn from(report: &CycleReport) -> Self {
        Self {
            delivered: report.delivered(),
            failed: report.failed(),
            unreachable: report.fetch_failures(),
            skipped: report.skipped(),
            history_saved: report.saved,
        }
    }
}

/// Result of a manual check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckOutcome {
    Completed(CheckSummary),
    /// Another cycle was running; nothing was done.
    Busy,
    /// The cycle could not be run. Details are only logged.
    Failed,
}

/// Administrative operations. Callers are authenticated by the transport.
pub struct AdminService {
    scheduler: Arc<Scheduler>,
}

impl AdminService {
    /// Create a service over `scheduler`.
    pub fn new(scheduler: Arc<Scheduler>) -> Self {
        Self { scheduler }
    }

    /// Current feed status.
    pub fn status(&self) -> StatusReport {
        let mut active = Vec::new();
        let mut inactive = Vec::new();
        for feed in self.scheduler.feeds() {
            match feed.skip_reason() {
                None => active.push(feed.name.clone()),
                Some(reason) => inactive.push(InactiveFeed {
                    name: feed.name.clone(),
                    reason: reason.to_string(),
                }),
            }
        }
        StatusReport { active, inactive }
    }

    /// Run a cycle now.
    pub async fn check(&self) -> CheckOutcome {
        info!("Manual check requested");
        match self.scheduler.run_cycle().await {
            Ok(report) => CheckOutcome::Completed(CheckSummary::from(&report)),
            Err(RelayError::CycleInProgress) => {
                info!("Manual check refused, a cycle is already running");
                CheckOutcome::Busy
            }
            Err(e) => {
                error!("Manual check failed: {}", e);
                CheckOutcome::Failed
            }
        }
    }
}
