//! JSON file history store.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use uuid::Uuid;

use super::{History, HistorySnapshot, HistoryStore};
use crate::error::{RelayError, Result};

/// History persisted as a pretty-printed JSON object.
///
/// ```json
/// {
///   "Humble Games": ["guid-1", "guid-2"]
/// }
/// ```
///
/// Saves go through a temporary file in the same directory that is synced
/// and then renamed over the target, so an interrupted save leaves the
/// previous file intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
    cap: usize,
}

impl JsonFileStore {
    /// Create a store for the given file and per-feed cap.
    pub fn new(path: impl Into<PathBuf>, cap: usize) -> Self {
        Self {
            path: path.into(),
            cap,
        }
    }

    /// Path of the history file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn try_load(&self) -> Result<History> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No history file at {}, starting empty", self.path.display());
                return Ok(History::new(self.cap));
            }
            Err(e) => return Err(e.into()),
        };

        let snapshot: HistorySnapshot = serde_json::from_str(&content)
            .map_err(|e| RelayError::CorruptHistory(format!("{}: {}", self.path.display(), e)))?;

        Ok(History::from_snapshot(snapshot, self.cap))
    }

    fn temp_path(&self) -> PathBuf {
        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "history".to_string());
        self.path
            .with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4().simple()))
    }

    fn write_atomic(&self, content: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let temp_path = self.temp_path();
        let result = (|| {
            let mut file = File::create(&temp_path)?;
            file.write_all(content)?;
            file.sync_all()?;
            fs::rename(&temp_path, &self.path)
        })();

        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
            return result;
        }

        // Make the rename itself durable where the platform allows it.
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
        Ok(())
    }
}

impl HistoryStore for JsonFileStore {
    fn load(&self) -> History {
        match self.try_load() {
            Ok(history) => history,
            Err(e) => {
                warn!("Failed to load delivery history, starting empty: {}", e);
                History::new(self.cap)
            }
        }
    }

    fn save(&self, history: &History) -> Result<()> {
        let content = serde_json::to_vec_pretty(&history.to_snapshot())?;
        self.write_atomic(&content).map_err(|e| {
            RelayError::Persistence(format!("{}: {}", self.path.display(), e))
        })?;
        debug!(
            "Saved delivery history for {} feed(s) to {}",
            history.feed_count(),
            self.path.display()
        );
        Ok(())
    }
}
