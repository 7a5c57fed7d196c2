// src/pattern_log.rs
// Append-only record of detected flags, one line per detection.

use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info};
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::errors::ServiceError;
use crate::types::PatternResult;

#[derive(Debug, Clone)]
pub struct PatternLog {
    path: PathBuf,
}

impl PatternLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `None` for results that are not detections.
    pub fn format_entry(timestamp: DateTime<Utc>, pair: &str, result: &PatternResult) -> Option<String> {
        if !result.found {
            return None;
        }
        let (target, height) = (result.target_price?, result.flagpole_height?);
        Some(format!(
            "{} - {} - {} Flag detected. Target Price: {}, Flagpole Height: {}",
            timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            pair,
            result.orientation.name(),
            target,
            height
        ))
    }

    /// Appends the detection and returns whether anything was written.
    pub async fn record(&self, pair: &str, result: &PatternResult) -> Result<bool, ServiceError> {
        let Some(line) = Self::format_entry(Utc::now(), pair, result) else {
            debug!("{} {} flag not found, nothing to log", pair, result.orientation.name());
            return Ok(false);
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path).await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await?;

        info!("{}", line);
        Ok(true)
    }
}
