//! Human-readable progress reporting

use std::sync::Mutex;
use tracing::info;

/// Receives one line per phase milestone and per notable item
pub trait ProgressSink: Send + Sync {
    fn line(&self, message: &str);
}

/// Forwards progress lines to the `tracing` subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingProgress;

impl ProgressSink for TracingProgress {
    fn line(&self, message: &str) {
        info!("{}", message);
    }
}

/// Keeps every line in memory
#[derive(Debug, Default)]
pub struct RecordingProgress {
    lines: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn lines(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }
}

impl ProgressSink for RecordingProgress {
    fn line(&self, message: &str) {
        match self.lines.lock() {
            Ok(mut lines) => lines.push(message.to_string()),
            Err(poisoned) => poisoned.into_inner().push(message.to_string()),
        }
    }
}
