use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for one drop-folder pipeline.
///
/// All fields except `root` carry defaults so a deployment only has to name
/// the watched directory.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Watched drop folder. Created at startup if absent.
    pub root: PathBuf,
    /// How long the ingestion worker waits for the next page before flushing
    /// a non-empty batch, in milliseconds.
    #[serde(default = "PipelineConfig::default_idle_flush_ms")]
    pub idle_flush_ms: u64,
    /// Capacity of the channel between the watcher callback and the worker.
    #[serde(default = "PipelineConfig::default_channel_capacity")]
    pub channel_capacity: usize,
    /// Page file naming pattern.
    #[serde(default)]
    pub naming: NamingConfig,
    /// Retry policy for reading pages that are still being written.
    #[serde(default)]
    pub retry: RetryConfig,
}

impl PipelineConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            idle_flush_ms: Self::default_idle_flush_ms(),
            channel_capacity: Self::default_channel_capacity(),
            naming: NamingConfig::default(),
            retry: RetryConfig::default(),
        }
    }

    pub fn idle_flush(&self) -> Duration {
        Duration::from_millis(self.idle_flush_ms)
    }

    const fn default_idle_flush_ms() -> u64 {
        // The scanner can sit idle mid-document for a long time.
        500_000
    }

    const fn default_channel_capacity() -> usize {
        64
    }
}

/// Shape of a valid page file name: `<prefix><index_width digits>.<ext>`,
/// case-insensitive.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NamingConfig {
    #[serde(default = "NamingConfig::default_prefix")]
    pub prefix: String,
    #[serde(default = "NamingConfig::default_index_width")]
    pub index_width: usize,
    #[serde(default = "NamingConfig::default_extensions")]
    pub extensions: Vec<String>,
}

impl NamingConfig {
    fn default_prefix() -> String {
        "img_".to_string()
    }

    const fn default_index_width() -> usize {
        3
    }

    fn default_extensions() -> Vec<String> {
        vec!["jpg".to_string(), "png".to_string(), "bmp".to_string()]
    }
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            prefix: Self::default_prefix(),
            index_width: Self::default_index_width(),
            extensions: Self::default_extensions(),
        }
    }
}

/// Typed retry policy for transient read conflicts with the scanner still
/// holding a page open.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts before the read is given up on.
    #[serde(default = "RetryConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Delay between attempts (ms).
    #[serde(default = "RetryConfig::default_backoff_ms")]
    pub backoff_ms: u64,
    /// Grace period before the first read of a freshly created page (ms).
    #[serde(default = "RetryConfig::default_settle_ms")]
    pub settle_ms: u64,
}

impl RetryConfig {
    pub fn backoff(&self) -> Duration {
        Duration::from_millis(self.backoff_ms)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    const fn default_max_attempts() -> u32 {
        5
    }

    const fn default_backoff_ms() -> u64 {
        100
    }

    const fn default_settle_ms() -> u64 {
        100
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            backoff_ms: Self::default_backoff_ms(),
            settle_ms: Self::default_settle_ms(),
        }
    }
}
