//! Config file for running several watches at once
//!
//! ```toml
//! [consumer]
//! poll_interval_ms = 100
//!
//! [[watch]]
//! path = "/srv/inbox"
//! filter = "*.xml"
//!
//! [[watch]]
//! path = "/srv/inbox"
//! notify = ["directory_name"]
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use watcher::WatchConfig;

/// Contents of a dirwatch config file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub consumer: ConsumerConfig,

    #[serde(default, rename = "watch")]
    pub watches: Vec<WatchConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConsumerConfig {
    /// Sleep between polls of an empty queue (default: 100ms)
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl ConsumerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn default_poll_interval_ms() -> u64 {
    100
}

impl FileConfig {
    /// Load and validate a config file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: FileConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.watches.is_empty() {
            anyhow::bail!("No [[watch]] entries configured");
        }

        if !(10..=60_000).contains(&self.consumer.poll_interval_ms) {
            anyhow::bail!(
                "consumer.poll_interval_ms must be between 10 and 60000 (got {})",
                self.consumer.poll_interval_ms
            );
        }

        for (i, watch) in self.watches.iter().enumerate() {
            if watch.path.as_os_str().is_empty() {
                anyhow::bail!("watch #{} has an empty path", i + 1);
            }
            if watch.open_retry.interval_ms == 0 {
                anyhow::bail!("watch #{} has open_retry.interval_ms = 0", i + 1);
            }
        }

        Ok(())
    }
}

/// Example configuration printed by `dirwatch example-config`
pub fn example_config() -> &'static str {
    r#"# dirwatch configuration

[consumer]
# Sleep between polls of an empty queue
poll_interval_ms = 100

# XML files anywhere under the inbox
[[watch]]
path = "/srv/inbox"
filter = "*.xml"

# Directory structure changes only
[[watch]]
path = "/srv/inbox"
notify = ["directory_name"]

# Everything, waiting forever on files still being copied
[[watch]]
path = "/srv/drop"
modify_suppression_ms = 500

[watch.open_retry]
interval_ms = 100
max_attempts = 0   # 0 = no limit
"#
}
