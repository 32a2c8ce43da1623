/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     You may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
 *   * MIT license: http://opensource.org/licenses/MIT
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the applicable License for the specific language governing permissions and
 * limitations under that License.
 */

use std::path::PathBuf;
use std::time::Duration;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// Configuration for the Mailroom runtime.
///
/// Loaded from `config.toml` in the XDG configuration directory for `mailroom`. Every section
/// is optional; missing values take the defaults documented on each field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MailroomConfig {
    /// Inbox sizing and enqueue policy
    pub inbox: InboxSection,
    /// Query defaults
    pub query: QuerySection,
    /// Durability journal settings
    pub journal: JournalSection,
    /// Shutdown timing
    pub shutdown: ShutdownSection,
    /// Behavioral switches
    pub behavior: BehaviorSection,
}

/// Inbox sizing and enqueue policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InboxSection {
    /// Bounded queue capacity
    pub capacity: usize,
    /// Initial queue allocation hint
    pub initial_size: usize,
    /// How long an offer waits for space, in milliseconds
    pub offer_timeout_ms: u64,
    /// Number of workers draining each inbox
    pub workers: usize,
}

/// Query defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySection {
    /// Timeout applied to queries that do not specify one, in milliseconds
    pub timeout_ms: u64,
}

/// Durability journal settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalSection {
    /// Directory for file journals; the XDG data directory when unset
    pub directory: Option<PathBuf>,
    /// Maximum time buffered journal writes may wait before being flushed, in milliseconds
    pub flush_delay_ms: u64,
}

/// Shutdown timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownSection {
    /// How long a graceful inbox shutdown may take before workers are cancelled
    pub inbox_timeout_ms: u64,
    /// How long the save request may wait for queue space
    pub save_timeout_ms: u64,
}

/// Behavioral switches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorSection {
    /// Start inboxes as soon as they are built
    pub auto_start: bool,
    /// Log every delivery through the trace stage
    pub trace_deliveries: bool,
}

impl Default for InboxSection {
    fn default() -> Self {
        Self {
            capacity: 1024,
            initial_size: 16,
            offer_timeout_ms: 60_000,
            workers: 1,
        }
    }
}

impl Default for QuerySection {
    fn default() -> Self {
        Self { timeout_ms: 15_000 }
    }
}

impl Default for ShutdownSection {
    fn default() -> Self {
        Self {
            inbox_timeout_ms: 10_000,
            save_timeout_ms: 1_000,
        }
    }
}

impl Default for BehaviorSection {
    fn default() -> Self {
        Self {
            auto_start: true,
            trace_deliveries: false,
        }
    }
}

impl MailroomConfig {
    /// Default offer timeout as a [`Duration`].
    pub const fn offer_timeout(&self) -> Duration {
        Duration::from_millis(self.inbox.offer_timeout_ms)
    }

    /// Default query timeout as a [`Duration`].
    pub const fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query.timeout_ms)
    }

    /// Graceful shutdown budget as a [`Duration`].
    pub const fn shutdown_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown.inbox_timeout_ms)
    }

    /// Save request budget as a [`Duration`].
    pub const fn save_timeout(&self) -> Duration {
        Duration::from_millis(self.shutdown.save_timeout_ms)
    }

    /// Journal flush delay as a [`Duration`].
    pub const fn flush_delay(&self) -> Duration {
        Duration::from_millis(self.journal.flush_delay_ms)
    }

    /// The directory file journals are written to.
    pub fn journal_directory(&self) -> PathBuf {
        if let Some(directory) = &self.journal.directory {
            return directory.clone();
        }
        match xdg::BaseDirectories::with_prefix("mailroom") {
            Ok(dirs) => dirs.get_data_home().join("journal"),
            Err(_) => std::env::temp_dir().join("mailroom").join("journal"),
        }
    }

    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML for this schema.
    pub fn from_toml(source: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(source)?)
    }

    /// Load configuration from XDG-compliant locations.
    ///
    /// Looks for `mailroom/config.toml` under `$XDG_CONFIG_HOME` (or `~/.config`). A missing
    /// file yields the defaults; an unreadable or malformed file is logged and also yields the
    /// defaults.
    pub fn load() -> Self {
        use tracing::{error, info};

        let xdg_dirs = match xdg::BaseDirectories::with_prefix("mailroom") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        let Some(path) = xdg_dirs.find_config_file("config.toml") else {
            info!("No configuration file found, using defaults");
            return Self::default();
        };

        info!("Loading configuration from: {}", path.display());
        match std::fs::read_to_string(&path) {
            Ok(source) => match Self::from_toml(&source) {
                Ok(config) => config,
                Err(e) => {
                    error!("Failed to parse configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            },
            Err(e) => {
                error!("Failed to read configuration file {}: {}", path.display(), e);
                Self::default()
            }
        }
    }
}

lazy_static! {
    /// Global configuration instance loaded from XDG-compliant locations
    pub static ref CONFIG: MailroomConfig = MailroomConfig::load();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_runtime_constants() {
        let config = MailroomConfig::default();
        assert_eq!(config.inbox.capacity, 1024);
        assert_eq!(config.inbox.initial_size, 16);
        assert_eq!(config.offer_timeout(), Duration::from_secs(60));
        assert_eq!(config.query_timeout(), Duration::from_millis(15_000));
        assert!(config.behavior.auto_start);
    }

    #[test]
    fn partial_documents_keep_defaults() {
        let config = MailroomConfig::from_toml(
            r#"
            [inbox]
            capacity = 8

            [query]
            timeout_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.inbox.capacity, 8);
        assert_eq!(config.inbox.workers, 1);
        assert_eq!(config.query_timeout(), Duration::from_millis(250));
        assert_eq!(config.shutdown, ShutdownSection::default());
    }

    #[test]
    fn malformed_documents_are_errors() {
        assert!(MailroomConfig::from_toml("[inbox]\ncapacity = \"lots\"").is_err());
    }
}
