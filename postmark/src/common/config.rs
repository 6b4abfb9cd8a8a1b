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

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::message::BusError;

/// Configuration for a [`MessageBus`](crate::common::MessageBus) and its transports.
///
/// Every section and field has a default, so a configuration file only needs to name the
/// values it changes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    /// Router thread settings
    pub router: RouterConfig,
    /// Segmentation and reassembly settings
    pub transport: TransportConfig,
}

/// Router thread configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// Name given to the router thread
    pub thread_name: String,
    /// Intake queue depth at which a warning is logged
    pub intake_warning_depth: usize,
}

/// UDP segmentation and reassembly configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Payload bytes carried per datagram
    pub segment_size: u16,
    /// Time without acknowledgement before a segment is resent, in milliseconds
    pub retransmit_timeout_ms: u64,
    /// Maximum segments sent but not yet acknowledged per message
    pub max_in_flight_segments: u16,
    /// Time after which an incomplete inbound message is discarded, in milliseconds
    pub reassembly_timeout_ms: u64,
    /// Maximum incomplete inbound messages held at once
    pub max_pending_reassemblies: usize,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            thread_name: "postmark-router".to_string(),
            intake_warning_depth: 1024,
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            segment_size: 1024,
            retransmit_timeout_ms: 500,
            max_in_flight_segments: 64,
            reassembly_timeout_ms: 30_000,
            max_pending_reassemblies: 128,
        }
    }
}

impl TransportConfig {
    /// Convert the retransmit timeout to a `Duration`
    #[must_use]
    pub const fn retransmit_timeout(&self) -> Duration {
        Duration::from_millis(self.retransmit_timeout_ms)
    }

    /// Convert the reassembly timeout to a `Duration`
    #[must_use]
    pub const fn reassembly_timeout(&self) -> Duration {
        Duration::from_millis(self.reassembly_timeout_ms)
    }
}

impl BusConfig {
    /// Parses a configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Config`] if the text is not valid TOML for this structure.
    pub fn from_toml_str(text: &str) -> Result<Self, BusError> {
        Ok(toml::from_str::<Self>(text)?)
    }

    /// Reads and parses the configuration file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`BusError::Io`] if the file cannot be read and [`BusError::Config`] if it
    /// cannot be parsed.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, BusError> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }

    /// Load configuration from XDG-compliant locations
    ///
    /// Looks for `postmark/config.toml` under the XDG configuration directories
    /// (`$XDG_CONFIG_HOME`, then `$XDG_CONFIG_DIRS`).
    ///
    /// If no configuration file is found, returns the default configuration.
    /// If a configuration file exists but is malformed, logs an error and uses defaults.
    #[must_use]
    pub fn load() -> Self {
        let xdg_dirs = match xdg::BaseDirectories::with_prefix("postmark") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        if let Some(path) = xdg_dirs.find_config_file("config.toml") {
            info!("Loading configuration from: {}", path.display());
            match Self::load_from(&path) {
                Ok(config) => {
                    info!("Successfully loaded configuration");
                    config
                }
                Err(e) => {
                    error!("Failed to load configuration file {}: {}", path.display(), e);
                    Self::default()
                }
            }
        } else {
            info!("No configuration file found, using defaults");
            Self::default()
        }
    }
}
