/*
 * Copyright (c) 2024. Govcraft
 *
 * Licensed under either of
 *   * Apache License, Version 2.0 (the "License");
 *     you may not use this file except in compliance with the License.
 *     you may obtain a copy of the License at http://www.apache.org/licenses/LICENSE-2.0
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

use crate::common::Result;
use crate::message::DispatchError;

/// Number of priority bands an agent can be placed in.
pub const PRIORITY_COUNT: usize = 8;

/// Configuration for the Acton dispatch runtime.
///
/// Loaded from `dispatch.toml` in XDG-compliant directories. Every section is
/// optional; missing values fall back to their defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ActonConfig {
    /// Limits and capacity configuration
    pub limits: LimitsConfig,
    /// Default values configuration
    pub defaults: DefaultsConfig,
    /// Timeout configuration
    pub timeouts: TimeoutConfig,
    /// Behavioral configuration switches
    pub behavior: BehaviorConfig,
    /// Priority-aware thread pool configuration
    pub priority: PriorityConfig,
}

/// Limits and capacity configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Maximum number of redirect/transform hops a single message may take
    pub max_redirection_depth: u32,
    /// Worker count for thread pools built from configuration
    pub thread_pool_size: usize,
    /// Demands a pool worker processes from one queue before moving on
    pub max_demands_at_once: usize,
}

/// Default configuration values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Agent name used when none is provided
    pub agent_name: String,
    /// Name of the one-thread dispatcher every environment starts with
    pub default_dispatcher: String,
}

/// Timeout-related configuration values
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Timeout used by `Mailbox::request_value`, in milliseconds
    pub service_request_timeout_ms: u64,
}

/// Behavioral configuration switches
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct BehaviorConfig {
    /// What happens to an agent whose handler fails
    pub failure_reaction: FailureReaction,
    /// What happens when a message exceeds the redirection depth
    pub redirect_cap_reaction: RedirectCapReaction,
    /// Whether unsubscribing a missing subscription is an error
    pub unsubscribe_policy: UnsubscribePolicy,
}

/// Quotes for the priority-aware thread pool, indexed by priority.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PriorityConfig {
    /// Demands served from a priority band before the next lower band gets a turn
    pub quotes: [usize; PRIORITY_COUNT],
}

/// Reaction applied after a handler returns an error or panics.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailureReaction {
    /// Report the failure and keep the agent running.
    #[default]
    Ignore,
    /// Report the failure and deregister the agent.
    Deregister,
    /// Report the failure and abort the process.
    Abort,
}

/// Reaction applied when a message hits `max_redirection_depth`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RedirectCapReaction {
    /// Log the condition and abort the process.
    #[default]
    Abort,
    /// Log the condition and drop the message.
    Drop,
}

/// Treatment of an unsubscribe call that matches no subscription.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UnsubscribePolicy {
    /// Fail with `SubscriptionNotFound`.
    #[default]
    Strict,
    /// Treat the call as a no-op.
    Silent,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_redirection_depth: 8,
            thread_pool_size: 4,
            max_demands_at_once: 4,
        }
    }
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            agent_name: "agent".to_string(),
            default_dispatcher: "default".to_string(),
        }
    }
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            service_request_timeout_ms: 5_000,
        }
    }
}

impl Default for PriorityConfig {
    fn default() -> Self {
        Self {
            quotes: [1, 2, 3, 4, 5, 6, 7, 8],
        }
    }
}

impl ActonConfig {
    /// Convert the service request timeout to a `Duration`.
    pub const fn service_request_timeout(&self) -> Duration {
        Duration::from_millis(self.timeouts.service_request_timeout_ms)
    }

    /// Load configuration from XDG-compliant locations.
    ///
    /// Looks for `$XDG_CONFIG_HOME/acton/dispatch.toml` (falling back to the
    /// platform's standard config directories). A missing file yields the
    /// default configuration. A malformed file is logged and ignored.
    pub fn load() -> Self {
        let xdg_dirs = match xdg::BaseDirectories::with_prefix("acton") {
            Ok(dirs) => dirs,
            Err(e) => {
                error!("Failed to initialize XDG directories: {}", e);
                return Self::default();
            }
        };

        match xdg_dirs.find_config_file("dispatch.toml") {
            Some(path) => Self::load_from_path(&path).unwrap_or_else(|e| {
                error!("{}; using defaults", e);
                Self::default()
            }),
            None => {
                info!("No configuration file found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from an explicit file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        info!("Loading configuration from: {}", path.display());
        let contents = std::fs::read_to_string(path).map_err(|e| {
            DispatchError::Config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config = toml::from_str::<Self>(contents)
            .map_err(|e| DispatchError::Config(format!("failed to parse configuration: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.limits.thread_pool_size == 0 {
            return Err(DispatchError::Config(
                "limits.thread_pool_size must be at least 1".to_string(),
            ));
        }
        if self.limits.max_demands_at_once == 0 {
            return Err(DispatchError::Config(
                "limits.max_demands_at_once must be at least 1".to_string(),
            ));
        }
        if self.priority.quotes.contains(&0) {
            return Err(DispatchError::Config(
                "priority.quotes entries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
