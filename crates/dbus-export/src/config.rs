// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Export configuration.
//!
//! Supports both programmatic and file-based configuration.
//!
//! ```toml
//! redeclare_policy = "reject"
//! validate_args = true
//! include_backtrace = false
//! max_fault_description_len = 2048
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// What happens when an interface name is declared a second time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedeclarePolicy {
    /// Last write wins; members of the previous declaration are dropped.
    #[default]
    Replace,
    /// Fail with [`ExportError::DuplicateInterface`](crate::ExportError::DuplicateInterface).
    Reject,
    /// Reopen the existing descriptor and add to it.
    Extend,
}

/// Registry and dispatch settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Redeclaration behaviour of the interface registry.
    #[serde(default)]
    pub redeclare_policy: RedeclarePolicy,

    /// Check argument count and type codes before invoking a handler.
    #[serde(default = "default_true")]
    pub validate_args: bool,

    /// Append the captured backtrace to `Failed` error descriptions.
    #[serde(default = "default_true")]
    pub include_backtrace: bool,

    /// Log unknown interface/method lookups and argument mismatches.
    #[serde(default = "default_true")]
    pub log_routing_failures: bool,

    /// Upper bound on error descriptions sent over the bus, in bytes.
    #[serde(default = "default_max_fault_description_len")]
    pub max_fault_description_len: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_fault_description_len() -> usize {
    16 * 1024
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            redeclare_policy: RedeclarePolicy::default(),
            validate_args: true,
            include_backtrace: true,
            log_routing_failures: true,
            max_fault_description_len: default_max_fault_description_len(),
        }
    }
}

impl ExportConfig {
    /// Load configuration from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_fault_description_len == 0 {
            return Err(ConfigError::Invalid(
                "max_fault_description_len must be greater than zero".into(),
            ));
        }
        Ok(())
    }

    /// Set the redeclaration policy.
    pub fn redeclare_policy(mut self, policy: RedeclarePolicy) -> Self {
        self.redeclare_policy = policy;
        self
    }

    /// Enable or disable argument validation.
    pub fn validate_args(mut self, enabled: bool) -> Self {
        self.validate_args = enabled;
        self
    }

    /// Enable or disable backtraces in `Failed` replies.
    pub fn include_backtrace(mut self, enabled: bool) -> Self {
        self.include_backtrace = enabled;
        self
    }

    /// Truncate `description` to the configured limit on a char boundary.
    pub(crate) fn clamp_description(&self, mut description: String) -> String {
        if description.len() > self.max_fault_description_len {
            let mut end = self.max_fault_description_len;
            while !description.is_char_boundary(end) {
                end -= 1;
            }
            description.truncate(end);
        }
        description
    }
}
