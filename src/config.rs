// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Provider configuration.
//!
//! Configuration is read from a YAML file, then overridden field by field from the
//! command line or environment, then validated. The validated value is immutable
//! and shared by every operation of a client.
//!
//! ```yaml
//! base_url: https://vcluster.example.com
//! username: admin
//! password: s3cret
//! timeout_secs: 300
//! max_retries: 3
//! ```

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::constants::{
    DEFAULT_MAX_RETRIES, DEFAULT_POLL_INTERVAL_SECS, DEFAULT_POLL_MAX_ATTEMPTS,
    DEFAULT_TIMEOUT_SECS, DEFAULT_VERIFY_GRACE_SECS,
};
use crate::errors::{Error, Result};
use crate::poller::ConvergencePoller;
use crate::retry::RetryPolicy;
use crate::verifier::AmbiguousFailureVerifier;

/// Connection and policy settings for the vcluster API.
#[derive(Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProviderConfig {
    /// Base URL of the API, e.g. `http://192.168.1.4`
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// Per-request timeout; 0 selects the default
    pub timeout_secs: u64,
    /// Retries after the initial attempt
    pub max_retries: u32,
    pub poll_interval_secs: u64,
    pub poll_max_attempts: u32,
    /// Wait before verifying an ambiguous delete
    pub verify_grace_secs: u64,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            poll_max_attempts: DEFAULT_POLL_MAX_ATTEMPTS,
            verify_grace_secs: DEFAULT_VERIFY_GRACE_SECS,
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("base_url", &self.base_url)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("poll_interval_secs", &self.poll_interval_secs)
            .field("poll_max_attempts", &self.poll_max_attempts)
            .field("verify_grace_secs", &self.verify_grace_secs)
            .finish()
    }
}

/// Values that take precedence over the configuration file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub base_url: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

impl ProviderConfig {
    /// Parse a configuration document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the YAML is invalid.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| Error::Config(format!("failed to parse config: {e}")))
    }

    /// Read and parse a configuration file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            Error::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_yaml(&content)
    }

    /// Apply overrides; unset overrides keep the current value.
    #[must_use]
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> Self {
        if let Some(base_url) = overrides.base_url {
            self.base_url = base_url;
        }
        if let Some(username) = overrides.username {
            self.username = username;
        }
        if let Some(password) = overrides.password {
            self.password = password;
        }
        if let Some(timeout_secs) = overrides.timeout_secs {
            self.timeout_secs = timeout_secs;
        }
        if let Some(max_retries) = overrides.max_retries {
            self.max_retries = max_retries;
        }
        self
    }

    /// Check required fields and normalize defaults.
    ///
    /// - `timeout_secs == 0` becomes the default of 300 seconds
    /// - a trailing `/` on `base_url` is removed
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when a required field is empty or the base URL is
    /// not an `http`/`https` URL.
    pub fn validated(mut self) -> Result<Self> {
        for (field, value) in [
            ("base_url", &self.base_url),
            ("username", &self.username),
            ("password", &self.password),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{field} is required")));
            }
        }

        self.base_url = self.base_url.trim().trim_end_matches('/').to_string();
        let url = Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url '{}': {e}", self.base_url)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "base_url must use http or https, got '{}'",
                url.scheme()
            )));
        }

        if self.timeout_secs == 0 {
            self.timeout_secs = DEFAULT_TIMEOUT_SECS;
        }
        Ok(self)
    }

    /// The base URL as a parsed [`Url`].
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the URL does not parse.
    pub fn base_url(&self) -> Result<Url> {
        Url::parse(&self.base_url)
            .map_err(|e| Error::Config(format!("invalid base_url '{}': {e}", self.base_url)))
    }

    /// Per-request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Retry policy: configured retry budget with the default backoff schedule.
    #[must_use]
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_max_retries(self.max_retries)
    }

    /// Convergence poller for asynchronously provisioned kinds.
    #[must_use]
    pub fn poller(&self) -> ConvergencePoller {
        ConvergencePoller::new(
            Duration::from_secs(self.poll_interval_secs),
            self.poll_max_attempts,
        )
    }

    /// Verifier for ambiguous deletes.
    #[must_use]
    pub fn verifier(&self) -> AmbiguousFailureVerifier {
        AmbiguousFailureVerifier::new(Duration::from_secs(self.verify_grace_secs))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
