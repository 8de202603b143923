// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Startup configuration.
//!
//! Parsed once from command-line flags (each with an environment variable
//! fallback), validated, then handed to the constructors that need it.

use crate::constants::{
    DEFAULT_CHANGE_POLL_INTERVAL_MILLIS, DEFAULT_CLOUD_DNS_ENDPOINT, DEFAULT_DNS_RECORD_TTL_SECS,
    DEFAULT_METRICS_ADDR, DEFAULT_RECHECK_DELAY_MILLIS, DEFAULT_RESYNC_PERIOD_SECS,
};
use crate::errors::ConfigError;
use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

/// Publish Kubernetes LoadBalancer service addresses to Google Cloud DNS
#[derive(Parser, Debug, Clone, PartialEq, Eq)]
#[command(name = "kube-gce-dns", author, version, about, long_about = None)]
pub struct Config {
    /// Kubernetes API server URL (defaults to in-cluster or kubeconfig settings)
    #[arg(short = 'k', long = "api", env = "KUBE_API_SERVER")]
    pub api: Option<String>,

    /// Base domain records are published under, e.g. `example.com`
    #[arg(short, long, env = "DNS_DOMAIN", value_parser = parse_domain)]
    pub domain: String,

    /// Cloud project that owns the managed zone
    #[arg(short, long, env = "GCE_PROJECT")]
    pub project: String,

    /// TTL in seconds for published records
    #[arg(long, env = "DNS_RECORD_TTL", default_value_t = DEFAULT_DNS_RECORD_TTL_SECS)]
    pub ttl: u32,

    /// Interval between change status polls, in milliseconds
    #[arg(long = "poll-interval-ms", env = "CHANGE_POLL_INTERVAL_MS", default_value_t = DEFAULT_CHANGE_POLL_INTERVAL_MILLIS)]
    pub poll_interval_ms: u64,

    /// Period for re-checking every known service against the provider, in seconds (0 disables)
    #[arg(long = "resync-secs", env = "RESYNC_PERIOD_SECS", default_value_t = DEFAULT_RESYNC_PERIOD_SECS)]
    pub resync_secs: u64,

    /// Delay before verifying a change whose status could not be read, in milliseconds
    #[arg(long = "recheck-delay-ms", env = "RECHECK_DELAY_MS", default_value_t = DEFAULT_RECHECK_DELAY_MILLIS)]
    pub recheck_delay_ms: u64,

    /// Cloud DNS API base URL
    #[arg(long, env = "CLOUD_DNS_ENDPOINT", default_value = DEFAULT_CLOUD_DNS_ENDPOINT)]
    pub cloud_dns_endpoint: String,

    /// Static OAuth access token, overriding Application Default Credentials
    #[arg(long, env = "GOOGLE_OAUTH_ACCESS_TOKEN", hide_env_values = true)]
    pub access_token: Option<String>,

    /// Listen address for the Prometheus metrics server (empty disables it)
    #[arg(long, env = "METRICS_ADDR", default_value = DEFAULT_METRICS_ADDR)]
    pub metrics_addr: String,
}

impl Config {
    /// Check the values clap cannot check on its own.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] describing the first invalid value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_domain(&self.domain)?;

        if self.project.trim().is_empty() {
            return Err(ConfigError::EmptyProject);
        }
        if self.ttl == 0 {
            return Err(ConfigError::Zero("ttl"));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Zero("poll-interval-ms"));
        }

        self.metrics_addr()?;
        Ok(())
    }

    /// Interval between change status polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Resync period, or `None` when resync is disabled.
    #[must_use]
    pub fn resync_period(&self) -> Option<Duration> {
        (self.resync_secs > 0).then(|| Duration::from_secs(self.resync_secs))
    }

    /// Delay before the drift check that follows an unknown change outcome.
    #[must_use]
    pub fn recheck_delay(&self) -> Duration {
        Duration::from_millis(self.recheck_delay_ms)
    }

    /// Metrics listen address, or `None` when the metrics server is disabled.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidMetricsAddr`] if the address does not parse.
    pub fn metrics_addr(&self) -> Result<Option<SocketAddr>, ConfigError> {
        let addr = self.metrics_addr.trim();
        if addr.is_empty() {
            return Ok(None);
        }
        addr.parse()
            .map(Some)
            .map_err(|e: std::net::AddrParseError| ConfigError::InvalidMetricsAddr {
                addr: addr.to_string(),
                reason: e.to_string(),
            })
    }
}

/// DNS names are case-insensitive but provider zone names are lowercase.
fn parse_domain(raw: &str) -> Result<String, std::convert::Infallible> {
    Ok(raw.trim().to_ascii_lowercase())
}

fn validate_domain(domain: &str) -> Result<(), ConfigError> {
    let invalid = |reason| ConfigError::InvalidDomain {
        domain: domain.to_string(),
        reason,
    };

    if domain.is_empty() {
        return Err(invalid("must not be empty"));
    }
    if domain.starts_with('.') || domain.ends_with('.') {
        return Err(invalid("must not start or end with a dot"));
    }
    if domain.split('.').any(str::is_empty) {
        return Err(invalid("empty label"));
    }
    if domain.chars().any(|c| c.is_ascii_uppercase()) {
        return Err(invalid("must be lowercase"));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
