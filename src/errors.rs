// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Error types for zone binding, provider calls, and change application.
//!
//! This module provides specialized error types for:
//! - Resolving the configured domain to a provider-managed zone
//! - Cloud DNS HTTP API failures (rejections, transport, decoding, auth)
//! - Submitting changes through the change applier
//! - Validating startup configuration
//!
//! It also carries [`Ineligible`], the reason a service is filtered out. That one is
//! not a failure; callers log it and drop the event.

use thiserror::Error;

/// Errors that can occur while binding the configured domain to a managed zone.
///
/// Any of these is fatal at startup: the process must not begin watching services
/// without a bound zone.
#[derive(Error, Debug, Clone)]
pub enum ZoneError {
    /// No managed zone's DNS suffix matches the configured domain
    #[error("No managed zone found whose DNS name is a suffix of '{domain}.'")]
    NoMatchingZone {
        /// The configured base domain
        domain: String,
    },

    /// Listing managed zones failed
    #[error("Failed to list managed zones: {0}")]
    Provider(#[from] ProviderError),
}

/// Errors returned by a DNS provider API.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The provider refused the request (4xx other than 429)
    ///
    /// For change submissions this usually means a deletion did not match the
    /// record as it exists, or an addition collided with an existing record.
    #[error("Request rejected by provider (HTTP {status}): {message}")]
    Rejected {
        /// HTTP status code
        status: u16,
        /// Provider-supplied error message
        message: String,
    },

    /// The provider returned a server-side or throttling error (429, 5xx)
    #[error("Provider unavailable (HTTP {status}): {message}")]
    Unavailable {
        /// HTTP status code
        status: u16,
        /// Provider-supplied error message
        message: String,
    },

    /// The request never produced an HTTP response
    #[error("Transport error talking to provider: {0}")]
    Transport(String),

    /// The response body could not be decoded
    #[error("Failed to decode provider response: {0}")]
    Decode(String),

    /// No access token could be obtained
    #[error("Failed to obtain access token: {0}")]
    Auth(String),
}

impl ProviderError {
    /// Whether retrying the same request may succeed.
    ///
    /// Throttling, server errors and transport failures are transient. Rejections,
    /// decode failures and auth failures are not.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable { .. } | Self::Transport(_))
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors that end a single change application.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    /// The change had neither additions nor deletions
    #[error("Refusing to submit an empty change")]
    EmptyChange,

    /// The provider refused the initial submission; the change is dropped
    #[error("Change submission rejected: {0}")]
    SubmissionRejected(#[source] ProviderError),
}

/// Errors that end a drift check.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DriftError {
    /// The provider's current records could not be listed
    #[error("Failed to list current records: {0}")]
    List(#[source] ProviderError),

    /// The corrective change could not be applied
    #[error("Failed to apply corrective change: {0}")]
    Apply(#[source] ApplyError),
}

/// Invalid startup configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The base domain is not a usable DNS name
    #[error("Invalid domain '{domain}': {reason}")]
    InvalidDomain {
        /// The configured domain
        domain: String,
        /// What is wrong with it
        reason: &'static str,
    },

    /// No cloud project was given
    #[error("Project must not be empty")]
    EmptyProject,

    /// A duration or TTL that must be positive was zero
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The metrics listen address could not be parsed
    #[error("Invalid metrics address '{addr}': {reason}")]
    InvalidMetricsAddr {
        /// The configured address
        addr: String,
        /// Parser message
        reason: String,
    },
}

/// Why a service is not published.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Ineligible {
    /// The service lives in the reserved system namespace
    #[error("Service '{name}' is in restricted namespace {namespace}, skipping")]
    ReservedNamespace {
        /// Service name
        name: String,
        /// The reserved namespace
        namespace: String,
    },

    /// The service name contains a dot, which would break the record's label boundaries
    #[error("Can't publish service name '{name}': dots not allowed")]
    DottedName {
        /// Service name
        name: String,
    },
}

#[cfg(test)]
#[path = "errors_tests.rs"]
mod errors_tests;
