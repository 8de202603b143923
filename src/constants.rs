// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the service DNS publisher.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// DNS Record Constants
// ============================================================================

/// Default TTL for published service records (5 minutes)
pub const DEFAULT_DNS_RECORD_TTL_SECS: u32 = 300;

/// The only record type this system publishes
pub const RECORD_TYPE_A: &str = "A";

// ============================================================================
// Kubernetes Constants
// ============================================================================

/// Namespace whose services are never published
pub const RESERVED_NAMESPACE: &str = "kube-system";

/// Default period for re-delivering cached services to the drift check (1 minute)
pub const DEFAULT_RESYNC_PERIOD_SECS: u64 = 60;

// ============================================================================
// Provider Constants
// ============================================================================

/// Default Cloud DNS v1 REST endpoint
pub const DEFAULT_CLOUD_DNS_ENDPOINT: &str = "https://dns.googleapis.com/dns/v1";

/// Interval between change status polls (1 second)
pub const DEFAULT_CHANGE_POLL_INTERVAL_MILLIS: u64 = 1000;

/// Delay before the drift pass that follows a failed status poll (5 seconds)
pub const DEFAULT_RECHECK_DELAY_MILLIS: u64 = 5000;

/// Change status reported while a change is still propagating
pub const CHANGE_STATUS_PENDING: &str = "pending";

/// Change status reported once a change is fully applied
pub const CHANGE_STATUS_DONE: &str = "done";

/// GCE metadata server endpoint for the default service account token
pub const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh cached access tokens this long before they expire
pub const TOKEN_EXPIRY_SKEW_SECS: u64 = 60;

/// OAuth scope granting read/write access to Cloud DNS
pub const CLOUD_DNS_SCOPE: &str = "https://www.googleapis.com/auth/ndev.clouddns.readwrite";

/// Google OAuth token endpoint, used when a credentials file names none
pub const GOOGLE_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";

/// Lifetime of a signed service account assertion (Google caps it at one hour)
pub const JWT_ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Environment variable naming an explicit credentials file
pub const CREDENTIALS_ENV_VAR: &str = "GOOGLE_APPLICATION_CREDENTIALS";

/// File written by `gcloud auth application-default login` inside the gcloud config directory
pub const WELL_KNOWN_CREDENTIALS_FILE: &str = "application_default_credentials.json";

// ============================================================================
// Runtime Constants
// ============================================================================

/// Number of worker threads for Tokio runtime
pub const TOKIO_WORKER_THREADS: usize = 4;

// ============================================================================
// Metrics Server Constants
// ============================================================================

/// Default listen address for the Prometheus metrics HTTP server
pub const DEFAULT_METRICS_ADDR: &str = "0.0.0.0:8080";

/// Path for Prometheus metrics endpoint
pub const METRICS_SERVER_PATH: &str = "/metrics";
