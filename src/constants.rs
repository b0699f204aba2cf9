// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Global constants for the vcluster engine.
//!
//! This module contains all numeric and string constants used throughout the codebase.
//! Constants are organized by category for easy maintenance.

// ============================================================================
// Remote API Paths
// ============================================================================

/// Login endpoint, exchanges credentials for a token
pub const PATH_LOGIN: &str = "login";

/// Cluster creation endpoint (asynchronous provisioning)
pub const PATH_CREATE_CLUSTER: &str = "createcluster";

/// Cluster listing / query-by-name endpoint
pub const PATH_CLUSTERS: &str = "clusters";

/// Credential bundle (kubeconfig) endpoint
pub const PATH_CONNECT: &str = "connect";

/// Cluster deletion endpoint
pub const PATH_DELETE_CLUSTER: &str = "deletecluster";

/// Helm release installation endpoint
pub const PATH_HELM_INSTALL: &str = "helm_install";

/// Application (Helm release) deletion endpoint
pub const PATH_DELETE_APP: &str = "deleteapp";

/// Secret collection endpoint
pub const PATH_SECRETS: &str = "secrets/api/v1/secrets";

// ============================================================================
// Query Parameter Names
// ============================================================================

/// Query parameter carrying a cluster or app name
pub const QUERY_NAME: &str = "Name";

/// Query parameter carrying a cluster namespace
pub const QUERY_NAMESPACE: &str = "Namespace";

// ============================================================================
// Resource Lifecycle
// ============================================================================

/// Lifecycle status reported once a cluster has finished provisioning
pub const STATUS_HEALTHY: &str = "Healthy";

/// Default status submitted with a new cluster payload
pub const STATUS_PROGRESSING: &str = "Progressing";

/// Separator between fields of a composite identifier
pub const COMPOSITE_ID_SEPARATOR: char = ':';

/// Suffix of the synthetic identifier used by cleanup batches
pub const CLEANUP_ID_SUFFIX: &str = "orphan-cleanup";

/// Placeholder used in error messages when the server returned no body
pub const EMPTY_BODY_PLACEHOLDER: &str = "(no response body)";

/// Maximum number of response body bytes carried in an error message
pub const ERROR_BODY_EXCERPT_BYTES: usize = 1024;

// ============================================================================
// Authentication
// ============================================================================

/// Authorization scheme prefix applied to bearer tokens
pub const BEARER_PREFIX: &str = "Bearer ";

// ============================================================================
// Timing and Retry Defaults
// ============================================================================

/// Default HTTP request timeout (5 minutes)
pub const DEFAULT_TIMEOUT_SECS: u64 = 300;

/// Default number of retries after the initial attempt
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Initial delay before the first retry (1 second)
pub const DEFAULT_INITIAL_DELAY_MILLIS: u64 = 1_000;

/// Maximum delay between retries (30 seconds)
pub const DEFAULT_MAX_DELAY_SECS: u64 = 30;

/// Backoff multiplier (exponential growth factor)
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;

/// Interval between convergence polls (10 seconds)
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// Maximum number of convergence polls (10 minutes at the default interval)
pub const DEFAULT_POLL_MAX_ATTEMPTS: u32 = 60;

/// Grace interval before verifying an ambiguous delete (2 seconds)
pub const DEFAULT_VERIFY_GRACE_SECS: u64 = 2;

// ============================================================================
// Transport Tuning
// ============================================================================

/// How long idle pooled connections are kept open
pub const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Connection establishment timeout (includes TLS handshake)
pub const HTTP_CONNECT_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// Environment Variables
// ============================================================================

/// Environment variable overriding the API base URL
pub const ENV_BASE_URL: &str = "VCLUSTER_BASE_URL";

/// Environment variable overriding the login username
pub const ENV_USERNAME: &str = "VCLUSTER_USERNAME";

/// Environment variable overriding the login password
pub const ENV_PASSWORD: &str = "VCLUSTER_PASSWORD";

/// Environment variable overriding the request timeout in seconds
pub const ENV_TIMEOUT: &str = "VCLUSTER_TIMEOUT";

/// Environment variable overriding the retry budget
pub const ENV_MAX_RETRIES: &str = "VCLUSTER_MAX_RETRIES";
