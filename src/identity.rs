// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Composite identifiers for resources without a single server-assigned key.
//!
//! A composite identity joins the fields of a natural key with
//! [`COMPOSITE_ID_SEPARATOR`]. Decoding is strict: the identifier must split into
//! exactly the expected number of non-empty fields, otherwise it is malformed.
//! Fields that themselves contain the separator are not supported; such a tuple
//! encodes, but decodes to a different arity and is rejected.

use std::fmt;
use std::str::FromStr;

use crate::constants::{CLEANUP_ID_SUFFIX, COMPOSITE_ID_SEPARATOR};
use crate::errors::{Error, Result};

/// Encode a tuple of fields into one identifier.
#[must_use]
pub fn encode(fields: &[&str]) -> String {
    let separator = COMPOSITE_ID_SEPARATOR.to_string();
    fields.join(separator.as_str())
}

/// Decode an identifier into exactly `arity` non-empty fields.
///
/// # Errors
///
/// Returns [`Error::MalformedIdentifier`] if the identifier has a different number
/// of fields or any field is empty.
pub fn decode(id: &str, arity: usize) -> Result<Vec<String>> {
    let parts: Vec<&str> = id.split(COMPOSITE_ID_SEPARATOR).collect();
    if parts.len() != arity {
        return Err(Error::MalformedIdentifier {
            id: id.to_string(),
            reason: format!(
                "expected {arity} fields separated by '{COMPOSITE_ID_SEPARATOR}', found {}",
                parts.len()
            ),
        });
    }
    if let Some(position) = parts.iter().position(|part| part.is_empty()) {
        return Err(Error::MalformedIdentifier {
            id: id.to_string(),
            reason: format!("field {} is empty", position + 1),
        });
    }
    Ok(parts.into_iter().map(str::to_string).collect())
}

/// Identity of a Helm release: `{cluster}:{namespace}:{release}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReleaseId {
    /// Cluster the release is installed into
    pub cluster: String,
    /// Kubernetes namespace inside the cluster
    pub namespace: String,
    /// Helm release name
    pub release: String,
}

impl ReleaseId {
    /// Build a release identity from its fields.
    pub fn new(
        cluster: impl Into<String>,
        namespace: impl Into<String>,
        release: impl Into<String>,
    ) -> Self {
        Self {
            cluster: cluster.into(),
            namespace: namespace.into(),
            release: release.into(),
        }
    }
}

impl fmt::Display for ReleaseId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&[
            self.cluster.as_str(),
            self.namespace.as_str(),
            self.release.as_str(),
        ]))
    }
}

impl FromStr for ReleaseId {
    type Err = Error;

    fn from_str(id: &str) -> Result<Self> {
        let mut fields = decode(id, 3)?.into_iter();
        match (fields.next(), fields.next(), fields.next()) {
            (Some(cluster), Some(namespace), Some(release)) => Ok(Self {
                cluster,
                namespace,
                release,
            }),
            _ => Err(Error::MalformedIdentifier {
                id: id.to_string(),
                reason: "expected cluster, namespace and release".to_string(),
            }),
        }
    }
}

/// Synthetic identifier of a cleanup batch: `{cluster}-orphan-cleanup`.
#[must_use]
pub fn cleanup_batch_id(cluster: &str) -> String {
    format!("{cluster}-{CLEANUP_ID_SUFFIX}")
}

/// Application name the remote API uses for a release: `{namespace}-{release}`.
#[must_use]
pub fn app_name(namespace: &str, release: &str) -> String {
    format!("{namespace}-{release}")
}

#[cfg(test)]
#[path = "identity_tests.rs"]
mod identity_tests;
