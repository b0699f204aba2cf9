// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Secret reconciler.
//!
//! Secrets live under `/secrets/api/v1/secrets` with standard JSON CRUD. The
//! server assigns the id; when it is unknown the secret is found by name in the
//! list endpoint.

use async_trait::async_trait;
use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{require, Reconciler};
use crate::auth::AuthStyle;
use crate::client::{ensure_success, ApiClient};
use crate::constants::PATH_SECRETS;
use crate::errors::{Error, Result};
use crate::handle::ResourceHandle;
use crate::models::{SecretInfo, SecretSpec, SecretState};
use crate::verifier::AmbiguousFailureVerifier;

const KIND: &str = "secret";

/// Reconciler for secrets.
#[derive(Debug, Clone)]
pub struct SecretReconciler {
    client: ApiClient,
    verifier: AmbiguousFailureVerifier,
}

impl SecretReconciler {
    /// Create a secret reconciler; ambiguous deletes are settled by `verifier`.
    #[must_use]
    pub fn new(client: ApiClient, verifier: AmbiguousFailureVerifier) -> Self {
        Self { client, verifier }
    }

    fn name<'a>(handle: &'a ResourceHandle<SecretState>, spec: Option<&'a SecretSpec>) -> &'a str {
        spec.map(|spec| spec.name.as_str())
            .filter(|name| !name.is_empty())
            .or_else(|| handle.state().map(|state| state.name.as_str()))
            .unwrap_or_default()
    }

    /// Look the secret up by id (when the id is not just the name), then by name.
    ///
    /// `None` means absent: a 404 by id with no name to fall back on, or a list
    /// without a match. A failed id lookup with no name is returned as an error.
    async fn find(
        &self,
        id: Option<&str>,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<SecretInfo>> {
        if let Some(id) = id.filter(|id| *id != name) {
            match self.client.fetch_secret_by_id(id, cancel).await {
                Ok(Some(secret)) => return Ok(Some(secret)),
                Ok(None) => debug!(secret_id = id, "Secret not found by id"),
                Err(e) if e.is_cancellation() || name.is_empty() => return Err(e),
                Err(e) => warn!(secret_id = id, error = %e, "Failed to fetch secret by id, trying name"),
            }
        }
        if name.is_empty() {
            return Ok(None);
        }
        self.client.fetch_secret_by_name(name, cancel).await
    }
}

#[async_trait]
impl Reconciler for SecretReconciler {
    type Spec = SecretSpec;
    type State = SecretState;

    const KIND: &'static str = KIND;

    async fn create(
        &self,
        handle: &mut ResourceHandle<SecretState>,
        spec: &SecretSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        require(KIND, "name", &spec.name)?;

        let url = self.client.url(PATH_SECRETS)?;
        let target = format!("POST {url}");
        let operation = self
            .client
            .request(Method::POST, url, AuthStyle::Bearer)?
            .json(&spec.to_payload())?
            .build();

        let response = self.client.execute(operation, cancel).await?;
        let created = ensure_success(response, &target)
            .await?
            .json::<SecretInfo>(&target)
            .await;

        match created {
            Ok(secret) if !secret.id.is_empty() => handle.set_id(secret.id),
            Ok(_) => handle.set_id(spec.name.clone()),
            Err(e) => {
                debug!(secret = %spec.name, error = %e, "Create response carried no secret, looking it up by name");
            }
        }
        info!(secret = %spec.name, "Created secret");

        self.read(handle, Some(spec), cancel).await
    }

    async fn read(
        &self,
        handle: &mut ResourceHandle<SecretState>,
        spec: Option<&SecretSpec>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = Self::name(handle, spec).to_string();
        let id = handle.id().map(str::to_string);

        let Some(secret) = self.find(id.as_deref(), &name, cancel).await? else {
            info!(secret = %name, "Secret not found, clearing handle");
            handle.clear();
            return Ok(());
        };

        if !secret.id.is_empty() {
            handle.set_id(secret.id.clone());
        } else if handle.id().is_none() {
            handle.set_id(secret.name.clone());
        }
        handle.observe(SecretState::from(secret));
        Ok(())
    }

    async fn update(
        &self,
        handle: &mut ResourceHandle<SecretState>,
        _previous: &SecretSpec,
        desired: &SecretSpec,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let id = handle
            .id()
            .ok_or(Error::MissingField { kind: KIND, field: "id" })?
            .to_string();

        let url = self.client.secret_url(&id)?;
        let target = format!("PUT {url}");
        let operation = self
            .client
            .request(Method::PUT, url, AuthStyle::Bearer)?
            .json(&desired.to_payload())?
            .build();

        let response = self.client.execute(operation, cancel).await?;
        ensure_success(response, &target).await?.drain().await;
        info!(secret = %desired.name, secret_id = %id, "Updated secret");

        self.read(handle, Some(desired), cancel).await
    }

    async fn delete(
        &self,
        handle: &mut ResourceHandle<SecretState>,
        spec: Option<&SecretSpec>,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let name = Self::name(handle, spec).to_string();
        let mut id = handle.id().unwrap_or_default().to_string();

        if (id.is_empty() || id == name) && !name.is_empty() {
            match self.client.fetch_secret_by_name(&name, cancel).await {
                Ok(Some(secret)) if !secret.id.is_empty() => id = secret.id,
                Ok(_) => {}
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => warn!(secret = %name, error = %e, "Failed to resolve secret id by name"),
            }
        }
        if id.is_empty() {
            debug!(secret = %name, "No secret id known, nothing to delete");
            handle.clear();
            return Ok(());
        }

        let url = self.client.secret_url(&id)?;
        let target = format!("DELETE {url}");
        let operation = self
            .client
            .request(Method::DELETE, url, AuthStyle::Bearer)?
            .accept("application/json")
            .build();

        let outcome = self.client.execute(operation, cancel).await;
        self.verifier
            .resolve_delete(
                KIND,
                &id,
                &target,
                outcome,
                || self.client.fetch_secret_by_id(&id, cancel),
                cancel,
            )
            .await?;
        info!(secret = %name, secret_id = %id, "Deleted secret");

        handle.clear();
        Ok(())
    }
}
