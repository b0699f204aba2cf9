// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Configured API client.
//!
//! [`ApiClient`] bundles the pieces every operation shares: the retry executor
//! (and through it the pooled transport), the base URL, and the login token. All
//! three are set once by [`ApiClient::login`] and never mutated afterwards, so a
//! client is cheap to clone and safe to use from concurrent operations.

use reqwest::{Method, StatusCode};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;

use crate::auth::{self, AuthStyle};
use crate::config::ProviderConfig;
use crate::constants::{PATH_CLUSTERS, PATH_CONNECT, PATH_SECRETS, QUERY_NAME};
use crate::errors::{Error, Result};
use crate::models::{ClusterInfo, SecretInfo, SecretsListResponse};
use crate::operation::{IdempotentRequestBuilder, Operation};
use crate::retry::RetryExecutor;
use crate::transport::{HttpResponse, ReqwestTransport, Transport};

const ACCEPT_JSON: &str = "application/json";
const ACCEPT_ANY: &str = "*/*";

/// Append `path` (slash-separated) to `base`.
///
/// # Errors
///
/// Returns [`Error::InvalidRequest`] if `base` cannot carry a path.
pub fn endpoint(base: &Url, path: &str) -> Result<Url> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|()| Error::InvalidRequest(format!("base URL {base} cannot carry a path")))?
        .pop_if_empty()
        .extend(path.split('/'));
    Ok(url)
}

/// Return `response` if its status is 2xx, otherwise turn it into [`Error::Status`].
///
/// # Errors
///
/// Returns [`Error::Status`] with a body excerpt for any non-2xx status.
pub async fn ensure_success(response: HttpResponse, target: &str) -> Result<HttpResponse> {
    if response.status().is_success() {
        Ok(response)
    } else {
        Err(response.into_status_error(target).await)
    }
}

/// Shared, immutable handle on the vcluster API.
#[derive(Clone)]
pub struct ApiClient {
    executor: Arc<RetryExecutor>,
    base_url: Arc<Url>,
    token: Arc<str>,
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("policy", self.executor.policy())
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Assemble a client from an executor, base URL and an already issued token.
    pub fn new(executor: Arc<RetryExecutor>, base_url: Url, token: impl Into<Arc<str>>) -> Self {
        Self {
            executor,
            base_url: Arc::new(base_url),
            token: token.into(),
        }
    }

    /// Build the pooled HTTP transport from `config` and log in.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an unusable configuration and
    /// [`Error::Login`] when the API rejects the credentials.
    pub async fn login(config: &ProviderConfig, cancel: &CancellationToken) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(config.timeout())?);
        Self::login_with_transport(config, transport, cancel).await
    }

    /// Log in over an explicit transport.
    ///
    /// # Errors
    ///
    /// Same as [`Self::login`].
    pub async fn login_with_transport(
        config: &ProviderConfig,
        transport: Arc<dyn Transport>,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        let base_url = config.base_url()?;
        let executor = Arc::new(RetryExecutor::new(transport, config.retry_policy()));
        let token =
            auth::login(&executor, &base_url, &config.username, &config.password, cancel).await?;
        Ok(Self::new(executor, base_url, token))
    }

    /// The shared retry executor.
    #[must_use]
    pub fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Base URL of the API.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// URL of `path` under the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the URL cannot be built.
    pub fn url(&self, path: &str) -> Result<Url> {
        endpoint(&self.base_url, path)
    }

    /// URL of `path` with query parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the URL cannot be built.
    pub fn url_with_query(&self, path: &str, query: &[(&str, &str)]) -> Result<Url> {
        let mut url = self.url(path)?;
        url.query_pairs_mut().extend_pairs(query);
        Ok(url)
    }

    /// URL of a single secret.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the URL cannot be built.
    pub fn secret_url(&self, id: &str) -> Result<Url> {
        let mut url = self.url(PATH_SECRETS)?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidRequest(format!("cannot build secret URL for {id}")))?
            .push(id);
        Ok(url)
    }

    /// Start a request carrying the token in the given style.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequest`] if the token is not a valid header value.
    pub fn request(
        &self,
        method: Method,
        url: Url,
        style: AuthStyle,
    ) -> Result<IdempotentRequestBuilder> {
        IdempotentRequestBuilder::new(method, url).authorization(&style.header_value(&self.token))
    }

    /// Send `operation` through the retry executor.
    ///
    /// # Errors
    ///
    /// See [`RetryExecutor::execute`].
    pub async fn execute(
        &self,
        operation: Operation,
        cancel: &CancellationToken,
    ) -> Result<HttpResponse> {
        self.executor.execute(operation, cancel).await
    }

    // ========================================================================
    // Cluster queries
    // ========================================================================

    /// Query `GET /clusters?Name=<name>`.
    ///
    /// Returns `None` on 404 or an empty result. When the API returns several
    /// clusters, the one whose name matches is preferred.
    ///
    /// # Errors
    ///
    /// Returns the executor error, a status error, or a decode error.
    pub async fn fetch_cluster(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<ClusterInfo>> {
        let url = self.url_with_query(PATH_CLUSTERS, &[(QUERY_NAME, name)])?;
        let target = format!("GET {url}");
        let operation = self
            .request(Method::GET, url, AuthStyle::Bearer)?
            .accept(ACCEPT_JSON)
            .build();

        let response = self.execute(operation, cancel).await?;
        if response.status() == StatusCode::NOT_FOUND {
            response.drain().await;
            return Ok(None);
        }
        let clusters: Vec<ClusterInfo> = ensure_success(response, &target)
            .await?
            .json(&target)
            .await?;

        let position = clusters
            .iter()
            .position(|cluster| cluster.name == name)
            .unwrap_or(0);
        Ok(clusters.into_iter().nth(position))
    }

    /// Query the full `GET /clusters` list.
    ///
    /// # Errors
    ///
    /// Returns the executor error, a status error, or a decode error.
    pub async fn fetch_all_clusters(&self, cancel: &CancellationToken) -> Result<Vec<ClusterInfo>> {
        let url = self.url(PATH_CLUSTERS)?;
        let target = format!("GET {url}");
        let operation = self
            .request(Method::GET, url, AuthStyle::Bearer)?
            .accept(ACCEPT_ANY)
            .build();

        let response = self.execute(operation, cancel).await?;
        ensure_success(response, &target).await?.json(&target).await
    }

    /// Fetch the kubeconfig of a cluster from `GET /connect?Name=<name>`.
    ///
    /// # Errors
    ///
    /// Returns the executor error or a status error.
    pub async fn fetch_kubeconfig(&self, name: &str, cancel: &CancellationToken) -> Result<String> {
        let url = self.url_with_query(PATH_CONNECT, &[(QUERY_NAME, name)])?;
        let target = format!("GET {url}");
        let operation = self
            .request(Method::GET, url, AuthStyle::Raw)?
            .accept(ACCEPT_ANY)
            .build();

        let response = self.execute(operation, cancel).await?;
        ensure_success(response, &target).await?.text(&target).await
    }

    // ========================================================================
    // Secret queries
    // ========================================================================

    /// Query `GET /secrets/api/v1/secrets/:id`; `None` on 404.
    ///
    /// # Errors
    ///
    /// Returns the executor error, a status error, or a decode error.
    pub async fn fetch_secret_by_id(
        &self,
        id: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<SecretInfo>> {
        let url = self.secret_url(id)?;
        let target = format!("GET {url}");
        let operation = self
            .request(Method::GET, url, AuthStyle::Bearer)?
            .accept(ACCEPT_JSON)
            .build();

        let response = self.execute(operation, cancel).await?;
        if response.status() == StatusCode::NOT_FOUND {
            response.drain().await;
            return Ok(None);
        }
        let secret = ensure_success(response, &target).await?.json(&target).await?;
        Ok(Some(secret))
    }

    /// Find a secret by name in the `GET /secrets/api/v1/secrets` list.
    ///
    /// # Errors
    ///
    /// Returns the executor error, a status error, or a decode error.
    pub async fn fetch_secret_by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<SecretInfo>> {
        let url = self.url(PATH_SECRETS)?;
        let target = format!("GET {url}");
        let operation = self
            .request(Method::GET, url, AuthStyle::Bearer)?
            .accept(ACCEPT_JSON)
            .build();

        let response = self.execute(operation, cancel).await?;
        if response.status() == StatusCode::NOT_FOUND {
            response.drain().await;
            return Ok(None);
        }
        let list: SecretsListResponse =
            ensure_success(response, &target).await?.json(&target).await?;
        debug!(name, count = list.secrets.len(), "Searched secrets by name");
        Ok(list.secrets.into_iter().find(|secret| secret.name == name))
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod client_tests;
