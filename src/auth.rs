// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Authorization header handling and login.
//!
//! The API issues an opaque token from `POST /login`. Most endpoints expect it as
//! a bearer credential, but a few (cluster create/delete and `/connect`) expect
//! the token verbatim. [`AuthStyle`] selects between the two.

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use url::Url;

use crate::client::endpoint;
use crate::constants::{BEARER_PREFIX, PATH_LOGIN};
use crate::errors::{body_excerpt, Error, Result};
use crate::models::{LoginRequest, LoginResponse};
use crate::operation::IdempotentRequestBuilder;
use crate::retry::RetryExecutor;

/// How the token is rendered into the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStyle {
    /// `Bearer <token>` unless the token already carries the prefix
    Bearer,
    /// The token exactly as issued
    Raw,
}

impl AuthStyle {
    /// Render `token` for this style. An empty token renders as empty.
    #[must_use]
    pub fn header_value(self, token: &str) -> String {
        match self {
            AuthStyle::Bearer => normalize_auth_header(token),
            AuthStyle::Raw => token.to_string(),
        }
    }
}

/// Prefix `token` with `Bearer ` unless it is empty or already prefixed.
#[must_use]
pub fn normalize_auth_header(token: &str) -> String {
    if token.is_empty() || token.starts_with(BEARER_PREFIX) {
        token.to_string()
    } else {
        format!("{BEARER_PREFIX}{token}")
    }
}

/// Exchange credentials for a token.
///
/// # Errors
///
/// Returns [`Error::Login`] for a non-2xx status or an empty token, and the
/// executor's error when the request itself fails.
pub async fn login(
    executor: &RetryExecutor,
    base_url: &Url,
    username: &str,
    password: &str,
    cancel: &CancellationToken,
) -> Result<String> {
    let url = endpoint(base_url, PATH_LOGIN)?;
    let target = format!("POST {url}");

    let operation = IdempotentRequestBuilder::new(Method::POST, url)
        .json(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })?
        .build();

    debug!(username, "Logging in");
    let response = executor.execute(operation, cancel).await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.bytes().await.unwrap_or_default();
        return Err(Error::Login(format!("{status}: {}", body_excerpt(&body))));
    }

    let login: LoginResponse = response.json(&target).await?;
    if login.token.is_empty() {
        return Err(Error::Login(
            "login succeeded but no token returned".to_string(),
        ));
    }
    info!(username, "Logged in");
    Ok(login.token)
}
