// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Shared helpers for integration tests against a mock vcluster API

#![allow(dead_code)]

use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use vcluster_engine::config::ProviderConfig;

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "s3cret";
pub const TOKEN: &str = "tok-123";

/// Configuration pointing at `server` with no waits between polls or before
/// verification.
pub fn config(server: &MockServer, max_retries: u32) -> ProviderConfig {
    let yaml = format!(
        "base_url: {}/\nusername: {USERNAME}\npassword: {PASSWORD}\ntimeout_secs: 5\nmax_retries: {max_retries}\npoll_interval_secs: 0\npoll_max_attempts: 5\nverify_grace_secs: 0\n",
        server.uri()
    );
    ProviderConfig::from_yaml(&yaml)
        .and_then(ProviderConfig::validated)
        .expect("test configuration should be valid")
}

/// Mount a login endpoint that accepts the test credentials.
pub async fn mount_login(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_json(json!({"username": USERNAME, "password": PASSWORD})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": TOKEN})))
        .mount(server)
        .await;
}
