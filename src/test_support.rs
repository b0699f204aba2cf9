// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Scripted transport and mock-server clients shared by unit tests.

use async_trait::async_trait;
use reqwest::StatusCode;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::client::ApiClient;
use crate::errors::TransportError;
use crate::retry::{RetryExecutor, RetryPolicy};
use crate::transport::{HttpRequest, HttpResponse, ReqwestTransport, ResponseBody, Transport};

/// One scripted transport outcome.
#[derive(Debug, Clone)]
pub enum Scripted {
    /// Respond with a status and body
    Respond(u16, String),
    /// Fail at the transport level with a message
    Fail(String),
    /// Respond with a status whose body never finishes streaming
    Stalled(u16),
}

impl Scripted {
    pub fn status(code: u16) -> Self {
        Scripted::Respond(code, String::new())
    }

    pub fn json(code: u16, body: serde_json::Value) -> Self {
        Scripted::Respond(code, body.to_string())
    }

    pub fn fail(message: &str) -> Self {
        Scripted::Fail(message.to_string())
    }
}

/// Body that counts how many times it was read to the end.
struct TrackedBody {
    bytes: Vec<u8>,
    drained: Arc<AtomicUsize>,
}

#[async_trait]
impl ResponseBody for TrackedBody {
    async fn read_all(self: Box<Self>) -> Result<Vec<u8>, TransportError> {
        self.drained.fetch_add(1, Ordering::SeqCst);
        Ok(self.bytes)
    }
}

/// Body that never yields.
struct StalledBody;

#[async_trait]
impl ResponseBody for StalledBody {
    async fn read_all(self: Box<Self>) -> Result<Vec<u8>, TransportError> {
        std::future::pending().await
    }
}

/// Transport that replays a script and records every request it receives.
pub struct FakeTransport {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
    drained_before_send: Mutex<Vec<usize>>,
    drained: Arc<AtomicUsize>,
}

impl FakeTransport {
    pub fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            drained_before_send: Mutex::new(Vec::new()),
            drained: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    /// Number of bodies read to the end so far.
    pub fn drained_count(&self) -> usize {
        self.drained.load(Ordering::SeqCst)
    }

    /// For each request, how many bodies had been drained before it was sent.
    pub fn drained_before_send(&self) -> Vec<usize> {
        self.drained_before_send.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        self.drained_before_send
            .lock()
            .unwrap()
            .push(self.drained.load(Ordering::SeqCst));
        self.requests.lock().unwrap().push(request);

        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Respond(code, body)) => Ok(HttpResponse::new(
                StatusCode::from_u16(code).unwrap(),
                TrackedBody {
                    bytes: body.into_bytes(),
                    drained: Arc::clone(&self.drained),
                },
            )),
            Some(Scripted::Stalled(code)) => Ok(HttpResponse::new(
                StatusCode::from_u16(code).unwrap(),
                StalledBody,
            )),
            Some(Scripted::Fail(message)) => Err(TransportError::new(message)),
            None => Err(TransportError::new("fake transport script exhausted")),
        }
    }
}

/// Retry policy with millisecond delays for tests that run against a real socket.
pub fn fast_policy(max_retries: u32) -> RetryPolicy {
    RetryPolicy::new(
        max_retries,
        Duration::from_millis(1),
        Duration::from_millis(5),
        2.0,
    )
    .unwrap()
}

/// Client talking to a mock server with token `tok`.
pub fn mock_client(uri: &str) -> ApiClient {
    let transport = Arc::new(ReqwestTransport::new(Duration::from_secs(5)).unwrap());
    let executor = Arc::new(RetryExecutor::new(transport, fast_policy(2)));
    ApiClient::new(executor, Url::parse(uri).unwrap(), "tok")
}
