// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `retry.rs`

#[cfg(test)]
mod tests {
    use super::super::{is_retryable_http_status, RetryExecutor, RetryPolicy};
    use crate::errors::Error;
    use crate::operation::{IdempotentRequestBuilder, Operation};
    use crate::test_support::{FakeTransport, Scripted};
    use reqwest::{Method, StatusCode};
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use url::Url;

    fn get_operation() -> Operation {
        Operation::new(
            Method::GET,
            Url::parse("http://api.local/clusters?Name=prod").unwrap(),
        )
    }

    fn executor(transport: std::sync::Arc<FakeTransport>, max_retries: u32) -> RetryExecutor {
        RetryExecutor::new(transport, RetryPolicy::with_max_retries(max_retries))
    }

    // ============================================================================
    // Policy and Backoff
    // ============================================================================

    /// Test that the default policy has expected values
    #[test]
    fn test_default_policy_configuration() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3, "Default retry budget should be 3");
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(30));
        #[allow(clippy::float_cmp)]
        {
            assert_eq!(policy.multiplier, 2.0);
        }
        assert_eq!(policy.max_requests(), 4);
    }

    /// Test the capped backoff schedule 1s, 2s, 4s, 8s, 16s, 30s, 30s
    #[test]
    fn test_backoff_sequence_is_capped() {
        let expected: Vec<Duration> = [1, 2, 4, 8, 16, 30, 30, 30]
            .into_iter()
            .map(Duration::from_secs)
            .collect();

        let policy = RetryPolicy::default();
        let sequence: Vec<Duration> = policy.backoff().take(expected.len()).collect();
        assert_eq!(sequence, expected);

        let closed_form: Vec<Duration> = (0..8).map(|n| policy.delay_for(n)).collect();
        assert_eq!(closed_form, expected);
    }

    #[test]
    fn test_delay_for_large_exponent_saturates() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(10_000), Duration::from_secs(30));
    }

    #[test]
    fn test_policy_rejects_non_growing_multiplier() {
        let result = RetryPolicy::new(3, Duration::from_secs(1), Duration::from_secs(30), 1.0);
        assert!(matches!(result, Err(Error::Config(_))));

        let result = RetryPolicy::new(3, Duration::from_secs(60), Duration::from_secs(30), 2.0);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_retryable_status_codes() {
        assert!(is_retryable_http_status(StatusCode::TOO_MANY_REQUESTS));
        for code in 500..600 {
            assert!(
                is_retryable_http_status(StatusCode::from_u16(code).unwrap()),
                "HTTP {code} should be retryable"
            );
        }
        for code in [200, 201, 204, 400, 401, 403, 404, 409, 422] {
            assert!(
                !is_retryable_http_status(StatusCode::from_u16(code).unwrap()),
                "HTTP {code} should not be retryable"
            );
        }
    }

    // ============================================================================
    // Executor Behavior
    // ============================================================================

    #[tokio::test(start_paused = true)]
    async fn test_success_on_first_attempt() {
        let transport = FakeTransport::new(vec![Scripted::Respond(200, "[]".into())]);
        let response = executor(transport.clone(), 3)
            .execute(get_operation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_statuses_are_bounded_and_drained() {
        for code in [429u16, 500, 502, 503, 599] {
            let transport = FakeTransport::new(vec![Scripted::status(code); 10]);
            let err = executor(transport.clone(), 3)
                .execute(get_operation(), &CancellationToken::new())
                .await
                .unwrap_err();

            assert_eq!(transport.request_count(), 4, "HTTP {code}: 1 + 3 retries");
            assert_eq!(
                transport.drained_before_send(),
                vec![0, 1, 2, 3],
                "HTTP {code}: each discarded body must be drained before the next send"
            );
            assert_eq!(transport.drained_count(), 4);
            assert_eq!(err.status_code(), Some(code));
            match err {
                Error::RetriesExhausted { attempts, .. } => assert_eq!(attempts, 4),
                other => panic!("expected RetriesExhausted, got {other:?}"),
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_recovers_after_transient_failures() {
        let transport = FakeTransport::new(vec![
            Scripted::fail("connection reset by peer"),
            Scripted::status(503),
            Scripted::Respond(201, "{}".into()),
        ]);

        let started = tokio::time::Instant::now();
        let response = executor(transport.clone(), 3)
            .execute(get_operation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CREATED);
        assert_eq!(transport.request_count(), 3);
        // 1s before the first retry, 2s before the second
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_client_errors_are_returned_without_retry() {
        let transport = FakeTransport::new(vec![Scripted::Respond(409, "conflict".into())]);
        let response = executor(transport.clone(), 3)
            .execute(get_operation(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert_eq!(transport.request_count(), 1);
        assert_eq!(transport.drained_count(), 0, "caller owns the body");
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_transport_error_is_terminal() {
        let transport = FakeTransport::new(vec![
            Scripted::fail("invalid certificate: UnknownIssuer"),
            Scripted::status(200),
        ]);
        let err = executor(transport.clone(), 3)
            .execute(get_operation(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Transport { .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_retries_issues_single_request() {
        let transport = FakeTransport::new(vec![Scripted::status(500), Scripted::status(200)]);
        let err = executor(transport.clone(), 0)
            .execute(get_operation(), &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::RetriesExhausted { attempts: 1, .. }));
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_replay_identical_body() {
        let transport = FakeTransport::new(vec![
            Scripted::status(502),
            Scripted::fail("unexpected EOF"),
            Scripted::status(200),
        ]);
        let op = IdempotentRequestBuilder::new(
            Method::POST,
            Url::parse("http://api.local/createcluster").unwrap(),
        )
        .json(&serde_json::json!({"Name": "prod", "Cpu": "2"}))
        .unwrap()
        .build();

        executor(transport.clone(), 3)
            .execute(op, &CancellationToken::new())
            .await
            .unwrap();

        let bodies: Vec<Option<Vec<u8>>> =
            transport.requests().into_iter().map(|r| r.body).collect();
        assert_eq!(bodies.len(), 3);
        assert!(bodies[0].is_some());
        assert!(bodies.iter().all(|b| b == &bodies[0]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_during_backoff() {
        let transport = FakeTransport::new(vec![Scripted::status(503); 10]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(500)).await;
            trigger.cancel();
        });

        let err = executor(transport.clone(), 3)
            .execute(get_operation(), &cancel)
            .await
            .unwrap_err();

        assert!(err.is_cancellation());
        assert_eq!(transport.request_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancellation_while_draining_retryable_body() {
        let transport = FakeTransport::new(vec![Scripted::Stalled(503), Scripted::status(200)]);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let started = tokio::time::Instant::now();
        let err = executor(transport.clone(), 3)
            .execute(get_operation(), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Cancelled { during: "draining response" }));
        assert_eq!(started.elapsed(), Duration::from_secs(1));
        assert_eq!(transport.request_count(), 1);
    }
}
