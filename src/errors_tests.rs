// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `errors.rs`

#[cfg(test)]
mod tests {
    use crate::errors::*;
    use reqwest::StatusCode;

    // ============================================================================
    // Transient Category Classification
    // ============================================================================

    #[test]
    fn test_classify_network_failures() {
        let cases = [
            ("read: connection reset by peer", TransientCategory::ConnectionReset),
            ("dial tcp: Connection refused", TransientCategory::ConnectionRefused),
            ("operation timed out", TransientCategory::Timeout),
            ("i/o timeout", TransientCategory::Timeout),
            ("dns error: no such host", TransientCategory::NameResolution),
            (
                "failed to lookup address information",
                TransientCategory::NameResolution,
            ),
            ("unexpected EOF", TransientCategory::TransientIo),
            ("connection closed before message completed", TransientCategory::TransientIo),
        ];

        for (message, expected) in cases {
            assert_eq!(
                TransientCategory::classify(message),
                Some(expected),
                "'{message}' should classify as {expected:?}"
            );
        }
    }

    #[test]
    fn test_classify_terminal_failures() {
        for message in [
            "invalid certificate: UnknownIssuer",
            "builder error: relative URL without a base",
            "unsupported HTTP method",
        ] {
            assert_eq!(
                TransientCategory::classify(message),
                None,
                "'{message}' should not be retryable"
            );
        }
    }

    #[test]
    fn test_transport_error_from_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused");
        let outer = TransportError::from_chain(&inner);
        assert!(outer.is_retryable());
        assert_eq!(outer.category(), Some(TransientCategory::ConnectionRefused));
    }

    // ============================================================================
    // Error Rendering
    // ============================================================================

    #[test]
    fn test_status_error_renders_status_line_and_body() {
        let err = status_error(
            "DELETE http://api/deletecluster?Name=prod",
            StatusCode::CONFLICT,
            b"cluster is busy",
        );
        let message = err.to_string();
        assert!(message.contains("409 Conflict"));
        assert!(message.contains("cluster is busy"));
        assert_eq!(err.status_code(), Some(409));
    }

    #[test]
    fn test_empty_body_uses_placeholder() {
        assert_eq!(body_excerpt(b"   "), "(no response body)");
    }

    #[test]
    fn test_long_body_is_truncated() {
        let body = "x".repeat(5000);
        let excerpt = body_excerpt(body.as_bytes());
        assert!(excerpt.len() < 1100);
        assert!(excerpt.ends_with("..."));
    }

    #[test]
    fn test_status_code_looks_through_retry_exhaustion() {
        let err = Error::RetriesExhausted {
            target: "GET http://api/clusters".into(),
            attempts: 4,
            source: Box::new(status_error(
                "GET http://api/clusters",
                StatusCode::SERVICE_UNAVAILABLE,
                b"",
            )),
        };
        assert_eq!(err.status_code(), Some(503));
        assert!(!err.is_not_found());
        assert_eq!(err.category(), "retries_exhausted");
    }

    #[test]
    fn test_immutable_field_lists_fields() {
        let err = Error::ImmutableField {
            kind: "release",
            fields: vec!["chart", "repo"],
        };
        assert_eq!(
            err.to_string(),
            "cannot change chart, repo on release; these require recreation"
        );
    }

    #[test]
    fn test_partial_batch_message_counts_items() {
        let err = Error::PartialBatch {
            cluster: "prod".into(),
            deleted: vec!["a".into(), "c".into()],
            failures: vec![BatchFailure {
                name: "b".into(),
                message: "500 Internal Server Error".into(),
            }],
        };
        let message = err.to_string();
        assert!(message.contains("failed for 1 of 3 apps"));
        assert!(message.contains("failed to delete app b"));
    }

    #[test]
    fn test_cancelled_is_cancellation() {
        let err = Error::Cancelled {
            during: "waiting for backoff",
        };
        assert!(err.is_cancellation());
        assert_eq!(err.category(), "cancelled");
    }

    #[tokio::test]
    async fn test_url_text_does_not_make_terminal_error_retryable() {
        // "geofence" contains "eof"; the path must not decide retryability
        let err = reqwest::Client::new()
            .get("ftp://api.local/geofence")
            .send()
            .await
            .unwrap_err();

        let transport = TransportError::from_reqwest(err);
        assert!(!transport.message.contains("geofence"));
        assert_eq!(transport.category(), None);
        assert!(!transport.is_retryable());
    }
}
