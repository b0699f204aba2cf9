// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `release.rs`

#[cfg(test)]
mod tests {
    use serde_json::json;
    use std::io::Write;
    use tokio_util::sync::CancellationToken;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::errors::Error;
    use crate::handle::ResourceHandle;
    use crate::models::{ReleaseSpec, ReleaseState};
    use crate::reconcilers::{Reconciler, ReleaseReconciler};
    use crate::test_support::mock_client;

    fn spec() -> ReleaseSpec {
        ReleaseSpec {
            cluster_name: "prod".to_string(),
            namespace: "ns1".to_string(),
            release: "mysql".to_string(),
            chart: "bitnami/mysql".to_string(),
            repo: "https://charts.bitnami.com/bitnami".to_string(),
            chart_version: None,
            values: Some("replicas: 1\n".to_string()),
            values_file: None,
        }
    }

    async fn mount_cluster(server: &MockServer, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/clusters"))
            .and(query_param("Name", "prod"))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_create_prefers_values_file() {
        let mut values_file = tempfile::NamedTempFile::new().unwrap();
        write!(values_file, "replicas: 3\n").unwrap();

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/helm_install"))
            .and(header("Authorization", "Bearer tok"))
            .and(body_json(json!({
                "Clustername": "prod",
                "Namespace": "ns1",
                "Release": "mysql",
                "Chart": "bitnami/mysql",
                "Repo": "https://charts.bitnami.com/bitnami",
                "Values": "replicas: 3\n",
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_cluster(&server, json!([{"Name": "prod", "NameSpace": "vc-prod"}])).await;

        let mut spec = spec();
        spec.values_file = Some(values_file.path().to_path_buf());

        let mut handle = ResourceHandle::new();
        ReleaseReconciler::new(mock_client(&server.uri()))
            .create(&mut handle, &spec, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(handle.id(), Some("prod:ns1:mysql"));
        let state = handle.state().unwrap();
        assert_eq!(state.release, "mysql");
        assert_eq!(state.chart.as_deref(), Some("bitnami/mysql"));
    }

    #[tokio::test]
    async fn test_unreadable_values_file_fails_before_any_request() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let mut spec = spec();
        spec.values_file = Some(dir.path().join("missing.yaml"));

        let mut handle = ResourceHandle::new();
        let err = ReleaseReconciler::new(mock_client(&server.uri()))
            .create(&mut handle, &spec, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, Error::ValuesFile { .. }));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chart_version_is_sent_as_version() {
        let mut spec = spec();
        spec.chart_version = Some("8.0.0".to_string());
        spec.values = None;

        let payload = ReleaseReconciler::payload(&spec).await.unwrap();
        assert_eq!(payload.version.as_deref(), Some("8.0.0"));
        assert!(payload.values.is_none());
    }

    #[tokio::test]
    async fn test_changing_chart_is_rejected_without_network() {
        let server = MockServer::start().await;
        let previous = spec();
        let mut desired = spec();
        desired.chart = "bitnami/mariadb".to_string();

        let mut handle = ResourceHandle::with_id("prod:ns1:mysql");
        let err = ReleaseReconciler::new(mock_client(&server.uri()))
            .update(&mut handle, &previous, &desired, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(
            matches!(err, Error::ImmutableField { kind: "release", ref fields } if fields == &vec!["chart"])
        );
        assert!(server.received_requests().await.unwrap().is_empty());
        assert_eq!(handle.id(), Some("prod:ns1:mysql"));
    }

    #[tokio::test]
    async fn test_values_change_reinstalls() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/helm_install"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        mount_cluster(&server, json!([{"Name": "prod"}])).await;

        let previous = spec();
        let mut desired = spec();
        desired.values = Some("replicas: 2\n".to_string());

        let mut handle = ResourceHandle::with_id("prod:ns1:mysql");
        ReleaseReconciler::new(mock_client(&server.uri()))
            .update(&mut handle, &previous, &desired, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(handle.id(), Some("prod:ns1:mysql"));
    }

    #[tokio::test]
    async fn test_delete_uses_cluster_namespace_in_app_name() {
        let server = MockServer::start().await;
        mount_cluster(&server, json!([{"Name": "prod", "NameSpace": "vc-prod"}])).await;
        Mock::given(method("DELETE"))
            .and(path("/deleteapp"))
            .and(query_param("Name", "vc-prod-mysql"))
            .and(header("Authorization", "Bearer tok"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let mut handle: ResourceHandle<ReleaseState> = ResourceHandle::with_id("prod:ns1:mysql");
        ReleaseReconciler::new(mock_client(&server.uri()))
            .delete(&mut handle, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(handle.is_empty());
    }

    #[tokio::test]
    async fn test_delete_falls_back_to_release_name_and_accepts_404() {
        let server = MockServer::start().await;
        mount_cluster(&server, json!([])).await;
        Mock::given(method("DELETE"))
            .and(path("/deleteapp"))
            .and(query_param("Name", "mysql"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let mut handle: ResourceHandle<ReleaseState> = ResourceHandle::with_id("prod:ns1:mysql");
        ReleaseReconciler::new(mock_client(&server.uri()))
            .delete(&mut handle, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(handle.is_empty());
    }

    #[tokio::test]
    async fn test_delete_failure_keeps_handle() {
        let server = MockServer::start().await;
        mount_cluster(&server, json!([{"Name": "prod", "NameSpace": "vc-prod"}])).await;
        Mock::given(method("DELETE"))
            .and(path("/deleteapp"))
            .respond_with(ResponseTemplate::new(409).set_body_string("release is locked"))
            .mount(&server)
            .await;

        let mut handle: ResourceHandle<ReleaseState> = ResourceHandle::with_id("prod:ns1:mysql");
        let err = ReleaseReconciler::new(mock_client(&server.uri()))
            .delete(&mut handle, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), Some(409));
        assert_eq!(handle.id(), Some("prod:ns1:mysql"));
    }

    #[tokio::test]
    async fn test_malformed_id_is_an_error() {
        let server = MockServer::start().await;
        let mut handle: ResourceHandle<ReleaseState> = ResourceHandle::with_id("prod:mysql");

        let err = ReleaseReconciler::new(mock_client(&server.uri()))
            .delete(&mut handle, None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedIdentifier { .. }));
        assert_eq!(handle.id(), Some("prod:mysql"));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_read_decodes_imported_id() {
        let server = MockServer::start().await;
        mount_cluster(&server, json!([{"Name": "prod"}])).await;

        let mut handle: ResourceHandle<ReleaseState> = ResourceHandle::with_id("prod:ns1:mysql");
        ReleaseReconciler::new(mock_client(&server.uri()))
            .read(&mut handle, None, &CancellationToken::new())
            .await
            .unwrap();

        let state = handle.state().unwrap();
        assert_eq!(state.cluster_name, "prod");
        assert_eq!(state.namespace, "ns1");
        assert_eq!(state.release, "mysql");
        assert!(state.chart.is_none());
    }

    #[tokio::test]
    async fn test_read_clears_handle_when_cluster_is_gone() {
        let server = MockServer::start().await;
        mount_cluster(&server, json!([])).await;

        let mut handle: ResourceHandle<ReleaseState> = ResourceHandle::with_id("prod:ns1:mysql");
        ReleaseReconciler::new(mock_client(&server.uri()))
            .read(&mut handle, None, &CancellationToken::new())
            .await
            .unwrap();
        assert!(handle.is_empty());
    }
}
