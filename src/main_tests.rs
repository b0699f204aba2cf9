// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! Unit tests for `main.rs` - command line parsing and manifest loading

#[cfg(test)]
mod tests {
    use clap::Parser;
    use std::io::Write;
    use vcluster_engine::models::ReleaseSpec;
    use vcluster_engine::reconcilers::Verb;

    use crate::{read_yaml, Cli, Kind, VerbArg};

    #[test]
    fn test_parse_kind_verb_and_overrides() {
        let cli = Cli::try_parse_from([
            "vcluster-engine",
            "--base-url",
            "http://vcluster.local",
            "--max-retries",
            "5",
            "cluster",
            "create",
            "-f",
            "cluster.yaml",
            "--deadline-secs",
            "600",
        ])
        .unwrap();

        assert_eq!(cli.kind, Kind::Cluster);
        assert_eq!(Verb::from(cli.verb), Verb::Create);
        assert_eq!(cli.deadline_secs, Some(600));

        let overrides = cli.overrides();
        assert_eq!(overrides.base_url.as_deref(), Some("http://vcluster.local"));
        assert_eq!(overrides.max_retries, Some(5));
        assert!(overrides.timeout_secs.is_none());
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        assert!(Cli::try_parse_from(["vcluster-engine", "namespace", "read"]).is_err());
    }

    #[test]
    fn test_import_by_id() {
        let cli =
            Cli::try_parse_from(["vcluster-engine", "release", "read", "--id", "prod:ns1:mysql"])
                .unwrap();
        assert_eq!(cli.verb, VerbArg::Read);
        assert_eq!(cli.id.as_deref(), Some("prod:ns1:mysql"));
        assert!(cli.manifest.is_none());
    }

    #[tokio::test]
    async fn test_read_yaml_manifest() {
        let mut manifest = tempfile::NamedTempFile::new().unwrap();
        write!(
            manifest,
            "cluster_name: prod\nnamespace: ns1\nrelease: mysql\nchart: bitnami/mysql\nrepo: https://charts.bitnami.com/bitnami\n"
        )
        .unwrap();

        let spec: Option<ReleaseSpec> = read_yaml(Some(manifest.path())).await.unwrap();
        let spec = spec.unwrap();
        assert_eq!(spec.release, "mysql");
        assert!(spec.values.is_none());

        let none: Option<ReleaseSpec> = read_yaml(None).await.unwrap();
        assert!(none.is_none());
    }

    #[tokio::test]
    async fn test_read_yaml_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.yaml");
        let err = read_yaml::<ReleaseSpec>(Some(&path)).await.unwrap_err();
        assert!(err.to_string().contains("missing.yaml"));
    }
}
