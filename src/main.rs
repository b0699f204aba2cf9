// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use vcluster_engine::{
    client::ApiClient,
    config::{ConfigOverrides, ProviderConfig},
    handle::ResourceHandle,
    metrics,
    reconcilers::{
        self, CleanupReconciler, ClusterReconciler, Reconciler, ReleaseReconciler,
        SecretReconciler, Verb,
    },
    wait,
};

/// Drive vcluster resources through their lifecycle.
#[derive(Parser, Debug)]
#[command(name = "vcluster-engine", version, about, long_about = None)]
struct Cli {
    /// Provider configuration file (YAML)
    #[arg(long, env = "VCLUSTER_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the vcluster API
    #[arg(long, env = "VCLUSTER_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "VCLUSTER_USERNAME")]
    username: Option<String>,

    #[arg(long, env = "VCLUSTER_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-request timeout in seconds (0 selects the default)
    #[arg(long, env = "VCLUSTER_TIMEOUT")]
    timeout: Option<u64>,

    /// Retries after the initial attempt of each request
    #[arg(long, env = "VCLUSTER_MAX_RETRIES")]
    max_retries: Option<u32>,

    /// Resource kind
    #[arg(value_enum)]
    kind: Kind,

    /// Lifecycle verb
    #[arg(value_enum)]
    verb: VerbArg,

    /// Desired state of the resource (YAML)
    #[arg(short = 'f', long)]
    manifest: Option<PathBuf>,

    /// Previously applied state, required by `update`
    #[arg(long)]
    previous: Option<PathBuf>,

    /// Handle printed by an earlier run (JSON)
    #[arg(long)]
    handle: Option<PathBuf>,

    /// Resource identifier, e.g. for importing an existing resource
    #[arg(long)]
    id: Option<String>,

    /// Cancel the operation after this many seconds
    #[arg(long)]
    deadline_secs: Option<u64>,

    /// Print Prometheus metrics after the operation
    #[arg(long)]
    metrics: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Kind {
    Cluster,
    Release,
    Secret,
    Cleanup,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum VerbArg {
    Create,
    Read,
    Update,
    Delete,
}

impl From<VerbArg> for Verb {
    fn from(verb: VerbArg) -> Self {
        match verb {
            VerbArg::Create => Verb::Create,
            VerbArg::Read => Verb::Read,
            VerbArg::Update => Verb::Update,
            VerbArg::Delete => Verb::Delete,
        }
    }
}

impl Cli {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            base_url: self.base_url.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            timeout_secs: self.timeout,
            max_retries: self.max_retries,
        }
    }
}

fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .thread_name("vcluster-engine")
        .enable_all()
        .build()?;

    runtime.block_on(async_main())
}

fn init_tracing() {
    // Respects RUST_LOG (default: info) and RUST_LOG_FORMAT (json|text)
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    // Logs go to stderr; stdout carries the resulting handle
    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_writer(std::io::stderr)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact()
                .init();
        }
    }
}

async fn async_main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    debug!(kind = ?cli.kind, verb = ?cli.verb, "Parsed command line");

    let config = match &cli.config {
        Some(path) => ProviderConfig::load(path).await?,
        None => ProviderConfig::default(),
    };
    let config = config
        .with_overrides(cli.overrides())
        .validated()
        .context("invalid provider configuration")?;
    debug!(config = ?config, "Loaded provider configuration");

    let shutdown = CancellationToken::new();
    spawn_signal_handler(shutdown.clone());
    let cancel = match cli.deadline_secs {
        Some(secs) => wait::with_deadline(&shutdown, Duration::from_secs(secs)),
        None => shutdown.clone(),
    };

    let client = ApiClient::login(&config, &cancel)
        .await
        .context("failed to log in to the vcluster API")?;
    info!(base_url = %client.base_url(), "Logged in");

    let result = match cli.kind {
        Kind::Cluster => {
            let reconciler = ClusterReconciler::new(client, config.poller(), config.verifier());
            dispatch(&reconciler, &cli, &cancel).await
        }
        Kind::Release => dispatch(&ReleaseReconciler::new(client), &cli, &cancel).await,
        Kind::Secret => {
            dispatch(&SecretReconciler::new(client, config.verifier()), &cli, &cancel).await
        }
        Kind::Cleanup => dispatch(&CleanupReconciler::new(client), &cli, &cancel).await,
    };

    if cli.metrics {
        println!("{}", metrics::gather_metrics()?);
    }
    result
}

/// Cancel `token` on SIGINT or SIGTERM.
fn spawn_signal_handler(token: CancellationToken) {
    tokio::spawn(async move {
        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };
        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                    return;
                }
                warn!("Received SIGINT, cancelling operation");
            }
            () = terminate => warn!("Received SIGTERM, cancelling operation"),
            () = token.cancelled() => return,
        }
        token.cancel();
    });
}

/// Run one verb and print the resulting handle, even when the verb fails.
async fn dispatch<R>(reconciler: &R, cli: &Cli, cancel: &CancellationToken) -> Result<()>
where
    R: Reconciler,
    R::Spec: DeserializeOwned,
    R::State: Serialize + DeserializeOwned,
{
    let desired: Option<R::Spec> = read_yaml(cli.manifest.as_deref()).await?;
    let previous: Option<R::Spec> = read_yaml(cli.previous.as_deref()).await?;

    let mut handle: ResourceHandle<R::State> = match &cli.handle {
        Some(path) => {
            let content = tokio::fs::read_to_string(path)
                .await
                .with_context(|| format!("failed to read handle {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("failed to parse handle {}", path.display()))?
        }
        None => ResourceHandle::new(),
    };
    if let Some(id) = &cli.id {
        handle.set_id(id.clone());
    }

    let verb = Verb::from(cli.verb);
    let result = reconcilers::run(
        reconciler,
        verb,
        &mut handle,
        desired.as_ref(),
        previous.as_ref(),
        cancel,
    )
    .await;

    println!("{}", serde_json::to_string_pretty(&handle)?);
    result.with_context(|| format!("{} {verb} failed", R::KIND))
}

async fn read_yaml<T: DeserializeOwned>(path: Option<&Path>) -> Result<Option<T>> {
    let Some(path) = path else {
        return Ok(None);
    };
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read manifest {}", path.display()))?;
    let value = serde_yaml::from_str(&content)
        .with_context(|| format!("failed to parse manifest {}", path.display()))?;
    Ok(Some(value))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod main_tests;
