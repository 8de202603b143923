// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

use anyhow::{Context, Result};
use clap::Parser;
use kube::Client;
use kube_gce_dns::{
    applier::ChangeApplier,
    auth::TokenSource,
    config::Config,
    constants::TOKIO_WORKER_THREADS,
    diff::RecordPlanner,
    dispatcher::Dispatcher,
    metrics,
    provider::{cloud_dns::CloudDnsClient, DnsProvider},
    watch::run_watch,
    zone::bind_zone,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

fn main() -> Result<()> {
    let config = Config::parse();

    // Build Tokio runtime with custom thread names
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(TOKIO_WORKER_THREADS)
        .thread_name("kube-gce-dns")
        .enable_all()
        .build()?;

    runtime.block_on(async_main(config))
}

fn init_logging() {
    // Format: timestamp file:line LEVEL message
    //
    // Respects RUST_LOG environment variable if set, otherwise defaults to INFO level
    // Example: RUST_LOG=debug kube-gce-dns -d example.com -p my-project
    //
    // Respects RUST_LOG_FORMAT environment variable for output format
    // Example: RUST_LOG_FORMAT=json kube-gce-dns -d example.com -p my-project
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let log_format = std::env::var("RUST_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    match log_format.to_lowercase().as_str() {
        "json" => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .json()
                .init();
        }
        _ => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter)
                .with_file(true)
                .with_line_number(true)
                .with_thread_names(true)
                .with_target(false)
                .with_ansi(true)
                .compact()
                .init();
        }
    }
}

async fn async_main(config: Config) -> Result<()> {
    init_logging();

    config.validate().context("Invalid configuration")?;
    info!(
        domain = %config.domain,
        project = %config.project,
        ttl = config.ttl,
        "Starting Cloud DNS service publisher"
    );

    // Both kube and reqwest use rustls; pick the process-wide crypto provider once.
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        debug!("TLS crypto provider already installed");
    }

    let client = kube_client(&config).await?;

    let http = reqwest::Client::builder()
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let tokens = match &config.access_token {
        Some(token) => {
            debug!("Using static access token");
            TokenSource::fixed(token.clone())
        }
        None => TokenSource::application_default(http.clone())
            .await
            .context("Failed to load Google application default credentials")?,
    };
    let provider: Arc<dyn DnsProvider> = Arc::new(
        CloudDnsClient::new(http, &config.cloud_dns_endpoint, &config.project, tokens)
            .context("Failed to create Cloud DNS client")?,
    );

    // Without a bound zone there is nowhere to publish; stop before watching.
    let zone = bind_zone(provider.as_ref(), &config.domain)
        .await
        .with_context(|| format!("Failed to bind domain '{}' to a managed zone", config.domain))?;

    let applier = ChangeApplier::new(provider, zone, config.poll_interval());
    let dispatcher = Dispatcher::new(
        RecordPlanner::new(&config.domain, config.ttl),
        applier,
        config.recheck_delay(),
    );

    if let Some(addr) = config.metrics_addr()? {
        tokio::spawn(async move {
            if let Err(e) = metrics::serve_metrics(addr).await {
                error!(error = %e, "Metrics server exited");
            }
        });
    } else {
        debug!("Metrics server disabled");
    }

    tokio::select! {
        result = run_watch(client, dispatcher, config.resync_period()) => {
            error!("CRITICAL: Service watch exited unexpectedly: {:?}", result);
            result?;
            anyhow::bail!("Service watch exited unexpectedly without error")
        }
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for shutdown signal")?;
            warn!("Received shutdown signal, stopping");
            Ok(())
        }
    }
}

async fn kube_client(config: &Config) -> Result<Client> {
    debug!("Initializing Kubernetes client");
    let kube_config = match &config.api {
        Some(api) => {
            let mut kube_config = match kube::Config::infer().await {
                Ok(inferred) => inferred,
                Err(e) => {
                    debug!(error = %e, "No local Kubernetes configuration, using API URL only");
                    kube::Config::new(Default::default())
                }
            };
            kube_config.cluster_url = api
                .parse()
                .with_context(|| format!("Invalid Kubernetes API URL '{api}'"))?;
            kube_config
        }
        None => kube::Config::infer()
            .await
            .context("Failed to infer Kubernetes configuration")?,
    };

    let client = Client::try_from(kube_config).context("Failed to create Kubernetes client")?;
    debug!("Kubernetes client initialized successfully");
    Ok(client)
}
