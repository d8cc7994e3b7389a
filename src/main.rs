// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use anyhow::Result;
use kube::Client;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use argocd_operator::config::Config;
use argocd_operator::kubernetes::wait_for_argocd_crd;
use argocd_operator::reconcilers::ArgoCDReconciler;

#[tokio::main]
async fn main() -> Result<()> {
    // RUST_LOG wins, info otherwise
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting ArgoCD operator");

    let config = Config::from_env()?;
    info!(
        "Configuration loaded: watch_namespace={}, requeue_interval={:?}, reconcile_timeout={:?}",
        config.watch_namespace.as_deref().unwrap_or("<all>"),
        config.requeue_interval,
        config.reconcile_timeout
    );

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    info!("Waiting for ArgoCD CRD to become available...");
    wait_for_argocd_crd(&client).await?;

    ArgoCDReconciler::new(client, config).run().await?;

    warn!("ArgoCD controller stopped");
    Ok(())
}
