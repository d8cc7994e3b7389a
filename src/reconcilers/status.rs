// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Component phases reported on the ArgoCD status.

use crate::components::{principal, redis, repo_server, Instance};
use crate::error::Result;
use crate::sync::{fetch, Store};
use crate::types::ArgoCD;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use kube::api::{Patch, PatchParams};
use kube::Api;
use serde_json::json;
use std::fmt;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Pending,
    Unknown,
    Disabled,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Running => "Running",
            Phase::Pending => "Pending",
            Phase::Unknown => "Unknown",
            Phase::Disabled => "Disabled",
        };
        f.write_str(s)
    }
}

fn replica_phase(wanted: Option<i32>, ready: Option<i32>) -> Phase {
    if ready.unwrap_or(0) >= wanted.unwrap_or(1) {
        Phase::Running
    } else {
        Phase::Pending
    }
}

async fn deployment_phase(store: &Store<'_>, name: &str) -> Result<Phase> {
    Ok(match fetch::<Deployment>(store, name).await? {
        Some(d) => replica_phase(
            d.spec.and_then(|s| s.replicas),
            d.status.and_then(|s| s.ready_replicas),
        ),
        None => Phase::Unknown,
    })
}

async fn statefulset_phase(store: &Store<'_>, name: &str) -> Result<Phase> {
    Ok(match fetch::<StatefulSet>(store, name).await? {
        Some(s) => replica_phase(
            s.spec.and_then(|s| s.replicas),
            s.status.and_then(|s| s.ready_replicas),
        ),
        None => Phase::Unknown,
    })
}

/// The worse of two phases.
fn combine(a: Phase, b: Phase) -> Phase {
    match (a, b) {
        (Phase::Running, Phase::Running) => Phase::Running,
        (Phase::Unknown, _) | (_, Phase::Unknown) => Phase::Unknown,
        _ => Phase::Pending,
    }
}

async fn redis_phase(store: &Store<'_>, instance: &Instance<'_>) -> Result<Phase> {
    if !instance.spec().is_redis_enabled() {
        return Ok(Phase::Disabled);
    }
    if instance.spec().is_ha_enabled() {
        let server = instance.core(redis::HA_SERVER_COMPONENT).name;
        let proxy = instance.core(redis::HA_PROXY_COMPONENT).name;
        let server = statefulset_phase(store, &server).await?;
        let proxy = deployment_phase(store, &proxy).await?;
        return Ok(combine(server, proxy));
    }
    deployment_phase(store, &instance.core(redis::COMPONENT).name).await
}

async fn repo_phase(store: &Store<'_>, instance: &Instance<'_>) -> Result<Phase> {
    if !instance.spec().is_repo_enabled() {
        return Ok(Phase::Disabled);
    }
    deployment_phase(store, &instance.core(repo_server::COMPONENT).name).await
}

async fn principal_phase(store: &Store<'_>, instance: &Instance<'_>) -> Result<Phase> {
    if !instance.spec().is_principal_enabled() {
        return Ok(Phase::Disabled);
    }
    deployment_phase(store, &instance.agent(principal::COMPONENT).name).await
}

/// `Available` once every enabled component runs.
fn overall(phases: &[Phase]) -> &'static str {
    if phases
        .iter()
        .all(|p| matches!(p, Phase::Running | Phase::Disabled))
    {
        "Available"
    } else {
        "Pending"
    }
}

/// Observe component workloads and patch the phases onto the status when
/// they changed.
pub async fn update_status(store: &Store<'_>, instance: &Instance<'_>) -> Result<()> {
    let redis = redis_phase(store, instance).await?;
    let repo = repo_phase(store, instance).await?;
    let principal = principal_phase(store, instance).await?;
    let phase = overall(&[redis, repo, principal]);

    let current = instance.argocd.status.clone().unwrap_or_default();
    let unchanged = current.phase.as_deref() == Some(phase)
        && current.redis == Some(redis.to_string())
        && current.repo == Some(repo.to_string())
        && current.agent_principal == Some(principal.to_string());
    if unchanged {
        return Ok(());
    }

    let patch = json!({
        "status": {
            "phase": phase,
            "redis": redis.to_string(),
            "repo": repo.to_string(),
            "agentPrincipal": principal.to_string(),
        }
    });
    debug!(%patch, "Updating status");

    let api: Api<ArgoCD> = store.api();
    store
        .call(
            "patch status",
            "ArgoCD",
            &instance.name,
            api.patch_status(&instance.name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;
    Ok(())
}
