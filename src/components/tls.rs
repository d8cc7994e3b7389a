// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Restart workloads when a TLS secret they mount changes, or when redis
//! switches between plain and HA mode.

use crate::components::{redis, repo_server, Instance};
use crate::constants::{rollout, secrets};
use crate::error::{OperatorError, Result};
use crate::sync::{fetch, trigger_rollout, Store, Workload};
use crate::types::ArgoCD;
use k8s_openapi::api::core::v1::Secret;
use kube::api::{Patch, PatchParams};
use kube::Api;
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

/// SHA-256 over certificate then key, hex encoded. `None` unless both are present.
pub fn checksum(secret: &Secret) -> Option<String> {
    let data = secret.data.as_ref()?;
    let cert = data.get(secrets::TLS_CERT_KEY)?;
    let key = data.get(secrets::TLS_PRIVATE_KEY)?;

    let mut hasher = Sha256::new();
    hasher.update(&cert.0);
    hasher.update(&key.0);
    Some(hex::encode(hasher.finalize()))
}

/// Workloads that mount the repo-server TLS secret or talk to redis.
fn argocd_workloads(instance: &Instance) -> Vec<Workload> {
    vec![
        Workload::Deployment(instance.core("server").name),
        Workload::Deployment(instance.core(repo_server::COMPONENT).name),
        Workload::StatefulSet(instance.core("application-controller").name),
    ]
}

fn redis_workloads(instance: &Instance) -> Vec<Workload> {
    if instance.spec().is_ha_enabled() {
        vec![
            Workload::StatefulSet(instance.core(redis::HA_SERVER_COMPONENT).name),
            Workload::Deployment(instance.core(redis::HA_PROXY_COMPONENT).name),
        ]
    } else {
        vec![Workload::Deployment(instance.core(redis::COMPONENT).name)]
    }
}

/// Run a rollout and keep only the errors that should block recording it.
async fn rollout(
    store: &Store<'_>,
    targets: &[Workload],
    change_key: &str,
    failures: &mut Vec<OperatorError>,
) -> bool {
    let errors: Vec<OperatorError> = trigger_rollout(store, targets, change_key)
        .await
        .into_iter()
        .filter(|e| !e.is_not_found())
        .collect();
    let ok = errors.is_empty();
    failures.extend(errors);
    ok
}

async fn secret_checksum(store: &Store<'_>, name: &str) -> Result<Option<String>> {
    Ok(fetch::<Secret>(store, name).await?.as_ref().and_then(checksum))
}

/// Compare TLS checksums and the HA toggle against what the status last
/// recorded, roll out dependants of whatever changed and record the new values.
///
/// A value is recorded only when its rollout had no failure other than a
/// missing target, so a failed rollout is retried on the next pass.
#[instrument(skip_all, fields(argocd = %instance.name))]
pub async fn reconcile_rollouts(store: &Store<'_>, instance: &Instance<'_>) -> Result<()> {
    let status = instance.argocd.status.clone().unwrap_or_default();
    let mut record = Map::new();
    let mut failures = Vec::new();

    if let Some(sum) = secret_checksum(store, secrets::REPO_SERVER_TLS).await? {
        if status.repo_tls_checksum.as_deref() != Some(sum.as_str()) {
            info!(secret = secrets::REPO_SERVER_TLS, "TLS secret changed");
            let targets = argocd_workloads(instance);
            if rollout(store, &targets, rollout::REPO_TLS, &mut failures).await {
                record.insert("repoTLSChecksum".to_string(), Value::from(sum));
            }
        }
    }

    if let Some(sum) = secret_checksum(store, secrets::REDIS_TLS).await? {
        if status.redis_tls_checksum.as_deref() != Some(sum.as_str()) {
            info!(secret = secrets::REDIS_TLS, "TLS secret changed");
            let mut targets = redis_workloads(instance);
            targets.extend(argocd_workloads(instance));
            if rollout(store, &targets, rollout::REDIS_TLS, &mut failures).await {
                record.insert("redisTLSChecksum".to_string(), Value::from(sum));
            }
        }
    }

    let ha = instance.spec().is_ha_enabled();
    match status.redis_ha {
        Some(previous) if previous == ha => {}
        Some(_) => {
            info!(ha, "Redis HA mode changed");
            let targets = argocd_workloads(instance);
            if rollout(store, &targets, rollout::REDIS_HA, &mut failures).await {
                record.insert("redisHA".to_string(), Value::from(ha));
            }
        }
        // first observation, nothing to restart
        None => {
            record.insert("redisHA".to_string(), Value::from(ha));
        }
    }

    if !record.is_empty() {
        record_status(store, instance.argocd, Value::Object(record)).await?;
    }

    if failures.is_empty() {
        Ok(())
    } else {
        Err(OperatorError::RolloutError(failures))
    }
}

async fn record_status(store: &Store<'_>, argocd: &ArgoCD, fields: Value) -> Result<()> {
    let api: Api<ArgoCD> = store.api();
    let name = argocd.metadata.name.clone().unwrap_or_default();
    debug!(%fields, "Recording rollout state");
    let patch = json!({ "status": fields });

    store
        .call(
            "patch status",
            "ArgoCD",
            &name,
            api.patch_status(&name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;
    Ok(())
}
