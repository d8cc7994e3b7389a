// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Finalizer bookkeeping on ArgoCD objects.

use crate::constants::FINALIZER;
use crate::error::Result;
use crate::sync::Store;
use crate::types::ArgoCD;
use kube::api::{Patch, PatchParams};
use kube::{Api, Resource, ResourceExt};
use serde_json::json;
use tracing::debug;

pub fn is_deleting(argocd: &ArgoCD) -> bool {
    argocd.meta().deletion_timestamp.is_some()
}

pub fn has_finalizer(argocd: &ArgoCD) -> bool {
    argocd.finalizers().iter().any(|f| f == FINALIZER)
}

/// Add the finalizer if missing. Returns whether a patch was sent.
pub async fn ensure_finalizer(store: &Store<'_>, argocd: &ArgoCD) -> Result<bool> {
    if has_finalizer(argocd) {
        return Ok(false);
    }

    let mut finalizers = argocd.finalizers().to_vec();
    finalizers.push(FINALIZER.to_string());
    patch_finalizers(store, argocd, finalizers).await?;
    debug!(argocd = %argocd.name_any(), "Added finalizer");
    Ok(true)
}

pub async fn remove_finalizer(store: &Store<'_>, argocd: &ArgoCD) -> Result<()> {
    let mut finalizers = argocd.finalizers().to_vec();
    finalizers.retain(|f| f != FINALIZER);
    patch_finalizers(store, argocd, finalizers).await?;
    debug!(argocd = %argocd.name_any(), "Removed finalizer");
    Ok(())
}

async fn patch_finalizers(
    store: &Store<'_>,
    argocd: &ArgoCD,
    finalizers: Vec<String>,
) -> Result<()> {
    let api: Api<ArgoCD> = store.api();
    let name = argocd.name_any();
    let patch = json!({
        "metadata": { "finalizers": finalizers }
    });

    store
        .call(
            "patch finalizers",
            "ArgoCD",
            &name,
            api.patch(&name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{group_path, MockService};
    use crate::types::ArgoCDSpec;

    fn argocd(finalizers: Option<Vec<String>>) -> ArgoCD {
        let mut argocd = ArgoCD::new("demo", ArgoCDSpec::default());
        argocd.metadata.namespace = Some("ns1".to_string());
        argocd.metadata.finalizers = finalizers;
        argocd
    }

    fn path() -> String {
        group_path("argoproj.io/v1beta1", "ns1", "argocds", "demo")
    }

    #[tokio::test]
    async fn test_ensure_adds_once() {
        let argocd = argocd(None);
        let mock = MockService::new().with_object(&path(), serde_json::to_value(&argocd).unwrap());
        let store = Store::new(mock.clone().into_client(), &argocd).unwrap();

        assert!(ensure_finalizer(&store, &argocd).await.unwrap());
        let stored: ArgoCD = mock.get(&path()).unwrap();
        assert!(has_finalizer(&stored));

        mock.clear_requests();
        assert!(!ensure_finalizer(&store, &stored).await.unwrap());
        assert!(mock.requests().is_empty());
    }

    #[tokio::test]
    async fn test_remove_keeps_foreign_finalizers() {
        let argocd = argocd(Some(vec![
            "example.com/other".to_string(),
            FINALIZER.to_string(),
        ]));
        let mock = MockService::new().with_object(&path(), serde_json::to_value(&argocd).unwrap());
        let store = Store::new(mock.clone().into_client(), &argocd).unwrap();

        remove_finalizer(&store, &argocd).await.unwrap();

        let stored: ArgoCD = mock.get(&path()).unwrap();
        assert_eq!(stored.finalizers(), &["example.com/other".to_string()]);
    }
}
