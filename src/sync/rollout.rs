// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Restart dependent workloads by stamping a marker on their pod template.

use crate::constants::rollout;
use crate::error::{OperatorError, Result};
use crate::kubernetes::ScopeExt;
use crate::sync::store::{self, Store};
use chrono::{SecondsFormat, Utc};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::{self, Debug};
use tracing::{info, instrument, warn};

/// A workload whose pods should be restarted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Workload {
    Deployment(String),
    StatefulSet(String),
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Workload::Deployment(name) => write!(f, "Deployment {}", name),
            Workload::StatefulSet(name) => write!(f, "StatefulSet {}", name),
        }
    }
}

/// Workload kinds that carry a pod template. A missing spec is filled in
/// with defaults.
pub trait PodTemplated {
    fn pod_template(&mut self) -> &mut PodTemplateSpec;
}

impl PodTemplated for Deployment {
    fn pod_template(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

impl PodTemplated for StatefulSet {
    fn pod_template(&mut self) -> &mut PodTemplateSpec {
        &mut self.spec.get_or_insert_with(Default::default).template
    }
}

/// `argocd.argoproj.io/<change_key>`
pub fn marker_key(change_key: &str) -> String {
    format!("{}/{}", rollout::PREFIX, change_key)
}

/// Stamp a fresh marker on every target. Each failure, not-found included, is
/// collected and the remaining targets are still processed.
#[instrument(skip(store, targets), fields(namespace = %store.namespace()))]
pub async fn trigger_rollout(
    store: &Store<'_>,
    targets: &[Workload],
    change_key: &str,
) -> Vec<OperatorError> {
    let mut errors = Vec::new();

    for target in targets {
        let result = match target {
            Workload::Deployment(name) => restart::<Deployment>(store, name, change_key).await,
            Workload::StatefulSet(name) => restart::<StatefulSet>(store, name, change_key).await,
        };

        match result {
            Ok(()) => info!(target = %target, change = change_key, "Triggered rollout"),
            Err(e) => {
                warn!(target = %target, change = change_key, "Rollout failed: {}", e);
                errors.push(e);
            }
        }
    }

    errors
}

async fn restart<K>(store: &Store<'_>, name: &str, change_key: &str) -> Result<()>
where
    K: Resource<DynamicType = (), Scope: ScopeExt>
        + PodTemplated
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned,
{
    let kind = K::kind(&()).to_string();
    let mut workload = store::fetch::<K>(store, name)
        .await?
        .ok_or_else(|| not_found(&kind, name))?;

    workload
        .pod_template()
        .metadata
        .get_or_insert_with(Default::default)
        .annotations
        .get_or_insert_with(Default::default)
        .insert(
            marker_key(change_key),
            Utc::now().to_rfc3339_opts(SecondsFormat::Nanos, true),
        );

    store::replace(store, &workload).await?;
    Ok(())
}

fn not_found(kind: &str, name: &str) -> OperatorError {
    OperatorError::StoreError {
        action: "get",
        kind: kind.to_string(),
        name: name.to_string(),
        source: kube::Error::Api(kube::error::ErrorResponse {
            status: "Failure".to_string(),
            message: format!("{} {} not found", kind, name),
            reason: "NotFound".to_string(),
            code: 404,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{group_path, MockService};
    use crate::types::{ArgoCD, ArgoCDSpec};
    use k8s_openapi::api::apps::v1::{DeploymentSpec, StatefulSetSpec};
    use kube::api::ObjectMeta;

    fn owner() -> ArgoCD {
        let mut argocd = ArgoCD::new("demo", ArgoCDSpec::default());
        argocd.metadata.namespace = Some("ns1".to_string());
        argocd
    }

    fn deployment(name: &str) -> serde_json::Value {
        serde_json::to_value(Deployment {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            spec: Some(DeploymentSpec::default()),
            ..Default::default()
        })
        .unwrap()
    }

    fn statefulset(name: &str) -> serde_json::Value {
        serde_json::to_value(StatefulSet {
            metadata: ObjectMeta {
                name: Some(name.to_string()),
                namespace: Some("ns1".to_string()),
                ..Default::default()
            },
            spec: Some(StatefulSetSpec::default()),
            ..Default::default()
        })
        .unwrap()
    }

    fn marker(object: &serde_json::Value, change_key: &str) -> Option<String> {
        object["spec"]["template"]["metadata"]["annotations"][marker_key(change_key)]
            .as_str()
            .map(str::to_string)
    }

    #[test]
    fn test_marker_key() {
        assert_eq!(
            marker_key("repo-server-tls-changed"),
            "argocd.argoproj.io/repo-server-tls-changed"
        );
    }

    #[tokio::test]
    async fn test_fan_out_continues_past_missing_target() {
        let owner = owner();
        let server = group_path("apps/v1", "ns1", "deployments", "demo-server");
        let controller = group_path(
            "apps/v1",
            "ns1",
            "statefulsets",
            "demo-application-controller",
        );
        let mock = MockService::new()
            .with_object(&server, deployment("demo-server"))
            .with_object(&controller, statefulset("demo-application-controller"));
        let store = Store::new(mock.clone().into_client(), &owner).unwrap();

        let targets = [
            Workload::Deployment("demo-server".to_string()),
            Workload::Deployment("demo-repo-server".to_string()),
            Workload::StatefulSet("demo-application-controller".to_string()),
        ];
        let errors = trigger_rollout(&store, &targets, rollout::REPO_TLS).await;

        assert_eq!(mock.count("PUT"), 2);
        assert_eq!(errors.len(), 1);
        assert!(errors[0].is_not_found());
        assert!(marker(&mock.object(&server).unwrap(), rollout::REPO_TLS).is_some());
        assert!(marker(&mock.object(&controller).unwrap(), rollout::REPO_TLS).is_some());
    }

    #[tokio::test]
    async fn test_repeated_rollout_changes_marker() {
        let owner = owner();
        let server = group_path("apps/v1", "ns1", "deployments", "demo-server");
        let mock = MockService::new().with_object(&server, deployment("demo-server"));
        let store = Store::new(mock.clone().into_client(), &owner).unwrap();
        let targets = [Workload::Deployment("demo-server".to_string())];

        assert!(trigger_rollout(&store, &targets, rollout::REDIS_TLS).await.is_empty());
        let first = marker(&mock.object(&server).unwrap(), rollout::REDIS_TLS).unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        assert!(trigger_rollout(&store, &targets, rollout::REDIS_TLS).await.is_empty());
        let second = marker(&mock.object(&server).unwrap(), rollout::REDIS_TLS).unwrap();

        assert_ne!(first, second);
        assert!(first.ends_with('Z'));
    }
}
