// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! ArgoCD reconciler - converges every component an ArgoCD object describes.

use crate::components::principal::{self, PrincipalClusterRole, PrincipalClusterRoleBinding};
use crate::components::redis::reconcile_redis;
use crate::components::repo_server::reconcile_repo_server;
use crate::components::tls::reconcile_rollouts;
use crate::components::Instance;
use crate::config::Config;
use crate::constants::{requeue, secrets};
use crate::error::{OperatorError, Result};
use crate::kubernetes::{ensure_finalizer, has_finalizer, is_deleting, remove_finalizer};
use crate::reconcilers::status::update_status;
use crate::sync::{delete, Adapter, Outcome, Store};
use crate::types::ArgoCD;
use futures::StreamExt;
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{ConfigMap, Secret, Service, ServiceAccount};
use k8s_openapi::api::networking::v1::NetworkPolicy;
use k8s_openapi::api::rbac::v1::{ClusterRole, ClusterRoleBinding, Role, RoleBinding};
use k8s_openapi::NamespaceResourceScope;
use kube::{Api, Client, Resource, ResourceExt};
use kube_runtime::{controller::Action, reflector::ObjectRef, watcher, Controller};
use serde::de::DeserializeOwned;
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

pub struct ArgoCDReconciler {
    client: Client,
    config: Config,
}

impl ArgoCDReconciler {
    pub fn new(client: Client, config: Config) -> Self {
        Self { client, config }
    }

    fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope = NamespaceResourceScope>
            + Clone
            + DeserializeOwned
            + Debug,
    {
        match &self.config.watch_namespace {
            Some(ns) => Api::namespaced(self.client.clone(), ns),
            None => Api::all(self.client.clone()),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let argocds: Api<ArgoCD> = self.api();
        let wc = watcher::Config::default();

        let controller = Controller::new(argocds, wc.clone());
        let instances = controller.store();

        // TLS secrets are not owned by the ArgoCD, map them by namespace
        let secret_mapper = move |secret: Secret| {
            let name = secret.name_any();
            let namespace = secret.namespace();
            let relevant = name == secrets::REPO_SERVER_TLS || name == secrets::REDIS_TLS;
            instances
                .state()
                .into_iter()
                .filter(|argocd| relevant && argocd.namespace() == namespace)
                .map(|argocd| ObjectRef::from_obj(&*argocd))
                .collect::<Vec<_>>()
        };

        info!(
            namespace = self.config.watch_namespace.as_deref().unwrap_or("<all>"),
            "Starting ArgoCD controller"
        );

        controller
            .owns(self.api::<Deployment>(), wc.clone())
            .owns(self.api::<StatefulSet>(), wc.clone())
            .owns(self.api::<Service>(), wc.clone())
            .owns(self.api::<ConfigMap>(), wc.clone())
            .owns(self.api::<ServiceAccount>(), wc.clone())
            .owns(self.api::<Role>(), wc.clone())
            .owns(self.api::<RoleBinding>(), wc.clone())
            .owns(self.api::<NetworkPolicy>(), wc.clone())
            .watches(self.api::<Secret>(), wc, secret_mapper)
            .shutdown_on_signal()
            .run(reconcile, error_policy, Arc::new(self))
            .for_each(|res| async move {
                match res {
                    Ok(o) => debug!("Reconciled ArgoCD: {:?}", o),
                    Err(e) => warn!("Reconciliation error: {:?}", e),
                }
            })
            .await;

        Ok(())
    }
}

#[instrument(
    skip_all,
    fields(argocd = %argocd.name_any(), namespace = %argocd.namespace().unwrap_or_default())
)]
async fn reconcile(argocd: Arc<ArgoCD>, ctx: Arc<ArgoCDReconciler>) -> Result<Action> {
    let deadline = Instant::now() + ctx.config.reconcile_timeout;
    let store = Store::new(ctx.client.clone(), &argocd)?.with_deadline(deadline);
    let instance = Instance::new(&argocd, &ctx.config)?;

    if is_deleting(&argocd) {
        if has_finalizer(&argocd) {
            cleanup(&store, &instance).await?;
            remove_finalizer(&store, &argocd).await?;
        }
        return Ok(Action::await_change());
    }

    if ensure_finalizer(&store, &argocd).await? {
        // the patch triggers a fresh event with the finalizer in place
        return Ok(Action::await_change());
    }

    debug!("Reconciling ArgoCD");

    let mut outcomes = reconcile_redis(&store, &instance).await?;
    outcomes.extend(reconcile_repo_server(&store, &instance).await?);
    outcomes.extend(principal::reconcile_principal(&store, &instance).await?);

    reconcile_rollouts(&store, &instance).await?;
    update_status(&store, &instance).await?;

    let writes = outcomes.iter().filter(|o| o.is_write()).count();
    info!(writes, "Reconciled ArgoCD");

    Ok(next_action(&outcomes, &ctx.config))
}

/// Requeue soon after a replace so the deleted object is recreated.
fn next_action(outcomes: &[Outcome], config: &Config) -> Action {
    if outcomes.contains(&Outcome::Replaced) {
        Action::requeue(Duration::from_secs(requeue::REPLACED_SECS))
    } else {
        Action::requeue(config.requeue_interval)
    }
}

/// Namespaced objects go with their owner reference; cluster-scoped ones
/// have to be removed explicitly.
async fn cleanup(store: &Store<'_>, instance: &Instance<'_>) -> Result<()> {
    info!("Removing cluster-scoped objects");
    delete::<ClusterRoleBinding>(store, &PrincipalClusterRoleBinding::new(instance).name())
        .await?;
    delete::<ClusterRole>(store, &PrincipalClusterRole::new(instance).name()).await?;
    Ok(())
}

fn error_policy(
    argocd: Arc<ArgoCD>,
    error: &OperatorError,
    _ctx: Arc<ArgoCDReconciler>,
) -> Action {
    error!(argocd = %argocd.name_any(), "Reconciliation error: {}", error);
    Action::requeue(Duration::from_secs(requeue::ERROR_SECS))
}
