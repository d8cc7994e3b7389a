// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! The ArgoCD agent principal: the hub side that remote agents connect to.

mod deployment;
mod params;
mod rbac;
mod service;

pub use deployment::PrincipalDeployment;
pub use params::{params_name, ParamsConfigMap, PARAMS};
pub use rbac::{
    PrincipalClusterRole, PrincipalClusterRoleBinding, PrincipalRole, PrincipalRoleBinding,
    PrincipalServiceAccount,
};
pub use service::{Endpoint, PrincipalService};

use crate::components::Instance;
use crate::error::Result;
use crate::sync::{converge, Outcome, Store};
use tracing::instrument;

pub const COMPONENT: &str = "principal";

/// Converge every principal object, identity and permissions first so the
/// Deployment starts with everything it needs.
#[instrument(skip_all, fields(argocd = %instance.name))]
pub async fn reconcile_principal(
    store: &Store<'_>,
    instance: &Instance<'_>,
) -> Result<Vec<Outcome>> {
    let mut outcomes = vec![
        converge(store, &PrincipalServiceAccount::new(instance)).await?,
        converge(store, &PrincipalRole::new(instance)).await?,
        converge(store, &PrincipalRoleBinding::new(instance)).await?,
        converge(store, &PrincipalClusterRole::new(instance)).await?,
        converge(store, &PrincipalClusterRoleBinding::new(instance)).await?,
        converge(store, &ParamsConfigMap::new(instance)).await?,
    ];
    for endpoint in Endpoint::ALL {
        outcomes.push(converge(store, &PrincipalService::new(instance, endpoint)).await?);
    }
    outcomes.push(converge(store, &PrincipalDeployment::new(instance)).await?);

    Ok(outcomes)
}
