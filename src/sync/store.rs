// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Per-pass access to the API server: owner, namespace and deadline.

use crate::error::{OperatorError, Result};
use crate::kubernetes::ScopeExt;
use crate::types::ArgoCD;
use kube::{
    api::{DeleteParams, PostParams},
    Api, Client, Resource, ResourceExt,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use std::future::Future;
use tokio::time::{timeout_at, Instant};

/// Remote store handle for a single reconciliation pass of one ArgoCD.
pub struct Store<'a> {
    client: Client,
    owner: &'a ArgoCD,
    namespace: String,
    deadline: Option<Instant>,
}

impl<'a> Store<'a> {
    pub fn new(client: Client, owner: &'a ArgoCD) -> Result<Self> {
        let namespace = owner
            .namespace()
            .ok_or_else(|| OperatorError::MissingNamespace(owner.name_any()))?;

        Ok(Self {
            client,
            owner,
            namespace,
            deadline: None,
        })
    }

    /// Abort store calls that have not completed by `deadline`
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn owner(&self) -> &ArgoCD {
        self.owner
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn api<K>(&self) -> Api<K>
    where
        K: Resource<DynamicType = (), Scope: ScopeExt>,
    {
        <K::Scope as ScopeExt>::api(self.client.clone(), &self.namespace)
    }

    /// Run one API call under the pass deadline, annotating failures with
    /// the action and the object identity.
    pub async fn call<T, F>(
        &self,
        action: &'static str,
        kind: &str,
        name: &str,
        fut: F,
    ) -> Result<T>
    where
        F: Future<Output = kube::Result<T>>,
    {
        let result = match self.deadline {
            Some(deadline) => timeout_at(deadline, fut)
                .await
                .map_err(|_| OperatorError::Timeout {
                    action,
                    kind: kind.to_string(),
                    name: name.to_string(),
                })?,
            None => fut.await,
        };

        result.map_err(|source| OperatorError::StoreError {
            action,
            kind: kind.to_string(),
            name: name.to_string(),
            source,
        })
    }
}

/// Look up an object by name. Not-found is `Ok(None)`; every other failure
/// is an error.
pub async fn fetch<K>(store: &Store<'_>, name: &str) -> Result<Option<K>>
where
    K: Resource<DynamicType = (), Scope: ScopeExt> + Clone + DeserializeOwned + Debug,
{
    let api = store.api::<K>();
    store
        .call("get", &K::kind(&()), name, api.get_opt(name))
        .await
}

pub(crate) async fn create<K>(store: &Store<'_>, object: &K) -> Result<K>
where
    K: Resource<DynamicType = (), Scope: ScopeExt> + Clone + Serialize + DeserializeOwned + Debug,
{
    let api = store.api::<K>();
    let name = object.name_any();
    store
        .call(
            "create",
            &K::kind(&()),
            &name,
            api.create(&PostParams::default(), object),
        )
        .await
}

pub(crate) async fn replace<K>(store: &Store<'_>, object: &K) -> Result<K>
where
    K: Resource<DynamicType = (), Scope: ScopeExt> + Clone + Serialize + DeserializeOwned + Debug,
{
    let api = store.api::<K>();
    let name = object.name_any();
    store
        .call(
            "update",
            &K::kind(&()),
            &name,
            api.replace(&name, &PostParams::default(), object),
        )
        .await
}

/// Delete an object; one that is already gone counts as deleted.
pub async fn delete<K>(store: &Store<'_>, name: &str) -> Result<()>
where
    K: Resource<DynamicType = (), Scope: ScopeExt> + Clone + DeserializeOwned + Debug,
{
    let api = store.api::<K>();
    match store
        .call(
            "delete",
            &K::kind(&()),
            name,
            api.delete(name, &DeleteParams::default()),
        )
        .await
    {
        Ok(_) => Ok(()),
        Err(e) if e.is_not_found() => Ok(()),
        Err(e) => Err(e),
    }
}
