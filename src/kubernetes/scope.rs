// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Resource scope dispatch so generic code can build the right `Api` handle.

use k8s_openapi::{ClusterResourceScope, NamespaceResourceScope};
use kube::{Api, Client, Resource};

/// Implemented for the two k8s-openapi scope markers.
pub trait ScopeExt: Sized {
    /// Cluster-scoped objects cannot carry an owner reference to a namespaced owner.
    const CLUSTER_SCOPED: bool;

    /// Api handle for `K`, namespaced when the scope requires it.
    fn api<K>(client: Client, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>;
}

impl ScopeExt for NamespaceResourceScope {
    const CLUSTER_SCOPED: bool = false;

    fn api<K>(client: Client, namespace: &str) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        Api::namespaced(client, namespace)
    }
}

impl ScopeExt for ClusterResourceScope {
    const CLUSTER_SCOPED: bool = true;

    fn api<K>(client: Client, _namespace: &str) -> Api<K>
    where
        K: Resource<Scope = Self, DynamicType = ()>,
    {
        Api::all(client)
    }
}
