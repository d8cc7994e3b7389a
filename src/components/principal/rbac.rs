// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Identity and permissions of the principal.

use super::COMPONENT;
use crate::components::workload::labels;
use crate::components::Instance;
use crate::error::Result;
use crate::sync::{Adapter, Drift};
use k8s_openapi::api::core::v1::ServiceAccount;
use k8s_openapi::api::rbac::v1::{
    ClusterRole, ClusterRoleBinding, PolicyRule, Role, RoleBinding, RoleRef, Subject,
};

const RBAC_GROUP: &str = "rbac.authorization.k8s.io";

fn rule(groups: &[&str], resources: &[&str], verbs: &[&str]) -> PolicyRule {
    let owned = |items: &[&str]| Some(items.iter().map(|s| s.to_string()).collect());
    PolicyRule {
        api_groups: owned(groups),
        resources: owned(resources),
        verbs: verbs.iter().map(|s| s.to_string()).collect(),
        ..Default::default()
    }
}

const ALL_VERBS: &[&str] = &["create", "get", "list", "watch", "update", "patch", "delete"];

fn namespace_rules() -> Vec<PolicyRule> {
    vec![
        rule(
            &["argoproj.io"],
            &["applications", "appprojects", "applicationsets"],
            ALL_VERBS,
        ),
        rule(&[""], &["secrets", "configmaps"], ALL_VERBS),
        rule(&[""], &["events"], &["create", "list"]),
    ]
}

fn cluster_rules() -> Vec<PolicyRule> {
    vec![
        rule(&[""], &["namespaces"], &["create", "get", "list", "watch"]),
        rule(&["argoproj.io"], &["applications", "appprojects"], &["get", "list", "watch"]),
    ]
}

fn subject(instance: &Instance) -> Vec<Subject> {
    vec![Subject {
        kind: "ServiceAccount".to_string(),
        name: instance.agent(COMPONENT).name,
        namespace: Some(instance.namespace.clone()),
        ..Default::default()
    }]
}

fn role_ref(kind: &str, name: String) -> RoleRef {
    RoleRef {
        api_group: RBAC_GROUP.to_string(),
        kind: kind.to_string(),
        name,
    }
}

pub struct PrincipalServiceAccount<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> PrincipalServiceAccount<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for PrincipalServiceAccount<'_> {
    type Object = ServiceAccount;

    fn name(&self) -> String {
        self.instance.agent(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<ServiceAccount> {
        Ok(ServiceAccount {
            metadata: self
                .instance
                .agent(COMPONENT)
                .metadata(&self.instance.namespace),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<ServiceAccount>) {
        drift.field("labels", labels);
    }
}

pub struct PrincipalRole<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> PrincipalRole<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for PrincipalRole<'_> {
    type Object = Role;

    fn name(&self) -> String {
        self.instance.agent(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<Role> {
        Ok(Role {
            metadata: self
                .instance
                .agent(COMPONENT)
                .metadata(&self.instance.namespace),
            rules: Some(namespace_rules()),
        })
    }

    fn compare(&self, drift: &mut Drift<Role>) {
        drift
            .field("labels", labels)
            .field("rules", |r| &mut r.rules);
    }
}

pub struct PrincipalRoleBinding<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> PrincipalRoleBinding<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for PrincipalRoleBinding<'_> {
    type Object = RoleBinding;

    fn name(&self) -> String {
        self.instance.agent(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<RoleBinding> {
        let component = self.instance.agent(COMPONENT);
        Ok(RoleBinding {
            metadata: component.metadata(&self.instance.namespace),
            role_ref: role_ref("Role", component.name),
            subjects: Some(subject(self.instance)),
        })
    }

    fn compare(&self, drift: &mut Drift<RoleBinding>) {
        drift
            .field("labels", labels)
            .field("subjects", |rb| &mut rb.subjects)
            .immutable("roleRef", |rb| &mut rb.role_ref);
    }
}

pub struct PrincipalClusterRole<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> PrincipalClusterRole<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for PrincipalClusterRole<'_> {
    type Object = ClusterRole;

    fn name(&self) -> String {
        self.instance.agent_cluster(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<ClusterRole> {
        Ok(ClusterRole {
            metadata: self.instance.agent_cluster(COMPONENT).cluster_metadata(),
            rules: Some(cluster_rules()),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<ClusterRole>) {
        drift
            .field("labels", labels)
            .field("rules", |r| &mut r.rules);
    }
}

pub struct PrincipalClusterRoleBinding<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> PrincipalClusterRoleBinding<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for PrincipalClusterRoleBinding<'_> {
    type Object = ClusterRoleBinding;

    fn name(&self) -> String {
        self.instance.agent_cluster(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<ClusterRoleBinding> {
        let component = self.instance.agent_cluster(COMPONENT);
        Ok(ClusterRoleBinding {
            metadata: component.cluster_metadata(),
            role_ref: role_ref("ClusterRole", component.name),
            subjects: Some(subject(self.instance)),
        })
    }

    fn compare(&self, drift: &mut Drift<ClusterRoleBinding>) {
        drift
            .field("labels", labels)
            .field("subjects", |rb| &mut rb.subjects)
            .immutable("roleRef", |rb| &mut rb.role_ref);
    }
}
