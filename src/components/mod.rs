// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Desired-state builders for every component an ArgoCD manages.

pub mod principal;
pub mod redis;
pub mod repo_server;
pub mod tls;
pub mod workload;

use crate::config::Config;
use crate::constants::{labels, ports};
use crate::error::{OperatorError, Result};
use crate::types::argocd::EnvVarSpec;
use crate::types::{ArgoCD, ArgoCDSpec};
use k8s_openapi::api::core::v1::{ContainerPort, EnvVar, ServicePort};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelector;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use kube::ResourceExt;
use std::collections::BTreeMap;

pub const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];
pub const LOG_FORMATS: &[&str] = &["text", "json"];

/// Everything derived from one ArgoCD for the duration of a reconciliation
/// pass. Names and labels are recomputed from here, never stored.
#[derive(Debug, Clone)]
pub struct Instance<'a> {
    pub argocd: &'a ArgoCD,
    pub config: &'a Config,
    pub name: String,
    pub namespace: String,
}

impl<'a> Instance<'a> {
    pub fn new(argocd: &'a ArgoCD, config: &'a Config) -> Result<Self> {
        let name = argocd.name_any();
        let namespace = argocd
            .namespace()
            .ok_or_else(|| OperatorError::MissingNamespace(name.clone()))?;

        Ok(Self {
            argocd,
            config,
            name,
            namespace,
        })
    }

    pub fn spec(&self) -> &ArgoCDSpec {
        &self.argocd.spec
    }

    /// `<owner>-<component>`, part of argocd
    pub fn core(&self, component: &str) -> Component {
        Component::new(
            format!("{}-{}", self.name, component),
            component,
            labels::PART_OF_ARGOCD,
            &self.name,
        )
    }

    /// `<owner>-agent-<component>`, part of argocd-agent
    pub fn agent(&self, component: &str) -> Component {
        Component::new(
            format!("{}-agent-{}", self.name, component),
            component,
            labels::PART_OF_AGENT,
            &self.name,
        )
    }

    /// Cluster-scoped names also carry the namespace so that two ArgoCDs of
    /// the same name in different namespaces do not collide.
    pub fn agent_cluster(&self, component: &str) -> Component {
        Component::new(
            format!("{}-{}-agent-{}", self.name, self.namespace, component),
            component,
            labels::PART_OF_AGENT,
            &self.name,
        )
    }

    /// In-namespace address of whichever redis endpoint is active.
    pub fn redis_address(&self) -> String {
        let service = if self.spec().is_ha_enabled() {
            redis::HA_PROXY_COMPONENT
        } else {
            redis::COMPONENT
        };
        format!("{}-{}:{}", self.name, service, ports::REDIS)
    }
}

/// Name and labels of one managed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

impl Component {
    fn new(name: String, component: &str, part_of: &str, owner: &str) -> Self {
        let labels = BTreeMap::from([
            (labels::NAME.to_string(), name.clone()),
            (labels::COMPONENT.to_string(), component.to_string()),
            (labels::PART_OF.to_string(), part_of.to_string()),
            (labels::MANAGED_BY.to_string(), owner.to_string()),
        ]);
        Self { name, labels }
    }

    /// Same component under a different object name, e.g. an extra Service.
    pub fn renamed(&self, name: String) -> Self {
        let mut labels = self.labels.clone();
        labels.insert(labels::NAME.to_string(), name.clone());
        Self { name, labels }
    }

    pub fn metadata(&self, namespace: &str) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(namespace.to_string()),
            labels: Some(self.labels.clone()),
            ..Default::default()
        }
    }

    pub fn cluster_metadata(&self) -> ObjectMeta {
        ObjectMeta {
            name: Some(self.name.clone()),
            labels: Some(self.labels.clone()),
            ..Default::default()
        }
    }

    /// Labels pods are selected by. Only the name label, so that the other
    /// labels may change without touching immutable selectors.
    pub fn selector_labels(&self) -> BTreeMap<String, String> {
        BTreeMap::from([(labels::NAME.to_string(), self.name.clone())])
    }

    pub fn selector(&self) -> LabelSelector {
        LabelSelector {
            match_labels: Some(self.selector_labels()),
            ..Default::default()
        }
    }
}

/// Combine an optional image and version override with a default reference.
///
/// A version starting with `sha256:` is treated as a digest.
pub fn resolve_image(image: Option<&str>, version: Option<&str>, default: &str) -> String {
    let repository = match image {
        Some(image) => image.to_string(),
        None => strip_tag(default).to_string(),
    };

    match (image, version) {
        (_, Some(v)) if v.starts_with("sha256:") => format!("{}@{}", strip_tag(&repository), v),
        (_, Some(v)) => format!("{}:{}", strip_tag(&repository), v),
        (Some(_), None) => repository,
        (None, None) => default.to_string(),
    }
}

/// Drop a trailing `:tag` or `@digest`, leaving registry ports alone.
fn strip_tag(image: &str) -> &str {
    if let Some((repo, _)) = image.split_once('@') {
        return repo;
    }
    match image.rfind(':') {
        Some(idx) if !image[idx..].contains('/') => &image[..idx],
        _ => image,
    }
}

/// Reject values outside a closed set.
pub fn validate_choice(
    kind: &str,
    name: &str,
    field: &str,
    value: &str,
    allowed: &[&str],
) -> Result<()> {
    if allowed.contains(&value) {
        return Ok(());
    }
    Err(OperatorError::BuildError {
        kind: kind.to_string(),
        name: name.to_string(),
        reason: format!(
            "{} must be one of {}, got {:?}",
            field,
            allowed.join(", "),
            value
        ),
    })
}

/// Accept Go-style durations such as `30s`, `1m30s` or `250ms`.
pub fn validate_duration(kind: &str, name: &str, field: &str, value: &str) -> Result<()> {
    if is_duration(value) {
        return Ok(());
    }
    Err(OperatorError::BuildError {
        kind: kind.to_string(),
        name: name.to_string(),
        reason: format!("{} is not a valid duration: {:?}", field, value),
    })
}

fn is_duration(value: &str) -> bool {
    if value == "0" {
        return true;
    }
    let mut rest = value;
    if rest.is_empty() {
        return false;
    }
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(rest.len());
        if digits == 0 || rest[..digits].parse::<f64>().is_err() {
            return false;
        }
        rest = &rest[digits..];
        let unit = ["ns", "us", "µs", "ms", "s", "m", "h"]
            .iter()
            .filter(|u| rest.starts_with(**u))
            .max_by_key(|u| u.len());
        match unit {
            Some(u) => rest = &rest[u.len()..],
            None => return false,
        }
    }
    true
}

/// Plain name/value variables from the custom resource.
pub fn env_vars(spec: Option<&Vec<EnvVarSpec>>) -> Vec<EnvVar> {
    spec.map(|vars| {
        vars.iter()
            .map(|v| EnvVar {
                name: v.name.clone(),
                value: Some(v.value.clone()),
                ..Default::default()
            })
            .collect()
    })
    .unwrap_or_default()
}

pub fn container_port(name: &str, port: i32) -> ContainerPort {
    ContainerPort {
        name: Some(name.to_string()),
        container_port: port,
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

pub fn service_port(name: &str, port: i32, target: i32) -> ServicePort {
    ServicePort {
        name: Some(name.to_string()),
        port,
        target_port: Some(IntOrString::Int(target)),
        protocol: Some("TCP".to_string()),
        ..Default::default()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use crate::types::{ArgoCD, ArgoCDSpec};

    /// An ArgoCD named `demo` in `ns1` with a uid, as the API server returns it.
    pub fn argocd(spec: ArgoCDSpec) -> ArgoCD {
        let mut argocd = ArgoCD::new("demo", spec);
        argocd.metadata.namespace = Some("ns1".to_string());
        argocd.metadata.uid = Some("owner-uid".to_string());
        argocd
    }
}
