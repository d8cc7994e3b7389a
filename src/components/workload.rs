// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Field comparisons shared by the adapters of Deployments, StatefulSets and
//! Services, plus a few pod building blocks.
//!
//! Only fields the operator sets are compared. Pod template annotations are
//! never compared, they carry rollout markers.

use crate::sync::{Drift, PodTemplated};
use k8s_openapi::api::apps::v1::{Deployment, StatefulSet};
use k8s_openapi::api::core::v1::{
    Container, HTTPGetAction, PodSpec, Probe, Service, ServiceSpec, TCPSocketAction, Volume,
};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::Resource;
use std::collections::BTreeMap;

/// Mode 0644, what the API server fills in when left unset
pub const DEFAULT_VOLUME_MODE: i32 = 420;

pub fn labels<K: Resource>(object: &mut K) -> &mut Option<BTreeMap<String, String>> {
    &mut object.meta_mut().labels
}

fn pod_spec<K: PodTemplated>(object: &mut K) -> &mut PodSpec {
    object.pod_template().spec.get_or_insert_with(Default::default)
}

fn template_labels<K: PodTemplated>(object: &mut K) -> &mut Option<BTreeMap<String, String>> {
    &mut object
        .pod_template()
        .metadata
        .get_or_insert_with(Default::default)
        .labels
}

fn container<K: PodTemplated>(object: &mut K, index: usize) -> &mut Container {
    &mut pod_spec(object).containers[index]
}

/// Compare the pod template: labels, service account, volumes and the
/// operator-managed fields of every container.
pub fn compare_pod_template<K: PodTemplated>(drift: &mut Drift<K>) {
    drift
        .field("template.labels", template_labels)
        .field("serviceAccountName", |k| &mut pod_spec(k).service_account_name)
        .field("volumes", |k| &mut pod_spec(k).volumes);

    let same_containers = {
        let (existing, desired) = drift.sides_mut();
        container_names(existing) == container_names(desired)
    };
    if !same_containers {
        drift.field("containers", |k| &mut pod_spec(k).containers);
        return;
    }

    let count = {
        let (_, desired) = drift.sides_mut();
        pod_spec(desired).containers.len()
    };
    for i in 0..count {
        drift
            .field("image", move |k| &mut container(k, i).image)
            .field("command", move |k| &mut container(k, i).command)
            .field("args", move |k| &mut container(k, i).args)
            .field("env", move |k| &mut container(k, i).env)
            .field("ports", move |k| &mut container(k, i).ports)
            .field("volumeMounts", move |k| &mut container(k, i).volume_mounts)
            .field("livenessProbe", move |k| &mut container(k, i).liveness_probe)
            .field("readinessProbe", move |k| &mut container(k, i).readiness_probe);
    }
}

fn container_names<K: PodTemplated>(object: &mut K) -> Vec<String> {
    pod_spec(object)
        .containers
        .iter()
        .map(|c| c.name.clone())
        .collect()
}

pub fn compare_deployment(drift: &mut Drift<Deployment>) {
    drift
        .field("labels", labels)
        .field("replicas", |d| &mut d.spec.get_or_insert_with(Default::default).replicas)
        .immutable("selector", |d| {
            &mut d.spec.get_or_insert_with(Default::default).selector
        });
    compare_pod_template(drift);
}

pub fn compare_statefulset(drift: &mut Drift<StatefulSet>) {
    drift
        .field("labels", labels)
        .field("replicas", |s| &mut s.spec.get_or_insert_with(Default::default).replicas)
        .immutable("selector", |s| {
            &mut s.spec.get_or_insert_with(Default::default).selector
        })
        .immutable("serviceName", |s| {
            &mut s.spec.get_or_insert_with(Default::default).service_name
        });
    compare_pod_template(drift);
}

fn service_spec(service: &mut Service) -> &mut ServiceSpec {
    service.spec.get_or_insert_with(Default::default)
}

/// Compare a Service. The cluster IP and node ports the API server allocated
/// are carried over into the desired object first, so they never count as drift.
pub fn compare_service(drift: &mut Drift<Service>) {
    {
        let (existing, desired) = drift.sides_mut();
        let allocated: BTreeMap<String, i32> = service_spec(existing)
            .ports
            .iter()
            .flatten()
            .filter_map(|p| Some((p.name.clone()?, p.node_port?)))
            .collect();
        // an allocated address only matters when switching to or from headless
        let cluster_ip = service_spec(existing).cluster_ip.clone();
        let desired_spec = service_spec(desired);
        if desired_spec.cluster_ip.is_none() && cluster_ip.as_deref() != Some("None") {
            desired_spec.cluster_ip = cluster_ip;
        }
        for port in desired_spec.ports.iter_mut().flatten() {
            if port.node_port.is_none() {
                if let Some(node_port) = port.name.as_ref().and_then(|n| allocated.get(n)) {
                    port.node_port = Some(*node_port);
                }
            }
        }
    }

    drift
        .field("labels", labels)
        .field("type", |s| &mut service_spec(s).type_)
        .field("selector", |s| &mut service_spec(s).selector)
        .field("ports", |s| &mut service_spec(s).ports)
        .immutable("clusterIP", |s| &mut service_spec(s).cluster_ip);
}

pub fn secret_volume(name: &str, secret: &str, optional: bool) -> Volume {
    Volume {
        name: name.to_string(),
        secret: Some(k8s_openapi::api::core::v1::SecretVolumeSource {
            secret_name: Some(secret.to_string()),
            optional: Some(optional),
            default_mode: Some(DEFAULT_VOLUME_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn config_map_volume(name: &str, config_map: &str) -> Volume {
    Volume {
        name: name.to_string(),
        config_map: Some(k8s_openapi::api::core::v1::ConfigMapVolumeSource {
            name: config_map.to_string(),
            default_mode: Some(DEFAULT_VOLUME_MODE),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// HTTP probe with every knob set so the API server adds nothing.
pub fn http_probe(path: &str, port: i32, initial_delay: i32) -> Probe {
    Probe {
        http_get: Some(HTTPGetAction {
            path: Some(path.to_string()),
            port: IntOrString::Int(port),
            scheme: Some("HTTP".to_string()),
            ..Default::default()
        }),
        ..probe_defaults(initial_delay)
    }
}

pub fn tcp_probe(port: i32, initial_delay: i32) -> Probe {
    Probe {
        tcp_socket: Some(TCPSocketAction {
            port: IntOrString::Int(port),
            ..Default::default()
        }),
        ..probe_defaults(initial_delay)
    }
}

fn probe_defaults(initial_delay: i32) -> Probe {
    Probe {
        initial_delay_seconds: Some(initial_delay),
        period_seconds: Some(10),
        timeout_seconds: Some(1),
        success_threshold: Some(1),
        failure_threshold: Some(3),
        ..Default::default()
    }
}
