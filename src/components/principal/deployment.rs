// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::params::{params_name, PARAMS};
use super::COMPONENT;
use crate::components::workload::{compare_deployment, http_probe, secret_volume};
use crate::components::{container_port, env_vars, resolve_image, Instance};
use crate::constants::ports;
use crate::error::Result;
use crate::sync::{Adapter, Drift};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    ConfigMapKeySelector, Container, EnvVar, EnvVarSource, PodSpec, PodTemplateSpec, VolumeMount,
};
use kube::api::ObjectMeta;

pub const CONTAINER_NAME: &str = "argocd-agent-principal";
const JWT_VOLUME: &str = "jwt-secret";
const JWT_MOUNT_PATH: &str = "/app/config/jwt";

/// The principal itself. Configuration is read from the params ConfigMap
/// through one `configMapKeyRef` per key; user env vars are appended.
pub struct PrincipalDeployment<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> PrincipalDeployment<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }

    fn image(&self) -> String {
        let server = self.instance.spec().principal().and_then(|p| p.server.as_ref());
        resolve_image(
            server.and_then(|s| s.image.as_deref()),
            None,
            &self.instance.config.images.agent,
        )
    }

    fn env(&self) -> Vec<EnvVar> {
        let config_map = params_name(self.instance);
        let mut env: Vec<EnvVar> = PARAMS
            .iter()
            .map(|(key, var)| EnvVar {
                name: var.to_string(),
                value_from: Some(EnvVarSource {
                    config_map_key_ref: Some(ConfigMapKeySelector {
                        name: config_map.clone(),
                        key: key.to_string(),
                        optional: Some(true),
                    }),
                    ..Default::default()
                }),
                ..Default::default()
            })
            .collect();

        let server = self.instance.spec().principal().and_then(|p| p.server.as_ref());
        env.extend(env_vars(server.and_then(|s| s.env.as_ref())));
        env
    }

    fn jwt_secret(&self) -> String {
        self.instance
            .spec()
            .principal()
            .and_then(|p| p.jwt.as_ref())
            .and_then(|j| j.secret_name.clone())
            .unwrap_or_else(|| "argocd-agent-jwt".to_string())
    }
}

impl Adapter for PrincipalDeployment<'_> {
    type Object = Deployment;

    fn name(&self) -> String {
        self.instance.agent(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<Deployment> {
        let component = self.instance.agent(COMPONENT);

        let container = Container {
            name: CONTAINER_NAME.to_string(),
            image: Some(self.image()),
            args: Some(vec!["principal".to_string()]),
            env: Some(self.env()),
            ports: Some(vec![
                container_port("principal", ports::PRINCIPAL_LISTEN),
                container_port("metrics", ports::PRINCIPAL_METRICS),
                container_port("redis", ports::REDIS),
                container_port("healthz", ports::PRINCIPAL_HEALTHZ),
            ]),
            volume_mounts: Some(vec![VolumeMount {
                name: JWT_VOLUME.to_string(),
                mount_path: JWT_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
            liveness_probe: Some(http_probe("/healthz", ports::PRINCIPAL_HEALTHZ, 10)),
            readiness_probe: Some(http_probe("/healthz", ports::PRINCIPAL_HEALTHZ, 5)),
            ..Default::default()
        };

        Ok(Deployment {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: component.selector(),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(component.labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        service_account_name: Some(component.name.clone()),
                        containers: vec![container],
                        volumes: Some(vec![secret_volume(JWT_VOLUME, &self.jwt_secret(), true)]),
                        ..Default::default()
                    }),
                },
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Deployment>) {
        compare_deployment(drift);
    }
}
