// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Repository server: renders manifests for the application controller.

use crate::components::workload::{compare_deployment, compare_service, secret_volume, tcp_probe};
use crate::components::{
    container_port, env_vars, resolve_image, service_port, validate_choice, Instance, LOG_FORMATS,
    LOG_LEVELS,
};
use crate::constants::{ports, secrets};
use crate::error::Result;
use crate::sync::{converge, Adapter, Drift, Outcome, Store};
use crate::types::argocd::ArgoCDRepoSpec;
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec};
use k8s_openapi::api::core::v1::{
    Container, PodSpec, PodTemplateSpec, Service, ServiceSpec, VolumeMount,
};
use kube::api::ObjectMeta;
use tracing::instrument;

pub const COMPONENT: &str = "repo-server";

const TLS_VOLUME: &str = "argocd-repo-server-tls";
const TLS_MOUNT_PATH: &str = "/app/config/reposerver/tls";
const REDIS_TLS_VOLUME: &str = "argocd-operator-redis-tls";
const REDIS_TLS_MOUNT_PATH: &str = "/app/config/reposerver/tls/redis";

pub struct RepoServerDeployment<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> RepoServerDeployment<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }

    fn repo(&self) -> ArgoCDRepoSpec {
        self.instance.spec().repo.clone().unwrap_or_default()
    }

    /// Repo-specific overrides win over the instance-wide image.
    fn image(&self) -> String {
        let spec = self.instance.spec();
        let repo = self.repo();
        resolve_image(
            repo.image.as_deref().or(spec.image.as_deref()),
            repo.version.as_deref().or(spec.version.as_deref()),
            &self.instance.config.images.argocd,
        )
    }

    fn command(&self) -> Result<Vec<String>> {
        let name = self.name();
        let repo = self.repo();
        let level = repo.log_level.unwrap_or_else(|| "info".to_string());
        validate_choice("Deployment", &name, "logLevel", &level, LOG_LEVELS)?;
        let format = repo.log_format.unwrap_or_else(|| "text".to_string());
        validate_choice("Deployment", &name, "logFormat", &format, LOG_FORMATS)?;

        Ok(vec![
            "uid_entrypoint.sh".to_string(),
            "argocd-repo-server".to_string(),
            "--redis".to_string(),
            self.instance.redis_address(),
            "--loglevel".to_string(),
            level,
            "--logformat".to_string(),
            format,
        ])
    }
}

impl Adapter for RepoServerDeployment<'_> {
    type Object = Deployment;

    fn name(&self) -> String {
        self.instance.core(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_repo_enabled()
    }

    fn build(&self) -> Result<Deployment> {
        let component = self.instance.core(COMPONENT);
        let repo = self.repo();

        let env = env_vars(repo.env.as_ref());
        let container = Container {
            name: "argocd-repo-server".to_string(),
            image: Some(self.image()),
            command: Some(self.command()?),
            env: if env.is_empty() { None } else { Some(env) },
            ports: Some(vec![
                container_port("server", ports::REPO_SERVER),
                container_port("metrics", ports::REPO_SERVER_METRICS),
            ]),
            volume_mounts: Some(vec![
                VolumeMount {
                    name: TLS_VOLUME.to_string(),
                    mount_path: TLS_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
                VolumeMount {
                    name: REDIS_TLS_VOLUME.to_string(),
                    mount_path: REDIS_TLS_MOUNT_PATH.to_string(),
                    read_only: Some(true),
                    ..Default::default()
                },
            ]),
            liveness_probe: Some(tcp_probe(ports::REPO_SERVER, 5)),
            readiness_probe: Some(tcp_probe(ports::REPO_SERVER, 5)),
            ..Default::default()
        };

        Ok(Deployment {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(DeploymentSpec {
                replicas: Some(repo.replicas.unwrap_or(1)),
                selector: component.selector(),
                template: PodTemplateSpec {
                    metadata: Some(ObjectMeta {
                        labels: Some(component.labels.clone()),
                        ..Default::default()
                    }),
                    spec: Some(PodSpec {
                        containers: vec![container],
                        volumes: Some(vec![
                            secret_volume(TLS_VOLUME, secrets::REPO_SERVER_TLS, true),
                            secret_volume(REDIS_TLS_VOLUME, secrets::REDIS_TLS, true),
                        ]),
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

pub struct RepoServerService<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> RepoServerService<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for RepoServerService<'_> {
    type Object = Service;

    fn name(&self) -> String {
        self.instance.core(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_repo_enabled()
    }

    fn build(&self) -> Result<Service> {
        let component = self.instance.core(COMPONENT);
        Ok(Service {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(component.selector_labels()),
                ports: Some(vec![
                    service_port("server", ports::REPO_SERVER, ports::REPO_SERVER),
                    service_port(
                        "metrics",
                        ports::REPO_SERVER_METRICS,
                        ports::REPO_SERVER_METRICS,
                    ),
                ]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Service>) {
        compare_service(drift);
    }
}

#[instrument(skip_all, fields(argocd = %instance.name))]
pub async fn reconcile_repo_server(
    store: &Store<'_>,
    instance: &Instance<'_>,
) -> Result<Vec<Outcome>> {
    Ok(vec![
        converge(store, &RepoServerService::new(instance)).await?,
        converge(store, &RepoServerDeployment::new(instance)).await?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing;
    use crate::config::Config;
    use crate::test_utils::MockService;
    use crate::types::argocd::ArgoCDHASpec;
    use crate::types::ArgoCDSpec;

    fn command(deployment: &Deployment) -> Vec<String> {
        deployment.spec.as_ref().unwrap().template.spec.as_ref().unwrap().containers[0]
            .command
            .clone()
            .unwrap()
    }

    #[test]
    fn test_defaults() {
        let argocd = testing::argocd(ArgoCDSpec::default());
        let config = Config::default();
        let instance = Instance::new(&argocd, &config).unwrap();
        let deployment = RepoServerDeployment::new(&instance).build().unwrap();

        assert_eq!(deployment.metadata.name.as_deref(), Some("demo-repo-server"));
        let command = command(&deployment);
        assert_eq!(command[3], "demo-redis:6379");
        assert_eq!(command[5], "info");
        assert_eq!(command[7], "text");
    }

    #[test]
    fn test_image_falls_back_to_instance_override() {
        let argocd = testing::argocd(ArgoCDSpec {
            version: Some("v2.14.0".to_string()),
            repo: Some(ArgoCDRepoSpec {
                replicas: Some(2),
                ..Default::default()
            }),
            ha: Some(ArgoCDHASpec {
                enabled: true,
                ..Default::default()
            }),
            ..Default::default()
        });
        let config = Config::default();
        let instance = Instance::new(&argocd, &config).unwrap();
        let adapter = RepoServerDeployment::new(&instance);

        assert_eq!(adapter.image(), "quay.io/argoproj/argocd:v2.14.0");
        let deployment = adapter.build().unwrap();
        assert_eq!(command(&deployment)[3], "demo-redis-ha-haproxy:6379");
        assert_eq!(deployment.spec.unwrap().replicas, Some(2));
    }

    #[test]
    fn test_invalid_log_format() {
        let argocd = testing::argocd(ArgoCDSpec {
            repo: Some(ArgoCDRepoSpec {
                log_format: Some("xml".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let config = Config::default();
        let instance = Instance::new(&argocd, &config).unwrap();

        assert!(RepoServerDeployment::new(&instance).build().is_err());
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing() {
        let argocd = testing::argocd(ArgoCDSpec::default());
        let config = Config::default();
        let instance = Instance::new(&argocd, &config).unwrap();
        let mock = MockService::new();
        let store = Store::new(mock.clone().into_client(), &argocd).unwrap();

        let first = reconcile_repo_server(&store, &instance).await.unwrap();
        assert_eq!(first, vec![Outcome::Created, Outcome::Created]);

        mock.clear_requests();
        let second = reconcile_repo_server(&store, &instance).await.unwrap();
        assert_eq!(second, vec![Outcome::NoOp, Outcome::NoOp]);
        assert!(mock.writes().is_empty());
    }
}
