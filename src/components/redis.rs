// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Redis cache, either a single Deployment or an HA StatefulSet fronted by
//! haproxy, depending on `spec.ha.enabled`.

use crate::components::principal;
use crate::components::workload::{
    compare_deployment, compare_service, compare_statefulset, config_map_volume, labels,
    secret_volume, tcp_probe,
};
use crate::components::{container_port, resolve_image, service_port, Component, Instance};
use crate::constants::{ports, secrets};
use crate::error::Result;
use crate::sync::{converge, Adapter, Drift, Outcome, Store};
use k8s_openapi::api::apps::v1::{Deployment, DeploymentSpec, StatefulSet, StatefulSetSpec};
use k8s_openapi::api::core::v1::{
    ConfigMap, Container, PodSpec, PodTemplateSpec, Service, ServiceSpec, Volume, VolumeMount,
};
use k8s_openapi::api::networking::v1::{
    NetworkPolicy, NetworkPolicyIngressRule, NetworkPolicyPeer, NetworkPolicyPort,
    NetworkPolicySpec,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, LabelSelectorRequirement};
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
use kube::api::ObjectMeta;
use std::collections::BTreeMap;
use tracing::instrument;

pub const COMPONENT: &str = "redis";
pub const HA_COMPONENT: &str = "redis-ha";
pub const HA_SERVER_COMPONENT: &str = "redis-ha-server";
pub const HA_PROXY_COMPONENT: &str = "redis-ha-haproxy";

pub const HA_REPLICAS: i32 = 3;
const TLS_VOLUME: &str = "redis-tls";
const TLS_MOUNT_PATH: &str = "/app/config/redis/tls";
const HAPROXY_VOLUME: &str = "haproxy-config";
const HAPROXY_MOUNT_PATH: &str = "/usr/local/etc/haproxy";

/// Workloads that talk to redis, by the name label of their pods.
const CLIENTS: &[&str] = &["server", "repo-server", "application-controller"];

fn wanted(instance: &Instance, ha: bool) -> bool {
    instance.spec().is_redis_enabled() && instance.spec().is_ha_enabled() == ha
}

fn redis_image(instance: &Instance) -> String {
    let redis = instance.spec().redis.as_ref();
    resolve_image(
        redis.and_then(|r| r.image.as_deref()),
        redis.and_then(|r| r.version.as_deref()),
        &instance.config.images.redis,
    )
}

fn haproxy_image(instance: &Instance) -> String {
    let ha = instance.spec().ha.as_ref();
    resolve_image(
        ha.and_then(|h| h.redis_proxy_image.as_deref()),
        ha.and_then(|h| h.redis_proxy_version.as_deref()),
        &instance.config.images.redis_ha_proxy,
    )
}

fn redis_container(instance: &Instance, args: Vec<String>) -> Container {
    Container {
        name: "redis".to_string(),
        image: Some(redis_image(instance)),
        args: Some(args),
        ports: Some(vec![container_port("redis", ports::REDIS)]),
        volume_mounts: Some(vec![VolumeMount {
            name: TLS_VOLUME.to_string(),
            mount_path: TLS_MOUNT_PATH.to_string(),
            read_only: Some(true),
            ..Default::default()
        }]),
        liveness_probe: Some(tcp_probe(ports::REDIS, 15)),
        readiness_probe: Some(tcp_probe(ports::REDIS, 5)),
        ..Default::default()
    }
}

fn pod_template(
    component: &Component,
    containers: Vec<Container>,
    volumes: Vec<Volume>,
) -> PodTemplateSpec {
    PodTemplateSpec {
        metadata: Some(ObjectMeta {
            labels: Some(component.labels.clone()),
            ..Default::default()
        }),
        spec: Some(PodSpec {
            containers,
            volumes: Some(volumes),
            ..Default::default()
        }),
    }
}

/// `<owner>-redis`, single replica without persistence.
pub struct RedisDeployment<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> RedisDeployment<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for RedisDeployment<'_> {
    type Object = Deployment;

    fn name(&self) -> String {
        self.instance.core(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, false)
    }

    fn build(&self) -> Result<Deployment> {
        let component = self.instance.core(COMPONENT);
        let args = ["--save", "", "--appendonly", "no"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        Ok(Deployment {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(DeploymentSpec {
                replicas: Some(1),
                selector: component.selector(),
                template: pod_template(
                    &component,
                    vec![redis_container(self.instance, args)],
                    vec![secret_volume(TLS_VOLUME, secrets::REDIS_TLS, true)],
                ),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Deployment>) {
        compare_deployment(drift);
    }
}

pub struct RedisService<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> RedisService<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for RedisService<'_> {
    type Object = Service;

    fn name(&self) -> String {
        self.instance.core(COMPONENT).name
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, false)
    }

    fn build(&self) -> Result<Service> {
        let component = self.instance.core(COMPONENT);
        Ok(Service {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(component.selector_labels()),
                ports: Some(vec![service_port("tcp-redis", ports::REDIS, ports::REDIS)]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Service>) {
        compare_service(drift);
    }
}

/// `<owner>-redis-ha-server`, one redis per ordinal behind the headless
/// `<owner>-redis-ha` Service. Replicas follow the first ordinal.
pub struct RedisHAStatefulSet<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> RedisHAStatefulSet<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for RedisHAStatefulSet<'_> {
    type Object = StatefulSet;

    fn name(&self) -> String {
        self.instance.core(HA_SERVER_COMPONENT).name
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, true)
    }

    fn build(&self) -> Result<StatefulSet> {
        let component = self.instance.core(HA_SERVER_COMPONENT);
        let headless = self.instance.core(HA_COMPONENT).name;
        let primary = format!("{}-0.{}", component.name, headless);
        let script = format!(
            "if [ \"${{HOSTNAME##*-}}\" = \"0\" ]; then exec redis-server --save '' --appendonly no; \
             else exec redis-server --save '' --appendonly no --replicaof {} {}; fi",
            primary,
            ports::REDIS
        );

        let mut container = redis_container(self.instance, vec!["-c".to_string(), script]);
        container.command = Some(vec!["sh".to_string()]);

        Ok(StatefulSet {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(StatefulSetSpec {
                replicas: Some(HA_REPLICAS),
                service_name: headless,
                selector: component.selector(),
                template: pod_template(
                    &component,
                    vec![container],
                    vec![secret_volume(TLS_VOLUME, secrets::REDIS_TLS, true)],
                ),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<StatefulSet>) {
        compare_statefulset(drift);
    }
}

pub struct RedisHAHeadlessService<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> RedisHAHeadlessService<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for RedisHAHeadlessService<'_> {
    type Object = Service;

    fn name(&self) -> String {
        self.instance.core(HA_COMPONENT).name
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, true)
    }

    fn build(&self) -> Result<Service> {
        let component = self.instance.core(HA_COMPONENT);
        let pods = self.instance.core(HA_SERVER_COMPONENT);
        Ok(Service {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                cluster_ip: Some("None".to_string()),
                publish_not_ready_addresses: Some(true),
                selector: Some(pods.selector_labels()),
                ports: Some(vec![service_port("tcp-redis", ports::REDIS, ports::REDIS)]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Service>) {
        compare_service(drift);
    }
}

fn haproxy_config_name(instance: &Instance) -> String {
    format!("{}-config", instance.core(HA_PROXY_COMPONENT).name)
}

/// haproxy routes every connection to whichever ordinal reports `role:master`.
pub struct HAProxyConfigMap<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> HAProxyConfigMap<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }

    fn haproxy_cfg(&self) -> String {
        let server = self.instance.core(HA_SERVER_COMPONENT).name;
        let headless = self.instance.core(HA_COMPONENT).name;
        let mut cfg = format!(
            "defaults\n  mode tcp\n  timeout connect 4s\n  timeout server 330s\n  timeout client 330s\n  timeout check 2s\n\n\
             frontend redis\n  bind :::{port} v4v6\n  default_backend redis-master\n\n\
             backend redis-master\n  option tcp-check\n  tcp-check connect\n  tcp-check send PING\\r\\n\n  \
             tcp-check expect string +PONG\n  tcp-check send info\\ replication\\r\\n\n  \
             tcp-check expect string role:master\n  tcp-check send QUIT\\r\\n\n  tcp-check expect string +OK\n",
            port = ports::REDIS
        );
        for ordinal in 0..HA_REPLICAS {
            cfg.push_str(&format!(
                "  server R{ordinal} {server}-{ordinal}.{headless}:{port} check inter 1s\n",
                port = ports::REDIS
            ));
        }
        cfg
    }
}

impl Adapter for HAProxyConfigMap<'_> {
    type Object = ConfigMap;

    fn name(&self) -> String {
        haproxy_config_name(self.instance)
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, true)
    }

    fn build(&self) -> Result<ConfigMap> {
        let component = self.instance.core(HA_PROXY_COMPONENT).renamed(self.name());
        Ok(ConfigMap {
            metadata: component.metadata(&self.instance.namespace),
            data: Some(BTreeMap::from([(
                "haproxy.cfg".to_string(),
                self.haproxy_cfg(),
            )])),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<ConfigMap>) {
        drift
            .field("labels", labels)
            .field("data", |cm| &mut cm.data);
    }
}

pub struct HAProxyDeployment<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> HAProxyDeployment<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for HAProxyDeployment<'_> {
    type Object = Deployment;

    fn name(&self) -> String {
        self.instance.core(HA_PROXY_COMPONENT).name
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, true)
    }

    fn build(&self) -> Result<Deployment> {
        let component = self.instance.core(HA_PROXY_COMPONENT);
        let container = Container {
            name: "haproxy".to_string(),
            image: Some(haproxy_image(self.instance)),
            ports: Some(vec![container_port("redis", ports::REDIS)]),
            volume_mounts: Some(vec![VolumeMount {
                name: HAPROXY_VOLUME.to_string(),
                mount_path: HAPROXY_MOUNT_PATH.to_string(),
                read_only: Some(true),
                ..Default::default()
            }]),
            liveness_probe: Some(tcp_probe(ports::REDIS, 5)),
            readiness_probe: Some(tcp_probe(ports::REDIS, 5)),
            ..Default::default()
        };

        Ok(Deployment {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(DeploymentSpec {
                replicas: Some(HA_REPLICAS),
                selector: component.selector(),
                template: pod_template(
                    &component,
                    vec![container],
                    vec![config_map_volume(
                        HAPROXY_VOLUME,
                        &haproxy_config_name(self.instance),
                    )],
                ),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Deployment>) {
        compare_deployment(drift);
    }
}

pub struct HAProxyService<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> HAProxyService<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }
}

impl Adapter for HAProxyService<'_> {
    type Object = Service;

    fn name(&self) -> String {
        self.instance.core(HA_PROXY_COMPONENT).name
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, true)
    }

    fn build(&self) -> Result<Service> {
        let component = self.instance.core(HA_PROXY_COMPONENT);
        Ok(Service {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(ServiceSpec {
                type_: Some("ClusterIP".to_string()),
                selector: Some(component.selector_labels()),
                ports: Some(vec![service_port("tcp-redis", ports::REDIS, ports::REDIS)]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Service>) {
        compare_service(drift);
    }
}

/// Admit only ArgoCD workloads (and the principal when it runs) to redis.
pub struct RedisNetworkPolicy<'a> {
    instance: &'a Instance<'a>,
    ha: bool,
}

impl<'a> RedisNetworkPolicy<'a> {
    pub fn new(instance: &'a Instance<'a>, ha: bool) -> Self {
        Self { instance, ha }
    }

    fn name_in(values: Vec<String>) -> LabelSelector {
        LabelSelector {
            match_expressions: Some(vec![LabelSelectorRequirement {
                key: crate::constants::labels::NAME.to_string(),
                operator: "In".to_string(),
                values: Some(values),
            }]),
            ..Default::default()
        }
    }

    fn targets(&self) -> Vec<String> {
        if self.ha {
            vec![
                self.instance.core(HA_PROXY_COMPONENT).name,
                self.instance.core(HA_SERVER_COMPONENT).name,
            ]
        } else {
            vec![self.instance.core(COMPONENT).name]
        }
    }

    fn clients(&self) -> Vec<String> {
        let mut clients: Vec<String> = CLIENTS
            .iter()
            .map(|c| self.instance.core(c).name)
            .collect();
        if self.instance.spec().is_principal_enabled() {
            clients.push(self.instance.agent(principal::COMPONENT).name);
        }
        if self.ha {
            // haproxy health checks and replication between ordinals
            clients.extend(self.targets());
        }
        clients
    }
}

impl Adapter for RedisNetworkPolicy<'_> {
    type Object = NetworkPolicy;

    fn name(&self) -> String {
        let component = if self.ha { HA_COMPONENT } else { COMPONENT };
        format!("{}-network-policy", self.instance.core(component).name)
    }

    fn enabled(&self) -> bool {
        wanted(self.instance, self.ha)
    }

    fn build(&self) -> Result<NetworkPolicy> {
        let component = self
            .instance
            .core(if self.ha { HA_COMPONENT } else { COMPONENT })
            .renamed(self.name());

        Ok(NetworkPolicy {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(NetworkPolicySpec {
                pod_selector: Self::name_in(self.targets()),
                policy_types: Some(vec!["Ingress".to_string()]),
                ingress: Some(vec![NetworkPolicyIngressRule {
                    from: Some(vec![NetworkPolicyPeer {
                        pod_selector: Some(Self::name_in(self.clients())),
                        ..Default::default()
                    }]),
                    ports: Some(vec![NetworkPolicyPort {
                        port: Some(IntOrString::Int(ports::REDIS)),
                        protocol: Some("TCP".to_string()),
                        ..Default::default()
                    }]),
                }]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<NetworkPolicy>) {
        drift
            .field("labels", labels)
            .field("spec", |np| &mut np.spec);
    }
}

/// Converge both topologies; the inactive one is torn down.
#[instrument(skip_all, fields(argocd = %instance.name))]
pub async fn reconcile_redis(store: &Store<'_>, instance: &Instance<'_>) -> Result<Vec<Outcome>> {
    Ok(vec![
        converge(store, &RedisDeployment::new(instance)).await?,
        converge(store, &RedisService::new(instance)).await?,
        converge(store, &RedisNetworkPolicy::new(instance, false)).await?,
        converge(store, &RedisHAHeadlessService::new(instance)).await?,
        converge(store, &RedisHAStatefulSet::new(instance)).await?,
        converge(store, &HAProxyConfigMap::new(instance)).await?,
        converge(store, &HAProxyDeployment::new(instance)).await?,
        converge(store, &HAProxyService::new(instance)).await?,
        converge(store, &RedisNetworkPolicy::new(instance, true)).await?,
    ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::testing;
    use crate::config::Config;
    use crate::test_utils::{core_path, group_path, MockService};
    use crate::types::argocd::{ArgoCDHASpec, ArgoCDRedisSpec};
    use crate::types::ArgoCDSpec;

    fn ha(enabled: bool) -> ArgoCDSpec {
        ArgoCDSpec {
            ha: Some(ArgoCDHASpec {
                enabled,
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_image_override() {
        let argocd = testing::argocd(ArgoCDSpec {
            redis: Some(ArgoCDRedisSpec {
                version: Some("7.2.4".to_string()),
                ..Default::default()
            }),
            ..Default::default()
        });
        let config = Config::default();
        let instance = Instance::new(&argocd, &config).unwrap();
        assert_eq!(
            redis_image(&instance),
            "public.ecr.aws/docker/library/redis:7.2.4"
        );
    }

    #[test]
    fn test_haproxy_config_lists_every_ordinal() {
        let argocd = testing::argocd(ha(true));
        let config = Config::default();
        let instance = Instance::new(&argocd, &config).unwrap();
        let cm = HAProxyConfigMap::new(&instance).build().unwrap();
        let cfg = &cm.data.unwrap()["haproxy.cfg"];

        for ordinal in 0..HA_REPLICAS {
            assert!(cfg.contains(&format!(
                "demo-redis-ha-server-{}.demo-redis-ha:6379",
                ordinal
            )));
        }
    }

    #[test]
    fn test_network_policy_admits_principal_only_when_enabled() {
        let config = Config::default();
        let argocd = testing::argocd(ArgoCDSpec::default());
        let instance = Instance::new(&argocd, &config).unwrap();
        let clients = RedisNetworkPolicy::new(&instance, false).clients();
        assert_eq!(
            clients,
            vec!["demo-server", "demo-repo-server", "demo-application-controller"]
        );

        let mut spec = ArgoCDSpec::default();
        spec.argo_cd_agent = Some(crate::types::argocd::ArgoCDAgentSpec {
            principal: Some(crate::types::argocd::PrincipalSpec {
                enabled: Some(true),
                ..Default::default()
            }),
        });
        let argocd = testing::argocd(spec);
        let instance = Instance::new(&argocd, &config).unwrap();
        assert!(RedisNetworkPolicy::new(&instance, false)
            .clients()
            .contains(&"demo-agent-principal".to_string()));
    }

    #[tokio::test]
    async fn test_switching_to_ha_replaces_topology() {
        let config = Config::default();
        let mock = MockService::new();
        let plain = core_path("ns1", "services", Some("demo-redis"));
        let proxy = core_path("ns1", "services", Some("demo-redis-ha-haproxy"));
        let statefulset = group_path("apps/v1", "ns1", "statefulsets", "demo-redis-ha-server");

        let argocd = testing::argocd(ha(false));
        let instance = Instance::new(&argocd, &config).unwrap();
        let store = Store::new(mock.clone().into_client(), &argocd).unwrap();
        reconcile_redis(&store, &instance).await.unwrap();
        assert!(mock.object(&plain).is_some());
        assert!(mock.object(&statefulset).is_none());

        let argocd = testing::argocd(ha(true));
        let instance = Instance::new(&argocd, &config).unwrap();
        let store = Store::new(mock.clone().into_client(), &argocd).unwrap();
        reconcile_redis(&store, &instance).await.unwrap();
        assert!(mock.object(&plain).is_none());
        assert!(mock.object(&proxy).is_some());
        let created: StatefulSet = mock.get(&statefulset).unwrap();
        assert_eq!(created.spec.unwrap().replicas, Some(HA_REPLICAS));
    }

    #[tokio::test]
    async fn test_second_pass_writes_nothing_in_either_topology() {
        let config = Config::default();
        for enabled in [false, true] {
            let argocd = testing::argocd(ha(enabled));
            let instance = Instance::new(&argocd, &config).unwrap();
            let mock = MockService::new();
            let store = Store::new(mock.clone().into_client(), &argocd).unwrap();

            let first = reconcile_redis(&store, &instance).await.unwrap();
            assert!(first.iter().any(|o| *o == Outcome::Created), "ha={}", enabled);

            mock.clear_requests();
            let second = reconcile_redis(&store, &instance).await.unwrap();
            assert!(second.iter().all(|o| *o == Outcome::NoOp), "ha={}", enabled);
            assert!(mock.writes().is_empty(), "ha={}", enabled);
        }
    }

    #[tokio::test]
    async fn test_disabled_redis_creates_nothing() {
        let argocd = testing::argocd(ArgoCDSpec {
            redis: Some(ArgoCDRedisSpec {
                enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        });
        let config = Config::default();
        let instance = Instance::new(&argocd, &config).unwrap();
        let mock = MockService::new();
        let store = Store::new(mock.clone().into_client(), &argocd).unwrap();

        let outcomes = reconcile_redis(&store, &instance).await.unwrap();
        assert!(outcomes.iter().all(|o| *o == Outcome::NoOp));
        assert!(mock.writes().is_empty());
    }
}
