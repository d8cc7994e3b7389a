// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::COMPONENT;
use crate::components::workload::compare_service;
use crate::components::{service_port, Instance};
use crate::constants::ports;
use crate::error::Result;
use crate::sync::{Adapter, Drift};
use k8s_openapi::api::core::v1::{Service, ServiceSpec};

/// The endpoints the principal exposes, one Service each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    /// Agent-facing gRPC, `<owner>-agent-principal`
    Grpc,
    Metrics,
    RedisProxy,
    Healthz,
}

impl Endpoint {
    pub const ALL: [Endpoint; 4] = [
        Endpoint::Grpc,
        Endpoint::Metrics,
        Endpoint::RedisProxy,
        Endpoint::Healthz,
    ];

    fn suffix(&self) -> Option<&'static str> {
        match self {
            Endpoint::Grpc => None,
            Endpoint::Metrics => Some("metrics"),
            Endpoint::RedisProxy => Some("redisproxy"),
            Endpoint::Healthz => Some("healthz"),
        }
    }
}

pub struct PrincipalService<'a> {
    instance: &'a Instance<'a>,
    endpoint: Endpoint,
}

impl<'a> PrincipalService<'a> {
    pub fn new(instance: &'a Instance<'a>, endpoint: Endpoint) -> Self {
        Self { instance, endpoint }
    }

    fn service_type(&self) -> String {
        match self.endpoint {
            Endpoint::Grpc => self
                .instance
                .spec()
                .principal()
                .and_then(|p| p.server.as_ref())
                .and_then(|s| s.service.as_ref())
                .and_then(|s| s.type_.clone())
                .unwrap_or_else(|| "LoadBalancer".to_string()),
            _ => "ClusterIP".to_string(),
        }
    }
}

impl Adapter for PrincipalService<'_> {
    type Object = Service;

    fn name(&self) -> String {
        let base = self.instance.agent(COMPONENT).name;
        match self.endpoint.suffix() {
            Some(suffix) => format!("{}-{}", base, suffix),
            None => base,
        }
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<Service> {
        let pods = self.instance.agent(COMPONENT);
        let component = pods.renamed(self.name());

        let port = match self.endpoint {
            Endpoint::Grpc => service_port(
                "https",
                ports::PRINCIPAL_SERVICE,
                ports::PRINCIPAL_LISTEN,
            ),
            Endpoint::Metrics => service_port(
                "metrics",
                ports::PRINCIPAL_METRICS,
                ports::PRINCIPAL_METRICS,
            ),
            Endpoint::RedisProxy => service_port("redis", ports::REDIS, ports::REDIS),
            Endpoint::Healthz => service_port(
                "healthz",
                ports::PRINCIPAL_HEALTHZ,
                ports::PRINCIPAL_HEALTHZ,
            ),
        };

        Ok(Service {
            metadata: component.metadata(&self.instance.namespace),
            spec: Some(ServiceSpec {
                type_: Some(self.service_type()),
                selector: Some(pods.selector_labels()),
                ports: Some(vec![port]),
                ..Default::default()
            }),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<Service>) {
        compare_service(drift);
    }
}
