// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

use super::COMPONENT;
use crate::components::{validate_choice, validate_duration, Instance, LOG_FORMATS, LOG_LEVELS};
use crate::constants::ports;
use crate::error::Result;
use crate::sync::{Adapter, Drift};
use crate::types::argocd::PrincipalSpec;
use k8s_openapi::api::core::v1::ConfigMap;
use std::collections::BTreeMap;

pub const COMPRESSION_TYPES: &[&str] = &["gzip", "snappy", "none"];

/// Every params key and the environment variable the principal reads it from.
pub const PARAMS: &[(&str, &str)] = &[
    ("principal.listen.host", "ARGOCD_PRINCIPAL_LISTEN_HOST"),
    ("principal.listen.port", "ARGOCD_PRINCIPAL_LISTEN_PORT"),
    ("principal.log.level", "ARGOCD_PRINCIPAL_LOG_LEVEL"),
    ("principal.log.format", "ARGOCD_PRINCIPAL_LOG_FORMAT"),
    ("principal.metrics.port", "ARGOCD_PRINCIPAL_METRICS_PORT"),
    ("principal.healthz.port", "ARGOCD_PRINCIPAL_HEALTH_CHECK_PORT"),
    ("principal.namespace", "ARGOCD_PRINCIPAL_NAMESPACE"),
    ("principal.allowed-namespaces", "ARGOCD_PRINCIPAL_ALLOWED_NAMESPACES"),
    ("principal.namespace-create.enable", "ARGOCD_PRINCIPAL_NAMESPACE_CREATE_ENABLE"),
    ("principal.namespace-create.pattern", "ARGOCD_PRINCIPAL_NAMESPACE_CREATE_PATTERN"),
    ("principal.namespace-create.labels", "ARGOCD_PRINCIPAL_NAMESPACE_CREATE_LABELS"),
    ("principal.auth", "ARGOCD_PRINCIPAL_AUTH"),
    ("principal.enable-websocket", "ARGOCD_PRINCIPAL_ENABLE_WEBSOCKET"),
    ("principal.keep-alive-min-interval", "ARGOCD_PRINCIPAL_KEEP_ALIVE_MIN_INTERVAL"),
    ("principal.tls.secret-name", "ARGOCD_PRINCIPAL_TLS_SECRET_NAME"),
    ("principal.tls.server.allow-generate", "ARGOCD_PRINCIPAL_TLS_SERVER_ALLOW_GENERATE"),
    ("principal.tls.server.root-ca-secret-name", "ARGOCD_PRINCIPAL_TLS_SERVER_ROOT_CA_SECRET_NAME"),
    ("principal.jwt.allow-generate", "ARGOCD_PRINCIPAL_JWT_ALLOW_GENERATE"),
    ("principal.jwt.secret-name", "ARGOCD_PRINCIPAL_JWT_SECRET_NAME"),
    ("principal.redis-server-address", "ARGOCD_PRINCIPAL_REDIS_SERVER_ADDRESS"),
    ("principal.redis-compression-type", "ARGOCD_PRINCIPAL_REDIS_COMPRESSION_TYPE"),
];

const DEFAULT_AUTH: &str = "mtls:CN=([^,]+)";
const DEFAULT_KEEP_ALIVE: &str = "30s";
const DEFAULT_TLS_SECRET: &str = "argocd-agent-principal-tls";
const DEFAULT_ROOT_CA_SECRET: &str = "argocd-agent-ca";
const DEFAULT_JWT_SECRET: &str = "argocd-agent-jwt";
const DEFAULT_COMPRESSION: &str = "gzip";

/// Name of the params ConfigMap, shared with the Deployment's key references.
pub fn params_name(instance: &Instance) -> String {
    format!("{}-params", instance.agent(COMPONENT).name)
}

/// `<owner>-agent-principal-params`: principal runtime settings, one key each.
pub struct ParamsConfigMap<'a> {
    instance: &'a Instance<'a>,
}

impl<'a> ParamsConfigMap<'a> {
    pub fn new(instance: &'a Instance<'a>) -> Self {
        Self { instance }
    }

    fn data(&self) -> Result<BTreeMap<String, String>> {
        let default = PrincipalSpec::default();
        let principal = self.instance.spec().principal().unwrap_or(&default);
        let server = principal.server.clone().unwrap_or_default();
        let namespace = principal.namespace.clone().unwrap_or_default();
        let tls = principal.tls.clone().unwrap_or_default();
        let jwt = principal.jwt.clone().unwrap_or_default();
        let redis = principal.redis.clone().unwrap_or_default();

        let kind = "ConfigMap";
        let name = params_name(self.instance);

        let log_level = server.log_level.unwrap_or_else(|| "info".to_string());
        validate_choice(kind, &name, "logLevel", &log_level, LOG_LEVELS)?;
        let log_format = server.log_format.unwrap_or_else(|| "text".to_string());
        validate_choice(kind, &name, "logFormat", &log_format, LOG_FORMATS)?;
        let keep_alive = server
            .keep_alive_min_interval
            .unwrap_or_else(|| DEFAULT_KEEP_ALIVE.to_string());
        validate_duration(kind, &name, "keepAliveMinInterval", &keep_alive)?;
        let compression = redis
            .compression_type
            .unwrap_or_else(|| DEFAULT_COMPRESSION.to_string());
        validate_choice(kind, &name, "compressionType", &compression, COMPRESSION_TYPES)?;

        let values = [
            ("principal.listen.host", String::new()),
            ("principal.listen.port", ports::PRINCIPAL_LISTEN.to_string()),
            ("principal.log.level", log_level),
            ("principal.log.format", log_format),
            ("principal.metrics.port", ports::PRINCIPAL_METRICS.to_string()),
            ("principal.healthz.port", ports::PRINCIPAL_HEALTHZ.to_string()),
            ("principal.namespace", self.instance.namespace.clone()),
            (
                "principal.allowed-namespaces",
                namespace.allowed_namespaces.unwrap_or_default().join(","),
            ),
            (
                "principal.namespace-create.enable",
                namespace.enable_namespace_create.unwrap_or(false).to_string(),
            ),
            (
                "principal.namespace-create.pattern",
                namespace.namespace_create_pattern.unwrap_or_default(),
            ),
            (
                "principal.namespace-create.labels",
                namespace.namespace_create_labels.unwrap_or_default().join(","),
            ),
            (
                "principal.auth",
                server.auth.unwrap_or_else(|| DEFAULT_AUTH.to_string()),
            ),
            (
                "principal.enable-websocket",
                server.enable_web_socket.unwrap_or(false).to_string(),
            ),
            ("principal.keep-alive-min-interval", keep_alive),
            (
                "principal.tls.secret-name",
                tls.secret_name.unwrap_or_else(|| DEFAULT_TLS_SECRET.to_string()),
            ),
            (
                "principal.tls.server.allow-generate",
                tls.insecure_generate.unwrap_or(false).to_string(),
            ),
            (
                "principal.tls.server.root-ca-secret-name",
                tls.root_ca_secret_name
                    .unwrap_or_else(|| DEFAULT_ROOT_CA_SECRET.to_string()),
            ),
            (
                "principal.jwt.allow-generate",
                jwt.insecure_generate.unwrap_or(false).to_string(),
            ),
            (
                "principal.jwt.secret-name",
                jwt.secret_name.unwrap_or_else(|| DEFAULT_JWT_SECRET.to_string()),
            ),
            (
                "principal.redis-server-address",
                redis
                    .server_address
                    .unwrap_or_else(|| self.instance.redis_address()),
            ),
            ("principal.redis-compression-type", compression),
        ];

        Ok(values
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect())
    }
}

impl Adapter for ParamsConfigMap<'_> {
    type Object = ConfigMap;

    fn name(&self) -> String {
        params_name(self.instance)
    }

    fn enabled(&self) -> bool {
        self.instance.spec().is_principal_enabled()
    }

    fn build(&self) -> Result<ConfigMap> {
        let component = self.instance.agent(COMPONENT).renamed(self.name());
        Ok(ConfigMap {
            metadata: component.metadata(&self.instance.namespace),
            data: Some(self.data()?),
            ..Default::default()
        })
    }

    fn compare(&self, drift: &mut Drift<ConfigMap>) {
        drift
            .field("labels", crate::components::workload::labels)
            .field("data", |cm| &mut cm.data);
    }
}
