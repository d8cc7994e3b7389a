// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use kube::CustomResource;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Serialize, Deserialize, Clone, Debug, Default, schemars::JsonSchema)]
#[kube(group = "argoproj.io", version = "v1beta1", kind = "ArgoCD")]
#[kube(namespaced, shortname = "argocd", plural = "argocds")]
#[kube(status = "ArgoCDStatus")]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDSpec {
    /// Container image for ArgoCD core components
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Tag or digest for ArgoCD core components
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<ArgoCDRedisSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ha: Option<ArgoCDHASpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<ArgoCDRepoSpec>,
    #[serde(rename = "argoCDAgent", skip_serializing_if = "Option::is_none")]
    pub argo_cd_agent: Option<ArgoCDAgentSpec>,
}

impl ArgoCDSpec {
    pub fn principal(&self) -> Option<&PrincipalSpec> {
        self.argo_cd_agent.as_ref()?.principal.as_ref()
    }

    /// The agent principal is opt-in: any missing level means disabled.
    pub fn is_principal_enabled(&self) -> bool {
        self.principal()
            .and_then(|p| p.enabled)
            .unwrap_or(false)
    }

    /// Redis is a core component and runs unless explicitly disabled.
    pub fn is_redis_enabled(&self) -> bool {
        self.redis
            .as_ref()
            .and_then(|r| r.enabled)
            .unwrap_or(true)
    }

    pub fn is_ha_enabled(&self) -> bool {
        self.ha.as_ref().is_some_and(|ha| ha.enabled)
    }

    /// The repo-server is a core component and runs unless explicitly disabled.
    pub fn is_repo_enabled(&self) -> bool {
        self.repo
            .as_ref()
            .and_then(|r| r.enabled)
            .unwrap_or(true)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRedisSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDHASpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_proxy_image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis_proxy_version: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDRepoSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub replicas: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVarSpec>>,
}

/// A plain name/value environment variable
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
pub struct EnvVarSpec {
    pub name: String,
    #[serde(default)]
    pub value: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDAgentSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub principal: Option<PrincipalSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<PrincipalServerSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<PrincipalNamespaceSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls: Option<PrincipalTLSSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt: Option<PrincipalJWTSpec>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<PrincipalRedisSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalServerSpec {
    /// Authentication method, e.g. `mtls:CN=([^,]+)`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_web_socket: Option<bool>,
    /// Go-style duration, e.g. `30s` or `1m30s`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keep_alive_min_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub env: Option<Vec<EnvVarSpec>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service: Option<PrincipalServiceSpec>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalServiceSpec {
    /// Service type of the principal gRPC endpoint, defaults to LoadBalancer
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalNamespaceSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_namespaces: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_namespace_create: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_create_pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace_create_labels: Option<Vec<String>>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalTLSSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(rename = "rootCASecretName", skip_serializing_if = "Option::is_none")]
    pub root_ca_secret_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_generate: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalJWTSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_generate: Option<bool>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PrincipalRedisSpec {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compression_type: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, schemars::JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ArgoCDStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redis: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_principal: Option<String>,
    /// SHA-256 of the repo-server TLS secret last rolled out
    #[serde(rename = "repoTLSChecksum", skip_serializing_if = "Option::is_none")]
    pub repo_tls_checksum: Option<String>,
    /// SHA-256 of the redis TLS secret last rolled out
    #[serde(rename = "redisTLSChecksum", skip_serializing_if = "Option::is_none")]
    pub redis_tls_checksum: Option<String>,
    /// HA toggle observed during the last rollout
    #[serde(rename = "redisHA", skip_serializing_if = "Option::is_none")]
    pub redis_ha: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::CustomResourceExt;

    fn principal(enabled: Option<bool>) -> ArgoCDSpec {
        ArgoCDSpec {
            argo_cd_agent: Some(ArgoCDAgentSpec {
                principal: Some(PrincipalSpec {
                    enabled,
                    ..Default::default()
                }),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_principal_disabled_when_agent_section_missing() {
        assert!(!ArgoCDSpec::default().is_principal_enabled());
    }

    #[test]
    fn test_principal_disabled_when_principal_section_missing() {
        let spec = ArgoCDSpec {
            argo_cd_agent: Some(ArgoCDAgentSpec::default()),
            ..Default::default()
        };
        assert!(!spec.is_principal_enabled());
    }

    #[test]
    fn test_principal_disabled_when_flag_missing() {
        assert!(!principal(None).is_principal_enabled());
        assert!(!principal(Some(false)).is_principal_enabled());
    }

    #[test]
    fn test_principal_enabled() {
        assert!(principal(Some(true)).is_principal_enabled());
    }

    #[test]
    fn test_core_components_default_to_enabled() {
        let spec = ArgoCDSpec::default();
        assert!(spec.is_redis_enabled());
        assert!(spec.is_repo_enabled());
        assert!(!spec.is_ha_enabled());
    }

    #[test]
    fn test_redis_can_be_disabled() {
        let spec = ArgoCDSpec {
            redis: Some(ArgoCDRedisSpec {
                enabled: Some(false),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(!spec.is_redis_enabled());
    }

    #[test]
    fn test_spec_uses_wire_names() {
        let spec: ArgoCDSpec = serde_json::from_value(serde_json::json!({
            "argoCDAgent": {
                "principal": {
                    "enabled": true,
                    "server": { "logLevel": "debug" },
                    "tls": { "rootCASecretName": "my-ca" }
                }
            },
            "ha": { "enabled": true }
        }))
        .unwrap();

        let principal = spec.principal().unwrap();
        assert!(spec.is_principal_enabled());
        assert!(spec.is_ha_enabled());
        assert_eq!(
            principal.server.as_ref().unwrap().log_level.as_deref(),
            Some("debug")
        );
        assert_eq!(
            principal.tls.as_ref().unwrap().root_ca_secret_name.as_deref(),
            Some("my-ca")
        );
    }

    #[test]
    fn test_crd_metadata() {
        let crd = ArgoCD::crd();
        assert_eq!(crd.spec.group, "argoproj.io");
        assert_eq!(crd.spec.names.kind, "ArgoCD");
        assert_eq!(crd.spec.names.plural, "argocds");
    }
}
