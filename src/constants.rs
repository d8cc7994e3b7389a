// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

/// Finalizer guarding cleanup of cluster-scoped objects
pub const FINALIZER: &str = "argoproj.io/finalizer";

/// Recommended Kubernetes label keys stamped on every managed object
pub mod labels {
    pub const NAME: &str = "app.kubernetes.io/name";
    pub const COMPONENT: &str = "app.kubernetes.io/component";
    pub const PART_OF: &str = "app.kubernetes.io/part-of";
    pub const MANAGED_BY: &str = "app.kubernetes.io/managed-by";

    pub const PART_OF_ARGOCD: &str = "argocd";
    pub const PART_OF_AGENT: &str = "argocd-agent";
}

/// Pod template annotation keys used as rollout markers
pub mod rollout {
    pub const PREFIX: &str = "argocd.argoproj.io";
    pub const REPO_TLS: &str = "repo-server-tls-changed";
    pub const REDIS_TLS: &str = "redis-tls-changed";
    pub const REDIS_HA: &str = "redis-ha-changed";
}

/// Secrets whose content changes trigger rollouts
pub mod secrets {
    pub const REPO_SERVER_TLS: &str = "argocd-repo-server-tls";
    pub const REDIS_TLS: &str = "argocd-operator-redis-tls";
    pub const TLS_CERT_KEY: &str = "tls.crt";
    pub const TLS_PRIVATE_KEY: &str = "tls.key";
}

/// Default container images, overridable through the operator config
pub mod images {
    pub const ARGOCD: &str = "quay.io/argoproj/argocd:v2.13.1";
    pub const AGENT: &str = "quay.io/argoprojlabs/argocd-agent:v0.2.0";
    pub const REDIS: &str = "public.ecr.aws/docker/library/redis:7.0.15-alpine";
    pub const REDIS_HA_PROXY: &str = "public.ecr.aws/docker/library/haproxy:2.6.17-alpine";
}

/// Well-known ports
pub mod ports {
    pub const PRINCIPAL_LISTEN: i32 = 8443;
    pub const PRINCIPAL_SERVICE: i32 = 443;
    pub const PRINCIPAL_METRICS: i32 = 8000;
    pub const PRINCIPAL_HEALTHZ: i32 = 8003;
    pub const REDIS: i32 = 6379;
    pub const REPO_SERVER: i32 = 8081;
    pub const REPO_SERVER_METRICS: i32 = 8084;
}

/// CRD polling configuration
pub mod crd {
    pub const GROUP: &str = "argoproj.io";
    pub const VERSION: &str = "v1beta1";
    pub const KIND: &str = "ArgoCD";
    /// Initial polling interval in seconds when waiting for CRD
    pub const POLL_INTERVAL_SECS: u64 = 10;
    /// Maximum polling interval in seconds (exponential backoff cap)
    pub const POLL_MAX_INTERVAL_SECS: u64 = 60;
}

/// Requeue delays used by the ArgoCD reconciler
pub mod requeue {
    pub const ERROR_SECS: u64 = 30;
    /// Short delay after an object was deleted to be recreated
    pub const REPLACED_SECS: u64 = 5;
}
