// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use crate::constants::images;
use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

/// Operator configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Only watch ArgoCD objects in this namespace; all namespaces when unset
    pub watch_namespace: Option<String>,
    /// Periodic resync interval after a successful reconciliation
    pub requeue_interval: Duration,
    /// Deadline for a single reconciliation pass
    pub reconcile_timeout: Duration,
    pub images: Images,
}

/// Default images used when an ArgoCD object does not override them
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Images {
    pub argocd: String,
    pub agent: String,
    pub redis: String,
    pub redis_ha_proxy: String,
}

impl Default for Images {
    fn default() -> Self {
        Self {
            argocd: images::ARGOCD.to_string(),
            agent: images::AGENT.to_string(),
            redis: images::REDIS.to_string(),
            redis_ha_proxy: images::REDIS_HA_PROXY.to_string(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watch_namespace: None,
            requeue_interval: Duration::from_secs(300),
            reconcile_timeout: Duration::from_secs(60),
            images: Images::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable lookup
    pub fn from_vars<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let watch_namespace = lookup("WATCH_NAMESPACE").filter(|ns| !ns.is_empty());

        let requeue_interval = match lookup("REQUEUE_INTERVAL_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("REQUEUE_INTERVAL_SECS is not a number: {}", v))?,
            ),
            None => defaults.requeue_interval,
        };

        let reconcile_timeout = match lookup("RECONCILE_TIMEOUT_SECS") {
            Some(v) => Duration::from_secs(
                v.parse()
                    .with_context(|| format!("RECONCILE_TIMEOUT_SECS is not a number: {}", v))?,
            ),
            None => defaults.reconcile_timeout,
        };

        let images = Images {
            argocd: lookup("ARGOCD_IMAGE").unwrap_or(defaults.images.argocd),
            agent: lookup("ARGOCD_AGENT_IMAGE").unwrap_or(defaults.images.agent),
            redis: lookup("ARGOCD_REDIS_IMAGE").unwrap_or(defaults.images.redis),
            redis_ha_proxy: lookup("ARGOCD_REDIS_HA_PROXY_IMAGE")
                .unwrap_or(defaults.images.redis_ha_proxy),
        };

        Ok(Config {
            watch_namespace,
            requeue_interval,
            reconcile_timeout,
            images,
        })
    }
}
