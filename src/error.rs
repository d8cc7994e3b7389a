// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OperatorError {
    #[error("Kubernetes API error: {0}")]
    KubeError(#[from] kube::Error),

    #[error("Failed to {action} {kind} {name}: {source}")]
    StoreError {
        action: &'static str,
        kind: String,
        name: String,
        #[source]
        source: kube::Error,
    },

    #[error("Timed out trying to {action} {kind} {name}")]
    Timeout {
        action: &'static str,
        kind: String,
        name: String,
    },

    #[error("Failed to build {kind} {name}: {reason}")]
    BuildError {
        kind: String,
        name: String,
        reason: String,
    },

    #[error("ArgoCD {0} has no namespace")]
    MissingNamespace(String),

    #[error("Cannot reference owner {0}: object has no uid")]
    OwnerReference(String),

    #[error("Rollout failed for {} workload(s): {}", .0.len(), join_errors(.0))]
    RolloutError(Vec<OperatorError>),
}

impl OperatorError {
    /// Whether this error is a not-found answer from the API server.
    pub fn is_not_found(&self) -> bool {
        match self {
            OperatorError::KubeError(kube::Error::Api(err)) => err.code == 404,
            OperatorError::StoreError {
                source: kube::Error::Api(err),
                ..
            } => err.code == 404,
            _ => false,
        }
    }

    /// Whether the API server rejected a write because of a stale resource version.
    pub fn is_conflict(&self) -> bool {
        match self {
            OperatorError::KubeError(kube::Error::Api(err)) => err.code == 409,
            OperatorError::StoreError {
                source: kube::Error::Api(err),
                ..
            } => err.code == 409,
            _ => false,
        }
    }
}

fn join_errors(errors: &[OperatorError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

pub type Result<T> = std::result::Result<T, OperatorError>;

#[cfg(test)]
mod tests {
    use super::*;
    use kube::error::ErrorResponse;

    fn api_error(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: reason.to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_store_error_keeps_action_and_identity() {
        let err = OperatorError::StoreError {
            action: "update",
            kind: "ConfigMap".to_string(),
            name: "demo-agent-principal-params".to_string(),
            source: api_error(500, "InternalError"),
        };

        let msg = err.to_string();
        assert!(msg.starts_with("Failed to update ConfigMap demo-agent-principal-params"));
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_is_not_found() {
        let err = OperatorError::StoreError {
            action: "get",
            kind: "Deployment".to_string(),
            name: "demo-server".to_string(),
            source: api_error(404, "NotFound"),
        };
        assert!(err.is_not_found());
        assert!(!err.is_conflict());
    }

    #[test]
    fn test_is_conflict() {
        let err = OperatorError::KubeError(api_error(409, "Conflict"));
        assert!(err.is_conflict());
    }

    #[test]
    fn test_rollout_error_lists_every_failure() {
        let err = OperatorError::RolloutError(vec![
            OperatorError::MissingNamespace("a".to_string()),
            OperatorError::MissingNamespace("b".to_string()),
        ]);

        assert_eq!(
            err.to_string(),
            "Rollout failed for 2 workload(s): ArgoCD a has no namespace; ArgoCD b has no namespace"
        );
    }
}
