// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Test utilities for mocking the Kubernetes API server.

use bytes::Bytes;
use http::{Request, Response};
use http_body_util::BodyExt;
use kube::client::Body;
use kube::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tower::Service;

/// A request received by the mock API server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Value>,
    failures: HashMap<(String, String), u16>,
    requests: Vec<Recorded>,
    resource_version: u64,
}

/// An in-memory API server: objects are keyed by their REST path and
/// GET/POST/PUT/PATCH/DELETE behave like the real thing, including
/// resource-version conflicts on PUT.
#[derive(Clone, Default)]
pub struct MockService {
    state: Arc<Mutex<State>>,
}

impl MockService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object at the exact REST path
    pub fn with_object(self, path: &str, object: Value) -> Self {
        {
            let mut state = self.state.lock().unwrap();
            state.resource_version += 1;
            let mut object = object;
            object["metadata"]["resourceVersion"] = Value::from(state.resource_version.to_string());
            state.objects.insert(path.to_string(), object);
        }
        self
    }

    /// Answer every request with `method` on `path` with an error status
    pub fn fail_on(self, method: &str, path: &str, status: u16) -> Self {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((method.to_string(), path.to_string()), status);
        self
    }

    /// Build a kube Client from this mock service
    pub fn into_client(self) -> Client {
        Client::new(self, "default")
    }

    /// Raw stored object at `path`
    pub fn object(&self, path: &str) -> Option<Value> {
        self.state.lock().unwrap().objects.get(path).cloned()
    }

    /// Stored object at `path` decoded into a typed resource
    pub fn get<K: DeserializeOwned>(&self, path: &str) -> Option<K> {
        self.object(path)
            .map(|v| serde_json::from_value(v).expect("stored object decodes"))
    }

    pub fn requests(&self) -> Vec<Recorded> {
        self.state.lock().unwrap().requests.clone()
    }

    /// Every request that is not a read
    pub fn writes(&self) -> Vec<Recorded> {
        self.requests()
            .into_iter()
            .filter(|r| r.method != "GET")
            .collect()
    }

    pub fn count(&self, method: &str) -> usize {
        self.requests().iter().filter(|r| r.method == method).count()
    }

    pub fn clear_requests(&self) {
        self.state.lock().unwrap().requests.clear();
    }

    fn handle(&self, method: &str, path: &str, body: Option<Value>) -> (u16, Value) {
        let mut state = self.state.lock().unwrap();
        state.requests.push(Recorded {
            method: method.to_string(),
            path: path.to_string(),
            body: body.clone(),
        });

        if let Some(code) = state.failures.get(&(method.to_string(), path.to_string())) {
            return (*code, status_json(*code, &format!("injected failure on {}", path)));
        }

        match method {
            "GET" => match state.objects.get(path) {
                Some(obj) => (200, obj.clone()),
                None => (404, not_found_json(path)),
            },
            "POST" => {
                let Some(mut obj) = body else {
                    return (400, status_json(400, "missing body"));
                };
                let name = obj["metadata"]["name"].as_str().unwrap_or_default().to_string();
                let key = format!("{}/{}", path, name);
                if state.objects.contains_key(&key) {
                    return (409, status_json(409, &format!("{} already exists", name)));
                }
                state.resource_version += 1;
                obj["metadata"]["resourceVersion"] =
                    Value::from(state.resource_version.to_string());
                if obj["metadata"]["uid"].is_null() {
                    obj["metadata"]["uid"] = Value::from(format!("uid-{}", state.resource_version));
                }
                state.objects.insert(key, obj.clone());
                (201, obj)
            }
            "PUT" => {
                let Some(mut obj) = body else {
                    return (400, status_json(400, "missing body"));
                };
                let Some(current) = state.objects.get(path) else {
                    return (404, not_found_json(path));
                };
                let sent = &obj["metadata"]["resourceVersion"];
                if !sent.is_null() && *sent != current["metadata"]["resourceVersion"] {
                    return (409, status_json(409, "the object has been modified"));
                }
                state.resource_version += 1;
                obj["metadata"]["resourceVersion"] =
                    Value::from(state.resource_version.to_string());
                state.objects.insert(path.to_string(), obj.clone());
                (200, obj)
            }
            "PATCH" => {
                let key = path.strip_suffix("/status").unwrap_or(path).to_string();
                let Some(current) = state.objects.get(&key).cloned() else {
                    return (404, not_found_json(path));
                };
                let mut merged = current;
                if let Some(patch) = body.as_ref() {
                    merge_patch(&mut merged, patch);
                }
                state.resource_version += 1;
                merged["metadata"]["resourceVersion"] =
                    Value::from(state.resource_version.to_string());
                state.objects.insert(key, merged.clone());
                (200, merged)
            }
            "DELETE" => match state.objects.remove(path) {
                Some(obj) => (200, obj),
                None => (404, not_found_json(path)),
            },
            _ => (405, status_json(405, "method not allowed")),
        }
    }
}

/// JSON merge patch (RFC 7386)
fn merge_patch(target: &mut Value, patch: &Value) {
    match patch {
        Value::Object(fields) => {
            if !target.is_object() {
                *target = Value::Object(Default::default());
            }
            if let Value::Object(map) = target {
                for (key, value) in fields {
                    if value.is_null() {
                        map.remove(key);
                    } else {
                        merge_patch(map.entry(key.clone()).or_insert(Value::Null), value);
                    }
                }
            }
        }
        other => *target = other.clone(),
    }
}

impl Service<Request<Body>> for MockService {
    type Response = Response<Body>;
    type Error = tower::BoxError;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let this = self.clone();

        Box::pin(async move {
            let bytes = match req.into_body().collect().await {
                Ok(collected) => collected.to_bytes(),
                Err(_) => Bytes::new(),
            };
            let body = if bytes.is_empty() {
                None
            } else {
                serde_json::from_slice::<Value>(&bytes).ok()
            };

            let (status, payload) = this.handle(&method, &path, body);

            Ok(Response::builder()
                .status(status)
                .header("content-type", "application/json")
                .body(Body::from(payload.to_string().into_bytes()))
                .unwrap())
        })
    }
}

fn status_json(code: u16, message: &str) -> Value {
    let reason = match code {
        404 => "NotFound",
        409 => "Conflict",
        400 => "BadRequest",
        _ => "InternalError",
    };
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "status": "Failure",
        "message": message,
        "reason": reason,
        "code": code
    })
}

/// Create a 404 not found response
pub fn not_found_json(path: &str) -> Value {
    status_json(404, &format!("{} not found", path))
}

/// REST path of a namespaced core/v1 object or collection
pub fn core_path(namespace: &str, plural: &str, name: Option<&str>) -> String {
    let base = format!("/api/v1/namespaces/{}/{}", namespace, plural);
    match name {
        Some(n) => format!("{}/{}", base, n),
        None => base,
    }
}

/// REST path of a namespaced object in a named API group
pub fn group_path(group_version: &str, namespace: &str, plural: &str, name: &str) -> String {
    format!("/apis/{}/namespaces/{}/{}/{}", group_version, namespace, plural, name)
}

/// REST path of a cluster-scoped object in a named API group
pub fn cluster_path(group_version: &str, plural: &str, name: &str) -> String {
    format!("/apis/{}/{}/{}", group_version, plural, name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::core::v1::ConfigMap;
    use kube::api::{Api, PostParams};

    #[tokio::test]
    async fn test_create_then_get_round_trips() {
        let mock = MockService::new();
        let api: Api<ConfigMap> = Api::namespaced(mock.clone().into_client(), "ns1");

        let cm = ConfigMap {
            metadata: kube::api::ObjectMeta {
                name: Some("cm".to_string()),
                ..Default::default()
            },
            data: Some(BTreeMap::from([("k".to_string(), "v".to_string())])),
            ..Default::default()
        };
        api.create(&PostParams::default(), &cm).await.unwrap();

        let fetched = api.get("cm").await.unwrap();
        assert_eq!(fetched.data, cm.data);
        assert!(fetched.metadata.uid.is_some());
        assert_eq!(mock.count("POST"), 1);
        assert_eq!(mock.count("GET"), 1);
    }

    #[tokio::test]
    async fn test_unknown_object_is_not_found() {
        let mock = MockService::new();
        let api: Api<ConfigMap> = Api::namespaced(mock.into_client(), "ns1");

        assert!(api.get_opt("missing").await.unwrap().is_none());
    }

    #[test]
    fn test_merge_patch_removes_nulls() {
        let mut target = serde_json::json!({"a": 1, "b": {"c": 2, "d": 3}});
        merge_patch(&mut target, &serde_json::json!({"b": {"c": null, "e": 4}}));

        assert_eq!(target, serde_json::json!({"a": 1, "b": {"d": 3, "e": 4}}));
    }
}
