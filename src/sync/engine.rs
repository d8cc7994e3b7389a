// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Generic create / update / delete convergence for one managed object.

use crate::error::Result;
use crate::kubernetes::{attach_owner, ScopeExt};
use crate::sync::drift::Drift;
use crate::sync::store::{self, Store};
use kube::Resource;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fmt::Debug;
use tracing::{debug, info, instrument, warn};

/// What a convergence pass did to the remote store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    NoOp,
    Created,
    Updated,
    Deleted,
    /// Deleted because an immutable field changed; the next pass recreates it.
    Replaced,
}

impl Outcome {
    pub fn is_write(&self) -> bool {
        !matches!(self, Outcome::NoOp)
    }
}

/// Per-kind knowledge the engine needs: identity, desired state, the
/// enablement toggle and which fields are worth comparing.
pub trait Adapter {
    type Object: Resource<DynamicType = (), Scope: ScopeExt>
        + Clone
        + Debug
        + Serialize
        + DeserializeOwned
        + Send
        + Sync
        + 'static;

    fn name(&self) -> String;

    /// Whether the object should exist at all.
    fn enabled(&self) -> bool;

    /// Desired object. Must be deterministic for identical input.
    fn build(&self) -> Result<Self::Object>;

    /// Declare the comparable fields on `drift`.
    fn compare(&self, drift: &mut Drift<Self::Object>);
}

/// Converge one object towards what `adapter` describes.
///
/// Found and disabled: delete. Found and enabled: update only the declared
/// fields that differ, or delete when an immutable field differs. Missing and
/// enabled: attach the owner reference and create. Missing and disabled: nothing.
///
/// `build` only runs for enabled objects, so invalid settings on a disabled
/// component never surface as a build error.
#[instrument(skip_all, fields(name = %adapter.name(), namespace = %store.namespace()))]
pub async fn converge<A: Adapter>(store: &Store<'_>, adapter: &A) -> Result<Outcome> {
    let kind = <A::Object as Resource>::kind(&()).to_string();
    let name = adapter.name();

    converge_object(store, adapter, &kind, &name)
        .await
        .inspect_err(|e| {
            warn!(
                kind = %kind, name = %name, namespace = %store.namespace(),
                "Failed to converge object: {}", e
            )
        })
}

async fn converge_object<A: Adapter>(
    store: &Store<'_>,
    adapter: &A,
    kind: &str,
    name: &str,
) -> Result<Outcome> {
    let namespace = store.namespace();
    let enabled = adapter.enabled();

    let existing = store::fetch::<A::Object>(store, name).await?;

    match existing {
        Some(_) if !enabled => {
            store::delete::<A::Object>(store, name).await?;
            info!(kind = %kind, name = %name, namespace = %namespace, "Deleted disabled object");
            Ok(Outcome::Deleted)
        }
        Some(existing) => {
            let desired = adapter.build()?;
            let mut drift = Drift::new(existing, desired);
            adapter.compare(&mut drift);

            if drift.requires_replace() {
                let fields = drift.immutable_changed().join(",");
                store::delete::<A::Object>(store, name).await?;
                info!(
                    kind = %kind, name = %name, namespace = %namespace, fields = %fields,
                    "Deleted object to recreate it with changed immutable fields"
                );
                return Ok(Outcome::Replaced);
            }

            if drift.is_clean() {
                debug!(kind = %kind, name = %name, namespace = %namespace, "Object is up to date");
                return Ok(Outcome::NoOp);
            }

            let fields = drift.changed().join(",");
            let updated = drift.into_existing();
            store::replace(store, &updated).await?;
            info!(
                kind = %kind, name = %name, namespace = %namespace, fields = %fields,
                "Updated object"
            );
            Ok(Outcome::Updated)
        }
        None if !enabled => {
            debug!(
                kind = %kind, name = %name, namespace = %namespace,
                "Object disabled, nothing to create"
            );
            Ok(Outcome::NoOp)
        }
        None => {
            let mut desired = adapter.build()?;
            if !<<A::Object as Resource>::Scope as ScopeExt>::CLUSTER_SCOPED {
                if let Err(e) = attach_owner(&mut desired, store.owner()) {
                    warn!(
                        kind = %kind, name = %name, namespace = %namespace,
                        "Creating object without owner reference: {}", e
                    );
                }
            }
            store::create(store, &desired).await?;
            info!(kind = %kind, name = %name, namespace = %namespace, "Created object");
            Ok(Outcome::Created)
        }
    }
}
