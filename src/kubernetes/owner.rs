// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Owner reference linking between an ArgoCD and the objects it manages

use crate::error::{OperatorError, Result};
use crate::types::ArgoCD;
use kube::{Resource, ResourceExt};

/// Point `object` at `owner` so that deleting the owner garbage collects it.
pub fn attach_owner<K: Resource>(object: &mut K, owner: &ArgoCD) -> Result<()> {
    let owner_ref = owner
        .controller_owner_ref(&())
        .ok_or_else(|| OperatorError::OwnerReference(owner.name_any()))?;

    let refs = object.meta_mut().owner_references.get_or_insert_with(Vec::new);
    if !refs.iter().any(|r| r.uid == owner_ref.uid) {
        refs.push(owner_ref);
    }

    Ok(())
}
