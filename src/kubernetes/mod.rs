// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes utilities for CRD discovery, resource scopes, finalizers and owner references.

pub mod crd;
pub mod finalizer;
pub mod owner;
pub mod scope;

pub use crd::wait_for_argocd_crd;
pub use finalizer::{ensure_finalizer, has_finalizer, is_deleting, remove_finalizer};
pub use owner::attach_owner;
pub use scope::ScopeExt;
