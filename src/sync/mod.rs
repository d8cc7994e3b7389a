// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Declarative synchronization of managed objects against the API server.

pub mod drift;
pub mod engine;
pub mod rollout;
pub mod store;

pub use drift::Drift;
pub use engine::{converge, Adapter, Outcome};
pub use rollout::{marker_key, trigger_rollout, PodTemplated, Workload};
pub use store::{delete, fetch, Store};
