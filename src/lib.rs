// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! gitifold - provisions a self-hosted forge stack from one `VCS` resource.
//!
//! A reconciliation pass derives every child resource of an instance
//! (databases, cache, Gitea, Drone, registry, Clair), generates the secrets
//! and rendered configuration they need, and creates whatever is missing in
//! the target store. Watching, leader election and the real API client live
//! outside this crate; see [`store::ResourceStore`].

pub mod builders;
pub mod cli;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod k8s;
pub mod naming;
pub mod reconcile;
pub mod render;
pub mod secrets;
pub mod store;
pub mod telemetry;

pub use config::OperatorConfig;
pub use descriptor::{ResourceDescriptor, ResourceKind};
pub use error::ReconcileError;
pub use k8s::{InstanceIdentity, Vcs, VcsSpec};
pub use reconcile::{ReconcileContext, ReconcileReport, Reconciler};
pub use store::{InMemoryStore, ResourceStore, StoreError};
