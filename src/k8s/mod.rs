// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Kubernetes integration types.
//!
//! Defines Rust types matching the VCS CRD and the container resource
//! profiles applied to every workload.

pub mod profiles;
pub mod types;

pub use profiles::{ComponentProfile, ResourceList, ResourceRequirements};
pub use types::{
    CiSpec, CiSystem, CrdMetadata, GitSpec, InstanceIdentity, OwnerReference, RegistrySpec,
    ScannerSpec, Vcs, VcsSpec,
};
