// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! CRD type definitions for the `VCS` resource.
//!
//! Hostnames are taken as given; admission is expected to have checked
//! them before a reconciliation pass ever sees the object.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// API group/version of the `VCS` resource.
pub const API_VERSION: &str = "gitifold.hyperspike.io/v1beta1";
/// Kind of the `VCS` resource.
pub const KIND: &str = "VCS";
/// Namespace used when the metadata does not carry one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Ingress settings for the Gitea forge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GitSpec {
    /// External hostname used for ingress.
    #[serde(default)]
    pub hostname: String,
    /// Ingress annotations, e.g. for certificates and DNS.
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// CI system to deploy next to the forge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CiSystem {
    #[default]
    Drone,
    Agola,
}

impl CiSystem {
    pub fn as_str(&self) -> &'static str {
        match self {
            CiSystem::Drone => "drone",
            CiSystem::Agola => "agola",
        }
    }
}

/// CI server settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CiSpec {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    /// drone or agola, default drone.
    #[serde(default)]
    pub system: CiSystem,
}

/// Container registry settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySpec {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// Vulnerability scanner settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScannerSpec {
    #[serde(default)]
    pub hostname: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
}

/// `VCS` CRD spec.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VcsSpec {
    #[serde(default)]
    pub domain: String,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub git: GitSpec,
    #[serde(default)]
    pub ci: CiSpec,
    #[serde(default)]
    pub registry: RegistrySpec,
    #[serde(default, rename = "clair", alias = "scanner")]
    pub scanner: ScannerSpec,
}

/// Common CRD metadata.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CrdMetadata {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub labels: Option<BTreeMap<String, String>>,
}

/// `VCS` CRD.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vcs {
    #[serde(default = "default_api_version")]
    pub api_version: String,
    #[serde(default = "default_kind")]
    pub kind: String,
    pub metadata: CrdMetadata,
    #[serde(default)]
    pub spec: VcsSpec,
}

fn default_api_version() -> String {
    API_VERSION.to_string()
}

fn default_kind() -> String {
    KIND.to_string()
}

impl Vcs {
    /// Build a `VCS` object in `namespace` with the given spec.
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, spec: VcsSpec) -> Self {
        Self {
            api_version: default_api_version(),
            kind: default_kind(),
            metadata: CrdMetadata {
                name: name.into(),
                namespace: Some(namespace.into()),
                uid: None,
                labels: None,
            },
            spec,
        }
    }

    /// The name + namespace pair every derived resource hangs off.
    pub fn identity(&self) -> InstanceIdentity {
        InstanceIdentity {
            name: self.metadata.name.clone(),
            namespace: self
                .metadata
                .namespace
                .clone()
                .filter(|ns| !ns.is_empty())
                .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        }
    }
}

/// Unique identity of one deployed instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstanceIdentity {
    pub name: String,
    pub namespace: String,
}

impl InstanceIdentity {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self { name: name.into(), namespace: namespace.into() }
    }
}

impl std::fmt::Display for InstanceIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Controller reference attached to every child so the platform can
/// garbage-collect it together with its `VCS` parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub api_version: String,
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub controller: bool,
    pub block_owner_deletion: bool,
}

impl OwnerReference {
    /// Controller reference pointing at `parent`.
    pub fn controller_of(parent: &Vcs) -> Self {
        Self {
            api_version: parent.api_version.clone(),
            kind: parent.kind.clone(),
            name: parent.metadata.name.clone(),
            uid: parent.metadata.uid.clone(),
            controller: true,
            block_owner_deletion: true,
        }
    }
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
