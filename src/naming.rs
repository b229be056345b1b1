// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Deterministic names and label sets for derived resources.
//!
//! Every child of an instance is named `<instance>-<sub>-gitifold-<kind>`.
//! Names are DNS-1123 labels; anything longer than 63 characters is cut
//! and suffixed with a digest of the full name so distinct inputs keep
//! distinct outputs.

use std::collections::BTreeMap;

use sha2::{Digest, Sha256};

use crate::k8s::InstanceIdentity;

/// Product tag joined into every name and carried as `part-of`.
pub const PRODUCT: &str = "gitifold";
/// Value of the `managed-by` label.
pub const MANAGED_BY: &str = "gitifold-operator";

pub const LABEL_NAME: &str = "app.kubernetes.io/name";
pub const LABEL_COMPONENT: &str = "app.kubernetes.io/component";
pub const LABEL_PART_OF: &str = "app.kubernetes.io/part-of";
pub const LABEL_INSTANCE: &str = "app.kubernetes.io/instance";
pub const LABEL_MANAGED_BY: &str = "app.kubernetes.io/managed-by";

/// Maximum length of a DNS-1123 label and of a label value.
pub const MAX_NAME_LENGTH: usize = 63;
const DIGEST_CHARS: usize = 8;

/// Managed component kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ComponentKind {
    Postgres,
    KeyDb,
    Gitea,
    Drone,
    Registry,
    Clair,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentKind::Postgres => "postgres",
            ComponentKind::KeyDb => "keydb",
            ComponentKind::Gitea => "gitea",
            ComponentKind::Drone => "drone",
            ComponentKind::Registry => "registry",
            ComponentKind::Clair => "clair",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and labels for one derived resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Derived {
    pub name: String,
    pub labels: BTreeMap<String, String>,
}

/// Derive the resource name and label set for `(identity, kind, sub_component)`.
pub fn derive(identity: &InstanceIdentity, kind: ComponentKind, sub_component: &str) -> Derived {
    let name = dns_label(&[identity.name.as_str(), sub_component, PRODUCT, kind.as_str()].join("-"));

    let mut labels = BTreeMap::new();
    labels.insert(LABEL_NAME.to_string(), kind.as_str().to_string());
    labels.insert(LABEL_COMPONENT.to_string(), label_value(sub_component));
    labels.insert(LABEL_PART_OF.to_string(), PRODUCT.to_string());
    labels.insert(LABEL_INSTANCE.to_string(), label_value(&identity.name));
    labels.insert(LABEL_MANAGED_BY.to_string(), MANAGED_BY.to_string());

    Derived { name, labels }
}

/// Name of the headless companion service of `name`.
pub fn headless(name: &str) -> String {
    dns_label(&format!("{}-headless", name))
}

/// Name of the TLS certificate secret referenced by a component's ingress.
pub fn tls_secret_name(identity: &InstanceIdentity, kind: ComponentKind) -> String {
    dns_label(&[identity.name.as_str(), kind.as_str(), "ingress", "tls"].join("-"))
}

/// In-cluster DNS name of a service.
pub fn service_host(name: &str, namespace: &str) -> String {
    format!("{}.{}.svc", name, namespace)
}

/// Normalise `raw` into a DNS-1123 label of at most 63 characters.
///
/// Input that is already a valid label comes back unchanged. Anything that
/// had to be rewritten or shortened gets a digest of the raw input appended,
/// so distinct inputs never share a name.
pub fn dns_label(raw: &str) -> String {
    let cleaned = sanitize(raw);
    if cleaned == raw && cleaned.len() <= MAX_NAME_LENGTH {
        return cleaned;
    }
    let digest = hex::encode(Sha256::digest(raw.as_bytes()));
    let base = if cleaned.is_empty() { PRODUCT } else { cleaned.as_str() };
    let keep = (MAX_NAME_LENGTH - DIGEST_CHARS - 1).min(base.len());
    let head = base[..keep].trim_end_matches('-');
    format!("{}-{}", head, &digest[..DIGEST_CHARS])
}

/// Normalise a label value: same charset rules, at most 63 characters.
pub fn label_value(raw: &str) -> String {
    let cleaned = sanitize(raw);
    if cleaned.len() <= MAX_NAME_LENGTH {
        return cleaned;
    }
    dns_label(raw)
}

fn sanitize(raw: &str) -> String {
    let mapped: String = raw
        .chars()
        .map(|c| {
            let c = c.to_ascii_lowercase();
            if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' {
                c
            } else {
                '-'
            }
        })
        .collect();
    mapped.trim_matches('-').to_string()
}

#[cfg(test)]
#[path = "naming_tests.rs"]
mod tests;
