// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resource profiles for the managed containers.

use serde::{Deserialize, Serialize};

/// Which container a profile applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ComponentProfile {
    Postgres,
    PostgresExporter,
    KeyDb,
    Gitea,
    DroneServer,
    DroneRunner,
    Registry,
    Clair,
}

/// CPU/memory pair as Kubernetes quantities.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceList {
    pub cpu: String,
    pub memory: String,
}

impl ResourceList {
    fn new(cpu: &str, memory: &str) -> Self {
        Self { cpu: cpu.to_string(), memory: memory.to_string() }
    }
}

/// Requests and limits for one container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResourceRequirements {
    pub requests: ResourceList,
    pub limits: ResourceList,
}

impl ComponentProfile {
    /// Requests/limits for this container.
    pub fn to_requirements(&self) -> ResourceRequirements {
        let (requests, limits) = match self {
            Self::Postgres => (("100m", "384Mi"), ("1000m", "2048Mi")),
            Self::PostgresExporter => (("10m", "16Mi"), ("100m", "64Mi")),
            Self::KeyDb => (("10m", "15Mi"), ("250m", "1024Mi")),
            Self::Gitea => (("10m", "50Mi"), ("250m", "250Mi")),
            Self::DroneServer => (("10m", "64Mi"), ("250m", "512Mi")),
            Self::DroneRunner => (("10m", "32Mi"), ("250m", "256Mi")),
            Self::Registry => (("10m", "15Mi"), ("250m", "1024Mi")),
            Self::Clair => (("50m", "128Mi"), ("500m", "1024Mi")),
        };
        ResourceRequirements {
            requests: ResourceList::new(requests.0, requests.1),
            limits: ResourceList::new(limits.0, limits.1),
        }
    }
}

/// Parse a CPU quantity (`250m`, `1`, `0.5`) into millicores.
#[cfg(test)]
pub(crate) fn cpu_millis(quantity: &str) -> Option<u64> {
    if let Some(millis) = quantity.strip_suffix('m') {
        return millis.parse().ok();
    }
    let (whole, frac) = quantity.split_once('.').unwrap_or((quantity, ""));
    if frac.len() > 3 {
        return None;
    }
    let whole: u64 = whole.parse().ok()?;
    let frac_millis = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<3}", frac);
        padded.parse::<u64>().ok()?
    };
    whole.checked_mul(1000)?.checked_add(frac_millis)
}

/// Parse a binary memory/storage quantity (`384Mi`, `2Gi`) into bytes.
pub fn quantity_bytes(quantity: &str) -> Option<u64> {
    const UNITS: [(&str, u64); 4] = [
        ("Ki", 1 << 10),
        ("Mi", 1 << 20),
        ("Gi", 1 << 30),
        ("Ti", 1 << 40),
    ];
    for (suffix, scale) in UNITS {
        if let Some(value) = quantity.strip_suffix(suffix) {
            return value.parse::<u64>().ok()?.checked_mul(scale);
        }
    }
    quantity.parse().ok()
}

#[cfg(test)]
#[path = "profiles_tests.rs"]
mod tests;
