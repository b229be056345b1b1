// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resource builders, one per component.
//!
//! A builder is a pure function from a [`BuildContext`] (plus whatever
//! records upstream components produced) to the descriptors that make up
//! the component. Builders never talk to the store; the orchestrator
//! applies what they return, in order.

pub mod clair;
pub mod drone;
pub mod gitea;
pub mod keydb;
pub mod postgres;
pub mod registry;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::config::OperatorConfig;
use crate::descriptor::{
    AccessMode, NetworkEndpoint, ObjectMeta, ResourceDescriptor, RoutingRule, SecretPayload,
    ServicePort, StorageClaim,
};
use crate::k8s::{InstanceIdentity, VcsSpec};
use crate::naming::{self, ComponentKind, Derived};
use crate::secrets::SecretGenerator;

/// Port every database service listens on.
pub const POSTGRES_PORT: u16 = 5432;
/// Port every cache service listens on.
pub const KEYDB_PORT: u16 = 6379;

/// Everything a builder may read.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    pub identity: &'a InstanceIdentity,
    pub spec: &'a VcsSpec,
    pub settings: &'a OperatorConfig,
    pub secrets: &'a SecretGenerator,
    /// Pass start; signed tokens are valid from here on.
    pub now: DateTime<Utc>,
}

/// Descriptors of one component plus the record it hands downstream.
#[derive(Debug)]
pub struct Built<T> {
    pub resources: Vec<ResourceDescriptor>,
    pub record: T,
}

impl<'a> BuildContext<'a> {
    pub fn derive(&self, kind: ComponentKind, sub_component: &str) -> Derived {
        naming::derive(self.identity, kind, sub_component)
    }

    pub fn namespace(&self) -> &str {
        &self.identity.namespace
    }

    pub fn meta(&self, derived: &Derived) -> ObjectMeta {
        ObjectMeta::new(&derived.name, self.namespace(), derived.labels.clone())
    }

    /// Cluster-internal service selecting the pods labelled like `derived`.
    pub fn endpoint(&self, derived: &Derived, ports: Vec<ServicePort>) -> ResourceDescriptor {
        ResourceDescriptor::NetworkEndpoint(NetworkEndpoint {
            meta: self.meta(derived),
            selector: derived.labels.clone(),
            ports,
            headless: false,
        })
    }

    /// Volume claim named after `derived`, honouring the configured class.
    pub fn claim(&self, derived: &Derived, size: &str, access_mode: AccessMode) -> StorageClaim {
        StorageClaim {
            meta: self.meta(derived),
            size: size.to_string(),
            access_mode,
            storage_class: self.settings.storage.storage_class.clone(),
        }
    }

    pub fn secret(&self, derived: &Derived) -> SecretPayload {
        SecretPayload::new(self.meta(derived))
    }

    /// TLS-terminated ingress for `hostname`; `None` when no hostname is set.
    pub fn routing_rule(
        &self,
        kind: ComponentKind,
        derived: &Derived,
        hostname: &str,
        annotations: &BTreeMap<String, String>,
        backend_port: i32,
    ) -> Option<ResourceDescriptor> {
        if hostname.is_empty() {
            return None;
        }
        let mut meta = self.meta(derived);
        meta.annotations = annotations.clone();
        Some(ResourceDescriptor::RoutingRule(RoutingRule {
            meta,
            host: hostname.to_string(),
            path: "/".to_string(),
            backend_service: derived.name.clone(),
            backend_port,
            tls_secret: naming::tls_secret_name(self.identity, kind),
        }))
    }
}

/// Database connection parameters of one postgres instance.
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialRecord {
    /// Service name, without namespace.
    pub host: String,
    pub name: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("host", &self.host)
            .field("name", &self.name)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl CredentialRecord {
    pub const KEY_HOST: &'static str = "db_host";
    pub const KEY_NAME: &'static str = "db_name";
    pub const KEY_USER: &'static str = "db_user";
    pub const KEY_PASS: &'static str = "db_pass";

    /// Read the record back out of a stored database secret.
    pub fn from_secret(secret: &SecretPayload) -> Option<Self> {
        Some(Self {
            host: secret.get_str(Self::KEY_HOST)?.to_string(),
            name: secret.get_str(Self::KEY_NAME)?.to_string(),
            user: secret.get_str(Self::KEY_USER)?.to_string(),
            password: secret.get_str(Self::KEY_PASS)?.to_string(),
        })
    }

    /// Write the record into `secret` under the database keys.
    pub fn write_to(&self, secret: &mut SecretPayload) {
        secret.insert(Self::KEY_USER, self.user.as_str());
        secret.insert(Self::KEY_NAME, self.name.as_str());
        secret.insert(Self::KEY_PASS, self.password.as_str());
        secret.insert(Self::KEY_HOST, self.host.as_str());
    }

    /// `host.namespace.svc:5432`
    pub fn address(&self, namespace: &str) -> String {
        format!("{}:{}", naming::service_host(&self.host, namespace), POSTGRES_PORT)
    }

    /// libpq connection URL for this database.
    pub fn datasource(&self, namespace: &str) -> String {
        format!(
            "postgres://{}:{}@{}/{}?sslmode=disable",
            self.user,
            self.password,
            self.address(namespace),
            self.name
        )
    }
}

/// Address of the cache service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheEndpoint {
    pub host: String,
    pub port: u16,
}

impl CacheEndpoint {
    /// `host:port`
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// OAuth2 client the forge issues to the CI server.
#[derive(Clone, PartialEq, Eq, Serialize, Zeroize, ZeroizeOnDrop)]
pub struct ForgeIdentity {
    pub server_url: String,
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for ForgeIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForgeIdentity")
            .field("server_url", &self.server_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}


#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
