// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! In-memory descriptors of desired child resources.
//!
//! Builders return a flat `Vec<ResourceDescriptor>`; the orchestrator
//! applies them uniformly. [`ResourceDescriptor::to_manifest`] projects a
//! descriptor onto the Kubernetes object it stands for.

use std::collections::BTreeMap;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::k8s::{OwnerReference, ResourceRequirements};

/// Kubernetes kind a descriptor maps to; used for store lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ResourceKind {
    Service,
    PersistentVolumeClaim,
    Deployment,
    StatefulSet,
    ServiceAccount,
    Role,
    RoleBinding,
    Ingress,
    Secret,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Service => "Service",
            ResourceKind::PersistentVolumeClaim => "PersistentVolumeClaim",
            ResourceKind::Deployment => "Deployment",
            ResourceKind::StatefulSet => "StatefulSet",
            ResourceKind::ServiceAccount => "ServiceAccount",
            ResourceKind::Role => "Role",
            ResourceKind::RoleBinding => "RoleBinding",
            ResourceKind::Ingress => "Ingress",
            ResourceKind::Secret => "Secret",
        }
    }

    pub fn api_version(&self) -> &'static str {
        match self {
            ResourceKind::Service
            | ResourceKind::PersistentVolumeClaim
            | ResourceKind::ServiceAccount
            | ResourceKind::Secret => "v1",
            ResourceKind::Deployment | ResourceKind::StatefulSet => "apps/v1",
            ResourceKind::Role | ResourceKind::RoleBinding => "rbac.authorization.k8s.io/v1",
            ResourceKind::Ingress => "networking.k8s.io/v1",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name, namespace, labels and owner shared by every descriptor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub owner: Option<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, labels: BTreeMap<String, String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            labels,
            annotations: BTreeMap::new(),
            owner: None,
        }
    }

    fn to_json(&self) -> Value {
        let mut meta = json!({
            "name": self.name,
            "namespace": self.namespace,
            "labels": self.labels,
        });
        if !self.annotations.is_empty() {
            meta["annotations"] = json!(self.annotations);
        }
        if let Some(owner) = &self.owner {
            meta["ownerReferences"] = json!([owner]);
        }
        meta
    }
}

/// Port given by number or by container port name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PortRef {
    Number(i32),
    Named(String),
}

impl PortRef {
    pub fn named(name: &str) -> Self {
        PortRef::Named(name.to_string())
    }
}

// ---------------------------------------------------------------------------
// Network endpoint
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicePort {
    pub name: String,
    pub port: i32,
    pub target: PortRef,
}

impl ServicePort {
    pub fn new(name: &str, port: i32, target: PortRef) -> Self {
        Self { name: name.to_string(), port, target }
    }
}

/// Internal service endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkEndpoint {
    pub meta: ObjectMeta,
    pub selector: BTreeMap<String, String>,
    pub ports: Vec<ServicePort>,
    /// No cluster IP; stable per-pod DNS for stateful workloads.
    pub headless: bool,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccessMode {
    ReadWriteOnce,
    ReadWriteMany,
}

impl AccessMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessMode::ReadWriteOnce => "ReadWriteOnce",
            AccessMode::ReadWriteMany => "ReadWriteMany",
        }
    }
}

/// Persistent volume claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageClaim {
    pub meta: ObjectMeta,
    pub size: String,
    pub access_mode: AccessMode,
    pub storage_class: Option<String>,
}

impl StorageClaim {
    fn spec_json(&self) -> Value {
        let mut spec = json!({
            "accessModes": [self.access_mode.as_str()],
            "resources": { "requests": { "storage": self.size } },
        });
        if let Some(class) = &self.storage_class {
            spec["storageClassName"] = json!(class);
        }
        spec
    }
}

// ---------------------------------------------------------------------------
// Workloads
// ---------------------------------------------------------------------------

/// Where an environment variable gets its value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnvSource {
    Value(String),
    SecretKey { secret: String, key: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvVar {
    pub name: String,
    pub source: EnvSource,
}

impl EnvVar {
    pub fn value(name: &str, value: impl Into<String>) -> Self {
        Self { name: name.to_string(), source: EnvSource::Value(value.into()) }
    }

    pub fn secret(name: &str, secret: &str, key: &str) -> Self {
        Self {
            name: name.to_string(),
            source: EnvSource::SecretKey { secret: secret.to_string(), key: key.to_string() },
        }
    }

    fn to_json(&self) -> Value {
        match &self.source {
            EnvSource::Value(v) => json!({ "name": self.name, "value": v }),
            EnvSource::SecretKey { secret, key } => json!({
                "name": self.name,
                "valueFrom": { "secretKeyRef": { "name": secret, "key": key } },
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContainerPort {
    pub name: String,
    pub port: i32,
}

impl ContainerPort {
    pub fn new(name: &str, port: i32) -> Self {
        Self { name: name.to_string(), port }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMount {
    pub name: String,
    pub mount_path: String,
    pub sub_path: Option<String>,
}

impl VolumeMount {
    pub fn new(name: &str, mount_path: &str) -> Self {
        Self { name: name.to_string(), mount_path: mount_path.to_string(), sub_path: None }
    }

    pub fn file(name: &str, mount_path: &str, sub_path: &str) -> Self {
        Self {
            name: name.to_string(),
            mount_path: mount_path.to_string(),
            sub_path: Some(sub_path.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbeHandler {
    Http { path: String, port: PortRef },
    Exec { command: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Probe {
    pub handler: ProbeHandler,
    pub initial_delay_seconds: i32,
    pub period_seconds: i32,
}

impl Probe {
    pub fn http(path: &str, port: PortRef, initial_delay_seconds: i32) -> Self {
        Self {
            handler: ProbeHandler::Http { path: path.to_string(), port },
            initial_delay_seconds,
            period_seconds: 6,
        }
    }

    pub fn exec(command: &[&str], initial_delay_seconds: i32) -> Self {
        Self {
            handler: ProbeHandler::Exec { command: command.iter().map(|s| s.to_string()).collect() },
            initial_delay_seconds,
            period_seconds: 6,
        }
    }

    fn to_json(&self) -> Value {
        let mut probe = match &self.handler {
            ProbeHandler::Http { path, port } => json!({ "httpGet": { "path": path, "port": port } }),
            ProbeHandler::Exec { command } => json!({ "exec": { "command": command } }),
        };
        probe["initialDelaySeconds"] = json!(self.initial_delay_seconds);
        probe["periodSeconds"] = json!(self.period_seconds);
        probe
    }
}

/// One process of a workload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub ports: Vec<ContainerPort>,
    pub env: Vec<EnvVar>,
    /// Secrets whose keys are all exported as environment variables.
    pub env_from_secrets: Vec<String>,
    pub volume_mounts: Vec<VolumeMount>,
    pub liveness: Option<Probe>,
    pub readiness: Option<Probe>,
    pub resources: ResourceRequirements,
}

impl Container {
    pub fn new(name: &str, image: &str, resources: ResourceRequirements) -> Self {
        Self {
            name: name.to_string(),
            image: image.to_string(),
            ports: Vec::new(),
            env: Vec::new(),
            env_from_secrets: Vec::new(),
            volume_mounts: Vec::new(),
            liveness: None,
            readiness: None,
            resources,
        }
    }

    fn to_json(&self) -> Value {
        let mut container = json!({
            "name": self.name,
            "image": self.image,
            "resources": {
                "requests": { "cpu": self.resources.requests.cpu, "memory": self.resources.requests.memory },
                "limits": { "cpu": self.resources.limits.cpu, "memory": self.resources.limits.memory },
            },
        });
        if !self.ports.is_empty() {
            container["ports"] = self
                .ports
                .iter()
                .map(|p| json!({ "name": p.name, "containerPort": p.port, "protocol": "TCP" }))
                .collect();
        }
        if !self.env.is_empty() {
            container["env"] = self.env.iter().map(EnvVar::to_json).collect();
        }
        if !self.env_from_secrets.is_empty() {
            container["envFrom"] = self
                .env_from_secrets
                .iter()
                .map(|s| json!({ "secretRef": { "name": s } }))
                .collect();
        }
        if !self.volume_mounts.is_empty() {
            container["volumeMounts"] = self
                .volume_mounts
                .iter()
                .map(|m| {
                    let mut mount = json!({ "name": m.name, "mountPath": m.mount_path });
                    if let Some(sub) = &m.sub_path {
                        mount["subPath"] = json!(sub);
                    }
                    mount
                })
                .collect();
        }
        if let Some(probe) = &self.liveness {
            container["livenessProbe"] = probe.to_json();
        }
        if let Some(probe) = &self.readiness {
            container["readinessProbe"] = probe.to_json();
        }
        container
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeSource {
    EmptyDir,
    Claim(String),
    /// Secret keys projected as files: `(key, path)`.
    Secret { secret: String, items: Vec<(String, String)> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Volume {
    pub name: String,
    pub source: VolumeSource,
}

impl Volume {
    fn to_json(&self) -> Value {
        match &self.source {
            VolumeSource::EmptyDir => json!({ "name": self.name, "emptyDir": {} }),
            VolumeSource::Claim(claim) => json!({
                "name": self.name,
                "persistentVolumeClaim": { "claimName": claim },
            }),
            VolumeSource::Secret { secret, items } => json!({
                "name": self.name,
                "secret": {
                    "secretName": secret,
                    "items": items
                        .iter()
                        .map(|(key, path)| json!({ "key": key, "path": path }))
                        .collect::<Vec<_>>(),
                },
            }),
        }
    }
}

/// Stateless replica set or stateful set with per-replica storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkloadKind {
    Deployment,
    StatefulSet {
        /// Governing service giving each replica a stable network identity.
        service_name: String,
        volume_claims: Vec<StorageClaim>,
    },
}

/// Running process description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workload {
    pub meta: ObjectMeta,
    pub kind: WorkloadKind,
    pub replicas: i32,
    pub selector: BTreeMap<String, String>,
    pub service_account: Option<String>,
    pub automount_service_account_token: Option<bool>,
    pub termination_grace_period_seconds: Option<i64>,
    pub volumes: Vec<Volume>,
    pub containers: Vec<Container>,
}

impl Workload {
    /// Single-replica workload selecting pods by `meta.labels`.
    pub fn single(meta: ObjectMeta, kind: WorkloadKind, containers: Vec<Container>) -> Self {
        let selector = meta.labels.clone();
        Self {
            meta,
            kind,
            replicas: 1,
            selector,
            service_account: None,
            automount_service_account_token: None,
            termination_grace_period_seconds: None,
            volumes: Vec::new(),
            containers,
        }
    }

    fn spec_json(&self) -> Value {
        let mut pod = json!({
            "containers": self.containers.iter().map(Container::to_json).collect::<Vec<_>>(),
        });
        if !self.volumes.is_empty() {
            pod["volumes"] = self.volumes.iter().map(Volume::to_json).collect();
        }
        if let Some(sa) = &self.service_account {
            pod["serviceAccountName"] = json!(sa);
        }
        if let Some(automount) = self.automount_service_account_token {
            pod["automountServiceAccountToken"] = json!(automount);
        }
        if let Some(grace) = self.termination_grace_period_seconds {
            pod["terminationGracePeriodSeconds"] = json!(grace);
            pod["restartPolicy"] = json!("Always");
        }

        let mut spec = json!({
            "replicas": self.replicas,
            "selector": { "matchLabels": self.selector },
            "template": {
                "metadata": { "labels": self.meta.labels },
                "spec": pod,
            },
        });
        if let WorkloadKind::StatefulSet { service_name, volume_claims } = &self.kind {
            spec["serviceName"] = json!(service_name);
            spec["volumeClaimTemplates"] = volume_claims
                .iter()
                .map(|claim| {
                    json!({
                        "metadata": { "name": claim.meta.name, "labels": claim.meta.labels },
                        "spec": claim.spec_json(),
                    })
                })
                .collect();
        }
        spec
    }
}

// ---------------------------------------------------------------------------
// Access control
// ---------------------------------------------------------------------------

/// Identity a workload runs as.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessIdentity {
    pub meta: ObjectMeta,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRule {
    pub api_groups: Vec<String>,
    pub resources: Vec<String>,
    pub verbs: Vec<String>,
}

impl PolicyRule {
    pub fn core(resources: &[&str], verbs: &[&str]) -> Self {
        Self {
            api_groups: vec![String::new()],
            resources: resources.iter().map(|s| s.to_string()).collect(),
            verbs: verbs.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Namespaced set of permissions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessRole {
    pub meta: ObjectMeta,
    pub rules: Vec<PolicyRule>,
}

/// Grants a role to an access identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessBinding {
    pub meta: ObjectMeta,
    pub role: String,
    pub subject: String,
}

// ---------------------------------------------------------------------------
// Routing and secrets
// ---------------------------------------------------------------------------

/// Ingress rule with TLS termination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingRule {
    pub meta: ObjectMeta,
    pub host: String,
    pub path: String,
    pub backend_service: String,
    pub backend_port: i32,
    pub tls_secret: String,
}

/// Opaque secret data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecretPayload {
    pub meta: ObjectMeta,
    pub data: BTreeMap<String, Vec<u8>>,
}

impl SecretPayload {
    pub fn new(meta: ObjectMeta) -> Self {
        Self { meta, data: BTreeMap::new() }
    }

    pub fn insert(&mut self, key: &str, value: impl Into<Vec<u8>>) {
        self.data.insert(key.to_string(), value.into());
    }

    /// Value of `key` as UTF-8, if present and valid.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }
}

// ---------------------------------------------------------------------------
// Descriptor
// ---------------------------------------------------------------------------

/// One desired external object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceDescriptor {
    NetworkEndpoint(NetworkEndpoint),
    StorageClaim(StorageClaim),
    Workload(Workload),
    AccessIdentity(AccessIdentity),
    AccessRole(AccessRole),
    AccessBinding(AccessBinding),
    RoutingRule(RoutingRule),
    SecretPayload(SecretPayload),
}

impl ResourceDescriptor {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::NetworkEndpoint(_) => ResourceKind::Service,
            Self::StorageClaim(_) => ResourceKind::PersistentVolumeClaim,
            Self::Workload(w) => match w.kind {
                WorkloadKind::Deployment => ResourceKind::Deployment,
                WorkloadKind::StatefulSet { .. } => ResourceKind::StatefulSet,
            },
            Self::AccessIdentity(_) => ResourceKind::ServiceAccount,
            Self::AccessRole(_) => ResourceKind::Role,
            Self::AccessBinding(_) => ResourceKind::RoleBinding,
            Self::RoutingRule(_) => ResourceKind::Ingress,
            Self::SecretPayload(_) => ResourceKind::Secret,
        }
    }

    pub fn meta(&self) -> &ObjectMeta {
        match self {
            Self::NetworkEndpoint(r) => &r.meta,
            Self::StorageClaim(r) => &r.meta,
            Self::Workload(r) => &r.meta,
            Self::AccessIdentity(r) => &r.meta,
            Self::AccessRole(r) => &r.meta,
            Self::AccessBinding(r) => &r.meta,
            Self::RoutingRule(r) => &r.meta,
            Self::SecretPayload(r) => &r.meta,
        }
    }

    pub fn meta_mut(&mut self) -> &mut ObjectMeta {
        match self {
            Self::NetworkEndpoint(r) => &mut r.meta,
            Self::StorageClaim(r) => &mut r.meta,
            Self::Workload(r) => &mut r.meta,
            Self::AccessIdentity(r) => &mut r.meta,
            Self::AccessRole(r) => &mut r.meta,
            Self::AccessBinding(r) => &mut r.meta,
            Self::RoutingRule(r) => &mut r.meta,
            Self::SecretPayload(r) => &mut r.meta,
        }
    }

    pub fn name(&self) -> &str {
        &self.meta().name
    }

    pub fn namespace(&self) -> &str {
        &self.meta().namespace
    }

    pub fn as_secret(&self) -> Option<&SecretPayload> {
        match self {
            Self::SecretPayload(secret) => Some(secret),
            _ => None,
        }
    }

    /// The Kubernetes object this descriptor describes.
    pub fn to_manifest(&self) -> Value {
        let kind = self.kind();
        let mut object = Map::new();
        object.insert("apiVersion".to_string(), json!(kind.api_version()));
        object.insert("kind".to_string(), json!(kind.as_str()));
        object.insert("metadata".to_string(), self.meta().to_json());

        match self {
            Self::NetworkEndpoint(svc) => {
                let mut spec = json!({
                    "type": "ClusterIP",
                    "selector": svc.selector,
                    "ports": svc
                        .ports
                        .iter()
                        .map(|p| json!({
                            "name": p.name,
                            "protocol": "TCP",
                            "port": p.port,
                            "targetPort": p.target,
                        }))
                        .collect::<Vec<_>>(),
                });
                if svc.headless {
                    spec["clusterIP"] = json!("None");
                }
                object.insert("spec".to_string(), spec);
            }
            Self::StorageClaim(pvc) => {
                object.insert("spec".to_string(), pvc.spec_json());
            }
            Self::Workload(workload) => {
                object.insert("spec".to_string(), workload.spec_json());
            }
            Self::AccessIdentity(_) => {}
            Self::AccessRole(role) => {
                let rules: Vec<Value> = role
                    .rules
                    .iter()
                    .map(|r| json!({ "apiGroups": r.api_groups, "resources": r.resources, "verbs": r.verbs }))
                    .collect();
                object.insert("rules".to_string(), json!(rules));
            }
            Self::AccessBinding(binding) => {
                object.insert(
                    "roleRef".to_string(),
                    json!({ "apiGroup": "rbac.authorization.k8s.io", "kind": "Role", "name": binding.role }),
                );
                object.insert(
                    "subjects".to_string(),
                    json!([{
                        "kind": "ServiceAccount",
                        "name": binding.subject,
                        "namespace": binding.meta.namespace,
                    }]),
                );
            }
            Self::RoutingRule(ing) => {
                object.insert(
                    "spec".to_string(),
                    json!({
                        "rules": [{
                            "host": ing.host,
                            "http": { "paths": [{
                                "path": ing.path,
                                "pathType": "Prefix",
                                "backend": { "service": {
                                    "name": ing.backend_service,
                                    "port": { "number": ing.backend_port },
                                } },
                            }] },
                        }],
                        "tls": [{ "hosts": [ing.host], "secretName": ing.tls_secret }],
                    }),
                );
            }
            Self::SecretPayload(secret) => {
                let data: BTreeMap<&String, String> =
                    secret.data.iter().map(|(k, v)| (k, STANDARD.encode(v))).collect();
                object.insert("type".to_string(), json!("Opaque"));
                object.insert("data".to_string(), json!(data));
            }
        }
        Value::Object(object)
    }
}

#[cfg(test)]
#[path = "descriptor_tests.rs"]
mod tests;
