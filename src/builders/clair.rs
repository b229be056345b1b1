// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Clair vulnerability scanner.

use serde::Serialize;

use crate::descriptor::{
    Container, ContainerPort, PortRef, Probe, ResourceDescriptor, ServicePort, Volume,
    VolumeMount, VolumeSource, Workload, WorkloadKind,
};
use crate::error::ReconcileError;
use crate::k8s::ComponentProfile;
use crate::naming::ComponentKind;
use crate::render;

use super::{BuildContext, CredentialRecord};

pub const SUB_COMPONENT: &str = "scanner";
pub const CONFIG_KEY: &str = "config.yaml";

const API_PORT: i32 = 6060;
const HEALTH_PORT: i32 = 6061;

/// Clair v2 configuration file.
pub const CONFIG_YAML: &str = r#"clair:
  database:
    type: pgsql
    options:
      source: "{{ .datasource }}"
      cachesize: 16384
  api:
    addr: "0.0.0.0:6060"
    healthaddr: "0.0.0.0:6061"
    timeout: 900s
    paginationkey: "{{ .pagination_key }}"
  updater:
    interval: 2h
  notifier:
    attempts: 3
    renotifyinterval: 2h
"#;

#[derive(Serialize)]
struct ConfigData {
    datasource: String,
    pagination_key: String,
}

/// Render `config.yaml` against the scanner database.
pub fn render_config(ctx: &BuildContext<'_>, database: &CredentialRecord) -> Result<Vec<u8>, ReconcileError> {
    let data = ConfigData {
        datasource: database.datasource(ctx.namespace()),
        pagination_key: ctx.secrets.random_token()?,
    };
    Ok(render::render(CONFIG_YAML, &data)?)
}

/// Service, ingress, config secret and deployment of the scanner.
pub fn build(ctx: &BuildContext<'_>, database: &CredentialRecord) -> Result<Vec<ResourceDescriptor>, ReconcileError> {
    let derived = ctx.derive(ComponentKind::Clair, SUB_COMPONENT);
    let name = derived.name.clone();

    let service = ctx.endpoint(
        &derived,
        vec![
            ServicePort::new("api", API_PORT, PortRef::named("api")),
            ServicePort::new("metrics", HEALTH_PORT, PortRef::named("metrics")),
        ],
    );
    let ingress = ctx.routing_rule(
        ComponentKind::Clair,
        &derived,
        &ctx.spec.scanner.hostname,
        &ctx.spec.scanner.annotations,
        API_PORT,
    );

    let mut secret = ctx.secret(&derived);
    secret.insert(CONFIG_KEY, render_config(ctx, database)?);

    let mut server = Container::new("server", &ctx.settings.images.clair, ComponentProfile::Clair.to_requirements());
    server.ports = vec![ContainerPort::new("api", API_PORT), ContainerPort::new("metrics", HEALTH_PORT)];
    server.volume_mounts.push(VolumeMount::new("config", "/etc/clair"));
    server.liveness = Some(Probe::http("/health", PortRef::named("metrics"), 10));
    server.readiness = Some(Probe::http("/health", PortRef::named("metrics"), 5));

    let mut workload = Workload::single(ctx.meta(&derived), WorkloadKind::Deployment, vec![server]);
    workload.automount_service_account_token = Some(false);
    workload.volumes.push(Volume {
        name: "config".to_string(),
        source: VolumeSource::Secret {
            secret: name,
            items: vec![(CONFIG_KEY.to_string(), CONFIG_KEY.to_string())],
        },
    });

    let mut resources = vec![service];
    resources.extend(ingress);
    resources.push(ResourceDescriptor::SecretPayload(secret));
    resources.push(ResourceDescriptor::Workload(workload));
    Ok(resources)
}

#[cfg(test)]
#[path = "clair_tests.rs"]
mod tests;
