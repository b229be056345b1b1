// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Docker distribution registry backed by a shared volume.

use crate::descriptor::{
    AccessMode, Container, ContainerPort, EnvVar, PortRef, Probe, ResourceDescriptor, ServicePort,
    Volume, VolumeMount, VolumeSource, Workload, WorkloadKind,
};
use crate::k8s::ComponentProfile;
use crate::naming::ComponentKind;
use crate::secrets::SecretError;

use super::BuildContext;

pub const SUB_COMPONENT: &str = "containers";
pub const HTTP_SECRET_KEY: &str = "REGISTRY_HTTP_SECRET";

const PORT: i32 = 5000;
const DATA_PATH: &str = "/var/lib/registry";

/// Service, claim, secret, deployment and ingress of the registry.
pub fn build(ctx: &BuildContext<'_>) -> Result<Vec<ResourceDescriptor>, SecretError> {
    let derived = ctx.derive(ComponentKind::Registry, SUB_COMPONENT);
    let name = derived.name.clone();

    let service = ctx.endpoint(&derived, vec![ServicePort::new("registry", PORT, PortRef::Number(PORT))]);

    // Replicas on different nodes share the blob store.
    let claim = ctx.claim(&derived, &ctx.settings.storage.registry_size, AccessMode::ReadWriteMany);

    let mut secret = ctx.secret(&derived);
    secret.insert(HTTP_SECRET_KEY, ctx.secrets.random_token()?);

    let mut registry = Container::new("registry", &ctx.settings.images.registry, ComponentProfile::Registry.to_requirements());
    registry.ports.push(ContainerPort::new("registry", PORT));
    registry.env.push(EnvVar::secret(HTTP_SECRET_KEY, &name, HTTP_SECRET_KEY));
    registry.volume_mounts.push(VolumeMount::new("registry", DATA_PATH));
    registry.liveness = Some(Probe::http("/", PortRef::Number(PORT), 10));
    registry.readiness = Some(Probe::http("/", PortRef::Number(PORT), 5));

    let mut workload = Workload::single(ctx.meta(&derived), WorkloadKind::Deployment, vec![registry]);
    workload.volumes.push(Volume { name: "registry".to_string(), source: VolumeSource::Claim(name) });

    let ingress = ctx.routing_rule(
        ComponentKind::Registry,
        &derived,
        &ctx.spec.registry.hostname,
        &ctx.spec.registry.annotations,
        PORT,
    );

    let mut resources = vec![
        service,
        ResourceDescriptor::StorageClaim(claim),
        ResourceDescriptor::SecretPayload(secret),
        ResourceDescriptor::Workload(workload),
    ];
    resources.extend(ingress);
    Ok(resources)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
