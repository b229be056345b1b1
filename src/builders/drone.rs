// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Drone CI server and its Kubernetes runner.
//!
//! Server: service, ingress, secret, deployment. Runner: service, service
//! account, role, role binding, deployment. Both processes take their
//! settings from the server secret.

use crate::descriptor::{
    AccessBinding, AccessIdentity, AccessRole, Container, ContainerPort, EnvVar, PolicyRule,
    PortRef, Probe, ResourceDescriptor, ServicePort, Volume, VolumeMount, VolumeSource, Workload,
    WorkloadKind,
};
use crate::k8s::ComponentProfile;
use crate::naming::{self, ComponentKind};
use crate::secrets::SecretError;

use super::{BuildContext, CredentialRecord, ForgeIdentity};

pub const SERVER_SUB_COMPONENT: &str = "app";
pub const RUNNER_SUB_COMPONENT: &str = "runner";
/// Length of the shared server/runner RPC secret.
pub const RPC_SECRET_LENGTH: usize = 16;

const SERVER_HTTP_PORT: i32 = 80;
const SERVER_GRPC_PORT: i32 = 9000;
const RUNNER_HTTP_PORT: i32 = 3000;
const RUNNER_SERVICE_PORT: i32 = 8080;

/// Every descriptor of the CI system, server first.
pub fn build(
    ctx: &BuildContext<'_>,
    forge: &ForgeIdentity,
    database: &CredentialRecord,
) -> Result<Vec<ResourceDescriptor>, SecretError> {
    let mut resources = build_server(ctx, forge, database)?;
    resources.extend(build_runner(ctx));
    Ok(resources)
}

fn build_server(
    ctx: &BuildContext<'_>,
    forge: &ForgeIdentity,
    database: &CredentialRecord,
) -> Result<Vec<ResourceDescriptor>, SecretError> {
    let derived = ctx.derive(ComponentKind::Drone, SERVER_SUB_COMPONENT);
    let name = derived.name.clone();

    let service = ctx.endpoint(
        &derived,
        vec![ServicePort::new("http", SERVER_HTTP_PORT, PortRef::named("http"))],
    );
    let ingress = ctx.routing_rule(
        ComponentKind::Drone,
        &derived,
        &ctx.spec.ci.hostname,
        &ctx.spec.ci.annotations,
        SERVER_HTTP_PORT,
    );

    let server_host = if ctx.spec.ci.hostname.is_empty() {
        naming::service_host(&name, ctx.namespace())
    } else {
        ctx.spec.ci.hostname.clone()
    };

    let mut secret = ctx.secret(&derived);
    secret.insert("DRONE_RPC_SECRET", ctx.secrets.random_alphanumeric(RPC_SECRET_LENGTH)?);
    secret.insert("DRONE_RPC_HOST", format!("{}:{}", name, SERVER_HTTP_PORT));
    secret.insert("DRONE_RPC_PROTO", "http");
    secret.insert("DRONE_SERVER_HOST", server_host);
    secret.insert("DRONE_SERVER_PROTO", "https");
    secret.insert("DRONE_GITEA_SERVER", forge.server_url.as_str());
    secret.insert("DRONE_GITEA_CLIENT_ID", forge.client_id.as_str());
    secret.insert("DRONE_GITEA_CLIENT_SECRET", forge.client_secret.as_str());
    secret.insert("DRONE_DATABASE_DRIVER", "postgres");
    secret.insert("DRONE_DATABASE_DATASOURCE", database.datasource(ctx.namespace()));
    secret.insert("DRONE_USER_CREATE", "username:gitea,machine:false,admin:true");

    let mut server = Container::new("server", &ctx.settings.images.drone, ComponentProfile::DroneServer.to_requirements());
    server.ports = vec![
        ContainerPort::new("http", SERVER_HTTP_PORT),
        ContainerPort::new("grpc", SERVER_GRPC_PORT),
    ];
    server.env_from_secrets.push(name.clone());
    server.volume_mounts.push(VolumeMount::new("storage-volume", "/data"));
    server.liveness = Some(Probe::http("/", PortRef::named("http"), 10));
    server.readiness = Some(Probe::http("/", PortRef::named("http"), 5));

    let mut workload = Workload::single(ctx.meta(&derived), WorkloadKind::Deployment, vec![server]);
    workload.volumes.push(Volume { name: "storage-volume".to_string(), source: VolumeSource::EmptyDir });

    let mut resources = vec![service];
    resources.extend(ingress);
    resources.push(ResourceDescriptor::SecretPayload(secret));
    resources.push(ResourceDescriptor::Workload(workload));
    Ok(resources)
}

fn build_runner(ctx: &BuildContext<'_>) -> Vec<ResourceDescriptor> {
    let derived = ctx.derive(ComponentKind::Drone, RUNNER_SUB_COMPONENT);
    let name = derived.name.clone();
    let server_secret = ctx.derive(ComponentKind::Drone, SERVER_SUB_COMPONENT).name;

    let service = ctx.endpoint(
        &derived,
        vec![ServicePort::new("http", RUNNER_SERVICE_PORT, PortRef::named("http"))],
    );
    let account = AccessIdentity { meta: ctx.meta(&derived) };
    let role = AccessRole {
        meta: ctx.meta(&derived),
        rules: vec![
            PolicyRule::core(&["secrets"], &["create", "delete"]),
            PolicyRule::core(
                &["pods", "pods/log"],
                &["get", "create", "delete", "list", "watch", "update"],
            ),
        ],
    };
    let binding = AccessBinding {
        meta: ctx.meta(&derived),
        role: name.clone(),
        subject: name.clone(),
    };

    let mut runner = Container::new("runner", &ctx.settings.images.drone_runner, ComponentProfile::DroneRunner.to_requirements());
    runner.ports.push(ContainerPort::new("http", RUNNER_HTTP_PORT));
    runner.env_from_secrets.push(server_secret);
    runner.env.push(EnvVar::value("DRONE_NAMESPACE_DEFAULT", ctx.namespace()));
    runner.env.push(EnvVar::value("DRONE_RUNNER_CAPACITY", "2"));
    runner.liveness = Some(Probe::http("/", PortRef::named("http"), 10));
    runner.readiness = Some(Probe::http("/", PortRef::named("http"), 5));

    let mut workload = Workload::single(ctx.meta(&derived), WorkloadKind::Deployment, vec![runner]);
    workload.service_account = Some(name);

    vec![
        service,
        ResourceDescriptor::AccessIdentity(account),
        ResourceDescriptor::AccessRole(role),
        ResourceDescriptor::AccessBinding(binding),
        ResourceDescriptor::Workload(workload),
    ]
}

#[cfg(test)]
#[path = "drone_tests.rs"]
mod tests;
