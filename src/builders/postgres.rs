// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-consumer PostgreSQL database.
//!
//! Produces, in order: service, headless service, credential secret and a
//! single-replica stateful set running postgres with a metrics exporter
//! side process.

use crate::descriptor::{
    AccessMode, Container, ContainerPort, EnvVar, PortRef, Probe, ResourceDescriptor,
    ServicePort, Volume, VolumeMount, VolumeSource, Workload, WorkloadKind,
};
use crate::k8s::ComponentProfile;
use crate::naming::{self, ComponentKind};
use crate::secrets::SecretError;

use super::{BuildContext, CredentialRecord, POSTGRES_PORT};

/// Length of generated database passwords.
pub const PASSWORD_LENGTH: usize = 32;
/// Port of the metrics exporter.
pub const METRICS_PORT: i32 = 9187;

const RUN_VOLUME: &str = "runner";
const DATA_PATH: &str = "/var/lib/postgresql";
const HEALTH_QUERY: &str = "psql -U $POSTGRES_USER -q -c 'SELECT 1'";

/// Fresh credentials for the database serving `sub_component`.
pub fn generate_credentials(
    ctx: &BuildContext<'_>,
    sub_component: &str,
) -> Result<CredentialRecord, SecretError> {
    let derived = ctx.derive(ComponentKind::Postgres, sub_component);
    Ok(CredentialRecord {
        host: derived.name,
        name: sub_component.to_string(),
        user: sub_component.to_string(),
        password: ctx.secrets.random_alphanumeric(PASSWORD_LENGTH)?,
    })
}

/// Descriptors for the database serving `sub_component`, using `credentials`.
pub fn build(
    ctx: &BuildContext<'_>,
    sub_component: &str,
    credentials: &CredentialRecord,
) -> Vec<ResourceDescriptor> {
    let derived = ctx.derive(ComponentKind::Postgres, sub_component);
    let name = derived.name.clone();
    let headless_name = naming::headless(&name);

    let service = ctx.endpoint(
        &derived,
        vec![ServicePort::new("postgres", POSTGRES_PORT as i32, PortRef::named("postgres"))],
    );

    let mut headless = ctx.endpoint(
        &derived,
        vec![ServicePort::new("metrics", METRICS_PORT, PortRef::named("metrics"))],
    );
    if let ResourceDescriptor::NetworkEndpoint(svc) = &mut headless {
        svc.meta.name = headless_name.clone();
        svc.headless = true;
    }

    let mut secret = ctx.secret(&derived);
    credentials.write_to(&mut secret);

    let images = &ctx.settings.images;

    let mut exporter = Container::new("exporter", &images.postgres_exporter, ComponentProfile::PostgresExporter.to_requirements());
    exporter.ports.push(ContainerPort::new("metrics", METRICS_PORT));
    exporter.env.push(EnvVar::secret("POSTGRES_USER", &name, CredentialRecord::KEY_USER));
    exporter.env.push(EnvVar::value(
        "DATA_SOURCE_NAME",
        "user=$(POSTGRES_USER) host=/run/postgresql/ sslmode=disable",
    ));
    exporter.volume_mounts.push(VolumeMount::new(RUN_VOLUME, "/run"));
    exporter.liveness = Some(Probe::http("/", PortRef::named("metrics"), 0));
    exporter.readiness = Some(Probe::http("/", PortRef::named("metrics"), 0));

    let mut postgres = Container::new("postgres", &images.postgres, ComponentProfile::Postgres.to_requirements());
    postgres.ports.push(ContainerPort::new("postgres", POSTGRES_PORT as i32));
    postgres.env = vec![
        EnvVar::value("PGDATA", format!("{}/data", DATA_PATH)),
        EnvVar::secret("POSTGRES_DB", &name, CredentialRecord::KEY_NAME),
        EnvVar::secret("POSTGRES_USER", &name, CredentialRecord::KEY_USER),
        EnvVar::secret("POSTGRES_PASSWORD", &name, CredentialRecord::KEY_PASS),
    ];
    postgres.volume_mounts = vec![VolumeMount::new(RUN_VOLUME, "/run"), VolumeMount::new(&name, DATA_PATH)];
    postgres.liveness = Some(Probe::exec(&["sh", "-c", HEALTH_QUERY], 8));
    postgres.readiness = Some(Probe::exec(&["sh", "-c", HEALTH_QUERY], 4));

    let claim = ctx.claim(&derived, &ctx.settings.storage.postgres_size, AccessMode::ReadWriteOnce);
    let mut workload = Workload::single(
        ctx.meta(&derived),
        WorkloadKind::StatefulSet { service_name: headless_name, volume_claims: vec![claim] },
        vec![exporter, postgres],
    );
    workload.termination_grace_period_seconds = Some(90);
    workload.volumes.push(Volume { name: RUN_VOLUME.to_string(), source: VolumeSource::EmptyDir });

    vec![
        service,
        headless,
        ResourceDescriptor::SecretPayload(secret),
        ResourceDescriptor::Workload(workload),
    ]
}

#[cfg(test)]
#[path = "postgres_tests.rs"]
mod tests;
