// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! KeyDB cache used by Gitea for sessions and caching.

use crate::descriptor::{
    Container, ContainerPort, PortRef, Probe, ResourceDescriptor, ServicePort, Workload,
    WorkloadKind,
};
use crate::k8s::ComponentProfile;
use crate::naming::{self, ComponentKind};

use super::{BuildContext, Built, CacheEndpoint, KEYDB_PORT};

const PING: &str = "keydb-cli -h $(hostname) ping";

/// Service and deployment of the cache serving `sub_component`.
pub fn build(ctx: &BuildContext<'_>, sub_component: &str) -> Built<CacheEndpoint> {
    let derived = ctx.derive(ComponentKind::KeyDb, sub_component);

    let service = ctx.endpoint(
        &derived,
        vec![ServicePort::new("redis", KEYDB_PORT as i32, PortRef::named("redis"))],
    );

    let mut keydb = Container::new("keydb", &ctx.settings.images.keydb, ComponentProfile::KeyDb.to_requirements());
    keydb.ports.push(ContainerPort::new("redis", KEYDB_PORT as i32));
    keydb.liveness = Some(Probe::exec(&["sh", "-c", PING], 8));
    keydb.readiness = Some(Probe::exec(&["sh", "-c", PING], 5));

    let workload = Workload::single(ctx.meta(&derived), WorkloadKind::Deployment, vec![keydb]);

    let record = CacheEndpoint {
        host: naming::service_host(&derived.name, ctx.namespace()),
        port: KEYDB_PORT,
    };
    Built {
        resources: vec![service, ResourceDescriptor::Workload(workload)],
        record,
    }
}

#[cfg(test)]
#[path = "keydb_tests.rs"]
mod tests;
