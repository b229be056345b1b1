// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Dependency-ordered reconciliation of one `VCS` instance.
//!
//! A pass walks the components in a fixed order:
//! Postgres(gitea), KeyDB(gitea), Gitea, Postgres(drone), Drone, Registry,
//! Postgres(clair), Clair. Each descriptor is owner-linked, looked up and
//! created when missing. Existing objects are left untouched; an
//! already-exists reply to create counts as success.
//!
//! Records produced upstream (database credentials, the cache endpoint,
//! the forge's OAuth2 client) are threaded downstream within the pass and
//! never cached across passes. When a database secret already exists its
//! stored credentials are adopted so downstream configuration matches what
//! the database was initialised with.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{Instrument, Span};

use crate::builders::{
    clair, drone, gitea, keydb, postgres, registry, BuildContext, CacheEndpoint, CredentialRecord,
    ForgeIdentity,
};
use crate::config::OperatorConfig;
use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::error::ReconcileError;
use crate::k8s::{CiSystem, InstanceIdentity, Vcs};
use crate::naming::ComponentKind;
use crate::secrets::SecretGenerator;
use crate::store::{ResourceStore, StoreError};

/// What happened to one desired resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Created,
    AlreadyPresent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportEntry {
    pub kind: ResourceKind,
    pub name: String,
    pub outcome: Outcome,
}

/// Result of a successful pass.
#[derive(Debug, Clone, Serialize)]
pub struct ReconcileReport {
    pub instance: InstanceIdentity,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Every desired resource, in application order.
    pub entries: Vec<ReportEntry>,
    /// Components deliberately not provisioned.
    pub skipped: Vec<String>,
}

impl ReconcileReport {
    pub fn created(&self) -> usize {
        self.count(Outcome::Created)
    }

    pub fn already_present(&self) -> usize {
        self.count(Outcome::AlreadyPresent)
    }

    fn count(&self, outcome: Outcome) -> usize {
        self.entries.iter().filter(|e| e.outcome == outcome).count()
    }
}

/// Per-pass state: the store handle, the parent, and the pass span.
pub struct ReconcileContext<'a> {
    store: &'a dyn ResourceStore,
    parent: &'a Vcs,
    identity: InstanceIdentity,
    span: Span,
    entries: Vec<ReportEntry>,
    skipped: Vec<String>,
}

impl<'a> ReconcileContext<'a> {
    pub fn new(store: &'a dyn ResourceStore, parent: &'a Vcs) -> Self {
        let identity = parent.identity();
        let span = tracing::info_span!(
            "reconcile",
            instance = %identity.name,
            namespace = %identity.namespace
        );
        Self { store, parent, identity, span, entries: Vec::new(), skipped: Vec::new() }
    }

    pub fn identity(&self) -> &InstanceIdentity {
        &self.identity
    }

    pub fn span(&self) -> &Span {
        &self.span
    }

    /// Owner-link, look up, and create `descriptor` when it does not exist.
    pub async fn ensure(&mut self, mut descriptor: ResourceDescriptor) -> Result<Outcome, ReconcileError> {
        let kind = descriptor.kind();
        let name = descriptor.name().to_string();
        let namespace = descriptor.namespace().to_string();

        self.store
            .set_owner(&mut descriptor, self.parent)
            .map_err(|source| ReconcileError::Owner { kind, name: name.clone(), source })?;

        let found = self
            .store
            .get(kind, &name, &namespace)
            .await
            .map_err(|source| ReconcileError::Lookup { kind, name: name.clone(), source })?;

        let outcome = if found.is_some() {
            tracing::info!(%kind, %name, "Skip reconcile: already exists");
            Outcome::AlreadyPresent
        } else {
            tracing::info!(%kind, %name, "Creating resource");
            match self.store.create(&descriptor).await {
                Ok(()) => Outcome::Created,
                Err(StoreError::AlreadyExists { .. }) => {
                    tracing::info!(%kind, %name, "Created concurrently by another writer");
                    Outcome::AlreadyPresent
                }
                Err(source) => return Err(ReconcileError::Create { kind, name, source }),
            }
        };

        self.entries.push(ReportEntry { kind, name, outcome });
        Ok(outcome)
    }

    /// Ensure every descriptor, in order, stopping at the first failure.
    pub async fn apply(&mut self, resources: Vec<ResourceDescriptor>) -> Result<(), ReconcileError> {
        for descriptor in resources {
            self.ensure(descriptor).await?;
        }
        Ok(())
    }

    /// Stored secret `name` in the instance namespace, if any.
    async fn stored_secret(&self, name: &str) -> Result<Option<ResourceDescriptor>, ReconcileError> {
        self.store
            .get(ResourceKind::Secret, name, &self.identity.namespace)
            .await
            .map_err(|source| ReconcileError::Lookup {
                kind: ResourceKind::Secret,
                name: name.to_string(),
                source,
            })
    }

    fn finish(self, started_at: DateTime<Utc>) -> ReconcileReport {
        ReconcileReport {
            instance: self.identity,
            started_at,
            finished_at: Utc::now(),
            entries: self.entries,
            skipped: self.skipped,
        }
    }
}

/// Runs reconciliation passes against one store.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn ResourceStore>,
    settings: Arc<OperatorConfig>,
    secrets: SecretGenerator,
}

impl Reconciler {
    pub fn new(store: Arc<dyn ResourceStore>, settings: OperatorConfig) -> Self {
        Self { store, settings: Arc::new(settings), secrets: SecretGenerator::new() }
    }

    /// Replace the secret generator, e.g. with one drawing from a test source.
    pub fn with_secrets(mut self, secrets: SecretGenerator) -> Self {
        self.secrets = secrets;
        self
    }

    /// One full pass over `parent`.
    pub async fn reconcile(&self, parent: &Vcs) -> Result<ReconcileReport, ReconcileError> {
        let started_at = Utc::now();
        let mut ctx = ReconcileContext::new(self.store.as_ref(), parent);
        let span = ctx.span().clone();

        async move {
            let identity = ctx.identity().clone();
            let build = BuildContext {
                identity: &identity,
                spec: &parent.spec,
                settings: &self.settings,
                secrets: &self.secrets,
                now: started_at,
            };
            tracing::info!("Reconciling instance");

            self.run(&mut ctx, &build).await?;

            let report = ctx.finish(started_at);
            tracing::info!(
                created = report.created(),
                already_present = report.already_present(),
                "Reconcile pass complete"
            );
            Ok(report)
        }
        .instrument(span)
        .await
    }

    async fn run(&self, ctx: &mut ReconcileContext<'_>, build: &BuildContext<'_>) -> Result<(), ReconcileError> {
        let gitea_db = ensure_database(ctx, build, "gitea").await?;
        let cache = ensure_cache(ctx, build).await?;
        let forge = ensure_forge(ctx, build, &gitea_db, &cache).await?;

        match build.spec.ci.system {
            CiSystem::Drone => {
                let drone_db = ensure_database(ctx, build, "drone").await?;
                ctx.apply(drone::build(build, &forge, &drone_db)?).await?;
            }
            CiSystem::Agola => {
                tracing::warn!(system = "agola", "CI system has no builder; skipping CI components");
                ctx.skipped.push(format!("ci:{}", CiSystem::Agola.as_str()));
            }
        }

        ctx.apply(registry::build(build)?).await?;

        let clair_db = ensure_database(ctx, build, "clair").await?;
        ctx.apply(clair::build(build, &clair_db)?).await?;
        Ok(())
    }
}

/// Apply the database serving `sub_component`, adopting stored credentials.
async fn ensure_database(
    ctx: &mut ReconcileContext<'_>,
    build: &BuildContext<'_>,
    sub_component: &str,
) -> Result<CredentialRecord, ReconcileError> {
    let secret_name = build.derive(ComponentKind::Postgres, sub_component).name;
    let stored = ctx.stored_secret(&secret_name).await?;

    let adopted = stored
        .as_ref()
        .and_then(ResourceDescriptor::as_secret)
        .and_then(CredentialRecord::from_secret);
    let record = match adopted {
        Some(record) => {
            tracing::info!(name = %secret_name, "Adopting stored database credentials");
            record
        }
        None => {
            if stored.is_some() {
                tracing::warn!(name = %secret_name, "Stored database secret is incomplete; generating new credentials");
            }
            postgres::generate_credentials(build, sub_component)?
        }
    };

    ctx.apply(postgres::build(build, sub_component, &record)).await?;
    Ok(record)
}

async fn ensure_cache(
    ctx: &mut ReconcileContext<'_>,
    build: &BuildContext<'_>,
) -> Result<CacheEndpoint, ReconcileError> {
    let built = keydb::build(build, "gitea");
    ctx.apply(built.resources).await?;
    Ok(built.record)
}

/// Apply the forge; the OAuth2 client of an existing forge secret wins.
async fn ensure_forge(
    ctx: &mut ReconcileContext<'_>,
    build: &BuildContext<'_>,
    database: &CredentialRecord,
    cache: &CacheEndpoint,
) -> Result<ForgeIdentity, ReconcileError> {
    let secret_name = build.derive(ComponentKind::Gitea, gitea::SUB_COMPONENT).name;
    let stored = ctx.stored_secret(&secret_name).await?;
    let adopted = stored
        .as_ref()
        .and_then(ResourceDescriptor::as_secret)
        .and_then(|secret| gitea::identity_from_secret(build, secret));

    if stored.is_some() && adopted.is_none() {
        tracing::warn!(
            name = %secret_name,
            "Stored forge secret has no OAuth2 client; CI gets a client the forge does not know"
        );
    }

    let built = gitea::build(build, database, cache)?;
    ctx.apply(built.resources).await?;

    Ok(match adopted {
        Some(identity) => {
            tracing::info!(name = %secret_name, "Adopting stored forge OAuth2 client");
            identity
        }
        None => built.record,
    })
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
