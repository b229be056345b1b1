// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tests for the reconciliation pass.

use super::*;
use crate::descriptor::{ObjectMeta, SecretPayload};
use crate::k8s::{GitSpec, VcsSpec};
use crate::secrets::{EntropySource, SecretError};
use crate::store::{Fault, InMemoryStore};
use std::collections::BTreeMap;

/// Resources of a full pass with every hostname set.
const FULL_PASS: usize = 4 + 2 + 5 + 4 + 9 + 5 + 4 + 4;

fn vcs() -> Vcs {
    let mut spec = VcsSpec::default();
    spec.git = GitSpec { hostname: "git.acme.io".to_string(), annotations: BTreeMap::new() };
    spec.ci.hostname = "ci.acme.io".to_string();
    spec.registry.hostname = "reg.acme.io".to_string();
    spec.scanner.hostname = "clair.acme.io".to_string();
    let mut parent = Vcs::new("acme", "forge", spec);
    parent.metadata.uid = Some("0b5e-uid".to_string());
    parent
}

fn reconciler(store: &InMemoryStore) -> Reconciler {
    Reconciler::new(Arc::new(store.clone()), OperatorConfig::default())
}

async fn secret(store: &InMemoryStore, name: &str) -> SecretPayload {
    let found = store.get(ResourceKind::Secret, name, "forge").await.unwrap();
    found.and_then(|d| d.as_secret().cloned()).unwrap()
}

#[tokio::test]
async fn test_first_pass_creates_everything() {
    let store = InMemoryStore::new();
    let report = reconciler(&store).reconcile(&vcs()).await.unwrap();

    assert_eq!(report.entries.len(), FULL_PASS);
    assert_eq!(report.created(), FULL_PASS);
    assert_eq!(report.already_present(), 0);
    assert_eq!(store.len().await, FULL_PASS);
    assert!(report.finished_at >= report.started_at);
    assert_eq!(report.instance, InstanceIdentity::new("acme", "forge"));
    assert!(report.skipped.is_empty());
}

#[tokio::test]
async fn test_second_pass_creates_nothing() {
    let store = InMemoryStore::new();
    let reconciler = reconciler(&store);
    reconciler.reconcile(&vcs()).await.unwrap();
    let second = reconciler.reconcile(&vcs()).await.unwrap();

    assert_eq!(second.created(), 0);
    assert_eq!(second.already_present(), FULL_PASS);
    assert_eq!(store.created().await.len(), FULL_PASS);
}

#[tokio::test]
async fn test_component_order() {
    let store = InMemoryStore::new();
    reconciler(&store).reconcile(&vcs()).await.unwrap();
    let created = store.created().await;

    let first_index = |name: &str| created.iter().position(|(_, n)| n == name).unwrap();
    let order = [
        "acme-gitea-gitifold-postgres",
        "acme-gitea-gitifold-keydb",
        "acme-vcs-gitifold-gitea",
        "acme-drone-gitifold-postgres",
        "acme-app-gitifold-drone",
        "acme-runner-gitifold-drone",
        "acme-containers-gitifold-registry",
        "acme-clair-gitifold-postgres",
        "acme-scanner-gitifold-clair",
    ];
    let positions: Vec<usize> = order.iter().map(|n| first_index(n)).collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted);
}

#[tokio::test]
async fn test_children_are_owned_by_parent() {
    let store = InMemoryStore::new();
    reconciler(&store).reconcile(&vcs()).await.unwrap();
    for object in store.created_objects().await {
        let owner = object.meta().owner.clone().unwrap();
        assert_eq!(owner.name, "acme");
        assert_eq!(owner.uid.as_deref(), Some("0b5e-uid"));
        assert!(owner.controller);
    }
}

#[tokio::test]
async fn test_credentials_propagate_downstream() {
    let store = InMemoryStore::new();
    reconciler(&store).reconcile(&vcs()).await.unwrap();

    let gitea_db = secret(&store, "acme-gitea-gitifold-postgres").await;
    let gitea = secret(&store, "acme-vcs-gitifold-gitea").await;
    let ini = gitea.get_str("app.ini").unwrap();
    let passwd = format!("PASSWD   = {}\n", gitea_db.get_str("db_pass").unwrap());
    assert!(ini.contains(&passwd));

    let drone_db = secret(&store, "acme-drone-gitifold-postgres").await;
    let drone = secret(&store, "acme-app-gitifold-drone").await;
    let datasource = drone.get_str("DRONE_DATABASE_DATASOURCE").unwrap();
    assert!(datasource.contains(drone_db.get_str("db_pass").unwrap()));
    assert_eq!(drone.get_str("DRONE_GITEA_CLIENT_ID"), gitea.get_str("oauth_client_id"));
    assert_eq!(drone.get_str("DRONE_GITEA_CLIENT_SECRET"), gitea.get_str("oauth_client_secret"));

    let clair_db = secret(&store, "acme-clair-gitifold-postgres").await;
    let clair = secret(&store, "acme-scanner-gitifold-clair").await;
    assert!(clair
        .get_str("config.yaml")
        .unwrap()
        .contains(clair_db.get_str("db_pass").unwrap()));
}

#[tokio::test]
async fn test_existing_database_credentials_are_adopted() {
    let store = InMemoryStore::new();
    let mut stored = SecretPayload::new(ObjectMeta::new("acme-gitea-gitifold-postgres", "forge", BTreeMap::new()));
    stored.insert("db_host", "acme-gitea-gitifold-postgres");
    stored.insert("db_name", "gitea");
    stored.insert("db_user", "gitea");
    stored.insert("db_pass", "initialisedWithThis");
    store.preload(ResourceDescriptor::SecretPayload(stored)).await;

    let report = reconciler(&store).reconcile(&vcs()).await.unwrap();
    assert_eq!(report.already_present(), 1);

    let gitea = secret(&store, "acme-vcs-gitifold-gitea").await;
    assert!(gitea.get_str("app.ini").unwrap().contains("PASSWD   = initialisedWithThis\n"));
}

#[tokio::test]
async fn test_existing_forge_client_is_adopted() {
    let store = InMemoryStore::new();
    let mut stored = SecretPayload::new(ObjectMeta::new("acme-vcs-gitifold-gitea", "forge", BTreeMap::new()));
    stored.insert("app.ini", "APP_NAME = acme Git\n");
    stored.insert("oauth_client_id", "existing-client");
    stored.insert("oauth_client_secret", "existing-secret");
    store.preload(ResourceDescriptor::SecretPayload(stored)).await;

    reconciler(&store).reconcile(&vcs()).await.unwrap();
    let drone = secret(&store, "acme-app-gitifold-drone").await;
    assert_eq!(drone.get_str("DRONE_GITEA_CLIENT_ID"), Some("existing-client"));
    assert_eq!(drone.get_str("DRONE_GITEA_SERVER"), Some("https://git.acme.io"));
}

/// Log sink shared with the test thread's subscriber.
#[derive(Clone, Default)]
struct CapturedLogs(Arc<std::sync::Mutex<Vec<u8>>>);

impl std::io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl CapturedLogs {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

#[tokio::test]
async fn test_forge_secret_without_client_warns() {
    let logs = CapturedLogs::default();
    let sink = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || sink.clone())
        .with_ansi(false)
        .finish();
    let _guard = tracing::subscriber::set_default(subscriber);

    let store = InMemoryStore::new();
    let mut stored = SecretPayload::new(ObjectMeta::new("acme-vcs-gitifold-gitea", "forge", BTreeMap::new()));
    stored.insert("app.ini", "APP_NAME = acme Git\n");
    store.preload(ResourceDescriptor::SecretPayload(stored)).await;

    reconciler(&store).reconcile(&vcs()).await.unwrap();

    let output = logs.text();
    assert!(output.contains("WARN"), "{}", output);
    assert!(output.contains("Stored forge secret has no OAuth2 client"), "{}", output);
    let drone = secret(&store, "acme-app-gitifold-drone").await;
    assert!(uuid::Uuid::parse_str(drone.get_str("DRONE_GITEA_CLIENT_ID").unwrap()).is_ok());
}

#[tokio::test]
async fn test_agola_skips_ci_components() {
    let store = InMemoryStore::new();
    let mut parent = vcs();
    parent.spec.ci.system = CiSystem::Agola;
    let report = reconciler(&store).reconcile(&parent).await.unwrap();

    assert_eq!(report.skipped, vec!["ci:agola"]);
    assert_eq!(report.created(), FULL_PASS - 4 - 9);
    let created = store.created().await;
    assert!(created.iter().all(|(_, name)| !name.contains("drone")));
    assert!(created.iter().any(|(_, name)| name == "acme-scanner-gitifold-clair"));
}

#[tokio::test]
async fn test_race_already_exists_is_success() {
    let store = InMemoryStore::with_fault(ResourceKind::Deployment, Fault::RaceCreate);
    let report = reconciler(&store).reconcile(&vcs()).await.unwrap();

    let deployments: Vec<&ReportEntry> = report
        .entries
        .iter()
        .filter(|e| e.kind == ResourceKind::Deployment)
        .collect();
    assert_eq!(deployments.len(), 6);
    assert!(deployments.iter().all(|e| e.outcome == Outcome::AlreadyPresent));
    assert_eq!(report.entries.len(), FULL_PASS);
}

#[tokio::test]
async fn test_lookup_failure_aborts_pass() {
    let store = InMemoryStore::with_fault(ResourceKind::Ingress, Fault::FailGet("api down".into()));
    let err = reconciler(&store).reconcile(&vcs()).await.unwrap_err();

    match err {
        ReconcileError::Lookup { kind, name, source } => {
            assert_eq!(kind, ResourceKind::Ingress);
            assert_eq!(name, "acme-vcs-gitifold-gitea");
            assert_eq!(source, StoreError::Backend("api down".to_string()));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    // Earlier resources stay; nothing after the failure is created.
    let created = store.created().await;
    assert_eq!(created.len(), 4 + 2 + 3);
    assert!(!created.iter().any(|(kind, _)| *kind == ResourceKind::Ingress));
    assert!(!created.iter().any(|(_, name)| name.contains("drone")));
}

#[tokio::test]
async fn test_create_failure_aborts_pass() {
    let store = InMemoryStore::with_fault(ResourceKind::StatefulSet, Fault::FailCreate("quota".into()));
    let err = reconciler(&store).reconcile(&vcs()).await.unwrap_err();
    assert!(matches!(
        err,
        ReconcileError::Create { kind: ResourceKind::StatefulSet, .. }
    ));
    assert_eq!(store.created().await.len(), 3);
}

struct DeadEntropy;

impl EntropySource for DeadEntropy {
    fn fill(&self, _buf: &mut [u8]) -> Result<(), SecretError> {
        Err(SecretError::EntropyUnavailable("no device".to_string()))
    }
}

#[tokio::test]
async fn test_entropy_failure_is_fatal() {
    let store = InMemoryStore::new();
    let reconciler = reconciler(&store).with_secrets(SecretGenerator::with_source(Arc::new(DeadEntropy)));
    let err = reconciler.reconcile(&vcs()).await.unwrap_err();
    assert!(matches!(err, ReconcileError::Secret(SecretError::EntropyUnavailable(_))));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn test_ensure_reports_outcome() {
    let store = InMemoryStore::new();
    let parent = vcs();
    let mut ctx = ReconcileContext::new(&store, &parent);
    let account = ResourceDescriptor::AccessIdentity(crate::descriptor::AccessIdentity {
        meta: ObjectMeta::new("sa", "forge", BTreeMap::new()),
    });

    assert_eq!(ctx.ensure(account.clone()).await.unwrap(), Outcome::Created);
    assert_eq!(ctx.ensure(account).await.unwrap(), Outcome::AlreadyPresent);
    assert_eq!(ctx.identity().name, "acme");
}
