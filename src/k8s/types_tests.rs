// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tests for the VCS CRD types.

use super::*;

const ACME_YAML: &str = r#"
apiVersion: gitifold.hyperspike.io/v1beta1
kind: VCS
metadata:
  name: acme
  namespace: forge
spec:
  domain: acme.io
  git:
    hostname: git.acme.io
    annotations:
      cert-manager.io/cluster-issuer: letsencrypt
  ci:
    hostname: ci.acme.io
    system: drone
  registry:
    hostname: reg.acme.io
  clair:
    hostname: scan.acme.io
"#;

#[test]
fn test_deserialize_full_yaml() {
    let vcs: Vcs = serde_yaml::from_str(ACME_YAML).unwrap();
    assert_eq!(vcs.metadata.name, "acme");
    assert_eq!(vcs.spec.domain, "acme.io");
    assert_eq!(vcs.spec.git.hostname, "git.acme.io");
    assert_eq!(
        vcs.spec.git.annotations.get("cert-manager.io/cluster-issuer").map(String::as_str),
        Some("letsencrypt")
    );
    assert_eq!(vcs.spec.ci.system, CiSystem::Drone);
    assert_eq!(vcs.spec.registry.hostname, "reg.acme.io");
    assert_eq!(vcs.spec.scanner.hostname, "scan.acme.io");
}

#[test]
fn test_scanner_alias_accepted() {
    let json = r#"{"metadata":{"name":"x"},"spec":{"scanner":{"hostname":"scan.x.io"}}}"#;
    let vcs: Vcs = serde_json::from_str(json).unwrap();
    assert_eq!(vcs.spec.scanner.hostname, "scan.x.io");
}

#[test]
fn test_defaults_for_missing_fields() {
    let vcs: Vcs = serde_json::from_str(r#"{"metadata":{"name":"bare"}}"#).unwrap();
    assert_eq!(vcs.api_version, API_VERSION);
    assert_eq!(vcs.kind, KIND);
    assert_eq!(vcs.spec, VcsSpec::default());
    assert_eq!(vcs.spec.ci.system, CiSystem::Drone);
}

#[test]
fn test_ci_system_lowercase() {
    let spec: CiSpec = serde_json::from_str(r#"{"system":"agola"}"#).unwrap();
    assert_eq!(spec.system, CiSystem::Agola);
    assert_eq!(spec.system.as_str(), "agola");
    assert!(serde_json::from_str::<CiSpec>(r#"{"system":"jenkins"}"#).is_err());
}

#[test]
fn test_identity_defaults_namespace() {
    let mut vcs = Vcs::new("acme", "", VcsSpec::default());
    assert_eq!(vcs.identity(), InstanceIdentity::new("acme", DEFAULT_NAMESPACE));

    vcs.metadata.namespace = Some("forge".to_string());
    assert_eq!(vcs.identity().namespace, "forge");
    assert_eq!(vcs.identity().to_string(), "forge/acme");
}

#[test]
fn test_owner_reference_is_controller() {
    let mut vcs = Vcs::new("acme", "forge", VcsSpec::default());
    vcs.metadata.uid = Some("1234".to_string());
    let owner = OwnerReference::controller_of(&vcs);
    assert_eq!(owner.kind, KIND);
    assert_eq!(owner.api_version, API_VERSION);
    assert_eq!(owner.uid.as_deref(), Some("1234"));
    assert!(owner.controller);
    assert!(owner.block_owner_deletion);

    let json = serde_json::to_string(&owner).unwrap();
    assert!(json.contains("\"blockOwnerDeletion\":true"));
}

#[test]
fn test_serialize_uses_clair_key() {
    let mut spec = VcsSpec::default();
    spec.scanner.hostname = "scan.acme.io".to_string();
    let json = serde_json::to_string(&spec).unwrap();
    assert!(json.contains("\"clair\""));
    assert!(!json.contains("\"scanner\""));
}
