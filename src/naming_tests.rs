// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tests for name and label derivation.

use super::*;
use std::collections::HashSet;

fn acme() -> InstanceIdentity {
    InstanceIdentity::new("acme", "forge")
}

fn is_dns_label(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= MAX_NAME_LENGTH
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !name.starts_with('-')
        && !name.ends_with('-')
}

#[test]
fn test_derive_name_layout() {
    let derived = derive(&acme(), ComponentKind::Postgres, "gitea");
    assert_eq!(derived.name, "acme-gitea-gitifold-postgres");
}

#[test]
fn test_derive_labels() {
    let derived = derive(&acme(), ComponentKind::Drone, "runner");
    assert_eq!(derived.labels.get(LABEL_NAME).map(String::as_str), Some("drone"));
    assert_eq!(derived.labels.get(LABEL_COMPONENT).map(String::as_str), Some("runner"));
    assert_eq!(derived.labels.get(LABEL_PART_OF).map(String::as_str), Some(PRODUCT));
    assert_eq!(derived.labels.get(LABEL_INSTANCE).map(String::as_str), Some("acme"));
    assert_eq!(derived.labels.get(LABEL_MANAGED_BY).map(String::as_str), Some(MANAGED_BY));
}

#[test]
fn test_derive_is_deterministic() {
    let a = derive(&acme(), ComponentKind::Gitea, "vcs");
    let b = derive(&acme(), ComponentKind::Gitea, "vcs");
    assert_eq!(a, b);
}

#[test]
fn test_derive_injective_over_sub_component() {
    let subs = ["gitea", "drone", "clair", "app", "runner", "vcs", "containers", "scanner"];
    let kinds = [
        ComponentKind::Postgres,
        ComponentKind::KeyDb,
        ComponentKind::Gitea,
        ComponentKind::Drone,
        ComponentKind::Registry,
        ComponentKind::Clair,
    ];
    for kind in kinds {
        let names: HashSet<String> = subs.iter().map(|s| derive(&acme(), kind, s).name).collect();
        assert_eq!(names.len(), subs.len(), "collision for {}", kind);
    }
}

#[test]
fn test_long_names_truncated_and_distinct() {
    let long = InstanceIdentity::new("a".repeat(80), "forge");
    let app = derive(&long, ComponentKind::Drone, "app");
    let runner = derive(&long, ComponentKind::Drone, "runner");
    assert!(is_dns_label(&app.name), "{}", app.name);
    assert!(is_dns_label(&runner.name), "{}", runner.name);
    assert_eq!(app.name.len(), MAX_NAME_LENGTH);
    assert_ne!(app.name, runner.name);
}

#[test]
fn test_long_instance_label_value_bounded() {
    let long = InstanceIdentity::new("b".repeat(100), "forge");
    let derived = derive(&long, ComponentKind::KeyDb, "gitea");
    let instance = derived.labels.get(LABEL_INSTANCE).unwrap();
    assert!(instance.len() <= MAX_NAME_LENGTH);
}

#[test]
fn test_names_are_normalised() {
    let odd = InstanceIdentity::new("My_Forge.Prod", "forge");
    let derived = derive(&odd, ComponentKind::Registry, "containers");
    assert!(derived.name.starts_with("my-forge-prod-containers-gitifold-registry-"));
    assert_eq!(derived.name.len(), "my-forge-prod-containers-gitifold-registry-".len() + 8);
    assert!(is_dns_label(&derived.name));
}

#[test]
fn test_rewritten_sub_components_do_not_collide() {
    let pairs = [("a.b", "a-b"), ("Vcs", "vcs"), ("a_b", "a.b"), ("-app", "app")];
    for (left, right) in pairs {
        let a = derive(&acme(), ComponentKind::Gitea, left).name;
        let b = derive(&acme(), ComponentKind::Gitea, right).name;
        assert_ne!(a, b, "{} and {} share a name", left, right);
        assert!(is_dns_label(&a), "{}", a);
        assert!(is_dns_label(&b), "{}", b);
    }
}

#[test]
fn test_valid_labels_pass_through() {
    assert_eq!(dns_label("acme-vcs-gitifold-gitea"), "acme-vcs-gitifold-gitea");
    assert_eq!(dns_label(&"x".repeat(MAX_NAME_LENGTH)), "x".repeat(MAX_NAME_LENGTH));
}

#[test]
fn test_dns_label_never_empty() {
    for raw in ["---", ""] {
        let label = dns_label(raw);
        assert!(label.starts_with(PRODUCT), "{}", label);
        assert!(is_dns_label(&label), "{}", label);
    }
    assert_ne!(dns_label("---"), dns_label(""));
}

#[test]
fn test_auxiliary_names() {
    let name = derive(&acme(), ComponentKind::Postgres, "drone").name;
    assert_eq!(headless(&name), "acme-drone-gitifold-postgres-headless");
    assert_eq!(tls_secret_name(&acme(), ComponentKind::Gitea), "acme-gitea-ingress-tls");
    assert_eq!(service_host(&name, "forge"), "acme-drone-gitifold-postgres.forge.svc");
}

#[test]
fn test_truncated_headless_name_valid() {
    let long = InstanceIdentity::new("c".repeat(50), "forge");
    let name = derive(&long, ComponentKind::Postgres, "gitea").name;
    let headless_name = headless(&name);
    assert!(is_dns_label(&headless_name));
    assert_ne!(headless_name, name);
}
