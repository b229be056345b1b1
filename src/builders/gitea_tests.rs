// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Tests for the Gitea builder and its rendered `app.ini`.

use super::*;
use crate::builders::test_support::{credentials, only_secret, Fixture};
use crate::builders::KEYDB_PORT;
use crate::descriptor::ResourceKind;
use crate::render::Template;
use crate::secrets::decode_token;

fn cache() -> CacheEndpoint {
    CacheEndpoint { host: "acme-gitea-gitifold-keydb.forge.svc".to_string(), port: KEYDB_PORT }
}

fn app_ini(resources: &[ResourceDescriptor]) -> String {
    only_secret(resources).get_str(CONFIG_KEY).unwrap().to_string()
}

/// Value of `key` inside `[section]`.
fn ini_value(ini: &str, section: &str, key: &str) -> Option<String> {
    let mut current = String::new();
    for line in ini.lines() {
        let line = line.trim();
        if let Some(name) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            current = name.to_string();
            continue;
        }
        if current == section {
            if let Some((k, v)) = line.split_once('=') {
                if k.trim() == key {
                    return Some(v.trim().to_string());
                }
            }
        }
    }
    None
}

#[test]
fn test_resource_order() {
    let fixture = Fixture::acme();
    let built = build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap();
    let kinds: Vec<ResourceKind> = built.resources.iter().map(|r| r.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            ResourceKind::Secret,
            ResourceKind::Service,
            ResourceKind::PersistentVolumeClaim,
            ResourceKind::Ingress,
            ResourceKind::Deployment,
        ]
    );
    assert!(built.resources.iter().all(|r| r.name() == "acme-vcs-gitifold-gitea"));
}

#[test]
fn test_no_ingress_without_hostname() {
    let mut fixture = Fixture::acme();
    fixture.spec.git.hostname.clear();
    let built = build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap();
    assert!(built.resources.iter().all(|r| r.kind() != ResourceKind::Ingress));
    let ini = app_ini(&built.resources);
    assert_eq!(ini_value(&ini, "server", "DOMAIN").unwrap(), "acme-vcs-gitifold-gitea.forge.svc");
}

#[test]
fn test_server_section() {
    let fixture = Fixture::acme();
    let built = build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap();
    let ini = app_ini(&built.resources);

    assert!(ini.starts_with("APP_NAME = acme Git\n"));
    assert_eq!(ini_value(&ini, "server", "SSH_DOMAIN").unwrap(), "git.acme.io");
    assert_eq!(ini_value(&ini, "server", "DOMAIN").unwrap(), "git.acme.io");
    assert_eq!(ini_value(&ini, "server", "ROOT_URL").unwrap(), "https://git.acme.io/");
    assert_eq!(ini_value(&ini, "server", "LFS_JWT_SECRET").unwrap().len(), 43);
    assert_eq!(ini_value(&ini, "service", "NO_REPLY_ADDRESS").unwrap(), "git@git.acme.io");
}

#[test]
fn test_database_section_uses_credentials() {
    let fixture = Fixture::acme();
    let db = credentials("gitea");
    let built = build(&fixture.ctx(), &db, &cache()).unwrap();
    let ini = app_ini(&built.resources);

    assert_eq!(ini_value(&ini, "database", "HOST").unwrap(), "acme-gitea-gitifold-postgres.forge.svc:5432");
    assert_eq!(ini_value(&ini, "database", "NAME").unwrap(), "gitea");
    assert_eq!(ini_value(&ini, "database", "USER").unwrap(), "gitea");
    assert_eq!(ini_value(&ini, "database", "PASSWD").unwrap(), db.password);
}

#[test]
fn test_cache_sections_use_endpoint() {
    let fixture = Fixture::acme();
    let built = build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap();
    let ini = app_ini(&built.resources);

    assert_eq!(
        ini_value(&ini, "session", "PROVIDER_CONFIG").unwrap(),
        "network=tcp,addr=acme-gitea-gitifold-keydb.forge.svc:6379,db=0,pool_size=100,idle_timeout=180"
    );
    assert!(ini_value(&ini, "cache", "HOST").unwrap().contains("keydb.forge.svc:6379,db=1"));
}

#[test]
fn test_security_section() {
    let fixture = Fixture::acme();
    let built = build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap();
    let ini = app_ini(&built.resources);

    let secret_key = ini_value(&ini, "security", "SECRET_KEY").unwrap();
    assert_eq!(secret_key.len(), 64);
    assert!(secret_key.chars().all(|c| c.is_ascii_alphanumeric()));

    let token = ini_value(&ini, "security", "INTERNAL_TOKEN").unwrap();
    assert_eq!(token.split('.').count(), 3);
    // Signed with a throwaway key, never with the secret key.
    assert!(decode_token(secret_key.as_bytes(), &token).is_err());

    assert_eq!(ini_value(&ini, "oauth2", "JWT_SECRET").unwrap().len(), 43);
}

#[test]
fn test_secrets_fresh_per_build() {
    let fixture = Fixture::acme();
    let a = app_ini(&build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap().resources);
    let b = app_ini(&build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap().resources);
    assert_ne!(
        ini_value(&a, "security", "SECRET_KEY"),
        ini_value(&b, "security", "SECRET_KEY")
    );
}

#[test]
fn test_forge_identity_stored_and_returned() {
    let fixture = Fixture::acme();
    let ctx = fixture.ctx();
    let built = build(&ctx, &credentials("gitea"), &cache()).unwrap();
    let identity = &built.record;
    assert_eq!(identity.server_url, "https://git.acme.io");
    assert!(Uuid::parse_str(&identity.client_id).is_ok());
    assert_eq!(identity.client_secret.len(), 32);

    let secret = only_secret(&built.resources);
    assert_eq!(identity_from_secret(&ctx, secret).as_ref(), Some(identity));
}

#[test]
fn test_deployment_mounts_config() {
    let fixture = Fixture::acme();
    let built = build(&fixture.ctx(), &credentials("gitea"), &cache()).unwrap();
    let manifest = built.resources.last().unwrap().to_manifest();
    let pod = &manifest["spec"]["template"]["spec"];
    assert_eq!(pod["volumes"][0]["persistentVolumeClaim"]["claimName"], "acme-vcs-gitifold-gitea");
    assert_eq!(pod["volumes"][1]["secret"]["items"][0]["key"], "app.ini");
    let container = &pod["containers"][0];
    assert_eq!(container["image"], "gitea/gitea:1.11.3");
    assert_eq!(container["volumeMounts"][1]["subPath"], "app.ini");
    assert_eq!(container["livenessProbe"]["initialDelaySeconds"], 20);
}

#[test]
fn test_template_fields_are_all_provided() {
    let template = Template::parse(APP_INI).unwrap();
    let fields = template.fields();
    assert!(fields.contains(&".database.password".to_string()));
    assert!(fields.contains(&".cache".to_string()));
}
