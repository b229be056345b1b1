// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Gitea forge.
//!
//! Produces, in order: the `app.ini` secret, service, data volume claim,
//! ingress (when a hostname is set) and deployment. The secret also holds
//! the OAuth2 client handed to the CI server.

use serde::Serialize;
use uuid::Uuid;

use crate::descriptor::{
    AccessMode, Container, ContainerPort, PortRef, Probe, ResourceDescriptor, ServicePort, Volume,
    VolumeMount, VolumeSource, Workload, WorkloadKind,
};
use crate::error::ReconcileError;
use crate::k8s::ComponentProfile;
use crate::naming::{self, ComponentKind};
use crate::render;

use super::{BuildContext, Built, CacheEndpoint, CredentialRecord, ForgeIdentity};

pub const SUB_COMPONENT: &str = "vcs";
pub const CONFIG_KEY: &str = "app.ini";
pub const CLIENT_ID_KEY: &str = "oauth_client_id";
pub const CLIENT_SECRET_KEY: &str = "oauth_client_secret";

const HTTP_PORT: i32 = 3000;
const SSH_PORT: i32 = 22;
const SECRET_KEY_LENGTH: usize = 64;
const CLIENT_SECRET_LENGTH: usize = 32;

/// Gitea configuration file.
pub const APP_INI: &str = r#"APP_NAME = {{ .name }} Git
RUN_MODE = prod
RUN_USER = git

[repository]
ROOT = /data/git/repositories

[repository.local]
LOCAL_COPY_PATH = /data/gitea/tmp/local-repo

[repository.upload]
TEMP_PATH = /data/gitea/uploads

[server]
APP_DATA_PATH    = /data/gitea
SSH_DOMAIN       = {{ .domain }}
HTTP_PORT        = 3000
ROOT_URL         = https://{{ .domain -}}/
DISABLE_SSH      = false
SSH_PORT         = 22
LFS_CONTENT_PATH = /data/git/lfs
DOMAIN           = {{ .domain }}
LFS_START_SERVER = true
LFS_JWT_SECRET   = {{ .lfs_jwt_secret }}
OFFLINE_MODE     = true

[database]
DB_TYPE  = postgres
HOST     = {{ .database.address }}
NAME     = {{ .database.name }}
USER     = {{ .database.user }}
PASSWD   = {{ .database.password }}
SSL_MODE = disable

[indexer]
ISSUE_INDEXER_PATH = /data/gitea/indexers/issues.bleve

[session]
PROVIDER_CONFIG = network=tcp,addr={{ .cache -}},db=0,pool_size=100,idle_timeout=180
PROVIDER        = redis

[cache]
ADAPTER = redis
HOST    = network=tcp,addr={{ .cache -}},db=1,pool_size=100,idle_timeout=180

[picture]
AVATAR_UPLOAD_PATH      = /data/gitea/avatars
DISABLE_GRAVATAR        = true
ENABLE_FEDERATED_AVATAR = false

[attachment]
PATH = /data/gitea/attachments

[log]
ROOT_PATH = /data/gitea/log
MODE      = console
LEVEL     = Info

[security]
INSTALL_LOCK   = true
SECRET_KEY     = {{ .secret_key }}
INTERNAL_TOKEN = {{ .internal_token }}

[service]
DISABLE_REGISTRATION              = false
REQUIRE_SIGNIN_VIEW               = true
REGISTER_EMAIL_CONFIRM            = false
ENABLE_NOTIFY_MAIL                = false
ALLOW_ONLY_EXTERNAL_REGISTRATION  = false
ENABLE_CAPTCHA                    = true
DEFAULT_KEEP_EMAIL_PRIVATE        = false
DEFAULT_ALLOW_CREATE_ORGANIZATION = true
DEFAULT_ENABLE_TIMETRACKING       = true
NO_REPLY_ADDRESS                  = git@{{ .domain }}

[mailer]
ENABLED = false

[oauth2]
ENABLED    = true
JWT_SECRET = {{ .oauth_jwt_secret }}

[metrics]
ENABLED = true

[openid]
ENABLE_OPENID_SIGNIN = true
ENABLE_OPENID_SIGNUP = true
"#;

#[derive(Serialize)]
struct DatabaseSection<'a> {
    address: String,
    name: &'a str,
    user: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct AppIniData<'a> {
    name: &'a str,
    domain: &'a str,
    database: DatabaseSection<'a>,
    cache: String,
    secret_key: String,
    internal_token: String,
    lfs_jwt_secret: String,
    oauth_jwt_secret: String,
}

/// Public hostname of the forge, or its in-cluster address when none is set.
fn forge_domain(ctx: &BuildContext<'_>, service_name: &str) -> String {
    let hostname = &ctx.spec.git.hostname;
    if hostname.is_empty() {
        naming::service_host(service_name, ctx.namespace())
    } else {
        hostname.clone()
    }
}

/// Render `app.ini` for this instance.
pub fn render_config(
    ctx: &BuildContext<'_>,
    domain: &str,
    database: &CredentialRecord,
    cache: &CacheEndpoint,
) -> Result<Vec<u8>, ReconcileError> {
    let data = AppIniData {
        name: &ctx.identity.name,
        domain,
        database: DatabaseSection {
            address: database.address(ctx.namespace()),
            name: &database.name,
            user: &database.user,
            password: &database.password,
        },
        cache: cache.address(),
        secret_key: ctx.secrets.random_alphanumeric(SECRET_KEY_LENGTH)?,
        internal_token: ctx.secrets.internal_token(ctx.now)?,
        lfs_jwt_secret: ctx.secrets.random_token()?,
        oauth_jwt_secret: ctx.secrets.random_token()?,
    };
    Ok(render::render(APP_INI, &data)?)
}

/// Forge descriptors; the record is the OAuth2 client for the CI server.
pub fn build(
    ctx: &BuildContext<'_>,
    database: &CredentialRecord,
    cache: &CacheEndpoint,
) -> Result<Built<ForgeIdentity>, ReconcileError> {
    let derived = ctx.derive(ComponentKind::Gitea, SUB_COMPONENT);
    let name = derived.name.clone();
    let domain = forge_domain(ctx, &name);

    let identity = ForgeIdentity {
        server_url: format!("https://{}", domain),
        client_id: Uuid::new_v4().to_string(),
        client_secret: ctx.secrets.random_alphanumeric(CLIENT_SECRET_LENGTH)?,
    };

    let mut secret = ctx.secret(&derived);
    secret.insert(CONFIG_KEY, render_config(ctx, &domain, database, cache)?);
    secret.insert(CLIENT_ID_KEY, identity.client_id.as_str());
    secret.insert(CLIENT_SECRET_KEY, identity.client_secret.as_str());

    let service = ctx.endpoint(
        &derived,
        vec![
            ServicePort::new("gitea-http", 80, PortRef::Number(HTTP_PORT)),
            ServicePort::new("gitea-ssh", SSH_PORT, PortRef::Number(SSH_PORT)),
        ],
    );

    let claim = ctx.claim(&derived, &ctx.settings.storage.gitea_size, AccessMode::ReadWriteOnce);

    let ingress = ctx.routing_rule(
        ComponentKind::Gitea,
        &derived,
        &ctx.spec.git.hostname,
        &ctx.spec.git.annotations,
        80,
    );

    let mut gitea = Container::new("gitea", &ctx.settings.images.gitea, ComponentProfile::Gitea.to_requirements());
    gitea.ports = vec![ContainerPort::new("http", HTTP_PORT), ContainerPort::new("ssh", SSH_PORT)];
    gitea.volume_mounts = vec![
        VolumeMount::new("git", "/data"),
        VolumeMount::file("config", "/data/gitea/conf/app.ini", CONFIG_KEY),
    ];
    gitea.liveness = Some(Probe::http("/", PortRef::named("http"), 20));
    gitea.readiness = Some(Probe::http("/", PortRef::named("http"), 10));

    let mut workload = Workload::single(ctx.meta(&derived), WorkloadKind::Deployment, vec![gitea]);
    workload.volumes = vec![
        Volume { name: "git".to_string(), source: VolumeSource::Claim(name.clone()) },
        Volume {
            name: "config".to_string(),
            source: VolumeSource::Secret {
                secret: name,
                items: vec![(CONFIG_KEY.to_string(), CONFIG_KEY.to_string())],
            },
        },
    ];

    let mut resources = vec![
        ResourceDescriptor::SecretPayload(secret),
        service,
        ResourceDescriptor::StorageClaim(claim),
    ];
    resources.extend(ingress);
    resources.push(ResourceDescriptor::Workload(workload));

    Ok(Built { resources, record: identity })
}

/// Read the OAuth2 client back out of a stored forge secret.
pub fn identity_from_secret(
    ctx: &BuildContext<'_>,
    secret: &crate::descriptor::SecretPayload,
) -> Option<ForgeIdentity> {
    let domain = forge_domain(ctx, secret.meta.name.as_str());
    Some(ForgeIdentity {
        server_url: format!("https://{}", domain),
        client_id: secret.get_str(CLIENT_ID_KEY)?.to_string(),
        client_secret: secret.get_str(CLIENT_SECRET_KEY)?.to_string(),
    })
}

#[cfg(test)]
#[path = "gitea_tests.rs"]
mod tests;
