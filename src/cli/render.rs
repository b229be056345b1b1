// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! `render` command: one pass against an empty in-memory store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use thiserror::Error;

use super::render_format::{manifests_json, manifests_yaml, print_summary};
use super::{OutputFormat, RenderArgs, EXIT_INPUT, EXIT_OK, EXIT_RECONCILE};
use crate::config::{ConfigError, OperatorConfig};
use crate::descriptor::ResourceDescriptor;
use crate::error::ReconcileError;
use crate::k8s::Vcs;
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::store::InMemoryStore;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse VCS resource {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("Reconcile failed: {0}")]
    Reconcile(#[from] ReconcileError),
    #[error("Failed to encode output: {0}")]
    Output(String),
}

impl CliError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Reconcile(_) => EXIT_RECONCILE,
            _ => EXIT_INPUT,
        }
    }
}

/// Everything a pass produced.
#[derive(Debug)]
pub struct Rendered {
    pub report: ReconcileReport,
    /// Created objects in creation order.
    pub objects: Vec<ResourceDescriptor>,
}

/// Read a `VCS` resource, optionally moving it to `namespace`.
pub fn load_vcs(path: &Path, namespace: Option<&str>) -> Result<Vcs, CliError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    let mut vcs: Vcs = serde_yaml::from_str(&raw)
        .map_err(|source| CliError::Parse { path: path.to_path_buf(), source })?;
    if let Some(ns) = namespace {
        vcs.metadata.namespace = Some(ns.to_string());
    }
    Ok(vcs)
}

pub async fn render(vcs: &Vcs, settings: OperatorConfig) -> Result<Rendered, CliError> {
    let store = InMemoryStore::new();
    let reconciler = Reconciler::new(Arc::new(store.clone()), settings);
    let report = reconciler.reconcile(vcs).await?;
    let objects = store.created_objects().await;
    Ok(Rendered { report, objects })
}

pub fn encode(objects: &[ResourceDescriptor], format: OutputFormat) -> Result<String, CliError> {
    match format {
        OutputFormat::Yaml => manifests_yaml(objects).map_err(|e| CliError::Output(e.to_string())),
        OutputFormat::Json => manifests_json(objects).map_err(|e| CliError::Output(e.to_string())),
    }
}

pub async fn run_render(args: &RenderArgs, settings: OperatorConfig) -> i32 {
    match execute(args, settings).await {
        Ok(()) => EXIT_OK,
        Err(e) => {
            tracing::error!(error = %e, "Render failed");
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

async fn execute(args: &RenderArgs, settings: OperatorConfig) -> Result<(), CliError> {
    let vcs = load_vcs(&args.spec, args.namespace.as_deref())?;
    let rendered = render(&vcs, settings).await?;
    let text = encode(&rendered.objects, args.format)?;
    print!("{}", text);
    if args.summary {
        print_summary(&rendered.report);
    }
    Ok(())
}

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;
