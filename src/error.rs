// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Errors that abort a reconciliation pass.

use thiserror::Error;

use crate::descriptor::ResourceKind;
use crate::render::RenderError;
use crate::secrets::SecretError;
use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum ReconcileError {
    #[error("Secret generation failed: {0}")]
    Secret(#[from] SecretError),

    #[error("Configuration rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Lookup of {kind} '{name}' failed: {source}")]
    Lookup {
        kind: ResourceKind,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Create of {kind} '{name}' failed: {source}")]
    Create {
        kind: ResourceKind,
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("Owner link of {kind} '{name}' failed: {source}")]
    Owner {
        kind: ResourceKind,
        name: String,
        #[source]
        source: StoreError,
    },
}
