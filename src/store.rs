// Copyright 2024-2026 gitifold Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resource store interface and the in-memory implementation.
//!
//! The real API client lives outside this crate. [`InMemoryStore`] gives
//! the same contract (atomic create that reports already-exists) for tests
//! and the `render` command.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::descriptor::{ResourceDescriptor, ResourceKind};
use crate::k8s::{OwnerReference, Vcs};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("{kind} '{name}' already exists")]
    AlreadyExists { kind: ResourceKind, name: String },

    #[error("'{name}' is already controlled by {owner}")]
    OwnerConflict { name: String, owner: String },

    #[error("Store backend error: {0}")]
    Backend(String),
}

/// Consumed interface to the orchestration platform.
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Fetch an object; `Ok(None)` when it does not exist.
    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ResourceDescriptor>, StoreError>;

    /// Create an object. Must fail with `AlreadyExists` rather than
    /// overwrite.
    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<(), StoreError>;

    /// Attach a controller reference to `parent`.
    fn set_owner(&self, child: &mut ResourceDescriptor, parent: &Vcs) -> Result<(), StoreError> {
        let reference = OwnerReference::controller_of(parent);
        let meta = child.meta_mut();
        if let Some(existing) = &meta.owner {
            let same = existing.kind == reference.kind
                && existing.name == reference.name
                && existing.uid == reference.uid;
            if existing.controller && !same {
                return Err(StoreError::OwnerConflict {
                    name: meta.name.clone(),
                    owner: format!("{}/{}", existing.kind, existing.name),
                });
            }
        }
        meta.owner = Some(reference);
        Ok(())
    }
}

/// Injected misbehaviour for one resource kind.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fault {
    /// Lookups of this kind fail with a backend error.
    FailGet(String),
    /// Creates of this kind fail with a backend error.
    FailCreate(String),
    /// Another writer wins every create of this kind between lookup and
    /// create: the object is stored and `AlreadyExists` is returned.
    RaceCreate,
}

type ObjectKey = (ResourceKind, String, String);

#[derive(Default)]
struct StoreState {
    objects: HashMap<ObjectKey, ResourceDescriptor>,
    /// Keys created through `create`, in order.
    created: Vec<ObjectKey>,
}

/// Thread-safe in-memory object store.
#[derive(Default, Clone)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
    faults: Arc<HashMap<ResourceKind, Fault>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that misbehaves as `fault` for every object of `kind`.
    pub fn with_fault(kind: ResourceKind, fault: Fault) -> Self {
        let mut faults = HashMap::new();
        faults.insert(kind, fault);
        Self { state: Arc::default(), faults: Arc::new(faults) }
    }

    /// Insert an object as if someone else had created it.
    pub async fn preload(&self, descriptor: ResourceDescriptor) {
        let key = key_of(&descriptor);
        self.state.write().await.objects.insert(key, descriptor);
    }

    /// `(kind, name)` of every object created through this store, in order.
    pub async fn created(&self) -> Vec<(ResourceKind, String)> {
        let state = self.state.read().await;
        state.created.iter().map(|(kind, _, name)| (*kind, name.clone())).collect()
    }

    /// Objects created through this store, in order.
    pub async fn created_objects(&self) -> Vec<ResourceDescriptor> {
        let state = self.state.read().await;
        state
            .created
            .iter()
            .filter_map(|key| state.objects.get(key).cloned())
            .collect()
    }

    /// Number of stored objects, including preloaded ones.
    pub async fn len(&self) -> usize {
        self.state.read().await.objects.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ResourceStore for InMemoryStore {
    async fn get(
        &self,
        kind: ResourceKind,
        name: &str,
        namespace: &str,
    ) -> Result<Option<ResourceDescriptor>, StoreError> {
        if let Some(Fault::FailGet(reason)) = self.faults.get(&kind) {
            return Err(StoreError::Backend(reason.clone()));
        }
        let key = (kind, namespace.to_string(), name.to_string());
        Ok(self.state.read().await.objects.get(&key).cloned())
    }

    async fn create(&self, descriptor: &ResourceDescriptor) -> Result<(), StoreError> {
        let kind = descriptor.kind();
        let key = key_of(descriptor);
        let already_exists = || StoreError::AlreadyExists { kind, name: descriptor.name().to_string() };

        let mut state = self.state.write().await;
        match self.faults.get(&kind) {
            Some(Fault::FailCreate(reason)) => return Err(StoreError::Backend(reason.clone())),
            Some(Fault::RaceCreate) => {
                state.objects.entry(key).or_insert_with(|| descriptor.clone());
                return Err(already_exists());
            }
            _ => {}
        }

        if state.objects.contains_key(&key) {
            return Err(already_exists());
        }
        state.objects.insert(key.clone(), descriptor.clone());
        state.created.push(key);
        Ok(())
    }
}

fn key_of(descriptor: &ResourceDescriptor) -> ObjectKey {
    (
        descriptor.kind(),
        descriptor.namespace().to_string(),
        descriptor.name().to_string(),
    )
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
