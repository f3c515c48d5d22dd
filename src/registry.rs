//! Target resolution over the registry query interface.
//!
//! The resolver is the read side of the target registry: given an event
//! identifier it returns the enabled targets subscribed to it. It holds no
//! locks of its own and may be called concurrently by any number of
//! notifications.

use crate::core::{Target, TargetRegistry};
use async_trait::async_trait;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug, Clone)]
pub enum RegistryError {
    #[error("target registry unavailable: {0}")]
    Unavailable(String),
}

/// Resolves an event identifier to the enabled targets subscribed to it.
pub struct TargetResolver {
    registry: Arc<dyn TargetRegistry>,
}

impl TargetResolver {
    pub fn new(registry: Arc<dyn TargetRegistry>) -> Self {
        Self { registry }
    }

    /// Returns all enabled targets subscribed to `hook_id`.
    ///
    /// An empty result means no subscribers and is not an error. The lookup
    /// is not retried here; if the registry is unavailable the error is
    /// surfaced to the caller.
    pub async fn lookup(&self, hook_id: &str) -> Result<Vec<Target>, RegistryError> {
        let targets = self.registry.targets_for(hook_id).await?;
        let resolved: Vec<Target> = targets
            .into_iter()
            .filter(|t| t.enabled && t.hook_id == hook_id)
            .collect();
        debug!(hook_id, count = resolved.len(), "Resolved webhook targets");
        Ok(resolved)
    }
}

/// A `TargetRegistry` backed by an in-memory list.
///
/// Durable storage and the administrative CRUD around it live outside this
/// crate; this implementation is the queryable collection embedders and
/// tests hand to the engine.
#[derive(Default)]
pub struct InMemoryTargetRegistry {
    targets: RwLock<Vec<Target>>,
}

impl InMemoryTargetRegistry {
    pub fn new(targets: Vec<Target>) -> Self {
        Self {
            targets: RwLock::new(targets),
        }
    }

    pub fn add(&self, target: Target) {
        self.targets.write().unwrap().push(target);
    }
}

#[async_trait]
impl TargetRegistry for InMemoryTargetRegistry {
    async fn targets_for(&self, hook_id: &str) -> Result<Vec<Target>, RegistryError> {
        let targets = self.targets.read().unwrap();
        Ok(targets
            .iter()
            .filter(|t| t.hook_id == hook_id)
            .cloned()
            .collect())
    }
}
