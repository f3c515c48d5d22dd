//! Core domain types and service traits for HookRelay
//!
//! This module defines the fundamental data structures and trait contracts
//! that govern component interactions throughout the crate.

use crate::dispatch::DeliveryError;
use crate::registry::RegistryError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A webhook subscription record.
///
/// Targets are created and edited by administrative tooling outside this
/// crate; the dispatch engine treats them as read-only. The URL is validated
/// by the registry, not here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Target {
    /// Destination endpoint for HTTP POST callbacks.
    pub url: String,
    /// The event category this target subscribes to (e.g. "review.published").
    pub hook_id: String,
    /// Disabled targets are never contacted.
    pub enabled: bool,
}

impl Target {
    /// Creates an enabled target subscribed to the given event category.
    pub fn new(url: impl Into<String>, hook_id: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            hook_id: hook_id.into(),
            enabled: true,
        }
    }
}

/// Terminal result of one target's delivery-with-retry sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// A 2xx response was received.
    Delivered {
        /// Number of HTTP requests issued, including the successful one.
        attempts_used: u32,
    },
    /// The retry budget was consumed without a 2xx response.
    /// With a budget of zero this is reported without any HTTP request.
    Exhausted {
        /// Number of HTTP requests issued.
        attempts_used: u32,
    },
}

impl DeliveryOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Per-target outcomes of a single notification.
///
/// Returned by [`DispatchEngine::notify`](crate::dispatch::DispatchEngine::notify)
/// so embedders can observe results; all failure paths are also logged, so
/// callers that ignore the report lose nothing the logs don't carry.
#[derive(Debug, Default)]
pub struct DispatchReport {
    pub outcomes: Vec<(Target, DeliveryOutcome)>,
}

impl DispatchReport {
    /// Number of targets that received a 2xx response.
    pub fn delivered_count(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|(_, o)| o.is_delivered())
            .count()
    }

    /// Number of targets whose retry budget was exhausted.
    pub fn exhausted_count(&self) -> usize {
        self.outcomes.len() - self.delivered_count()
    }

    /// Looks up the outcome for a specific target URL.
    pub fn outcome_for(&self, url: &str) -> Option<&DeliveryOutcome> {
        self.outcomes
            .iter()
            .find(|(t, _)| t.url == url)
            .map(|(_, o)| o)
    }
}

// =============================================================================
// Service Traits
// =============================================================================

/// Query interface over the target registry.
///
/// The registry's storage and administrative CRUD live outside this crate;
/// the dispatch engine only ever reads through this trait.
#[async_trait]
pub trait TargetRegistry: Send + Sync {
    /// Returns every subscription record for the given event category,
    /// including disabled ones. The resolver applies the `enabled` filter.
    ///
    /// # Returns
    /// * `Ok(Vec<Target>)` with all subscription records; empty is valid
    /// * `Err(RegistryError)` if the registry cannot be queried
    async fn targets_for(&self, hook_id: &str) -> Result<Vec<Target>, RegistryError>;
}

/// Issues one webhook HTTP request.
///
/// One call corresponds to exactly one delivery attempt; the retry loop
/// lives above this seam so tests can substitute a scripted fake.
#[async_trait]
pub trait WebhookSender: Send + Sync {
    /// POSTs the raw payload bytes to `url`, unmodified.
    ///
    /// # Returns
    /// * `Ok(())` for any 2xx response
    /// * `Err(DeliveryError::Status)` for a non-2xx response
    /// * `Err(DeliveryError::Transport)` for connection, DNS, or timeout
    ///   failures
    async fn send(&self, url: &str, payload: &[u8]) -> Result<(), DeliveryError>;
}
