//! The dispatch engine: delivery-with-retry to every resolved target.
//!
//! Fan-out happens here, one task per target, so a slow or unreachable
//! target never delays delivery to its siblings. Per-attempt failures stay
//! inside the retry loop; per-target exhaustion stays inside that target's
//! task; only a registry lookup failure aborts a whole notification.

pub mod engine;
pub mod sender;
#[cfg(feature = "test-utils")]
pub mod test_utils;

use crate::registry::RegistryError;
use thiserror::Error;

pub use engine::DispatchEngine;
pub use sender::HttpWebhookSender;

/// Failure of a single delivery attempt. Internal to the retry loop: an
/// attempt-level error only ever contributes to exhaustion, it is never
/// surfaced on its own.
#[derive(Error, Debug, Clone)]
pub enum DeliveryError {
    /// Connection refused, DNS failure, timeout: anything below HTTP.
    #[error("transport failure: {0}")]
    Transport(String),

    /// The target answered with a non-2xx status. Indistinguishable from a
    /// transport failure for retry purposes.
    #[error("non-success status: {0}")]
    Status(u16),
}

/// Failure of a whole notification. The only variant is the registry being
/// unreachable: without a trustworthy target set no deliveries are made.
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("webhook dispatch aborted: {0}")]
    RegistryUnavailable(#[from] RegistryError),
}
