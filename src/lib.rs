//! HookRelay - webhook dispatch with bounded retry
//!
//! This library notifies external subscribers of internal events by POSTing
//! payloads to administrator-configured target URLs. Given an event
//! identifier and a payload, the engine resolves the enabled targets
//! subscribed to that event and delivers to each on its own task, so a
//! stalled target never blocks its siblings.

pub mod config;
pub mod core;
pub mod dispatch;
pub mod registry;

// Re-export core types for convenience
pub use crate::core::*;
