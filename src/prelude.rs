//! Prelude module - Commonly used types for quick imports
//!
//! This module re-exports the most commonly used types from Quotagate,
//! allowing users to import them with a single `use quotagate::prelude::*;`
//! statement instead of importing each type individually.

// Core types - always available
pub use crate::config::{AdmissionPolicy, GovernorConfig, LimitUpdate, RateLimits};
pub use crate::error::GovernorError;
pub use crate::governor::{Admission, RateGovernor};

// Observability
pub use crate::status::{HealthLevel, RateLimitReport, UsageSnapshot};

// Caller-side cost estimate
pub use crate::estimate::{estimate_batch_tokens, estimate_tokens};

// Feature-gated exports
#[cfg(feature = "monitoring")]
pub use crate::telemetry::GovernorMetrics;
