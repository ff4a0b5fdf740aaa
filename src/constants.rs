//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Centralized configuration constants for Quotagate.
//!
//! This module provides well-documented constants used throughout the library.
//! All magic numbers are defined here with their purpose and usage context.

use std::time::Duration;

// ============================================================================
// Default Ceilings
// ============================================================================

/// Default requests-per-minute ceiling.
pub const DEFAULT_RPM_LIMIT: u64 = 45;

/// Default requests-per-day ceiling.
pub const DEFAULT_RPD_LIMIT: u64 = 1_000;

/// Default tokens-per-minute ceiling.
pub const DEFAULT_TPM_LIMIT: u64 = 200_000;

/// Default tokens-per-day ceiling.
pub const DEFAULT_TPD_LIMIT: u64 = 1_000_000;

// ============================================================================
// Windows
// ============================================================================

/// Length of the per-minute sliding window.
pub const MINUTE_WINDOW: Duration = Duration::from_secs(60);

/// Length of the per-day sliding window (24 hours).
pub const DAY_WINDOW: Duration = Duration::from_secs(24 * 60 * 60);

/// Default safety margin added to every computed wait (1 second).
///
/// Absorbs clock granularity at the window boundary so that a woken caller
/// never observes the binding entry as still inside the window.
pub const DEFAULT_SAFETY_MARGIN_MS: u64 = 1_000;

// ============================================================================
// Health Classification
// ============================================================================

/// Usage ratio below which the governor reports `Good` health.
pub const HEALTH_CAUTION_RATIO: f64 = 0.7;

/// Usage ratio below which the governor reports `Caution` health.
///
/// At or above this ratio the health is `Critical`.
pub const HEALTH_CRITICAL_RATIO: f64 = 0.9;

/// Usage ratio above which a "high usage" recommendation is emitted.
pub const HIGH_USAGE_RATIO: f64 = 0.8;

/// Remaining token headroom below which a "low tokens" recommendation is emitted.
pub const LOW_TOKEN_HEADROOM: u64 = 1_000;

// ============================================================================
// Caller-side Pacing
// ============================================================================

/// RPM usage ratio above which sequential callers use the slowest spacing.
pub const PACING_HIGH_RATIO: f64 = 0.8;

/// RPM usage ratio above which sequential callers use the medium spacing.
pub const PACING_MEDIUM_RATIO: f64 = 0.6;

/// Spacing between sequential calls under high RPM usage.
pub const PACING_HIGH_DELAY: Duration = Duration::from_millis(2_000);

/// Spacing between sequential calls under medium RPM usage.
pub const PACING_MEDIUM_DELAY: Duration = Duration::from_millis(1_500);

/// Spacing between sequential calls under low RPM usage.
pub const PACING_LOW_DELAY: Duration = Duration::from_millis(1_000);

/// Maximum number of items sent in a single batched call.
pub const MAX_BATCH_ITEMS: usize = 10;

// ============================================================================
// Cost Estimation
// ============================================================================

/// Characters per token used by the length-based cost estimate.
pub const CHARS_PER_TOKEN: usize = 4;

/// Minimum estimated cost of any non-trivial payload.
pub const MIN_ESTIMATED_TOKENS: u64 = 1;

// ============================================================================
// Limit History
// ============================================================================

/// Default number of limit change records kept in memory.
pub const DEFAULT_HISTORY_CAPACITY: usize = 100;

// ============================================================================
// Environment Variables
// ============================================================================

/// Environment variable overriding the RPM ceiling.
pub const ENV_RPM: &str = "GOVERNOR_RPM";

/// Environment variable overriding the RPD ceiling.
pub const ENV_RPD: &str = "GOVERNOR_RPD";

/// Environment variable overriding the TPM ceiling.
pub const ENV_TPM: &str = "GOVERNOR_TPM";

/// Environment variable overriding the TPD ceiling.
pub const ENV_TPD: &str = "GOVERNOR_TPD";

/// Environment variable selecting the admission policy (`strict` or `lenient`).
pub const ENV_POLICY: &str = "GOVERNOR_POLICY";

/// Environment variable overriding the safety margin in milliseconds.
pub const ENV_SAFETY_MARGIN_MS: &str = "GOVERNOR_SAFETY_MARGIN_MS";
