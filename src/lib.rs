//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! Quotagate - Multi-window Rate Governor
//!
//! Throttles outbound calls to a metered third-party API across four budgets at once:
//! requests per minute, requests per day, tokens per minute and tokens per day.
//!
//! # API Layers
//!
//! ## Prelude (Quick Start)
//!
//! Use `use quotagate::prelude::*;` to import all commonly used types.
//!
//! ## Core API
//!
//! - [`RateGovernor`] - Process-wide admission gate for metered calls
//! - [`GovernorConfig`] - Ceilings, admission policy and safety margin
//! - [`UsageSnapshot`] / [`RateLimitReport`] - Current usage, headroom and health
//! - [`GovernorError`] - Error types
//!
//! ## Building Blocks
//!
//! - [`ledger::UsageLedger`] - One trailing-window usage ledger
//! - [`estimate`] - Length-based token cost estimate used by callers
//!
//! ## Extensions (feature-gated)
//!
//! - Prometheus metrics (requires `monitoring` feature)
//! - Tracing subscriber setup (requires `telemetry` feature)
//!
//! # Examples
//!
//! ```rust
//! use quotagate::prelude::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() {
//!     let governor = Arc::new(RateGovernor::new(GovernorConfig::default()).unwrap());
//!
//!     // 发出计量调用前先申请准入
//!     governor.acquire(estimate_tokens("How do I reset my password?")).await;
//!
//!     let report = governor.report();
//!     assert_eq!(report.status.rpm.current, 1);
//!     assert_eq!(report.overall_health, HealthLevel::Good);
//! }
//! ```
//!
//! # Features
//!
//! - **Four sliding windows**: RPM, RPD, TPM and TPD checked on every admission
//! - **Always eventually admit**: quota pressure is absorbed by waiting, never by rejection
//! - **Minimal latency**: callers wait only for the single longest binding window
//! - **Runtime tuning**: ceilings can be changed while running, with a change history
//! - **Observability**: usage snapshots, health classification and optional Prometheus metrics

pub mod prelude;

pub mod config;
pub mod constants;
pub mod error;
pub mod estimate;
pub mod governor;
pub mod ledger;
pub mod status;
#[cfg(any(feature = "telemetry", feature = "monitoring"))]
pub mod telemetry;

// 重新导出常用类型
pub use config::{
    AdmissionPolicy, ChangeSource, GovernorConfig, LimitChangeRecord, LimitHistory, LimitUpdate,
    RateLimits,
};
pub use error::GovernorError;
pub use estimate::{estimate_batch_tokens, estimate_tokens};
pub use governor::{Admission, RateGovernor};
pub use ledger::UsageLedger;
pub use status::{HealthLevel, MetricUsage, RateLimitReport, UsageSnapshot};
#[cfg(feature = "telemetry")]
pub use telemetry::init_tracing;
#[cfg(feature = "monitoring")]
pub use telemetry::GovernorMetrics;
