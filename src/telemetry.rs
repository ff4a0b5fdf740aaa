//! 监控和追踪模块
//!
//! - `monitoring` 特性：Prometheus 指标（准入计数、等待时长分布、各维度当前用量）
//! - `telemetry` 特性：基于 tracing-subscriber 的日志初始化
//!
//! # 示例
//!
//! ```rust,ignore
//! use quotagate::telemetry::{init_tracing, GovernorMetrics};
//!
//! init_tracing("quotagate=debug");
//! let metrics = GovernorMetrics::new().unwrap();
//! println!("{}", metrics.gather());
//! ```

#[cfg(feature = "monitoring")]
pub use self::metrics::GovernorMetrics;

#[cfg(feature = "monitoring")]
mod metrics {
    use crate::error::GovernorError;
    use crate::status::UsageSnapshot;
    use prometheus::{Counter, Encoder, Gauge, Histogram, HistogramOpts, Opts, Registry, TextEncoder};
    use std::time::Duration;
    use tracing::error;

    /// 调速器监控指标
    #[derive(Clone)]
    pub struct GovernorMetrics {
        /// 准入总数
        pub admissions_total: Counter,
        /// 经过等待的准入数
        pub delayed_admissions_total: Counter,
        /// 等待时长分布（秒）
        pub wait_duration: Histogram,
        /// 当前分钟请求数
        pub rpm_current: Gauge,
        /// 当前天请求数
        pub rpd_current: Gauge,
        /// 当前分钟 token 数
        pub tpm_current: Gauge,
        /// 当前天 token 数
        pub tpd_current: Gauge,
        /// 指标注册表
        registry: Registry,
    }

    impl GovernorMetrics {
        /// 创建并注册所有指标
        pub fn new() -> Result<Self, GovernorError> {
            let registry = Registry::new();

            let admissions_total = Counter::with_opts(Opts::new(
                "quotagate_admissions_total",
                "Total number of admitted metered calls",
            ))?;
            let delayed_admissions_total = Counter::with_opts(Opts::new(
                "quotagate_delayed_admissions_total",
                "Number of admissions that had to wait for headroom",
            ))?;
            // 等待通常在秒到分钟级，天窗口会到小时级
            let wait_duration = Histogram::with_opts(
                HistogramOpts::new(
                    "quotagate_wait_duration_seconds",
                    "Time callers spent waiting for admission in seconds",
                )
                .buckets(vec![0.001, 0.1, 1.0, 5.0, 15.0, 30.0, 61.0, 600.0, 3600.0, 86_401.0]),
            )?;
            let rpm_current = Gauge::with_opts(Opts::new(
                "quotagate_rpm_current",
                "Requests recorded in the trailing minute",
            ))?;
            let rpd_current = Gauge::with_opts(Opts::new(
                "quotagate_rpd_current",
                "Requests recorded in the trailing day",
            ))?;
            let tpm_current = Gauge::with_opts(Opts::new(
                "quotagate_tpm_current",
                "Estimated tokens recorded in the trailing minute",
            ))?;
            let tpd_current = Gauge::with_opts(Opts::new(
                "quotagate_tpd_current",
                "Estimated tokens recorded in the trailing day",
            ))?;

            registry.register(Box::new(admissions_total.clone()))?;
            registry.register(Box::new(delayed_admissions_total.clone()))?;
            registry.register(Box::new(wait_duration.clone()))?;
            registry.register(Box::new(rpm_current.clone()))?;
            registry.register(Box::new(rpd_current.clone()))?;
            registry.register(Box::new(tpm_current.clone()))?;
            registry.register(Box::new(tpd_current.clone()))?;

            Ok(Self {
                admissions_total,
                delayed_admissions_total,
                wait_duration,
                rpm_current,
                rpd_current,
                tpm_current,
                tpd_current,
                registry,
            })
        }

        /// 记录一次准入
        pub fn record_admission(&self, waited: Duration, throttled: bool, snapshot: &UsageSnapshot) {
            self.admissions_total.inc();
            if throttled {
                self.delayed_admissions_total.inc();
            }
            self.wait_duration.observe(waited.as_secs_f64());
            self.update_usage(snapshot);
        }

        /// 更新各维度当前用量
        pub fn update_usage(&self, snapshot: &UsageSnapshot) {
            self.rpm_current.set(snapshot.rpm.current as f64);
            self.rpd_current.set(snapshot.rpd.current as f64);
            self.tpm_current.set(snapshot.tpm.current as f64);
            self.tpd_current.set(snapshot.tpd.current as f64);
        }

        /// 收集所有指标并返回Prometheus格式的文本
        pub fn gather(&self) -> String {
            let encoder = TextEncoder::new();
            let metric_families = self.registry.gather();
            let mut buffer = Vec::new();
            if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
                error!("Failed to encode metrics: {}", e);
                return String::new();
            }
            String::from_utf8(buffer).unwrap_or_default()
        }
    }
}

/// 初始化全局 tracing 订阅者
///
/// 优先使用 `RUST_LOG`，未设置时使用 `default_filter`。重复初始化会被忽略。
#[cfg(feature = "telemetry")]
pub fn init_tracing(default_filter: &str) {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
