//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! RateGovernor 主控制器
//!
//! 所有计量调用在发出前都必须经过的进程级闸门。同时跟踪四个滑动窗口：
//! - 每分钟请求数 (RPM)
//! - 每天请求数 (RPD)
//! - 每分钟 token 数 (TPM)
//! - 每天 token 数 (TPD)
//!
//! 配额压力一律通过延迟处理，从不拒绝调用。
//!
//! # 并发模型
//!
//! - 账本锁（`parking_lot::Mutex`）保护上限和四个账本，只在同步代码段中持有，
//!   从不跨越 `.await`，因此 [`RateGovernor::status`] 不会被正在等待的调用者阻塞。
//! - 准入闸门（`tokio::sync::Mutex`）串行化 清理-度量-判断-等待-记录 周期。
//!   [`AdmissionPolicy::Strict`] 在等待期间继续持有闸门，存在队头阻塞：
//!   即使后来者本身有余量，也要等前面的调用者睡眠结束并记录后才能准入；
//!   [`AdmissionPolicy::Lenient`] 在等待前释放、等待后重新获取。
//! - 准入顺序不保证 FIFO。
//! - 被丢弃的 `acquire` future 就地放弃：闸门释放，不记录任何用量。

use crate::config::{
    AdmissionPolicy, ChangeSource, GovernorConfig, LimitChangeRecord, LimitHistory, LimitUpdate,
    RateLimits,
};
use crate::constants::{DAY_WINDOW, MINUTE_WINDOW};
use crate::error::GovernorError;
use crate::ledger::UsageLedger;
use crate::status::{MetricUsage, RateLimitReport, UsageSnapshot};
#[cfg(feature = "monitoring")]
use crate::telemetry::GovernorMetrics;
use parking_lot::Mutex;
use std::future::Future;
#[cfg(feature = "monitoring")]
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// 一次准入的结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Admission {
    /// 记录的成本
    pub cost: u64,
    /// 从调用到准入经过的时间（包括排队和限流等待）
    pub waited: Duration,
    /// 是否因超限而等待
    ///
    /// 只反映本调用者到达闸门时的判断。严格策略下，有余量的调用者也可能排在
    /// 正在等待的调用者之后，此时 `waited` 很长而 `throttled` 为 `false`。
    pub throttled: bool,
}

/// 受账本锁保护的状态
#[derive(Debug)]
struct GovernorState {
    limits: RateLimits,
    requests_minute: UsageLedger,
    requests_day: UsageLedger,
    tokens_minute: UsageLedger,
    tokens_day: UsageLedger,
}

impl GovernorState {
    fn new(limits: RateLimits) -> Self {
        Self {
            limits,
            requests_minute: UsageLedger::new(MINUTE_WINDOW),
            requests_day: UsageLedger::new(DAY_WINDOW),
            tokens_minute: UsageLedger::new(MINUTE_WINDOW),
            tokens_day: UsageLedger::new(DAY_WINDOW),
        }
    }

    fn prune(&mut self, now: Instant) {
        self.requests_minute.prune(now);
        self.requests_day.prune(now);
        self.tokens_minute.prune(now);
        self.tokens_day.prune(now);
    }

    /// 所有超限维度中最长的等待时间
    fn wait_time(&self, now: Instant, cost: u64, margin: Duration) -> Option<Duration> {
        let checks = [
            ("RPM", &self.requests_minute, self.limits.rpm, 1),
            ("RPD", &self.requests_day, self.limits.rpd, 1),
            ("TPM", &self.tokens_minute, self.limits.tpm, cost),
            ("TPD", &self.tokens_day, self.limits.tpd, cost),
        ];

        checks
            .into_iter()
            .filter_map(|(name, ledger, limit, cost)| {
                let wait = ledger.wait_for_headroom(now, limit, cost, margin)?;
                debug!(
                    "{} 限制检查: {}/{}, 等待: {:.2}s",
                    name,
                    ledger.total().saturating_add(cost),
                    limit,
                    wait.as_secs_f64()
                );
                Some(wait)
            })
            .max()
    }

    fn record(&mut self, now: Instant, cost: u64) {
        self.requests_minute.record(now, 1);
        self.requests_day.record(now, 1);
        self.tokens_minute.record(now, cost);
        self.tokens_day.record(now, cost);
    }

    fn snapshot(&self) -> UsageSnapshot {
        UsageSnapshot {
            rpm: MetricUsage::new(self.requests_minute.total(), self.limits.rpm),
            rpd: MetricUsage::new(self.requests_day.total(), self.limits.rpd),
            tpm: MetricUsage::new(self.tokens_minute.total(), self.limits.tpm),
            tpd: MetricUsage::new(self.tokens_day.total(), self.limits.tpd),
        }
    }
}

/// 计量调用调速器
///
/// 进程启动时构造一次，通过 `Arc` 共享给所有调用点。
///
/// # 示例
/// ```rust
/// use quotagate::config::{GovernorConfig, RateLimits};
/// use quotagate::governor::RateGovernor;
/// use std::sync::Arc;
///
/// #[tokio::main]
/// async fn main() {
///     let config = GovernorConfig::with_limits(RateLimits::new(45, 1_000, 200_000, 1_000_000));
///     let governor = Arc::new(RateGovernor::new(config).unwrap());
///
///     let admission = governor.acquire(120).await;
///     assert!(!admission.throttled);
///     assert_eq!(governor.status().tpm.current, 120);
/// }
/// ```
pub struct RateGovernor {
    /// 上限与账本
    state: Mutex<GovernorState>,
    /// 准入闸门
    admission: tokio::sync::Mutex<()>,
    /// 准入策略
    policy: AdmissionPolicy,
    /// 安全余量
    safety_margin: Duration,
    /// 上限变更历史
    history: Mutex<LimitHistory>,
    /// 监控指标
    #[cfg(feature = "monitoring")]
    metrics: Option<Arc<GovernorMetrics>>,
}

impl RateGovernor {
    /// 创建新的调速器
    ///
    /// 任一上限为0时返回 [`GovernorError::ConfigError`]。
    pub fn new(config: GovernorConfig) -> Result<Self, GovernorError> {
        config.validate()?;

        info!(
            "创建调速器: RPM={}, RPD={}, TPM={}, TPD={}, 策略={}",
            config.limits.rpm,
            config.limits.rpd,
            config.limits.tpm,
            config.limits.tpd,
            config.policy.as_str()
        );

        Ok(Self {
            state: Mutex::new(GovernorState::new(config.limits)),
            admission: tokio::sync::Mutex::new(()),
            policy: config.policy,
            safety_margin: config.safety_margin(),
            history: Mutex::new(LimitHistory::new(config.history_capacity)),
            #[cfg(feature = "monitoring")]
            metrics: None,
        })
    }

    /// 从环境变量创建调速器
    pub fn from_env() -> Result<Self, GovernorError> {
        Self::new(GovernorConfig::from_env()?)
    }

    /// 附加监控指标
    #[cfg(feature = "monitoring")]
    pub fn with_metrics(mut self, metrics: Arc<GovernorMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// 准入策略
    pub fn policy(&self) -> AdmissionPolicy {
        self.policy
    }

    /// 安全余量
    pub fn safety_margin(&self) -> Duration {
        self.safety_margin
    }

    /// 当前上限
    pub fn limits(&self) -> RateLimits {
        self.state.lock().limits
    }

    /// 申请准入
    ///
    /// 若按 `estimated_cost` 准入会使任一维度超限，则等待所有超限维度中最长的那个
    /// 等待时间（不是总和），然后无条件记录。等待只计算一次，不循环重试。
    /// 没有维度超限时立即记录返回。
    #[instrument(skip(self))]
    pub async fn acquire(&self, estimated_cost: u64) -> Admission {
        let started = Instant::now();
        let gate = self.admission.lock().await;

        let wait = {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.prune(now);

            if estimated_cost > state.limits.tpm || estimated_cost > state.limits.tpd {
                warn!(
                    "预估成本 {} 超过 token 上限 (TPM={}, TPD={})，将在窗口清空后准入",
                    estimated_cost, state.limits.tpm, state.limits.tpd
                );
            }

            state.wait_time(now, estimated_cost, self.safety_margin)
        };

        let gate = match wait {
            Some(wait) => {
                warn!("触发限流保护: 等待 {:.2} 秒", wait.as_secs_f64());
                match self.policy {
                    AdmissionPolicy::Strict => {
                        tokio::time::sleep(wait).await;
                        gate
                    }
                    AdmissionPolicy::Lenient => {
                        drop(gate);
                        tokio::time::sleep(wait).await;
                        self.admission.lock().await
                    }
                }
            }
            None => gate,
        };

        let snapshot = {
            let mut state = self.state.lock();
            let now = Instant::now();
            state.prune(now);
            state.record(now, estimated_cost);
            state.snapshot()
        };
        drop(gate);

        let admission = Admission {
            cost: estimated_cost,
            waited: started.elapsed(),
            throttled: wait.is_some(),
        };

        debug!("限流器状态: {:?}", snapshot);

        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.record_admission(admission.waited, admission.throttled, &snapshot);
        }

        admission
    }

    /// 申请准入后执行计量调用
    ///
    /// # 示例
    /// ```rust
    /// use quotagate::config::GovernorConfig;
    /// use quotagate::estimate::estimate_tokens;
    /// use quotagate::governor::RateGovernor;
    ///
    /// #[tokio::main]
    /// async fn main() {
    ///     let governor = RateGovernor::new(GovernorConfig::default()).unwrap();
    ///     let text = "How do I reset my password?";
    ///
    ///     let dimension = governor
    ///         .call(estimate_tokens(text), || async { 1536usize })
    ///         .await;
    ///     assert_eq!(dimension, 1536);
    /// }
    /// ```
    pub async fn call<F, Fut, T>(&self, estimated_cost: u64, f: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        self.acquire(estimated_cost).await;
        f().await
    }

    /// 当前用量快照
    ///
    /// 读取前清理过期条目，在账本锁内完成，快照是一致的。
    pub fn status(&self) -> UsageSnapshot {
        let snapshot = {
            let mut state = self.state.lock();
            state.prune(Instant::now());
            state.snapshot()
        };

        #[cfg(feature = "monitoring")]
        if let Some(metrics) = &self.metrics {
            metrics.update_usage(&snapshot);
        }

        snapshot
    }

    /// 带健康等级和建议的状态报告
    pub fn report(&self) -> RateLimitReport {
        RateLimitReport::from(self.status())
    }

    /// 更新上限
    ///
    /// 未指定的上限保持不变，对下一次 `acquire`/`status` 立即生效，
    /// 不重新归类已记录的条目。任一新上限为0时整个更新被拒绝。
    pub fn update_limits(&self, update: LimitUpdate) -> Result<(), GovernorError> {
        self.update_limits_with_source(update, ChangeSource::Api)
    }

    /// 更新上限（带来源）
    #[instrument(skip(self))]
    pub fn update_limits_with_source(
        &self,
        update: LimitUpdate,
        source: ChangeSource,
    ) -> Result<(), GovernorError> {
        if update.is_empty() {
            return Ok(());
        }

        let (old_limits, new_limits) = {
            let mut state = self.state.lock();
            let old_limits = state.limits;
            let new_limits = old_limits.apply(&update);
            new_limits.validate()?;
            state.limits = new_limits;
            (old_limits, new_limits)
        };

        let record = LimitChangeRecord::new(old_limits, new_limits, source);
        for change in &record.changes {
            info!("{}", change);
        }

        self.history.lock().add_record(record);

        Ok(())
    }

    /// 上限变更历史
    pub fn limit_history(&self) -> Vec<LimitChangeRecord> {
        self.history.lock().get_records().to_vec()
    }
}
