//! 用量快照与健康报告
//!
//! [`UsageSnapshot`] 是调速器在某一时刻的只读视图。
//! 健康等级、建议和节奏提示都只是观测用途，不参与准入决策。

use crate::constants::{
    HEALTH_CAUTION_RATIO, HEALTH_CRITICAL_RATIO, HIGH_USAGE_RATIO, LOW_TOKEN_HEADROOM,
    MAX_BATCH_ITEMS, PACING_HIGH_DELAY, PACING_HIGH_RATIO, PACING_LOW_DELAY, PACING_MEDIUM_DELAY,
    PACING_MEDIUM_RATIO,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// 单个维度的用量
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricUsage {
    /// 窗口内当前用量
    pub current: u64,
    /// 上限
    pub limit: u64,
    /// 剩余额度，永不为负
    pub remaining: u64,
}

impl MetricUsage {
    pub fn new(current: u64, limit: u64) -> Self {
        Self {
            current,
            limit,
            remaining: limit.saturating_sub(current),
        }
    }

    /// 使用率
    pub fn usage_ratio(&self) -> f64 {
        if self.limit == 0 {
            return 1.0;
        }
        self.current as f64 / self.limit as f64
    }
}

/// 四个维度的用量快照
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageSnapshot {
    pub rpm: MetricUsage,
    pub rpd: MetricUsage,
    pub tpm: MetricUsage,
    pub tpd: MetricUsage,
}

impl UsageSnapshot {
    /// 健康等级
    ///
    /// 取 RPM 与 TPM 使用率中较差者：低于0.7为 Good，低于0.9为 Caution，否则 Critical。
    pub fn health(&self) -> HealthLevel {
        HealthLevel::from_ratio(self.rpm.usage_ratio().max(self.tpm.usage_ratio()))
    }

    /// 建议
    pub fn recommendations(&self) -> Vec<String> {
        let mut recommendations = Vec::new();

        if self.rpm.usage_ratio() > HIGH_USAGE_RATIO {
            recommendations.push("请求频率较高，建议拉开请求间隔".to_string());
        }
        if self.tpm.usage_ratio() > HIGH_USAGE_RATIO {
            recommendations.push("token 用量较高，建议缩短文本".to_string());
        }
        if self.rpm.remaining == 0 {
            recommendations.push("已达到每分钟请求上限，请等待1分钟".to_string());
        }
        if self.tpm.remaining < LOW_TOKEN_HEADROOM {
            recommendations.push("token 余量不足，请等待或使用更短的文本".to_string());
        }

        recommendations
    }

    /// 顺序逐条调用时的间隔
    pub fn pacing_delay(&self) -> Duration {
        let ratio = self.rpm.usage_ratio();
        if ratio > PACING_HIGH_RATIO {
            PACING_HIGH_DELAY
        } else if ratio > PACING_MEDIUM_RATIO {
            PACING_MEDIUM_DELAY
        } else {
            PACING_LOW_DELAY
        }
    }

    /// 是否适合一次批量调用
    pub fn fits_batch(&self, items: usize, total_cost: u64) -> bool {
        self.rpm.remaining > 0 && self.tpm.remaining > total_cost && items <= MAX_BATCH_ITEMS
    }

    /// 每分钟请求额度是否已用尽
    pub fn requests_exhausted(&self) -> bool {
        self.rpm.remaining == 0
    }
}

/// 健康等级
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthLevel {
    Good,
    Caution,
    Critical,
}

impl HealthLevel {
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio < HEALTH_CAUTION_RATIO {
            HealthLevel::Good
        } else if ratio < HEALTH_CRITICAL_RATIO {
            HealthLevel::Caution
        } else {
            HealthLevel::Critical
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthLevel::Good => "good",
            HealthLevel::Caution => "caution",
            HealthLevel::Critical => "critical",
        }
    }
}

impl fmt::Display for HealthLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 限流状态报告
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitReport {
    #[serde(flatten)]
    pub status: UsageSnapshot,
    pub recommendations: Vec<String>,
    pub overall_health: HealthLevel,
}

impl From<UsageSnapshot> for RateLimitReport {
    fn from(status: UsageSnapshot) -> Self {
        Self {
            recommendations: status.recommendations(),
            overall_health: status.health(),
            status,
        }
    }
}
