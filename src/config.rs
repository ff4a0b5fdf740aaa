//! 配置模块
//!
//! 定义调速器的上限、准入策略以及运行时上限变更记录。
//!
//! 配置只在启动时读取一次，来源可以是环境变量、YAML 或 TOML。
//! 运行时只允许通过 [`LimitUpdate`] 修改四个上限。

use crate::constants::{
    DEFAULT_HISTORY_CAPACITY, DEFAULT_RPD_LIMIT, DEFAULT_RPM_LIMIT, DEFAULT_SAFETY_MARGIN_MS,
    DEFAULT_TPD_LIMIT, DEFAULT_TPM_LIMIT, ENV_POLICY, ENV_RPD, ENV_RPM, ENV_SAFETY_MARGIN_MS,
    ENV_TPD, ENV_TPM,
};
use crate::error::GovernorError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;

/// 四个维度的上限
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimits {
    /// 每分钟请求数
    pub rpm: u64,
    /// 每天请求数
    pub rpd: u64,
    /// 每分钟 token 数
    pub tpm: u64,
    /// 每天 token 数
    pub tpd: u64,
}

impl Default for RateLimits {
    fn default() -> Self {
        Self {
            rpm: DEFAULT_RPM_LIMIT,
            rpd: DEFAULT_RPD_LIMIT,
            tpm: DEFAULT_TPM_LIMIT,
            tpd: DEFAULT_TPD_LIMIT,
        }
    }
}

impl RateLimits {
    /// 创建上限
    pub fn new(rpm: u64, rpd: u64, tpm: u64, tpd: u64) -> Self {
        Self { rpm, rpd, tpm, tpd }
    }

    /// 校验上限
    ///
    /// 为0的上限会让对应维度永远处于超限状态，直接拒绝。
    pub fn validate(&self) -> Result<(), GovernorError> {
        for (name, value) in self.named() {
            if value == 0 {
                return Err(GovernorError::ConfigError(format!(
                    "{} 上限不能为0",
                    name
                )));
            }
        }
        Ok(())
    }

    /// 应用部分更新，未指定的上限保持不变
    pub fn apply(&self, update: &LimitUpdate) -> RateLimits {
        RateLimits {
            rpm: update.rpm.unwrap_or(self.rpm),
            rpd: update.rpd.unwrap_or(self.rpd),
            tpm: update.tpm.unwrap_or(self.tpm),
            tpd: update.tpd.unwrap_or(self.tpd),
        }
    }

    /// 比较上限差异
    pub fn diff_changes(&self, old: &RateLimits) -> Vec<String> {
        let mut changes: Vec<String> = old
            .named()
            .iter()
            .zip(self.named().iter())
            .filter(|(before, after)| before.1 != after.1)
            .map(|(before, after)| format!("{} 上限变更: {} -> {}", before.0, before.1, after.1))
            .collect();

        if changes.is_empty() {
            changes.push("上限无变化".to_string());
        }

        changes
    }

    fn named(&self) -> [(&'static str, u64); 4] {
        [
            ("RPM", self.rpm),
            ("RPD", self.rpd),
            ("TPM", self.tpm),
            ("TPD", self.tpd),
        ]
    }
}

/// 上限的部分更新
///
/// # 示例
/// ```rust
/// use quotagate::config::LimitUpdate;
///
/// let update = LimitUpdate::new().rpm(30).tpm(150_000);
/// assert_eq!(update.rpm, Some(30));
/// assert_eq!(update.rpd, None);
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LimitUpdate {
    pub rpm: Option<u64>,
    pub rpd: Option<u64>,
    pub tpm: Option<u64>,
    pub tpd: Option<u64>,
}

impl LimitUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rpm(mut self, rpm: u64) -> Self {
        self.rpm = Some(rpm);
        self
    }

    pub fn rpd(mut self, rpd: u64) -> Self {
        self.rpd = Some(rpd);
        self
    }

    pub fn tpm(mut self, tpm: u64) -> Self {
        self.tpm = Some(tpm);
        self
    }

    pub fn tpd(mut self, tpd: u64) -> Self {
        self.tpd = Some(tpd);
        self
    }

    /// 是否没有指定任何上限
    pub fn is_empty(&self) -> bool {
        self.rpm.is_none() && self.rpd.is_none() && self.tpm.is_none() && self.tpd.is_none()
    }
}

/// 准入策略
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdmissionPolicy {
    /// 整个 判断-等待-记录 周期都持有准入闸门。
    /// 后来的调用者即使有余量，也排在正在睡眠的调用者之后（队头阻塞），
    /// 其 [`Admission::throttled`](crate::governor::Admission::throttled) 为 `false`，
    /// 但 `waited` 包含排队时间。
    #[default]
    Strict,
    /// 等待期间释放准入闸门，醒来后无条件记录。
    /// 多个调用者基于同一快照计算等待时，可能短暂超过上限。
    Lenient,
}

impl AdmissionPolicy {
    /// 从字符串解析准入策略
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "strict" => Some(AdmissionPolicy::Strict),
            "lenient" => Some(AdmissionPolicy::Lenient),
            _ => None,
        }
    }

    /// 转换为字符串
    pub fn as_str(&self) -> &'static str {
        match self {
            AdmissionPolicy::Strict => "strict",
            AdmissionPolicy::Lenient => "lenient",
        }
    }
}

/// 调速器配置
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GovernorConfig {
    pub limits: RateLimits,
    pub policy: AdmissionPolicy,
    /// 每次计算等待时追加的安全余量（毫秒）
    pub safety_margin_ms: u64,
    /// 保留的上限变更记录条数
    pub history_capacity: usize,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self {
            limits: RateLimits::default(),
            policy: AdmissionPolicy::default(),
            safety_margin_ms: DEFAULT_SAFETY_MARGIN_MS,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }
}

impl GovernorConfig {
    /// 使用指定上限创建配置，其余取默认值
    pub fn with_limits(limits: RateLimits) -> Self {
        Self {
            limits,
            ..Self::default()
        }
    }

    /// 设置准入策略
    pub fn policy(mut self, policy: AdmissionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 校验配置
    pub fn validate(&self) -> Result<(), GovernorError> {
        self.limits.validate()?;

        if self.history_capacity == 0 {
            return Err(GovernorError::ValidationError(
                "变更记录容量不能为0".to_string(),
            ));
        }

        Ok(())
    }

    /// 安全余量
    pub fn safety_margin(&self) -> Duration {
        Duration::from_millis(self.safety_margin_ms)
    }

    /// 从环境变量加载配置
    ///
    /// 未设置的变量保持默认值，无法解析的值返回 [`GovernorError::ConfigError`]。
    pub fn from_env() -> Result<Self, GovernorError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 通过任意键值查找函数加载配置
    pub fn from_lookup<F>(lookup: F) -> Result<Self, GovernorError>
    where
        F: Fn(&str) -> Option<String>,
    {
        debug!("从环境变量加载调速器配置");

        let mut config = Self::default();

        if let Some(value) = lookup(ENV_RPM) {
            config.limits.rpm = parse_u64(ENV_RPM, &value)?;
        }
        if let Some(value) = lookup(ENV_RPD) {
            config.limits.rpd = parse_u64(ENV_RPD, &value)?;
        }
        if let Some(value) = lookup(ENV_TPM) {
            config.limits.tpm = parse_u64(ENV_TPM, &value)?;
        }
        if let Some(value) = lookup(ENV_TPD) {
            config.limits.tpd = parse_u64(ENV_TPD, &value)?;
        }
        if let Some(value) = lookup(ENV_POLICY) {
            config.policy = AdmissionPolicy::parse(&value).ok_or_else(|| {
                GovernorError::ConfigError(format!(
                    "无效的准入策略: {}, 有效值: [\"strict\", \"lenient\"]",
                    value
                ))
            })?;
        }
        if let Some(value) = lookup(ENV_SAFETY_MARGIN_MS) {
            config.safety_margin_ms = parse_u64(ENV_SAFETY_MARGIN_MS, &value)?;
        }

        config.validate()?;
        Ok(config)
    }

    /// 从 YAML 字符串加载配置
    pub fn from_yaml_str(yaml: &str) -> Result<Self, GovernorError> {
        let config: GovernorConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// 从 TOML 字符串加载配置
    pub fn from_toml_str(toml: &str) -> Result<Self, GovernorError> {
        let config: GovernorConfig = toml::from_str(toml)?;
        config.validate()?;
        Ok(config)
    }

    /// 从文件加载配置，按扩展名选择格式
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, GovernorError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            Some("toml") => Self::from_toml_str(&content),
            Some("json") => {
                let config: GovernorConfig = serde_json::from_str(&content)?;
                config.validate()?;
                Ok(config)
            }
            other => Err(GovernorError::ConfigError(format!(
                "不支持的配置文件格式: {:?}",
                other
            ))),
        }
    }
}

fn parse_u64(key: &str, value: &str) -> Result<u64, GovernorError> {
    value
        .trim()
        .parse()
        .map_err(|e| GovernorError::ConfigError(format!("无效的 {}: {} ({})", key, value, e)))
}

/// 上限变更来源
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ChangeSource {
    /// 手动触发
    Manual { operator: String },
    /// 配置重载
    Config,
    /// API触发
    Api,
}

/// 上限变更记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitChangeRecord {
    pub timestamp: DateTime<Utc>,
    pub old_limits: RateLimits,
    pub new_limits: RateLimits,
    pub source: ChangeSource,
    pub changes: Vec<String>,
}

impl LimitChangeRecord {
    pub fn new(old_limits: RateLimits, new_limits: RateLimits, source: ChangeSource) -> Self {
        Self {
            timestamp: Utc::now(),
            old_limits,
            new_limits,
            source,
            changes: new_limits.diff_changes(&old_limits),
        }
    }
}

/// 上限变更历史
#[derive(Debug, Clone)]
pub struct LimitHistory {
    records: Vec<LimitChangeRecord>,
    max_records: usize,
}

impl LimitHistory {
    pub fn new(max_records: usize) -> Self {
        Self {
            records: Vec::with_capacity(max_records),
            max_records,
        }
    }

    pub fn add_record(&mut self, record: LimitChangeRecord) {
        self.records.push(record);
        if self.records.len() > self.max_records {
            self.records.remove(0);
        }
    }

    pub fn get_records(&self) -> &[LimitChangeRecord] {
        &self.records
    }

    pub fn get_latest(&self) -> Option<&LimitChangeRecord> {
        self.records.last()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

impl Default for LimitHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
