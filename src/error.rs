//! Copyright (c) 2026, Kirky.X
//!
//! MIT License
//!
//! 错误类型定义
//!
//! 使用thiserror定义所有错误类型。调速器在正常运行时不会产生错误，
//! 配额压力一律通过延迟处理，错误只来自配置。

use thiserror::Error;

/// 调速器错误类型
#[derive(Error, Debug)]
pub enum GovernorError {
    /// 配置错误
    #[error("配置错误: {0}")]
    ConfigError(String),

    /// 验证错误
    #[error("验证错误: {0}")]
    ValidationError(String),

    /// IO错误
    #[error("IO错误: {0}")]
    IoError(#[from] std::io::Error),

    /// 序列化错误
    #[error("序列化错误: {0}")]
    SerdeError(#[from] serde_json::Error),

    /// YAML解析错误
    #[error("YAML解析错误: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// TOML解析错误
    #[error("TOML解析错误: {0}")]
    TomlError(#[from] toml::de::Error),

    /// 指标注册错误
    #[cfg(feature = "monitoring")]
    #[error("指标错误: {0}")]
    MetricsError(String),
}

#[cfg(feature = "monitoring")]
impl From<prometheus::Error> for GovernorError {
    fn from(err: prometheus::Error) -> Self {
        GovernorError::MetricsError(err.to_string())
    }
}
