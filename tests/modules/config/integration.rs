//! 配置模块集成测试
//!
//! 测试从文件加载配置以及加载后的配置驱动调速器

use quotagate::{AdmissionPolicy, GovernorConfig, GovernorError, RateGovernor, RateLimits};
use std::io::Write;
use tempfile::{Builder, NamedTempFile};

fn config_file(suffix: &str, content: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// 测试从 YAML 文件加载
#[test]
fn test_load_yaml_file() {
    let file = config_file(
        ".yaml",
        r#"
limits:
  rpm: 30
  rpd: 500
  tpm: 90000
  tpd: 400000
policy: lenient
safety_margin_ms: 250
"#,
    );

    let config = GovernorConfig::from_file(file.path()).unwrap();
    assert_eq!(config.limits, RateLimits::new(30, 500, 90_000, 400_000));
    assert_eq!(config.policy, AdmissionPolicy::Lenient);
    assert_eq!(config.safety_margin_ms, 250);
}

/// 测试从 TOML 文件加载，未指定的字段取默认值
#[test]
fn test_load_toml_file_with_defaults() {
    let file = config_file(
        ".toml",
        r#"
[limits]
rpm = 10
"#,
    );

    let config = GovernorConfig::from_file(file.path()).unwrap();
    assert_eq!(config.limits.rpm, 10);
    assert_eq!(config.limits.rpd, 1_000);
    assert_eq!(config.limits.tpm, 200_000);
    assert_eq!(config.limits.tpd, 1_000_000);
    assert_eq!(config.policy, AdmissionPolicy::Strict);
}

/// 测试从 JSON 文件加载
#[test]
fn test_load_json_file() {
    let file = config_file(
        ".json",
        r#"{"limits": {"rpm": 5, "rpd": 50, "tpm": 5000, "tpd": 50000}, "policy": "strict"}"#,
    );

    let config = GovernorConfig::from_file(file.path()).unwrap();
    assert_eq!(config.limits, RateLimits::new(5, 50, 5_000, 50_000));
}

/// 测试文件中的零上限被拒绝
#[test]
fn test_file_with_zero_limit_rejected() {
    let file = config_file(".yml", "limits:\n  tpd: 0\n");

    let result = GovernorConfig::from_file(file.path());
    assert!(matches!(result, Err(GovernorError::ConfigError(_))));
}

/// 测试不支持的扩展名
#[test]
fn test_unsupported_extension() {
    let file = config_file(".ini", "rpm=10\n");

    let result = GovernorConfig::from_file(file.path());
    assert!(matches!(result, Err(GovernorError::ConfigError(_))));
}

/// 测试文件不存在
#[test]
fn test_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let result = GovernorConfig::from_file(dir.path().join("governor.yaml"));
    assert!(matches!(result, Err(GovernorError::IoError(_))));
}

/// 测试格式错误的 YAML
#[test]
fn test_malformed_yaml() {
    let file = config_file(".yaml", "limits: [not, a, map]\n");

    let result = GovernorConfig::from_file(file.path());
    assert!(matches!(result, Err(GovernorError::YamlError(_))));
}

/// 测试从文件加载的配置驱动调速器
#[tokio::test(start_paused = true)]
async fn test_file_config_drives_governor() {
    let file = config_file(
        ".toml",
        r#"
policy = "strict"
safety_margin_ms = 500

[limits]
rpm = 1
rpd = 100
tpm = 1000
tpd = 10000
"#,
    );

    let governor = RateGovernor::new(GovernorConfig::from_file(file.path()).unwrap()).unwrap();
    assert_eq!(governor.safety_margin(), std::time::Duration::from_millis(500));

    governor.acquire(10).await;
    let admission = governor.acquire(10).await;

    // 60 - 0 + 0.5
    assert!(admission.throttled);
    assert!(admission.waited >= std::time::Duration::from_millis(60_500));
    assert!(admission.waited < std::time::Duration::from_millis(60_550));
}

/// 测试通过注入的环境查找加载配置
#[test]
fn test_lookup_overrides_defaults() {
    let config = GovernorConfig::from_lookup(|key| match key {
        "GOVERNOR_RPM" => Some("12".to_string()),
        "GOVERNOR_POLICY" => Some("Lenient".to_string()),
        _ => None,
    })
    .unwrap();

    assert_eq!(config.limits.rpm, 12);
    assert_eq!(config.limits.tpm, 200_000);
    assert_eq!(config.policy, AdmissionPolicy::Lenient);
}
