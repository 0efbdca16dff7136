//! Unit tests for configuration parsing, defaults, and validation.

use std::io::Write;
use std::time::Duration;

use sessionherd::GlobalConfig;

const MINIMAL: &str = r#"
credentials_path = "data.txt"
proxies_path = "proxy.txt"

[driver]
command = "session-runner"
"#;

#[test]
fn minimal_config_gets_documented_defaults() {
    let config = GlobalConfig::from_toml_str(MINIMAL).unwrap();
    assert_eq!(config.orchestrator.stagger_seconds, 30);
    assert_eq!(config.orchestrator.max_launching, 3);
    assert_eq!(config.orchestrator.shutdown_deadline_seconds, 30);
    assert_eq!(config.health.probe_interval_seconds, 30);
    assert_eq!(config.health.failure_threshold, 3);
    assert_eq!(config.retry.max_attempts, 5);
    assert_eq!(config.retry.base_delay_ms, 1000);
    assert_eq!(config.driver.memory_limit_mb, 512);
    assert!(config.driver.debug_base_port.is_none());
}

#[test]
fn retry_policy_converts_milliseconds() {
    let config = GlobalConfig::from_toml_str(MINIMAL).unwrap();
    let policy = config.retry_policy();
    assert_eq!(policy.max_attempts, 5);
    assert_eq!(policy.base_delay, Duration::from_millis(1000));
    assert_eq!(policy.max_delay, Duration::from_millis(60_000));
}

#[test]
fn explicit_values_override_defaults() {
    let raw = r#"
credentials_path = "accounts.txt"
proxies_path = "proxies.txt"

[driver]
command = "runner"
args = ["--headless"]
memory_limit_mb = 256
debug_base_port = 9222

[orchestrator]
stagger_seconds = 10
max_launching = 2

[health]
failure_threshold = 5

[retry]
max_attempts = 7
"#;
    let config = GlobalConfig::from_toml_str(raw).unwrap();
    assert_eq!(config.orchestrator.stagger_seconds, 10);
    assert_eq!(config.orchestrator.max_launching, 2);
    assert_eq!(config.health.failure_threshold, 5);
    assert_eq!(config.retry.max_attempts, 7);
    assert_eq!(config.driver.args, vec!["--headless".to_owned()]);
    assert_eq!(config.driver.debug_base_port, Some(9222));
}

#[test]
fn zero_ceiling_is_rejected() {
    let raw = format!("{MINIMAL}\n[orchestrator]\nmax_launching = 0\n");
    let err = GlobalConfig::from_toml_str(&raw).unwrap_err();
    assert!(err.to_string().contains("max_launching"));
}

#[test]
fn zero_threshold_and_zero_attempts_are_rejected() {
    let raw = r#"
credentials_path = "data.txt"
proxies_path = "proxy.txt"

[driver]
command = "runner"

[health]
failure_threshold = 0
"#;
    assert!(GlobalConfig::from_toml_str(raw).is_err());

    let raw = r#"
credentials_path = "data.txt"
proxies_path = "proxy.txt"

[driver]
command = "runner"

[retry]
max_attempts = 0
"#;
    assert!(GlobalConfig::from_toml_str(raw).is_err());
}

#[test]
fn blank_driver_command_is_rejected() {
    let raw = r#"
credentials_path = "data.txt"
proxies_path = "proxy.txt"

[driver]
command = "  "
"#;
    let err = GlobalConfig::from_toml_str(raw).unwrap_err();
    assert!(err.to_string().contains("driver.command"));
}

#[test]
fn missing_driver_section_is_rejected() {
    let raw = r#"
credentials_path = "data.txt"
proxies_path = "proxy.txt"
"#;
    assert!(GlobalConfig::from_toml_str(raw).is_err());
}

#[test]
fn load_from_path_reads_a_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(MINIMAL.as_bytes()).unwrap();
    let config = GlobalConfig::load_from_path(file.path()).unwrap();
    assert_eq!(config.driver.command, "session-runner");
}

#[test]
fn load_from_missing_path_fails() {
    let err = GlobalConfig::load_from_path("/definitely/not/here.toml").unwrap_err();
    assert!(err.to_string().starts_with("config:"));
}
