//! Configuration loading tests: YAML file handling and runtime env parsing.

use std::io::Write;
use std::time::Duration;

use opdispatch::config::{ConfigError, RuntimeConfig, ServiceConfig, DEFAULT_STACK_SIZE};

mod common;

#[test]
fn loads_a_config_file() {
    common::setup();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(
        file,
        r#"
service:
  name: billing
  version: v3
  port: 8080
gateway:
  host: gw.internal
  timeout_ms: 750
"#
    )
    .unwrap();

    let config = ServiceConfig::from_file(file.path()).unwrap();
    assert_eq!(config.service.name, "billing");
    assert_eq!(config.service.version, "v3");
    assert_eq!(config.service.port, 8080);
    assert_eq!(config.gateway.host, "gw.internal");
    assert_eq!(config.gateway.timeout(), Duration::from_millis(750));
    // Unset sections keep their defaults.
    assert_eq!(config.gateway.port, 3500);
    assert!(config.auth.scope.is_none());
}

#[test]
fn missing_file_is_an_io_error() {
    common::setup();
    let err = ServiceConfig::from_file(std::path::Path::new("/nonexistent/config.yaml"))
        .unwrap_err();
    assert!(matches!(err, ConfigError::Io(_)));
}

#[test]
fn invalid_yaml_is_a_parse_error() {
    common::setup();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    write!(file, "service: [not, a, mapping]").unwrap();
    let err = ServiceConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse(_)));
}

#[test]
fn stack_size_parses_decimal_and_hex() {
    common::setup();
    // Env mutation is process-global; keep both cases in one test.
    std::env::set_var("OPD_STACK_SIZE", "0x8000");
    assert_eq!(RuntimeConfig::from_env().stack_size, 0x8000);

    std::env::set_var("OPD_STACK_SIZE", "16384");
    assert_eq!(RuntimeConfig::from_env().stack_size, 16384);

    std::env::set_var("OPD_STACK_SIZE", "garbage");
    assert_eq!(RuntimeConfig::from_env().stack_size, DEFAULT_STACK_SIZE);

    std::env::remove_var("OPD_STACK_SIZE");
    assert_eq!(RuntimeConfig::from_env().stack_size, DEFAULT_STACK_SIZE);
}
