use solivia::config::{Config, InverterConfig};
use solivia::error::SoliviaError;
use std::fs;

#[test]
fn save_and_load_yaml_roundtrip() {
    let tmp_dir = tempfile::tempdir().unwrap();
    let path = tmp_dir.path().join("config.yaml");

    let mut cfg = Config::default();
    cfg.serial.port = "/dev/ttyAMA0".to_string();
    cfg.inverters = vec![
        InverterConfig {
            address: 1,
            throttle_ms: 10_000,
            fields: None,
        },
        InverterConfig {
            address: 2,
            throttle_ms: 30_000,
            fields: None,
        },
    ];

    cfg.save_to_file(&path).unwrap();
    let loaded = Config::from_file(&path).unwrap();

    assert_eq!(loaded.serial.port, "/dev/ttyAMA0");
    assert_eq!(loaded.inverters.len(), 2);
    assert_eq!(loaded.inverters[1].throttle_ms, 30_000);
}

#[test]
fn config_validation_errors() {
    let mut cfg = Config::default();

    // Empty serial port
    cfg.serial.port.clear();
    assert!(cfg.validate().is_err());

    // Zero baud rate
    cfg = Config::default();
    cfg.serial.baud_rate = 0;
    assert!(cfg.validate().is_err());

    // Update interval zero
    cfg = Config::default();
    cfg.update_interval_ms = 0;
    assert!(cfg.validate().is_err());

    // No inverters
    cfg = Config::default();
    cfg.inverters.clear();
    assert!(matches!(cfg.validate(), Err(SoliviaError::NoInverters)));

    // Duplicate addresses
    cfg = Config::default();
    cfg.inverters = vec![
        InverterConfig {
            address: 7,
            ..InverterConfig::default()
        },
        InverterConfig {
            address: 7,
            ..InverterConfig::default()
        },
    ];
    assert!(matches!(
        cfg.validate(),
        Err(SoliviaError::DuplicateAddress { address: 7 })
    ));
}

#[test]
fn from_file_with_invalid_yaml_fails() {
    let tmp = tempfile::NamedTempFile::new().unwrap();
    fs::write(tmp.path(), ":\n  - not valid yaml {").unwrap();
    assert!(Config::from_file(tmp.path()).is_err());
}

#[test]
fn missing_throttle_defaults_to_ten_seconds() {
    let yaml = r#"
serial:
  port: /dev/ttyUSB0
  baud_rate: 19200
  response_timeout_ms: 300
inverters:
  - address: 1
update_interval_ms: 1000
logging:
  level: INFO
  file: /tmp/solivia.log
  backup_count: 5
  console_output: true
  json_format: false
"#;
    let cfg: Config = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.inverters[0].throttle_ms, 10_000);
    assert!(cfg.validate().is_ok());
}
