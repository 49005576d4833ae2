//! Integration tests for tripwire-config

use std::io::Write;
use std::time::Duration;
use temp_env::with_vars;
use tripwire_config::domains::logging::{LogFormat, LogLevel};
use tripwire_config::*;

#[test]
fn test_default_config_validation() {
    let config = TripwireConfig::default();
    assert!(config.validate_all().is_ok());
}

#[test]
fn test_config_loader_from_env() {
    let vars = vec![
        ("TRIPWIRE_TARGET_URL", Some("http://10.0.0.5:9000/search")),
        ("TRIPWIRE_TARGET_TIMEOUT", Some("3")),
        ("TRIPWIRE_STORAGE_ENABLED", Some("false")),
        ("TRIPWIRE_LOG_LEVEL", Some("debug")),
        ("TRIPWIRE_LOG_FORMAT", Some("json")),
    ];

    with_vars(vars, || {
        let config = ConfigLoader::new().from_env().unwrap();

        assert_eq!(config.target.url, "http://10.0.0.5:9000/search");
        assert_eq!(config.target.timeout, Duration::from_secs(3));
        assert!(!config.storage.enabled);
        assert_eq!(config.logging.level, LogLevel::Debug);
        assert_eq!(config.logging.format, LogFormat::Json);
    });
}

#[test]
fn test_invalid_env_value_is_rejected() {
    with_vars(vec![("TRIPWIRE_TARGET_TIMEOUT", Some("soon"))], || {
        let err = ConfigLoader::new().from_env().unwrap_err();
        assert!(matches!(err, ConfigError::Env(_)));
    });
}

#[test]
fn test_comprehensive_config() {
    let yaml = r#"
target:
  url: "http://127.0.0.1:8080/query"
  timeout: 5
  top_k: 20

storage:
  enabled: true
  url: "sqlite::memory:"
  connect_timeout: 500
  operation_timeout: 250

query_bank:
  path: "/data/queries.txt"

guards:
  guardrail:
    p95_threshold_ms: 750
  watchdog:
    no_progress_secs: 15
    latency_threshold_ms: 4000

breaker:
  failure_threshold: 5
  cooldown: 3s

logging:
  level: warn
  format: compact

overrides:
  candidate_k: 600
  rerank_top_k: 120
"#;

    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();

    let config = with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        ConfigLoader::new().from_file(file.path()).unwrap()
    });

    assert_eq!(config.target.top_k, 20);
    assert_eq!(config.storage.operation_timeout, Duration::from_millis(250));
    assert_eq!(config.storage.qa_feed_max, 200);
    assert_eq!(config.guards.guardrail.p95_threshold_ms, 750.0);
    assert!(config.guards.watchdog.enabled);
    assert_eq!(config.breaker.failure_threshold, 5);
    assert_eq!(config.breaker.cooldown, Duration::from_secs(3));
    assert_eq!(config.logging.level, LogLevel::Warn);
    assert_eq!(
        config.overrides.get("candidate_k"),
        Some(&serde_json::json!(600))
    );
}

#[test]
fn test_unknown_override_fails_validation() {
    let yaml = "overrides:\n  warp_factor: 9\n";
    let err = with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        ConfigLoader::new().from_yaml_str(yaml).unwrap_err()
    });
    assert!(matches!(err, ConfigError::Domain { .. }));
}

#[test]
fn test_partial_ground_truth_fails_validation() {
    let yaml = "query_bank:\n  ground_truth_queries: /tmp/q.tsv\n";
    let result = with_vars(Vec::<(&str, Option<&str>)>::new(), || {
        ConfigLoader::new().from_yaml_str(yaml)
    });
    assert!(result.is_err());
}

#[test]
fn test_sample_config_round_trips() {
    let yaml = TripwireConfig::generate_sample();
    let parsed: TripwireConfig = serde_yaml::from_str(&yaml).unwrap();
    assert!(parsed.validate_all().is_ok());
}
