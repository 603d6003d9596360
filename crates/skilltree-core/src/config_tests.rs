//! Config module tests

use crate::config::{Config, ExtractionConfig, GraphConfig, RepairMode};

#[test]
fn test_config_default() {
    let config = Config::default();

    assert!(config.extraction.api_key.is_none());
    assert_eq!(config.extraction.base_url, "https://openrouter.ai/api/v1");
    assert_eq!(config.extraction.max_tokens, 8192);
    assert_eq!(config.graph.lock_timeout_ms, 5_000);
    assert_eq!(config.graph.repair_mode, RepairMode::FixedPoint);
    assert!(config.storage.database_path.is_none());
}

#[test]
fn test_graph_config_durations() {
    let graph = GraphConfig {
        lock_timeout_ms: 250,
        store_timeout_ms: 1_500,
        repair_mode: RepairMode::SinglePass,
    };

    assert_eq!(graph.lock_timeout().as_millis(), 250);
    assert_eq!(graph.store_timeout().as_millis(), 1_500);
}

#[test]
fn test_repair_mode_parse() {
    assert_eq!(RepairMode::parse("single_pass"), Some(RepairMode::SinglePass));
    assert_eq!(RepairMode::parse("Fixed-Point"), Some(RepairMode::FixedPoint));
    assert_eq!(RepairMode::parse("sometimes"), None);
    assert_eq!(RepairMode::SinglePass.as_str(), "single_pass");
}

#[test]
fn test_set_and_get_values() {
    let mut config = Config::default();

    config.set("extraction.model", "openai/gpt-4o-mini").unwrap();
    config.set("extraction.base_url", "http://localhost:8080/v1/").unwrap();
    config.set("extraction.temperature", "0.5").unwrap();
    config.set("graph.repair_mode", "single_pass").unwrap();
    config.set("graph.lock_timeout_ms", "750").unwrap();

    assert_eq!(config.get("extraction.model").unwrap(), "openai/gpt-4o-mini");
    assert_eq!(
        config.get("extraction.base_url").unwrap(),
        "http://localhost:8080/v1"
    );
    assert_eq!(config.get("extraction.temperature").unwrap(), "0.5");
    assert_eq!(config.get("graph.repair_mode").unwrap(), "single_pass");
    assert_eq!(config.graph.lock_timeout_ms, 750);
}

#[test]
fn test_set_rejects_invalid_values() {
    let mut config = Config::default();

    assert!(config.set("extraction.base_url", "ftp://example.com").is_err());
    assert!(config.set("extraction.temperature", "3.5").is_err());
    assert!(config.set("extraction.max_tokens", "lots").is_err());
    assert!(config.set("graph.store_timeout_ms", "0").is_err());
    assert!(config.set("graph.repair_mode", "sometimes").is_err());
    assert!(config.set("no.such.key", "1").is_err());
    assert!(config.get("no.such.key").is_err());
}

#[test]
fn test_api_key_cannot_be_set() {
    let mut config = Config::default();
    let err = config.set("extraction.api_key", "sk-secret").unwrap_err();
    assert!(err.to_string().contains("environment variable"));
}

#[test]
fn test_api_key_in_file_is_rejected() {
    let contents = r#"
        [extraction]
        api_key = "sk-secret"
        model = "m"
    "#;
    let config: Config = toml::from_str(contents).unwrap();

    assert!(config.validate().is_err());
    assert!(config.extraction.enforce_env_only().is_err());
}

#[test]
fn test_api_key_never_serialized() {
    let config = Config {
        extraction: ExtractionConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        },
        ..Default::default()
    };

    let serialized = toml::to_string_pretty(&config).unwrap();
    assert!(!serialized.contains("sk-secret"));
}

#[test]
fn test_partial_file_uses_defaults() {
    let config: Config = toml::from_str("[graph]\nrepair_mode = \"single_pass\"\n").unwrap();

    assert_eq!(config.graph.repair_mode, RepairMode::SinglePass);
    assert_eq!(config.graph.lock_timeout_ms, 5_000);
    assert_eq!(config.extraction.timeout_secs, 120);
    assert!(config.validate().is_ok());
}

#[test]
fn test_zero_timeout_fails_validation() {
    let mut config = Config::default();
    config.graph.store_timeout_ms = 0;
    assert!(config.validate().is_err());
}
