use super::*;

#[test]
fn test_default_config() {
    let config = ValidatorConfig::default();
    assert_eq!(config.compliance_threshold, 80.0);
    assert_eq!(config.batch_size, 100);
    assert_eq!(config.max_breaker_retries, 10);
    assert_eq!(config.rules.max_words_per_line, 15);
    assert_eq!(config.rules.min_identifier_length, 5);
    assert_eq!(config.rules.max_identifier_length, 30);
    assert_eq!(config.monitor.memory_limit_bytes, 1 << 30);
    assert_eq!(config.monitor.cpu_limit_percent, 10.0);
    assert_eq!(config.monitor.network_limit_percent, 5.0);
    assert_eq!(config.monitor.cooldown_ms, 60_000);
    assert_eq!(config.rules.abbreviations.get("btn").map(String::as_str), Some("button"));
    assert_eq!(config.rules.abbreviations.len(), 14);
}

#[test]
fn test_missing_default_config_uses_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let config = load_config(dir.path(), None).unwrap();
    assert_eq!(config.batch_size, 100);
}

#[test]
fn test_missing_explicit_config_is_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = load_config(dir.path(), Some(Path::new("/definitely/not/here.json"))).unwrap_err();
    assert!(matches!(err, ValidatorError::Configuration(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn test_validator_section_is_preferred() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("master.json"),
        r#"{
            "meta": { "version": "38.0.0" },
            "batch_size": 7,
            "validator": {
                "compliance_threshold": 92.5,
                "batch_size": 25,
                "rules": { "max_line_length": 100 }
            }
        }"#,
    )
    .unwrap();

    let config = load_config(dir.path(), None).unwrap();
    assert_eq!(config.compliance_threshold, 92.5);
    assert_eq!(config.batch_size, 25);
    assert_eq!(config.rules.max_line_length, 100);
    // Untouched nested keys keep their defaults
    assert_eq!(config.rules.max_words_per_line, 15);
}

#[test]
fn test_top_level_keys_without_section() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("master.json"),
        r#"{ "batch_size": 3, "monitor": { "cpu_limit_percent": 50.0 } }"#,
    )
    .unwrap();

    let config = load_config(dir.path(), None).unwrap();
    assert_eq!(config.batch_size, 3);
    assert_eq!(config.monitor.cpu_limit_percent, 50.0);
}

#[test]
fn test_malformed_config_falls_back() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("master.json"), "{ not json").unwrap();
    let config = load_config(dir.path(), None).unwrap();
    assert_eq!(config.compliance_threshold, 80.0);

    std::fs::write(dir.path().join("master.json"), r#"{ "batch_size": "lots" }"#).unwrap();
    let config = load_config(dir.path(), None).unwrap();
    assert_eq!(config.batch_size, 100);
}

#[test]
fn test_toml_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("validator.toml");
    std::fs::write(
        &path,
        "[validator]\ncompliance_threshold = 70.0\nexclude = [\"**/generated/**\"]\n\n[validator.monitor]\nsampler = \"real\"\n",
    )
    .unwrap();

    let config = load_config(dir.path(), Some(&path)).unwrap();
    assert_eq!(config.compliance_threshold, 70.0);
    assert_eq!(config.monitor.sampler, SamplerKind::Real);
    assert!(config.exclude_patterns().contains(&"**/generated/**".to_string()));
}

#[test]
fn test_sanitize_clamps() {
    let mut config = ValidatorConfig {
        compliance_threshold: 140.0,
        batch_size: 0,
        ..Default::default()
    };
    config.sanitize();
    assert_eq!(config.compliance_threshold, 100.0);
    assert_eq!(config.batch_size, 1);
}

#[test]
fn test_exclude_patterns_merge() {
    let config = ValidatorConfig {
        exclude: vec!["**/vendor/**".into(), "docs/**".into()],
        ..Default::default()
    };
    let patterns = config.exclude_patterns();
    assert_eq!(
        patterns.iter().filter(|p| p.as_str() == "**/vendor/**").count(),
        1
    );
    assert!(patterns.contains(&"docs/**".to_string()));

    let bare = ValidatorConfig {
        skip_default_excludes: true,
        exclude: vec!["docs/**".into()],
        ..Default::default()
    };
    assert_eq!(bare.exclude_patterns(), vec!["docs/**".to_string()]);
}

#[test]
fn test_report_path_resolution() {
    let root = Path::new("/repo");
    let config = ValidatorConfig::default();
    assert_eq!(config.report_path_for(root), root.join("run_report.json"));

    let relative = ValidatorConfig {
        report_path: Some("out/report.json".into()),
        ..Default::default()
    };
    assert_eq!(relative.report_path_for(root), root.join("out/report.json"));
}

#[test]
fn test_effective_workers_bounded_by_cpus() {
    let cpus = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(1);
    let config = ValidatorConfig {
        workers: Some(10_000),
        ..Default::default()
    };
    assert_eq!(config.effective_workers(), cpus);
    let config = ValidatorConfig {
        workers: Some(0),
        ..Default::default()
    };
    assert_eq!(config.effective_workers(), 1);
}
