use slideshow_engine::config::{EngineConfig, PerformanceThresholds};
use slideshow_engine::state::PerformanceLevel;
use std::io::Write;
use std::time::Duration;

#[test]
fn empty_document_uses_defaults() {
    let cfg: EngineConfig = serde_yaml::from_str("{}").unwrap();
    assert_eq!(cfg, EngineConfig::default());
    assert_eq!(cfg.base_slide_duration, Duration::from_secs(20));
    assert_eq!(cfg.resume_delay, Duration::from_secs(3));
    assert!(cfg.pause_on_interaction);
}

#[test]
fn parse_kebab_case_with_humantime_durations() {
    let yaml = r#"
base-slide-duration: 30s
transition-duration: 250ms
pause-on-interaction: false
resume-delay: 1m
remote-control-enabled: false
error-backoff: 10s
min-fps-for-advance: 12.5
carousel-init-attempts: 5
"#;
    let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
    assert_eq!(cfg.base_slide_duration, Duration::from_secs(30));
    assert_eq!(cfg.transition_duration, Duration::from_millis(250));
    assert!(!cfg.pause_on_interaction);
    assert_eq!(cfg.resume_delay, Duration::from_secs(60));
    assert!(!cfg.remote_control_enabled);
    assert_eq!(cfg.error_backoff, Duration::from_secs(10));
    assert!((cfg.min_fps_for_advance - 12.5).abs() < f64::EPSILON);
    assert_eq!(cfg.carousel_init_attempts, 5);
    // untouched keys keep their defaults
    assert_eq!(cfg.progress_resolution, Duration::from_millis(100));
    assert!(cfg.validated().is_ok());
}

#[test]
fn parse_nested_performance_thresholds() {
    let yaml = r#"
performance:
  premium-fps: 58
  memory-pressure-mb: 256
"#;
    let cfg: EngineConfig = serde_yaml::from_str(yaml).unwrap();
    assert!((cfg.performance.premium_fps - 58.0).abs() < f64::EPSILON);
    assert!((cfg.performance.high_fps - 45.0).abs() < f64::EPSILON);
    assert_eq!(
        cfg.performance.classify(56.0, 100.0),
        PerformanceLevel::High
    );
    assert_eq!(
        cfg.performance.classify(60.0, 300.0),
        PerformanceLevel::High
    );
}

#[test]
fn unknown_keys_are_rejected() {
    let yaml = r#"
base-slide-duration: 20s
slide-duration-typo: 5s
"#;
    assert!(serde_yaml::from_str::<EngineConfig>(yaml).is_err());
}

#[test]
fn malformed_duration_is_rejected() {
    assert!(serde_yaml::from_str::<EngineConfig>("resume-delay: soon").is_err());
}

#[test]
fn validation_rejects_impossible_values() {
    let zero_base: EngineConfig = serde_yaml::from_str("base-slide-duration: 0s").unwrap();
    let err = zero_base.validated().unwrap_err();
    assert!(format!("{err}").contains("base-slide-duration"));

    let coarse: EngineConfig = serde_yaml::from_str(
        "base-slide-duration: 1s\nprogress-resolution: 2s",
    )
    .unwrap();
    assert!(coarse.validated().is_err());

    let inverted = EngineConfig {
        performance: PerformanceThresholds {
            premium_fps: 20.0,
            basic_fps: 50.0,
            ..PerformanceThresholds::default()
        },
        ..EngineConfig::default()
    };
    assert!(inverted.validated().is_err());
}

#[test]
fn load_from_yaml_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "base-slide-duration: 45s").unwrap();
    writeln!(file, "auto-hide-delay: 2s").unwrap();

    let cfg = EngineConfig::from_yaml_file(file.path())
        .unwrap()
        .validated()
        .unwrap();
    assert_eq!(cfg.base_slide_duration, Duration::from_secs(45));
    assert_eq!(cfg.auto_hide_delay, Duration::from_secs(2));
}

#[test]
fn missing_file_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.yaml");
    let err = EngineConfig::from_yaml_file(&path).unwrap_err();
    assert!(format!("{err:#}").contains("absent.yaml"));
}
