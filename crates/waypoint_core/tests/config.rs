use std::path::PathBuf;
use waypoint_core::config::{ConfigError, CoreConfig, DEFAULT_PAGE_SIZE};

#[test]
fn empty_document_yields_defaults() {
    let config = CoreConfig::from_toml_str("").unwrap();

    assert_eq!(config, CoreConfig::default());
    assert_eq!(config.remote.page_size, DEFAULT_PAGE_SIZE);
    assert!(!config.sync.enabled_by_default);
    assert!(config.data_dir.ends_with("waypoint"));
}

#[test]
fn sections_override_defaults_and_derive_paths() {
    let config = CoreConfig::from_toml_str(
        r#"
data_dir = "/srv/waypoint"

[logging]
level = "warn"
dir = "/var/log/waypoint"

[remote]
page_size = 25

[sync]
enabled_by_default = true
"#,
    )
    .unwrap();

    assert_eq!(config.logging.level, "warn");
    assert_eq!(config.remote.page_size, 25);
    assert!(config.sync.enabled_by_default);
    assert_eq!(config.settings_db_path(), PathBuf::from("/srv/waypoint/settings.db"));
    assert_eq!(config.store_dir(), PathBuf::from("/srv/waypoint/store"));
    assert_eq!(config.log_dir(), PathBuf::from("/var/log/waypoint"));
}

#[test]
fn log_dir_defaults_under_data_dir() {
    let config = CoreConfig::from_toml_str("data_dir = \"/srv/waypoint\"").unwrap();
    assert_eq!(config.log_dir(), PathBuf::from("/srv/waypoint/logs"));
}

#[test]
fn zero_page_size_is_rejected() {
    let err = CoreConfig::from_toml_str("[remote]\npage_size = 0").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(message) if message.contains("page_size")));
}

#[test]
fn relative_log_dir_is_rejected() {
    let err = CoreConfig::from_toml_str("[logging]\ndir = \"logs\"").unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(message) if message.contains("absolute")));
}

#[test]
fn unknown_level_and_keys_are_rejected() {
    assert!(matches!(
        CoreConfig::from_toml_str("[logging]\nlevel = \"chatty\""),
        Err(ConfigError::Invalid(_))
    ));
    assert!(matches!(
        CoreConfig::from_toml_str("colour = \"blue\""),
        Err(ConfigError::Parse(_))
    ));
}

#[test]
fn load_reads_files_and_reports_missing_ones() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("waypoint.toml");

    assert!(matches!(
        CoreConfig::load(&path),
        Err(ConfigError::Read { .. })
    ));
    assert_eq!(
        CoreConfig::load_or_default(&path).unwrap(),
        CoreConfig::default()
    );

    std::fs::write(&path, "[remote]\npage_size = 7\n").unwrap();
    assert_eq!(CoreConfig::load(&path).unwrap().remote.page_size, 7);
}
