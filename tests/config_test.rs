use reclimit::config::{AppConfig, ConfigManager};
use reclimit::{CoercionPolicy, ErrorKind};
use std::fs;
use tempfile::TempDir;

// Helper to create a temporary config directory for testing
fn setup_test_config_dir() -> (TempDir, ConfigManager) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let config_manager = ConfigManager::with_dir(temp_dir.path().to_path_buf());
    (temp_dir, config_manager)
}

#[test]
fn test_default_config() {
    let config = AppConfig::default();

    assert_eq!(config.version, "0.1");
    assert_eq!(config.engine.coercion_policy, "row");
    assert_eq!(config.limits.default_max_rows, Some(100));
    assert_eq!(config.file_loading.delimiter, None);
    assert_eq!(config.file_loading.excel_sheet, None);
    assert_eq!(config.file_loading.max_upload_mb, None);
    assert_eq!(config.storage.upload_dir, None);
    assert_eq!(config.logging.level, "info");
    assert!(!config.logging.log_to_file);

    assert_eq!(config.coercion_policy().unwrap(), CoercionPolicy::RowScoped);
    assert_eq!(config.file_options().delimiter, b',');
}

#[test]
fn test_generate_default_config() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let template = config_manager.generate_default_config().unwrap();

    assert!(template.contains("# [engine]"));
    assert!(template.contains("# [limits]"));
    assert!(template.contains("# [file_loading]"));
    assert!(template.contains("# [storage]"));
    assert!(template.contains("# [logging]"));
    assert!(template.contains("# coercion_policy = \"row\""));
    assert!(template.contains("# default_max_rows = 100"));

    // Everything is commented out, so the template alone parses to defaults
    let parsed: AppConfig = toml::from_str(&template).unwrap();
    assert_eq!(parsed, AppConfig::default());
}

#[test]
fn test_write_default_config_refuses_overwrite() {
    let (_temp_dir, config_manager) = setup_test_config_dir();

    let path = config_manager.write_default_config(false).unwrap();
    assert!(path.exists());

    let err = config_manager.write_default_config(false).unwrap_err();
    assert!(err.to_string().contains("--force"));
    assert_eq!(err.kind(), ErrorKind::Validation);

    fs::write(&path, "garbage").unwrap();
    config_manager.write_default_config(true).unwrap();
    assert!(fs::read_to_string(&path).unwrap().contains("# [engine]"));
}

#[test]
fn test_load_without_file_uses_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_load_user_config() {
    let (temp_dir, config_manager) = setup_test_config_dir();
    let upload_dir = temp_dir.path().join("up");
    fs::write(
        config_manager.config_path("config.toml"),
        format!(
            r#"
[engine]
coercion_policy = "column"

[limits]
default_max_rows = 25

[file_loading]
delimiter = 59
excel_sheet = "Sales"
max_upload_mb = 4

[storage]
upload_dir = {:?}

[logging]
level = "debug"
"#,
            upload_dir.display().to_string()
        ),
    )
    .unwrap();

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert_eq!(
        config.coercion_policy().unwrap(),
        CoercionPolicy::ColumnScoped
    );
    assert_eq!(config.limits.default_max_rows, Some(25));
    let options = config.file_options();
    assert_eq!(options.delimiter, b';');
    assert_eq!(options.excel_sheet.as_deref(), Some("Sales"));
    assert_eq!(config.logging.level, "debug");

    let store = config.upload_store("reclimit").unwrap();
    assert_eq!(store.dir(), upload_dir.as_path());
    assert_eq!(store.max_bytes(), 4 * 1024 * 1024);
}

#[test]
fn test_partial_config_keeps_other_defaults() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    fs::write(
        config_manager.config_path("config.toml"),
        "[logging]\nlog_to_file = true\n",
    )
    .unwrap();

    let config = AppConfig::load_from(&config_manager).unwrap();
    assert!(config.logging.log_to_file);
    assert_eq!(config.logging.level, "info");
    assert_eq!(config.limits.default_max_rows, Some(100));
}

#[test]
fn test_invalid_config_names_the_file() {
    let (_temp_dir, config_manager) = setup_test_config_dir();
    let path = config_manager.config_path("config.toml");

    fs::write(&path, "[engine]\ncoercion_policy = \"cell\"\n").unwrap();
    let err = AppConfig::load_from(&config_manager).unwrap_err();
    assert!(err.to_string().contains("config.toml"), "{}", err);

    fs::write(&path, "[limits\n").unwrap();
    let err = AppConfig::load_from(&config_manager).unwrap_err();
    assert!(err.to_string().contains("failed to parse"), "{}", err);
}
