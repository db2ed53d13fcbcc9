//! Player configuration file tests

use dracin_common::config::CONFIG_ENV_VAR;
use dracin_player::config::{ConfigOverrides, TomlConfig};
use dracin_player::Error;
use serial_test::serial;
use std::io::Write;
use std::path::Path;
use std::time::Duration;
use tempfile::NamedTempFile;

fn config_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
#[serial]
fn test_resolve_from_cli_path() {
    let file = config_file(
        r#"
[backend]
base_url = "https://dracin.example.com"
request_timeout_secs = 4

[player]
sync_interval_secs = 15.0
auto_advance_secs = 8

[logging]
level = "debug"
"#,
    );

    let config = TomlConfig::resolve(Some(file.path())).unwrap();

    assert_eq!(config.backend.base_url, "https://dracin.example.com");
    assert_eq!(config.backend.request_timeout(), Duration::from_secs(4));
    assert_eq!(config.player.sync_interval(), Duration::from_secs(15));
    assert_eq!(config.player.auto_advance_secs, 8);
    // Unset keys keep their defaults
    assert_eq!(config.player.sync_debounce_secs, 5.0);
    assert_eq!(config.logging.level, "debug");
}

#[test]
#[serial]
fn test_resolve_from_environment() {
    let file = config_file("[player]\ncontrols_hide_secs = 2.0\n");

    std::env::set_var(CONFIG_ENV_VAR, file.path());
    let config = TomlConfig::resolve(None);
    std::env::remove_var(CONFIG_ENV_VAR);

    let config = config.unwrap();
    assert_eq!(config.player.controls_hide_delay(), Duration::from_secs(2));
}

#[test]
#[serial]
fn test_cli_path_wins_over_environment() {
    let env_file = config_file("[logging]\nlevel = \"warn\"\n");
    let cli_file = config_file("[logging]\nlevel = \"trace\"\n");

    std::env::set_var(CONFIG_ENV_VAR, env_file.path());
    let config = TomlConfig::resolve(Some(cli_file.path()));
    std::env::remove_var(CONFIG_ENV_VAR);

    assert_eq!(config.unwrap().logging.level, "trace");
}

#[test]
#[serial]
fn test_missing_explicit_file_is_an_error() {
    let result = TomlConfig::resolve(Some(Path::new("/nonexistent/dracin/config.toml")));
    assert!(
        matches!(&result, Err(Error::Config(msg)) if msg.contains("Failed to read")),
        "got {:?}",
        result.map(|_| ())
    );
}

#[test]
#[serial]
fn test_unparsable_file_is_a_config_error() {
    let file = config_file("[player\nsync_interval_secs = ");
    let result = TomlConfig::resolve(Some(file.path()));
    assert!(matches!(&result, Err(Error::Config(msg)) if msg.contains("Invalid TOML")));

    let result = TomlConfig::from_toml_str("[player]\nsync_interval_secs = \"soon\"\n");
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_invalid_settings_in_file_rejected() {
    let file = config_file("[player]\nsync_debounce_secs = -1.0\n");
    let result = TomlConfig::resolve(Some(file.path()));
    assert!(matches!(result, Err(Error::Config(_))));
}

#[test]
#[serial]
fn test_cli_overrides_file_values() {
    let file = config_file("[backend]\nbase_url = \"http://from-file:3000\"\n");

    let config = TomlConfig::resolve(Some(file.path()))
        .unwrap()
        .with_overrides(ConfigOverrides {
            base_url: Some("http://from-cli:3000".to_string()),
            log_level: Some("warn".to_string()),
            config_path: Some(file.path().to_path_buf()),
        });

    assert_eq!(config.backend.base_url, "http://from-cli:3000");
    assert_eq!(config.logging.level, "warn");
}
