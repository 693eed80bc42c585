//! Integration tests for ConfigManager
//!
//! These tests verify:
//! - Settings loading with defaults, partial files and invalid YAML
//! - Account store round trips and ordering
//! - Window registry order through the layered settings loader
//! - Wiring of loaded settings into the snapshot frame source
//! - Concurrent read access

use camino::Utf8PathBuf;
use magicmimi::models::{AccountStore, RegionSize, ScanTarget, WindowHandle};
use magicmimi::services::{FrameSource, SnapshotSource};
use magicmimi::{Account, AppConfig, ConfigManager};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

fn create_test_config_dir() -> (TempDir, Utf8PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let config_path = Utf8PathBuf::try_from(temp_dir.path().to_path_buf()).unwrap();
    (temp_dir, config_path)
}

#[test]
fn test_create_config_manager() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    assert_eq!(manager.config_dir(), config_path);
    assert_eq!(manager.settings_path(), config_path.join("Settings.yaml"));
    assert_eq!(manager.accounts_path(), config_path.join("Accounts.yaml"));
}

#[test]
fn test_config_directory_creation() {
    let (_temp_dir, base) = create_test_config_dir();
    let config_path = base.join("MagicMimi Data");

    assert!(!config_path.exists());
    let _manager = ConfigManager::new(&config_path).unwrap();

    // Directory should now exist
    assert!(config_path.exists());
}

#[test]
fn test_load_default_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let config = manager.load_app_config().unwrap();

    assert_eq!(config.api.app_version, "2.70.1");
    assert_eq!(config.api.sdk_base_url, "https://api-sdk.mihoyo.com");
    assert_eq!(config.api.request_timeout_secs, 10);
    assert_eq!(config.scan.interval_ms, 500);
    assert_eq!(config.scan.unavailable_backoff_ms, 1000);
    assert_eq!(config.scan.success_cooldown_ms, 5000);
    assert_eq!(config.scan.dedup_cooldown_ms, 5000);
    assert_eq!(config.capture.desktop_region, RegionSize { width: 300, height: 300 });
    assert!(!config.debug_mode);
}

#[test]
fn test_partial_settings_file_keeps_other_defaults() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.settings_path(),
        "api:\n  app_version: \"2.71.1\"\ncapture:\n  desktop_region:\n    width: 400\n    height: 240\n",
    )
    .unwrap();

    let config = manager.load_app_config().unwrap();
    assert_eq!(config.api.app_version, "2.71.1");
    assert_eq!(config.api.user_agent, "okhttp/4.8.0");
    assert_eq!(config.capture.desktop_region, RegionSize { width: 400, height: 240 });
    assert_eq!(config.scan.interval_ms, 500);
}

#[test]
fn test_save_and_load_settings() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let mut config = AppConfig::default();
    config.scan.success_cooldown_ms = 8000;
    config.capture.desktop_snapshot = Some(config_path.join("desktop.png"));
    config
        .capture
        .windows
        .insert("0x2056C".to_string(), config_path.join("genshin.png"));
    manager.save_app_config(&config).unwrap();

    let loaded = manager.load_app_config().unwrap();
    assert_eq!(loaded.scan.success_cooldown_ms, 8000);
    assert_eq!(loaded.capture.desktop_snapshot, config.capture.desktop_snapshot);
    assert_eq!(loaded.capture.windows.len(), 1);
}

#[test]
fn test_window_order_survives_reload() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let handles = ["300", "100", "200", "50", "7000", "12"];
    let mut config = AppConfig::default();
    for handle in handles {
        config
            .capture
            .windows
            .insert(handle.to_string(), config_path.join(format!("{}.png", handle)));
    }
    manager.save_app_config(&config).unwrap();

    let loaded = manager.load_app_config().unwrap();
    let keys: Vec<_> = loaded.capture.windows.keys().map(String::as_str).collect();
    assert_eq!(keys, handles);

    let listed: Vec<_> = SnapshotSource::from_settings(&loaded.capture)
        .windows()
        .map(|(handle, _)| handle.0)
        .collect();
    assert_eq!(listed, vec![300, 100, 200, 50, 7000, 12]);
}

#[test]
fn test_invalid_yaml_handling() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    // Create invalid YAML file
    fs::write(manager.settings_path(), "scan: [interval_ms: {{").unwrap();

    // Loading should return error
    let result = manager.load_app_config();
    assert!(result.is_err(), "Should fail to parse invalid YAML");
}

#[test]
fn test_accounts_round_trip_preserves_order() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    manager
        .add_account("zeta", Account::new("300000001", "stuid=3;stoken=c;"))
        .unwrap();
    manager
        .add_account("alpha", Account::new("100000001", "stuid=1;stoken=a;"))
        .unwrap();

    // Reload through a second manager to read what is on disk
    let reloaded = ConfigManager::new(&config_path).unwrap().load_accounts().unwrap();
    let names: Vec<_> = reloaded.keys().map(String::as_str).collect();
    assert_eq!(names, ["zeta", "alpha"]);

    let alpha = reloaded.get("alpha").unwrap();
    assert_eq!(alpha.uid, "100000001");
    assert_eq!(alpha.cookie, "stuid=1;stoken=a;");
}

#[test]
fn test_accounts_file_written_by_hand() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(
        manager.accounts_path(),
        "main:\n  uid: \"123456789\"\n  cookie: \"stuid=123456789;stoken=v2_x;mid=m;\"\n",
    )
    .unwrap();

    let accounts = manager.load_accounts().unwrap();
    let main = AccountStore::get(&accounts, "main").unwrap();
    assert_eq!(main.masked_uid(), "1234...");
    assert!(AccountStore::get(&accounts, "other").is_none());
}

#[test]
fn test_empty_accounts_file_is_empty_store() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    fs::write(manager.accounts_path(), "").unwrap();
    assert!(manager.load_accounts().unwrap().is_empty());
}

#[test]
fn test_capture_settings_feed_snapshot_source() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = ConfigManager::new(&config_path).unwrap();

    let snapshot = config_path.join("window.png");
    image::GrayImage::new(16, 16).save(&snapshot).unwrap();

    let mut config = AppConfig::default();
    config.capture.windows.insert("1234".to_string(), snapshot.clone());
    config
        .capture
        .windows
        .insert("not-a-handle".to_string(), snapshot);
    manager.save_app_config(&config).unwrap();

    let loaded = manager.load_app_config().unwrap();
    let source = SnapshotSource::from_settings(&loaded.capture);

    let handles: Vec<_> = source.windows().map(|(handle, _)| handle).collect();
    assert_eq!(handles, vec![WindowHandle(1234)]);
    assert!(source.is_capturable(&ScanTarget::window(WindowHandle(1234))));
    assert!(!source.is_capturable(&ScanTarget::window(WindowHandle(99))));
}

#[test]
fn test_concurrent_config_access() {
    let (_temp_dir, config_path) = create_test_config_dir();
    let manager = Arc::new(ConfigManager::new(&config_path).unwrap());
    manager
        .add_account("main", Account::new("123456789", "c"))
        .unwrap();

    // Spawn multiple threads reading config concurrently
    let mut handles = vec![];

    for _ in 0..10 {
        let manager_clone = manager.clone();
        let handle = std::thread::spawn(move || {
            let _config = manager_clone.load_app_config().unwrap();
            let accounts = manager_clone.load_accounts().unwrap();
            assert_eq!(accounts.len(), 1);
        });
        handles.push(handle);
    }

    // All threads should complete successfully
    for handle in handles {
        handle.join().unwrap();
    }
}
