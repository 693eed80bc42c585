use camino::Utf8PathBuf;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application settings from `Settings.yaml`.
///
/// Every field has a default so a partial (or missing) file is valid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub api: ApiSettings,

    #[serde(default)]
    pub scan: ScanTimings,

    #[serde(default)]
    pub capture: CaptureSettings,

    #[serde(default)]
    pub debug_mode: bool,
}

/// Remote login service settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiSettings {
    #[serde(default = "default_app_version")]
    pub app_version: String,

    #[serde(default = "default_sdk_base_url")]
    pub sdk_base_url: String,

    #[serde(default = "default_takumi_base_url")]
    pub takumi_base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            app_version: default_app_version(),
            sdk_base_url: default_sdk_base_url(),
            takumi_base_url: default_takumi_base_url(),
            user_agent: default_user_agent(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl ApiSettings {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn default_app_version() -> String {
    "2.70.1".to_string()
}

fn default_sdk_base_url() -> String {
    "https://api-sdk.mihoyo.com".to_string()
}

fn default_takumi_base_url() -> String {
    "https://api-takumi.mihoyo.com".to_string()
}

fn default_user_agent() -> String {
    "okhttp/4.8.0".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

/// Cadence and backoff policy of the scan loop, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanTimings {
    /// Target duration of one capture iteration.
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,

    /// Sleep after the frame source reports the target unavailable (e.g. minimized).
    #[serde(default = "default_unavailable_backoff_ms")]
    pub unavailable_backoff_ms: u64,

    /// Pause after a successful claim before capturing again.
    #[serde(default = "default_success_cooldown_ms")]
    pub success_cooldown_ms: u64,

    /// Window in which a repeat of the last admitted ticket is ignored.
    #[serde(default = "default_dedup_cooldown_ms")]
    pub dedup_cooldown_ms: u64,
}

impl Default for ScanTimings {
    fn default() -> Self {
        Self {
            interval_ms: default_interval_ms(),
            unavailable_backoff_ms: default_unavailable_backoff_ms(),
            success_cooldown_ms: default_success_cooldown_ms(),
            dedup_cooldown_ms: default_dedup_cooldown_ms(),
        }
    }
}

impl ScanTimings {
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    pub fn unavailable_backoff(&self) -> Duration {
        Duration::from_millis(self.unavailable_backoff_ms)
    }

    pub fn success_cooldown(&self) -> Duration {
        Duration::from_millis(self.success_cooldown_ms)
    }

    pub fn dedup_cooldown(&self) -> Duration {
        Duration::from_millis(self.dedup_cooldown_ms)
    }
}

fn default_interval_ms() -> u64 {
    500
}

fn default_unavailable_backoff_ms() -> u64 {
    1000
}

fn default_success_cooldown_ms() -> u64 {
    5000
}

fn default_dedup_cooldown_ms() -> u64 {
    5000
}

/// Where the snapshot frame source finds images written by the external capturer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Full-desktop snapshot, cropped for desktop-center targets.
    #[serde(default)]
    pub desktop_snapshot: Option<Utf8PathBuf>,

    /// Window handle (decimal or `0x` hex) → snapshot of that window's client area.
    #[serde(default)]
    pub windows: IndexMap<String, Utf8PathBuf>,

    #[serde(default)]
    pub desktop_region: RegionSize,
}

/// Size of the centered desktop capture region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionSize {
    pub width: u32,
    pub height: u32,
}

impl Default for RegionSize {
    fn default() -> Self {
        Self {
            width: 300,
            height: 300,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_timing_defaults() {
        let timings = ScanTimings::default();
        assert_eq!(timings.interval(), Duration::from_millis(500));
        assert_eq!(timings.unavailable_backoff(), Duration::from_secs(1));
        assert_eq!(timings.success_cooldown(), Duration::from_secs(5));
        assert_eq!(timings.dedup_cooldown(), Duration::from_secs(5));
    }

    #[test]
    fn test_api_settings_defaults() {
        let api = ApiSettings::default();
        assert_eq!(api.sdk_base_url, "https://api-sdk.mihoyo.com");
        assert_eq!(api.user_agent, "okhttp/4.8.0");
        assert_eq!(api.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let config: AppConfig = serde_yaml_ng::from_str("scan:\n  interval_ms: 250\n").unwrap();
        assert_eq!(config.scan.interval_ms, 250);
        assert_eq!(config.scan.success_cooldown_ms, 5000);
        assert_eq!(config.api, ApiSettings::default());
        assert_eq!(config.capture.desktop_region, RegionSize::default());
        assert!(!config.debug_mode);
    }
}
