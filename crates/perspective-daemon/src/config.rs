//! Daemon configuration loaded from TOML.

use std::path::PathBuf;
use std::time::Duration;

use perspective_platform::sysfs::DRM_SYSFS_ROOT;
use perspective_platform::NativeCommands;
use serde::{Deserialize, Serialize};

use crate::controller::ControllerOptions;

/// Unit name used by the default native commands.
const DEFAULT_UNIT: &str = "desktop-perspective";

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default = "default_native")]
    pub native: NativeCommands,
    #[serde(default)]
    pub notification: NotificationConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            daemon: DaemonConfig::default(),
            display: DisplayConfig::default(),
            input: InputConfig::default(),
            native: default_native(),
            notification: NotificationConfig::default(),
            settings: SettingsConfig::default(),
        }
    }
}

impl Config {
    /// Controller options derived from this config.
    pub fn controller_options(&self) -> ControllerOptions {
        ControllerOptions {
            auto_start: self.display.auto_start,
            native_timeout: Duration::from_millis(self.daemon.native_timeout_ms),
            dashboard: self.notification.dashboard.clone(),
        }
    }
}

/// Daemon socket and runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Service socket path. Defaults to the user runtime directory.
    #[serde(default)]
    pub socket: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Upper bound on any single native call.
    #[serde(default = "default_native_timeout_ms")]
    pub native_timeout_ms: u64,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            socket: None,
            log_level: default_log_level(),
            native_timeout_ms: default_native_timeout_ms(),
        }
    }
}

/// Display detection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    #[serde(default = "default_true")]
    pub auto_start: bool,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Connector prefixes treated as presentation displays.
    #[serde(default = "default_connectors")]
    pub connectors: Vec<String>,
    #[serde(default = "default_sysfs_root")]
    pub sysfs_root: PathBuf,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            auto_start: true,
            poll_interval_ms: default_poll_interval_ms(),
            connectors: default_connectors(),
            sysfs_root: default_sysfs_root(),
        }
    }
}

/// Input device monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Deep-link target opened from the notification.
    #[serde(default = "default_dashboard")]
    pub dashboard: Option<String>,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            dashboard: default_dashboard(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Settings file. Defaults to the user state directory.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_native_timeout_ms() -> u64 {
    30_000
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_connectors() -> Vec<String> {
    vec!["HDMI".to_string(), "DP".to_string()]
}

fn default_sysfs_root() -> PathBuf {
    PathBuf::from(DRM_SYSFS_ROOT)
}

#[allow(clippy::unnecessary_wraps)]
fn default_dashboard() -> Option<String> {
    Some("perspective-dashboard".to_string())
}

fn systemctl(verb: &[&str]) -> Vec<String> {
    ["systemctl", "--user"]
        .iter()
        .chain(verb)
        .chain(&[DEFAULT_UNIT])
        .map(ToString::to_string)
        .collect()
}

fn default_native() -> NativeCommands {
    NativeCommands {
        start: systemctl(&["start"]),
        stop: systemctl(&["stop"]),
        status: systemctl(&["is-active", "--quiet"]),
        enable_input: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("native_timeout_ms = 30000"));
        assert!(toml_str.contains("auto_start = true"));
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.daemon.log_level, "info");
        assert_eq!(config.display.connectors, vec!["HDMI", "DP"]);
        assert_eq!(
            config.native.start,
            vec!["systemctl", "--user", "start", "desktop-perspective"]
        );
        assert_eq!(
            config.native.status,
            vec!["systemctl", "--user", "is-active", "--quiet", "desktop-perspective"]
        );
        assert!(config.native.enable_input.is_empty());
        assert_eq!(
            config.notification.dashboard.as_deref(),
            Some("perspective-dashboard")
        );
    }

    #[test]
    fn parse_example_config() {
        let toml_str = r#"
[daemon]
socket = "/run/user/1000/perspective.sock"
log_level = "debug"
native_timeout_ms = 5000

[display]
auto_start = false
poll_interval_ms = 250
connectors = ["HDMI"]

[native]
start = ["/usr/bin/perspective-ctl", "start"]
stop = ["/usr/bin/perspective-ctl", "stop"]
status = ["/usr/bin/perspective-ctl", "status"]
enable_input = ["/usr/bin/perspective-ctl", "input"]

[notification]
dashboard = "maru-dashboard"

[settings]
path = "/var/lib/perspective/settings.toml"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(
            config.daemon.socket,
            Some(PathBuf::from("/run/user/1000/perspective.sock"))
        );
        assert!(!config.display.auto_start);
        assert_eq!(config.display.connectors, vec!["HDMI"]);
        assert_eq!(config.native.enable_input.len(), 2);

        let options = config.controller_options();
        assert!(!options.auto_start);
        assert_eq!(options.native_timeout, Duration::from_secs(5));
        assert_eq!(options.dashboard.as_deref(), Some("maru-dashboard"));
    }
}
