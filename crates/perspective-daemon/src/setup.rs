//! Config loading, default paths, and platform assembly.

use std::path::PathBuf;
use std::sync::Arc;

use perspective_platform::{
    CommandExecutor, FileSettings, InputDevices, LogPresenter, SysfsDisplays,
};
use tracing::info;

use crate::config::Config;
use crate::controller::Platform;
use crate::error::ControllerError;

/// Load configuration from the given path, or the default location.
pub fn load_config(path: Option<&str>) -> Result<Config, ControllerError> {
    let config_path = match path {
        Some(p) => PathBuf::from(p),
        None => default_config_path(),
    };

    if config_path.exists() {
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| ControllerError::Config(format!("failed to read config: {e}")))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ControllerError::Config(format!("failed to parse config: {e}")))?;
        info!(path = %config_path.display(), "loaded config");
        Ok(config)
    } else {
        info!("no config file found, using defaults");
        Ok(Config::default())
    }
}

/// Build the concrete platform backends described by `config`.
pub fn build_platform(config: &Config) -> Result<Platform, ControllerError> {
    let settings_path = config
        .settings
        .path
        .clone()
        .unwrap_or_else(default_settings_path);
    let settings = FileSettings::open(&settings_path)?;
    info!(path = %settings_path.display(), "settings store opened");

    Ok(Platform {
        executor: Box::new(CommandExecutor::new(config.native.clone())),
        displays: Arc::new(SysfsDisplays::new(
            config.display.sysfs_root.clone(),
            config.display.connectors.clone(),
        )),
        input: input_backend(),
        notifications: Arc::new(LogPresenter::new()),
        settings: Arc::new(settings),
    })
}

#[cfg(all(target_os = "linux", feature = "linux"))]
fn input_backend() -> Arc<dyn InputDevices> {
    Arc::new(perspective_platform::linux::EvdevInputDevices::new())
}

#[cfg(not(all(target_os = "linux", feature = "linux")))]
fn input_backend() -> Arc<dyn InputDevices> {
    info!("no input backend compiled in, external devices will not be managed");
    Arc::new(perspective_platform::NoInputDevices)
}

/// Get the default config directory path.
pub fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("~/.config"))
        .join("perspective")
}

/// Get the default config file path.
fn default_config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Socket path used when the config does not name one.
pub fn default_socket_path() -> PathBuf {
    dirs::runtime_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("perspective.sock")
}

/// Resolve the socket path from an optional config value.
pub fn socket_path(config: &Config) -> PathBuf {
    config
        .daemon
        .socket
        .clone()
        .unwrap_or_else(default_socket_path)
}

fn default_settings_path() -> PathBuf {
    dirs::state_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join("perspective")
        .join("settings.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_config_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let config = load_config(path.to_str()).unwrap();
        assert!(config.display.auto_start);
    }

    #[test]
    fn malformed_config_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[daemon\nlog_level = 3").unwrap();
        let err = load_config(path.to_str()).unwrap_err();
        assert!(matches!(err, ControllerError::Config(_)));
    }

    #[test]
    fn configured_socket_wins_over_default() {
        let mut config = Config::default();
        assert_eq!(socket_path(&config), default_socket_path());
        config.daemon.socket = Some(PathBuf::from("/tmp/p.sock"));
        assert_eq!(socket_path(&config), PathBuf::from("/tmp/p.sock"));
    }

    #[test]
    fn platform_builds_with_settings_in_tempdir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.settings.path = Some(dir.path().join("state").join("settings.toml"));
        config.display.sysfs_root = dir.path().join("drm");
        let platform = build_platform(&config).unwrap();
        assert!(platform.displays.displays().is_empty());
    }
}
