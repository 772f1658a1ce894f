//! Settings persisted to a TOML file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::PlatformError;
use crate::SettingsStore;

#[derive(Debug, Default, Serialize, Deserialize)]
struct SettingsFile {
    #[serde(default)]
    properties: BTreeMap<String, String>,
    #[serde(default)]
    settings: BTreeMap<String, i32>,
}

/// [`SettingsStore`] backed by a TOML file.
///
/// The file is read on construction and rewritten on every change.
/// Properties are process-wide state but are written out too, so other
/// processes can read them.
pub struct FileSettings {
    path: PathBuf,
    contents: Mutex<SettingsFile>,
}

impl FileSettings {
    /// Open the settings file, starting empty if it does not exist yet.
    pub fn open(path: &Path) -> Result<Self, PlatformError> {
        let contents = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            toml::from_str(&raw)
                .map_err(|e| PlatformError::Settings(format!("{}: {e}", path.display())))?
        } else {
            SettingsFile::default()
        };
        Ok(Self {
            path: path.to_path_buf(),
            contents: Mutex::new(contents),
        })
    }

    /// Current value of a persisted integer setting.
    pub fn get_int(&self, key: &str) -> Option<i32> {
        self.contents.lock().settings.get(key).copied()
    }

    /// Current value of a property.
    pub fn property(&self, key: &str) -> Option<String> {
        self.contents.lock().properties.get(key).cloned()
    }

    fn write(&self, contents: &SettingsFile) -> Result<(), PlatformError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(contents)
            .map_err(|e| PlatformError::Settings(e.to_string()))?;
        std::fs::write(&self.path, raw)?;
        debug!(path = %self.path.display(), "settings written");
        Ok(())
    }
}

impl SettingsStore for FileSettings {
    fn set_property(&self, key: &str, value: &str) -> Result<(), PlatformError> {
        let mut contents = self.contents.lock();
        contents.properties.insert(key.to_string(), value.to_string());
        self.write(&contents)
    }

    fn put_int(&self, key: &str, value: i32) -> Result<(), PlatformError> {
        let mut contents = self.contents.lock();
        contents.settings.insert(key.to_string(), value);
        self.write(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("settings.toml");

        let settings = FileSettings::open(&path).unwrap();
        settings.put_int("show_ime_with_hard_keyboard", 1).unwrap();
        settings
            .set_property("perspective.desktop.interactive", "true")
            .unwrap();

        let reopened = FileSettings::open(&path).unwrap();
        assert_eq!(reopened.get_int("show_ime_with_hard_keyboard"), Some(1));
        assert_eq!(
            reopened.property("perspective.desktop.interactive").as_deref(),
            Some("true")
        );
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings.toml");
        std::fs::write(&path, "settings = [not toml").unwrap();
        assert!(matches!(
            FileSettings::open(&path),
            Err(PlatformError::Settings(_))
        ));
    }

    #[test]
    fn unwritable_path_fails_put() {
        let dir = tempfile::tempdir().unwrap();
        // A regular file where the parent directory should be.
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "").unwrap();
        let settings = FileSettings::open(&blocker.join("settings.toml")).unwrap();
        assert!(settings.put_int("show_ime_with_hard_keyboard", 0).is_err());
    }
}
