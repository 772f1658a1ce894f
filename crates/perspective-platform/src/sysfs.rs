//! DRM connector discovery through sysfs.
//!
//! Every connector appears as `<root>/card<N>-<connector>` with a `status`
//! file reading `connected` or `disconnected`. Connectors whose type matches
//! one of the configured prefixes (HDMI, DP, ...) are presentation displays;
//! built-in panels (eDP, LVDS, DSI) are not.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use perspective_types::{DisplayId, DisplayInfo};
use tracing::trace;

use crate::DisplayProvider;

/// Default sysfs location of DRM connectors.
pub const DRM_SYSFS_ROOT: &str = "/sys/class/drm";

/// [`DisplayProvider`] reading DRM connector state from sysfs.
pub struct SysfsDisplays {
    root: PathBuf,
    presentation_prefixes: Vec<String>,
    // Connector names are stable for the life of the process; IDs are
    // handed out on first sight.
    ids: Mutex<HashMap<String, DisplayId>>,
}

impl SysfsDisplays {
    pub fn new(root: impl Into<PathBuf>, presentation_prefixes: Vec<String>) -> Self {
        Self {
            root: root.into(),
            presentation_prefixes,
            ids: Mutex::new(HashMap::new()),
        }
    }

    fn id_for(&self, connector: &str) -> DisplayId {
        let mut ids = self.ids.lock();
        let next = u32::try_from(ids.len()).unwrap_or(u32::MAX);
        *ids.entry(connector.to_string()).or_insert(DisplayId(next))
    }

    fn is_presentation(&self, connector: &str) -> bool {
        self.presentation_prefixes
            .iter()
            .any(|prefix| connector.starts_with(prefix.as_str()))
    }

    fn scan(&self) -> Vec<DisplayInfo> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };

        let mut connected: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| {
                let name = entry.file_name().into_string().ok()?;
                let connector = connector_name(&name)?;
                is_connected(&entry.path()).then(|| connector.to_string())
            })
            .collect();
        connected.sort();

        connected
            .into_iter()
            .map(|connector| DisplayInfo {
                id: self.id_for(&connector),
                presentation: self.is_presentation(&connector),
                name: connector,
            })
            .collect()
    }
}

/// `card0-HDMI-A-1` -> `HDMI-A-1`. Entries without a connector part
/// (`card0`, `renderD128`, `version`) are skipped.
fn connector_name(entry: &str) -> Option<&str> {
    let rest = entry.strip_prefix("card")?;
    let (index, connector) = rest.split_once('-')?;
    if index.is_empty() || !index.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some(connector)
}

fn is_connected(dir: &Path) -> bool {
    match std::fs::read_to_string(dir.join("status")) {
        Ok(status) => status.trim() == "connected",
        Err(e) => {
            trace!(path = %dir.display(), error = %e, "no connector status");
            false
        }
    }
}

impl DisplayProvider for SysfsDisplays {
    fn display(&self, id: DisplayId) -> Option<DisplayInfo> {
        self.scan().into_iter().find(|d| d.id == id)
    }

    fn displays(&self) -> Vec<DisplayInfo> {
        self.scan()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connector(root: &Path, name: &str, status: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("status"), format!("{status}\n")).unwrap();
    }

    fn prefixes() -> Vec<String> {
        vec!["HDMI".to_string(), "DP".to_string()]
    }

    #[test]
    fn connector_names() {
        assert_eq!(connector_name("card0-HDMI-A-1"), Some("HDMI-A-1"));
        assert_eq!(connector_name("card1-eDP-1"), Some("eDP-1"));
        assert_eq!(connector_name("card0"), None);
        assert_eq!(connector_name("renderD128"), None);
        assert_eq!(connector_name("cardx-HDMI-A-1"), None);
    }

    #[test]
    fn only_connected_connectors_are_listed() {
        let root = tempfile::tempdir().unwrap();
        connector(root.path(), "card0-eDP-1", "connected");
        connector(root.path(), "card0-HDMI-A-1", "connected");
        connector(root.path(), "card0-DP-1", "disconnected");
        std::fs::create_dir_all(root.path().join("card0")).unwrap();

        let displays = SysfsDisplays::new(root.path(), prefixes());
        let listed = displays.displays();
        let names: Vec<&str> = listed.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["HDMI-A-1", "eDP-1"]);

        let hdmi = listed.iter().find(|d| d.name == "HDMI-A-1").unwrap();
        assert!(hdmi.presentation);
        let panel = listed.iter().find(|d| d.name == "eDP-1").unwrap();
        assert!(!panel.presentation);
    }

    #[test]
    fn ids_are_stable_across_scans() {
        let root = tempfile::tempdir().unwrap();
        connector(root.path(), "card0-HDMI-A-1", "connected");
        let displays = SysfsDisplays::new(root.path(), prefixes());
        let first = displays.displays()[0].id;

        connector(root.path(), "card0-DP-2", "connected");
        let again = displays
            .displays()
            .into_iter()
            .find(|d| d.name == "HDMI-A-1")
            .unwrap();
        assert_eq!(again.id, first);
        assert!(displays.display(first).is_some());

        connector(root.path(), "card0-HDMI-A-1", "disconnected");
        assert!(displays.display(first).is_none());
    }

    #[test]
    fn missing_root_lists_nothing() {
        let displays = SysfsDisplays::new("/nonexistent/drm", prefixes());
        assert!(displays.displays().is_empty());
    }
}
