//! JSON-backed preference store
//!
//! Persists the recent-server list and auto-connect settings to
//! `prefs.json` in the data directory. Writes go through a temp file and
//! rename so a crash mid-write cannot corrupt the preferences.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use paircast_core::prefs::{AutoConnectConfig, PreferenceStore, RECENT_SERVER_CAP};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
struct PrefsFile {
    recent_servers: Vec<String>,
    auto_connect: AutoConnectConfig,
}

/// Preference store persisting to a JSON file
pub struct JsonPreferenceStore {
    path: PathBuf,
    state: PrefsFile,
}

impl JsonPreferenceStore {
    /// Open the store under `data_dir`, loading existing preferences. A
    /// missing or unreadable file starts empty rather than failing the
    /// session.
    pub fn open(data_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(data_dir)?;
        let path = data_dir.join("prefs.json");
        let state = match std::fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, path = %path.display(), "preference file malformed, starting fresh");
                PrefsFile::default()
            }),
            Err(_) => PrefsFile::default(),
        };
        Ok(Self { path, state })
    }

    fn save(&self) {
        let write = || -> std::io::Result<()> {
            let tmp = self.path.with_extension("json.tmp");
            let raw = serde_json::to_string_pretty(&self.state).map_err(std::io::Error::other)?;
            std::fs::write(&tmp, raw)?;
            std::fs::rename(&tmp, &self.path)
        };
        if let Err(e) = write() {
            warn!(error = %e, path = %self.path.display(), "failed to persist preferences");
        }
    }
}

impl PreferenceStore for JsonPreferenceStore {
    fn recent_servers(&self) -> Vec<String> {
        self.state.recent_servers.clone()
    }

    fn set_recent_servers(&mut self, servers: Vec<String>) {
        self.state.recent_servers = servers;
        self.state.recent_servers.truncate(RECENT_SERVER_CAP);
        self.save();
    }

    fn auto_connect(&self) -> AutoConnectConfig {
        self.state.auto_connect.clone()
    }

    fn set_auto_connect(&mut self, config: AutoConnectConfig) {
        self.state.auto_connect = config;
        self.save();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_across_reopen() {
        let dir = tempfile::tempdir().unwrap();

        {
            let mut store = JsonPreferenceStore::open(dir.path()).unwrap();
            store.set_recent_servers(vec!["a".to_string(), "b".to_string()]);
            store.set_auto_connect(AutoConnectConfig {
                enabled: true,
                address: Some("a".to_string()),
            });
        }

        let store = JsonPreferenceStore::open(dir.path()).unwrap();
        assert_eq!(store.recent_servers(), vec!["a", "b"]);
        let auto = store.auto_connect();
        assert!(auto.enabled);
        assert_eq!(auto.address.as_deref(), Some("a"));
    }

    #[test]
    fn malformed_file_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("prefs.json"), "{broken").unwrap();
        let store = JsonPreferenceStore::open(dir.path()).unwrap();
        assert!(store.recent_servers().is_empty());
    }
}
