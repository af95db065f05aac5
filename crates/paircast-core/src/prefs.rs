//! Preference storage
//!
//! The orchestrator persists two things between sessions: the recent-server
//! list and the auto-connect configuration. The store itself is a seam so
//! each frontend can bring its own backing (the CLI writes a JSON file, tests
//! use the in-memory store).

use serde::{Deserialize, Serialize};

/// Most-recent-first recent-server list cap
pub const RECENT_SERVER_CAP: usize = 10;

/// Auto-connect settings as persisted
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct AutoConnectConfig {
    pub enabled: bool,
    pub address: Option<String>,
}

/// Storage seam for user preferences.
///
/// Implementations are synchronous; the orchestrator only touches the store
/// on connect success and on explicit settings commands, never on hot paths.
/// `Send + Sync` so the owning task can run on the multi-threaded runtime.
pub trait PreferenceStore: Send + Sync {
    fn recent_servers(&self) -> Vec<String>;
    fn set_recent_servers(&mut self, servers: Vec<String>);
    fn auto_connect(&self) -> AutoConnectConfig;
    fn set_auto_connect(&mut self, config: AutoConnectConfig);
}

/// Push `address` to the front of `servers`, deduplicating and enforcing the
/// cap. Returns true when the list changed.
pub fn push_recent(servers: &mut Vec<String>, address: &str) -> bool {
    if servers.first().map(String::as_str) == Some(address) {
        return false;
    }
    servers.retain(|s| s != address);
    servers.insert(0, address.to_string());
    servers.truncate(RECENT_SERVER_CAP);
    true
}

/// In-memory store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryPreferenceStore {
    recent: Vec<String>,
    auto_connect: AutoConnectConfig,
}

impl PreferenceStore for MemoryPreferenceStore {
    fn recent_servers(&self) -> Vec<String> {
        self.recent.clone()
    }

    fn set_recent_servers(&mut self, servers: Vec<String>) {
        self.recent = servers;
        self.recent.truncate(RECENT_SERVER_CAP);
    }

    fn auto_connect(&self) -> AutoConnectConfig {
        self.auto_connect.clone()
    }

    fn set_auto_connect(&mut self, config: AutoConnectConfig) {
        self.auto_connect = config;
    }
}
