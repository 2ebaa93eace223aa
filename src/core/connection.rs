use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::PlatformTagged;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    #[serde(deserialize_with = "crate::core::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub platform: String,
    #[serde(default, alias = "display_name", deserialize_with = "crate::core::null_as_default")]
    pub name: String,
    #[serde(default, alias = "account_id")]
    pub scope: Option<String>,
    #[serde(default)]
    pub auth_method: Option<String>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    #[serde(default, alias = "last_synced_at")]
    pub last_sync_at: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn default_active() -> bool {
    true
}

impl PlatformTagged for Connection {
    fn platform_name(&self) -> &str {
        &self.platform
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Syncing,
    Error,
}

impl ConnectionState {
    pub const fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Syncing => "syncing",
            ConnectionState::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub success: bool,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncOutcome {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default, alias = "last_sync_at")]
    pub synced_at: Option<String>,
    #[serde(default)]
    pub items_synced: Option<u64>,
}
