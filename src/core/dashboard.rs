use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::core::PlatformTagged;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardData {
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub total_users: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub active_users: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub ghost_users: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub duplicate_users: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub total_monthly_cost: f64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub potential_savings: f64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub open_risks: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub critical_risks: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub platforms: Vec<PlatformStats>,
    pub generated_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformStats {
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub platform: String,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub users: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub monthly_cost: f64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub connected: bool,
}

impl PlatformTagged for PlatformStats {
    fn platform_name(&self) -> &str {
        &self.platform
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlatformOverview {
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub total_users: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub active_users: u64,
    #[serde(alias = "total_cost")]
    pub monthly_cost: Option<f64>,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub resource_counts: BTreeMap<String, u64>,
    pub mfa_enabled_percent: Option<f64>,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub open_risks: u64,
    pub last_sync_at: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CorrelationSummary {
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub users_correlated: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub duplicates_found: u64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub ghost_users_found: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}
