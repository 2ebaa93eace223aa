use serde::{Deserialize, Serialize};

use crate::core::PlatformTagged;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformAccount {
    pub platform: String,
    #[serde(default, deserialize_with = "crate::core::opt_string_or_number")]
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default = "default_true", deserialize_with = "null_as_true")]
    pub is_active: bool,
    #[serde(default)]
    pub last_active_at: Option<String>,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub monthly_cost: f64,
}

fn default_true() -> bool {
    true
}

fn null_as_true<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<bool>::deserialize(deserializer)?.unwrap_or(true))
}

impl PlatformTagged for PlatformAccount {
    fn platform_name(&self) -> &str {
        &self.platform
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrossPlatformUser {
    pub email: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub platforms: Vec<PlatformAccount>,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub is_ghost: bool,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub is_duplicate: bool,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub estimated_monthly_cost: f64,
    #[serde(default)]
    pub last_activity_at: Option<String>,
}
