use serde::{Deserialize, Serialize};

use crate::core::PlatformTagged;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LicenseReport {
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub total_monthly_cost: f64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub potential_savings: f64,
    #[serde(deserialize_with = "crate::core::null_as_default")]
    pub recommendations: Vec<LicenseRecommendation>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LicenseRecommendation {
    pub platform: String,
    pub user_email: String,
    #[serde(default)]
    pub license_type: Option<String>,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub monthly_cost: f64,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub reason: String,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub recommended_action: String,
}

impl PlatformTagged for LicenseRecommendation {
    fn platform_name(&self) -> &str {
        &self.platform
    }
}
