use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::core::PlatformTagged;

/// Ordered so that `Ord` matches display priority: `Critical` is the maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub const fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!(
                "unknown severity: {other} (expected low|medium|high|critical)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskStatus {
    Open,
    Acknowledged,
    Resolved,
}

impl RiskStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            RiskStatus::Open => "open",
            RiskStatus::Acknowledged => "acknowledged",
            RiskStatus::Resolved => "resolved",
        }
    }
}

impl fmt::Display for RiskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RiskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(RiskStatus::Open),
            "acknowledged" | "ack" => Ok(RiskStatus::Acknowledged),
            "resolved" => Ok(RiskStatus::Resolved),
            other => Err(format!(
                "unknown risk status: {other} (expected open|acknowledged|resolved)"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityRisk {
    #[serde(deserialize_with = "crate::core::string_or_number")]
    pub id: String,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub user_email: String,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub platform: String,
    pub severity: Severity,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub risk_type: String,
    #[serde(default, deserialize_with = "crate::core::null_as_default")]
    pub description: String,
    pub status: RiskStatus,
    #[serde(default)]
    pub detected_at: Option<String>,
}

impl PlatformTagged for SecurityRisk {
    fn platform_name(&self) -> &str {
        &self.platform
    }
}
