mod connection;
mod dashboard;
mod ids;
mod license;
mod risk;
mod user;

pub use connection::{Connection, ConnectionState, SyncOutcome, TestOutcome};
pub use dashboard::{CorrelationSummary, DashboardData, Identity, PlatformOverview, PlatformStats};
pub use ids::{null_as_default, opt_string_or_number, string_or_number};
pub use license::{LicenseRecommendation, LicenseReport};
pub use risk::{RiskStatus, SecurityRisk, Severity};
pub use user::{CrossPlatformUser, PlatformAccount};

/// Records that belong to exactly one external platform.
pub trait PlatformTagged {
    fn platform_name(&self) -> &str;
}
