//! Fetch-and-render views.
//!
//! Every view goes through the same four states. A `ComingSoon` page never
//! touches the backend.

use crate::api::{ApiError, Transport};
use crate::console::Console;
use crate::core::{
    Connection, CrossPlatformUser, DashboardData, LicenseReport, PlatformOverview, SecurityRisk,
};
use crate::platform::PlatformSpec;

#[derive(Debug, Clone, PartialEq)]
pub enum PageState<T> {
    Loading,
    ComingSoon,
    Failed { message: String },
    Ready(T),
}

impl<T> PageState<T> {
    pub fn from_result(result: Result<T, ApiError>, fallback: &str) -> Self {
        match result {
            Ok(v) => PageState::Ready(v),
            Err(e) => {
                tracing::debug!(error = %e, "page load failed");
                PageState::Failed {
                    message: e.user_message(fallback),
                }
            }
        }
    }

    pub fn ready(&self) -> Option<&T> {
        match self {
            PageState::Ready(v) => Some(v),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> PageState<U> {
        match self {
            PageState::Loading => PageState::Loading,
            PageState::ComingSoon => PageState::ComingSoon,
            PageState::Failed { message } => PageState::Failed { message },
            PageState::Ready(v) => PageState::Ready(f(v)),
        }
    }
}

fn platform_page<V>(
    platform: &PlatformSpec,
    fallback: String,
    load: impl FnOnce() -> Result<V, ApiError>,
) -> PageState<V> {
    if !platform.is_available() {
        return PageState::ComingSoon;
    }
    PageState::from_result(load(), &fallback)
}

pub fn overview<T: Transport>(
    console: &Console<T>,
    platform: &PlatformSpec,
) -> PageState<PlatformOverview> {
    platform_page(
        platform,
        format!("Failed to load {} overview", platform.display_name),
        || console.overview(platform),
    )
}

pub fn connections<T: Transport>(
    console: &Console<T>,
    platform: &PlatformSpec,
) -> PageState<Vec<Connection>> {
    platform_page(
        platform,
        format!("Failed to load {} {}s", platform.display_name, platform.noun),
        || console.connections(platform),
    )
}

pub fn dashboard<T: Transport>(console: &Console<T>) -> PageState<DashboardData> {
    PageState::from_result(console.dashboard(), "Failed to load dashboard data")
}

pub fn ghost_users<T: Transport>(console: &Console<T>) -> PageState<Vec<CrossPlatformUser>> {
    PageState::from_result(console.ghost_users(), "Failed to load ghost users")
}

pub fn security_risks<T: Transport>(console: &Console<T>) -> PageState<Vec<SecurityRisk>> {
    PageState::from_result(console.security_risks(), "Failed to load security risks")
}

pub fn licenses<T: Transport>(console: &Console<T>) -> PageState<LicenseReport> {
    PageState::from_result(
        console.license_report(),
        "Failed to load license optimization data",
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, MockTransport};
    use crate::platform::PlatformId;
    use serde_json::json;

    #[test]
    fn coming_soon_issues_no_request() {
        let console = Console::new(MockTransport::new());
        let page = connections(&console, PlatformId::Office365.spec());
        assert_eq!(page, PageState::ComingSoon);
        assert_eq!(console.transport().request_count(), 0);
    }

    #[test]
    fn failure_uses_view_fallback_when_backend_is_silent() {
        let console = Console::new(MockTransport::new().on(
            Method::Get,
            "/zoom/overview",
            500,
            serde_json::Value::Null,
        ));
        let page = overview(&console, PlatformId::Zoom.spec());
        assert_eq!(
            page,
            PageState::Failed {
                message: "Failed to load Zoom overview".to_string()
            }
        );
    }

    #[test]
    fn ready_page_holds_data() {
        let console = Console::new(MockTransport::new().on(
            Method::Get,
            "/analytics/dashboard",
            200,
            json!({"total_users": 42}),
        ));
        let page = dashboard(&console);
        assert_eq!(page.ready().map(|d| d.total_users), Some(42));
    }
}
