use serde::de::DeserializeOwned;

use crate::api::{self, ApiError, Backend, Transport};
use crate::cache::ResourceCache;
use crate::core::{
    Connection, CorrelationSummary, CrossPlatformUser, DashboardData, Identity, LicenseReport,
    PlatformOverview, RiskStatus, SecurityRisk,
};
use crate::platform::PlatformSpec;

const DASHBOARD_KEY: &str = "analytics/dashboard";
const GHOST_USERS_KEY: &str = "analytics/ghost-users";
const RISKS_KEY: &str = "analytics/security-risks";
const LICENSES_KEY: &str = "analytics/license-optimization";

/// Everything a view needs: the backend plus the shared resource cache.
pub struct Console<T: Transport> {
    backend: Backend<T>,
    cache: ResourceCache,
    redirect_uri: Option<String>,
}

/// Accepts a bare JSON array or an object wrapping it under `key` (or under
/// its only array-valued member).
fn unwrap_listing<V: DeserializeOwned>(value: serde_json::Value, key: &str) -> Result<Vec<V>, ApiError> {
    let items = match value {
        serde_json::Value::Array(_) => value,
        serde_json::Value::Object(mut map) => match map.remove(key) {
            Some(items) => items,
            None => map
                .into_iter()
                .map(|(_, v)| v)
                .find(serde_json::Value::is_array)
                .unwrap_or(serde_json::Value::Array(Vec::new())),
        },
        serde_json::Value::Null => serde_json::Value::Array(Vec::new()),
        other => other,
    };
    serde_json::from_value(items).map_err(|e| ApiError::Decode(e.to_string()))
}

impl<T: Transport> Console<T> {
    pub fn new(transport: T) -> Self {
        Self {
            backend: Backend::new(transport),
            cache: ResourceCache::new(),
            redirect_uri: None,
        }
    }

    pub fn with_redirect_uri(mut self, redirect_uri: Option<String>) -> Self {
        self.redirect_uri = redirect_uri;
        self
    }

    pub fn backend(&self) -> &Backend<T> {
        &self.backend
    }

    pub fn transport(&self) -> &T {
        self.backend.transport()
    }

    pub fn redirect_uri(&self) -> Option<&str> {
        self.redirect_uri.as_deref()
    }

    /// Drops every cached resource so the next read hits the backend.
    pub fn refresh(&self) {
        self.cache.clear();
    }

    pub fn invalidate_platform(&self, platform: &PlatformSpec) {
        self.cache.invalidate_prefix(&format!("{}/", platform.id.slug()));
        self.cache.invalidate_prefix("analytics/");
    }

    pub fn invalidate_analytics(&self) {
        self.cache.invalidate_prefix("analytics/");
    }

    pub fn list<V: DeserializeOwned>(&self, path: &str, key: &str) -> Result<Vec<V>, ApiError> {
        let value: serde_json::Value = self.backend.get(path)?;
        unwrap_listing(value, key)
    }

    pub fn whoami(&self) -> Result<Identity, ApiError> {
        self.backend.get("/auth/me")
    }

    pub fn overview(&self, platform: &PlatformSpec) -> Result<PlatformOverview, ApiError> {
        let key = format!("{}/overview", platform.id.slug());
        self.cache
            .get_or_fetch(&key, || self.backend.get(&platform.overview_path()))
    }

    pub fn connections(&self, platform: &PlatformSpec) -> Result<Vec<Connection>, ApiError> {
        let key = format!("{}/{}", platform.id.slug(), platform.collection);
        self.cache.get_or_fetch(&key, || {
            let mut items: Vec<Connection> =
                self.list(&platform.collection_path(), platform.collection)?;
            for c in &mut items {
                if c.platform.is_empty() {
                    c.platform = platform.id.slug().to_string();
                }
            }
            Ok(items)
        })
    }

    pub fn dashboard(&self) -> Result<DashboardData, ApiError> {
        self.cache
            .get_or_fetch(DASHBOARD_KEY, || self.backend.get("/analytics/dashboard"))
    }

    pub fn correlate(&self) -> Result<CorrelationSummary, ApiError> {
        let summary = self
            .backend
            .post("/analytics/correlate", &serde_json::json!({}))?;
        self.invalidate_analytics();
        Ok(summary)
    }

    pub fn ghost_users(&self) -> Result<Vec<CrossPlatformUser>, ApiError> {
        self.cache.get_or_fetch(GHOST_USERS_KEY, || {
            self.list("/analytics/ghost-users", "ghost_users")
        })
    }

    pub fn security_risks(&self) -> Result<Vec<SecurityRisk>, ApiError> {
        self.cache
            .get_or_fetch(RISKS_KEY, || self.list("/analytics/security-risks", "risks"))
    }

    pub fn update_risk_status(&self, id: &str, status: RiskStatus) -> Result<SecurityRisk, ApiError> {
        let id = api::path_id(id)?;
        let risk = self.backend.patch(
            &format!("/analytics/security-risks/{id}"),
            &serde_json::json!({ "status": status }),
        )?;
        self.invalidate_analytics();
        Ok(risk)
    }

    pub fn license_report(&self) -> Result<LicenseReport, ApiError> {
        self.cache.get_or_fetch(LICENSES_KEY, || {
            self.backend.get("/analytics/license-optimization")
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, MockTransport};
    use crate::platform::PlatformId;
    use serde_json::json;

    #[test]
    fn connections_accepts_bare_and_keyed_listings() {
        let console = Console::new(
            MockTransport::new()
                .on(Method::Get, "/aws/accounts", 200, json!({"accounts": [{"id": 1, "name": "prod"}], "total": 1}))
                .on(Method::Get, "/slack/connections", 200, json!([{"id": "T1", "name": "acme"}])),
        );
        let aws = console.connections(PlatformId::Aws.spec()).unwrap();
        assert_eq!(aws[0].id, "1");
        assert_eq!(aws[0].platform, "aws");
        let slack = console.connections(PlatformId::Slack.spec()).unwrap();
        assert_eq!(slack[0].name, "acme");
    }

    #[test]
    fn reads_are_cached_until_invalidated() {
        let console = Console::new(MockTransport::new().on(
            Method::Get,
            "/github/connections",
            200,
            json!([]),
        ));
        let github = PlatformId::Github.spec();
        console.connections(github).unwrap();
        console.connections(github).unwrap();
        assert_eq!(console.transport().calls_to(Method::Get, "/github/connections"), 1);

        console.invalidate_platform(github);
        console.connections(github).unwrap();
        assert_eq!(console.transport().calls_to(Method::Get, "/github/connections"), 2);
    }

    #[test]
    fn risk_update_invalidates_risk_list() {
        let console = Console::new(
            MockTransport::new()
                .on(Method::Get, "/analytics/security-risks", 200, json!([]))
                .on(
                    Method::Patch,
                    "/analytics/security-risks/9",
                    200,
                    json!({"id": 9, "severity": "high", "status": "resolved"}),
                ),
        );
        console.security_risks().unwrap();
        let risk = console.update_risk_status("9", RiskStatus::Resolved).unwrap();
        assert_eq!(risk.status, RiskStatus::Resolved);
        console.security_risks().unwrap();
        assert_eq!(
            console.transport().calls_to(Method::Get, "/analytics/security-risks"),
            2
        );
        let patch = &console.transport().requests()[1];
        assert_eq!(patch.body, Some(json!({"status": "resolved"})));
    }

    #[test]
    fn correlate_drops_cached_analytics() {
        let console = Console::new(
            MockTransport::new()
                .on(Method::Get, "/analytics/ghost-users", 200, json!({"ghost_users": []}))
                .on(
                    Method::Post,
                    "/analytics/correlate",
                    200,
                    json!({"users_correlated": 12, "duplicates_found": 2, "ghost_users_found": 3}),
                ),
        );
        console.ghost_users().unwrap();
        let summary = console.correlate().unwrap();
        assert_eq!(summary.ghost_users_found, 3);
        console.ghost_users().unwrap();
        assert_eq!(console.transport().calls_to(Method::Get, "/analytics/ghost-users"), 2);
    }

    #[test]
    fn null_fields_fall_back_to_defaults() {
        let console = Console::new(
            MockTransport::new()
                .on(Method::Get, "/aws/accounts", 200, json!({"accounts": [{"id": 1, "name": null, "platform": null}]}))
                .on(Method::Get, "/analytics/dashboard", 200, json!({"total_monthly_cost": null, "total_users": 4, "platforms": null}))
                .on(
                    Method::Get,
                    "/analytics/security-risks",
                    200,
                    json!([{"id": 3, "user_email": null, "severity": "high", "description": null, "status": "open"}]),
                )
                .on(
                    Method::Get,
                    "/analytics/ghost-users",
                    200,
                    json!([{"email": "a@acme.io", "estimated_monthly_cost": null, "platforms": [{"platform": "zoom", "user_id": null, "is_active": null, "monthly_cost": null}]}]),
                ),
        );

        let accounts = console.connections(PlatformId::Aws.spec()).unwrap();
        assert_eq!(accounts[0].name, "");
        assert_eq!(accounts[0].platform, "aws");

        let dashboard = console.dashboard().unwrap();
        assert_eq!(dashboard.total_monthly_cost, 0.0);
        assert_eq!(dashboard.total_users, 4);
        assert!(dashboard.platforms.is_empty());

        let risks = console.security_risks().unwrap();
        assert_eq!(risks[0].description, "");
        assert_eq!(risks[0].user_email, "");

        let ghosts = console.ghost_users().unwrap();
        assert_eq!(ghosts[0].estimated_monthly_cost, 0.0);
        assert_eq!(ghosts[0].platforms[0].user_id, "");
        assert!(ghosts[0].platforms[0].is_active);
    }

    #[test]
    fn risk_update_refuses_ids_that_escape_the_route() {
        let console = Console::new(MockTransport::new());
        let err = console
            .update_risk_status("1/../../auth/me", RiskStatus::Resolved)
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidId(_)));
        assert_eq!(console.transport().request_count(), 0);
    }
}
