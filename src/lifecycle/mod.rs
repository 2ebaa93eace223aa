//! Connection lifecycle: initiate → callback/store → test → sync → disconnect.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::api::{self, ApiError, Transport};
use crate::console::Console;
use crate::core::{Connection, ConnectionState, SyncOutcome, TestOutcome};
use crate::platform::{AuthMethod, PlatformSpec};
use crate::validate::{self, FieldError};

mod callback;
mod cleanup;

pub use callback::{CallbackOutcome, take_callback};
pub use cleanup::{CleanupStep, DisconnectReport, StepStatus, disconnect_platform};

pub const AUTH_FAILED_MESSAGE: &str = "Authentication failed. Please check your credentials.";
pub const ACCESS_DENIED_MESSAGE: &str =
    "Access denied. The supplied credentials lack the required permissions.";
pub const ALREADY_CONNECTED_MESSAGE: &str = "This account is already connected.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    Initiate,
    Established,
    Failed,
    SyncStarted,
    SyncFinished,
    Recovered,
    Disconnected,
}

impl LifecycleEvent {
    pub const fn as_str(self) -> &'static str {
        match self {
            LifecycleEvent::Initiate => "initiate",
            LifecycleEvent::Established => "established",
            LifecycleEvent::Failed => "failed",
            LifecycleEvent::SyncStarted => "sync started",
            LifecycleEvent::SyncFinished => "sync finished",
            LifecycleEvent::Recovered => "recovered",
            LifecycleEvent::Disconnected => "disconnected",
        }
    }
}

/// Applies `event` to `from`, or `None` when the transition is not allowed.
pub fn transition(from: ConnectionState, event: LifecycleEvent) -> Option<ConnectionState> {
    use ConnectionState as S;
    use LifecycleEvent as E;

    match (from, event) {
        (S::Disconnected | S::Error, E::Initiate) => Some(S::Connecting),
        (S::Connecting, E::Established) => Some(S::Connected),
        (S::Connecting | S::Syncing, E::Failed) => Some(S::Error),
        (S::Connected | S::Error, E::SyncStarted) => Some(S::Syncing),
        (S::Syncing, E::SyncFinished) => Some(S::Connected),
        (S::Error, E::Recovered) => Some(S::Connected),
        (S::Connected | S::Error | S::Syncing, E::Disconnected) => Some(S::Disconnected),
        _ => None,
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("{} integration is coming soon", .0)]
    ComingSoon(&'static str),

    #[error("{platform} does not support the {method} auth method")]
    UnsupportedAuthMethod {
        platform: &'static str,
        method: AuthMethod,
    },

    #[error("credential validation failed: {}", join_field_errors(.0))]
    Validation(Vec<FieldError>),

    #[error("cannot {} while {}", .event.as_str(), .from)]
    InvalidTransition {
        from: ConnectionState,
        event: LifecycleEvent,
    },

    #[error("no {0} is connected")]
    NotConnected(&'static str),

    #[error("authorization failed: {0}")]
    OAuth(String),

    #[error("{message}")]
    Backend {
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("disconnect finished with {} failed step(s): {}", .failures.len(), .failures.join("; "))]
    Cleanup {
        failures: Vec<String>,
        report: DisconnectReport,
    },
}

fn join_field_errors(errors: &[FieldError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

impl LifecycleError {
    fn backend(source: ApiError, fallback: &str) -> Self {
        LifecycleError::Backend {
            message: source.user_message(fallback),
            source,
        }
    }

    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            LifecycleError::Validation(errors) => errors,
            _ => &[],
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct OAuthStart {
    pub authorization_url: String,
    pub state: Option<String>,
    pub scopes: Vec<String>,
}

/// Maps a failed credential submission to what the operator should see.
fn store_error(platform: &PlatformSpec, err: ApiError) -> LifecycleError {
    let fixed = match err.status() {
        Some(401) => Some(AUTH_FAILED_MESSAGE),
        Some(403) => Some(ACCESS_DENIED_MESSAGE),
        Some(409) => Some(ALREADY_CONNECTED_MESSAGE),
        _ => None,
    };
    if let Some(message) = fixed {
        return LifecycleError::Backend {
            message: message.to_string(),
            source: err,
        };
    }

    if matches!(err.status(), Some(400 | 422)) {
        if let Some(field) = err.field() {
            let message = err.user_message("Invalid value");
            return LifecycleError::Validation(vec![FieldError::new(field, message)]);
        }
    }

    let fallback = format!(
        "Failed to connect {} {}. Please try again.",
        platform.display_name, platform.noun
    );
    LifecycleError::backend(err, &fallback)
}

/// One connection (or connection attempt) on one platform.
pub struct ConnectionLifecycle<'a, T: Transport> {
    console: &'a Console<T>,
    platform: &'static PlatformSpec,
    state: ConnectionState,
    connection: Option<Connection>,
    last_error: Option<String>,
}

impl<'a, T: Transport> ConnectionLifecycle<'a, T> {
    pub fn new(console: &'a Console<T>, platform: &'static PlatformSpec) -> Self {
        Self {
            console,
            platform,
            state: ConnectionState::Disconnected,
            connection: None,
            last_error: None,
        }
    }

    /// Picks up an existing connection as returned by the backend.
    pub fn resume(
        console: &'a Console<T>,
        platform: &'static PlatformSpec,
        connection: Connection,
    ) -> Self {
        let state = if connection.is_active {
            ConnectionState::Connected
        } else {
            ConnectionState::Error
        };
        Self {
            console,
            platform,
            state,
            connection: Some(connection),
            last_error: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    fn apply(&mut self, event: LifecycleEvent) -> Result<(), LifecycleError> {
        match transition(self.state, event) {
            Some(next) => {
                tracing::debug!(
                    platform = self.platform.id.slug(),
                    from = %self.state,
                    to = %next,
                    "connection state change"
                );
                self.state = next;
                Ok(())
            }
            None => Err(LifecycleError::InvalidTransition {
                from: self.state,
                event,
            }),
        }
    }

    fn check_transition(&self, event: LifecycleEvent) -> Result<(), LifecycleError> {
        match transition(self.state, event) {
            Some(_) => Ok(()),
            None => Err(LifecycleError::InvalidTransition {
                from: self.state,
                event,
            }),
        }
    }

    fn fail(&mut self, err: LifecycleError) -> LifecycleError {
        if transition(self.state, LifecycleEvent::Failed).is_some() {
            self.state = ConnectionState::Error;
        }
        self.last_error = Some(err.to_string());
        err
    }

    fn require_available(&self) -> Result<(), LifecycleError> {
        if self.platform.is_available() {
            Ok(())
        } else {
            Err(LifecycleError::ComingSoon(self.platform.display_name))
        }
    }

    fn require_connection(&self) -> Result<&Connection, LifecycleError> {
        self.connection
            .as_ref()
            .ok_or(LifecycleError::NotConnected(self.platform.noun))
    }

    fn connection_id(&self) -> Result<String, LifecycleError> {
        let connection = self.require_connection()?;
        api::path_id(&connection.id)
            .map(ToOwned::to_owned)
            .map_err(|e| LifecycleError::backend(e, "Invalid connection id"))
    }

    /// Starts the OAuth flow and returns the URL the operator has to visit.
    pub fn initiate_oauth(&mut self, scopes: &[String]) -> Result<OAuthStart, LifecycleError> {
        self.require_available()?;
        if !self.platform.supports(AuthMethod::OAuth) {
            return Err(LifecycleError::UnsupportedAuthMethod {
                platform: self.platform.display_name,
                method: AuthMethod::OAuth,
            });
        }

        let unknown: Vec<FieldError> = scopes
            .iter()
            .filter(|s| !self.platform.oauth_scopes.iter().any(|o| o.name == s.as_str()))
            .map(|s| FieldError::new("scopes", format!("Unknown scope: {s}")))
            .collect();
        if !unknown.is_empty() {
            return Err(LifecycleError::Validation(unknown));
        }
        let scopes: Vec<String> = if scopes.is_empty() {
            self.platform
                .default_scopes()
                .into_iter()
                .map(ToOwned::to_owned)
                .collect()
        } else {
            scopes.to_vec()
        };

        self.check_transition(LifecycleEvent::Initiate)?;

        #[derive(serde::Deserialize)]
        struct InitiateResponse {
            #[serde(alias = "auth_url", alias = "url")]
            authorization_url: String,
            #[serde(default)]
            state: Option<String>,
        }

        let mut body = serde_json::json!({ "scopes": scopes });
        if let Some(redirect_uri) = self.console.redirect_uri() {
            body["redirect_uri"] = serde_json::Value::String(redirect_uri.to_string());
        }
        let response: InitiateResponse = self
            .console
            .backend()
            .post(&self.platform.oauth_initiate_path(), &body)
            .map_err(|e| {
                LifecycleError::backend(
                    e,
                    &format!("Failed to start {} authorization", self.platform.display_name),
                )
            })?;

        self.apply(LifecycleEvent::Initiate)?;
        self.last_error = None;
        Ok(OAuthStart {
            authorization_url: response.authorization_url,
            state: response.state,
            scopes,
        })
    }

    /// Consumes the OAuth redirect in `url` (the query is stripped either way).
    ///
    /// Returns `Ok(None)` when the URL carries no callback parameters, e.g. on
    /// a second call with the same, already-consumed URL.
    pub fn complete_oauth(
        &mut self,
        url: &mut reqwest::Url,
    ) -> Result<Option<CallbackOutcome>, LifecycleError> {
        self.require_available()?;
        let Some(outcome) = take_callback(url) else {
            return Ok(None);
        };

        // A callback may arrive in a fresh process that never saw the initiate step.
        if matches!(
            self.state,
            ConnectionState::Disconnected | ConnectionState::Error
        ) {
            self.apply(LifecycleEvent::Initiate)?;
        }

        match &outcome {
            CallbackOutcome::Connected { .. } => {
                self.apply(LifecycleEvent::Established)?;
                self.last_error = None;
                self.console.invalidate_platform(self.platform);
                Ok(Some(outcome))
            }
            CallbackOutcome::Failed { error, .. } => {
                let message = outcome.message().unwrap_or_else(|| error.clone());
                Err(self.fail(LifecycleError::OAuth(message)))
            }
        }
    }

    /// Validates and submits static credentials.
    ///
    /// Nothing is sent when any field fails validation.
    pub fn store_credentials(
        &mut self,
        method: AuthMethod,
        fields: &BTreeMap<String, String>,
    ) -> Result<Connection, LifecycleError> {
        self.require_available()?;
        let option = self.platform.auth_option(method).ok_or(
            LifecycleError::UnsupportedAuthMethod {
                platform: self.platform.display_name,
                method,
            },
        )?;
        if method == AuthMethod::OAuth {
            return Err(LifecycleError::UnsupportedAuthMethod {
                platform: self.platform.display_name,
                method,
            });
        }

        let errors = validate::validate_fields(option.fields, fields);
        if !errors.is_empty() {
            return Err(LifecycleError::Validation(errors));
        }

        self.apply(LifecycleEvent::Initiate)?;

        let mut body = serde_json::Map::new();
        body.insert(
            "auth_method".to_string(),
            serde_json::Value::String(method.as_str().to_string()),
        );
        for (k, v) in fields {
            body.insert(k.clone(), serde_json::Value::String(v.trim().to_string()));
        }

        let result: Result<Connection, ApiError> = self
            .console
            .backend()
            .post(&self.platform.collection_path(), &body);
        match result {
            Ok(mut connection) => {
                if connection.platform.is_empty() {
                    connection.platform = self.platform.id.slug().to_string();
                }
                self.apply(LifecycleEvent::Established)?;
                self.last_error = None;
                self.console.invalidate_platform(self.platform);
                self.connection = Some(connection.clone());
                Ok(connection)
            }
            Err(err) => {
                let err = store_error(self.platform, err);
                Err(self.fail(err))
            }
        }
    }

    /// Asks the backend to verify the stored credentials. Stored state is not
    /// touched, except that a passing test recovers a connection in `error`.
    pub fn test(&mut self) -> Result<TestOutcome, LifecycleError> {
        self.require_available()?;
        let id = self.connection_id()?;
        let outcome: TestOutcome = self
            .console
            .backend()
            .post(&self.platform.test_path(&id), &serde_json::json!({}))
            .map_err(|e| LifecycleError::backend(e, "Connection test failed"))?;

        if outcome.success && self.state == ConnectionState::Error {
            self.apply(LifecycleEvent::Recovered)?;
            self.last_error = None;
        }
        Ok(outcome)
    }

    pub fn sync(&mut self) -> Result<SyncOutcome, LifecycleError> {
        self.require_available()?;
        let id = self.connection_id()?;
        self.apply(LifecycleEvent::SyncStarted)?;

        let result: Result<Option<SyncOutcome>, ApiError> = self
            .console
            .backend()
            .post(&self.platform.sync_path(Some(&id)), &serde_json::json!({}));
        match result {
            Ok(outcome) => {
                self.apply(LifecycleEvent::SyncFinished)?;
                self.last_error = None;
                self.console.invalidate_platform(self.platform);
                Ok(outcome.unwrap_or_default())
            }
            Err(err) => {
                let fallback = format!("Failed to sync {}", self.platform.display_name);
                let err = LifecycleError::backend(err, &fallback);
                Err(self.fail(err))
            }
        }
    }

    pub fn disconnect(&mut self) -> Result<(), LifecycleError> {
        self.require_available()?;
        let id = self.connection_id()?;
        self.check_transition(LifecycleEvent::Disconnected)?;

        self.console
            .backend()
            .delete(&self.platform.item_path(&id))
            .map_err(|e| {
                LifecycleError::backend(
                    e,
                    &format!("Failed to disconnect {} {}", self.platform.display_name, self.platform.noun),
                )
            })?;

        self.apply(LifecycleEvent::Disconnected)?;
        self.connection = None;
        self.console.invalidate_platform(self.platform);
        Ok(())
    }
}

/// Syncs every connection of a platform in one request.
pub fn sync_platform<T: Transport>(
    console: &Console<T>,
    platform: &'static PlatformSpec,
) -> Result<SyncOutcome, LifecycleError> {
    if !platform.is_available() {
        return Err(LifecycleError::ComingSoon(platform.display_name));
    }
    let outcome: Option<SyncOutcome> = console
        .backend()
        .post(&platform.sync_path(None), &serde_json::json!({}))
        .map_err(|e| {
            LifecycleError::backend(e, &format!("Failed to sync {}", platform.display_name))
        })?;
    console.invalidate_platform(platform);
    Ok(outcome.unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Method, MockTransport};
    use crate::platform::PlatformId;
    use serde_json::json;

    #[test]
    fn transition_table_matches_lifecycle() {
        use ConnectionState as S;
        use LifecycleEvent as E;

        assert_eq!(transition(S::Disconnected, E::Initiate), Some(S::Connecting));
        assert_eq!(transition(S::Connecting, E::Established), Some(S::Connected));
        assert_eq!(transition(S::Connected, E::SyncStarted), Some(S::Syncing));
        assert_eq!(transition(S::Syncing, E::SyncFinished), Some(S::Connected));
        assert_eq!(transition(S::Syncing, E::Failed), Some(S::Error));
        assert_eq!(transition(S::Error, E::Recovered), Some(S::Connected));
        assert_eq!(transition(S::Connected, E::Disconnected), Some(S::Disconnected));

        assert_eq!(transition(S::Disconnected, E::SyncStarted), None);
        assert_eq!(transition(S::Connected, E::Initiate), None);
        assert_eq!(transition(S::Disconnected, E::Disconnected), None);
    }

    fn active(id: &str) -> Connection {
        Connection {
            id: id.to_string(),
            platform: "github".to_string(),
            name: "acme".to_string(),
            scope: None,
            auth_method: None,
            is_active: true,
            last_sync_at: None,
            status: None,
        }
    }

    #[test]
    fn sync_moves_through_syncing_back_to_connected() {
        let console = Console::new(MockTransport::new().on(
            Method::Post,
            "/github/connections/5/sync",
            200,
            json!({"message": "ok"}),
        ));
        let mut lc = ConnectionLifecycle::resume(&console, PlatformId::Github.spec(), active("5"));
        let outcome = lc.sync().unwrap();
        assert_eq!(outcome.message.as_deref(), Some("ok"));
        assert_eq!(lc.state(), ConnectionState::Connected);
    }

    #[test]
    fn failed_sync_lands_in_error_and_test_recovers() {
        let console = Console::new(
            MockTransport::new()
                .on(Method::Post, "/github/connections/5/sync", 500, json!({"detail": "rate limited"}))
                .on(Method::Post, "/github/connections/5/test", 200, json!({"success": true})),
        );
        let mut lc = ConnectionLifecycle::resume(&console, PlatformId::Github.spec(), active("5"));
        let err = lc.sync().unwrap_err();
        assert_eq!(err.to_string(), "rate limited");
        assert_eq!(lc.state(), ConnectionState::Error);

        assert!(lc.test().unwrap().success);
        assert_eq!(lc.state(), ConnectionState::Connected);
    }

    #[test]
    fn failed_test_does_not_change_state() {
        let console = Console::new(MockTransport::new().on(
            Method::Post,
            "/github/connections/5/test",
            200,
            json!({"success": false, "message": "token revoked"}),
        ));
        let mut lc = ConnectionLifecycle::resume(&console, PlatformId::Github.spec(), active("5"));
        let outcome = lc.test().unwrap();
        assert!(!outcome.success);
        assert_eq!(lc.state(), ConnectionState::Connected);
    }

    #[test]
    fn initiate_oauth_rejects_unknown_scopes_without_request() {
        let console = Console::new(MockTransport::new());
        let mut lc = ConnectionLifecycle::new(&console, PlatformId::Slack.spec());
        let err = lc.initiate_oauth(&["chat:write".to_string()]).unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
        assert_eq!(console.transport().request_count(), 0);
        assert_eq!(lc.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn initiate_oauth_uses_default_scopes() {
        let console = Console::new(MockTransport::new().on(
            Method::Post,
            "/slack/oauth/initiate",
            200,
            json!({"authorization_url": "https://slack.com/oauth/v2/authorize?x=1", "state": "abc"}),
        ))
        .with_redirect_uri(Some("http://localhost:3000/slack/callback".to_string()));
        let mut lc = ConnectionLifecycle::new(&console, PlatformId::Slack.spec());
        let start = lc.initiate_oauth(&[]).unwrap();
        assert_eq!(start.state.as_deref(), Some("abc"));
        assert_eq!(lc.state(), ConnectionState::Connecting);

        let body = console.transport().requests()[0].body.clone().unwrap();
        assert_eq!(body["scopes"], json!(["users:read", "users:read.email", "team:read"]));
        assert_eq!(body["redirect_uri"], "http://localhost:3000/slack/callback");
    }

    #[test]
    fn aws_does_not_offer_oauth() {
        let console = Console::new(MockTransport::new());
        let mut lc = ConnectionLifecycle::new(&console, PlatformId::Aws.spec());
        assert!(matches!(
            lc.initiate_oauth(&[]),
            Err(LifecycleError::UnsupportedAuthMethod { .. })
        ));
    }

    #[test]
    fn coming_soon_platform_issues_no_requests() {
        let console = Console::new(MockTransport::new());
        let mut lc = ConnectionLifecycle::new(&console, PlatformId::Office365.spec());
        assert!(matches!(
            lc.store_credentials(AuthMethod::OAuth, &BTreeMap::new()),
            Err(LifecycleError::ComingSoon("Office 365"))
        ));
        assert_eq!(console.transport().request_count(), 0);
    }

    #[test]
    fn backend_field_error_becomes_validation_error() {
        let console = Console::new(MockTransport::new().on(
            Method::Post,
            "/slack/connections",
            422,
            json!({"detail": "token is not a bot token", "field": "bot_token"}),
        ));
        let mut lc = ConnectionLifecycle::new(&console, PlatformId::Slack.spec());
        let mut fields = BTreeMap::new();
        fields.insert("bot_token".to_string(), "xoxb-1-2-abc".to_string());
        let err = lc.store_credentials(AuthMethod::BotToken, &fields).unwrap_err();
        assert_eq!(
            err.field_errors(),
            &[FieldError::new("bot_token", "token is not a bot token")]
        );
        assert_eq!(lc.state(), ConnectionState::Error);
    }

    #[test]
    fn disconnect_removes_one_connection() {
        let console = Console::new(MockTransport::new().on(
            Method::Delete,
            "/slack/connections/T1",
            204,
            serde_json::Value::Null,
        ));
        let mut lc = ConnectionLifecycle::resume(&console, PlatformId::Slack.spec(), active("T1"));
        lc.disconnect().unwrap();
        assert_eq!(lc.state(), ConnectionState::Disconnected);
        assert!(lc.connection().is_none());

        let err = lc.disconnect().unwrap_err();
        assert!(matches!(err, LifecycleError::NotConnected(_)));
        assert_eq!(console.transport().request_count(), 1);
    }

    #[test]
    fn connection_ids_with_path_separators_are_not_sent() {
        let console = Console::new(MockTransport::new());
        let mut lc =
            ConnectionLifecycle::resume(&console, PlatformId::Github.spec(), active("5/../../x"));
        let err = lc.disconnect().unwrap_err();
        assert!(matches!(
            err,
            LifecycleError::Backend {
                source: ApiError::InvalidId(_),
                ..
            }
        ));
        assert!(lc.test().is_err());
        assert_eq!(lc.state(), ConnectionState::Connected);
        assert_eq!(console.transport().request_count(), 0);
    }
}
