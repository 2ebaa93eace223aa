//! Client side of the backend REST API.
//!
//! ```text
//! Transport (trait)
//!     |
//!     +-- HttpTransport   reqwest blocking client, bearer auth
//!     +-- MockTransport   route table + request recorder, for tests
//!
//! Backend<T: Transport>   typed JSON helpers on top of any transport
//! ```

use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

mod http;
mod mock;

pub use http::HttpTransport;
pub use mock::MockTransport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Patch,
    Delete,
}

impl Method {
    pub const fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<serde_json::Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
        }
    }

    pub fn with_body(mut self, body: serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Errors emitted while talking to the backend.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    /// Client could not be built (bad base URL, TLS setup, ...).
    #[error("backend client configuration error: {0}")]
    Configuration(String),

    /// Request never produced an HTTP response.
    #[error("backend transport error: {0}")]
    Transport(String),

    /// Backend answered with a non-success status.
    #[error("backend returned HTTP {status}{}", detail_suffix(.detail))]
    Status {
        status: u16,
        /// Human-readable message taken from the structured error body.
        detail: Option<String>,
        /// Form field the backend blamed, if any.
        field: Option<String>,
    },

    /// Response body did not match the expected shape.
    #[error("backend response could not be parsed: {0}")]
    Decode(String),

    /// An id that cannot be used as a single URL path segment.
    #[error("invalid resource id: {0:?}")]
    InvalidId(String),
}

fn detail_suffix(detail: &Option<String>) -> String {
    detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default()
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn detail(&self) -> Option<&str> {
        match self {
            ApiError::Status { detail, .. } => detail.as_deref(),
            _ => None,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            ApiError::Status { field, .. } => field.as_deref(),
            _ => None,
        }
    }

    /// Picks the message to show the operator: the structured backend detail
    /// first, then the generic error text, then `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        if let Some(detail) = self.detail().map(str::trim).filter(|d| !d.is_empty()) {
            return detail.to_string();
        }
        let generic = match self {
            ApiError::Configuration(m) | ApiError::Transport(m) | ApiError::Decode(m) => {
                Some(m.trim().to_string())
            }
            ApiError::InvalidId(_) => Some(self.to_string()),
            ApiError::Status { .. } => None,
        };
        match generic.filter(|m| !m.is_empty()) {
            Some(m) => m,
            None => fallback.to_string(),
        }
    }

    pub(crate) fn from_response(response: &ApiResponse) -> Self {
        let (detail, field) = extract_error_body(&response.body);
        ApiError::Status {
            status: response.status,
            detail,
            field,
        }
    }
}

/// Pulls `detail` / `error` / `message` (and a blamed field) out of an error body.
///
/// FastAPI validation errors arrive as `{"detail": [{"loc": [..., "field"], "msg": "..."}]}`;
/// the first entry wins.
fn extract_error_body(body: &[u8]) -> (Option<String>, Option<String>) {
    let Ok(value) = serde_json::from_slice::<serde_json::Value>(body) else {
        return (None, None);
    };
    let Some(obj) = value.as_object() else {
        return (None, None);
    };

    let mut field = obj
        .get("field")
        .and_then(|f| f.as_str())
        .map(ToOwned::to_owned);

    let detail = match obj.get("detail") {
        Some(serde_json::Value::String(s)) => Some(s.clone()),
        Some(serde_json::Value::Array(items)) => {
            let first = items.first();
            if field.is_none() {
                field = first
                    .and_then(|i| i.get("loc"))
                    .and_then(|l| l.as_array())
                    .and_then(|l| l.last())
                    .and_then(|l| l.as_str())
                    .map(ToOwned::to_owned);
            }
            first
                .and_then(|i| i.get("msg"))
                .and_then(|m| m.as_str())
                .map(ToOwned::to_owned)
        }
        _ => None,
    };

    let detail = detail
        .or_else(|| obj.get("error").and_then(|e| e.as_str()).map(ToOwned::to_owned))
        .or_else(|| {
            obj.get("message")
                .and_then(|m| m.as_str())
                .map(ToOwned::to_owned)
        });

    (detail, field)
}

/// Sends requests to the backend. Implementations only report transport
/// failures as errors; HTTP error statuses come back as responses.
/// Checks that `id` stays one path segment once it is spliced into a route.
pub fn path_id(id: &str) -> Result<&str, ApiError> {
    let bad = id.is_empty()
        || id == "."
        || id == ".."
        || id
            .chars()
            .any(|c| matches!(c, '/' | '\\' | '?' | '#' | '%') || c.is_whitespace() || c.is_control());
    if bad {
        Err(ApiError::InvalidId(id.to_string()))
    } else {
        Ok(id)
    }
}

pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// Returns an error when no HTTP response was received.
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError>;

    fn name(&self) -> &'static str;
}

pub struct Backend<T: Transport> {
    transport: T,
}

impl<T: Transport> Backend<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn send(&self, request: ApiRequest) -> Result<ApiResponse, ApiError> {
        let response = self.transport.send(&request)?;
        tracing::debug!(
            transport = self.transport.name(),
            method = request.method.as_str(),
            path = %request.path,
            status = response.status,
            "backend request"
        );
        if response.is_success() {
            Ok(response)
        } else {
            Err(ApiError::from_response(&response))
        }
    }

    pub fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, ApiError> {
        let response = self.send(ApiRequest::new(Method::Get, path))?;
        decode(&response)
    }

    pub fn post<B: Serialize, R: DeserializeOwned>(&self, path: &str, body: &B) -> Result<R, ApiError> {
        let response = self.send(ApiRequest::new(Method::Post, path).with_body(to_value(body)?))?;
        decode(&response)
    }

    pub fn patch<B: Serialize, R: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, ApiError> {
        let response = self.send(ApiRequest::new(Method::Patch, path).with_body(to_value(body)?))?;
        decode(&response)
    }

    pub fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send(ApiRequest::new(Method::Delete, path)).map(|_| ())
    }
}

fn to_value<B: Serialize>(body: &B) -> Result<serde_json::Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode(e.to_string()))
}

/// Empty bodies decode as JSON `null`, so `()` and `Option<_>` targets accept 204s.
fn decode<R: DeserializeOwned>(response: &ApiResponse) -> Result<R, ApiError> {
    let body: &[u8] = if response.body.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        &response.body
    };
    serde_json::from_slice(body).map_err(|e| ApiError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn status(code: u16, body: &str) -> ApiError {
        ApiError::from_response(&ApiResponse {
            status: code,
            body: body.as_bytes().to_vec(),
        })
    }

    #[test]
    fn user_message_prefers_structured_detail() {
        let err = status(400, r#"{"detail":"Account already exists","message":"other"}"#);
        assert_eq!(err.user_message("fallback"), "Account already exists");

        let err = status(500, r#"{"error":"boom"}"#);
        assert_eq!(err.user_message("fallback"), "boom");
    }

    #[test]
    fn user_message_falls_back_to_generic_then_hardcoded() {
        let err = ApiError::Transport("connection refused".to_string());
        assert_eq!(err.user_message("fallback"), "connection refused");

        let err = status(502, "<html>bad gateway</html>");
        assert_eq!(err.user_message("Failed to load accounts"), "Failed to load accounts");

        let err = ApiError::Transport("   ".to_string());
        assert_eq!(err.user_message("fallback"), "fallback");
    }

    #[test]
    fn path_id_rejects_route_changing_ids() {
        for id in ["7", "acc-7", "T01ABC", "user@acme.io"] {
            assert_eq!(path_id(id).unwrap(), id);
        }
        for id in ["", ".", "..", "1/../../x", "1?x=2", "1#frag", "a%2Fb", "a b", "a\\b"] {
            let err = path_id(id).unwrap_err();
            assert!(matches!(err, ApiError::InvalidId(_)), "{id:?}");
            assert!(err.user_message("fallback").starts_with("invalid resource id"));
        }
    }

    #[test]
    fn fastapi_validation_detail_names_the_field() {
        let err = status(
            422,
            r#"{"detail":[{"loc":["body","secret_access_key"],"msg":"invalid key","type":"value_error"}]}"#,
        );
        assert_eq!(err.field(), Some("secret_access_key"));
        assert_eq!(err.detail(), Some("invalid key"));
    }

    #[test]
    fn empty_body_decodes_as_unit() {
        let response = ApiResponse {
            status: 204,
            body: Vec::new(),
        };
        let () = decode(&response).unwrap();
        let none: Option<u32> = decode(&response).unwrap();
        assert!(none.is_none());
    }
}
