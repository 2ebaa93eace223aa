use std::sync::Mutex;

use crate::api::{ApiError, ApiRequest, ApiResponse, Method, Transport};

struct Route {
    method: Method,
    path: String,
    outcome: Result<ApiResponse, String>,
}

/// In-memory transport that answers from a route table and records every request.
///
/// Routes are matched on exact method + path; when several routes match, the
/// most recently added one wins. Unmatched requests get a 404.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<Vec<Route>>,
    requests: Mutex<Vec<ApiRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(self, method: Method, path: &str, status: u16, body: serde_json::Value) -> Self {
        let body = if body.is_null() {
            Vec::new()
        } else {
            body.to_string().into_bytes()
        };
        self.push(method, path, Ok(ApiResponse { status, body }));
        self
    }

    /// Simulates a request that never reaches the backend.
    pub fn unreachable(self, method: Method, path: &str, message: &str) -> Self {
        self.push(method, path, Err(message.to_string()));
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn calls_to(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    fn push(&self, method: Method, path: &str, outcome: Result<ApiResponse, String>) {
        self.routes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(Route {
                method,
                path: path.to_string(),
                outcome,
            });
    }
}

impl Transport for MockTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request.clone());

        let routes = self.routes.lock().unwrap_or_else(|e| e.into_inner());
        let route = routes
            .iter()
            .rev()
            .find(|r| r.method == request.method && r.path == request.path);
        match route {
            Some(route) => route.outcome.clone().map_err(ApiError::Transport),
            None => Ok(ApiResponse {
                status: 404,
                body: br#"{"detail":"Not Found"}"#.to_vec(),
            }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}
