use std::time::Duration;

use crate::api::{ApiError, ApiRequest, ApiResponse, Method, Transport};

const USER_AGENT: &str = concat!("saasboard/", env!("CARGO_PKG_VERSION"));

/// Production transport: JSON over HTTPS with an optional bearer token.
pub struct HttpTransport {
    base_url: String,
    token: Option<String>,
    http_client: reqwest::blocking::Client,
}

impl HttpTransport {
    /// # Errors
    ///
    /// Returns an error when the base URL is empty or the HTTP client cannot
    /// be initialized.
    pub fn new(
        base_url: impl Into<String>,
        token: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let base_url = base_url.into();
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if base_url.is_empty() {
            return Err(ApiError::Configuration(
                "api base_url must not be empty".to_string(),
            ));
        }
        reqwest::Url::parse(&base_url)
            .map_err(|e| ApiError::Configuration(format!("invalid api base_url {base_url}: {e}")))?;

        let http_client = reqwest::blocking::Client::builder()
            .connect_timeout(Duration::from_secs(10).min(timeout))
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ApiError::Configuration(e.to_string()))?;

        Ok(Self {
            base_url,
            token: token.filter(|t| !t.trim().is_empty()),
            http_client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Transport for HttpTransport {
    fn send(&self, request: &ApiRequest) -> Result<ApiResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = match request.method {
            Method::Get => self.http_client.get(&url),
            Method::Post => self.http_client.post(&url),
            Method::Patch => self.http_client.patch(&url),
            Method::Delete => self.http_client.delete(&url),
        }
        .header("Accept", "application/json");

        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| ApiError::Transport(e.to_string()))?
            .to_vec();

        Ok(ApiResponse { status, body })
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_or_malformed_base_url() {
        let timeout = Duration::from_secs(1);
        assert!(matches!(
            HttpTransport::new("  ", None, timeout),
            Err(ApiError::Configuration(_))
        ));
        assert!(matches!(
            HttpTransport::new("not a url", None, timeout),
            Err(ApiError::Configuration(_))
        ));
    }

    #[test]
    fn trims_trailing_slash_and_blank_token() {
        let t = HttpTransport::new("http://localhost:8000/api/", Some(" ".into()), Duration::from_secs(1))
            .unwrap();
        assert_eq!(t.base_url(), "http://localhost:8000/api");
        assert!(t.token.is_none());
    }
}
