//! Registry client implementation.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderValue};
use reqwest::multipart::{Form, Part};
use url::Url;

use crate::error::{Error, ErrorResponse, Result};

/// Header carrying the registry token on authenticated requests.
pub const TOKEN_HEADER: &str = "X-Sortie-Token";

/// Default timeout for requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Registry API client.
///
/// Request paths are resolved against the base URL, so both relative paths
/// (`"api/v1/state"`) and absolute URLs are accepted.
///
/// # Example
///
/// ```no_run
/// use sortie_registry::RegistryClient;
///
/// # async fn example() -> sortie_registry::Result<()> {
/// let client = RegistryClient::builder()
///     .base_url("https://registry.example.com")
///     .token("secret")
///     .build()?;
///
/// let state: serde_json::Value = client
///     .get_json_with_authentication("api/v1/state/prod/postgres")
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RegistryClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    token: Option<String>,
    timeout: Duration,
}

impl RegistryClient {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    /// Whether a token is configured.
    pub fn has_token(&self) -> bool {
        self.inner.token.is_some()
    }

    /// Resolve a path or absolute URL against the base URL.
    pub fn url(&self, path: &str) -> Result<Url> {
        if let Ok(url) = Url::parse(path) {
            return Ok(url);
        }
        let path = path.trim_start_matches('/');
        self.inner.base_url.join(path).map_err(Error::from)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Raw requests
    // ─────────────────────────────────────────────────────────────────────────

    /// POST a JSON body.
    pub async fn post_json<B>(&self, path: &str, body: &B) -> Result<reqwest::Response>
    where
        B: serde::Serialize + ?Sized,
    {
        let request = self.request(reqwest::Method::POST, path)?.json(body);
        self.send(request).await
    }

    /// POST a JSON body with the registry token attached.
    pub async fn post_json_with_authentication<B>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response>
    where
        B: serde::Serialize + ?Sized,
    {
        let request = self
            .authenticated(self.request(reqwest::Method::POST, path)?)?
            .json(body);
        self.send(request).await
    }

    /// Upload a file as the multipart form field `file`, with the registry
    /// token attached.
    pub async fn post_file_with_authentication(
        &self,
        path: &str,
        file: &Path,
    ) -> Result<reqwest::Response> {
        let contents = tokio::fs::read(file).await.map_err(|e| Error::Io {
            path: file.display().to_string(),
            source: e,
        })?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        tracing::debug!(file = %file.display(), bytes = contents.len(), "Uploading file");

        let part = Part::bytes(contents).file_name(file_name);
        let form = Form::new().part("file", part);
        let request = self
            .authenticated(self.request(reqwest::Method::POST, path)?)?
            .multipart(form);
        self.send(request).await
    }

    /// GET without authentication.
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        let request = self.request(reqwest::Method::GET, path)?;
        self.send(request).await
    }

    /// GET with the registry token attached.
    pub async fn get_with_authentication(&self, path: &str) -> Result<reqwest::Response> {
        let request = self
            .authenticated(self.request(reqwest::Method::GET, path)?)?
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.send(request).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Typed requests
    // ─────────────────────────────────────────────────────────────────────────

    /// GET with authentication and decode a JSON body.
    pub async fn get_json_with_authentication<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
    ) -> Result<T> {
        let response = self.get_with_authentication(path).await?;
        Self::handle_response(response).await
    }

    /// Decode a successful response, or turn a failed one into an error.
    pub async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            Err(Self::extract_error(response).await)
        }
    }

    /// Extract an error from a failed response.
    async fn extract_error(response: reqwest::Response) -> Error {
        let status = response.status().as_u16();
        let text = response.text().await.unwrap_or_default();

        let message = match serde_json::from_str::<ErrorResponse>(&text) {
            Ok(err) => err.message,
            Err(_) if !text.trim().is_empty() => text.trim().to_string(),
            Err(_) => format!("HTTP {}", status),
        };

        match status {
            401 => Error::Auth(message),
            404 => Error::NotFound(message),
            _ => Error::Api { status, message },
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internal helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn request(&self, method: reqwest::Method, path: &str) -> Result<reqwest::RequestBuilder> {
        let url = self.url(path)?;
        tracing::debug!(%method, %url, "Registry request");
        Ok(self
            .inner
            .http
            .request(method, url)
            .timeout(self.inner.timeout))
    }

    fn authenticated(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder> {
        let token = self.inner.token.as_deref().unwrap_or_default();
        let value = HeaderValue::from_str(token)
            .map_err(|_| Error::Config("Invalid registry token".to_string()))?;
        Ok(request.header(TOKEN_HEADER, value))
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        tracing::debug!(status = response.status().as_u16(), "Registry response");
        Ok(response)
    }
}

/// Builder for creating a RegistryClient.
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    token: Option<String>,
    timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            base_url: None,
            token: None,
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
        }
    }

    /// Set the registry base URL.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Set the registry token.
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set a custom user agent.
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<RegistryClient> {
        let base_url = self
            .base_url
            .ok_or_else(|| Error::Config("base_url is required".to_string()))?;

        let mut base_url = Url::parse(&base_url)?;
        if !base_url.path().ends_with('/') {
            base_url.set_path(&format!("{}/", base_url.path()));
        }

        let user_agent = self
            .user_agent
            .unwrap_or_else(|| format!("sortie/{}", env!("CARGO_PKG_VERSION")));

        let http = reqwest::Client::builder().user_agent(user_agent).build()?;

        Ok(RegistryClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                token: self.token,
                timeout: self.timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_base_url() {
        let result = ClientBuilder::new().build();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_builder_rejects_bad_url() {
        let result = ClientBuilder::new().base_url("not a url").build();
        assert!(matches!(result, Err(Error::InvalidUrl(_))));
    }

    #[test]
    fn test_builder_normalizes_trailing_slash() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:7770/registry")
            .build()
            .unwrap();
        assert_eq!(client.base_url().as_str(), "http://localhost:7770/registry/");
        assert!(!client.has_token());
    }

    #[test]
    fn test_url_building() {
        let client = ClientBuilder::new()
            .base_url("http://localhost:7770/registry")
            .token("t")
            .build()
            .unwrap();

        let url = client.url("api/v1/state").unwrap();
        assert_eq!(url.as_str(), "http://localhost:7770/registry/api/v1/state");

        let url = client.url("/api/v1/state").unwrap();
        assert_eq!(url.as_str(), "http://localhost:7770/registry/api/v1/state");

        let url = client.url("https://other.example.com/state.json").unwrap();
        assert_eq!(url.as_str(), "https://other.example.com/state.json");
        assert!(client.has_token());
    }
}
