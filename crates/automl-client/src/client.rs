//! Vertex AI REST API client.
//!
//! Production-grade client with:
//! - Token caching with refresh margin
//! - HTTP client tuning (pooling, timeouts)
//! - Exponential backoff with jitter
//! - Observability (tracing spans, metrics)

use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info_span, Instrument};

use crate::error::{VertexError, VertexResult};
use crate::metrics::record_request;
use crate::retry::RetryConfig;
use crate::token_cache::{TokenCache, TokenSource};

// =============================================================================
// Configuration
// =============================================================================

/// Vertex AI client configuration.
#[derive(Debug, Clone)]
pub struct VertexConfig {
    /// GCP project ID
    pub project_id: String,
    /// Region hosting datasets, models and endpoints
    pub region: String,
    /// REST base URL including the API version
    pub api_endpoint: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Delay between polls of long-running operations
    pub poll_interval: Duration,
    /// Give up waiting on a long-running operation after this long
    pub operation_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl VertexConfig {
    pub const DEFAULT_REGION: &'static str = "us-central1";

    /// Config with default timeouts for the given project and region.
    pub fn new(project_id: impl Into<String>, region: impl Into<String>) -> Self {
        let region = region.into();
        Self {
            project_id: project_id.into(),
            api_endpoint: Self::default_endpoint(&region),
            region,
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(10),
            operation_timeout: Duration::from_secs(24 * 60 * 60),
            retry: RetryConfig::default(),
        }
    }

    fn default_endpoint(region: &str) -> String {
        format!("https://{}-aiplatform.googleapis.com/v1", region)
    }

    /// Create config from environment variables.
    pub fn from_env() -> VertexResult<Self> {
        let project_id = std::env::var("GCP_PROJECT_ID").map_err(|_| {
            VertexError::config_error("GCP_PROJECT_ID must be set to access Vertex AI")
        })?;

        if project_id.trim().is_empty() {
            return Err(VertexError::config_error("GCP_PROJECT_ID cannot be empty"));
        }

        let region = std::env::var("VERTEX_REGION")
            .ok()
            .filter(|r| !r.trim().is_empty())
            .unwrap_or_else(|| Self::DEFAULT_REGION.to_string());

        let secs = |var: &str, default: u64| -> Duration {
            Duration::from_secs(
                std::env::var(var)
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(default),
            )
        };

        let mut config = Self::new(project_id, region);
        if let Ok(endpoint) = std::env::var("VERTEX_API_ENDPOINT") {
            if !endpoint.trim().is_empty() {
                config.api_endpoint = endpoint.trim_end_matches('/').to_string();
            }
        }
        config.timeout = secs("VERTEX_TIMEOUT_SECS", 30);
        config.connect_timeout = secs("VERTEX_CONNECT_TIMEOUT_SECS", 5);
        config.poll_interval = secs("VERTEX_POLL_INTERVAL_SECS", 10);
        config.operation_timeout = secs("VERTEX_OPERATION_TIMEOUT_SECS", 24 * 60 * 60);
        config.retry = RetryConfig::from_env();
        Ok(config)
    }

    /// `projects/{project}/locations/{region}`
    pub fn parent(&self) -> String {
        format!("projects/{}/locations/{}", self.project_id, self.region)
    }
}

// =============================================================================
// Client
// =============================================================================

/// Vertex AI REST API client.
pub struct VertexClient {
    http: Client,
    config: VertexConfig,
    token_cache: Arc<TokenCache>,
}

impl Clone for VertexClient {
    fn clone(&self) -> Self {
        Self {
            http: self.http.clone(),
            config: self.config.clone(),
            token_cache: Arc::clone(&self.token_cache),
        }
    }
}

impl VertexClient {
    /// Create a client using credentials discovered from the environment.
    pub async fn new(config: VertexConfig) -> VertexResult<Self> {
        let source = Self::token_source_from_env().await?;
        Self::with_token_source(config, source)
    }

    /// Create a client with explicit credentials.
    pub fn with_token_source(config: VertexConfig, source: TokenSource) -> VertexResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("automl-client/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(VertexError::Network)?;

        Ok(Self {
            http,
            config,
            token_cache: Arc::new(TokenCache::new(source)),
        })
    }

    /// `VERTEX_ACCESS_TOKEN` wins; otherwise application default credentials.
    async fn token_source_from_env() -> VertexResult<TokenSource> {
        if let Ok(token) = std::env::var("VERTEX_ACCESS_TOKEN") {
            if !token.trim().is_empty() {
                return Ok(TokenSource::Static(token.trim().to_string()));
            }
        }

        let provider = gcp_auth::provider().await.map_err(|e| {
            VertexError::auth_error(format!("Failed to load application credentials: {}", e))
        })?;
        Ok(TokenSource::Provider(provider))
    }

    /// Create from environment variables.
    pub async fn from_env() -> VertexResult<Self> {
        let config = VertexConfig::from_env()?;
        Self::new(config).await
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    /// Expand a bare id to `projects/.../locations/.../{collection}/{id}`;
    /// full resource names are returned unchanged.
    pub fn resource_name(&self, collection: &str, id_or_name: &str) -> String {
        if id_or_name.contains('/') {
            id_or_name.to_string()
        } else {
            format!("{}/{}/{}", self.config.parent(), collection, id_or_name)
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_endpoint, path.trim_start_matches('/'))
    }

    fn is_access_token_expired(body: &str) -> bool {
        body.contains("ACCESS_TOKEN_EXPIRED") || body.contains("\"UNAUTHENTICATED\"")
    }

    // =========================================================================
    // Request helpers
    // =========================================================================

    pub(crate) async fn get<T>(&self, operation: &str, path: &str) -> VertexResult<T>
    where
        T: DeserializeOwned,
    {
        self.request::<(), T>(operation, Method::GET, path, None).await
    }

    pub(crate) async fn post<B, T>(&self, operation: &str, path: &str, body: &B) -> VertexResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(operation, Method::POST, path, Some(body)).await
    }

    pub(crate) async fn delete<T>(&self, operation: &str, path: &str) -> VertexResult<T>
    where
        T: DeserializeOwned,
    {
        self.request::<(), T>(operation, Method::DELETE, path, None).await
    }

    /// Send an authorized JSON request with retry, tracing and metrics.
    async fn request<B, T>(
        &self,
        operation: &str,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> VertexResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);

        crate::retry::with_retry(&self.config.retry, operation, || {
            self.execute_request(operation, path, self.send_once(method.clone(), &url, body))
        })
        .await
    }

    async fn send_once<B, T>(&self, method: Method, url: &str, body: Option<&B>) -> VertexResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let build = |token: &str| {
            let request = self.http.request(method.clone(), url).bearer_auth(token);
            match body {
                Some(b) => request.json(b),
                None => request,
            }
        };

        let mut token = self.token_cache.get_token().await?;
        let mut response = build(&token).send().await?;
        let mut status = response.status();

        if status == StatusCode::UNAUTHORIZED {
            let text = response.text().await.unwrap_or_default();
            if Self::is_access_token_expired(&text) {
                debug!("Access token rejected, refreshing once");
                self.token_cache.invalidate().await;
                token = self.token_cache.get_token().await?;
                response = build(&token).send().await?;
                status = response.status();
            } else {
                return Err(VertexError::from_http_status(
                    status.as_u16(),
                    format!("{} {} failed: {}", method, url, text),
                ));
            }
        }

        if !status.is_success() {
            return Err(Self::handle_error_response(status, &method, url, response).await);
        }

        let text = response.text().await?;
        let text = if text.trim().is_empty() { "{}" } else { text.as_str() };
        serde_json::from_str(text).map_err(|e| {
            VertexError::invalid_response(format!(
                "Failed to parse {} response: {} (body prefix: {})",
                url,
                e,
                text.chars().take(200).collect::<String>()
            ))
        })
    }

    /// Execute a request with tracing and metrics.
    async fn execute_request<T, F>(&self, operation: &str, path: &str, fut: F) -> VertexResult<T>
    where
        F: std::future::Future<Output = VertexResult<T>>,
    {
        let span = info_span!("vertex_request", operation = %operation, path = %path);

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }

    async fn handle_error_response(
        status: StatusCode,
        method: &Method,
        url: &str,
        response: reqwest::Response,
    ) -> VertexError {
        let retry_after_ms = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(|secs| secs.saturating_mul(1000));

        let body = response.text().await.unwrap_or_default();
        VertexError::from_http_status_with_retry_after(
            status.as_u16(),
            format!("{} {} failed: {}", method, url, body),
            retry_after_ms,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_env() {
        for var in [
            "GCP_PROJECT_ID",
            "VERTEX_REGION",
            "VERTEX_API_ENDPOINT",
            "VERTEX_POLL_INTERVAL_SECS",
        ] {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_config_requires_project_id() {
        clear_env();
        assert!(matches!(
            VertexConfig::from_env(),
            Err(VertexError::ConfigError(_))
        ));

        std::env::set_var("GCP_PROJECT_ID", "  ");
        assert!(VertexConfig::from_env().is_err());
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        clear_env();
        std::env::set_var("GCP_PROJECT_ID", "salads");
        let config = VertexConfig::from_env().unwrap();
        assert_eq!(config.region, "us-central1");
        assert_eq!(
            config.api_endpoint,
            "https://us-central1-aiplatform.googleapis.com/v1"
        );
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.parent(), "projects/salads/locations/us-central1");
    }

    #[test]
    #[serial]
    fn test_config_region_and_endpoint_override() {
        clear_env();
        std::env::set_var("GCP_PROJECT_ID", "salads");
        std::env::set_var("VERTEX_REGION", "europe-west4");
        let config = VertexConfig::from_env().unwrap();
        assert_eq!(
            config.api_endpoint,
            "https://europe-west4-aiplatform.googleapis.com/v1"
        );

        std::env::set_var("VERTEX_API_ENDPOINT", "http://localhost:9000/v1/");
        std::env::set_var("VERTEX_POLL_INTERVAL_SECS", "not-a-number");
        let config = VertexConfig::from_env().unwrap();
        assert_eq!(config.api_endpoint, "http://localhost:9000/v1");
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        clear_env();
    }

    #[test]
    fn test_resource_name_expansion() {
        let client = VertexClient::with_token_source(
            VertexConfig::new("p", "us-central1"),
            TokenSource::Static("t".into()),
        )
        .unwrap();
        assert_eq!(
            client.resource_name("datasets", "123"),
            "projects/p/locations/us-central1/datasets/123"
        );
        assert_eq!(
            client.resource_name("datasets", "projects/q/locations/x/datasets/9"),
            "projects/q/locations/x/datasets/9"
        );
    }
}
