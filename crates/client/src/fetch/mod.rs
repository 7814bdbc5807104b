//! HTTP transport for intercepted requests.
//!
//! ### Semantics
//! - Method, headers and body are forwarded as given.
//! - Every HTTP status is a successful fetch; deciding what a 404 or 500
//!   means belongs to the caller.
//! - Only transport failures (DNS, TLS, refused connections, timeouts) and
//!   the byte limit produce errors.
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)

use std::time::{Duration, Instant};

use reqwest::{Client, Method, header};

use offcache_core::Error;
use offcache_core::http::{CacheMode, Headers, InterceptedRequest, Response};
use offcache_core::network::Network;

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "offcache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "offcache/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

/// reqwest-backed [`Network`].
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { http, config })
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    fn too_large(&self, len: u64) -> Option<Error> {
        (len > self.config.max_bytes as u64)
            .then(|| Error::FetchTooLarge(format!("{len} bytes exceeds {}", self.config.max_bytes)))
    }
}

#[async_trait::async_trait]
impl Network for FetchClient {
    async fn fetch(&self, request: &InterceptedRequest) -> Result<Response, Error> {
        let start = Instant::now();
        let url = request.url().clone();

        let method = Method::from_bytes(request.method().as_bytes())
            .map_err(|e| Error::InvalidInput(format!("invalid method {}: {e}", request.method())))?;

        let mut builder = self.http.request(method, url.as_str());
        for (name, value) in request.headers().iter() {
            builder = builder.header(name, value);
        }
        if matches!(request.cache_mode(), CacheMode::NoStore | CacheMode::Reload | CacheMode::NoCache)
            && !request.headers().contains(header::CACHE_CONTROL.as_str())
        {
            builder = builder.header(header::CACHE_CONTROL, "no-cache");
        }
        if !request.body().is_empty() {
            builder = builder.body(request.body().clone());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| Error::Network(format!("{url}: {e}")))?;

        if let Some(err) = response.content_length().and_then(|len| self.too_large(len)) {
            return Err(err);
        }

        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let headers: Headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response
            .bytes()
            .await
            .map_err(|e| Error::Network(format!("failed to read response from {url}: {e}")))?;

        if let Some(err) = self.too_large(bytes.len() as u64) {
            return Err(err);
        }

        tracing::debug!(
            "fetched {} {} -> {} ({}) in {}ms ({} bytes)",
            request.method(),
            url,
            final_url,
            status,
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response::new(status, bytes).with_headers(headers).with_url(final_url))
    }
}
