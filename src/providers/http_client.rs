//! Shared, rate-limited HTTP session for the catalog API
//!
//! [`ClientContext`] owns the reqwest session, the credential pool and one
//! [`SlidingWindowLimiter`] per credential. It is built once at startup and
//! passed by reference; every request acquires the limiter of the credential
//! it is charged to before it is sent, retries included.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::config::{RetrySettings, Settings};
use crate::providers::credentials::{ConfigurationError, Credential, CredentialPool};
use crate::providers::rate_limiter::SlidingWindowLimiter;
use crate::providers::traits::{is_transient_status, ProviderError, ProviderResult};

/// Header carrying the access token
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Bounded exponential backoff with jitter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// Single attempt, no retry
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before the attempt following `attempt` (1-based).
    ///
    /// `retry_after` (from a 429) raises the wait; the result never exceeds
    /// `max_delay`.
    pub fn delay(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        let backoff = self
            .base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay);

        let jitter_ceiling = backoff.as_millis() as u64 / 2;
        let jitter = if jitter_ceiling > 0 {
            Duration::from_millis(rand::thread_rng().gen_range(0..=jitter_ceiling))
        } else {
            Duration::ZERO
        };

        let wait = (backoff + jitter).max(retry_after.unwrap_or(Duration::ZERO));
        wait.min(self.max_delay)
    }
}

impl From<&RetrySettings> for RetryPolicy {
    fn from(settings: &RetrySettings) -> Self {
        RetryPolicy {
            max_attempts: settings.max_attempts.max(1),
            base_delay: Duration::from_millis(settings.base_delay_ms),
            max_delay: Duration::from_millis(settings.max_delay_ms),
        }
    }
}

/// Process-wide API access context
pub struct ClientContext {
    /// Inner HTTP client, shared by all concurrent requests
    client: Client,

    /// Credentials, selected round-robin by index
    pool: CredentialPool,

    /// One limiter per credential name
    limiters: HashMap<String, Arc<SlidingWindowLimiter>>,

    /// Admin API base, always ending with `/`
    base_url: Url,

    retry: RetryPolicy,
}

impl ClientContext {
    /// Build the context from settings and an already loaded pool
    pub fn new(settings: &Settings, pool: CredentialPool) -> Result<Self, ConfigurationError> {
        if pool.is_empty() {
            return Err(ConfigurationError::EmptyPool);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.http.timeout_secs))
            .connect_timeout(Duration::from_secs(settings.http.connect_timeout_secs))
            .pool_max_idle_per_host(10)
            .user_agent(settings.http.user_agent.as_str())
            .danger_accept_invalid_certs(settings.http.accept_invalid_certs)
            .build()
            .map_err(|e| ConfigurationError::HttpClient(e.to_string()))?;

        let base_url = Url::parse(&settings.api_base_url())
            .map_err(|e| ConfigurationError::InvalidBaseUrl(format!("{}: {}", settings.api_base_url(), e)))?;

        let limiters = pool
            .names()
            .map(|name| {
                (
                    name.to_string(),
                    Arc::new(SlidingWindowLimiter::new(
                        settings.rate_limit.max_calls,
                        settings.rate_limit.period(),
                    )),
                )
            })
            .collect();

        Ok(ClientContext {
            client,
            pool,
            limiters,
            base_url,
            retry: RetryPolicy::from(&settings.retry),
        })
    }

    /// Load the credential store named in settings, then build the context
    pub fn from_settings(settings: &Settings) -> Result<Self, ConfigurationError> {
        let pool = CredentialPool::from_json_file(&settings.credentials.path)?;
        Self::new(settings, pool)
    }

    /// Replace the retry policy
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn pool(&self) -> &CredentialPool {
        &self.pool
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retry_policy(&self) -> &RetryPolicy {
        &self.retry
    }

    /// Resolve a path such as `products.json` against the API base
    pub fn endpoint(&self, path: &str) -> Result<Url, ConfigurationError> {
        self.base_url
            .join(path.trim_start_matches('/'))
            .map_err(|e| ConfigurationError::InvalidBaseUrl(format!("{}: {}", path, e)))
    }

    /// Credential for `index` and its limiter
    pub fn select(&self, index: usize) -> Result<(&Credential, &SlidingWindowLimiter), ConfigurationError> {
        let credential = self.pool.select(index)?;
        let limiter = self
            .limiters
            .get(credential.name())
            .ok_or(ConfigurationError::EmptyPool)?;
        Ok((credential, limiter.as_ref()))
    }

    /// Limiter of a named credential
    pub fn limiter(&self, name: &str) -> Option<&SlidingWindowLimiter> {
        self.limiters.get(name).map(Arc::as_ref)
    }

    /// Build an authenticated request charged to `credential_index`
    pub fn request(
        &self,
        method: Method,
        url: Url,
        credential_index: usize,
    ) -> ProviderResult<ScopedRequest<'_>> {
        let (credential, limiter) = self.select(credential_index)?;
        let builder = self
            .client
            .request(method, url)
            .header(ACCESS_TOKEN_HEADER, credential.secret());

        Ok(ScopedRequest {
            context: self,
            credential: credential.name(),
            limiter,
            builder,
        })
    }

    pub fn get(&self, url: Url, credential_index: usize) -> ProviderResult<ScopedRequest<'_>> {
        self.request(Method::GET, url, credential_index)
    }

    pub fn post(&self, url: Url, credential_index: usize) -> ProviderResult<ScopedRequest<'_>> {
        self.request(Method::POST, url, credential_index)
    }

    pub fn put(&self, url: Url, credential_index: usize) -> ProviderResult<ScopedRequest<'_>> {
        self.request(Method::PUT, url, credential_index)
    }

    pub fn delete(&self, url: Url, credential_index: usize) -> ProviderResult<ScopedRequest<'_>> {
        self.request(Method::DELETE, url, credential_index)
    }

    /// Wait for the credential's window, then send
    async fn execute(
        &self,
        credential: &str,
        limiter: &SlidingWindowLimiter,
        builder: RequestBuilder,
    ) -> ProviderResult<Response> {
        limiter.acquire().await;

        debug!(credential, "Executing rate-limited request");

        Ok(builder.send().await?)
    }

    /// Send, retrying transient outcomes (connect/timeout, 429, 5xx).
    ///
    /// Once attempts are exhausted the last response is returned as is, so
    /// the caller classifies it like any other.
    async fn execute_with_retry(
        &self,
        credential: &str,
        limiter: &SlidingWindowLimiter,
        builder: RequestBuilder,
    ) -> ProviderResult<Response> {
        let max_attempts = self.retry.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            // Streaming bodies cannot be replayed: send them once
            let Some(this_try) = builder.try_clone() else {
                return self.execute(credential, limiter, builder).await;
            };

            let retry_after = match self.execute(credential, limiter, this_try).await {
                Ok(response)
                    if attempt < max_attempts && is_transient_status(response.status().as_u16()) =>
                {
                    warn!(
                        credential,
                        status = response.status().as_u16(),
                        attempt,
                        "Transient status, retrying"
                    );
                    retry_after(&response)
                }
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_attempts && e.is_transient() => {
                    warn!(credential, error = %e, attempt, "Transport failure, retrying");
                    None
                }
                Err(e) => return Err(e),
            };

            let delay = self.retry.delay(attempt, retry_after);
            debug!(delay_ms = delay.as_millis() as u64, "Backing off");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// `Retry-After` in seconds, when present
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
}

/// Request builder bound to one credential and its limiter
pub struct ScopedRequest<'a> {
    context: &'a ClientContext,
    credential: &'a str,
    limiter: &'a SlidingWindowLimiter,
    builder: RequestBuilder,
}

impl<'a> ScopedRequest<'a> {
    /// Add JSON body to the request
    pub fn json<T: serde::Serialize + ?Sized>(mut self, json: &T) -> Self {
        self.builder = self.builder.json(json);
        self
    }

    /// Add a header to the request
    pub fn header(mut self, key: &str, value: &str) -> Self {
        self.builder = self.builder.header(key, value);
        self
    }

    /// Send once (waits for the rate limit)
    pub async fn send(self) -> ProviderResult<Response> {
        self.context
            .execute(self.credential, self.limiter, self.builder)
            .await
    }

    /// Send with the context's retry policy
    pub async fn send_with_retry(self) -> ProviderResult<Response> {
        self.context
            .execute_with_retry(self.credential, self.limiter, self.builder)
            .await
    }
}

/// Turn a non-2xx response into a [`ProviderError::RemoteRejection`]
pub async fn ensure_success(response: Response) -> ProviderResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::RemoteRejection {
        status: status.as_u16(),
        body,
    })
}

/// Read a 2xx body as `T`; a body that does not parse is
/// [`ProviderError::UnexpectedShape`], not a transport failure
pub async fn read_json<T: DeserializeOwned>(response: Response) -> ProviderResult<T> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    serde_json::from_str(&text).map_err(|e| {
        ProviderError::UnexpectedShape(format!(
            "JSON parse error: {} - Body: {}",
            e,
            truncate(&text, 500)
        ))
    })
}

/// At most `max` characters of `text`
pub fn truncate(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::credentials::Credential;
    use crate::test_support::{test_context, test_settings, MockServer};
    use actix_web::{web, HttpRequest, HttpResponse};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_empty_pool_is_a_configuration_error() {
        let result = ClientContext::new(&Settings::default(), CredentialPool::default());
        assert!(matches!(result, Err(ConfigurationError::EmptyPool)));
    }

    #[test]
    fn test_invalid_base_url() {
        let mut settings = Settings::default();
        settings.shop.base_url = Some("not a url".to_string());
        let pool = CredentialPool::new(vec![Credential::new("a", "t")]);
        assert!(matches!(
            ClientContext::new(&settings, pool),
            Err(ConfigurationError::InvalidBaseUrl(_))
        ));
    }

    #[test]
    fn test_one_limiter_per_credential() {
        let ctx = test_context("http://127.0.0.1:1/admin/api/2025-01/");
        let (first, first_limiter) = ctx.select(0).unwrap();
        let (again, again_limiter) = ctx.select(ctx.pool().len()).unwrap();
        let (_, second_limiter) = ctx.select(1).unwrap();

        assert_eq!(first, again);
        assert!(std::ptr::eq(first_limiter, again_limiter));
        assert!(!std::ptr::eq(first_limiter, second_limiter));
        assert!(ctx.limiter("missing").is_none());
    }

    #[test]
    fn test_endpoint_join() {
        let ctx = test_context("https://shop.example/admin/api/2025-01/");
        assert_eq!(
            ctx.endpoint("/products/12.json").unwrap().as_str(),
            "https://shop.example/admin/api/2025-01/products/12.json"
        );
    }

    #[test]
    fn test_retry_delay_bounds() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
        };

        for _ in 0..50 {
            let first = policy.delay(1, None);
            assert!(first >= Duration::from_millis(100) && first <= Duration::from_millis(150));
            let third = policy.delay(3, None);
            assert!(third >= Duration::from_millis(400) && third <= Duration::from_millis(600));
            assert_eq!(policy.delay(10, None), Duration::from_millis(1000));
        }
        assert_eq!(
            policy.delay(1, Some(Duration::from_millis(800))),
            Duration::from_millis(800)
        );
        assert_eq!(
            policy.delay(1, Some(Duration::from_secs(60))),
            Duration::from_millis(1000)
        );
    }

    #[actix_rt::test]
    async fn test_token_header_and_retry_on_503() {
        let hits = web::Data::new(AtomicUsize::new(0));
        let server = MockServer::start({
            let hits = hits.clone();
            move |cfg: &mut web::ServiceConfig| {
                cfg.app_data(hits.clone()).route(
                    "/admin/api/2025-01/shop.json",
                    web::get().to(|req: HttpRequest, hits: web::Data<AtomicUsize>| async move {
                        let token = req
                            .headers()
                            .get(ACCESS_TOKEN_HEADER)
                            .and_then(|v| v.to_str().ok())
                            .unwrap_or("")
                            .to_string();
                        if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                            HttpResponse::ServiceUnavailable().finish()
                        } else {
                            HttpResponse::Ok().json(serde_json::json!({ "token": token }))
                        }
                    }),
                );
            }
        })
        .await;

        let ctx = test_context(&server.base_url);
        let url = ctx.endpoint("shop.json").unwrap();
        let response = ctx.get(url, 1).unwrap().send_with_retry().await.unwrap();

        assert_eq!(response.status().as_u16(), 200);
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body["token"], "token-b");
        assert_eq!(hits.load(Ordering::SeqCst), 2);

        server.stop().await;
    }

    #[actix_rt::test]
    async fn test_client_errors_are_not_retried() {
        let hits = web::Data::new(AtomicUsize::new(0));
        let server = MockServer::start({
            let hits = hits.clone();
            move |cfg: &mut web::ServiceConfig| {
                cfg.app_data(hits.clone()).route(
                    "/admin/api/2025-01/products.json",
                    web::post().to(|hits: web::Data<AtomicUsize>| async move {
                        hits.fetch_add(1, Ordering::SeqCst);
                        HttpResponse::UnprocessableEntity().body(r#"{"errors":{"title":["can't be blank"]}}"#)
                    }),
                );
            }
        })
        .await;

        let ctx = test_context(&server.base_url);
        let url = ctx.endpoint("products.json").unwrap();
        let response = ctx
            .post(url, 0)
            .unwrap()
            .json(&serde_json::json!({}))
            .send_with_retry()
            .await
            .unwrap();
        let err = ensure_success(response).await.unwrap_err();

        assert_eq!(hits.load(Ordering::SeqCst), 1);
        match err {
            ProviderError::RemoteRejection { status, body } => {
                assert_eq!(status, 422);
                assert!(body.contains("can't be blank"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        server.stop().await;
    }

    #[actix_rt::test]
    async fn test_exhausted_retries_return_last_response() {
        let server = MockServer::start(|cfg: &mut web::ServiceConfig| {
            cfg.route(
                "/admin/api/2025-01/shop.json",
                web::get().to(|| async { HttpResponse::TooManyRequests().finish() }),
            );
        })
        .await;

        let mut settings = test_settings(&server.base_url);
        settings.retry.max_attempts = 2;
        let ctx = ClientContext::new(&settings, crate::test_support::test_pool()).unwrap();
        let url = ctx.endpoint("shop.json").unwrap();
        let response = ctx.get(url, 0).unwrap().send_with_retry().await.unwrap();

        assert_eq!(response.status().as_u16(), 429);
        let (credential, _) = ctx.select(0).unwrap();
        assert_eq!(ctx.limiter(credential.name()).unwrap().in_window().await, 2);

        server.stop().await;
    }

    #[test]
    fn test_truncate_respects_char_boundaries() {
        assert_eq!(truncate("éèà", 2), "éè");
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[actix_rt::test]
    async fn test_read_json_classifies_bad_bodies_as_shape_errors() {
        let server = MockServer::start(|cfg: &mut web::ServiceConfig| {
            cfg.route(
                "/admin/api/2025-01/shop.json",
                web::get().to(|| async { HttpResponse::Ok().body("<html>maintenance</html>") }),
            );
        })
        .await;

        let ctx = test_context(&server.base_url);
        let url = ctx.endpoint("shop.json").unwrap();
        let response = ctx.get(url, 0).unwrap().send().await.unwrap();
        let err = read_json::<serde_json::Value>(response).await.unwrap_err();

        match err {
            ProviderError::UnexpectedShape(message) => assert!(message.contains("maintenance")),
            other => panic!("unexpected error: {other:?}"),
        }

        server.stop().await;
    }

    #[actix_rt::test]
    async fn test_connection_refused_is_transport_error() {
        let mut settings = test_settings("http://127.0.0.1:9/admin/api/2025-01/");
        settings.retry.max_attempts = 1;
        let ctx = ClientContext::new(&settings, crate::test_support::test_pool()).unwrap();
        let url = ctx.endpoint("shop.json").unwrap();

        let err = ctx.get(url, 0).unwrap().send_with_retry().await.unwrap_err();
        assert!(matches!(err, ProviderError::Transport(_)));
    }
}
