// Test helpers for talking to an in-process catalog API:
// - servers bind 127.0.0.1:0 so tests never collide on ports
// - fast retry/backoff and a wide rate window keep tests quick
// - servers are stopped explicitly so they don't linger between tests
use actix_web::{dev::ServerHandle, web, App, HttpServer};

use crate::config::Settings;
use crate::providers::credentials::{Credential, CredentialPool};
use crate::providers::http_client::ClientContext;

pub const API_PREFIX: &str = "/admin/api/2025-01";

pub struct MockServer {
    /// Admin API base, ending with `/`
    pub base_url: String,
    handle: ServerHandle,
}

impl MockServer {
    pub async fn start<F>(configure: F) -> MockServer
    where
        F: Fn(&mut web::ServiceConfig) + Send + Clone + 'static,
    {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
        let addr = listener.local_addr().expect("addr");

        let server = HttpServer::new(move || App::new().configure(configure.clone()))
            .workers(1)
            .disable_signals()
            .listen(listener)
            .expect("listen")
            .run();
        let handle = server.handle();
        actix_rt::spawn(server);

        MockServer {
            base_url: format!("http://{}{}/", addr, API_PREFIX),
            handle,
        }
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

pub fn test_pool() -> CredentialPool {
    CredentialPool::new(vec![
        Credential::new("shop-a", "token-a"),
        Credential::new("shop-b", "token-b"),
    ])
}

pub fn test_settings(base_url: &str) -> Settings {
    let mut settings = Settings::default();
    settings.shop.base_url = Some(base_url.to_string());
    settings.shop.location_id = Some(100888019208);
    settings.rate_limit.max_calls = 50;
    settings.rate_limit.period_ms = 1000;
    settings.http.timeout_secs = 5;
    settings.http.connect_timeout_secs = 2;
    settings.retry.max_attempts = 3;
    settings.retry.base_delay_ms = 5;
    settings.retry.max_delay_ms = 20;
    settings.sync.max_pages = 20;
    settings
}

pub fn test_context(base_url: &str) -> ClientContext {
    ClientContext::new(&test_settings(base_url), test_pool()).expect("test context")
}
