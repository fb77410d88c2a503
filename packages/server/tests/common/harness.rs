//! Test harness over in-memory dependencies.
//!
//! Each test gets its own store, mock telephony client and router, with
//! every wait shrunk to milliseconds.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header::CONTENT_TYPE, Request, StatusCode};
use axum::Router;
use roundrobin_core::config::DistributionSettings;
use roundrobin_core::domains::distribution::models::Account;
use roundrobin_core::kernel::{
    fast_settings, BaseCallStore, InMemoryCallStore, MockTelephonyClient, ServerDeps,
    TestDependencies,
};
use roundrobin_core::server::build_app;
use tower::ServiceExt;

use super::fixtures::{three_agent_store, ACCOUNT_ID};

pub struct TestResponse {
    pub status: StatusCode,
    pub content_type: Option<String>,
    pub body: String,
}

pub struct TestHarness {
    pub deps: Arc<ServerDeps>,
    pub store: Arc<InMemoryCallStore>,
    pub telephony: Arc<MockTelephonyClient>,
}

impl TestHarness {
    /// Three agents, a single round
    pub fn new() -> Self {
        Self::build(three_agent_store(Some(1)), MockTelephonyClient::new(), fast_settings())
    }

    pub fn with_store(store: InMemoryCallStore) -> Self {
        Self::build(store, MockTelephonyClient::new(), fast_settings())
    }

    pub fn build(
        store: InMemoryCallStore,
        telephony: MockTelephonyClient,
        settings: DistributionSettings,
    ) -> Self {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let test_deps = TestDependencies::new(store)
            .with_telephony(telephony)
            .with_settings(settings);

        Self {
            deps: test_deps.server_deps(),
            store: test_deps.store.clone(),
            telephony: test_deps.telephony.clone(),
        }
    }

    pub fn app(&self) -> Router {
        build_app(self.deps.clone())
    }

    pub async fn account(&self) -> Account {
        self.store
            .find_account(ACCOUNT_ID)
            .await
            .expect("store read failed")
            .expect("fixture account missing")
    }

    pub async fn post_form(&self, uri: &str, body: &str) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body.to_string()))
            .expect("valid request");
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(uri)
            .body(Body::empty())
            .expect("valid request");
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self.app().oneshot(request).await.expect("router is infallible");

        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("readable body");

        TestResponse {
            status,
            content_type,
            body: String::from_utf8_lossy(&bytes).into_owned(),
        }
    }

    /// Interrupt running distributions and wait for them to finish
    pub async fn shutdown(&self) {
        self.deps.shutdown.cancel();
        self.deps.tasks.close();
        tokio::time::timeout(Duration::from_secs(5), self.deps.tasks.wait())
            .await
            .expect("distribution tasks did not stop");
    }
}

/// Poll `condition` until it holds, failing the test after two seconds
pub async fn wait_until(what: &str, condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        if tokio::time::Instant::now() >= deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
