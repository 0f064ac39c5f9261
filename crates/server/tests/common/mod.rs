//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! with a mock engine injected, enabling end-to-end testing without
//! HandBrakeCLI installed.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use brakeweb_core::{
    testing::MockEngine, Config, ConversionConfig, Engine, EngineConfig, Environment,
    ServerConfig, StorageConfig,
};

/// Re-export fixtures for test convenience
pub use brakeweb_core::testing::fixtures;

/// Presets the mock engine lists by default.
pub const DEFAULT_PRESETS: &[&str] = &["Very Fast 1080p30", "Fast 1080p30", "Fast 720p30"];

/// Test fixture for E2E testing with a mock engine.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_convert() {
///     let fixture = TestFixture::new().await;
///
///     let form = MultipartForm::new()
///         .file("video", "clip.mp4", b"data")
///         .text("preset", "Fast 720p30");
///     let response = fixture.post_multipart("/convert", form).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock engine - control presets and encode outcomes
    pub engine: Arc<MockEngine>,
    /// Root of job directories
    pub jobs_dir: PathBuf,
    /// Where uploads are buffered
    pub upload_dir: PathBuf,
    /// Temporary directory holding everything above
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
    pub bytes: Vec<u8>,
}

impl TestFixture {
    /// Create a new test fixture with default mocks.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let jobs_dir = temp_dir.path().join("jobs");
        let upload_dir = temp_dir.path().join("uploads");
        let static_dir = temp_dir.path().join("static");
        std::fs::create_dir_all(&static_dir).expect("Failed to create static dir");
        std::fs::write(
            static_dir.join("index.html"),
            "<!DOCTYPE html><title>brakeweb</title>",
        )
        .expect("Failed to write index.html");

        let engine = Arc::new(MockEngine::with_profiles(DEFAULT_PRESETS));

        let config = Config {
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 3000, // Not used for in-process testing
                max_upload_bytes: test_config.max_upload_bytes,
                static_dir,
            },
            storage: StorageConfig {
                jobs_dir: jobs_dir.clone(),
                upload_dir: upload_dir.clone(),
            },
            engine: EngineConfig {
                max_concurrent_tasks: 8,
                ..EngineConfig::default()
            },
            conversion: test_config.conversion,
            environment: test_config.environment,
        };

        let state = Arc::new(brakeweb_server::state::AppState::new(
            config,
            Arc::clone(&engine) as Arc<dyn Engine>,
        ));
        let router = brakeweb_server::api::create_router(state);

        Self {
            router,
            engine,
            jobs_dir,
            upload_dir,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        self.send(request).await
    }

    /// Send a multipart form as a POST request.
    pub async fn post_multipart(&self, path: &str, form: MultipartForm) -> TestResponse {
        let (content_type, body) = form.finish();
        self.post_with_content_type(path, body, &content_type).await
    }

    /// Send a POST request with custom content type (for testing wrong content types).
    pub async fn post_with_content_type(
        &self,
        path: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> TestResponse {
        let request = Request::builder()
            .method("POST")
            .uri(path)
            .header("Content-Type", content_type)
            .body(Body::from(body))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes()
            .to_vec();

        let body: Value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };

        TestResponse {
            status,
            headers,
            body,
            bytes,
        }
    }

    /// Number of job directories created so far.
    pub fn job_count(&self) -> usize {
        std::fs::read_dir(&self.jobs_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }

    /// Number of files left in the upload directory.
    pub fn leftover_uploads(&self) -> usize {
        std::fs::read_dir(&self.upload_dir)
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    pub environment: Environment,
    pub conversion: ConversionConfig,
    pub max_upload_bytes: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            environment: Environment::Production,
            conversion: ConversionConfig::default(),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

impl TestConfig {
    /// Create config that reports error diagnostics.
    pub fn development() -> Self {
        Self {
            environment: Environment::Development,
            ..Self::default()
        }
    }
}

/// Builder for `multipart/form-data` request bodies.
pub struct MultipartForm {
    boundary: String,
    body: Vec<u8>,
}

impl Default for MultipartForm {
    fn default() -> Self {
        Self::new()
    }
}

impl MultipartForm {
    pub fn new() -> Self {
        Self {
            boundary: "brakeweb-test-boundary-7MA4YWxkTrZu0gW".to_string(),
            body: Vec::new(),
        }
    }

    pub fn file(mut self, field: &str, filename: &str, contents: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: application/octet-stream\r\n\r\n",
                self.boundary, field, filename
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(contents);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn text(mut self, field: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                self.boundary, field, value
            )
            .as_bytes(),
        );
        self
    }

    /// Returns the content type header value and the encoded body.
    pub fn finish(mut self) -> (String, Vec<u8>) {
        self.body
            .extend_from_slice(format!("--{}--\r\n", self.boundary).as_bytes());
        (
            format!("multipart/form-data; boundary={}", self.boundary),
            self.body,
        )
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}
