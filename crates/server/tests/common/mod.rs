//! Common test utilities for E2E testing with mocks.
//!
//! This module provides a test fixture that creates an in-process server
//! backed by real SQLite stores in a temp dir and a mock emulator.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use discvault_core::{
    create_notification_system, open_stores, testing::MockEmulator, Config, InstallConfig,
    Library, NotificationLog, StorageBackend, StorageConfig,
};
use discvault_server::state::AppState;

/// Re-export fixtures for test convenience
pub use discvault_core::testing::fixtures;

const BOUNDARY: &str = "discvault-test-boundary";

/// Test fixture for E2E testing.
///
/// Install thresholds are scaled down so every install path runs on
/// kilobyte-sized uploads:
/// - `chunk_size` = 1024
/// - `small_file_threshold` = 4096
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock emulator - inspect booted images
    pub emulator: Arc<MockEmulator>,
    /// Notification history served by the API
    pub notifications: NotificationLog,
    /// Temporary directory for the test database and spool files
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// A multipart form part.
pub enum Part<'a> {
    Text(&'a str, &'a str),
    File(&'a str, &'a str, &'a [u8]),
}

impl TestFixture {
    pub async fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.storage = StorageConfig {
            backend: StorageBackend::Sqlite,
            database_path: temp_dir.path().join("test.db"),
            chunk_dir: temp_dir.path().join("chunks"),
        };
        config.install = InstallConfig::default()
            .with_chunk_size(1024)
            .with_small_file_threshold(4096)
            .with_spool_dir(temp_dir.path().to_path_buf());

        let stores = open_stores(&config.storage)
            .await
            .expect("Failed to open stores");

        let (notifier, notifications, writer) =
            create_notification_system(100, 100, Duration::from_millis(5000));
        tokio::spawn(writer.run());

        let emulator = Arc::new(MockEmulator::new());
        let library = Arc::new(Library::new(
            config.install.clone(),
            stores.chunks,
            stores.catalog,
            emulator.clone(),
            Arc::new(notifier),
        ));

        let state = Arc::new(AppState::new(config, library, notifications.clone()));
        let router = discvault_server::api::create_router(state);

        Self {
            router,
            emulator,
            notifications,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("GET").uri(path), Body::empty())
            .await
    }

    /// Send a POST request with an empty body.
    pub async fn post(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("POST").uri(path), Body::empty())
            .await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.send(Request::builder().method("DELETE").uri(path), Body::empty())
            .await
    }

    /// Send a POST request with a multipart/form-data body.
    pub async fn post_multipart(&self, path: &str, parts: &[Part<'_>]) -> TestResponse {
        let builder = Request::builder().method("POST").uri(path).header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        self.send(builder, Body::from(multipart_body(parts))).await
    }

    /// Like [`post_multipart`](Self::post_multipart), but the body ends
    /// inside the last part, before its closing boundary.
    pub async fn post_multipart_cut_short(&self, path: &str, parts: &[Part<'_>]) -> TestResponse {
        let mut body = multipart_body(parts);
        let tail = format!("\r\n--{}--\r\n", BOUNDARY);
        body.truncate(body.len() - tail.len());
        let builder = Request::builder().method("POST").uri(path).header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
        self.send(builder, Body::from(body)).await
    }

    /// Upload `data` as `filename` and return the created title's id.
    pub async fn install(&self, filename: &str, data: &[u8], name: &str) -> String {
        let response = self
            .post_multipart(
                "/api/v1/titles",
                &[
                    Part::Text("name", name),
                    Part::Text("region", "NTSC-U"),
                    Part::File("file", filename, data),
                ],
            )
            .await;
        assert_eq!(
            response.status,
            StatusCode::CREATED,
            "Install failed: {}",
            response.body
        );
        response.body["id"]
            .as_str()
            .expect("Response should carry an id")
            .to_string()
    }

    /// Send a raw request and return the response text.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    async fn send(&self, builder: axum::http::request::Builder, body: Body) -> TestResponse {
        let request = builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

fn multipart_body(parts: &[Part<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", name)
                        .as_bytes(),
                );
                body.extend_from_slice(value.as_bytes());
            }
            Part::File(name, filename, data) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                        name, filename
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(b"Content-Type: application/octet-stream\r\n\r\n");
                body.extend_from_slice(data);
            }
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
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
