//! Title API integration tests.
//!
//! These run the router in-process against real SQLite stores and a mock
//! emulator.

mod common;

use axum::http::StatusCode;

use common::{fixtures, Part, TestFixture};

#[tokio::test]
async fn test_health_and_config() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/health").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["status"], "ok");

    let response = fixture.get("/api/v1/config").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["storage_backend"], "sqlite");
    assert_eq!(response.body["install"]["chunk_size"], 1024);
}

#[tokio::test]
async fn test_install_small_title() {
    let fixture = TestFixture::new().await;
    let data = fixtures::pattern_bytes(2000);

    let response = fixture
        .post_multipart(
            "/api/v1/titles",
            &[
                Part::Text("name", "Tekken 3"),
                Part::Text("region", "PAL"),
                Part::File("file", "tekken3.bin", &data),
            ],
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["name"], "Tekken 3");
    assert_eq!(response.body["region"], "PAL");
    assert_eq!(response.body["file_size"], 2000);
    assert_eq!(response.body["use_chunks"], false);
    assert!(response.body["id"].as_str().unwrap().starts_with("local_"));
}

#[tokio::test]
async fn test_install_defaults_name_from_filename() {
    let fixture = TestFixture::new().await;
    let data = fixtures::pattern_bytes(100);

    let response = fixture
        .post_multipart(
            "/api/v1/titles",
            &[Part::File("file", "Silent Hill.bin", &data)],
        )
        .await;

    assert_status!(response, StatusCode::CREATED);
    assert_eq!(response.body["name"], "Silent Hill");
    assert_eq!(response.body["region"], "Unknown");
}

#[tokio::test]
async fn test_install_without_file_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart("/api/v1/titles", &[Part::Text("name", "Nothing")])
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    assert!(response.body["error"].is_string());
}

#[tokio::test]
async fn test_install_with_unreadable_text_field_is_rejected() {
    let fixture = TestFixture::new().await;

    let response = fixture
        .post_multipart_cut_short(
            "/api/v1/titles",
            &[
                Part::File("file", "game.bin", &fixtures::pattern_bytes(512)),
                Part::Text("region", "PAL"),
            ],
        )
        .await;

    assert_status!(response, StatusCode::BAD_REQUEST);
    let error = response.body["error"].as_str().unwrap();
    assert!(error.contains("region"), "unexpected error: {}", error);
    assert_eq!(fixture.get("/api/v1/titles").await.body["total"], 0);
}

#[tokio::test]
async fn test_install_archive_without_disc_image() {
    let fixture = TestFixture::new().await;
    let archive = fixtures::zip_bytes(&[("readme.txt", b"no game here".as_slice())]);

    let response = fixture
        .post_multipart(
            "/api/v1/titles",
            &[Part::File("file", "docs.zip", &archive)],
        )
        .await;

    assert_status!(response, StatusCode::UNPROCESSABLE_ENTITY);
    let listed = fixture.get("/api/v1/titles").await;
    assert_eq!(listed.body["total"], 0);
}

#[tokio::test]
async fn test_install_chunked_then_play() {
    let fixture = TestFixture::new().await;
    let data = fixtures::pattern_bytes(10_000);
    let id = fixture.install("crash.bin", &data, "Crash").await;

    let response = fixture.get(&format!("/api/v1/titles/{}", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["use_chunks"], true);
    assert_eq!(response.body["files"][0]["chunk_info"]["total_chunks"], 10);

    let response = fixture.post(&format!("/api/v1/titles/{}/play", id)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["bytes"], 10_000);
    assert_eq!(response.body["title"]["play_count"], 1);

    let booted = fixture.emulator.booted().await;
    assert_eq!(booted.len(), 1);
    assert_eq!(booted[0].data, data);
    assert_eq!(booted[0].filename, "crash.bin");
}

#[tokio::test]
async fn test_get_and_play_unknown_title() {
    let fixture = TestFixture::new().await;

    let response = fixture.get("/api/v1/titles/local_missing").await;
    assert_status!(response, StatusCode::NOT_FOUND);
    assert!(response.body["error"]
        .as_str()
        .unwrap()
        .contains("local_missing"));

    let response = fixture.post("/api/v1/titles/local_missing/play").await;
    assert_status!(response, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_titles() {
    let fixture = TestFixture::new().await;
    let a = fixture.install("a.bin", &fixtures::pattern_bytes(5000), "A").await;
    let b = fixture.install("b.bin", &fixtures::pattern_bytes(500), "B").await;

    let response = fixture.delete(&format!("/api/v1/titles/{}", a)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["removed"], true);

    let response = fixture.delete(&format!("/api/v1/titles/{}", a)).await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["removed"], false);

    let listed = fixture.get("/api/v1/titles").await;
    assert_eq!(listed.body["total"], 1);
    assert_eq!(listed.body["titles"][0]["id"], b.as_str());
}

#[tokio::test]
async fn test_clear_and_stats() {
    let fixture = TestFixture::new().await;
    fixture.install("a.bin", &fixtures::pattern_bytes(5000), "A").await;
    fixture.install("b.bin", &fixtures::pattern_bytes(500), "B").await;

    let response = fixture.get("/api/v1/stats").await;
    assert_status!(response, StatusCode::OK);
    assert_eq!(response.body["title_count"], 2);
    assert_eq!(response.body["total_bytes"], 5500);
    assert_eq!(response.body["chunked_count"], 1);
    assert_eq!(response.body["summary"], "2 titles, 0 MB, 2 files");

    let response = fixture.delete("/api/v1/titles").await;
    assert_status!(response, StatusCode::OK);

    let response = fixture.get("/api/v1/stats").await;
    assert_eq!(response.body["title_count"], 0);
}

#[tokio::test]
async fn test_notifications_are_recorded() {
    let fixture = TestFixture::new().await;
    fixture.install("spyro.bin", &fixtures::pattern_bytes(100), "Spyro").await;

    // The writer drains the channel on its own task.
    let mut messages = Vec::new();
    for _ in 0..50 {
        let response = fixture.get("/api/v1/notifications?limit=10").await;
        assert_status!(response, StatusCode::OK);
        messages = response.body["notifications"]
            .as_array()
            .unwrap()
            .iter()
            .map(|n| n["message"].as_str().unwrap().to_string())
            .collect();
        if messages.len() >= 2 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert_eq!(messages[0], "\"Spyro\" installed successfully!");
    assert!(messages[1].starts_with("Installing \"Spyro\""));
}

#[tokio::test]
async fn test_metrics_endpoint() {
    let fixture = TestFixture::new().await;
    fixture.install("a.bin", &fixtures::pattern_bytes(100), "A").await;

    let (status, body) = fixture.get_text("/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("discvault_library_titles 1"));
    assert!(body.contains("discvault_http_requests_total"));
}
