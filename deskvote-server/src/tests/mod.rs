use std::sync::{Arc, Mutex};

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use deskvote_core::{
    blob::{BlobStore, LocalBlobStore},
    config::Configuration,
    error::DeskResult,
    media::Passthrough,
    state::DeskState,
};
use deskvote_dependencies::{
    async_trait::async_trait,
    mime::Mime,
    serde_json::{self, json, Value},
    tempfile,
    tower::ServiceExt,
};
use deskvote_models::{MemoryStore, NewImage, Store, VOTE_BUDGET};

use crate::cli::server::axum_setup;

const BOUNDARY: &str = "deskvote-test-boundary";
const MIB: usize = 1024 * 1024;

#[derive(Debug, Default)]
struct RecordingBlobs {
    puts: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingBlobs {
    fn count(&self) -> usize {
        self.puts.lock().unwrap().len()
    }
}

#[async_trait]
impl BlobStore for RecordingBlobs {
    async fn put(&self, key: &str, bytes: Vec<u8>, _: &Mime) -> DeskResult<String> {
        self.puts.lock().unwrap().push((key.to_string(), bytes));
        Ok(format!("https://blob.example.com/{}", key))
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryStore>,
    blobs: Arc<RecordingBlobs>,
}

fn test_config() -> Configuration {
    Configuration {
        vote_rate_limit: 0,
        upload_rate_limit: 0,
        ..Default::default()
    }
}

fn app_with(config: Configuration) -> TestApp {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(RecordingBlobs::default());
    let state = DeskState::with_parts(config, store.clone(), blobs.clone(), Arc::new(Passthrough));
    TestApp {
        router: axum_setup(state),
        store,
        blobs,
    }
}

fn app() -> TestApp {
    app_with(test_config())
}

impl TestApp {
    async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.unwrap()
    }

    async fn seed_images(&self, n: usize) -> Vec<i32> {
        let mut ids = Vec::new();
        for i in 0..n {
            let image = self
                .store
                .insert_image(NewImage {
                    image_url: format!("https://blob.example.com/{}.jpg", i),
                    instagram_handle: None,
                })
                .await
                .unwrap();
            ids.push(image.id);
        }
        ids
    }

    async fn vote(&self, image_id: i32, ip: &str) -> Response {
        self.send(
            Request::post("/api/vote")
                .header(header::CONTENT_TYPE, "application/json")
                .header("x-forwarded-for", ip)
                .body(Body::from(json!({ "imageId": image_id }).to_string()))
                .unwrap(),
        )
        .await
    }
}

async fn body_json(resp: Response) -> Value {
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

enum Part<'a> {
    Text(&'a str, &'a str),
    File {
        name: &'a str,
        file_name: &'a str,
        content_type: &'a str,
        bytes: Vec<u8>,
    },
}

fn multipart(uri: &str, parts: Vec<Part<'_>>) -> Request<Body> {
    let mut body = Vec::new();
    for part in parts {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match part {
            Part::Text(name, value) => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                        name, value
                    )
                    .as_bytes(),
                );
            }
            Part::File {
                name,
                file_name,
                content_type,
                bytes,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, file_name, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(&bytes);
                body.extend_from_slice(b"\r\n");
            }
        }
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    Request::post(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .header("x-forwarded-for", "203.0.113.9")
        .body(Body::from(body))
        .unwrap()
}

fn image_part(content_type: &str, bytes: Vec<u8>) -> Part<'_> {
    Part::File {
        name: "image",
        file_name: "desk.jpg",
        content_type,
        bytes,
    }
}

#[tokio::test]
async fn test_feed_sorted_by_votes() {
    let app = app();
    let ids = app.seed_images(3).await;
    for (id, count) in ids.iter().zip([3, 1, 5]) {
        for voter in 0..count {
            let resp = app.vote(*id, &format!("10.0.0.{}", voter)).await;
            assert_eq!(resp.status(), StatusCode::OK);
        }
    }

    let resp = app
        .send(Request::get("/api/images").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let feed = body_json(resp).await;
    let votes: Vec<i64> = feed
        .as_array()
        .unwrap()
        .iter()
        .map(|x| x["votes"].as_i64().unwrap())
        .collect();
    assert_eq!(votes, vec![5, 3, 1]);
    assert_eq!(feed[0]["id"], json!(ids[2]));
    assert!(feed[0]["imageUrl"].is_string());
    assert!(feed[0]["instagramHandle"].is_null());
}

#[tokio::test]
async fn test_vote_twice_restores_state() {
    let app = app();
    let ids = app.seed_images(1).await;

    let resp = app.vote(ids[0], "198.51.100.4").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({
            "message": "Vote added",
            "votes": 1,
            "votesLeft": VOTE_BUDGET - 1,
            "hasVoted": true,
        })
    );

    let resp = app.vote(ids[0], "198.51.100.4").await;
    assert_eq!(
        body_json(resp).await,
        json!({
            "message": "Vote removed",
            "votes": 0,
            "votesLeft": VOTE_BUDGET,
            "hasVoted": false,
        })
    );
}

#[tokio::test]
async fn test_user_votes_tracks_budget() {
    let app = app();
    let ids = app.seed_images(2).await;
    let user_votes = |ip: &'static str| {
        Request::get("/api/user-votes")
            .header("x-forwarded-for", ip)
            .body(Body::empty())
            .unwrap()
    };

    let resp = app.send(user_votes("192.0.2.1")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(
        body_json(resp).await,
        json!({ "votesLeft": VOTE_BUDGET, "votedImageIds": [] })
    );

    app.vote(ids[1], "192.0.2.1").await;
    let summary = body_json(app.send(user_votes("192.0.2.1")).await).await;
    assert_eq!(
        summary,
        json!({ "votesLeft": VOTE_BUDGET - 1, "votedImageIds": [ids[1]] })
    );
    // other callers keep their own budget
    let other = body_json(app.send(user_votes("192.0.2.2")).await).await;
    assert_eq!(other["votesLeft"], json!(VOTE_BUDGET));
}

#[tokio::test]
async fn test_vote_without_budget_is_rejected() {
    let app = app();
    let ids = app.seed_images(VOTE_BUDGET as usize + 1).await;
    for id in &ids[..VOTE_BUDGET as usize] {
        assert_eq!(app.vote(*id, "10.9.9.9").await.status(), StatusCode::OK);
    }
    let last = ids[VOTE_BUDGET as usize];
    let resp = app.vote(last, "10.9.9.9").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await, json!({ "error": "No votes left" }));

    let image = app.store.image(last).await.unwrap().unwrap();
    assert_eq!(image.votes, 0);
    let summary = app.store.user_votes("10.9.9.9").await.unwrap();
    assert_eq!(summary.votes_left, 0);
    assert_eq!(summary.voted_image_ids.len(), VOTE_BUDGET as usize);
}

#[tokio::test]
async fn test_vote_unknown_image() {
    let app = app();
    let resp = app.vote(4242, "10.0.0.1").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn test_vote_malformed_body() {
    let app = app();
    let resp = app
        .send(
            Request::post("/api/vote")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"imageId": "seven"}"#))
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let app = app();
    let resp = app
        .send(Request::get("/api/vote").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(
        body_json(resp).await,
        json!({ "error": "Method GET Not Allowed" })
    );

    for uri in ["/api/images", "/api/user-votes"] {
        let resp = app
            .send(Request::delete(uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
    for uri in ["/api/upload", "/api/submit-setup"] {
        let resp = app
            .send(Request::put(uri).body(Body::empty()).unwrap())
            .await;
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}

#[tokio::test]
async fn test_unknown_route_is_json_404() {
    let app = app();
    let resp = app
        .send(Request::get("/api/nope").body(Body::empty()).unwrap())
        .await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    assert!(body_json(resp).await["error"].is_string());
}

#[tokio::test]
async fn test_upload_creates_image() {
    let app = app();
    let resp = app
        .send(multipart(
            "/api/upload",
            vec![
                image_part("image/jpeg", vec![0xff, 0xd8, 0xff, 0xe0, 1, 2, 3]),
                Part::Text("instagramHandle", "  @deskgoals "),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["instagramHandle"], json!("@deskgoals"));
    let url = body["url"].as_str().unwrap();
    assert!(url.starts_with("https://blob.example.com/images/"));
    assert!(url.ends_with(".jpg"));

    assert_eq!(app.blobs.count(), 1);
    let feed = app.store.feed().await.unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(body["id"], json!(feed[0].id));
    assert_eq!(feed[0].votes, 0);
}

#[tokio::test]
async fn test_upload_rejects_non_image() {
    let app = app();
    let resp = app
        .send(multipart(
            "/api/upload",
            vec![image_part("text/plain", b"hello".to_vec())],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(resp).await["error"].is_string());
    assert_eq!(app.blobs.count(), 0);
    assert!(app.store.feed().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_rejects_oversized_file() {
    let app = app();
    let resp = app
        .send(multipart(
            "/api/upload",
            vec![image_part("image/png", vec![0u8; 6 * MIB])],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.blobs.count(), 0);
    assert!(app.store.feed().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_without_image() {
    let app = app();
    let resp = app
        .send(multipart(
            "/api/upload",
            vec![Part::Text("instagramHandle", "@desk")],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        json!({ "error": "No image was uploaded" })
    );
}

#[tokio::test]
async fn test_upload_needs_multipart() {
    let app = app();
    let resp = app
        .send(
            Request::post("/api/upload")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submit_setup() {
    let app = app();
    let resp = app
        .send(multipart(
            "/api/submit-setup",
            vec![
                Part::Text("name", "Ada"),
                Part::Text("email", "ada@example.com"),
                Part::Text("setupDescription", "Walnut desk, one ultrawide"),
                Part::Text("socialLink", "https://instagram.com/ada"),
                image_part("image/png", vec![0x89, b'P', b'N', b'G']),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["message"], json!("Setup submitted successfully"));
    assert!(body["id"].is_number());
    assert_eq!(app.blobs.count(), 1);
    // submissions are not part of the voting feed
    assert!(app.store.feed().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_submit_setup_requires_fields() {
    let app = app();
    let resp = app
        .send(multipart(
            "/api/submit-setup",
            vec![
                Part::Text("name", "Ada"),
                Part::Text("setupDescription", "Walnut desk"),
                Part::Text("socialLink", "https://instagram.com/ada"),
                image_part("image/png", vec![1, 2, 3]),
            ],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(resp).await, json!({ "error": "email is required" }));
    assert_eq!(app.blobs.count(), 0);
}

#[tokio::test]
async fn test_vote_rate_limit() {
    let app = app_with(Configuration {
        vote_rate_limit: 2,
        ..test_config()
    });
    let ids = app.seed_images(1).await;
    assert_eq!(app.vote(ids[0], "10.1.1.1").await.status(), StatusCode::OK);
    assert_eq!(app.vote(ids[0], "10.1.1.1").await.status(), StatusCode::OK);

    let resp = app.vote(ids[0], "10.1.1.1").await;
    assert_eq!(resp.status(), StatusCode::TOO_MANY_REQUESTS);
    let retry_after: u64 = resp.headers()[header::RETRY_AFTER]
        .to_str()
        .unwrap()
        .parse()
        .unwrap();
    assert!(retry_after > 0 && retry_after <= 60);
    assert!(body_json(resp).await["error"].is_string());

    // the limit is per caller
    assert_eq!(app.vote(ids[0], "10.1.1.2").await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_local_uploads_are_served() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config();
    let state = DeskState::with_parts(
        config,
        Arc::new(MemoryStore::new()),
        Arc::new(LocalBlobStore::new(dir.path(), "/uploads")),
        Arc::new(Passthrough),
    );
    let router = axum_setup(state);

    let resp = router
        .clone()
        .oneshot(multipart(
            "/api/upload",
            vec![image_part("image/gif", b"GIF89a-not-really".to_vec())],
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let url = body_json(resp).await["url"].as_str().unwrap().to_string();
    assert!(url.starts_with("/uploads/images/"));

    let resp = router
        .clone()
        .oneshot(Request::get(url.as_str()).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "image/gif");
    let bytes = hyper::body::to_bytes(resp.into_body()).await.unwrap();
    assert_eq!(&bytes[..], b"GIF89a-not-really");

    let resp = router
        .oneshot(
            Request::get("/uploads/images/missing.png")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unusable_url_root_keeps_json_fallback() {
    for root in ["https://cdn.example.com/uploads", "/", ""] {
        let app = app_with(Configuration {
            image_url_root: root.to_string(),
            ..test_config()
        });
        let resp = app
            .send(Request::get("/some/unknown/path").body(Body::empty()).unwrap())
            .await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "root {:?}", root);
        assert!(body_json(resp).await["error"].is_string());
    }
}

#[tokio::test]
async fn test_small_upload_limit_is_reported() {
    let app = app_with(Configuration {
        max_upload_bytes: 1024,
        ..test_config()
    });
    let resp = app
        .send(multipart(
            "/api/upload",
            vec![image_part("image/png", vec![7u8; 4096])],
        ))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(resp).await,
        json!({ "error": "File too large, the maximum is 1KB" })
    );
    assert_eq!(app.blobs.count(), 0);
}
