//! API tests against the in-memory store.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use avanim_api::services::seed_expressions;
use avanim_api::{create_router, ApiConfig, AppState};
use avanim_media::{
    Animator, AnimatorHandle, ComputeDevice, ExpressionCatalog, Frame, Keypoints, MediaError,
    MediaResult, MotionModel,
};
use avanim_models::{Expression, Role};
use avanim_store::{MemoryStore, Store};

const BOUNDARY: &str = "avanim-test-boundary";

/// Model that never gets far enough to run; generation fails on input files.
struct UnusedModel;

impl MotionModel for UnusedModel {
    fn device(&self) -> ComputeDevice {
        ComputeDevice::Cpu
    }

    fn detect_keypoints(&self, _frame: &Frame) -> MediaResult<Keypoints> {
        Err(MediaError::inference("not expected in API tests"))
    }

    fn render(&self, _s: &Frame, _ks: &Keypoints, _kd: &Keypoints) -> MediaResult<Frame> {
        Err(MediaError::inference("not expected in API tests"))
    }

    fn on_cpu(&self) -> MediaResult<&dyn MotionModel> {
        Ok(self)
    }
}

struct TestApp {
    router: Router,
    store: Arc<dyn Store>,
    dir: TempDir,
}

impl TestApp {
    async fn new(ready: bool) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let config = ApiConfig {
            static_root: dir.path().join("static"),
            jwt_secret: "test-secret".to_string(),
            ..ApiConfig::default()
        };

        // driving videos are never written, so ready generations fail on the missing file
        let catalog = ExpressionCatalog::from_entries([
            ("smile", dir.path().join("expressions/smile.mp4")),
            ("sad", dir.path().join("expressions/sad.mp4")),
        ]);
        let animator = if ready {
            AnimatorHandle::Ready(Arc::new(Animator::with_model(
                UnusedModel,
                64,
                catalog.clone(),
            )))
        } else {
            AnimatorHandle::not_ready("checkpoint missing")
        };

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let state = AppState::new(config, Arc::clone(&store), animator);
        state.files.ensure_dirs().await.unwrap();
        seed_expressions(&state.store, &catalog).await.unwrap();
        state
            .user_service
            .ensure_admin("root@example.com", "admin-password")
            .await
            .unwrap();

        Self {
            router: create_router(state, None),
            store,
            dir,
        }
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    async fn signup_and_login(&self, email: &str) -> String {
        let (status, _) = self
            .send(json_request(
                "POST",
                "/api/signup",
                None,
                json!({"fullname": "Test User", "email": email, "password": "password123"}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK);
        self.login(email, "password123").await
    }

    async fn login(&self, email: &str, password: &str) -> String {
        let (status, body) = self
            .send(json_request(
                "POST",
                "/api/login",
                None,
                json!({"email": email, "password": password}),
            ))
            .await;
        assert_eq!(status, StatusCode::OK, "login failed: {body}");
        body["token"].as_str().unwrap().to_string()
    }

    async fn upload_avatar(&self, token: &str, filename: &str) -> (StatusCode, Value) {
        self.send(multipart_request(
            "/api/avatar/upload",
            token,
            &[("avatar", Some(filename), b"not really an image".as_slice())],
        ))
        .await
    }
}

fn json_request(method: &str, uri: &str, token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn authed(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

fn multipart_request(uri: &str, token: &str, parts: &[(&str, Option<&str>, &[u8])]) -> Request<Body> {
    let mut body = Vec::new();
    for (name, filename, data) in parts {
        body.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
        match filename {
            Some(filename) => body.extend_from_slice(
                format!(
                    "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
                     Content-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            ),
            None => body.extend_from_slice(
                format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n").as_bytes(),
            ),
        }
        body.extend_from_slice(data);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());

    Request::builder()
        .method("POST")
        .uri(uri)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_readiness() {
    let app = TestApp::new(false).await;

    let (status, body) = app
        .send(Request::get("/health").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app
        .send(Request::get("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["checks"]["store"]["status"], "ok");
    assert_eq!(body["checks"]["model"]["error"], "checkpoint missing");

    let ready = TestApp::new(true).await;
    let (status, _) = ready
        .send(Request::get("/ready").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_static_serves_only_public_media() {
    let app = TestApp::new(false).await;
    let root = app.dir.path().join("static");
    std::fs::write(root.join("avatars/face.png"), b"png").unwrap();
    std::fs::write(root.join("animations/clip.mp4"), b"mp4").unwrap();
    std::fs::write(root.join("driving/private.mp4"), b"mp4").unwrap();

    for (uri, expected) in [
        ("/static/avatars/face.png", StatusCode::OK),
        ("/static/animations/clip.mp4", StatusCode::OK),
        ("/static/driving/private.mp4", StatusCode::NOT_FOUND),
    ] {
        let response = app
            .router
            .clone()
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), expected, "{uri}");
    }
}

#[tokio::test]
async fn test_signup_validation_and_duplicates() {
    let app = TestApp::new(false).await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/signup",
            None,
            json!({"fullname": "", "email": "a@example.com", "password": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "All fields are required");

    app.signup_and_login("a@example.com").await;

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/signup",
            None,
            json!({"fullname": "Again", "email": "A@Example.com", "password": "password123"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already exists");
}

#[tokio::test]
async fn test_login_and_session() {
    let app = TestApp::new(false).await;
    app.signup_and_login("a@example.com").await;

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/login",
            None,
            json!({"email": "a@example.com", "password": "wrong"}),
        ))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .send(json_request("POST", "/api/login", None, json!({"email": "a@example.com"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // cookie session
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/login",
            None,
            json!({"email": "a@example.com", "password": "password123"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("avanim_session="));
    assert!(cookie.contains("HttpOnly"));

    let session = cookie.split(';').next().unwrap().to_string();
    let (status, body) = app
        .send(
            Request::get("/api/profile")
                .header(header::COOKIE, session)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["email"], "a@example.com");
    assert!(body["user"].get("password_hash").is_none());

    let (status, _) = app
        .send(Request::get("/api/profile").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_update_and_subscription() {
    let app = TestApp::new(false).await;
    let token = app.signup_and_login("a@example.com").await;

    let (status, body) = app
        .send(json_request(
            "PUT",
            "/api/profile",
            Some(&token),
            json!({"fullname": "Renamed", "email": "renamed@example.com"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["fullname"], "Renamed");

    let (status, body) = app
        .send(json_request(
            "PUT",
            "/api/profile",
            Some(&token),
            json!({"fullname": "Thief", "email": "root@example.com"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Email already exists");

    let (status, body) = app.send(authed("POST", "/api/subscription/update", &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["role"], "subscriber");
    assert_eq!(body["user"]["subscription_status"], "active");
}

#[tokio::test]
async fn test_admin_routes_require_admin_role() {
    let app = TestApp::new(false).await;
    let user_token = app.signup_and_login("a@example.com").await;
    let admin_token = app.login("root@example.com", "admin-password").await;

    let (status, _) = app.send(authed("GET", "/api/admin/users", &user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app.send(authed("GET", "/api/admin/users", &admin_token)).await;
    assert_eq!(status, StatusCode::OK);
    let users = body["users"].as_array().unwrap();
    assert_eq!(users.len(), 2);
    let user_id = users
        .iter()
        .find(|u| u["email"] == "a@example.com")
        .and_then(|u| u["user_id"].as_str())
        .unwrap()
        .to_string();

    let (status, body) = app
        .send(json_request(
            "PUT",
            &format!("/api/admin/user/{user_id}"),
            Some(&admin_token),
            json!({"action": "suspend"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["user"]["subscription_status"], "suspended");

    let (status, _) = app
        .send(json_request(
            "PUT",
            &format!("/api/admin/user/{user_id}"),
            Some(&admin_token),
            json!({"action": "promote"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = app
        .send(authed("DELETE", &format!("/api/admin/user/{user_id}"), &admin_token))
        .await;
    assert_eq!(status, StatusCode::OK);

    // deleted accounts lose their session immediately
    let (status, _) = app.send(authed("GET", "/api/profile", &user_token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_avatar_upload_and_ownership() {
    let app = TestApp::new(false).await;
    let owner = app.signup_and_login("owner@example.com").await;
    let stranger = app.signup_and_login("stranger@example.com").await;

    let (status, body) = app.upload_avatar(&owner, "evil.exe").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid file type");

    let (status, body) = app.upload_avatar(&owner, "face.png").await;
    assert_eq!(status, StatusCode::OK);
    let avatar_id = body["avatar"]["avatar_id"].as_str().unwrap().to_string();
    let avatar_path = body["avatar"]["avatar_path"].as_str().unwrap().to_string();
    assert!(app.dir.path().join("static").join(&avatar_path).exists());

    let (_, body) = app.send(authed("GET", "/api/avatars", &stranger)).await;
    assert!(body["avatars"].as_array().unwrap().is_empty());

    let (status, _) = app
        .send(authed("DELETE", &format!("/api/avatar/{avatar_id}"), &stranger))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(app.dir.path().join("static").join(&avatar_path).exists());

    let (status, _) = app
        .send(authed("DELETE", &format!("/api/avatar/{avatar_id}"), &owner))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(!app.dir.path().join("static").join(&avatar_path).exists());
}

#[tokio::test]
async fn test_expressions_are_listed_by_name() {
    let app = TestApp::new(false).await;
    let (status, body) = app
        .send(Request::get("/api/expressions").body(Body::empty()).unwrap())
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body["expressions"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["expression_name"].as_str())
        .collect();
    assert_eq!(names, vec!["sad", "smile"]);
}

#[tokio::test]
async fn test_generate_without_model_creates_no_record() {
    let app = TestApp::new(false).await;
    let token = app.signup_and_login("a@example.com").await;
    let (_, body) = app.upload_avatar(&token, "face.png").await;
    let avatar_id = body["avatar"]["avatar_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/animation/generate",
            Some(&token),
            json!({"avatar_id": avatar_id, "expression_id": "smile"}),
        ))
        .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["code"], "model_not_loaded");

    let user = app.store.find_user_by_email("a@example.com").await.unwrap().unwrap();
    assert!(app.store.list_animations(&user.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_generate_validates_inputs() {
    let app = TestApp::new(true).await;
    let token = app.signup_and_login("a@example.com").await;
    let other = app.signup_and_login("b@example.com").await;
    let (_, body) = app.upload_avatar(&token, "face.png").await;
    let avatar_id = body["avatar"]["avatar_id"].as_str().unwrap().to_string();

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/animation/generate",
            Some(&token),
            json!({"avatar_id": avatar_id}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/animation/generate",
            Some(&token),
            json!({"avatar_id": avatar_id, "expression_id": "wink"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid expression");

    let (status, _) = app
        .send(json_request(
            "POST",
            "/api/animation/generate",
            Some(&other),
            json!({"avatar_id": avatar_id, "expression_id": "smile"}),
        ))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_expression_missing_from_catalog_is_rejected() {
    let app = TestApp::new(true).await;
    // left over from an earlier catalog
    app.store
        .upsert_expression(&Expression::new("wink", "/expressions/wink.mp4"))
        .await
        .unwrap();
    let token = app.signup_and_login("a@example.com").await;
    let (_, body) = app.upload_avatar(&token, "face.png").await;
    let avatar_id = body["avatar"]["avatar_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/animation/generate",
            Some(&token),
            json!({"avatar_id": avatar_id, "expression_id": "wink"}),
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid expression");

    let user = app.store.find_user_by_email("a@example.com").await.unwrap().unwrap();
    assert!(app.store.list_animations(&user.user_id).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_generation_is_recorded() {
    let app = TestApp::new(true).await;
    let token = app.signup_and_login("a@example.com").await;
    let (_, body) = app.upload_avatar(&token, "face.png").await;
    let avatar_id = body["avatar"]["avatar_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(json_request(
            "POST",
            "/api/animation/generate",
            Some(&token),
            json!({"avatar_id": avatar_id, "expression_id": "smile"}),
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert_eq!(body["animation"]["status"], "failed");
    assert!(body["animation"]["error_message"].as_str().is_some());
    assert!(body["animation"]["completed_at"].as_str().is_some());
    let animation_id = body["animation"]["animation_id"].as_str().unwrap().to_string();

    let (status, body) = app.send(authed("GET", "/api/animations", &token)).await;
    assert_eq!(status, StatusCode::OK);
    let animations = body["animations"].as_array().unwrap();
    assert_eq!(animations.len(), 1);
    assert_eq!(animations[0]["expression_name"], "smile");
    assert!(animations[0]["avatar_path"].as_str().unwrap().starts_with("avatars/"));

    let (status, _) = app
        .send(authed("DELETE", &format!("/api/animation/{animation_id}"), &token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, body) = app.send(authed("GET", "/api/animations", &token)).await;
    assert!(body["animations"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_custom_animation_requires_video() {
    let app = TestApp::new(true).await;
    let token = app.signup_and_login("a@example.com").await;
    let (_, body) = app.upload_avatar(&token, "face.png").await;
    let avatar_id = body["avatar"]["avatar_id"].as_str().unwrap().to_string();

    let (status, body) = app
        .send(multipart_request(
            "/api/animation/custom",
            &token,
            &[
                ("avatar_id", None, avatar_id.as_bytes()),
                ("driving", Some("notes.txt"), b"hello".as_slice()),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Invalid video type");

    // garbage video bytes: recorded as a failed generation
    let (status, body) = app
        .send(multipart_request(
            "/api/animation/custom",
            &token,
            &[
                ("avatar_id", None, avatar_id.as_bytes()),
                ("driving", Some("clip.mp4"), b"not a video".as_slice()),
            ],
        ))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["animation"]["status"], "failed");
    let driving_path = body["animation"]["driving_path"].as_str().unwrap();
    assert!(driving_path.starts_with("driving/"));
}

#[tokio::test]
async fn test_rate_limit_per_client_ip() {
    let dir = tempfile::tempdir().unwrap();
    let config = ApiConfig {
        static_root: dir.path().to_path_buf(),
        rate_limit_rps: 1,
        ..ApiConfig::default()
    };
    let state = AppState::new(
        config,
        Arc::new(MemoryStore::new()),
        AnimatorHandle::not_ready("test"),
    );
    let router = create_router(state, None);

    let mut limited = false;
    for _ in 0..5 {
        let response = router
            .clone()
            .oneshot(
                Request::get("/api/expressions")
                    .header("x-forwarded-for", "203.0.113.7")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        if response.status() == StatusCode::TOO_MANY_REQUESTS {
            limited = true;
            break;
        }
    }
    assert!(limited);
}

#[test]
fn test_role_dashboards() {
    assert_eq!(Role::Admin.dashboard_path(), "/admin");
    assert_eq!(Role::Subscriber.dashboard_path(), "/subscriber");
}
