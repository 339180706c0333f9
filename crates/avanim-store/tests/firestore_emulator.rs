//! FirestoreStore against a mocked emulator endpoint.

use avanim_models::{AnimationId, AnimationStatus, UserId};
use avanim_store::{
    FirestoreClient, FirestoreConfig, FirestoreStore, RetryConfig, Store, StoreError,
};
use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const DOCS: &str = "/v1/projects/demo/databases/(default)/documents";

async fn store_for(server: &MockServer) -> FirestoreStore {
    let mut config = FirestoreConfig::for_emulator("demo", server.address().to_string());
    config.retry = RetryConfig {
        max_retries: 2,
        base_delay_ms: 1,
        max_delay_ms: 5,
    };
    FirestoreStore::new(FirestoreClient::new(config).await.unwrap())
}

fn user_doc(id: &str, email: &str) -> serde_json::Value {
    json!({
        "name": format!("projects/demo/databases/(default)/documents/users/{id}"),
        "fields": {
            "user_id": {"stringValue": id},
            "fullname": {"stringValue": "Ada Lovelace"},
            "email": {"stringValue": email},
            "password_hash": {"stringValue": "$argon2id$v=19$stub"},
            "role": {"stringValue": "subscriber"},
            "subscription_status": {"stringValue": "active"},
            "created_at": {"timestampValue": "2024-03-01T10:00:00Z"}
        }
    })
}

#[tokio::test]
async fn get_user_reads_document() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/users/u-1")))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_doc("u-1", "ada@example.com")))
        .expect(1)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let user = store
        .get_user(&UserId::from_string("u-1"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(user.fullname, "Ada Lovelace");
    assert_eq!(user.role.as_str(), "subscriber");
}

#[tokio::test]
async fn missing_document_is_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/avatars/nope")))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": {"code": 404}})))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let avatar = store
        .get_avatar(&avanim_models::AvatarId::from_string("nope"))
        .await
        .unwrap();
    assert!(avatar.is_none());
}

#[tokio::test]
async fn find_by_email_runs_equality_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}:runQuery")))
        .and(body_partial_json(json!({
            "structuredQuery": {
                "from": [{"collectionId": "users"}],
                "where": {"fieldFilter": {
                    "field": {"fieldPath": "email"},
                    "op": "EQUAL",
                    "value": {"stringValue": "ada@example.com"}
                }}
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": user_doc("u-1", "ada@example.com"), "readTime": "2024-03-01T10:00:00Z"}
        ])))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let user = store.find_user_by_email("  ADA@example.com ").await.unwrap();
    assert_eq!(user.map(|u| u.user_id.to_string()), Some("u-1".to_string()));
}

#[tokio::test]
async fn create_user_rejects_taken_email() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}:runQuery")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"document": user_doc("u-1", "ada@example.com")}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{DOCS}/users")))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let user = avanim_models::User::new("Other Ada", "ada@example.com", "hash");
    let err = store.create_user(&user).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists(_)));
}

#[tokio::test]
async fn status_update_requires_existing_document() {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path(format!("{DOCS}/animations/gone")))
        .and(query_param("currentDocument.exists", "true"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let err = store
        .update_animation_status(
            &AnimationId::from_string("gone"),
            AnimationStatus::Completed,
            None,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn server_errors_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/users/u-2")))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{DOCS}/users/u-2")))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_doc("u-2", "b@example.com")))
        .mount(&server)
        .await;

    let store = store_for(&server).await;
    let user = store.get_user(&UserId::from_string("u-2")).await.unwrap();
    assert_eq!(user.unwrap().email, "b@example.com");
}
