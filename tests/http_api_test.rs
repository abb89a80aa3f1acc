/// HTTP tests against an in-process server bound to an ephemeral port.
/// The gateway's identity header is simulated by setting it directly.
use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::Client;
use serde_json::{json, Value};
use snapfeed::blobs::{BlobStore, LocalBlobStore, UploadPolicy};
use snapfeed::config::Config;
use snapfeed::state::AppState;
use snapfeed::{db, graphql, routes};
use tempfile::TempDir;

const SUBJECT_HEADER: &str = "x-auth-subject";

async fn spawn_server() -> (TempDir, String) {
    let dir = TempDir::new().unwrap();
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    let base = format!("http://{}", addr);

    let mut config = Config::default();
    config.server.public_url = Some(base.clone());
    config.database.path = Some(dir.path().join("snapfeed.db"));
    config.storage.path = Some(dir.path().join("uploads"));
    config.storage.max_upload_bytes = 1024;

    let pool = db::create_pool(&config.db_path()).unwrap();
    db::run_migrations(&pool).unwrap();

    let blobs: Arc<dyn BlobStore> = Arc::new(LocalBlobStore::new(
        config.uploads_path(),
        pool.clone(),
        config.public_url(),
    ));
    let uploads = UploadPolicy {
        public_url: config.public_url(),
        ticket_minutes: config.storage.upload_ticket_minutes,
    };
    let state = AppState {
        db: pool.clone(),
        config,
        blobs: blobs.clone(),
        graphql_schema: graphql::build_schema(pool, blobs, uploads),
    };

    let app = routes::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (dir, base)
}

async fn graphql(
    client: &Client,
    base: &str,
    subject: Option<&str>,
    query: &str,
    variables: Value,
) -> Value {
    let mut request = client
        .post(format!("{}/graphql", base))
        .json(&json!({ "query": query, "variables": variables }));
    if let Some(subject) = subject {
        request = request.header(SUBJECT_HEADER, subject);
    }
    let response = request.send().await.unwrap();
    assert_eq!(response.status(), 200);
    response.json().await.unwrap()
}

async fn sign_up(client: &Client, base: &str, name: &str) {
    let body = graphql(
        client,
        base,
        Some(name),
        r#"mutation SignUp($input: CreateUserInput!) { createUser(input: $input) { id } }"#,
        json!({
            "input": {
                "username": name,
                "fullname": name,
                "email": format!("{}@example.com", name),
                "image": "https://img.example.com/avatar.jpg"
            }
        }),
    )
    .await;
    assert!(body["errors"].is_null(), "sign-up failed: {}", body);
}

async fn upload_url(client: &Client, base: &str, subject: &str) -> String {
    let body = graphql(
        client,
        base,
        Some(subject),
        "mutation { generateUploadUrl }",
        json!({}),
    )
    .await;
    body["data"]["generateUploadUrl"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_upload_then_post_then_download() {
    let (_dir, base) = spawn_server().await;
    let client = Client::new();
    sign_up(&client, &base, "alice").await;

    let url = upload_url(&client, &base, "alice").await;
    assert!(url.starts_with(&format!("{}/uploads/", base)));

    let response = client
        .post(&url)
        .header("content-type", "image/png")
        .body(b"\x89PNG fake image".to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
    let uploaded: Value = response.json().await.unwrap();
    let storage_id = uploaded["storageId"].as_str().unwrap().to_string();

    // Tickets are single use
    let response = client
        .post(&url)
        .header("content-type", "image/png")
        .body(b"again".to_vec())
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let body = graphql(
        &client,
        &base,
        Some("alice"),
        r#"mutation Publish($input: CreatePostInput!) { createPost(input: $input) { id imageUrl caption } }"#,
        json!({ "input": { "storageId": storage_id, "caption": "first light" } }),
    )
    .await;
    let post = &body["data"]["createPost"];
    assert_eq!(post["caption"], "first light");
    let image_url = post["imageUrl"].as_str().unwrap().to_string();
    assert_eq!(image_url, format!("{}/blobs/{}", base, storage_id));

    let response = client.get(&image_url).send().await.unwrap();
    assert_eq!(response.status(), 200);
    assert_eq!(
        response.headers()["content-type"].to_str().unwrap(),
        "image/png"
    );
    assert_eq!(
        response.headers()["x-content-type-options"].to_str().unwrap(),
        "nosniff"
    );
    assert_eq!(response.bytes().await.unwrap().as_ref(), b"\x89PNG fake image");

    let body = graphql(
        &client,
        &base,
        Some("alice"),
        "{ allImages { id imageUrl } }",
        json!({}),
    )
    .await;
    assert_eq!(body["data"]["allImages"][0]["imageUrl"], image_url.as_str());
}

#[tokio::test]
async fn test_upload_rejections() {
    let (_dir, base) = spawn_server().await;
    let client = Client::new();
    sign_up(&client, &base, "alice").await;

    let url = upload_url(&client, &base, "alice").await;
    let response = client
        .post(&url)
        .header("content-type", "text/plain")
        .body("not an image")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(&url)
        .header("content-type", "image/svg+xml")
        .body("<svg xmlns=\"http://www.w3.org/2000/svg\"><script>alert(1)</script></svg>")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 400);

    let response = client
        .post(&url)
        .header("content-type", "image/jpeg")
        .body(vec![0u8; 4096])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 413);

    let response = client
        .post(format!("{}/uploads/not-a-ticket", base))
        .header("content-type", "image/jpeg")
        .body(vec![1u8; 16])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);

    let response = client
        .get(format!("{}/blobs/missing", base))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_missing_identity_header_is_not_authenticated() {
    let (_dir, base) = spawn_server().await;
    let client = Client::new();

    let body = graphql(&client, &base, None, "{ me { id } }", json!({})).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "NOT_AUTHENTICATED");

    let body = graphql(&client, &base, Some("nobody"), "{ me { id } }", json!({})).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "NOT_FOUND");

    let body = graphql(&client, &base, None, "mutation { generateUploadUrl }", json!({})).await;
    assert_eq!(body["errors"][0]["extensions"]["code"], "NOT_AUTHENTICATED");
}
