use std::sync::Arc;

use reqwest::StatusCode;
use serde_json::{Value, json};

use storerec_infra::{AppServices, ServiceSettings};

const ADMIN_TOKEN: &str = "test-admin";

struct TestServer {
    base_url: String,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod over in-memory stores, bound to an ephemeral port.
        let services = Arc::new(AppServices::in_memory(ServiceSettings::default()));
        let app = storerec_api::app::build_app(services, ADMIN_TOKEN);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self { base_url, handle }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Provision a store through the admin API; returns `(store_id, api_key)`.
async fn provision(client: &reqwest::Client, server: &TestServer, domain: &str) -> (String, String) {
    let res = client
        .post(server.url("/admin/stores"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "name": "Test Shop", "domain": domain, "platform": "shopify" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    let body: Value = res.json().await.unwrap();
    (
        body["id"].as_str().unwrap().to_string(),
        body["api_key"].as_str().unwrap().to_string(),
    )
}

async fn create_product(client: &reqwest::Client, server: &TestServer, key: &str, sku: &str) -> Value {
    let res = client
        .post(server.url("/products"))
        .header("x-api-key", key)
        .json(&json!({
            "store_product_id": sku,
            "title": format!("Product {sku}"),
            "category": "shoes",
            "price_cents": 4_999
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);
    res.json().await.unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let server = TestServer::spawn().await;
    let res = reqwest::get(server.url("/health")).await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn admin_routes_require_the_admin_token() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client
        .post(server.url("/admin/stores"))
        .json(&json!({ "name": "Shop", "domain": "shop.example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let res = client
        .get(server.url("/admin/stores"))
        .bearer_auth("wrong")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_store_domains_conflict() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    provision(&client, &server, "dupe.example.com").await;

    let res = client
        .post(server.url("/admin/stores"))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "name": "Again", "domain": "DUPE.example.com" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn store_routes_require_a_valid_api_key() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();

    let res = client.get(server.url("/products")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "missing_api_key");

    let res = client
        .get(server.url("/products"))
        .header("x-api-key", "sk_not_a_key")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_api_key");
}

#[tokio::test]
async fn whoami_reports_the_calling_store() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (store_id, key) = provision(&client, &server, "whoami.example.com").await;

    let body: Value = client
        .get(server.url("/whoami"))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["store_id"], store_id);
    assert_eq!(body["domain"], "whoami.example.com");
}

#[tokio::test]
async fn deactivated_store_keys_are_rejected() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (store_id, key) = provision(&client, &server, "paused.example.com").await;

    let res = client
        .patch(server.url(&format!("/admin/stores/{store_id}")))
        .bearer_auth(ADMIN_TOKEN)
        .json(&json!({ "is_active": false }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let res = client
        .get(server.url("/whoami"))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn product_crud_round_trip() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, key) = provision(&client, &server, "crud.example.com").await;

    let created = create_product(&client, &server, &key, "sku-1").await;
    let id = created["id"].as_str().unwrap().to_string();

    let res = client
        .post(server.url("/products"))
        .header("x-api-key", &key)
        .json(&json!({ "store_product_id": "sku-1", "title": "Again" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CONFLICT);

    let res = client
        .patch(server.url(&format!("/products/{id}")))
        .header("x-api-key", &key)
        .json(&json!({ "title": "Trail Boot" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let updated: Value = res.json().await.unwrap();
    assert_eq!(updated["title"], "Trail Boot");

    let list: Value = client
        .get(server.url("/products"))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["count"], 1);

    let res = client
        .delete(server.url(&format!("/products/{id}")))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let res = client
        .get(server.url(&format!("/products/{id}")))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn malformed_ids_and_bodies_are_bad_requests() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, key) = provision(&client, &server, "bad.example.com").await;

    let res = client
        .get(server.url("/products/not-a-uuid"))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_id");

    let res = client
        .post(server.url("/interactions"))
        .header("x-api-key", &key)
        .json(&json!({ "user_id": "u-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["error"], "invalid_body");

    let res = client
        .post(server.url("/interactions"))
        .header("x-api-key", &key)
        .json(&json!({ "interaction_type": "teleport", "user_id": "u-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn stores_cannot_see_each_others_data() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, key_a) = provision(&client, &server, "a.example.com").await;
    let (_, key_b) = provision(&client, &server, "b.example.com").await;

    let product = create_product(&client, &server, &key_a, "sku-a").await;
    let id = product["id"].as_str().unwrap();

    let res = client
        .get(server.url(&format!("/products/{id}")))
        .header("x-api-key", &key_b)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let list: Value = client
        .get(server.url("/products"))
        .header("x-api-key", &key_b)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(list["count"], 0);
}

#[tokio::test]
async fn purchases_drive_popularity_recommendations() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, key) = provision(&client, &server, "recs.example.com").await;

    let product = create_product(&client, &server, &key, "sku-hot").await;
    create_product(&client, &server, &key, "sku-cold").await;

    for user in ["u-1", "u-2", "u-3"] {
        let res = client
            .post(server.url("/interactions"))
            .header("x-api-key", &key)
            .json(&json!({
                "interaction_type": "purchase",
                "user_id": user,
                "product_id": "sku-hot",
                "value_cents": 4_999
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::CREATED);
    }

    let res = client
        .post(server.url("/recommendations/generate"))
        .header("x-api-key", &key)
        .json(&json!({ "user_id": "newcomer", "algorithm": "popularity", "max_results": 5 }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let body: Value = res.json().await.unwrap();
    assert_eq!(body["count"], 1);
    let rec = &body["items"][0];
    assert_eq!(rec["product_id"], product["id"]);
    assert_eq!(rec["rank"], 1);

    let rec_id = rec["id"].as_str().unwrap();
    let res = client
        .post(server.url(&format!("/recommendations/{rec_id}/click")))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    let clicked: Value = res.json().await.unwrap();
    assert_eq!(clicked["click_count"], 1);
}

#[tokio::test]
async fn interactions_queue_background_jobs() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, key) = provision(&client, &server, "jobs.example.com").await;
    create_product(&client, &server, &key, "sku-1").await;

    let res = client
        .post(server.url("/interactions"))
        .header("x-api-key", &key)
        .json(&json!({ "interaction_type": "view", "user_id": "u-1", "product_id": "sku-1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::CREATED);

    let stats: Value = client
        .get(server.url("/jobs/stats"))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["pending"], 2);

    let missing = uuid_like();
    let res = client
        .get(server.url(&format!("/jobs/{missing}")))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn model_training_is_accepted_and_queued() {
    let server = TestServer::spawn().await;
    let client = reqwest::Client::new();
    let (_, key) = provision(&client, &server, "models.example.com").await;

    let res = client
        .post(server.url("/models/train"))
        .header("x-api-key", &key)
        .json(&json!({ "model_type": "content_based" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::ACCEPTED);
    let ticket: Value = res.json().await.unwrap();
    let job_id = ticket["job_id"].as_str().unwrap();

    let job: Value = client
        .get(server.url(&format!("/jobs/{job_id}")))
        .header("x-api-key", &key)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(job["status"]["state"], "pending");
    assert_eq!(ticket["model_type"], "content_based");

    let res = client
        .post(server.url("/models/train"))
        .header("x-api-key", &key)
        .json(&json!({ "model_type": "popularity" }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

fn uuid_like() -> &'static str {
    "0190f1c2-0000-7000-8000-000000000000"
}
