use chrono::{Duration, Utc};
use pharmacy_infra::InventoryConfig;
use reqwest::StatusCode;
use serde_json::{json, Value};

struct TestServer {
    base_url: String,
    client: reqwest::Client,
    handle: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn spawn() -> Self {
        // Same router as prod (in-memory store), bound to an ephemeral port.
        let config = InventoryConfig::from_lookup(|_| None).unwrap();
        let app = pharmacy_api::app::build_app(&config).await.unwrap();
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind ephemeral port");
        let addr = listener.local_addr().unwrap();
        let base_url = format!("http://{}", addr);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url,
            client: reqwest::Client::new(),
            handle,
        }
    }

    async fn get(&self, path: &str) -> (StatusCode, Value) {
        let res = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn post(&self, path: &str, body: Value) -> (StatusCode, Value) {
        let res = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = res.status();
        (status, res.json().await.unwrap_or(Value::Null))
    }

    async fn branch(&self, code: &str, name: &str) -> i64 {
        let (status, body) = self
            .post("/api/branches", json!({ "code": code, "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "body={body}");
        body["id"].as_i64().unwrap()
    }

    async fn stock(&self, branch_id: i64, product_id: i64, quantity: i64, min: i64, max: i64) {
        let (status, body) = self
            .post(
                "/api/stock",
                json!({
                    "branch_id": branch_id,
                    "product_id": product_id,
                    "quantity": quantity,
                    "minimum_stock": min,
                    "maximum_stock": max,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "body={body}");
    }

    async fn quantity(&self, branch_id: i64, product_id: i64) -> i64 {
        let (status, body) = self
            .get(&format!("/api/stock/{branch_id}/{product_id}"))
            .await;
        assert_eq!(status, StatusCode::OK, "body={body}");
        body["quantity"].as_i64().unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

fn movement(branch_id: i64, kind: &str, quantity: i64) -> Value {
    json!({
        "branch_id": branch_id,
        "product_id": 100,
        "type": kind,
        "quantity": quantity,
    })
}

#[tokio::test]
async fn health_is_public_and_echoes_request_id() {
    let srv = TestServer::spawn().await;
    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .header("x-request-id", "abc-123")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-request-id"], "abc-123");

    let res = srv
        .client
        .get(format!("{}/health", srv.base_url))
        .send()
        .await
        .unwrap();
    assert!(res.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn exit_scenario_and_minimum_boundary() {
    let srv = TestServer::spawn().await;
    let a = srv.branch("A", "Alpha").await;
    let b = srv.branch("B", "Beta").await;
    assert_eq!((a, b), (1, 2));
    srv.stock(a, 100, 50, 10, 200).await;

    let (status, body) = srv.post("/api/movements", movement(a, "EXIT", 60)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!(body["status"], 400);
    assert!(body["timestamp"].is_string());
    assert_eq!(srv.quantity(a, 100).await, 50);

    let (status, body) = srv.post("/api/movements", movement(a, "EXIT", 30)).await;
    assert_eq!(status, StatusCode::CREATED, "body={body}");
    assert_eq!(body["branch_name"], "Alpha");
    assert_eq!(body["type"], "EXIT");

    let (_, row) = srv.get("/api/stock/1/100").await;
    assert_eq!(row["quantity"], 20);
    assert_eq!(row["below_minimum"], false);

    srv.post("/api/movements", movement(a, "EXIT", 10)).await;
    let (_, row) = srv.get("/api/stock/1/100").await;
    assert_eq!(row["quantity"], 10);
    assert_eq!(row["below_minimum"], false);

    srv.post("/api/movements", movement(a, "EXIT", 1)).await;
    let (_, row) = srv.get("/api/stock/1/100").await;
    assert_eq!(row["below_minimum"], true);

    let (_, alerts) = srv.get("/api/stock/alerts").await;
    assert_eq!(alerts.as_array().unwrap().len(), 1);
    let (_, alerts) = srv.get("/api/stock/alerts?branch_id=2").await;
    assert!(alerts.as_array().unwrap().is_empty());

    let (_, history) = srv.get("/api/movements/branch/1").await;
    assert_eq!(history.as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn transfer_requires_stocked_destination() {
    let srv = TestServer::spawn().await;
    let a = srv.branch("A", "Alpha").await;
    let b = srv.branch("B", "Beta").await;
    srv.stock(a, 100, 20, 0, 100).await;

    let mut transfer = movement(a, "TRANSFER", 20);
    transfer["destination_branch_id"] = json!(b);

    let (status, body) = srv.post("/api/movements", transfer.clone()).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "body={body}");
    assert_eq!(srv.quantity(a, 100).await, 20);
    let (_, history) = srv.get("/api/movements/product/100").await;
    assert!(history.as_array().unwrap().is_empty());

    srv.stock(b, 100, 0, 0, 100).await;
    let (status, body) = srv.post("/api/movements", transfer).await;
    assert_eq!(status, StatusCode::CREATED, "body={body}");
    assert_eq!(body["destination_branch_name"], "Beta");
    assert_eq!((srv.quantity(a, 100).await, srv.quantity(b, 100).await), (0, 20));

    let (_, by_type) = srv.get("/api/movements?type=TRANSFER").await;
    assert_eq!(by_type.as_array().unwrap().len(), 1);
    let (_, pair) = srv.get("/api/movements/branch/2/product/100").await;
    assert!(pair.as_array().unwrap().is_empty());

    let mut back = movement(b, "TRANSFER", 21);
    back["destination_branch_id"] = json!(a);
    let (status, body) = srv.post("/api/movements", back).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "insufficient_stock");
    assert_eq!((srv.quantity(a, 100).await, srv.quantity(b, 100).await), (0, 20));
    let (_, history) = srv.get("/api/movements").await;
    assert_eq!(history.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn invalid_requests_are_json_400s() {
    let srv = TestServer::spawn().await;
    let a = srv.branch("A", "Alpha").await;
    srv.stock(a, 100, 5, 1, 10).await;

    // Same-branch transfer.
    let mut same = movement(a, "TRANSFER", 1);
    same["destination_branch_id"] = json!(a);
    let (status, body) = srv.post("/api/movements", same).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_argument");

    // Non-positive quantity.
    let (status, _) = srv.post("/api/movements", movement(a, "ENTRY", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // Unknown movement type fails body parsing.
    let (status, body) = srv.post("/api/movements", movement(a, "LOSS", 1)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "validation_error");

    // max <= min leaves the row alone.
    let (status, _) = srv
        .post(
            "/api/stock",
            json!({
                "branch_id": a,
                "product_id": 100,
                "quantity": 1,
                "minimum_stock": 10,
                "maximum_stock": 10
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(srv.quantity(a, 100).await, 5);

    let (status, body) = srv.get("/api/branches/abc").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "invalid_id");

    let (status, body) = srv.get("/api/stock/99/100").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}

#[tokio::test]
async fn branch_directory_crud() {
    let srv = TestServer::spawn().await;
    let id = srv.branch("CEN", "Central").await;

    let (status, body) = srv
        .post("/api/branches", json!({ "code": "CEN", "name": "Again" }))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "duplicate_resource");

    let res = srv
        .client
        .put(format!("{}/api/branches/{id}", srv.base_url))
        .json(&json!({
            "code": "CEN",
            "name": "Central Plaza",
            "phone": "+1 (555) 010-2000",
            "status": "MAINTENANCE",
            "opening_time": "08:00:00",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);

    let (_, found) = srv.get("/api/branches/code/CEN").await;
    assert_eq!(found["name"], "Central Plaza");
    assert_eq!(found["status"], "MAINTENANCE");

    let (_, maintenance) = srv.get("/api/branches?status=maintenance").await;
    assert_eq!(maintenance.as_array().unwrap().len(), 1);

    let res = srv
        .client
        .delete(format!("{}/api/branches/{id}", srv.base_url))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
    let (status, _) = srv.get(&format!("/api/branches/{id}")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn availability_endpoint() {
    let srv = TestServer::spawn().await;
    let a = srv.branch("A", "Alpha").await;
    srv.stock(a, 100, 5, 0, 10).await;

    let (_, body) = srv
        .get("/api/stock/availability?branch_id=1&product_id=100&quantity=5")
        .await;
    assert_eq!(body, json!({ "available": true }));

    let (_, body) = srv
        .get("/api/stock/availability?branch_id=1&product_id=100&quantity=6")
        .await;
    assert_eq!(body, json!({ "available": false }));

    let (_, body) = srv
        .get("/api/stock/availability?branch_id=1&product_id=7&quantity=1")
        .await;
    assert_eq!(body, json!({ "available": false }));

    for q in ["0", "-2"] {
        let (status, body) = srv
            .get(&format!("/api/stock/availability?branch_id=1&product_id=100&quantity={q}"))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "invalid_argument");
    }
}

#[tokio::test]
async fn batches_track_expiry_independently_of_stock() {
    let srv = TestServer::spawn().await;
    let a = srv.branch("A", "Alpha").await;
    srv.stock(a, 100, 3, 0, 10).await;

    let today = Utc::now().date_naive();
    let batch = |number: &str, days: i64| {
        json!({
            "batch_number": number,
            "product_id": 100,
            "branch_id": a,
            "quantity": 10,
            "expiration_date": (today + Duration::days(days)).to_string(),
        })
    };

    let (status, soon) = srv.post("/api/batches", batch("L-29", 29)).await;
    assert_eq!(status, StatusCode::CREATED, "body={soon}");
    assert_eq!(soon["expiring_soon"], true);
    assert_eq!(soon["status"], "AVAILABLE");

    let (_, later) = srv.post("/api/batches", batch("L-31", 31)).await;
    assert_eq!(later["expiring_soon"], false);

    let (status, _) = srv.post("/api/batches", batch("PAST", 0)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, expiring) = srv.get("/api/batches/expiring").await;
    let numbers: Vec<&str> = expiring
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["batch_number"].as_str().unwrap())
        .collect();
    assert_eq!(numbers, vec!["L-29"]);

    let (_, expired) = srv.get("/api/batches/expired").await;
    assert!(expired.as_array().unwrap().is_empty());
    let (_, by_branch) = srv.get("/api/batches/branch/1").await;
    assert_eq!(by_branch.as_array().unwrap().len(), 2);
    let (_, available) = srv.get("/api/batches?status=AVAILABLE").await;
    assert_eq!(available.as_array().unwrap().len(), 2);

    assert_eq!(srv.quantity(a, 100).await, 3);
}

#[tokio::test]
async fn unknown_route_is_json_404() {
    let srv = TestServer::spawn().await;
    let (status, body) = srv.get("/api/nope").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "not_found");
}
