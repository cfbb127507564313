mod common;

use reqwest::{header, StatusCode};
use serde_json::{json, Value};

use common::{setup, PASSWORD};

/// Serves the app on an ephemeral port and returns its base url.
async fn spawn_server() -> (String, common::TestApp) {
    let app = setup().await;
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind");
    let addr = listener.local_addr().expect("No local address");
    let router = sky_takeout::app(app.state.clone());
    tokio::spawn(async move {
        axum::serve(listener, router).await.expect("Server failed");
    });
    (format!("http://{addr}"), app)
}

async fn login(client: &reqwest::Client, base: &str, username: &str) -> header::HeaderMap {
    // Step 1: Authenticate and retrieve token
    let login_response = client
        .post(format!("{base}/login"))
        .json(&json!({ "username": username, "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to send login request");
    assert_eq!(login_response.status(), StatusCode::OK);

    let login_body = login_response
        .json::<Value>()
        .await
        .expect("Failed to parse login response JSON");
    let token = login_body["token"]
        .as_str()
        .expect("Token not found in login response");

    // Step 2: Set Authorization Header
    let mut headers = header::HeaderMap::new();
    headers.insert(
        header::AUTHORIZATION,
        header::HeaderValue::from_str(&format!("Bearer {}", token))
            .expect("Failed to create Authorization header"),
    );
    headers
}

#[tokio::test]
async fn test_order_round_trip_over_http() {
    let (base, app) = spawn_server().await;
    let client = reqwest::Client::new();
    let user = login(&client, &base, "user").await;
    let admin = login(&client, &base, "admin").await;

    // Step 3: Staff adds a dish
    let dish = client
        .post(format!("{base}/api/admin/dish"))
        .headers(admin.clone())
        .json(&json!({
            "name": "Kung Pao Chicken",
            "category_id": app.dish_category,
            "price": "28.00",
            "flavors": [{ "name": "spiciness", "options": ["mild", "hot"] }]
        }))
        .send()
        .await
        .expect("Failed to create dish");
    assert_eq!(dish.status(), StatusCode::CREATED);
    let dish_id = dish.json::<Value>().await.unwrap()["id"].as_i64().unwrap();

    // Step 4: Customer fills the cart and submits
    let public = client
        .get(format!("{base}/api/dish?category_id={}", app.dish_category))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(public.as_array().map(Vec::len), Some(1));
    assert_eq!(public[0]["flavors"][0]["options"], json!(["mild", "hot"]));

    let page = client
        .get(format!("{base}/api/admin/dish/page?name=Kung&status=SELLABLE"))
        .headers(admin.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(page.status(), StatusCode::OK);
    let page = page.json::<Value>().await.unwrap();
    assert_eq!(page["total"], 1);
    assert_eq!(page["records"][0]["id"], dish_id);

    for _ in 0..2 {
        let added = client
            .post(format!("{base}/api/cart/add"))
            .headers(user.clone())
            .json(&json!({ "dish_id": dish_id }))
            .send()
            .await
            .unwrap();
        assert_eq!(added.status(), StatusCode::OK);
    }

    let submitted = client
        .post(format!("{base}/api/order/submit"))
        .headers(user.clone())
        .json(&json!({
            "consignee": "Ann Lee",
            "phone": "13800138000",
            "address": "12 Harbour Road"
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(submitted.status(), StatusCode::CREATED);
    let submission = submitted.json::<Value>().await.unwrap();
    let order_id = submission["id"].as_i64().unwrap();
    let number = submission["number"].as_str().unwrap().to_owned();

    // Step 5: Pay, then the shop confirms
    let paid = client
        .put(format!("{base}/api/order/payment"))
        .headers(user.clone())
        .json(&json!({ "order_number": number, "pay_method": "wechat" }))
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(paid["status"], "TO_BE_CONFIRMED");

    let confirmed = client
        .put(format!("{base}/api/admin/order/{order_id}/confirm"))
        .headers(admin.clone())
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(confirmed["status"], "CONFIRMED");

    // Step 6: Too late for the customer to cancel
    let cancel = client
        .put(format!("{base}/api/order/{order_id}/cancel"))
        .headers(user.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(cancel.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = cancel.json::<Value>().await.unwrap();
    assert_eq!(body["code"], "CANCEL_WINDOW_CLOSED");

    // Step 7: Completing before delivery is a conflict
    let complete = client
        .put(format!("{base}/api/admin/order/{order_id}/complete"))
        .headers(admin.clone())
        .send()
        .await
        .unwrap();
    assert_eq!(complete.status(), StatusCode::CONFLICT);
    assert_eq!(
        complete.json::<Value>().await.unwrap()["code"],
        "INVALID_STATE_TRANSITION"
    );
}

#[tokio::test]
async fn test_identity_is_enforced() {
    let (base, _app) = spawn_server().await;
    let client = reqwest::Client::new();

    let anonymous = client.get(format!("{base}/api/cart")).send().await.unwrap();
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);

    let user = login(&client, &base, "user").await;
    let forbidden = client
        .get(format!("{base}/api/admin/order/statistics"))
        .headers(user)
        .send()
        .await
        .unwrap();
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let admin = login(&client, &base, "admin").await;
    let stats = client
        .get(format!("{base}/api/admin/order/statistics"))
        .headers(admin)
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(stats["to_be_confirmed"], 0);

    let bad_login = client
        .post(format!("{base}/login"))
        .json(&json!({ "username": "user", "password": "wrong" }))
        .send()
        .await
        .unwrap();
    assert_eq!(bad_login.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_then_report() {
    let (base, _app) = spawn_server().await;
    let client = reqwest::Client::new();

    let registered = client
        .post(format!("{base}/register"))
        .json(&json!({ "username": "new_customer", "password": "longenough" }))
        .send()
        .await
        .unwrap();
    assert_eq!(registered.status(), StatusCode::CREATED);

    let duplicate = client
        .post(format!("{base}/register"))
        .json(&json!({ "username": "new_customer", "password": "longenough" }))
        .send()
        .await
        .unwrap();
    assert_eq!(duplicate.status(), StatusCode::CONFLICT);

    let admin = login(&client, &base, "admin").await;
    let today = chrono::Local::now().date_naive();
    let report = client
        .get(format!(
            "{base}/api/admin/report/users?begin={today}&end={today}"
        ))
        .headers(admin.clone())
        .send()
        .await
        .unwrap()
        .json::<Value>()
        .await
        .unwrap();
    assert_eq!(report["new_users"], json!([3]));

    let reversed = client
        .get(format!(
            "{base}/api/admin/report/turnover?begin=2024-02-02&end=2024-02-01"
        ))
        .headers(admin)
        .send()
        .await
        .unwrap();
    assert_eq!(reversed.status(), StatusCode::BAD_REQUEST);
}
