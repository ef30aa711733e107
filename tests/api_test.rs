//! HTTP surface tests driven through the router with `oneshot`.

mod common;

use axum::http::{Method, StatusCode};
use battery_scm::auth::{Actor, Role};
use common::*;
use serde_json::json;

fn order_body() -> serde_json::Value {
    json!({
        "order_date": "2024-03-01",
        "order_kind": "urgent",
        "customer_name": CUSTOMER,
        "lines": [
            { "item_code": SEPARATOR, "quantity": 100 },
            { "item_code": ANODE, "quantity": 10, "planned_shipping_date": "2024-04-01" }
        ]
    })
}

#[tokio::test]
async fn health_reports_database_up() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/health", None, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"], "up");
}

#[tokio::test]
async fn requests_without_actor_headers_are_unauthorized() {
    let app = TestApp::new().await;
    let (status, body) = app.request(Method::GET, "/api/v1/orders", None, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["message"].as_str().unwrap_or_default().contains("x-actor-id"));
}

#[tokio::test]
async fn items_are_listed_by_name() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(Method::GET, "/api/v1/items", Some(&client()), None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let names: Vec<&str> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["item_name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Anode Foil", "Separator A"]);
}

#[tokio::test]
async fn full_lifecycle_over_http() {
    let app = TestApp::new().await;

    let (status, body) = app
        .request(Method::POST, "/api/v1/orders", Some(&client()), Some(order_body()))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let order_no = body["data"]["order_no"].as_str().unwrap().to_string();
    assert_eq!(order_no, "ORD-2024-001");
    assert_eq!(body["data"]["status"], "pending");

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/approve", order_no),
            Some(&manager()),
            Some(json!({ "priority": 8 })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "approved");
    assert_eq!(body["data"]["priority"], 8);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/receipts", order_no),
            Some(&manufacturing()),
            Some(json!({ "items": [
                { "line_seq": 1, "quantity": 100, "received_date": "2024-03-10" },
                { "line_seq": 2, "quantity": 10, "received_date": "2024-03-10" }
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["status"], "received_complete");

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/receipt-status", order_no),
            Some(&manager()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["ordered"], 110);
    assert_eq!(body["data"]["received"], 110);
    assert_eq!(body["data"]["lines"][1]["remaining"], 0);

    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/shipping-plans",
            Some(&manager()),
            Some(json!({ "items": [
                { "order_no": order_no, "line_seq": 1, "quantity": 100, "planned_shipping_date": "2024-03-20" },
                { "order_no": order_no, "line_seq": 2, "quantity": 10, "planned_shipping_date": "2024-03-20" }
            ]})),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let plan_ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["plan_id"].as_i64().unwrap())
        .collect();

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/lines/1/inventory", order_no),
            Some(&manager()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["planned"], 100);
    assert_eq!(body["data"]["available"], 0);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/shipping-plans/instruct", order_no),
            Some(&manager()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/shipping-plans/confirm", order_no),
            Some(&client()),
            Some(json!({ "plan_ids": plan_ids, "received_on": "2024-03-22" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "shipped_complete");

    let (status, body) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order_no),
            Some(&client()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["order"]["status"], "shipped_complete");
    assert_eq!(body["data"]["lines"][0]["shipped_qty"], 100);
}

#[tokio::test]
async fn errors_map_to_status_codes() {
    let app = TestApp::new().await;
    let order = app.place_order(&[(SEPARATOR, 10)]).await;

    let (status, body) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/approve", order.order_no),
            Some(&manager()),
            Some(json!({ "priority": 12 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Bad Request");

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/production", order.order_no),
            Some(&manager()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = app
        .request(
            Method::POST,
            &format!("/api/v1/orders/{}/reject", order.order_no),
            Some(&client()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders/ORD-2030-001", Some(&manager()), None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn clients_only_see_their_own_orders() {
    let app = TestApp::new().await;
    let order = app.place_order(&[(SEPARATOR, 10)]).await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/orders", Some(&other_client()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = app
        .request(Method::GET, "/api/v1/orders?status=pending", Some(&client()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}", order.order_no),
            Some(&other_client()),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn order_ledgers_are_scoped_to_the_owning_client() {
    let app = TestApp::new().await;
    let order = app.received_order(&[(SEPARATOR, 10)]).await;
    let no = &order.order_no;
    let uris = [
        format!("/api/v1/orders/{}/receipts", no),
        format!("/api/v1/orders/{}/receipt-status", no),
        format!("/api/v1/orders/{}/shipping-plans", no),
        format!("/api/v1/orders/{}/lines/1/inventory", no),
        format!("/api/v1/orders/{}/availability", no),
    ];

    for uri in &uris {
        let (status, _) = app.request(Method::GET, uri, Some(&client()), None).await;
        assert_eq!(status, StatusCode::OK, "owner reading {}", uri);

        let (status, body) = app
            .request(Method::GET, uri, Some(&other_client()), None)
            .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "other customer reading {}", uri);
        assert_eq!(body["error"], "Forbidden");

        let (status, _) = app.request(Method::GET, uri, Some(&manager()), None).await;
        assert_eq!(status, StatusCode::OK, "manager reading {}", uri);
    }
}

#[tokio::test]
async fn clients_without_company_see_nothing() {
    let app = TestApp::new().await;
    let order = app.received_order(&[(SEPARATOR, 10)]).await;
    let anonymous = Actor::new("nina", Role::Client);

    let (status, _) = app
        .request(Method::GET, "/api/v1/orders", Some(&anonymous), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{}/shipping-plans", order.order_no),
            Some(&anonymous),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .request(Method::GET, "/api/v1/dashboard", Some(&anonymous), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn import_rows_resolve_against_catalog() {
    let app = TestApp::new().await;
    let (status, body) = app
        .request(
            Method::POST,
            "/api/v1/orders/import/resolve",
            Some(&client()),
            Some(json!({ "rows": [
                { "row_number": 2, "item_name": "Separator A", "quantity": 5, "unit_price": "990" },
                { "row_number": 3, "item_name": "Cathode", "quantity": 1 }
            ]})),
        )
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["lines"][0]["item_code"], SEPARATOR);
    assert_eq!(body["data"]["errors"][0]["row_number"], 3);
    assert_eq!(body["data"]["warnings"][0]["row_number"], 2);
}

#[tokio::test]
async fn dashboard_depends_on_role() {
    let app = TestApp::new().await;
    app.place_order(&[(SEPARATOR, 10)]).await;
    app.approved_order(&[(SEPARATOR, 10)]).await;

    let (status, body) = app
        .request(Method::GET, "/api/v1/dashboard", Some(&client()), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "client");
    assert_eq!(body["data"]["total_orders"], 2);
    assert_eq!(body["data"]["pending"], 1);
    assert_eq!(body["data"]["in_progress"], 1);

    let (_, body) = app
        .request(Method::GET, "/api/v1/dashboard", Some(&manager()), None)
        .await;
    assert_eq!(body["data"]["role"], "order_manager");
    assert_eq!(body["data"]["status_counts"]["pending"], 1);
    assert_eq!(body["data"]["status_counts"]["approved"], 1);
    assert_eq!(body["data"]["status_counts"]["rejected"], 0);

    let (_, body) = app
        .request(Method::GET, "/api/v1/dashboard", Some(&manufacturing()), None)
        .await;
    assert_eq!(body["data"]["role"], "manufacturing");
    assert_eq!(body["data"]["approved"], 1);
    assert_eq!(body["data"]["production_orders"].as_array().unwrap().len(), 1);
}
