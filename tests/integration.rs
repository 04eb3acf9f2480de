use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use parcel_dispatch::api::rest::router;
use parcel_dispatch::messenger::LogMessenger;
use parcel_dispatch::state::AppState;
use serde_json::{json, Value};
use tower::ServiceExt;

fn setup() -> (Arc<AppState>, axum::Router) {
    let state = Arc::new(AppState::new(1024, Arc::new(LogMessenger)));
    (state.clone(), router(state))
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn send_message(app: &axum::Router, phone: &str, text: &str) -> Value {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/webhook/message",
            json!({ "phone": phone, "text": text }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn requests_for_phone(app: &axum::Router, phone: &str) -> Vec<Value> {
    let response = app
        .clone()
        .oneshot(get_request(&format!("/requests?phone={phone}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await.as_array().unwrap().clone()
}

/// Registers a driver with a speedpoint surcharge and flips them online.
async fn online_driver(app: &axum::Router, name: &str, fee: f64, speedpoint_cost: f64) -> String {
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "full_name": name,
                "phone_number": "0831112222",
                "area": "Alice",
                "transport_type": "car",
                "base_delivery_fee": fee,
                "payment_methods": {
                    "cash": { "enabled": true, "cost": 0.0 },
                    "speedpoint": { "enabled": true, "cost": speedpoint_cost },
                    "payshap": { "enabled": false, "cost": 0.0 }
                }
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let driver = body_json(response).await;
    let id = driver["id"].as_str().unwrap().to_string();

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{id}/status"),
            json!({ "status": "ONLINE" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    id
}

/// Walks the full intake conversation and returns the ready request's id.
async fn intake_ready_request(app: &axum::Router, phone: &str) -> String {
    send_message(app, phone, "1").await;
    send_message(app, phone, "Shop 4, Main Rd").await;
    send_message(app, phone, "12 Church St").await;
    send_message(app, phone, "Birthday cake").await;
    let outcome = send_message(app, phone, "2").await;
    assert_eq!(outcome["status"], "READY_FOR_DRIVER_MATCHING");
    outcome["request_id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn health_returns_ok() {
    let (_state, app) = setup();
    let response = app.oneshot(get_request("/health")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["drivers"], 0);
    assert_eq!(body["requests"], 0);
    assert_eq!(body["awaiting_driver"], 0);
}

#[tokio::test]
async fn metrics_returns_prometheus_format() {
    let (_state, app) = setup();
    let response = app.oneshot(get_request("/metrics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(content_type.contains("text/plain"));

    let body = body_string(response).await;
    assert!(body.contains("earnings_paid_total"));
}

#[tokio::test]
async fn intake_conversation_walks_every_step() {
    let (_state, app) = setup();
    let phone = "0821234567";

    let outcome = send_message(&app, phone, "1").await;
    assert_eq!(outcome["outcome"], "started");

    let requests = requests_for_phone(&app, phone).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["status"], "COLLECTING_PICKUP");
    // inbound local format stored under the canonical key
    assert_eq!(requests[0]["customer_phone"], "27821234567");

    let outcome = send_message(&app, phone, "Shop 4, Main Rd").await;
    assert_eq!(outcome["outcome"], "advanced");
    assert_eq!(outcome["status"], "COLLECTING_DROPOFF");

    let outcome = send_message(&app, phone, "12 Church St").await;
    assert_eq!(outcome["status"], "COLLECTING_DESCRIPTION");

    let outcome = send_message(&app, phone, "Birthday cake").await;
    assert_eq!(outcome["status"], "COLLECTING_PAYMENT");

    // invalid menu choice never advances
    let outcome = send_message(&app, phone, "9").await;
    assert_eq!(outcome["outcome"], "reprompted");

    let outcome = send_message(&app, phone, "2").await;
    assert_eq!(outcome["status"], "READY_FOR_DRIVER_MATCHING");

    let requests = requests_for_phone(&app, phone).await;
    assert_eq!(requests.len(), 1);
    let request = &requests[0];
    assert_eq!(request["pickup_location"], "Shop 4, Main Rd");
    assert_eq!(request["dropoff_location"], "12 Church St");
    assert_eq!(request["parcel_description"], "Birthday cake");
    assert_eq!(request["payment_method"], "Speedpoint");
    assert!(request["delivery_fee"].is_null());
}

#[tokio::test]
async fn phone_format_variants_reach_the_same_conversation() {
    let (_state, app) = setup();

    send_message(&app, "0821234567", "1").await;
    // same subscriber, international format
    let outcome = send_message(&app, "+27 82 123 4567", "Shop 4, Main Rd").await;
    assert_eq!(outcome["status"], "COLLECTING_DROPOFF");

    let requests = requests_for_phone(&app, "0821234567").await;
    assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn keyword_restart_cancels_the_active_request() {
    let (_state, app) = setup();
    let phone = "0821234567";

    send_message(&app, phone, "1").await;
    send_message(&app, phone, "Shop 4, Main Rd").await;

    let outcome = send_message(&app, phone, "1").await;
    assert_eq!(outcome["outcome"], "started");

    let requests = requests_for_phone(&app, phone).await;
    assert_eq!(requests.len(), 2);

    let statuses: Vec<&str> = requests
        .iter()
        .map(|r| r["status"].as_str().unwrap())
        .collect();
    assert!(statuses.contains(&"CANCELLED"));
    assert!(statuses.contains(&"COLLECTING_PICKUP"));

    // newest first: the fresh request is the collecting one
    assert_eq!(requests[0]["status"], "COLLECTING_PICKUP");
    assert!(requests[0]["pickup_location"].is_null());
}

#[tokio::test]
async fn message_without_active_request_is_a_welcome_not_a_record() {
    let (_state, app) = setup();

    let outcome = send_message(&app, "0821234567", "hello there").await;
    assert_eq!(outcome["outcome"], "welcomed");

    let requests = requests_for_phone(&app, "0821234567").await;
    assert!(requests.is_empty());
}

#[tokio::test]
async fn blank_message_is_ignored() {
    let (_state, app) = setup();

    let outcome = send_message(&app, "0821234567", "   ").await;
    assert_eq!(outcome["outcome"], "ignored");
}

#[tokio::test]
async fn submitted_request_ignores_further_chat() {
    let (_state, app) = setup();
    let phone = "0821234567";
    intake_ready_request(&app, phone).await;

    let outcome = send_message(&app, phone, "anything else").await;
    assert_eq!(outcome["outcome"], "welcomed");

    let requests = requests_for_phone(&app, phone).await;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0]["status"], "READY_FOR_DRIVER_MATCHING");
}

#[tokio::test]
async fn create_driver_empty_name_returns_400() {
    let (_state, app) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "full_name": "  ",
                "phone_number": "0831112222",
                "transport_type": "bike",
                "base_delivery_fee": 15.0
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn create_driver_negative_method_cost_returns_400() {
    let (_state, app) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "full_name": "Sipho",
                "phone_number": "0831112222",
                "transport_type": "car",
                "base_delivery_fee": 15.0,
                "payment_methods": {
                    "cash": { "enabled": true, "cost": 0.0 },
                    "speedpoint": { "enabled": true, "cost": -30.0 },
                    "payshap": { "enabled": false, "cost": 0.0 }
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("speedpoint"));
}

#[tokio::test]
async fn settings_update_rejects_negative_method_cost() {
    let (_state, app) = setup();
    let driver_id = online_driver(&app, "Sipho", 15.0, 5.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/settings"),
            json!({
                "payment_methods": {
                    "cash": { "enabled": true, "cost": 0.0 },
                    "speedpoint": { "enabled": true, "cost": 5.0 },
                    "payshap": { "enabled": true, "cost": -1.0 }
                }
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // the stored config is untouched
    let response = app.oneshot(get_request("/drivers")).await.unwrap();
    let drivers = body_json(response).await;
    let driver = &drivers.as_array().unwrap()[0];
    assert_eq!(driver["payment_methods"]["payshap"]["enabled"], false);
    assert_eq!(driver["payment_methods"]["speedpoint"]["cost"], 5.0);
}

#[tokio::test]
async fn create_driver_defaults_follow_transport_type() {
    let (_state, app) = setup();
    let response = app
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "full_name": "Sipho",
                "phone_number": "083 111 2222",
                "transport_type": "motorcycle",
                "base_delivery_fee": 12.5
            }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "OFFLINE");
    assert_eq!(body["max_jobs"], 3);
    assert_eq!(body["active_jobs"], 0);
    assert_eq!(body["total_earnings"], 0.0);
    assert_eq!(body["phone_number"], "27831112222");
}

#[tokio::test]
async fn offline_driver_cannot_accept() {
    let (_state, app) = setup();
    let request_id = intake_ready_request(&app, "0821234567").await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "full_name": "Thabo",
                "phone_number": "0831112222",
                "transport_type": "car",
                "base_delivery_fee": 15.0
            }),
        ))
        .await
        .unwrap();
    let driver = body_json(response).await;
    let driver_id = driver["id"].as_str().unwrap();

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn accept_snapshots_the_fee_and_second_accept_conflicts() {
    let (_state, app) = setup();
    let request_id = intake_ready_request(&app, "0821234567").await;

    let first = online_driver(&app, "Thabo", 15.0, 5.0).await;
    let second = online_driver(&app, "Lindiwe", 18.0, 0.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": first }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = body_json(response).await;
    assert_eq!(request["status"], "ASSIGNED");
    assert_eq!(request["assigned_driver_id"], first.as_str());
    assert_eq!(request["delivery_fee"], 15.0);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": second }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // the loser keeps their capacity
    let response = app.oneshot(get_request("/drivers")).await.unwrap();
    let drivers = body_json(response).await;
    for driver in drivers.as_array().unwrap() {
        let expected = if driver["id"] == first.as_str() { 1 } else { 0 };
        assert_eq!(driver["active_jobs"], expected);
    }
}

#[tokio::test]
async fn full_delivery_flow_totals_and_earnings() {
    let (_state, app) = setup();
    let phone = "0821234567";
    let request_id = intake_ready_request(&app, phone).await;

    let driver_id = online_driver(&app, "Thabo", 15.0, 5.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/pickup"),
            json!({ "cost_of_goods": 42.50 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let request = body_json(response).await;
    assert_eq!(request["status"], "PICKED_UP");
    assert_eq!(request["payment_surcharge"], 5.0);
    assert_eq!(request["final_total"], 62.50);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/arrived"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request = body_json(response).await;
    assert_eq!(request["status"], "ARRIVED_AT_DROPOFF");

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/complete"),
            json!({}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let request = body_json(response).await;
    assert_eq!(request["status"], "COMPLETED");

    // goods cost is reimbursement, not earnings: 15 + 5
    let response = app.oneshot(get_request("/drivers")).await.unwrap();
    let drivers = body_json(response).await;
    let driver = &drivers.as_array().unwrap()[0];
    assert_eq!(driver["total_earnings"], 20.0);
    assert_eq!(driver["active_jobs"], 0);
}

#[tokio::test]
async fn fee_change_does_not_reprice_in_flight_orders() {
    let (_state, app) = setup();
    let request_id = intake_ready_request(&app, "0821234567").await;
    let driver_id = online_driver(&app, "Thabo", 15.0, 5.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/settings"),
            json!({ "base_delivery_fee": 99.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/pickup"),
            json!({ "cost_of_goods": 0.0 }),
        ))
        .await
        .unwrap();
    let request = body_json(response).await;
    assert_eq!(request["delivery_fee"], 15.0);
    assert_eq!(request["final_total"], 20.0);
}

#[tokio::test]
async fn pickup_rejects_negative_goods_cost_and_wrong_state() {
    let (_state, app) = setup();
    let request_id = intake_ready_request(&app, "0821234567").await;

    // not yet assigned
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/pickup"),
            json!({ "cost_of_goods": 10.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let driver_id = online_driver(&app, "Thabo", 15.0, 5.0).await;
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/pickup"),
            json!({ "cost_of_goods": -1.0 }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn capacity_is_enforced_at_accept() {
    let (_state, app) = setup();

    // bike capacity is 2
    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/drivers",
            json!({
                "full_name": "Thabo",
                "phone_number": "0831112222",
                "transport_type": "bike",
                "base_delivery_fee": 10.0
            }),
        ))
        .await
        .unwrap();
    let driver = body_json(response).await;
    let driver_id = driver["id"].as_str().unwrap().to_string();
    let response = app
        .clone()
        .oneshot(json_request(
            "PATCH",
            &format!("/drivers/{driver_id}/status"),
            json!({ "status": "ONLINE" }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut request_ids = Vec::new();
    for phone in ["0821230001", "0821230002", "0821230003"] {
        request_ids.push(intake_ready_request(&app, phone).await);
    }

    for (index, request_id) in request_ids.iter().enumerate() {
        let response = app
            .clone()
            .oneshot(json_request(
                "POST",
                &format!("/requests/{request_id}/accept"),
                json!({ "driver_id": driver_id }),
            ))
            .await
            .unwrap();

        if index < 2 {
            assert_eq!(response.status(), StatusCode::OK);
        } else {
            assert_eq!(response.status(), StatusCode::CONFLICT);
        }
    }
}

#[tokio::test]
async fn direct_order_skips_collection_and_shows_as_open() {
    let (_state, app) = setup();

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            "/orders",
            json!({
                "customer_phone": "0829876543",
                "customer_name": "Nomsa",
                "customer_email": "nomsa@example.com",
                "pickup_location": "KFC, Main Rd",
                "dropoff_location": "Fort Hare residence",
                "parcel_description": "2 Piece Meal",
                "payment_method": "Cash",
                "quantity": 2
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let order = body_json(response).await;
    assert_eq!(order["status"], "READY_FOR_DRIVER_MATCHING");
    assert_eq!(order["customer_phone"], "27829876543");
    assert_eq!(order["quantity"], 2);
    assert!(order["assigned_driver_id"].is_null());

    let response = app.oneshot(get_request("/requests/open")).await.unwrap();
    let open = body_json(response).await;
    assert_eq!(open.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn accepted_order_leaves_the_open_list() {
    let (_state, app) = setup();
    let request_id = intake_ready_request(&app, "0821234567").await;
    let driver_id = online_driver(&app, "Thabo", 15.0, 0.0).await;

    let response = app
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/requests/{request_id}/accept"),
            json!({ "driver_id": driver_id }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app.oneshot(get_request("/requests/open")).await.unwrap();
    let open = body_json(response).await;
    assert!(open.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn get_nonexistent_request_returns_404() {
    let (_state, app) = setup();
    let fake_id = "00000000-0000-0000-0000-000000000000";
    let response = app
        .oneshot(get_request(&format!("/requests/{fake_id}")))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
