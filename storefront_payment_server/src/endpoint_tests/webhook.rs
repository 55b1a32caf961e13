use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use serde_json::{json, Value};
use storefront_payment_engine::{
    db_types::{OrderStatusType, PaymentStatus},
    events::EventProducers,
    OrderManagement,
    PaymentGatewayDatabase,
    ReconciliationApi,
    SqliteDatabase,
};

use super::helpers::{insert_order, send_webhook, signed_notification, tear_down, test_database, SIGNATURE_HEADER};
use crate::routes::GatewayNotificationRoute;

fn notification(order_id: &str, status: &str, transaction_id: &str) -> String {
    json!({
        "order_id": order_id,
        "transaction_status": status,
        "fraud_status": "accept",
        "transaction_id": transaction_id,
        "transaction_time": "2024-03-01 10:00:00",
        "status_code": "200",
        "gross_amount": "100000.00"
    })
    .to_string()
}

fn outcome(body: &str) -> String {
    let value: Value = serde_json::from_str(body).expect("Invalid JSON");
    value["outcome"].as_str().unwrap_or_default().to_string()
}

#[actix_web::test]
async fn settlement_pays_the_order() {
    let db = test_database().await;
    let order = insert_order(&db, "alice").await;
    let body = notification(order.order_id.as_str(), "settlement", "tx-1");

    let (status, res) = send_webhook(signed_notification(&body), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    assert_eq!(outcome(&res), "applied");
    let paid = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(paid.status, OrderStatusType::Processing);
    assert_eq!(paid.payment_status, PaymentStatus::Paid);
    assert_eq!(paid.payment_id.as_deref(), Some("tx-1"));

    // The gateway retries until it gets a 2xx, so a replay must succeed without doing anything
    let (status, res) = send_webhook(signed_notification(&body), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    assert_eq!(outcome(&res), "duplicate");

    let late = notification(order.order_id.as_str(), "pending", "tx-1");
    let (status, res) = send_webhook(signed_notification(&late), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    assert_eq!(outcome(&res), "stale");
    let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Processing);
    assert_eq!(order.version, paid.version);

    let log = db.notifications_for_order(&order.order_id).await.unwrap();
    // Replays are not logged twice
    assert_eq!(log.len(), 2);
    tear_down(db).await;
}

#[actix_web::test]
async fn expired_session_cancels_the_order() {
    let db = test_database().await;
    let order = insert_order(&db, "alice").await;
    let body = notification(order.order_id.as_str(), "expire", "tx-1");
    let (status, res) = send_webhook(signed_notification(&body), configure(db.clone())).await;
    assert_eq!(status, StatusCode::OK, "{res}");
    let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Cancelled);
    tear_down(db).await;
}

#[actix_web::test]
async fn unsigned_notifications_are_rejected() {
    let db = test_database().await;
    let order = insert_order(&db, "alice").await;
    let body = notification(order.order_id.as_str(), "settlement", "tx-1");

    let req = TestRequest::post()
        .uri("/gateway/notification")
        .insert_header(("content-type", "application/json"))
        .set_payload(body.clone());
    let (status, res) = send_webhook(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res, r#"{"error":"Authentication Error. No signature found in the request."}"#);

    let req = TestRequest::post()
        .uri("/gateway/notification")
        .insert_header(("content-type", "application/json"))
        .insert_header((SIGNATURE_HEADER, "c2lnbmVkIGJ5IHNvbWVvbmUgZWxzZQ=="))
        .set_payload(body);
    let (status, res) = send_webhook(req, configure(db.clone())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(res, r#"{"error":"Authentication Error. Invalid request signature."}"#);

    let order = db.fetch_order_by_order_id(&order.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::AwaitingPayment);
    tear_down(db).await;
}

#[actix_web::test]
async fn invalid_notifications() {
    let db = test_database().await;
    let order = insert_order(&db, "alice").await;

    let body = notification(order.order_id.as_str(), "refund", "tx-1");
    let (status, res) = send_webhook(signed_notification(&body), configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{res}");

    let (status, _) = send_webhook(signed_notification("{\"order_id\": "), configure(db.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let body = notification("ORD-20240301-0000000000000404", "settlement", "tx-9");
    let (status, res) = send_webhook(signed_notification(&body), configure(db.clone())).await;
    assert_eq!(status, StatusCode::NOT_FOUND, "{res}");
    tear_down(db).await;
}

fn configure(db: SqliteDatabase) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = ReconciliationApi::new(db, EventProducers::default());
        cfg.service(GatewayNotificationRoute::<SqliteDatabase>::new()).app_data(web::Data::new(api));
    }
}
