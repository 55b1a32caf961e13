use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use chrono::Utc;
use serde_json::{json, Value};
use storefront_payment_engine::{
    db_types::{Order, OrderStatusType, OrderUpdate, PaymentStatus, Role, TransactionStatus},
    events::EventProducers,
    order_objects::CheckoutResult,
    payment_objects::{PaymentSessionResult, SessionSource},
    session_objects::PaymentSessionOptions,
    traits::{GatewayError, GatewayTransactionStatus},
    OrderFlowApi,
    OrderManagement,
    PaymentGatewayDatabase,
    PaymentSessionApi,
    SqliteDatabase,
};

use super::{
    helpers::{insert_order, send_request, session, tear_down, test_database, with_token},
    mocks::MockGateway,
};
use crate::routes::{CheckoutRoute, OverrideOrderStatusRoute, RetryPaymentRoute, UpdateOrderStatusRoute};

fn basket(payment_method: &str) -> Value {
    json!({
        "items": [{"product_id": "tshirt", "quantity": 3, "selected_size": "M"}],
        "shipping_fee": 1,
        "payment_method": payment_method,
        "customer": {"first_name": "Alice", "email": "alice@example.com"}
    })
}

#[actix_web::test]
async fn checkout_opens_a_session() {
    let db = test_database().await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_create_session()
        .withf(|req| req.gross_amount.value() == 100_000 && req.items.len() == 2)
        .times(1)
        .returning(|_| Ok(session("tok-1", "tx-1")));
    let req = with_token(TestRequest::post().uri("/checkout").set_json(basket("bank_transfer")), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: CheckoutResult = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(result.session.map(|s| s.token), Some("tok-1".to_string()));
    let order = result.order;
    assert_eq!(order.user_id, "alice");
    assert_eq!(order.total_price.value(), 100_000);
    assert_eq!(order.status, OrderStatusType::AwaitingPayment);
    assert_eq!(order.payment_token.as_deref(), Some("tok-1"));
    assert_eq!(order.payment_id.as_deref(), Some("tx-1"));
    assert_eq!(order.items[0].selected_size.as_deref(), Some("M"));
    tear_down(db).await;
}

#[actix_web::test]
async fn cash_on_delivery_skips_the_gateway() {
    let db = test_database().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().never();
    let req = with_token(TestRequest::post().uri("/checkout").set_json(basket("cod")), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: CheckoutResult = serde_json::from_str(&body).expect("Invalid JSON");
    assert!(result.session.is_none());
    assert!(result.order.payment_token.is_none());
    tear_down(db).await;
}

#[actix_web::test]
async fn checkout_with_an_empty_basket() {
    let db = test_database().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().never();
    let mut body = basket("bank_transfer");
    body["items"] = json!([]);
    let req = with_token(TestRequest::post().uri("/checkout").set_json(body), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body.contains("at least one item"), "{body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn checkout_keeps_the_order_when_the_gateway_times_out() {
    let db = test_database().await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().times(1).returning(|_| Err(GatewayError::Timeout));
    let req = with_token(TestRequest::post().uri("/checkout").set_json(basket("bank_transfer")), "alice", vec![Role::User]);
    let (status, _) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    let orders = db.orders_for_user("alice").await.expect("Error fetching orders");
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].status, OrderStatusType::AwaitingPayment);
    assert!(orders[0].payment_token.is_none());
    tear_down(db).await;
}

#[actix_web::test]
async fn retry_payment_for_someone_elses_order() {
    let db = test_database().await;
    let order = insert_order(&db, "bob").await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().never();
    let uri = format!("/order/id/{}/payment", order.order_id);
    let req = with_token(TestRequest::post().uri(&uri), "alice", vec![Role::User]);
    let (status, _) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    tear_down(db).await;
}

#[actix_web::test]
async fn retry_payment_opens_a_first_session() {
    let db = test_database().await;
    let order = insert_order(&db, "alice").await;
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().never();
    gateway.expect_create_session().times(1).returning(|_| Ok(session("tok-2", "tx-2")));
    let uri = format!("/order/id/{}/payment", order.order_id);
    let req = with_token(TestRequest::post().uri(&uri), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: PaymentSessionResult = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(result.source, SessionSource::Created);
    assert_eq!(result.session.token, "tok-2");
    assert_eq!(result.order.payment_id.as_deref(), Some("tx-2"));
    tear_down(db).await;
}

#[actix_web::test]
async fn retry_payment_reuses_a_live_session() {
    let db = test_database().await;
    let order = with_session(&db, insert_order(&db, "alice").await).await;
    let mut gateway = MockGateway::new();
    gateway
        .expect_query_status()
        .withf(|id| id == "tx-1")
        .times(1)
        .returning(|_| Ok(Some(gateway_status(TransactionStatus::Pending))));
    gateway.expect_create_session().never();
    let uri = format!("/order/id/{}/payment", order.order_id);
    let req = with_token(TestRequest::post().uri(&uri), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let result: PaymentSessionResult = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(result.source, SessionSource::Reused);
    assert_eq!(result.session.token, "tok-1");
    assert_eq!(result.order.version, order.version);
    tear_down(db).await;
}

#[actix_web::test]
async fn retry_payment_when_the_gateway_has_been_paid() {
    let db = test_database().await;
    let order = with_session(&db, insert_order(&db, "alice").await).await;
    let mut gateway = MockGateway::new();
    gateway.expect_query_status().returning(|_| Ok(Some(gateway_status(TransactionStatus::Settlement))));
    gateway.expect_create_session().never();
    let uri = format!("/order/id/{}/payment", order.order_id);
    let req = with_token(TestRequest::post().uri(&uri), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("has already been paid"), "{body}");
    tear_down(db).await;
}

#[actix_web::test]
async fn retry_payment_for_a_processing_order() {
    let db = test_database().await;
    let order = mark_paid(&db, insert_order(&db, "alice").await).await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().never();
    let uri = format!("/order/id/{}/payment", order.order_id);
    let req = with_token(TestRequest::post().uri(&uri), "alice", vec![Role::User]);
    let (status, _) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    tear_down(db).await;
}

#[actix_web::test]
async fn forced_retry_is_for_admins() {
    let db = test_database().await;
    let order = with_session(&db, insert_order(&db, "alice").await).await;
    let mut gateway = MockGateway::new();
    gateway.expect_create_session().never();
    let uri = format!("/order/id/{}/payment?force=true", order.order_id);
    let req = with_token(TestRequest::post().uri(&uri), "alice", vec![Role::User]);
    let (status, _) = send_request(req, configure(db.clone(), gateway)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    tear_down(db).await;
}

#[actix_web::test]
async fn update_order_status() {
    let db = test_database().await;
    let order = mark_paid(&db, insert_order(&db, "alice").await).await;
    let uri = format!("/order/id/{}/status", order.order_id);

    let req = with_token(TestRequest::patch().uri(&uri).set_json(json!({"status": "shipped"})), "alice", vec![Role::User]);
    let (status, _) = send_request(req, configure(db.clone(), MockGateway::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let body = json!({"status": "shipped", "reason": "Handed to courier"});
    let req = with_token(TestRequest::patch().uri(&uri).set_json(body), "admin", vec![Role::Write]);
    let (status, body) = send_request(req, configure(db.clone(), MockGateway::new())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let updated: Order = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(updated.status, OrderStatusType::Shipped);
    assert_eq!(updated.payment_status, PaymentStatus::Paid);

    let req = with_token(TestRequest::patch().uri(&uri).set_json(json!({"status": "processing"})), "admin", vec![Role::Write]);
    let (status, _) = send_request(req, configure(db.clone(), MockGateway::new())).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let audit = db.audit_log_for_order(&order.order_id).await.expect("Error fetching audit log");
    assert_eq!(audit.len(), 1);
    tear_down(db).await;
}

#[actix_web::test]
async fn override_order_status() {
    let db = test_database().await;
    let order = insert_order(&db, "alice").await;
    let uri = format!("/order/id/{}/override", order.order_id);
    let body = json!({"status": "cancelled", "reason": "Customer phoned to cancel"});

    let req = with_token(TestRequest::post().uri(&uri).set_json(body.clone()), "admin", vec![Role::Write]);
    let (status, _) = send_request(req, configure(db.clone(), MockGateway::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let req = with_token(TestRequest::post().uri(&uri).set_json(body), "root", vec![Role::SuperAdmin]);
    let (status, body) = send_request(req, configure(db.clone(), MockGateway::new())).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    let updated: Order = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(updated.status, OrderStatusType::Cancelled);
    tear_down(db).await;
}

fn configure(db: SqliteDatabase, gateway: MockGateway) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let session_api = PaymentSessionApi::new(db.clone(), gateway, PaymentSessionOptions::default());
        let flow_api = OrderFlowApi::new(db, EventProducers::default());
        cfg.service(CheckoutRoute::<SqliteDatabase, MockGateway>::new())
            .service(RetryPaymentRoute::<SqliteDatabase, MockGateway>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(OverrideOrderStatusRoute::<SqliteDatabase>::new())
            .app_data(web::Data::new(session_api))
            .app_data(web::Data::new(flow_api));
    }
}

fn gateway_status(status: TransactionStatus) -> GatewayTransactionStatus {
    GatewayTransactionStatus {
        transaction_id: "tx-1".into(),
        status,
        fraud_status: None,
        transaction_time: None,
        gross_amount: None,
    }
}

async fn with_session(db: &SqliteDatabase, order: Order) -> Order {
    let update = OrderUpdate::default()
        .with_session("tok-1".into(), "https://pay.example.com/tok-1".into(), Utc::now())
        .with_payment_id("tx-1");
    db.update_order(&order.order_id, order.version, update, None)
        .await
        .expect("Error updating order")
        .expect("Order version changed")
}

async fn mark_paid(db: &SqliteDatabase, order: Order) -> Order {
    let update = OrderUpdate::default().with_status(OrderStatusType::Processing).with_payment_status(PaymentStatus::Paid);
    db.update_order(&order.order_id, order.version, update, None)
        .await
        .expect("Error updating order")
        .expect("Order version changed")
}
