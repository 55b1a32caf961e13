use actix_web::{http::StatusCode, test::TestRequest, web, web::ServiceConfig};
use storefront_payment_engine::{
    db_types::{Order, OrderId, OrderStatusType, Role},
    OrderQueryApi,
};

use super::helpers::{sample_order, send_request, with_token};
use crate::{
    endpoint_tests::mocks::MockOrderManager,
    routes::{MyOrdersRoute, OrderByIdRoute, OrderNotificationsRoute, OrdersSearchRoute},
};

#[actix_web::test]
async fn fetch_my_orders_no_headers() {
    let _ = env_logger::try_init().ok();
    let manager = MockOrderManager::new();
    let (status, body) = send_request(TestRequest::get().uri("/orders"), configure(manager)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body, r#"{"error":"Authentication Error. No access token was provided."}"#);
}

#[actix_web::test]
async fn fetch_my_orders() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager.expect_orders_for_user().withf(|user_id| user_id == "alice").times(1).returning(|_| Ok(alices_orders()));
    let req = with_token(TestRequest::get().uri("/orders"), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.user_id == "alice"));
}

#[actix_web::test]
async fn fetch_my_orders_invalid_sig() {
    let _ = env_logger::try_init().ok();
    let mut token = super::helpers::issue_token("alice", vec![Role::User]);
    token.replace_range(token.len() - 10..token.len() - 5, "00000");
    let req = TestRequest::get().uri("/orders").insert_header(("Authorization", format!("Bearer {token}")));
    let (status, body) = send_request(req, configure(MockOrderManager::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("Access token"), "{body}");
}

#[actix_web::test]
async fn fetch_own_order_by_id() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager
        .expect_order_by_id()
        .withf(|id| id.as_str() == "ORD-20240301-00000000000000aa")
        .returning(|id| Ok(Some(sample_order(id.as_str(), "alice"))));
    let req = with_token(TestRequest::get().uri("/order/id/ORD-20240301-00000000000000aa"), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(order.order_id, OrderId::from("ORD-20240301-00000000000000aa"));
    assert_eq!(order.status, OrderStatusType::AwaitingPayment);
}

#[actix_web::test]
async fn try_fetch_another_users_order_as_normal_user() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager.expect_order_by_id().returning(|id| Ok(Some(sample_order(id.as_str(), "bob"))));
    let req = with_token(TestRequest::get().uri("/order/id/ORD-20240301-00000000000000bb"), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("may not view order"), "{body}");
}

#[actix_web::test]
async fn fetch_another_users_order_as_admin() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager.expect_order_by_id().returning(|id| Ok(Some(sample_order(id.as_str(), "bob"))));
    let req = with_token(TestRequest::get().uri("/order/id/ORD-20240301-00000000000000bb"), "carol", vec![Role::ReadAll]);
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let order: Order = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(order.user_id, "bob");
}

#[actix_web::test]
async fn fetch_missing_order() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager.expect_order_by_id().returning(|_| Ok(None));
    let req = with_token(TestRequest::get().uri("/order/id/ORD-20240301-0000000000000404"), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, r#"{"error":"The data was not found. Order ORD-20240301-0000000000000404 does not exist"}"#);
}

#[actix_web::test]
async fn search_orders_requires_read_all() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager.expect_search_orders().never();
    let req = with_token(TestRequest::get().uri("/search/orders?user_id=bob"), "alice", vec![Role::User]);
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body.contains("This endpoint requires"), "{body}");
}

#[actix_web::test]
async fn search_orders() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager
        .expect_search_orders()
        .withf(|q| q.user_id.as_deref() == Some("alice") && q.status == Some(OrderStatusType::AwaitingPayment))
        .times(1)
        .returning(|_| Ok(alices_orders()));
    let req = with_token(
        TestRequest::get().uri("/search/orders?user_id=alice&status=awaiting_payment"),
        "carol",
        vec![Role::ReadAll],
    );
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::OK);
    let orders: Vec<Order> = serde_json::from_str(&body).expect("Invalid JSON");
    assert_eq!(orders.len(), 2);
}

#[actix_web::test]
async fn search_orders_with_unknown_filter() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager.expect_search_orders().never();
    let req = with_token(TestRequest::get().uri("/search/orders?colour=red"), "root", vec![Role::SuperAdmin]);
    let (status, _) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn notifications_for_order() {
    let _ = env_logger::try_init().ok();
    let mut manager = MockOrderManager::new();
    manager.expect_notifications_for_order().times(1).returning(|_| Ok(vec![]));
    let req = with_token(
        TestRequest::get().uri("/order/id/ORD-20240301-00000000000000aa/notifications"),
        "root",
        vec![Role::SuperAdmin],
    );
    let (status, body) = send_request(req, configure(manager)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "[]");
}

fn configure(manager: MockOrderManager) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = OrderQueryApi::new(manager);
        cfg.service(MyOrdersRoute::<MockOrderManager>::new())
            .service(OrderByIdRoute::<MockOrderManager>::new())
            .service(OrderNotificationsRoute::<MockOrderManager>::new())
            .service(OrdersSearchRoute::<MockOrderManager>::new())
            .app_data(web::Data::new(api));
    }
}

fn alices_orders() -> Vec<Order> {
    let mut paid = sample_order("ORD-20240301-00000000000000aa", "alice");
    paid.status = OrderStatusType::Processing;
    let unpaid = sample_order("ORD-20240302-00000000000000ab", "alice");
    vec![paid, unpaid]
}
