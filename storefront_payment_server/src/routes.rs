//! Request handler definitions
//!
//! Define each route and it handler here.
//! Handlers that are more than a line or two MUST go into a separate module. Keep this module neat and tidy 🙏
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause the
//! current worker to stop processing new requests. Every handler here is async, and all database and gateway calls are
//! awaited, so a slow gateway only holds up the request that is waiting on it.
//!
//! Authorisation happens in two places. Role requirements that can be decided from the access token alone are
//! enforced by the ACL middleware attached in [`route!`]. Rules that depend on the order itself (owner or reader,
//! `force` only for admins) are enforced by the payment engine.
use actix_web::{get, web, HttpResponse, Responder};
use log::*;
use storefront_payment_engine::{
    db_types::{OrderId, Requester, Role},
    order_objects::{CheckoutRequest, OrderQueryFilter, StatusOverride},
    payment_objects::GatewayNotification,
    traits::{OrderManagement, PaymentGateway, PaymentGatewayDatabase},
    OrderFlowApi,
    OrderQueryApi,
    PaymentSessionApi,
    ReconciliationApi,
};

use crate::{
    auth::JwtClaims,
    data_objects::{RetryPaymentParams, StatusUpdateRequest, WebhookPayload},
    errors::ServerError,
};

// Web-actix cannot handle generics in handlers, so it's implemented manually using the `route!` macro
#[macro_export]
macro_rules! route {
    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+) => {
        paste::paste! { pub struct [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ >( $( core::marker::PhantomData<fn() -> [< T $bounds:camel> ] >,)+ );}
        paste::paste! { impl< $( [< T $bounds:camel> ],)+ > [<$name:camel Route>]< $( [< T $bounds:camel> ],)+ > {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self($( core::marker::PhantomData::<fn() -> [< T $bounds:camel> ] >,)+)
            }
        }}
        paste::paste! { impl<$( [< T $bounds:camel >] , )+> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<$([<T $bounds:camel>],)+>
        where
            $([<T $bounds:camel>]: $bounds + 'static,)+
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::< $( [< T $bounds:camel >], )+>);
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };

    ($name:ident => $method:ident $path:literal impl $($bounds:ty),+ where requires [$($roles:expr),+])  => {
        paste::paste! { pub struct [<$name:camel Route>]<A>(core::marker::PhantomData<fn() -> A>);}
        paste::paste! { impl<A> [<$name:camel Route>]<A> {
            #[allow(clippy::new_without_default)]
            pub fn new() -> Self {
                Self(core::marker::PhantomData::<fn() -> A>)
            }
        }}
        paste::paste! { impl<A> actix_web::dev::HttpServiceFactory for [<$name:camel Route>]<A>
        where
            A: $($bounds +)+ 'static,
        {
            fn register(self, config: &mut actix_web::dev::AppService) {
                let res = actix_web::Resource::new($path)
                    .name(stringify!($name))
                    .guard(actix_web::guard::$method())
                    .to($name::<A>)
                    .wrap($crate::middleware::AclMiddlewareFactory::new(&[$($roles),+]));
                actix_web::dev::HttpServiceFactory::register(res, config);
            }
        }}
    };
}

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

//----------------------------------------------   Checkout  ----------------------------------------------------
route!(checkout => Post "/checkout" impl PaymentGatewayDatabase, PaymentGateway);
/// Route handler for the checkout endpoint
///
/// Creates an order for the authenticated user from the basket in the request body. Prices come from the product
/// catalog, not from the request. For gateway payment methods the response also carries the payment session
/// (`token` and `redirect_url`) that the storefront hands to the gateway's payment page.
///
/// If the gateway cannot be reached the order is still created, and the error is returned. The customer can pick up
/// the payment later via `/order/id/{order_id}/payment`.
pub async fn checkout<B, G>(
    claims: JwtClaims,
    body: web::Json<CheckoutRequest>,
    api: web::Data<PaymentSessionApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    debug!("💻️ POST checkout for {}", claims.sub);
    let requester = Requester::from(claims);
    let result = api.checkout(body.into_inner(), &requester).await.map_err(|e| {
        debug!("💻️ Checkout failed for {}. {e}", requester.user_id);
        e
    })?;
    Ok(HttpResponse::Ok().json(result))
}

//----------------------------------------------   Orders  ----------------------------------------------------
route!(my_orders => Get "/orders" impl OrderManagement);
/// Route handler for the orders endpoint
///
/// Authenticated users can fetch their own orders using this endpoint. The user id is taken from the access token.
pub async fn my_orders<B: OrderManagement>(
    claims: JwtClaims,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    debug!("💻️ GET my_orders for {}", claims.sub);
    let orders = api.my_orders(&Requester::from(claims)).await?;
    Ok(HttpResponse::Ok().json(orders))
}

route!(order_by_id => Get "/order/id/{order_id}" impl OrderManagement);
/// User `/order/id/{order_id}` to fetch a specific order by its order_id.
///
/// Users can fetch their own orders. Readers (`ReadAll` and `SuperAdmin` roles) can fetch any order. Everyone else
/// gets a 403, whether the order exists or not.
pub async fn order_by_id<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET order_by_id({order_id})");
    let order = api.order_by_id(&order_id, &Requester::from(claims)).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(retry_payment => Post "/order/id/{order_id}/payment" impl PaymentGatewayDatabase, PaymentGateway);
/// Hands back a payment session for an unpaid order.
///
/// The existing session is reused if the gateway says it is still live. Otherwise a new one is opened. Orders the
/// gateway reports as paid get a 409. Admins can pass `?force=true` to skip the liveness check.
pub async fn retry_payment<B, G>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    params: web::Query<RetryPaymentParams>,
    api: web::Data<PaymentSessionApi<B, G>>,
) -> Result<HttpResponse, ServerError>
where
    B: PaymentGatewayDatabase,
    G: PaymentGateway,
{
    let order_id = path.into_inner();
    let force = params.into_inner().force;
    debug!("💻️ POST retry_payment({order_id}) for {}. Force: {force}", claims.sub);
    let result = api.retry_payment(&order_id, &Requester::from(claims), force).await.map_err(|e| {
        debug!("💻️ Payment retry for {order_id} failed. {e}");
        e
    })?;
    info!("💻️ Payment session for {order_id}: {:?}", result.source);
    Ok(HttpResponse::Ok().json(result))
}

route!(update_order_status => Patch "/order/id/{order_id}/status" impl PaymentGatewayDatabase where requires [Role::Write]);
/// Moves an order along the status table, e.g. `processing` to `shipped`. Backward moves and moves out of a terminal
/// status are rejected with a 409.
pub async fn update_order_status<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<StatusUpdateRequest>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let StatusUpdateRequest { status, reason } = body.into_inner();
    debug!("💻️ PATCH order status of {order_id} to {status} by {}", claims.sub);
    let order = api.update_order_status(&order_id, status, reason, &Requester::from(claims)).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(override_order_status => Post "/order/id/{order_id}/override" impl PaymentGatewayDatabase where requires [Role::SuperAdmin]);
/// The audited escape hatch for super admins. See [`StatusOverride`] for the request body.
pub async fn override_order_status<B: PaymentGatewayDatabase>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    body: web::Json<StatusOverride>,
    api: web::Data<OrderFlowApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let request = body.into_inner();
    warn!("💻️ {} is overriding the status of {order_id} to {}. Reason: {}", claims.sub, request.status, request.reason);
    let order = api.override_status(&order_id, request, &Requester::from(claims)).await?;
    Ok(HttpResponse::Ok().json(order))
}

route!(order_notifications => Get "/order/id/{order_id}/notifications" impl OrderManagement where requires [Role::ReadAll]);
/// Every gateway notification recorded against the order, oldest first, with the outcome of each.
pub async fn order_notifications<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET notifications for {order_id}");
    let records = api.notifications_for_order(&order_id, &Requester::from(claims)).await?;
    Ok(HttpResponse::Ok().json(records))
}

route!(order_audit_log => Get "/order/id/{order_id}/audit" impl OrderManagement where requires [Role::ReadAll]);
pub async fn order_audit_log<B: OrderManagement>(
    claims: JwtClaims,
    path: web::Path<OrderId>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    debug!("💻️ GET audit log for {order_id}");
    let entries = api.audit_log_for_order(&order_id, &Requester::from(claims)).await?;
    Ok(HttpResponse::Ok().json(entries))
}

route!(orders_search => Get "/search/orders" impl OrderManagement where requires [Role::ReadAll]);
pub async fn orders_search<B: OrderManagement>(
    claims: JwtClaims,
    query: web::Query<OrderQueryFilter>,
    api: web::Data<OrderQueryApi<B>>,
) -> Result<HttpResponse, ServerError> {
    let query = query.into_inner();
    debug!("💻️ GET orders search for [{query:?}]");
    let orders = api.search_orders(query, &Requester::from(claims)).await?;
    Ok(HttpResponse::Ok().json(orders))
}

//------------------------------------------   Gateway notifications  ---------------------------------------------
route!(gateway_notification => Post "/notification" impl PaymentGatewayDatabase);
/// Webhook for the payment gateway's transaction notifications.
///
/// By the time the request gets here, the HMAC middleware has checked the signature over the raw body, which is why
/// the body is taken as bytes and parsed by hand. Anything other than a 2xx makes the gateway send the notification
/// again later, so replays of notifications that were already applied return 200 with a `duplicate` outcome.
pub async fn gateway_notification<B: PaymentGatewayDatabase>(
    body: web::Bytes,
    api: web::Data<ReconciliationApi<B>>,
) -> Result<HttpResponse, ServerError> {
    trace!("💻️ Received gateway notification");
    let payload = serde_json::from_slice::<WebhookPayload>(&body).map_err(|e| {
        warn!("💻️ Could not deserialize gateway notification. {e}");
        ServerError::CouldNotDeserializePayload(e.to_string())
    })?;
    let notification = GatewayNotification::try_from(payload).map_err(|e| {
        warn!("💻️ Invalid gateway notification. {e}");
        e
    })?;
    let order_id = notification.order_id.clone();
    let result = api.handle_notification(notification).await.map_err(|e| {
        warn!("💻️ Could not reconcile notification for {order_id}. {e}");
        e
    })?;
    info!("💻️ Notification for {order_id} processed: {}", result.outcome);
    Ok(HttpResponse::Ok().json(result))
}
