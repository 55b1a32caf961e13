use std::{net::IpAddr, time::Duration};

use actix_web::{
    dev::{Server, Service},
    http::KeepAlive,
    middleware::Logger,
    web,
    App,
    HttpServer,
};
use futures::{future::ok, FutureExt};
use log::*;
use storefront_payment_engine::{
    events::EventProducers,
    OrderFlowApi,
    OrderQueryApi,
    PaymentSessionApi,
    ReconciliationApi,
    SqliteDatabase,
};

use crate::{
    auth::JwtAuthority,
    config::ServerConfig,
    errors::{AuthError, ServerError, ServerError::AuthenticationError},
    helpers::get_remote_ip,
    integrations::{
        gateway::GatewayClient,
        order_log::{create_order_log_handlers, ORDER_EVENT_BUFFER_SIZE},
    },
    middleware::{JwtMiddlewareFactory, SignatureCheckFactory},
    routes::{
        health,
        CheckoutRoute,
        GatewayNotificationRoute,
        MyOrdersRoute,
        OrderAuditLogRoute,
        OrderByIdRoute,
        OrderNotificationsRoute,
        OrdersSearchRoute,
        OverrideOrderStatusRoute,
        RetryPaymentRoute,
        UpdateOrderStatusRoute,
    },
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, config.max_connections)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.run_migrations().await.map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let gateway = GatewayClient::new(config.gateway.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let handlers = create_order_log_handlers(ORDER_EVENT_BUFFER_SIZE);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    let srv = create_server_instance(config, db, gateway, producers)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    gateway: GatewayClient,
    producers: EventProducers,
) -> Result<Server, ServerError> {
    let authority = JwtAuthority::new(&config.auth);
    let session_options = config.session.payment_session_options();
    let srv = HttpServer::new(move || {
        let session_api = PaymentSessionApi::new(db.clone(), gateway.clone(), session_options.clone());
        let orders_api = OrderFlowApi::new(db.clone(), producers.clone());
        let reconciliation_api = ReconciliationApi::new(db.clone(), producers.clone());
        let query_api = OrderQueryApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("spg::access_log"))
            .app_data(web::Data::new(session_api))
            .app_data(web::Data::new(orders_api))
            .app_data(web::Data::new(reconciliation_api))
            .app_data(web::Data::new(query_api));
        // Routes that require authentication
        let auth_scope = web::scope("/api")
            .wrap(JwtMiddlewareFactory::new(authority.clone()))
            .service(CheckoutRoute::<SqliteDatabase, GatewayClient>::new())
            .service(MyOrdersRoute::<SqliteDatabase>::new())
            .service(OrderByIdRoute::<SqliteDatabase>::new())
            .service(RetryPaymentRoute::<SqliteDatabase, GatewayClient>::new())
            .service(UpdateOrderStatusRoute::<SqliteDatabase>::new())
            .service(OverrideOrderStatusRoute::<SqliteDatabase>::new())
            .service(OrderNotificationsRoute::<SqliteDatabase>::new())
            .service(OrderAuditLogRoute::<SqliteDatabase>::new())
            .service(OrdersSearchRoute::<SqliteDatabase>::new());
        let use_x_forwarded_for = config.use_x_forwarded_for;
        let use_forwarded = config.use_forwarded;
        let whitelist = config.webhook.whitelist.clone();
        let hmac = if config.webhook.hmac_checks {
            SignatureCheckFactory::new(&config.webhook.signature_header, config.webhook.hmac_secret.clone())
        } else {
            SignatureCheckFactory::disabled()
        };
        // The whitelist is checked before the signature, so unknown peers never get to make us read their body
        let gateway_scope = web::scope("/gateway")
            .wrap(hmac)
            .wrap_fn(move |req, srv| {
                let peer_ip = get_remote_ip(req.request(), use_x_forwarded_for, use_forwarded);
                if is_whitelisted(peer_ip, whitelist.as_deref()) {
                    srv.call(req).boxed_local()
                } else {
                    ok(req.error_response(AuthenticationError(AuthError::ForbiddenPeer))).boxed_local()
                }
            })
            .service(GatewayNotificationRoute::<SqliteDatabase>::new());
        app.service(health).service(auth_scope).service(gateway_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

/// No whitelist lets everyone through. With a whitelist, a peer whose address cannot be determined is refused.
pub fn is_whitelisted(peer_ip: Option<IpAddr>, whitelist: Option<&[IpAddr]>) -> bool {
    match (peer_ip, whitelist) {
        (_, None) => true,
        (Some(ip), Some(whitelist)) => {
            let allowed = whitelist.contains(&ip);
            if allowed {
                info!("💻️ Gateway notification from {ip}");
            } else {
                warn!("💻️ Gateway notification from {ip}, which is not on the whitelist. Denying access.");
            }
            allowed
        },
        (None, Some(_)) => {
            warn!("💻️ No IP address found in gateway remote peer request, denying access.");
            false
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn whitelisting() {
        let list: Vec<IpAddr> = vec!["203.0.113.7".parse().unwrap(), "2001:db8::1".parse().unwrap()];
        assert!(is_whitelisted(None, None));
        assert!(is_whitelisted(Some("10.0.0.1".parse().unwrap()), None));
        assert!(is_whitelisted(Some("203.0.113.7".parse().unwrap()), Some(&list)));
        assert!(is_whitelisted(Some("2001:db8::1".parse().unwrap()), Some(&list)));
        assert!(!is_whitelisted(Some("10.0.0.1".parse().unwrap()), Some(&list)));
        assert!(!is_whitelisted(None, Some(&list)));
        assert!(!is_whitelisted(Some("10.0.0.1".parse().unwrap()), Some(&[])));
    }
}
