//! Webhook signature checks.
//!
//! Gateway notifications carry a base64 HMAC-SHA256 of the raw body, keyed with `SPG_GATEWAY_WEBHOOK_SECRET`. The
//! signature travels in a configurable header, `X-Gateway-Signature` by default.
//!
//! [`SignatureCheckFactory`] buffers the body, checks it against the header and puts the same bytes back for the
//! handler. Requests that fail the check never reach the route.

use std::{
    future::{ready, Ready},
    rc::Rc,
    sync::Arc,
};

use actix_http::h1;
use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    web,
    Error,
};
use futures::future::LocalBoxFuture;
use log::{debug, trace, warn};
use spg_common::Secret;

use crate::{
    errors::{AuthError, ServerError},
    helpers::verify_hmac,
};

/// The shared secret and the header the signature is read from.
struct SigningKey {
    header: String,
    secret: Secret<String>,
}

/// Builds [`SignatureCheckService`]s. A factory without a key lets everything through, which is only meant for local
/// testing against a gateway sandbox.
#[derive(Clone)]
pub struct SignatureCheckFactory {
    key: Option<Arc<SigningKey>>,
}

impl SignatureCheckFactory {
    pub fn new(header: &str, secret: Secret<String>) -> Self {
        Self { key: Some(Arc::new(SigningKey { header: header.to_string(), secret })) }
    }

    pub fn disabled() -> Self {
        warn!("🔐️ Webhook signature checks are switched off. Anyone can post gateway notifications.");
        Self { key: None }
    }
}

impl<S, B> Transform<S, ServiceRequest> for SignatureCheckFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = SignatureCheckService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(SignatureCheckService { key: self.key.clone(), inner: Rc::new(service) }))
    }
}

pub struct SignatureCheckService<S> {
    key: Option<Arc<SigningKey>>,
    inner: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for SignatureCheckService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(inner);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let inner = Rc::clone(&self.inner);
        let key = self.key.clone();
        Box::pin(async move {
            if let Some(key) = key {
                check_signed_body(&mut req, &key).await?;
            }
            inner.call(req).await
        })
    }
}

/// Reads the whole body, verifies its signature and, if it matches, hands the body back to the request.
async fn check_signed_body(req: &mut ServiceRequest, key: &SigningKey) -> Result<(), ServerError> {
    let body = req.extract::<web::Bytes>().await.map_err(|e| {
        warn!("🔐️ Could not read the body of a signed request. {e}");
        ServerError::InvalidRequestBody("Failed to extract request data.".into())
    })?;
    let signature = req
        .headers()
        .get(&key.header)
        .and_then(|v| v.to_str().ok())
        .ok_or(ServerError::AuthenticationError(AuthError::MissingSignature))?;
    if !verify_hmac(key.secret.reveal(), &body, signature) {
        debug!("🔐️ Signature in {} does not match a {}-byte body", key.header, body.len());
        return Err(ServerError::AuthenticationError(AuthError::InvalidSignature));
    }
    trace!("🔐️ Body signature ✅️");
    req.set_payload(replay(body));
    Ok(())
}

fn replay(body: web::Bytes) -> Payload {
    let (_, mut payload) = h1::Payload::create(true);
    payload.unread_data(body);
    Payload::from(payload)
}
