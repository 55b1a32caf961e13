//! Access token middleware.
//!
//! Wrap any scope with [`JwtMiddlewareFactory`] to require a valid access token on every request in it. The token's
//! claims are placed in the request extensions, where the [`AclMiddlewareFactory`](super::AclMiddlewareFactory) and
//! the [`JwtClaims`] extractor pick them up.

use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    Error,
    HttpMessage,
};
use futures::future::{ok, LocalBoxFuture, Ready};
use log::{debug, trace};

use crate::{
    auth::{extract_token, JwtAuthority, JwtClaims},
    errors::{AuthError, ServerError},
};

pub struct JwtMiddlewareFactory {
    authority: JwtAuthority,
}

impl JwtMiddlewareFactory {
    pub fn new(authority: JwtAuthority) -> Self {
        JwtMiddlewareFactory { authority }
    }
}

impl<S, B> Transform<S, ServiceRequest> for JwtMiddlewareFactory
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;
    type InitError = ();
    type Response = ServiceResponse<B>;
    type Transform = JwtMiddlewareService<S>;

    fn new_transform(&self, service: S) -> Self::Future {
        ok(JwtMiddlewareService { authority: self.authority.clone(), service: Rc::new(service) })
    }
}

pub struct JwtMiddlewareService<S> {
    authority: JwtAuthority,
    service: Rc<S>,
}

impl<S, B> Service<ServiceRequest> for JwtMiddlewareService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;
    type Response = ServiceResponse<B>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = Rc::clone(&self.service);
        let claims = match extract_token(req.request()) {
            Some(token) => self.authority.validate_token(&token),
            None => Err(AuthError::MissingToken),
        };
        Box::pin(async move {
            let claims: JwtClaims = claims.map_err(|e| {
                debug!("🔐️ Rejecting request to {}. {e}", req.path());
                ServerError::AuthenticationError(e)
            })?;
            trace!("🔐️ Request to {} authenticated as {}", req.path(), claims.sub);
            req.extensions_mut().insert(claims);
            service.call(req).await
        })
    }
}
