mod acl;
mod hmac;
mod jwt;

pub use acl::{satisfies, AclMiddlewareFactory, AclMiddlewareService};
pub use hmac::{SignatureCheckFactory, SignatureCheckService};
pub use jwt::{JwtMiddlewareFactory, JwtMiddlewareService};
