//! # Storefront payment server
//! This crate hosts the HTTP server for the storefront payment gateway. It is responsible for:
//! * Taking checkouts from authenticated customers and opening payment sessions with the payment gateway.
//! * Handing customers a (new or existing) payment session when they come back to pay for an order.
//! * Receiving the gateway's signed payment notifications and reconciling them against the orders.
//! * Letting admins move orders along, and super admins override their status.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Customer and admin routes. These need an access token in the `spg_access_token` header (or as a
//!   bearer token).
//! * `/gateway/notification`: The webhook for the payment gateway. Requests must be signed with the webhook secret,
//!   and may be restricted to a whitelist of IP addresses.

pub mod auth;
pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;

pub mod helpers;
pub mod integrations;
pub mod middleware;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
