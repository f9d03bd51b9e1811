//! # Storefront settlement server
//! This crate exposes the settlement engine over HTTP. It is responsible for:
//! * Accepting purchase and cancellation requests and passing them to the engine.
//! * Opening top-up invoices at payment gateways and receiving their webhooks.
//! * Polling gateways for invoices whose webhook never arrived.
//! * Notifying the customer-facing service when a top-up has been credited.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/api/...`: Accounts, orders, products and invoices. See [routes](routes/index.html).
//! * `/webhooks/{gateway}`: Payment notifications from the named gateway.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod notifier;
pub mod payment_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
