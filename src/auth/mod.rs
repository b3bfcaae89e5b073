//! # Auth Module
//!
//! GitHub OAuth login for allow-listed accounts:
//! - Single-use state tokens for the redirect round trip
//! - Code exchange and profile fetch against the provider
//! - Account reconciliation (no self-registration)
//! - Signed session cookie and the `AuthedAccount` extractor

pub mod accounts;
pub mod extractors;
pub mod flow;
pub mod handlers;
pub mod models;
pub mod provider;
pub mod routes;
pub mod state_store;
pub mod token;

#[cfg(test)]
mod tests;

pub use routes::auth_routes;
