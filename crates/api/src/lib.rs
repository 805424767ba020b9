//! Plot builder API server library.
//!
//! Exposes the building blocks (config, state, error handling, routes,
//! router) so the binary entrypoint and the integration tests share them.

pub mod config;
pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
pub mod routes;
pub mod state;
