//! HTTP API: routing, auth, request/response mapping and service wiring.

pub mod app;
pub mod authz;
pub mod context;
pub mod middleware;
