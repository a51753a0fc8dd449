// Typed surface over the gateway
// Thin request/response wrappers; all refresh mechanics stay in the gateway

pub mod auth;
pub mod posts;
