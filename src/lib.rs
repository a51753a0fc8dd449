// Journal Gateway - authenticated client for the Journal blog API

pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod gateway;
pub mod models;
pub mod transport;
