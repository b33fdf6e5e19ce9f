pub mod api;
pub mod config;
pub mod readiness;
pub mod request;
