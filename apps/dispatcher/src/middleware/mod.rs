//! HTTP middleware for the dispatcher.

pub mod auth;

pub use auth::require_api_key;
