//! Shared types for the companion service.
//!
//! `models` are the domain records handed out over the API, `api` holds the
//! request bodies and token claims. Both serialize with camelCase field names
//! to match the web client.

pub mod api;
pub mod models;
