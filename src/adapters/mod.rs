//! Adapters for external systems.

pub mod http;
pub mod index;
pub mod models;
