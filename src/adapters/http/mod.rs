//! HTTP surface.

pub mod server;

pub use server::{HttpServer, HttpServerConfig};
