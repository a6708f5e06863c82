//! CLI command implementations.

pub mod ask;
pub mod config;
pub mod generate;
pub mod health;
pub mod serve;
pub mod workspace;
