//! Language model adapters.

pub mod ollama;
pub mod scripted;

pub use ollama::OllamaModelClient;
pub use scripted::{RecordedCall, ScriptStep, ScriptedModelClient};
