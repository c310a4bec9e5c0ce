pub mod client;
pub mod config;
pub mod enhance;
pub mod error_handler;
pub mod prompt;

pub use client::{LlmClient, LlmProvider};
pub use config::LlmConfig;
pub use enhance::{CommandEnhancer, LlmEnhancer};
pub use error_handler::LlmError;
