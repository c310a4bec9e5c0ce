//! Local processing stages
//!
//! Deduplication, secret redaction and grouping. Each stage is a pure
//! function of its input and preserves command order.

pub mod dedup;
pub mod intent;
pub mod patterns;
pub mod pipeline;
pub mod sanitizer;

#[cfg(test)]
#[path = "sanitizer.test.rs"]
mod sanitizer_test;

pub use intent::{CommandGroup, Workflow, extract_tool};
pub use patterns::PatternSpec;
pub use pipeline::{Pipeline, PipelineOutput};
pub use sanitizer::Sanitizer;
