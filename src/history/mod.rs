//! Shell history extraction
//!
//! Reads a shell history file and turns the commands in a numbered range into
//! [`Entry`] values for the processing pipeline.

pub mod entry;
pub mod extractor;

#[cfg(test)]
#[path = "extractor.test.rs"]
mod extractor_test;

pub use entry::Entry;
pub use extractor::{HistoryExtractor, ShellType};
