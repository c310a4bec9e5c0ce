pub mod markdown;

#[cfg(test)]
#[path = "markdown.test.rs"]
mod markdown_test;

pub use markdown::{MarkdownGenerator, RunbookData};

/// Generator for a preset name; anything unknown gets the standard layout
pub fn generator_for(template: &str) -> MarkdownGenerator {
    match template.to_lowercase().as_str() {
        "minimal" => MarkdownGenerator::with_config(MarkdownGenerator::minimal_config()),
        _ => MarkdownGenerator::new(),
    }
}
