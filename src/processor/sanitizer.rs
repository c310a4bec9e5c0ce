//! Secret redaction
//!
//! Applies the ordered rule table from [`super::patterns`] to every command.
//! The sanitizer is best effort: a secret in a format no rule anticipates
//! passes through silently, so an empty redaction list does not prove a
//! command is clean.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::patterns::{Pattern, PatternError, PatternSpec, default_patterns};
use crate::history::Entry;

/// Text returned by [`Sanitizer::sanitize_text`] for commands a removal rule matches
pub const REMOVED_COMMAND_PLACEHOLDER: &str = "[REDACTED - contains sensitive data]";

/// Record of one rule applied to one entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Redaction {
    pub sequence_number: usize,
    pub pattern_name: String,
    /// The command before sanitizing; only kept in strict mode
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_text: Option<String>,
}

/// Result of sanitizing a batch of entries
#[derive(Debug, Clone, Default)]
pub struct SanitizedEntries {
    pub entries: Vec<Entry>,
    pub redactions: Vec<Redaction>,
}

/// Builds a [`Sanitizer`] with a frozen, validated rule table
#[derive(Debug, Default)]
pub struct SanitizerBuilder {
    include_defaults: bool,
    extra: Vec<PatternSpec>,
    strict_mode: bool,
}

impl SanitizerBuilder {
    /// Append rules after those already configured
    pub fn patterns(mut self, specs: impl IntoIterator<Item = PatternSpec>) -> Self {
        self.extra.extend(specs);
        self
    }

    /// Keep original command text in redaction records for review
    pub fn strict_mode(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Compile every rule; any invalid matcher or repeated name fails here,
    /// before a single entry is processed
    pub fn build(self) -> Result<Sanitizer, PatternError> {
        let mut patterns = if self.include_defaults { default_patterns()? } else { Vec::new() };
        for spec in &self.extra {
            patterns.push(spec.compile()?);
        }

        let mut seen = HashSet::new();
        for pattern in &patterns {
            if !seen.insert(pattern.name()) {
                return Err(PatternError::DuplicateName(pattern.name().to_string()));
            }
        }

        tracing::debug!(rules = patterns.len(), strict = self.strict_mode, "sanitizer ready");

        Ok(Sanitizer {
            patterns,
            strict_mode: self.strict_mode,
        })
    }
}

/// Removes or masks sensitive values in commands
#[derive(Debug, Clone)]
pub struct Sanitizer {
    patterns: Vec<Pattern>,
    strict_mode: bool,
}

impl Sanitizer {
    /// Sanitizer with the built-in rule table, non-strict
    pub fn new() -> Result<Self, PatternError> {
        Self::builder().build()
    }

    /// Builder preloaded with the built-in rule table
    pub fn builder() -> SanitizerBuilder {
        SanitizerBuilder {
            include_defaults: true,
            ..SanitizerBuilder::default()
        }
    }

    /// Sanitize every entry, dropping those a removal rule matches
    pub fn process(&self, entries: &[Entry]) -> SanitizedEntries {
        let mut result = SanitizedEntries::default();

        for entry in entries {
            let (sanitized, redactions) = self.sanitize_entry(entry);
            if let Some(sanitized) = sanitized {
                result.entries.push(sanitized);
            }
            result.redactions.extend(redactions);
        }

        tracing::debug!(
            input = entries.len(),
            output = result.entries.len(),
            redactions = result.redactions.len(),
            "sanitized commands"
        );

        result
    }

    fn sanitize_entry(&self, entry: &Entry) -> (Option<Entry>, Vec<Redaction>) {
        let mut redactions = Vec::new();
        let mut command = entry.command.clone();

        for pattern in &self.patterns {
            if !pattern.is_match(&command) {
                continue;
            }

            if pattern.is_full_remove() {
                // Earlier masks are moot once the whole command goes
                return (None, vec![self.redaction(entry, pattern)]);
            }

            let replaced = pattern.apply(&command);
            if replaced != command {
                redactions.push(self.redaction(entry, pattern));
                command = replaced;
            }
        }

        if redactions.is_empty() {
            (Some(entry.clone()), redactions)
        } else {
            (Some(entry.with_command(command)), redactions)
        }
    }

    fn redaction(&self, entry: &Entry, pattern: &Pattern) -> Redaction {
        Redaction {
            sequence_number: entry.sequence_number,
            pattern_name: pattern.name().to_string(),
            original_text: self.strict_mode.then(|| entry.command.clone()),
        }
    }

    /// Sanitize a single command string.
    ///
    /// Commands that a removal rule matches come back as
    /// [`REMOVED_COMMAND_PLACEHOLDER`]. Sanitizing the output again is a no-op.
    pub fn sanitize_text(&self, command: &str) -> String {
        let mut text = command.to_string();
        for pattern in &self.patterns {
            if !pattern.is_match(&text) {
                continue;
            }
            if pattern.is_full_remove() {
                return REMOVED_COMMAND_PLACEHOLDER.to_string();
            }
            text = pattern.apply(&text);
        }
        text
    }
}
