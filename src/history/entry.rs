use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One command taken from shell history.
///
/// Entries are never mutated once created; stages that change the command
/// text build a new value with [`Entry::with_command`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    /// Position in the history file, matching the shell's `history` numbering
    pub sequence_number: usize,
    /// When the command ran, if the history format recorded it
    pub timestamp: Option<DateTime<Utc>>,
    pub command: String,
}

impl Entry {
    pub fn new(sequence_number: usize, command: impl Into<String>) -> Self {
        Self {
            sequence_number,
            timestamp: None,
            command: command.into(),
        }
    }

    #[cfg(test)]
    pub fn with_timestamp(sequence_number: usize, command: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            sequence_number,
            timestamp: Some(timestamp),
            command: command.into(),
        }
    }

    /// Copy of this entry carrying different command text
    pub fn with_command(&self, command: impl Into<String>) -> Self {
        Self {
            sequence_number: self.sequence_number,
            timestamp: self.timestamp,
            command: command.into(),
        }
    }

    /// Time elapsed from `earlier` to this entry, when both carry timestamps
    pub fn elapsed_since(&self, earlier: &Entry) -> Option<chrono::Duration> {
        match (earlier.timestamp, self.timestamp) {
            (Some(start), Some(end)) => Some(end.signed_duration_since(start)),
            _ => None,
        }
    }
}
