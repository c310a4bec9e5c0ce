//! Removal of redundant commands
//!
//! Collapses repeated, corrected and superseded commands while keeping
//! repetitions that were clearly intentional.

use chrono::Duration;

use crate::history::Entry;

/// Largest length difference still considered a typo correction
const MAX_TYPO_LENGTH_DIFF: usize = 5;
const MIN_TYPO_EDITS: usize = 2;
const MAX_TYPO_EDITS: usize = 5;

/// Removes duplicate and redundant commands from an entry sequence
#[derive(Debug, Clone)]
pub struct Deduplicator {
    /// Repeats further apart than this are treated as intentional
    time_gap: Duration,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self {
            time_gap: Duration::seconds(30),
        }
    }

    pub fn with_time_gap(time_gap: Duration) -> Self {
        Self { time_gap }
    }

    /// Deduplicate `entries` in a single forward pass.
    ///
    /// The output is an order-preserving subsequence of the input and is never
    /// longer than it.
    pub fn process(&self, entries: &[Entry]) -> Vec<Entry> {
        let mut result: Vec<Entry> = Vec::with_capacity(entries.len());

        for (i, entry) in entries.iter().enumerate() {
            if entry.command.trim().is_empty() {
                continue;
            }

            let Some(prev) = result.last_mut() else {
                result.push(entry.clone());
                continue;
            };

            if is_exact_duplicate(prev, entry) {
                if self.has_significant_gap(prev, entry) {
                    result.push(entry.clone());
                } else {
                    *prev = entry.clone();
                }
                continue;
            }

            if is_typo_correction(&prev.command, &entry.command)
                || should_collapse(&prev.command, &entry.command)
            {
                *prev = entry.clone();
                continue;
            }

            // The next command fixes this one; let it take this slot instead
            if let Some(next) = entries.get(i + 1) {
                if is_typo_correction(&entry.command, &next.command) {
                    continue;
                }
            }

            result.push(entry.clone());
        }

        tracing::debug!(
            input = entries.len(),
            output = result.len(),
            "deduplicated commands"
        );

        result
    }

    fn has_significant_gap(&self, earlier: &Entry, later: &Entry) -> bool {
        later
            .elapsed_since(earlier)
            .is_some_and(|elapsed| elapsed > self.time_gap)
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new()
    }
}

fn is_exact_duplicate(a: &Entry, b: &Entry) -> bool {
    a.command.trim() == b.command.trim()
}

/// Whether `b` is a minor edit of `a`.
///
/// Short commands may differ by two edits; longer ones by one edit per ten
/// characters, capped at five. Identical commands are not corrections.
pub fn is_typo_correction(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();

    let len_a = a.chars().count();
    let len_b = b.chars().count();
    if len_a.abs_diff(len_b) > MAX_TYPO_LENGTH_DIFF {
        return false;
    }

    let threshold = (len_a.max(len_b) / 10).clamp(MIN_TYPO_EDITS, MAX_TYPO_EDITS);
    let distance = edit_distance(a, b);

    distance > 0 && distance <= threshold
}

/// Whether two consecutive commands collapse into the later one
fn should_collapse(a: &str, b: &str) -> bool {
    let a = a.trim();
    let b = b.trim();

    if a.starts_with("cd ") && b.starts_with("cd ") {
        return true;
    }

    match (exported_variable(a), exported_variable(b)) {
        (Some(var_a), Some(var_b)) => var_a == var_b,
        _ => false,
    }
}

/// Variable name assigned by an `export NAME=value` command
fn exported_variable(command: &str) -> Option<&str> {
    let assignment = command.strip_prefix("export ")?;
    let name = assignment.split('=').next()?.trim();
    (!name.is_empty()).then_some(name)
}

/// Calculate edit distance between two strings (Levenshtein distance)
pub fn edit_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len1 = s1_chars.len();
    let len2 = s2_chars.len();

    let mut matrix = vec![vec![0; len2 + 1]; len1 + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=len2 {
        matrix[0][j] = j;
    }

    for i in 1..=len1 {
        for j in 1..=len2 {
            let cost = if s1_chars[i - 1] == s2_chars[j - 1] { 0 } else { 1 };
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[len1][len2]
}
