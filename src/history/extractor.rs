use chrono::{DateTime, Utc};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use super::entry::Entry;

/// Errors raised while locating or reading shell history
#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("history file not found at {}", .0.display())]
    NotFound(PathBuf),

    #[error("cannot determine the home directory")]
    NoHomeDirectory,

    #[error("invalid range: 'from' ({from}) must be less than or equal to 'to' ({to})")]
    InvalidRange { from: usize, to: usize },

    #[error("no commands found between #{from} and #{to}")]
    EmptyResult { from: usize, to: usize },

    #[error("cannot read history file {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ShellType {
    Bash,
    Zsh,
    Fish,
    Unknown(String),
}

impl ShellType {
    pub fn detect() -> Self {
        match env::var("SHELL") {
            Ok(shell) => Self::from_name(&shell),
            Err(_) => ShellType::Unknown("unknown".to_string()),
        }
    }

    /// Resolve a shell from a name or a path such as `/usr/bin/zsh`
    pub fn from_name(name: &str) -> Self {
        if name.contains("bash") {
            ShellType::Bash
        } else if name.contains("zsh") {
            ShellType::Zsh
        } else if name.contains("fish") {
            ShellType::Fish
        } else {
            ShellType::Unknown(name.to_string())
        }
    }

    pub fn name(&self) -> &str {
        match self {
            ShellType::Bash => "bash",
            ShellType::Zsh => "zsh",
            ShellType::Fish => "fish",
            ShellType::Unknown(name) => name,
        }
    }

    /// Default history file location relative to `home`
    pub fn history_file(&self, home: &Path) -> Option<PathBuf> {
        match self {
            ShellType::Bash => Some(home.join(".bash_history")),
            ShellType::Zsh => Some(home.join(".zsh_history")),
            ShellType::Fish => Some(home.join(".local/share/fish/fish_history")),
            ShellType::Unknown(_) => None,
        }
    }
}

/// A command read from history before it is numbered
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RawCommand {
    pub timestamp: Option<DateTime<Utc>>,
    pub command: String,
}

/// Reads numbered command ranges out of a shell history file
#[derive(Debug, Clone)]
pub struct HistoryExtractor {
    path: PathBuf,
    shell: ShellType,
}

impl HistoryExtractor {
    /// Use an explicit history file; the file must exist
    pub fn new(path: impl Into<PathBuf>, shell: ShellType) -> Result<Self, HistoryError> {
        let path = path.into();
        if !path.exists() {
            return Err(HistoryError::NotFound(path));
        }
        Ok(Self { path, shell })
    }

    /// Locate the history file for the current shell.
    ///
    /// `$HISTFILE` wins when set; otherwise the shell's default file under the
    /// home directory is used, falling back to zsh for unrecognised shells.
    pub fn detect() -> Result<Self, HistoryError> {
        let shell = match ShellType::detect() {
            ShellType::Unknown(_) => ShellType::Zsh,
            known => known,
        };

        if let Ok(histfile) = env::var("HISTFILE") {
            if !histfile.trim().is_empty() {
                return Self::new(histfile, shell);
            }
        }

        let home = dirs::home_dir().ok_or(HistoryError::NoHomeDirectory)?;
        let path = shell
            .history_file(&home)
            .unwrap_or_else(|| home.join(".zsh_history"));
        Self::new(path, shell)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn shell(&self) -> &ShellType {
        &self.shell
    }

    /// Extract commands numbered `from..=to`.
    ///
    /// Numbers count recognised commands starting at 1, matching the output of
    /// the shell's `history` builtin.
    pub fn extract(&self, from: usize, to: usize) -> Result<Vec<Entry>, HistoryError> {
        if from > to {
            return Err(HistoryError::InvalidRange { from, to });
        }

        let bytes = fs::read(&self.path).map_err(|source| HistoryError::Unreadable {
            path: self.path.clone(),
            source,
        })?;
        // zsh metafies non-ASCII bytes, so decode lossily rather than failing
        let content = String::from_utf8_lossy(&bytes);

        let entries: Vec<Entry> = parse_history(&content, &self.shell)
            .into_iter()
            .enumerate()
            .map(|(index, raw)| (index + 1, raw))
            .skip_while(|(number, _)| *number < from)
            .take_while(|(number, _)| *number <= to)
            .map(|(number, raw)| Entry {
                sequence_number: number,
                timestamp: raw.timestamp,
                command: raw.command,
            })
            .collect();

        tracing::debug!(
            path = %self.path.display(),
            shell = self.shell.name(),
            count = entries.len(),
            "extracted history range"
        );

        if entries.is_empty() {
            return Err(HistoryError::EmptyResult { from, to });
        }

        Ok(entries)
    }
}

/// Parse a whole history file in the given shell's format
pub(crate) fn parse_history(content: &str, shell: &ShellType) -> Vec<RawCommand> {
    match shell {
        ShellType::Zsh => content.lines().filter_map(parse_zsh_history_line).collect(),
        ShellType::Fish => parse_fish_history(content),
        ShellType::Bash | ShellType::Unknown(_) => parse_bash_history(content),
    }
}

/// Parse a zsh extended history line (format: `: timestamp:duration;command`).
///
/// Lines that do not follow the format, such as the tail of a multi-line
/// command, are not commands and yield `None`.
fn parse_zsh_history_line(line: &str) -> Option<RawCommand> {
    let rest = line.strip_prefix(": ")?;
    let (timestamp_part, duration_and_command) = rest.split_once(':')?;
    let (duration_part, command) = duration_and_command.split_once(';')?;

    if !is_all_digits(timestamp_part) || !is_all_digits(duration_part) {
        return None;
    }

    Some(RawCommand {
        timestamp: parse_epoch(timestamp_part),
        command: command.to_string(),
    })
}

/// Parse bash history, honouring `#<epoch>` lines written with HISTTIMEFORMAT
fn parse_bash_history(content: &str) -> Vec<RawCommand> {
    let mut commands = Vec::new();
    let mut pending_timestamp = None;

    for line in content.lines() {
        if let Some(epoch) = line.strip_prefix('#') {
            if is_all_digits(epoch) {
                pending_timestamp = parse_epoch(epoch);
                continue;
            }
        }

        if line.trim().is_empty() {
            continue;
        }

        commands.push(RawCommand {
            timestamp: pending_timestamp.take(),
            command: line.to_string(),
        });
    }

    commands
}

/// Parse fish history (format: `- cmd: command` followed by `  when: timestamp`)
fn parse_fish_history(content: &str) -> Vec<RawCommand> {
    let mut commands: Vec<RawCommand> = Vec::new();

    for line in content.lines() {
        if let Some(command) = line.strip_prefix("- cmd: ") {
            commands.push(RawCommand {
                timestamp: None,
                command: command.to_string(),
            });
        } else if let Some(when) = line.trim_start().strip_prefix("when: ") {
            if let Some(last) = commands.last_mut() {
                if last.timestamp.is_none() {
                    last.timestamp = parse_epoch(when.trim());
                }
            }
        }
    }

    commands
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit())
}

fn parse_epoch(s: &str) -> Option<DateTime<Utc>> {
    s.parse::<i64>()
        .ok()
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
}
