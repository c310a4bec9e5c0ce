//! Unit tests for history extraction

use super::extractor::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn write_history(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn zsh_extractor(file: &NamedTempFile) -> HistoryExtractor {
    HistoryExtractor::new(file.path(), ShellType::Zsh).unwrap()
}

#[cfg(test)]
mod zsh_tests {
    use super::*;

    #[test]
    fn test_extract_command_number_range() {
        let file = write_history(
            ": 1699000000:0;first\n\
             : 1699000010:0;second\n\
             : 1699000020:0;third\n\
             : 1699000030:0;fourth\n\
             : 1699000040:0;fifth\n",
        );

        let entries = zsh_extractor(&file).extract(2, 4).unwrap();

        let numbered: Vec<(usize, &str)> = entries
            .iter()
            .map(|e| (e.sequence_number, e.command.as_str()))
            .collect();
        assert_eq!(numbered, vec![(2, "second"), (3, "third"), (4, "fourth")]);
        assert!(entries.iter().all(|e| e.timestamp.is_some()));
        assert_eq!(entries[0].timestamp.unwrap().timestamp(), 1_699_000_010);
    }

    #[test]
    fn test_skips_continuation_and_blank_lines() {
        let file = write_history(
            ": 1699000000:0;first\n\
             : 1699000010:0;multi-line\\\n\
             continuation here\n\
             : 1699000020:0;third\n\
             \n\
             : 1699000030:0;fourth\n",
        );

        let entries = zsh_extractor(&file).extract(1, 10).unwrap();

        let commands: Vec<&str> = entries.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["first", "multi-line\\", "third", "fourth"]);
        let numbers: Vec<usize> = entries.iter().map(|e| e.sequence_number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_invalid_range() {
        let file = write_history(": 1699000000:0;first\n");
        let err = zsh_extractor(&file).extract(5, 2).unwrap_err();
        assert!(matches!(err, HistoryError::InvalidRange { from: 5, to: 2 }));
    }

    #[test]
    fn test_range_past_end_is_empty_result() {
        let file = write_history(": 1699000000:0;first\n: 1699000010:0;second\n");
        let err = zsh_extractor(&file).extract(10, 20).unwrap_err();
        assert!(matches!(err, HistoryError::EmptyResult { .. }));
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = HistoryExtractor::new(dir.path().join("nope"), ShellType::Zsh).unwrap_err();
        assert!(matches!(err, HistoryError::NotFound(_)));
        assert!(err.to_string().contains("history file not found"));
    }

    #[test]
    fn test_command_containing_semicolons_and_colons() {
        let raw = parse_history(": 1699000000:3;echo a; echo b:c\n", &ShellType::Zsh);
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].command, "echo a; echo b:c");
    }

    #[test]
    fn test_malformed_prefix_is_not_a_command() {
        let raw = parse_history(": abc:0;ls\n: 1699000000:x;pwd\n", &ShellType::Zsh);
        assert!(raw.is_empty());
    }
}

#[cfg(test)]
mod bash_tests {
    use super::*;

    #[test]
    fn test_plain_bash_history_has_no_timestamps() {
        let raw = parse_history("ls -la\n\ngit status\n", &ShellType::Bash);
        assert_eq!(raw.len(), 2);
        assert!(raw.iter().all(|r| r.timestamp.is_none()));
    }

    #[test]
    fn test_bash_epoch_comments_attach_to_next_command() {
        let raw = parse_history("#1699000000\nls -la\ngit status\n#1699000100\npwd\n", &ShellType::Bash);

        assert_eq!(raw.len(), 3);
        assert_eq!(raw[0].timestamp.unwrap().timestamp(), 1_699_000_000);
        assert!(raw[1].timestamp.is_none());
        assert_eq!(raw[2].timestamp.unwrap().timestamp(), 1_699_000_100);
    }

    #[test]
    fn test_bash_comment_commands_are_kept() {
        let raw = parse_history("# just a note\nls\n", &ShellType::Bash);
        assert_eq!(raw.len(), 2);
        assert_eq!(raw[0].command, "# just a note");
    }
}


#[cfg(test)]
mod shell_type_tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_shell_from_path() {
        assert_eq!(ShellType::from_name("/usr/bin/zsh"), ShellType::Zsh);
        assert_eq!(ShellType::from_name("/bin/bash"), ShellType::Bash);
        assert_eq!(ShellType::from_name("fish"), ShellType::Fish);
        assert_eq!(ShellType::from_name("tcsh").name(), "tcsh");
    }

    #[test]
    fn test_shell_history_file_paths() {
        let home = Path::new("/home/user");
        for shell in [ShellType::Bash, ShellType::Zsh, ShellType::Fish] {
            let path = shell.history_file(home).unwrap();
            assert!(path.to_string_lossy().contains("history"));
        }
        assert!(ShellType::Unknown("tcsh".into()).history_file(home).is_none());
    }
}
