use super::markdown::{format_intent, infer_prerequisites};
use super::*;
use crate::history::Entry;
use crate::processor::CommandGroup;
use chrono::{Local, TimeZone, Utc};

fn group(title: &str, intent: Option<&str>, commands: &[(usize, &str)]) -> CommandGroup {
    CommandGroup {
        title: title.to_string(),
        description: String::new(),
        commands: commands.iter().map(|(n, cmd)| Entry::new(*n, *cmd)).collect(),
        intent: intent.map(str::to_string),
    }
}

fn create_test_runbook() -> RunbookData {
    let mut data = RunbookData::new(
        "Deploy the API",
        vec![
            group(
                "Commit and push changes",
                Some("git-commit"),
                &[(10, "git add ."), (11, "git commit -m 'bump'"), (12, "git push")],
            ),
            group(
                "Build and publish container image",
                Some("docker-build"),
                &[(13, "docker build -t api ."), (14, "docker push api")],
            ),
            group("File system operations", None, &[(15, "ls -la")]),
        ],
    );
    data.generated = Local.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
    data.time_range = Some("commands #10 to #15".to_string());
    data.redacted_count = 2;
    data
}

#[test]
fn test_markdown_generator_creation() {
    let generator = MarkdownGenerator::new();
    let config = generator.get_config();

    assert!(config.include_overview);
    assert!(config.include_prerequisites);
    assert!(config.include_notes);
    assert!(!config.include_timestamps);
    assert_eq!(config.code_language, "bash");
}

#[test]
fn test_standard_layout() {
    let markdown = MarkdownGenerator::new().generate(&create_test_runbook());

    assert!(markdown.starts_with("# Deploy the API\n\n## Overview\n\n"));
    assert!(markdown.contains(
        "This runbook covers: Git version control, Docker image building. It contains 3 steps with 6 commands total."
    ));
    assert!(markdown.contains(
        "## Prerequisites\n\n- Git CLI installed\n- Docker installed and running\n\n## Steps\n\n"
    ));
    assert!(markdown.contains(
        "### Step 1: Commit and push changes\n\n```bash\ngit add .\ngit commit -m 'bump'\ngit push\n```\n\n**Why:** Git version control\n"
    ));
    assert!(markdown.contains("### Step 3: File system operations\n\n```bash\nls -la\n```\n\n## Notes"));
    assert!(markdown.ends_with(
        "## Notes\n\n- Generated from shell history on 2024-03-01 09:30:00\n- Time range: commands #10 to #15\n- Commands sanitized: 2\n"
    ));
}

#[test]
fn test_sections_appear_in_order() {
    let markdown = MarkdownGenerator::new().generate(&create_test_runbook());

    let positions: Vec<usize> = ["## Overview", "## Prerequisites", "## Steps", "## Notes"]
        .iter()
        .map(|heading| markdown.find(heading).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn test_minimal_layout() {
    let generator = MarkdownGenerator::with_config(MarkdownGenerator::minimal_config());
    let markdown = generator.generate(&create_test_runbook());

    assert!(markdown.starts_with("# Deploy the API\n\n## Steps\n\n### Step 1"));
    assert!(!markdown.contains("## Overview"));
    assert!(!markdown.contains("## Prerequisites"));
    assert!(!markdown.contains("**Why:**"));
    assert!(!markdown.contains("## Notes"));
}

#[test]
fn test_empty_runbook() {
    let data = RunbookData::new("Nothing", Vec::new());
    let markdown = MarkdownGenerator::new().generate(&data);

    assert!(markdown.contains("## Overview\n\nThis runbook contains no commands.\n\n"));
    assert!(!markdown.contains("## Prerequisites"));
    assert!(markdown.contains("## Steps\n\n## Notes"));
    assert!(!markdown.contains("Commands sanitized"));
    assert!(!markdown.contains("Time range"));
}

#[test]
fn test_ai_content_replaces_generated_sections() {
    let mut data = create_test_runbook();
    data.ai_overview = Some("Ships a new API release.".to_string());
    data.ai_prerequisites = vec!["Push access to the registry".to_string()];
    data.groups[0].description = "Stage and publish the version bump.".to_string();
    data.groups[0].intent = Some("The release is built from the pushed commit.".to_string());

    let markdown = MarkdownGenerator::new().generate(&data);

    assert!(markdown.contains("## Overview\n\nShips a new API release.\n\n"));
    assert!(!markdown.contains("This runbook covers"));
    assert!(markdown.contains("## Prerequisites\n\n- Push access to the registry\n\n"));
    assert!(!markdown.contains("Git CLI installed"));
    assert!(markdown.contains(
        "### Step 1: Commit and push changes\n\nStage and publish the version bump.\n\n```bash\n"
    ));
    assert!(markdown.contains("**Why:** The release is built from the pushed commit.\n"));
}

#[test]
fn test_blank_ai_overview_falls_back() {
    let mut data = create_test_runbook();
    data.ai_overview = Some("  ".to_string());

    let markdown = MarkdownGenerator::new().generate(&data);
    assert!(markdown.contains("This runbook covers:"));
}

#[test]
fn test_timestamps_only_for_timed_commands() {
    let at = Utc.with_ymd_and_hms(2024, 3, 1, 14, 5, 9).unwrap();
    let data = RunbookData::new(
        "Timed",
        vec![CommandGroup {
            title: "Git operations".to_string(),
            description: String::new(),
            commands: vec![Entry::with_timestamp(1, "git status", at), Entry::new(2, "git log")],
            intent: None,
        }],
    );

    let mut config = MarkdownGenerator::standard_config();
    config.include_timestamps = true;
    let markdown = MarkdownGenerator::with_config(config).generate(&data);

    let expected = format!(
        "```bash\n# {}\ngit status\ngit log\n```",
        at.with_timezone(&Local).format("%H:%M:%S")
    );
    assert!(markdown.contains(&expected));

    let plain = MarkdownGenerator::new().generate(&data);
    assert!(plain.contains("```bash\ngit status\ngit log\n```"));
}

#[test]
fn test_custom_code_language() {
    let mut config = MarkdownGenerator::standard_config();
    config.code_language = "shell".to_string();

    let markdown = MarkdownGenerator::with_config(config).generate(&create_test_runbook());
    assert!(markdown.contains("```shell\ngit add ."));
    assert!(!markdown.contains("```bash"));
}

#[test]
fn test_infer_prerequisites_first_seen_order() {
    let groups = vec![
        group("Remote", None, &[(1, "ssh deploy@host"), (2, "sudo docker ps")]),
        group("More", None, &[(3, "ssh other@host"), (4, "kubectl get pods"), (5, "vim notes")]),
    ];

    assert_eq!(
        infer_prerequisites(&groups),
        vec![
            "SSH client and appropriate key access",
            "Docker installed and running",
            "kubectl installed with cluster access configured",
        ]
    );
}

#[test]
fn test_format_intent() {
    assert_eq!(format_intent("kubectl-deploy"), "Kubernetes deployment");
    assert_eq!(format_intent("ssh-scp"), "Remote operations");
    assert_eq!(format_intent("db-migrate"), "db migrate");
}

#[test]
fn test_generate_to_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("runbook.md");

    generator_for("minimal").generate_to_file(&create_test_runbook(), &path).unwrap();

    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.starts_with("# Deploy the API\n\n## Steps"));

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}

#[test]
fn test_unknown_template_uses_standard_layout() {
    assert_eq!(generator_for("fancy").get_config(), &MarkdownGenerator::standard_config());
    assert_eq!(generator_for("MINIMAL").get_config(), &MarkdownGenerator::minimal_config());
}
