use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt::Write;
use std::path::Path;

use crate::processor::{CommandGroup, extract_tool};

/// Configuration for markdown output generation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarkdownConfig {
    /// Write an `# HH:MM:SS` comment above commands that carry a timestamp
    pub include_timestamps: bool,
    /// Include the overview section
    pub include_overview: bool,
    /// Include the prerequisites section
    pub include_prerequisites: bool,
    /// Include the `**Why:**` line under each step
    pub include_why: bool,
    /// Include the trailing notes section
    pub include_notes: bool,
    /// Code block language for syntax highlighting
    pub code_language: String,
    /// chrono format string for the generation time
    pub date_format: String,
}

impl Default for MarkdownConfig {
    fn default() -> Self {
        Self {
            include_timestamps: false,
            include_overview: true,
            include_prerequisites: true,
            include_why: true,
            include_notes: true,
            code_language: "bash".to_string(),
            date_format: "%Y-%m-%d %H:%M:%S".to_string(),
        }
    }
}

/// Everything a runbook is rendered from
#[derive(Debug, Clone)]
pub struct RunbookData {
    pub title: String,
    pub generated: DateTime<Local>,
    /// Free-form description of the history range, e.g. `commands #10 to #42`
    pub time_range: Option<String>,
    pub groups: Vec<CommandGroup>,
    pub redacted_count: usize,
    /// Overview written by an enhancer; replaces the generated summary
    pub ai_overview: Option<String>,
    /// Prerequisites from an enhancer; replace the inferred list
    pub ai_prerequisites: Vec<String>,
}

impl RunbookData {
    pub fn new(title: impl Into<String>, groups: Vec<CommandGroup>) -> Self {
        Self {
            title: title.into(),
            generated: Local::now(),
            time_range: None,
            groups,
            redacted_count: 0,
            ai_overview: None,
            ai_prerequisites: Vec::new(),
        }
    }

    pub fn command_count(&self) -> usize {
        self.groups.iter().map(|g| g.commands.len()).sum()
    }
}

pub struct MarkdownGenerator {
    config: MarkdownConfig,
}

impl MarkdownGenerator {
    /// Create a new markdown generator with the standard configuration
    pub fn new() -> Self {
        Self::with_config(Self::standard_config())
    }

    pub fn with_config(config: MarkdownConfig) -> Self {
        Self { config }
    }

    pub fn set_config(&mut self, config: MarkdownConfig) {
        self.config = config;
    }

    pub fn get_config(&self) -> &MarkdownConfig {
        &self.config
    }

    /// Every section, no timestamps
    pub fn standard_config() -> MarkdownConfig {
        MarkdownConfig::default()
    }

    /// Title and steps only
    pub fn minimal_config() -> MarkdownConfig {
        MarkdownConfig {
            include_timestamps: false,
            include_overview: false,
            include_prerequisites: false,
            include_why: false,
            include_notes: false,
            ..MarkdownConfig::default()
        }
    }

    /// Render the runbook
    pub fn generate(&self, data: &RunbookData) -> String {
        let mut content = String::new();

        let _ = write!(content, "# {}\n\n", data.title);

        if self.config.include_overview {
            self.write_overview(&mut content, data);
        }
        if self.config.include_prerequisites {
            self.write_prerequisites(&mut content, data);
        }

        content.push_str("## Steps\n\n");
        for (i, group) in data.groups.iter().enumerate() {
            self.write_step(&mut content, i + 1, group);
            content.push('\n');
        }

        if self.config.include_notes {
            self.write_notes(&mut content, data);
        }

        content
    }

    /// Render the runbook into a file readable only by its owner
    pub fn generate_to_file(&self, data: &RunbookData, output_path: &Path) -> Result<()> {
        let content = self.generate(data);
        crate::config::write_private(output_path, content.as_bytes())
            .with_context(|| format!("Failed to write runbook to {}", output_path.display()))?;
        tracing::debug!(path = %output_path.display(), bytes = content.len(), "runbook written");
        Ok(())
    }

    fn write_overview(&self, content: &mut String, data: &RunbookData) {
        content.push_str("## Overview\n\n");
        match data.ai_overview.as_deref().filter(|o| !o.trim().is_empty()) {
            Some(overview) => content.push_str(overview),
            None => content.push_str(&generate_overview(data)),
        }
        content.push_str("\n\n");
    }

    fn write_prerequisites(&self, content: &mut String, data: &RunbookData) {
        let prerequisites = if data.ai_prerequisites.is_empty() {
            infer_prerequisites(&data.groups)
        } else {
            data.ai_prerequisites.clone()
        };
        if prerequisites.is_empty() {
            return;
        }

        content.push_str("## Prerequisites\n\n");
        for prerequisite in &prerequisites {
            let _ = writeln!(content, "- {}", prerequisite);
        }
        content.push('\n');
    }

    fn write_step(&self, content: &mut String, number: usize, group: &CommandGroup) {
        let _ = write!(content, "### Step {}: {}\n\n", number, group.title);

        if !group.description.is_empty() {
            content.push_str(&group.description);
            content.push_str("\n\n");
        }

        let _ = writeln!(content, "```{}", self.config.code_language);
        for entry in &group.commands {
            if self.config.include_timestamps {
                if let Some(timestamp) = entry.timestamp {
                    let _ = writeln!(content, "# {}", timestamp.with_timezone(&Local).format("%H:%M:%S"));
                }
            }
            content.push_str(&entry.command);
            content.push('\n');
        }
        content.push_str("```\n");

        if self.config.include_why {
            if let Some(intent) = group.intent.as_deref().filter(|i| !i.is_empty()) {
                let _ = writeln!(content, "\n**Why:** {}", describe_intent(intent));
            }
        }
    }

    fn write_notes(&self, content: &mut String, data: &RunbookData) {
        content.push_str("## Notes\n\n");
        let _ = writeln!(
            content,
            "- Generated from shell history on {}",
            data.generated.format(&self.config.date_format)
        );
        if let Some(range) = &data.time_range {
            let _ = writeln!(content, "- Time range: {}", range);
        }
        if data.redacted_count > 0 {
            let _ = writeln!(content, "- Commands sanitized: {}", data.redacted_count);
        }
    }
}

impl Default for MarkdownGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary of the intents covered and the size of the runbook
fn generate_overview(data: &RunbookData) -> String {
    if data.groups.is_empty() {
        return "This runbook contains no commands.".to_string();
    }

    let mut seen = HashSet::new();
    let intents: Vec<String> = data
        .groups
        .iter()
        .filter_map(|g| g.intent.as_deref())
        .filter(|intent| !intent.is_empty() && seen.insert(*intent))
        .map(format_intent)
        .collect();

    let mut parts = Vec::new();
    if !intents.is_empty() {
        parts.push(format!("This runbook covers: {}.", intents.join(", ")));
    }
    parts.push(format!(
        "It contains {} steps with {} commands total.",
        data.groups.len(),
        data.command_count()
    ));

    parts.join(" ")
}

const PREREQUISITES: &[(&str, &str)] = &[
    ("git", "Git CLI installed"),
    ("docker", "Docker installed and running"),
    ("docker-compose", "Docker Compose installed"),
    ("kubectl", "kubectl installed with cluster access configured"),
    ("helm", "Helm CLI installed"),
    ("terraform", "Terraform CLI installed"),
    ("aws", "AWS CLI installed and configured"),
    ("gcloud", "Google Cloud SDK installed and configured"),
    ("az", "Azure CLI installed and configured"),
    ("npm", "Node.js and npm installed"),
    ("yarn", "Yarn package manager installed"),
    ("go", "Go toolchain installed"),
    ("python", "Python installed"),
    ("python3", "Python 3 installed"),
    ("pip", "pip package manager installed"),
    ("pip3", "pip3 package manager installed"),
    ("ssh", "SSH client and appropriate key access"),
    ("scp", "SSH/SCP access to remote hosts"),
    ("mysql", "MySQL client installed with database access"),
    ("psql", "PostgreSQL client installed with database access"),
    ("redis-cli", "Redis CLI installed with server access"),
    ("mongosh", "MongoDB shell installed with database access"),
    ("make", "Make build tool installed"),
    ("cargo", "Rust toolchain installed"),
    ("bundle", "Ruby and Bundler installed"),
    ("rails", "Ruby on Rails installed"),
    ("composer", "PHP Composer installed"),
];

/// Tools the runbook relies on, in the order they first appear
pub fn infer_prerequisites(groups: &[CommandGroup]) -> Vec<String> {
    let mut prerequisites: Vec<String> = Vec::new();

    for entry in groups.iter().flat_map(|g| &g.commands) {
        let tool = extract_tool(&entry.command);
        let Some((_, prerequisite)) = PREREQUISITES.iter().find(|(name, _)| *name == tool) else {
            continue;
        };
        if !prerequisites.iter().any(|p| p == prerequisite) {
            prerequisites.push(prerequisite.to_string());
        }
    }

    prerequisites
}

const INTENT_LABELS: &[(&str, &str)] = &[
    ("git-commit", "Git version control"),
    ("git-branch", "Git branching"),
    ("git-sync", "Git synchronization"),
    ("docker-build", "Docker image building"),
    ("docker-run", "Docker container management"),
    ("docker-compose", "Docker Compose orchestration"),
    ("npm-build", "Node.js build process"),
    ("npm-dev", "Node.js development"),
    ("go-build", "Go compilation"),
    ("go-mod", "Go module management"),
    ("python-venv", "Python environment setup"),
    ("kubectl-deploy", "Kubernetes deployment"),
    ("kubectl-debug", "Kubernetes debugging"),
    ("terraform", "Infrastructure provisioning"),
    ("ssh-scp", "Remote operations"),
];

fn intent_label(intent: &str) -> Option<&'static str> {
    INTENT_LABELS
        .iter()
        .find(|(name, _)| *name == intent)
        .map(|(_, label)| *label)
}

/// Readable label for a workflow name; unknown names get hyphens turned into spaces
pub fn format_intent(intent: &str) -> String {
    intent_label(intent)
        .map(str::to_string)
        .unwrap_or_else(|| intent.replace('-', " "))
}

// Enhancers replace the intent with a sentence, which is shown as written.
fn describe_intent(intent: &str) -> String {
    intent_label(intent).unwrap_or(intent).to_string()
}
