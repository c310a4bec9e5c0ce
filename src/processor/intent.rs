//! Grouping of commands into runbook steps
//!
//! Consecutive commands that use related tools, happen close together and
//! serve the same workflow end up in one [`CommandGroup`].

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::LazyLock;

use crate::history::Entry;

/// Leading words that run another command rather than being the tool
const COMMAND_WRAPPERS: &[&str] = &["sudo", "time", "nice", "nohup"];

const TOOL_FAMILIES: &[&[&str]] = &[
    &["git", "gh"],
    &["docker", "docker-compose"],
    &["kubectl", "helm", "k9s"],
    &["npm", "npx", "yarn", "pnpm"],
    &["go", "gofmt", "golangci-lint"],
    &["python", "pip", "python3", "pip3"],
    &["terraform", "tf"],
    &["aws", "awscli"],
    &["gcloud", "gsutil"],
    &["az", "azure"],
];

/// Tool name to family index
static FAMILY_OF: LazyLock<HashMap<&'static str, usize>> = LazyLock::new(|| {
    TOOL_FAMILIES
        .iter()
        .enumerate()
        .flat_map(|(id, tools)| tools.iter().map(move |tool| (*tool, id)))
        .collect()
});

/// A named sequence of commands that usually go together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub name: String,
    /// Command prefixes that identify this workflow, checked in order
    pub prefixes: Vec<String>,
    pub description: String,
}

impl Workflow {
    pub fn new(name: &str, prefixes: &[&str], description: &str) -> Self {
        Self {
            name: name.to_string(),
            prefixes: prefixes.iter().map(|p| p.to_string()).collect(),
            description: description.to_string(),
        }
    }

    pub fn matches(&self, command: &str) -> bool {
        self.prefixes.iter().any(|prefix| command.starts_with(prefix.as_str()))
    }
}

/// Built-in workflows; earlier entries win when prefixes overlap
pub fn default_workflows() -> Vec<Workflow> {
    vec![
        Workflow::new("git-commit", &["git add", "git commit", "git push"], "Commit and push changes"),
        Workflow::new("git-branch", &["git checkout", "git branch", "git switch"], "Branch management"),
        Workflow::new("git-sync", &["git fetch", "git pull", "git merge", "git rebase"], "Sync with remote"),
        Workflow::new("docker-build", &["docker build", "docker tag", "docker push"], "Build and publish container image"),
        Workflow::new("docker-run", &["docker run", "docker exec", "docker logs"], "Run and manage containers"),
        Workflow::new("docker-compose", &["docker-compose", "docker compose"], "Manage multi-container application"),
        Workflow::new("npm-build", &["npm install", "npm run build", "npm test"], "Install dependencies and build"),
        Workflow::new("npm-dev", &["npm install", "npm run dev", "npm start"], "Set up development environment"),
        Workflow::new("go-build", &["go build", "go test", "go run"], "Build and test Go application"),
        Workflow::new("go-mod", &["go mod init", "go mod tidy", "go get"], "Manage Go modules"),
        Workflow::new("python-venv", &["python -m venv", "source", "pip install"], "Set up Python virtual environment"),
        Workflow::new("kubectl-deploy", &["kubectl apply", "kubectl rollout", "kubectl get"], "Deploy to Kubernetes"),
        Workflow::new("kubectl-debug", &["kubectl describe", "kubectl logs", "kubectl exec"], "Debug Kubernetes resources"),
        Workflow::new("terraform", &["terraform init", "terraform plan", "terraform apply"], "Provision infrastructure"),
        Workflow::new("ssh-scp", &["ssh", "scp", "rsync"], "Remote file operations"),
    ]
}

/// A runbook step: contiguous commands sharing a purpose
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandGroup {
    pub title: String,
    pub description: String,
    pub commands: Vec<Entry>,
    /// Workflow name that characterises the group, if any
    pub intent: Option<String>,
}

/// Group being accumulated during analysis
struct OpenGroup {
    commands: Vec<Entry>,
    intent: Option<String>,
}

#[derive(Debug, Clone)]
pub struct IntentAnalyzer {
    workflows: Vec<Workflow>,
    threshold: Duration,
}

impl IntentAnalyzer {
    pub fn new() -> Self {
        Self {
            workflows: default_workflows(),
            threshold: Duration::seconds(60),
        }
    }

    /// Time between commands after which a new step begins
    pub fn with_threshold(mut self, threshold: Duration) -> Self {
        self.threshold = threshold;
        self
    }

    /// Append workflows after the built-in ones
    pub fn with_workflows(mut self, workflows: impl IntoIterator<Item = Workflow>) -> Self {
        self.workflows.extend(workflows);
        self
    }

    /// Partition `entries` into groups.
    ///
    /// Concatenating the commands of the returned groups yields `entries`
    /// exactly, in order.
    pub fn analyze(&self, entries: &[Entry]) -> Vec<CommandGroup> {
        let (mut groups, open) = entries.iter().fold(
            (Vec::<CommandGroup>::new(), None::<OpenGroup>),
            |(mut groups, open), entry| {
                let intent = self.infer_intent(&entry.command).map(str::to_string);

                match open {
                    Some(mut group) if !self.starts_new_group(&group, entry, intent.as_deref()) => {
                        if group.intent.is_none() {
                            group.intent = intent;
                        }
                        group.commands.push(entry.clone());
                        (groups, Some(group))
                    }
                    previous => {
                        if let Some(done) = previous {
                            groups.push(self.finalize_group(done));
                        }
                        let group = OpenGroup {
                            commands: vec![entry.clone()],
                            intent,
                        };
                        (groups, Some(group))
                    }
                }
            },
        );

        if let Some(last) = open {
            groups.push(self.finalize_group(last));
        }

        tracing::debug!(commands = entries.len(), groups = groups.len(), "grouped commands");

        groups
    }

    fn starts_new_group(&self, group: &OpenGroup, entry: &Entry, intent: Option<&str>) -> bool {
        let Some(prev) = group.commands.last() else {
            return true;
        };

        if !are_related_tools(extract_tool(&prev.command), extract_tool(&entry.command)) {
            return true;
        }

        if entry
            .elapsed_since(prev)
            .is_some_and(|elapsed| elapsed > self.threshold)
        {
            return true;
        }

        matches!(&group.intent, Some(current) if Some(current.as_str()) != intent)
    }

    /// Name of the first workflow the command belongs to
    pub fn infer_intent(&self, command: &str) -> Option<&str> {
        self.workflows
            .iter()
            .find(|workflow| workflow.matches(command))
            .map(|workflow| workflow.name.as_str())
    }

    fn finalize_group(&self, group: OpenGroup) -> CommandGroup {
        let workflow_title = group.intent.as_deref().and_then(|intent| {
            self.workflows
                .iter()
                .find(|workflow| workflow.name == intent)
                .map(|workflow| workflow.description.clone())
        });

        let title = workflow_title.unwrap_or_else(|| fallback_title(&group.commands));

        CommandGroup {
            title,
            description: String::new(),
            commands: group.commands,
            intent: group.intent,
        }
    }
}

impl Default for IntentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

/// The program a command runs, looking through wrappers such as `sudo`
pub fn extract_tool(command: &str) -> &str {
    let mut parts = command.split_whitespace().peekable();
    while let Some(part) = parts.next() {
        if !COMMAND_WRAPPERS.contains(&part) || parts.peek().is_none() {
            return part;
        }
    }
    ""
}

/// Whether two tools belong to the same family; every tool is related to itself
pub fn are_related_tools(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }
    match (FAMILY_OF.get(a), FAMILY_OF.get(b)) {
        (Some(fa), Some(fb)) => fa == fb,
        _ => false,
    }
}

/// Title derived from the most used tool; ties go to the tool seen first
fn fallback_title(commands: &[Entry]) -> String {
    if commands.is_empty() {
        return "Commands".to_string();
    }

    let mut counts: Vec<(&str, usize)> = Vec::new();
    for entry in commands {
        let tool = extract_tool(&entry.command);
        if tool.is_empty() {
            continue;
        }
        match counts.iter_mut().find(|(name, _)| *name == tool) {
            Some((_, count)) => *count += 1,
            None => counts.push((tool, 1)),
        }
    }

    let primary = counts
        .iter()
        .fold(None::<(&str, usize)>, |best, &(tool, count)| match best {
            Some((_, best_count)) if best_count >= count => best,
            _ => Some((tool, count)),
        })
        .map(|(tool, _)| tool)
        .unwrap_or("");

    match primary {
        "git" => "Git operations".to_string(),
        "docker" | "docker-compose" => "Docker operations".to_string(),
        "kubectl" | "helm" => "Kubernetes operations".to_string(),
        "npm" | "yarn" | "pnpm" => "Node.js package operations".to_string(),
        "go" => "Go operations".to_string(),
        "python" | "pip" | "python3" => "Python operations".to_string(),
        "terraform" | "tf" => "Terraform operations".to_string(),
        "ssh" | "scp" | "rsync" => "Remote operations".to_string(),
        "curl" | "wget" => "HTTP requests".to_string(),
        "cd" | "ls" | "mkdir" | "rm" | "cp" | "mv" => "File system operations".to_string(),
        "" => "Shell commands".to_string(),
        other => format!("{other} operations"),
    }
}
