//! AI enhancement of pipeline results
//!
//! An enhancer may suggest extra duplicates to drop and better wording for
//! each step. It never changes command text or sequence numbers.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::client::{LlmClient, LlmRequest};
use super::error_handler::LlmError;
use super::prompt::{PromptContext, PromptEngine, PromptType, extract_json};
use crate::history::Entry;
use crate::processor::{CommandGroup, Sanitizer};

/// Commands a model considers redundant, as indices into the submitted list
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupResult {
    #[serde(default)]
    pub groups: Vec<DuplicateSet>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateSet {
    /// Index of the command to keep
    pub representative: usize,
    pub indices: Vec<usize>,
    #[serde(default)]
    pub reason: String,
}

impl DedupResult {
    /// Drop every non-representative entry and collect the merge reasons.
    ///
    /// Out-of-range indices are ignored.
    pub fn apply(&self, entries: &[Entry]) -> (Vec<Entry>, Vec<String>) {
        let mut remove = HashSet::new();
        let mut summaries = Vec::new();

        for set in &self.groups {
            remove.extend(
                set.indices
                    .iter()
                    .copied()
                    .filter(|&idx| idx != set.representative && idx < entries.len()),
            );
            if !set.reason.is_empty() {
                summaries.push(set.reason.clone());
            }
        }

        let kept = entries
            .iter()
            .enumerate()
            .filter(|(i, _)| !remove.contains(i))
            .map(|(_, entry)| entry.clone())
            .collect();

        (kept, summaries)
    }
}

/// Model-written wording for the runbook
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Explanations {
    #[serde(default)]
    pub overview: String,
    #[serde(default)]
    pub prerequisites: Vec<String>,
    #[serde(default)]
    pub steps: Vec<StepExplanation>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepExplanation {
    pub title: String,
    pub description: String,
    pub why: String,
    pub notes: String,
}

impl Explanations {
    /// Relabel groups by position; empty fields keep the local value
    pub fn apply(&self, groups: &[CommandGroup]) -> Vec<CommandGroup> {
        groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let mut enhanced = group.clone();
                if let Some(step) = self.steps.get(i) {
                    if !step.title.is_empty() {
                        enhanced.title = step.title.clone();
                    }
                    if !step.description.is_empty() {
                        enhanced.description = step.description.clone();
                    }
                    if !step.why.is_empty() {
                        enhanced.intent = Some(step.why.clone());
                    }
                }
                enhanced
            })
            .collect()
    }
}

/// Optional collaborator that refines deduplication and step wording
#[allow(async_fn_in_trait)]
pub trait CommandEnhancer {
    async fn deduplicate(&self, entries: &[Entry]) -> Result<DedupResult, LlmError>;

    async fn explain(&self, groups: &[CommandGroup]) -> Result<Explanations, LlmError>;
}

/// [`CommandEnhancer`] backed by an LLM provider
pub struct LlmEnhancer {
    client: LlmClient,
    prompts: PromptEngine,
    sanitizer: Sanitizer,
}

impl LlmEnhancer {
    pub fn new(client: LlmClient, sanitizer: Sanitizer) -> Self {
        Self {
            client,
            prompts: PromptEngine::new(),
            sanitizer,
        }
    }

    async fn ask(&self, prompt_type: PromptType, context: &PromptContext) -> Result<String, LlmError> {
        let (system_prompt, prompt) = self
            .prompts
            .generate_prompt(prompt_type, context)
            .ok_or_else(|| LlmError::Parse {
                provider: self.client.provider().name().to_string(),
                message: format!("no prompt template for {:?}", prompt_type),
            })?;

        let response = self
            .client
            .generate(LlmRequest {
                prompt,
                max_tokens: None,
                temperature: None,
                system_prompt: Some(system_prompt),
            })
            .await?;

        if let Some(usage) = &response.usage {
            tracing::debug!(
                prompt_type = ?prompt_type,
                provider = %response.provider,
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "LLM usage"
            );
        }

        Ok(response.content)
    }
}

impl CommandEnhancer for LlmEnhancer {
    async fn deduplicate(&self, entries: &[Entry]) -> Result<DedupResult, LlmError> {
        if entries.is_empty() {
            return Ok(DedupResult::default());
        }

        let context = PromptContext::for_entries(entries, &self.sanitizer);
        let response = self.ask(PromptType::Deduplication, &context).await?;
        Ok(parse_reply(&response))
    }

    async fn explain(&self, groups: &[CommandGroup]) -> Result<Explanations, LlmError> {
        if groups.is_empty() {
            return Ok(Explanations::default());
        }

        let context = PromptContext::for_groups(groups, &self.sanitizer);
        let response = self.ask(PromptType::Explanation, &context).await?;
        Ok(parse_reply(&response))
    }
}

/// Decode the JSON part of a reply; anything unusable becomes the no-op default
pub fn parse_reply<T>(response: &str) -> T
where
    T: serde::de::DeserializeOwned + Default,
{
    let Some(json) = extract_json(response) else {
        tracing::debug!("LLM reply contained no JSON object");
        return T::default();
    };

    serde_json::from_str(json).unwrap_or_else(|e| {
        tracing::debug!(error = %e, "ignoring malformed LLM reply");
        T::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(commands: &[&str]) -> Vec<Entry> {
        commands
            .iter()
            .enumerate()
            .map(|(i, cmd)| Entry::new(i + 1, *cmd))
            .collect()
    }

    fn group(title: &str, commands: &[&str]) -> CommandGroup {
        CommandGroup {
            title: title.to_string(),
            description: String::new(),
            commands: entries(commands),
            intent: None,
        }
    }

    #[test]
    fn test_apply_dedup_keeps_representatives() {
        let input = entries(&["kubectl get pods", "kubectl get po", "kubectl get pods -w", "ls"]);
        let result: DedupResult = parse_reply(
            r#"Here you go: {"groups": [{"representative": 2, "indices": [0, 1, 2], "reason": "Repeated status checks"}]}"#,
        );

        let (kept, summaries) = result.apply(&input);

        let commands: Vec<&str> = kept.iter().map(|e| e.command.as_str()).collect();
        assert_eq!(commands, vec!["kubectl get pods -w", "ls"]);
        assert_eq!(kept[0].sequence_number, 3);
        assert_eq!(summaries, vec!["Repeated status checks"]);
    }

    #[test]
    fn test_apply_dedup_ignores_out_of_range_indices() {
        let input = entries(&["a", "b"]);
        let result = DedupResult {
            groups: vec![DuplicateSet {
                representative: 0,
                indices: vec![0, 5, 99],
                reason: String::new(),
            }],
        };

        let (kept, summaries) = result.apply(&input);
        assert_eq!(kept, input);
        assert!(summaries.is_empty());
    }

    #[test]
    fn test_malformed_reply_is_noop() {
        let result: DedupResult = parse_reply("I could not find duplicates.");
        assert_eq!(result, DedupResult::default());

        let result: DedupResult = parse_reply(r#"{"groups": "nope"}"#);
        assert!(result.groups.is_empty());

        let input = entries(&["a", "b"]);
        assert_eq!(result.apply(&input).0, input);
    }

    #[test]
    fn test_explanations_relabel_groups() {
        let groups = vec![group("Git operations", &["git status"]), group("Docker operations", &["docker ps"])];
        let explanations: Explanations = parse_reply(
            r#"{
                "overview": "Checks repository and container state.",
                "prerequisites": ["Git", "Docker"],
                "steps": [
                    {"title": "Inspect the working tree", "description": "", "why": "Confirms nothing is uncommitted."}
                ]
            }"#,
        );

        let enhanced = explanations.apply(&groups);

        assert_eq!(enhanced.len(), 2);
        assert_eq!(enhanced[0].title, "Inspect the working tree");
        assert_eq!(enhanced[0].description, "");
        assert_eq!(enhanced[0].intent.as_deref(), Some("Confirms nothing is uncommitted."));
        assert_eq!(enhanced[0].commands, groups[0].commands);
        assert_eq!(enhanced[1], groups[1]);
        assert_eq!(explanations.prerequisites, vec!["Git", "Docker"]);
    }
}
