use std::time::Duration;

use super::dedup::Deduplicator;
use super::intent::{CommandGroup, IntentAnalyzer};
use super::patterns::PatternError;
use super::sanitizer::{Redaction, Sanitizer};
use crate::config::ProcessingConfig;
use crate::history::Entry;
use crate::llm::{CommandEnhancer, LlmError};

/// Everything needed to render a runbook
#[derive(Debug, Clone, Default)]
pub struct PipelineOutput {
    pub groups: Vec<CommandGroup>,
    pub redactions: Vec<Redaction>,
    pub extracted_count: usize,
    pub deduplicated_count: usize,
    /// Reasons given for AI merges
    pub merge_summaries: Vec<String>,
    pub overview: Option<String>,
    pub prerequisites: Vec<String>,
}

/// Dedup, sanitize and group, optionally consulting an enhancer in between
#[derive(Debug, Clone)]
pub struct Pipeline {
    dedup: Deduplicator,
    sanitizer: Sanitizer,
    analyzer: IntentAnalyzer,
    ai_timeout: Duration,
}

impl Pipeline {
    pub fn new(dedup: Deduplicator, sanitizer: Sanitizer, analyzer: IntentAnalyzer) -> Self {
        Self {
            dedup,
            sanitizer,
            analyzer,
            ai_timeout: Duration::from_secs(60),
        }
    }

    /// Build all three stages from configuration; bad custom patterns fail here
    pub fn from_config(config: &ProcessingConfig) -> Result<Self, PatternError> {
        let sanitizer = Sanitizer::builder()
            .strict_mode(config.strict_redaction)
            .patterns(config.custom_patterns.iter().cloned())
            .build()?;

        let dedup = Deduplicator::with_time_gap(gap(config.dedup_time_gap_secs));
        let analyzer = IntentAnalyzer::new()
            .with_threshold(gap(config.group_time_gap_secs))
            .with_workflows(config.custom_workflows.iter().cloned());

        Ok(Self::new(dedup, sanitizer, analyzer).with_ai_timeout(Duration::from_secs(config.ai_timeout_secs)))
    }

    pub fn with_ai_timeout(mut self, timeout: Duration) -> Self {
        self.ai_timeout = timeout;
        self
    }

    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    /// Run the local stages only
    pub fn run(&self, entries: &[Entry]) -> PipelineOutput {
        let deduplicated = self.dedup.process(entries);
        let deduplicated_count = deduplicated.len();
        let sanitized = self.sanitizer.process(&deduplicated);
        let groups = self.analyzer.analyze(&sanitized.entries);

        PipelineOutput {
            groups,
            redactions: sanitized.redactions,
            extracted_count: entries.len(),
            deduplicated_count,
            ..PipelineOutput::default()
        }
    }

    /// Run the local stages and let `enhancer` refine the result.
    ///
    /// The enhancer only sees sanitized entries. If it fails or exceeds the
    /// timeout, the local result for that step is kept.
    pub async fn run_enhanced<E: CommandEnhancer>(&self, entries: &[Entry], enhancer: &E) -> PipelineOutput {
        let deduplicated = self.dedup.process(entries);
        let sanitized = self.sanitizer.process(&deduplicated);

        let mut merge_summaries = Vec::new();
        let mut deduplicated_count = deduplicated.len();
        let mut kept = sanitized.entries;
        if let Some(result) = self.bounded("deduplication", enhancer.deduplicate(&kept)).await {
            let (filtered, summaries) = result.apply(&kept);
            if !summaries.is_empty() {
                tracing::info!(merged = summaries.len(), "AI deduplication applied");
            }
            deduplicated_count -= kept.len() - filtered.len();
            kept = filtered;
            merge_summaries = summaries;
        }

        let mut groups = self.analyzer.analyze(&kept);
        let mut overview = None;
        let mut prerequisites = Vec::new();
        if let Some(explanations) = self.bounded("explanation", enhancer.explain(&groups)).await {
            groups = explanations.apply(&groups);
            overview = Some(explanations.overview.clone()).filter(|o| !o.trim().is_empty());
            prerequisites = explanations.prerequisites;
        }

        PipelineOutput {
            groups,
            redactions: sanitized.redactions,
            extracted_count: entries.len(),
            deduplicated_count,
            merge_summaries,
            overview,
            prerequisites,
        }
    }

    async fn bounded<T>(&self, step: &str, call: impl Future<Output = Result<T, LlmError>>) -> Option<T> {
        match tokio::time::timeout(self.ai_timeout, call).await {
            Ok(Ok(value)) => Some(value),
            Ok(Err(e)) => {
                tracing::warn!(step, error = %e, "AI step failed, keeping local result");
                None
            }
            Err(_) => {
                tracing::warn!(step, timeout_secs = self.ai_timeout.as_secs(), "AI step timed out, keeping local result");
                None
            }
        }
    }
}

/// Configured seconds as a time gap; values chrono cannot represent saturate
fn gap(secs: u64) -> chrono::Duration {
    i64::try_from(secs)
        .ok()
        .and_then(chrono::Duration::try_seconds)
        .unwrap_or(chrono::Duration::MAX)
}
