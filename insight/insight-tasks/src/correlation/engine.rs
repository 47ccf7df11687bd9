//! Assembly of the correlation result from classified patterns.

use insight_core::prelude::*;
use insight_core::response::{extract_model_response, optional_string, parse_tagged_json};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::task::TaskContext;

const SELECTION_TAG: &str = "correlation_selection";

/// One side of the correlation triad
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SlotInfo {
    pub pattern: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub sample_index: Option<String>,
    pub time_field: Option<String>,
    pub trace_id_field: Option<String>,
    pub span_id_field: Option<String>,
}

impl From<&PatternInfo> for SlotInfo {
    fn from(info: &PatternInfo) -> Self {
        Self {
            pattern: info.pattern.clone(),
            semantic_type: info.semantic_type,
            sample_index: info.sample_index().map(str::to_string),
            time_field: info.time_field.clone(),
            trace_id_field: info.trace_id_field.clone(),
            span_id_field: info.span_id_field.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CorrelationTuple {
    pub logs: Option<SlotInfo>,
    pub trace: Option<SlotInfo>,
    pub metrics: Option<SlotInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_reasoning: Option<String>,
}

impl CorrelationTuple {
    pub fn slot(&self, semantic_type: SemanticType) -> Option<&SlotInfo> {
        match semantic_type {
            SemanticType::Log => self.logs.as_ref(),
            SemanticType::Trace => self.trace.as_ref(),
            SemanticType::Metric => self.metrics.as_ref(),
            SemanticType::Unknown => None,
        }
    }

    fn set_slot(&mut self, semantic_type: SemanticType, slot: Option<SlotInfo>) {
        match semantic_type {
            SemanticType::Log => self.logs = slot,
            SemanticType::Trace => self.trace = slot,
            SemanticType::Metric => self.metrics = slot,
            SemanticType::Unknown => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSummary {
    pub pattern: String,
    #[serde(rename = "type")]
    pub semantic_type: SemanticType,
    pub sample_count: usize,
}

/// Stored content of an INDEX_CORRELATION record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub source_index: String,
    pub source_pattern: String,
    pub source_type: SemanticType,
    pub total_indices_scanned: usize,
    pub total_patterns_detected: usize,
    pub correlation_tuple: CorrelationTuple,
    pub all_patterns: Vec<PatternSummary>,
}

/// Picks one pattern per triad slot for a source index.
pub struct CorrelationEngine<'a> {
    ctx: &'a TaskContext,
    source_index: &'a str,
}

impl<'a> CorrelationEngine<'a> {
    pub fn new(ctx: &'a TaskContext, source_index: &'a str) -> Self {
        Self { ctx, source_index }
    }

    /// Build the result. `patterns` must be in scan order; it drives the
    /// first-candidate fallback.
    pub async fn assemble(
        &self,
        source: &PatternInfo,
        patterns: &[PatternInfo],
        total_indices_scanned: usize,
    ) -> CorrelationResult {
        let mut tuple = CorrelationTuple::default();
        let mut ambiguous: Vec<(SemanticType, Vec<&PatternInfo>)> = Vec::new();

        for slot_type in SemanticType::TRIAD {
            if slot_type == source.semantic_type {
                tuple.set_slot(slot_type, Some(SlotInfo::from(source)));
                continue;
            }
            let candidates: Vec<&PatternInfo> = patterns
                .iter()
                .filter(|p| p.semantic_type == slot_type && p.pattern != source.pattern)
                .collect();
            match candidates.as_slice() {
                [] => tuple.set_slot(slot_type, None),
                [only] => tuple.set_slot(slot_type, Some(SlotInfo::from(*only))),
                _ => ambiguous.push((slot_type, candidates)),
            }
        }

        if !ambiguous.is_empty() {
            let selection = self.select(source, &ambiguous).await;
            for (slot_type, candidates) in &ambiguous {
                let chosen = selection
                    .as_ref()
                    .and_then(|s| s.choice(*slot_type))
                    .and_then(|choice| candidates.iter().find(|c| c.pattern == choice))
                    .or_else(|| candidates.first())
                    .map(|info| SlotInfo::from(*info));
                tuple.set_slot(*slot_type, chosen);
            }
            tuple.llm_reasoning = selection.and_then(|s| s.reasoning);
        }

        let all_patterns = patterns
            .iter()
            .map(|p| PatternSummary {
                pattern: p.pattern.clone(),
                semantic_type: p.semantic_type,
                sample_count: p.sample_indices.len(),
            })
            .collect();

        info!(
            "Correlation for index {}: logs={:?} trace={:?} metrics={:?}",
            self.source_index,
            tuple.logs.as_ref().map(|s| s.pattern.as_str()),
            tuple.trace.as_ref().map(|s| s.pattern.as_str()),
            tuple.metrics.as_ref().map(|s| s.pattern.as_str()),
        );

        CorrelationResult {
            source_index: self.source_index.to_string(),
            source_pattern: source.pattern.clone(),
            source_type: source.semantic_type,
            total_indices_scanned,
            total_patterns_detected: patterns.len(),
            correlation_tuple: tuple,
            all_patterns,
        }
    }

    /// One model call covering every slot with several candidates.
    /// `None` means the caller falls back to first candidates.
    async fn select(
        &self,
        source: &PatternInfo,
        ambiguous: &[(SemanticType, Vec<&PatternInfo>)],
    ) -> Option<Selection> {
        let prompt = selection_prompt(source, ambiguous);
        debug!(
            "Asking model to break ties for {} slots of index {}",
            ambiguous.len(),
            self.source_index
        );

        let response = match self
            .ctx
            .model
            .call_model(self.ctx.agent_id(), &prompt, self.source_index)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Correlation selection failed for index {}, using first candidates: {}",
                    self.source_index, e
                );
                return None;
            }
        };

        let selection = Selection::parse(&extract_model_response(&response));
        if selection.is_none() {
            warn!(
                "Unreadable correlation selection for index {}, using first candidates",
                self.source_index
            );
        }
        selection
    }
}

/// The model's tie-break answer
#[derive(Debug, Clone, Default, PartialEq)]
struct Selection {
    logs: Option<String>,
    trace: Option<String>,
    metrics: Option<String>,
    reasoning: Option<String>,
}

impl Selection {
    fn parse(text: &str) -> Option<Self> {
        let answer = parse_tagged_json(text, SELECTION_TAG)?;
        Some(Self {
            logs: optional_string(&answer, "logs"),
            trace: optional_string(&answer, "trace"),
            metrics: optional_string(&answer, "metrics"),
            reasoning: optional_string(&answer, "reasoning"),
        })
    }

    fn choice(&self, slot_type: SemanticType) -> Option<&str> {
        match slot_type {
            SemanticType::Log => self.logs.as_deref(),
            SemanticType::Trace => self.trace.as_deref(),
            SemanticType::Metric => self.metrics.as_deref(),
            SemanticType::Unknown => None,
        }
    }
}

fn selection_prompt(source: &PatternInfo, ambiguous: &[(SemanticType, Vec<&PatternInfo>)]) -> String {
    let mut prompt = String::from(
        "I will provide you with a source index pattern and candidate index patterns of other observability types.\n\n",
    );
    prompt.push_str(&format!(
        "Source Pattern: {} (type: {})\n\n",
        source.pattern, source.semantic_type
    ));

    for (slot_type, candidates) in ambiguous {
        let slot = slot_type.slot_name().unwrap_or(slot_type.as_str());
        prompt.push_str(&format!("Candidates for {} ({}):\n", slot, slot_type));
        for candidate in candidates {
            prompt.push_str(&format!(
                "- {} (sample index: {})\n",
                candidate.pattern,
                candidate.sample_index().unwrap_or("none")
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "For each slot with candidates, pick the pattern most likely to describe the same system as the source \
         pattern, judging by naming conventions (shared prefixes, \"otel\", service names, versions).\n\n",
    );
    prompt.push_str("Return your selection in the following JSON format inside tags:\n\n");
    prompt.push_str("<correlation_selection>\n");
    prompt.push_str(
        "{\n  \"logs\": \"chosen pattern or null\",\n  \"trace\": \"chosen pattern or null\",\n  \
         \"metrics\": \"chosen pattern or null\",\n  \"reasoning\": \"brief explanation\"\n}\n",
    );
    prompt.push_str("</correlation_selection>");
    prompt
}
