//! Report decoding — two strategies behind one `ReportDecoder` trait.
//!
//! `StructuredDecoder` declares the report schema to the provider and trusts
//! the constrained output; `FreeformDecoder` parses the legacy plain-text
//! section grammar. `AppState` holds an `Arc<dyn ReportDecoder>`, selected at
//! startup via `DECODING_MODE`.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::report::models::{ExecutiveReport, RecommendationItem};

/// Which output strategy a deployment runs with.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DecodingMode {
    /// Schema-constrained provider output, no text parsing. Preferred.
    #[default]
    Structured,
    /// Legacy plain-text section grammar, parsed line by line.
    Freeform,
}

impl DecodingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecodingMode::Structured => "structured",
            DecodingMode::Freeform => "freeform",
        }
    }
}

impl FromStr for DecodingMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "structured" => Ok(DecodingMode::Structured),
            "freeform" => Ok(DecodingMode::Freeform),
            other => Err(anyhow::anyhow!(
                "Invalid decoding mode '{other}' (expected 'structured' or 'freeform')"
            )),
        }
    }
}

/// The decoding seam. Implement this to add an output strategy without
/// touching the synthesizer or handlers.
#[async_trait]
pub trait ReportDecoder: Send + Sync {
    fn mode(&self) -> DecodingMode;

    /// Invokes the LLM with the built prompts and produces a validated report.
    async fn decode(
        &self,
        llm: &LlmClient,
        system: &str,
        prompt: &str,
    ) -> Result<ExecutiveReport, AppError>;
}

/// Selects the decoder backend for a configured mode.
pub fn decoder_for(mode: DecodingMode) -> Arc<dyn ReportDecoder> {
    match mode {
        DecodingMode::Structured => Arc::new(StructuredDecoder),
        DecodingMode::Freeform => Arc::new(FreeformDecoder),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Structured decoder
// ────────────────────────────────────────────────────────────────────────────

/// Declares the `ExecutiveReport` schema on the LLM call; any response that
/// violates it is a generation error.
pub struct StructuredDecoder;

#[async_trait]
impl ReportDecoder for StructuredDecoder {
    fn mode(&self) -> DecodingMode {
        DecodingMode::Structured
    }

    async fn decode(
        &self,
        llm: &LlmClient,
        system: &str,
        prompt: &str,
    ) -> Result<ExecutiveReport, AppError> {
        llm.call_structured::<ExecutiveReport>(prompt, system, "executive_report", report_schema())
            .await
            .map_err(|e| AppError::Generation(format!("Structured report decoding failed: {e}")))
    }
}

/// JSON schema for the structured output contract. Field names must match the
/// serde representation of `ExecutiveReport`.
fn report_schema() -> Value {
    let recommendation = json!({
        "type": "object",
        "properties": {
            "category": { "type": "string" },
            "recommendation": { "type": "string" },
            "priority": { "type": "string" },
            "timeline": { "type": "string" },
            "expected_impact": { "type": "string" }
        },
        "required": ["category", "recommendation", "priority", "timeline", "expected_impact"],
        "additionalProperties": false
    });

    json!({
        "type": "object",
        "properties": {
            "executive_summary": { "type": "string" },
            "key_findings": { "type": "array", "items": { "type": "string" } },
            "strategic_recommendations": { "type": "array", "items": recommendation },
            "risk_assessment": { "type": "string" },
            "next_steps": { "type": "array", "items": { "type": "string" } }
        },
        "required": [
            "executive_summary",
            "key_findings",
            "strategic_recommendations",
            "risk_assessment",
            "next_steps"
        ],
        "additionalProperties": false
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Freeform decoder
// ────────────────────────────────────────────────────────────────────────────

/// Legacy plain-text strategy: the model follows the literal section grammar
/// and a single-pass line scanner recovers the report. Kept because some
/// deployments disable structured decoding.
pub struct FreeformDecoder;

#[async_trait]
impl ReportDecoder for FreeformDecoder {
    fn mode(&self) -> DecodingMode {
        DecodingMode::Freeform
    }

    async fn decode(
        &self,
        llm: &LlmClient,
        system: &str,
        prompt: &str,
    ) -> Result<ExecutiveReport, AppError> {
        let text = llm
            .call(prompt, system)
            .await
            .map_err(|e| AppError::Generation(format!("Report LLM call failed: {e}")))?;
        Ok(parse_report_text(&text))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    None,
    Summary,
    Findings,
    Recommendations,
    Risk,
    Steps,
}

/// Header lines switch section state and are discarded. Comparison is exact
/// (case-sensitive, trailing colon) after trimming surrounding whitespace.
fn section_for_header(line: &str) -> Option<Section> {
    match line {
        "EXECUTIVE SUMMARY:" => Some(Section::Summary),
        "KEY FINDINGS:" => Some(Section::Findings),
        "STRATEGIC RECOMMENDATIONS:" => Some(Section::Recommendations),
        "RISK ASSESSMENT:" => Some(Section::Risk),
        "NEXT STEPS:" => Some(Section::Steps),
        _ => None,
    }
}

/// An in-progress recommendation accumulated across lines.
#[derive(Debug, Default)]
struct DraftRecommendation {
    category: String,
    description: String,
    priority: String,
    timeline: String,
    expected_impact: String,
}

impl DraftRecommendation {
    /// Category is deliberately NOT required — legacy behavior accepts
    /// category-less recommendations.
    fn is_complete(&self) -> bool {
        !self.description.trim().is_empty()
            && !self.priority.trim().is_empty()
            && !self.timeline.trim().is_empty()
            && !self.expected_impact.trim().is_empty()
    }

    fn into_item(self) -> RecommendationItem {
        RecommendationItem {
            category: self.category.trim().to_string(),
            recommendation: self.description.trim().to_string(),
            priority: self.priority.trim().to_string(),
            timeline: self.timeline.trim().to_string(),
            expected_impact: self.expected_impact.trim().to_string(),
        }
    }

    fn append_description(&mut self, line: &str) {
        if !self.description.is_empty() {
            self.description.push(' ');
        }
        self.description.push_str(line);
    }
}

/// `[Recommendation <anything>]` — a pure flush boundary contributing no text.
fn is_recommendation_header(line: &str) -> bool {
    line.starts_with("[Recommendation") && line.ends_with(']')
}

/// Parses freeform LLM output into a report.
///
/// Never fails: malformed input degrades to fewer findings, recommendations,
/// or steps. An entirely unparseable text yields an empty report, which the
/// caller treats as valid output.
pub fn parse_report_text(text: &str) -> ExecutiveReport {
    let mut section = Section::None;

    let mut summary_parts: Vec<&str> = Vec::new();
    let mut risk_parts: Vec<&str> = Vec::new();
    let mut key_findings = Vec::new();
    let mut next_steps = Vec::new();
    let mut recommendations = Vec::new();
    let mut draft = DraftRecommendation::default();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(next_section) = section_for_header(line) {
            section = next_section;
            continue;
        }

        match section {
            Section::None => {} // preamble before the first header is dropped
            Section::Summary => summary_parts.push(line),
            Section::Risk => risk_parts.push(line),
            Section::Findings => {
                if let Some(finding) = line.strip_prefix('•') {
                    key_findings.push(finding.trim().to_string());
                }
            }
            Section::Steps => {
                if let Some(step) = line.strip_prefix('•') {
                    next_steps.push(step.trim().to_string());
                }
            }
            Section::Recommendations => {
                if is_recommendation_header(line) {
                    // Flush boundary: keep a complete draft, discard the rest
                    let previous = std::mem::take(&mut draft);
                    if previous.is_complete() {
                        recommendations.push(previous.into_item());
                    }
                } else if let Some(value) = line.strip_prefix("Category:") {
                    // A category line also flushes a complete draft; the
                    // category then belongs to the fresh draft.
                    if draft.is_complete() {
                        let previous = std::mem::take(&mut draft);
                        recommendations.push(previous.into_item());
                    }
                    draft.category = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("Priority:") {
                    draft.priority = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("Timeline:") {
                    draft.timeline = value.trim().to_string();
                } else if let Some(value) = line.strip_prefix("Expected Impact:") {
                    draft.expected_impact = value.trim().to_string();
                } else {
                    draft.append_description(line);
                }
            }
        }
    }

    // Trailing draft
    if draft.is_complete() {
        recommendations.push(draft.into_item());
    }

    ExecutiveReport {
        executive_summary: summary_parts.join(" "),
        key_findings,
        strategic_recommendations: recommendations,
        risk_assessment: risk_parts.join(" "),
        next_steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = "\
EXECUTIVE SUMMARY:
Sales performance was strong this quarter.
iPhone drove the majority of revenue.

KEY FINDINGS:
• iPhone holds 54% market share
• NA is the top region

STRATEGIC RECOMMENDATIONS:
[Recommendation 1]
Diversify the product portfolio to reduce concentration.
Category: Strategic
Priority: High
Timeline: Long-term
Expected Impact: Reduced single-product dependence

[Recommendation 2]
Expand distribution in Asia.
Category: Operational
Priority: Medium
Timeline: Short-term
Expected Impact: Regional revenue growth

RISK ASSESSMENT:
Concentration in a single product line is the main exposure.

NEXT STEPS:
• Commission a diversification study
• Review Asia channel partners
";

    #[test]
    fn test_round_trip_recovers_all_sections() {
        let report = parse_report_text(WELL_FORMED);

        assert_eq!(
            report.executive_summary,
            "Sales performance was strong this quarter. iPhone drove the majority of revenue."
        );
        assert_eq!(
            report.key_findings,
            vec!["iPhone holds 54% market share", "NA is the top region"]
        );
        assert_eq!(
            report.risk_assessment,
            "Concentration in a single product line is the main exposure."
        );
        assert_eq!(
            report.next_steps,
            vec![
                "Commission a diversification study",
                "Review Asia channel partners"
            ]
        );
    }

    #[test]
    fn test_round_trip_recovers_both_recommendations() {
        let report = parse_report_text(WELL_FORMED);
        let recs = &report.strategic_recommendations;
        assert_eq!(recs.len(), 2);

        assert_eq!(
            recs[0].recommendation,
            "Diversify the product portfolio to reduce concentration."
        );
        assert_eq!(recs[0].category, "Strategic");
        assert_eq!(recs[0].priority, "High");
        assert_eq!(recs[0].timeline, "Long-term");
        assert_eq!(recs[0].expected_impact, "Reduced single-product dependence");

        assert_eq!(recs[1].category, "Operational");
        assert_eq!(recs[1].timeline, "Short-term");
    }

    #[test]
    fn test_incomplete_recommendation_is_dropped() {
        let text = "\
STRATEGIC RECOMMENDATIONS:
[Recommendation 1]
Do the first thing.
Category: Strategic
Priority: High
Timeline: Immediate
Expected Impact: Good things

[Recommendation 2]
Do the second thing.
Category: Financial
Priority: Low
Timeline: Long-term
";
        // Recommendation 2 lacks Expected Impact — one fewer than headers
        let report = parse_report_text(text);
        assert_eq!(report.strategic_recommendations.len(), 1);
        assert_eq!(
            report.strategic_recommendations[0].recommendation,
            "Do the first thing."
        );
    }

    #[test]
    fn test_multi_line_description_is_space_joined() {
        let text = "\
STRATEGIC RECOMMENDATIONS:
[Recommendation 1]
Invest in the Asia region
across all product lines.
Priority: High
Timeline: Short-term
Expected Impact: Growth
";
        let report = parse_report_text(text);
        assert_eq!(report.strategic_recommendations.len(), 1);
        assert_eq!(
            report.strategic_recommendations[0].recommendation,
            "Invest in the Asia region across all product lines."
        );
    }

    #[test]
    fn test_category_is_optional_for_completeness() {
        let text = "\
STRATEGIC RECOMMENDATIONS:
Launch a loyalty program.
Priority: Medium
Timeline: Short-term
Expected Impact: Higher retention
";
        let report = parse_report_text(text);
        assert_eq!(report.strategic_recommendations.len(), 1);
        assert_eq!(report.strategic_recommendations[0].category, "");
    }

    #[test]
    fn test_bracket_header_flushes_before_category_line() {
        // Recommendation 1 is complete but has no Category line; the bracket
        // header for recommendation 2 must flush it at the bracket boundary.
        let text = "\
STRATEGIC RECOMMENDATIONS:
First initiative description.
Priority: High
Timeline: Immediate
Expected Impact: Impact one
[Recommendation 2]
Second initiative description.
Category: Marketing
Priority: Low
Timeline: Long-term
Expected Impact: Impact two
";
        let report = parse_report_text(text);
        let recs = &report.strategic_recommendations;
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].recommendation, "First initiative description.");
        assert_eq!(recs[0].category, "");
        assert_eq!(recs[1].recommendation, "Second initiative description.");
        assert_eq!(recs[1].category, "Marketing");
    }

    #[test]
    fn test_category_line_flushes_complete_draft_and_applies_to_next() {
        let text = "\
STRATEGIC RECOMMENDATIONS:
Category: Strategic
First initiative.
Priority: High
Timeline: Immediate
Expected Impact: Impact one
Category: Operational
Second initiative.
Priority: Low
Timeline: Long-term
Expected Impact: Impact two
";
        let report = parse_report_text(text);
        let recs = &report.strategic_recommendations;
        assert_eq!(recs.len(), 2);
        assert_eq!(recs[0].category, "Strategic");
        assert_eq!(recs[1].category, "Operational");
    }

    #[test]
    fn test_bracket_header_contributes_no_text() {
        let text = "\
STRATEGIC RECOMMENDATIONS:
[Recommendation 1]
Real description.
Priority: High
Timeline: Immediate
Expected Impact: Impact
";
        let report = parse_report_text(text);
        assert_eq!(
            report.strategic_recommendations[0].recommendation,
            "Real description."
        );
    }

    #[test]
    fn test_non_bulleted_findings_lines_are_dropped() {
        let text = "\
KEY FINDINGS:
This line has no bullet and is dropped.
• This one is kept
";
        let report = parse_report_text(text);
        assert_eq!(report.key_findings, vec!["This one is kept"]);
    }

    #[test]
    fn test_header_match_is_exact_after_trim() {
        // Indented header still switches sections; a lowercase one does not.
        let text = "   EXECUTIVE SUMMARY:\nIndented header works.\n";
        let report = parse_report_text(text);
        assert_eq!(report.executive_summary, "Indented header works.");

        let text = "executive summary:\nlowercase is not a header\n";
        let report = parse_report_text(text);
        assert_eq!(report.executive_summary, "");
    }

    #[test]
    fn test_preamble_before_first_header_is_dropped() {
        let text = "Here is your report!\n\nEXECUTIVE SUMMARY:\nThe summary.\n";
        let report = parse_report_text(text);
        assert_eq!(report.executive_summary, "The summary.");
    }

    #[test]
    fn test_malformed_input_never_panics_and_yields_empty_report() {
        for garbage in ["", "\n\n\n", "•••", "Category:", "[Recommendation", "::::"] {
            let report = parse_report_text(garbage);
            assert_eq!(report.executive_summary, "");
            assert!(report.strategic_recommendations.is_empty());
        }
    }

    #[test]
    fn test_decoding_mode_from_str() {
        assert_eq!(
            "structured".parse::<DecodingMode>().unwrap(),
            DecodingMode::Structured
        );
        assert_eq!(
            " Freeform ".parse::<DecodingMode>().unwrap(),
            DecodingMode::Freeform
        );
        assert!("jsonish".parse::<DecodingMode>().is_err());
    }

    #[test]
    fn test_decoder_for_reports_its_mode() {
        assert_eq!(
            decoder_for(DecodingMode::Structured).mode(),
            DecodingMode::Structured
        );
        assert_eq!(
            decoder_for(DecodingMode::Freeform).mode(),
            DecodingMode::Freeform
        );
    }

    #[test]
    fn test_report_schema_requires_all_fields() {
        let schema = report_schema();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 5);
        assert_eq!(schema["additionalProperties"], serde_json::json!(false));
    }
}
