//! Quality Scorer — post-hoc faithfulness check of a synthesized report
//! against the context it was generated from.
//!
//! Best-effort bolt-on: any failure yields `None` (score unavailable) and is
//! logged, never propagated. Report delivery must not depend on this step.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::llm_client::LlmClient;
use crate::report::models::ExecutiveReport;
use crate::research::ResearchBundle;

/// Hallucination/faithfulness score. Lower is more faithful.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityScore {
    /// In [0, 1]; clamped after the judge call.
    pub value: f64,
    pub reason: String,
}

const JUDGE_SYSTEM: &str = "You are a strict factual-consistency judge for business reports. \
    You compare a generated report against its source context and rate hallucination risk. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

const JUDGE_PROMPT_TEMPLATE: &str = r#"Rate the hallucination risk of the following generated report against its source context.

A claim is hallucinated when it is not supported by the source context or the original request.
Score 0.0 means every claim is grounded in the context; 1.0 means the report is largely unsupported.

Return a JSON object with this EXACT schema:
{
  "value": 0.15,
  "reason": "One or two sentences explaining the score"
}

SOURCE CONTEXT:
{context}

ORIGINAL REQUEST:
{prompt}

GENERATED REPORT:
{report}"#;

/// Builds the judge context: the serialized sales summary followed by any
/// non-empty research categories, newline-joined.
pub fn build_scoring_context(sales_block: &str, research: Option<&ResearchBundle>) -> String {
    let mut parts = vec![sales_block.to_string()];

    if let Some(bundle) = research {
        for (label, results) in [
            ("Company trends", &bundle.company_trends),
            ("Product trends", &bundle.product_trends),
            ("Industry news", &bundle.industry_news),
            ("Competitive landscape", &bundle.competitive_landscape),
        ] {
            if results.is_empty() {
                continue;
            }
            let mut section = format!("{label}:");
            for result in results {
                section.push_str(&format!("\n- {}: {}", result.title, result.content));
            }
            parts.push(section);
        }
    }

    parts.join("\n")
}

/// Scores a report against its context and prompt. Returns `None` when the
/// judge is unavailable or fails for any reason.
pub async fn score_report(
    llm: &LlmClient,
    report: &ExecutiveReport,
    prompt_text: &str,
    context_text: &str,
) -> Option<QualityScore> {
    let report_json = match serde_json::to_string_pretty(report) {
        Ok(json) => json,
        Err(e) => {
            warn!("Quality scoring skipped: could not serialize report: {e}");
            return None;
        }
    };

    let prompt = JUDGE_PROMPT_TEMPLATE
        .replace("{context}", context_text)
        .replace("{prompt}", prompt_text)
        .replace("{report}", &report_json);

    match llm.call_json::<QualityScore>(&prompt, JUDGE_SYSTEM).await {
        Ok(mut score) => {
            score.value = score.value.clamp(0.0, 1.0);
            Some(score)
        }
        Err(e) => {
            warn!("Quality scoring unavailable: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::research::SearchResult;

    fn result(title: &str, content: &str) -> SearchResult {
        SearchResult {
            title: title.to_string(),
            url: "https://example.com".to_string(),
            content: content.to_string(),
            published_date: String::new(),
        }
    }

    #[test]
    fn test_context_without_research_is_just_the_sales_block() {
        let context = build_scoring_context("SALES BLOCK", None);
        assert_eq!(context, "SALES BLOCK");
    }

    #[test]
    fn test_context_skips_empty_categories() {
        let bundle = ResearchBundle {
            company_trends: vec![result("Trend", "content")],
            ..Default::default()
        };
        let context = build_scoring_context("SALES", Some(&bundle));
        assert!(context.contains("Company trends:"));
        assert!(context.contains("- Trend: content"));
        assert!(!context.contains("Industry news:"));
        assert!(!context.contains("Competitive landscape:"));
    }

    #[test]
    fn test_context_is_newline_joined_in_category_order() {
        let bundle = ResearchBundle {
            company_trends: vec![result("A", "a")],
            industry_news: vec![result("B", "b")],
            ..Default::default()
        };
        let context = build_scoring_context("SALES", Some(&bundle));
        let sales_at = context.find("SALES").unwrap();
        let company_at = context.find("Company trends:").unwrap();
        let news_at = context.find("Industry news:").unwrap();
        assert!(sales_at < company_at && company_at < news_at);
    }

    #[test]
    fn test_quality_score_deserializes_from_judge_json() {
        let json = r#"{"value": 0.2, "reason": "Mostly grounded in the sales figures."}"#;
        let score: QualityScore = serde_json::from_str(json).unwrap();
        assert_eq!(score.value, 0.2);
        assert!(score.reason.contains("grounded"));
    }

    #[test]
    fn test_judge_prompt_template_has_all_placeholders() {
        for placeholder in ["{context}", "{prompt}", "{report}"] {
            assert!(JUDGE_PROMPT_TEMPLATE.contains(placeholder));
        }
    }
}
