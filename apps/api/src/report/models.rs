//! Typed report records produced by the synthesizer.
//!
//! JSON field names are part of the API contract and double as the structured
//! decoding schema, so they stay stable.

use serde::{Deserialize, Serialize};

/// A single strategic recommendation.
///
/// Priority is expected in {High, Medium, Low} and timeline in
/// {Immediate, Short-term, Long-term}, but free text is tolerated — the
/// legacy freeform grammar never validated them and tightening here would
/// drop model output that readers can still use.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    /// Strategic / Operational / Financial / Marketing, or free text.
    /// May be empty in freeform mode (category-optional legacy behavior).
    #[serde(default)]
    pub category: String,
    pub recommendation: String,
    pub priority: String,
    pub timeline: String,
    pub expected_impact: String,
}

/// The synthesized briefing. Constructed once per generation call and
/// immutable thereafter; never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExecutiveReport {
    pub executive_summary: String,
    pub key_findings: Vec<String>,
    pub strategic_recommendations: Vec<RecommendationItem>,
    pub risk_assessment: String,
    pub next_steps: Vec<String>,
}
