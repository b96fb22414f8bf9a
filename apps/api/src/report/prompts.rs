//! Prompt construction for report synthesis.
//!
//! Pure, side-effect-free. The role lookup is a plain static mapping, not a
//! type per role; unknown roles fall back to a generic template that simply
//! names the role.

use crate::report::decoder::DecodingMode;

/// Role descriptions keyed by normalized (lowercased) executive role.
const ROLE_CONTEXTS: &[(&str, &str)] = &[
    (
        "ceo",
        "chief executive officer focused on overall strategy, growth, and shareholder value",
    ),
    (
        "cfo",
        "chief financial officer focused on financial performance, profitability, and risk management",
    ),
    (
        "coo",
        "chief operating officer focused on operational efficiency, process optimization, and execution",
    ),
    (
        "cmo",
        "chief marketing officer focused on brand strategy, customer acquisition, and market positioning",
    ),
    (
        "cto",
        "chief technology officer focused on technology strategy, innovation, and digital transformation",
    ),
    (
        "head of sales",
        "sales leader focused on revenue growth, sales performance, and market expansion",
    ),
    (
        "head of product",
        "product leader focused on product strategy, development, and market fit",
    ),
];

/// The literal output grammar the freeform parser recognizes. The model must
/// reproduce these section headers verbatim.
const FREEFORM_FORMAT_TEMPLATE: &str = r#"Format your response as follows:

EXECUTIVE SUMMARY:
[2-3 paragraph summary]

KEY FINDINGS:
• [Finding 1]
• [Finding 2]
• [Finding 3]

STRATEGIC RECOMMENDATIONS:
[Recommendation 1]
Category: [Strategic/Operational/Financial/Marketing]
Priority: [High/Medium/Low]
Timeline: [Immediate/Short-term/Long-term]
Expected Impact: [Description of expected impact]

[Recommendation 2]
[Same format...]

RISK ASSESSMENT:
[Risk analysis paragraph]

NEXT STEPS:
• [Action 1]
• [Action 2]
• [Action 3]"#;

/// Output guidance for structured mode — the schema is enforced by the
/// calling contract, so no literal markup is dictated here.
const STRUCTURED_FORMAT_GUIDANCE: &str = "\
Return a concise executive summary (2-3 paragraphs), 3-5 key findings, \
2-4 strategic recommendations (each with a category of Strategic, Operational, \
Financial, or Marketing; a priority of High, Medium, or Low; a timeline of \
Immediate, Short-term, or Long-term; and the expected impact), a risk \
assessment paragraph, and 3-5 next steps.";

/// Resolves the role description for a (case-insensitive) executive role.
pub fn role_context(executive_role: &str) -> String {
    let normalized = executive_role.trim().to_lowercase();
    ROLE_CONTEXTS
        .iter()
        .find(|(role, _)| *role == normalized)
        .map(|(_, context)| context.to_string())
        .unwrap_or_else(|| {
            format!("{executive_role} focused on strategic leadership and business performance")
        })
}

/// Builds the role-tailored system instruction for the given decoding mode.
pub fn build_system_prompt(executive_role: &str, mode: DecodingMode) -> String {
    let role_context = role_context(executive_role);

    let format_instructions = match mode {
        DecodingMode::Freeform => FREEFORM_FORMAT_TEMPLATE,
        DecodingMode::Structured => STRUCTURED_FORMAT_GUIDANCE,
    };

    format!(
        "You are an expert business analyst creating an executive briefing for a {role_context}.\n\
         \n\
         Your task is to analyze sales data and industry research to provide:\n\
         1. A concise executive summary (2-3 paragraphs)\n\
         2. Key findings (3-5 bullet points)\n\
         3. Strategic recommendations with priority, timeline, and expected impact\n\
         4. Risk assessment\n\
         5. Next steps\n\
         \n\
         Tailor your analysis and recommendations specifically for the {executive_role} perspective.\n\
         Be data-driven, actionable, and strategic in your recommendations.\n\
         Focus on insights that would be most relevant and valuable for this executive role.\n\
         \n\
         {format_instructions}"
    )
}

/// Builds the human-turn instruction embedding the rendered sales and
/// research blocks.
pub fn build_human_prompt(
    company_name: &str,
    data_summary: &str,
    research_summary: &str,
) -> String {
    format!(
        "Please analyze the following information for {company_name} and create a comprehensive \
         executive briefing:\n\
         \n\
         {data_summary}\n\
         \n\
         {research_summary}\n\
         \n\
         Based on this sales data and industry research, provide strategic insights and actionable \
         recommendations tailored for the executive role specified in the system prompt."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_lookup_is_case_insensitive() {
        assert!(role_context("CFO").contains("chief financial officer"));
        assert!(role_context("cfo").contains("chief financial officer"));
        assert!(role_context("  Head of Sales ").contains("sales leader"));
    }

    #[test]
    fn test_unknown_role_falls_back_to_generic_template() {
        let context = role_context("Chief Strategy Officer");
        assert!(context.starts_with("Chief Strategy Officer"));
        assert!(context.contains("strategic leadership and business performance"));
    }

    #[test]
    fn test_all_known_roles_resolve() {
        for role in [
            "CEO",
            "CFO",
            "COO",
            "CMO",
            "CTO",
            "Head of Sales",
            "Head of Product",
        ] {
            let context = role_context(role);
            assert!(
                !context.contains("strategic leadership and business performance"),
                "{role} should not use the fallback"
            );
        }
    }

    #[test]
    fn test_freeform_system_prompt_contains_literal_headers() {
        let prompt = build_system_prompt("CEO", DecodingMode::Freeform);
        for header in [
            "EXECUTIVE SUMMARY:",
            "KEY FINDINGS:",
            "STRATEGIC RECOMMENDATIONS:",
            "RISK ASSESSMENT:",
            "NEXT STEPS:",
        ] {
            assert!(prompt.contains(header), "missing {header}");
        }
        assert!(prompt.contains("[Recommendation 1]"));
        assert!(prompt.contains("Expected Impact:"));
    }

    #[test]
    fn test_structured_system_prompt_has_no_literal_markup() {
        let prompt = build_system_prompt("CEO", DecodingMode::Structured);
        assert!(!prompt.contains("[Recommendation 1]"));
        assert!(!prompt.contains("EXECUTIVE SUMMARY:"));
        assert!(prompt.contains("2-4 strategic recommendations"));
    }

    #[test]
    fn test_system_prompt_names_the_role() {
        let prompt = build_system_prompt("CMO", DecodingMode::Structured);
        assert!(prompt.contains("chief marketing officer"));
        assert!(prompt.contains("for the CMO perspective"));
    }

    #[test]
    fn test_human_prompt_embeds_both_blocks() {
        let prompt = build_human_prompt("Apple Inc.", "SALES BLOCK", "RESEARCH BLOCK");
        assert!(prompt.contains("for Apple Inc."));
        let sales_at = prompt.find("SALES BLOCK").unwrap();
        let research_at = prompt.find("RESEARCH BLOCK").unwrap();
        assert!(sales_at < research_at, "sales block must come first");
        assert!(prompt.ends_with("specified in the system prompt."));
    }
}
