//! Axum route handlers for the Report API.

use std::io::Write;

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::analytics::summary::{summarize_csv, SalesSummary};
use crate::errors::AppError;
use crate::report::models::ExecutiveReport;
use crate::report::scoring::QualityScore;
use crate::report::synthesizer::generate_executive_report;
use crate::research::{ResearchBundle, ResearchError};
use crate::state::AppState;

/// Response for a generated briefing. `quality_score` is absent whenever the
/// scorer was unavailable; `warnings` carries degradations (e.g. research
/// skipped) that did not block generation.
#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub report_id: Uuid,
    pub company_name: String,
    pub executive_role: String,
    pub decoder_backend: String,
    pub sales_summary: SalesSummary,
    pub research_available: bool,
    pub report: ExecutiveReport,
    pub quality_score: Option<QualityScore>,
    pub warnings: Vec<String>,
}

/// Parsed multipart fields for a generation request.
struct GenerateFields {
    company_name: String,
    executive_role: String,
    sales_data: Vec<u8>,
}

/// POST /api/v1/reports
///
/// Multipart form: `company_name`, `executive_role`, and a `sales_data` CSV
/// file. Runs the full pipeline: summarize → research (optional, degrades
/// gracefully) → synthesize → score (best-effort).
pub async fn handle_generate_report(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Json<ReportResponse>, AppError> {
    let fields = read_multipart_fields(multipart).await?;
    let mut warnings = Vec::new();

    // Materialize the upload; the temp file is removed on drop on both the
    // success and failure paths.
    let mut temp_file = tempfile::NamedTempFile::new()
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Could not create temp file: {e}")))?;
    temp_file
        .write_all(&fields.sales_data)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("Could not write temp file: {e}")))?;

    let summary = summarize_csv(temp_file.path())?;
    info!(
        "Sales data processed for {}: total sales {}",
        fields.company_name, summary.total_sales
    );

    let research = run_research(&state, &fields.company_name, &summary, &mut warnings).await;

    let (report, quality_score) = generate_executive_report(
        &state.llm,
        state.decoder.as_ref(),
        &fields.company_name,
        &fields.executive_role,
        &summary,
        research.as_ref(),
    )
    .await?;

    Ok(Json(ReportResponse {
        report_id: Uuid::new_v4(),
        company_name: fields.company_name,
        executive_role: fields.executive_role,
        decoder_backend: state.decoder.mode().as_str().to_string(),
        sales_summary: summary,
        research_available: research.is_some(),
        report,
        quality_score,
        warnings,
    }))
}

/// Runs industry research when a search client is configured.
/// Any failure — including auth — degrades to no research with a warning;
/// the report is still generated from sales data alone.
async fn run_research(
    state: &AppState,
    company_name: &str,
    summary: &SalesSummary,
    warnings: &mut Vec<String>,
) -> Option<ResearchBundle> {
    let search = match &state.search {
        Some(search) => search,
        None => {
            warnings.push(
                "Search API key not configured. Skipping industry research.".to_string(),
            );
            return None;
        }
    };

    match search.research(company_name, &summary.product_names()).await {
        Ok(bundle) => Some(bundle),
        Err(ResearchError::Auth(msg)) => {
            warn!("Research authentication failed: {msg}");
            warnings.push(
                "Industry research authentication failed. Continuing with sales data only."
                    .to_string(),
            );
            None
        }
        Err(e) => {
            warn!("Industry research failed: {e}");
            warnings.push(format!(
                "Industry research failed: {e}. Continuing with sales data only."
            ));
            None
        }
    }
}

async fn read_multipart_fields(mut multipart: Multipart) -> Result<GenerateFields, AppError> {
    let mut company_name = None;
    let mut executive_role = None;
    let mut sales_data = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart request: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "company_name" => {
                company_name = Some(read_text_field(field, "company_name").await?);
            }
            "executive_role" => {
                executive_role = Some(read_text_field(field, "executive_role").await?);
            }
            "sales_data" => {
                let bytes = field.bytes().await.map_err(|e| {
                    AppError::Validation(format!("Could not read sales_data upload: {e}"))
                })?;
                sales_data = Some(bytes.to_vec());
            }
            other => {
                warn!("Ignoring unexpected multipart field '{other}'");
            }
        }
    }

    let company_name = require_field(company_name, "company_name")?;
    let executive_role = require_field(executive_role, "executive_role")?;
    let sales_data = sales_data
        .filter(|d| !d.is_empty())
        .ok_or_else(|| AppError::Validation("sales_data file is required".to_string()))?;

    Ok(GenerateFields {
        company_name,
        executive_role,
        sales_data,
    })
}

async fn read_text_field(
    field: axum::extract::multipart::Field<'_>,
    name: &str,
) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|e| AppError::Validation(format!("Could not read field '{name}': {e}")))
}

fn require_field(value: Option<String>, name: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("{name} cannot be empty")))
}
