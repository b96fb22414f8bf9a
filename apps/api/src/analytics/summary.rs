//! Sales summary aggregation.
//!
//! Pure function of the input table: no side effects, deterministic output.
//! Column names are normalized (lowercased, spaces → underscores) before
//! matching, and the sales value column is auto-detected from a fixed
//! priority list.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Sales-column candidates in priority order. The first normalized header
/// that matches wins, regardless of header position in the file.
const SALES_COLUMN_CANDIDATES: &[&str] =
    &["sales", "revenue_millions_usd", "revenue", "total_sales", "amount"];

/// Top-product market share above which the concentration-risk insight fires.
const CONCENTRATION_RISK_THRESHOLD: f64 = 50.0;

/// Per-group (product or region) aggregate statistics, rounded to 2 decimals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupStats {
    pub total_sales: f64,
    pub average_sales: f64,
    pub transaction_count: u64,
    /// Sample standard deviation of the group's sales values.
    /// 0.0 for single-transaction groups.
    pub sales_volatility: f64,
    pub market_share_percent: f64,
}

/// Aggregated view of the uploaded sales table.
///
/// `BTreeMap` keys give stable, sorted iteration order so rendered prompts
/// and JSON responses are deterministic for a given input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SalesSummary {
    pub product_stats: BTreeMap<String, GroupStats>,
    pub region_stats: BTreeMap<String, GroupStats>,
    pub total_sales: f64,
    /// Display-ordered insights: top product, top region, product count,
    /// region count, and conditionally a concentration-risk warning.
    pub insights: Vec<String>,
}

impl SalesSummary {
    /// Product names in stable (sorted) order — fed to the research service.
    pub fn product_names(&self) -> Vec<String> {
        self.product_stats.keys().cloned().collect()
    }
}

/// Parses and summarizes a CSV sales table from disk.
pub fn summarize_csv(path: &Path) -> Result<SalesSummary, AppError> {
    let file = std::fs::File::open(path)
        .map_err(|e| AppError::Schema(format!("Could not open sales file: {e}")))?;
    summarize_reader(file)
}

/// Parses and summarizes a CSV sales table from any reader.
pub fn summarize_reader<R: Read>(reader: R) -> Result<SalesSummary, AppError> {
    let mut csv_reader = csv::Reader::from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()
        .map_err(|e| AppError::Schema(format!("Could not read CSV headers: {e}")))?
        .iter()
        .map(normalize_column)
        .collect();

    let sales_idx = resolve_sales_column(&headers)?;
    let product_idx = require_column(&headers, "product")?;
    let region_idx = require_column(&headers, "region")?;

    let mut product_values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut region_values: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut total_sales = 0.0;

    for (row_number, record) in csv_reader.records().enumerate() {
        let record = record
            .map_err(|e| AppError::Schema(format!("Row {}: {e}", row_number + 1)))?;

        let product = record.get(product_idx).unwrap_or("").trim().to_string();
        let region = record.get(region_idx).unwrap_or("").trim().to_string();
        let raw_sales = record.get(sales_idx).unwrap_or("").trim();

        let sales: f64 = raw_sales.parse().map_err(|_| {
            AppError::Schema(format!(
                "Row {}: could not parse sales value '{raw_sales}'",
                row_number + 1
            ))
        })?;

        total_sales += sales;
        product_values.entry(product).or_default().push(sales);
        region_values.entry(region).or_default().push(sales);
    }

    if product_values.is_empty() {
        return Err(AppError::Schema(
            "No data rows found in sales file".to_string(),
        ));
    }

    let product_stats = aggregate_groups(&product_values, total_sales);
    let region_stats = aggregate_groups(&region_values, total_sales);
    let insights = generate_insights(&product_stats, &region_stats);

    Ok(SalesSummary {
        product_stats,
        region_stats,
        total_sales: round2(total_sales),
        insights,
    })
}

/// Lowercases a raw header and replaces spaces with underscores.
fn normalize_column(raw: &str) -> String {
    raw.trim().to_lowercase().replace(' ', "_")
}

fn resolve_sales_column(headers: &[String]) -> Result<usize, AppError> {
    for candidate in SALES_COLUMN_CANDIDATES {
        if let Some(idx) = headers.iter().position(|h| h == candidate) {
            return Ok(idx);
        }
    }
    Err(AppError::Schema(format!(
        "Could not find sales column. Available columns: {headers:?}"
    )))
}

fn require_column(headers: &[String], name: &str) -> Result<usize, AppError> {
    headers.iter().position(|h| h == name).ok_or_else(|| {
        AppError::Schema(format!(
            "Missing required column: '{name}'. Available columns: {headers:?}"
        ))
    })
}

fn aggregate_groups(
    groups: &BTreeMap<String, Vec<f64>>,
    grand_total: f64,
) -> BTreeMap<String, GroupStats> {
    groups
        .iter()
        .map(|(key, values)| {
            let sum: f64 = values.iter().sum();
            let count = values.len() as u64;
            let mean = sum / count as f64;
            let share = if grand_total != 0.0 {
                sum / grand_total * 100.0
            } else {
                0.0
            };
            (
                key.clone(),
                GroupStats {
                    total_sales: round2(sum),
                    average_sales: round2(mean),
                    transaction_count: count,
                    sales_volatility: round2(sample_std_dev(values, mean)),
                    market_share_percent: round2(share),
                },
            )
        })
        .collect()
}

/// Sample standard deviation (n - 1 denominator). 0.0 when n < 2.
fn sample_std_dev(values: &[f64], mean: f64) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let sum_sq: f64 = values.iter().map(|v| (v - mean).powi(2)).sum();
    (sum_sq / (values.len() - 1) as f64).sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Generates the fixed-order insight list: always 4 items, plus a 5th
/// concentration-risk item iff the top product's share exceeds 50%.
fn generate_insights(
    product_stats: &BTreeMap<String, GroupStats>,
    region_stats: &BTreeMap<String, GroupStats>,
) -> Vec<String> {
    let mut insights = Vec::new();

    let (top_product, top_product_stats) = top_by_total_sales(product_stats);
    insights.push(format!(
        "Top performing product: {top_product} with ${} in sales",
        format_usd(top_product_stats.total_sales)
    ));

    let (top_region, top_region_stats) = top_by_total_sales(region_stats);
    insights.push(format!(
        "Top performing region: {top_region} with ${} in sales",
        format_usd(top_region_stats.total_sales)
    ));

    insights.push(format!(
        "Portfolio consists of {} products",
        product_stats.len()
    ));
    insights.push(format!("Operating in {} regions", region_stats.len()));

    if top_product_stats.market_share_percent > CONCENTRATION_RISK_THRESHOLD {
        insights.push(format!(
            "High product concentration risk: {top_product} represents {}% of total sales",
            top_product_stats.market_share_percent
        ));
    }

    insights
}

/// Highest total-sales entry; ties resolve to the first key in sorted order.
fn top_by_total_sales(stats: &BTreeMap<String, GroupStats>) -> (&str, &GroupStats) {
    stats
        .iter()
        .max_by(|a, b| {
            a.1.total_sales
                .partial_cmp(&b.1.total_sales)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .map(|(k, v)| (k.as_str(), v))
        .expect("top_by_total_sales called with empty stats")
}

/// Formats a dollar amount with thousands separators and 2 decimals,
/// e.g. 2700000.0 → "2,700,000.00".
pub fn format_usd(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u128;
    let dollars = (cents / 100).to_string();
    let rem = cents % 100;

    let mut grouped = String::new();
    for (i, ch) in dollars.chars().enumerate() {
        if i > 0 && (dollars.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if negative { "-" } else { "" };
    format!("{sign}{grouped}.{rem:02}")
}

/// Renders the sales summary block embedded in the generation prompt.
/// Fixed layout: total line, product lines, region lines, insight lines.
pub fn render_sales_summary(summary: &SalesSummary, company_name: &str) -> String {
    let mut block = format!(
        "Sales Data Summary for {company_name}:\n\nTOTAL SALES: ${}\n\nPRODUCT PERFORMANCE:\n",
        format_usd(summary.total_sales)
    );

    for (product, stats) in &summary.product_stats {
        block.push_str(&format!(
            "- {product}: ${} ({}% market share)\n",
            format_usd(stats.total_sales),
            stats.market_share_percent
        ));
    }

    block.push_str("\nREGIONAL PERFORMANCE:\n");
    for (region, stats) in &summary.region_stats {
        block.push_str(&format!(
            "- {region}: ${} ({}% of total)\n",
            format_usd(stats.total_sales),
            stats.market_share_percent
        ));
    }

    block.push_str("\nKEY INSIGHTS:\n");
    for insight in &summary.insights {
        block.push_str(&format!("- {insight}\n"));
    }

    block
}
