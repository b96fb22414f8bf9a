//! Research Service — issues topic searches against the Tavily API and
//! returns a typed bundle of results for the generation prompt.
//!
//! Failure policy: a single failed query degrades to an empty list for that
//! category only. An auth/config failure of the service itself surfaces as
//! `ResearchError::Auth` so the caller can decide to proceed without research.

use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

const TAVILY_API_URL: &str = "https://api.tavily.com/search";

/// Result counts per query category.
const COMPANY_RESULTS: u32 = 3;
const PRODUCT_RESULTS: u32 = 2;
const INDUSTRY_RESULTS: u32 = 3;
const COMPETITIVE_RESULTS: u32 = 3;

/// At most this many products get their own trend query.
const MAX_PRODUCT_QUERIES: usize = 3;

#[derive(Debug, Error)]
pub enum ResearchError {
    /// Invalid or missing credentials — the whole service is unusable.
    #[error("Research authentication failed: {0}")]
    Auth(String),

    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search API error (status {status}): {message}")]
    Api { status: u16, message: String },
}

/// A single ranked search hit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub published_date: String,
}

/// Four ordered result lists, one per query category. Any list may be empty;
/// duplicates across lists are kept because each query is independent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResearchBundle {
    pub company_trends: Vec<SearchResult>,
    pub product_trends: Vec<SearchResult>,
    pub industry_news: Vec<SearchResult>,
    pub competitive_landscape: Vec<SearchResult>,
}

impl ResearchBundle {
    pub fn is_empty(&self) -> bool {
        self.company_trends.is_empty()
            && self.product_trends.is_empty()
            && self.industry_news.is_empty()
            && self.competitive_landscape.is_empty()
    }
}

#[derive(Debug, Serialize)]
struct TavilyRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    search_depth: &'a str,
    max_results: u32,
    include_answer: bool,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

/// Tavily search client shared across report requests.
#[derive(Clone)]
pub struct SearchClient {
    client: Client,
    api_key: String,
}

impl SearchClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    /// Runs the full four-category research pass for a company.
    ///
    /// Per-query failures are swallowed into empty lists; only auth failures
    /// abort the whole call.
    pub async fn research(
        &self,
        company_name: &str,
        product_names: &[String],
    ) -> Result<ResearchBundle, ResearchError> {
        let company_query =
            format!("{company_name} latest news trends 2024 2025 business strategy");
        let company_trends = self.search_or_empty(&company_query, COMPANY_RESULTS).await?;

        let mut product_trends = Vec::new();
        for product in product_names.iter().take(MAX_PRODUCT_QUERIES) {
            let query = format!("{product} market trends 2024 2025 industry analysis");
            product_trends.extend(self.search_or_empty(&query, PRODUCT_RESULTS).await?);
        }

        let industry_query =
            format!("{company_name} industry market analysis competitive landscape 2024");
        let industry_news = self.search_or_empty(&industry_query, INDUSTRY_RESULTS).await?;

        let competitive_query = format!("{company_name} competitors market share analysis 2024");
        let competitive_landscape = self
            .search_or_empty(&competitive_query, COMPETITIVE_RESULTS)
            .await?;

        let bundle = ResearchBundle {
            company_trends,
            product_trends,
            industry_news,
            competitive_landscape,
        };
        info!(
            "Research complete: {} company, {} product, {} industry, {} competitive results",
            bundle.company_trends.len(),
            bundle.product_trends.len(),
            bundle.industry_news.len(),
            bundle.competitive_landscape.len()
        );
        Ok(bundle)
    }

    /// Runs one query; transient failures become an empty result list,
    /// auth failures propagate.
    async fn search_or_empty(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchResult>, ResearchError> {
        match self.search(query, max_results).await {
            Ok(results) => Ok(results),
            Err(ResearchError::Auth(msg)) => Err(ResearchError::Auth(msg)),
            Err(e) => {
                warn!("Search error for query '{query}': {e}");
                Ok(Vec::new())
            }
        }
    }

    /// Performs a single Tavily search.
    pub async fn search(
        &self,
        query: &str,
        max_results: u32,
    ) -> Result<Vec<SearchResult>, ResearchError> {
        let request = TavilyRequest {
            api_key: &self.api_key,
            query,
            search_depth: "advanced",
            max_results,
            include_answer: true,
            include_raw_content: false,
        };

        let response = self
            .client
            .post(TAVILY_API_URL)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Auth(body));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ResearchError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let parsed: TavilyResponse = response.json().await?;
        Ok(parsed.results)
    }
}

/// Printed content lengths per rendered category.
const COMPANY_TREND_CHARS: usize = 300;
const OTHER_CATEGORY_CHARS: usize = 250;

/// Renders the research block embedded in the generation prompt.
///
/// An absent or fully empty bundle yields the fixed placeholder so the
/// pipeline still produces a briefing from sales data alone.
pub fn render_research_summary(research: Option<&ResearchBundle>, company_name: &str) -> String {
    let bundle = match research {
        Some(b) if !b.is_empty() => b,
        _ => {
            return format!(
                "Industry Research Summary for {company_name}:\n\n\
                 No industry research data available. Analysis will be based on sales data only.\n"
            );
        }
    };

    let mut block = format!(
        "Industry Research Summary for {company_name}:\n\nCOMPANY-SPECIFIC TRENDS:\n"
    );
    render_category(&mut block, &bundle.company_trends, 3, COMPANY_TREND_CHARS);

    block.push_str("PRODUCT MARKET TRENDS:\n");
    render_category(&mut block, &bundle.product_trends, 4, OTHER_CATEGORY_CHARS);

    block.push_str("INDUSTRY NEWS & ANALYSIS:\n");
    render_category(&mut block, &bundle.industry_news, 3, OTHER_CATEGORY_CHARS);

    block.push_str("COMPETITIVE LANDSCAPE:\n");
    render_category(&mut block, &bundle.competitive_landscape, 3, OTHER_CATEGORY_CHARS);

    block
}

fn render_category(block: &mut String, results: &[SearchResult], limit: usize, chars: usize) {
    for (i, result) in results.iter().take(limit).enumerate() {
        block.push_str(&format!(
            "{}. {}\n   {}...\n   Source: {}\n\n",
            i + 1,
            result.title,
            truncate_chars(&result.content, chars),
            result.url
        ));
    }
}

/// Truncates at a character (not byte) boundary.
fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
