use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::report::decoder::ReportDecoder;
use crate::research::SearchClient;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub llm: LlmClient,
    /// `None` when no Tavily key is configured — research degrades to empty.
    pub search: Option<SearchClient>,
    /// Pluggable output decoder. Default: structured. Swap via DECODING_MODE env.
    pub decoder: Arc<dyn ReportDecoder>,
    /// Kept for handlers that need runtime settings beyond the clients above.
    #[allow(dead_code)]
    pub config: Config,
}
