//! Query execution and result presentation.

pub mod engine;
pub mod filters;
pub mod format;
pub mod payload;

pub use engine::{
    MAX_LIMIT, SearchContext, SearchOptions, embed_query, execute_search, hybrid_score,
};
pub use filters::SearchFilters;
pub use format::{
    OutputFormat, ensure_format_available, no_result_suggestions, render_json, render_markdown,
    render_no_results, render_payload, render_text,
};
pub use payload::{PayloadFilters, RankedResult, SearchPayload};
