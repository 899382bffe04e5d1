//! Output formats and renderers for search results.

use crate::display::THEME;
use crate::error::{GitsemError, GitsemResult};
use crate::plugins::PluginRegistry;
use crate::search::filters::SearchFilters;
use crate::search::payload::SearchPayload;
use serde::Serialize;
use std::fmt::{self, Write as _};
use std::str::FromStr;

/// Built-in formats plus a named extension resolved through the registry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Markdown,
    Json,
    Named(String),
}

impl OutputFormat {
    pub fn as_str(&self) -> &str {
        match self {
            OutputFormat::Text => "text",
            OutputFormat::Markdown => "markdown",
            OutputFormat::Json => "json",
            OutputFormat::Named(name) => name,
        }
    }

    /// Threshold used when `--min-score` is not given.
    pub fn default_min_score(&self) -> f32 {
        match self {
            OutputFormat::Json => 0.0,
            _ => 0.15,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "" => Err("output format cannot be empty".to_string()),
            "text" => Ok(OutputFormat::Text),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            "json" => Ok(OutputFormat::Json),
            other => Ok(OutputFormat::Named(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn pct(value: f32) -> String {
    format!("{:.1}%", value * 100.0)
}

fn weights_line(payload: &SearchPayload, disabled_note: &str) -> String {
    let w = &payload.score_weights;
    format!(
        "semantic={:.2}, lexical={:.2}, recency={:.2}{}",
        w.semantic,
        w.lexical,
        w.recency,
        if w.recency_boost_enabled { "" } else { disabled_note }
    )
}

pub fn render_text(payload: &SearchPayload) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{}",
        THEME.apply(&THEME.header, format!("Semantic results for: \"{}\"", payload.query))
    );
    let _ = writeln!(
        out,
        "{}",
        THEME.apply(
            &THEME.dim,
            format!(
                "Model: {} · Indexed: {} · Matched: {} · Showing: {}",
                payload.model,
                payload.total_indexed_commits,
                payload.matched_commits,
                payload.returned_results
            )
        )
    );
    if payload.explain {
        let _ = writeln!(
            out,
            "Weights: {} · strategy {}",
            weights_line(payload, " (recency boost disabled)"),
            payload.strategy
        );
    }
    out.push('\n');

    for result in &payload.results {
        let _ = writeln!(
            out,
            "{}. {}",
            result.rank,
            THEME.apply(&THEME.emphasis, &result.message)
        );
        let _ = writeln!(
            out,
            "   {} · {} · {} · score {}",
            THEME.apply(&THEME.hash, &result.hash),
            result.author,
            result.date,
            THEME.apply(&THEME.number, pct(result.score))
        );
        if payload.explain {
            let _ = writeln!(
                out,
                "   components: semantic {} · lexical {} · recency {}",
                pct(result.semantic_score),
                pct(result.lexical_score),
                pct(result.recency_score)
            );
        }
        if !result.files.is_empty() {
            let _ = writeln!(
                out,
                "   files: {}",
                THEME.apply(&THEME.file, result.files.join(", "))
            );
        }
        if let Some(snippet) = &result.snippet {
            out.push_str("   snippet:\n");
            for line in snippet.lines() {
                let _ = writeln!(out, "     {line}");
            }
        }
        out.push('\n');
    }
    out
}

pub fn render_markdown(payload: &SearchPayload) -> String {
    let mut out = String::from("# Semantic search results\n\n");
    let _ = writeln!(out, "- **Query:** `{}`", payload.query);
    let _ = writeln!(out, "- **Model:** `{}`", payload.model);
    let _ = writeln!(out, "- **Indexed commits:** {}", payload.total_indexed_commits);
    let _ = writeln!(out, "- **Filter match count:** {}", payload.matched_commits);
    let _ = writeln!(out, "- **Returned results:** {}", payload.returned_results);
    if payload.explain {
        let _ = writeln!(out, "- **Weights:** {}", weights_line(payload, " (disabled)"));
        let _ = writeln!(out, "- **Strategy:** `{}`", payload.strategy);
    }
    out.push('\n');

    for result in &payload.results {
        let _ = writeln!(out, "## {}. {}\n", result.rank, result.message);
        let _ = writeln!(out, "- **Commit:** `{}`", result.hash);
        let _ = writeln!(out, "- **Author:** {}", result.author);
        let _ = writeln!(out, "- **Date:** {}", result.date);
        let _ = writeln!(out, "- **Score:** {}", pct(result.score));
        if payload.explain {
            let _ = writeln!(out, "- **Semantic:** {}", pct(result.semantic_score));
            let _ = writeln!(out, "- **Lexical:** {}", pct(result.lexical_score));
            let _ = writeln!(out, "- **Recency:** {}", pct(result.recency_score));
        }
        if !result.files.is_empty() {
            let files: Vec<String> = result.files.iter().map(|f| format!("`{f}`")).collect();
            let _ = writeln!(out, "- **Files:** {}", files.join(", "));
        }
        if let Some(snippet) = &result.snippet {
            let _ = writeln!(out, "- **Snippet:**\n```diff\n{snippet}\n```");
        }
        out.push('\n');
    }
    out
}

pub fn render_json<T: Serialize>(value: &T) -> GitsemResult<String> {
    serde_json::to_string_pretty(value)
        .map_err(|e| GitsemError::General(format!("cannot serialise search output: {e}")))
}

/// Render with the built-in renderer, or the registry's formatter for a
/// named format.
pub fn render_payload(
    payload: &SearchPayload,
    format: &OutputFormat,
    registry: Option<&PluginRegistry>,
) -> GitsemResult<String> {
    match format {
        OutputFormat::Text => Ok(render_text(payload)),
        OutputFormat::Markdown => Ok(render_markdown(payload)),
        OutputFormat::Json => render_json(payload),
        OutputFormat::Named(name) => {
            let formatter = registry
                .and_then(|r| r.output_formatter(name))
                .ok_or_else(|| unknown_format(name, registry))?;
            formatter.render(payload)
        }
    }
}

/// Fail early for a named format no plugin provides.
pub fn ensure_format_available(
    format: &OutputFormat,
    registry: Option<&PluginRegistry>,
) -> GitsemResult<()> {
    match format {
        OutputFormat::Named(name) if registry.and_then(|r| r.output_formatter(name)).is_none() => {
            Err(unknown_format(name, registry))
        }
        _ => Ok(()),
    }
}

fn unknown_format(name: &str, registry: Option<&PluginRegistry>) -> GitsemError {
    let mut known = vec!["text", "markdown", "json"];
    if let Some(registry) = registry {
        known.extend(registry.formatter_names());
    }
    GitsemError::config(format!(
        "unknown output format '{name}'. Available: {}",
        known.join(", ")
    ))
}

/// Hints shown when a search returns nothing.
pub fn no_result_suggestions(
    filters: &SearchFilters,
    explicit_min_score: bool,
    min_score: f32,
) -> Vec<String> {
    let mut suggestions = Vec::with_capacity(3);
    if explicit_min_score {
        suggestions.push(format!("Lower --min-score below {min_score:.2}."));
    } else {
        suggestions.push(format!(
            "Try lowering --min-score (default for this output mode is {min_score:.2})."
        ));
    }
    if filters.is_empty() {
        suggestions.push("Increase -n/--limit to inspect more candidates.".to_string());
    } else {
        suggestions.push("Relax filters: --author, --file, --after, or --before.".to_string());
    }
    suggestions.push("Try broader query terms or remove rare keywords.".to_string());
    suggestions
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NoResults<'a> {
    query: &'a str,
    model: &'a str,
    message: &'static str,
    min_score: f32,
    suggestions: &'a [String],
}

pub fn render_no_results(
    format: &OutputFormat,
    query: &str,
    model: &str,
    min_score: f32,
    suggestions: &[String],
) -> GitsemResult<String> {
    match format {
        OutputFormat::Json => render_json(&NoResults {
            query,
            model,
            message: "No results",
            min_score,
            suggestions,
        }),
        OutputFormat::Markdown => {
            let mut out = String::from("# Semantic search results\n\n- **Message:** No results\n");
            let _ = writeln!(out, "- **Model:** `{model}`");
            let _ = writeln!(out, "- **Min score threshold:** {min_score:.2}\n");
            out.push_str("## Suggestions\n\n");
            for suggestion in suggestions {
                let _ = writeln!(out, "- {suggestion}");
            }
            Ok(out)
        }
        OutputFormat::Text | OutputFormat::Named(_) => {
            let mut out = format!("{}\nSuggestions:\n", THEME.warning_with_icon("No results."));
            for suggestion in suggestions {
                let _ = writeln!(out, "- {suggestion}");
            }
            Ok(out)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::search::payload::RankedResult;

    fn payload() -> SearchPayload {
        let mut payload = SearchPayload::empty("token", "gitsem/hash-64");
        payload.total_indexed_commits = 3;
        payload.matched_commits = 3;
        payload.returned_results = 1;
        payload.results.push(RankedResult {
            rank: 1,
            score: 0.5,
            semantic_score: 0.25,
            lexical_score: 1.0,
            recency_score: 0.0,
            hash: "abc123".to_string(),
            date: "2024-01-01T00:00:00Z".to_string(),
            author: "Ada".to_string(),
            message: "Fix token refresh".to_string(),
            files: vec!["src/auth.rs".to_string()],
            snippet: Some("+fixed".to_string()),
        });
        payload
    }

    #[test]
    fn test_parse_format() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("md".parse::<OutputFormat>().unwrap(), OutputFormat::Markdown);
        assert_eq!(
            "csv".parse::<OutputFormat>().unwrap(),
            OutputFormat::Named("csv".to_string())
        );
        assert!("".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Json.default_min_score(), 0.0);
        assert_eq!(OutputFormat::Text.default_min_score(), 0.15);
    }

    #[test]
    fn test_text_and_markdown_render_results() {
        let text = render_text(&payload());
        assert!(text.contains("1. Fix token refresh"));
        assert!(text.contains("score 50.0%"));
        assert!(text.contains("     +fixed"));
        assert!(!text.contains("components:"));

        let mut explained = payload();
        explained.explain = true;
        assert!(render_text(&explained).contains("components: semantic 25.0%"));

        let md = render_markdown(&payload());
        assert!(md.contains("## 1. Fix token refresh"));
        assert!(md.contains("- **Files:** `src/auth.rs`"));
        assert!(md.contains("```diff\n+fixed\n```"));
    }

    #[test]
    fn test_named_format_needs_a_formatter() {
        let format = OutputFormat::Named("csv".to_string());
        let err = render_payload(&payload(), &format, None).unwrap_err();
        assert!(err.to_string().contains("unknown output format 'csv'"));
        assert!(ensure_format_available(&format, Some(&PluginRegistry::new())).is_err());
        assert!(ensure_format_available(&OutputFormat::Json, None).is_ok());
    }

    #[test]
    fn test_no_result_suggestions() {
        let plain = no_result_suggestions(&SearchFilters::default(), false, 0.15);
        assert_eq!(plain.len(), 3);
        assert!(plain[0].contains("default for this output mode is 0.15"));
        assert!(plain[1].contains("--limit"));

        let filtered = SearchFilters {
            author: Some("ada".to_string()),
            ..Default::default()
        };
        let hints = no_result_suggestions(&filtered, true, 0.4);
        assert_eq!(hints[0], "Lower --min-score below 0.40.");
        assert!(hints[1].starts_with("Relax filters"));

        let json = render_no_results(&OutputFormat::Json, "q", "m", 0.0, &hints).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["message"], "No results");
        assert_eq!(value["suggestions"].as_array().unwrap().len(), 3);
    }
}
