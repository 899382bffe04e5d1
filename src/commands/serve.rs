//! `gitsem serve`: answer one query per stdin line with JSON on stdout.
//!
//! Control lines: `:reload` re-reads the index and embedder, `:quit` and
//! `:exit` stop the loop. Blank lines are ignored.

use crate::commands::search::SearchSession;
use crate::commands::{SearchArgs, Workspace};
use crate::error::{ErrorContext, GitsemError, GitsemResult};
use crate::git::GitRepository;
use crate::io::ExitCode;
use crate::lexical::LexicalCacheStore;
use crate::plugins::PluginRegistry;
use crate::search::{OutputFormat, SearchOptions, SearchPayload};
use clap::Args;
use serde_json::{Value, json};
use std::io::{BufRead, Write};

#[derive(Args, Debug, Clone, Default)]
pub struct ServeArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// One compact JSON object per line instead of pretty-printed JSON
    #[arg(long)]
    pub jsonl: bool,
}

/// What the loop talks to. Split out so the loop runs without a model.
pub trait QueryHandler {
    fn query(&self, query: &str) -> GitsemResult<Option<SearchPayload>>;

    /// Reload state and describe what is now loaded.
    fn reload(&mut self) -> GitsemResult<String>;
}

struct ServeState<'a> {
    workspace: &'a Workspace,
    model: Option<String>,
    options: SearchOptions,
    registry: PluginRegistry,
    lexical: LexicalCacheStore,
    git: Option<GitRepository>,
    session: SearchSession,
}

fn describe(session: &SearchSession) -> String {
    format!(
        "model={}, commits={}",
        session.index.model_name,
        session.index.commits.len()
    )
}

impl QueryHandler for ServeState<'_> {
    fn query(&self, query: &str) -> GitsemResult<Option<SearchPayload>> {
        self.session.search(
            query,
            &self.options,
            &self.lexical,
            self.git.as_ref(),
            &self.registry,
        )
    }

    fn reload(&mut self) -> GitsemResult<String> {
        self.session = SearchSession::open(self.workspace, self.model.as_deref(), &self.registry)?;
        Ok(describe(&self.session))
    }
}

fn write_json(output: &mut impl Write, value: &Value, jsonl: bool) -> GitsemResult<()> {
    let text = if jsonl {
        serde_json::to_string(value)
    } else {
        serde_json::to_string_pretty(value)
    }
    .map_err(|e| GitsemError::General(format!("cannot serialise response: {e}")))?;
    writeln!(output, "{text}").context("cannot write response")?;
    output.flush().context("cannot write response")
}

/// Drive `handler` from `input` until EOF or a quit command.
pub fn serve_loop(
    input: impl BufRead,
    output: &mut impl Write,
    handler: &mut dyn QueryHandler,
    jsonl: bool,
) -> GitsemResult<()> {
    for line in input.lines() {
        let line = line.context("cannot read from stdin")?;
        let query = line.trim();
        match query {
            "" => continue,
            ":quit" | ":exit" => break,
            ":reload" => {
                match handler.reload() {
                    Ok(description) => eprintln!("reloaded ({description})"),
                    Err(e) => {
                        tracing::error!(error = %e, "reload failed; keeping the previous index");
                        write_json(output, &json!({ "query": query, "error": e.to_string() }), jsonl)?;
                    }
                }
                continue;
            }
            _ => {}
        }

        let response = match handler.query(query) {
            Ok(Some(payload)) => serde_json::to_value(&payload)
                .map_err(|e| GitsemError::General(format!("cannot serialise response: {e}")))?,
            Ok(None) if jsonl => json!({ "query": query, "results": [] }),
            Ok(None) => json!({ "query": query, "message": "No results" }),
            Err(e) => json!({ "query": query, "error": e.to_string() }),
        };
        write_json(output, &response, jsonl)?;
    }
    Ok(())
}

pub fn run(args: &ServeArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let mut options = args.search.to_options(&workspace.settings);
    options.format = OutputFormat::Json;
    let registry = workspace.registry();
    let session = SearchSession::open(workspace, args.search.model.as_deref(), &registry)?;
    let git = if options.snippets {
        Some(workspace.git()?)
    } else {
        None
    };

    eprintln!("gitsem serve ready ({})", describe(&session));
    eprintln!("Type a query per line. Commands: :reload, :quit");

    let mut state = ServeState {
        workspace,
        model: args.search.model.clone(),
        options,
        registry,
        lexical: LexicalCacheStore::default(),
        git,
        session,
    };
    let stdin = std::io::stdin();
    let mut stdout = std::io::stdout();
    serve_loop(stdin.lock(), &mut stdout, &mut state, args.jsonl)?;
    Ok(ExitCode::Success)
}
