//! CLI entry point for gitsem.
//!
//! Parses arguments, loads layered settings, installs logging and hands off
//! to the command implementations in `gitsem::commands`.

use anyhow::Context;
use clap::{
    Parser, Subcommand,
    builder::styling::{AnsiColor, Effects, Styles},
};
use gitsem::commands::benchmark::BenchmarkArgs;
use gitsem::commands::doctor::DoctorArgs;
use gitsem::commands::index::IndexArgs;
use gitsem::commands::init::InitArgs;
use gitsem::commands::search::SearchCommandArgs;
use gitsem::commands::serve::ServeArgs;
use gitsem::commands::stats::StatsArgs;
use gitsem::commands::update::UpdateArgs;
use gitsem::commands::{self, Workspace};
use gitsem::display::THEME;
use gitsem::io::ExitCode;
use gitsem::{GitsemError, Settings};
use std::path::PathBuf;

fn clap_cargo_style() -> Styles {
    Styles::styled()
        .header(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .usage(AnsiColor::Cyan.on_default() | Effects::BOLD)
        .literal(AnsiColor::Green.on_default())
        .placeholder(AnsiColor::Green.on_default())
}

#[derive(Parser)]
#[command(
    name = "gitsem",
    version = env!("CARGO_PKG_VERSION"),
    about = "Semantic search over git commit history",
    long_about = "Embed every commit of a repository and search them with hybrid semantic, lexical and recency ranking.",
    next_line_help = true,
    styles = clap_cargo_style(),
    after_help = "Examples:\n  gitsem init\n  gitsem index --full\n  gitsem search \"fix token refresh race\" -n 5\n  gitsem search \"flaky test\" --author ada --after 2024-01-01 --format json\n  gitsem update\n  echo \"retry logic\" | gitsem serve --jsonl"
)]
struct Cli {
    /// Path to a settings.toml other than .gitsem/settings.toml
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose logging on stderr
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Create the index directory, settings and model metadata")]
    Init(InitArgs),

    #[command(about = "Embed the full commit history into a fresh index")]
    Index(IndexArgs),

    #[command(about = "Embed commits added since the last index or update")]
    Update(UpdateArgs),

    #[command(about = "Search commits by meaning")]
    Search(SearchCommandArgs),

    #[command(
        about = "Answer queries read line by line from stdin",
        after_help = "Commands:\n  :reload  reload the index and model\n  :quit    stop (also :exit)"
    )]
    Serve(ServeArgs),

    #[command(about = "Show index statistics")]
    Stats(StatsArgs),

    #[command(about = "Check index health and optionally repair it")]
    Doctor(DoctorArgs),

    #[command(about = "Benchmark heap top-K against a full sort")]
    Benchmark(BenchmarkArgs),
}

fn load_settings(cli: &Cli) -> anyhow::Result<Settings> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from(path)
            .with_context(|| format!("loading settings from {}", path.display()))?,
        None => Settings::load()?,
    };
    settings.validate()?;
    Ok(settings)
}

fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let settings = load_settings(cli)?;
    gitsem::logging::init(&settings, cli.debug);
    gitsem::config::set_global_debug(cli.debug || settings.debug);

    let workspace = Workspace::discover(settings)?;
    let code = match &cli.command {
        Commands::Init(args) => commands::init::run(args, &workspace)?,
        Commands::Index(args) => commands::index::run(args, &workspace)?,
        Commands::Update(args) => commands::update::run(args, &workspace)?,
        Commands::Search(args) => commands::search::run(args, &workspace)?,
        Commands::Serve(args) => commands::serve::run(args, &workspace)?,
        Commands::Stats(args) => commands::stats::run(args, &workspace)?,
        Commands::Doctor(args) => commands::doctor::run(args, &workspace)?,
        Commands::Benchmark(args) => commands::benchmark::run(args, &workspace)?,
    };
    Ok(code)
}

fn report(error: &anyhow::Error) -> ExitCode {
    eprintln!("{}", THEME.error_with_icon(&format!("{error:#}")));
    match error.downcast_ref::<GitsemError>() {
        Some(err) => {
            for suggestion in err.recovery_suggestions() {
                eprintln!("  - {suggestion}");
            }
            ExitCode::from_error(err)
        }
        None => ExitCode::GeneralError,
    }
}

fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(&cli) {
        Ok(code) => code.into(),
        Err(error) => report(&error).into(),
    }
}
