//! `gitsem stats`: summary of the on-disk index.

use crate::commands::Workspace;
use crate::display::create_stats_table;
use crate::error::GitsemResult;
use crate::io::ExitCode;
use crate::storage::index_stats;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct StatsArgs {
    /// Embedding model whose index to describe
    #[arg(long)]
    pub model: Option<String>,
}

pub fn run(args: &StatsArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let paths = workspace.index_paths(args.model.as_deref())?;
    let stats = index_stats(&paths)?;
    println!("Index: {}", paths.dir.display());
    println!("{}", create_stats_table(&stats));
    Ok(ExitCode::Success)
}
