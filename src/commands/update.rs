//! `gitsem update`: embed commits added since the last run.

use crate::commands::{IndexingArgs, Workspace};
use crate::display::{THEME, create_progress_bar};
use crate::error::GitsemResult;
use crate::indexing::{UpdateRequest, run_update};
use crate::io::ExitCode;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct UpdateArgs {
    #[command(flatten)]
    pub indexing: IndexingArgs,
}

/// Flags left unset keep what the index was built with.
pub fn build_request(args: &IndexingArgs, workspace: &Workspace) -> GitsemResult<UpdateRequest> {
    let settings = &workspace.settings;
    Ok(UpdateRequest {
        include_patch: args.full.then_some(true),
        batch_size: args.batch_size.unwrap_or(settings.indexing.batch_size),
        vector_dtype: args.dtype,
        include: workspace.include_patterns(&args.include),
        exclude: workspace.exclude_patterns(&args.exclude)?,
        build_ann: args.ann.unwrap_or(settings.indexing.build_ann),
        ann: settings.ann.clone(),
        recovery_window_days: settings.update.recovery_window_days,
    })
}

pub fn run(args: &UpdateArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let request = build_request(&args.indexing, workspace)?;
    let paths = workspace.index_paths(None)?;
    let git = workspace.git()?;
    let registry = workspace.registry();

    let progress = create_progress_bar(0, "Embedding new commits");
    let report = run_update(
        &git,
        |model| {
            println!("Embedding new commits using {model}");
            workspace.embedder(model, &registry, true)
        },
        &paths,
        &request,
        &progress,
    )?;

    if let Some(start) = report.window_start {
        eprintln!(
            "{}",
            THEME.warning_with_icon(&format!(
                "Indexed history diverged (rebase or force-push). Re-derived commits since {}; run `gitsem index` for a full rebuild.",
                start.to_rfc3339()
            ))
        );
    }
    if report.up_to_date {
        println!("Index is already up to date.");
    } else {
        println!(
            "{}",
            THEME.success_with_icon(&format!(
                "Updated index with {} commits ({} total) at {}",
                report.embedded,
                report.total,
                paths.index_file.display()
            ))
        );
    }
    Ok(ExitCode::Success)
}
