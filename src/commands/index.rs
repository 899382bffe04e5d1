//! `gitsem index`: embed the full history and write a fresh index.

use crate::commands::{IndexingArgs, Workspace};
use crate::display::{THEME, create_progress_bar};
use crate::error::{ErrorContext, GitsemResult};
use crate::indexing::{IndexRequest, run_index};
use crate::io::ExitCode;
use crate::storage::InitMetadata;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct IndexArgs {
    /// Embedding model (defaults to the initialised, then configured model)
    #[arg(long)]
    pub model: Option<String>,

    #[command(flatten)]
    pub indexing: IndexingArgs,
}

/// Model to index with: flag, then init metadata, then settings.
fn resolve_model(args: &IndexArgs, workspace: &Workspace) -> String {
    if let Some(model) = &args.model {
        return model.clone();
    }
    match InitMetadata::load(&workspace.paths.metadata_path) {
        Ok(Some(metadata)) => metadata.model_name,
        Ok(None) => workspace.settings.model.clone(),
        Err(e) => {
            tracing::warn!(error = %e, "ignoring unreadable init metadata");
            workspace.settings.model.clone()
        }
    }
}

pub fn build_request(args: &IndexingArgs, workspace: &Workspace) -> GitsemResult<IndexRequest> {
    let settings = &workspace.settings.indexing;
    Ok(IndexRequest {
        repository_root: workspace.paths.repo_root.display().to_string(),
        include_patch: args.full || settings.include_patch,
        batch_size: args.batch_size.unwrap_or(settings.batch_size),
        vector_dtype: args.dtype.unwrap_or(settings.vector_dtype),
        include: workspace.include_patterns(&args.include),
        exclude: workspace.exclude_patterns(&args.exclude)?,
        build_ann: args.ann.unwrap_or(settings.build_ann),
        ann: workspace.settings.ann.clone(),
    })
}

pub fn run(args: &IndexArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let request = build_request(&args.indexing, workspace)?;
    let model = resolve_model(args, workspace);
    let paths = workspace.index_paths(args.model.as_deref())?;
    std::fs::create_dir_all(&workspace.paths.cache_dir).write_path(&workspace.paths.cache_dir)?;

    let git = workspace.git()?;
    let registry = workspace.registry();
    let embedder = workspace.embedder(&model, &registry, true)?;

    println!("Indexing commits with model {}", THEME.apply(&THEME.emphasis, &model));
    let progress = create_progress_bar(0, "Embedding commits");
    let report = run_index(&git, embedder.as_ref(), &paths, &request, Some(&registry), &progress)?;

    println!(
        "{}",
        THEME.success_with_icon(&format!(
            "Indexed {} commits ({} dimensions) to {}",
            report.commits,
            report.dimension,
            paths.index_file.display()
        ))
    );
    if report.ann_built {
        println!("Built ANN sidecar at {}", paths.ann_file.display());
    }
    Ok(ExitCode::Success)
}
