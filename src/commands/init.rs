//! `gitsem init`: create the index directories, settings and model metadata.

use crate::commands::Workspace;
use crate::config::Settings;
use crate::display::THEME;
use crate::error::{ErrorContext, GitsemResult};
use crate::io::ExitCode;
use crate::storage::InitMetadata;
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct InitArgs {
    /// Embedding model to record (defaults to the configured model)
    #[arg(long)]
    pub model: Option<String>,

    /// Overwrite an existing .gitsem/settings.toml
    #[arg(long)]
    pub force_config: bool,
}

pub fn run(args: &InitArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let paths = &workspace.paths;
    let model = args
        .model
        .clone()
        .unwrap_or_else(|| workspace.settings.model.clone());

    for dir in [&paths.semantic_dir, &paths.cache_dir, &paths.models_dir] {
        std::fs::create_dir_all(dir).write_path(dir)?;
    }

    let config_path = paths.repo_root.join(crate::config::CONFIG_DIR).join(crate::config::CONFIG_FILE);
    if args.force_config || !config_path.exists() {
        let written = Settings::init_config_file(&paths.repo_root, &model, args.force_config)?;
        println!("{}", THEME.success_with_icon(&format!("Created {}", written.display())));
    } else {
        println!("Keeping existing settings at {}", config_path.display());
    }

    let metadata = InitMetadata::new(&model);
    metadata.save(&paths.metadata_path)?;
    tracing::info!(model = %metadata.model_name, "initialised semantic index directory");

    println!("Initialized semantic index directory at {}", paths.semantic_dir.display());
    println!("Model metadata written to {}", paths.metadata_path.display());
    println!("Model: {}", THEME.apply(&THEME.emphasis, &metadata.model_name));

    let target = workspace.index_paths(None)?;
    if target.index_file.exists() {
        println!("Existing index found: {}", target.index_file.display());
    } else {
        println!("No index found yet. Run `gitsem index`.");
    }
    Ok(ExitCode::Success)
}
