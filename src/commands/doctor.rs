//! `gitsem doctor`: check, and with `--fix` repair, the index files.

use crate::commands::Workspace;
use crate::display::{THEME, create_doctor_table};
use crate::error::GitsemResult;
use crate::io::ExitCode;
use crate::storage::{run_doctor_checks, run_doctor_fixes};
use clap::Args;

#[derive(Args, Debug, Clone, Default)]
pub struct DoctorArgs {
    /// Regenerate missing or disagreeing sidecars and metadata
    #[arg(long)]
    pub fix: bool,
}

pub fn run(args: &DoctorArgs, workspace: &Workspace) -> GitsemResult<ExitCode> {
    let repo = &workspace.paths;
    let paths = workspace.index_paths(None)?;

    if args.fix {
        let report = run_doctor_fixes(repo, &paths)?;
        for action in &report.actions {
            println!("{}", THEME.success_with_icon(action));
        }
        for warning in &report.warnings {
            println!("{}", THEME.warning_with_icon(warning));
        }
        println!();
    }

    let checks = run_doctor_checks(repo, &paths);
    println!("{}", create_doctor_table(&checks));

    let failures = checks.iter().filter(|check| !check.ok).count();
    if failures > 0 {
        println!(
            "\n{}",
            THEME.warning_with_icon(&format!("Doctor completed with {failures} warning(s)."))
        );
        if !args.fix {
            println!("Run `gitsem doctor --fix` to attempt repairs.");
        }
    } else {
        println!("\n{}", THEME.success_with_icon("Doctor completed successfully."));
    }
    Ok(ExitCode::Success)
}
