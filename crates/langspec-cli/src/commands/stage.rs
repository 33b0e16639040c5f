//! Stage command - run a pipeline stage and everything it depends on

use anyhow::{anyhow, Context, Result};
use langspec_build::command::{ENV_PROJECT_DIR, ENV_TARGET_DIR};
use langspec_build::{
    BuildError, CommandEngine, DirectoryProvider, Pipeline, Project, Stage, StageStatus,
};
use langspec_config::{ConfigLoader, ConfigOverride};
use std::path::PathBuf;
use tracing::debug;

/// Stage command arguments
pub struct StageArgs {
    /// Stage to run
    pub stage: Stage,
    /// Directory to start searching for langspec.toml
    pub project_dir: PathBuf,
    /// Root of materialised components, `None` for the default location
    pub components_dir: Option<PathBuf>,
    /// Engine program
    pub engine: String,
    /// Engine arguments placed before the stage name
    pub engine_args: Vec<String>,
    /// Command-line configuration overrides
    pub overrides: ConfigOverride,
}

/// Run the stage command
pub fn run(args: StageArgs) -> Result<()> {
    let loaded = ConfigLoader::new()
        .with_override(args.overrides)
        .load_from_directory(&args.project_dir)
        .context("Failed to load component configuration")?;
    let project = Project::from_loaded(loaded);

    let components_dir = match args.components_dir {
        Some(dir) => dir,
        None => ConfigLoader::default_components_dir()
            .context("Failed to locate the components directory")?,
    };
    debug!(components = %components_dir.display(), "using materialised components");
    let provider = DirectoryProvider::new(components_dir);

    let mut engine = CommandEngine::new(args.engine)
        .with_args(args.engine_args)
        .with_working_dir(&project.root)
        .with_env(ENV_PROJECT_DIR, project.root.display().to_string())
        .with_env(ENV_TARGET_DIR, project.target_dir().display().to_string());

    let mut pipeline = Pipeline::new(&project, &provider, &mut engine);
    match pipeline.run(args.stage) {
        Ok(report) => {
            if let Some(archive) = report.archive {
                println!("{}", archive.display());
            }
            Ok(())
        }
        Err(error) => {
            let failed = pipeline
                .report()
                .stages
                .iter()
                .find(|r| r.status == StageStatus::Failed)
                .map(|r| r.stage)
                .unwrap_or(args.stage);
            Err(anyhow!(describe(&error))).context(format!("Stage '{}' failed", failed))
        }
    }
}

/// Error message including every engine diagnostic
fn describe(error: &BuildError) -> String {
    let mut message = error.to_string();
    if let BuildError::EngineFailure { diagnostics, .. } = error {
        for diagnostic in diagnostics {
            message.push_str("\n  ");
            message.push_str(&diagnostic.to_string());
        }
    }
    message
}
