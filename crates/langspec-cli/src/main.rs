use anyhow::Result;
use clap::Parser;
use langspec_build::Stage;
use langspec_config::{ComponentId, ConfigOverride};
use std::path::PathBuf;

mod commands;
mod logging;

/// Incremental build orchestrator for language components.
///
/// Runs a pipeline stage for the component in the current directory (or the
/// directory given with -C), running every stage it depends on first.
///
/// STAGES:
///     dependency-load   Resolve compile and source dependencies
///     build             Compile the component's sources incrementally
///     generate-sources  Generate sources for the target platform
///     compile           Compile generated sources
///     package           Package compiled outputs
///     archive           Create the component archive
///     check             Verify the archive loads
///     build-examples    Build the examples with the component's own language
///     clean             Remove generated outputs, the archive and build state
///
/// EXAMPLES:
///     langspec archive                          Build and archive
///     langspec build -v                         Build with debug logging
///     langspec --component-version 1.2.0 archive
///
/// ENVIRONMENT VARIABLES:
///     LANGSPEC_ENGINE      Build engine program
///     LANGSPEC_COMPONENTS  Directory of materialised components
///     LANGSPEC_GROUP, LANGSPEC_NAME, LANGSPEC_VERSION, LANGSPEC_ENGINE_VERSION,
///     LANGSPEC_COMPILE_DEPS, LANGSPEC_SOURCE_DEPS, LANGSPEC_LIBRARY_DEPS
///                          Override langspec.toml (CLI flags win)
///     RUST_LOG             Log filter
#[derive(Parser)]
#[command(name = "langspec")]
#[command(version)]
struct Cli {
    /// Stage to run
    stage: Stage,

    /// Component directory (langspec.toml is searched upwards from here)
    #[arg(short = 'C', long = "directory", default_value = ".")]
    directory: PathBuf,

    /// Debug logging
    #[arg(long, short = 'v', conflicts_with = "quiet")]
    verbose: bool,

    /// Errors only
    #[arg(long, short = 'q')]
    quiet: bool,

    /// Build engine program
    #[arg(long, env = "LANGSPEC_ENGINE", default_value = "langspec-engine")]
    engine: String,

    /// Argument passed to the engine before the stage name (repeatable)
    #[arg(long = "engine-arg", allow_hyphen_values = true)]
    engine_args: Vec<String>,

    /// Directory of materialised components [default: ~/.langspec/components]
    #[arg(long, env = "LANGSPEC_COMPONENTS")]
    components: Option<PathBuf>,

    /// Override the component group
    #[arg(long)]
    group: Option<String>,

    /// Override the component name
    #[arg(long)]
    name: Option<String>,

    /// Override the component version
    #[arg(long)]
    component_version: Option<String>,

    /// Pin the build engine version
    #[arg(long)]
    engine_version: Option<String>,

    /// Replace compile dependencies (group:name:version, repeatable)
    #[arg(long = "compile-dep")]
    compile_deps: Option<Vec<ComponentId>>,

    /// Replace source dependencies (group:name:version, repeatable)
    #[arg(long = "source-dep")]
    source_deps: Option<Vec<ComponentId>>,

    /// Replace backend-library dependencies (group:name:version, repeatable)
    #[arg(long = "library-dep")]
    library_deps: Option<Vec<ComponentId>>,
}

impl Cli {
    /// Overrides given on the command line
    fn overrides(&self) -> ConfigOverride {
        ConfigOverride {
            group: self.group.clone(),
            name: self.name.clone(),
            version: self.component_version.clone(),
            engine_version: self.engine_version.clone(),
            compile_deps: self.compile_deps.clone(),
            source_deps: self.source_deps.clone(),
            library_deps: self.library_deps.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose, cli.quiet);

    let args = commands::stage::StageArgs {
        stage: cli.stage,
        project_dir: cli.directory.clone(),
        components_dir: cli.components.clone(),
        engine: cli.engine.clone(),
        engine_args: cli.engine_args.clone(),
        overrides: cli.overrides(),
    };
    commands::stage::run(args)
}
