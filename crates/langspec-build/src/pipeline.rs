//! Staged build pipeline
//!
//! Stages form a fixed chain:
//!
//! ```text
//! dependency-load -> build -> generate-sources -> compile -> package -> archive
//!     -> check -> build-examples
//! ```
//!
//! Running a stage first runs all of its transitive predecessors, one at a
//! time. A stage only runs after every predecessor succeeded; the first
//! failure skips everything after it and is reported as a single error
//! naming the stage. `clean` stands apart and has no predecessors.
//!
//! Every stage always executes. The engine discovers its real inputs while
//! compiling, so output timestamps say nothing useful; incrementality is
//! decided only by the change tracker inside `build`.

use crate::component::{Component, ComponentProvider};
use crate::engine::{BuildEngine, BuildOutcome, StageContext};
use crate::error::{BuildError, BuildResult};
use crate::graph::{ResolvedGraph, Resolver};
use crate::request::{Goal, RequestBuilder};
use crate::state::StateStore;
use crate::tracker::{classify, BuildMode, ChangeSet, InputSnapshot};
use langspec_config::{ComponentConfig, ComponentId, DependencyKind, LoadedConfig};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Instant;
use tracing::{debug, info, warn};

/// File extension of component archives
pub const ARCHIVE_EXTENSION: &str = "langspec";

/// A named pipeline stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    DependencyLoad,
    Build,
    GenerateSources,
    Compile,
    Package,
    Archive,
    /// Verify the archive can be loaded
    Check,
    /// Build the component's examples with its own language
    BuildExamples,
    /// Remove every generated output
    Clean,
}

impl Stage {
    /// Stage name as invoked from the command line
    pub fn name(&self) -> &'static str {
        match self {
            Self::DependencyLoad => "dependency-load",
            Self::Build => "build",
            Self::GenerateSources => "generate-sources",
            Self::Compile => "compile",
            Self::Package => "package",
            Self::Archive => "archive",
            Self::Check => "check",
            Self::BuildExamples => "build-examples",
            Self::Clean => "clean",
        }
    }

    /// All stages, forward chain first
    pub fn all() -> [Stage; 9] {
        [
            Self::DependencyLoad,
            Self::Build,
            Self::GenerateSources,
            Self::Compile,
            Self::Package,
            Self::Archive,
            Self::Check,
            Self::BuildExamples,
            Self::Clean,
        ]
    }

    /// Direct predecessors
    pub fn predecessors(&self) -> &'static [Stage] {
        match self {
            Self::DependencyLoad | Self::Clean => &[],
            Self::Build => &[Self::DependencyLoad],
            Self::GenerateSources => &[Self::Build],
            Self::Compile => &[Self::GenerateSources],
            Self::Package => &[Self::Compile],
            Self::Archive => &[Self::Package],
            Self::Check => &[Self::Archive],
            Self::BuildExamples => &[Self::Check],
        }
    }

    /// This stage and its transitive predecessors, in execution order
    pub fn plan(self) -> Vec<Stage> {
        let mut plan = Vec::new();
        self.collect_plan(&mut plan);
        plan
    }

    fn collect_plan(self, plan: &mut Vec<Stage>) {
        for predecessor in self.predecessors() {
            predecessor.collect_plan(plan);
        }
        if !plan.contains(&self) {
            plan.push(self);
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Stage {
    type Err = BuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::all()
            .into_iter()
            .find(|stage| stage.name() == s)
            .ok_or_else(|| BuildError::UnknownStage(s.to_string()))
    }
}

/// How a stage ended in a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatus {
    Succeeded,
    Failed,
    /// Not run because a predecessor failed
    Skipped,
}

/// One stage of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct StageRecord {
    pub stage: Stage,
    pub status: StageStatus,
    /// Engine outcome, when the engine was invoked
    pub outcome: Option<BuildOutcome>,
}

/// Summary of a pipeline run
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineReport {
    /// Stage that was requested
    pub target: Stage,
    /// Stages in execution order
    pub stages: Vec<StageRecord>,
    /// Components in the resolved graph, root last
    pub components: Vec<ComponentId>,
    /// Mode of the `build` stage, when it ran
    pub mode: Option<BuildMode>,
    /// Changes seen by the `build` stage
    pub changes: ChangeSet,
    /// Archive produced by the `archive` stage
    pub archive: Option<PathBuf>,
}

impl PipelineReport {
    fn new(target: Stage) -> Self {
        Self {
            target,
            stages: Vec::new(),
            components: Vec::new(),
            mode: None,
            changes: ChangeSet::new(),
            archive: None,
        }
    }

    /// Status of a stage in this run
    pub fn status(&self, stage: Stage) -> Option<StageStatus> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| r.status)
    }

    /// Whether every planned stage succeeded
    pub fn succeeded(&self) -> bool {
        self.stages
            .iter()
            .all(|r| r.status == StageStatus::Succeeded)
    }

    fn record(&mut self, stage: Stage, status: StageStatus, outcome: Option<BuildOutcome>) {
        self.stages.push(StageRecord {
            stage,
            status,
            outcome,
        });
    }
}

/// A component being built, with its effective configuration
#[derive(Debug, Clone)]
pub struct Project {
    pub config: ComponentConfig,
    /// Directory containing `langspec.toml`
    pub root: PathBuf,
}

impl Project {
    pub fn new(config: ComponentConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    /// Project from the effective view of a loaded configuration
    pub fn from_loaded(loaded: LoadedConfig) -> Self {
        Self::new(loaded.effective, loaded.root)
    }

    pub fn id(&self) -> ComponentId {
        self.config.id()
    }

    /// Directory holding the archive and recorded state
    pub fn target_dir(&self) -> PathBuf {
        self.root.join(self.config.target_dir())
    }

    /// `<target>/<group>-<name>-<version>.langspec`
    pub fn archive_path(&self) -> PathBuf {
        self.target_dir()
            .join(format!("{}.{}", self.id().file_name(), ARCHIVE_EXTENSION))
    }

    /// The project as a component rooted at its directory
    pub fn component(&self) -> BuildResult<Component> {
        Component::from_config(&self.config, &self.root)
    }
}

/// Runs pipeline stages for one project
pub struct Pipeline<'a> {
    project: &'a Project,
    provider: &'a dyn ComponentProvider,
    engine: &'a mut dyn BuildEngine,
    state: StateStore,
    graph: Option<ResolvedGraph>,
    report: PipelineReport,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        project: &'a Project,
        provider: &'a dyn ComponentProvider,
        engine: &'a mut dyn BuildEngine,
    ) -> Self {
        Self {
            project,
            provider,
            engine,
            state: StateStore::new(&project.target_dir()),
            graph: None,
            report: PipelineReport::new(Stage::DependencyLoad),
        }
    }

    /// Store holding the inputs of the last successful build
    pub fn state(&self) -> &StateStore {
        &self.state
    }

    /// Report of the most recent run, including a failed one
    pub fn report(&self) -> &PipelineReport {
        &self.report
    }

    /// Run `target` after all of its predecessors
    ///
    /// Returns the report on success. The first failing stage ends the run
    /// with its error; later stages are recorded as skipped.
    pub fn run(&mut self, target: Stage) -> BuildResult<PipelineReport> {
        let plan = target.plan();
        let start = Instant::now();
        self.report = PipelineReport::new(target);
        self.graph = None;

        info!(
            component = %self.project.id(),
            stage = %target,
            stages = plan.len(),
            "running pipeline"
        );

        for (index, &stage) in plan.iter().enumerate() {
            debug!(%stage, "starting stage");
            let failure = match self.run_stage(stage) {
                Ok(outcome) => {
                    outcome.log_diagnostics(stage);
                    if outcome.is_failure() {
                        let error =
                            BuildError::engine_failure(stage.name(), outcome.diagnostics.clone());
                        self.report.record(stage, StageStatus::Failed, Some(outcome));
                        Some(error)
                    } else {
                        self.report.record(stage, StageStatus::Succeeded, Some(outcome));
                        None
                    }
                }
                Err(error) => {
                    self.report.record(stage, StageStatus::Failed, None);
                    Some(error)
                }
            };

            if let Some(error) = failure {
                for &skipped in &plan[index + 1..] {
                    debug!(stage = %skipped, predecessor = %stage, "stage skipped");
                    self.report.record(skipped, StageStatus::Skipped, None);
                }
                return Err(error);
            }
        }

        info!(
            stage = %target,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pipeline finished"
        );
        Ok(self.report.clone())
    }

    fn run_stage(&mut self, stage: Stage) -> BuildResult<BuildOutcome> {
        match stage {
            Stage::DependencyLoad => {
                let graph = self.load_graph()?;
                self.report.components = graph.ids();
                self.graph = Some(graph);
                Ok(BuildOutcome::success())
            }
            Stage::Build => self.build(),
            Stage::GenerateSources | Stage::Compile | Stage::Package => {
                let context = self.context();
                self.engine.execute(stage, &context)
            }
            Stage::Archive => self.archive(),
            Stage::Check => self.check(),
            Stage::BuildExamples => self.build_examples(),
            Stage::Clean => self.clean(),
        }
    }

    /// Union of the compile and source graphs of the project
    fn load_graph(&self) -> BuildResult<ResolvedGraph> {
        let root = self.project.component()?;
        let resolver = Resolver::new(self.provider);
        let compile = resolver.resolve(&root, DependencyKind::Compile)?;
        let source = resolver.resolve(&root, DependencyKind::Source)?;
        compile.union(&source)
    }

    fn graph(&self) -> BuildResult<ResolvedGraph> {
        match &self.graph {
            Some(graph) => Ok(graph.clone()),
            None => self.load_graph(),
        }
    }

    fn build(&mut self) -> BuildResult<BuildOutcome> {
        let graph = self.graph()?;

        let current = InputSnapshot::capture(&graph.source_files())?;
        let previous = self.state.load();
        let classification = classify(previous.as_ref(), &current);

        let changes = &classification.changes;
        match classification.reason {
            Some(reason) => info!(%reason, files = current.len(), "full build"),
            None => info!(
                created = changes.created(),
                modified = changes.modified(),
                "incremental build"
            ),
        }

        let config = &self.project.config;
        let request = RequestBuilder::new(&graph)
            .pardoned_languages(config.build.pardoned_languages.clone())
            .engine_version(config.engine_version().map(str::to_string))
            .build(classification.mode, changes, Goal::Compile)?;

        if classification.mode == BuildMode::Full {
            for dir in &request.output_dirs {
                clear_dir(dir)?;
            }
        }

        self.report.mode = Some(classification.mode);
        self.report.changes = classification.changes.clone();

        let outcome = self.engine.build(request)?;
        if outcome.is_failure() {
            // Outputs may be half written; force the next build to start over
            self.state.clear()?;
        } else {
            self.state.save(&current)?;
        }
        Ok(outcome)
    }

    fn archive(&mut self) -> BuildResult<BuildOutcome> {
        let context = self.context();
        // Only an archive written by this run counts as the artifact
        remove_file_if_exists(&context.archive)?;
        let outcome = self.engine.execute(Stage::Archive, &context)?;
        if outcome.is_failure() {
            return Ok(outcome);
        }

        if !context.archive.is_file() {
            return Err(BuildError::MissingArtifact(context.archive));
        }
        info!(archive = %context.archive.display(), "archive created");
        self.report.archive = Some(context.archive);
        Ok(outcome)
    }

    fn check(&mut self) -> BuildResult<BuildOutcome> {
        let context = self.context();
        let size = fs::metadata(&context.archive)
            .map(|m| m.len())
            .unwrap_or(0);
        if size == 0 {
            return Err(BuildError::MissingArtifact(context.archive));
        }
        self.engine.execute(Stage::Check, &context)
    }

    /// Full request over every source with the component's own language
    /// added. Recorded input state and output directories are left alone.
    fn build_examples(&mut self) -> BuildResult<BuildOutcome> {
        let graph = self.graph()?;
        let config = &self.project.config;
        let request = RequestBuilder::new(&graph)
            .pardoned_languages(config.build.pardoned_languages.clone())
            .engine_version(config.engine_version().map(str::to_string))
            .language(self.project.id())
            .build(BuildMode::Full, &ChangeSet::new(), Goal::Examples)?;

        info!(files = request.sources.len(), "building examples");
        self.engine.build(request)
    }

    fn clean(&mut self) -> BuildResult<BuildOutcome> {
        // Cleaning must work even when dependencies can no longer be resolved
        let output_dirs = match self.load_graph() {
            Ok(graph) => graph.output_dirs(),
            Err(e) => {
                warn!(error = %e, "cannot resolve dependencies, generated directories are kept");
                Vec::new()
            }
        };

        let mut context = self.context();
        context.output_dirs = output_dirs;
        let outcome = self.engine.execute(Stage::Clean, &context)?;
        if outcome.is_failure() {
            return Ok(outcome);
        }

        for dir in &context.output_dirs {
            clear_dir(dir)?;
        }
        remove_file_if_exists(&context.archive)?;
        self.state.clear()?;
        Ok(outcome)
    }

    fn context(&self) -> StageContext {
        StageContext {
            component: self.project.id(),
            project_dir: self.project.root.clone(),
            target_dir: self.project.target_dir(),
            archive: self.project.archive_path(),
            output_dirs: self
                .graph
                .as_ref()
                .map(ResolvedGraph::output_dirs)
                .unwrap_or_default(),
            engine_version: self.project.config.engine_version().map(str::to_string),
        }
    }
}

/// Remove everything inside `dir`, creating it when missing
fn clear_dir(dir: &Path) -> BuildResult<()> {
    if !dir.exists() {
        return fs::create_dir_all(dir).map_err(|e| BuildError::io(dir, e));
    }

    let entries = fs::read_dir(dir).map_err(|e| BuildError::io(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| BuildError::io(dir, e))?.path();
        let result = if path.is_dir() {
            fs::remove_dir_all(&path)
        } else {
            fs::remove_file(&path)
        };
        result.map_err(|e| BuildError::io(&path, e))?;
    }
    debug!(dir = %dir.display(), "cleared output directory");
    Ok(())
}

fn remove_file_if_exists(path: &Path) -> BuildResult<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(BuildError::io(path, e)),
        _ => Ok(()),
    }
}
