//! Build engine backed by an external program
//!
//! Every stage runs `<program> [args...] <stage>` in the component directory.
//! The `build` stage receives its request as JSON on stdin. The program
//! reports a JSON [`BuildOutcome`] on stdout; when it does not, the exit
//! status decides success and stderr is turned into a diagnostic.

use crate::engine::{BuildEngine, BuildOutcome, Diagnostic, StageContext};
use crate::error::{BuildError, BuildResult};
use crate::pipeline::Stage;
use crate::request::{BuildRequest, Goal};
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};
use std::thread;
use std::time::Instant;
use tracing::{debug, trace};

pub const ENV_PROJECT_DIR: &str = "LANGSPEC_PROJECT_DIR";
pub const ENV_TARGET_DIR: &str = "LANGSPEC_TARGET_DIR";
pub const ENV_COMPONENT: &str = "LANGSPEC_COMPONENT";
pub const ENV_ARCHIVE: &str = "LANGSPEC_ARCHIVE";
pub const ENV_ENGINE_VERSION: &str = "LANGSPEC_ENGINE_VERSION";

/// External-process build engine
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
    working_dir: Option<PathBuf>,
    env_vars: BTreeMap<String, String>,
}

impl CommandEngine {
    /// Engine running `program`
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            working_dir: None,
            env_vars: BTreeMap::new(),
        }
    }

    /// Arguments placed before the stage name
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Directory the program runs in
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Add an environment variable
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env_vars.insert(key.into(), value.into());
        self
    }

    /// Environment describing a stage context
    pub fn context_environment(context: &StageContext) -> BTreeMap<String, String> {
        let mut env = BTreeMap::new();
        env.insert(
            ENV_PROJECT_DIR.to_string(),
            context.project_dir.display().to_string(),
        );
        env.insert(
            ENV_TARGET_DIR.to_string(),
            context.target_dir.display().to_string(),
        );
        env.insert(ENV_COMPONENT.to_string(), context.component.to_string());
        env.insert(ENV_ARCHIVE.to_string(), context.archive.display().to_string());
        if let Some(version) = &context.engine_version {
            env.insert(ENV_ENGINE_VERSION.to_string(), version.clone());
        }
        env
    }

    fn run(
        &self,
        stage: Stage,
        env: &BTreeMap<String, String>,
        stdin: Option<Vec<u8>>,
    ) -> BuildResult<BuildOutcome> {
        let mut command = Command::new(&self.program);
        command
            .args(&self.args)
            .arg(stage.name())
            .envs(&self.env_vars)
            .envs(env)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.working_dir {
            command.current_dir(dir);
        }

        debug!(program = %self.program, %stage, "invoking build engine");
        let start = Instant::now();

        let mut child = command.spawn().map_err(|e| self.invocation_error(e))?;
        // The request is fed while stdout and stderr are drained, the engine
        // may write any amount of output before reading it
        let writer = match (stdin, child.stdin.take()) {
            (Some(input), Some(mut pipe)) => Some(thread::spawn(move || pipe.write_all(&input))),
            _ => None,
        };
        let output = child
            .wait_with_output()
            .map_err(|e| self.invocation_error(e))?;
        if let Some(writer) = writer {
            match writer.join() {
                // The program may exit without reading its request
                Ok(Err(e)) if e.kind() != ErrorKind::BrokenPipe => {
                    return Err(self.invocation_error(e));
                }
                Ok(_) => {}
                Err(_) => {
                    return Err(BuildError::EngineInvocation {
                        program: self.program.clone(),
                        error: "request writer panicked".to_string(),
                    });
                }
            }
        }

        debug!(
            %stage,
            status = ?output.status.code(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "build engine finished"
        );
        Ok(interpret(&output))
    }

    fn invocation_error(&self, error: std::io::Error) -> BuildError {
        BuildError::EngineInvocation {
            program: self.program.clone(),
            error: error.to_string(),
        }
    }
}

impl BuildEngine for CommandEngine {
    fn build(&mut self, request: BuildRequest) -> BuildResult<BuildOutcome> {
        let input = serde_json::to_vec(&request).map_err(|e| BuildError::EngineInvocation {
            program: self.program.clone(),
            error: e.to_string(),
        })?;

        let mut env = BTreeMap::new();
        env.insert(ENV_COMPONENT.to_string(), request.component.to_string());
        if let Some(version) = &request.engine_version {
            env.insert(ENV_ENGINE_VERSION.to_string(), version.clone());
        }

        self.run(request_stage(request.goal), &env, Some(input))
    }

    fn execute(&mut self, stage: Stage, context: &StageContext) -> BuildResult<BuildOutcome> {
        self.run(stage, &Self::context_environment(context), None)
    }
}

/// Stage name the engine is invoked with for a request
fn request_stage(goal: Goal) -> Stage {
    match goal {
        Goal::Compile => Stage::Build,
        Goal::Examples => Stage::BuildExamples,
    }
}

/// Turn process output into an outcome
fn interpret(output: &Output) -> BuildOutcome {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    trace!(%stdout, %stderr, "engine output");

    if let Some(mut outcome) = parse_outcome(&stdout) {
        if !output.status.success() && outcome.success {
            outcome.success = false;
            outcome.diagnostics.push(exit_diagnostic(output, stderr));
        }
        return outcome;
    }

    if output.status.success() {
        let mut outcome = BuildOutcome::success();
        if !stderr.is_empty() {
            outcome.diagnostics.push(Diagnostic::note(stderr));
        }
        outcome
    } else {
        BuildOutcome::failure(vec![exit_diagnostic(output, stderr)])
    }
}

/// The whole of stdout, or its last non-empty line, as an outcome
fn parse_outcome(stdout: &str) -> Option<BuildOutcome> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok().or_else(|| {
        trimmed
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .and_then(|line| serde_json::from_str(line.trim()).ok())
    })
}

fn exit_diagnostic(output: &Output, stderr: &str) -> Diagnostic {
    if stderr.is_empty() {
        match output.status.code() {
            Some(code) => Diagnostic::error(format!("engine exited with status {}", code)),
            None => Diagnostic::error("engine terminated by signal"),
        }
    } else {
        Diagnostic::error(stderr)
    }
}
