//! Langspec build orchestration
//!
//! Provides incremental builds of language components including:
//! - Component metadata and component providers
//! - Transitive dependency resolution (compile and source graphs)
//! - Change tracking with full-rebuild fallback on deletions
//! - Build request assembly for an opaque build engine
//! - A staged pipeline from `dependency-load` to `archive`
//! - An external-process build engine

pub mod command;
pub mod component;
pub mod engine;
pub mod error;
pub mod graph;
pub mod pipeline;
pub mod request;
pub mod state;
pub mod tracker;

// Re-export main types
pub use command::CommandEngine;
pub use component::{
    Component, ComponentProvider, DependencyDeclaration, DirectoryProvider, InMemoryProvider,
};
pub use engine::{BuildEngine, BuildOutcome, Diagnostic, Severity, StageContext};
pub use error::{BuildError, BuildResult};
pub use graph::{ResolvedDependency, ResolvedGraph, Resolver};
pub use pipeline::{Pipeline, PipelineReport, Project, Stage, StageRecord, StageStatus};
pub use request::{BuildRequest, Goal, RequestBuilder, SourceSpec};
pub use state::StateStore;
pub use tracker::{
    classify, BuildMode, Change, ChangeSet, Classification, Fingerprint, FullReason, InputFile,
    InputSnapshot,
};

// Re-export configuration types for convenience
pub use langspec_config::{ComponentConfig, ComponentId, DependencyKind};
