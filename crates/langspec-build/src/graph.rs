//! Transitive dependency resolution for language components
//!
//! Resolution is a depth-first walk over dependency declarations of a single
//! kind. Components are emitted in post-order, so every dependency precedes
//! its dependents and the root comes last. Declarations are visited in the
//! order they were declared, which makes the result independent of any map
//! iteration order: include-path order affects name resolution inside the
//! compiled language and must be reproducible.
use crate::component::{Component, ComponentProvider};
use crate::error::{BuildError, BuildResult};
use langspec_config::{ComponentId, DependencyKind};
use std::collections::HashSet;
use std::path::PathBuf;
use tracing::debug;

/// A dependency reached during resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedDependency {
    /// The dependency itself
    pub component: Component,
    /// Kind of the declarations through which it was reached
    pub kind: DependencyKind,
}

impl ResolvedDependency {
    /// Whether the dependency's include paths flow to the root
    pub fn contributes_includes(&self) -> bool {
        self.kind != DependencyKind::Library
    }

    /// Whether the dependency's source files are compiled with the root
    pub fn contributes_sources(&self) -> bool {
        self.kind == DependencyKind::Source
    }
}

/// Transitive closure of a root component's dependencies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGraph {
    root: Component,
    /// Topologically ordered, root excluded
    dependencies: Vec<ResolvedDependency>,
}

impl ResolvedGraph {
    /// Graph consisting of the root alone
    pub fn singleton(root: Component) -> Self {
        Self {
            root,
            dependencies: Vec::new(),
        }
    }

    /// Root component
    pub fn root(&self) -> &Component {
        &self.root
    }

    /// Resolved dependencies, dependencies first
    pub fn dependencies(&self) -> &[ResolvedDependency] {
        &self.dependencies
    }

    /// All components: dependencies in order, then the root
    pub fn components(&self) -> Vec<&Component> {
        self.dependencies
            .iter()
            .map(|d| &d.component)
            .chain(std::iter::once(&self.root))
            .collect()
    }

    /// Identifiers of all components, same order as [`Self::components`]
    pub fn ids(&self) -> Vec<ComponentId> {
        self.components().into_iter().map(|c| c.id.clone()).collect()
    }

    /// Languages used to compile the root
    pub fn languages(&self) -> Vec<ComponentId> {
        self.dependencies
            .iter()
            .filter(|d| d.contributes_includes())
            .map(|d| d.component.id.clone())
            .collect()
    }

    /// Number of components, root included
    pub fn len(&self) -> usize {
        self.dependencies.len() + 1
    }

    /// A graph always contains its root
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Aggregated include paths: dependency contributions, then the root's own
    pub fn include_paths(&self) -> Vec<PathBuf> {
        let dependency_paths = self
            .dependencies
            .iter()
            .filter(|d| d.contributes_includes())
            .flat_map(|d| d.component.include_paths.iter());
        dedup(dependency_paths.chain(&self.root.include_paths))
    }

    /// Aggregated source files: source-dependency contributions, then the root's own
    pub fn source_files(&self) -> Vec<PathBuf> {
        let dependency_files = self
            .dependencies
            .iter()
            .filter(|d| d.contributes_sources())
            .flat_map(|d| d.component.source_files.iter());
        dedup(dependency_files.chain(&self.root.source_files))
    }

    /// Output directories generated into the root by its languages
    pub fn output_dirs(&self) -> Vec<PathBuf> {
        let dirs: Vec<PathBuf> = self
            .dependencies
            .iter()
            .filter(|d| d.contributes_includes())
            .flat_map(|d| d.component.generates.iter())
            .map(|g| self.root.location.join(&g.directory))
            .collect();
        dedup(dirs.iter())
    }

    /// Merge two graphs of the same root
    ///
    /// This graph's order is kept; dependencies only present in `other` are
    /// appended in `other`'s order. A dependency present in both keeps the
    /// kind that contributes more.
    pub fn union(&self, other: &ResolvedGraph) -> BuildResult<ResolvedGraph> {
        if self.root.id != other.root.id {
            return Err(BuildError::InvalidRequest(format!(
                "cannot merge graphs of different roots {} and {}",
                self.root.id, other.root.id
            )));
        }

        let mut dependencies = self.dependencies.clone();
        for candidate in &other.dependencies {
            match dependencies
                .iter_mut()
                .find(|d| d.component.id == candidate.component.id)
            {
                Some(existing) => {
                    if kind_rank(candidate.kind) > kind_rank(existing.kind) {
                        existing.kind = candidate.kind;
                    }
                }
                None => dependencies.push(candidate.clone()),
            }
        }

        Ok(ResolvedGraph {
            root: self.root.clone(),
            dependencies,
        })
    }
}

fn kind_rank(kind: DependencyKind) -> u8 {
    match kind {
        DependencyKind::Library => 0,
        DependencyKind::Compile => 1,
        DependencyKind::Source => 2,
    }
}

fn dedup<'a>(paths: impl Iterator<Item = &'a PathBuf>) -> Vec<PathBuf> {
    let mut seen = HashSet::new();
    paths
        .filter(|p| seen.insert(*p))
        .cloned()
        .collect()
}

/// Resolves dependency graphs against an injected component provider
pub struct Resolver<'a> {
    provider: &'a dyn ComponentProvider,
}

impl<'a> Resolver<'a> {
    /// Create a resolver over `provider`
    pub fn new(provider: &'a dyn ComponentProvider) -> Self {
        Self { provider }
    }

    /// Resolve the transitive `kind` dependencies of `root`
    ///
    /// Fails with `CyclicDependency` naming every component on the cycle, or
    /// `UnresolvedDependency` when the provider does not know a declared
    /// component.
    pub fn resolve(&self, root: &Component, kind: DependencyKind) -> BuildResult<ResolvedGraph> {
        let mut walk = Walk {
            provider: self.provider,
            kind,
            visited: HashSet::new(),
            stack: Vec::new(),
            order: Vec::new(),
        };
        walk.visit(root)?;

        // Post-order puts the root last
        walk.order.pop();
        let dependencies = walk
            .order
            .into_iter()
            .map(|component| ResolvedDependency { component, kind })
            .collect::<Vec<_>>();

        debug!(
            root = %root.id,
            %kind,
            dependencies = dependencies.len(),
            "resolved dependency graph"
        );

        Ok(ResolvedGraph {
            root: root.clone(),
            dependencies,
        })
    }
}

/// State of one depth-first resolution
struct Walk<'a> {
    provider: &'a dyn ComponentProvider,
    kind: DependencyKind,
    visited: HashSet<ComponentId>,
    /// Components currently being visited (for cycle reporting)
    stack: Vec<ComponentId>,
    order: Vec<Component>,
}

impl Walk<'_> {
    fn visit(&mut self, component: &Component) -> BuildResult<()> {
        self.stack.push(component.id.clone());

        for dep_id in component.declarations(self.kind) {
            if let Some(start) = self.stack.iter().position(|id| id == dep_id) {
                let mut cycle: Vec<String> =
                    self.stack[start..].iter().map(ToString::to_string).collect();
                cycle.push(dep_id.to_string());
                return Err(BuildError::CyclicDependency { cycle });
            }

            if self.visited.contains(dep_id) {
                continue;
            }

            let dependency = self
                .provider
                .component(dep_id)?
                .ok_or_else(|| BuildError::unresolved(dep_id))?;
            self.visit(&dependency)?;
        }

        self.stack.pop();
        self.visited.insert(component.id.clone());
        self.order.push(component.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::InMemoryProvider;
    use pretty_assertions::assert_eq;

    fn id(name: &str) -> ComponentId {
        ComponentId::new("g", name, "1")
    }

    fn component(name: &str) -> Component {
        Component::new(id(name), format!("/{}", name))
            .with_include_paths(vec![PathBuf::from(format!("/{}/include", name))])
            .with_source_files(vec![PathBuf::from(format!("/{}/{}.src", name, name))])
    }

    fn names(graph: &ResolvedGraph) -> Vec<String> {
        graph.ids().into_iter().map(|i| i.name).collect()
    }

    #[test]
    fn test_no_dependencies_yields_singleton() {
        let provider = InMemoryProvider::new();
        let root = component("a");
        let graph = Resolver::new(&provider)
            .resolve(&root, DependencyKind::Compile)
            .unwrap();

        assert_eq!(graph.len(), 1);
        assert_eq!(graph, ResolvedGraph::singleton(root.clone()));
        assert_eq!(graph.include_paths(), root.include_paths);
        assert_eq!(graph.source_files(), root.source_files);
        assert!(graph.output_dirs().is_empty());
    }

    #[test]
    fn test_linear_chain_order() {
        let provider = InMemoryProvider::new()
            .with(component("b").with_dependency(DependencyKind::Compile, id("c")))
            .with(component("c"));
        let root = component("a").with_dependency(DependencyKind::Compile, id("b"));

        let graph = Resolver::new(&provider)
            .resolve(&root, DependencyKind::Compile)
            .unwrap();
        assert_eq!(names(&graph), vec!["c", "b", "a"]);
    }

    #[test]
    fn test_diamond_ties_broken_by_declaration_order() {
        let provider = InMemoryProvider::new()
            .with(component("b").with_dependency(DependencyKind::Compile, id("d")))
            .with(component("c").with_dependency(DependencyKind::Compile, id("d")))
            .with(component("d"));

        let root_bc = component("a")
            .with_dependency(DependencyKind::Compile, id("b"))
            .with_dependency(DependencyKind::Compile, id("c"));
        let root_cb = component("a")
            .with_dependency(DependencyKind::Compile, id("c"))
            .with_dependency(DependencyKind::Compile, id("b"));

        let resolver = Resolver::new(&provider);
        assert_eq!(
            names(&resolver.resolve(&root_bc, DependencyKind::Compile).unwrap()),
            vec!["d", "b", "c", "a"]
        );
        assert_eq!(
            names(&resolver.resolve(&root_cb, DependencyKind::Compile).unwrap()),
            vec!["d", "c", "b", "a"]
        );
    }

    #[test]
    fn test_compile_dependency_contributes_includes_only() {
        let provider = InMemoryProvider::new().with(component("b"));
        let root = component("a").with_dependency(DependencyKind::Compile, id("b"));

        let graph = Resolver::new(&provider)
            .resolve(&root, DependencyKind::Compile)
            .unwrap();
        assert_eq!(
            graph.include_paths(),
            vec![PathBuf::from("/b/include"), PathBuf::from("/a/include")]
        );
        assert_eq!(graph.source_files(), vec![PathBuf::from("/a/a.src")]);
    }

    #[test]
    fn test_source_dependency_contributes_sources() {
        let provider = InMemoryProvider::new().with(component("b"));
        let root = component("a").with_dependency(DependencyKind::Source, id("b"));

        let graph = Resolver::new(&provider)
            .resolve(&root, DependencyKind::Source)
            .unwrap();
        assert_eq!(names(&graph), vec!["b", "a"]);
        assert_eq!(
            graph.include_paths(),
            vec![PathBuf::from("/b/include"), PathBuf::from("/a/include")]
        );
        assert_eq!(
            graph.source_files(),
            vec![PathBuf::from("/b/b.src"), PathBuf::from("/a/a.src")]
        );
    }

    #[test]
    fn test_kinds_resolve_independently() {
        let provider = InMemoryProvider::new()
            .with(component("tool"))
            .with(component("lib"));
        let root = component("a")
            .with_dependency(DependencyKind::Compile, id("tool"))
            .with_dependency(DependencyKind::Source, id("lib"));

        let resolver = Resolver::new(&provider);
        assert_eq!(
            names(&resolver.resolve(&root, DependencyKind::Compile).unwrap()),
            vec!["tool", "a"]
        );
        assert_eq!(
            names(&resolver.resolve(&root, DependencyKind::Source).unwrap()),
            vec!["lib", "a"]
        );
    }

    #[test]
    fn test_cycle_names_every_component() {
        let provider = InMemoryProvider::new()
            .with(component("b").with_dependency(DependencyKind::Compile, id("c")))
            .with(component("c").with_dependency(DependencyKind::Compile, id("a")));
        let root = component("a").with_dependency(DependencyKind::Compile, id("b"));

        match Resolver::new(&provider).resolve(&root, DependencyKind::Compile) {
            Err(BuildError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, vec!["g:a:1", "g:b:1", "g:c:1", "g:a:1"]);
            }
            other => panic!("Expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_not_involving_root() {
        let provider = InMemoryProvider::new()
            .with(component("b").with_dependency(DependencyKind::Source, id("c")))
            .with(component("c").with_dependency(DependencyKind::Source, id("b")));
        let root = component("a").with_dependency(DependencyKind::Source, id("b"));

        match Resolver::new(&provider).resolve(&root, DependencyKind::Source) {
            Err(BuildError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, vec!["g:b:1", "g:c:1", "g:b:1"]);
            }
            other => panic!("Expected CyclicDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_cycle_through_other_kind_is_ignored() {
        let provider = InMemoryProvider::new()
            .with(component("b").with_dependency(DependencyKind::Source, id("a")));
        let root = component("a").with_dependency(DependencyKind::Compile, id("b"));

        let graph = Resolver::new(&provider)
            .resolve(&root, DependencyKind::Compile)
            .unwrap();
        assert_eq!(names(&graph), vec!["b", "a"]);
    }

    #[test]
    fn test_unresolved_dependency() {
        let provider = InMemoryProvider::new();
        let root = component("a").with_dependency(DependencyKind::Compile, id("missing"));

        match Resolver::new(&provider).resolve(&root, DependencyKind::Compile) {
            Err(BuildError::UnresolvedDependency {
                group,
                name,
                version,
            }) => {
                assert_eq!(
                    (group.as_str(), name.as_str(), version.as_str()),
                    ("g", "missing", "1")
                );
            }
            other => panic!("Expected UnresolvedDependency, got {:?}", other),
        }
    }

    #[test]
    fn test_shared_include_paths_are_deduplicated() {
        let shared = PathBuf::from("/shared/include");
        let provider = InMemoryProvider::new()
            .with(Component::new(id("b"), "/b").with_include_paths(vec![shared.clone()]))
            .with(Component::new(id("c"), "/c").with_include_paths(vec![shared.clone()]));
        let root = Component::new(id("a"), "/a")
            .with_dependency(DependencyKind::Compile, id("b"))
            .with_dependency(DependencyKind::Compile, id("c"));

        let graph = Resolver::new(&provider)
            .resolve(&root, DependencyKind::Compile)
            .unwrap();
        assert_eq!(graph.include_paths(), vec![shared]);
    }

    #[test]
    fn test_output_dirs_resolved_against_root() {
        let provider = InMemoryProvider::new()
            .with(component("sdf3").with_generates("SDF3", "src-gen/syntax"));
        let root = component("a").with_dependency(DependencyKind::Compile, id("sdf3"));

        let graph = Resolver::new(&provider)
            .resolve(&root, DependencyKind::Compile)
            .unwrap();
        assert_eq!(graph.output_dirs(), vec![PathBuf::from("/a/src-gen/syntax")]);
        assert_eq!(graph.languages(), vec![id("sdf3")]);
    }

    #[test]
    fn test_union_of_compile_and_source_graphs() {
        let provider = InMemoryProvider::new()
            .with(component("tool"))
            .with(component("lib"));
        let root = component("a")
            .with_dependency(DependencyKind::Compile, id("tool"))
            .with_dependency(DependencyKind::Source, id("lib"));

        let resolver = Resolver::new(&provider);
        let compile = resolver.resolve(&root, DependencyKind::Compile).unwrap();
        let source = resolver.resolve(&root, DependencyKind::Source).unwrap();
        let merged = compile.union(&source).unwrap();

        assert_eq!(names(&merged), vec!["tool", "lib", "a"]);
        assert_eq!(
            merged.include_paths(),
            vec![
                PathBuf::from("/tool/include"),
                PathBuf::from("/lib/include"),
                PathBuf::from("/a/include"),
            ]
        );
        assert_eq!(
            merged.source_files(),
            vec![PathBuf::from("/lib/lib.src"), PathBuf::from("/a/a.src")]
        );
    }

    #[test]
    fn test_union_rejects_different_roots() {
        let a = ResolvedGraph::singleton(component("a"));
        let b = ResolvedGraph::singleton(component("b"));
        assert!(matches!(a.union(&b), Err(BuildError::InvalidRequest(_))));
    }
}
