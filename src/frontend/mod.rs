//! Translation frontend - two-phase per-file graph construction
//!
//! Phase A materialises record skeletons (structs, interfaces, aliases) for
//! every file, registering them in their package name scopes so cross-file
//! references resolve regardless of file order. Phase B walks the remaining
//! top-level declarations and lowers statement and expression bodies.
//!
//! File traversal is sequential: the package index and the comment maps are
//! shared mutable state, so parallel parsing is deliberately disabled for
//! this language.

pub mod decl;
pub mod expr;
pub mod oracle;
pub mod parser;
pub mod stmt;
pub mod tyexpr;

pub use oracle::{NoOracle, TableOracle, TypeOracle};
pub use parser::{GoParser, ParsedFile};

use crate::config::CpgConfig;
use crate::graph::CodeGraph;
use crate::node::{NodeId, NodeKind};
use crate::project::Project;
use crate::scope::ScopeManager;
use crate::types::TypeRegistry;
use crate::{Language, Result};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// A fully constructed and resolved translation
#[derive(Debug)]
pub struct Translation {
    pub graph: CodeGraph,
    pub scopes: ScopeManager,
    pub types: TypeRegistry,
}

/// Trait for language frontends.
///
/// The resolver core is language agnostic; everything Go specific lives
/// behind this seam.
pub trait LanguageFrontend {
    fn language(&self) -> Language;

    fn file_extensions(&self) -> &[&str];

    fn can_handle(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|ext| self.file_extensions().contains(&ext))
            .unwrap_or(false)
    }

    /// Run both frontend phases over a project
    fn translate(&mut self, project: &Project) -> Result<()>;
}

/// Cached Phase-A output for one file
struct FileUnit {
    tu: NodeId,
    namespace: NodeId,
}

/// The Go language frontend
pub struct GoFrontend {
    pub graph: CodeGraph,
    pub scopes: ScopeManager,
    pub types: TypeRegistry,
    pub config: CpgConfig,
    oracle: Box<dyn TypeOracle>,
    parser: GoParser,
    units: HashMap<String, FileUnit>,
    // short-lived per-file context, reset at each file transition
    pub(crate) current_path: String,
    pub(crate) current_package: String,
    pub(crate) current_tu: Option<NodeId>,
}

impl LanguageFrontend for GoFrontend {
    fn language(&self) -> Language {
        Language::Go
    }

    fn file_extensions(&self) -> &[&str] {
        &["go"]
    }

    fn translate(&mut self, project: &Project) -> Result<()> {
        // Parse everything up front; a parse failure drops the file, never
        // the project.
        let mut parsed = Vec::new();
        for file in &project.files {
            match self.parser.parse(&file.path, &file.content) {
                Ok(p) => parsed.push(p),
                Err(e) => warn!("{}", e),
            }
        }

        for file in &parsed {
            self.phase_a(project, file)?;
        }
        for file in &parsed {
            self.phase_b(project, file)?;
        }

        self.graph.rebuild_parent_index();
        info!(
            "translated {} of {} files",
            parsed.len(),
            project.files.len()
        );
        Ok(())
    }
}

impl GoFrontend {
    pub fn new(config: CpgConfig) -> Self {
        Self::with_oracle(config, Box::new(NoOracle))
    }

    pub fn with_oracle(config: CpgConfig, oracle: Box<dyn TypeOracle>) -> Self {
        Self {
            graph: CodeGraph::new(),
            scopes: ScopeManager::new(),
            types: TypeRegistry::new(),
            config,
            oracle,
            parser: GoParser::new(),
            units: HashMap::new(),
            current_path: String::new(),
            current_package: String::new(),
            current_tu: None,
        }
    }

    /// Consume the frontend into its translation output
    pub fn finish(self) -> Translation {
        Translation {
            graph: self.graph,
            scopes: self.scopes,
            types: self.types,
        }
    }

    fn set_file_context(&mut self, project: &Project, file: &ParsedFile, tu: NodeId) {
        self.current_path = file.path.clone();
        self.current_package = project.package_path(&file.path, &file.package_clause);
        self.current_tu = Some(tu);
    }

    /// Phase A: emit includes and record skeletons for one file
    pub fn phase_a(&mut self, project: &Project, file: &ParsedFile) -> Result<()> {
        debug!("phase A: {}", file.path);

        let tu = self.graph.new_node(
            file.path.clone(),
            Language::Go,
            NodeKind::TranslationUnit {
                declarations: vec![],
                includes: vec![],
            },
        );
        self.graph.add_translation_unit(tu);
        self.scopes.reset_to_global(tu);
        self.set_file_context(project, file, tu);

        for import in &file.imports {
            let include = self.graph.new_node(
                import.import_name().to_string(),
                Language::Go,
                NodeKind::Include {
                    filename: import.path.clone(),
                },
            );
            self.scopes.add_declaration(&mut self.graph, include, true);
        }

        let namespace = self.graph.new_node(
            file.package_clause.clone(),
            Language::Go,
            NodeKind::Namespace {
                declarations: vec![],
            },
        );
        self.graph.node_mut(namespace).fqn = Some(self.current_package.clone());
        self.enter(namespace);

        let root = file.root();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            if child.kind() != "type_declaration" {
                continue;
            }
            let mut specs = child.walk();
            for spec in child.named_children(&mut specs) {
                if !matches!(spec.kind(), "type_spec" | "type_alias") {
                    continue;
                }
                if let Some(record) = self.handle_type_spec(file, spec) {
                    self.scopes.add_declaration(&mut self.graph, record, true);
                    self.attach_comment(record, file, child);
                }
            }
        }

        self.leave(namespace);
        self.scopes.add_declaration(&mut self.graph, namespace, true);

        self.units.insert(
            file.path.clone(),
            FileUnit { tu, namespace },
        );
        Ok(())
    }

    /// Phase B: lower function, method and variable bodies for one file
    pub fn phase_b(&mut self, project: &Project, file: &ParsedFile) -> Result<()> {
        debug!("phase B: {}", file.path);

        let (tu, namespace) = match self.units.get(&file.path) {
            Some(unit) => (unit.tu, unit.namespace),
            None => {
                warn!("phase B without phase A output for {}", file.path);
                return Ok(());
            }
        };

        self.scopes.reset_to_global(tu);
        self.set_file_context(project, file, tu);
        self.enter(namespace);

        let root = file.root();
        let mut cursor = root.walk();
        for child in root.named_children(&mut cursor) {
            match child.kind() {
                "function_declaration" | "method_declaration" => {
                    let (function, add_to_scope) = self.handle_function_decl(file, child);
                    if let Some(function) = function {
                        if add_to_scope {
                            self.scopes.add_declaration(&mut self.graph, function, true);
                        }
                        self.attach_comment(function, file, child);
                    }
                }
                "var_declaration" | "const_declaration" => {
                    let mut specs = child.walk();
                    for spec in child.named_children(&mut specs) {
                        if !matches!(spec.kind(), "var_spec" | "const_spec") {
                            continue;
                        }
                        for variable in self.handle_value_spec(file, spec) {
                            self.scopes.add_declaration(&mut self.graph, variable, true);
                            self.attach_comment(variable, file, child);
                        }
                    }
                }
                _ => {}
            }
        }

        self.leave(namespace);
        Ok(())
    }

    // --- shared helpers used by the handler modules ---

    /// Create a node in the current scope with a source location
    pub(crate) fn new_node_at(
        &mut self,
        name: impl Into<String>,
        kind: NodeKind,
        file: &ParsedFile,
        ts_node: tree_sitter::Node,
    ) -> NodeId {
        let id = self.graph.new_node(name, Language::Go, kind);
        let node = self.graph.node_mut(id);
        node.location = Some(file.location(ts_node));
        node.scope = Some(self.scopes.current_scope());
        id
    }

    pub(crate) fn attach_comment(
        &mut self,
        id: NodeId,
        file: &ParsedFile,
        ts_node: tree_sitter::Node,
    ) {
        if let Some(comment) = file.comments.get(ts_node) {
            let node = self.graph.node_mut(id);
            if node.comment.is_none() {
                node.comment = Some(comment.to_string());
            }
        }
    }

    pub(crate) fn enter(&mut self, id: NodeId) {
        let node = self.graph.node(id).clone();
        self.scopes.enter_scope(&node);
    }

    pub(crate) fn leave(&mut self, id: NodeId) {
        let node = self.graph.node(id).clone();
        self.scopes.leave_scope(&node);
    }

    /// Qualify an identifier against the current package unless it names a
    /// built-in type
    pub(crate) fn qualify(&self, name: &str) -> String {
        if crate::types::is_builtin_type(name) {
            name.to_string()
        } else {
            format!("{}.{}", self.current_package, name)
        }
    }

    /// Ask the oracle for the type of an expression node
    pub(crate) fn oracle_type(
        &mut self,
        file: &ParsedFile,
        ts_node: tree_sitter::Node,
    ) -> Option<crate::types::TypeId> {
        let descriptor = self
            .oracle
            .type_of(&file.path, (ts_node.start_byte(), ts_node.end_byte()))?;
        let package = self.current_package.clone();
        Some(self.types.parse(&descriptor, Some(&package)))
    }

    /// Create a problem node standing in for an untranslatable subtree
    pub(crate) fn problem(
        &mut self,
        message: impl Into<String>,
        file: &ParsedFile,
        ts_node: tree_sitter::Node,
    ) -> NodeId {
        let message = message.into();
        debug!("problem node: {}", message);
        self.new_node_at("", NodeKind::Problem { message }, file, ts_node)
    }
}

/// Construct and resolve a graph for a project with the null oracle
pub fn construct(project: &Project, config: &CpgConfig) -> Result<Translation> {
    construct_with_oracle(project, config, Box::new(NoOracle))
}

/// Construct and resolve a graph, consulting the given type oracle
pub fn construct_with_oracle(
    project: &Project,
    config: &CpgConfig,
    oracle: Box<dyn TypeOracle>,
) -> Result<Translation> {
    let mut frontend = GoFrontend::with_oracle(config.clone(), oracle);
    frontend.translate(project)?;

    let mut translation = frontend.finish();
    crate::passes::run_pipeline(&mut translation, config)?;
    Ok(translation)
}
