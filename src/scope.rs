//! Scope manager - tree of lexical and name-space scopes
//!
//! The scope manager tracks:
//! - Scope hierarchy (parent/child relationships) in an arena
//! - Value, structure and typedef declarations per scope
//! - Name scopes deduplicated by fully qualified name across files
//! - Lookup operations used during construction and resolution
//!
//! A name scope with a given FQN exists at most once per manager; entering a
//! namespace declaration with a known FQN reactivates the existing scope and
//! re-anchors it to the new AST node.

use crate::graph::CodeGraph;
use crate::node::{Node, NodeId, NodeKind};
use crate::types::{TypeId, TypeRegistry};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Unique identifier for a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ScopeId(pub u32);

impl ScopeId {
    /// The global scope id
    pub fn global() -> Self {
        Self(0)
    }
}

/// The kind of a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Global,
    /// Namespace/package/record name scope, identified by FQN
    Name,
    Function,
    Block,
    Loop,
    Switch,
    Try,
    Template,
    Record,
    /// Value-declaration scope without further structure (if-statements)
    ValueDeclaration,
}

impl ScopeKind {
    /// Scopes that can hold structure declarations (records, namespaces)
    pub fn holds_structures(&self) -> bool {
        matches!(
            self,
            ScopeKind::Global | ScopeKind::Name | ScopeKind::Record | ScopeKind::Template
        )
    }
}

/// One scope in the tree
#[derive(Debug)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeId>,
    pub children: Vec<ScopeId>,
    /// AST node this scope is anchored to (re-anchored on reactivation)
    pub node: Option<NodeId>,
    /// Fully qualified scoped name (name scopes only)
    pub scoped_name: Option<String>,
    /// Value declarations by simple name; each slot keeps insertion order
    pub value_decls: HashMap<String, Vec<NodeId>>,
    /// Structure declarations (records, namespaces) by simple name
    pub structure_decls: HashMap<String, Vec<NodeId>>,
    /// Type aliases visible in this scope
    pub typedefs: HashMap<String, TypeId>,
}

impl Scope {
    fn new(kind: ScopeKind, parent: Option<ScopeId>, node: Option<NodeId>) -> Self {
        Self {
            kind,
            parent,
            children: Vec::new(),
            node,
            scoped_name: None,
            value_decls: HashMap::new(),
            structure_decls: HashMap::new(),
            typedefs: HashMap::new(),
        }
    }
}

/// Scope manager for one translation run
#[derive(Debug)]
pub struct ScopeManager {
    scopes: Vec<Scope>,
    current: ScopeId,
    /// Scope associated with an AST node
    scope_of_node: HashMap<NodeId, ScopeId>,
    /// Name scopes by FQN - the cross-file deduplication structure
    name_scopes: HashMap<String, ScopeId>,
}

impl Default for ScopeManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeManager {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(ScopeKind::Global, None, None)],
            current: ScopeId::global(),
            scope_of_node: HashMap::new(),
            name_scopes: HashMap::new(),
        }
    }

    pub fn current_scope(&self) -> ScopeId {
        self.current
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    fn scope_mut(&mut self, id: ScopeId) -> &mut Scope {
        &mut self.scopes[id.0 as usize]
    }

    /// The scope registered for an AST node, if any
    pub fn scope_of(&self, node: NodeId) -> Option<ScopeId> {
        self.scope_of_node.get(&node).copied()
    }

    /// Look up a name scope by its FQN
    pub fn name_scope(&self, fqn: &str) -> Option<ScopeId> {
        self.name_scopes.get(fqn).copied()
    }

    fn push_scope(&mut self, scope: Scope) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        if let Some(parent) = scope.parent {
            self.scope_mut(parent).children.push(id);
        }
        self.scopes.push(scope);
        id
    }

    /// Reattach the global scope to a translation unit and make it current
    pub fn reset_to_global(&mut self, tu: NodeId) {
        self.scope_mut(ScopeId::global()).node = Some(tu);
        self.scope_of_node.insert(tu, ScopeId::global());
        self.current = ScopeId::global();
    }

    /// Enter the scope for a node, creating it on first entry.
    ///
    /// Namespace declarations are special: the scope is keyed by FQN, so a
    /// second file declaring the same package reactivates the existing scope
    /// rather than creating a sibling.
    pub fn enter_scope(&mut self, node: &Node) {
        // Namespace scopes dedup on FQN even across different AST nodes
        if let NodeKind::Namespace { .. } = node.kind {
            let fqn = node.qualified_name().to_string();
            if let Some(existing) = self.name_scopes.get(&fqn).copied() {
                self.scope_mut(existing).node = Some(node.id);
                self.scope_of_node.insert(node.id, existing);
                self.current = existing;
                return;
            }
        }

        if let Some(existing) = self.scope_of_node.get(&node.id).copied() {
            self.current = existing;
            return;
        }

        let kind = scope_kind_for(node);
        let mut scope = Scope::new(kind, Some(self.current), Some(node.id));

        if matches!(kind, ScopeKind::Name | ScopeKind::Record) {
            scope.scoped_name = Some(node.qualified_name().to_string());
        }

        let id = self.push_scope(scope);
        self.scope_of_node.insert(node.id, id);

        if let NodeKind::Namespace { .. } = node.kind {
            let fqn = node.qualified_name().to_string();
            self.name_scopes.insert(fqn, id);
        }

        self.current = id;
    }

    /// Leave the scope for a node.
    ///
    /// Fails soft: leaving a node without a registered scope, or one that is
    /// not the innermost scope, is logged and otherwise a no-op.
    pub fn leave_scope(&mut self, node: &Node) {
        match self.scope_of_node.get(&node.id) {
            Some(scope) if *scope == self.current => {
                if let Some(parent) = self.scope(self.current).parent {
                    self.current = parent;
                }
            }
            Some(_) => {
                warn!(
                    "leave_scope for {} does not match innermost scope",
                    node.name
                );
            }
            None => {
                warn!("leave_scope for {} without a registered scope", node.name);
            }
        }
    }

    /// Nearest enclosing scope (including `from`) that can hold value decls.
    ///
    /// Every scope kind holds values, so this is `from` itself; kept as a
    /// named operation to make the dispatch in `add_declaration` explicit.
    fn nearest_value_scope(&self, from: ScopeId) -> ScopeId {
        from
    }

    fn nearest_structure_scope(&self, from: ScopeId) -> ScopeId {
        let mut cursor = from;
        loop {
            if self.scope(cursor).kind.holds_structures() {
                return cursor;
            }
            match self.scope(cursor).parent {
                Some(parent) => cursor = parent,
                None => return ScopeId::global(),
            }
        }
    }

    /// Add a declaration to the correct scope, and optionally to the AST
    /// node the scope is anchored to.
    ///
    /// Dispatch: value declarations go to the nearest value-declaration
    /// scope, structure declarations to the nearest structure scope, and
    /// Problem/Include declarations always to the global scope.
    pub fn add_declaration(&mut self, graph: &mut CodeGraph, decl: NodeId, add_to_ast: bool) {
        let target = match &graph.node(decl).kind {
            NodeKind::Problem { .. } | NodeKind::Include { .. } => ScopeId::global(),
            NodeKind::Record { .. } | NodeKind::Namespace { .. } => {
                self.nearest_structure_scope(self.current)
            }
            kind if kind.is_value_declaration() => self.nearest_value_scope(self.current),
            other => {
                debug!("not adding {} to any scope", other.kind_name());
                return;
            }
        };

        let name = graph.node(decl).name.clone();
        let is_structure = matches!(
            graph.node(decl).kind,
            NodeKind::Record { .. } | NodeKind::Namespace { .. }
        );

        let slot = if is_structure {
            self.scope_mut(target).structure_decls.entry(name).or_default()
        } else {
            self.scope_mut(target).value_decls.entry(name).or_default()
        };

        if !slot.contains(&decl) {
            slot.push(decl);
        }

        graph.node_mut(decl).scope.get_or_insert(target);

        if add_to_ast {
            if let Some(anchor) = self.scope(target).node {
                attach_to_holder(graph, anchor, decl);
            }
        }
    }

    /// Register a declaration into an explicit scope's value declarations.
    ///
    /// Used for cross-scope registrations such as making a method reachable
    /// from its record's enclosing package scope.
    pub fn add_value_declaration_to(&mut self, scope: ScopeId, name: &str, decl: NodeId) {
        let slot = self
            .scope_mut(scope)
            .value_decls
            .entry(name.to_string())
            .or_default();
        if !slot.contains(&decl) {
            slot.push(decl);
        }
    }

    /// Record a type alias in a scope
    pub fn add_typedef(&mut self, scope: ScopeId, name: impl Into<String>, ty: TypeId) {
        self.scope_mut(scope).typedefs.insert(name.into(), ty);
    }

    /// Resolve a typedef walking outward
    pub fn resolve_typedef(&self, scope: ScopeId, name: &str) -> Option<TypeId> {
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if let Some(ty) = self.scope(id).typedefs.get(name) {
                return Some(*ty);
            }
            cursor = self.scope(id).parent;
        }
        None
    }

    /// Resolve a reference to at most one value declaration, walking outward
    /// from `scope`.
    ///
    /// When the reference carries a function type, only function
    /// declarations with a matching signature are considered.
    pub fn resolve_reference(
        &self,
        graph: &CodeGraph,
        registry: &TypeRegistry,
        scope: ScopeId,
        name: &str,
        ref_type: Option<TypeId>,
    ) -> Option<NodeId> {
        let wants_function = ref_type
            .map(|t| registry.get(t).is_function())
            .unwrap_or(false);

        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if let Some(slot) = self.scope(id).value_decls.get(name) {
                for candidate in slot {
                    if wants_function {
                        let is_function_decl =
                            matches!(graph.node(*candidate).kind, NodeKind::Function { .. });
                        let matches_signature = match (graph.node(*candidate).ty, ref_type) {
                            (Some(a), Some(b)) => registry.function_signatures_match(a, b),
                            _ => false,
                        };
                        if is_function_decl && !matches_signature {
                            continue;
                        }
                    }
                    return Some(*candidate);
                }
            }
            cursor = self.scope(id).parent;
        }

        None
    }

    /// Resolve a call to every matching function declaration.
    ///
    /// When the call's FQN carries a namespace, resolution jumps into that
    /// name scope (falling back to `scope` if the namespace is unknown);
    /// otherwise it walks outward. A function matches when its simple name
    /// matches and its parameter types match the argument types element-wise.
    pub fn resolve_function(
        &self,
        graph: &CodeGraph,
        registry: &TypeRegistry,
        scope: ScopeId,
        fqn: &str,
        arg_types: &[TypeId],
    ) -> Vec<NodeId> {
        let (search_scopes, simple_name) = match fqn.rsplit_once('.') {
            Some((namespace, simple)) => match self.name_scopes.get(namespace) {
                Some(ns_scope) => (vec![*ns_scope], simple),
                None => (self.chain(scope), simple),
            },
            None => (self.chain(scope), fqn),
        };

        let mut matches = Vec::new();
        for search in search_scopes {
            if let Some(slot) = self.scope(search).value_decls.get(simple_name) {
                for candidate in slot {
                    let node = graph.node(*candidate);
                    let NodeKind::Function { parameters, .. } = &node.kind else {
                        continue;
                    };

                    let param_types: Vec<TypeId> = parameters
                        .iter()
                        .map(|p| graph.node(*p).ty.unwrap_or_else(|| registry.unknown()))
                        .collect();

                    if registry.type_lists_match(&param_types, arg_types) {
                        matches.push(*candidate);
                    }
                }
            }
        }

        matches
    }

    /// Walk outward for a record declaration matching `name`.
    ///
    /// `name` may be fully qualified; lookup uses the simple segment and
    /// verifies the FQN when one was given.
    pub fn get_record_for_name(
        &self,
        graph: &CodeGraph,
        scope: ScopeId,
        name: &str,
    ) -> Option<NodeId> {
        let simple = name.rsplit('.').next().unwrap_or(name);
        let qualified = name.contains('.');

        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if let Some(slot) = self.scope(id).structure_decls.get(simple) {
                for candidate in slot {
                    let node = graph.node(*candidate);
                    if !matches!(node.kind, NodeKind::Record { .. }) {
                        continue;
                    }
                    if qualified && node.qualified_name() != name {
                        continue;
                    }
                    return Some(*candidate);
                }
            }
            cursor = self.scope(id).parent;
        }

        None
    }

    /// Scope chain from a scope up to the global scope
    pub fn chain(&self, scope: ScopeId) -> Vec<ScopeId> {
        let mut chain = vec![scope];
        let mut cursor = scope;
        while let Some(parent) = self.scope(cursor).parent {
            chain.push(parent);
            cursor = parent;
        }
        chain
    }

    /// Merge per-file scope managers into this one.
    ///
    /// For each foreign name scope whose FQN already exists locally, its
    /// value/structure declarations and typedefs move into the local scope;
    /// unknown name scopes are adopted under the global scope.
    pub fn merge_from(&mut self, others: Vec<ScopeManager>) {
        for other in others {
            for foreign in other.scopes {
                if foreign.kind != ScopeKind::Name {
                    continue;
                }
                let Some(fqn) = foreign.scoped_name.clone() else {
                    continue;
                };

                let local = match self.name_scopes.get(&fqn).copied() {
                    Some(id) => id,
                    None => {
                        let mut adopted =
                            Scope::new(ScopeKind::Name, Some(ScopeId::global()), foreign.node);
                        adopted.scoped_name = Some(fqn.clone());
                        let id = self.push_scope(adopted);
                        self.name_scopes.insert(fqn.clone(), id);
                        id
                    }
                };

                if let Some(node) = foreign.node {
                    self.scope_of_node.insert(node, local);
                }

                let target = self.scope_mut(local);
                for (name, decls) in foreign.value_decls {
                    let slot = target.value_decls.entry(name).or_default();
                    for decl in decls {
                        if !slot.contains(&decl) {
                            slot.push(decl);
                        }
                    }
                }
                for (name, decls) in foreign.structure_decls {
                    let slot = target.structure_decls.entry(name).or_default();
                    for decl in decls {
                        if !slot.contains(&decl) {
                            slot.push(decl);
                        }
                    }
                }
                for (name, ty) in foreign.typedefs {
                    target.typedefs.entry(name).or_insert(ty);
                }
            }
        }
    }
}

/// The scope kind created when entering a node
fn scope_kind_for(node: &Node) -> ScopeKind {
    match node.kind {
        NodeKind::Namespace { .. } => ScopeKind::Name,
        NodeKind::Record { .. } => ScopeKind::Record,
        NodeKind::Function { .. } => ScopeKind::Function,
        NodeKind::For { .. } | NodeKind::ForEach { .. } => ScopeKind::Loop,
        NodeKind::Switch { .. } => ScopeKind::Switch,
        NodeKind::If { .. } => ScopeKind::ValueDeclaration,
        _ => ScopeKind::Block,
    }
}

/// Append a declaration to the AST holder a scope is anchored to
fn attach_to_holder(graph: &mut CodeGraph, anchor: NodeId, decl: NodeId) {
    let is_include = matches!(graph.node(decl).kind, NodeKind::Include { .. });
    let is_field = matches!(graph.node(decl).kind, NodeKind::Field { .. });
    let is_function = matches!(graph.node(decl).kind, NodeKind::Function { .. });
    let is_parameter = matches!(graph.node(decl).kind, NodeKind::Parameter);

    match &mut graph.node_mut(anchor).kind {
        NodeKind::TranslationUnit {
            declarations,
            includes,
        } => {
            let holder = if is_include { includes } else { declarations };
            if !holder.contains(&decl) {
                holder.push(decl);
            }
        }
        NodeKind::Namespace { declarations } => {
            if !declarations.contains(&decl) {
                declarations.push(decl);
            }
        }
        NodeKind::Record {
            fields, methods, ..
        } => {
            let holder = if is_field {
                fields
            } else if is_function {
                methods
            } else {
                return;
            };
            if !holder.contains(&decl) {
                holder.push(decl);
            }
        }
        NodeKind::Function { parameters, .. } if is_parameter => {
            if !parameters.contains(&decl) {
                parameters.push(decl);
            }
        }
        // bodies are wired explicitly by the frontend
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Language;

    fn namespace_node(graph: &mut CodeGraph, fqn: &str) -> NodeId {
        let id = graph.new_node(
            fqn.rsplit('/').next().unwrap_or(fqn),
            Language::Go,
            NodeKind::Namespace {
                declarations: vec![],
            },
        );
        graph.node_mut(id).fqn = Some(fqn.to_string());
        id
    }

    fn variable_node(graph: &mut CodeGraph, name: &str) -> NodeId {
        graph.new_node(name, Language::Go, NodeKind::Variable { initializer: None })
    }

    #[test]
    fn test_name_scope_reactivation() {
        let mut graph = CodeGraph::new();
        let mut scopes = ScopeManager::new();

        let ns1 = namespace_node(&mut graph, "mymod/p");
        let ns2 = namespace_node(&mut graph, "mymod/p");

        let n1 = graph.node(ns1).clone();
        scopes.enter_scope(&n1);
        let first = scopes.current_scope();
        scopes.leave_scope(&n1);

        let n2 = graph.node(ns2).clone();
        scopes.enter_scope(&n2);
        let second = scopes.current_scope();

        assert_eq!(first, second, "same-FQN namespaces must share one scope");
        // reactivation re-anchors the scope to the newer AST node
        assert_eq!(scopes.scope(second).node, Some(ns2));
    }

    #[test]
    fn test_balanced_enter_leave_restores_current() {
        let mut graph = CodeGraph::new();
        let mut scopes = ScopeManager::new();
        let start = scopes.current_scope();

        let ns = namespace_node(&mut graph, "m/p");
        let block = graph.new_node("", Language::Go, NodeKind::Compound { statements: vec![] });

        let ns_node = graph.node(ns).clone();
        let block_node = graph.node(block).clone();

        scopes.enter_scope(&ns_node);
        scopes.enter_scope(&block_node);
        scopes.leave_scope(&block_node);
        scopes.leave_scope(&ns_node);

        assert_eq!(scopes.current_scope(), start);
    }

    #[test]
    fn test_leave_without_scope_is_noop() {
        let mut graph = CodeGraph::new();
        let mut scopes = ScopeManager::new();
        let start = scopes.current_scope();

        let stray = variable_node(&mut graph, "x");
        let stray_node = graph.node(stray).clone();
        scopes.leave_scope(&stray_node);

        assert_eq!(scopes.current_scope(), start);
    }

    #[test]
    fn test_resolve_reference_walks_outward() {
        let mut graph = CodeGraph::new();
        let registry = TypeRegistry::new();
        let mut scopes = ScopeManager::new();

        let outer_var = variable_node(&mut graph, "x");
        scopes.add_declaration(&mut graph, outer_var, false);

        let block = graph.new_node("", Language::Go, NodeKind::Compound { statements: vec![] });
        let block_node = graph.node(block).clone();
        scopes.enter_scope(&block_node);
        let inner = scopes.current_scope();

        let found = scopes.resolve_reference(&graph, &registry, inner, "x", None);
        assert_eq!(found, Some(outer_var));
    }

    #[test]
    fn test_function_type_restriction() {
        let mut graph = CodeGraph::new();
        let mut registry = TypeRegistry::new();
        let mut scopes = ScopeManager::new();

        let int_ty = registry.object("int");
        let string_ty = registry.object("string");
        let wanted = registry.function(vec![], vec![int_ty]);
        let other = registry.function(vec![], vec![string_ty]);

        let f = graph.new_node(
            "f",
            Language::Go,
            NodeKind::Function {
                parameters: vec![],
                return_types: vec![string_ty],
                body: None,
                receiver: None,
                record: None,
            },
        );
        graph.node_mut(f).ty = Some(other);
        scopes.add_declaration(&mut graph, f, false);

        let scope = scopes.current_scope();
        let miss = scopes.resolve_reference(&graph, &registry, scope, "f", Some(wanted));
        assert_eq!(miss, None, "signature mismatch must not resolve");

        let hit = scopes.resolve_reference(&graph, &registry, scope, "f", Some(other));
        assert_eq!(hit, Some(f));
    }

    #[test]
    fn test_resolve_function_by_namespace() {
        let mut graph = CodeGraph::new();
        let mut registry = TypeRegistry::new();
        let mut scopes = ScopeManager::new();

        let ns = namespace_node(&mut graph, "mymod/util");
        let ns_node = graph.node(ns).clone();
        scopes.enter_scope(&ns_node);

        let int_ty = registry.object("int");
        let f = graph.new_node(
            "Add",
            Language::Go,
            NodeKind::Function {
                parameters: vec![],
                return_types: vec![],
                body: None,
                receiver: None,
                record: None,
            },
        );
        let p = graph.new_node("x", Language::Go, NodeKind::Parameter);
        graph.node_mut(p).ty = Some(int_ty);
        if let NodeKind::Function { parameters, .. } = &mut graph.node_mut(f).kind {
            parameters.push(p);
        }
        scopes.add_declaration(&mut graph, f, false);
        scopes.leave_scope(&ns_node);

        let global = scopes.current_scope();
        let matches =
            scopes.resolve_function(&graph, &registry, global, "mymod/util.Add", &[int_ty]);
        assert_eq!(matches, vec![f]);

        // wrong arity does not match
        let none = scopes.resolve_function(&graph, &registry, global, "mymod/util.Add", &[]);
        assert!(none.is_empty());
    }

    #[test]
    fn test_merge_from_combines_same_fqn_scopes() {
        let mut graph = CodeGraph::new();

        let mut local = ScopeManager::new();
        let ns_a = namespace_node(&mut graph, "m/p");
        let node_a = graph.node(ns_a).clone();
        local.enter_scope(&node_a);
        let var_a = variable_node(&mut graph, "a");
        local.add_declaration(&mut graph, var_a, false);
        local.leave_scope(&node_a);

        let mut foreign = ScopeManager::new();
        let ns_b = namespace_node(&mut graph, "m/p");
        let node_b = graph.node(ns_b).clone();
        foreign.enter_scope(&node_b);
        let var_b = variable_node(&mut graph, "b");
        foreign.add_declaration(&mut graph, var_b, false);
        foreign.leave_scope(&node_b);

        local.merge_from(vec![foreign]);

        let merged = local.name_scope("m/p").unwrap();
        assert!(local.scope(merged).value_decls.contains_key("a"));
        assert!(local.scope(merged).value_decls.contains_key("b"));
    }
}
