//! Code graph - arena of nodes with data-flow and lookup indexes
//!
//! Provides the in-memory graph the frontend builds and the resolver
//! pipeline mutates. Nodes live in an arena addressed by `NodeId`; the AST
//! tree is implicit in the variant payloads, while data-flow edges are kept
//! in adjacency maps that tolerate cycles. Nodes are never deleted.

use crate::node::{Node, NodeId, NodeKind};
use crate::Language;
use std::collections::{HashMap, HashSet};

/// In-memory code property graph for one translation run.
#[derive(Debug, Default)]
pub struct CodeGraph {
    /// All nodes, indexed by `NodeId`
    nodes: Vec<Node>,
    /// Data-flow edges from a producer (outgoing)
    dfg_from: HashMap<NodeId, Vec<NodeId>>,
    /// Data-flow edges into a consumer (incoming)
    dfg_to: HashMap<NodeId, Vec<NodeId>>,
    /// Records indexed by fully qualified name
    records_by_fqn: HashMap<String, NodeId>,
    /// Translation units in input order
    translation_units: Vec<NodeId>,
    /// Declarations synthesised by the resolver
    inferred: Vec<NodeId>,
    /// AST parent index, derived from `ast_children`
    parents: HashMap<NodeId, NodeId>,
}

impl CodeGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a node and return its id
    pub fn new_node(&mut self, name: impl Into<String>, language: Language, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::new(id, name, language, kind));
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// All nodes in creation order
    pub fn all_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter()
    }

    /// All node ids in creation order
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len() as u32).map(NodeId)
    }

    // --- Translation units ---

    pub fn add_translation_unit(&mut self, tu: NodeId) {
        self.translation_units.push(tu);
    }

    pub fn translation_units(&self) -> &[NodeId] {
        &self.translation_units
    }

    // --- Record index ---

    /// Register a record under its FQN. Returns the already-registered node
    /// when the FQN is taken, so callers can merge instead of duplicating.
    pub fn register_record(&mut self, fqn: impl Into<String>, record: NodeId) -> Option<NodeId> {
        let fqn = fqn.into();
        if let Some(existing) = self.records_by_fqn.get(&fqn) {
            return Some(*existing);
        }
        self.records_by_fqn.insert(fqn, record);
        None
    }

    pub fn record_by_fqn(&self, fqn: &str) -> Option<NodeId> {
        self.records_by_fqn.get(fqn).copied()
    }

    pub fn records(&self) -> impl Iterator<Item = (&String, NodeId)> {
        self.records_by_fqn.iter().map(|(fqn, id)| (fqn, *id))
    }

    // --- Inferred declarations ---

    pub fn mark_inferred(&mut self, id: NodeId) {
        if !self.inferred.contains(&id) {
            self.inferred.push(id);
        }
    }

    pub fn inferred(&self) -> &[NodeId] {
        &self.inferred
    }

    // --- Data flow ---

    /// Add a data-flow edge from a producer to a consumer.
    ///
    /// Duplicate edges are dropped so that re-running a pass does not grow
    /// the graph.
    pub fn add_dfg(&mut self, from: NodeId, to: NodeId) {
        let outgoing = self.dfg_from.entry(from).or_default();
        if outgoing.contains(&to) {
            return;
        }
        outgoing.push(to);
        self.dfg_to.entry(to).or_default().push(from);
    }

    /// Producers flowing into a node
    pub fn dfg_predecessors(&self, id: NodeId) -> &[NodeId] {
        self.dfg_to.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Consumers a node flows into
    pub fn dfg_successors(&self, id: NodeId) -> &[NodeId] {
        self.dfg_from.get(&id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn dfg_edge_count(&self) -> usize {
        self.dfg_from.values().map(|v| v.len()).sum()
    }

    // --- Reference helpers ---

    pub fn set_refers_to(&mut self, reference: NodeId, target: NodeId) {
        match &mut self.node_mut(reference).kind {
            NodeKind::Reference { refers_to } | NodeKind::Member { refers_to, .. } => {
                *refers_to = Some(target)
            }
            _ => {}
        }
    }

    // --- Record mutation helpers (duplicate-guarded) ---

    pub fn add_field_to_record(&mut self, record: NodeId, field: NodeId) {
        if let NodeKind::Record { fields, .. } = &mut self.node_mut(record).kind {
            if !fields.contains(&field) {
                fields.push(field);
            }
        }
    }

    pub fn add_method_to_record(&mut self, record: NodeId, method: NodeId) {
        if let NodeKind::Record { methods, .. } = &mut self.node_mut(record).kind {
            if !methods.contains(&method) {
                methods.push(method);
            }
        }
        if let NodeKind::Function { record: owner, .. } = &mut self.node_mut(method).kind {
            *owner = Some(record);
        }
    }

    pub fn add_implemented_interface(&mut self, record: NodeId, interface: crate::types::TypeId) {
        if let NodeKind::Record {
            implemented_interfaces,
            ..
        } = &mut self.node_mut(record).kind
        {
            if !implemented_interfaces.contains(&interface) {
                implemented_interfaces.push(interface);
            }
        }
    }

    pub fn add_super_type_decl(&mut self, record: NodeId, super_decl: NodeId) {
        if let NodeKind::Record {
            super_type_decls, ..
        } = &mut self.node_mut(record).kind
        {
            if !super_type_decls.contains(&super_decl) {
                super_type_decls.push(super_decl);
            }
        }
    }

    // --- AST traversal ---

    /// Recompute the parent index from the variant payloads.
    ///
    /// Must be called after the frontend finishes (and after any pass that
    /// rewires AST children, such as embedded-member promotion).
    pub fn rebuild_parent_index(&mut self) {
        self.parents.clear();
        for id in 0..self.nodes.len() as u32 {
            let parent = NodeId(id);
            for child in self.nodes[id as usize].ast_children() {
                self.parents.insert(child, parent);
            }
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.parents.get(&id).copied()
    }

    /// Pre-order walk of the AST below `root`.
    ///
    /// Uses a visited set: the AST is a tree by construction, but a
    /// defective graph must not hang the traversal.
    pub fn walk(&self, root: NodeId) -> Vec<NodeId> {
        let mut visited = HashSet::new();
        let mut stack = vec![root];
        let mut out = Vec::new();

        while let Some(current) = stack.pop() {
            if !visited.insert(current) {
                continue;
            }
            out.push(current);

            let children = self.node(current).ast_children();
            for child in children.into_iter().rev() {
                stack.push(child);
            }
        }

        out
    }

    /// Get statistics about the graph
    pub fn stats(&self) -> GraphStats {
        let mut declarations = 0;
        let mut records = 0;
        let mut functions = 0;
        let mut expressions = 0;

        for node in &self.nodes {
            if node.kind.is_declaration() {
                declarations += 1;
            }
            match node.kind {
                NodeKind::Record { .. } => records += 1,
                NodeKind::Function { .. } => functions += 1,
                _ => {
                    if !node.kind.is_declaration() {
                        expressions += 1;
                    }
                }
            }
        }

        GraphStats {
            translation_units: self.translation_units.len(),
            total_nodes: self.nodes.len(),
            declarations,
            records,
            functions,
            statements_and_expressions: expressions,
            dfg_edges: self.dfg_edge_count(),
            inferred: self.inferred.len(),
        }
    }
}

/// Statistics about a constructed graph
#[derive(Debug, Clone, serde::Serialize)]
pub struct GraphStats {
    pub translation_units: usize,
    pub total_nodes: usize,
    pub declarations: usize,
    pub records: usize,
    pub functions: usize,
    pub statements_and_expressions: usize,
    pub dfg_edges: usize,
    pub inferred: usize,
}

impl std::fmt::Display for GraphStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Code Graph Statistics:")?;
        writeln!(f, "  Translation units: {}", self.translation_units)?;
        writeln!(f, "  Nodes: {}", self.total_nodes)?;
        writeln!(
            f,
            "  Declarations: {} (records: {}, functions: {})",
            self.declarations, self.records, self.functions
        )?;
        writeln!(
            f,
            "  Statements/expressions: {}",
            self.statements_and_expressions
        )?;
        writeln!(f, "  DFG edges: {}", self.dfg_edges)?;
        writeln!(f, "  Inferred declarations: {}", self.inferred)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeKind;

    fn sample_graph() -> CodeGraph {
        CodeGraph::new()
    }

    #[test]
    fn test_dfg_duplicate_guard() {
        let mut graph = sample_graph();
        let a = graph.new_node("a", Language::Go, NodeKind::Parameter);
        let b = graph.new_node("b", Language::Go, NodeKind::Parameter);

        graph.add_dfg(a, b);
        graph.add_dfg(a, b);

        assert_eq!(graph.dfg_successors(a), &[b]);
        assert_eq!(graph.dfg_predecessors(b), &[a]);
        assert_eq!(graph.dfg_edge_count(), 1);
    }

    #[test]
    fn test_dfg_cycle_tolerated() {
        let mut graph = sample_graph();
        let a = graph.new_node("a", Language::Go, NodeKind::Parameter);
        let b = graph.new_node("b", Language::Go, NodeKind::Parameter);

        graph.add_dfg(a, b);
        graph.add_dfg(b, a);

        assert_eq!(graph.dfg_successors(a), &[b]);
        assert_eq!(graph.dfg_successors(b), &[a]);
    }

    #[test]
    fn test_record_registration_reports_existing() {
        let mut graph = sample_graph();
        let r1 = graph.new_node(
            "MyStruct",
            Language::Go,
            NodeKind::Record {
                kind: crate::node::RecordKind::Struct,
                fields: vec![],
                methods: vec![],
                super_types: vec![],
                super_type_decls: vec![],
                implemented_interfaces: vec![],
                aliased: None,
            },
        );
        let r2 = graph.new_node(
            "MyStruct",
            Language::Go,
            NodeKind::Record {
                kind: crate::node::RecordKind::Struct,
                fields: vec![],
                methods: vec![],
                super_types: vec![],
                super_type_decls: vec![],
                implemented_interfaces: vec![],
                aliased: None,
            },
        );

        assert!(graph.register_record("p.MyStruct", r1).is_none());
        assert_eq!(graph.register_record("p.MyStruct", r2), Some(r1));
        assert_eq!(graph.record_by_fqn("p.MyStruct"), Some(r1));
    }

    #[test]
    fn test_parent_index_and_walk() {
        let mut graph = sample_graph();
        let lit = graph.new_node(
            "1",
            Language::Go,
            NodeKind::Literal {
                value: crate::node::LiteralValue::Int(1),
            },
        );
        let ret = graph.new_node("", Language::Go, NodeKind::Return { value: Some(lit) });
        let body = graph.new_node(
            "",
            Language::Go,
            NodeKind::Compound {
                statements: vec![ret],
            },
        );

        graph.rebuild_parent_index();
        assert_eq!(graph.parent(lit), Some(ret));
        assert_eq!(graph.parent(ret), Some(body));

        let order = graph.walk(body);
        assert_eq!(order, vec![body, ret, lit]);
    }
}
