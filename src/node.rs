//! Graph nodes - typed declarations, statements and expressions
//!
//! Node kinds form a closed set and are represented as tagged variants: a
//! common header (identity, names, location, comment, type) plus a
//! variant-specific payload. Edges between nodes are stored as `NodeId`
//! index vectors, which keeps the AST tree free of ownership cycles while
//! allowing the data-flow and refers-to relations to form cycles.

use crate::location::SourceLocation;
use crate::scope::ScopeId;
use crate::types::TypeId;
use crate::Language;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Stable identity of a node within the graph arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// The kind of a record declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordKind {
    Struct,
    Interface,
    Alias,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Struct => "struct",
            RecordKind::Interface => "interface",
            RecordKind::Alias => "alias",
        }
    }
}

impl FromStr for RecordKind {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s.to_lowercase().as_str() {
            "struct" => Ok(RecordKind::Struct),
            "interface" => Ok(RecordKind::Interface),
            "alias" | "type" => Ok(RecordKind::Alias),
            _ => Err(crate::Error::Scope(format!("Unknown record kind: {}", s))),
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decoded value of a literal expression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LiteralValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    /// The `nil` literal (and literals whose value could not be decoded)
    Null,
}

/// Variant payload of a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeKind {
    // --- Declarations ---
    /// Graph anchor for one source file
    TranslationUnit {
        declarations: Vec<NodeId>,
        includes: Vec<NodeId>,
    },
    /// A package; shared name scope across files
    Namespace { declarations: Vec<NodeId> },
    /// Struct, interface or type alias
    Record {
        kind: RecordKind,
        fields: Vec<NodeId>,
        methods: Vec<NodeId>,
        /// Embedded interfaces and other declared super types
        super_types: Vec<TypeId>,
        /// Record declarations resolved from `super_types`
        super_type_decls: Vec<NodeId>,
        /// Interface types this record was found to implement structurally
        implemented_interfaces: Vec<TypeId>,
        /// For `RecordKind::Alias`: the type this record aliases
        aliased: Option<TypeId>,
    },
    /// A function; with a receiver set, this is a method
    Function {
        parameters: Vec<NodeId>,
        return_types: Vec<TypeId>,
        body: Option<NodeId>,
        receiver: Option<NodeId>,
        /// Owning record for methods (including interface methods)
        record: Option<NodeId>,
    },
    Parameter,
    Variable { initializer: Option<NodeId> },
    Field {
        initializer: Option<NodeId>,
        embedded: bool,
    },
    /// An import; `filename` is the import path
    Include { filename: String },
    /// Placeholder for a subtree that could not be translated
    Problem { message: String },

    // --- Statements ---
    Compound { statements: Vec<NodeId> },
    If {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        then_branch: Option<NodeId>,
        else_branch: Option<NodeId>,
    },
    For {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        post: Option<NodeId>,
        body: Option<NodeId>,
    },
    ForEach {
        /// Key/value slots: declaration statements or references
        variables: Vec<NodeId>,
        iterable: Option<NodeId>,
        body: Option<NodeId>,
    },
    Switch {
        init: Option<NodeId>,
        condition: Option<NodeId>,
        body: Option<NodeId>,
    },
    Case { expression: Option<NodeId> },
    Default,
    DeclarationStmt { declarations: Vec<NodeId> },
    Return { value: Option<NodeId> },
    Break,
    Continue,
    /// Labeled statement; the label name lives in the node header
    Label { statement: Option<NodeId> },

    // --- Expressions ---
    Literal { value: LiteralValue },
    /// Reference to a declared value; resolution fills `refers_to`
    Reference { refers_to: Option<NodeId> },
    /// Member access `base.name`; the member name lives in the node header
    Member {
        base: NodeId,
        refers_to: Option<NodeId>,
    },
    Call {
        callee: NodeId,
        arguments: Vec<NodeId>,
        /// Function declarations bound by the resolver
        invokes: Vec<NodeId>,
    },
    MemberCall {
        base: NodeId,
        member: NodeId,
        arguments: Vec<NodeId>,
        invokes: Vec<NodeId>,
    },
    Binary {
        operator: String,
        lhs: Option<NodeId>,
        rhs: Option<NodeId>,
    },
    Unary {
        operator: String,
        operand: Option<NodeId>,
        postfix: bool,
    },
    /// Type assertions and conversions
    Cast {
        cast_type: TypeId,
        inner: Option<NodeId>,
    },
    New { initializer: Option<NodeId> },
    ArrayCreation { dimensions: Vec<NodeId> },
    ArraySubscript { array: NodeId, subscript: NodeId },
    Construct { arguments: Vec<NodeId> },
    InitializerList { initializers: Vec<NodeId> },
    KeyValue { key: NodeId, value: NodeId },
    Tuple { members: Vec<NodeId> },
    /// Projection of one element out of a tuple-producing expression
    DestructureTuple { index: usize, tuple: NodeId },
    /// Anonymous function wrapped as an expression
    Lambda { function: NodeId },
}

impl NodeKind {
    /// Short kind name for logs and stats
    pub fn kind_name(&self) -> &'static str {
        match self {
            NodeKind::TranslationUnit { .. } => "translation-unit",
            NodeKind::Namespace { .. } => "namespace",
            NodeKind::Record { .. } => "record",
            NodeKind::Function { .. } => "function",
            NodeKind::Parameter => "parameter",
            NodeKind::Variable { .. } => "variable",
            NodeKind::Field { .. } => "field",
            NodeKind::Include { .. } => "include",
            NodeKind::Problem { .. } => "problem",
            NodeKind::Compound { .. } => "compound",
            NodeKind::If { .. } => "if",
            NodeKind::For { .. } => "for",
            NodeKind::ForEach { .. } => "foreach",
            NodeKind::Switch { .. } => "switch",
            NodeKind::Case { .. } => "case",
            NodeKind::Default => "default",
            NodeKind::DeclarationStmt { .. } => "declaration-stmt",
            NodeKind::Return { .. } => "return",
            NodeKind::Break => "break",
            NodeKind::Continue => "continue",
            NodeKind::Label { .. } => "label",
            NodeKind::Literal { .. } => "literal",
            NodeKind::Reference { .. } => "reference",
            NodeKind::Member { .. } => "member",
            NodeKind::Call { .. } => "call",
            NodeKind::MemberCall { .. } => "member-call",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Unary { .. } => "unary",
            NodeKind::Cast { .. } => "cast",
            NodeKind::New { .. } => "new",
            NodeKind::ArrayCreation { .. } => "array-creation",
            NodeKind::ArraySubscript { .. } => "array-subscript",
            NodeKind::Construct { .. } => "construct",
            NodeKind::InitializerList { .. } => "initializer-list",
            NodeKind::KeyValue { .. } => "key-value",
            NodeKind::Tuple { .. } => "tuple",
            NodeKind::DestructureTuple { .. } => "destructure-tuple",
            NodeKind::Lambda { .. } => "lambda",
        }
    }

    pub fn is_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::TranslationUnit { .. }
                | NodeKind::Namespace { .. }
                | NodeKind::Record { .. }
                | NodeKind::Function { .. }
                | NodeKind::Parameter
                | NodeKind::Variable { .. }
                | NodeKind::Field { .. }
                | NodeKind::Include { .. }
                | NodeKind::Problem { .. }
        )
    }

    /// Declarations that carry a value and can be the target of a reference
    pub fn is_value_declaration(&self) -> bool {
        matches!(
            self,
            NodeKind::Function { .. }
                | NodeKind::Parameter
                | NodeKind::Variable { .. }
                | NodeKind::Field { .. }
        )
    }
}

/// A node in the code property graph.
///
/// The header is shared across all kinds; `kind` holds the variant payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: NodeId,
    /// Simple name (possibly empty for anonymous nodes)
    pub name: String,
    /// Fully qualified name, when the node has one (records, namespaces)
    pub fqn: Option<String>,
    pub location: Option<SourceLocation>,
    pub comment: Option<String>,
    pub language: Language,
    /// Static type of the node, when known
    pub ty: Option<TypeId>,
    /// Subtypes this node's value may take at runtime (interface widening)
    pub possible_sub_types: Vec<TypeId>,
    /// Scope the node was created in
    pub scope: Option<ScopeId>,
    pub kind: NodeKind,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, language: Language, kind: NodeKind) -> Self {
        Self {
            id,
            name: name.into(),
            fqn: None,
            location: None,
            comment: None,
            language,
            ty: None,
            possible_sub_types: vec![],
            scope: None,
            kind,
        }
    }

    /// The name resolution should match against: the FQN when present,
    /// otherwise the simple name
    pub fn qualified_name(&self) -> &str {
        self.fqn.as_deref().unwrap_or(&self.name)
    }

    /// Resolution target of a reference or member node
    pub fn refers_to(&self) -> Option<NodeId> {
        match self.kind {
            NodeKind::Reference { refers_to } => refers_to,
            NodeKind::Member { refers_to, .. } => refers_to,
            _ => None,
        }
    }

    pub fn is_method(&self) -> bool {
        matches!(
            self.kind,
            NodeKind::Function {
                record: Some(_), ..
            }
        )
    }

    /// AST children in source order.
    ///
    /// This is the single traversal authority: the parent index, pass
    /// walks and the stats all derive from it.
    pub fn ast_children(&self) -> Vec<NodeId> {
        let mut out = Vec::new();

        // Small helpers to keep the match arms flat
        fn push(out: &mut Vec<NodeId>, id: &Option<NodeId>) {
            if let Some(id) = id {
                out.push(*id);
            }
        }
        fn extend(out: &mut Vec<NodeId>, ids: &[NodeId]) {
            out.extend_from_slice(ids);
        }

        match &self.kind {
            NodeKind::TranslationUnit {
                declarations,
                includes,
            } => {
                extend(&mut out, includes);
                extend(&mut out, declarations);
            }
            NodeKind::Namespace { declarations } => extend(&mut out, declarations),
            NodeKind::Record {
                fields, methods, ..
            } => {
                extend(&mut out, fields);
                extend(&mut out, methods);
            }
            NodeKind::Function {
                parameters,
                body,
                receiver,
                ..
            } => {
                push(&mut out, receiver);
                extend(&mut out, parameters);
                push(&mut out, body);
            }
            NodeKind::Parameter
            | NodeKind::Include { .. }
            | NodeKind::Problem { .. }
            | NodeKind::Default
            | NodeKind::Break
            | NodeKind::Continue
            | NodeKind::Literal { .. }
            | NodeKind::Reference { .. } => {}
            NodeKind::Variable { initializer } | NodeKind::Field { initializer, .. } => {
                push(&mut out, initializer)
            }
            NodeKind::Compound { statements } => extend(&mut out, statements),
            NodeKind::If {
                init,
                condition,
                then_branch,
                else_branch,
            } => {
                push(&mut out, init);
                push(&mut out, condition);
                push(&mut out, then_branch);
                push(&mut out, else_branch);
            }
            NodeKind::For {
                init,
                condition,
                post,
                body,
            } => {
                push(&mut out, init);
                push(&mut out, condition);
                push(&mut out, post);
                push(&mut out, body);
            }
            NodeKind::ForEach {
                variables,
                iterable,
                body,
            } => {
                extend(&mut out, variables);
                push(&mut out, iterable);
                push(&mut out, body);
            }
            NodeKind::Switch {
                init,
                condition,
                body,
            } => {
                push(&mut out, init);
                push(&mut out, condition);
                push(&mut out, body);
            }
            NodeKind::Case { expression } => push(&mut out, expression),
            NodeKind::DeclarationStmt { declarations } => extend(&mut out, declarations),
            NodeKind::Return { value } => push(&mut out, value),
            NodeKind::Label { statement } => push(&mut out, statement),
            NodeKind::Member { base, .. } => out.push(*base),
            NodeKind::Call {
                callee, arguments, ..
            } => {
                out.push(*callee);
                extend(&mut out, arguments);
            }
            NodeKind::MemberCall {
                base,
                member,
                arguments,
                ..
            } => {
                out.push(*base);
                out.push(*member);
                extend(&mut out, arguments);
            }
            NodeKind::Binary { lhs, rhs, .. } => {
                push(&mut out, lhs);
                push(&mut out, rhs);
            }
            NodeKind::Unary { operand, .. } => push(&mut out, operand),
            NodeKind::Cast { inner, .. } => push(&mut out, inner),
            NodeKind::New { initializer } => push(&mut out, initializer),
            NodeKind::ArrayCreation { dimensions } => extend(&mut out, dimensions),
            NodeKind::ArraySubscript { array, subscript } => {
                out.push(*array);
                out.push(*subscript);
            }
            NodeKind::Construct { arguments } => extend(&mut out, arguments),
            NodeKind::InitializerList { initializers } => extend(&mut out, initializers),
            NodeKind::KeyValue { key, value } => {
                out.push(*key);
                out.push(*value);
            }
            NodeKind::Tuple { members } => extend(&mut out, members),
            // the tuple edge of a destructure is a cross reference, not an
            // AST child; the rhs already hangs below the assignment
            NodeKind::DestructureTuple { .. } => {}
            NodeKind::Lambda { function } => out.push(*function),
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_node(id: u32, kind: NodeKind) -> Node {
        Node::new(NodeId(id), "sample", Language::Go, kind)
    }

    #[test]
    fn test_record_kind_roundtrip() {
        for kind in [RecordKind::Struct, RecordKind::Interface, RecordKind::Alias] {
            let parsed: RecordKind = kind.as_str().parse().unwrap();
            assert_eq!(kind, parsed);
        }
    }

    #[test]
    fn test_ast_children_order() {
        let call = sample_node(
            3,
            NodeKind::Call {
                callee: NodeId(1),
                arguments: vec![NodeId(2)],
                invokes: vec![],
            },
        );
        assert_eq!(call.ast_children(), vec![NodeId(1), NodeId(2)]);
    }

    #[test]
    fn test_destructure_has_no_ast_children() {
        let destructure = sample_node(
            5,
            NodeKind::DestructureTuple {
                index: 1,
                tuple: NodeId(4),
            },
        );
        assert!(destructure.ast_children().is_empty());
    }

    #[test]
    fn test_is_method() {
        let plain = sample_node(
            1,
            NodeKind::Function {
                parameters: vec![],
                return_types: vec![],
                body: None,
                receiver: None,
                record: None,
            },
        );
        assert!(!plain.is_method());

        let method = sample_node(
            2,
            NodeKind::Function {
                parameters: vec![],
                return_types: vec![],
                body: None,
                receiver: Some(NodeId(9)),
                record: Some(NodeId(8)),
            },
        );
        assert!(method.is_method());
    }
}
