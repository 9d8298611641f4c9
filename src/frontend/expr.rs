//! Expression handlers
//!
//! Lowering contracts worth noting:
//! - `new T` produces a New expression of type `*T` with a Construct
//!   initializer of type `T`
//! - `make(T, ...)` produces an ArrayCreation for array/slice types and a
//!   Construct for maps and channels
//! - composite literals produce a Construct whose sole argument is an
//!   InitializerList; identifier keys become string-literal keys
//! - a selector whose base names an import lowers to a reference with an
//!   import-qualified FQN instead of a member expression

use super::parser::{unquote, ParsedFile};
use super::GoFrontend;
use crate::node::{LiteralValue, NodeId, NodeKind};
use crate::types::PointerOrigin;
use tracing::debug;
use tree_sitter::Node;

impl GoFrontend {
    pub(crate) fn handle_expr(&mut self, file: &ParsedFile, node: Node) -> Option<NodeId> {
        let expr = match node.kind() {
            "call_expression" => self.handle_call_expr(file, node),
            "binary_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|o| file.text(o).to_string())
                    .unwrap_or_default();
                let lhs = node
                    .child_by_field_name("left")
                    .and_then(|l| self.handle_expr(file, l));
                let rhs = node
                    .child_by_field_name("right")
                    .and_then(|r| self.handle_expr(file, r));
                Some(self.new_node_at("", NodeKind::Binary { operator, lhs, rhs }, file, node))
            }
            "unary_expression" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|o| file.text(o).to_string())
                    .unwrap_or_default();
                let operand = node
                    .child_by_field_name("operand")
                    .and_then(|o| self.handle_expr(file, o));
                Some(self.new_node_at(
                    "",
                    NodeKind::Unary {
                        operator,
                        operand,
                        postfix: false,
                    },
                    file,
                    node,
                ))
            }
            "selector_expression" => self.handle_selector_expr(file, node),
            "index_expression" => {
                let array = self.expr_or_problem(file, node.child_by_field_name("operand"), node);
                let subscript = self.expr_or_problem(file, node.child_by_field_name("index"), node);
                Some(self.new_node_at(
                    "",
                    NodeKind::ArraySubscript { array, subscript },
                    file,
                    node,
                ))
            }
            "slice_expression" => {
                let array = self.expr_or_problem(file, node.child_by_field_name("operand"), node);
                let subscript = self.expr_or_problem(file, node.child_by_field_name("start"), node);
                Some(self.new_node_at(
                    "",
                    NodeKind::ArraySubscript { array, subscript },
                    file,
                    node,
                ))
            }
            "composite_literal" => Some(self.handle_composite_lit(file, node)),
            "func_literal" => Some(self.handle_func_lit(file, node)),
            "identifier" | "field_identifier" | "package_identifier" | "type_identifier" => {
                Some(self.handle_ident(file, node))
            }
            "true" | "false" => {
                let value = LiteralValue::Bool(node.kind() == "true");
                let literal =
                    self.new_node_at(file.text(node), NodeKind::Literal { value }, file, node);
                let ty = self.types.object("bool");
                self.graph.node_mut(literal).ty = Some(ty);
                Some(literal)
            }
            "nil" => {
                // nil is a literal with an unknown type
                let literal = self.new_node_at(
                    "nil",
                    NodeKind::Literal {
                        value: LiteralValue::Null,
                    },
                    file,
                    node,
                );
                let ty = self.types.unknown();
                self.graph.node_mut(literal).ty = Some(ty);
                Some(literal)
            }
            "iota" => Some(self.new_node_at(
                "iota",
                NodeKind::Reference { refers_to: None },
                file,
                node,
            )),
            "int_literal" => {
                let value = parse_int_literal(file.text(node))
                    .map(LiteralValue::Int)
                    .unwrap_or(LiteralValue::Null);
                let literal = self.new_node_at("", NodeKind::Literal { value }, file, node);
                let ty = self.types.object("int");
                self.graph.node_mut(literal).ty = Some(ty);
                Some(literal)
            }
            "float_literal" => {
                let value = file
                    .text(node)
                    .replace('_', "")
                    .parse::<f64>()
                    .map(LiteralValue::Float)
                    .unwrap_or(LiteralValue::Null);
                let literal = self.new_node_at("", NodeKind::Literal { value }, file, node);
                // untyped float constants default to float64
                let ty = self.types.object("float64");
                self.graph.node_mut(literal).ty = Some(ty);
                Some(literal)
            }
            "interpreted_string_literal" | "raw_string_literal" => {
                let value = LiteralValue::String(unquote(file.text(node)));
                let literal = self.new_node_at("", NodeKind::Literal { value }, file, node);
                let ty = self.types.object("string");
                self.graph.node_mut(literal).ty = Some(ty);
                Some(literal)
            }
            "rune_literal" => {
                let value = LiteralValue::String(file.text(node).to_string());
                Some(self.new_node_at("", NodeKind::Literal { value }, file, node))
            }
            "imaginary_literal" => Some(self.new_node_at(
                "",
                NodeKind::Literal {
                    value: LiteralValue::Null,
                },
                file,
                node,
            )),
            "type_assertion_expression" => {
                // type assertions become casts with the asserted type
                let cast_type = node
                    .child_by_field_name("type")
                    .map(|t| self.handle_type(file, t))
                    .unwrap_or_else(|| self.types.unknown());
                let inner = node
                    .child_by_field_name("operand")
                    .and_then(|o| self.handle_expr(file, o));
                let cast = self.new_node_at("", NodeKind::Cast { cast_type, inner }, file, node);
                self.graph.node_mut(cast).ty = Some(cast_type);
                Some(cast)
            }
            "type_conversion_expression" => {
                let cast_type = node
                    .child_by_field_name("type")
                    .map(|t| self.handle_type(file, t))
                    .unwrap_or_else(|| self.types.unknown());
                let inner = node
                    .child_by_field_name("operand")
                    .and_then(|o| self.handle_expr(file, o));
                let cast = self.new_node_at("", NodeKind::Cast { cast_type, inner }, file, node);
                self.graph.node_mut(cast).ty = Some(cast_type);
                Some(cast)
            }
            "parenthesized_expression" => {
                let inner = node.named_child(0)?;
                self.handle_expr(file, inner)
            }
            other => {
                debug!("could not lower expression of kind {}", other);
                None
            }
        };

        if let Some(expr) = expr {
            self.attach_comment(expr, file, node);
        }

        expr
    }

    fn expr_or_problem(
        &mut self,
        file: &ParsedFile,
        node: Option<Node>,
        fallback: Node,
    ) -> NodeId {
        match node {
            Some(n) => self
                .handle_expr(file, n)
                .unwrap_or_else(|| self.problem("Could not convert.", file, n)),
            None => self.problem("missing operand", file, fallback),
        }
    }

    /// References to `new`/`make` become allocation expressions; selector
    /// callees become member calls; everything else is a plain call.
    fn handle_call_expr(&mut self, file: &ParsedFile, node: Node) -> Option<NodeId> {
        let fun = node.child_by_field_name("function")?;

        if fun.kind() == "identifier" {
            match file.text(fun) {
                "new" => return self.handle_new_expr(file, node),
                "make" => return self.handle_make_expr(file, node),
                _ => {}
            }
        }

        let arg_nodes = call_argument_nodes(node);

        // a selector callee is either a member call or an import-qualified
        // plain call
        if fun.kind() == "selector_expression" {
            let operand = fun.child_by_field_name("operand")?;
            let member_name = fun
                .child_by_field_name("field")
                .map(|f| file.text(f).to_string())
                .unwrap_or_default();

            let import_path = if operand.kind() == "identifier" {
                file.import_by_name(file.text(operand))
                    .map(|i| i.path.clone())
            } else {
                None
            };

            if let Some(path) = import_path {
                // package-qualified call: a plain call with an FQN the call
                // resolver will look up by namespace
                let fqn = format!("{}.{}", path, member_name);
                let callee = self.new_node_at(
                    fqn.clone(),
                    NodeKind::Reference { refers_to: None },
                    file,
                    fun,
                );
                let call = self.new_node_at(
                    member_name,
                    NodeKind::Call {
                        callee,
                        arguments: vec![],
                        invokes: vec![],
                    },
                    file,
                    node,
                );
                self.graph.node_mut(call).fqn = Some(fqn);
                self.add_call_arguments(file, call, &arg_nodes);
                return Some(call);
            }

            let base = self.expr_or_problem(file, Some(operand), fun);
            let member = self.new_node_at(
                member_name.clone(),
                NodeKind::Reference { refers_to: None },
                file,
                fun,
            );
            let base_name = self.graph.node(base).name.clone();
            let call = self.new_node_at(
                member_name.clone(),
                NodeKind::MemberCall {
                    base,
                    member,
                    arguments: vec![],
                    invokes: vec![],
                },
                file,
                node,
            );
            self.graph.node_mut(call).fqn = Some(format!("{}.{}", base_name, member_name));
            self.add_call_arguments(file, call, &arg_nodes);
            return Some(call);
        }

        let callee = self.expr_or_problem(file, Some(fun), node);
        let callee_name = self.graph.node(callee).name.clone();

        // the callee name is already an FQN if it contains a dot
        let (name, fqn) = if let Some(pos) = callee_name.rfind('.') {
            (callee_name[pos + 1..].to_string(), Some(callee_name.clone()))
        } else {
            (callee_name, None)
        };

        let call = self.new_node_at(
            name,
            NodeKind::Call {
                callee,
                arguments: vec![],
                invokes: vec![],
            },
            file,
            node,
        );
        self.graph.node_mut(call).fqn = fqn;
        self.add_call_arguments(file, call, &arg_nodes);
        Some(call)
    }

    fn add_call_arguments(&mut self, file: &ParsedFile, call: NodeId, arg_nodes: &[Node]) {
        for arg in arg_nodes {
            let lowered = self
                .handle_expr(file, *arg)
                .unwrap_or_else(|| self.problem("Could not parse argument.", file, *arg));
            match &mut self.graph.node_mut(call).kind {
                NodeKind::Call { arguments, .. } | NodeKind::MemberCall { arguments, .. } => {
                    arguments.push(lowered)
                }
                _ => {}
            }
        }
    }

    /// `new T`: a New expression typed `*T` with a Construct initializer
    fn handle_new_expr(&mut self, file: &ParsedFile, node: Node) -> Option<NodeId> {
        let args = call_argument_nodes(node);
        let type_arg = args.first()?;

        let ty = self.handle_type(file, *type_arg);
        let pointer = self.types.pointer_to(ty, PointerOrigin::Pointer);

        let construct =
            self.new_node_at("", NodeKind::Construct { arguments: vec![] }, file, node);
        self.graph.node_mut(construct).ty = Some(ty);

        let new_expr = self.new_node_at(
            "",
            NodeKind::New {
                initializer: Some(construct),
            },
            file,
            node,
        );
        self.graph.node_mut(new_expr).ty = Some(pointer);
        self.graph.add_dfg(construct, new_expr);

        Some(new_expr)
    }

    /// `make(T, ...)`: array creation for array/slice types, otherwise a
    /// construct expression with the remaining arguments
    fn handle_make_expr(&mut self, file: &ParsedFile, node: Node) -> Option<NodeId> {
        let args = call_argument_nodes(node);
        let type_arg = args.first()?;
        let ty = self.handle_type(file, *type_arg);

        let is_array = matches!(
            type_arg.kind(),
            "slice_type" | "array_type" | "implicit_length_array_type"
        );

        let expr = if is_array {
            let creation =
                self.new_node_at("", NodeKind::ArrayCreation { dimensions: vec![] }, file, node);
            for dim in &args[1..] {
                let lowered = self
                    .handle_expr(file, *dim)
                    .unwrap_or_else(|| self.problem("Could not convert.", file, *dim));
                if let NodeKind::ArrayCreation { dimensions } =
                    &mut self.graph.node_mut(creation).kind
                {
                    dimensions.push(lowered);
                }
            }
            creation
        } else {
            let construct =
                self.new_node_at("", NodeKind::Construct { arguments: vec![] }, file, node);
            for arg in &args[1..] {
                let lowered = self
                    .handle_expr(file, *arg)
                    .unwrap_or_else(|| self.problem("Could not convert.", file, *arg));
                if let NodeKind::Construct { arguments } = &mut self.graph.node_mut(construct).kind
                {
                    arguments.push(lowered);
                }
            }
            construct
        };

        self.graph.node_mut(expr).ty = Some(ty);
        Some(expr)
    }

    /// `x.Y`: a member expression, unless `x` names an import, in which
    /// case this is a reference with the import-qualified FQN
    fn handle_selector_expr(&mut self, file: &ParsedFile, node: Node) -> Option<NodeId> {
        let operand = node.child_by_field_name("operand")?;
        let member_name = node
            .child_by_field_name("field")
            .map(|f| file.text(f).to_string())
            .unwrap_or_default();

        if operand.kind() == "identifier" {
            if let Some(import) = file.import_by_name(file.text(operand)) {
                let fqn = format!("{}.{}", import.path, member_name);
                let reference =
                    self.new_node_at(fqn, NodeKind::Reference { refers_to: None }, file, node);
                return Some(reference);
            }
        }

        let base = self.expr_or_problem(file, Some(operand), node);
        let member = self.new_node_at(
            member_name,
            NodeKind::Member {
                base,
                refers_to: None,
            },
            file,
            node,
        );
        if let Some(ty) = self.oracle_type(file, node) {
            self.graph.node_mut(member).ty = Some(ty);
        }
        Some(member)
    }

    fn handle_ident(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        let name = file.text(node).to_string();

        let reference = self.new_node_at(
            name.clone(),
            NodeKind::Reference { refers_to: None },
            file,
            node,
        );

        // identifiers naming an import are pre-bound to the include
        // declaration; the resolver passes do not handle them
        if file.import_by_name(&name).is_some() {
            if let Some(include) = self.find_include(&name) {
                self.graph.set_refers_to(reference, include);
            }
        }

        if let Some(ty) = self.oracle_type(file, node) {
            self.graph.node_mut(reference).ty = Some(ty);
        }

        reference
    }

    fn find_include(&self, name: &str) -> Option<NodeId> {
        let tu = self.current_tu?;
        if let NodeKind::TranslationUnit { includes, .. } = &self.graph.node(tu).kind {
            includes
                .iter()
                .copied()
                .find(|i| self.graph.node(*i).name == name)
        } else {
            None
        }
    }

    /// Composite literals: a Construct wrapping an InitializerList, with
    /// data flow from every element through the list into the construct
    fn handle_composite_lit(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        let ty = node
            .child_by_field_name("type")
            .map(|t| self.handle_type(file, t))
            .unwrap_or_else(|| self.types.unknown());
        let type_name = self.types.name(ty).to_string();

        let construct =
            self.new_node_at(type_name, NodeKind::Construct { arguments: vec![] }, file, node);
        self.graph.node_mut(construct).ty = Some(ty);

        let list = self.new_node_at(
            "",
            NodeKind::InitializerList {
                initializers: vec![],
            },
            file,
            node,
        );
        self.graph.node_mut(list).ty = Some(ty);

        if let NodeKind::Construct { arguments } = &mut self.graph.node_mut(construct).kind {
            arguments.push(list);
        }
        // a declaration initialised by this literal must see the values, so
        // the list flows into the construct
        self.graph.add_dfg(list, construct);

        if let Some(body) = node.child_by_field_name("body") {
            let mut cursor = body.walk();
            let elements: Vec<Node> = body.named_children(&mut cursor).collect();
            for element in elements {
                let lowered = match element.kind() {
                    "keyed_element" => self.handle_keyed_element(file, element),
                    // grammar versions disagree on the wrapper node name
                    "literal_element" | "element" => element
                        .named_child(0)
                        .and_then(|inner| self.handle_expr(file, inner)),
                    _ => self.handle_expr(file, element),
                };

                if let Some(expr) = lowered {
                    if let NodeKind::InitializerList { initializers } =
                        &mut self.graph.node_mut(list).kind
                    {
                        initializers.push(expr);
                    }
                    self.graph.add_dfg(expr, list);
                }
            }
        }

        construct
    }

    /// A keyed element in a composite literal; identifier keys are treated
    /// as string literal field names
    fn handle_keyed_element(&mut self, file: &ParsedFile, element: Node) -> Option<NodeId> {
        let key_node = unwrap_element(
            element
                .child_by_field_name("key")
                .or_else(|| element.named_child(0))?,
        );
        let value_node = unwrap_element(
            element
                .child_by_field_name("value")
                .or_else(|| element.named_child(1))?,
        );

        let key = if matches!(key_node.kind(), "identifier" | "field_identifier") {
            let literal = self.new_node_at(
                "",
                NodeKind::Literal {
                    value: LiteralValue::String(file.text(key_node).to_string()),
                },
                file,
                key_node,
            );
            let ty = self.types.object("string");
            self.graph.node_mut(literal).ty = Some(ty);
            literal
        } else {
            self.expr_or_problem(file, Some(key_node), element)
        };

        let value = self.expr_or_problem(file, Some(value_node), element);

        let key_value = self.new_node_at("", NodeKind::KeyValue { key, value }, file, element);
        self.graph.add_dfg(value, key_value);
        Some(key_value)
    }

    /// A function literal: an anonymous function wrapped in a lambda
    fn handle_func_lit(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        let function = self.new_node_at(
            "",
            NodeKind::Function {
                parameters: vec![],
                return_types: vec![],
                body: None,
                receiver: None,
                record: None,
            },
            file,
            node,
        );

        self.enter(function);
        self.declare_function_signature(
            file,
            function,
            node.child_by_field_name("parameters"),
            node.child_by_field_name("result"),
        );

        if let Some(body) = node.child_by_field_name("body") {
            let block = self.handle_block(file, body);
            if let NodeKind::Function { body: slot, .. } = &mut self.graph.node_mut(function).kind {
                *slot = Some(block);
            }
        }
        self.leave(function);

        self.scopes.add_declaration(&mut self.graph, function, false);

        let lambda = self.new_node_at("", NodeKind::Lambda { function }, file, node);
        if let Some(ty) = self.graph.node(function).ty {
            self.graph.node_mut(lambda).ty = Some(ty);
        }
        self.graph.add_dfg(function, lambda);
        lambda
    }
}

/// Strip the element wrapper some grammar versions put around composite
/// literal entries
fn unwrap_element(node: Node) -> Node {
    if matches!(node.kind(), "literal_element" | "element") {
        node.named_child(0).unwrap_or(node)
    } else {
        node
    }
}

/// The argument nodes of a call expression
fn call_argument_nodes(call: Node) -> Vec<Node> {
    call.child_by_field_name("arguments")
        .map(|args| {
            let mut cursor = args.walk();
            args.named_children(&mut cursor).collect()
        })
        .unwrap_or_default()
}

/// Decode a Go integer literal (decimal, hex, octal, binary, underscores)
fn parse_int_literal(text: &str) -> Option<i64> {
    let text = text.replace('_', "");
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return i64::from_str_radix(hex, 16).ok();
    }
    if let Some(octal) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        return i64::from_str_radix(octal, 8).ok();
    }
    if let Some(binary) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        return i64::from_str_radix(binary, 2).ok();
    }
    if text.len() > 1 && text.starts_with('0') {
        return i64::from_str_radix(&text[1..], 8).ok();
    }
    text.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_int_literal() {
        assert_eq!(parse_int_literal("42"), Some(42));
        assert_eq!(parse_int_literal("0x2a"), Some(42));
        assert_eq!(parse_int_literal("0b101010"), Some(42));
        assert_eq!(parse_int_literal("052"), Some(42));
        assert_eq!(parse_int_literal("1_000"), Some(1000));
        assert_eq!(parse_int_literal("not a number"), None);
    }
}
