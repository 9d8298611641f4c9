//! Statement handlers
//!
//! Every expression is also a statement in this graph, so expression
//! statements lower to the bare expression without a wrapper.

use super::parser::ParsedFile;
use super::GoFrontend;
use crate::node::{NodeId, NodeKind};
use tracing::debug;
use tree_sitter::Node;

impl GoFrontend {
    pub(crate) fn handle_stmt(&mut self, file: &ParsedFile, node: Node) -> Option<NodeId> {
        let stmt = match node.kind() {
            "expression_statement" => {
                let inner = node.named_child(0)?;
                self.handle_expr(file, inner)
            }
            "short_var_declaration" => self.handle_assign(file, node, true),
            "assignment_statement" => {
                let operator = node
                    .child_by_field_name("operator")
                    .map(|o| file.text(o).to_string())
                    .unwrap_or_else(|| "=".to_string());
                self.handle_assign_with_operator(file, node, false, &operator)
            }
            "var_declaration" | "const_declaration" => Some(self.handle_decl_stmt(file, node)),
            "if_statement" => Some(self.handle_if_stmt(file, node)),
            "for_statement" => Some(self.handle_for_stmt(file, node)),
            "return_statement" => Some(self.handle_return_stmt(file, node)),
            "inc_statement" => self.handle_inc_dec(file, node, "++"),
            "dec_statement" => self.handle_inc_dec(file, node, "--"),
            "block" => Some(self.handle_block(file, node)),
            "expression_switch_statement" | "type_switch_statement" => {
                Some(self.handle_switch_stmt(file, node))
            }
            // goroutine and defer semantics are preserved structurally only:
            // the statement lowers to the bare call expression
            "go_statement" | "defer_statement" => {
                let call = node.named_child(0)?;
                self.handle_expr(file, call)
            }
            "send_statement" => {
                let lhs = node
                    .child_by_field_name("channel")
                    .and_then(|c| self.handle_expr(file, c));
                let rhs = node
                    .child_by_field_name("value")
                    .and_then(|v| self.handle_expr(file, v));
                Some(self.new_node_at(
                    "",
                    NodeKind::Binary {
                        operator: "<-".to_string(),
                        lhs,
                        rhs,
                    },
                    file,
                    node,
                ))
            }
            "break_statement" => Some(self.new_node_at("", NodeKind::Break, file, node)),
            "continue_statement" => Some(self.new_node_at("", NodeKind::Continue, file, node)),
            "labeled_statement" => {
                let label = node
                    .child_by_field_name("label")
                    .map(|l| file.text(l).to_string())
                    .unwrap_or_default();
                let mut cursor = node.walk();
                let children: Vec<Node> = node.named_children(&mut cursor).collect();
                let statement = children
                    .into_iter()
                    .filter(|c| c.kind() != "label_name")
                    .last()
                    .and_then(|s| self.handle_stmt(file, s));
                Some(self.new_node_at(label, NodeKind::Label { statement }, file, node))
            }
            "empty_statement" => None,
            other => {
                debug!("not lowering statement of kind {} yet", other);
                Some(self.problem(format!("unsupported statement: {}", other), file, node))
            }
        };

        if let Some(stmt) = stmt {
            self.attach_comment(stmt, file, node);
        }

        stmt
    }

    /// Lower a block, entering its scope around the statements
    pub(crate) fn handle_block(&mut self, file: &ParsedFile, block: Node) -> NodeId {
        let compound = self.new_node_at("", NodeKind::Compound { statements: vec![] }, file, block);
        self.enter(compound);

        let mut cursor = block.walk();
        let children: Vec<Node> = block.named_children(&mut cursor).collect();
        for child in children {
            if child.kind() == "comment" {
                continue;
            }
            if let Some(stmt) = self.handle_stmt(file, child) {
                self.push_statement(compound, stmt);
            }
        }

        self.leave(compound);
        compound
    }

    pub(crate) fn push_statement(&mut self, compound: NodeId, stmt: NodeId) {
        if let NodeKind::Compound { statements } = &mut self.graph.node_mut(compound).kind {
            statements.push(stmt);
        }
    }

    /// Wrap local var/const declarations into a declaration statement
    fn handle_decl_stmt(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        let stmt = self.new_node_at(
            "",
            NodeKind::DeclarationStmt {
                declarations: vec![],
            },
            file,
            node,
        );

        let mut cursor = node.walk();
        let specs: Vec<Node> = node.named_children(&mut cursor).collect();
        for spec in specs {
            if !matches!(spec.kind(), "var_spec" | "const_spec") {
                continue;
            }
            for variable in self.handle_value_spec(file, spec) {
                self.scopes.add_declaration(&mut self.graph, variable, false);
                if let NodeKind::DeclarationStmt { declarations } =
                    &mut self.graph.node_mut(stmt).kind
                {
                    declarations.push(variable);
                }
            }
        }

        stmt
    }

    fn handle_if_stmt(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        let stmt = self.new_node_at(
            "",
            NodeKind::If {
                init: None,
                condition: None,
                then_branch: None,
                else_branch: None,
            },
            file,
            node,
        );
        self.enter(stmt);

        let init = node
            .child_by_field_name("initializer")
            .and_then(|i| self.handle_stmt(file, i));
        let condition = node
            .child_by_field_name("condition")
            .and_then(|c| self.handle_expr(file, c));
        let then_branch = node
            .child_by_field_name("consequence")
            .map(|b| self.handle_block(file, b));
        let else_branch = node
            .child_by_field_name("alternative")
            .and_then(|e| self.handle_stmt(file, e));

        if condition.is_none() {
            debug!("if statement without a parseable condition");
        }

        if let NodeKind::If {
            init: i,
            condition: c,
            then_branch: t,
            else_branch: e,
        } = &mut self.graph.node_mut(stmt).kind
        {
            *i = init;
            *c = condition;
            *t = then_branch;
            *e = else_branch;
        }

        self.leave(stmt);
        stmt
    }

    fn handle_for_stmt(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        // a for statement with a range clause is a foreach
        let mut cursor = node.walk();
        let range_clause = node
            .named_children(&mut cursor)
            .find(|c| c.kind() == "range_clause");
        if let Some(range) = range_clause {
            return self.handle_range_stmt(file, node, range);
        }

        let stmt = self.new_node_at(
            "",
            NodeKind::For {
                init: None,
                condition: None,
                post: None,
                body: None,
            },
            file,
            node,
        );
        self.enter(stmt);

        let mut init = None;
        let mut condition = None;
        let mut post = None;

        let mut clause_cursor = node.walk();
        let for_clause = node
            .named_children(&mut clause_cursor)
            .find(|c| c.kind() == "for_clause");

        if let Some(clause) = for_clause {
            init = clause
                .child_by_field_name("initializer")
                .and_then(|i| self.handle_stmt(file, i));
            condition = clause
                .child_by_field_name("condition")
                .and_then(|c| self.handle_expr(file, c));
            post = clause
                .child_by_field_name("update")
                .and_then(|u| self.handle_stmt(file, u));
        } else {
            // `for cond {}`: the condition is the only non-body child
            let mut cond_cursor = node.walk();
            let cond_node = node
                .named_children(&mut cond_cursor)
                .find(|c| c.kind() != "block");
            condition = cond_node.and_then(|c| self.handle_expr(file, c));
        }

        let body = node
            .child_by_field_name("body")
            .map(|b| self.handle_block(file, b));

        if let NodeKind::For {
            init: i,
            condition: c,
            post: p,
            body: b,
        } = &mut self.graph.node_mut(stmt).kind
        {
            *i = init;
            *c = condition;
            *p = post;
            *b = body;
        }

        self.leave(stmt);
        stmt
    }

    fn handle_range_stmt(&mut self, file: &ParsedFile, node: Node, range: Node) -> NodeId {
        let stmt = self.new_node_at(
            "",
            NodeKind::ForEach {
                variables: vec![],
                iterable: None,
                body: None,
            },
            file,
            node,
        );

        let iterable = range
            .child_by_field_name("right")
            .and_then(|r| self.handle_expr(file, r));

        self.enter(stmt);

        let left_exprs: Vec<Node> = range
            .child_by_field_name("left")
            .map(|list| {
                let mut cursor = list.walk();
                list.named_children(&mut cursor).collect()
            })
            .unwrap_or_default();

        let define = range
            .child_by_field_name("operator")
            .map(|o| file.text(o) == ":=")
            .unwrap_or(false);

        let mut variables = Vec::new();
        if left_exprs.is_empty() {
            // `for range xs {}` still needs a variable slot
            variables.push(self.new_node_at(
                "",
                NodeKind::DeclarationStmt {
                    declarations: vec![],
                },
                file,
                range,
            ));
        } else if define {
            // DEFINE: the key and value become new variables, typed by the
            // oracle when it answers
            let decl_stmt = self.new_node_at(
                "",
                NodeKind::DeclarationStmt {
                    declarations: vec![],
                },
                file,
                range,
            );
            for expr in &left_exprs {
                let name = file.text(*expr).to_string();
                let variable = self.new_node_at(
                    name,
                    NodeKind::Variable { initializer: None },
                    file,
                    *expr,
                );
                if let Some(ty) = self.oracle_type(file, *expr) {
                    self.graph.node_mut(variable).ty = Some(ty);
                }
                self.scopes.add_declaration(&mut self.graph, variable, false);
                if let NodeKind::DeclarationStmt { declarations } =
                    &mut self.graph.node_mut(decl_stmt).kind
                {
                    declarations.push(variable);
                }
                if let Some(iter) = iterable {
                    self.graph.add_dfg(iter, variable);
                }
            }
            variables.push(decl_stmt);
        } else {
            // ASSIGN: references to existing variables
            for expr in &left_exprs {
                if let Some(reference) = self.handle_expr(file, *expr) {
                    variables.push(reference);
                    if let Some(iter) = iterable {
                        self.graph.add_dfg(iter, reference);
                    }
                }
            }
        }

        let body = node
            .child_by_field_name("body")
            .map(|b| self.handle_block(file, b));

        if let NodeKind::ForEach {
            variables: v,
            iterable: it,
            body: b,
        } = &mut self.graph.node_mut(stmt).kind
        {
            *v = variables;
            *it = iterable;
            *b = body;
        }

        self.leave(stmt);
        stmt
    }

    fn handle_return_stmt(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        let exprs: Vec<Node> = node
            .named_child(0)
            .filter(|c| c.kind() == "expression_list")
            .map(|list| {
                let mut cursor = list.walk();
                list.named_children(&mut cursor).collect()
            })
            .unwrap_or_else(|| node.named_child(0).into_iter().collect());

        let value = if exprs.len() > 1 {
            // multi-valued return wraps its results into a tuple
            let tuple = self.new_node_at("", NodeKind::Tuple { members: vec![] }, file, node);
            for expr in exprs {
                let member = self
                    .handle_expr(file, expr)
                    .unwrap_or_else(|| self.problem("Could not convert.", file, expr));
                if let NodeKind::Tuple { members } = &mut self.graph.node_mut(tuple).kind {
                    members.push(member);
                }
                self.graph.add_dfg(member, tuple);
            }
            Some(tuple)
        } else {
            exprs.first().and_then(|e| self.handle_expr(file, *e))
        };

        self.new_node_at("", NodeKind::Return { value }, file, node)
    }

    fn handle_inc_dec(&mut self, file: &ParsedFile, node: Node, operator: &str) -> Option<NodeId> {
        let operand = node.named_child(0).and_then(|e| self.handle_expr(file, e));
        Some(self.new_node_at(
            "",
            NodeKind::Unary {
                operator: operator.to_string(),
                operand,
                postfix: true,
            },
            file,
            node,
        ))
    }

    fn handle_switch_stmt(&mut self, file: &ParsedFile, node: Node) -> NodeId {
        let stmt = self.new_node_at(
            "",
            NodeKind::Switch {
                init: None,
                condition: None,
                body: None,
            },
            file,
            node,
        );

        let init = node
            .child_by_field_name("initializer")
            .and_then(|i| self.handle_stmt(file, i));
        let condition = node
            .child_by_field_name("value")
            .and_then(|v| self.handle_expr(file, v));

        // case clauses land in one shared block; the case statement itself
        // is followed by its body statements to keep execution order
        let compound = self.new_node_at("", NodeKind::Compound { statements: vec![] }, file, node);
        self.enter(compound);

        let mut cursor = node.walk();
        let clauses: Vec<Node> = node.named_children(&mut cursor).collect();
        for clause in clauses {
            match clause.kind() {
                "expression_case" => {
                    let expression = clause
                        .child_by_field_name("value")
                        .and_then(|list| list.named_child(0))
                        .and_then(|first| self.handle_expr(file, first));
                    let case =
                        self.new_node_at("", NodeKind::Case { expression }, file, clause);
                    self.push_statement(compound, case);
                    self.handle_case_body(file, compound, clause);
                }
                "type_case" => {
                    let case =
                        self.new_node_at("", NodeKind::Case { expression: None }, file, clause);
                    self.push_statement(compound, case);
                    self.handle_case_body(file, compound, clause);
                }
                "default_case" => {
                    let default = self.new_node_at("", NodeKind::Default, file, clause);
                    self.push_statement(compound, default);
                    self.handle_case_body(file, compound, clause);
                }
                _ => {}
            }
        }

        self.leave(compound);

        if let NodeKind::Switch {
            init: i,
            condition: c,
            body: b,
        } = &mut self.graph.node_mut(stmt).kind
        {
            *i = init;
            *c = condition;
            *b = Some(compound);
        }

        stmt
    }

    fn handle_case_body(&mut self, file: &ParsedFile, compound: NodeId, clause: Node) {
        // the clause's own case expressions/types are not body statements
        let mut guarded = std::collections::HashSet::new();
        let mut values = clause.walk();
        for value in clause.children_by_field_name("value", &mut values) {
            guarded.insert(value.id());
        }
        let mut types = clause.walk();
        for ty in clause.children_by_field_name("type", &mut types) {
            guarded.insert(ty.id());
        }

        let mut cursor = clause.walk();
        let children: Vec<Node> = clause.named_children(&mut cursor).collect();
        for child in children {
            if guarded.contains(&child.id()) || child.kind() == "comment" {
                continue;
            }
            if let Some(stmt) = self.handle_stmt(file, child) {
                self.push_statement(compound, stmt);
            }
        }
    }

    fn handle_assign(&mut self, file: &ParsedFile, node: Node, define: bool) -> Option<NodeId> {
        self.handle_assign_with_operator(file, node, define, "=")
    }

    /// Lower short variable declarations and assignments.
    ///
    /// Multi-valued right-hand sides destructure by index: DEFINE creates a
    /// declaration statement of variables initialised with destructure
    /// expressions, ASSIGN creates a compound of per-element assignments.
    fn handle_assign_with_operator(
        &mut self,
        file: &ParsedFile,
        node: Node,
        define: bool,
        operator: &str,
    ) -> Option<NodeId> {
        let lhs_exprs: Vec<Node> = node
            .child_by_field_name("left")
            .map(|list| {
                let mut cursor = list.walk();
                list.named_children(&mut cursor).collect()
            })
            .unwrap_or_default();
        let rhs_exprs: Vec<Node> = node
            .child_by_field_name("right")
            .map(|list| {
                let mut cursor = list.walk();
                list.named_children(&mut cursor).collect()
            })
            .unwrap_or_default();

        if lhs_exprs.is_empty() || rhs_exprs.is_empty() {
            return Some(self.problem("malformed assignment", file, node));
        }

        // multiple right-hand expressions collapse into a tuple
        let rhs = if rhs_exprs.len() > 1 {
            let tuple = self.new_node_at("", NodeKind::Tuple { members: vec![] }, file, node);
            for expr in &rhs_exprs {
                let member = self
                    .handle_expr(file, *expr)
                    .unwrap_or_else(|| self.problem("Could not convert.", file, *expr));
                if let NodeKind::Tuple { members } = &mut self.graph.node_mut(tuple).kind {
                    members.push(member);
                }
                self.graph.add_dfg(member, tuple);
            }
            tuple
        } else {
            self.handle_expr(file, rhs_exprs[0])
                .unwrap_or_else(|| self.problem("Could not convert.", file, rhs_exprs[0]))
        };

        if define || operator == ":=" {
            let stmt = self.new_node_at(
                "",
                NodeKind::DeclarationStmt {
                    declarations: vec![],
                },
                file,
                node,
            );

            if lhs_exprs.len() > 1 {
                for (ix, lhs) in lhs_exprs.iter().enumerate() {
                    let name = file.text(*lhs).to_string();
                    let variable = self.new_node_at(
                        name,
                        NodeKind::Variable { initializer: None },
                        file,
                        *lhs,
                    );
                    if let Some(ty) = self.oracle_type(file, *lhs) {
                        self.graph.node_mut(variable).ty = Some(ty);
                    }

                    let destructure = self.new_node_at(
                        "",
                        NodeKind::DestructureTuple {
                            index: ix,
                            tuple: rhs,
                        },
                        file,
                        node,
                    );
                    self.graph.add_dfg(rhs, destructure);
                    self.graph.add_dfg(destructure, variable);

                    if let NodeKind::Variable { initializer } =
                        &mut self.graph.node_mut(variable).kind
                    {
                        *initializer = Some(destructure);
                    }

                    self.scopes.add_declaration(&mut self.graph, variable, false);
                    if let NodeKind::DeclarationStmt { declarations } =
                        &mut self.graph.node_mut(stmt).kind
                    {
                        declarations.push(variable);
                    }
                }
            } else {
                let name = file.text(lhs_exprs[0]).to_string();
                let variable = self.new_node_at(
                    name,
                    NodeKind::Variable {
                        initializer: Some(rhs),
                    },
                    file,
                    node,
                );
                if let Some(ty) = self.oracle_type(file, lhs_exprs[0]) {
                    self.graph.node_mut(variable).ty = Some(ty);
                } else if let Some(rhs_ty) = self.graph.node(rhs).ty {
                    self.graph.node_mut(variable).ty = Some(rhs_ty);
                }
                self.graph.add_dfg(rhs, variable);

                self.scopes.add_declaration(&mut self.graph, variable, false);
                if let NodeKind::DeclarationStmt { declarations } =
                    &mut self.graph.node_mut(stmt).kind
                {
                    declarations.push(variable);
                }
            }

            return Some(stmt);
        }

        if lhs_exprs.len() > 1 {
            let compound =
                self.new_node_at("", NodeKind::Compound { statements: vec![] }, file, node);

            for (ix, lhs_node) in lhs_exprs.iter().enumerate() {
                let Some(lhs) = self.handle_expr(file, *lhs_node) else {
                    continue;
                };

                let destructure = self.new_node_at(
                    "",
                    NodeKind::DestructureTuple {
                        index: ix,
                        tuple: rhs,
                    },
                    file,
                    node,
                );
                self.graph.add_dfg(rhs, destructure);
                self.graph.add_dfg(destructure, lhs);

                let binary = self.new_node_at(
                    "",
                    NodeKind::Binary {
                        operator: "=".to_string(),
                        lhs: Some(lhs),
                        rhs: Some(destructure),
                    },
                    file,
                    node,
                );
                self.push_statement(compound, binary);
            }

            return Some(compound);
        }

        let lhs = self.handle_expr(file, lhs_exprs[0]);
        if let Some(lhs) = lhs {
            self.graph.add_dfg(rhs, lhs);
        }

        Some(self.new_node_at(
            "",
            NodeKind::Binary {
                operator: operator.to_string(),
                lhs,
                rhs: Some(rhs),
            },
            file,
            node,
        ))
    }
}
