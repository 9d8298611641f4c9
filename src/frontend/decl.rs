//! Declaration handlers - records, functions, methods and value specs
//!
//! Phase A calls into `handle_type_spec` for record skeletons; Phase B calls
//! into `handle_function_decl` and `handle_value_spec` for bodies.

use super::parser::ParsedFile;
use super::GoFrontend;
use crate::node::{NodeId, NodeKind, RecordKind};
use crate::types::PointerOrigin;
use tracing::debug;
use tree_sitter::Node;

impl GoFrontend {
    /// Lower one `type_spec`/`type_alias` into a record declaration.
    ///
    /// Returns `None` for unsupported forms. A record whose FQN is already
    /// known (declared by an earlier file) is reused instead of duplicated.
    pub(crate) fn handle_type_spec(&mut self, file: &ParsedFile, spec: Node) -> Option<NodeId> {
        let name_node = spec.child_by_field_name("name")?;
        let name = file.text(name_node).to_string();
        let fqn = self.qualify(&name);

        if let Some(existing) = self.graph.record_by_fqn(&fqn) {
            debug!("record {} already declared, merging", fqn);
            return Some(existing);
        }

        let type_node = spec.child_by_field_name("type")?;

        let record = if spec.kind() == "type_alias" {
            self.handle_type_alias(file, spec, &name, &fqn, type_node)
        } else {
            match type_node.kind() {
                "struct_type" => self.handle_struct_spec(file, spec, &name, &fqn, type_node),
                "interface_type" => self.handle_interface_spec(file, spec, &name, &fqn, type_node),
                _ => self.handle_type_alias(file, spec, &name, &fqn, type_node),
            }
        };

        self.graph.register_record(fqn, record);

        // methods declared inside the record (interfaces) stay reachable
        // from the enclosing package scope as function-typed values
        let methods: Vec<NodeId> = match &self.graph.node(record).kind {
            NodeKind::Record { methods, .. } => methods.clone(),
            _ => vec![],
        };
        for method in methods {
            let method_name = self.graph.node(method).name.clone();
            self.scopes
                .add_value_declaration_to(self.scopes.current_scope(), &method_name, method);
        }

        Some(record)
    }

    fn new_record(
        &mut self,
        name: &str,
        fqn: &str,
        kind: RecordKind,
        file: &ParsedFile,
        ts_node: Node,
    ) -> NodeId {
        let record = self.new_node_at(
            name,
            NodeKind::Record {
                kind,
                fields: vec![],
                methods: vec![],
                super_types: vec![],
                super_type_decls: vec![],
                implemented_interfaces: vec![],
                aliased: None,
            },
            file,
            ts_node,
        );
        self.graph.node_mut(record).fqn = Some(fqn.to_string());
        let ty = self.types.object(fqn);
        self.graph.node_mut(record).ty = Some(ty);
        record
    }

    fn handle_struct_spec(
        &mut self,
        file: &ParsedFile,
        spec: Node,
        name: &str,
        fqn: &str,
        struct_type: Node,
    ) -> NodeId {
        debug!("handling struct {}", fqn);
        let record = self.new_record(name, fqn, RecordKind::Struct, file, spec);
        self.enter(record);

        let mut cursor = struct_type.walk();
        let field_list = struct_type
            .named_children(&mut cursor)
            .find(|n| n.kind() == "field_declaration_list");

        if let Some(list) = field_list {
            let mut fields = list.walk();
            for field_decl in list.named_children(&mut fields) {
                if field_decl.kind() != "field_declaration" {
                    continue;
                }
                self.handle_field_declaration(file, field_decl);
            }
        }

        self.leave(record);
        record
    }

    fn handle_field_declaration(&mut self, file: &ParsedFile, field_decl: Node) {
        let mut ty = field_decl
            .child_by_field_name("type")
            .map(|t| self.handle_type(file, t))
            .unwrap_or_else(|| self.types.unknown());

        // an embedded field may carry a bare `*` in front of its type
        let mut cursor = field_decl.walk();
        let has_star = field_decl
            .children(&mut cursor)
            .any(|c| !c.is_named() && c.kind() == "*");
        if has_star {
            ty = self.types.pointer_to(ty, PointerOrigin::Pointer);
        }

        let mut names_cursor = field_decl.walk();
        let names: Vec<String> = field_decl
            .children_by_field_name("name", &mut names_cursor)
            .map(|n| file.text(n).to_string())
            .collect();

        if names.is_empty() {
            // embedded field: accessible under the last segment of its
            // root type name
            let root = self.types.root(ty);
            let type_name = self.types.name(root).to_string();
            let name = type_name
                .rsplit('.')
                .next()
                .unwrap_or(&type_name)
                .to_string();
            debug!("handling embedded field of type {}", type_name);

            let field = self.new_node_at(
                name,
                NodeKind::Field {
                    initializer: None,
                    embedded: true,
                },
                file,
                field_decl,
            );
            self.graph.node_mut(field).ty = Some(ty);
            self.scopes.add_declaration(&mut self.graph, field, true);
            self.attach_comment(field, file, field_decl);
            return;
        }

        for name in names {
            let field = self.new_node_at(
                name,
                NodeKind::Field {
                    initializer: None,
                    embedded: false,
                },
                file,
                field_decl,
            );
            self.graph.node_mut(field).ty = Some(ty);
            self.scopes.add_declaration(&mut self.graph, field, true);
            self.attach_comment(field, file, field_decl);
        }
    }

    fn handle_interface_spec(
        &mut self,
        file: &ParsedFile,
        spec: Node,
        name: &str,
        fqn: &str,
        interface_type: Node,
    ) -> NodeId {
        debug!("handling interface {}", fqn);
        let record = self.new_record(name, fqn, RecordKind::Interface, file, spec);
        self.enter(record);

        let mut cursor = interface_type.walk();
        let mut members: Vec<Node> = interface_type.named_children(&mut cursor).collect();
        members.reverse();

        while let Some(member) = members.pop() {
            match member.kind() {
                // some grammar versions nest the members in a list node
                "method_spec_list" => {
                    let mut inner = member.walk();
                    let mut nested: Vec<Node> = member.named_children(&mut inner).collect();
                    nested.reverse();
                    members.append(&mut nested);
                }
                // grammar versions disagree on the member node name
                "method_spec" | "method_elem" => {
                    self.handle_interface_method(file, record, member);
                }
                "type_elem" => {
                    if let Some(inner) = member.named_child(0) {
                        let ty = self.handle_type(file, inner);
                        self.add_record_super_type(record, ty);
                    }
                }
                "type_identifier" | "qualified_type" | "generic_type" => {
                    // an embedded interface becomes a super type
                    let ty = self.handle_type(file, member);
                    self.add_record_super_type(record, ty);
                }
                _ => {}
            }
        }

        self.leave(record);
        record
    }

    fn add_record_super_type(&mut self, record: NodeId, ty: crate::types::TypeId) {
        if let NodeKind::Record { super_types, .. } = &mut self.graph.node_mut(record).kind {
            if !super_types.contains(&ty) {
                super_types.push(ty);
            }
        }
    }

    fn handle_interface_method(&mut self, file: &ParsedFile, record: NodeId, member: Node) {
        let Some(name_node) = member.child_by_field_name("name") else {
            return;
        };
        let name = file.text(name_node).to_string();
        debug!("creating interface method {}", name);

        let method = self.new_node_at(
            name,
            NodeKind::Function {
                parameters: vec![],
                return_types: vec![],
                body: None,
                receiver: None,
                record: None,
            },
            file,
            member,
        );

        self.scopes.add_declaration(&mut self.graph, method, true);
        self.enter(method);
        self.declare_function_signature(
            file,
            method,
            member.child_by_field_name("parameters"),
            member.child_by_field_name("result"),
        );
        self.leave(method);

        self.graph.add_method_to_record(record, method);
        self.attach_comment(method, file, member);
    }

    fn handle_type_alias(
        &mut self,
        file: &ParsedFile,
        spec: Node,
        name: &str,
        fqn: &str,
        type_node: Node,
    ) -> NodeId {
        let record = self.new_record(name, fqn, RecordKind::Alias, file, spec);
        let aliased_ty = self.handle_type(file, type_node);

        if let NodeKind::Record { aliased, .. } = &mut self.graph.node_mut(record).kind {
            *aliased = Some(aliased_ty);
        }

        // the alias name is a typedef in the surrounding scope
        self.scopes
            .add_typedef(self.scopes.current_scope(), name, aliased_ty);

        self.enter(record);
        self.leave(record);
        record
    }

    /// Lower a function or method declaration.
    ///
    /// Returns the declaration and whether the caller should add it to the
    /// current scope; methods that were attached to their record are already
    /// registered and return `false`.
    pub(crate) fn handle_function_decl(
        &mut self,
        file: &ParsedFile,
        node: Node,
    ) -> (Option<NodeId>, bool) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return (None, true);
        };
        let name = file.text(name_node).to_string();
        debug!("handling function {}", name);

        let mut receiver_info = None;
        let mut record = None;

        if let Some(receiver_list) = node.child_by_field_name("receiver") {
            let mut cursor = receiver_list.walk();
            let param = receiver_list
                .named_children(&mut cursor)
                .find(|n| n.kind() == "parameter_declaration");
            if let Some(param) = param {
                let recv_name = param
                    .child_by_field_name("name")
                    .map(|n| file.text(n).to_string());

                if let Some(mut type_node) = param.child_by_field_name("type") {
                    // `*T` receivers attach to the record for T
                    if type_node.kind() == "pointer_type" {
                        if let Some(inner) = type_node.named_child(0) {
                            type_node = inner;
                        }
                    }
                    let record_ty = self.handle_type(file, type_node);
                    let record_name = self.types.name(record_ty).to_string();

                    record = self.scopes.get_record_for_name(
                        &self.graph,
                        self.scopes.current_scope(),
                        &record_name,
                    );
                    if record.is_none() {
                        debug!("record not found for receiver type {}", record_name);
                    }

                    receiver_info = Some((recv_name, record_ty));
                }
            }
        }

        let function = self.new_node_at(
            &name,
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

        if let Some(record) = record {
            self.enter(record);
        }
        self.enter(function);

        // declare the receiver so references to it resolve
        if let Some((Some(recv_name), record_ty)) = &receiver_info {
            if recv_name != "_" {
                let receiver = self.graph.new_node(
                    recv_name.clone(),
                    crate::Language::Go,
                    NodeKind::Variable { initializer: None },
                );
                self.graph.node_mut(receiver).ty = Some(*record_ty);
                self.graph.node_mut(receiver).scope = Some(self.scopes.current_scope());
                self.scopes.add_declaration(&mut self.graph, receiver, false);

                if let NodeKind::Function { receiver: slot, .. } =
                    &mut self.graph.node_mut(function).kind
                {
                    *slot = Some(receiver);
                }
            }
        }

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

        if let Some(record) = record {
            self.graph.add_method_to_record(record, function);
            self.scopes.add_declaration(&mut self.graph, function, true);
            self.leave(record);

            // a method stays reachable from the package scope under its
            // simple name as a function-typed value
            self.scopes
                .add_value_declaration_to(self.scopes.current_scope(), &name, function);

            return (Some(function), false);
        }

        (Some(function), true)
    }

    /// Declare parameters and named results, and compute the function type.
    ///
    /// Must be called with the function's scope active.
    pub(crate) fn declare_function_signature(
        &mut self,
        file: &ParsedFile,
        function: NodeId,
        params: Option<Node>,
        result: Option<Node>,
    ) {
        let mut param_types = Vec::new();

        if let Some(list) = params {
            let mut cursor = list.walk();
            let declarations: Vec<Node> = list.named_children(&mut cursor).collect();

            for param in declarations {
                match param.kind() {
                    "parameter_declaration" => {
                        let ty = param
                            .child_by_field_name("type")
                            .map(|t| self.handle_type(file, t))
                            .unwrap_or_else(|| self.types.unknown());

                        let mut names_cursor = param.walk();
                        let names: Vec<String> = param
                            .children_by_field_name("name", &mut names_cursor)
                            .map(|n| file.text(n).to_string())
                            .collect();

                        if names.is_empty() {
                            param_types.push(ty);
                            let p = self.new_node_at("", NodeKind::Parameter, file, param);
                            self.graph.node_mut(p).ty = Some(ty);
                            self.scopes.add_declaration(&mut self.graph, p, true);
                        } else {
                            for name in names {
                                param_types.push(ty);
                                // an underscore parameter is unnamed
                                let name = if name == "_" { String::new() } else { name };
                                let p = self.new_node_at(name, NodeKind::Parameter, file, param);
                                self.graph.node_mut(p).ty = Some(ty);
                                self.scopes.add_declaration(&mut self.graph, p, true);
                                self.attach_comment(p, file, param);
                            }
                        }
                    }
                    "variadic_parameter_declaration" => {
                        let element = param
                            .child_by_field_name("type")
                            .map(|t| self.handle_type(file, t))
                            .unwrap_or_else(|| self.types.unknown());
                        let ty = self.types.pointer_to(element, PointerOrigin::Array);
                        param_types.push(ty);

                        let name = param
                            .child_by_field_name("name")
                            .map(|n| file.text(n).to_string())
                            .unwrap_or_default();
                        let name = if name == "_" { String::new() } else { name };
                        let p = self.new_node_at(name, NodeKind::Parameter, file, param);
                        self.graph.node_mut(p).ty = Some(ty);
                        self.scopes.add_declaration(&mut self.graph, p, true);
                    }
                    _ => {}
                }
            }
        }

        let mut return_types = Vec::new();
        if let Some(result) = result {
            if result.kind() == "parameter_list" {
                let mut cursor = result.walk();
                let declarations: Vec<Node> = result.named_children(&mut cursor).collect();

                for ret in declarations {
                    if !matches!(ret.kind(), "parameter_declaration") {
                        continue;
                    }
                    let ty = ret
                        .child_by_field_name("type")
                        .map(|t| self.handle_type(file, t))
                        .unwrap_or_else(|| self.types.unknown());

                    let mut names_cursor = ret.walk();
                    let names: Vec<String> = ret
                        .children_by_field_name("name", &mut names_cursor)
                        .map(|n| file.text(n).to_string())
                        .collect();

                    if names.is_empty() {
                        return_types.push(ty);
                    } else {
                        // named results declare variables in the function
                        for name in names {
                            return_types.push(ty);
                            if name == "_" {
                                continue;
                            }
                            let v = self.new_node_at(
                                name,
                                NodeKind::Variable { initializer: None },
                                file,
                                ret,
                            );
                            self.graph.node_mut(v).ty = Some(ty);
                            self.scopes.add_declaration(&mut self.graph, v, false);
                        }
                    }
                }
            } else {
                return_types.push(self.handle_type(file, result));
            }
        }

        let fn_ty = self.types.function(param_types, return_types.clone());
        let node = self.graph.node_mut(function);
        node.ty = Some(fn_ty);
        if let NodeKind::Function {
            return_types: slot, ..
        } = &mut node.kind
        {
            *slot = return_types;
        }
    }

    /// Lower one `var_spec`/`const_spec` into variable declarations.
    ///
    /// Multiple names against a single multi-valued initializer destructure
    /// the initializer by index.
    pub(crate) fn handle_value_spec(&mut self, file: &ParsedFile, spec: Node) -> Vec<NodeId> {
        let mut names_cursor = spec.walk();
        let name_nodes: Vec<Node> = spec
            .children_by_field_name("name", &mut names_cursor)
            .collect();

        let declared_ty = spec
            .child_by_field_name("type")
            .map(|t| self.handle_type(file, t));

        let value_nodes: Vec<Node> = spec
            .child_by_field_name("value")
            .map(|list| {
                let mut cursor = list.walk();
                list.named_children(&mut cursor).collect()
            })
            .unwrap_or_default();

        let destructure = name_nodes.len() > 1 && value_nodes.len() == 1;
        let shared_rhs = if destructure {
            self.handle_expr(file, value_nodes[0])
        } else {
            None
        };

        let mut out = Vec::new();
        for (ix, name_node) in name_nodes.iter().enumerate() {
            let name = file.text(*name_node).to_string();
            let variable = self.new_node_at(
                name,
                NodeKind::Variable { initializer: None },
                file,
                *name_node,
            );

            if let Some(ty) = declared_ty {
                self.graph.node_mut(variable).ty = Some(ty);
            } else if let Some(ty) = self.oracle_type(file, *name_node) {
                self.graph.node_mut(variable).ty = Some(ty);
            }

            let initializer = if destructure {
                shared_rhs.map(|rhs| {
                    let dest = self.new_node_at(
                        "",
                        NodeKind::DestructureTuple {
                            index: ix,
                            tuple: rhs,
                        },
                        file,
                        *name_node,
                    );
                    self.graph.add_dfg(rhs, dest);
                    dest
                })
            } else {
                value_nodes
                    .get(ix)
                    .and_then(|v| self.handle_expr(file, *v))
            };

            if let Some(init) = initializer {
                if let NodeKind::Variable { initializer: slot } =
                    &mut self.graph.node_mut(variable).kind
                {
                    *slot = Some(init);
                }
                self.graph.add_dfg(init, variable);

                // untyped variables take their initializer's type
                if self.graph.node(variable).ty.is_none() {
                    if let Some(init_ty) = self.graph.node(init).ty {
                        self.graph.node_mut(variable).ty = Some(init_ty);
                    }
                }
            }

            out.push(variable);
        }

        out
    }
}
