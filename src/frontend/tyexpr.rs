//! Lowering of syntactic type expressions to interned types

use super::parser::ParsedFile;
use super::GoFrontend;
use crate::types::{PointerOrigin, TypeId};
use tracing::debug;
use tree_sitter::Node;

impl GoFrontend {
    /// Lower a type expression node to an interned type.
    ///
    /// Unresolvable or unsupported forms yield the unknown type.
    pub(crate) fn handle_type(&mut self, file: &ParsedFile, node: Node) -> TypeId {
        match node.kind() {
            "type_identifier" | "identifier" | "field_identifier" => {
                let fqn = self.qualify(file.text(node));
                self.types.object(&fqn)
            }
            "qualified_type" => {
                let package = node
                    .child_by_field_name("package")
                    .map(|n| file.text(n).to_string())
                    .unwrap_or_default();
                let name = node
                    .child_by_field_name("name")
                    .map(|n| file.text(n).to_string())
                    .unwrap_or_default();

                // the package part is either an import name or a name in the
                // current module
                let prefix = match file.import_by_name(&package) {
                    Some(import) => import.path.clone(),
                    None => self.qualify(&package),
                };

                self.types.object(&format!("{}.{}", prefix, name))
            }
            "pointer_type" => {
                let element = node
                    .named_child(0)
                    .map(|n| self.handle_type(file, n))
                    .unwrap_or_else(|| self.types.unknown());
                self.types.pointer_to(element, PointerOrigin::Pointer)
            }
            "array_type" | "slice_type" | "implicit_length_array_type" => {
                let element = node
                    .child_by_field_name("element")
                    .map(|n| self.handle_type(file, n))
                    .unwrap_or_else(|| self.types.unknown());
                self.types.pointer_to(element, PointerOrigin::Array)
            }
            "map_type" => {
                let key = node
                    .child_by_field_name("key")
                    .map(|n| self.handle_type(file, n))
                    .unwrap_or_else(|| self.types.unknown());
                let value = node
                    .child_by_field_name("value")
                    .map(|n| self.handle_type(file, n))
                    .unwrap_or_else(|| self.types.unknown());
                self.types.object_with_generics("map", vec![key, value])
            }
            "channel_type" => {
                let element = node
                    .child_by_field_name("value")
                    .map(|n| self.handle_type(file, n))
                    .unwrap_or_else(|| self.types.unknown());
                self.types.object_with_generics("chan", vec![element])
            }
            "function_type" => {
                let parameters = node
                    .child_by_field_name("parameters")
                    .map(|p| self.collect_parameter_types(file, p))
                    .unwrap_or_default();
                let returns = node
                    .child_by_field_name("result")
                    .map(|r| self.collect_result_types(file, r))
                    .unwrap_or_default();
                self.types.function(parameters, returns)
            }
            "generic_type" => {
                let base = node
                    .child_by_field_name("type")
                    .map(|n| self.handle_type(file, n))
                    .unwrap_or_else(|| self.types.unknown());

                let mut generics = Vec::new();
                if let Some(args) = node.child_by_field_name("type_arguments") {
                    let mut cursor = args.walk();
                    for arg in args.named_children(&mut cursor) {
                        generics.push(self.handle_type(file, arg));
                    }
                }

                let name = self.types.name(base).to_string();
                self.types.object_with_generics(&name, generics)
            }
            "parenthesized_type" => node
                .named_child(0)
                .map(|n| self.handle_type(file, n))
                .unwrap_or_else(|| self.types.unknown()),
            other => {
                debug!("cannot lower type expression of kind {}", other);
                self.types.unknown()
            }
        }
    }

    /// Types of a `parameter_list`, one entry per declared name
    pub(crate) fn collect_parameter_types(&mut self, file: &ParsedFile, list: Node) -> Vec<TypeId> {
        let mut out = Vec::new();
        let mut cursor = list.walk();

        for param in list.named_children(&mut cursor) {
            match param.kind() {
                "parameter_declaration" => {
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.handle_type(file, t))
                        .unwrap_or_else(|| self.types.unknown());

                    let names = count_parameter_names(param);
                    for _ in 0..names.max(1) {
                        out.push(ty);
                    }
                }
                "variadic_parameter_declaration" => {
                    let ty = param
                        .child_by_field_name("type")
                        .map(|t| self.handle_type(file, t))
                        .unwrap_or_else(|| self.types.unknown());
                    out.push(self.types.pointer_to(ty, PointerOrigin::Array));
                }
                _ => {}
            }
        }

        out
    }

    /// Types of a function result: a bare type or a parameter list
    pub(crate) fn collect_result_types(&mut self, file: &ParsedFile, result: Node) -> Vec<TypeId> {
        if result.kind() == "parameter_list" {
            self.collect_parameter_types(file, result)
        } else {
            vec![self.handle_type(file, result)]
        }
    }
}

/// Number of names declared by one parameter declaration
pub(crate) fn count_parameter_names(param: Node) -> usize {
    let mut cursor = param.walk();
    let count = param
        .children_by_field_name("name", &mut cursor)
        .count();
    count
}
