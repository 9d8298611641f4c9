//! Embedded member promotion
//!
//! A member call whose receiver record lacks a matching method, but has an
//! embedded field whose (possibly pointer-dereferenced) type provides one,
//! is rewritten so the call goes through the embedded field: the base
//! `x` becomes `x.embedded`, and resolution continues on the embedded
//! record. Chains of embedding are followed with a visited set.

use super::{Pass, PassContext};
use crate::node::{NodeId, NodeKind};
use crate::types::TypeId;
use crate::Result;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

pub struct ResolveEmbeddedMembers;

impl Pass for ResolveEmbeddedMembers {
    fn name(&self) -> &'static str {
        "resolve-embedded-members"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["resolve-interface-implementations"]
    }

    fn run(&mut self, ctx: &mut PassContext) -> Result<()> {
        let member_calls: Vec<NodeId> = ctx
            .graph
            .node_ids()
            .filter(|id| matches!(ctx.graph.node(*id).kind, NodeKind::MemberCall { .. }))
            .collect();

        for call in member_calls {
            self.promote_through_embedding(ctx, call);
        }

        Ok(())
    }
}

impl ResolveEmbeddedMembers {
    fn promote_through_embedding(&self, ctx: &mut PassContext, call: NodeId) {
        let (mut base, name, arg_types) = {
            let node = ctx.graph.node(call);
            let NodeKind::MemberCall {
                base, arguments, ..
            } = &node.kind
            else {
                return;
            };
            let arg_types: Vec<TypeId> = arguments
                .iter()
                .map(|a| ctx.graph.node(*a).ty.unwrap_or_else(|| ctx.types.unknown()))
                .collect();
            (*base, node.name.clone(), arg_types)
        };

        // accept both `recv.m` and `m` spellings of the called name
        let simple = name.rsplit('.').next().unwrap_or(&name);
        let pattern = match Regex::new(&format!(r"^(?:\w+\.)?{}$", regex::escape(simple))) {
            Ok(p) => p,
            Err(_) => return,
        };

        let mut visited: HashSet<NodeId> = HashSet::new();

        loop {
            let Some(record) = record_for_node_type(ctx, base) else {
                return;
            };
            if !visited.insert(record) {
                return;
            }

            if find_matching_method(ctx, record, &pattern, &arg_types).is_some() {
                // the record provides the method itself; nothing to rewrite
                return;
            }

            let Some(field) = embedded_field_providing(ctx, record, &pattern, &arg_types) else {
                return;
            };

            // rewrite the call base from `x` to `x.embedded`
            let field_name = ctx.graph.node(field).name.clone();
            let field_ty = ctx.graph.node(field).ty;
            debug!("promoting {} through embedded field {}", name, field_name);

            let member = ctx.graph.new_node(
                field_name,
                crate::Language::Go,
                NodeKind::Member {
                    base,
                    refers_to: Some(field),
                },
            );
            ctx.graph.node_mut(member).ty = field_ty;
            ctx.graph.node_mut(member).scope = ctx.graph.node(base).scope;

            if let NodeKind::MemberCall { base: slot, .. } = &mut ctx.graph.node_mut(call).kind {
                *slot = member;
            }

            // continue resolution on the embedded record
            base = member;
        }
    }
}

/// The record declaration behind a node's static type, if any.
///
/// Untyped references fall back to a read-only scope lookup; this pass runs
/// before variable resolution, so `refers_to` is not available yet.
fn record_for_node_type(ctx: &PassContext, node: NodeId) -> Option<NodeId> {
    let n = ctx.graph.node(node);
    let ty = n.ty.or_else(|| {
        if !matches!(n.kind, NodeKind::Reference { .. }) {
            return None;
        }
        let scope = n.scope?;
        let declaration =
            ctx.scopes
                .resolve_reference(ctx.graph, ctx.types, scope, &n.name, None)?;
        ctx.graph.node(declaration).ty
    })?;

    let root = ctx.types.root(ty);
    let name = ctx.types.name(root);
    ctx.graph.record_by_fqn(name)
}

/// A method of `record` whose name matches the pattern and whose parameter
/// types match the argument types element-wise
fn find_matching_method(
    ctx: &PassContext,
    record: NodeId,
    pattern: &Regex,
    arg_types: &[TypeId],
) -> Option<NodeId> {
    let NodeKind::Record { methods, .. } = &ctx.graph.node(record).kind else {
        return None;
    };

    for method in methods {
        let node = ctx.graph.node(*method);
        if !pattern.is_match(&node.name) {
            continue;
        }

        let NodeKind::Function { parameters, .. } = &node.kind else {
            continue;
        };
        let param_types: Vec<TypeId> = parameters
            .iter()
            .map(|p| ctx.graph.node(*p).ty.unwrap_or_else(|| ctx.types.unknown()))
            .collect();

        if ctx.types.type_lists_match(&param_types, arg_types) {
            return Some(*method);
        }
    }

    None
}

/// An embedded field whose (dereferenced) record type provides a matching
/// method
fn embedded_field_providing(
    ctx: &PassContext,
    record: NodeId,
    pattern: &Regex,
    arg_types: &[TypeId],
) -> Option<NodeId> {
    let NodeKind::Record { fields, .. } = &ctx.graph.node(record).kind else {
        return None;
    };

    for field in fields {
        let node = ctx.graph.node(*field);
        let NodeKind::Field { embedded: true, .. } = node.kind else {
            continue;
        };

        let Some(mut field_ty) = node.ty else { continue };
        if let Some(inner) = ctx.types.dereference(field_ty) {
            field_ty = inner;
        }

        let name = ctx.types.name(ctx.types.root(field_ty));
        let Some(field_record) = ctx.graph.record_by_fqn(name) else {
            continue;
        };

        if find_matching_method(ctx, field_record, pattern, arg_types).is_some() {
            return Some(*field);
        }
    }

    None
}
