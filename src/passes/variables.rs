//! Variable, field and call-target resolution
//!
//! Resolution algorithm:
//! 1. Bind every declared reference through the scope manager, walking
//!    outward from the reference's scope (namespace-qualified names jump
//!    into their name scope first)
//! 2. Resolve member expressions against their base's record: fields, then
//!    super-type fields, then methods; unresolved members on records can be
//!    inferred as field declarations
//! 3. Members whose base type is still unknown are deferred and re-resolved
//!    whenever a later binding narrows the base; each base is queued at
//!    most once, so the loop terminates
//! 4. Bind direct call targets element-wise by name and argument types
//! 5. Widen `possible_sub_types` of interface-typed nodes with the
//!    implementations discovered by the interface pass

use super::{Pass, PassContext};
use crate::node::{NodeId, NodeKind};
use crate::scope::ScopeId;
use crate::types::TypeId;
use crate::Result;
use std::collections::{HashMap, HashSet};
use tracing::debug;

#[derive(Default)]
pub struct ResolveVariables {
    /// member expressions waiting for their base's type, keyed by base
    deferred: HashMap<NodeId, Vec<NodeId>>,
    queued_bases: HashSet<NodeId>,
}

impl Pass for ResolveVariables {
    fn name(&self) -> &'static str {
        "resolve-variables"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["resolve-embedded-members"]
    }

    fn run(&mut self, ctx: &mut PassContext) -> Result<()> {
        let ids: Vec<NodeId> = ctx.graph.node_ids().collect();

        for id in &ids {
            match &ctx.graph.node(*id).kind {
                NodeKind::Reference { refers_to: None } => self.resolve_reference(ctx, *id),
                NodeKind::Member {
                    refers_to: None, ..
                } => self.resolve_member(ctx, *id),
                _ => {}
            }
        }

        self.drain_deferred(ctx);

        for id in &ids {
            match &ctx.graph.node(*id).kind {
                NodeKind::Call { .. } => self.bind_call(ctx, *id),
                NodeKind::MemberCall { .. } => self.bind_member_call(ctx, *id),
                _ => {}
            }
        }

        // call binding may have narrowed base types
        self.drain_deferred(ctx);

        widen_possible_sub_types(ctx, &ids);

        Ok(())
    }
}

impl ResolveVariables {
    /// Re-resolve deferred members as long as bindings narrow base types.
    ///
    /// Terminates because each base is queued at most once and every ready
    /// base is removed from the queue before re-resolution.
    fn drain_deferred(&mut self, ctx: &mut PassContext) {
        loop {
            let mut ready: Vec<NodeId> = self
                .deferred
                .keys()
                .copied()
                .filter(|base| known_type_of(ctx, *base).is_some())
                .collect();
            if ready.is_empty() {
                break;
            }
            ready.sort();
            for base in ready {
                if let Some(members) = self.deferred.remove(&base) {
                    for member in members {
                        self.resolve_member(ctx, member);
                    }
                }
            }
        }
    }

    fn resolve_reference(&mut self, ctx: &mut PassContext, id: NodeId) {
        let (name, ty, scope) = {
            let node = ctx.graph.node(id);
            (node.name.clone(), node.ty, node.scope)
        };
        let scope = scope.unwrap_or_else(ScopeId::global);

        // the callee slot of a call and the member slot of a member call
        // are resolved by call binding, unless the reference carries a
        // function-pointer type
        let is_function_typed = ty.map(|t| ctx.types.get(t).is_function()).unwrap_or(false);
        if let Some(parent) = ctx.graph.parent(id) {
            match &ctx.graph.node(parent).kind {
                NodeKind::Call { callee, .. } if *callee == id && !is_function_typed => return,
                NodeKind::MemberCall { member, .. } if *member == id && !is_function_typed => {
                    return
                }
                _ => {}
            }
        }

        // namespace-qualified names jump into their name scope
        let target = match name.rsplit_once('.') {
            Some((namespace, simple)) => {
                let search = ctx.scopes.name_scope(namespace).unwrap_or(scope);
                ctx.scopes
                    .resolve_reference(ctx.graph, ctx.types, search, simple, ty)
            }
            None => ctx
                .scopes
                .resolve_reference(ctx.graph, ctx.types, scope, &name, ty),
        };

        let target = target.or_else(|| {
            if is_function_typed {
                self.match_function_by_signature(ctx, scope, &name, ty.expect("checked"))
            } else {
                None
            }
        });

        match target {
            Some(declaration) => {
                ctx.graph.set_refers_to(id, declaration);
                self.add_reference_dfg(ctx, id, declaration);
            }
            None => {
                debug!("unresolved reference: {}", name);
            }
        }
    }

    /// Fallback for function-pointer typed references: a unique function in
    /// the enclosing namespace with element-wise equal parameter and return
    /// types.
    fn match_function_by_signature(
        &self,
        ctx: &PassContext,
        scope: ScopeId,
        name: &str,
        ref_ty: TypeId,
    ) -> Option<NodeId> {
        let namespace = ctx
            .scopes
            .chain(scope)
            .into_iter()
            .find(|s| ctx.scopes.scope(*s).kind == crate::scope::ScopeKind::Name)?;

        let mut candidates: Vec<NodeId> = Vec::new();
        let mut slots: Vec<(&String, &Vec<NodeId>)> =
            ctx.scopes.scope(namespace).value_decls.iter().collect();
        slots.sort_by(|a, b| a.0.cmp(b.0));

        for (_, slot) in slots {
            for decl in slot {
                let node = ctx.graph.node(*decl);
                if !matches!(node.kind, NodeKind::Function { .. }) {
                    continue;
                }
                match node.ty {
                    Some(fn_ty) if ctx.types.function_signatures_match(fn_ty, ref_ty) => {
                        candidates.push(*decl);
                    }
                    _ => {}
                }
            }
        }

        let simple = name.rsplit('.').next().unwrap_or(name);
        if let Some(named) = candidates
            .iter()
            .find(|c| ctx.graph.node(**c).name == simple)
        {
            return Some(*named);
        }
        if candidates.len() == 1 {
            return Some(candidates[0]);
        }
        None
    }

    /// Data flows from a declaration into its reads and from writes back
    /// into the declaration
    fn add_reference_dfg(&self, ctx: &mut PassContext, reference: NodeId, declaration: NodeId) {
        let is_write = ctx
            .graph
            .parent(reference)
            .map(|parent| match &ctx.graph.node(parent).kind {
                NodeKind::Binary { operator, lhs, .. } => {
                    *lhs == Some(reference) && is_assignment_operator(operator)
                }
                _ => false,
            })
            .unwrap_or(false);

        if is_write {
            ctx.graph.add_dfg(reference, declaration);
        } else {
            ctx.graph.add_dfg(declaration, reference);
        }
    }

    fn resolve_member(&mut self, ctx: &mut PassContext, id: NodeId) {
        let (base, name) = match &ctx.graph.node(id).kind {
            NodeKind::Member {
                base,
                refers_to: None,
            } => (*base, ctx.graph.node(id).name.clone()),
            _ => return,
        };

        let Some(base_ty) = known_type_of(ctx, base) else {
            // first time this base shows up with an unknown type, queue the
            // member; later passes may narrow the base
            if self.queued_bases.insert(base) {
                self.deferred.entry(base).or_default().push(id);
            } else if let Some(queue) = self.deferred.get_mut(&base) {
                if !queue.contains(&id) {
                    queue.push(id);
                }
            }
            return;
        };

        let root = ctx.types.root(base_ty);
        let record_name = ctx.types.name(root).to_string();
        let Some(record) = ctx.graph.record_by_fqn(&record_name) else {
            debug!("no record for member base type {}", record_name);
            return;
        };

        let mut visited = HashSet::new();
        if let Some(field) = find_field(ctx, record, &name, &mut visited) {
            ctx.graph.set_refers_to(id, field);
            ctx.graph.add_dfg(field, id);
            return;
        }

        if let Some(method) = find_method_by_name(ctx, record, &name) {
            ctx.graph.set_refers_to(id, method);
            ctx.graph.add_dfg(method, id);
            return;
        }

        if ctx.config.infer_missing_members {
            let ty = ctx.graph.node(id).ty;
            debug!("inferring field {} on {}", name, record_name);

            let field = ctx.graph.new_node(
                name,
                crate::Language::Go,
                NodeKind::Field {
                    initializer: None,
                    embedded: false,
                },
            );
            ctx.graph.node_mut(field).ty = ty;
            ctx.graph.add_field_to_record(record, field);
            ctx.graph.mark_inferred(field);
            ctx.graph.set_refers_to(id, field);
            ctx.graph.add_dfg(field, id);
        }
    }

    /// Bind a direct call to its function declarations
    fn bind_call(&self, ctx: &mut PassContext, id: NodeId) {
        let (callee, fqn, name, arg_types, scope) = {
            let node = ctx.graph.node(id);
            let NodeKind::Call {
                callee, arguments, ..
            } = &node.kind
            else {
                return;
            };
            let arg_types: Vec<TypeId> = arguments
                .iter()
                .map(|a| known_type_of(ctx, *a).unwrap_or_else(|| ctx.types.unknown()))
                .collect();
            (
                *callee,
                node.fqn.clone(),
                node.name.clone(),
                arg_types,
                node.scope.unwrap_or_else(ScopeId::global),
            )
        };

        // a callee already bound to a function declaration wins
        if let Some(target) = ctx.graph.node(callee).refers_to() {
            if matches!(ctx.graph.node(target).kind, NodeKind::Function { .. }) {
                self.set_invokes(ctx, id, vec![target]);
                return;
            }
            // function-pointer callees are handled by the function pointer
            // pass via data flow
            return;
        }

        let lookup = fqn.unwrap_or(name);
        let matches = ctx
            .scopes
            .resolve_function(ctx.graph, ctx.types, scope, &lookup, &arg_types);

        if matches.is_empty() {
            // the callee may still name a function-typed value; bind the
            // reference so the function pointer pass can traverse from it
            let simple = lookup.rsplit('.').next().unwrap_or(&lookup);
            let callee_ty = ctx.graph.node(callee).ty;
            if let Some(value) =
                ctx.scopes
                    .resolve_reference(ctx.graph, ctx.types, scope, simple, callee_ty)
            {
                if !matches!(ctx.graph.node(value).kind, NodeKind::Function { .. }) {
                    ctx.graph.set_refers_to(callee, value);
                    ctx.graph.add_dfg(value, callee);
                    return;
                }
            }
            debug!("unresolved call: {}", lookup);
            return;
        }

        // bind the callee reference to the first match as well
        ctx.graph.set_refers_to(callee, matches[0]);
        self.set_invokes(ctx, id, matches);
    }

    /// Bind a member call to a method of the base's record
    fn bind_member_call(&self, ctx: &mut PassContext, id: NodeId) {
        let (base, member, name, arg_types) = {
            let node = ctx.graph.node(id);
            let NodeKind::MemberCall {
                base,
                member,
                arguments,
                ..
            } = &node.kind
            else {
                return;
            };
            let arg_types: Vec<TypeId> = arguments
                .iter()
                .map(|a| known_type_of(ctx, *a).unwrap_or_else(|| ctx.types.unknown()))
                .collect();
            (*base, *member, node.name.clone(), arg_types)
        };

        let Some(base_ty) = known_type_of(ctx, base) else {
            return;
        };
        let root = ctx.types.root(base_ty);
        let record_name = ctx.types.name(root).to_string();
        let Some(record) = ctx.graph.record_by_fqn(&record_name) else {
            return;
        };

        let NodeKind::Record { methods, .. } = &ctx.graph.node(record).kind else {
            return;
        };

        let mut target = None;
        for method in methods {
            let node = ctx.graph.node(*method);
            if node.name != name {
                continue;
            }
            let NodeKind::Function { parameters, .. } = &node.kind else {
                continue;
            };
            let param_types: Vec<TypeId> = parameters
                .iter()
                .map(|p| ctx.graph.node(*p).ty.unwrap_or_else(|| ctx.types.unknown()))
                .collect();
            if ctx.types.type_lists_match(&param_types, &arg_types) {
                target = Some(*method);
                break;
            }
        }

        if let Some(method) = target {
            ctx.graph.set_refers_to(member, method);
            self.set_invokes(ctx, id, vec![method]);
        } else {
            debug!("unresolved member call: {}.{}", record_name, name);
        }
    }

    fn set_invokes(&self, ctx: &mut PassContext, call: NodeId, targets: Vec<NodeId>) {
        // arguments flow into parameters, the function flows into the call
        let arguments: Vec<NodeId> = match &ctx.graph.node(call).kind {
            NodeKind::Call { arguments, .. } | NodeKind::MemberCall { arguments, .. } => {
                arguments.clone()
            }
            _ => vec![],
        };

        for target in &targets {
            let parameters: Vec<NodeId> = match &ctx.graph.node(*target).kind {
                NodeKind::Function { parameters, .. } => parameters.clone(),
                _ => vec![],
            };
            for (argument, parameter) in arguments.iter().zip(parameters.iter()) {
                ctx.graph.add_dfg(*argument, *parameter);
            }
            ctx.graph.add_dfg(*target, call);
        }

        match &mut ctx.graph.node_mut(call).kind {
            NodeKind::Call { invokes, .. } | NodeKind::MemberCall { invokes, .. } => {
                for target in targets {
                    if !invokes.contains(&target) {
                        invokes.push(target);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Assignment operators write their left side; comparisons do not
fn is_assignment_operator(op: &str) -> bool {
    op == "=" || (op.ends_with('=') && !matches!(op, "==" | "!=" | "<=" | ">="))
}

/// A node's known (non-unknown) type: its own, or its declaration's
fn known_type_of(ctx: &PassContext, id: NodeId) -> Option<TypeId> {
    let node = ctx.graph.node(id);
    let own = node.ty.filter(|t| !ctx.types.get(*t).is_unknown());
    if own.is_some() {
        return own;
    }
    let target = node.refers_to()?;
    ctx.graph
        .node(target)
        .ty
        .filter(|t| !ctx.types.get(*t).is_unknown())
}

/// A field of the record or of its super-type declarations
fn find_field(
    ctx: &PassContext,
    record: NodeId,
    name: &str,
    visited: &mut HashSet<NodeId>,
) -> Option<NodeId> {
    if !visited.insert(record) {
        return None;
    }

    let NodeKind::Record {
        fields,
        super_type_decls,
        ..
    } = &ctx.graph.node(record).kind
    else {
        return None;
    };

    for field in fields {
        if ctx.graph.node(*field).name == name {
            return Some(*field);
        }
    }

    for super_decl in super_type_decls {
        if let Some(found) = find_field(ctx, *super_decl, name, visited) {
            return Some(found);
        }
    }

    None
}

fn find_method_by_name(ctx: &PassContext, record: NodeId, name: &str) -> Option<NodeId> {
    let NodeKind::Record { methods, .. } = &ctx.graph.node(record).kind else {
        return None;
    };
    methods
        .iter()
        .copied()
        .find(|m| ctx.graph.node(*m).name == name)
}

/// Extend `possible_sub_types` of interface-typed nodes with the structural
/// implementations discovered by the interface pass. This is the only way
/// implementation information reaches downstream consumers.
fn widen_possible_sub_types(ctx: &mut PassContext, ids: &[NodeId]) {
    for id in ids {
        let Some(ty) = ctx.graph.node(*id).ty else {
            continue;
        };
        let Some(subtypes) = ctx.subtypes.get(&ty) else {
            continue;
        };
        let subtypes = subtypes.clone();

        let node = ctx.graph.node_mut(*id);
        for subtype in subtypes {
            if !node.possible_sub_types.contains(&subtype) {
                node.possible_sub_types.push(subtype);
            }
        }
    }
}
