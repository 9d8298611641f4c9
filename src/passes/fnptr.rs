//! Function pointer call binding
//!
//! A call whose callee resolves to a function-typed value rather than a
//! function declaration is bound by walking backward along data-flow edges
//! from the callee, accumulating function declarations with a matching
//! signature. The traversal uses a visited set because data flow may form
//! cycles. A candidate set larger than the configured cap abandons the
//! binding.

use super::{Pass, PassContext};
use crate::node::{NodeId, NodeKind};
use crate::Result;
use std::collections::HashSet;
use tracing::debug;

pub struct FunctionPointerCallResolver;

impl Pass for FunctionPointerCallResolver {
    fn name(&self) -> &'static str {
        "function-pointer-calls"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["resolve-variables"]
    }

    fn run(&mut self, ctx: &mut PassContext) -> Result<()> {
        let calls: Vec<NodeId> = ctx
            .graph
            .node_ids()
            .filter(|id| matches!(ctx.graph.node(*id).kind, NodeKind::Call { .. }))
            .collect();

        for call in calls {
            self.bind(ctx, call);
        }

        Ok(())
    }
}

impl FunctionPointerCallResolver {
    fn bind(&self, ctx: &mut PassContext, call: NodeId) {
        let (callee, already_bound) = match &ctx.graph.node(call).kind {
            NodeKind::Call {
                callee, invokes, ..
            } => (*callee, !invokes.is_empty()),
            _ => return,
        };
        if already_bound {
            return;
        }

        // only calls through function-typed values qualify; direct calls to
        // function declarations were bound earlier
        let callee_node = ctx.graph.node(callee);
        let pointer_ty = match callee_node.ty {
            Some(ty) if ctx.types.get(ty).is_function() => ty,
            _ => match callee_node
                .refers_to()
                .and_then(|d| ctx.graph.node(d).ty)
            {
                Some(ty) if ctx.types.get(ty).is_function() => ty,
                _ => return,
            },
        };
        if let Some(target) = callee_node.refers_to() {
            if matches!(ctx.graph.node(target).kind, NodeKind::Function { .. }) {
                return;
            }
        }

        // worklist traversal backward along data flow
        let mut visited: HashSet<NodeId> = HashSet::new();
        let mut worklist = vec![callee];
        let mut candidates: Vec<NodeId> = Vec::new();

        while let Some(current) = worklist.pop() {
            if !visited.insert(current) {
                continue;
            }

            let node = ctx.graph.node(current);
            if let NodeKind::Function { .. } = node.kind {
                let matches_signature = node
                    .ty
                    .map(|ty| ctx.types.function_signatures_match(ty, pointer_ty))
                    .unwrap_or(false);
                if matches_signature && !candidates.contains(&current) {
                    candidates.push(current);
                }
                continue;
            }

            for predecessor in ctx.graph.dfg_predecessors(current) {
                worklist.push(*predecessor);
            }
            // a reference's declaration is a data source even when the
            // read edge is missing
            if let Some(target) = node.refers_to() {
                worklist.push(target);
            }
        }

        if candidates.is_empty() {
            return;
        }
        if candidates.len() > ctx.config.fn_ptr_candidate_cap {
            // ambiguity cap exceeded: leave the call unbound
            debug!(
                "abandoning function pointer binding for {} ({} candidates)",
                ctx.graph.node(call).name,
                candidates.len()
            );
            return;
        }

        candidates.sort();
        self.apply(ctx, call, candidates);
    }

    /// Set `invokes` and refresh the local data flow of arguments and the
    /// return value
    fn apply(&self, ctx: &mut PassContext, call: NodeId, candidates: Vec<NodeId>) {
        let arguments: Vec<NodeId> = match &ctx.graph.node(call).kind {
            NodeKind::Call { arguments, .. } => arguments.clone(),
            _ => vec![],
        };

        for target in &candidates {
            let parameters: Vec<NodeId> = match &ctx.graph.node(*target).kind {
                NodeKind::Function { parameters, .. } => parameters.clone(),
                _ => vec![],
            };
            for (argument, parameter) in arguments.iter().zip(parameters.iter()) {
                ctx.graph.add_dfg(*argument, *parameter);
            }
            ctx.graph.add_dfg(*target, call);
        }

        debug!(
            "bound function pointer call {} to {} candidates",
            ctx.graph.node(call).name,
            candidates.len()
        );

        if let NodeKind::Call { invokes, .. } = &mut ctx.graph.node_mut(call).kind {
            for candidate in candidates {
                if !invokes.contains(&candidate) {
                    invokes.push(candidate);
                }
            }
        }
    }
}
