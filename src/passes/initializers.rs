//! Initializer list data flow
//!
//! For every initializer list whose type resolves to a known record, every
//! key-value element with a string-literal key naming a field contributes a
//! data-flow edge from the value expression to the field's definition.
//! Composite-literal field keys were lowered to string literals by the
//! frontend precisely for this pass.

use super::{Pass, PassContext};
use crate::node::{LiteralValue, NodeId, NodeKind};
use crate::Result;
use tracing::debug;

pub struct InitializerListDfg;

impl Pass for InitializerListDfg {
    fn name(&self) -> &'static str {
        "initializer-list-dfg"
    }

    fn depends_on(&self) -> &'static [&'static str] {
        &["resolve-variables"]
    }

    fn run(&mut self, ctx: &mut PassContext) -> Result<()> {
        let lists: Vec<NodeId> = ctx
            .graph
            .node_ids()
            .filter(|id| matches!(ctx.graph.node(*id).kind, NodeKind::InitializerList { .. }))
            .collect();

        for list in lists {
            let Some(ty) = ctx.graph.node(list).ty else {
                continue;
            };
            let root = ctx.types.root(ty);
            let record_name = ctx.types.name(root).to_string();
            let Some(record) = ctx.graph.record_by_fqn(&record_name) else {
                continue;
            };

            let initializers: Vec<NodeId> = match &ctx.graph.node(list).kind {
                NodeKind::InitializerList { initializers } => initializers.clone(),
                _ => continue,
            };

            for element in initializers {
                let (key, value) = match &ctx.graph.node(element).kind {
                    NodeKind::KeyValue { key, value } => (*key, *value),
                    _ => continue,
                };

                let field_name = match &ctx.graph.node(key).kind {
                    NodeKind::Literal {
                        value: LiteralValue::String(name),
                    } => name.clone(),
                    _ => continue,
                };

                let Some(field) = field_by_name(ctx, record, &field_name) else {
                    debug!("no field {} on {}", field_name, record_name);
                    continue;
                };

                ctx.graph.add_dfg(value, field);
            }
        }

        Ok(())
    }
}

fn field_by_name(ctx: &PassContext, record: NodeId, name: &str) -> Option<NodeId> {
    let NodeKind::Record { fields, .. } = &ctx.graph.node(record).kind else {
        return None;
    };
    fields
        .iter()
        .copied()
        .find(|f| ctx.graph.node(*f).name == name)
}
