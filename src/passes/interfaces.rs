//! Interface implementation resolution
//!
//! Builds an index from interface method signatures to the interfaces that
//! require them, then counts per struct how many required signatures its
//! methods satisfy. A struct implementing every required signature of an
//! interface is recorded as a structural implementation, both on the struct
//! and in the shared sub-type side index consumed by widening.
//!
//! This pass also links declared super types (embedded interfaces) to their
//! record declarations through the FQN index.

use super::{Pass, PassContext};
use crate::node::{NodeId, NodeKind, RecordKind};
use crate::types::TypeId;
use crate::Result;
use std::collections::HashMap;
use tracing::debug;

pub struct ResolveInterfaceImplementations;

/// A required method: name plus interned function type
type Signature = (String, TypeId);

impl Pass for ResolveInterfaceImplementations {
    fn name(&self) -> &'static str {
        "resolve-interface-implementations"
    }

    fn run(&mut self, ctx: &mut PassContext) -> Result<()> {
        let records: Vec<NodeId> = ctx
            .graph
            .node_ids()
            .filter(|id| matches!(ctx.graph.node(*id).kind, NodeKind::Record { .. }))
            .collect();

        link_super_type_declarations(ctx, &records);

        // signature -> interfaces requiring it
        let mut index: HashMap<Signature, Vec<NodeId>> = HashMap::new();
        let mut required_counts: HashMap<NodeId, usize> = HashMap::new();

        for record in &records {
            let node = ctx.graph.node(*record);
            let NodeKind::Record { kind, methods, .. } = &node.kind else {
                continue;
            };
            if *kind != RecordKind::Interface {
                continue;
            }

            required_counts.insert(*record, methods.len());
            for method in methods {
                let m = ctx.graph.node(*method);
                if let Some(ty) = m.ty {
                    index
                        .entry((m.name.clone(), ty))
                        .or_default()
                        .push(*record);
                }
            }
        }

        for record in &records {
            let node = ctx.graph.node(*record);
            let NodeKind::Record { kind, methods, .. } = &node.kind else {
                continue;
            };
            if *kind != RecordKind::Struct {
                continue;
            }

            let struct_ty = match node.ty {
                Some(ty) => ty,
                None => continue,
            };

            // how many of each interface's required signatures this struct
            // provides
            let mut matched: HashMap<NodeId, usize> = HashMap::new();
            for method in methods {
                let m = ctx.graph.node(*method);
                let Some(ty) = m.ty else { continue };
                if let Some(interfaces) = index.get(&(m.name.clone(), ty)) {
                    for interface in interfaces {
                        *matched.entry(*interface).or_insert(0) += 1;
                    }
                }
            }

            let mut implemented: Vec<NodeId> = required_counts
                .iter()
                .filter(|(interface, required)| {
                    matched.get(interface).copied().unwrap_or(0) == **required
                })
                .map(|(interface, _)| *interface)
                .collect();
            implemented.sort();

            for interface in implemented {
                let interface_ty = match ctx.graph.node(interface).ty {
                    Some(ty) => ty,
                    None => continue,
                };

                debug!(
                    "{} implements {}",
                    ctx.graph.node(*record).qualified_name(),
                    ctx.graph.node(interface).qualified_name()
                );

                ctx.graph.add_implemented_interface(*record, interface_ty);

                let subtypes = ctx.subtypes.entry(interface_ty).or_default();
                if !subtypes.contains(&struct_ty) {
                    subtypes.push(struct_ty);
                }
            }
        }

        Ok(())
    }
}

/// Resolve declared super types to record declarations via the FQN index
fn link_super_type_declarations(ctx: &mut PassContext, records: &[NodeId]) {
    for record in records {
        let super_types: Vec<TypeId> = match &ctx.graph.node(*record).kind {
            NodeKind::Record { super_types, .. } => super_types.clone(),
            _ => continue,
        };

        for super_ty in super_types {
            let name = ctx.types.name(super_ty).to_string();
            if let Some(super_decl) = ctx.graph.record_by_fqn(&name) {
                ctx.graph.add_super_type_decl(*record, super_decl);
            }
        }
    }
}
