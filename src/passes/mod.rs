//! Resolver pass pipeline
//!
//! Whole-program passes run in a dependency-ordered sequence over the
//! assembled graph. Passes self-describe their dependencies; the manager
//! topologically sorts them at startup, which keeps the pipeline extensible
//! without per-language branching. Passes mutate the graph (edges added,
//! refers-to set, possible sub-types widened) but never delete nodes.

pub mod embedded;
pub mod fnptr;
pub mod initializers;
pub mod interfaces;
pub mod variables;

pub use embedded::ResolveEmbeddedMembers;
pub use fnptr::FunctionPointerCallResolver;
pub use initializers::InitializerListDfg;
pub use interfaces::ResolveInterfaceImplementations;
pub use variables::ResolveVariables;

use crate::config::CpgConfig;
use crate::frontend::Translation;
use crate::graph::CodeGraph;
use crate::scope::ScopeManager;
use crate::types::{TypeId, TypeRegistry};
use crate::{Error, Result};
use std::collections::HashMap;
use tracing::info;

/// Shared state the passes operate on
pub struct PassContext<'a> {
    pub graph: &'a mut CodeGraph,
    pub scopes: &'a mut ScopeManager,
    pub types: &'a mut TypeRegistry,
    pub config: &'a CpgConfig,
    /// Interface type to implementing record types, discovered by the
    /// interface pass and consumed by sub-type widening
    pub subtypes: HashMap<TypeId, Vec<TypeId>>,
}

/// A whole-program resolver pass
pub trait Pass {
    fn name(&self) -> &'static str;

    /// Names of passes that must run before this one
    fn depends_on(&self) -> &'static [&'static str] {
        &[]
    }

    fn run(&mut self, ctx: &mut PassContext) -> Result<()>;
}

/// Order passes topologically by their declared dependencies
fn topological_order(passes: Vec<Box<dyn Pass>>) -> Result<Vec<Box<dyn Pass>>> {
    let mut remaining: Vec<Option<Box<dyn Pass>>> = passes.into_iter().map(Some).collect();
    let mut placed: Vec<&'static str> = Vec::new();
    let mut ordered = Vec::new();

    while ordered.len() < remaining.len() {
        let mut progressed = false;

        for slot in remaining.iter_mut() {
            let ready = match slot {
                Some(pass) => pass.depends_on().iter().all(|d| placed.contains(d)),
                None => false,
            };
            if ready {
                let pass = slot.take().expect("checked above");
                placed.push(pass.name());
                ordered.push(pass);
                progressed = true;
            }
        }

        if !progressed {
            let stuck: Vec<&str> = remaining
                .iter()
                .flatten()
                .map(|p| p.name())
                .collect();
            return Err(Error::Scope(format!(
                "pass dependency cycle involving: {}",
                stuck.join(", ")
            )));
        }
    }

    Ok(ordered)
}

/// Run the full resolver pipeline over a translation
pub fn run_pipeline(translation: &mut Translation, config: &CpgConfig) -> Result<()> {
    let passes: Vec<Box<dyn Pass>> = vec![
        Box::new(ResolveInterfaceImplementations),
        Box::new(ResolveEmbeddedMembers),
        Box::new(ResolveVariables::default()),
        Box::new(InitializerListDfg),
        Box::new(FunctionPointerCallResolver),
    ];

    let ordered = topological_order(passes)?;

    let mut ctx = PassContext {
        graph: &mut translation.graph,
        scopes: &mut translation.scopes,
        types: &mut translation.types,
        config,
        subtypes: HashMap::new(),
    };

    for mut pass in ordered {
        info!("running pass {}", pass.name());
        pass.run(&mut ctx)?;
        // a pass may rewire AST children (embedded-member promotion), so
        // the parent index is refreshed between passes
        ctx.graph.rebuild_parent_index();
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Named(&'static str, &'static [&'static str]);

    impl Pass for Named {
        fn name(&self) -> &'static str {
            self.0
        }
        fn depends_on(&self) -> &'static [&'static str] {
            self.1
        }
        fn run(&mut self, _ctx: &mut PassContext) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_topological_order_respects_dependencies() {
        let passes: Vec<Box<dyn Pass>> = vec![
            Box::new(Named("c", &["b"])),
            Box::new(Named("a", &[])),
            Box::new(Named("b", &["a"])),
        ];

        let ordered = topological_order(passes).unwrap();
        let names: Vec<&str> = ordered.iter().map(|p| p.name()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_cycle_is_an_error() {
        let passes: Vec<Box<dyn Pass>> = vec![
            Box::new(Named("a", &["b"])),
            Box::new(Named("b", &["a"])),
        ];
        assert!(topological_order(passes).is_err());
    }
}
