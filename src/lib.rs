//! # Gocpg - Code Property Graph construction for Go
//!
//! Builds an in-memory, heavily cross-linked code property graph from a Go
//! project rooted at a directory.
//!
//! Gocpg provides:
//! - A typed graph model with declarations, statements, expressions and
//!   interned types, stored in an arena with stable node ids
//! - A scope manager with cross-file name-scope merging
//! - A two-phase tree-sitter based frontend (record skeletons first, then
//!   function and variable bodies)
//! - A dependency-ordered resolver pipeline: interface implementations,
//!   embedded members, variables/fields, initializer data flow and
//!   function-pointer call binding

pub mod config;
pub mod frontend;
pub mod graph;
pub mod location;
pub mod node;
pub mod passes;
pub mod project;
pub mod scope;
pub mod types;

// Re-exports for convenient access
pub use config::CpgConfig;
pub use graph::{CodeGraph, GraphStats};
pub use location::SourceLocation;
pub use node::{Node, NodeId, NodeKind};
pub use scope::{ScopeId, ScopeManager};
pub use types::{TypeId, TypeRegistry};

/// Result type alias for gocpg operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for gocpg operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Parse error in {path}: {message}")]
    Parse { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Module descriptor error: {0}")]
    ModuleDescriptor(String),

    #[error("Scope error: {0}")]
    Scope(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl Error {
    /// Shorthand for a per-file parse error
    pub fn parse(path: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Language tag attached to every node.
///
/// The engine is multi-lingual by design; only the Go frontend is implemented
/// here, and the resolver core never branches on this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Go => "go",
        }
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
