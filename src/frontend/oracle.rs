//! Type-info oracle - optional expression typing provided by the embedder
//!
//! The frontend consults an oracle for the static type of expressions the
//! syntax alone cannot type (short variable declarations, range variables,
//! selector results). The oracle may answer unknown for any node; the
//! frontend then falls back to the unknown type.

/// Maps expressions (identified by file and byte range) to textual type
/// descriptors, which the type parser turns into interned types.
pub trait TypeOracle {
    /// The type of the expression spanning `byte_range` in `file`, rendered
    /// in the textual form accepted by the type parser.
    fn type_of(&self, file: &str, byte_range: (usize, usize)) -> Option<String>;
}

/// An oracle that knows nothing
#[derive(Debug, Default)]
pub struct NoOracle;

impl TypeOracle for NoOracle {
    fn type_of(&self, _file: &str, _byte_range: (usize, usize)) -> Option<String> {
        None
    }
}

/// A scripted oracle backed by a map, used in tests and by embedders that
/// run an external type checker up front.
#[derive(Debug, Default)]
pub struct TableOracle {
    entries: std::collections::HashMap<(String, usize, usize), String>,
}

impl TableOracle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        file: impl Into<String>,
        byte_range: (usize, usize),
        ty: impl Into<String>,
    ) {
        self.entries
            .insert((file.into(), byte_range.0, byte_range.1), ty.into());
    }
}

impl TypeOracle for TableOracle {
    fn type_of(&self, file: &str, byte_range: (usize, usize)) -> Option<String> {
        self.entries
            .get(&(file.to_string(), byte_range.0, byte_range.1))
            .cloned()
    }
}
