//! Type model - interned type instances with canonical names
//!
//! Types are value-compared through their canonical name: two types are equal
//! iff their canonical names are equal, and the registry guarantees that equal
//! types share a single `TypeId` per translation run. Mutated variants (e.g.
//! generic arguments) are built as new instances before interning; interned
//! types are never modified in place.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier of an interned type within a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeId(pub u32);

/// Built-in type names of the source language
pub const BUILTIN_TYPES: &[&str] = &[
    "bool", "byte", "complex128", "complex64", "error", "float32", "float64", "int", "int16",
    "int32", "int64", "int8", "rune", "string", "uint", "uint16", "uint32", "uint64", "uint8",
    "uintptr",
];

/// Check whether a bare identifier names a built-in type
pub fn is_builtin_type(name: &str) -> bool {
    BUILTIN_TYPES.contains(&name)
}

/// Whether a pointer type came from a `*T` or a `[...]T` / slice expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerOrigin {
    Pointer,
    Array,
}

/// The variant-specific payload of a type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TypeKind {
    /// A named type, possibly carrying generic arguments (`map`, `chan`)
    Object { generics: Vec<TypeId> },
    /// A pointer or array/slice of an element type
    Pointer {
        element: TypeId,
        origin: PointerOrigin,
    },
    /// A function type with parameter and return type lists
    Function {
        parameters: Vec<TypeId>,
        returns: Vec<TypeId>,
    },
    /// An ordered list of element types (multi-value returns)
    Tuple { elements: Vec<TypeId> },
    /// A type the parser could not resolve
    Unknown,
    /// A type slot that was never provided
    Missing,
}

/// An interned type instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Type {
    /// Canonical name; equality of types is equality of canonical names
    pub name: String,
    pub kind: TypeKind,
}

impl Type {
    pub fn is_function(&self) -> bool {
        matches!(self.kind, TypeKind::Function { .. })
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self.kind, TypeKind::Unknown)
    }

    pub fn is_pointer(&self) -> bool {
        matches!(self.kind, TypeKind::Pointer { .. })
    }
}

/// Canonical name of a function type: `func(<params>)` plus ` T` for a single
/// return type or ` (T1,T2)` for multiple.
pub fn function_type_name(param_names: &[&str], return_names: &[&str]) -> String {
    let params = param_names.join(",");

    match return_names.len() {
        0 => format!("func({})", params),
        1 => format!("func({}) {}", params, return_names[0]),
        _ => format!("func({}) ({})", params, return_names.join(",")),
    }
}

/// Registry of interned types for one translation run.
///
/// The registry maps canonical names to type instances; every constructor
/// returns the registry's instance for the computed canonical name.
#[derive(Debug)]
pub struct TypeRegistry {
    types: Vec<Type>,
    by_name: HashMap<String, TypeId>,
    unknown: TypeId,
    missing: TypeId,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            types: Vec::new(),
            by_name: HashMap::new(),
            unknown: TypeId(0),
            missing: TypeId(0),
        };

        registry.unknown = registry.intern("UNKNOWN".to_string(), TypeKind::Unknown);
        registry.missing = registry.intern("MISSING".to_string(), TypeKind::Missing);
        registry
    }

    fn intern(&mut self, name: String, kind: TypeKind) -> TypeId {
        if let Some(id) = self.by_name.get(&name) {
            return *id;
        }

        let id = TypeId(self.types.len() as u32);
        self.by_name.insert(name.clone(), id);
        self.types.push(Type { name, kind });
        id
    }

    /// Get an interned type by id
    pub fn get(&self, id: TypeId) -> &Type {
        &self.types[id.0 as usize]
    }

    /// Canonical name of an interned type
    pub fn name(&self, id: TypeId) -> &str {
        &self.get(id).name
    }

    /// Look up an already-interned type by its canonical name
    pub fn lookup(&self, name: &str) -> Option<TypeId> {
        self.by_name.get(name).copied()
    }

    /// The shared unknown type
    pub fn unknown(&self) -> TypeId {
        self.unknown
    }

    /// The shared missing type
    pub fn missing(&self) -> TypeId {
        self.missing
    }

    /// Number of distinct interned types
    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// An object type for a (fully qualified or built-in) name
    pub fn object(&mut self, name: &str) -> TypeId {
        self.intern(name.to_string(), TypeKind::Object { generics: vec![] })
    }

    /// An object type carrying generic arguments.
    ///
    /// `map` renders as `map[K]V`, `chan` as `chan T`; any other name renders
    /// with a bracketed argument list.
    pub fn object_with_generics(&mut self, name: &str, generics: Vec<TypeId>) -> TypeId {
        let rendered = match (name, generics.len()) {
            ("map", 2) => format!("map[{}]{}", self.name(generics[0]), self.name(generics[1])),
            ("chan", 1) => format!("chan {}", self.name(generics[0])),
            (_, 0) => name.to_string(),
            _ => {
                let args: Vec<&str> = generics.iter().map(|g| self.name(*g)).collect();
                format!("{}[{}]", name, args.join(","))
            }
        };

        self.intern(rendered, TypeKind::Object { generics })
    }

    /// Copy-on-write addition of a generic argument to an object type.
    ///
    /// Returns a new interned instance; the input type is left untouched.
    pub fn add_generic(&mut self, base: TypeId, generic: TypeId) -> TypeId {
        let (name, mut generics) = match &self.get(base).kind {
            TypeKind::Object { generics } => {
                (self.base_object_name(base).to_string(), generics.clone())
            }
            _ => return base,
        };

        generics.push(generic);
        self.object_with_generics(&name, generics)
    }

    /// The object name without its rendered generic arguments
    fn base_object_name(&self, id: TypeId) -> &str {
        let name = self.name(id);
        if name.starts_with("map[") {
            return "map";
        }
        if name.starts_with("chan ") {
            return "chan";
        }
        name.split('[').next().unwrap_or(name)
    }

    /// A pointer (or array) type wrapping an element type
    pub fn pointer_to(&mut self, element: TypeId, origin: PointerOrigin) -> TypeId {
        let name = match origin {
            PointerOrigin::Pointer => format!("*{}", self.name(element)),
            PointerOrigin::Array => format!("[]{}", self.name(element)),
        };

        self.intern(name, TypeKind::Pointer { element, origin })
    }

    /// A function type; the canonical name follows [`function_type_name`]
    pub fn function(&mut self, parameters: Vec<TypeId>, returns: Vec<TypeId>) -> TypeId {
        let param_names: Vec<&str> = parameters.iter().map(|t| self.name(*t)).collect();
        let return_names: Vec<&str> = returns.iter().map(|t| self.name(*t)).collect();
        let name = function_type_name(&param_names, &return_names);

        self.intern(name, TypeKind::Function { parameters, returns })
    }

    /// A tuple type with ordered element types
    pub fn tuple(&mut self, elements: Vec<TypeId>) -> TypeId {
        let names: Vec<&str> = elements.iter().map(|t| self.name(*t)).collect();
        let name = format!("({})", names.join(","));

        self.intern(name, TypeKind::Tuple { elements })
    }

    /// Strip pointer/array wrappers down to the innermost type
    pub fn root(&self, id: TypeId) -> TypeId {
        let mut current = id;
        while let TypeKind::Pointer { element, .. } = self.get(current).kind {
            current = element;
        }
        current
    }

    /// One level of pointer dereference, if the type is a pointer
    pub fn dereference(&self, id: TypeId) -> Option<TypeId> {
        match self.get(id).kind {
            TypeKind::Pointer { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Whether two types are compatible for signature matching.
    ///
    /// Interning makes equality a `TypeId` comparison; the unknown type acts
    /// as a wildcard so that oracle gaps do not block resolution.
    pub fn types_compatible(&self, a: TypeId, b: TypeId) -> bool {
        a == b || self.get(a).is_unknown() || self.get(b).is_unknown()
    }

    /// Element-wise compatibility of two type lists
    pub fn type_lists_match(&self, a: &[TypeId], b: &[TypeId]) -> bool {
        a.len() == b.len()
            && a.iter()
                .zip(b.iter())
                .all(|(x, y)| self.types_compatible(*x, *y))
    }

    /// Element-wise parameter and return type equality of two function types
    pub fn function_signatures_match(&self, a: TypeId, b: TypeId) -> bool {
        match (&self.get(a).kind, &self.get(b).kind) {
            (
                TypeKind::Function {
                    parameters: pa,
                    returns: ra,
                },
                TypeKind::Function {
                    parameters: pb,
                    returns: rb,
                },
            ) => {
                let (pa, ra, pb, rb) = (pa.clone(), ra.clone(), pb.clone(), rb.clone());
                self.type_lists_match(&pa, &pb) && self.type_lists_match(&ra, &rb)
            }
            _ => false,
        }
    }

    /// Parse a textual type expression into an interned type.
    ///
    /// Accepts the forms `id`, `*T`, `[...]T`, `map[K]V`, `chan T`,
    /// `func(P,...)`, `func(P,...) R` and `func(P,...) (R1,R2)`. A bare
    /// identifier that is not a built-in is qualified against `qualifier`
    /// (the current package FQN) when one is given. Unresolvable input
    /// yields the unknown type.
    pub fn parse(&mut self, text: &str, qualifier: Option<&str>) -> TypeId {
        let text = text.trim();
        if text.is_empty() || text == "UNKNOWN" {
            return self.unknown;
        }
        if text == "MISSING" {
            return self.missing;
        }

        if let Some(rest) = text.strip_prefix('*') {
            let element = self.parse(rest, qualifier);
            return self.pointer_to(element, PointerOrigin::Pointer);
        }

        if let Some(rest) = text.strip_prefix('[') {
            // `[]T` or `[N]T`; the length is irrelevant for the type identity
            if let Some(close) = rest.find(']') {
                let element = self.parse(&rest[close + 1..], qualifier);
                return self.pointer_to(element, PointerOrigin::Array);
            }
            return self.unknown;
        }

        if let Some(rest) = text.strip_prefix("map[") {
            if let Some(close) = find_matching_bracket(rest) {
                let key = self.parse(&rest[..close], qualifier);
                let value = self.parse(&rest[close + 1..], qualifier);
                return self.object_with_generics("map", vec![key, value]);
            }
            return self.unknown;
        }

        if let Some(rest) = text.strip_prefix("chan ") {
            let element = self.parse(rest, qualifier);
            return self.object_with_generics("chan", vec![element]);
        }

        if let Some(rest) = text.strip_prefix("func(") {
            return self.parse_function(rest, qualifier);
        }

        // A plain identifier; qualify unless it is a built-in or already
        // carries a package path.
        if is_builtin_type(text) {
            return self.object(text);
        }

        if text.contains('.') || text.contains('/') {
            return self.object(text);
        }

        match qualifier {
            Some(prefix) if !prefix.is_empty() => {
                let fqn = format!("{}.{}", prefix, text);
                self.object(&fqn)
            }
            _ => self.object(text),
        }
    }

    fn parse_function(&mut self, rest: &str, qualifier: Option<&str>) -> TypeId {
        let close = match find_matching_paren(rest) {
            Some(ix) => ix,
            None => return self.unknown,
        };

        let parameters: Vec<TypeId> = split_top_level(&rest[..close])
            .into_iter()
            .map(|p| self.parse(p, qualifier))
            .collect();

        let tail = rest[close + 1..].trim();
        let returns: Vec<TypeId> = if tail.is_empty() {
            vec![]
        } else if let Some(inner) = tail.strip_prefix('(').and_then(|t| t.strip_suffix(')')) {
            split_top_level(inner)
                .into_iter()
                .map(|r| self.parse(r, qualifier))
                .collect()
        } else {
            vec![self.parse(tail, qualifier)]
        };

        self.function(parameters, returns)
    }
}

/// Index of the `]` closing the bracket already consumed by the caller
fn find_matching_bracket(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (ix, c) in s.char_indices() {
        match c {
            '[' | '(' => depth += 1,
            ']' if depth == 0 => return Some(ix),
            ']' | ')' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Index of the `)` closing the paren already consumed by the caller
fn find_matching_paren(s: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (ix, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' if depth == 0 => return Some(ix),
            ')' | ']' => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    None
}

/// Split a comma-separated list, ignoring commas nested in brackets/parens
fn split_top_level(s: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;

    for (ix, c) in s.char_indices() {
        match c {
            '(' | '[' => depth += 1,
            ')' | ']' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(s[start..ix].trim());
                start = ix + 1;
            }
            _ => {}
        }
    }

    let last = s[start..].trim();
    if !last.is_empty() {
        parts.push(last);
    }

    parts.retain(|p| !p.is_empty());
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_object() {
        let mut reg = TypeRegistry::new();
        let t = reg.parse("int", Some("p"));
        assert_eq!(reg.name(t), "int");
    }

    #[test]
    fn test_qualification() {
        let mut reg = TypeRegistry::new();
        let t = reg.parse("MyStruct", Some("mymod/p"));
        assert_eq!(reg.name(t), "mymod/p.MyStruct");

        // Already qualified names are left alone
        let t2 = reg.parse("other.Thing", Some("mymod/p"));
        assert_eq!(reg.name(t2), "other.Thing");
    }

    #[test]
    fn test_interning_returns_same_instance() {
        let mut reg = TypeRegistry::new();
        let a = reg.parse("*[]int", None);
        let b = reg.parse("*[]int", None);
        assert_eq!(a, b);
        assert_eq!(reg.name(a), "*[]int");
    }

    #[test]
    fn test_map_and_chan() {
        let mut reg = TypeRegistry::new();
        let m = reg.parse("map[string]int", None);
        assert_eq!(reg.name(m), "map[string]int");

        let TypeKind::Object { generics } = &reg.get(m).kind else {
            panic!("map should be an object type");
        };
        assert_eq!(generics.len(), 2);

        let c = reg.parse("chan error", None);
        assert_eq!(reg.name(c), "chan error");
    }

    #[test]
    fn test_function_type_names() {
        let mut reg = TypeRegistry::new();

        let none = reg.parse("func(int,string)", None);
        assert_eq!(reg.name(none), "func(int,string)");

        let single = reg.parse("func() string", None);
        assert_eq!(reg.name(single), "func() string");

        let multi = reg.parse("func(int) (int,error)", None);
        assert_eq!(reg.name(multi), "func(int) (int,error)");
    }

    #[test]
    fn test_parse_render_idempotent() {
        let mut reg = TypeRegistry::new();
        let inputs = [
            "int",
            "*int",
            "[]string",
            "map[string][]int",
            "chan *bool",
            "func(int,[]string) (map[string]int,error)",
            "func(func(int) error) func() string",
        ];

        for input in inputs {
            let first = reg.parse(input, Some("p"));
            let rendered = reg.name(first).to_string();
            let second = reg.parse(&rendered, Some("p"));
            assert_eq!(first, second, "parse not idempotent for {}", input);
        }
    }

    #[test]
    fn test_add_generic_copies() {
        let mut reg = TypeRegistry::new();
        let base = reg.object("map");
        let key = reg.object("string");
        let with_key = reg.add_generic(base, key);

        assert_ne!(base, with_key);
        // the original instance is untouched
        let TypeKind::Object { generics } = &reg.get(base).kind else {
            panic!()
        };
        assert!(generics.is_empty());
    }

    #[test]
    fn test_root_and_dereference() {
        let mut reg = TypeRegistry::new();
        let t = reg.parse("*[]*int", None);
        assert_eq!(reg.name(reg.root(t)), "int");

        let inner = reg.dereference(t).unwrap();
        assert_eq!(reg.name(inner), "[]*int");
    }

    #[test]
    fn test_unresolvable_is_unknown() {
        let mut reg = TypeRegistry::new();
        assert_eq!(reg.parse("", None), reg.unknown());
        assert_eq!(reg.parse("[broken", None), reg.unknown());
    }
}
