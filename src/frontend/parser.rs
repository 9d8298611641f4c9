//! Go parser wrapper - syntax trees, positions, imports and comment maps
//!
//! Wraps the tree-sitter grammar behind the narrow contract the frontend
//! consumes: a per-file syntax tree, the package clause, the import table
//! and a comment map associating comment groups with the nodes they
//! document.

use crate::location::{Region, SourceLocation};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;
use tree_sitter::{Node, Parser, Tree};

/// One import of a parsed file
#[derive(Debug, Clone)]
pub struct ImportSpec {
    /// Local alias, when the import declares one
    pub alias: Option<String>,
    /// Unquoted import path
    pub path: String,
}

impl ImportSpec {
    /// The name the import is referred to by: the local alias when present,
    /// otherwise the last path segment.
    pub fn import_name(&self) -> &str {
        match &self.alias {
            Some(alias) => alias,
            None => self.path.rsplit('/').next().unwrap_or(&self.path),
        }
    }
}

/// Comment groups keyed by the syntax node they document
#[derive(Debug, Default)]
pub struct CommentMap {
    by_node: HashMap<usize, String>,
}

impl CommentMap {
    /// The concatenated comment text for a syntax node, if any
    pub fn get(&self, node: Node) -> Option<&str> {
        self.by_node.get(&node.id()).map(String::as_str)
    }
}

/// A parsed source file retained across frontend phases
pub struct ParsedFile {
    pub path: String,
    pub source: String,
    pub tree: Tree,
    /// Name from the package clause
    pub package_clause: String,
    pub imports: Vec<ImportSpec>,
    pub comments: CommentMap,
}

impl ParsedFile {
    pub fn root(&self) -> Node<'_> {
        self.tree.root_node()
    }

    /// Source text of a syntax node
    pub fn text(&self, node: Node) -> &str {
        node.utf8_text(self.source.as_bytes()).unwrap_or("")
    }

    /// Import matching a local name, if the name refers to an import
    pub fn import_by_name(&self, name: &str) -> Option<&ImportSpec> {
        self.imports.iter().find(|i| i.import_name() == name)
    }

    /// Source location of a syntax node
    pub fn location(&self, node: Node) -> SourceLocation {
        let start = node.start_position();
        let end = node.end_position();
        SourceLocation::new(
            self.path.clone(),
            node.start_byte(),
            node.end_byte(),
            Region::new(
                start.row as u32 + 1,
                start.column as u32 + 1,
                end.row as u32 + 1,
                end.column as u32 + 1,
            ),
        )
    }
}

impl std::fmt::Debug for ParsedFile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParsedFile")
            .field("path", &self.path)
            .field("package_clause", &self.package_clause)
            .field("imports", &self.imports)
            .finish()
    }
}

/// Parser for Go source files
pub struct GoParser {
    parser: Mutex<Parser>,
}

impl Default for GoParser {
    fn default() -> Self {
        Self::new()
    }
}

impl GoParser {
    pub fn new() -> Self {
        let mut parser = Parser::new();
        parser
            .set_language(&tree_sitter_go::LANGUAGE.into())
            .expect("Error loading Go grammar");

        Self {
            parser: Mutex::new(parser),
        }
    }

    /// Parse one file. A syntax error is fatal for the file (the project
    /// driver continues with the remaining files).
    pub fn parse(&self, path: &str, source: &str) -> Result<ParsedFile> {
        let tree = self
            .parser
            .lock()
            .expect("parser lock poisoned")
            .parse(source, None)
            .ok_or_else(|| Error::parse(path, "parser returned no tree"))?;

        let root = tree.root_node();
        if root.has_error() {
            return Err(Error::parse(path, "syntax error"));
        }

        let package_clause = extract_package_clause(root, source)
            .ok_or_else(|| Error::parse(path, "missing package clause"))?;
        let imports = extract_imports(root, source);
        let comments = build_comment_map(root, source);

        Ok(ParsedFile {
            path: path.to_string(),
            source: source.to_string(),
            tree,
            package_clause,
            imports,
            comments,
        })
    }
}

fn node_text<'a>(node: Node, source: &'a str) -> &'a str {
    node.utf8_text(source.as_bytes()).unwrap_or("")
}

fn extract_package_clause(root: Node, source: &str) -> Option<String> {
    let mut cursor = root.walk();
    for child in root.named_children(&mut cursor) {
        if child.kind() == "package_clause" {
            let mut inner = child.walk();
            for part in child.named_children(&mut inner) {
                if part.kind() == "package_identifier" {
                    return Some(node_text(part, source).to_string());
                }
            }
        }
    }
    None
}

fn extract_imports(root: Node, source: &str) -> Vec<ImportSpec> {
    let mut imports = Vec::new();
    let mut cursor = root.walk();

    for child in root.named_children(&mut cursor) {
        if child.kind() != "import_declaration" {
            continue;
        }
        let mut stack = vec![child];
        while let Some(current) = stack.pop() {
            let mut inner = current.walk();
            for spec in current.named_children(&mut inner) {
                match spec.kind() {
                    "import_spec" => {
                        let alias = spec
                            .child_by_field_name("name")
                            .map(|n| node_text(n, source).to_string())
                            .filter(|n| n != "_" && n != ".");
                        let path = spec
                            .child_by_field_name("path")
                            .map(|n| unquote(node_text(n, source)))
                            .unwrap_or_default();
                        if !path.is_empty() {
                            imports.push(ImportSpec { alias, path });
                        }
                    }
                    "import_spec_list" => stack.push(spec),
                    _ => {}
                }
            }
        }
    }

    imports
}

/// Strip the surrounding quotes of an interpreted or raw string literal
pub fn unquote(s: &str) -> String {
    s.trim_matches(|c| c == '"' || c == '`').to_string()
}

/// Associate comment groups with the nodes they document.
///
/// A group of line comments directly above a node documents that node; a
/// trailing comment on the same line documents the preceding sibling. Only
/// the node itself gets the comment, never its children.
fn build_comment_map(root: Node, source: &str) -> CommentMap {
    let mut map = CommentMap::default();
    collect_comments(root, source, &mut map);
    map
}

fn collect_comments(node: Node, source: &str, map: &mut CommentMap) {
    let mut cursor = node.walk();
    let children: Vec<Node> = node.children(&mut cursor).collect();

    let mut pending: Vec<String> = Vec::new();
    let mut pending_end_row: Option<usize> = None;
    let mut previous: Option<Node> = None;

    for child in &children {
        if child.kind() == "comment" {
            let text = clean_comment(node_text(*child, source));

            // trailing comment on the same line as the previous sibling
            if let Some(prev) = previous {
                if prev.end_position().row == child.start_position().row {
                    append_comment(map, prev, &text);
                    continue;
                }
            }

            // start a new group or extend the current one
            match pending_end_row {
                Some(row) if child.start_position().row > row + 1 => {
                    pending.clear();
                }
                _ => {}
            }
            pending.push(text);
            pending_end_row = Some(child.end_position().row);
            continue;
        }

        if child.is_named() {
            if let Some(row) = pending_end_row {
                if child.start_position().row <= row + 1 {
                    let joined = pending.join("\n");
                    append_comment(map, *child, &joined);
                }
            }
            pending.clear();
            pending_end_row = None;
            previous = Some(*child);

            collect_comments(*child, source, map);
        }
    }
}

fn append_comment(map: &mut CommentMap, node: Node, text: &str) {
    let entry = map.by_node.entry(node.id()).or_default();
    if !entry.is_empty() {
        entry.push('\n');
    }
    entry.push_str(text);
}

/// Strip comment markers and surrounding whitespace
fn clean_comment(raw: &str) -> String {
    let raw = raw.trim();
    if let Some(rest) = raw.strip_prefix("//") {
        return rest.trim().to_string();
    }
    if let Some(rest) = raw.strip_prefix("/*") {
        return rest.trim_end_matches("*/").trim().to_string();
    }
    raw.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(source: &str) -> ParsedFile {
        GoParser::new().parse("test.go", source).unwrap()
    }

    #[test]
    fn test_package_clause() {
        let file = parse("package mypkg\n");
        assert_eq!(file.package_clause, "mypkg");
    }

    #[test]
    fn test_imports_with_alias() {
        let file = parse(
            "package p\n\nimport (\n\tfoo \"example.com/bar\"\n\t\"fmt\"\n)\n",
        );
        assert_eq!(file.imports.len(), 2);
        assert_eq!(file.imports[0].alias.as_deref(), Some("foo"));
        assert_eq!(file.imports[0].path, "example.com/bar");
        assert_eq!(file.imports[0].import_name(), "foo");
        assert_eq!(file.imports[1].alias, None);
        assert_eq!(file.imports[1].import_name(), "fmt");
    }

    #[test]
    fn test_syntax_error_is_fatal_for_file() {
        let result = GoParser::new().parse("broken.go", "package p\n\nfunc {{{\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_comment_attachment() {
        let source = "package p\n\n// Answer holds the result.\nvar Answer = 42\n";
        let file = parse(source);

        let root = file.root();
        let mut cursor = root.walk();
        let var_decl = root
            .named_children(&mut cursor)
            .find(|n| n.kind() == "var_declaration")
            .unwrap();

        assert_eq!(file.comments.get(var_decl), Some("Answer holds the result."));
    }

    #[test]
    fn test_missing_package_clause() {
        let result = GoParser::new().parse("frag.go", "var x = 1\n");
        assert!(result.is_err());
    }
}
