//! Source locations - file, byte range and line/column region of a node

use serde::{Deserialize, Serialize};

/// A line/column region within a file.
///
/// Lines and columns are 1-indexed; the end position is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl Region {
    pub fn new(start_line: u32, start_column: u32, end_line: u32, end_column: u32) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }
}

impl std::fmt::Display for Region {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}-{}:{}",
            self.start_line, self.start_column, self.end_line, self.end_column
        )
    }
}

/// Physical location of a node in the analyzed project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceLocation {
    /// File path relative to the project root
    pub file: String,
    /// Starting byte offset in the file
    pub byte_start: usize,
    /// Ending byte offset (exclusive)
    pub byte_end: usize,
    /// Line/column region
    pub region: Region,
}

impl SourceLocation {
    pub fn new(file: impl Into<String>, byte_start: usize, byte_end: usize, region: Region) -> Self {
        Self {
            file: file.into(),
            byte_start,
            byte_end,
            region,
        }
    }
}

impl std::fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let loc = SourceLocation::new("pkg/file.go", 10, 42, Region::new(2, 1, 4, 2));
        assert_eq!(loc.to_string(), "pkg/file.go:2:1-4:2");
    }
}
