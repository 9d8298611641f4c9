//! Project discovery - source enumeration and module descriptor parsing
//!
//! Enumerates the `.go` files of a project root (honoring ignore files) and
//! discovers the module path from `go.mod`. The absence of a module
//! descriptor is non-fatal: naming falls back to relative file paths.

use crate::config::CpgConfig;
use crate::Result;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// A source file scheduled for translation
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Path relative to the project root
    pub path: String,
    pub content: String,
}

/// An enumerated project ready for the frontend
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    /// Canonical module path from the module descriptor, if present
    pub module_path: Option<String>,
    pub files: Vec<SourceFile>,
}

impl Project {
    /// Discover a project: module descriptor first, then file enumeration.
    pub fn discover(root: impl AsRef<Path>, config: &CpgConfig) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        let module_path = match parse_module_descriptor(&root) {
            Ok(module) => module,
            Err(e) => {
                warn!("could not read module descriptor: {}", e);
                None
            }
        };

        let mut files = Vec::new();
        let walker = ignore::WalkBuilder::new(&root)
            .hidden(!config.include_hidden)
            .build();

        for entry in walker.into_iter().filter_map(|e| e.ok()) {
            let path = entry.path();
            if !entry.file_type().map(|t| t.is_file()).unwrap_or(false) {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some("go") {
                continue;
            }

            let relative = path.strip_prefix(&root).unwrap_or(path);
            let relative_str = relative.to_string_lossy().replace('\\', "/");

            // generated test files and vendored dependencies are not part
            // of the program under analysis
            if relative_str.ends_with("_test.go") || relative_str.starts_with("vendor/") {
                debug!("skipping {}", relative_str);
                continue;
            }

            match std::fs::read_to_string(path) {
                Ok(content) => files.push(SourceFile {
                    path: relative_str,
                    content,
                }),
                Err(e) => {
                    warn!("skipping unreadable file {}: {}", relative_str, e);
                }
            }
        }

        // stable input order across platforms
        files.sort_by(|a, b| a.path.cmp(&b.path));

        info!(
            "discovered {} files under {} (module: {:?})",
            files.len(),
            root.display(),
            module_path
        );

        Ok(Self {
            root,
            module_path,
            files,
        })
    }

    /// Build a project from in-memory sources (used by tests and embedders)
    pub fn from_sources(
        module_path: Option<&str>,
        sources: &[(&str, &str)],
    ) -> Self {
        Self {
            root: PathBuf::from("."),
            module_path: module_path.map(str::to_string),
            files: sources
                .iter()
                .map(|(path, content)| SourceFile {
                    path: (*path).to_string(),
                    content: (*content).to_string(),
                })
                .collect(),
        }
    }

    /// The naming prefix for a file: the module path joined with the file's
    /// directory, or a path/package based fallback without a module.
    pub fn package_path(&self, file: &str, package_clause: &str) -> String {
        let dir = match file.rsplit_once('/') {
            Some((dir, _)) => dir,
            None => "",
        };

        match &self.module_path {
            Some(module) if dir.is_empty() => module.clone(),
            Some(module) => format!("{}/{}", module, dir),
            None if dir.is_empty() => package_clause.to_string(),
            None => dir.to_string(),
        }
    }
}

/// Parse the `module` directive out of a `go.mod` at the project root.
fn parse_module_descriptor(root: &Path) -> Result<Option<String>> {
    let descriptor = root.join("go.mod");
    if !descriptor.exists() {
        debug!("{} does not exist", descriptor.display());
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&descriptor)?;
    for line in contents.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix("module ") {
            let module = rest.trim().trim_matches('"');
            if module.is_empty() {
                return Err(crate::Error::ModuleDescriptor(format!(
                    "empty module directive in {}",
                    descriptor.display()
                )));
            }
            return Ok(Some(module.to_string()));
        }
    }

    Err(crate::Error::ModuleDescriptor(format!(
        "no module directive in {}",
        descriptor.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_path_with_module() {
        let project = Project::from_sources(Some("example.com/mymod"), &[]);
        assert_eq!(
            project.package_path("server/handler.go", "server"),
            "example.com/mymod/server"
        );
        assert_eq!(project.package_path("main.go", "main"), "example.com/mymod");
    }

    #[test]
    fn test_package_path_fallback() {
        let project = Project::from_sources(None, &[]);
        // nested files use path-based naming
        assert_eq!(project.package_path("server/handler.go", "server"), "server");
        // root files fall back to the package clause
        assert_eq!(project.package_path("main.go", "p"), "p");
    }

    #[test]
    fn test_discover_reads_module_and_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("go.mod"), "module example.com/demo\n\ngo 1.21\n").unwrap();
        std::fs::write(dir.path().join("main.go"), "package main\n").unwrap();
        std::fs::write(dir.path().join("main_test.go"), "package main\n").unwrap();
        std::fs::write(dir.path().join("README.md"), "docs\n").unwrap();

        let project = Project::discover(dir.path(), &CpgConfig::default()).unwrap();
        assert_eq!(project.module_path.as_deref(), Some("example.com/demo"));
        assert_eq!(project.files.len(), 1);
        assert_eq!(project.files[0].path, "main.go");
    }

    #[test]
    fn test_missing_module_descriptor_is_non_fatal() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("lib.go"), "package lib\n").unwrap();

        let project = Project::discover(dir.path(), &CpgConfig::default()).unwrap();
        assert!(project.module_path.is_none());
        assert_eq!(project.files.len(), 1);
    }
}
