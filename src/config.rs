//! Run configuration

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_fn_ptr_cap() -> usize {
    3
}

fn default_infer() -> bool {
    true
}

/// Configuration for a translation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CpgConfig {
    /// Maximum number of candidate functions a function-pointer call may
    /// bind to; above this the call is left unbound.
    #[serde(default = "default_fn_ptr_cap")]
    pub fn_ptr_candidate_cap: usize,

    /// Create inferred declarations for members that cannot be resolved.
    #[serde(default = "default_infer")]
    pub infer_missing_members: bool,

    /// Include hidden files and directories during project enumeration.
    #[serde(default)]
    pub include_hidden: bool,
}

impl Default for CpgConfig {
    fn default() -> Self {
        Self {
            fn_ptr_candidate_cap: default_fn_ptr_cap(),
            infer_missing_members: default_infer(),
            include_hidden: false,
        }
    }
}

pub fn default_config_path() -> PathBuf {
    PathBuf::from("gocpg.toml")
}

/// Load a config file, returning `None` when it does not exist.
pub fn load_config(path: Option<&Path>) -> crate::Result<Option<CpgConfig>> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    if !path.exists() {
        return Ok(None);
    }

    let contents = std::fs::read_to_string(&path)?;
    let config: CpgConfig =
        toml::from_str(&contents).map_err(|e| crate::Error::Config(e.to_string()))?;
    Ok(Some(config))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = CpgConfig::default();
        assert_eq!(config.fn_ptr_candidate_cap, 3);
        assert!(config.infer_missing_members);
        assert!(!config.include_hidden);
    }

    #[test]
    fn test_partial_toml() {
        let config: CpgConfig = toml::from_str("fn_ptr_candidate_cap = 5").unwrap();
        assert_eq!(config.fn_ptr_candidate_cap, 5);
        assert!(config.infer_missing_members);
    }
}
