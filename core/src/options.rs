//! file: core/src/options.rs
//! description: lowering options and their JSON loader.
//!
//! Every field has a default, so an empty JSON object (or no file at all)
//! gives the standard behaviour.

use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoweringOptions {
    /// Run `ir::verify` on the output of every full-tree reduction.
    #[serde(default = "default_verify")]
    pub verify: bool,
    /// Prefix of the names given to compiler-introduced temporaries.
    #[serde(default = "default_temp_prefix")]
    pub temp_prefix: String,
    /// Nesting depth of extension nodes after which reduction gives up.
    #[serde(default = "default_max_reduce_depth")]
    pub max_reduce_depth: usize,
}

fn default_verify() -> bool { true }
fn default_temp_prefix() -> String { "$".to_string() }
fn default_max_reduce_depth() -> usize { 256 }

impl Default for LoweringOptions {
    fn default() -> Self {
        LoweringOptions {
            verify: default_verify(),
            temp_prefix: default_temp_prefix(),
            max_reduce_depth: default_max_reduce_depth(),
        }
    }
}

impl LoweringOptions {
    pub fn from_json_str(raw: &str) -> Result<LoweringOptions, String> {
        let options: LoweringOptions = serde_json::from_str(raw).map_err(|e| format!("parse options: {}", e))?;
        options.validate()?;
        Ok(options)
    }

    /// Load options from a JSON file path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<LoweringOptions, String> {
        let raw = std::fs::read_to_string(&path).map_err(|e| format!("read options: {}", e))?;
        LoweringOptions::from_json_str(&raw)
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.temp_prefix.trim().is_empty() {
            return Err("temp_prefix is empty".to_string());
        }
        if self.max_reduce_depth == 0 {
            return Err("max_reduce_depth must be at least 1".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_defaults() {
        let options = LoweringOptions::from_json_str("{}").unwrap();
        assert_eq!(options, LoweringOptions::default());
    }

    #[test]
    fn zero_depth_is_rejected() {
        let err = LoweringOptions::from_json_str(r#"{ "max_reduce_depth": 0 }"#).unwrap_err();
        assert!(err.contains("max_reduce_depth"));
    }
}
