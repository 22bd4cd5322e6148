//! Typed, file-loadable configuration bundling the Planner, Splitter, and
//! Stitcher option structs under one roof, following the teacher's
//! `ServerConfig`/`ConfigFile` TOML round-trip pattern.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::plan::PlanConfig;
use crate::split::SplitOptions;
use crate::stitch::StitchOptions;

/// The full pipeline configuration: one struct a caller can load from a
/// TOML file, or construct with `Default` and override field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PipelineConfig {
    #[serde(default)]
    pub plan: PlanConfig,
    #[serde(default)]
    pub split: SplitOptions,
    #[serde(default)]
    pub stitch: StitchOptions,
}

impl PipelineConfig {
    /// Loads a `PipelineConfig` from a TOML file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        toml::from_str(&contents)
            .map_err(|e| Error::InvalidInput(format!("invalid config at {:?}: {e}", path.as_ref())))
    }

    /// Writes this configuration to a TOML file, creating or truncating it.
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidInput(format!("failed to serialize config: {e}")))?;
        std::fs::write(path.as_ref(), contents)?;
        Ok(())
    }
}
