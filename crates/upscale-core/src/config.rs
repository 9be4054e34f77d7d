use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::UpscaleError;
use crate::pipeline::PipelineOptions;
use crate::transform::UpscaleParams;
use crate::types::Result;

/// On-disk configuration for an upscale run.
///
/// ```json
/// { "pipeline": { "workers": 8 }, "upscale": { "scale": 3.0 } }
/// ```
///
/// Both sections and every field inside them are optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpscaleConfig {
    pub pipeline: PipelineOptions,
    pub upscale: UpscaleParams,
}

impl UpscaleConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|error| UpscaleError::InvalidConfig(format!("config: {error}")))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|error| {
            UpscaleError::from(error).with_context(format!("reading {}", path.display()))
        })?;
        Self::from_json(&contents)
    }

    pub fn validate(&self) -> Result<()> {
        self.pipeline.validate()?;
        self.upscale.validate()
    }
}
