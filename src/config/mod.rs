//! Configuration types for the OTDR trace pipeline.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::core::writers::ExportFormat;
use crate::processors::batch::BatchOptions;
use crate::processors::classifier::{ClassificationMode, ClassifierParams, DEFAULT_PROMINENCE};

/// Configuration for signal extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractConfig {
    /// Subtract the first reading's amplitude from every sample
    #[serde(default)]
    pub adjust: bool,
}

/// Configuration for event classification.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Tie-break mode: "E" (edge) or "C" (continuous)
    #[serde(default)]
    pub mode: ClassificationMode,

    /// Minimum peak prominence
    #[serde(default = "default_prominence")]
    pub prominence: f64,

    /// Minimum peak height (no height filter when absent)
    #[serde(default)]
    pub height_threshold: Option<f64>,

    /// Inclusive [min, max] distance window
    #[serde(default)]
    pub x_range: Option<[f64; 2]>,
}

fn default_prominence() -> f64 {
    DEFAULT_PROMINENCE
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            mode: ClassificationMode::default(),
            prominence: default_prominence(),
            height_threshold: None,
            x_range: None,
        }
    }
}

impl ClassifierConfig {
    pub fn params(&self) -> ClassifierParams {
        ClassifierParams {
            mode: self.mode,
            x_range: self.x_range.map(|[min, max]| (min, max)),
            prominence: self.prominence,
            height_threshold: self.height_threshold,
        }
    }
}

/// Configuration for tabular export.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Output format for batch runs
    #[serde(default)]
    pub format: ExportFormat,

    /// Fixed decimal places (shortest lossless form when absent)
    #[serde(default)]
    pub precision: Option<usize>,
}

/// Configuration for batch processing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Worker threads (rayon default when absent)
    #[serde(default)]
    pub threads: Option<usize>,

    /// Keep going when a file fails
    #[serde(default = "default_continue_on_error")]
    pub continue_on_error: bool,
}

fn default_continue_on_error() -> bool {
    true
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            threads: None,
            continue_on_error: default_continue_on_error(),
        }
    }
}

/// Main pipeline configuration combining all sub-configs.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub extract: ExtractConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub export: ExportConfig,

    #[serde(default)]
    pub batch: BatchConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: PipelineConfig = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a YAML file.
    pub fn to_yaml<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Batch options derived from this configuration.
    pub fn batch_options(&self, classify: bool) -> BatchOptions {
        BatchOptions {
            adjust: self.extract.adjust,
            format: self.export.format,
            precision: self.export.precision,
            classifier: classify.then(|| self.classifier.params()),
            continue_on_error: self.batch.continue_on_error,
        }
    }
}
