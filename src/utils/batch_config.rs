/// Batch configuration record: which frames and layers to convert, where the
/// dumps live and how the decode table deviates from a revision preset.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::processing::layer_spec::{LayerKind, LayerSpecOverride, LayerTable, Revision};
use crate::utils::error_handling::{CodecError, CodecResult};

pub const DEFAULT_NAME_TEMPLATE: &str = "map_DLSS_{frame}_{cols}_{rows}_{layer}.txt";

fn default_name_template() -> String {
    DEFAULT_NAME_TEMPLATE.to_string()
}

/// Half-open frame range `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub struct FrameRange {
    pub start: u32,
    pub end: u32,
}

impl FrameRange {
    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LayerJobConfig {
    /// Source or canonical layer name (`input`, `color_input`, ...)
    pub layer: String,
    pub rows: usize,
    pub cols: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct BatchConfig {
    pub input_dir: PathBuf,
    /// Defaults to `input_dir`
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default = "default_name_template")]
    pub name_template: String,
    pub frames: FrameRange,
    #[serde(default)]
    pub revision: Revision,
    pub layers: Vec<LayerJobConfig>,
    /// Keyed by layer name, applied on top of the revision preset
    #[serde(default)]
    pub overrides: BTreeMap<String, LayerSpecOverride>,
    /// Worker threads; `None` = all cores but one
    #[serde(default)]
    pub threads: Option<usize>,
    #[serde(default)]
    pub fail_fast: bool,
}

impl BatchConfig {
    pub fn output_dir(&self) -> &Path {
        self.output_dir.as_deref().unwrap_or(&self.input_dir)
    }

    /// Revision preset with all overrides applied
    pub fn layer_table(&self) -> CodecResult<LayerTable> {
        let mut table = LayerTable::for_revision(self.revision);
        for (name, patch) in &self.overrides {
            let kind: LayerKind = name.parse()?;
            table.apply_override(kind, patch)?;
        }
        Ok(table)
    }

    pub fn validate(&self) -> CodecResult<()> {
        if self.frames.start > self.frames.end {
            return Err(CodecError::configuration(format!(
                "frame range start {} is after end {}",
                self.frames.start, self.frames.end
            )));
        }
        if self.threads == Some(0) {
            return Err(CodecError::configuration("threads must be at least 1"));
        }
        for job in &self.layers {
            job.layer.parse::<LayerKind>()?;
            if job.rows == 0 || job.cols == 0 {
                return Err(CodecError::configuration(format!(
                    "layer '{}' has empty dimensions {}x{}",
                    job.layer, job.cols, job.rows
                )));
            }
        }
        crate::batch::check_template(&self.name_template)?;
        self.layer_table().map(|_| ())
    }
}

/// Wczytuje konfigurację batch z pliku JSON i sprawdza jej spójność
pub fn load_batch_config(path: &Path) -> Result<BatchConfig> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read batch config: {}", path.display()))?;

    let config: BatchConfig = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse JSON config: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("Invalid batch config: {}", path.display()))?;
    Ok(config)
}

pub fn save_batch_config(config: &BatchConfig, path: &Path) -> Result<()> {
    let json_content = serde_json::to_string_pretty(config)
        .context("Failed to serialize config to JSON")?;

    fs::write(path, json_content)
        .with_context(|| format!("Failed to write config file: {}", path.display()))?;

    Ok(())
}

/// Starting point written by `rawexr init`: the frame window and layer sizes
/// the renderer captures use
pub fn example_config() -> BatchConfig {
    BatchConfig {
        input_dir: PathBuf::from("data"),
        output_dir: None,
        name_template: default_name_template(),
        frames: FrameRange { start: 20, end: 30 },
        revision: Revision::FloatDepth,
        layers: vec![
            LayerJobConfig { layer: "output".to_string(), rows: 564, cols: 1072 },
            LayerJobConfig { layer: "input".to_string(), rows: 282, cols: 536 },
            LayerJobConfig { layer: "velocity".to_string(), rows: 702, cols: 1171 },
        ],
        overrides: BTreeMap::new(),
        threads: None,
        fail_fast: false,
    }
}
