/// Per-layer decode policy: which sample type a dump is stored in, which precision
/// we compute and write in, and how raw channels map onto EXR channel names.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::utils::error_handling::{CodecError, CodecResult};

/// Category of per-pixel data produced by the renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LayerKind {
    Depth,
    Velocity,
    ColorInput,
    ColorOutput,
    ColorInputPost,
}

impl LayerKind {
    pub const ALL: [LayerKind; 5] = [
        LayerKind::Depth,
        LayerKind::Velocity,
        LayerKind::ColorInput,
        LayerKind::ColorOutput,
        LayerKind::ColorInputPost,
    ];

    /// Name used by the renderer in dump file names
    pub fn source_name(&self) -> &'static str {
        match self {
            LayerKind::Depth => "depth",
            LayerKind::Velocity => "velocity",
            LayerKind::ColorInput => "input",
            LayerKind::ColorOutput => "output",
            LayerKind::ColorInputPost => "input_post",
        }
    }

    pub fn canonical_name(&self) -> &'static str {
        match self {
            LayerKind::Depth => "depth",
            LayerKind::Velocity => "velocity",
            LayerKind::ColorInput => "color_input",
            LayerKind::ColorOutput => "color_output",
            LayerKind::ColorInputPost => "color_input_post",
        }
    }

    /// EXR channel names, in raw channel order
    pub fn channel_names(&self) -> &'static [&'static str] {
        match self {
            LayerKind::Depth => &["R"],
            // raw channel 0 is the vertical component the renderer stores first
            LayerKind::Velocity => &["G", "R"],
            LayerKind::ColorInput | LayerKind::ColorOutput | LayerKind::ColorInputPost => &["R", "G", "B"],
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channel_names().len()
    }
}

impl fmt::Display for LayerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

impl FromStr for LayerKind {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        LayerKind::ALL
            .iter()
            .copied()
            .find(|k| k.source_name() == wanted || k.canonical_name() == wanted)
            .ok_or_else(|| CodecError::configuration(format!("unknown layer kind '{}'", s)))
    }
}

/// Floating-point sample width
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleType {
    Half,
    Float32,
}

impl SampleType {
    #[inline]
    pub fn size_bytes(&self) -> usize {
        match self {
            SampleType::Half => 2,
            SampleType::Float32 => 4,
        }
    }

    /// Round a value to what this sample type can hold
    #[inline]
    pub fn quantize(&self, value: f32) -> f32 {
        match self {
            SampleType::Half => half::f16::from_f32(value).to_f32(),
            SampleType::Float32 => value,
        }
    }
}

impl fmt::Display for SampleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleType::Half => f.write_str("half"),
            SampleType::Float32 => f.write_str("float32"),
        }
    }
}

/// Decode policy of one layer kind
#[derive(Debug, Clone, PartialEq)]
pub struct LayerSpec {
    /// Element type of the dump on disk
    pub source: SampleType,
    /// Precision every element is brought to before reshaping
    pub working: SampleType,
    /// Pixel type of every channel in the written container
    pub target: SampleType,
    pub channel_names: &'static [&'static str],
    /// Rescale the single depth plane to `[0, 255]`
    pub normalize: bool,
    /// Optional per-channel divisor, one per channel name
    pub divisors: Option<Vec<f32>>,
}

impl LayerSpec {
    fn color(kind: LayerKind) -> Self {
        Self {
            source: SampleType::Half,
            working: SampleType::Float32,
            target: SampleType::Half,
            channel_names: kind.channel_names(),
            normalize: false,
            divisors: None,
        }
    }

    #[inline]
    pub fn channel_count(&self) -> usize {
        self.channel_names.len()
    }

    pub fn validate(&self, kind: LayerKind) -> CodecResult<()> {
        if self.channel_names.is_empty() {
            return Err(CodecError::configuration(format!("layer '{}' declares no channels", kind)));
        }
        if self.normalize && self.channel_count() != 1 {
            return Err(CodecError::configuration(format!(
                "layer '{}': normalize applies to single-plane layers only ({} channels declared)",
                kind,
                self.channel_count()
            )));
        }
        if let Some(divisors) = &self.divisors {
            if divisors.len() != self.channel_count() {
                return Err(CodecError::configuration(format!(
                    "layer '{}': {} divisors given for {} channels",
                    kind,
                    divisors.len(),
                    self.channel_count()
                )));
            }
            if let Some(bad) = divisors.iter().find(|d| **d == 0.0 || !d.is_finite()) {
                return Err(CodecError::configuration(format!("layer '{}': invalid divisor {}", kind, bad)));
            }
        }
        Ok(())
    }
}

/// Partial [`LayerSpec`] read from configuration; `None` keeps the preset value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LayerSpecOverride {
    pub source: Option<SampleType>,
    pub working: Option<SampleType>,
    pub target: Option<SampleType>,
    pub normalize: Option<bool>,
    pub divisors: Option<Vec<f32>>,
}

/// The two depth policies observed in the renderer tooling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Revision {
    /// Depth dumped as float32, kept float32 and rescaled to `[0, 255]`
    #[default]
    FloatDepth,
    /// Depth dumped and written as half, values untouched
    HalfDepth,
}

impl FromStr for Revision {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "float_depth" => Ok(Revision::FloatDepth),
            "half_depth" => Ok(Revision::HalfDepth),
            other => Err(CodecError::configuration(format!(
                "unknown revision '{}' (expected float_depth or half_depth)",
                other
            ))),
        }
    }
}

/// Lookup table from layer kind to decode policy
#[derive(Debug, Clone, PartialEq)]
pub struct LayerTable {
    specs: HashMap<LayerKind, LayerSpec>,
}

impl LayerTable {
    /// Table without any entries; every lookup fails until specs are inserted
    pub fn empty() -> Self {
        Self { specs: HashMap::new() }
    }

    pub fn for_revision(revision: Revision) -> Self {
        let depth = match revision {
            Revision::FloatDepth => LayerSpec {
                source: SampleType::Float32,
                working: SampleType::Float32,
                target: SampleType::Float32,
                channel_names: LayerKind::Depth.channel_names(),
                normalize: true,
                divisors: None,
            },
            Revision::HalfDepth => LayerSpec {
                source: SampleType::Half,
                working: SampleType::Half,
                target: SampleType::Half,
                channel_names: LayerKind::Depth.channel_names(),
                normalize: false,
                divisors: None,
            },
        };

        let mut table = Self::empty();
        table.insert(LayerKind::Depth, depth);
        for kind in [LayerKind::Velocity, LayerKind::ColorInput, LayerKind::ColorOutput, LayerKind::ColorInputPost] {
            table.insert(kind, LayerSpec::color(kind));
        }
        table
    }

    pub fn insert(&mut self, kind: LayerKind, spec: LayerSpec) -> Option<LayerSpec> {
        self.specs.insert(kind, spec)
    }

    /// Resolve the spec for `kind`, validating it on the way out
    pub fn get(&self, kind: LayerKind) -> CodecResult<&LayerSpec> {
        let spec = self
            .specs
            .get(&kind)
            .ok_or_else(|| CodecError::configuration(format!("no layer spec registered for '{}'", kind)))?;
        spec.validate(kind)?;
        Ok(spec)
    }

    pub fn apply_override(&mut self, kind: LayerKind, patch: &LayerSpecOverride) -> CodecResult<()> {
        let mut spec = self
            .specs
            .get(&kind)
            .cloned()
            .ok_or_else(|| CodecError::configuration(format!("cannot override unregistered layer '{}'", kind)))?;
        if let Some(source) = patch.source { spec.source = source; }
        if let Some(working) = patch.working { spec.working = working; }
        if let Some(target) = patch.target { spec.target = target; }
        if let Some(normalize) = patch.normalize { spec.normalize = normalize; }
        if patch.divisors.is_some() {
            spec.divisors = patch.divisors.clone();
        }
        // table stays untouched when the patched spec is invalid
        spec.validate(kind)?;
        self.specs.insert(kind, spec);
        Ok(())
    }
}

impl Default for LayerTable {
    fn default() -> Self {
        Self::for_revision(Revision::default())
    }
}
