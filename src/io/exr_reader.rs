use std::path::Path;

use exr::prelude as exr;

use crate::processing::layer_spec::SampleType;
use crate::utils::error_handling::{CodecError, CodecResult};

#[derive(Clone, Debug)]
pub struct ContainerChannel {
    pub name: String,
    /// `None` for u32 channels, which this tool never writes
    pub sample_type: Option<SampleType>,
    // Dane kanału w układzie wierszowym (y * width + x), zawsze jako f32
    pub samples: Vec<f32>,
}

impl ContainerChannel {
    pub fn pixel_type_name(&self) -> String {
        self.sample_type.map_or_else(|| "u32".to_string(), |t| t.to_string())
    }

    /// (min, max) ignoring NaN; `None` for an empty or all-NaN channel
    pub fn range(&self) -> Option<(f32, f32)> {
        self.samples
            .iter()
            .copied()
            .filter(|v| !v.is_nan())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}

/// Contents of the first layer of an EXR file
#[derive(Clone, Debug)]
pub struct ContainerInfo {
    pub width: usize,
    pub height: usize,
    /// In file order (EXR stores channels sorted by name)
    pub channels: Vec<ContainerChannel>,
}

impl ContainerInfo {
    pub fn channel(&self, name: &str) -> Option<&ContainerChannel> {
        self.channels.iter().find(|c| c.name == name)
    }

    pub fn channel_names(&self) -> Vec<&str> {
        self.channels.iter().map(|c| c.name.as_str()).collect()
    }
}

fn no_layers(path: &Path) -> CodecError {
    CodecError::container(path, exr::Error::Invalid("file contains no layers".into()))
}

/// Read the whole first layer into memory
pub fn read_container(path: &Path) -> CodecResult<ContainerInfo> {
    let any_image = exr::read_all_flat_layers_from_file(path).map_err(|e| CodecError::container(path, e))?;

    let layer = any_image
        .layer_data
        .first()
        .ok_or_else(|| no_layers(path))?;

    let width = layer.size.width();
    let height = layer.size.height();

    let channels = layer
        .channel_data
        .list
        .iter()
        .map(|ch| {
            let (sample_type, samples): (Option<SampleType>, Vec<f32>) = match &ch.sample_data {
                exr::FlatSamples::F16(v) => (Some(SampleType::Half), v.iter().map(|h| h.to_f32()).collect()),
                exr::FlatSamples::F32(v) => (Some(SampleType::Float32), v.clone()),
                exr::FlatSamples::U32(v) => (None, v.iter().map(|&u| u as f32).collect()),
            };
            ContainerChannel { name: ch.name.to_string(), sample_type, samples }
        })
        .collect();

    Ok(ContainerInfo { width, height, channels })
}
