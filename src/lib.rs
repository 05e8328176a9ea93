//! Converts raw per-pixel buffers dumped by a renderer (depth, velocity,
//! color input/output) into multi-channel OpenEXR files.
//!
//! The per-layer policy lives in [`LayerTable`]; [`LayerCodec`] applies it to
//! one dump at a time and [`batch`] drives it over frame ranges.

pub mod batch;
pub mod codec;
pub mod io;
pub mod processing;
pub mod utils;

pub use codec::LayerCodec;
pub use processing::decode::{DecodedImage, Plane};
pub use processing::layer_spec::{LayerKind, LayerSpec, LayerSpecOverride, LayerTable, Revision, SampleType};
pub use utils::error_handling::{CodecError, CodecResult};
