use std::fs;
use std::path::{Path, PathBuf};

use exr::prelude::{AnyChannel, AnyChannels, Encoding, FlatSamples, Image, Layer, LayerAttributes, WritableImage};
use half::f16;
use rayon::prelude::*;

use crate::processing::decode::DecodedImage;
use crate::processing::layer_spec::SampleType;
use crate::utils::error_handling::{CodecError, CodecResult};

/// Sibling path the container is written to before it is moved into place
pub fn partial_path(destination: &Path) -> PathBuf {
    let name = destination
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.exr".to_string());
    destination.with_file_name(format!(".{}.partial", name))
}

/// Write every plane of `image` as one EXR channel of `target` pixel type.
///
/// Header is `cols × rows`. The file appears at `destination` only once it is
/// complete; an existing file there is replaced.
pub fn write_container(image: &DecodedImage, target: SampleType, destination: &Path) -> CodecResult<()> {
    let channels: Vec<AnyChannel<FlatSamples>> = image
        .planes
        .iter()
        .map(|plane| {
            let samples = match target {
                SampleType::Half => FlatSamples::F16(plane.samples.par_iter().map(|&v| f16::from_f32(v)).collect()),
                SampleType::Float32 => FlatSamples::F32(plane.samples.clone()),
            };
            AnyChannel::new(plane.name, samples)
        })
        .collect();

    let layer = Layer::new(
        (image.cols, image.rows),
        LayerAttributes::default(),
        Encoding::UNCOMPRESSED,
        AnyChannels::sort(channels.into()),
    );

    let partial = partial_path(destination);
    if let Err(e) = Image::from_layer(layer).write().to_file(&partial) {
        // nie zostawiaj połówek plików
        let _ = fs::remove_file(&partial);
        return Err(CodecError::container(destination, e));
    }

    if let Err(e) = fs::rename(&partial, destination) {
        let _ = fs::remove_file(&partial);
        return Err(CodecError::io(destination, e));
    }

    log::debug!(
        "[write] {} ({}x{}, {} channels as {})",
        destination.display(),
        image.cols,
        image.rows,
        image.planes.len(),
        target
    );
    Ok(())
}
