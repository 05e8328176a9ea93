use std::path::Path;

use rayon::prelude::*;

use crate::processing::layer_spec::{LayerKind, LayerSpec};
use crate::utils::error_handling::{CodecError, CodecResult};

/// One named 2-D plane, row-major (`rows * cols` samples)
#[derive(Clone, Debug, PartialEq)]
pub struct Plane {
    pub name: &'static str,
    pub samples: Vec<f32>,
}

/// rows × cols × channels samples, split into one plane per channel name
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedImage {
    pub layer: LayerKind,
    pub rows: usize,
    pub cols: usize,
    // Kolejność zgodna z LayerSpec::channel_names
    pub planes: Vec<Plane>,
}

impl DecodedImage {
    #[inline]
    pub fn pixel_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn plane(&self, name: &str) -> Option<&Plane> {
        self.planes.iter().find(|p| p.name == name)
    }

    /// Sample at (row, col) of the raw channel `channel`
    #[inline]
    pub fn sample(&self, row: usize, col: usize, channel: usize) -> f32 {
        self.planes[channel].samples[row * self.cols + col]
    }
}

/// Number of elements a `rows × cols` dump of this spec must contain;
/// `None` for empty or overflowing dimensions
pub fn element_count(spec: &LayerSpec, rows: usize, cols: usize) -> Option<usize> {
    if rows == 0 || cols == 0 {
        return None;
    }
    rows.checked_mul(cols)?.checked_mul(spec.channel_count())
}

/// Reshape a flat working-precision buffer into named planes and apply the
/// per-layer scaling.
///
/// Layout of `flat` is row-major with the channel axis fastest:
/// `flat[(row * cols + col) * K + channel]`.
pub fn decode(
    kind: LayerKind,
    spec: &LayerSpec,
    flat: &[f32],
    rows: usize,
    cols: usize,
    origin: &Path,
) -> CodecResult<DecodedImage> {
    spec.validate(kind)?;

    let k = spec.channel_count();
    let expected = element_count(spec, rows, cols);
    if expected != Some(flat.len()) {
        return Err(CodecError::Shape {
            layer: kind,
            path: origin.to_path_buf(),
            // 0 for empty dimensions, usize::MAX when rows * cols * K overflows
            expected: expected.unwrap_or_else(|| rows.saturating_mul(cols).saturating_mul(k)),
            actual: flat.len(),
        });
    }

    let mut planes: Vec<Plane> = spec
        .channel_names
        .par_iter()
        .enumerate()
        .map(|(channel, &name)| {
            let divisor = spec.divisors.as_ref().map_or(1.0, |d| d[channel]);
            let samples: Vec<f32> = flat
                .iter()
                .skip(channel)
                .step_by(k)
                .map(|&v| v / divisor)
                .collect();
            Plane { name, samples }
        })
        .collect();

    if spec.normalize {
        if let Some(plane) = planes.first_mut() {
            normalize_to_255(plane, kind);
        }
    }

    Ok(DecodedImage { layer: kind, rows, cols, planes })
}

/// `v / max * 255`, so the maximum lands on exactly 255
fn normalize_to_255(plane: &mut Plane, kind: LayerKind) {
    let max = plane
        .samples
        .par_iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(|| f32::NEG_INFINITY, f32::max);

    if !(max.is_finite() && max > 0.0) {
        log::warn!("[decode] {} plane '{}' has no positive finite maximum ({}), skipping normalization", kind, plane.name, max);
        return;
    }

    plane.samples.par_iter_mut().for_each(|v| *v = *v / max * 255.0);
}
