use std::path::Path;

use crate::io::exr_writer::write_container;
use crate::io::raw_buffer::RawBuffer;
use crate::processing::decode::{decode, DecodedImage};
use crate::processing::layer_spec::{LayerKind, LayerSpec, LayerTable};
use crate::utils::error_handling::CodecResult;

/// Converts one raw renderer dump into one EXR file.
///
/// Holds only the immutable [`LayerTable`]; each call is independent, so a
/// shared `&LayerCodec` can be driven from many threads at once.
#[derive(Debug, Clone, Default)]
pub struct LayerCodec {
    table: LayerTable,
}

impl LayerCodec {
    pub fn new(table: LayerTable) -> Self {
        Self { table }
    }

    pub fn table(&self) -> &LayerTable {
        &self.table
    }

    pub fn spec(&self, kind: LayerKind) -> CodecResult<&LayerSpec> {
        self.table.get(kind)
    }

    /// Read `source` as the layer's source sample type
    pub fn load(&self, kind: LayerKind, source: &Path) -> CodecResult<RawBuffer> {
        let spec = self.spec(kind)?;
        RawBuffer::load(source, spec.source)
    }

    /// Precision normalisation, reshape and channel assignment of an in-memory buffer
    pub fn decode(&self, kind: LayerKind, raw: RawBuffer, rows: usize, cols: usize, origin: &Path) -> CodecResult<DecodedImage> {
        let spec = self.spec(kind)?;
        let flat = raw.into_working(spec.working);
        decode(kind, spec, &flat, rows, cols, origin)
    }

    pub fn write(&self, image: &DecodedImage, destination: &Path) -> CodecResult<()> {
        let spec = self.spec(image.layer)?;
        write_container(image, spec.target, destination)
    }

    /// Load, decode and write in one go.
    ///
    /// Nothing is created at `destination` unless every earlier step succeeded.
    pub fn decode_and_write(
        &self,
        kind: LayerKind,
        source: &Path,
        rows: usize,
        cols: usize,
        destination: &Path,
    ) -> CodecResult<()> {
        let raw = self.load(kind, source)?;
        let image = self.decode(kind, raw, rows, cols, source)?;
        self.write(&image, destination)?;
        log::info!(
            "[convert] {} -> {} ({}, {}x{}, channels {})",
            source.display(),
            destination.display(),
            kind,
            cols,
            rows,
            kind.channel_names().join("")
        );
        Ok(())
    }

    /// Same as [`decode_and_write`](Self::decode_and_write) for a layer given by
    /// name; an unknown name fails before any file is touched
    pub fn decode_and_write_named(
        &self,
        layer: &str,
        source: &Path,
        rows: usize,
        cols: usize,
        destination: &Path,
    ) -> CodecResult<()> {
        let kind: LayerKind = layer.parse()?;
        self.decode_and_write(kind, source, rows, cols, destination)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::exr_reader::read_container;
    use crate::io::raw_buffer::encode_le_bytes;
    use crate::processing::layer_spec::{Revision, SampleType};
    use crate::utils::error_handling::CodecError;
    use crate::utils::test_support::ScratchDir;

    fn write_dump(dir: &Path, name: &str, samples: &[f32], sample_type: SampleType) -> std::path::PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, encode_le_bytes(samples, sample_type)).unwrap();
        path
    }

    #[test]
    fn test_velocity_end_to_end() {
        let dir = ScratchDir::new("codec_velocity");
        let src = write_dump(dir.path(), "v.txt", &[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0], SampleType::Half);
        let dst = dir.path().join("v.exr");

        LayerCodec::default().decode_and_write(LayerKind::Velocity, &src, 2, 2, &dst).unwrap();

        let info = read_container(&dst).unwrap();
        assert_eq!((info.width, info.height), (2, 2));
        let mut names = info.channel_names();
        names.sort();
        assert_eq!(names, vec!["G", "R"]);
        assert_eq!(info.channel("G").unwrap().samples, vec![1.0, 3.0, 5.0, 7.0]);
        assert_eq!(info.channel("R").unwrap().samples, vec![2.0, 4.0, 6.0, 8.0]);
        assert!(info.channels.iter().all(|c| c.sample_type == Some(SampleType::Half)));
    }

    #[test]
    fn test_every_layer_writes_declared_channels() {
        let dir = ScratchDir::new("codec_all");
        for revision in [Revision::FloatDepth, Revision::HalfDepth] {
            let codec = LayerCodec::new(LayerTable::for_revision(revision));
            for kind in LayerKind::ALL {
                let spec = codec.spec(kind).unwrap().clone();
                let (rows, cols) = (3, 5);
                let samples: Vec<f32> = (0..rows * cols * spec.channel_count()).map(|i| (i % 17) as f32 * 0.5).collect();
                let src = write_dump(dir.path(), &format!("{}.txt", kind.source_name()), &samples, spec.source);
                let dst = dir.path().join(format!("{}_{:?}.exr", kind.source_name(), revision));

                codec.decode_and_write(kind, &src, rows, cols, &dst).unwrap();

                let info = read_container(&dst).unwrap();
                assert_eq!((info.width, info.height), (cols, rows));
                let mut written = info.channel_names();
                written.sort();
                let mut declared = spec.channel_names.to_vec();
                declared.sort();
                assert_eq!(written, declared, "{} {:?}", kind, revision);
                assert!(info.channels.iter().all(|c| c.sample_type == Some(spec.target)));
            }
        }
    }

    #[test]
    fn test_color_round_trip_matches_decoded_planes() {
        let dir = ScratchDir::new("codec_roundtrip");
        let codec = LayerCodec::default();
        let (rows, cols) = (4, 3);
        let samples: Vec<f32> = (0..rows * cols * 3).map(|i| (i as f32).sin() * 10.0).collect();
        let src = write_dump(dir.path(), "output.txt", &samples, SampleType::Half);
        let dst = dir.path().join("output.exr");

        codec.decode_and_write(LayerKind::ColorOutput, &src, rows, cols, &dst).unwrap();

        let raw = codec.load(LayerKind::ColorOutput, &src).unwrap();
        let decoded = codec.decode(LayerKind::ColorOutput, raw, rows, cols, &src).unwrap();
        let info = read_container(&dst).unwrap();
        for plane in &decoded.planes {
            let expected: Vec<f32> = plane.samples.iter().map(|&v| SampleType::Half.quantize(v)).collect();
            assert_eq!(info.channel(plane.name).unwrap().samples, expected);
        }
    }

    #[test]
    fn test_depth_normalized_on_disk() {
        let dir = ScratchDir::new("codec_depth");
        let codec = LayerCodec::new(LayerTable::for_revision(Revision::FloatDepth));
        let src = write_dump(dir.path(), "depth.txt", &[0.5, 1.0, 2.0, 4.0], SampleType::Float32);
        let dst = dir.path().join("depth.exr");

        codec.decode_and_write(LayerKind::Depth, &src, 2, 2, &dst).unwrap();

        let r = read_container(&dst).unwrap().channel("R").unwrap().samples.clone();
        assert_eq!(r, vec![31.875, 63.75, 127.5, 255.0]);
    }

    #[test]
    fn test_shape_error_leaves_no_output() {
        let dir = ScratchDir::new("codec_shape");
        let samples = vec![0.0f32; 2 * 2 * 3 - 1];
        let src = write_dump(dir.path(), "input.txt", &samples, SampleType::Half);
        let dst = dir.path().join("input.exr");

        let err = LayerCodec::default().decode_and_write(LayerKind::ColorInput, &src, 2, 2, &dst).unwrap_err();
        match err {
            CodecError::Shape { expected, actual, .. } => assert_eq!((expected, actual), (12, 11)),
            other => panic!("expected shape error, got {:?}", other),
        }
        assert!(!dst.exists());
        assert!(!crate::io::exr_writer::partial_path(&dst).exists());
    }

    #[test]
    fn test_unknown_layer_touches_nothing() {
        let dir = ScratchDir::new("codec_unknown");
        let src = dir.path().join("does_not_exist.txt");
        let dst = dir.path().join("albedo.exr");

        let err = LayerCodec::default().decode_and_write_named("albedo", &src, 2, 2, &dst).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(!dst.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_missing_table_entry_is_configuration_error() {
        let dir = ScratchDir::new("codec_empty_table");
        let src = write_dump(dir.path(), "depth.txt", &[1.0], SampleType::Float32);
        let dst = dir.path().join("depth.exr");
        let err = LayerCodec::new(LayerTable::empty()).decode_and_write(LayerKind::Depth, &src, 1, 1, &dst).unwrap_err();
        assert!(err.is_configuration_error());
        assert!(!dst.exists());
    }

    #[test]
    fn test_missing_source_is_io_error() {
        let dir = ScratchDir::new("codec_missing");
        let err = LayerCodec::default()
            .decode_and_write(LayerKind::Velocity, &dir.path().join("gone.txt"), 2, 2, &dir.path().join("gone.exr"))
            .unwrap_err();
        assert!(err.is_io_error());
    }
}
