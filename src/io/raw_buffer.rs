use std::fs;
use std::path::Path;

use half::f16;
use rayon::prelude::*;

use crate::processing::layer_spec::SampleType;
use crate::utils::error_handling::{CodecError, CodecResult};

/// Flat, headerless sequence of samples exactly as the renderer dumped them
#[derive(Debug, Clone, PartialEq)]
pub enum RawBuffer {
    Half(Vec<f16>),
    Float32(Vec<f32>),
}

impl RawBuffer {
    /// Read a whole little-endian dump of `sample_type` elements
    pub fn load(path: &Path, sample_type: SampleType) -> CodecResult<Self> {
        let bytes = fs::read(path).map_err(|e| CodecError::io(path, e))?;
        log::debug!(
            "[load] {} ({}, {} as {})",
            path.display(),
            crate::utils::human_size(bytes.len() as u64),
            bytes.len() / sample_type.size_bytes(),
            sample_type
        );
        Self::from_le_bytes(&bytes, sample_type, path)
    }

    /// `origin` only labels errors
    pub fn from_le_bytes(bytes: &[u8], sample_type: SampleType, origin: &Path) -> CodecResult<Self> {
        let element_size = sample_type.size_bytes();
        if bytes.len() % element_size != 0 {
            return Err(CodecError::Misaligned {
                path: origin.to_path_buf(),
                bytes: bytes.len(),
                element_size,
            });
        }

        let buffer = match sample_type {
            SampleType::Half => RawBuffer::Half(
                bytes
                    .par_chunks_exact(2)
                    .map(|chunk| f16::from_le_bytes([chunk[0], chunk[1]]))
                    .collect(),
            ),
            SampleType::Float32 => RawBuffer::Float32(
                bytes
                    .par_chunks_exact(4)
                    .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
                    .collect(),
            ),
        };
        Ok(buffer)
    }

    pub fn sample_type(&self) -> SampleType {
        match self {
            RawBuffer::Half(_) => SampleType::Half,
            RawBuffer::Float32(_) => SampleType::Float32,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            RawBuffer::Half(v) => v.len(),
            RawBuffer::Float32(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Widen or narrow every element uniformly to the working precision
    pub fn into_working(self, working: SampleType) -> Vec<f32> {
        match (self, working) {
            (RawBuffer::Half(v), _) => v.par_iter().map(|h| h.to_f32()).collect(),
            (RawBuffer::Float32(v), SampleType::Float32) => v,
            (RawBuffer::Float32(v), SampleType::Half) => v.par_iter().map(|&x| SampleType::Half.quantize(x)).collect(),
        }
    }
}

/// Little-endian encoding of `samples`; the inverse of [`RawBuffer::from_le_bytes`]
pub fn encode_le_bytes(samples: &[f32], sample_type: SampleType) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * sample_type.size_bytes());
    match sample_type {
        SampleType::Half => {
            for &s in samples {
                out.extend_from_slice(&f16::from_f32(s).to_le_bytes());
            }
        }
        SampleType::Float32 => {
            for &s in samples {
                out.extend_from_slice(&s.to_le_bytes());
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_support::ScratchDir;

    #[test]
    fn test_decode_half_le() {
        // 1.0 = 0x3C00, -2.0 = 0xC000
        let bytes = [0x00, 0x3C, 0x00, 0xC0];
        let buf = RawBuffer::from_le_bytes(&bytes, SampleType::Half, Path::new("mem")).unwrap();
        assert_eq!(buf.len(), 2);
        assert_eq!(buf.into_working(SampleType::Float32), vec![1.0, -2.0]);
    }

    #[test]
    fn test_decode_f32_le() {
        let bytes = encode_le_bytes(&[0.5, 1024.25, -3.0], SampleType::Float32);
        let buf = RawBuffer::from_le_bytes(&bytes, SampleType::Float32, Path::new("mem")).unwrap();
        assert_eq!(buf.sample_type(), SampleType::Float32);
        assert_eq!(buf.into_working(SampleType::Float32), vec![0.5, 1024.25, -3.0]);
    }

    #[test]
    fn test_narrow_to_half_working_precision() {
        let bytes = encode_le_bytes(&[0.1, 70000.0], SampleType::Float32);
        let buf = RawBuffer::from_le_bytes(&bytes, SampleType::Float32, Path::new("mem")).unwrap();
        let working = buf.into_working(SampleType::Half);
        assert_eq!(working[0], f16::from_f32(0.1).to_f32());
        // out of half range
        assert!(working[1].is_infinite());
    }

    #[test]
    fn test_misaligned_length() {
        let err = RawBuffer::from_le_bytes(&[0u8; 7], SampleType::Float32, Path::new("odd.bin")).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_load_missing_file() {
        let dir = ScratchDir::new("raw_missing");
        let err = RawBuffer::load(&dir.path().join("nope.txt"), SampleType::Half).unwrap_err();
        assert!(err.is_io_error());
    }

    #[test]
    fn test_load_from_disk() {
        let dir = ScratchDir::new("raw_load");
        let path = dir.path().join("map_DLSS_0_2_1_velocity.txt");
        std::fs::write(&path, encode_le_bytes(&[1.0, 2.0, 3.0, 4.0], SampleType::Half)).unwrap();
        let buf = RawBuffer::load(&path, SampleType::Half).unwrap();
        assert_eq!(buf.into_working(SampleType::Float32), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
