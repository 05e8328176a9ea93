use std::path::{Path, PathBuf};

use crate::processing::layer_spec::LayerKind;

/// Errors reported by a single (frame, layer) conversion.
///
/// Every variant carries enough context (layer, path, counts) to diagnose the
/// failing job from a batch log without re-running it.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Unknown layer kind, missing table entry or an inconsistent layer spec
    #[error("configuration error: {message}")]
    Configuration { message: String },

    /// Source unreadable, destination unwritable
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// EXR encoder/decoder failure
    #[error("EXR container error on '{}': {source}", .path.display())]
    Container {
        path: PathBuf,
        #[source]
        source: exr::error::Error,
    },

    /// Element count does not factor into rows * cols * channels
    #[error(
        "shape error for layer '{layer}' in '{}': expected {expected} elements, got {actual}",
        .path.display()
    )]
    Shape {
        layer: LayerKind,
        path: PathBuf,
        expected: usize,
        actual: usize,
    },

    /// File length is not a whole number of samples
    #[error(
        "shape error in '{}': {bytes} bytes is not a multiple of the {element_size}-byte sample size",
        .path.display()
    )]
    Misaligned {
        path: PathBuf,
        bytes: usize,
        element_size: usize,
    },
}

pub type CodecResult<T> = Result<T, CodecError>;

impl CodecError {
    pub fn configuration(message: impl Into<String>) -> Self {
        CodecError::Configuration { message: message.into() }
    }

    pub fn io(path: &Path, source: std::io::Error) -> Self {
        CodecError::Io { path: path.to_path_buf(), source }
    }

    pub fn container(path: &Path, source: exr::error::Error) -> Self {
        CodecError::Container { path: path.to_path_buf(), source }
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, CodecError::Configuration { .. })
    }

    /// Container failures count as I/O: both mean the file could not be produced or consumed.
    pub fn is_io_error(&self) -> bool {
        matches!(self, CodecError::Io { .. } | CodecError::Container { .. })
    }

    pub fn is_shape_error(&self) -> bool {
        matches!(self, CodecError::Shape { .. } | CodecError::Misaligned { .. })
    }
}
