use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// where a stage's spirv comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageSource {
    /// a compiled `.spv` file, re-read on every setup
    SpirvFile(PathBuf),
    Words(Vec<u32>),
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("shader file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read spirv from {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StageSource {
    pub fn load(&self) -> Result<Cow<'_, [u32]>, SourceError> {
        match self {
            Self::SpirvFile(path) => read_spirv_file(path).map(Cow::Owned),
            Self::Words(words) => Ok(Cow::Borrowed(words)),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::SpirvFile(path) => Some(path),
            Self::Words(_) => None,
        }
    }
}

pub fn read_spirv_file(path: &Path) -> Result<Vec<u32>, SourceError> {
    let io_error = |source: std::io::Error| {
        if source.kind() == std::io::ErrorKind::NotFound {
            SourceError::NotFound(path.to_path_buf())
        } else {
            SourceError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    };

    let mut file = std::fs::File::open(path).map_err(io_error)?;
    // checks the length and the magic number, fixing endianness if needed
    ash::util::read_spv(&mut file).map_err(io_error)
}
