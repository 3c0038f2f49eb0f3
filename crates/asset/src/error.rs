use std::{io, path::PathBuf};

use thiserror::Error;

/// Fatal import failures. Per-primitive and per-texture problems are not
/// errors; they only degrade the imported model.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("asset not found or unreadable: {}", path.display())]
    NotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse glTF asset {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: gltf::Error,
    },
}

impl AssetError {
    pub fn path(&self) -> &std::path::Path {
        match self {
            Self::NotFound { path, .. } | Self::Parse { path, .. } => path,
        }
    }
}

pub type AssetResult<T> = Result<T, AssetError>;
