//! Renderer: draws imported glTF meshes through a [`RenderContext`].
//! `gpu` is the wgpu backend used by the viewer; `mock` records calls for
//! headless use.

pub mod context;
pub mod gpu;
pub mod mock;
pub mod scene;

use asset::AssetError;
use thiserror::Error;

pub use context::{EffectState, PrimitiveTopology, RenderContext};
pub use gpu::GpuContext;
pub use scene::SceneRenderer;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Asset(#[from] AssetError),

    #[error("texture creation failed: {0}")]
    TextureCreation(String),

    #[error("GPU initialisation failed: {0}")]
    Gpu(String),

    #[error("scene renderer has been disposed")]
    Disposed,
}

pub type RenderResult<T> = Result<T, RenderError>;
