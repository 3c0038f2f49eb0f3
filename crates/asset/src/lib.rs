//! Asset importing: glTF / GLB documents flattened into renderable meshes.
//!
//! [`load`] walks every scene of a document, bakes node transforms into
//! [`MeshRecord`]s and decodes all textures into a [`TextureTable`].

pub mod error;
pub mod importer;
pub mod mesh;
pub mod texture;

pub use error::{AssetError, AssetResult};
pub use importer::{ImportedModel, load, load_from_slice};
pub use mesh::{MeshRecord, MeshVertex};
pub use texture::{TextureData, TextureId, TextureTable};
