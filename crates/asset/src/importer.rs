//! glTF / GLB importer.
//!
//! Parsing and accessor decoding are delegated to the `gltf` crate; this
//! module walks the node hierarchy, bakes transforms, flattens primitives into
//! [`MeshRecord`]s and decodes every texture into a [`TextureTable`].

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
};

use corelib::transform::compose;
use glam::Mat4;
use gltf::{
    Document, Semantic,
    accessor::{DataType, Dimensions},
    buffer,
    image::Source,
    json::validation,
    mesh::Mode,
};
use log::{debug, info, warn};

use crate::{
    error::{AssetError, AssetResult},
    mesh::{DEFAULT_NORMAL, DEFAULT_UV, MeshRecord, MeshVertex, rewind_triangles},
    texture::{TextureData, TextureId, TextureTable},
};

/// Path the parse error of an in-memory import is reported under.
pub const MEMORY_SOURCE: &str = "<memory>";

/// Everything extracted from one document.
#[derive(Clone, Debug, Default)]
pub struct ImportedModel {
    pub meshes: Vec<MeshRecord>,
    pub textures: TextureTable<TextureData>,
    /// Primitives that produced no record.
    pub skipped_primitives: usize,
}

impl ImportedModel {
    /// Decoded texture a record refers to, if any.
    pub fn texture_for(&self, record: &MeshRecord) -> Option<&TextureData> {
        self.textures.resolve(record.texture)
    }

    pub fn vertex_count(&self) -> usize {
        self.meshes.iter().map(|m| m.vertices.len()).sum()
    }
}

/// Load a `.glb` or `.gltf` file. External buffers and images are resolved
/// relative to the file's directory.
pub fn load(path: impl AsRef<Path>) -> AssetResult<ImportedModel> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| AssetError::NotFound {
        path: path.to_path_buf(),
        source,
    })?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));

    let model = import(&bytes, Some(base_dir)).map_err(|source| AssetError::Parse {
        path: path.to_path_buf(),
        source,
    })?;

    info!(
        "Imported {}: {} mesh records ({} primitives skipped), {} textures",
        path.display(),
        model.meshes.len(),
        model.skipped_primitives,
        model.textures.len()
    );
    Ok(model)
}

/// Import a document already held in memory. Relative URIs are resolved
/// against `base_dir`; without one only embedded data can be used. Errors
/// carry [`MEMORY_SOURCE`] as their path.
pub fn load_from_slice(bytes: &[u8], base_dir: Option<&Path>) -> AssetResult<ImportedModel> {
    import(bytes, base_dir).map_err(|source| AssetError::Parse {
        path: PathBuf::from(MEMORY_SOURCE),
        source,
    })
}

fn import(bytes: &[u8], base_dir: Option<&Path>) -> gltf::Result<ImportedModel> {
    let gltf::Gltf { document, blob } = parse_document(bytes)?;
    let buffers = gltf::import_buffers(&document, base_dir, blob)?;

    let mut importer = Importer {
        buffers: &buffers,
        base_dir,
        model: ImportedModel::default(),
    };
    importer.decode_textures(&document);
    importer.walk_scenes(&document);
    Ok(importer.model)
}

/// Parse with validation. Primitives without POSITION fail validation but
/// must only be skipped, so a document whose sole problems are missing
/// POSITION attributes is parsed again without validation.
fn parse_document(bytes: &[u8]) -> gltf::Result<gltf::Gltf> {
    match gltf::Gltf::from_slice(bytes) {
        Err(gltf::Error::Validation(errors))
            if !errors.is_empty()
                && errors
                    .iter()
                    .all(|(path, error)| is_missing_position(path.as_str(), error)) =>
        {
            for (path, error) in &errors {
                debug!("Tolerating validation error at {path}: {error}");
            }
            gltf::Gltf::from_slice_without_validation(bytes)
        }
        other => other,
    }
}

fn is_missing_position(path: &str, error: &validation::Error) -> bool {
    matches!(error, validation::Error::Missing) && path.ends_with("attributes[\"POSITION\"]")
}

struct Importer<'a> {
    buffers: &'a [buffer::Data],
    base_dir: Option<&'a Path>,
    model: ImportedModel,
}

impl<'a> Importer<'a> {
    fn decode_textures(&mut self, document: &Document) {
        for texture in document.textures() {
            let id = TextureId(texture.index());
            let image = texture.source();
            let decoded = match self.decode_image(&image) {
                Ok(decoded) => decoded,
                Err(e) => {
                    warn!("Texture {}: failed to load image {}: {e}", id.0, image.index());
                    continue;
                }
            };
            match TextureData::from_gltf(decoded) {
                Some(data) => {
                    debug!("Texture {}: decoded {}x{}", id.0, data.width, data.height);
                    self.model.textures.insert(id, data);
                }
                None => warn!("Texture {}: image {} has inconsistent pixel data", id.0, image.index()),
            }
        }
    }

    /// Decode one image from a buffer view, a `data:` URI or a file relative
    /// to the document.
    fn decode_image(&self, image: &gltf::Image<'_>) -> gltf::Result<gltf::image::Data> {
        let base = match image.source() {
            // Embedded payloads never touch the filesystem.
            Source::Uri { uri, .. } if uri.starts_with("data:") => {
                Some(self.base_dir.unwrap_or(Path::new("")))
            }
            _ => self.base_dir,
        };
        gltf::image::Data::from_source(image.source(), base, self.buffers)
    }

    fn walk_scenes(&mut self, document: &Document) {
        for scene in document.scenes() {
            let mut visited = HashSet::new();
            let mut stack: Vec<(gltf::Node<'_>, Mat4)> = scene
                .nodes()
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .map(|node| (node, Mat4::IDENTITY))
                .collect();

            while let Some((node, parent)) = stack.pop() {
                if !visited.insert(node.index()) {
                    warn!("Scene {}: node {} reached twice, ignoring", scene.index(), node.index());
                    continue;
                }

                let local = Mat4::from_cols_array_2d(&node.transform().matrix());
                let world = compose(parent, local);

                if let Some(mesh) = node.mesh() {
                    debug!(
                        "Node {} ({}): mesh {} with {} primitives",
                        node.index(),
                        node.name().unwrap_or("unnamed"),
                        mesh.index(),
                        mesh.primitives().len()
                    );
                    for primitive in mesh.primitives() {
                        match self.try_extract(&primitive, world) {
                            Some(record) => self.model.meshes.push(record),
                            None => self.model.skipped_primitives += 1,
                        }
                    }
                }

                let children: Vec<_> = node.children().collect();
                stack.extend(children.into_iter().rev().map(|child| (child, world)));
            }
        }
    }

    fn try_extract(&self, primitive: &gltf::Primitive<'_>, transform: Mat4) -> Option<MeshRecord> {
        let prim = primitive.index();
        if primitive.mode() != Mode::Triangles {
            warn!("Primitive {prim}: unsupported mode {:?}, skipping", primitive.mode());
            return None;
        }

        let has_positions = usable_attribute(primitive, Semantic::Positions, Dimensions::Vec3, &[
            DataType::F32,
        ]);
        let has_normals = usable_attribute(primitive, Semantic::Normals, Dimensions::Vec3, &[
            DataType::F32,
        ]);
        let has_uvs = usable_attribute(primitive, Semantic::TexCoords(0), Dimensions::Vec2, &[
            DataType::F32,
            DataType::U8,
            DataType::U16,
        ]);
        if let Some(accessor) = primitive.indices() {
            let width_ok = matches!(accessor.data_type(), DataType::U8 | DataType::U16 | DataType::U32);
            if accessor.dimensions() != Dimensions::Scalar || !width_ok {
                warn!(
                    "Primitive {prim}: index accessor {} is {:?} {:?}, skipping",
                    accessor.index(),
                    accessor.dimensions(),
                    accessor.data_type()
                );
                return None;
            }
        }

        let buffers = self.buffers;
        let reader =
            primitive.reader(move |buffer| buffers.get(buffer.index()).map(|d| d.0.as_slice()));

        let Some(positions) = has_positions.then(|| reader.read_positions()).flatten() else {
            debug!("Primitive {prim}: no usable POSITION attribute, skipping");
            return None;
        };
        let positions: Vec<[f32; 3]> = positions.collect();

        let mut normals = has_normals
            .then(|| reader.read_normals())
            .flatten()
            .into_iter()
            .flatten();
        let mut uvs = has_uvs
            .then(|| reader.read_tex_coords(0))
            .flatten()
            .map(|tc| tc.into_f32())
            .into_iter()
            .flatten();

        let mut vertices: Vec<MeshVertex> = positions
            .into_iter()
            .map(|position| {
                MeshVertex::new(
                    position,
                    normals.next().unwrap_or(DEFAULT_NORMAL),
                    uvs.next().unwrap_or(DEFAULT_UV),
                )
            })
            .collect();

        let indices = match reader.read_indices() {
            Some(read) => {
                let mut indices: Vec<u32> = read.into_u32().collect();
                if let Some(&bad) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
                    warn!(
                        "Primitive {prim}: index {bad} out of range for {} vertices, skipping",
                        vertices.len()
                    );
                    return None;
                }
                let partial = indices.len() % 3;
                if partial != 0 {
                    warn!("Primitive {prim}: dropping {partial} indices of a partial triangle");
                    indices.truncate(indices.len() - partial);
                }
                rewind_triangles(&mut indices);
                Some(indices)
            }
            None => {
                if vertices.len() % 3 != 0 {
                    warn!(
                        "Primitive {prim}: {} vertices is not a whole triangle list",
                        vertices.len()
                    );
                }
                rewind_triangles(&mut vertices);
                None
            }
        };

        let texture = self.resolve_texture(primitive);

        debug!(
            "Primitive {prim}: {} vertices, {} indices, texture {:?}",
            vertices.len(),
            indices.as_ref().map_or(0, Vec::len),
            texture
        );

        Some(MeshRecord {
            vertices,
            indices,
            transform,
            texture,
        })
    }

    fn resolve_texture(&self, primitive: &gltf::Primitive<'_>) -> Option<TextureId> {
        let material = primitive.material();
        material.index()?;
        let info = material.pbr_metallic_roughness().base_color_texture()?;
        let id = TextureId(info.texture().index());
        self.model.textures.contains(id).then_some(id)
    }
}

/// Whether `semantic` is present with the layout its reader expects. A
/// present but mismatched accessor is reported and treated as absent.
fn usable_attribute(
    primitive: &gltf::Primitive<'_>,
    semantic: Semantic,
    dimensions: Dimensions,
    types: &[DataType],
) -> bool {
    let Some(accessor) = primitive.get(&semantic) else {
        return false;
    };
    if accessor.dimensions() == dimensions && types.contains(&accessor.data_type()) {
        return true;
    }
    warn!(
        "Primitive {}: {semantic:?} accessor {} is {:?} {:?}, ignoring",
        primitive.index(),
        accessor.index(),
        accessor.dimensions(),
        accessor.data_type()
    );
    false
}
