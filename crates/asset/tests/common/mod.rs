//! Builds small glTF documents in memory for importer tests.

#![allow(dead_code)]

use std::{
    fs,
    io::Cursor,
    path::PathBuf,
};

use serde_json::{Value, json};

const ARRAY_BUFFER: u32 = 34962;
const ELEMENT_ARRAY_BUFFER: u32 = 34963;
const FLOAT: u32 = 5126;
const UNSIGNED_SHORT: u32 = 5123;
const UNSIGNED_INT: u32 = 5125;

#[derive(Default)]
pub struct DocBuilder {
    bin: Vec<u8>,
    views: Vec<Value>,
    accessors: Vec<Value>,
    images: Vec<Value>,
    textures: Vec<Value>,
    materials: Vec<Value>,
    meshes: Vec<Value>,
    nodes: Vec<Value>,
    scenes: Vec<Value>,
}

impl DocBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn push_view(&mut self, bytes: &[u8], target: Option<u32>) -> usize {
        while self.bin.len() % 4 != 0 {
            self.bin.push(0);
        }
        let mut view = json!({
            "buffer": 0,
            "byteOffset": self.bin.len(),
            "byteLength": bytes.len(),
        });
        if let Some(target) = target {
            view["target"] = json!(target);
        }
        self.bin.extend_from_slice(bytes);
        self.views.push(view);
        self.views.len() - 1
    }

    fn push_accessor(&mut self, accessor: Value) -> usize {
        self.accessors.push(accessor);
        self.accessors.len() - 1
    }

    pub fn positions(&mut self, positions: &[[f32; 3]]) -> usize {
        let mut min = [f32::MAX; 3];
        let mut max = [f32::MIN; 3];
        for p in positions {
            for k in 0..3 {
                min[k] = min[k].min(p[k]);
                max[k] = max[k].max(p[k]);
            }
        }
        let view = self.push_view(&float_bytes(positions.iter().flatten()), Some(ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": positions.len(),
            "type": "VEC3",
            "min": min,
            "max": max,
        }))
    }

    /// POSITION accessor without the `min`/`max` bounds validation requires.
    pub fn unbounded_positions(&mut self, positions: &[[f32; 3]]) -> usize {
        let view = self.push_view(&float_bytes(positions.iter().flatten()), Some(ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": positions.len(),
            "type": "VEC3",
        }))
    }

    /// Unsigned short scalars carrying POSITION-style bounds, so validation
    /// accepts them as a position accessor of the wrong type.
    pub fn bounded_u16_scalars(&mut self, values: &[u16]) -> usize {
        let bytes: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": UNSIGNED_SHORT,
            "count": values.len(),
            "type": "SCALAR",
            "min": [0.0, 0.0, 0.0],
            "max": [1.0, 1.0, 1.0],
        }))
    }

    pub fn normals(&mut self, normals: &[[f32; 3]]) -> usize {
        let view = self.push_view(&float_bytes(normals.iter().flatten()), Some(ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": normals.len(),
            "type": "VEC3",
        }))
    }

    pub fn uvs(&mut self, uvs: &[[f32; 2]]) -> usize {
        let view = self.push_view(&float_bytes(uvs.iter().flatten()), Some(ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": FLOAT,
            "count": uvs.len(),
            "type": "VEC2",
        }))
    }

    pub fn indices_u16(&mut self, indices: &[u16]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(ELEMENT_ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": UNSIGNED_SHORT,
            "count": indices.len(),
            "type": "SCALAR",
        }))
    }

    pub fn indices_u32(&mut self, indices: &[u32]) -> usize {
        let bytes: Vec<u8> = indices.iter().flat_map(|i| i.to_le_bytes()).collect();
        let view = self.push_view(&bytes, Some(ELEMENT_ARRAY_BUFFER));
        self.push_accessor(json!({
            "bufferView": view,
            "componentType": UNSIGNED_INT,
            "count": indices.len(),
            "type": "SCALAR",
        }))
    }

    /// Embed encoded image bytes and add a texture sampling them.
    pub fn embedded_texture(&mut self, bytes: &[u8], mime_type: &str) -> usize {
        let view = self.push_view(bytes, None);
        self.images.push(json!({ "bufferView": view, "mimeType": mime_type }));
        self.textures.push(json!({ "source": self.images.len() - 1 }));
        self.textures.len() - 1
    }

    pub fn png_texture(&mut self, img: &image::RgbaImage) -> usize {
        self.embedded_texture(&encode_png(img), "image/png")
    }

    /// Texture whose image lives at `uri` (relative path or data URI).
    pub fn uri_texture(&mut self, uri: &str) -> usize {
        self.images.push(json!({ "uri": uri }));
        self.textures.push(json!({ "source": self.images.len() - 1 }));
        self.textures.len() - 1
    }

    pub fn material(&mut self, base_color_texture: Option<usize>) -> usize {
        let mut pbr = json!({ "baseColorFactor": [1.0, 1.0, 1.0, 1.0] });
        if let Some(index) = base_color_texture {
            pbr["baseColorTexture"] = json!({ "index": index });
        }
        self.materials.push(json!({ "pbrMetallicRoughness": pbr }));
        self.materials.len() - 1
    }

    pub fn mesh(&mut self, primitives: Vec<Value>) -> usize {
        self.meshes.push(json!({ "primitives": primitives }));
        self.meshes.len() - 1
    }

    pub fn node(&mut self, node: Value) -> usize {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    pub fn add_child(&mut self, parent: usize, child: usize) {
        let children = self.nodes[parent]
            .as_object_mut()
            .unwrap()
            .entry("children")
            .or_insert_with(|| json!([]));
        children.as_array_mut().unwrap().push(json!(child));
    }

    pub fn scene(&mut self, roots: &[usize]) -> usize {
        self.scenes.push(json!({ "nodes": roots }));
        self.scenes.len() - 1
    }

    fn root(&self, buffer_uri: Option<&str>) -> Value {
        let mut root = json!({
            "asset": { "version": "2.0", "generator": "asset-tests" },
            "scenes": self.scenes,
            "nodes": self.nodes,
            "meshes": self.meshes,
            "accessors": self.accessors,
            "bufferViews": self.views,
            "images": self.images,
            "textures": self.textures,
            "materials": self.materials,
        });
        if !self.scenes.is_empty() {
            root["scene"] = json!(0);
        }
        if !self.bin.is_empty() {
            let mut buffer = json!({ "byteLength": self.bin.len() });
            if let Some(uri) = buffer_uri {
                buffer["uri"] = json!(uri);
            }
            root["buffers"] = json!([buffer]);
        }
        root
    }

    /// Binary container with the JSON chunk and an optional BIN chunk.
    pub fn to_glb(&self) -> Vec<u8> {
        glb_container(2, &serde_json::to_vec(&self.root(None)).unwrap(), &self.bin)
    }

    /// JSON document plus the buffer contents it expects at `buffer_uri`.
    pub fn to_gltf(&self, buffer_uri: &str) -> (Vec<u8>, Vec<u8>) {
        let json = serde_json::to_vec_pretty(&self.root(Some(buffer_uri))).unwrap();
        (json, self.bin.clone())
    }
}

pub fn glb_container(version: u32, json: &[u8], bin: &[u8]) -> Vec<u8> {
    let mut json = json.to_vec();
    while json.len() % 4 != 0 {
        json.push(b' ');
    }
    let mut bin = bin.to_vec();
    while bin.len() % 4 != 0 {
        bin.push(0);
    }

    let mut total = 12 + 8 + json.len();
    if !bin.is_empty() {
        total += 8 + bin.len();
    }

    let mut out = Vec::with_capacity(total);
    out.extend_from_slice(b"glTF");
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(&(total as u32).to_le_bytes());
    out.extend_from_slice(&(json.len() as u32).to_le_bytes());
    out.extend_from_slice(b"JSON");
    out.extend_from_slice(&json);
    if !bin.is_empty() {
        out.extend_from_slice(&(bin.len() as u32).to_le_bytes());
        out.extend_from_slice(b"BIN\0");
        out.extend_from_slice(&bin);
    }
    out
}

pub fn primitive(
    position: Option<usize>,
    normal: Option<usize>,
    uv: Option<usize>,
    indices: Option<usize>,
    material: Option<usize>,
) -> Value {
    let mut attributes = serde_json::Map::new();
    if let Some(a) = position {
        attributes.insert("POSITION".into(), json!(a));
    }
    if let Some(a) = normal {
        attributes.insert("NORMAL".into(), json!(a));
    }
    if let Some(a) = uv {
        attributes.insert("TEXCOORD_0".into(), json!(a));
    }
    let mut prim = json!({ "attributes": attributes });
    if let Some(i) = indices {
        prim["indices"] = json!(i);
    }
    if let Some(m) = material {
        prim["material"] = json!(m);
    }
    prim
}

pub fn encode_png(img: &image::RgbaImage) -> Vec<u8> {
    let mut png = Vec::new();
    image::DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    png
}

pub fn checkerboard(size: u32) -> image::RgbaImage {
    image::RgbaImage::from_fn(size, size, |x, y| {
        if (x + y) % 2 == 0 {
            image::Rgba([255, 255, 255, 255])
        } else {
            image::Rgba([200, 30, 30, 255])
        }
    })
}

/// Fresh scratch directory for one test.
pub fn scratch_dir(test: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("asset-tests-{}-{test}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    fs::create_dir_all(&dir).unwrap();
    dir
}

pub fn write_glb(test: &str, doc: &DocBuilder) -> PathBuf {
    let path = scratch_dir(test).join("model.glb");
    fs::write(&path, doc.to_glb()).unwrap();
    path
}

fn float_bytes<'a>(floats: impl Iterator<Item = &'a f32>) -> Vec<u8> {
    floats.flat_map(|f| f.to_le_bytes()).collect()
}

pub const QUAD: [[f32; 3]; 4] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
];
