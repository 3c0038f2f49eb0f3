//! Scene renderer: owns the flattened mesh records of one imported model and
//! replays them through a [`RenderContext`] every frame.

use std::path::Path;

use asset::{ImportedModel, MeshRecord, TextureTable};
use corelib::{Mat4, lighting::Lighting};
use log::{debug, warn};

use crate::{
    RenderError, RenderResult,
    context::{EffectState, PrimitiveTopology, RenderContext},
};

pub struct SceneRenderer<C: RenderContext> {
    context: C,
    meshes: Vec<MeshRecord>,
    textures: TextureTable<C::Texture>,
    effect: EffectState,
    disposed: bool,
}

impl<C: RenderContext> SceneRenderer<C> {
    /// Import `path` and prepare it for drawing. Import failures are fatal;
    /// no partially loaded renderer is returned.
    pub fn load(
        context: C,
        path: impl AsRef<Path>,
        view: Mat4,
        projection: Mat4,
    ) -> RenderResult<Self> {
        let model = asset::load(path)?;
        Ok(Self::new(context, model, view, projection))
    }

    /// Upload every decoded texture once and keep the mesh records.
    /// A texture the backend rejects is dropped; records using it draw
    /// untextured.
    pub fn new(mut context: C, model: ImportedModel, view: Mat4, projection: Mat4) -> Self {
        let ImportedModel {
            meshes, textures, ..
        } = model;

        let textures = textures.filter_map(|id, data| match context.create_texture(&data) {
            Ok(texture) => Some(texture),
            Err(e) => {
                warn!("Texture {}: upload to {} failed: {e}", id.0, context.backend_name());
                None
            }
        });

        debug!(
            "Scene ready on {}: {} meshes, {} textures",
            context.backend_name(),
            meshes.len(),
            textures.len()
        );

        Self {
            context,
            meshes,
            textures,
            effect: EffectState::new(view, projection, Lighting::default()),
            disposed: false,
        }
    }

    pub fn with_lighting(mut self, lighting: Lighting) -> Self {
        self.effect.lighting = lighting;
        self
    }

    pub fn set_view(&mut self, view: Mat4) {
        self.effect.view = view;
    }

    pub fn set_projection(&mut self, projection: Mat4) {
        self.effect.projection = projection;
    }

    pub fn lighting(&self) -> &Lighting {
        &self.effect.lighting
    }

    /// Draw every mesh record with `world` applied on top of its baked node
    /// transform.
    pub fn draw(&mut self, world: Mat4) -> RenderResult<()> {
        if self.disposed {
            return Err(RenderError::Disposed);
        }

        for record in &self.meshes {
            let texture = self.textures.resolve(record.texture);
            let effect = EffectState {
                world: world * record.transform,
                texture_enabled: texture.is_some(),
                ..self.effect
            };
            self.context.apply_effect(&effect, texture);

            match &record.indices {
                Some(indices) => self.context.draw_user_indexed_primitives(
                    PrimitiveTopology::TriangleList,
                    &record.vertices,
                    indices,
                    indices.len() / 3,
                ),
                None => self.context.draw_user_primitives(
                    PrimitiveTopology::TriangleList,
                    &record.vertices,
                    record.vertices.len() / 3,
                ),
            }
        }
        Ok(())
    }

    /// Release every texture and the effect state. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        for (_, texture) in self.textures.drain() {
            self.context.destroy_texture(texture);
        }
        self.meshes.clear();
        self.context.release_effect();
        self.disposed = true;
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn meshes(&self) -> &[MeshRecord] {
        &self.meshes
    }

    pub fn texture_count(&self) -> usize {
        self.textures.len()
    }

    pub fn context(&self) -> &C {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut C {
        &mut self.context
    }
}

impl<C: RenderContext> Drop for SceneRenderer<C> {
    fn drop(&mut self) {
        self.dispose();
    }
}
