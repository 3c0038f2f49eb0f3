//! Headless backend that records every call instead of touching a GPU.

use std::collections::BTreeSet;

use asset::{MeshVertex, TextureData};

use crate::{
    RenderError, RenderResult,
    context::{EffectState, PrimitiveTopology, RenderContext},
};

/// Texture "uploaded" to a [`RecordingContext`]; keeps the pixels it was
/// created from.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordedTexture {
    pub id: u64,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    CreateTexture {
        id: u64,
    },
    DestroyTexture {
        id: u64,
    },
    ApplyEffect {
        effect: EffectState,
        texture: Option<u64>,
    },
    Draw {
        topology: PrimitiveTopology,
        vertices: Vec<MeshVertex>,
        primitive_count: usize,
    },
    DrawIndexed {
        topology: PrimitiveTopology,
        vertices: Vec<MeshVertex>,
        indices: Vec<u32>,
        primitive_count: usize,
    },
    ReleaseEffect,
}

#[derive(Debug, Default)]
pub struct RecordingContext {
    commands: Vec<Command>,
    next_texture: u64,
    live_textures: BTreeSet<u64>,
    reject_textures: bool,
}

impl RecordingContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// A context whose texture uploads always fail.
    pub fn rejecting_textures() -> Self {
        Self {
            reject_textures: true,
            ..Self::default()
        }
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn take_commands(&mut self) -> Vec<Command> {
        std::mem::take(&mut self.commands)
    }

    /// Ids of textures created and not yet destroyed.
    pub fn live_textures(&self) -> impl Iterator<Item = u64> + '_ {
        self.live_textures.iter().copied()
    }

    /// Draw commands only, in submission order.
    pub fn draws(&self) -> impl Iterator<Item = &Command> {
        self.commands
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. } | Command::DrawIndexed { .. }))
    }

    /// Effects applied, in submission order.
    pub fn effects(&self) -> impl Iterator<Item = (&EffectState, Option<u64>)> {
        self.commands.iter().filter_map(|c| match c {
            Command::ApplyEffect { effect, texture } => Some((effect, *texture)),
            _ => None,
        })
    }
}

impl RenderContext for RecordingContext {
    type Texture = RecordedTexture;

    fn create_texture(&mut self, texture: &TextureData) -> RenderResult<Self::Texture> {
        if self.reject_textures || !texture.is_valid() {
            return Err(RenderError::TextureCreation(format!(
                "cannot upload {}x{} texture",
                texture.width, texture.height
            )));
        }
        self.next_texture += 1;
        let id = self.next_texture;
        self.live_textures.insert(id);
        self.commands.push(Command::CreateTexture { id });
        Ok(RecordedTexture {
            id,
            width: texture.width,
            height: texture.height,
            pixels: texture.data.clone(),
        })
    }

    fn destroy_texture(&mut self, texture: Self::Texture) {
        self.live_textures.remove(&texture.id);
        self.commands.push(Command::DestroyTexture { id: texture.id });
    }

    fn apply_effect(&mut self, effect: &EffectState, texture: Option<&Self::Texture>) {
        self.commands.push(Command::ApplyEffect {
            effect: *effect,
            texture: texture.map(|t| t.id),
        });
    }

    fn draw_user_primitives(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[MeshVertex],
        primitive_count: usize,
    ) {
        self.commands.push(Command::Draw {
            topology,
            vertices: vertices.to_vec(),
            primitive_count,
        });
    }

    fn draw_user_indexed_primitives(
        &mut self,
        topology: PrimitiveTopology,
        vertices: &[MeshVertex],
        indices: &[u32],
        primitive_count: usize,
    ) {
        self.commands.push(Command::DrawIndexed {
            topology,
            vertices: vertices.to_vec(),
            indices: indices.to_vec(),
            primitive_count,
        });
    }

    fn release_effect(&mut self) {
        self.commands.push(Command::ReleaseEffect);
    }

    fn backend_name(&self) -> &'static str {
        "Recording"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_and_destroy_track_live_textures() {
        let mut ctx = RecordingContext::new();
        let data = TextureData::from_rgba8(1, 1, vec![1, 2, 3, 4]).unwrap();
        let a = ctx.create_texture(&data).unwrap();
        let b = ctx.create_texture(&data).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.pixels, vec![1, 2, 3, 4]);

        ctx.destroy_texture(a);
        assert_eq!(ctx.live_textures().collect::<Vec<_>>(), vec![b.id]);
    }

    #[test]
    fn rejecting_context_fails_uploads() {
        let mut ctx = RecordingContext::rejecting_textures();
        let data = TextureData::from_rgba8(1, 1, vec![0; 4]).unwrap();
        assert!(matches!(
            ctx.create_texture(&data),
            Err(RenderError::TextureCreation(_))
        ));
        assert!(ctx.commands().is_empty());
    }
}
