// gfx_types.rs — triangle, vertex and quad types shared by the render pipeline

use std::sync::Arc;

use bytemuck::{Pod, Zeroable};
use oxy_common::q_shared::Vec4;

// ============================================================
// Textures
// ============================================================

/// Opaque handle understood by the quad sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TextureHandle(pub u64);

impl TextureHandle {
    /// Reserved for the missing-texture fallback.
    pub const ERROR: TextureHandle = TextureHandle(0);
    /// Reserved for the solid white texture used by flat overlays.
    pub const WHITE: TextureHandle = TextureHandle(1);
    /// First handle a loader may hand out.
    pub const FIRST_DYNAMIC: u64 = 16;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GfxTexture {
    pub path: String,
    pub width: u32,
    pub height: u32,
    pub handle: TextureHandle,
}

pub type TextureRef = Arc<GfxTexture>;

// ============================================================
// Triangles
// ============================================================

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct GfxVertex {
    /// Clip space until the pipeline divides by `w`.
    pub position: Vec4,
    pub uv: [f32; 2],
}

impl GfxVertex {
    pub fn new(position: Vec4, uv: [f32; 2]) -> Self {
        Self { position, uv }
    }

    pub fn lerp(&self, other: &GfxVertex, t: f32) -> GfxVertex {
        let mut position = [0.0f32; 4];
        for (i, p) in position.iter_mut().enumerate() {
            *p = self.position[i] + t * (other.position[i] - self.position[i]);
        }
        GfxVertex {
            position,
            uv: [
                self.uv[0] + t * (other.uv[0] - self.uv[0]),
                self.uv[1] + t * (other.uv[1] - self.uv[1]),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CullType {
    #[default]
    None,
    Backface,
    Frontface,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RenderStrategy {
    /// Drawn as given after everything else, in submission order.
    DirectToGpu,
    /// Clipped and drawn in submission order; the caller sorts back to front.
    PreSorted,
    /// Drawn right after the PreSorted triangle it pairs with.
    PreSortedOverlay,
    /// Depth tested in the software z-buffer and drawn as spans.
    SoftwareDepthRasterize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GfxTri {
    pub verts: [GfxVertex; 3],
    pub colour: [f32; 3],
    /// `None` draws with the error texture.
    pub texture: Option<TextureRef>,
    pub cull: CullType,
}

impl Default for GfxTri {
    fn default() -> Self {
        Self {
            verts: [GfxVertex::default(); 3],
            colour: [1.0, 1.0, 1.0],
            texture: None,
            cull: CullType::None,
        }
    }
}

impl GfxTri {
    pub fn with_verts(&self, verts: [GfxVertex; 3]) -> GfxTri {
        GfxTri {
            verts,
            colour: self.colour,
            texture: self.texture.clone(),
            cull: self.cull,
        }
    }
}

// ============================================================
// Quad output
// ============================================================

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default, Pod, Zeroable)]
pub struct QuadVertex {
    /// Normalized device coordinates.
    pub position: [f32; 2],
    pub uv: [f32; 2],
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TexturedQuad {
    pub verts: [QuadVertex; 4],
    pub colour: [f32; 3],
    pub texture: TextureHandle,
}

impl TexturedQuad {
    /// Vertex data laid out for a GPU vertex buffer upload.
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.verts)
    }
}

/// The 2D draw primitive everything ends up as.
pub trait QuadSink {
    fn draw_textured_quad(&mut self, quad: &TexturedQuad);
}

/// Recording sink.
impl QuadSink for Vec<TexturedQuad> {
    fn draw_textured_quad(&mut self, quad: &TexturedQuad) {
        self.push(*quad);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_lerp_midpoint() {
        let a = GfxVertex::new([0.0, 0.0, 0.0, 1.0], [0.0, 0.0]);
        let b = GfxVertex::new([2.0, 4.0, -2.0, 3.0], [1.0, 0.5]);
        let m = a.lerp(&b, 0.5);
        assert_eq!(m.position, [1.0, 2.0, -1.0, 2.0]);
        assert_eq!(m.uv, [0.5, 0.25]);
    }

    #[test]
    fn test_quad_vertex_bytes_layout() {
        let quad = TexturedQuad {
            verts: [QuadVertex {
                position: [1.0, 2.0],
                uv: [3.0, 4.0],
            }; 4],
            colour: [1.0; 3],
            texture: TextureHandle::WHITE,
        };
        let bytes = quad.vertex_bytes();
        assert_eq!(bytes.len(), 4 * 16);
        assert_eq!(&bytes[0..4], &1.0f32.to_ne_bytes());
        assert_eq!(&bytes[12..16], &4.0f32.to_ne_bytes());
    }

    #[test]
    fn test_with_verts_keeps_material() {
        let tri = GfxTri {
            colour: [0.5, 0.25, 1.0],
            cull: CullType::Backface,
            ..Default::default()
        };
        let other = tri.with_verts([GfxVertex::new([1.0, 0.0, 0.0, 1.0], [0.0, 0.0]); 3]);
        assert_eq!(other.colour, tri.colour);
        assert_eq!(other.cull, CullType::Backface);
        assert_eq!(other.verts[0].position[0], 1.0);
    }
}
