// r_surf.rs — world face tessellation and lightmap atlas placement

use std::cell::OnceCell;
use std::path::Path;

use log::{info, warn};
use oxy_common::bspfile::{read_u32_le, NO_OFFSET};
use oxy_common::cmodel::BspData;
use oxy_common::q_shared::{dot_product, Vec3};

use crate::gfx_types::TextureRef;

/// Light style value marking an unused slot.
pub const STYLE_NONE: u8 = 255;

// ============================================================
// Lightmap atlas
// ============================================================

/// Texel rectangle of one face inside the atlas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LightmapRect {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Packed per-face lightmap placements plus the atlas texture they index.
#[derive(Debug, Clone)]
pub struct LightmapAtlas {
    pub sample_size: u32,
    pub block_width: u32,
    pub block_height: u32,
    pub rects: Vec<LightmapRect>,
    pub texture: TextureRef,
}

impl LightmapAtlas {
    /// Parse a rects file: four u32 header words (sample size, block
    /// width, block height, count) then `count` x {x, y, w, h}.
    pub fn parse(data: &[u8], texture: TextureRef) -> Option<Self> {
        if data.len() < 16 {
            warn!("lightmap rects: header truncated ({} bytes)", data.len());
            return None;
        }
        let sample_size = read_u32_le(data, 0);
        let block_width = read_u32_le(data, 4);
        let block_height = read_u32_le(data, 8);
        let count = read_u32_le(data, 12) as usize;

        let needed = count.checked_mul(16).and_then(|n| n.checked_add(16));
        if !needed.is_some_and(|n| data.len() >= n) {
            warn!("lightmap rects: {} rects declared, file has {} bytes", count, data.len());
            return None;
        }

        let rects = (0..count)
            .map(|i| {
                let o = 16 + i * 16;
                LightmapRect {
                    x: read_u32_le(data, o),
                    y: read_u32_le(data, o + 4),
                    w: read_u32_le(data, o + 8),
                    h: read_u32_le(data, o + 12),
                }
            })
            .collect();

        Some(Self {
            sample_size,
            block_width,
            block_height,
            rects,
            texture,
        })
    }

    pub fn load_file(path: &Path, texture: TextureRef) -> Option<Self> {
        match std::fs::read(path) {
            Ok(data) => {
                let atlas = Self::parse(&data, texture)?;
                info!("lightmap: {} rects from {}", atlas.rects.len(), path.display());
                Some(atlas)
            }
            Err(e) => {
                warn!("lightmap rects {}: {}", path.display(), e);
                None
            }
        }
    }

    pub fn rect(&self, face: usize) -> Option<&LightmapRect> {
        self.rects.get(face)
    }

    /// Map a raw texture-space coordinate inside `[min, max]` into the
    /// face rectangle, inset by one texel, normalized to the atlas.
    fn remap(&self, rect: &LightmapRect, raw: [f32; 2], min: [f32; 2], max: [f32; 2]) -> [f32; 2] {
        let size = [self.texture.width.max(1) as f32, self.texture.height.max(1) as f32];
        let origin = [rect.x as f32, rect.y as f32];
        let extent = [rect.w as f32, rect.h as f32];

        let mut out = [0.0f32; 2];
        for k in 0..2 {
            let span = max[k] - min[k];
            let t = if span > 0.0 { (raw[k] - min[k]) / span } else { 0.5 };
            let lo = origin[k] + 1.0;
            let hi = origin[k] + extent[k] - 1.0;
            out[k] = (lo + t * (hi - lo)) / size[k];
        }
        out
    }
}

// ============================================================
// Tessellation
// ============================================================

/// One fan triangle of a world face in model space.
#[derive(Debug, Clone, PartialEq)]
pub struct WorldTri {
    pub verts: [Vec3; 3],
    pub uv: [[f32; 2]; 3],
    /// Present when the face is lit from the atlas.
    pub lightmap_uv: Option<[[f32; 2]; 3]>,
    pub miptex: usize,
}

/// Lazily built, never invalidated triangle lists for every face.
pub struct FaceTessellator {
    cache: Vec<OnceCell<Vec<WorldTri>>>,
}

impl FaceTessellator {
    pub fn new(bsp: &BspData) -> Self {
        Self {
            cache: (0..bsp.faces.len()).map(|_| OnceCell::new()).collect(),
        }
    }

    pub fn face_count(&self) -> usize {
        self.cache.len()
    }

    /// Does `face` get a lightmap pass?
    pub fn is_lit(bsp: &BspData, face: usize, lightmap: Option<&LightmapAtlas>) -> bool {
        let f = &bsp.faces[face];
        lightmap.is_some_and(|lm| lm.rect(face).is_some())
            && f.light_offset != NO_OFFSET
            && f.styles[0] != STYLE_NONE
    }

    pub fn face_tris(&self, bsp: &BspData, face: usize, lightmap: Option<&LightmapAtlas>) -> &[WorldTri] {
        self.cache[face].get_or_init(|| tessellate_face(bsp, face, lightmap))
    }
}

fn tessellate_face(bsp: &BspData, face_index: usize, lightmap: Option<&LightmapAtlas>) -> Vec<WorldTri> {
    let face = &bsp.faces[face_index];
    let tex = &bsp.texinfo[face.texinfo_idx as usize];
    let miptex = tex.miptex_idx.max(0) as usize;
    let (w, h) = bsp
        .miptex
        .get(miptex)
        .map_or((1, 1), |m| (m.width.max(1), m.height.max(1)));

    let verts = bsp.face_vertices(face);
    if verts.len() < 3 {
        return Vec::new();
    }

    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    let raw: Vec<[f32; 2]> = verts
        .iter()
        .map(|v| {
            let mut st = [0.0f32; 2];
            for k in 0..2 {
                let axis = &tex.vecs[k];
                st[k] = dot_product(&[axis[0], axis[1], axis[2]], v) + axis[3];
                min[k] = min[k].min(st[k]);
                max[k] = max[k].max(st[k]);
            }
            st
        })
        .collect();

    let lit = if FaceTessellator::is_lit(bsp, face_index, lightmap) {
        lightmap.and_then(|lm| lm.rect(face_index).map(|r| (lm, *r)))
    } else {
        None
    };

    let tex_uv = |st: [f32; 2]| [st[0] / w as f32, st[1] / h as f32];

    (1..verts.len() - 1)
        .map(|i| {
            let idx = [0, i, i + 1];
            WorldTri {
                verts: idx.map(|j| verts[j]),
                uv: idx.map(|j| tex_uv(raw[j])),
                lightmap_uv: lit.map(|(lm, rect)| idx.map(|j| lm.remap(&rect, raw[j], min, max))),
                miptex,
            }
        })
        .collect()
}
