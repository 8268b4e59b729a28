// bspfile.rs — on-disk BSP layout: lump table, record sizes and record decoders

use crate::q_shared::{CPlane, Vec3};

// ============================================================
// BSP file format
// ============================================================

pub const BSPVERSION_Q1: i32 = 29;
pub const BSPVERSION: i32 = 30;

// Upper design bounds
pub const MAX_MAP_HULLS: usize = 4;
pub const MAX_MAP_MODELS: usize = 400;
pub const MAX_MAP_PLANES: usize = 32767;
pub const MAX_MAP_NODES: usize = 32767;
pub const MAX_MAP_CLIPNODES: usize = 32767;
pub const MAX_MAP_LEAFS: usize = 8192;
pub const MAX_MAP_VERTS: usize = 65535;
pub const MAX_MAP_FACES: usize = 65535;
pub const MAX_MAP_MARKSURFACES: usize = 65535;
pub const MAX_MAP_TEXINFO: usize = 8192;
pub const MAX_MAP_EDGES: usize = 256000;
pub const MAX_MAP_SURFEDGES: usize = 512000;
pub const MAX_MAP_TEXTURES: usize = 512;
pub const MAX_MAP_ENTSTRING: usize = 128 * 1024;

/// Deepest render or clip tree accepted at load time.
pub const MAX_TREE_DEPTH: usize = 256;

// Lump indices
pub const LUMP_ENTITIES: usize = 0;
pub const LUMP_PLANES: usize = 1;
pub const LUMP_TEXTURES: usize = 2;
pub const LUMP_VERTEXES: usize = 3;
pub const LUMP_VISIBILITY: usize = 4;
pub const LUMP_NODES: usize = 5;
pub const LUMP_TEXINFO: usize = 6;
pub const LUMP_FACES: usize = 7;
pub const LUMP_LIGHTING: usize = 8;
pub const LUMP_CLIPNODES: usize = 9;
pub const LUMP_LEAFS: usize = 10;
pub const LUMP_MARKSURFACES: usize = 11;
pub const LUMP_EDGES: usize = 12;
pub const LUMP_SURFEDGES: usize = 13;
pub const LUMP_MODELS: usize = 14;
pub const HEADER_LUMPS: usize = 15;

pub const LUMP_NAMES: [&str; HEADER_LUMPS] = [
    "entities",
    "planes",
    "textures",
    "vertexes",
    "visibility",
    "nodes",
    "texinfo",
    "faces",
    "lighting",
    "clipnodes",
    "leafs",
    "marksurfaces",
    "edges",
    "surfedges",
    "models",
];

/// version + 15 * (offset, length)
pub const HEADER_SIZE: usize = 4 + HEADER_LUMPS * 8;

// Record sizes
pub const PLANE_SIZE: usize = 20;
pub const VERTEX_SIZE: usize = 12;
pub const NODE_SIZE: usize = 24;
pub const TEXINFO_SIZE: usize = 40;
pub const FACE_SIZE: usize = 20;
pub const CLIPNODE_SIZE: usize = 8;
pub const LEAF_SIZE: usize = 28;
pub const MARKSURFACE_SIZE: usize = 2;
pub const EDGE_SIZE: usize = 4;
pub const SURFEDGE_SIZE: usize = 4;
pub const MODEL_SIZE: usize = 64;
pub const MIPTEX_SIZE: usize = 40;

pub const MIPTEX_NAME_LEN: usize = 16;
pub const MAX_LIGHTMAPS: usize = 4;
pub const NUM_AMBIENTS: usize = 4;

/// Sentinel for "no vis data" / "no lightmap".
pub const NO_OFFSET: i32 = -1;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Lump {
    pub fileofs: u32,
    pub filelen: u32,
}

// ============================================================
// Byte helpers
// ============================================================

#[inline]
pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[inline]
pub fn read_i32_le(data: &[u8], offset: usize) -> i32 {
    i32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

#[inline]
pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub fn read_i16_le(data: &[u8], offset: usize) -> i16 {
    i16::from_le_bytes([data[offset], data[offset + 1]])
}

#[inline]
pub fn read_f32_le(data: &[u8], offset: usize) -> f32 {
    f32::from_le_bytes([data[offset], data[offset + 1], data[offset + 2], data[offset + 3]])
}

fn read_vec3(data: &[u8], offset: usize) -> Vec3 {
    [
        read_f32_le(data, offset),
        read_f32_le(data, offset + 4),
        read_f32_le(data, offset + 8),
    ]
}

fn read_short3(data: &[u8], offset: usize) -> [i16; 3] {
    [
        read_i16_le(data, offset),
        read_i16_le(data, offset + 2),
        read_i16_le(data, offset + 4),
    ]
}

// ============================================================
// Records
// ============================================================

// Every decoder takes a slice exactly one record long.

pub fn decode_plane(b: &[u8]) -> CPlane {
    CPlane {
        normal: read_vec3(b, 0),
        dist: read_f32_le(b, 12),
        plane_type: read_u32_le(b, 16),
    }
}

pub fn decode_vertex(b: &[u8]) -> Vec3 {
    read_vec3(b, 0)
}

/// Render-tree node. Children >= 0 index nodes, < 0 encode leaf `-child - 1`.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BspNode {
    pub plane_idx: u32,
    pub children: [i16; 2],
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_face: u16,
    pub face_count: u16,
}

impl BspNode {
    pub fn decode(b: &[u8]) -> Self {
        Self {
            plane_idx: read_u32_le(b, 0),
            children: [read_i16_le(b, 4), read_i16_le(b, 6)],
            mins: read_short3(b, 8),
            maxs: read_short3(b, 14),
            first_face: read_u16_le(b, 20),
            face_count: read_u16_le(b, 22),
        }
    }
}

/// Collision-tree node. Negative children are content codes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClipNode {
    pub plane_idx: u32,
    pub children: [i16; 2],
}

impl ClipNode {
    pub fn decode(b: &[u8]) -> Self {
        Self {
            plane_idx: read_u32_le(b, 0),
            children: [read_i16_le(b, 4), read_i16_le(b, 6)],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BspLeaf {
    pub contents: i32,
    /// Byte offset into the visibility lump, or `NO_OFFSET`.
    pub vis_offset: i32,
    pub mins: [i16; 3],
    pub maxs: [i16; 3],
    pub first_mark_surface: u16,
    pub mark_surface_count: u16,
    pub ambient_level: [u8; NUM_AMBIENTS],
}

impl BspLeaf {
    pub fn decode(b: &[u8]) -> Self {
        Self {
            contents: read_i32_le(b, 0),
            vis_offset: read_i32_le(b, 4),
            mins: read_short3(b, 8),
            maxs: read_short3(b, 14),
            first_mark_surface: read_u16_le(b, 20),
            mark_surface_count: read_u16_le(b, 22),
            ambient_level: [b[24], b[25], b[26], b[27]],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TexInfo {
    /// `[s, t]` axis vectors with offset in `w`.
    pub vecs: [[f32; 4]; 2],
    pub miptex_idx: i32,
    pub flags: i32,
}

impl TexInfo {
    pub fn decode(b: &[u8]) -> Self {
        let mut vecs = [[0.0f32; 4]; 2];
        for (i, axis) in vecs.iter_mut().enumerate() {
            for (j, v) in axis.iter_mut().enumerate() {
                *v = read_f32_le(b, (i * 4 + j) * 4);
            }
        }
        Self {
            vecs,
            miptex_idx: read_i32_le(b, 32),
            flags: read_i32_le(b, 36),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BspFace {
    pub plane_idx: u16,
    pub side: u16,
    pub first_edge: u32,
    pub edge_count: u16,
    pub texinfo_idx: u16,
    pub styles: [u8; MAX_LIGHTMAPS],
    /// Offset into the lighting lump, or `NO_OFFSET`.
    pub light_offset: i32,
}

impl BspFace {
    pub fn decode(b: &[u8]) -> Self {
        Self {
            plane_idx: read_u16_le(b, 0),
            side: read_u16_le(b, 2),
            first_edge: read_u32_le(b, 4),
            edge_count: read_u16_le(b, 8),
            texinfo_idx: read_u16_le(b, 10),
            styles: [b[12], b[13], b[14], b[15]],
            light_offset: read_i32_le(b, 16),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BspEdge {
    pub v: [u16; 2],
}

impl BspEdge {
    pub fn decode(b: &[u8]) -> Self {
        Self {
            v: [read_u16_le(b, 0), read_u16_le(b, 2)],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BspModel {
    pub mins: Vec3,
    pub maxs: Vec3,
    pub origin: Vec3,
    /// Slot 0 is the render tree, 1.. the clip hulls.
    pub head_nodes: [i32; MAX_MAP_HULLS],
    pub vis_leafs: u32,
    pub first_face: u32,
    pub face_count: u32,
}

impl BspModel {
    pub fn decode(b: &[u8]) -> Self {
        Self {
            mins: read_vec3(b, 0),
            maxs: read_vec3(b, 12),
            origin: read_vec3(b, 24),
            head_nodes: [
                read_i32_le(b, 36),
                read_i32_le(b, 40),
                read_i32_le(b, 44),
                read_i32_le(b, 48),
            ],
            vis_leafs: read_u32_le(b, 52),
            first_face: read_u32_le(b, 56),
            face_count: read_u32_le(b, 60),
        }
    }

    /// Decompressed PVS row length for this model.
    pub fn vis_row_bytes(&self) -> usize {
        (self.vis_leafs as usize + 7) >> 3
    }
}

/// Texture header from the textures lump. Pixel data is not kept; the
/// renderer loads images by name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MipTex {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl MipTex {
    pub fn decode(b: &[u8]) -> Self {
        let raw = &b[..MIPTEX_NAME_LEN];
        let len = raw.iter().position(|&c| c == 0).unwrap_or(MIPTEX_NAME_LEN);
        Self {
            name: String::from_utf8_lossy(&raw[..len]).into_owned(),
            width: read_u32_le(b, 16),
            height: read_u32_le(b, 20),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(HEADER_SIZE, 124);
        assert_eq!(LUMP_NAMES.len(), HEADER_LUMPS);
    }

    #[test]
    fn test_decode_node() {
        let mut b = vec![0u8; NODE_SIZE];
        b[0..4].copy_from_slice(&7u32.to_le_bytes());
        b[4..6].copy_from_slice(&3i16.to_le_bytes());
        b[6..8].copy_from_slice(&(-2i16).to_le_bytes());
        b[20..22].copy_from_slice(&5u16.to_le_bytes());
        b[22..24].copy_from_slice(&2u16.to_le_bytes());
        let n = BspNode::decode(&b);
        assert_eq!(n.plane_idx, 7);
        assert_eq!(n.children, [3, -2]);
        assert_eq!(n.first_face, 5);
        assert_eq!(n.face_count, 2);
    }

    #[test]
    fn test_decode_miptex_name_stops_at_nul() {
        let mut b = vec![0u8; MIPTEX_SIZE];
        b[..5].copy_from_slice(b"brick");
        b[16..20].copy_from_slice(&64u32.to_le_bytes());
        b[20..24].copy_from_slice(&32u32.to_le_bytes());
        let m = MipTex::decode(&b);
        assert_eq!(m.name, "brick");
        assert_eq!((m.width, m.height), (64, 32));
    }

    #[test]
    fn test_vis_row_bytes_rounds_up() {
        let m = BspModel {
            vis_leafs: 9,
            ..Default::default()
        };
        assert_eq!(m.vis_row_bytes(), 2);
    }

    #[test]
    fn test_decode_face_no_lightmap() {
        let mut b = vec![0u8; FACE_SIZE];
        b[16..20].copy_from_slice(&(-1i32).to_le_bytes());
        b[12] = 255;
        let f = BspFace::decode(&b);
        assert_eq!(f.light_offset, NO_OFFSET);
        assert_eq!(f.styles[0], 255);
    }
}
