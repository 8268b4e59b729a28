// cmodel.rs — BSP geometry store: loading, validation and derived tree data

use std::collections::HashMap;
use std::path::Path;

use log::{info, warn};
use rayon::prelude::*;

use crate::bspfile::*;
use crate::error::{BspError, BspResult};
use crate::q_shared::{com_parse, is_valid_contents, parse_vec3, CPlane, Vec3};

// ============================================================
// Entity dictionaries
// ============================================================

/// One `{ "key" "value" ... }` block from the entity lump.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDict {
    pub pairs: HashMap<String, String>,
}

impl EntityDict {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.get(key).map(String::as_str)
    }

    pub fn classname(&self) -> &str {
        self.get("classname").unwrap_or("")
    }

    pub fn vec3(&self, key: &str) -> Option<Vec3> {
        self.get(key).and_then(parse_vec3)
    }

    pub fn float(&self, key: &str) -> Option<f32> {
        self.get(key).and_then(|v| v.trim().parse().ok())
    }
}

/// Parse the entity lump text. A malformed tail is dropped with a warning.
pub fn parse_entity_string(text: &str) -> Vec<EntityDict> {
    let mut out = Vec::new();
    let mut rest = text;

    while let Some((token, after)) = com_parse(rest) {
        rest = after;
        if token != "{" {
            warn!("entity string: expected '{{', found {:?}", token);
            break;
        }

        let mut dict = EntityDict::default();
        loop {
            let Some((key, after)) = com_parse(rest) else {
                warn!("entity string: EOF without closing brace");
                return out;
            };
            rest = after;
            if key == "}" {
                break;
            }
            let Some((value, after)) = com_parse(rest) else {
                warn!("entity string: EOF after key {:?}", key);
                return out;
            };
            rest = after;
            if value == "}" {
                warn!("entity string: closing brace without data");
                break;
            }
            dict.pairs.insert(key, value);
        }
        out.push(dict);
    }
    out
}

// ============================================================
// Geometry store
// ============================================================

/// Immutable level geometry plus the parent links derived from it.
#[derive(Debug, Clone, Default)]
pub struct BspData {
    pub version: i32,
    pub planes: Vec<CPlane>,
    pub vertices: Vec<Vec3>,
    pub nodes: Vec<BspNode>,
    pub clip_nodes: Vec<ClipNode>,
    pub leaves: Vec<BspLeaf>,
    pub faces: Vec<BspFace>,
    pub edges: Vec<BspEdge>,
    pub surf_edges: Vec<i32>,
    pub mark_surfaces: Vec<u16>,
    pub texinfo: Vec<TexInfo>,
    pub miptex: Vec<MipTex>,
    pub models: Vec<BspModel>,
    pub visibility: Vec<u8>,
    pub lighting: Vec<u8>,
    pub entity_string: String,

    /// Parent node of every render node, -1 for roots.
    pub node_parents: Vec<i32>,
    /// Parent node of every leaf, -1 if unreachable.
    pub leaf_parents: Vec<i32>,
}

/// Parallel threshold for lump parsing - below this count, sequential is faster
const PARALLEL_LUMP_THRESHOLD: usize = 64;

fn lump_slice<'a>(data: &'a [u8], lumps: &[Lump; HEADER_LUMPS], idx: usize) -> BspResult<&'a [u8]> {
    let lump = lumps[idx];
    let offset = lump.fileofs as usize;
    let length = lump.filelen as usize;
    match offset.checked_add(length) {
        Some(end) if end <= data.len() => Ok(&data[offset..end]),
        _ => Err(BspError::LumpOutOfBounds {
            lump: LUMP_NAMES[idx],
            offset,
            length,
            file_len: data.len(),
        }),
    }
}

fn load_records<T, F>(
    data: &[u8],
    lumps: &[Lump; HEADER_LUMPS],
    idx: usize,
    record: usize,
    limit: usize,
    decode: F,
) -> BspResult<Vec<T>>
where
    T: Send,
    F: Fn(&[u8]) -> T + Sync + Send,
{
    let bytes = lump_slice(data, lumps, idx)?;
    let name = LUMP_NAMES[idx];
    if bytes.is_empty() {
        return Err(BspError::MissingLump(name));
    }
    if bytes.len() % record != 0 {
        return Err(BspError::BadLumpSize {
            lump: name,
            length: bytes.len(),
            record,
        });
    }
    let count = bytes.len() / record;
    if count > limit {
        return Err(BspError::TooMany {
            lump: name,
            count,
            limit,
        });
    }

    // Use parallel parsing for large lumps
    let records = if count >= PARALLEL_LUMP_THRESHOLD {
        bytes.par_chunks_exact(record).map(&decode).collect()
    } else {
        bytes.chunks_exact(record).map(&decode).collect()
    };
    Ok(records)
}

fn check_index(what: &'static str, index: usize, value: i64, count: usize) -> BspResult<()> {
    if value < 0 || value as u64 >= count as u64 {
        return Err(BspError::BadIndex {
            what,
            index,
            value,
            count,
        });
    }
    Ok(())
}

fn check_range(what: &'static str, index: usize, first: u64, len: u64, count: usize) -> BspResult<()> {
    if first + len > count as u64 {
        return Err(BspError::BadIndex {
            what,
            index,
            value: (first + len) as i64,
            count,
        });
    }
    Ok(())
}

/// Walk a tree from `head` with an explicit stack. Fails when a node is
/// reached twice (cycle or shared subtree) or the depth exceeds the limit.
fn check_tree<F>(what: &'static str, node_count: usize, head: usize, children: F) -> BspResult<()>
where
    F: Fn(usize) -> [i32; 2],
{
    let mut visited = vec![false; node_count];
    let mut stack = vec![(head, 1usize)];
    while let Some((node, depth)) = stack.pop() {
        if depth > MAX_TREE_DEPTH || visited[node] {
            return Err(BspError::TreeTooDeep {
                what,
                head,
                max: MAX_TREE_DEPTH,
            });
        }
        visited[node] = true;
        for child in children(node) {
            if child >= 0 {
                stack.push((child as usize, depth + 1));
            }
        }
    }
    Ok(())
}

impl BspData {
    /// Parse and validate a complete BSP image. Any inconsistency rejects
    /// the whole buffer.
    pub fn load(data: &[u8]) -> BspResult<Self> {
        if data.len() < HEADER_SIZE {
            return Err(BspError::TooShort {
                len: data.len(),
                needed: HEADER_SIZE,
            });
        }
        let version = read_i32_le(data, 0);
        if version != BSPVERSION && version != BSPVERSION_Q1 {
            return Err(BspError::BadVersion(version));
        }

        let mut lumps = [Lump::default(); HEADER_LUMPS];
        for (i, lump) in lumps.iter_mut().enumerate() {
            lump.fileofs = read_u32_le(data, 4 + i * 8);
            lump.filelen = read_u32_le(data, 8 + i * 8);
        }

        let mut bsp = BspData {
            version,
            planes: load_records(data, &lumps, LUMP_PLANES, PLANE_SIZE, MAX_MAP_PLANES, decode_plane)?,
            vertices: load_records(data, &lumps, LUMP_VERTEXES, VERTEX_SIZE, MAX_MAP_VERTS, decode_vertex)?,
            nodes: load_records(data, &lumps, LUMP_NODES, NODE_SIZE, MAX_MAP_NODES, BspNode::decode)?,
            clip_nodes: load_records(data, &lumps, LUMP_CLIPNODES, CLIPNODE_SIZE, MAX_MAP_CLIPNODES, ClipNode::decode)?,
            leaves: load_records(data, &lumps, LUMP_LEAFS, LEAF_SIZE, MAX_MAP_LEAFS, BspLeaf::decode)?,
            faces: load_records(data, &lumps, LUMP_FACES, FACE_SIZE, MAX_MAP_FACES, BspFace::decode)?,
            edges: load_records(data, &lumps, LUMP_EDGES, EDGE_SIZE, MAX_MAP_EDGES, BspEdge::decode)?,
            surf_edges: load_records(data, &lumps, LUMP_SURFEDGES, SURFEDGE_SIZE, MAX_MAP_SURFEDGES, |b| {
                read_i32_le(b, 0)
            })?,
            mark_surfaces: load_records(data, &lumps, LUMP_MARKSURFACES, MARKSURFACE_SIZE, MAX_MAP_MARKSURFACES, |b| {
                read_u16_le(b, 0)
            })?,
            texinfo: load_records(data, &lumps, LUMP_TEXINFO, TEXINFO_SIZE, MAX_MAP_TEXINFO, TexInfo::decode)?,
            models: load_records(data, &lumps, LUMP_MODELS, MODEL_SIZE, MAX_MAP_MODELS, BspModel::decode)?,
            miptex: Self::load_textures(lump_slice(data, &lumps, LUMP_TEXTURES)?)?,
            visibility: lump_slice(data, &lumps, LUMP_VISIBILITY)?.to_vec(),
            lighting: lump_slice(data, &lumps, LUMP_LIGHTING)?.to_vec(),
            entity_string: Self::load_entity_string(lump_slice(data, &lumps, LUMP_ENTITIES)?)?,
            node_parents: Vec::new(),
            leaf_parents: Vec::new(),
        };

        bsp.validate()?;
        bsp.build_parents();

        info!(
            "BSP v{}: {} planes, {} nodes, {} clipnodes, {} leafs, {} faces, {} models, {} textures, {} vis bytes",
            version,
            bsp.planes.len(),
            bsp.nodes.len(),
            bsp.clip_nodes.len(),
            bsp.leaves.len(),
            bsp.faces.len(),
            bsp.models.len(),
            bsp.miptex.len(),
            bsp.visibility.len()
        );
        Ok(bsp)
    }

    pub fn load_file(path: &Path) -> BspResult<Self> {
        let data = std::fs::read(path)?;
        info!("loading map {}", path.display());
        Self::load(&data)
    }

    // ============================================================
    // Lump loaders
    // ============================================================

    fn load_textures(bytes: &[u8]) -> BspResult<Vec<MipTex>> {
        let name = LUMP_NAMES[LUMP_TEXTURES];
        if bytes.len() < 4 {
            return Err(BspError::MissingLump(name));
        }
        let count = read_u32_le(bytes, 0) as usize;
        if count > MAX_MAP_TEXTURES {
            return Err(BspError::TooMany {
                lump: name,
                count,
                limit: MAX_MAP_TEXTURES,
            });
        }
        if 4 + count * 4 > bytes.len() {
            return Err(BspError::LumpOutOfBounds {
                lump: name,
                offset: 0,
                length: 4 + count * 4,
                file_len: bytes.len(),
            });
        }

        let mut out = Vec::with_capacity(count);
        for i in 0..count {
            let offset = read_i32_le(bytes, 4 + i * 4);
            // -1 marks a texture stripped from the file
            if offset == NO_OFFSET {
                out.push(MipTex::default());
                continue;
            }
            let start = offset as usize;
            if offset < 0 || start + MIPTEX_SIZE > bytes.len() {
                return Err(BspError::BadIndex {
                    what: "miptex offset",
                    index: i,
                    value: offset as i64,
                    count: bytes.len(),
                });
            }
            out.push(MipTex::decode(&bytes[start..start + MIPTEX_SIZE]));
        }
        Ok(out)
    }

    fn load_entity_string(bytes: &[u8]) -> BspResult<String> {
        if bytes.len() > MAX_MAP_ENTSTRING {
            return Err(BspError::TooMany {
                lump: LUMP_NAMES[LUMP_ENTITIES],
                count: bytes.len(),
                limit: MAX_MAP_ENTSTRING,
            });
        }
        let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
        Ok(String::from_utf8_lossy(&bytes[..end]).into_owned())
    }

    // ============================================================
    // Validation
    // ============================================================

    fn validate(&self) -> BspResult<()> {
        let nplanes = self.planes.len();

        for (i, n) in self.nodes.iter().enumerate() {
            check_index("node plane", i, n.plane_idx as i64, nplanes)?;
            for &c in &n.children {
                if c >= 0 {
                    check_index("node child", i, c as i64, self.nodes.len())?;
                } else {
                    check_index("node leaf", i, -(c as i64) - 1, self.leaves.len())?;
                }
            }
            check_range("node faces", i, n.first_face as u64, n.face_count as u64, self.faces.len())?;
        }

        for (i, n) in self.clip_nodes.iter().enumerate() {
            check_index("clipnode plane", i, n.plane_idx as i64, nplanes)?;
            for &c in &n.children {
                if c >= 0 {
                    check_index("clipnode child", i, c as i64, self.clip_nodes.len())?;
                } else if !is_valid_contents(c as i32) {
                    return Err(BspError::BadContents {
                        what: "clipnode child",
                        index: i,
                        value: c as i32,
                    });
                }
            }
        }

        for (i, leaf) in self.leaves.iter().enumerate() {
            check_range(
                "leaf marksurfaces",
                i,
                leaf.first_mark_surface as u64,
                leaf.mark_surface_count as u64,
                self.mark_surfaces.len(),
            )?;
            if leaf.vis_offset != NO_OFFSET {
                check_index("leaf visofs", i, leaf.vis_offset as i64, self.visibility.len())?;
            }
        }

        for (i, &m) in self.mark_surfaces.iter().enumerate() {
            check_index("marksurface", i, m as i64, self.faces.len())?;
        }

        for (i, f) in self.faces.iter().enumerate() {
            check_index("face plane", i, f.plane_idx as i64, nplanes)?;
            check_index("face texinfo", i, f.texinfo_idx as i64, self.texinfo.len())?;
            check_range("face edges", i, f.first_edge as u64, f.edge_count as u64, self.surf_edges.len())?;
            if f.light_offset != NO_OFFSET && !self.lighting.is_empty() {
                check_index("face lightofs", i, f.light_offset as i64, self.lighting.len())?;
            }
        }

        for (i, &se) in self.surf_edges.iter().enumerate() {
            check_index("surfedge", i, se.unsigned_abs() as i64, self.edges.len())?;
        }

        for (i, e) in self.edges.iter().enumerate() {
            for &v in &e.v {
                check_index("edge vertex", i, v as i64, self.vertices.len())?;
            }
        }

        for (i, t) in self.texinfo.iter().enumerate() {
            check_index("texinfo miptex", i, t.miptex_idx as i64, self.miptex.len())?;
        }

        for (i, m) in self.models.iter().enumerate() {
            check_index("model headnode", i, m.head_nodes[0] as i64, self.nodes.len())?;
            for &h in &m.head_nodes[1..] {
                if h >= 0 {
                    check_index("model clip headnode", i, h as i64, self.clip_nodes.len())?;
                } else if !is_valid_contents(h) {
                    return Err(BspError::BadContents {
                        what: "model clip headnode",
                        index: i,
                        value: h,
                    });
                }
            }
            check_range("model faces", i, m.first_face as u64, m.face_count as u64, self.faces.len())?;

            check_tree("render", self.nodes.len(), m.head_nodes[0] as usize, |n| {
                let c = self.nodes[n].children;
                [c[0] as i32, c[1] as i32]
            })?;
            for &h in &m.head_nodes[1..] {
                if h >= 0 {
                    check_tree("clip", self.clip_nodes.len(), h as usize, |n| {
                        let c = self.clip_nodes[n].children;
                        [c[0] as i32, c[1] as i32]
                    })?;
                }
            }
        }
        Ok(())
    }

    fn build_parents(&mut self) {
        let mut node_parents = vec![-1i32; self.nodes.len()];
        let mut leaf_parents = vec![-1i32; self.leaves.len()];

        for model in &self.models {
            let mut stack = vec![model.head_nodes[0] as usize];
            while let Some(node) = stack.pop() {
                for &child in &self.nodes[node].children {
                    if child >= 0 {
                        node_parents[child as usize] = node as i32;
                        stack.push(child as usize);
                    } else {
                        leaf_parents[(-(child as i32) - 1) as usize] = node as i32;
                    }
                }
            }
        }

        self.node_parents = node_parents;
        self.leaf_parents = leaf_parents;
    }

    // ============================================================
    // Queries
    // ============================================================

    pub fn entities(&self) -> Vec<EntityDict> {
        parse_entity_string(&self.entity_string)
    }

    pub fn world_model(&self) -> &BspModel {
        &self.models[0]
    }

    pub fn plane(&self, idx: u32) -> &CPlane {
        &self.planes[idx as usize]
    }

    /// Vertex positions of a face in winding order.
    pub fn face_vertices(&self, face: &BspFace) -> Vec<Vec3> {
        let first = face.first_edge as usize;
        self.surf_edges[first..first + face.edge_count as usize]
            .iter()
            .map(|&se| {
                let edge = &self.edges[se.unsigned_abs() as usize];
                let v = if se < 0 { edge.v[1] } else { edge.v[0] };
                self.vertices[v as usize]
            })
            .collect()
    }

    /// Faces referenced by a leaf through the mark-surface list.
    pub fn leaf_faces(&self, leaf: &BspLeaf) -> impl Iterator<Item = usize> + '_ {
        let first = leaf.first_mark_surface as usize;
        self.mark_surfaces[first..first + leaf.mark_surface_count as usize]
            .iter()
            .map(|&m| m as usize)
    }
}

// ============================================================
// Test fixture
// ============================================================

/// In-memory BSP image writer for tests across the workspace. Other
/// crates reach it through the `test-fixture` feature.
#[cfg(any(test, feature = "test-fixture"))]
pub mod test_fixture {
    use super::*;

    #[derive(Default)]
    pub struct BspBuilder {
        pub version: i32,
        pub entities: String,
        pub planes: Vec<CPlane>,
        pub miptex: Vec<MipTex>,
        pub vertices: Vec<Vec3>,
        pub visibility: Vec<u8>,
        pub nodes: Vec<BspNode>,
        pub texinfo: Vec<TexInfo>,
        pub faces: Vec<BspFace>,
        pub lighting: Vec<u8>,
        pub clip_nodes: Vec<ClipNode>,
        pub leaves: Vec<BspLeaf>,
        pub mark_surfaces: Vec<u16>,
        pub edges: Vec<BspEdge>,
        pub surf_edges: Vec<i32>,
        pub models: Vec<BspModel>,
    }

    fn put_vec3(out: &mut Vec<u8>, v: &Vec3) {
        for c in v {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }

    fn put_short3(out: &mut Vec<u8>, v: &[i16; 3]) {
        for c in v {
            out.extend_from_slice(&c.to_le_bytes());
        }
    }

    impl BspBuilder {
        pub fn new() -> Self {
            Self {
                version: BSPVERSION,
                ..Default::default()
            }
        }

        pub fn build(&self) -> Vec<u8> {
            let mut lumps: Vec<Vec<u8>> = vec![Vec::new(); HEADER_LUMPS];

            lumps[LUMP_ENTITIES] = self.entities.as_bytes().to_vec();
            if !lumps[LUMP_ENTITIES].is_empty() {
                lumps[LUMP_ENTITIES].push(0);
            }

            for p in &self.planes {
                let l = &mut lumps[LUMP_PLANES];
                put_vec3(l, &p.normal);
                l.extend_from_slice(&p.dist.to_le_bytes());
                l.extend_from_slice(&p.plane_type.to_le_bytes());
            }

            {
                let l = &mut lumps[LUMP_TEXTURES];
                l.extend_from_slice(&(self.miptex.len() as u32).to_le_bytes());
                let base = 4 + self.miptex.len() * 4;
                for i in 0..self.miptex.len() {
                    l.extend_from_slice(&((base + i * MIPTEX_SIZE) as i32).to_le_bytes());
                }
                for m in &self.miptex {
                    let mut name = [0u8; MIPTEX_NAME_LEN];
                    let n = m.name.len().min(MIPTEX_NAME_LEN - 1);
                    name[..n].copy_from_slice(&m.name.as_bytes()[..n]);
                    l.extend_from_slice(&name);
                    l.extend_from_slice(&m.width.to_le_bytes());
                    l.extend_from_slice(&m.height.to_le_bytes());
                    l.extend_from_slice(&[0u8; 16]);
                }
            }

            for v in &self.vertices {
                put_vec3(&mut lumps[LUMP_VERTEXES], v);
            }
            lumps[LUMP_VISIBILITY] = self.visibility.clone();

            for n in &self.nodes {
                let l = &mut lumps[LUMP_NODES];
                l.extend_from_slice(&n.plane_idx.to_le_bytes());
                l.extend_from_slice(&n.children[0].to_le_bytes());
                l.extend_from_slice(&n.children[1].to_le_bytes());
                put_short3(l, &n.mins);
                put_short3(l, &n.maxs);
                l.extend_from_slice(&n.first_face.to_le_bytes());
                l.extend_from_slice(&n.face_count.to_le_bytes());
            }

            for t in &self.texinfo {
                let l = &mut lumps[LUMP_TEXINFO];
                for axis in &t.vecs {
                    for c in axis {
                        l.extend_from_slice(&c.to_le_bytes());
                    }
                }
                l.extend_from_slice(&t.miptex_idx.to_le_bytes());
                l.extend_from_slice(&t.flags.to_le_bytes());
            }

            for f in &self.faces {
                let l = &mut lumps[LUMP_FACES];
                l.extend_from_slice(&f.plane_idx.to_le_bytes());
                l.extend_from_slice(&f.side.to_le_bytes());
                l.extend_from_slice(&f.first_edge.to_le_bytes());
                l.extend_from_slice(&f.edge_count.to_le_bytes());
                l.extend_from_slice(&f.texinfo_idx.to_le_bytes());
                l.extend_from_slice(&f.styles);
                l.extend_from_slice(&f.light_offset.to_le_bytes());
            }

            lumps[LUMP_LIGHTING] = self.lighting.clone();

            for c in &self.clip_nodes {
                let l = &mut lumps[LUMP_CLIPNODES];
                l.extend_from_slice(&c.plane_idx.to_le_bytes());
                l.extend_from_slice(&c.children[0].to_le_bytes());
                l.extend_from_slice(&c.children[1].to_le_bytes());
            }

            for leaf in &self.leaves {
                let l = &mut lumps[LUMP_LEAFS];
                l.extend_from_slice(&leaf.contents.to_le_bytes());
                l.extend_from_slice(&leaf.vis_offset.to_le_bytes());
                put_short3(l, &leaf.mins);
                put_short3(l, &leaf.maxs);
                l.extend_from_slice(&leaf.first_mark_surface.to_le_bytes());
                l.extend_from_slice(&leaf.mark_surface_count.to_le_bytes());
                l.extend_from_slice(&leaf.ambient_level);
            }

            for m in &self.mark_surfaces {
                lumps[LUMP_MARKSURFACES].extend_from_slice(&m.to_le_bytes());
            }
            for e in &self.edges {
                lumps[LUMP_EDGES].extend_from_slice(&e.v[0].to_le_bytes());
                lumps[LUMP_EDGES].extend_from_slice(&e.v[1].to_le_bytes());
            }
            for s in &self.surf_edges {
                lumps[LUMP_SURFEDGES].extend_from_slice(&s.to_le_bytes());
            }

            for m in &self.models {
                let l = &mut lumps[LUMP_MODELS];
                put_vec3(l, &m.mins);
                put_vec3(l, &m.maxs);
                put_vec3(l, &m.origin);
                for h in &m.head_nodes {
                    l.extend_from_slice(&h.to_le_bytes());
                }
                l.extend_from_slice(&m.vis_leafs.to_le_bytes());
                l.extend_from_slice(&m.first_face.to_le_bytes());
                l.extend_from_slice(&m.face_count.to_le_bytes());
            }

            let mut out = Vec::new();
            out.extend_from_slice(&self.version.to_le_bytes());
            let mut offset = HEADER_SIZE;
            for l in &lumps {
                out.extend_from_slice(&(offset as u32).to_le_bytes());
                out.extend_from_slice(&(l.len() as u32).to_le_bytes());
                offset += l.len();
            }
            for l in &lumps {
                out.extend_from_slice(l);
            }
            out
        }
    }

    fn axial_plane(axis: usize, dist: f32) -> CPlane {
        let mut normal = [0.0; 3];
        normal[axis] = 1.0;
        CPlane {
            normal,
            dist,
            plane_type: axis as u32,
        }
    }

    /// A floor: plane `z = 0`, empty above, solid below, in both the
    /// render tree and every clip hull. One textured quad face sits on
    /// the plane, 128 units across.
    pub fn floor_map() -> BspBuilder {
        let mut b = BspBuilder::new();
        b.entities = "{\n\"classname\" \"worldspawn\"\n}\n{\n\"classname\" \"info_player_start\"\n\"origin\" \"0 0 64\"\n}\n".into();
        b.planes = vec![axial_plane(2, 0.0)];
        b.miptex = vec![MipTex {
            name: "floor".into(),
            width: 64,
            height: 64,
        }];
        b.vertices = vec![
            [-64.0, -64.0, 0.0],
            [64.0, -64.0, 0.0],
            [64.0, 64.0, 0.0],
            [-64.0, 64.0, 0.0],
        ];
        b.edges = vec![
            BspEdge { v: [0, 0] },
            BspEdge { v: [0, 1] },
            BspEdge { v: [1, 2] },
            BspEdge { v: [2, 3] },
            BspEdge { v: [3, 0] },
        ];
        b.surf_edges = vec![1, 2, 3, 4];
        b.texinfo = vec![TexInfo {
            vecs: [[1.0, 0.0, 0.0, 0.0], [0.0, 1.0, 0.0, 0.0]],
            miptex_idx: 0,
            flags: 0,
        }];
        b.faces = vec![BspFace {
            plane_idx: 0,
            side: 0,
            first_edge: 0,
            edge_count: 4,
            texinfo_idx: 0,
            styles: [0, 255, 255, 255],
            light_offset: 0,
        }];
        b.lighting = vec![0u8; 64];
        b.nodes = vec![BspNode {
            plane_idx: 0,
            children: [-2, -1],
            mins: [-64, -64, -64],
            maxs: [64, 64, 64],
            first_face: 0,
            face_count: 1,
        }];
        b.leaves = vec![
            BspLeaf {
                contents: crate::q_shared::CONTENTS_SOLID,
                vis_offset: NO_OFFSET,
                mins: [-64, -64, -64],
                maxs: [64, 64, 0],
                ..Default::default()
            },
            BspLeaf {
                contents: crate::q_shared::CONTENTS_EMPTY,
                vis_offset: 0,
                mins: [-64, -64, 0],
                maxs: [64, 64, 64],
                first_mark_surface: 0,
                mark_surface_count: 1,
                ..Default::default()
            },
        ];
        b.mark_surfaces = vec![0];
        // leaf 1 sees itself
        b.visibility = vec![0x01];
        b.clip_nodes = vec![ClipNode {
            plane_idx: 0,
            children: [
                crate::q_shared::CONTENTS_EMPTY as i16,
                crate::q_shared::CONTENTS_SOLID as i16,
            ],
        }];
        b.models = vec![BspModel {
            mins: [-64.0, -64.0, -64.0],
            maxs: [64.0, 64.0, 64.0],
            origin: [0.0; 3],
            head_nodes: [0, 0, 0, 0],
            vis_leafs: 1,
            first_face: 0,
            face_count: 1,
        }];
        b
    }
}

#[cfg(test)]
mod tests {
    use super::test_fixture::*;
    use super::*;

    // ============================================================
    // Loading
    // ============================================================

    #[test]
    fn test_load_floor_map() {
        let bsp = BspData::load(&floor_map().build()).unwrap();
        assert_eq!(bsp.planes.len(), 1);
        assert_eq!(bsp.nodes.len(), 1);
        assert_eq!(bsp.leaves.len(), 2);
        assert_eq!(bsp.faces.len(), 1);
        assert_eq!(bsp.miptex[0].name, "floor");
        assert_eq!(bsp.node_parents, vec![-1]);
        assert_eq!(bsp.leaf_parents, vec![0, 0]);
    }

    #[test]
    fn test_truncated_file_rejected() {
        let mut data = floor_map().build();
        data.truncate(data.len() - 10);
        assert!(matches!(
            BspData::load(&data),
            Err(BspError::LumpOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_header_only_rejected() {
        assert!(matches!(
            BspData::load(&[0u8; 16]),
            Err(BspError::TooShort { .. })
        ));
    }

    #[test]
    fn test_bad_version_rejected() {
        let mut b = floor_map();
        b.version = 38;
        assert!(matches!(BspData::load(&b.build()), Err(BspError::BadVersion(38))));
    }

    #[test]
    fn test_missing_lump_rejected() {
        let mut b = floor_map();
        b.clip_nodes.clear();
        assert!(matches!(
            BspData::load(&b.build()),
            Err(BspError::MissingLump("clipnodes"))
        ));
    }

    #[test]
    fn test_bad_child_index_rejected() {
        let mut b = floor_map();
        b.nodes[0].children[1] = -10;
        assert!(matches!(BspData::load(&b.build()), Err(BspError::BadIndex { .. })));
    }

    #[test]
    fn test_bad_clip_contents_rejected() {
        let mut b = floor_map();
        b.clip_nodes[0].children[0] = -40;
        assert!(matches!(
            BspData::load(&b.build()),
            Err(BspError::BadContents { what: "clipnode child", value: -40, .. })
        ));
    }

    #[test]
    fn test_bad_clip_headnode_contents_rejected() {
        let mut b = floor_map();
        b.models[0].head_nodes[2] = -40;
        assert!(matches!(
            BspData::load(&b.build()),
            Err(BspError::BadContents { what: "model clip headnode", index: 0, value: -40 })
        ));
    }

    #[test]
    fn test_clip_headnode_may_be_contents() {
        let mut b = floor_map();
        b.models[0].head_nodes[3] = crate::q_shared::CONTENTS_SOLID;
        assert!(BspData::load(&b.build()).is_ok());
    }

    #[test]
    fn test_bad_vis_offset_rejected() {
        let mut b = floor_map();
        b.leaves[1].vis_offset = 100;
        assert!(matches!(BspData::load(&b.build()), Err(BspError::BadIndex { .. })));
    }

    #[test]
    fn test_cyclic_clip_tree_rejected() {
        let mut b = floor_map();
        b.clip_nodes[0].children[0] = 0;
        assert!(matches!(
            BspData::load(&b.build()),
            Err(BspError::TreeTooDeep { .. })
        ));
    }

    #[test]
    fn test_deep_tree_rejected() {
        let mut b = floor_map();
        let depth = MAX_TREE_DEPTH + 4;
        b.clip_nodes = (0..depth)
            .map(|i| ClipNode {
                plane_idx: 0,
                children: [
                    if i + 1 < depth { (i + 1) as i16 } else { -1 },
                    crate::q_shared::CONTENTS_SOLID as i16,
                ],
            })
            .collect();
        assert!(matches!(
            BspData::load(&b.build()),
            Err(BspError::TreeTooDeep { .. })
        ));
    }

    #[test]
    fn test_odd_lump_size_rejected() {
        let mut data = floor_map().build();
        // shrink the planes lump length by one byte
        let len_pos = 8 + LUMP_PLANES * 8;
        let len = read_u32_le(&data, len_pos) - 1;
        data[len_pos..len_pos + 4].copy_from_slice(&len.to_le_bytes());
        assert!(matches!(
            BspData::load(&data),
            Err(BspError::BadLumpSize { .. })
        ));
    }

    #[test]
    fn test_parallel_lump_parse_matches_sequential() {
        let mut b = floor_map();
        b.vertices = (0..200).map(|i| [i as f32, -(i as f32), 0.5]).collect();
        let bsp = BspData::load(&b.build()).unwrap();
        assert_eq!(bsp.vertices.len(), 200);
        assert_eq!(bsp.vertices[150], [150.0, -150.0, 0.5]);
    }

    // ============================================================
    // Derived data
    // ============================================================

    #[test]
    fn test_face_vertices_follow_surfedge_sign() {
        let mut b = floor_map();
        b.surf_edges = vec![-4, -3, -2, -1];
        let bsp = BspData::load(&b.build()).unwrap();
        let verts = bsp.face_vertices(&bsp.faces[0]);
        // reversed edges pick their second endpoint
        assert_eq!(verts[0], [-64.0, -64.0, 0.0]);
        assert_eq!(verts[1], [-64.0, 64.0, 0.0]);
        assert_eq!(verts[2], [64.0, 64.0, 0.0]);
        assert_eq!(verts[3], [64.0, -64.0, 0.0]);
    }

    #[test]
    fn test_entities_parse() {
        let bsp = BspData::load(&floor_map().build()).unwrap();
        let ents = bsp.entities();
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[0].classname(), "worldspawn");
        assert_eq!(ents[1].vec3("origin"), Some([0.0, 0.0, 64.0]));
    }

    #[test]
    fn test_entity_string_malformed_tail() {
        let ents = parse_entity_string("{ \"a\" \"1\" } { \"b\"");
        assert_eq!(ents.len(), 1);
        assert_eq!(ents[0].get("a"), Some("1"));
        assert_eq!(ents[0].float("a"), Some(1.0));
    }
}
