// pvs.rs — leaf lookup, PVS decompression and render-tree marking

use log::debug;

use crate::bspfile::NO_OFFSET;
use crate::cmodel::BspData;
use crate::q_shared::Vec3;

// ============================================================
// Bitset
// ============================================================

/// Fixed-size bitset used for per-frame node and face marks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MarkBits {
    words: Vec<u64>,
    len: usize,
}

impl MarkBits {
    pub fn new(len: usize) -> Self {
        Self {
            words: vec![0; len.div_ceil(64)],
            len,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
    }

    #[inline]
    pub fn set(&mut self, i: usize) {
        if i < self.len {
            self.words[i >> 6] |= 1 << (i & 63);
        }
    }

    #[inline]
    pub fn get(&self, i: usize) -> bool {
        i < self.len && self.words[i >> 6] & (1 << (i & 63)) != 0
    }

    /// Set the bit and report whether it was clear before.
    #[inline]
    pub fn test_and_set(&mut self, i: usize) -> bool {
        let was = self.get(i);
        self.set(i);
        !was
    }

    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }
}

// ============================================================
// Decompression
// ============================================================

/// Run-length decode a PVS row starting at `offset`. A non-zero byte is
/// literal; a zero byte is followed by a count of zero bytes. Output past
/// `out.len()` is dropped and a truncated input leaves the rest zeroed.
pub fn decompress_vis(data: &[u8], offset: usize, out: &mut [u8]) {
    out.fill(0);
    let mut i = offset;
    let mut o = 0;
    while o < out.len() {
        let Some(&b) = data.get(i) else {
            debug!("vis row at {} truncated after {} bytes", offset, o);
            return;
        };
        i += 1;
        if b != 0 {
            out[o] = b;
            o += 1;
            continue;
        }
        let Some(&run) = data.get(i) else {
            debug!("vis row at {} ends inside a zero run", offset);
            return;
        };
        i += 1;
        o = (o + run as usize).min(out.len());
    }
}

// ============================================================
// Leaf lookup
// ============================================================

impl BspData {
    /// Descend the render tree of `model` to the leaf containing `point`.
    pub fn find_leaf(&self, point: &Vec3, model: usize) -> usize {
        let mut node = self.models[model].head_nodes[0];
        loop {
            let n = &self.nodes[node as usize];
            let d = self.plane(n.plane_idx).distance(point);
            let child = if d >= 0.0 { n.children[0] } else { n.children[1] };
            if child < 0 {
                return (-(child as i32) - 1) as usize;
            }
            node = child as i32;
        }
    }
}

// ============================================================
// Visibility marks
// ============================================================

/// Decompressed PVS row plus the render-tree node marks built from it.
/// Node marks are rebuilt by every visibility pass; face marks live for
/// a whole frame and are reset by `begin_frame`.
#[derive(Debug, Clone, Default)]
pub struct VisMarks {
    pub pvs: Vec<u8>,
    /// Set when the camera leaf has no vis data; nothing is culled.
    pub all_visible: bool,
    pub nodes: MarkBits,
    /// Faces already submitted this frame.
    pub faces: MarkBits,
    /// (model, vis offset) of the row currently held in `pvs`.
    cached_row: Option<(usize, i32)>,
}

impl VisMarks {
    pub fn new(bsp: &BspData) -> Self {
        Self {
            pvs: Vec::new(),
            all_visible: false,
            nodes: MarkBits::new(bsp.nodes.len()),
            faces: MarkBits::new(bsp.faces.len()),
            cached_row: None,
        }
    }

    pub fn begin_frame(&mut self) {
        self.faces.clear();
    }

    /// Mark every render node that leads to a leaf visible from `leaf`.
    pub fn mark_visible_from(&mut self, bsp: &BspData, leaf: usize, model: usize) {
        self.nodes.clear();

        let vis_offset = bsp.leaves[leaf].vis_offset;
        if vis_offset == NO_OFFSET {
            self.mark_all(bsp, model);
            return;
        }
        self.all_visible = false;

        let key = (model, vis_offset);
        if self.cached_row != Some(key) {
            let row_bytes = bsp.models[model].vis_row_bytes();
            self.pvs.resize(row_bytes, 0);
            decompress_vis(&bsp.visibility, vis_offset as usize, &mut self.pvs);
            self.cached_row = Some(key);
            debug!("pvs: decompressed {} bytes for leaf {} at {}", row_bytes, leaf, vis_offset);
        }

        let vis_leafs = bsp.models[model].vis_leafs as usize;
        for i in 0..vis_leafs {
            if self.pvs[i >> 3] & (1 << (i & 7)) == 0 {
                continue;
            }
            // leaf 0 is the shared solid leaf and has no PVS bit
            let Some(&parent) = bsp.leaf_parents.get(i + 1) else {
                break;
            };
            let mut node = parent;
            while node >= 0 && self.nodes.test_and_set(node as usize) {
                node = bsp.node_parents[node as usize];
            }
        }
    }

    /// Fail-open path: every node of `model` is marked.
    pub fn mark_all(&mut self, bsp: &BspData, model: usize) {
        self.nodes.clear();
        self.all_visible = true;
        self.cached_row = None;

        let mut stack = vec![bsp.models[model].head_nodes[0] as usize];
        while let Some(node) = stack.pop() {
            self.nodes.set(node);
            for &child in &bsp.nodes[node].children {
                if child >= 0 {
                    stack.push(child as usize);
                }
            }
        }
    }

    pub fn is_node_marked(&self, node: usize) -> bool {
        self.nodes.get(node)
    }

    pub fn is_leaf_visible(&self, leaf: usize) -> bool {
        if self.all_visible || leaf == 0 {
            return true;
        }
        let bit = leaf - 1;
        self.pvs
            .get(bit >> 3)
            .is_some_and(|b| b & (1 << (bit & 7)) != 0)
    }

    /// Does the box touch any leaf in the current PVS?
    pub fn bounds_visible(&self, bsp: &BspData, mins: &Vec3, maxs: &Vec3) -> bool {
        if self.all_visible {
            return true;
        }
        for i in 0..self.pvs.len() * 8 {
            if self.pvs[i >> 3] & (1 << (i & 7)) == 0 {
                continue;
            }
            let Some(leaf) = bsp.leaves.get(i + 1) else {
                break;
            };
            let hit = (0..3).all(|k| {
                mins[k] <= leaf.maxs[k] as f32 && maxs[k] >= leaf.mins[k] as f32
            });
            if hit {
                return true;
            }
        }
        false
    }
}
