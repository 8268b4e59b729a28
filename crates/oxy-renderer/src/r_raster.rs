// r_raster.rs — software z-buffer / triangle-id rasterizer and span detection

use log::debug;

use crate::gfx_types::{GfxTri, QuadVertex};

/// Id-buffer value for pixels no depth-tested triangle owns.
pub const NO_TRI: i32 = -1;

/// Below this screen-space area a triangle has no usable barycentrics.
pub const DEGENERATE_AREA: f32 = 1e-5;

// ============================================================
// Screen rectangles
// ============================================================

/// Inclusive pixel rectangle plus the farthest depth of what it covers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenRect {
    pub x0: i32,
    pub y0: i32,
    pub x1: i32,
    pub y1: i32,
    pub max_depth: f32,
}

impl ScreenRect {
    pub fn overlaps(&self, other: &ScreenRect) -> bool {
        self.x0 <= other.x1 && self.x1 >= other.x0 && self.y0 <= other.y1 && self.y1 >= other.y0
    }

    pub fn union(&self, other: &ScreenRect) -> ScreenRect {
        ScreenRect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
            max_depth: self.max_depth.max(other.max_depth),
        }
    }

    pub fn intersect(&self, other: &ScreenRect) -> Option<ScreenRect> {
        let r = ScreenRect {
            x0: self.x0.max(other.x0),
            y0: self.y0.max(other.y0),
            x1: self.x1.min(other.x1),
            y1: self.y1.min(other.y1),
            max_depth: self.max_depth.min(other.max_depth),
        };
        (r.x0 <= r.x1 && r.y0 <= r.y1).then_some(r)
    }
}

/// NDC to continuous screen coordinates, y down.
#[inline]
pub fn ndc_to_screen(x: f32, y: f32, width: usize, height: usize) -> (f32, f32) {
    ((x + 1.0) * 0.5 * width as f32, (1.0 - y) * 0.5 * height as f32)
}

/// Clamped pixel bounds of an NDC triangle. `None` when it misses the target.
pub fn tri_screen_rect(tri: &GfxTri, width: usize, height: usize) -> Option<ScreenRect> {
    if width == 0 || height == 0 {
        return None;
    }
    let mut min = [f32::INFINITY; 2];
    let mut max = [f32::NEG_INFINITY; 2];
    let mut max_depth = f32::NEG_INFINITY;
    for v in &tri.verts {
        let (sx, sy) = ndc_to_screen(v.position[0], v.position[1], width, height);
        min[0] = min[0].min(sx);
        min[1] = min[1].min(sy);
        max[0] = max[0].max(sx);
        max[1] = max[1].max(sy);
        max_depth = max_depth.max(v.position[2]);
    }
    if !(min[0].is_finite() && min[1].is_finite() && max[0].is_finite() && max[1].is_finite()) {
        return None;
    }

    let x0 = (min[0].floor() as i32).max(0);
    let y0 = (min[1].floor() as i32).max(0);
    let x1 = (max[0].ceil() as i32 - 1).min(width as i32 - 1);
    let y1 = (max[1].ceil() as i32 - 1).min(height as i32 - 1);
    if x0 > x1 || y0 > y1 {
        return None;
    }
    Some(ScreenRect { x0, y0, x1, y1, max_depth })
}

/// Merge rectangles until no two overlap. Merged boxes keep the farther
/// depth of their inputs.
pub fn merge_rects(rects: impl IntoIterator<Item = ScreenRect>) -> Vec<ScreenRect> {
    let mut boxes: Vec<ScreenRect> = Vec::new();
    for rect in rects {
        let mut cur = rect;
        // a grown box can swallow boxes it previously missed
        while let Some(i) = boxes.iter().position(|b| b.overlaps(&cur)) {
            cur = cur.union(&boxes.swap_remove(i));
        }
        boxes.push(cur);
    }
    boxes
}

// ============================================================
// Depth target
// ============================================================

/// A run of pixels on one row owned by the same triangle id. `x1` is inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub y: i32,
    pub x0: i32,
    pub x1: i32,
    pub id: i32,
}

struct EdgeSetup {
    screen: [(f32, f32); 3],
    depth: [f32; 3],
    inv_area: f32,
}

fn edge(a: (f32, f32), b: (f32, f32), px: f32, py: f32) -> f32 {
    (b.0 - a.0) * (py - a.1) - (b.1 - a.1) * (px - a.0)
}

impl EdgeSetup {
    fn new(tri: &GfxTri, width: usize, height: usize) -> Option<Self> {
        let mut screen = [(0.0f32, 0.0f32); 3];
        let mut depth = [0.0f32; 3];
        for (i, v) in tri.verts.iter().enumerate() {
            screen[i] = ndc_to_screen(v.position[0], v.position[1], width, height);
            depth[i] = v.position[2];
        }
        let area = edge(screen[0], screen[1], screen[2].0, screen[2].1);
        if !area.is_finite() || area.abs() < DEGENERATE_AREA {
            return None;
        }
        Some(Self { screen, depth, inv_area: 1.0 / area })
    }

    /// Interpolated depth at a pixel centre, or `None` if outside.
    #[inline]
    fn depth_at(&self, px: i32, py: i32) -> Option<f32> {
        let cx = px as f32 + 0.5;
        let cy = py as f32 + 0.5;
        let w0 = edge(self.screen[1], self.screen[2], cx, cy) * self.inv_area;
        let w1 = edge(self.screen[2], self.screen[0], cx, cy) * self.inv_area;
        let w2 = edge(self.screen[0], self.screen[1], cx, cy) * self.inv_area;
        if w0 < 0.0 || w1 < 0.0 || w2 < 0.0 {
            return None;
        }
        Some(w0 * self.depth[0] + w1 * self.depth[1] + w2 * self.depth[2])
    }
}

/// Software z-buffer with a parallel triangle-id buffer.
#[derive(Debug, Clone)]
pub struct DepthTarget {
    width: usize,
    height: usize,
    zbuffer: Vec<f32>,
    ids: Vec<i32>,
}

impl DepthTarget {
    pub fn new(width: usize, height: usize) -> Self {
        Self {
            width,
            height,
            zbuffer: vec![1.0; width * height],
            ids: vec![NO_TRI; width * height],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn resize(&mut self, width: usize, height: usize) {
        if self.width != width || self.height != height {
            *self = Self::new(width, height);
        }
    }

    pub fn clear(&mut self) {
        self.zbuffer.fill(1.0);
        self.ids.fill(NO_TRI);
    }

    pub fn depth(&self, x: usize, y: usize) -> f32 {
        self.zbuffer[y * self.width + x]
    }

    pub fn id(&self, x: usize, y: usize) -> i32 {
        self.ids[y * self.width + x]
    }

    fn full_rect(&self) -> Option<ScreenRect> {
        (self.width > 0 && self.height > 0).then(|| ScreenRect {
            x0: 0,
            y0: 0,
            x1: self.width as i32 - 1,
            y1: self.height as i32 - 1,
            max_depth: 1.0,
        })
    }

    /// Write depth without comparing, restricted to `limit`. Returns the
    /// number of pixels written.
    pub fn raster_depth_only(&mut self, tri: &GfxTri, limit: &ScreenRect) -> usize {
        let Some(rect) = tri_screen_rect(tri, self.width, self.height) else {
            return 0;
        };
        let Some(rect) = rect.intersect(limit) else {
            return 0;
        };
        let Some(setup) = EdgeSetup::new(tri, self.width, self.height) else {
            return 0;
        };

        let mut written = 0;
        for y in rect.y0..=rect.y1 {
            let row = y as usize * self.width;
            for x in rect.x0..=rect.x1 {
                if let Some(z) = setup.depth_at(x, y) {
                    self.zbuffer[row + x as usize] = z;
                    written += 1;
                }
            }
        }
        written
    }

    /// Depth-test `tri` over the whole target, writing depth and `id` on
    /// each pixel it wins. Returns the number of pixels written.
    pub fn raster_depth_test(&mut self, tri: &GfxTri, id: i32) -> usize {
        let Some(limit) = self.full_rect() else {
            return 0;
        };
        let Some(rect) = tri_screen_rect(tri, self.width, self.height) else {
            return 0;
        };
        let Some(rect) = rect.intersect(&limit) else {
            return 0;
        };
        let Some(setup) = EdgeSetup::new(tri, self.width, self.height) else {
            debug!("skipping degenerate tri {} in depth raster", id);
            return 0;
        };

        let mut written = 0;
        for y in rect.y0..=rect.y1 {
            let row = y as usize * self.width;
            for x in rect.x0..=rect.x1 {
                let idx = row + x as usize;
                if let Some(z) = setup.depth_at(x, y) {
                    if z < self.zbuffer[idx] {
                        self.zbuffer[idx] = z;
                        self.ids[idx] = id;
                        written += 1;
                    }
                }
            }
        }
        written
    }

    /// Row-by-row runs of constant triangle id.
    pub fn spans(&self) -> Vec<Span> {
        let mut spans = Vec::new();
        for y in 0..self.height {
            let row = &self.ids[y * self.width..(y + 1) * self.width];
            let mut start = 0usize;
            while start < row.len() {
                let id = row[start];
                let mut end = start;
                while end + 1 < row.len() && row[end + 1] == id {
                    end += 1;
                }
                if id != NO_TRI {
                    spans.push(Span {
                        y: y as i32,
                        x0: start as i32,
                        x1: end as i32,
                        id,
                    });
                }
                start = end + 1;
            }
        }
        spans
    }
}

// ============================================================
// Span quads
// ============================================================

/// Quad covering `span` exactly in NDC, with each corner's uv taken from
/// the triangle's barycentrics at that corner. `None` for a degenerate
/// triangle.
pub fn span_quad_verts(tri: &GfxTri, span: &Span, width: usize, height: usize) -> Option<[QuadVertex; 4]> {
    let Some(setup) = EdgeSetup::new(tri, width, height) else {
        debug!("skipping span on degenerate tri {}", span.id);
        return None;
    };
    let [v0, v1, v2] = &tri.verts;
    let s = setup.screen;

    let w = width as f32;
    let h = height as f32;
    let corner = |sx: f32, sy: f32| {
        let b0 = edge(s[1], s[2], sx, sy) * setup.inv_area;
        let b1 = edge(s[2], s[0], sx, sy) * setup.inv_area;
        let b2 = edge(s[0], s[1], sx, sy) * setup.inv_area;
        QuadVertex {
            position: [2.0 * sx / w - 1.0, 1.0 - 2.0 * sy / h],
            uv: [
                b0 * v0.uv[0] + b1 * v1.uv[0] + b2 * v2.uv[0],
                b0 * v0.uv[1] + b1 * v1.uv[1] + b2 * v2.uv[1],
            ],
        }
    };

    let left = span.x0 as f32;
    let right = (span.x1 + 1) as f32;
    let top = span.y as f32;
    let bottom = (span.y + 1) as f32;
    Some([
        corner(left, top),
        corner(right, top),
        corner(right, bottom),
        corner(left, bottom),
    ])
}
