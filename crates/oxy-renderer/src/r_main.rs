// r_main.rs — triangle queues, end-of-frame raster task and quad emission

use std::ops::Range;
use std::path::Path;

use log::{debug, trace, warn};
use oxy_common::q_shared::{Mat4, MAT4_IDENTITY};

use crate::gfx_types::{
    GfxTri, GfxVertex, QuadSink, QuadVertex, RenderStrategy, TextureHandle, TextureRef, TexturedQuad,
};
use crate::r_clip::{clip_triangle, convert_tri_to_ndc_and_cull, tri_clip_codes};
use crate::r_raster::{merge_rects, span_quad_verts, tri_screen_rect, DepthTarget};
use crate::render_config::RenderConfig;
use crate::texture::{TextureCache, TextureLoader};

/// Glyph atlas layout: printable ASCII in a 16 x 6 grid.
const FONT_ATLAS_FIRST: u8 = 32;
const FONT_ATLAS_LAST: u8 = 127;
const FONT_ATLAS_COLUMNS: u8 = 16;
const FONT_ATLAS_ROWS: u8 = 6;

/// A PreSorted triangle and the overlay drawn straight after it.
#[derive(Debug, Clone)]
pub struct PreSortedEntry {
    pub base: GfxTri,
    pub overlay: Option<GfxTri>,
}

/// Per-frame counters, reset by `begin_frame`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub presorted_drawn: usize,
    pub overlays_drawn: usize,
    pub overlays_dropped: usize,
    pub presorted_depth_rastered: usize,
    pub tris_rastered: usize,
    pub spans_drawn: usize,
    pub direct_drawn: usize,
}

#[derive(Debug, Default)]
struct RasterPassStats {
    presorted_depth_rastered: usize,
    tris_rastered: usize,
}

pub struct GfxRenderer {
    config: RenderConfig,
    window_width: i32,
    window_height: i32,
    view_projection: Mat4,

    direct: Vec<GfxTri>,
    presorted: Vec<PreSortedEntry>,
    /// Entries produced by the most recent PreSorted submission.
    last_presorted: Range<usize>,
    depth_queue: Vec<GfxTri>,

    target: DepthTarget,
    textures: TextureCache,
    font_atlas: Option<TextureRef>,
    stats: FrameStats,
}

impl GfxRenderer {
    pub fn new(config: RenderConfig) -> Self {
        Self {
            config,
            window_width: 0,
            window_height: 0,
            view_projection: MAT4_IDENTITY,
            direct: Vec::new(),
            presorted: Vec::new(),
            last_presorted: 0..0,
            depth_queue: Vec::new(),
            target: DepthTarget::new(config.soft_width, config.soft_height),
            textures: TextureCache::new(),
            font_atlas: None,
            stats: FrameStats::default(),
        }
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Replace the config. The software target follows on the next frame.
    pub fn set_config(&mut self, config: RenderConfig) {
        self.config = config;
    }

    pub fn textures(&self) -> &TextureCache {
        &self.textures
    }

    /// Load the glyph atlas used by `overlay_text`. A missing image leaves
    /// text drawn with the error texture.
    pub fn load_font_atlas(&mut self, loader: &mut dyn TextureLoader, path: &Path) {
        self.font_atlas = Some(self.textures.load(loader, path));
    }

    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    pub fn set_view_projection(&mut self, m: Mat4) {
        self.view_projection = m;
    }

    pub fn window_size(&self) -> (i32, i32) {
        (self.window_width, self.window_height)
    }

    pub fn depth_target(&self) -> &DepthTarget {
        &self.target
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Number of triangles queued for the depth-tested pass this frame.
    pub fn depth_queue_len(&self) -> usize {
        self.depth_queue.len()
    }

    pub fn presorted_len(&self) -> usize {
        self.presorted.len()
    }

    // ============================================================
    // Frame
    // ============================================================

    /// Start a frame for a window of `width` x `height`. Negative sizes are
    /// ignored and the previous size kept.
    pub fn begin_frame(&mut self, width: i32, height: i32) {
        if width >= 0 && height >= 0 {
            if (width, height) != (self.window_width, self.window_height) {
                debug!("window resized to {}x{}", width, height);
            }
            self.window_width = width;
            self.window_height = height;
        }
        self.target.resize(self.config.soft_width, self.config.soft_height);
        self.target.clear();

        self.direct.clear();
        self.presorted.clear();
        self.last_presorted = 0..0;
        self.depth_queue.clear();
        self.stats = FrameStats::default();
    }

    /// Queue a clip-space triangle. `depth_multiplier` scales NDC depth of
    /// PreSorted output so a pass can sit in front of or behind another.
    pub fn submit_tri_to_queue(&mut self, tri: &GfxTri, strategy: RenderStrategy, depth_multiplier: f32) {
        let (clip_or, clip_and) = tri_clip_codes(tri);
        if !clip_and.is_empty() {
            // a rejected base leaves nothing for its overlay to pair with
            if strategy == RenderStrategy::PreSorted {
                self.last_presorted = self.presorted.len()..self.presorted.len();
            }
            return;
        }

        // overlay geometry is already in NDC
        if strategy == RenderStrategy::DirectToGpu {
            self.direct.push(tri.clone());
            return;
        }

        let mut out = Vec::new();
        let mut accept = |mut t: GfxTri| {
            if convert_tri_to_ndc_and_cull(&mut t) {
                return;
            }
            for v in &mut t.verts {
                v.position[2] *= depth_multiplier;
            }
            out.push(t);
        };
        if clip_or.is_empty() {
            accept(tri.clone());
        } else {
            clip_triangle(tri, clip_or, accept);
        }

        match strategy {
            RenderStrategy::PreSorted => {
                let start = self.presorted.len();
                self.presorted
                    .extend(out.into_iter().map(|base| PreSortedEntry { base, overlay: None }));
                self.last_presorted = start..self.presorted.len();
            }
            RenderStrategy::PreSortedOverlay => self.attach_overlays(out),
            RenderStrategy::SoftwareDepthRasterize => self.depth_queue.extend(out),
            RenderStrategy::DirectToGpu => {}
        }
    }

    fn attach_overlays(&mut self, overlays: Vec<GfxTri>) {
        let range = self.last_presorted.clone();
        for (k, tri) in overlays.into_iter().enumerate() {
            let idx = range.start + k;
            if idx < range.end {
                self.presorted[idx].overlay = Some(tri);
            } else {
                warn!("overlay tri {} has no PreSorted base, dropped", k);
                self.stats.overlays_dropped += 1;
            }
        }
    }

    /// Two DirectToGpu triangles covering an NDC rectangle in flat colour.
    pub fn overlay_rect(&mut self, min: [f32; 2], max: [f32; 2], colour: [f32; 3]) {
        let white = self.textures.white_texture().clone();
        let corner = |x: f32, y: f32, u: f32, v: f32| GfxVertex::new([x, y, 0.0, 1.0], [u, v]);
        let a = GfxTri {
            verts: [
                corner(min[0], min[1], 0.0, 0.0),
                corner(max[0], min[1], 1.0, 0.0),
                corner(min[0], max[1], 0.0, 1.0),
            ],
            colour,
            texture: Some(white.clone()),
            ..Default::default()
        };
        let b = GfxTri {
            verts: [
                corner(max[0], min[1], 1.0, 0.0),
                corner(max[0], max[1], 1.0, 1.0),
                corner(min[0], max[1], 0.0, 1.0),
            ],
            colour,
            texture: Some(white),
            ..Default::default()
        };
        self.submit_tri_to_queue(&a, RenderStrategy::DirectToGpu, 1.0);
        self.submit_tri_to_queue(&b, RenderStrategy::DirectToGpu, 1.0);
    }

    /// One DirectToGpu quad per glyph, bottom-left corner at `bl_ndc`.
    /// Glyphs advance by `spacing`; bytes outside the atlas keep their slot
    /// but draw nothing. `center` shifts the string left by half its width.
    pub fn overlay_text(
        &mut self,
        text: &str,
        bl_ndc: [f32; 2],
        colour: [f32; 3],
        spacing: f32,
        size: f32,
        center: bool,
    ) {
        let atlas = self
            .font_atlas
            .clone()
            .unwrap_or_else(|| self.textures.error_texture().clone());
        let mut x_start = bl_ndc[0];
        if center {
            x_start -= text.len() as f32 * spacing * 0.5;
        }

        let cell_w = 1.0 / FONT_ATLAS_COLUMNS as f32;
        let cell_h = 1.0 / FONT_ATLAS_ROWS as f32;
        for (i, ch) in text.bytes().enumerate() {
            if !(FONT_ATLAS_FIRST..=FONT_ATLAS_LAST).contains(&ch) {
                continue;
            }
            let cell = ch - FONT_ATLAS_FIRST;
            let u = (cell % FONT_ATLAS_COLUMNS) as f32 * cell_w;
            let v = (cell / FONT_ATLAS_COLUMNS) as f32 * cell_h;
            let x0 = x_start + i as f32 * spacing;
            let (x1, y0, y1) = (x0 + size, bl_ndc[1], bl_ndc[1] + size);

            let corner = |x: f32, y: f32, u: f32, v: f32| GfxVertex::new([x, y, 0.0, 1.0], [u, v]);
            let a = GfxTri {
                verts: [
                    corner(x0, y0, u, v),
                    corner(x1, y0, u + cell_w, v),
                    corner(x0, y1, u, v + cell_h),
                ],
                colour,
                texture: Some(atlas.clone()),
                ..Default::default()
            };
            let b = GfxTri {
                verts: [
                    corner(x1, y0, u + cell_w, v),
                    corner(x1, y1, u + cell_w, v + cell_h),
                    corner(x0, y1, u, v + cell_h),
                ],
                colour,
                texture: Some(atlas.clone()),
                ..Default::default()
            };
            self.submit_tri_to_queue(&a, RenderStrategy::DirectToGpu, 1.0);
            self.submit_tri_to_queue(&b, RenderStrategy::DirectToGpu, 1.0);
        }
    }

    /// Rasterize the depth queue on a worker while PreSorted triangles are
    /// drawn here, then draw spans and the DirectToGpu queue.
    pub fn end_frame(&mut self, sink: &mut dyn QuadSink) {
        let error = self.textures.error_texture().handle;
        let target = &mut self.target;
        let presorted = &self.presorted;
        let depth_queue = &self.depth_queue;
        let mut pass = RasterPassStats::default();
        let pass_slot = &mut pass;
        let mut drawn = (0usize, 0usize);

        rayon::in_place_scope(|s| {
            s.spawn(move |_| {
                *pass_slot = raster_pass(target, presorted, depth_queue);
            });

            for entry in presorted {
                sink.draw_textured_quad(&tri_quad(&entry.base, error));
                drawn.0 += 1;
                if let Some(overlay) = &entry.overlay {
                    sink.draw_textured_quad(&tri_quad(overlay, error));
                    drawn.1 += 1;
                }
            }
        });

        self.stats.presorted_drawn = drawn.0;
        self.stats.overlays_drawn = drawn.1;
        self.stats.presorted_depth_rastered = pass.presorted_depth_rastered;
        self.stats.tris_rastered = pass.tris_rastered;

        if pass.tris_rastered > 0 {
            self.draw_spans(sink, error);
        }

        for tri in &self.direct {
            sink.draw_textured_quad(&tri_quad(tri, error));
        }
        self.stats.direct_drawn = self.direct.len();
        trace!("frame stats: {:?}", self.stats);
    }

    fn draw_spans(&mut self, sink: &mut dyn QuadSink, error: TextureHandle) {
        let (w, h) = (self.target.width(), self.target.height());
        for span in self.target.spans() {
            let Some(tri) = self.depth_queue.get(span.id as usize) else {
                continue;
            };
            let Some(verts) = span_quad_verts(tri, &span, w, h) else {
                continue;
            };
            sink.draw_textured_quad(&TexturedQuad {
                verts,
                colour: tri.colour,
                texture: texture_handle(tri, error),
            });
            self.stats.spans_drawn += 1;
        }
    }
}

fn texture_handle(tri: &GfxTri, error: TextureHandle) -> TextureHandle {
    tri.texture.as_ref().map_or(error, |t| t.handle)
}

/// An NDC triangle as a quad; the last corner repeats the third vertex.
fn tri_quad(tri: &GfxTri, error: TextureHandle) -> TexturedQuad {
    let q = |v: &GfxVertex| QuadVertex {
        position: [v.position[0], v.position[1]],
        uv: v.uv,
    };
    let [a, b, c] = &tri.verts;
    TexturedQuad {
        verts: [q(a), q(b), q(c), q(c)],
        colour: tri.colour,
        texture: texture_handle(tri, error),
    }
}

/// Depth-only pass for PreSorted geometry that can occlude queued
/// triangles, then the depth-tested pass that fills the id buffer.
fn raster_pass(target: &mut DepthTarget, presorted: &[PreSortedEntry], queue: &[GfxTri]) -> RasterPassStats {
    let mut stats = RasterPassStats::default();
    if queue.is_empty() {
        return stats;
    }
    let (w, h) = (target.width(), target.height());
    let boxes = merge_rects(queue.iter().filter_map(|t| tri_screen_rect(t, w, h)));

    for entry in presorted {
        let tri = &entry.base;
        let Some(rect) = tri_screen_rect(tri, w, h) else {
            continue;
        };
        let min_depth = tri
            .verts
            .iter()
            .map(|v| v.position[2])
            .fold(f32::INFINITY, f32::min);
        let mut touched = false;
        for b in &boxes {
            if b.overlaps(&rect) && min_depth < b.max_depth {
                target.raster_depth_only(tri, b);
                touched = true;
            }
        }
        if touched {
            stats.presorted_depth_rastered += 1;
        }
    }

    for (id, tri) in queue.iter().enumerate() {
        if target.raster_depth_test(tri, id as i32) > 0 {
            stats.tris_rastered += 1;
        }
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gfx_types::CullType;

    fn config(w: usize, h: usize) -> RenderConfig {
        RenderConfig {
            soft_width: w,
            soft_height: h,
            ..Default::default()
        }
    }

    fn tri(p: [[f32; 3]; 3]) -> GfxTri {
        GfxTri {
            verts: [
                GfxVertex::new([p[0][0], p[0][1], p[0][2], 1.0], [0.0, 0.0]),
                GfxVertex::new([p[1][0], p[1][1], p[1][2], 1.0], [1.0, 0.0]),
                GfxVertex::new([p[2][0], p[2][1], p[2][2], 1.0], [0.0, 1.0]),
            ],
            ..Default::default()
        }
    }

    fn inside() -> GfxTri {
        tri([[-0.5, -0.5, 0.0], [0.5, -0.5, 0.0], [0.0, 0.5, 0.0]])
    }

    // ============================================================
    // Submission
    // ============================================================

    #[test]
    fn test_begin_frame_resets_queues() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(640, 480);
        r.submit_tri_to_queue(&inside(), RenderStrategy::PreSorted, 1.0);
        r.submit_tri_to_queue(&inside(), RenderStrategy::SoftwareDepthRasterize, 1.0);
        assert_eq!(r.presorted_len(), 1);
        assert_eq!(r.depth_queue_len(), 1);
        r.begin_frame(640, 480);
        assert_eq!(r.presorted_len(), 0);
        assert_eq!(r.depth_queue_len(), 0);
    }

    #[test]
    fn test_negative_size_ignored() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(640, 480);
        r.begin_frame(-1, 100);
        assert_eq!(r.window_size(), (640, 480));
    }

    #[test]
    fn test_begin_frame_applies_config_size() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.set_config(config(16, 4));
        r.begin_frame(0, 0);
        assert_eq!((r.depth_target().width(), r.depth_target().height()), (16, 4));
    }

    #[test]
    fn test_fully_outside_is_dropped() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let behind = tri([[0.0, 0.0, -3.0], [1.0, 0.0, -3.0], [0.0, 1.0, -3.0]]);
        r.submit_tri_to_queue(&behind, RenderStrategy::PreSorted, 1.0);
        r.submit_tri_to_queue(&behind, RenderStrategy::DirectToGpu, 1.0);
        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        assert!(sink.is_empty());
    }

    #[test]
    fn test_clipped_submission_splits() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let crossing = tri([[-0.5, -0.5, 0.0], [2.0, 0.0, 0.0], [-0.5, 0.5, 0.0]]);
        r.submit_tri_to_queue(&crossing, RenderStrategy::PreSorted, 1.0);
        assert_eq!(r.presorted_len(), 2);
    }

    #[test]
    fn test_backface_culled_on_submit() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let mut t = inside();
        t.verts.swap(1, 2);
        t.cull = CullType::Backface;
        r.submit_tri_to_queue(&t, RenderStrategy::PreSorted, 1.0);
        assert_eq!(r.presorted_len(), 0);
    }

    #[test]
    fn test_depth_multiplier_scales_z() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let t = tri([[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.0, 0.5, 0.5]]);
        r.submit_tri_to_queue(&t, RenderStrategy::PreSorted, 0.5);
        assert_eq!(r.presorted[0].base.verts[0].position[2], 0.25);
    }

    // ============================================================
    // Overlay pairing
    // ============================================================

    #[test]
    fn test_overlay_drawn_after_its_base() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let mut base = inside();
        base.colour = [1.0, 0.0, 0.0];
        let mut lit = inside();
        lit.colour = [0.0, 1.0, 0.0];
        let mut second = inside();
        second.colour = [0.0, 0.0, 1.0];

        r.submit_tri_to_queue(&base, RenderStrategy::PreSorted, 1.0);
        r.submit_tri_to_queue(&lit, RenderStrategy::PreSortedOverlay, 1.0);
        r.submit_tri_to_queue(&second, RenderStrategy::PreSorted, 1.0);

        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        let colours: Vec<[f32; 3]> = sink.iter().map(|q| q.colour).collect();
        assert_eq!(colours, vec![[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(r.stats().overlays_drawn, 1);
    }

    #[test]
    fn test_overlay_after_rejected_base_dropped() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let mut visible = inside();
        visible.colour = [1.0, 0.0, 0.0];
        let beyond_far = tri([[-0.5, -0.5, 5.0], [0.5, -0.5, 5.0], [0.0, 0.5, 5.0]]);
        let mut lit = inside();
        lit.colour = [0.0, 1.0, 0.0];

        r.submit_tri_to_queue(&visible, RenderStrategy::PreSorted, 1.0);
        r.submit_tri_to_queue(&beyond_far, RenderStrategy::PreSorted, 1.0);
        r.submit_tri_to_queue(&lit, RenderStrategy::PreSortedOverlay, 1.0);

        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        let colours: Vec<[f32; 3]> = sink.iter().map(|q| q.colour).collect();
        assert_eq!(colours, vec![[1.0, 0.0, 0.0]]);
        assert_eq!(r.stats().overlays_drawn, 0);
        assert_eq!(r.stats().overlays_dropped, 1);
    }

    #[test]
    fn test_overlay_without_base_dropped() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        r.submit_tri_to_queue(&inside(), RenderStrategy::PreSortedOverlay, 1.0);
        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        assert!(sink.is_empty());
        assert_eq!(r.stats().overlays_dropped, 1);
    }

    // ============================================================
    // end_frame
    // ============================================================

    #[test]
    fn test_direct_drawn_last_with_repeated_vertex() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        r.overlay_rect([-1.0, -1.0], [0.0, 0.0], [0.5, 0.5, 0.5]);
        r.submit_tri_to_queue(&inside(), RenderStrategy::PreSorted, 1.0);

        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        assert_eq!(sink.len(), 3);
        assert_eq!(sink[0].colour, [1.0, 1.0, 1.0]);
        for q in &sink[1..] {
            assert_eq!(q.texture, TextureHandle::WHITE);
            assert_eq!(q.colour, [0.5, 0.5, 0.5]);
            assert_eq!(q.verts[2], q.verts[3]);
        }
        assert_eq!(r.stats().direct_drawn, 2);
    }

    #[test]
    fn test_missing_texture_uses_error_handle() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        r.submit_tri_to_queue(&inside(), RenderStrategy::PreSorted, 1.0);
        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        assert_eq!(sink[0].texture, TextureHandle::ERROR);
    }

    #[test]
    fn test_depth_rasterized_tri_becomes_spans() {
        // 8x6 keeps every pixel centre off the shared diagonal
        let mut r = GfxRenderer::new(config(8, 6));
        r.begin_frame(8, 6);
        let full = [
            tri([[-1.0, -1.0, 0.0], [1.0, -1.0, 0.0], [-1.0, 1.0, 0.0]]),
            tri([[1.0, -1.0, 0.0], [1.0, 1.0, 0.0], [-1.0, 1.0, 0.0]]),
        ];
        for t in &full {
            r.submit_tri_to_queue(t, RenderStrategy::SoftwareDepthRasterize, 1.0);
        }
        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        let stats = r.stats();
        assert_eq!(stats.tris_rastered, 2);
        assert_eq!(stats.spans_drawn, sink.len());
        // every row is split between the two triangles
        assert_eq!(sink.len(), 12);
    }

    #[test]
    fn test_presorted_occluder_hides_depth_tri() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let near_wall = [
            tri([[-1.0, -1.0, -0.5], [1.0, -1.0, -0.5], [-1.0, 1.0, -0.5]]),
            tri([[1.0, -1.0, -0.5], [1.0, 1.0, -0.5], [-1.0, 1.0, -0.5]]),
        ];
        for t in &near_wall {
            r.submit_tri_to_queue(t, RenderStrategy::PreSorted, 1.0);
        }
        let far = tri([[-0.5, -0.5, 0.5], [0.5, -0.5, 0.5], [0.0, 0.5, 0.5]]);
        r.submit_tri_to_queue(&far, RenderStrategy::SoftwareDepthRasterize, 1.0);

        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        let stats = r.stats();
        assert_eq!(stats.presorted_depth_rastered, 2);
        assert_eq!(stats.tris_rastered, 0);
        assert_eq!(stats.spans_drawn, 0);
        assert_eq!(sink.len(), 2);
    }

    #[test]
    fn test_direct_tri_keeps_clip_position() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        let mut t = inside();
        for v in &mut t.verts {
            v.position[3] = 2.0;
        }
        r.submit_tri_to_queue(&t, RenderStrategy::DirectToGpu, 1.0);
        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        assert_eq!(sink[0].verts[0].position, [-0.5, -0.5]);
        assert_eq!(sink[0].verts[2].position, [0.0, 0.5]);
    }

    // ============================================================
    // Text overlay
    // ============================================================

    struct GlyphLoader;

    impl TextureLoader for GlyphLoader {
        fn load_texture(&mut self, _path: &Path) -> Option<crate::texture::LoadedTexture> {
            Some(crate::texture::LoadedTexture {
                width: 256,
                height: 96,
                handle: TextureHandle(42),
            })
        }
    }

    #[test]
    fn test_overlay_text_uses_atlas_cells() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.load_font_atlas(&mut GlyphLoader, Path::new("textures/glyphs.png"));
        r.begin_frame(8, 8);
        // 'A' is cell 33: column 1, row 2
        r.overlay_text("A", [0.0, 0.0], [1.0, 1.0, 1.0], 0.1, 0.1, false);

        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        assert_eq!(sink.len(), 2);
        assert!(sink.iter().all(|q| q.texture == TextureHandle(42)));
        let a = &sink[0].verts;
        let close = |uv: [f32; 2], want: [f32; 2]| (uv[0] - want[0]).abs() < 1e-6 && (uv[1] - want[1]).abs() < 1e-6;
        assert!(close(a[0].uv, [1.0 / 16.0, 2.0 / 6.0]));
        assert!(close(a[1].uv, [2.0 / 16.0, 2.0 / 6.0]));
        assert!(close(a[2].uv, [1.0 / 16.0, 3.0 / 6.0]));
        assert_eq!(a[1].position, [0.1, 0.0]);
        assert_eq!(a[2].position, [0.0, 0.1]);
    }

    #[test]
    fn test_overlay_text_skips_bytes_outside_atlas() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        r.overlay_text("a\tb\u{e9}", [0.0, 0.0], [1.0, 1.0, 1.0], 0.25, 0.1, false);

        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        // tab and both UTF-8 bytes of the accent draw nothing
        assert_eq!(sink.len(), 4);
        // 'b' keeps its third slot
        assert_eq!(sink[2].verts[0].position, [0.5, 0.0]);
        assert_eq!(sink[0].texture, TextureHandle::ERROR);
    }

    #[test]
    fn test_overlay_text_centred() {
        let mut r = GfxRenderer::new(config(8, 8));
        r.begin_frame(8, 8);
        r.overlay_text("ab", [0.0, 0.5], [1.0, 1.0, 1.0], 0.25, 0.1, true);
        let mut sink: Vec<TexturedQuad> = Vec::new();
        r.end_frame(&mut sink);
        assert_eq!(sink[0].verts[0].position, [-0.25, 0.5]);
        assert_eq!(sink[2].verts[0].position, [0.0, 0.5]);
    }
}
