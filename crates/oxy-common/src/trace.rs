// trace.rs — recursive segment classification against render and clip trees

use crate::cmodel::BspData;
use crate::q_shared::{vector_lerp, vector_scale, CPlane, LineTraceResult, Vec3, CONTENTS_SOLID};

/// Split points are pulled this far back toward the start side so a trace
/// that stops on a plane never begins the next one embedded in it.
pub const DIST_EPSILON: f32 = 0.032;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tree {
    Clip,
    Render,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Clear,
    /// Solid was reached. `at_start` is true when the solid begins at the
    /// first point of the sub-segment that was traced.
    Hit { at_start: bool },
}

impl BspData {
    /// Trace `start -> end` through the clip tree rooted at `head`.
    pub fn trace_clip_hull(&self, head: i32, start: &Vec3, end: &Vec3) -> LineTraceResult {
        self.trace_tree(Tree::Clip, head, start, end)
    }

    /// Trace `start -> end` through the render tree rooted at `head`,
    /// treating solid leaves as blocking.
    pub fn trace_render_tree(&self, head: i32, start: &Vec3, end: &Vec3) -> LineTraceResult {
        self.trace_tree(Tree::Render, head, start, end)
    }

    fn trace_tree(&self, tree: Tree, head: i32, start: &Vec3, end: &Vec3) -> LineTraceResult {
        let mut trace = LineTraceResult::new(end);
        let step = self.recursive_trace(tree, head, 0.0, 1.0, start, end, true, &mut trace);
        if step == (Step::Hit { at_start: true }) {
            trace.hit = true;
            trace.fraction = 0.0;
            trace.end_pos = *start;
        }
        trace
    }

    fn tree_contents(&self, tree: Tree, child: i32) -> i32 {
        match tree {
            Tree::Clip => child,
            Tree::Render => self.leaves[(-child - 1) as usize].contents,
        }
    }

    fn tree_node(&self, tree: Tree, node: usize) -> (&CPlane, [i32; 2]) {
        match tree {
            Tree::Clip => {
                let n = &self.clip_nodes[node];
                (self.plane(n.plane_idx), [n.children[0] as i32, n.children[1] as i32])
            }
            Tree::Render => {
                let n = &self.nodes[node];
                (self.plane(n.plane_idx), [n.children[0] as i32, n.children[1] as i32])
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn recursive_trace(
        &self,
        tree: Tree,
        node: i32,
        p1f: f32,
        p2f: f32,
        p1: &Vec3,
        p2: &Vec3,
        at_origin: bool,
        trace: &mut LineTraceResult,
    ) -> Step {
        // content code
        if node < 0 {
            if self.tree_contents(tree, node) == CONTENTS_SOLID {
                if at_origin {
                    trace.start_solid = true;
                }
                return Step::Hit { at_start: true };
            }
            trace.all_solid = false;
            return Step::Clear;
        }

        let (plane, children) = self.tree_node(tree, node as usize);
        let t1 = plane.distance(p1);
        let t2 = plane.distance(p2);

        if t1 >= 0.0 && t2 >= 0.0 {
            return self.recursive_trace(tree, children[0], p1f, p2f, p1, p2, at_origin, trace);
        }
        if t1 < 0.0 && t2 < 0.0 {
            return self.recursive_trace(tree, children[1], p1f, p2f, p1, p2, at_origin, trace);
        }

        // put the crosspoint DIST_EPSILON pixels on the near side
        let frac = if t1 < 0.0 {
            (t1 + DIST_EPSILON) / (t1 - t2)
        } else {
            (t1 - DIST_EPSILON) / (t1 - t2)
        }
        .clamp(0.0, 1.0);

        let midf = p1f + (p2f - p1f) * frac;
        let mid = vector_lerp(p1, p2, frac);
        let side = if t1 >= 0.0 { 0 } else { 1 };

        // near side first; a hit there shares our start point
        let near = self.recursive_trace(tree, children[side], p1f, midf, p1, &mid, at_origin, trace);
        if near != Step::Clear {
            // started in solid: the far side still decides all_solid
            if at_origin && trace.all_solid {
                let mut probe = *trace;
                self.recursive_trace(tree, children[side ^ 1], midf, p2f, &mid, p2, false, &mut probe);
                trace.all_solid = probe.all_solid;
            }
            return near;
        }

        match self.recursive_trace(tree, children[side ^ 1], midf, p2f, &mid, p2, false, trace) {
            Step::Clear => Step::Clear,
            Step::Hit { at_start: true } => {
                // the far side is solid from the split on: this plane is the impact surface
                if side == 0 {
                    trace.plane_normal = plane.normal;
                    trace.plane_dist = plane.dist;
                } else {
                    trace.plane_normal = vector_scale(&plane.normal, -1.0);
                    trace.plane_dist = -plane.dist;
                }
                trace.hit = true;
                trace.fraction = midf;
                trace.end_pos = mid;
                Step::Hit { at_start: false }
            }
            deeper => deeper,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bspfile::ClipNode;
    use crate::cmodel::test_fixture::*;
    use crate::q_shared::{CONTENTS_EMPTY, CONTENTS_WATER};

    fn floor() -> BspData {
        BspData::load(&floor_map().build()).unwrap()
    }

    // ============================================================
    // Single-plane clip tree
    // ============================================================

    #[test]
    fn test_trace_down_through_floor() {
        let bsp = floor();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, 100.0], &[0.0, 0.0, -100.0]);
        assert!(tr.hit);
        assert!(!tr.start_solid);
        assert!(!tr.all_solid);
        assert_eq!(tr.plane_normal, [0.0, 0.0, 1.0]);
        assert!(tr.end_pos[2] > 0.0 && tr.end_pos[2] < 0.1, "{:?}", tr.end_pos);
        assert!((tr.fraction - 0.49984).abs() < 1e-4);
    }

    #[test]
    fn test_trace_is_deterministic() {
        let bsp = floor();
        let a = bsp.trace_clip_hull(0, &[3.0, -7.0, 55.0], &[-20.0, 4.0, -13.0]);
        let b = bsp.trace_clip_hull(0, &[3.0, -7.0, 55.0], &[-20.0, 4.0, -13.0]);
        assert_eq!(format!("{:?}", a), format!("{:?}", b));
        assert_eq!(a.end_pos.map(f32::to_bits), b.end_pos.map(f32::to_bits));
    }

    #[test]
    fn test_trace_in_open_space() {
        let bsp = floor();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, 10.0], &[50.0, 0.0, 20.0]);
        assert!(!tr.hit);
        assert!(!tr.all_solid);
        assert_eq!(tr.fraction, 1.0);
        assert_eq!(tr.end_pos, [50.0, 0.0, 20.0]);
    }

    #[test]
    fn test_trace_starting_in_solid() {
        let bsp = floor();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, -10.0], &[0.0, 0.0, 10.0]);
        assert!(tr.hit);
        assert!(tr.start_solid);
        assert!(!tr.all_solid);
        assert_eq!(tr.end_pos, [0.0, 0.0, -10.0]);
        assert_eq!(tr.fraction, 0.0);
    }

    #[test]
    fn test_trace_entirely_in_solid() {
        let bsp = floor();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, -10.0], &[5.0, 0.0, -20.0]);
        assert!(tr.start_solid);
        assert!(tr.all_solid);
    }

    #[test]
    fn test_trace_starting_on_plane_is_not_embedded() {
        let bsp = floor();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, 0.01], &[0.0, 0.0, -10.0]);
        assert!(tr.hit);
        assert!(!tr.start_solid);
        assert_eq!(tr.end_pos, [0.0, 0.0, 0.01]);
    }

    #[test]
    fn test_trace_out_of_solid_hits_nothing_after_start() {
        // leaving solid reports the start but the normal stays unset
        let bsp = floor();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, -5.0], &[0.0, 0.0, 5.0]);
        assert!(tr.start_solid);
        assert_eq!(tr.plane_normal, [0.0; 3]);
    }

    // ============================================================
    // Multi-node clip tree
    // ============================================================

    #[test]
    fn test_trace_water_is_not_blocking() {
        // z >= 0 empty, below: water down to z = -32, then solid
        let mut b = floor_map();
        b.planes.push(CPlane {
            normal: [0.0, 0.0, 1.0],
            dist: -32.0,
            plane_type: 2,
        });
        b.clip_nodes = vec![
            ClipNode {
                plane_idx: 0,
                children: [CONTENTS_EMPTY as i16, 1],
            },
            ClipNode {
                plane_idx: 1,
                children: [CONTENTS_WATER as i16, CONTENTS_SOLID as i16],
            },
        ];
        let bsp = BspData::load(&b.build()).unwrap();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, 50.0], &[0.0, 0.0, -100.0]);
        assert!(tr.hit);
        assert_eq!(tr.plane_normal, [0.0, 0.0, 1.0]);
        assert!((tr.end_pos[2] + 32.0).abs() < 0.1, "{:?}", tr.end_pos);
    }

    #[test]
    fn test_trace_upward_into_ceiling_flips_normal() {
        // solid above z = 0
        let mut b = floor_map();
        b.clip_nodes[0].children = [CONTENTS_SOLID as i16, CONTENTS_EMPTY as i16];
        let bsp = BspData::load(&b.build()).unwrap();
        let tr = bsp.trace_clip_hull(0, &[0.0, 0.0, -50.0], &[0.0, 0.0, 50.0]);
        assert!(tr.hit);
        assert_eq!(tr.plane_normal, [-0.0, -0.0, -1.0]);
        assert!(tr.end_pos[2] < 0.0 && tr.end_pos[2] > -0.1);
    }

    // ============================================================
    // Render tree
    // ============================================================

    #[test]
    fn test_render_tree_trace_uses_leaf_contents() {
        let bsp = floor();
        let tr = bsp.trace_render_tree(0, &[10.0, 10.0, 30.0], &[10.0, 10.0, -30.0]);
        assert!(tr.hit);
        assert_eq!(tr.plane_normal, [0.0, 0.0, 1.0]);
        assert!(tr.end_pos[2] > 0.0 && tr.end_pos[2] < 0.1);
    }
}
