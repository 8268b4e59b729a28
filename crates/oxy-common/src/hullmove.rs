// hullmove.rs — hull traces, slide deflection and hull-vs-hull contact tests

use crate::cmodel::BspData;
use crate::q_shared::{
    dot_product, vector_add, vector_length_squared, vector_ma, vector_subtract, CollisionHull,
    LineTraceResult, Vec3, VEC3_ORIGIN,
};

// ============================================================
// Constants
// ============================================================

/// Deflections per axis before the remaining motion is dropped.
pub const MAX_SLIDE_DEPTH: u32 = 4;

/// Remaining offsets shorter than this are not traced again.
const MIN_SLIDE_OFFSET_SQ: f32 = 1e-8;

// ============================================================
// Tracer seam
// ============================================================

/// Anything that can sweep a collision hull through static geometry.
pub trait HullTracer {
    fn hull_trace(&self, hull: CollisionHull, start: &Vec3, end: &Vec3) -> LineTraceResult;
}

impl HullTracer for BspData {
    /// Trace against the world model. `Point` uses the render tree, the
    /// sized hulls use their clip trees.
    fn hull_trace(&self, hull: CollisionHull, start: &Vec3, end: &Vec3) -> LineTraceResult {
        let head_nodes = &self.world_model().head_nodes;
        match hull.head_node_slot() {
            None => {
                let mut tr = LineTraceResult::new(end);
                tr.all_solid = false;
                tr
            }
            Some(0) => self.trace_render_tree(head_nodes[0], start, end),
            Some(slot) => self.trace_clip_hull(head_nodes[slot], start, end),
        }
    }
}

// ============================================================
// Slide
// ============================================================

/// Remove the component of `offset` along the unit `normal`.
fn clip_offset(offset: &Vec3, normal: &Vec3) -> Vec3 {
    vector_ma(offset, -dot_product(offset, normal), normal)
}

/// Move `offset` from `position`, deflecting along every surface hit.
/// Returns the displacement actually travelled.
pub fn recursive_slide_hull(
    tracer: &impl HullTracer,
    hull: CollisionHull,
    position: &Vec3,
    offset: &Vec3,
    depth: u32,
) -> Vec3 {
    if depth > MAX_SLIDE_DEPTH {
        return VEC3_ORIGIN;
    }

    let end = vector_add(position, offset);
    let tr = tracer.hull_trace(hull, position, &end);
    if !tr.hit {
        return *offset;
    }

    let moved = vector_subtract(&tr.end_pos, position);
    let remaining = vector_subtract(offset, &moved);
    let deflected = clip_offset(&remaining, &tr.plane_normal);
    if vector_length_squared(&deflected) < MIN_SLIDE_OFFSET_SQ {
        return moved;
    }
    vector_add(
        &moved,
        &recursive_slide_hull(tracer, hull, &tr.end_pos, &deflected, depth + 1),
    )
}

/// Resolve a requested move one axis at a time (X, then Y, then Z) and
/// return the final position.
pub fn calculate_hull_slide_movement(
    tracer: &impl HullTracer,
    hull: CollisionHull,
    position: &Vec3,
    distance: &Vec3,
) -> Vec3 {
    if hull == CollisionHull::None {
        return vector_add(position, distance);
    }

    let mut pos = *position;
    for axis in 0..3 {
        if distance[axis] == 0.0 {
            continue;
        }
        let mut offset = VEC3_ORIGIN;
        offset[axis] = distance[axis];
        let step = recursive_slide_hull(tracer, hull, &pos, &offset, 0);
        pos = vector_add(&pos, &step);
    }
    pos
}

// ============================================================
// Hull vs hull
// ============================================================

/// Overlap between two hull boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HullContact {
    /// Midpoint between the two hull origins.
    pub position: Vec3,
    /// Minimum-penetration vector. Adding it to the second box separates
    /// it from the first.
    pub push: Vec3,
}

fn hull_bounds(pos: &Vec3, hull: CollisionHull) -> (Vec3, Vec3) {
    (vector_add(pos, &hull.mins()), vector_add(pos, &hull.maxs()))
}

/// AABB overlap of hull `a` at `a_pos` and hull `b` at `b_pos`. Touching
/// boxes count as overlapping.
pub fn hull_overlap(
    a_pos: &Vec3,
    a_hull: CollisionHull,
    b_pos: &Vec3,
    b_hull: CollisionHull,
) -> Option<HullContact> {
    if a_hull == CollisionHull::None || b_hull == CollisionHull::None {
        return None;
    }
    let (amin, amax) = hull_bounds(a_pos, a_hull);
    let (bmin, bmax) = hull_bounds(b_pos, b_hull);

    let mut overlap = [0.0f32; 3];
    for i in 0..3 {
        if amax[i] < bmin[i] || amin[i] > bmax[i] {
            return None;
        }
        overlap[i] = amax[i].min(bmax[i]) - amin[i].max(bmin[i]);
    }

    let axis = if overlap[0] < overlap[1] && overlap[0] < overlap[2] {
        0
    } else if overlap[1] < overlap[2] {
        1
    } else {
        2
    };

    let mut push = VEC3_ORIGIN;
    push[axis] = if a_pos[axis] < b_pos[axis] {
        overlap[axis]
    } else {
        -overlap[axis]
    };

    Some(HullContact {
        position: [
            (a_pos[0] + b_pos[0]) * 0.5,
            (a_pos[1] + b_pos[1]) * 0.5,
            (a_pos[2] + b_pos[2]) * 0.5,
        ],
        push,
    })
}

/// Does the sphere at `center` touch the hull box at `pos`?
pub fn is_within_radius(pos: &Vec3, hull: CollisionHull, center: &Vec3, radius: f32) -> bool {
    if hull == CollisionHull::None {
        return false;
    }
    let (mins, maxs) = hull_bounds(pos, hull);
    let closest = [
        center[0].clamp(mins[0], maxs[0]),
        center[1].clamp(mins[1], maxs[1]),
        center[2].clamp(mins[2], maxs[2]),
    ];
    vector_length_squared(&vector_subtract(center, &closest)) <= radius * radius
}

/// Ray hit on a hull box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub position: Vec3,
    pub normal: Vec3,
    pub fraction: f32,
}

/// Slab test of the segment `start -> end` against the hull box at `pos`.
/// A segment starting inside the box does not hit.
pub fn ray_vs_hull(pos: &Vec3, hull: CollisionHull, start: &Vec3, end: &Vec3) -> Option<RayHit> {
    if hull == CollisionHull::None {
        return None;
    }
    let (mins, maxs) = hull_bounds(pos, hull);
    let dir = vector_subtract(end, start);

    let mut tmin = 0.0f32;
    let mut tmax = 1.0f32;
    let mut hit_axis = None;
    for i in 0..3 {
        if dir[i] == 0.0 {
            if start[i] < mins[i] || start[i] > maxs[i] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / dir[i];
        let mut t0 = (mins[i] - start[i]) * inv;
        let mut t1 = (maxs[i] - start[i]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > tmin {
            tmin = t0;
            hit_axis = Some(i);
        }
        tmax = tmax.min(t1);
        if tmin > tmax {
            return None;
        }
    }

    let axis = hit_axis?;
    let mut normal = VEC3_ORIGIN;
    normal[axis] = if dir[axis] > 0.0 { -1.0 } else { 1.0 };
    Some(RayHit {
        position: vector_ma(start, tmin, &dir),
        normal,
        fraction: tmin,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmodel::test_fixture::floor_map;
    use crate::q_shared::vector_reflect;

    /// Open air, nothing to hit.
    struct OpenAirTracer;

    impl HullTracer for OpenAirTracer {
        fn hull_trace(&self, _hull: CollisionHull, _start: &Vec3, end: &Vec3) -> LineTraceResult {
            let mut tr = LineTraceResult::new(end);
            tr.all_solid = false;
            tr
        }
    }

    /// Stub tracer that is solid everywhere.
    struct SolidTracer;

    impl HullTracer for SolidTracer {
        fn hull_trace(&self, _hull: CollisionHull, start: &Vec3, _end: &Vec3) -> LineTraceResult {
            let mut tr = LineTraceResult::new(start);
            tr.hit = true;
            tr.start_solid = true;
            tr.fraction = 0.0;
            tr
        }
    }

    fn floor() -> BspData {
        BspData::load(&floor_map().build()).unwrap()
    }

    // ============================================================
    // Slide
    // ============================================================

    #[test]
    fn test_slide_open_air_moves_full_distance() {
        let pos = calculate_hull_slide_movement(
            &OpenAirTracer,
            CollisionHull::Player,
            &[1.0, 2.0, 3.0],
            &[10.0, -5.0, 2.0],
        );
        assert_eq!(pos, [11.0, -3.0, 5.0]);
    }

    #[test]
    fn test_slide_into_floor_stops_at_boundary() {
        let bsp = floor();
        let pos = calculate_hull_slide_movement(
            &bsp,
            CollisionHull::Player,
            &[0.0, 0.0, 10.0],
            &[0.0, 0.0, -50.0],
        );
        assert!(pos[2] >= 0.0 && pos[2] < 0.1, "{:?}", pos);
    }

    #[test]
    fn test_slide_diagonal_keeps_horizontal_motion() {
        let bsp = floor();
        let pos = calculate_hull_slide_movement(
            &bsp,
            CollisionHull::Grenade,
            &[0.0, 0.0, 5.0],
            &[20.0, 10.0, -30.0],
        );
        assert_eq!(pos[0], 20.0);
        assert_eq!(pos[1], 10.0);
        assert!(pos[2] >= 0.0 && pos[2] < 0.1);
    }

    #[test]
    fn test_slide_stuck_in_solid_does_not_move() {
        let pos = calculate_hull_slide_movement(
            &SolidTracer,
            CollisionHull::Player,
            &[4.0, 4.0, 4.0],
            &[10.0, 10.0, 10.0],
        );
        assert_eq!(pos, [4.0, 4.0, 4.0]);
    }

    #[test]
    fn test_slide_none_hull_ignores_world() {
        let pos = calculate_hull_slide_movement(
            &SolidTracer,
            CollisionHull::None,
            &[0.0; 3],
            &[1.0, 2.0, 3.0],
        );
        assert_eq!(pos, [1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_recursive_slide_projects_onto_plane() {
        let bsp = floor();
        let moved = recursive_slide_hull(&bsp, CollisionHull::Player, &[0.0, 0.0, 10.0], &[30.0, 0.0, -20.0], 0);
        // the horizontal part survives the deflection
        assert!((moved[0] - 30.0).abs() < 1e-3, "{:?}", moved);
        assert!(10.0 + moved[2] >= 0.0);
    }

    #[test]
    fn test_point_hull_uses_render_tree() {
        let bsp = floor();
        let tr = bsp.hull_trace(CollisionHull::Point, &[0.0, 0.0, 5.0], &[0.0, 0.0, -5.0]);
        assert!(tr.hit);
        let none = bsp.hull_trace(CollisionHull::None, &[0.0, 0.0, 5.0], &[0.0, 0.0, -5.0]);
        assert!(!none.hit);
    }

    // ============================================================
    // Hull vs hull
    // ============================================================

    #[test]
    fn test_hull_overlap_min_axis_push() {
        let a = [0.0, 0.0, 0.0];
        let b = [40.0, 0.0, 0.0];
        let c = hull_overlap(&a, CollisionHull::Player, &b, CollisionHull::Player).unwrap();
        assert_eq!(c.push, [8.0, 0.0, 0.0]);
        let moved = vector_add(&b, &c.push);
        assert!(hull_overlap(&a, CollisionHull::Player, &moved, CollisionHull::Player)
            .map_or(true, |c| c.push[0] == 0.0));
    }

    #[test]
    fn test_hull_overlap_push_direction_negative() {
        let c = hull_overlap(
            &[0.0, 0.0, 0.0],
            CollisionHull::Grenade,
            &[0.0, -20.0, 0.0],
            CollisionHull::Grenade,
        )
        .unwrap();
        assert_eq!(c.push, [0.0, -4.0, 0.0]);
    }

    #[test]
    fn test_hull_no_overlap() {
        assert!(hull_overlap(
            &[0.0; 3],
            CollisionHull::Grenade,
            &[100.0, 0.0, 0.0],
            CollisionHull::Grenade
        )
        .is_none());
        assert!(hull_overlap(&[0.0; 3], CollisionHull::None, &[0.0; 3], CollisionHull::Player).is_none());
    }

    #[test]
    fn test_is_within_radius() {
        let pos = [0.0, 0.0, 0.0];
        assert!(is_within_radius(&pos, CollisionHull::Grenade, &[20.0, 0.0, 0.0], 8.0));
        assert!(!is_within_radius(&pos, CollisionHull::Grenade, &[20.0, 0.0, 0.0], 7.9));
        assert!(is_within_radius(&pos, CollisionHull::Grenade, &[1.0, 1.0, 1.0], 0.0));
    }

    #[test]
    fn test_ray_vs_hull() {
        let hit = ray_vs_hull(
            &[100.0, 0.0, 0.0],
            CollisionHull::Grenade,
            &[0.0, 0.0, 0.0],
            &[200.0, 0.0, 0.0],
        )
        .unwrap();
        assert!((hit.position[0] - 88.0).abs() < 1e-3);
        assert_eq!(hit.position[1], 0.0);
        assert_eq!(hit.normal, [-1.0, 0.0, 0.0]);
        assert!((hit.fraction - 0.44).abs() < 1e-6);

        assert!(ray_vs_hull(
            &[100.0, 50.0, 0.0],
            CollisionHull::Grenade,
            &[0.0, 0.0, 0.0],
            &[200.0, 0.0, 0.0]
        )
        .is_none());
    }

    #[test]
    fn test_bounce_reflection_reverses_normal_component() {
        let v = [100.0, 0.0, -250.0];
        let n = [0.0, 0.0, 1.0];
        let out = vector_reflect(&v, &n);
        assert!((dot_product(&out, &n) + dot_product(&v, &n)).abs() < 1e-4);
    }
}
