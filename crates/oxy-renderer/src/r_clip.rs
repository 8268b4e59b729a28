// r_clip.rs — homogeneous clip-space culling, polygon clipping and NDC conversion

use bitflags::bitflags;
use oxy_common::q_shared::Vec4;

use crate::gfx_types::{CullType, GfxTri, GfxVertex};

/// Largest ring a triangle can grow to after six clip planes.
pub const MAX_CLIP_VERTS: usize = 12;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct ClipCode: u8 {
        const NEAR = 1 << 0;
        const FAR = 1 << 1;
        const LEFT = 1 << 2;
        const RIGHT = 1 << 3;
        const TOP = 1 << 4;
        const BOTTOM = 1 << 5;
    }
}

/// Plane equations in clip space, indexed by clip-code bit. A vertex is
/// inside when `dot(plane, position) >= 0`.
const CLIP_PLANES: [(ClipCode, Vec4); 6] = [
    (ClipCode::NEAR, [0.0, 0.0, 1.0, 1.0]),
    (ClipCode::FAR, [0.0, 0.0, -1.0, 1.0]),
    (ClipCode::LEFT, [1.0, 0.0, 0.0, 1.0]),
    (ClipCode::RIGHT, [-1.0, 0.0, 0.0, 1.0]),
    (ClipCode::TOP, [0.0, -1.0, 0.0, 1.0]),
    (ClipCode::BOTTOM, [0.0, 1.0, 0.0, 1.0]),
];

#[inline]
fn dot4(a: &Vec4, b: &Vec4) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2] + a[3] * b[3]
}

/// Planes a clip-space position lies outside of.
pub fn clip_code(p: &Vec4) -> ClipCode {
    let mut code = ClipCode::empty();
    for (bit, plane) in &CLIP_PLANES {
        if dot4(plane, p) < 0.0 {
            code |= *bit;
        }
    }
    code
}

/// Union and intersection of the three vertex codes.
pub fn tri_clip_codes(tri: &GfxTri) -> (ClipCode, ClipCode) {
    let mut or = ClipCode::empty();
    let mut and = ClipCode::all();
    for v in &tri.verts {
        let c = clip_code(&v.position);
        or |= c;
        and &= c;
    }
    (or, and)
}

/// True when every vertex is outside the same frustum plane.
pub fn cull_clip_space_tri(tri: &GfxTri) -> bool {
    !tri_clip_codes(tri).1.is_empty()
}

// ============================================================
// Sutherland-Hodgman
// ============================================================

/// Clip `tri` against every plane in `planes` and fan the surviving ring.
/// Calls `emit` once per output triangle.
pub fn clip_triangle<F: FnMut(GfxTri)>(tri: &GfxTri, planes: ClipCode, mut emit: F) {
    let mut ring: Vec<GfxVertex> = Vec::with_capacity(MAX_CLIP_VERTS);
    let mut out: Vec<GfxVertex> = Vec::with_capacity(MAX_CLIP_VERTS);
    ring.extend_from_slice(&tri.verts);

    for (bit, plane) in &CLIP_PLANES {
        if !planes.contains(*bit) {
            continue;
        }
        out.clear();
        let n = ring.len();
        for i in 0..n {
            let cur = &ring[i];
            let next = &ring[(i + 1) % n];
            let d1 = dot4(plane, &cur.position);
            let d2 = dot4(plane, &next.position);
            let cur_in = d1 >= 0.0;
            let next_in = d2 >= 0.0;

            if cur_in && out.len() < MAX_CLIP_VERTS {
                out.push(*cur);
            }
            if cur_in != next_in && out.len() < MAX_CLIP_VERTS {
                // interpolate from the inside vertex for stable results
                let v = if cur_in {
                    cur.lerp(next, d1 / (d1 - d2))
                } else {
                    next.lerp(cur, d2 / (d2 - d1))
                };
                out.push(v);
            }
        }
        if out.len() < 3 {
            return;
        }
        std::mem::swap(&mut ring, &mut out);
    }

    for i in 1..ring.len() - 1 {
        emit(tri.with_verts([ring[0], ring[i], ring[i + 1]]));
    }
}

// ============================================================
// NDC
// ============================================================

/// Divide x, y and z by w in place. `w` itself is kept.
pub fn perspective_divide(tri: &mut GfxTri) {
    for v in &mut tri.verts {
        let w = v.position[3];
        if w.abs() < 1e-6 {
            continue;
        }
        v.position[0] /= w;
        v.position[1] /= w;
        v.position[2] /= w;
    }
}

/// Signed area term of the NDC triangle; positive is counter-clockwise.
#[inline]
pub fn ndc_winding(tri: &GfxTri) -> f32 {
    let [a, b, c] = &tri.verts;
    let e1 = [b.position[0] - a.position[0], b.position[1] - a.position[1]];
    let e2 = [c.position[0] - a.position[0], c.position[1] - a.position[1]];
    e1[0] * e2[1] - e1[1] * e2[0]
}

/// Face culling on an NDC triangle.
pub fn face_culled(tri: &GfxTri) -> bool {
    match tri.cull {
        CullType::None => false,
        CullType::Backface => ndc_winding(tri) < 0.0,
        CullType::Frontface => ndc_winding(tri) > 0.0,
    }
}

/// Perspective divide followed by face culling. Returns true when the
/// triangle should be dropped.
pub fn convert_tri_to_ndc_and_cull(tri: &mut GfxTri) -> bool {
    perspective_divide(tri);
    face_culled(tri)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri(p: [[f32; 4]; 3]) -> GfxTri {
        GfxTri {
            verts: [
                GfxVertex::new(p[0], [0.0, 0.0]),
                GfxVertex::new(p[1], [1.0, 0.0]),
                GfxVertex::new(p[2], [0.0, 1.0]),
            ],
            ..Default::default()
        }
    }

    fn clip_count(t: &GfxTri) -> usize {
        let (or, and) = tri_clip_codes(t);
        if !and.is_empty() {
            return 0;
        }
        let mut n = 0;
        clip_triangle(t, or, |_| n += 1);
        n
    }

    // ============================================================
    // Clip codes
    // ============================================================

    #[test]
    fn test_clip_code_inside_is_empty() {
        assert!(clip_code(&[0.0, 0.0, 0.0, 1.0]).is_empty());
        assert!(clip_code(&[1.0, -1.0, 1.0, 1.0]).is_empty());
    }

    #[test]
    fn test_clip_code_each_plane() {
        assert_eq!(clip_code(&[0.0, 0.0, -2.0, 1.0]), ClipCode::NEAR);
        assert_eq!(clip_code(&[0.0, 0.0, 2.0, 1.0]), ClipCode::FAR);
        assert_eq!(clip_code(&[-2.0, 0.0, 0.0, 1.0]), ClipCode::LEFT);
        assert_eq!(clip_code(&[2.0, 0.0, 0.0, 1.0]), ClipCode::RIGHT);
        assert_eq!(clip_code(&[0.0, 2.0, 0.0, 1.0]), ClipCode::TOP);
        assert_eq!(clip_code(&[0.0, -2.0, 0.0, 1.0]), ClipCode::BOTTOM);
    }

    #[test]
    fn test_cull_only_when_all_outside_one_plane() {
        let behind = tri([
            [0.0, 0.0, -2.0, 1.0],
            [1.0, 0.0, -3.0, 1.0],
            [0.0, 1.0, -2.5, 1.0],
        ]);
        assert!(cull_clip_space_tri(&behind));

        // outside two different planes but not all on one
        let straddle = tri([
            [-2.0, 0.0, 0.0, 1.0],
            [2.0, 0.0, 0.0, 1.0],
            [0.0, 0.5, 0.0, 1.0],
        ]);
        assert!(!cull_clip_space_tri(&straddle));
    }

    // ============================================================
    // Clipping
    // ============================================================

    #[test]
    fn test_clip_inside_gives_one() {
        let t = tri([
            [-0.5, -0.5, 0.0, 1.0],
            [0.5, -0.5, 0.0, 1.0],
            [0.0, 0.5, 0.0, 1.0],
        ]);
        assert_eq!(clip_count(&t), 1);
    }

    #[test]
    fn test_clip_one_plane_gives_two() {
        // one vertex past the right plane: ring becomes a quad
        let t = tri([
            [-0.5, -0.5, 0.0, 1.0],
            [2.0, 0.0, 0.0, 1.0],
            [-0.5, 0.5, 0.0, 1.0],
        ]);
        assert_eq!(clip_count(&t), 2);
    }

    #[test]
    fn test_clip_outside_gives_zero() {
        let t = tri([
            [2.0, -0.5, 0.0, 1.0],
            [3.0, -0.5, 0.0, 1.0],
            [2.5, 0.5, 0.0, 1.0],
        ]);
        assert_eq!(clip_count(&t), 0);
    }

    #[test]
    fn test_clipped_verts_lie_inside() {
        let t = tri([
            [-0.5, -0.5, 0.0, 1.0],
            [2.0, 0.0, 0.0, 1.0],
            [-0.5, 0.5, 0.0, 1.0],
        ]);
        clip_triangle(&t, ClipCode::RIGHT, |out| {
            for v in &out.verts {
                assert!(v.position[0] <= 1.0 + 1e-5);
            }
        });
    }

    #[test]
    fn test_clip_interpolates_uv() {
        // edge from x=0 to x=2 crosses x=1 halfway
        let t = tri([
            [0.0, -0.5, 0.0, 1.0],
            [2.0, -0.5, 0.0, 1.0],
            [0.0, 0.5, 0.0, 1.0],
        ]);
        let mut found = false;
        clip_triangle(&t, ClipCode::RIGHT, |out| {
            for v in &out.verts {
                if (v.position[0] - 1.0).abs() < 1e-5 && (v.position[1] + 0.5).abs() < 1e-5 {
                    assert!((v.uv[0] - 0.5).abs() < 1e-5);
                    found = true;
                }
            }
        });
        assert!(found);
    }

    #[test]
    fn test_clip_keeps_material() {
        let mut t = tri([
            [-0.5, -0.5, 0.0, 1.0],
            [2.0, 0.0, 0.0, 1.0],
            [-0.5, 0.5, 0.0, 1.0],
        ]);
        t.colour = [0.25, 0.5, 0.75];
        t.cull = CullType::Frontface;
        clip_triangle(&t, ClipCode::RIGHT, |out| {
            assert_eq!(out.colour, [0.25, 0.5, 0.75]);
            assert_eq!(out.cull, CullType::Frontface);
        });
    }

    // ============================================================
    // NDC + culling
    // ============================================================

    #[test]
    fn test_perspective_divide() {
        let mut t = tri([
            [2.0, 4.0, 1.0, 2.0],
            [0.0, 0.0, 0.0, 1.0],
            [1.0, 1.0, 1.0, 0.0],
        ]);
        perspective_divide(&mut t);
        assert_eq!(t.verts[0].position, [1.0, 2.0, 0.5, 2.0]);
        // w == 0 left untouched
        assert_eq!(t.verts[2].position, [1.0, 1.0, 1.0, 0.0]);
    }

    #[test]
    fn test_backface_and_frontface() {
        let ccw = [
            [0.0, 0.0, 0.0, 1.0],
            [1.0, 0.0, 0.0, 1.0],
            [0.0, 1.0, 0.0, 1.0],
        ];
        let cw = [ccw[0], ccw[2], ccw[1]];

        let mut t = tri(ccw);
        t.cull = CullType::Backface;
        assert!(!convert_tri_to_ndc_and_cull(&mut t.clone()));
        t.cull = CullType::Frontface;
        assert!(convert_tri_to_ndc_and_cull(&mut t));

        let mut t = tri(cw);
        t.cull = CullType::Backface;
        assert!(convert_tri_to_ndc_and_cull(&mut t));
        t.cull = CullType::None;
        assert!(!convert_tri_to_ndc_and_cull(&mut t));
    }
}
