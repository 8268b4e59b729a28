// q_shared.rs — foundational types and functions shared by all modules

// ============================================================
// Basic types
// ============================================================

pub type Vec3 = [f32; 3];
pub type Vec4 = [f32; 4];

/// Row-major 4x4 matrix. Points are row vectors: `p' = p * M`.
pub type Mat4 = [[f32; 4]; 4];

pub const VEC3_ORIGIN: Vec3 = [0.0, 0.0, 0.0];

pub const MAT4_IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

// ============================================================
// Contents codes (negative child values in clip trees)
// ============================================================

pub const CONTENTS_EMPTY: i32 = -1;
pub const CONTENTS_SOLID: i32 = -2;
pub const CONTENTS_WATER: i32 = -3;
pub const CONTENTS_SLIME: i32 = -4;
pub const CONTENTS_LAVA: i32 = -5;
pub const CONTENTS_SKY: i32 = -6;
pub const CONTENTS_ORIGIN: i32 = -7;
pub const CONTENTS_CLIP: i32 = -8;
pub const CONTENTS_CURRENT_0: i32 = -9;
pub const CONTENTS_CURRENT_90: i32 = -10;
pub const CONTENTS_CURRENT_180: i32 = -11;
pub const CONTENTS_CURRENT_270: i32 = -12;
pub const CONTENTS_CURRENT_UP: i32 = -13;
pub const CONTENTS_CURRENT_DOWN: i32 = -14;
pub const CONTENTS_TRANSLUCENT: i32 = -15;

/// True for every content code a clip tree is allowed to terminate in.
#[inline]
pub fn is_valid_contents(c: i32) -> bool {
    (CONTENTS_TRANSLUCENT..=CONTENTS_EMPTY).contains(&c)
}

// ============================================================
// Plane
// ============================================================

// plane_t structure
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CPlane {
    pub normal: Vec3,
    pub dist: f32,
    pub plane_type: u32,
}

impl Default for CPlane {
    fn default() -> Self {
        Self {
            normal: [0.0; 3],
            dist: 0.0,
            plane_type: 0,
        }
    }
}

impl CPlane {
    /// Signed distance of `p` from the plane.
    #[inline]
    pub fn distance(&self, p: &Vec3) -> f32 {
        dot_product(&self.normal, p) - self.dist
    }
}

// ============================================================
// Entity ids
// ============================================================

/// Stable handle into the world's entity arena. A handle whose slot was
/// reused carries a stale generation and resolves to nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityId {
    pub index: u32,
    pub generation: u32,
}

// ============================================================
// Collision hulls
// ============================================================

/// Hull sizes baked into the clip trees. The discriminant is the model
/// head-node slot the hull traces against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CollisionHull {
    #[default]
    None,
    Point,
    Player,
    PlayerCrouched,
    Grenade,
}

impl CollisionHull {
    pub fn head_node_slot(self) -> Option<usize> {
        match self {
            CollisionHull::None => None,
            CollisionHull::Point => Some(0),
            CollisionHull::Player => Some(1),
            CollisionHull::PlayerCrouched => Some(2),
            CollisionHull::Grenade => Some(3),
        }
    }

    pub fn mins(self) -> Vec3 {
        match self {
            CollisionHull::None | CollisionHull::Point => VEC3_ORIGIN,
            CollisionHull::Player | CollisionHull::PlayerCrouched => [-24.0, -24.0, -48.0],
            CollisionHull::Grenade => [-12.0, -12.0, -12.0],
        }
    }

    pub fn maxs(self) -> Vec3 {
        match self {
            CollisionHull::None | CollisionHull::Point => VEC3_ORIGIN,
            CollisionHull::Player | CollisionHull::PlayerCrouched => [24.0, 24.0, 48.0],
            CollisionHull::Grenade => [12.0, 12.0, 12.0],
        }
    }
}

// ============================================================
// Trace result
// ============================================================

/// Result of a segment trace against a BSP tree or entity hulls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineTraceResult {
    /// No empty space was found along the whole segment.
    pub all_solid: bool,
    /// The segment's start point is inside solid.
    pub start_solid: bool,
    pub hit: bool,
    /// Fraction of the segment travelled before the hit.
    pub fraction: f32,
    pub end_pos: Vec3,
    pub plane_normal: Vec3,
    pub plane_dist: f32,
    pub hit_entity: Option<EntityId>,
}

impl LineTraceResult {
    /// An untouched result for a trace that has not descended yet.
    pub fn new(end: &Vec3) -> Self {
        Self {
            all_solid: true,
            start_solid: false,
            hit: false,
            fraction: 1.0,
            end_pos: *end,
            plane_normal: VEC3_ORIGIN,
            plane_dist: 0.0,
            hit_entity: None,
        }
    }
}

impl Default for LineTraceResult {
    fn default() -> Self {
        Self::new(&VEC3_ORIGIN)
    }
}

// ============================================================
// Vector math
// ============================================================

#[inline]
pub fn dot_product(a: &Vec3, b: &Vec3) -> f32 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
pub fn vector_subtract(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vector_add(a: &Vec3, b: &Vec3) -> Vec3 {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

/// veca + scale * vecb
#[inline]
pub fn vector_ma(veca: &Vec3, scale: f32, vecb: &Vec3) -> Vec3 {
    [
        veca[0] + scale * vecb[0],
        veca[1] + scale * vecb[1],
        veca[2] + scale * vecb[2],
    ]
}

#[inline]
pub fn vector_scale(v: &Vec3, scale: f32) -> Vec3 {
    [v[0] * scale, v[1] * scale, v[2] * scale]
}

pub fn vector_length_squared(v: &Vec3) -> f32 {
    dot_product(v, v)
}

pub fn vector_length(v: &Vec3) -> f32 {
    vector_length_squared(v).sqrt()
}

pub fn vector_normalize(v: &mut Vec3) -> f32 {
    let length = vector_length(v);
    if length != 0.0 {
        let ilength = 1.0 / length;
        v[0] *= ilength;
        v[1] *= ilength;
        v[2] *= ilength;
    }
    length
}

pub fn cross_product(v1: &Vec3, v2: &Vec3) -> Vec3 {
    [
        v1[1] * v2[2] - v1[2] * v2[1],
        v1[2] * v2[0] - v1[0] * v2[2],
        v1[0] * v2[1] - v1[1] * v2[0],
    ]
}

/// Linear interpolation between two points.
#[inline]
pub fn vector_lerp(a: &Vec3, b: &Vec3, frac: f32) -> Vec3 {
    [
        a[0] + frac * (b[0] - a[0]),
        a[1] + frac * (b[1] - a[1]),
        a[2] + frac * (b[2] - a[2]),
    ]
}

/// Reflect `v` about the unit normal `n`.
pub fn vector_reflect(v: &Vec3, n: &Vec3) -> Vec3 {
    vector_ma(v, -2.0 * dot_product(v, n), n)
}

// ============================================================
// Matrix math
// ============================================================

/// Transform a row vector: `v * m`.
pub fn vec4_mul_mat4(v: &Vec4, m: &Mat4) -> Vec4 {
    let mut out = [0.0f32; 4];
    for (col, o) in out.iter_mut().enumerate() {
        *o = v[0] * m[0][col] + v[1] * m[1][col] + v[2] * m[2][col] + v[3] * m[3][col];
    }
    out
}

/// `a * b`, so that `v * (a * b) == (v * a) * b`.
pub fn mat4_mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let mut out = [[0.0f32; 4]; 4];
    for (r, row) in out.iter_mut().enumerate() {
        for (c, cell) in row.iter_mut().enumerate() {
            *cell = (0..4).map(|k| a[r][k] * b[k][c]).sum();
        }
    }
    out
}

/// Translation for row vectors.
pub fn mat4_translation(t: &Vec3) -> Mat4 {
    let mut m = MAT4_IDENTITY;
    m[3][0] = t[0];
    m[3][1] = t[1];
    m[3][2] = t[2];
    m
}

/// Unit view direction for (pitch, roll, yaw) angles in radians.
pub fn euler_forward(euler: &Vec3) -> Vec3 {
    [
        euler[2].cos() * euler[0].cos(),
        euler[2].sin() * euler[0].cos(),
        euler[0].sin(),
    ]
}

/// Left-handed view matrix for row vectors; view-space +z looks from
/// `eye` toward `center`.
pub fn mat4_look_at(eye: &Vec3, center: &Vec3, up: &Vec3) -> Mat4 {
    let mut f = vector_subtract(center, eye);
    vector_normalize(&mut f);
    let mut s = cross_product(up, &f);
    vector_normalize(&mut s);
    let u = cross_product(&f, &s);
    [
        [s[0], u[0], f[0], 0.0],
        [s[1], u[1], f[1], 0.0],
        [s[2], u[2], f[2], 0.0],
        [-dot_product(&s, eye), -dot_product(&u, eye), -dot_product(&f, eye), 1.0],
    ]
}

/// Perspective projection mapping view depth `near..far` to `0..1`.
pub fn mat4_perspective(fovy: f32, aspect: f32, near: f32, far: f32) -> Mat4 {
    let tan_half = (fovy * 0.5).tan();
    let mut m = [[0.0f32; 4]; 4];
    m[0][0] = 1.0 / (aspect * tan_half);
    m[1][1] = 1.0 / tan_half;
    m[2][2] = far / (far - near);
    m[2][3] = 1.0;
    m[3][2] = -(far * near) / (far - near);
    m
}

// ============================================================
// Bounds
// ============================================================

/// Open-interval AABB overlap.
pub fn bounds_overlap(amins: &Vec3, amaxs: &Vec3, bmins: &Vec3, bmaxs: &Vec3) -> bool {
    (0..3).all(|i| amins[i] < bmaxs[i] && amaxs[i] > bmins[i])
}

// ============================================================
// Entity string parsing
// ============================================================

pub const MAX_TOKEN_CHARS: usize = 1024;

/// Parse one token from `data`. Returns the token and the unparsed rest,
/// or `None` when the input is exhausted.
pub fn com_parse(data: &str) -> Option<(String, &str)> {
    let mut rest = data;

    // skip whitespace and // comments
    loop {
        rest = rest.trim_start_matches(|c: char| c <= ' ');
        if rest.is_empty() {
            return None;
        }
        if let Some(after) = rest.strip_prefix("//") {
            rest = after.find('\n').map_or("", |nl| &after[nl..]);
            continue;
        }
        break;
    }

    // quoted string
    if let Some(after) = rest.strip_prefix('"') {
        let end = after.find('"').unwrap_or(after.len());
        let token: String = after[..end].chars().take(MAX_TOKEN_CHARS).collect();
        let remaining = after.get(end + 1..).unwrap_or("");
        return Some((token, remaining));
    }

    // single-character structural tokens
    if rest.starts_with('{') || rest.starts_with('}') {
        return Some((rest[..1].to_string(), &rest[1..]));
    }

    // regular word
    let end = rest
        .find(|c: char| c <= ' ' || c == '{' || c == '}' || c == '"')
        .unwrap_or(rest.len());
    let token: String = rest[..end].chars().take(MAX_TOKEN_CHARS).collect();
    Some((token, &rest[end..]))
}

/// Parse a whitespace separated triple such as `"128 -64 24"`.
pub fn parse_vec3(s: &str) -> Option<Vec3> {
    let mut it = s.split_whitespace().map(str::parse::<f32>);
    let v = [it.next()?.ok()?, it.next()?.ok()?, it.next()?.ok()?];
    Some(v)
}
