// camera.rs — entity-attached camera and its view/projection matrices

use oxy_common::q_shared::{
    cross_product, euler_forward, mat4_look_at, mat4_mul, mat4_perspective, vector_add, Mat4,
    Vec3, MAT4_IDENTITY, VEC3_ORIGIN,
};

pub const DEFAULT_FOV_Y: f32 = std::f32::consts::FRAC_PI_2;
pub const DEFAULT_NEAR_CLIP: f32 = 4.0;
pub const DEFAULT_FAR_CLIP: f32 = 4000.0;

const WORLD_UP: Vec3 = [0.0, 0.0, 1.0];

#[derive(Debug, Clone, PartialEq)]
pub struct CameraRig {
    /// Eye offset from the owning entity's origin.
    pub local_offset: Vec3,
    /// (pitch, roll, yaw) in radians.
    pub euler: Vec3,
    pub fov_y: f32,
    pub near_clip: f32,
    pub far_clip: f32,

    pub forward: Vec3,
    pub right: Vec3,
    pub up: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
    pub view_projection: Mat4,
}

impl Default for CameraRig {
    fn default() -> Self {
        Self {
            local_offset: VEC3_ORIGIN,
            euler: VEC3_ORIGIN,
            fov_y: DEFAULT_FOV_Y,
            near_clip: DEFAULT_NEAR_CLIP,
            far_clip: DEFAULT_FAR_CLIP,
            forward: [1.0, 0.0, 0.0],
            right: [0.0, 1.0, 0.0],
            up: WORLD_UP,
            view: MAT4_IDENTITY,
            projection: MAT4_IDENTITY,
            view_projection: MAT4_IDENTITY,
        }
    }
}

impl CameraRig {
    pub fn with_offset(local_offset: Vec3) -> Self {
        Self {
            local_offset,
            ..Default::default()
        }
    }

    pub fn eye(&self, entity_position: &Vec3) -> Vec3 {
        vector_add(entity_position, &self.local_offset)
    }

    /// Rebuild the basis and matrices for an entity at `entity_position`
    /// drawn into a `width` x `height` window.
    pub fn update(&mut self, entity_position: &Vec3, width: i32, height: i32) {
        self.forward = euler_forward(&self.euler);
        self.right = cross_product(&self.forward, &WORLD_UP);
        self.up = cross_product(&self.right, &self.forward);

        let eye = self.eye(entity_position);
        self.view = mat4_look_at(&eye, &vector_add(&eye, &self.forward), &self.up);

        let aspect = if width > 0 && height > 0 {
            width as f32 / height as f32
        } else {
            1.0
        };
        self.projection = mat4_perspective(self.fov_y, aspect, self.near_clip, self.far_clip);
        self.view_projection = mat4_mul(&self.view, &self.projection);
    }
}
