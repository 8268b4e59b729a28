#![allow(clippy::too_many_arguments, clippy::needless_range_loop, clippy::type_complexity)]
// Software depth pass and quad-emitting render pipeline

pub mod gfx_types;
pub mod texture;
pub mod render_config;

// Triangle pipeline
pub mod r_clip;
pub mod r_raster;
pub mod r_main;

// World surfaces
pub mod r_surf;

pub use gfx_types::{CullType, GfxTri, GfxVertex, QuadSink, RenderStrategy, TextureHandle, TexturedQuad};
pub use r_main::{FrameStats, GfxRenderer};
pub use render_config::RenderConfig;
