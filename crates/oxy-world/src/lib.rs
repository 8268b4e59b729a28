// Level state, entity arena and hull physics on top of the BSP core

pub mod error;
pub mod entity;
pub mod camera;
pub mod world_config;

// Simulation
pub mod hull_physics;

// Level
pub mod world;
pub mod world_loader;

pub use entity::{CollisionResponse, Entity, EntityArena, EntityFlags, EnvPush, HullComponent};
pub use error::{WorldError, WorldResult};
pub use hull_physics::HullEvent;
pub use world::World;
pub use world_config::WorldConfig;
pub use world_loader::{load_config, load_world, save_config, spawn_local_player};
