// world_loader.rs — map loading and spawning entities from the entity lump

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{info, warn};
use oxy_common::cmodel::{BspData, EntityDict};
use oxy_common::cvar::CvarContext;
use oxy_common::q_shared::{CollisionHull, EntityId, Vec3};
use oxy_renderer::r_surf::LightmapAtlas;
use oxy_renderer::texture::{TextureCache, TextureLoader};
use oxy_renderer::RenderConfig;
use rand::Rng;

use crate::camera::CameraRig;
use crate::entity::{CollisionResponse, Entity, EntityFlags, EnvPush, HullComponent};
use crate::error::{WorldError, WorldResult};
use crate::world::{log_world_summary, World};
use crate::world_config::WorldConfig;

/// Archived cvars live here, relative to the base directory.
pub const CONFIG_FILE: &str = "config.cfg";

/// Player gravity in units per second squared.
pub const PLAYER_GRAVITY: f32 = 700.0;
/// Eye height above the player hull origin.
pub const PLAYER_EYE_OFFSET: Vec3 = [0.0, 0.0, 32.0];

fn map_path(base_dir: &Path, file: String) -> PathBuf {
    base_dir.join("maps").join(file)
}

fn texture_path(base_dir: &Path, file: String) -> PathBuf {
    base_dir.join("textures").join(file)
}

fn check_map_name(map: &str) -> WorldResult<()> {
    let bad = map.is_empty()
        || map.contains("..")
        || map.contains(['/', '\\', ':']);
    if bad {
        return Err(WorldError::BadMapName(map.to_string()));
    }
    Ok(())
}

/// Load `maps/<map>.bsp` under `base_dir` with its textures and lightmap
/// atlas, then spawn the entities the map declares.
///
/// Missing miptex images fall back to the error texture. A missing
/// lightmap image or rects file leaves the world unlit.
pub fn load_world(
    base_dir: &Path,
    map: &str,
    textures: &TextureCache,
    loader: &mut dyn TextureLoader,
) -> WorldResult<World> {
    check_map_name(map)?;

    let bsp_path = map_path(base_dir, format!("{}.bsp", map));
    if !bsp_path.is_file() {
        return Err(WorldError::MapNotFound(bsp_path));
    }
    let bsp = BspData::load_file(&bsp_path)?;

    let miptex_textures = bsp
        .miptex
        .iter()
        .map(|m| textures.load(loader, &texture_path(base_dir, format!("{}.png", m.name))))
        .collect();

    let lightmap = match textures.try_load(loader, &texture_path(base_dir, format!("{}_lightmap0.png", map))) {
        Some(tex) => LightmapAtlas::load_file(&map_path(base_dir, format!("{}_rects.bin", map)), tex),
        None => {
            warn!("map {} has no lightmap atlas, drawing unlit", map);
            None
        }
    };

    let mut world = World::new(bsp, lightmap);
    world.set_textures(miptex_textures);
    spawn_map_entities(&mut world);
    log_world_summary(map, &world);
    Ok(world)
}

// ============================================================
// Configuration
// ============================================================

/// Register the render and world cvars, execute `<base_dir>/config.cfg`
/// when it exists, and snapshot both configs. A missing file keeps the
/// defaults; any other read failure is an error.
pub fn load_config(base_dir: &Path, cvars: &mut CvarContext) -> WorldResult<(RenderConfig, WorldConfig)> {
    RenderConfig::register_cvars(cvars);
    WorldConfig::register_cvars(cvars);

    let path = base_dir.join(CONFIG_FILE);
    match fs::read_to_string(&path) {
        Ok(text) => {
            cvars.exec_config(&text);
            info!("execing {}", path.display());
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            info!("no {}, using defaults", path.display());
        }
        Err(source) => return Err(WorldError::Config { path, source }),
    }
    cvars.apply_latched();

    Ok((RenderConfig::from_cvars(cvars), WorldConfig::from_cvars(cvars)))
}

/// Write the archived cvars to `<base_dir>/config.cfg`.
pub fn save_config(base_dir: &Path, cvars: &CvarContext) -> WorldResult<()> {
    let path = base_dir.join(CONFIG_FILE);
    let mut out = Vec::new();
    let written = cvars
        .write_variables(&mut out)
        .and_then(|()| fs::write(&path, &out));
    written.map_err(|source| WorldError::Config { path, source })
}

// ============================================================
// Spawning
// ============================================================

/// Create player starts and push volumes from the entity lump. Entities
/// missing a required key are skipped with a warning.
pub fn spawn_map_entities(world: &mut World) {
    let dicts = world.bsp().entities();
    for dict in &dicts {
        match dict.classname() {
            "info_player_start" => match dict.vec3("origin") {
                Some(origin) => world.add_player_start(origin),
                None => warn!("info_player_start without origin"),
            },
            "env_push" => {
                if spawn_env_push(world, dict).is_none() {
                    warn!("env_push needs origin, vel and radius");
                }
            }
            _ => {}
        }
    }
}

fn spawn_env_push(world: &mut World, dict: &EntityDict) -> Option<EntityId> {
    let origin = dict.vec3("origin")?;
    let velocity = dict.vec3("vel")?;
    let radius = dict.float("radius")?;

    let mut ent = Entity::at(origin);
    ent.flags.insert(EntityFlags::STATIC);
    ent.env_push = Some(EnvPush::new(velocity, radius));
    Some(world.spawn_entity(ent))
}

/// Spawn a sliding player hull with an eye camera at a random player
/// start and make it the local player.
pub fn spawn_local_player<R: Rng + ?Sized>(world: &mut World, rng: &mut R) -> EntityId {
    let mut ent = Entity::at(world.random_player_start(rng));
    ent.flags.insert(EntityFlags::DYNAMIC | EntityFlags::RENDERABLE);
    ent.render_mins = CollisionHull::Player.mins();
    ent.render_maxs = CollisionHull::Player.maxs();

    let mut hull = HullComponent::new(CollisionHull::Player, CollisionResponse::Slide);
    hull.gravity = PLAYER_GRAVITY;
    ent.set_hull(hull);
    ent.camera = Some(CameraRig::with_offset(PLAYER_EYE_OFFSET));

    let id = world.spawn_entity(ent);
    world.set_local_player(Some(id));
    id
}
