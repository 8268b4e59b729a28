// world.rs — level state: entities, per-frame update and BSP face submission

use log::{debug, info};
use oxy_common::cmodel::BspData;
use oxy_common::hullmove::{self, ray_vs_hull, HullTracer};
use oxy_common::pvs::VisMarks;
use oxy_common::q_shared::{
    dot_product, vec4_mul_mat4, vector_length_squared, vector_subtract, CollisionHull, EntityId,
    LineTraceResult, Mat4, Vec3, MAT4_IDENTITY, VEC3_ORIGIN,
};
use oxy_renderer::gfx_types::TextureRef;
use oxy_renderer::r_surf::{FaceTessellator, LightmapAtlas, WorldTri};
use oxy_renderer::{CullType, GfxRenderer, GfxTri, GfxVertex, RenderStrategy};
use rand::Rng;

use crate::entity::{Entity, EntityArena, EntityFlags, HullComponent};
use crate::hull_physics::{apply_env_push, HullEvent, HullStep};
use crate::world_config::WorldConfig;

pub struct World {
    bsp: BspData,
    config: WorldConfig,

    entities: EntityArena,
    local_player: Option<EntityId>,
    player_starts: Vec<Vec3>,
    events: Vec<HullEvent>,

    /// One texture per miptex slot; missing slots draw with the error texture.
    textures: Vec<TextureRef>,
    lightmap: Option<LightmapAtlas>,
    tessellator: FaceTessellator,
    vis: VisMarks,

    viewport: (i32, i32),
    camera_position: Vec3,
    view_projection: Mat4,
    visible_entities: Vec<EntityId>,
    faces_submitted: usize,
}

impl World {
    pub fn new(bsp: BspData, lightmap: Option<LightmapAtlas>) -> Self {
        let tessellator = FaceTessellator::new(&bsp);
        let vis = VisMarks::new(&bsp);
        Self {
            bsp,
            config: WorldConfig::default(),
            entities: EntityArena::new(),
            local_player: None,
            player_starts: Vec::new(),
            events: Vec::new(),
            textures: Vec::new(),
            lightmap,
            tessellator,
            vis,
            viewport: (0, 0),
            camera_position: VEC3_ORIGIN,
            view_projection: MAT4_IDENTITY,
            visible_entities: Vec::new(),
            faces_submitted: 0,
        }
    }

    pub fn bsp(&self) -> &BspData {
        &self.bsp
    }

    pub fn config(&self) -> &WorldConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: WorldConfig) {
        self.config = config;
    }

    pub fn set_textures(&mut self, textures: Vec<TextureRef>) {
        self.textures = textures;
    }

    pub fn textures(&self) -> &[TextureRef] {
        &self.textures
    }

    pub fn lightmap(&self) -> Option<&LightmapAtlas> {
        self.lightmap.as_ref()
    }

    // ============================================================
    // Entities
    // ============================================================

    pub fn entities(&self) -> &EntityArena {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityArena {
        &mut self.entities
    }

    pub fn spawn_entity(&mut self, entity: Entity) -> EntityId {
        self.entities.spawn(entity)
    }

    pub fn remove_entity(&mut self, id: EntityId) -> Option<Entity> {
        if self.local_player == Some(id) {
            self.local_player = None;
        }
        self.entities.remove(id)
    }

    /// The local player, if it is still alive.
    pub fn local_player(&self) -> Option<EntityId> {
        self.local_player.filter(|&id| self.entities.contains(id))
    }

    /// Move the LOCAL_PLAYER flag to `player`.
    pub fn set_local_player(&mut self, player: Option<EntityId>) {
        if let Some(old) = self.local_player.and_then(|id| self.entities.get_mut(id)) {
            old.flags.remove(EntityFlags::LOCAL_PLAYER);
        }
        self.local_player = player.filter(|&id| self.entities.contains(id));
        if let Some(new) = self.local_player.and_then(|id| self.entities.get_mut(id)) {
            new.flags.insert(EntityFlags::LOCAL_PLAYER);
        }
    }

    pub fn player_starts(&self) -> &[Vec3] {
        &self.player_starts
    }

    pub fn add_player_start(&mut self, origin: Vec3) {
        self.player_starts.push(origin);
    }

    /// A uniformly chosen `info_player_start` origin, or the world origin
    /// when the map has none.
    pub fn random_player_start<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec3 {
        if self.player_starts.is_empty() {
            return VEC3_ORIGIN;
        }
        self.player_starts[rng.gen_range(0..self.player_starts.len())]
    }

    /// Collision events queued since the last drain.
    pub fn drain_hull_events(&mut self) -> Vec<HullEvent> {
        std::mem::take(&mut self.events)
    }

    // ============================================================
    // Camera
    // ============================================================

    pub fn set_viewport(&mut self, width: i32, height: i32) {
        self.viewport = (width, height);
    }

    pub fn camera_position(&self) -> &Vec3 {
        &self.camera_position
    }

    pub fn set_camera_position(&mut self, position: Vec3) {
        self.camera_position = position;
    }

    pub fn view_projection(&self) -> &Mat4 {
        &self.view_projection
    }

    pub fn set_view_projection(&mut self, m: Mat4) {
        self.view_projection = m;
    }

    // ============================================================
    // Update
    // ============================================================

    /// Run push volumes, hull physics and the local player's camera.
    pub fn update(&mut self, dt: f32) {
        let ids = self.entities.ids();
        self.update_env_pushes(&ids);

        let events_before = self.events.len();
        for &id in &ids {
            let Some(ent) = self.entities.get_mut(id) else {
                continue;
            };
            if ent.is_disabled()
                || !ent.flags.contains(EntityFlags::HAS_HULL)
                || !ent.hull.as_ref().is_some_and(|h| h.enabled)
            {
                continue;
            }
            let position = ent.position;
            let Some(mut hull) = ent.hull.take() else {
                continue;
            };

            let step = HullStep {
                tracer: &self.bsp,
                entities: &self.entities,
                config: &self.config,
                dt,
            };
            let new_position = step.run(id, &position, &mut hull, &mut self.events);

            if let Some(ent) = self.entities.get_mut(id) {
                ent.position = new_position;
                ent.hull = Some(hull);
            }
        }
        if self.config.developer && self.events.len() > events_before {
            debug!("world: {} hull events this update", self.events.len() - events_before);
        }

        self.update_camera();
    }

    fn update_env_pushes(&mut self, ids: &[EntityId]) {
        let Some(player_id) = self.local_player() else {
            return;
        };
        for &id in ids {
            let Some((origin, mut push)) = self
                .entities
                .get(id)
                .filter(|e| !e.is_disabled())
                .and_then(|e| e.env_push.map(|p| (e.position, p)))
            else {
                continue;
            };

            if let Some(player) = self.entities.get_mut(player_id) {
                if player.flags.contains(EntityFlags::HAS_HULL) {
                    let player_pos = player.position;
                    if let Some(hull) = player.hull.as_mut() {
                        if apply_env_push(&mut push, &origin, &player_pos, hull) {
                            debug!("env_push {:?} pushed local player by {:?}", id, push.velocity);
                        }
                    }
                }
            }

            if let Some(ent) = self.entities.get_mut(id) {
                ent.env_push = Some(push);
            }
        }
    }

    fn update_camera(&mut self) {
        let Some(player) = self.local_player.and_then(|id| self.entities.get_mut(id)) else {
            return;
        };
        let position = player.position;
        let Some(camera) = player.camera.as_mut() else {
            return;
        };
        camera.update(&position, self.viewport.0, self.viewport.1);
        self.camera_position = camera.eye(&position);
        self.view_projection = camera.view_projection;
    }

    // ============================================================
    // Queries
    // ============================================================

    /// Sweep `hull` through the world model.
    pub fn hull_trace(&self, hull: CollisionHull, start: &Vec3, end: &Vec3) -> LineTraceResult {
        self.bsp.hull_trace(hull, start, end)
    }

    pub fn calculate_hull_slide_movement(&self, hull: CollisionHull, position: &Vec3, distance: &Vec3) -> Vec3 {
        hullmove::calculate_hull_slide_movement(&self.bsp, hull, position, distance)
    }

    /// Line of sight through the render tree plus every active entity
    /// hull. `ignore` is skipped along with any hull that ignores it or
    /// that it ignores. The closest hit wins.
    pub fn line_trace(&self, start: &Vec3, end: &Vec3, ignore: Option<EntityId>) -> LineTraceResult {
        let head = self.bsp.world_model().head_nodes[0];
        let mut tr = self.bsp.trace_render_tree(head, start, end);

        let mut min_dist_sq = if tr.hit {
            vector_length_squared(&vector_subtract(&tr.end_pos, start))
        } else {
            vector_length_squared(&vector_subtract(end, start))
        };

        let ignore_hull = ignore
            .and_then(|id| self.entities.get(id))
            .and_then(|e| e.hull.as_ref());

        for (id, ent) in self.entities.iter() {
            if Some(id) == ignore {
                continue;
            }
            let Some(hull) = ent.active_hull() else {
                continue;
            };
            if hull.ignores(ignore) || ignore_hull.is_some_and(|h: &HullComponent| h.ignores(Some(id))) {
                continue;
            }
            let Some(hit) = ray_vs_hull(&ent.position, hull.hull, start, end) else {
                continue;
            };
            let dist_sq = vector_length_squared(&vector_subtract(&hit.position, start));
            if dist_sq < min_dist_sq {
                min_dist_sq = dist_sq;
                tr.hit = true;
                tr.fraction = hit.fraction;
                tr.end_pos = hit.position;
                tr.plane_normal = hit.normal;
                tr.plane_dist = dot_product(&hit.normal, &hit.position);
                tr.hit_entity = Some(id);
            }
        }
        tr
    }

    // ============================================================
    // Rendering
    // ============================================================

    /// Renderable entities found in the PVS by the last submission.
    pub fn visible_entities(&self) -> &[EntityId] {
        &self.visible_entities
    }

    /// Faces submitted by the last call to `submit_bsp_faces_to_render_queue`.
    pub fn faces_submitted(&self) -> usize {
        self.faces_submitted
    }

    /// Walk every model's render tree back to front from the camera and
    /// queue the faces of PVS-visible leaves.
    pub fn submit_bsp_faces_to_render_queue(&mut self, renderer: &mut GfxRenderer) {
        renderer.set_view_projection(self.view_projection);
        self.visible_entities.clear();
        self.faces_submitted = 0;
        self.vis.begin_frame();

        let novis = renderer.config().novis;
        let draw_world = renderer.config().draw_world;

        for model in 0..self.bsp.models.len() {
            let origin = self.bsp.models[model].origin;
            let local_camera = vector_subtract(&self.camera_position, &origin);
            if novis {
                self.vis.mark_all(&self.bsp, model);
            } else {
                let leaf = self.bsp.find_leaf(&local_camera, model);
                self.vis.mark_visible_from(&self.bsp, leaf, model);
            }

            if draw_world {
                let mut submitter = FaceSubmitter {
                    bsp: &self.bsp,
                    vis: &mut self.vis,
                    tessellator: &self.tessellator,
                    textures: &self.textures,
                    lightmap: self.lightmap.as_ref(),
                    view_projection: &self.view_projection,
                    origin,
                    camera: local_camera,
                    renderer: &mut *renderer,
                    submitted: 0,
                };
                submitter.traverse(self.bsp.models[model].head_nodes[0]);
                self.faces_submitted += submitter.submitted;
            }

            // entity culling uses the world model's PVS
            if model == 0 {
                self.collect_visible_entities();
            }
        }
    }

    fn collect_visible_entities(&mut self) {
        for (id, ent) in self.entities.iter() {
            if ent.is_disabled() || !ent.flags.contains(EntityFlags::RENDERABLE) {
                continue;
            }
            let mins = [
                ent.position[0] + ent.render_mins[0],
                ent.position[1] + ent.render_mins[1],
                ent.position[2] + ent.render_mins[2],
            ];
            let maxs = [
                ent.position[0] + ent.render_maxs[0],
                ent.position[1] + ent.render_maxs[1],
                ent.position[2] + ent.render_maxs[2],
            ];
            if self.vis.bounds_visible(&self.bsp, &mins, &maxs) {
                self.visible_entities.push(id);
            }
        }
    }
}

// ============================================================
// Face submission
// ============================================================

struct FaceSubmitter<'a> {
    bsp: &'a BspData,
    vis: &'a mut VisMarks,
    tessellator: &'a FaceTessellator,
    textures: &'a [TextureRef],
    lightmap: Option<&'a LightmapAtlas>,
    view_projection: &'a Mat4,
    /// Model origin added to every vertex.
    origin: Vec3,
    /// Camera in model space.
    camera: Vec3,
    renderer: &'a mut GfxRenderer,
    submitted: usize,
}

impl FaceSubmitter<'_> {
    /// Tree depth is bounded at load, so plain recursion is safe.
    fn traverse(&mut self, node: i32) {
        if node < 0 {
            let leaf = (-1 - node) as usize;
            if !self.vis.is_leaf_visible(leaf) {
                return;
            }
            let bsp = self.bsp;
            for face in bsp.leaf_faces(&bsp.leaves[leaf]) {
                if self.vis.faces.test_and_set(face) {
                    self.submit_face(face);
                }
            }
            return;
        }

        if !self.vis.is_node_marked(node as usize) {
            return;
        }
        let bsp = self.bsp;
        let n = &bsp.nodes[node as usize];
        let side = if bsp.plane(n.plane_idx).distance(&self.camera) >= 0.0 { 1 } else { 0 };
        // far side first, camera side last
        self.traverse(n.children[side] as i32);
        self.traverse(n.children[side ^ 1] as i32);
    }

    fn submit_face(&mut self, face: usize) {
        self.submitted += 1;
        let tris = self.tessellator.face_tris(self.bsp, face, self.lightmap);
        for tri in tris {
            let base = self.clip_tri(tri, &tri.uv);
            self.renderer.submit_tri_to_queue(&base, RenderStrategy::PreSorted, 1.0);

            if let (Some(lm), Some(lm_uv)) = (self.lightmap, tri.lightmap_uv.as_ref()) {
                let mut overlay = self.clip_tri(tri, lm_uv);
                overlay.texture = Some(lm.texture.clone());
                self.renderer
                    .submit_tri_to_queue(&overlay, RenderStrategy::PreSortedOverlay, 1.0);
            }
        }
    }

    fn clip_tri(&self, tri: &WorldTri, uv: &[[f32; 2]; 3]) -> GfxTri {
        let vert = |i: usize| {
            let v = &tri.verts[i];
            let world = [v[0] + self.origin[0], v[1] + self.origin[1], v[2] + self.origin[2], 1.0];
            GfxVertex::new(vec4_mul_mat4(&world, self.view_projection), uv[i])
        };
        GfxTri {
            verts: [vert(0), vert(1), vert(2)],
            colour: [1.0, 1.0, 1.0],
            texture: self.textures.get(tri.miptex).cloned(),
            cull: CullType::Backface,
        }
    }
}

/// Log a one-line summary of a freshly built world.
pub(crate) fn log_world_summary(name: &str, world: &World) {
    let bsp = world.bsp();
    info!(
        "world {}: {} models, {} faces, {} leaves, {} entities, {} player starts, lightmap {}",
        name,
        bsp.models.len(),
        bsp.faces.len(),
        bsp.leaves.len(),
        world.entities().len(),
        world.player_starts().len(),
        if world.lightmap().is_some() { "loaded" } else { "missing" }
    );
}
