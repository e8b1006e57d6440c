//! Model load pipeline: one instance per model per scene selection.
//!
//! The pipeline is sans-IO. `start` returns the manifest fetch; every completion fed to
//! `on_fetch` / `on_texture` may return further requests. Stages run in the order of
//! [`LoadState`]; a stage with nothing to wait on is passed through in the same call.
//! Fan-out stages wait on a [`PendingWorkCounter`], and only the completion that
//! satisfies it moves the pipeline on.

use hashbrown::{HashMap, HashSet};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::config::{BreathParameter, ViewerConfig};
use crate::counter::PendingWorkCounter;
use crate::engine::RigEngine;
use crate::error::{FetchError, LoadError, TextureError};
use crate::ids::{Generation, TextureHandle};
use crate::input::DragSmoother;
use crate::manifest::{motion_key, ModelManifest};
use crate::request::{FetchRequest, ResourceKind, Ticket};
use crate::resolver::{resolve_or_passthrough, AssetResolver};
use crate::state::LoadState;
use crate::texture::TextureRecord;
use crate::wav::AudioEnvelopeDecoder;

/// Motion priorities. A request must beat both the playing and the reserved priority,
/// except `Force`, which always wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum MotionPriority {
    None = 0,
    Idle = 1,
    Normal = 2,
    Force = 3,
}

#[derive(Debug, Default, Clone, Copy)]
struct MotionSlots {
    current: Option<MotionPriority>,
    reserved: Option<MotionPriority>,
}

impl MotionSlots {
    fn reserve(&mut self, priority: MotionPriority) -> bool {
        if priority != MotionPriority::Force {
            let floor = self.current.max(self.reserved).unwrap_or(MotionPriority::None);
            if priority <= floor {
                return false;
            }
        }
        self.reserved = Some(priority);
        true
    }

    fn started(&mut self, priority: MotionPriority) {
        if self.reserved == Some(priority) {
            self.reserved = None;
        }
        self.current = Some(priority);
    }

    fn finished(&mut self) {
        self.current = None;
    }
}

enum Entry {
    Wait,
    Continue,
}

/// Drag-driven parameters: (id, scale on drag x, scale on drag y, scale on x*y).
const DRAG_PARAMETERS: &[(&str, f32, f32, f32)] = &[
    ("ParamAngleX", 30.0, 0.0, 0.0),
    ("ParamAngleY", 0.0, 30.0, 0.0),
    ("ParamAngleZ", 0.0, 0.0, -30.0),
    ("ParamBodyAngleX", 10.0, 0.0, 0.0),
    ("ParamEyeBallX", 1.0, 0.0, 0.0),
    ("ParamEyeBallY", 0.0, 1.0, 0.0),
];

pub struct ModelLoadPipeline<E: RigEngine> {
    generation: Generation,
    dir: String,
    manifest_path: String,
    state: LoadState,
    halted: Option<LoadError>,
    disposed: bool,
    engine: E,
    manifest: Option<ModelManifest>,

    // dedup key -> logical path
    in_flight: HashMap<String, String>,
    expressions: HashSet<String>,
    motions: HashSet<String>,
    // motion keys whose on-demand load failed; random picks skip them
    unavailable_motions: HashSet<String>,
    textures: Vec<Option<TextureHandle>>,
    expression_work: PendingWorkCounter,
    motion_work: PendingWorkCounter,
    texture_work: PendingWorkCounter,

    premultiplied_alpha: bool,
    breath: Vec<BreathParameter>,
    idle_group: String,
    lip_sync_weight: f32,

    slots: MotionSlots,
    pending_start: Option<(String, usize, MotionPriority)>,
    lip_sync: AudioEnvelopeDecoder,
    drag: DragSmoother,
    rng: StdRng,
}

fn request(
    generation: Generation,
    in_flight: &mut HashMap<String, String>,
    resolver: &dyn AssetResolver,
    kind: ResourceKind,
    path: &str,
) -> Option<FetchRequest> {
    let key = kind.key();
    if in_flight.contains_key(&key) {
        log::debug!("{key} already in flight; not fetching {path} again");
        return None;
    }
    in_flight.insert(key, path.to_string());
    Some(FetchRequest {
        ticket: Ticket { generation, kind },
        path: path.to_string(),
        location: resolve_or_passthrough(resolver, path),
    })
}

impl<E: RigEngine> ModelLoadPipeline<E> {
    /// `dir` is the model's logical directory (with trailing slash), `manifest_file` the
    /// manifest name inside it.
    pub fn new(
        generation: Generation,
        dir: &str,
        manifest_file: &str,
        engine: E,
        cfg: &ViewerConfig,
    ) -> Self {
        Self {
            generation,
            dir: dir.to_string(),
            manifest_path: format!("{dir}{manifest_file}"),
            state: LoadState::AwaitManifest,
            halted: None,
            disposed: false,
            engine,
            manifest: None,
            in_flight: HashMap::new(),
            expressions: HashSet::new(),
            motions: HashSet::new(),
            unavailable_motions: HashSet::new(),
            textures: Vec::new(),
            expression_work: PendingWorkCounter::new(0),
            motion_work: PendingWorkCounter::new(0),
            texture_work: PendingWorkCounter::new(0),
            premultiplied_alpha: cfg.premultiplied_alpha,
            breath: cfg.breath.clone(),
            idle_group: cfg.idle_motion_group.clone(),
            lip_sync_weight: cfg.lip_sync_weight,
            slots: MotionSlots::default(),
            pending_start: None,
            lip_sync: AudioEnvelopeDecoder::new(),
            drag: DragSmoother::new(),
            rng: StdRng::seed_from_u64(cfg.random_seed ^ generation.0),
        }
    }

    // ----- accessors -----

    #[inline]
    pub fn generation(&self) -> Generation {
        self.generation
    }

    #[inline]
    pub fn state(&self) -> LoadState {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state.is_ready() && !self.disposed
    }

    pub fn halted(&self) -> Option<&LoadError> {
        self.halted.as_ref()
    }

    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    pub fn manifest(&self) -> Option<&ModelManifest> {
        self.manifest.as_ref()
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn dir(&self) -> &str {
        &self.dir
    }

    pub fn premultiplied_alpha(&self) -> bool {
        self.premultiplied_alpha
    }

    pub fn expression_progress(&self) -> PendingWorkCounter {
        self.expression_work
    }

    pub fn motion_progress(&self) -> PendingWorkCounter {
        self.motion_work
    }

    pub fn texture_progress(&self) -> PendingWorkCounter {
        self.texture_work
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    pub fn has_expression(&self, name: &str) -> bool {
        self.expressions.contains(name)
    }

    pub fn has_motion(&self, group: &str, index: usize) -> bool {
        self.motions.contains(&motion_key(group, index))
    }

    /// Whether motion `group[index]` failed its last on-demand load.
    pub fn is_motion_unavailable(&self, group: &str, index: usize) -> bool {
        self.unavailable_motions.contains(&motion_key(group, index))
    }

    pub fn texture(&self, index: usize) -> Option<TextureHandle> {
        self.textures.get(index).copied().flatten()
    }

    pub fn lip_sync(&self) -> &AudioEnvelopeDecoder {
        &self.lip_sync
    }

    pub fn drag(&self) -> &DragSmoother {
        &self.drag
    }

    // ----- loading -----

    /// Issue the manifest fetch.
    pub fn start(&mut self, resolver: &dyn AssetResolver) -> Vec<FetchRequest> {
        if self.disposed || self.state != LoadState::AwaitManifest {
            return Vec::new();
        }
        let path = self.manifest_path.clone();
        request(
            self.generation,
            &mut self.in_flight,
            resolver,
            ResourceKind::Manifest,
            &path,
        )
        .into_iter()
        .collect()
    }

    fn check_ticket(&self, ticket: &Ticket) -> Result<(), LoadError> {
        if self.disposed {
            return Err(LoadError::Disposed);
        }
        if ticket.generation != self.generation {
            return Err(LoadError::StaleTicket {
                expected: self.generation,
                got: ticket.generation,
            });
        }
        Ok(())
    }

    fn take_in_flight(&mut self, kind: &ResourceKind) -> Result<String, LoadError> {
        let key = kind.key();
        self.in_flight
            .remove(&key)
            .ok_or(LoadError::UnexpectedCompletion { key })
    }

    fn halt(&mut self, err: LoadError) {
        log::error!("model {} will not load: {err}", self.manifest_path);
        self.halted = Some(err);
        self.in_flight.clear();
    }

    /// Feed the result of a fetch issued by this pipeline.
    pub fn on_fetch(
        &mut self,
        ticket: &Ticket,
        result: Result<&[u8], FetchError>,
        resolver: &dyn AssetResolver,
    ) -> Result<Vec<FetchRequest>, LoadError> {
        self.check_ticket(ticket)?;
        if let Some(err) = &self.halted {
            return Err(LoadError::Halted {
                reason: err.to_string(),
            });
        }
        let path = self.take_in_flight(&ticket.kind)?;
        let mut out = Vec::new();

        match &ticket.kind {
            ResourceKind::Manifest => {
                let bytes = match result {
                    Ok(b) => b,
                    Err(source) => {
                        self.halt(LoadError::Fetch { path, source });
                        return Ok(out);
                    }
                };
                LoadState::transition(
                    &mut self.state,
                    LoadState::AwaitManifest,
                    LoadState::ParseManifest,
                )?;
                match ModelManifest::parse(bytes, &self.dir) {
                    Ok(m) => {
                        self.textures = vec![None; m.textures.len()];
                        self.manifest = Some(m);
                        self.proceed(LoadState::ParseManifest, resolver, &mut out)?;
                    }
                    Err(e) => self.halt(e.into()),
                }
            }
            ResourceKind::Rig => {
                let loaded = match result {
                    Ok(bytes) => self.engine.load_model(bytes).map_err(LoadError::from),
                    Err(source) => Err(LoadError::Fetch { path, source }),
                };
                match loaded {
                    Ok(()) => self.proceed(LoadState::LoadRig, resolver, &mut out)?,
                    Err(e) => self.halt(e),
                }
            }
            ResourceKind::Expression { name } => {
                let loaded = match result {
                    Ok(bytes) => self
                        .engine
                        .load_expression(name, bytes)
                        .map_err(LoadError::from),
                    Err(source) => Err(LoadError::Fetch { path, source }),
                };
                let progress = match loaded {
                    Ok(()) => {
                        self.expressions.insert(name.clone());
                        self.expression_work.record_completion()
                    }
                    Err(e) => {
                        log::warn!("expression '{name}' dropped: {e}");
                        self.expression_work.abandon()
                    }
                };
                if progress.just_satisfied() {
                    self.proceed(LoadState::Expressions, resolver, &mut out)?;
                }
            }
            kind @ (ResourceKind::Physics | ResourceKind::Pose | ResourceKind::UserData) => {
                let stage = match kind {
                    ResourceKind::Physics => LoadState::Physics,
                    ResourceKind::Pose => LoadState::Pose,
                    _ => LoadState::UserData,
                };
                let loaded = match result {
                    Ok(bytes) => {
                        let loaded = match stage {
                            LoadState::Physics => self.engine.load_physics(bytes),
                            LoadState::Pose => self.engine.load_pose(bytes),
                            _ => self.engine.load_user_data(bytes),
                        };
                        loaded.map_err(LoadError::from)
                    }
                    Err(source) => Err(LoadError::Fetch { path, source }),
                };
                if let Err(e) = loaded {
                    log::warn!("{} skipped: {e}", stage.name());
                }
                self.proceed(stage, resolver, &mut out)?;
            }
            ResourceKind::Motion { group, index } => {
                let key = motion_key(group, *index);
                let progress = match self.load_motion_bytes(&key, group, *index, result, path) {
                    Ok(()) => self.motion_work.record_completion(),
                    Err(e) => {
                        log::warn!("motion {key} dropped: {e}");
                        self.motion_work.abandon()
                    }
                };
                if progress.just_satisfied() {
                    self.proceed(LoadState::Motions, resolver, &mut out)?;
                }
            }
            ResourceKind::MotionOnDemand { group, index } => {
                let key = motion_key(group, *index);
                let wanted = match &self.pending_start {
                    Some((g, i, priority)) if g == group && i == index => Some(*priority),
                    _ => None,
                };
                if wanted.is_some() {
                    self.pending_start = None;
                }
                match self.load_motion_bytes(&key, group, *index, result, path) {
                    Ok(()) => {
                        self.unavailable_motions.remove(&key);
                        if let Some(priority) = wanted {
                            self.play_loaded(group, *index, priority, resolver, &mut out);
                        }
                    }
                    Err(e) => {
                        log::warn!("motion {key} could not be started: {e}");
                        self.unavailable_motions.insert(key);
                        if let Some(priority) = wanted {
                            if self.slots.reserved == Some(priority) {
                                self.slots.reserved = None;
                            }
                        }
                    }
                }
            }
            ResourceKind::Audio { group, index } => match result {
                Ok(bytes) => {
                    if !self.lip_sync.start(bytes) {
                        log::warn!("lip-sync silent for {group}_{index}");
                    }
                }
                Err(e) => log::warn!("sound {path} unavailable: {e}"),
            },
            ResourceKind::Texture { .. } => {
                // textures complete through on_texture; put the ticket back
                self.in_flight.insert(ticket.kind.key(), path);
                return Err(LoadError::UnexpectedCompletion {
                    key: ticket.kind.key(),
                });
            }
        }
        Ok(out)
    }

    /// Feed the texture cache's answer for a texture request issued by this pipeline.
    pub fn on_texture(
        &mut self,
        ticket: &Ticket,
        result: Result<TextureRecord, TextureError>,
        resolver: &dyn AssetResolver,
    ) -> Result<Vec<FetchRequest>, LoadError> {
        self.check_ticket(ticket)?;
        let ResourceKind::Texture { index } = ticket.kind else {
            return Err(LoadError::UnexpectedCompletion {
                key: ticket.kind.key(),
            });
        };
        let path = self.take_in_flight(&ticket.kind)?;
        let mut out = Vec::new();
        let handle = result.map_err(LoadError::from).and_then(|record| {
            record.handle.ok_or_else(|| LoadError::UnexpectedCompletion {
                key: record.key.path.clone(),
            })
        });
        let progress = match handle {
            Ok(handle) => {
                self.engine.bind_texture(index, handle);
                if let Some(slot) = self.textures.get_mut(index) {
                    *slot = Some(handle);
                }
                self.texture_work.record_completion()
            }
            Err(e) => {
                log::warn!("texture {path} dropped: {e}");
                self.texture_work.abandon()
            }
        };
        if progress.just_satisfied() {
            self.proceed(LoadState::Textures, resolver, &mut out)?;
        }
        Ok(out)
    }

    fn load_motion_bytes(
        &mut self,
        key: &str,
        group: &str,
        index: usize,
        result: Result<&[u8], FetchError>,
        path: String,
    ) -> Result<(), LoadError> {
        let bytes = result.map_err(|source| LoadError::Fetch { path, source })?;
        let (fade_in, fade_out) = self
            .manifest
            .as_ref()
            .and_then(|m| m.motion(group, index))
            .map_or((None, None), |m| (m.fade_in, m.fade_out));
        self.engine.load_motion(key, bytes, fade_in, fade_out)?;
        self.motions.insert(key.to_string());
        Ok(())
    }

    /// Move from `from` to its successor and keep going while stages have nothing to wait on.
    fn proceed(
        &mut self,
        from: LoadState,
        resolver: &dyn AssetResolver,
        out: &mut Vec<FetchRequest>,
    ) -> Result<(), LoadError> {
        let mut from = from;
        while let Some(to) = from.successor() {
            LoadState::transition(&mut self.state, from, to)?;
            match self.enter(to, resolver, out) {
                Entry::Wait => break,
                Entry::Continue => from = to,
            }
        }
        Ok(())
    }

    fn enter(
        &mut self,
        stage: LoadState,
        resolver: &dyn AssetResolver,
        out: &mut Vec<FetchRequest>,
    ) -> Entry {
        let generation = self.generation;
        let Some(m) = self.manifest.as_ref() else {
            return Entry::Wait;
        };
        let mut issue = |in_flight: &mut HashMap<String, String>, kind, path: &str| {
            if let Some(req) = request(generation, in_flight, resolver, kind, path) {
                out.push(req);
            }
        };

        match stage {
            LoadState::AwaitManifest | LoadState::ParseManifest => Entry::Wait,
            LoadState::LoadRig => {
                issue(&mut self.in_flight, ResourceKind::Rig, &m.moc);
                Entry::Wait
            }
            LoadState::Expressions => {
                let mut seen = HashSet::new();
                for e in &m.expressions {
                    if seen.insert(e.name.as_str()) {
                        let kind = ResourceKind::Expression {
                            name: e.name.clone(),
                        };
                        issue(&mut self.in_flight, kind, &e.file);
                    }
                }
                self.expression_work = PendingWorkCounter::new(seen.len());
                fan_in_entry(&mut self.expression_work)
            }
            LoadState::Physics => optional(&mut self.in_flight, &mut issue, ResourceKind::Physics, &m.physics),
            LoadState::Pose => optional(&mut self.in_flight, &mut issue, ResourceKind::Pose, &m.pose),
            LoadState::EyeBlinkSetup => {
                if !m.eye_blink_ids.is_empty() {
                    self.engine.setup_eye_blink(&m.eye_blink_ids);
                }
                Entry::Continue
            }
            LoadState::BreathSetup => {
                self.engine.setup_breath(&self.breath);
                Entry::Continue
            }
            LoadState::UserData => {
                optional(&mut self.in_flight, &mut issue, ResourceKind::UserData, &m.user_data)
            }
            LoadState::ParameterIds => {
                self.engine.set_lip_sync_ids(&m.lip_sync_ids);
                Entry::Continue
            }
            LoadState::Layout => {
                if !m.layout.is_empty() {
                    self.engine.setup_layout(&m.layout);
                }
                Entry::Continue
            }
            LoadState::Motions => {
                let mut count = 0;
                for (group, entries) in &m.motions {
                    for (index, entry) in entries.iter().enumerate() {
                        let kind = ResourceKind::Motion {
                            group: group.clone(),
                            index,
                        };
                        if !self.in_flight.contains_key(&kind.key()) {
                            count += 1;
                        }
                        issue(&mut self.in_flight, kind, &entry.file);
                    }
                }
                self.motion_work = PendingWorkCounter::new(count);
                fan_in_entry(&mut self.motion_work)
            }
            LoadState::Textures => {
                for (index, path) in m.textures.iter().enumerate() {
                    issue(&mut self.in_flight, ResourceKind::Texture { index }, path);
                }
                self.texture_work = PendingWorkCounter::new(m.textures.len());
                fan_in_entry(&mut self.texture_work)
            }
            LoadState::Ready => {
                log::info!("model {} ready", self.manifest_path);
                Entry::Wait
            }
        }
    }

    // ----- runtime (Ready only) -----

    fn ensure_ready(&self) -> Result<&ModelManifest, LoadError> {
        if self.disposed {
            return Err(LoadError::Disposed);
        }
        match (&self.manifest, self.state) {
            (Some(m), LoadState::Ready) => Ok(m),
            _ => Err(LoadError::NotReady { state: self.state }),
        }
    }

    /// Start motion `group[index]`. Motions not materialized yet are fetched and started
    /// on arrival. A paired sound is fetched for lip-sync.
    pub fn start_motion(
        &mut self,
        group: &str,
        index: usize,
        priority: MotionPriority,
        resolver: &dyn AssetResolver,
    ) -> Result<Vec<FetchRequest>, LoadError> {
        let entry = self
            .ensure_ready()?
            .motion(group, index)
            .cloned()
            .ok_or_else(|| LoadError::UnknownMotion {
                group: group.to_string(),
                index,
            })?;
        if !self.slots.reserve(priority) {
            log::debug!("motion {group}_{index} refused at {priority:?}");
            return Err(LoadError::MotionRefused {
                priority: priority as u8,
            });
        }
        let mut out = Vec::new();
        if self.motions.contains(&motion_key(group, index)) {
            self.play_loaded(group, index, priority, resolver, &mut out);
        } else {
            self.pending_start = Some((group.to_string(), index, priority));
            let kind = ResourceKind::MotionOnDemand {
                group: group.to_string(),
                index,
            };
            out.extend(request(
                self.generation,
                &mut self.in_flight,
                resolver,
                kind,
                &entry.file,
            ));
        }
        Ok(out)
    }

    /// Start a uniformly random motion from `group`, skipping motions that already
    /// failed to load on demand.
    pub fn start_random_motion(
        &mut self,
        group: &str,
        priority: MotionPriority,
        resolver: &dyn AssetResolver,
    ) -> Result<Vec<FetchRequest>, LoadError> {
        let len = self.ensure_ready()?.motion_group_len(group);
        if len == 0 {
            return Err(LoadError::UnknownMotion {
                group: group.to_string(),
                index: 0,
            });
        }
        let playable: Vec<usize> = (0..len)
            .filter(|i| !self.unavailable_motions.contains(&motion_key(group, *i)))
            .collect();
        if playable.is_empty() {
            return Err(LoadError::NoPlayableMotion {
                group: group.to_string(),
            });
        }
        let index = playable[self.rng.gen_range(0..playable.len())];
        self.start_motion(group, index, priority, resolver)
    }

    fn play_loaded(
        &mut self,
        group: &str,
        index: usize,
        priority: MotionPriority,
        resolver: &dyn AssetResolver,
        out: &mut Vec<FetchRequest>,
    ) {
        let key = motion_key(group, index);
        self.engine.start_motion(&key);
        self.slots.started(priority);
        let sound = self
            .manifest
            .as_ref()
            .and_then(|m| m.motion(group, index))
            .and_then(|e| e.sound.clone());
        if let Some(sound) = sound {
            let kind = ResourceKind::Audio {
                group: group.to_string(),
                index,
            };
            out.extend(request(
                self.generation,
                &mut self.in_flight,
                resolver,
                kind,
                &sound,
            ));
        }
    }

    pub fn set_expression(&mut self, name: &str) -> Result<(), LoadError> {
        self.ensure_ready()?;
        if !self.expressions.contains(name) {
            return Err(LoadError::UnknownExpression {
                name: name.to_string(),
            });
        }
        self.engine.set_expression(name);
        Ok(())
    }

    /// Apply a uniformly random loaded expression; returns its name.
    pub fn set_random_expression(&mut self) -> Result<String, LoadError> {
        let m = self.ensure_ready()?;
        let mut names: Vec<String> = Vec::new();
        for e in &m.expressions {
            if self.expressions.contains(&e.name) && !names.contains(&e.name) {
                names.push(e.name.clone());
            }
        }
        if names.is_empty() {
            return Err(LoadError::UnknownExpression {
                name: String::new(),
            });
        }
        let pick = self.rng.gen_range(0..names.len());
        let name = names.swap_remove(pick);
        self.engine.set_expression(&name);
        Ok(name)
    }

    /// Set the drag target in model view space.
    pub fn set_drag(&mut self, x: f32, y: f32) {
        self.drag.set_target(x, y);
    }

    /// Hit test by configured hit area name (e.g. "Head").
    pub fn hit_test(&self, area_name: &str, x: f32, y: f32) -> bool {
        let Ok(m) = self.ensure_ready() else {
            return false;
        };
        match m.hit_area_id(area_name) {
            Some(id) => self.engine.hit_test(id, x, y),
            None => false,
        }
    }

    /// Per-frame update: idle motion, drag, lip-sync, engine update. Returns any fetches
    /// the frame needs (idle motions or their sounds).
    pub fn update(&mut self, dt: f32, resolver: &dyn AssetResolver) -> Vec<FetchRequest> {
        let mut out = Vec::new();
        if !self.is_ready() {
            return out;
        }

        if self.engine.is_motion_finished() && self.pending_start.is_none() {
            self.slots.finished();
            let idle = self.idle_group.clone();
            if let Ok(reqs) = self.start_random_motion(&idle, MotionPriority::Idle, resolver) {
                out.extend(reqs);
            }
        }

        self.drag.update(dt);
        let (dx, dy) = self.drag.value();
        for (id, kx, ky, kxy) in DRAG_PARAMETERS {
            self.engine
                .set_parameter(id, dx * kx + dy * ky + dx * dy * kxy, 1.0);
        }

        if self.lip_sync.update(dt) {
            let value = self.lip_sync.rms();
            if let Some(m) = self.manifest.as_ref() {
                for id in &m.lip_sync_ids {
                    self.engine.set_parameter(id, value, self.lip_sync_weight);
                }
            }
        }

        self.engine.update(dt);
        out
    }

    pub fn draw(&mut self, projection: &nalgebra::Matrix4<f32>) {
        if self.is_ready() {
            self.engine.draw(projection);
        }
    }

    /// Tear down: release the engine and make every later completion inert.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.in_flight.clear();
        self.pending_start = None;
        self.lip_sync.stop();
        self.engine.release();
    }
}

fn fan_in_entry(counter: &mut PendingWorkCounter) -> Entry {
    if counter.claim_if_empty().just_satisfied() {
        Entry::Continue
    } else {
        Entry::Wait
    }
}

fn optional<F>(
    in_flight: &mut HashMap<String, String>,
    issue: &mut F,
    kind: ResourceKind,
    path: &Option<String>,
) -> Entry
where
    F: FnMut(&mut HashMap<String, String>, ResourceKind, &str),
{
    match path {
        Some(p) => {
            issue(in_flight, kind, p);
            Entry::Wait
        }
        None => Entry::Continue,
    }
}
