//! Scene director: owns the active model pipeline and routes host events to it.
//!
//! The director turns pipeline fetches into [`HostRequest`]s. Inline assets are fed
//! back immediately and texture fetches become image decodes through the
//! [`TextureCache`]. Completions carrying an old generation are counted and dropped.

use std::collections::VecDeque;

use hashbrown::HashMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::clock::FrameTimer;
use crate::config::ViewerConfig;
use crate::engine::RigEngine;
use crate::error::{FetchError, LoadError, TextureError, ViewerError};
use crate::ids::{DecodeId, Generation, IdAllocator};
use crate::input::{PointerAction, PointerTracker};
use crate::pipeline::{ModelLoadPipeline, MotionPriority};
use crate::request::{FetchRequest, HostRequest, ResourceKind, Ticket};
use crate::resolver::{AssetResolver, Location};
use crate::state::LoadState;
use crate::texture::{TextureBackend, TextureCache};
use crate::view::CoordinateFrame;

pub type EngineFactory<E> = Box<dyn FnMut() -> E>;

pub struct SceneDirector<E: RigEngine, B: TextureBackend> {
    config: ViewerConfig,
    resolver: Box<dyn AssetResolver>,
    backend: B,
    textures: TextureCache,
    make_engine: EngineFactory<E>,
    ids: IdAllocator,
    timer: FrameTimer,
    pointer: PointerTracker,
    frame: CoordinateFrame,
    scene: usize,
    pipeline: Option<ModelLoadPipeline<E>>,
    decodes: HashMap<DecodeId, Ticket>,
    stale_completions: u64,
    rng: StdRng,
    released: bool,
}

impl<E: RigEngine, B: TextureBackend> SceneDirector<E, B> {
    pub fn new(
        config: ViewerConfig,
        resolver: Box<dyn AssetResolver>,
        backend: B,
        make_engine: EngineFactory<E>,
        width: f32,
        height: f32,
    ) -> Result<Self, ViewerError> {
        config.validate()?;
        let frame = CoordinateFrame::from_config(width, height, &config);
        let rng = StdRng::seed_from_u64(config.random_seed);
        Ok(Self {
            config,
            resolver,
            backend,
            textures: TextureCache::new(),
            make_engine,
            ids: IdAllocator::new(),
            timer: FrameTimer::default(),
            pointer: PointerTracker::default(),
            frame,
            scene: 0,
            pipeline: None,
            decodes: HashMap::new(),
            stale_completions: 0,
            rng,
            released: false,
        })
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    #[inline]
    pub fn scene(&self) -> usize {
        self.scene
    }

    pub fn pipeline(&self) -> Option<&ModelLoadPipeline<E>> {
        self.pipeline.as_ref()
    }

    pub fn pipeline_mut(&mut self) -> Option<&mut ModelLoadPipeline<E>> {
        self.pipeline.as_mut()
    }

    pub fn frame(&self) -> &CoordinateFrame {
        &self.frame
    }

    pub fn pointer(&self) -> &PointerTracker {
        &self.pointer
    }

    pub fn texture_cache(&self) -> &TextureCache {
        &self.textures
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Completions dropped because their generation was no longer current.
    #[inline]
    pub fn stale_completions(&self) -> u64 {
        self.stale_completions
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.pointer.set_device_pixel_ratio(ratio);
    }

    fn ensure_live(&self) -> Result<(), ViewerError> {
        if self.released {
            Err(ViewerError::Released)
        } else {
            Ok(())
        }
    }

    // ----- scenes -----

    /// Dispose the current model and start loading model `index`.
    pub fn select(&mut self, index: usize) -> Result<Vec<HostRequest>, ViewerError> {
        self.ensure_live()?;
        let (Some(dir), Some(file)) = (
            self.config.model_dir(index),
            self.config.manifest_file(index),
        ) else {
            return Err(ViewerError::SceneOutOfRange {
                index,
                len: self.config.models.len(),
            });
        };
        if let Some(mut old) = self.pipeline.take() {
            log::debug!("disposing generation {:?}", old.generation());
            old.dispose();
        }

        self.scene = index;
        let generation = self.ids.alloc_generation();
        log::info!("scene {index}: loading {dir}{file}");

        let engine = (self.make_engine)();
        let mut pipeline = ModelLoadPipeline::new(generation, &dir, &file, engine, &self.config);
        let first = pipeline.start(self.resolver.as_ref());
        self.pipeline = Some(pipeline);
        Ok(self.route(first))
    }

    /// Cycle to the next model in configuration order.
    pub fn next_scene(&mut self) -> Result<Vec<HostRequest>, ViewerError> {
        let len = self.config.models.len();
        if len == 0 {
            return Err(ViewerError::SceneOutOfRange { index: 0, len });
        }
        self.select((self.scene + 1) % len)
    }

    fn current_generation(&self) -> Option<Generation> {
        self.pipeline
            .as_ref()
            .filter(|p| !p.is_disposed())
            .map(|p| p.generation())
    }

    fn drop_stale(&mut self, ticket: &Ticket) {
        self.stale_completions += 1;
        log::debug!(
            "dropping stale completion {} from {:?}",
            ticket.kind.key(),
            ticket.generation
        );
    }

    /// Absorb a pipeline error: stale completions are counted, anything else is logged.
    fn absorb(&mut self, ticket: &Ticket, err: LoadError) {
        match err {
            LoadError::StaleTicket { .. } | LoadError::Disposed => self.drop_stale(ticket),
            e => log::warn!("{} ({}): {e}", ticket.kind.key(), e.category()),
        }
    }

    // ----- completions -----

    pub fn on_fetch_complete(
        &mut self,
        ticket: &Ticket,
        result: Result<Vec<u8>, FetchError>,
    ) -> Result<Vec<HostRequest>, ViewerError> {
        self.ensure_live()?;
        if self.current_generation() != Some(ticket.generation) {
            self.drop_stale(ticket);
            return Ok(Vec::new());
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(Vec::new());
        };
        let bytes = result.as_deref().map_err(Clone::clone);
        match pipeline.on_fetch(ticket, bytes, self.resolver.as_ref()) {
            Ok(next) => Ok(self.route(next)),
            Err(e) => {
                self.absorb(ticket, e);
                Ok(Vec::new())
            }
        }
    }

    /// Feed the host's answer for a decode issued by the texture cache. The cache is
    /// completed even for a stale generation, so the uploaded texture stays reusable.
    pub fn on_image_decoded(
        &mut self,
        id: DecodeId,
        image: Result<B::Image, FetchError>,
    ) -> Result<Vec<HostRequest>, ViewerError> {
        self.ensure_live()?;
        let Some(ticket) = self.decodes.remove(&id) else {
            log::debug!("decode {id:?} not tracked");
            self.stale_completions += 1;
            return Ok(Vec::new());
        };
        let record = self
            .textures
            .complete(id, image.map_err(|e| e.to_string()), &mut self.backend);

        if self.current_generation() != Some(ticket.generation) {
            self.drop_stale(&ticket);
            return Ok(Vec::new());
        }
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Ok(Vec::new());
        };
        match pipeline.on_texture(&ticket, record, self.resolver.as_ref()) {
            Ok(next) => Ok(self.route(next)),
            Err(e) => {
                self.absorb(&ticket, e);
                Ok(Vec::new())
            }
        }
    }

    /// Turn pipeline fetches into host requests. Inline assets complete synchronously.
    fn route(&mut self, requests: Vec<FetchRequest>) -> Vec<HostRequest> {
        let mut queue: VecDeque<FetchRequest> = requests.into();
        let mut out = Vec::new();
        while let Some(req) = queue.pop_front() {
            if let ResourceKind::Texture { .. } = req.ticket.kind {
                out.extend(self.route_texture(req, &mut queue));
                continue;
            }
            if req.inline_bytes().is_none() {
                out.push(HostRequest::Fetch(req));
                continue;
            }
            let bytes = req.inline_bytes().unwrap_or_default();
            let Some(pipeline) = self.pipeline.as_mut() else {
                break;
            };
            match pipeline.on_fetch(&req.ticket, Ok(bytes), self.resolver.as_ref()) {
                Ok(next) => queue.extend(next),
                Err(e) => self.absorb(&req.ticket, e),
            }
        }
        out
    }

    fn route_texture(
        &mut self,
        req: FetchRequest,
        queue: &mut VecDeque<FetchRequest>,
    ) -> Option<HostRequest> {
        let url = match &req.location {
            Location::Url(url) => url.clone(),
            Location::Inline(_) => {
                let err = TextureError::Decode {
                    path: req.path.clone(),
                    reason: "images are only decoded from URLs".to_string(),
                };
                let pipeline = self.pipeline.as_mut()?;
                match pipeline.on_texture(&req.ticket, Err(err), self.resolver.as_ref()) {
                    Ok(next) => queue.extend(next),
                    Err(e) => self.absorb(&req.ticket, e),
                }
                return None;
            }
        };
        let decode = self
            .textures
            .acquire(&req.path, self.config.premultiplied_alpha, &url);
        self.decodes.insert(decode.id, req.ticket);
        Some(HostRequest::DecodeImage(decode))
    }

    // ----- input -----

    fn local(page_x: f32, page_y: f32, canvas_left: f32, canvas_top: f32) -> (f32, f32) {
        (page_x - canvas_left, page_y - canvas_top)
    }

    pub fn pointer_down(&mut self, page_x: f32, page_y: f32, canvas_left: f32, canvas_top: f32) {
        let (x, y) = Self::local(page_x, page_y, canvas_left, canvas_top);
        self.pointer.down(x, y);
    }

    pub fn pointer_move(&mut self, page_x: f32, page_y: f32, canvas_left: f32, canvas_top: f32) {
        let (x, y) = Self::local(page_x, page_y, canvas_left, canvas_top);
        if let PointerAction::Drag { x, y } = self.pointer.moved(x, y, &self.frame) {
            if let Some(pipeline) = self.pipeline.as_mut() {
                pipeline.set_drag(x, y);
            }
        }
    }

    /// Release the pointer: the drag resets and the release point is hit-tested. The head
    /// picks a random expression; the body starts a random tap motion.
    pub fn pointer_up(
        &mut self,
        page_x: f32,
        page_y: f32,
        canvas_left: f32,
        canvas_top: f32,
    ) -> Vec<HostRequest> {
        let (x, y) = Self::local(page_x, page_y, canvas_left, canvas_top);
        let PointerAction::Release { x, y } = self.pointer.up(x, y, &self.frame) else {
            return Vec::new();
        };
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Vec::new();
        };
        pipeline.set_drag(0.0, 0.0);
        if !pipeline.is_ready() {
            return Vec::new();
        }

        if pipeline.hit_test(&self.config.head_hit_area, x, y) {
            match pipeline.set_random_expression() {
                Ok(name) => log::info!("hit {}: expression {name}", self.config.head_hit_area),
                Err(e) => log::debug!("no expression to apply: {e}"),
            }
            return Vec::new();
        }
        if pipeline.hit_test(&self.config.body_hit_area, x, y) {
            let group = self.config.tap_motion_group.clone();
            match pipeline.start_random_motion(&group, MotionPriority::Normal, self.resolver.as_ref()) {
                Ok(next) => return self.route(next),
                Err(e) => log::debug!("tap motion not started: {e}"),
            }
        }
        Vec::new()
    }

    fn no_model() -> ViewerError {
        ViewerError::Load(LoadError::NotReady {
            state: LoadState::AwaitManifest,
        })
    }

    pub fn start_motion(
        &mut self,
        group: &str,
        index: usize,
        priority: MotionPriority,
    ) -> Result<Vec<HostRequest>, ViewerError> {
        self.ensure_live()?;
        let pipeline = self.pipeline.as_mut().ok_or_else(Self::no_model)?;
        let next = pipeline.start_motion(group, index, priority, self.resolver.as_ref())?;
        Ok(self.route(next))
    }

    pub fn set_expression(&mut self, name: &str) -> Result<(), ViewerError> {
        self.ensure_live()?;
        let pipeline = self.pipeline.as_mut().ok_or_else(Self::no_model)?;
        pipeline.set_expression(name)?;
        Ok(())
    }

    // ----- view -----

    /// Canvas resized (device pixels).
    pub fn resize(&mut self, width: f32, height: f32) {
        self.frame.resize(width, height);
    }

    /// Zoom by `factor` around device point (cx, cy).
    pub fn zoom(&mut self, factor: f32, cx: f32, cy: f32) {
        let (sx, sy) = self.frame.to_screen(cx, cy);
        self.frame.view_mut().adjust_scale(sx, sy, factor);
    }

    /// Pan by (dx, dy) in logical screen units.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.frame.view_mut().adjust_translate(dx, dy);
    }

    // ----- frame -----

    /// Advance one frame at host time `now_seconds` and draw. Returns any fetches the frame
    /// needs.
    pub fn tick(&mut self, now_seconds: f64) -> Vec<HostRequest> {
        if self.released {
            return Vec::new();
        }
        let dt = self.timer.tick(now_seconds);
        let projection = self.frame.projection();
        let Some(pipeline) = self.pipeline.as_mut() else {
            return Vec::new();
        };
        let next = pipeline.update(dt, self.resolver.as_ref());
        pipeline.draw(&projection);
        self.route(next)
    }

    pub fn timer(&self) -> &FrameTimer {
        &self.timer
    }

    /// Pick a random scene index other than the current one (when there is a choice).
    pub fn random_scene(&mut self) -> usize {
        let len = self.config.models.len();
        if len <= 1 {
            return 0;
        }
        let offset = self.rng.gen_range(1..len);
        (self.scene + offset) % len
    }

    /// Dispose the model and free every texture. Later events are rejected.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(mut pipeline) = self.pipeline.take() {
            pipeline.dispose();
        }
        self.textures.release(&mut self.backend);
        self.decodes.clear();
        self.released = true;
        log::info!("viewer released");
    }

    #[inline]
    pub fn is_released(&self) -> bool {
        self.released
    }
}
