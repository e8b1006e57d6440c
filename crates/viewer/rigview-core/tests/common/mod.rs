#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use nalgebra::Matrix4;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rigview_core::{
    BreathParameter, EngineError, EngineFactory, FetchError, HostRequest, Layout, PassthroughResolver,
    RigEngine, SceneDirector, TextureBackend, TextureError, TextureHandle, UploadOptions,
    UploadedTexture, ViewerConfig,
};
use rigview_test_fixtures as fixtures;

pub type CallLog = Rc<RefCell<Vec<String>>>;

/// Behaviour switches shared between a test and the engines it hands out.
#[derive(Debug, Default)]
pub struct Knobs {
    pub motion_playing: Cell<bool>,
    pub hit_areas: RefCell<HashSet<String>>,
    pub reject_motions: RefCell<HashSet<String>>,
}

/// Records every call as `"<tag>:<call>"`.
pub struct FakeEngine {
    tag: String,
    log: CallLog,
    knobs: Rc<Knobs>,
}

impl FakeEngine {
    pub fn new(tag: &str, log: CallLog, knobs: Rc<Knobs>) -> Self {
        Self {
            tag: tag.to_string(),
            log,
            knobs,
        }
    }

    fn record(&self, call: String) {
        self.log.borrow_mut().push(format!("{}:{call}", self.tag));
    }
}

impl RigEngine for FakeEngine {
    fn load_model(&mut self, moc: &[u8]) -> Result<(), EngineError> {
        self.record(format!("load_model({})", moc.len()));
        Ok(())
    }

    fn load_expression(&mut self, name: &str, _data: &[u8]) -> Result<(), EngineError> {
        self.record(format!("load_expression({name})"));
        Ok(())
    }

    fn load_physics(&mut self, _data: &[u8]) -> Result<(), EngineError> {
        self.record("load_physics".into());
        Ok(())
    }

    fn load_pose(&mut self, _data: &[u8]) -> Result<(), EngineError> {
        self.record("load_pose".into());
        Ok(())
    }

    fn load_user_data(&mut self, _data: &[u8]) -> Result<(), EngineError> {
        self.record("load_user_data".into());
        Ok(())
    }

    fn load_motion(
        &mut self,
        key: &str,
        _data: &[u8],
        fade_in: Option<f32>,
        _fade_out: Option<f32>,
    ) -> Result<(), EngineError> {
        if self.knobs.reject_motions.borrow().contains(key) {
            return Err(EngineError::Rejected {
                what: key.to_string(),
                reason: "bad curve".into(),
            });
        }
        self.record(format!("load_motion({key},{fade_in:?})"));
        Ok(())
    }

    fn setup_eye_blink(&mut self, parameter_ids: &[String]) {
        self.record(format!("setup_eye_blink({})", parameter_ids.join(",")));
    }

    fn setup_breath(&mut self, parameters: &[BreathParameter]) {
        self.record(format!("setup_breath({})", parameters.len()));
    }

    fn set_lip_sync_ids(&mut self, parameter_ids: &[String]) {
        self.record(format!("set_lip_sync_ids({})", parameter_ids.join(",")));
    }

    fn setup_layout(&mut self, layout: &Layout) {
        self.record(format!("setup_layout({})", layout.0.len()));
    }

    fn bind_texture(&mut self, index: usize, texture: TextureHandle) {
        self.record(format!("bind_texture({index},{})", texture.0));
    }

    fn start_motion(&mut self, key: &str) {
        self.knobs.motion_playing.set(true);
        self.record(format!("start_motion({key})"));
    }

    fn is_motion_finished(&self) -> bool {
        !self.knobs.motion_playing.get()
    }

    fn set_expression(&mut self, name: &str) {
        self.record(format!("set_expression({name})"));
    }

    fn set_parameter(&mut self, id: &str, value: f32, weight: f32) {
        self.record(format!("set_parameter({id},{value:.3},{weight:.2})"));
    }

    fn hit_test(&self, area_id: &str, x: f32, y: f32) -> bool {
        self.record(format!("hit_test({area_id},{x:.3},{y:.3})"));
        self.knobs.hit_areas.borrow().contains(area_id)
    }

    fn update(&mut self, dt: f32) {
        self.record(format!("update({dt:.3})"));
    }

    fn draw(&mut self, _projection: &Matrix4<f32>) {
        self.record("draw".into());
    }

    fn release(&mut self) {
        self.record("release".into());
    }
}

/// Images are (width, height) pairs.
#[derive(Default)]
pub struct FakeGpu {
    next: u32,
    pub uploads: Vec<(u32, u32)>,
    pub deleted: Vec<TextureHandle>,
    pub lost_context: bool,
}

impl TextureBackend for FakeGpu {
    type Image = (u32, u32);

    fn upload(
        &mut self,
        image: &(u32, u32),
        _options: &UploadOptions,
    ) -> Result<UploadedTexture, TextureError> {
        if self.lost_context {
            return Err(TextureError::Upload {
                reason: "context lost".into(),
            });
        }
        self.next += 1;
        self.uploads.push(*image);
        Ok(UploadedTexture {
            handle: TextureHandle(self.next),
            width: image.0,
            height: image.1,
        })
    }

    fn delete(&mut self, handle: TextureHandle) {
        self.deleted.push(handle);
    }
}

pub type Director = SceneDirector<FakeEngine, FakeGpu>;

/// Serves fixture model files for URLs of the form `Resources/<Model>/<rel>`.
pub struct Harness {
    pub director: Director,
    pub log: CallLog,
    pub knobs: Rc<Knobs>,
    pub queue: Vec<HostRequest>,
    pub failing: HashSet<String>,
    pub overrides: HashMap<String, Vec<u8>>,
}

pub fn config(models: &[&str]) -> ViewerConfig {
    ViewerConfig {
        models: models.iter().map(|m| m.to_string()).collect(),
        random_seed: 7,
        ..ViewerConfig::default()
    }
}

impl Harness {
    pub fn new(cfg: ViewerConfig) -> Self {
        let log: CallLog = Rc::default();
        let knobs: Rc<Knobs> = Rc::default();
        let count = Rc::new(Cell::new(0usize));
        let (l, k) = (log.clone(), knobs.clone());
        let factory: EngineFactory<FakeEngine> = Box::new(move || {
            let n = count.get();
            count.set(n + 1);
            FakeEngine::new(&format!("m{n}"), l.clone(), k.clone())
        });
        let resolver = Box::new(PassthroughResolver {
            base_url: String::new(),
        });
        let director = SceneDirector::new(cfg, resolver, FakeGpu::default(), factory, 800.0, 600.0)
            .expect("valid config");
        Self {
            director,
            log,
            knobs,
            queue: Vec::new(),
            failing: HashSet::new(),
            overrides: HashMap::new(),
        }
    }

    pub fn haru() -> Self {
        Self::new(config(&["Haru"]))
    }

    pub fn select(&mut self, index: usize) {
        let reqs = self.director.select(index).expect("scene in range");
        self.queue.extend(reqs);
    }

    /// Fail any fetch whose URL contains `needle`.
    pub fn fail(&mut self, needle: &str) {
        self.failing.insert(needle.to_string());
    }

    pub fn serve(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        if self.failing.iter().any(|n| url.contains(n.as_str())) {
            return Err(FetchError::Status { status: 404 });
        }
        if let Some(bytes) = self.overrides.get(url) {
            return Ok(bytes.clone());
        }
        let rest = url
            .strip_prefix("Resources/")
            .ok_or(FetchError::Status { status: 404 })?;
        let (model, rel) = rest
            .split_once('/')
            .ok_or(FetchError::Status { status: 404 })?;
        fixtures::models::read(&model.to_lowercase(), rel)
            .map_err(|e| FetchError::Network {
                reason: e.to_string(),
            })
    }

    /// Complete one queued request and queue whatever follows from it.
    pub fn complete(&mut self, req: HostRequest) {
        let next = match req {
            HostRequest::Fetch(f) => {
                let url = match &f.location {
                    rigview_core::Location::Url(u) => u.clone(),
                    rigview_core::Location::Inline(_) => unreachable!("inline completes in core"),
                };
                let result = self.serve(&url);
                self.director.on_fetch_complete(&f.ticket, result)
            }
            HostRequest::DecodeImage(d) => {
                let image = if self.failing.iter().any(|n| d.url.contains(n.as_str())) {
                    Err(FetchError::Status { status: 404 })
                } else {
                    Ok((256, 256))
                };
                self.director.on_image_decoded(d.id, image)
            }
        };
        self.queue.extend(next.expect("director accepts completions"));
    }

    pub fn pump(&mut self) {
        while !self.queue.is_empty() {
            let req = self.queue.remove(0);
            self.complete(req);
        }
    }

    /// Drain the queue completing requests in a seeded random order.
    pub fn pump_shuffled(&mut self, seed: u64) {
        let mut rng = StdRng::seed_from_u64(seed);
        while !self.queue.is_empty() {
            let i = rng.gen_range(0..self.queue.len());
            let req = self.queue.swap_remove(i);
            self.complete(req);
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.borrow().clone()
    }

    pub fn calls_of(&self, tag: &str) -> Vec<String> {
        let prefix = format!("{tag}:");
        self.log
            .borrow()
            .iter()
            .filter_map(|c| c.strip_prefix(&prefix).map(str::to_string))
            .collect()
    }

    pub fn clear_log(&self) {
        self.log.borrow_mut().clear();
    }
}
