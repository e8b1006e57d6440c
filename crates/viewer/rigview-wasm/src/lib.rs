//! Browser host for the rigview viewer.
//!
//! `RigViewer` owns a [`SceneDirector`] and performs the I/O it asks for: fetches go
//! through `window.fetch`, image decodes through `HTMLImageElement.decode()`, and every
//! completion is fed back on the microtask that resolved it.

mod bridge;
mod fetch;
mod logger;
mod webgl;

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use js_sys::{Function, JSON};
use serde::Serialize;
use serde_wasm_bindgen as swb;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::spawn_local;
use web_sys::HtmlCanvasElement;

use rigview_core::{
    AssetResolver, AssetTable, HostRequest, LoadState, Location, MotionPriority,
    PassthroughResolver, SceneDirector, ViewerConfig, ViewerError,
};

pub use bridge::JsRigEngine;
pub use webgl::WebGlTextures;

type Director = SceneDirector<JsRigEngine, WebGlTextures>;
type Shared = Rc<RefCell<Director>>;

fn jsvalue_is_undefined_or_null(v: &JsValue) -> bool {
    v.is_undefined() || v.is_null()
}

fn js_error(err: ViewerError) -> JsError {
    JsError::new(&err.to_string())
}

fn parse_priority(name: &str) -> Result<MotionPriority, JsError> {
    match name.to_ascii_lowercase().as_str() {
        "none" => Ok(MotionPriority::None),
        "idle" => Ok(MotionPriority::Idle),
        "normal" | "" => Ok(MotionPriority::Normal),
        "force" => Ok(MotionPriority::Force),
        other => Err(JsError::new(&format!("unknown motion priority '{other}'"))),
    }
}

/// Build the resolver from a JS asset table: undefined/null fetches logical paths
/// verbatim, a string is parsed as JSON, an object is stringified first.
fn resolver_from(table: JsValue) -> Result<Box<dyn AssetResolver>, JsError> {
    if jsvalue_is_undefined_or_null(&table) {
        return Ok(Box::new(PassthroughResolver {
            base_url: String::new(),
        }));
    }
    let text = match table.as_string() {
        Some(s) => s,
        None => JSON::stringify(&table)
            .map_err(|e| JsError::new(&format!("asset table stringify error: {e:?}")))?
            .as_string()
            .ok_or_else(|| JsError::new("asset table: stringify produced non-string"))?,
    };
    let parsed = AssetTable::from_json_str(&text)
        .map_err(|e| JsError::new(&format!("asset table error: {e}")))?;
    log::info!("asset table with {} entries", parsed.len());
    Ok(Box::new(parsed))
}

/// Perform host requests. Each completion may issue more requests, which are
/// dispatched in turn. A released or dropped viewer ignores late completions.
fn dispatch(shared: &Shared, requests: Vec<HostRequest>) {
    for request in requests {
        let weak = Rc::downgrade(shared);
        match request {
            HostRequest::Fetch(req) => spawn_local(async move {
                let result = match &req.location {
                    Location::Url(url) => fetch::fetch_bytes(url).await,
                    Location::Inline(asset) => Ok(asset.as_bytes().to_vec()),
                };
                if let Err(e) = &result {
                    log::warn!("fetch {} failed: {e}", req.path);
                }
                complete(&weak, |d| d.on_fetch_complete(&req.ticket, result));
            }),
            HostRequest::DecodeImage(req) => spawn_local(async move {
                let image = fetch::decode_image(&req.url).await;
                if let Err(e) = &image {
                    log::warn!("decode {} failed: {e}", req.key.path);
                }
                complete(&weak, |d| d.on_image_decoded(req.id, image));
            }),
        }
    }
}

fn complete(
    weak: &Weak<RefCell<Director>>,
    feed: impl FnOnce(&mut Director) -> Result<Vec<HostRequest>, ViewerError>,
) {
    let Some(shared) = weak.upgrade() else {
        return;
    };
    let next = match shared.try_borrow_mut() {
        Ok(mut director) => feed(&mut director),
        Err(_) => {
            log::error!("completion arrived while the viewer was busy; dropped");
            return;
        }
    };
    match next {
        Ok(next) => dispatch(&shared, next),
        Err(ViewerError::Released) => log::debug!("completion after release ignored"),
        Err(e) => log::warn!("completion rejected: {e}"),
    }
}

#[derive(Serialize)]
struct Progress {
    completed: usize,
    total: usize,
}

#[derive(Serialize)]
struct Status {
    scene: usize,
    generation: Option<u64>,
    state: Option<LoadState>,
    ready: bool,
    halted: Option<String>,
    expressions: Option<Progress>,
    motions: Option<Progress>,
    textures: Option<Progress>,
    stale_completions: u64,
    scale: f32,
    translation: (f32, f32),
    released: bool,
}

#[wasm_bindgen]
pub struct RigViewer {
    director: Shared,
    canvas: HtmlCanvasElement,
}

#[wasm_bindgen]
impl RigViewer {
    /// Create a viewer on `canvas`.
    ///
    /// `engine_factory(gl)` returns a fresh engine object per model. `config` is a
    /// (partial) viewer config or undefined/null for defaults; `asset_table` maps logical
    /// paths to served locations and may be omitted.
    #[wasm_bindgen(constructor)]
    pub fn new(
        canvas: HtmlCanvasElement,
        engine_factory: Function,
        config: JsValue,
        asset_table: JsValue,
    ) -> Result<RigViewer, JsError> {
        console_error_panic_hook::set_once();
        logger::init(log::LevelFilter::Info);

        let cfg: ViewerConfig = if jsvalue_is_undefined_or_null(&config) {
            ViewerConfig::default()
        } else {
            swb::from_value(config).map_err(|e| JsError::new(&format!("config error: {e}")))?
        };
        let gl = webgl::context(&canvas)
            .map_err(|reason| js_error(ViewerError::NoGraphicsContext { reason }))?;
        let backend = WebGlTextures::new(gl.clone());
        let registry = backend.registry();
        let resolver = resolver_from(asset_table)?;

        let make_engine = Box::new(move || JsRigEngine::create(&engine_factory, &gl, registry.clone()));
        let mut director = Director::new(
            cfg,
            resolver,
            backend,
            make_engine,
            canvas.width() as f32,
            canvas.height() as f32,
        )
        .map_err(js_error)?;
        if let Some(window) = web_sys::window() {
            director.set_device_pixel_ratio(window.device_pixel_ratio() as f32);
        }

        Ok(RigViewer {
            director: Rc::new(RefCell::new(director)),
            canvas,
        })
    }

    /// Replace the current model with model `index`.
    #[wasm_bindgen]
    pub fn select(&self, index: usize) -> Result<(), JsError> {
        let next = self.director.borrow_mut().select(index).map_err(js_error)?;
        dispatch(&self.director, next);
        Ok(())
    }

    #[wasm_bindgen(js_name = next_scene)]
    pub fn next_scene(&self) -> Result<(), JsError> {
        let next = self.director.borrow_mut().next_scene().map_err(js_error)?;
        dispatch(&self.director, next);
        Ok(())
    }

    /// Switch to a random model other than the current one.
    #[wasm_bindgen(js_name = random_scene)]
    pub fn random_scene(&self) -> Result<(), JsError> {
        let index = self.director.borrow_mut().random_scene();
        self.select(index)
    }

    /// Advance and draw one frame. `now_ms` is a `requestAnimationFrame` timestamp.
    #[wasm_bindgen]
    pub fn tick(&self, now_ms: f64) {
        let next = {
            let mut director = self.director.borrow_mut();
            if director.is_released() {
                return;
            }
            director
                .backend()
                .begin_frame(self.canvas.width() as i32, self.canvas.height() as i32);
            director.tick(now_ms / 1000.0)
        };
        dispatch(&self.director, next);
    }

    fn canvas_origin(&self) -> (f32, f32) {
        let rect = self.canvas.get_bounding_client_rect();
        (rect.left() as f32, rect.top() as f32)
    }

    #[wasm_bindgen(js_name = pointer_down)]
    pub fn pointer_down(&self, page_x: f32, page_y: f32) {
        let (left, top) = self.canvas_origin();
        self.director.borrow_mut().pointer_down(page_x, page_y, left, top);
    }

    #[wasm_bindgen(js_name = pointer_move)]
    pub fn pointer_move(&self, page_x: f32, page_y: f32) {
        let (left, top) = self.canvas_origin();
        self.director.borrow_mut().pointer_move(page_x, page_y, left, top);
    }

    #[wasm_bindgen(js_name = pointer_up)]
    pub fn pointer_up(&self, page_x: f32, page_y: f32) {
        let (left, top) = self.canvas_origin();
        let next = self.director.borrow_mut().pointer_up(page_x, page_y, left, top);
        dispatch(&self.director, next);
    }

    /// Start motion `group[index]`. `priority` is one of "idle", "normal", "force".
    #[wasm_bindgen(js_name = start_motion)]
    pub fn start_motion(&self, group: &str, index: usize, priority: &str) -> Result<(), JsError> {
        let priority = parse_priority(priority)?;
        let next = self
            .director
            .borrow_mut()
            .start_motion(group, index, priority)
            .map_err(js_error)?;
        dispatch(&self.director, next);
        Ok(())
    }

    #[wasm_bindgen(js_name = set_expression)]
    pub fn set_expression(&self, name: &str) -> Result<(), JsError> {
        self.director.borrow_mut().set_expression(name).map_err(js_error)
    }

    /// The canvas was resized; `width`/`height` are the new backing-store size.
    #[wasm_bindgen]
    pub fn resize(&self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
        let mut director = self.director.borrow_mut();
        director.resize(width as f32, height as f32);
        if let Some(window) = web_sys::window() {
            director.set_device_pixel_ratio(window.device_pixel_ratio() as f32);
        }
    }

    /// Zoom by `factor` around device pixel (cx, cy).
    #[wasm_bindgen]
    pub fn zoom(&self, factor: f32, cx: f32, cy: f32) {
        self.director.borrow_mut().zoom(factor, cx, cy);
    }

    #[wasm_bindgen]
    pub fn pan(&self, dx: f32, dy: f32) {
        self.director.borrow_mut().pan(dx, dy);
    }

    /// Snapshot of the load state and view, for diagnostics.
    #[wasm_bindgen]
    pub fn status(&self) -> Result<JsValue, JsError> {
        let director = self.director.borrow();
        let view = director.frame().view();
        let pipeline = director.pipeline();
        let progress = |c: rigview_core::PendingWorkCounter| Progress {
            completed: c.completed(),
            total: c.total(),
        };
        let status = Status {
            scene: director.scene(),
            generation: pipeline.map(|p| p.generation().0),
            state: pipeline.map(|p| p.state()),
            ready: pipeline.is_some_and(|p| p.is_ready()),
            halted: pipeline.and_then(|p| p.halted()).map(|e| e.to_string()),
            expressions: pipeline.map(|p| progress(p.expression_progress())),
            motions: pipeline.map(|p| progress(p.motion_progress())),
            textures: pipeline.map(|p| progress(p.texture_progress())),
            stale_completions: director.stale_completions(),
            scale: view.scale(),
            translation: view.translation(),
            released: director.is_released(),
        };
        swb::to_value(&status).map_err(|e| JsError::new(&format!("status error: {e}")))
    }

    /// Live GPU textures owned by the viewer.
    #[wasm_bindgen(js_name = texture_count)]
    pub fn texture_count(&self) -> usize {
        self.director.borrow().backend().live()
    }

    /// Dispose the model and free all textures. Idempotent.
    #[wasm_bindgen]
    pub fn release(&self) {
        self.director.borrow_mut().release();
    }
}

/// Set the console log level ("off", "error", "warn", "info", "debug", "trace").
#[wasm_bindgen(js_name = set_log_level)]
pub fn set_log_level(level: &str) {
    logger::set_level(logger::parse_level(level));
}

/// Numeric ABI version for compatibility checks at init.
#[wasm_bindgen]
pub fn abi_version() -> u32 {
    1
}
