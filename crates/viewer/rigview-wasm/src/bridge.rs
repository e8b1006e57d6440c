//! [`RigEngine`] backed by a JS object.
//!
//! The host supplies a factory `(gl) => engine`. The engine object exposes camelCase
//! methods (`loadModel`, `loadMotion`, `setParameter`, `draw`, ...). Missing loaders fail
//! with [`EngineError::Unavailable`]; missing setup or runtime methods are skipped.

use js_sys::{Array, Float32Array, Function, Reflect, Uint8Array};
use nalgebra::Matrix4;
use rigview_core::{BreathParameter, EngineError, Layout, RigEngine, TextureHandle};
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::WebGlRenderingContext;

use crate::webgl::TextureRegistry;

fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    // plain objects rather than Maps for layout tables
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

fn strings(ids: &[String]) -> JsValue {
    ids.iter().map(|s| JsValue::from_str(s)).collect::<Array>().into()
}

fn reason(err: &JsValue) -> String {
    err.as_string()
        .or_else(|| {
            err.dyn_ref::<js_sys::Error>()
                .map(|e| String::from(e.message()))
        })
        .unwrap_or_else(|| format!("{err:?}"))
}

pub struct JsRigEngine {
    target: JsValue,
    textures: TextureRegistry,
}

impl JsRigEngine {
    /// Call `factory(gl)` for a fresh engine object. A throwing factory yields an engine
    /// whose loaders all report unavailable.
    pub fn create(factory: &Function, gl: &WebGlRenderingContext, textures: TextureRegistry) -> Self {
        let target = match factory.call1(&JsValue::UNDEFINED, gl) {
            Ok(v) if v.is_object() => v,
            Ok(_) => {
                log::error!("engine factory did not return an object");
                JsValue::UNDEFINED
            }
            Err(e) => {
                log::error!("engine factory threw: {}", reason(&e));
                JsValue::UNDEFINED
            }
        };
        Self { target, textures }
    }

    fn method(&self, name: &str) -> Option<Function> {
        if !self.target.is_object() {
            return None;
        }
        Reflect::get(&self.target, &JsValue::from_str(name))
            .ok()?
            .dyn_into::<Function>()
            .ok()
    }

    fn apply(&self, name: &str, args: &[JsValue]) -> Option<Result<JsValue, JsValue>> {
        let f = self.method(name)?;
        let list: Array = args.iter().collect();
        Some(f.apply(&self.target, &list))
    }

    fn load(&self, name: &str, what: &str, args: &[JsValue]) -> Result<(), EngineError> {
        match self.apply(name, args) {
            None => Err(EngineError::Unavailable),
            Some(Ok(v)) if v.as_bool() == Some(false) => Err(EngineError::Rejected {
                what: what.to_string(),
                reason: format!("{name} returned false"),
            }),
            Some(Ok(_)) => Ok(()),
            Some(Err(e)) => Err(EngineError::Rejected {
                what: what.to_string(),
                reason: reason(&e),
            }),
        }
    }

    fn notify(&self, name: &str, args: &[JsValue]) {
        if let Some(Err(e)) = self.apply(name, args) {
            log::warn!("engine.{name} threw: {}", reason(&e));
        }
    }

    fn query(&self, name: &str, args: &[JsValue]) -> Option<bool> {
        match self.apply(name, args)? {
            Ok(v) => v.as_bool(),
            Err(e) => {
                log::warn!("engine.{name} threw: {}", reason(&e));
                None
            }
        }
    }
}

fn bytes(data: &[u8]) -> JsValue {
    Uint8Array::from(data).into()
}

fn opt(v: Option<f32>) -> JsValue {
    v.map(|f| JsValue::from_f64(f64::from(f)))
        .unwrap_or(JsValue::UNDEFINED)
}

impl RigEngine for JsRigEngine {
    fn load_model(&mut self, moc: &[u8]) -> Result<(), EngineError> {
        self.load("loadModel", "moc", &[bytes(moc)])
    }

    fn load_expression(&mut self, name: &str, data: &[u8]) -> Result<(), EngineError> {
        self.load("loadExpression", name, &[name.into(), bytes(data)])
    }

    fn load_physics(&mut self, data: &[u8]) -> Result<(), EngineError> {
        self.load("loadPhysics", "physics", &[bytes(data)])
    }

    fn load_pose(&mut self, data: &[u8]) -> Result<(), EngineError> {
        self.load("loadPose", "pose", &[bytes(data)])
    }

    fn load_user_data(&mut self, data: &[u8]) -> Result<(), EngineError> {
        self.load("loadUserData", "user data", &[bytes(data)])
    }

    fn load_motion(
        &mut self,
        key: &str,
        data: &[u8],
        fade_in: Option<f32>,
        fade_out: Option<f32>,
    ) -> Result<(), EngineError> {
        self.load(
            "loadMotion",
            key,
            &[key.into(), bytes(data), opt(fade_in), opt(fade_out)],
        )
    }

    fn setup_eye_blink(&mut self, parameter_ids: &[String]) {
        self.notify("setupEyeBlink", &[strings(parameter_ids)]);
    }

    fn setup_breath(&mut self, parameters: &[BreathParameter]) {
        self.notify("setupBreath", &[to_js(parameters)]);
    }

    fn set_lip_sync_ids(&mut self, parameter_ids: &[String]) {
        self.notify("setLipSyncIds", &[strings(parameter_ids)]);
    }

    fn setup_layout(&mut self, layout: &Layout) {
        self.notify("setupLayout", &[to_js(&layout.0)]);
    }

    fn bind_texture(&mut self, index: usize, texture: TextureHandle) {
        let registry = self.textures.borrow();
        let Some(gl_texture) = registry.get(&texture) else {
            log::warn!("texture {texture:?} not in registry; slot {index} left unbound");
            return;
        };
        let arg: JsValue = gl_texture.clone().into();
        drop(registry);
        self.notify("bindTexture", &[JsValue::from_f64(index as f64), arg]);
    }

    fn start_motion(&mut self, key: &str) {
        self.notify("startMotion", &[key.into()]);
    }

    fn is_motion_finished(&self) -> bool {
        self.query("isMotionFinished", &[]).unwrap_or(true)
    }

    fn set_expression(&mut self, name: &str) {
        self.notify("setExpression", &[name.into()]);
    }

    fn set_parameter(&mut self, id: &str, value: f32, weight: f32) {
        self.notify(
            "setParameter",
            &[id.into(), JsValue::from_f64(f64::from(value)), JsValue::from_f64(f64::from(weight))],
        );
    }

    fn hit_test(&self, area_id: &str, x: f32, y: f32) -> bool {
        self.query(
            "hitTest",
            &[area_id.into(), JsValue::from_f64(f64::from(x)), JsValue::from_f64(f64::from(y))],
        )
        .unwrap_or(false)
    }

    fn update(&mut self, dt: f32) {
        self.notify("update", &[JsValue::from_f64(f64::from(dt))]);
    }

    fn draw(&mut self, projection: &Matrix4<f32>) {
        let m = Float32Array::from(projection.as_slice());
        self.notify("draw", &[m.into()]);
    }

    fn release(&mut self) {
        self.notify("release", &[]);
    }
}
