//! Capability trait for the external rigging/animation engine.
//!
//! The core never evaluates parameters, physics or meshes; it hands bytes and ids to an
//! engine instance and drives its per-frame update. One engine instance backs one model.

use nalgebra::Matrix4;

use crate::config::BreathParameter;
use crate::error::EngineError;
use crate::ids::TextureHandle;
use crate::manifest::Layout;

pub trait RigEngine {
    /// Load the rig binary. The engine performs its own consistency check.
    fn load_model(&mut self, moc: &[u8]) -> Result<(), EngineError>;
    fn load_expression(&mut self, name: &str, data: &[u8]) -> Result<(), EngineError>;
    fn load_physics(&mut self, data: &[u8]) -> Result<(), EngineError>;
    fn load_pose(&mut self, data: &[u8]) -> Result<(), EngineError>;
    fn load_user_data(&mut self, data: &[u8]) -> Result<(), EngineError>;
    fn load_motion(
        &mut self,
        key: &str,
        data: &[u8],
        fade_in: Option<f32>,
        fade_out: Option<f32>,
    ) -> Result<(), EngineError>;

    fn setup_eye_blink(&mut self, parameter_ids: &[String]);
    fn setup_breath(&mut self, parameters: &[BreathParameter]);
    fn set_lip_sync_ids(&mut self, parameter_ids: &[String]);
    fn setup_layout(&mut self, layout: &Layout);
    fn bind_texture(&mut self, index: usize, texture: TextureHandle);

    fn start_motion(&mut self, key: &str);
    fn is_motion_finished(&self) -> bool;
    fn set_expression(&mut self, name: &str);

    fn set_parameter(&mut self, id: &str, value: f32, weight: f32);
    /// Whether model-view point (x, y) falls inside the hit area `area_id`.
    fn hit_test(&self, area_id: &str, x: f32, y: f32) -> bool;

    fn update(&mut self, dt: f32);
    fn draw(&mut self, projection: &Matrix4<f32>);

    /// Free everything the engine holds for this model.
    fn release(&mut self);
}
