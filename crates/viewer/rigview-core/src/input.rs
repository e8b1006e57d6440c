//! Pointer capture and drag smoothing.

use serde::Serialize;

use crate::view::CoordinateFrame;

/// What a pointer event asks the active model to do.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum PointerAction {
    None,
    /// Drag vector in model view space.
    Drag { x: f32, y: f32 },
    /// Pointer released: drag resets to zero and (x, y) is hit-tested in model view space.
    Release { x: f32, y: f32 },
}

/// Captured/not-captured drag state. Coordinates are canvas-local CSS pixels on input
/// and scaled by the device pixel ratio before being stored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointerTracker {
    captured: bool,
    anchor: (f32, f32),
    device_pixel_ratio: f32,
}

impl Default for PointerTracker {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl PointerTracker {
    pub fn new(device_pixel_ratio: f32) -> Self {
        Self {
            captured: false,
            anchor: (0.0, 0.0),
            device_pixel_ratio: if device_pixel_ratio > 0.0 {
                device_pixel_ratio
            } else {
                1.0
            },
        }
    }

    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        if ratio > 0.0 {
            self.device_pixel_ratio = ratio;
        }
    }

    #[inline]
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    /// Anchor in device pixels.
    #[inline]
    pub fn anchor(&self) -> (f32, f32) {
        self.anchor
    }

    fn scaled(&self, x: f32, y: f32) -> (f32, f32) {
        (x * self.device_pixel_ratio, y * self.device_pixel_ratio)
    }

    pub fn down(&mut self, local_x: f32, local_y: f32) {
        self.anchor = self.scaled(local_x, local_y);
        self.captured = true;
    }

    /// Moves while captured report the projection of the anchor held before this event.
    pub fn moved(&mut self, local_x: f32, local_y: f32, frame: &CoordinateFrame) -> PointerAction {
        if !self.captured {
            return PointerAction::None;
        }
        let (x, y) = frame.to_view(self.anchor.0, self.anchor.1);
        self.anchor = self.scaled(local_x, local_y);
        PointerAction::Drag { x, y }
    }

    pub fn up(&mut self, local_x: f32, local_y: f32, frame: &CoordinateFrame) -> PointerAction {
        if !self.captured {
            return PointerAction::None;
        }
        self.captured = false;
        self.anchor = self.scaled(local_x, local_y);
        let (x, y) = frame.to_view(self.anchor.0, self.anchor.1);
        PointerAction::Release { x, y }
    }
}

/// Eases the face toward the drag target with bounded velocity and acceleration.
///
/// Velocities are expressed per reference frame (30 fps) and scaled by the real frame
/// delta, so the easing looks the same at any refresh rate.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DragSmoother {
    target: (f32, f32),
    face: (f32, f32),
    velocity: (f32, f32),
    clock: f32,
    last: Option<f32>,
}

const REFERENCE_FPS: f32 = 30.0;
const MAX_SPEED_PER_SECOND: f32 = 4.0;
const SECONDS_TO_MAX_SPEED: f32 = 0.15;
const EPSILON: f32 = 0.01;

impl DragSmoother {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_target(&mut self, x: f32, y: f32) {
        self.target = (x, y);
    }

    pub fn target(&self) -> (f32, f32) {
        self.target
    }

    /// Smoothed drag position.
    pub fn value(&self) -> (f32, f32) {
        self.face
    }

    pub fn update(&mut self, dt: f32) {
        self.clock += dt.max(0.0);
        let Some(last) = self.last.replace(self.clock) else {
            return;
        };
        let frames = (self.clock - last) * REFERENCE_FPS;
        let max_v = MAX_SPEED_PER_SECOND / REFERENCE_FPS;
        let max_a = frames * max_v / (SECONDS_TO_MAX_SPEED * REFERENCE_FPS);

        let dx = self.target.0 - self.face.0;
        let dy = self.target.1 - self.face.1;
        if dx.abs() <= EPSILON && dy.abs() <= EPSILON {
            return;
        }
        let dist = (dx * dx + dy * dy).sqrt();
        let want = (max_v * dx / dist, max_v * dy / dist);

        let mut ax = want.0 - self.velocity.0;
        let mut ay = want.1 - self.velocity.1;
        let a = (ax * ax + ay * ay).sqrt();
        if a > max_a && a > 0.0 {
            ax *= max_a / a;
            ay *= max_a / a;
        }
        self.velocity.0 += ax;
        self.velocity.1 += ay;

        // brake so the face stops at the target instead of overshooting
        let brake = 0.5 * ((max_a * max_a + 8.0 * max_a * dist).sqrt() - max_a);
        let speed = (self.velocity.0 * self.velocity.0 + self.velocity.1 * self.velocity.1).sqrt();
        if speed > brake && speed > 0.0 {
            self.velocity.0 *= brake / speed;
            self.velocity.1 *= brake / speed;
        }

        self.face.0 += self.velocity.0;
        self.face.1 += self.velocity.1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::Rect;
    use approx::assert_relative_eq;

    fn frame() -> CoordinateFrame {
        CoordinateFrame::new(400.0, 400.0, 1.0, Rect::from_array([-2.0, 2.0, -2.0, 2.0]), 0.8, 2.0)
    }

    #[test]
    fn move_reports_previous_anchor() {
        let f = frame();
        let mut p = PointerTracker::new(1.0);
        p.down(200.0, 200.0);
        let first = p.moved(400.0, 0.0, &f);
        assert_eq!(first, PointerAction::Drag { x: 0.0, y: 0.0 });
        match p.moved(400.0, 0.0, &f) {
            PointerAction::Drag { x, y } => {
                assert_relative_eq!(x, 1.0, epsilon = 1e-5);
                assert_relative_eq!(y, 1.0, epsilon = 1e-5);
            }
            other => panic!("expected drag, got {other:?}"),
        }
    }

    #[test]
    fn events_without_capture_are_ignored() {
        let f = frame();
        let mut p = PointerTracker::new(1.0);
        assert_eq!(p.moved(1.0, 1.0, &f), PointerAction::None);
        assert_eq!(p.up(1.0, 1.0, &f), PointerAction::None);
    }

    #[test]
    fn device_pixel_ratio_scales_anchor() {
        let mut p = PointerTracker::new(2.0);
        p.down(10.0, 20.0);
        assert_eq!(p.anchor(), (20.0, 40.0));
    }

    #[test]
    fn smoother_converges_without_overshoot() {
        let mut s = DragSmoother::new();
        s.set_target(1.0, 0.0);
        let mut max_x = 0.0f32;
        for _ in 0..600 {
            s.update(1.0 / 60.0);
            max_x = max_x.max(s.value().0);
        }
        assert!((s.value().0 - 1.0).abs() <= 0.02);
        assert!(max_x <= 1.0 + EPSILON);
    }
}
