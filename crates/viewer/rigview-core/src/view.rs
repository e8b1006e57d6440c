//! Device → logical screen → model view coordinate frames.

use nalgebra::Matrix4;
use serde::Serialize;

/// Axis-aligned rectangle in logical units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Rect {
    pub left: f32,
    pub right: f32,
    pub bottom: f32,
    pub top: f32,
}

impl Rect {
    pub fn from_array([left, right, bottom, top]: [f32; 4]) -> Self {
        Self {
            left,
            right,
            bottom,
            top,
        }
    }
}

/// Uniform pan/zoom transform from model view space to logical screen space:
/// `screen = view * scale + translate`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewMatrix {
    scale: f32,
    tx: f32,
    ty: f32,
    min_scale: f32,
    max_scale: f32,
    screen: Rect,
    max_rect: Rect,
}

impl ViewMatrix {
    pub fn new(screen: Rect, max_rect: Rect, min_scale: f32, max_scale: f32) -> Self {
        Self {
            scale: 1.0_f32.clamp(min_scale, max_scale),
            tx: 0.0,
            ty: 0.0,
            min_scale,
            max_scale,
            screen,
            max_rect,
        }
    }

    #[inline]
    pub fn scale(&self) -> f32 {
        self.scale
    }

    #[inline]
    pub fn translation(&self) -> (f32, f32) {
        (self.tx, self.ty)
    }

    pub fn screen(&self) -> Rect {
        self.screen
    }

    pub fn set_screen(&mut self, screen: Rect) {
        self.screen = screen;
        self.adjust_translate(0.0, 0.0);
    }

    /// Pan by (dx, dy), limited so the visible screen never leaves the max logical rect.
    pub fn adjust_translate(&mut self, dx: f32, dy: f32) {
        let s = self.scale;
        let (m, sc) = (self.max_rect, self.screen);
        let mut x = dx;
        let mut y = dy;
        if s * m.left + self.tx + x > sc.left {
            x = sc.left - s * m.left - self.tx;
        }
        if s * m.right + self.tx + x < sc.right {
            x = sc.right - s * m.right - self.tx;
        }
        if s * m.top + self.ty + y < sc.top {
            y = sc.top - s * m.top - self.ty;
        }
        if s * m.bottom + self.ty + y > sc.bottom {
            y = sc.bottom - s * m.bottom - self.ty;
        }
        self.tx += x;
        self.ty += y;
    }

    /// Zoom by `factor` around the screen point (cx, cy). The resulting scale is clamped
    /// to [min_scale, max_scale].
    pub fn adjust_scale(&mut self, cx: f32, cy: f32, factor: f32) {
        if !(factor.is_finite() && factor > 0.0) {
            return;
        }
        let target = (self.scale * factor).clamp(self.min_scale, self.max_scale);
        let k = target / self.scale;
        self.tx = cx + (self.tx - cx) * k;
        self.ty = cy + (self.ty - cy) * k;
        self.scale = target;
        self.adjust_translate(0.0, 0.0);
    }

    #[inline]
    pub fn invert_x(&self, screen_x: f32) -> f32 {
        (screen_x - self.tx) / self.scale
    }

    #[inline]
    pub fn invert_y(&self, screen_y: f32) -> f32 {
        (screen_y - self.ty) / self.scale
    }

    pub fn matrix(&self) -> Matrix4<f32> {
        Matrix4::new_translation(&nalgebra::Vector3::new(self.tx, self.ty, 0.0))
            * Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::new(self.scale, self.scale, 1.0))
    }
}

/// Device pixels → logical screen (affine, from canvas size) → model view (inverse of
/// the pan/zoom [`ViewMatrix`]).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoordinateFrame {
    width: f32,
    height: f32,
    half_height: f32,
    // device → screen: screen = (device - origin) * scale
    dev_scale_x: f32,
    dev_scale_y: f32,
    view: ViewMatrix,
}

fn screen_rect(width: f32, height: f32, half_height: f32) -> Rect {
    let ratio = width / height;
    Rect {
        left: -ratio * half_height,
        right: ratio * half_height,
        bottom: -half_height,
        top: half_height,
    }
}

impl CoordinateFrame {
    pub fn new(
        width: f32,
        height: f32,
        half_height: f32,
        max_rect: Rect,
        min_scale: f32,
        max_scale: f32,
    ) -> Self {
        let (width, height) = (width.max(1.0), height.max(1.0));
        let screen = screen_rect(width, height, half_height);
        let mut frame = Self {
            width,
            height,
            half_height,
            dev_scale_x: 1.0,
            dev_scale_y: -1.0,
            view: ViewMatrix::new(screen, max_rect, min_scale, max_scale),
        };
        frame.update_device_to_screen();
        frame
    }

    pub fn from_config(width: f32, height: f32, cfg: &crate::config::ViewerConfig) -> Self {
        Self::new(
            width,
            height,
            cfg.logical_half_height,
            Rect::from_array(cfg.max_logical_rect),
            cfg.min_scale,
            cfg.max_scale,
        )
    }

    fn update_device_to_screen(&mut self) {
        let screen = self.view.screen();
        let unit = if self.width > self.height {
            (screen.right - screen.left) / self.width
        } else {
            (screen.top - screen.bottom) / self.height
        };
        self.dev_scale_x = unit;
        self.dev_scale_y = -unit;
    }

    /// Canvas size changed: rebuild the logical screen and the device transform.
    pub fn resize(&mut self, width: f32, height: f32) {
        self.width = width.max(1.0);
        self.height = height.max(1.0);
        self.view
            .set_screen(screen_rect(self.width, self.height, self.half_height));
        self.update_device_to_screen();
    }

    #[inline]
    pub fn size(&self) -> (f32, f32) {
        (self.width, self.height)
    }

    pub fn view(&self) -> &ViewMatrix {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewMatrix {
        &mut self.view
    }

    #[inline]
    pub fn to_screen(&self, device_x: f32, device_y: f32) -> (f32, f32) {
        (
            (device_x - self.width * 0.5) * self.dev_scale_x,
            (device_y - self.height * 0.5) * self.dev_scale_y,
        )
    }

    /// Project a device-pixel point into model view space.
    #[inline]
    pub fn to_view(&self, device_x: f32, device_y: f32) -> (f32, f32) {
        let (sx, sy) = self.to_screen(device_x, device_y);
        (self.view.invert_x(sx), self.view.invert_y(sy))
    }

    /// Projection handed to the engine's draw call: view, then logical screen → clip space.
    pub fn projection(&self) -> Matrix4<f32> {
        let screen = self.view.screen();
        let to_clip = Matrix4::new_nonuniform_scaling(&nalgebra::Vector3::new(
            2.0 / (screen.right - screen.left),
            2.0 / (screen.top - screen.bottom),
            1.0,
        ));
        to_clip * self.view.matrix()
    }
}
