//! WebGL texture backend.
//!
//! Uploaded textures live in a [`TextureRegistry`] shared with the engine bridge, so a
//! handle bound on the Rust side reaches the JS engine as the real `WebGLTexture`.

use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use rigview_core::{TextureBackend, TextureError, TextureFilter, TextureHandle, UploadOptions, UploadedTexture};
use wasm_bindgen::JsCast;
use web_sys::{HtmlCanvasElement, HtmlImageElement, WebGlRenderingContext as GL, WebGlTexture};

pub type TextureRegistry = Rc<RefCell<HashMap<TextureHandle, WebGlTexture>>>;

/// Acquire a WebGL context with premultiplied alpha, or explain why there is none.
pub fn context(canvas: &HtmlCanvasElement) -> Result<GL, String> {
    let ctx = canvas
        .get_context("webgl")
        .map_err(|e| format!("{e:?}"))?
        .ok_or_else(|| "canvas has no webgl context".to_string())?;
    ctx.dyn_into::<GL>()
        .map_err(|_| "context is not a WebGLRenderingContext".to_string())
}

fn filter(f: TextureFilter) -> i32 {
    match f {
        TextureFilter::Linear => GL::LINEAR as i32,
        TextureFilter::LinearMipmapLinear => GL::LINEAR_MIPMAP_LINEAR as i32,
    }
}

pub struct WebGlTextures {
    gl: GL,
    registry: TextureRegistry,
    next: u32,
}

impl WebGlTextures {
    pub fn new(gl: GL) -> Self {
        Self {
            gl,
            registry: Rc::new(RefCell::new(HashMap::new())),
            next: 0,
        }
    }

    pub fn registry(&self) -> TextureRegistry {
        self.registry.clone()
    }

    pub fn gl(&self) -> &GL {
        &self.gl
    }

    pub fn live(&self) -> usize {
        self.registry.borrow().len()
    }

    /// Reset the viewport and clear to transparent black before the model draws.
    pub fn begin_frame(&self, width: i32, height: i32) {
        self.gl.viewport(0, 0, width, height);
        self.gl.clear_color(0.0, 0.0, 0.0, 0.0);
        self.gl.clear(GL::COLOR_BUFFER_BIT);
        self.gl.enable(GL::BLEND);
    }
}

impl TextureBackend for WebGlTextures {
    type Image = HtmlImageElement;

    fn upload(
        &mut self,
        image: &HtmlImageElement,
        options: &UploadOptions,
    ) -> Result<UploadedTexture, TextureError> {
        let gl = &self.gl;
        let texture = gl.create_texture().ok_or_else(|| TextureError::Upload {
            reason: "createTexture returned null (context lost?)".into(),
        })?;
        gl.bind_texture(GL::TEXTURE_2D, Some(&texture));
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MIN_FILTER, filter(options.min_filter));
        gl.tex_parameteri(GL::TEXTURE_2D, GL::TEXTURE_MAG_FILTER, filter(options.mag_filter));
        gl.pixel_storei(
            GL::UNPACK_PREMULTIPLY_ALPHA_WEBGL,
            i32::from(options.premultiply_alpha),
        );
        let uploaded = gl.tex_image_2d_with_u32_and_u32_and_image(
            GL::TEXTURE_2D,
            0,
            GL::RGBA as i32,
            GL::RGBA,
            GL::UNSIGNED_BYTE,
            image,
        );
        if let Err(e) = uploaded {
            gl.bind_texture(GL::TEXTURE_2D, None);
            gl.delete_texture(Some(&texture));
            return Err(TextureError::Upload {
                reason: format!("{e:?}"),
            });
        }
        if options.generate_mipmaps {
            gl.generate_mipmap(GL::TEXTURE_2D);
        }
        gl.bind_texture(GL::TEXTURE_2D, None);

        let handle = TextureHandle(self.next);
        self.next += 1;
        self.registry.borrow_mut().insert(handle, texture);
        Ok(UploadedTexture {
            handle,
            width: image.natural_width(),
            height: image.natural_height(),
        })
    }

    fn delete(&mut self, handle: TextureHandle) {
        if let Some(texture) = self.registry.borrow_mut().remove(&handle) {
            self.gl.delete_texture(Some(&texture));
        }
    }
}
