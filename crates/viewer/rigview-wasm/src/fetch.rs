//! Browser fetch and image decode for [`rigview_core::HostRequest`]s.

use js_sys::Uint8Array;
use rigview_core::FetchError;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use web_sys::{HtmlImageElement, Response};

fn describe(err: JsValue) -> String {
    err.as_string()
        .or_else(|| {
            js_sys::JSON::stringify(&err)
                .ok()
                .and_then(|s| s.as_string())
        })
        .unwrap_or_else(|| "unknown error".to_string())
}

fn network(err: JsValue) -> FetchError {
    FetchError::Network {
        reason: describe(err),
    }
}

/// GET `url` and return the body bytes. Non-2xx responses are `FetchError::Status`.
pub async fn fetch_bytes(url: &str) -> Result<Vec<u8>, FetchError> {
    let window = web_sys::window().ok_or_else(|| FetchError::Network {
        reason: "no window".into(),
    })?;
    let resp = JsFuture::from(window.fetch_with_str(url))
        .await
        .map_err(network)?
        .dyn_into::<Response>()
        .map_err(network)?;
    if !resp.ok() {
        return Err(FetchError::Status {
            status: resp.status(),
        });
    }
    let buffer = JsFuture::from(resp.array_buffer().map_err(network)?)
        .await
        .map_err(|e| FetchError::Decode {
            reason: describe(e),
        })?;
    Ok(Uint8Array::new(&buffer).to_vec())
}

/// Load and decode an image. Resolves once the browser has decoded it.
pub async fn decode_image(url: &str) -> Result<HtmlImageElement, FetchError> {
    let img = HtmlImageElement::new().map_err(network)?;
    img.set_cross_origin(Some("anonymous"));
    img.set_src(url);
    JsFuture::from(img.decode())
        .await
        .map_err(|e| FetchError::Decode {
            reason: describe(e),
        })?;
    Ok(img)
}
