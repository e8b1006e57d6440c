#![cfg(target_arch = "wasm32")]
use js_sys::{Function, Promise, Reflect};
use rigview_wasm::{abi_version, set_log_level, RigViewer};
use serde_json::json;
use wasm_bindgen::{JsCast, JsValue};
use wasm_bindgen_futures::JsFuture;
use wasm_bindgen_test::*;
use web_sys::HtmlCanvasElement;

wasm_bindgen_test_configure!(run_in_browser);

const PIXEL_PNG: &str = "data:image/png;base64,iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAQAAAC1HAwCAAAAC0lEQVR42mNkYAAAAAYAAjCB0C8AAAAASUVORK5CYII=";

fn canvas() -> HtmlCanvasElement {
    let document = web_sys::window().unwrap().document().unwrap();
    let canvas: HtmlCanvasElement = document.create_element("canvas").unwrap().dyn_into().unwrap();
    canvas.set_width(400);
    canvas.set_height(300);
    canvas
}

/// Engine factory whose objects record calls on `globalThis.__rigCalls`.
fn recording_factory() -> Function {
    Function::new_with_args(
        "gl",
        r#"
        const calls = (globalThis.__rigCalls = globalThis.__rigCalls || []);
        const rec = (name) => (...args) => { calls.push(name); return true; };
        return {
            loadModel: rec("loadModel"),
            loadMotion: rec("loadMotion"),
            setupBreath: rec("setupBreath"),
            bindTexture: rec("bindTexture"),
            startMotion: rec("startMotion"),
            isMotionFinished: () => false,
            setParameter: rec("setParameter"),
            hitTest: () => false,
            update: rec("update"),
            draw: rec("draw"),
            release: rec("release"),
        };
        "#,
    )
}

fn recorded() -> Vec<String> {
    let global = js_sys::global();
    let calls = Reflect::get(&global, &JsValue::from_str("__rigCalls")).unwrap();
    if calls.is_undefined() {
        return Vec::new();
    }
    js_sys::Array::from(&calls)
        .iter()
        .filter_map(|v| v.as_string())
        .collect()
}

fn mark_table() -> JsValue {
    let table = json!({
        "base_url": "",
        "entries": {
            "Resources/Mark/Mark.model3.json": {
                "text": include_str!("../../../../fixtures/models/Mark/Mark.model3.json")
            },
            "Resources/Mark/Mark.moc3": {
                "text": include_str!("../../../../fixtures/models/Mark/Mark.moc3")
            },
            "Resources/Mark/motions/mark_m01.motion3.json": {
                "text": include_str!("../../../../fixtures/models/Mark/motions/mark_m01.motion3.json")
            },
            "Resources/Mark/Mark.2048/texture_00.png": { "url": PIXEL_PNG }
        }
    });
    JsValue::from_str(&table.to_string())
}

fn mark_config() -> JsValue {
    let cfg = js_sys::Object::new();
    let models = js_sys::Array::of1(&JsValue::from_str("Mark"));
    Reflect::set(&cfg, &JsValue::from_str("models"), &models).unwrap();
    cfg.into()
}

fn status_field(viewer: &RigViewer, name: &str) -> JsValue {
    let status = viewer.status().unwrap();
    Reflect::get(&status, &JsValue::from_str(name)).unwrap()
}

async fn sleep(ms: i32) {
    let promise = Promise::new(&mut |resolve, _| {
        web_sys::window()
            .unwrap()
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms)
            .unwrap();
    });
    JsFuture::from(promise).await.unwrap();
}

#[wasm_bindgen_test]
fn abi_is_1() {
    assert_eq!(abi_version(), 1);
}

#[wasm_bindgen_test]
fn log_level_survives_a_second_viewer() {
    set_log_level("debug");
    let _first = RigViewer::new(canvas(), recording_factory(), JsValue::UNDEFINED, JsValue::NULL).unwrap();
    assert_eq!(log::max_level(), log::LevelFilter::Debug);
    set_log_level("warn");
    let _second = RigViewer::new(canvas(), recording_factory(), JsValue::UNDEFINED, JsValue::NULL).unwrap();
    assert_eq!(log::max_level(), log::LevelFilter::Warn);
    set_log_level("info");
}

#[wasm_bindgen_test]
fn construct_with_defaults() {
    let viewer = RigViewer::new(canvas(), recording_factory(), JsValue::UNDEFINED, JsValue::NULL);
    assert!(viewer.is_ok());
}

#[wasm_bindgen_test]
fn bad_config_is_rejected() {
    let cfg = js_sys::Object::new();
    Reflect::set(&cfg, &JsValue::from_str("min_scale"), &JsValue::from_f64(3.0)).unwrap();
    Reflect::set(&cfg, &JsValue::from_str("max_scale"), &JsValue::from_f64(1.0)).unwrap();
    let viewer = RigViewer::new(canvas(), recording_factory(), cfg.into(), JsValue::UNDEFINED);
    assert!(viewer.is_err());
}

#[wasm_bindgen_test]
fn select_out_of_range_is_an_error() {
    let viewer = RigViewer::new(canvas(), recording_factory(), mark_config(), mark_table()).unwrap();
    assert!(viewer.select(3).is_err());
}

#[wasm_bindgen_test]
fn unknown_priority_is_rejected() {
    let viewer = RigViewer::new(canvas(), recording_factory(), mark_config(), mark_table()).unwrap();
    assert!(viewer.start_motion("Idle", 0, "urgent").is_err());
}

#[wasm_bindgen_test]
fn zoom_is_clamped() {
    let viewer = RigViewer::new(canvas(), recording_factory(), JsValue::UNDEFINED, JsValue::UNDEFINED).unwrap();
    viewer.zoom(10.0, 200.0, 150.0);
    assert_eq!(status_field(&viewer, "scale").as_f64(), Some(2.0));
}

#[wasm_bindgen_test]
async fn inline_model_loads_and_draws() {
    let viewer = RigViewer::new(canvas(), recording_factory(), mark_config(), mark_table()).unwrap();
    viewer.select(0).unwrap();

    // everything but the texture is inline, so the load runs up to the decode
    assert_eq!(
        status_field(&viewer, "state").as_string().as_deref(),
        Some("Textures")
    );

    let mut ready = false;
    for _ in 0..50 {
        sleep(20).await;
        if status_field(&viewer, "ready").as_bool() == Some(true) {
            ready = true;
            break;
        }
    }
    assert!(ready, "model never became ready");
    assert_eq!(viewer.texture_count(), 1);

    viewer.tick(0.0);
    viewer.tick(16.0);
    let calls = recorded();
    assert!(calls.iter().any(|c| c == "loadModel"));
    assert!(calls.iter().any(|c| c == "bindTexture"));
    assert!(calls.iter().any(|c| c == "draw"));

    viewer.release();
    viewer.release();
    assert_eq!(viewer.texture_count(), 0);
    assert_eq!(status_field(&viewer, "released").as_bool(), Some(true));
}
