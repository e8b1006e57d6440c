mod common;

use common::FakeGpu;
use rigview_core::{DecodeStatus, TextureCache, TextureError};

#[test]
fn double_acquire_decodes_twice_and_uploads_once() {
    let mut cache = TextureCache::new();
    let mut gpu = FakeGpu::default();

    let a = cache.acquire("Resources/Haru/t0.png", true, "https://cdn/t0.png");
    let b = cache.acquire("Resources/Haru/t0.png", true, "https://cdn/t0.png");
    assert_ne!(a.id, b.id);
    assert_eq!(cache.decodes_issued(), 2);
    assert_eq!(cache.pending_decodes(), 2);
    assert_eq!(cache.len(), 1);

    let first = cache.complete(a.id, Ok((512, 256)), &mut gpu).expect("first");
    let second = cache.complete(b.id, Ok((512, 256)), &mut gpu).expect("second");
    assert_eq!(first.handle, second.handle);
    assert_eq!(first.status, DecodeStatus::Decoded);
    assert_eq!((second.width, second.height), (512, 256));
    assert_eq!(cache.uploads(), 1);
    assert_eq!(gpu.uploads.len(), 1);
    assert_eq!(cache.pending_decodes(), 0);
}

#[test]
fn second_decode_completing_first_wins_the_upload() {
    let mut cache = TextureCache::new();
    let mut gpu = FakeGpu::default();
    let a = cache.acquire("t.png", false, "t.png");
    let b = cache.acquire("t.png", false, "t.png");

    let rb = cache.complete(b.id, Ok((8, 8)), &mut gpu).expect("b");
    let ra = cache.complete(a.id, Ok((8, 8)), &mut gpu).expect("a");
    assert_eq!(ra.handle, rb.handle);
    assert_eq!(gpu.uploads.len(), 1);
}

#[test]
fn failed_decode_after_success_keeps_the_texture() {
    let mut cache = TextureCache::new();
    let mut gpu = FakeGpu::default();
    let a = cache.acquire("t.png", true, "t.png");
    let b = cache.acquire("t.png", true, "t.png");
    cache.complete(a.id, Ok((4, 4)), &mut gpu).expect("a");

    let err = cache.complete(b.id, Err("network".into()), &mut gpu).unwrap_err();
    assert!(matches!(err, TextureError::Decode { .. }));
    let record = cache.get("t.png", true).expect("record");
    assert_eq!(record.status, DecodeStatus::Decoded);
    assert!(record.handle.is_some());
}

#[test]
fn release_deletes_every_handle_and_forgets_pending_decodes() {
    let mut cache = TextureCache::new();
    let mut gpu = FakeGpu::default();
    let a = cache.acquire("a.png", true, "a.png");
    let b = cache.acquire("b.png", true, "b.png");
    let pending = cache.acquire("c.png", true, "c.png");
    cache.complete(a.id, Ok((1, 1)), &mut gpu).expect("a");
    cache.complete(b.id, Ok((1, 1)), &mut gpu).expect("b");

    cache.release(&mut gpu);
    assert_eq!(gpu.deleted.len(), 2);
    assert!(cache.is_empty());
    assert_eq!(
        cache.complete(pending.id, Ok((1, 1)), &mut gpu).unwrap_err(),
        TextureError::UnknownDecode(pending.id)
    );
}

#[test]
fn failed_upload_marks_the_record_failed_until_a_later_upload() {
    let mut cache = TextureCache::new();
    let mut gpu = FakeGpu::default();
    gpu.lost_context = true;
    let a = cache.acquire("t.png", true, "t.png");
    let err = cache.complete(a.id, Ok((16, 16)), &mut gpu).unwrap_err();
    assert!(matches!(err, TextureError::Upload { .. }));
    let record = cache.get("t.png", true).expect("record");
    assert_eq!(record.status, DecodeStatus::Failed);
    assert!(record.handle.is_none());
    assert_eq!(cache.uploads(), 0);

    gpu.lost_context = false;
    let b = cache.acquire("t.png", true, "t.png");
    let record = cache.complete(b.id, Ok((16, 16)), &mut gpu).expect("retry");
    assert_eq!(record.status, DecodeStatus::Decoded);
    assert!(record.handle.is_some());
    assert_eq!(cache.uploads(), 1);
    assert_eq!(gpu.uploads.len(), 1);
}
