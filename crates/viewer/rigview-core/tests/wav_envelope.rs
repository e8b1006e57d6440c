use approx::assert_relative_eq;
use rigview_core::{AudioEnvelopeDecoder, WavClip, WavError};
use rigview_test_fixtures::wav;

#[test]
fn silent_mono_16_bit_has_zero_envelope_every_tick() {
    let mut dec = AudioEnvelopeDecoder::new();
    assert!(dec.start(&wav::silence16(8_000, 4_000)));
    for _ in 0..8 {
        assert!(dec.update(1.0 / 30.0));
        assert_eq!(dec.rms(), 0.0);
    }
}

#[test]
fn full_scale_square_wave_is_near_one() {
    let mut dec = AudioEnvelopeDecoder::new();
    assert!(dec.start(&wav::square16(16_000, 16_000, 32)));
    for _ in 0..10 {
        assert!(dec.update(1.0 / 60.0));
        assert_relative_eq!(dec.rms(), 1.0, epsilon = 1e-3);
    }
}

#[test]
fn envelope_ends_with_the_clip() {
    let mut dec = AudioEnvelopeDecoder::new();
    assert!(dec.start(&wav::square16(1_000, 100, 4)));
    assert!(dec.update(0.05));
    assert!(dec.is_playing());
    assert!(dec.update(0.2));
    assert!(!dec.is_playing());
    assert!(!dec.update(0.1));
    assert_eq!(dec.rms(), 0.0);
}

#[test]
fn tick_without_new_samples_keeps_previous_value() {
    let mut dec = AudioEnvelopeDecoder::new();
    assert!(dec.start(&wav::square16(1_000, 1_000, 2)));
    // 10.5 ms at 1 kHz: ten samples consumed
    dec.update(0.0105);
    let before = dec.rms();
    assert!(before > 0.9);
    // still short of the eleventh sample
    dec.update(0.0004);
    assert_eq!(dec.rms(), before);
}

#[test]
fn truncated_buffer_without_data_chunk_fails_cleanly() {
    let full = wav::silence16(8_000, 16);
    // header and fmt chunk only
    let cut = &full[..36];
    assert_eq!(WavClip::parse(cut), Err(WavError::MissingDataChunk));

    let mut dec = AudioEnvelopeDecoder::new();
    assert!(!dec.start(cut));
    assert!(!dec.update(0.1));
    assert_eq!(dec.rms(), 0.0);

    for len in 0..36 {
        assert!(WavClip::parse(&full[..len]).is_err(), "prefix of {len} bytes");
    }
}

#[test]
fn data_shorter_than_declared_decodes_what_is_present() {
    let full = wav::mono16(8_000, &[1000, -1000, 1000, -1000]);
    let clip = WavClip::parse(&full[..full.len() - 3]).expect("partial data");
    assert_eq!(clip.samples_per_channel, 2);
}

#[test]
fn bad_signatures_and_formats_are_rejected() {
    let mut bytes = wav::silence16(8_000, 4);
    bytes[0] = b'X';
    assert_eq!(
        WavClip::parse(&bytes),
        Err(WavError::BadSignature { expected: "RIFF" })
    );

    let mut float = wav::silence16(8_000, 4);
    // format tag 3 (IEEE float)
    float[20] = 3;
    assert_eq!(
        WavClip::parse(&float),
        Err(WavError::UnsupportedFormat { code: 3 })
    );
}

#[test]
fn odd_sized_chunks_before_data_are_skipped_with_padding() {
    let data: Vec<u8> = [i16::MAX, 0, i16::MIN]
        .iter()
        .flat_map(|s| s.to_le_bytes())
        .collect();
    let bytes = wav::pcm(1, 8_000, 16, &data, Some((b"LIST", b"abc")));
    let clip = WavClip::parse(&bytes).expect("parses past LIST");
    assert_eq!(clip.samples_per_channel, 3);
    assert_relative_eq!(clip.pcm[0][0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(clip.pcm[0][2], -1.0, epsilon = 1e-4);
}

#[test]
fn eight_and_twenty_four_bit_stereo() {
    let eight = wav::pcm(2, 8_000, 8, &[255, 128, 0, 128], None);
    let clip = WavClip::parse(&eight).expect("8-bit");
    assert_eq!(clip.channels, 2);
    assert_eq!(clip.samples_per_channel, 2);
    assert_relative_eq!(clip.pcm[0][0], 127.0 / 128.0, epsilon = 1e-3);
    assert_eq!(clip.pcm[1][0], 0.0);
    assert_relative_eq!(clip.pcm[0][1], -1.0, epsilon = 1e-6);

    let twenty_four = wav::pcm(1, 44_100, 24, &[0xff, 0xff, 0x7f, 0x00, 0x00, 0x80], None);
    let clip = WavClip::parse(&twenty_four).expect("24-bit");
    assert_eq!(clip.samples_per_channel, 2);
    assert_relative_eq!(clip.pcm[0][0], 1.0, epsilon = 1e-4);
    assert_relative_eq!(clip.pcm[0][1], -1.0, epsilon = 1e-4);
    assert_relative_eq!(clip.duration_seconds(), 2.0 / 44_100.0);
}

#[test]
fn unsupported_sample_width_decodes_to_silence() {
    let bytes = wav::pcm(1, 8_000, 32, &[1, 2, 3, 4, 5, 6, 7, 8], None);
    let clip = WavClip::parse(&bytes).expect("32-bit parses");
    assert_eq!(clip.samples_per_channel, 2);
    assert!(clip.pcm[0].iter().all(|s| *s == 0.0));
}

#[test]
fn chunk_declaring_maximum_size_ends_the_walk() {
    let mut bytes = wav::pcm(1, 8_000, 16, &[0, 0], Some((b"LIST", b"abc")));
    // size field of the LIST chunk, right after the 16-byte fmt body
    bytes[40..44].copy_from_slice(&u32::MAX.to_le_bytes());
    assert_eq!(WavClip::parse(&bytes), Err(WavError::MissingDataChunk));

    bytes[40..44].copy_from_slice(&(u32::MAX - 1).to_le_bytes());
    assert_eq!(WavClip::parse(&bytes), Err(WavError::MissingDataChunk));

    let mut dec = AudioEnvelopeDecoder::new();
    assert!(!dec.start(&bytes));
}
