//! RIFF/WAVE PCM parsing and the real-time RMS envelope used for lip-sync.

use crate::error::WavError;

const PCM_FORMAT: u16 = 1;
const CANONICAL_FMT_LEN: u32 = 16;

/// Decoded clip: one `Vec<f32>` per channel, samples in [-1, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct WavClip {
    pub channels: u16,
    pub sample_rate: u32,
    pub bits_per_sample: u16,
    pub samples_per_channel: usize,
    pub pcm: Vec<Vec<f32>>,
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WavError> {
        if self.remaining() < n {
            return Err(WavError::Truncated);
        }
        let s = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(s)
    }

    fn u16(&mut self) -> Result<u16, WavError> {
        let b = self.take(2)?;
        Ok(u16::from_le_bytes([b[0], b[1]]))
    }

    fn u32(&mut self) -> Result<u32, WavError> {
        let b = self.take(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    fn expect(&mut self, sig: &'static str) -> Result<(), WavError> {
        if self.take(4)? == sig.as_bytes() {
            Ok(())
        } else {
            Err(WavError::BadSignature { expected: sig })
        }
    }

    fn skip(&mut self, n: usize) {
        self.pos = self.pos.saturating_add(n);
    }
}

/// One sample widened into the high bits of an i32 (8-bit is unsigned, offset by 128).
/// Widths other than 8/16/24 decode to silence.
fn sample_i32(bytes: &[u8], bits: u16) -> i32 {
    match bits {
        8 => (i32::from(bytes[0]) - 128) << 24,
        16 => i32::from(i16::from_le_bytes([bytes[0], bytes[1]])) << 16,
        24 => i32::from_le_bytes([0, bytes[0], bytes[1], bytes[2]]),
        _ => 0,
    }
}

impl WavClip {
    pub fn parse(bytes: &[u8]) -> Result<WavClip, WavError> {
        let mut r = Reader { buf: bytes, pos: 0 };
        r.expect("RIFF")?;
        let _riff_len = r.u32()?;
        r.expect("WAVE")?;
        r.expect("fmt ")?;
        let fmt_len = r.u32()?;
        let format = r.u16()?;
        if format != PCM_FORMAT {
            return Err(WavError::UnsupportedFormat { code: format });
        }
        let channels = r.u16()?;
        let sample_rate = r.u32()?;
        let _byte_rate = r.u32()?;
        let _block_align = r.u16()?;
        let bits_per_sample = r.u16()?;
        if fmt_len > CANONICAL_FMT_LEN {
            r.skip((fmt_len - CANONICAL_FMT_LEN) as usize);
        }
        if channels == 0 || bits_per_sample == 0 {
            return Err(WavError::InvalidLayout {
                channels,
                bits_per_sample,
            });
        }

        let data_len = loop {
            if r.remaining() < 8 {
                return Err(WavError::MissingDataChunk);
            }
            let id = r.take(4)?;
            let size = r.u32()?;
            if id == b"data" {
                break size as usize;
            }
            // chunk bodies are word aligned; a size running past the buffer ends the walk
            r.skip((size as usize).saturating_add(usize::from(size & 1 == 1)));
        };

        // declared length may overrun a truncated file; decode what is present
        let available = data_len.min(r.remaining());
        let frame_bits = usize::from(bits_per_sample) * usize::from(channels);
        let sample_bytes = usize::from(bits_per_sample).div_ceil(8);
        let samples_per_channel = (available.saturating_mul(8) / frame_bits)
            .min(available / (sample_bytes * usize::from(channels)));

        let mut pcm = vec![Vec::with_capacity(samples_per_channel); usize::from(channels)];
        for _ in 0..samples_per_channel {
            for channel in pcm.iter_mut() {
                let raw = r.take(sample_bytes)?;
                channel.push(sample_i32(raw, bits_per_sample) as f32 / i32::MAX as f32);
            }
        }

        Ok(WavClip {
            channels,
            sample_rate,
            bits_per_sample,
            samples_per_channel,
            pcm,
        })
    }

    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.samples_per_channel as f64 / f64::from(self.sample_rate)
        }
    }
}

/// Plays one clip against wall-clock time and exposes its loudness.
#[derive(Debug, Default)]
pub struct AudioEnvelopeDecoder {
    clip: Option<WavClip>,
    elapsed: f64,
    offset: usize,
    rms: f32,
}

impl AudioEnvelopeDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the current clip with `bytes`. On a parse failure the decoder is left
    /// silent and `false` is returned.
    pub fn start(&mut self, bytes: &[u8]) -> bool {
        self.elapsed = 0.0;
        self.offset = 0;
        self.rms = 0.0;
        match WavClip::parse(bytes) {
            Ok(clip) => {
                self.clip = Some(clip);
                true
            }
            Err(e) => {
                log::warn!("lip-sync clip rejected: {e}");
                self.clip = None;
                false
            }
        }
    }

    /// Advance by `dt` seconds. Returns `false` (and an envelope of zero) once the clip
    /// is exhausted or when nothing is loaded.
    pub fn update(&mut self, dt: f32) -> bool {
        let Some(clip) = self.clip.as_ref() else {
            self.rms = 0.0;
            return false;
        };
        if self.offset >= clip.samples_per_channel {
            self.rms = 0.0;
            return false;
        }

        self.elapsed += f64::from(dt.max(0.0));
        let goal = ((self.elapsed * f64::from(clip.sample_rate)).floor() as usize)
            .min(clip.samples_per_channel);
        if goal > self.offset {
            let mut sum = 0.0f32;
            for channel in &clip.pcm {
                for s in &channel[self.offset..goal] {
                    sum += s * s;
                }
            }
            let count = (goal - self.offset) * clip.pcm.len();
            self.rms = (sum / count as f32).sqrt();
            self.offset = goal;
        }
        true
    }

    /// Current envelope value in [0, 1].
    #[inline]
    pub fn rms(&self) -> f32 {
        self.rms
    }

    pub fn is_playing(&self) -> bool {
        self.clip
            .as_ref()
            .is_some_and(|c| self.offset < c.samples_per_channel)
    }

    pub fn clip(&self) -> Option<&WavClip> {
        self.clip.as_ref()
    }

    pub fn stop(&mut self) {
        self.clip = None;
        self.rms = 0.0;
    }
}
