//! Audio probing and embedded cover extraction (symphonia).

use std::fs::File;
use std::path::Path;

use symphonia::core::codecs::CodecParameters;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{Limit, MetadataOptions, StandardVisualKey, Visual};
use symphonia::core::probe::{Hint, ProbeResult};
use symphonia::default::get_probe;

use crate::error::PreviewError;

/// Cap on embedded artwork when only probing stream parameters.
const PROBE_VISUAL_LIMIT: usize = 1024 * 1024;

/// Basic stream parameters of the default audio track.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StreamInfo {
    pub bitrate: u64,
    pub sample_rate: u32,
    pub channels: u32,
}

impl StreamInfo {
    /// A real audio stream has all three parameters positive.
    pub fn is_valid(&self) -> bool {
        self.bitrate > 0 && self.sample_rate > 0 && self.channels > 0
    }
}

fn probe(path: &Path, max_visual_bytes: usize) -> Result<ProbeResult, PreviewError> {
    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|s| s.to_str()) {
        hint.with_extension(ext);
    }

    let src = File::open(path).map_err(|e| PreviewError::unavailable(path, e))?;
    let mss = MediaSourceStream::new(Box::new(src), Default::default());

    let meta_opts = MetadataOptions {
        limit_visual_bytes: Limit::Maximum(max_visual_bytes),
        ..Default::default()
    };

    get_probe()
        .format(&hint, mss, &FormatOptions::default(), &meta_opts)
        .map_err(|e| PreviewError::decode(path, e))
}

/// Bits per second: from the stream duration and file size when known,
/// otherwise from the PCM parameters.
fn estimate_bitrate(cp: &CodecParameters, channels: u32, file_len: u64) -> u64 {
    let secs = match (cp.time_base, cp.n_frames, cp.sample_rate) {
        (Some(tb), Some(n), _) if n > 0 => {
            let t = tb.calc_time(n);
            t.seconds as f64 + t.frac
        }
        (None, Some(n), Some(sr)) if n > 0 && sr > 0 => n as f64 / sr as f64,
        _ => 0.0,
    };
    if secs > 0.0 && file_len > 0 {
        return (file_len as f64 * 8.0 / secs) as u64;
    }
    match (cp.bits_per_sample, cp.sample_rate) {
        (Some(bps), Some(sr)) => bps as u64 * sr as u64 * channels as u64,
        _ => 0,
    }
}

/// Stream parameters of the default track, if the file parses as audio.
pub fn stream_info(path: &Path) -> Option<StreamInfo> {
    let probed = probe(path, PROBE_VISUAL_LIMIT).ok()?;
    let track = probed.format.default_track()?;
    let cp = &track.codec_params;

    let sample_rate = cp.sample_rate.unwrap_or(0);
    let channels = cp.channels.map(|c| c.count() as u32).unwrap_or(0);
    let file_len = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let bitrate = estimate_bitrate(cp, channels, file_len);

    Some(StreamInfo {
        bitrate,
        sample_rate,
        channels,
    })
}

/// Structured-metadata probe used by the classifier for extensionless files.
pub fn looks_like_audio(path: &Path) -> bool {
    stream_info(path).is_some_and(|info| info.is_valid())
}

fn pick_cover(visuals: &[Visual]) -> Option<Vec<u8>> {
    let front = visuals
        .iter()
        .find(|v| v.usage == Some(StandardVisualKey::FrontCover));
    front
        .or_else(|| visuals.first())
        .filter(|v| !v.data.is_empty())
        .map(|v| v.data.to_vec())
}

/// Encoded bytes of the embedded cover picture.
///
/// A file without a picture is `UnsupportedType`, not a decode error.
pub fn extract_cover(path: &Path, max_bytes: usize) -> Result<Vec<u8>, PreviewError> {
    let mut probed = probe(path, max_bytes)?;

    // Tags read while probing (e.g. ID3v2 in front of the stream).
    let mut cover = None;
    if let Some(mut m) = probed.metadata.get() {
        if let Some(rev) = m.skip_to_latest() {
            cover = pick_cover(rev.visuals());
        }
    }

    // Tags owned by the container (FLAC PICTURE, Vorbis comments, ...).
    if cover.is_none() {
        let mut m = probed.format.metadata();
        if let Some(rev) = m.skip_to_latest() {
            cover = pick_cover(rev.visuals());
        }
    }

    cover.ok_or_else(|| PreviewError::unsupported(path))
}

/// Minimal 16-bit PCM WAV writer for fixtures.
#[cfg(test)]
pub(crate) fn write_test_wav(path: &Path, sample_rate: u32, channels: u16, frames: u32) {
    let bits: u16 = 16;
    let block_align = channels * bits / 8;
    let data_len = frames * block_align as u32;

    let mut buf = Vec::new();
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&(36 + data_len).to_le_bytes());
    buf.extend_from_slice(b"WAVE");
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes());
    buf.extend_from_slice(&1u16.to_le_bytes());
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&(sample_rate * block_align as u32).to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits.to_le_bytes());
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_len.to_le_bytes());
    buf.resize(buf.len() + data_len as usize, 0);
    std::fs::write(path, buf).unwrap();
}

/// MPEG-1 Layer III, 128 kbit/s, 44.1 kHz, no padding: 417-byte frames.
#[cfg(test)]
const TEST_MP3_FRAME: [u8; 4] = [0xff, 0xfb, 0x90, 0x00];

/// MP3 fixture: an ID3v2.3 tag with one APIC frame per `(picture type,
/// encoded image)` pair, followed by silent frames.
#[cfg(test)]
pub(crate) fn write_test_mp3(path: &Path, pictures: &[(u8, &[u8])]) {
    let mut frames = Vec::new();
    for (i, (kind, data)) in pictures.iter().enumerate() {
        let mut body = vec![0u8]; // ISO-8859-1
        body.extend_from_slice(b"image/png\0");
        body.push(*kind);
        // Descriptions must differ between APIC frames.
        body.extend_from_slice(format!("cover{i}").as_bytes());
        body.push(0);
        body.extend_from_slice(data);

        frames.extend_from_slice(b"APIC");
        frames.extend_from_slice(&(body.len() as u32).to_be_bytes());
        frames.extend_from_slice(&[0, 0]);
        frames.extend_from_slice(&body);
    }

    let size = frames.len() as u32;
    let mut buf = Vec::new();
    buf.extend_from_slice(b"ID3");
    buf.extend_from_slice(&[3, 0, 0]);
    // Tag size is syncsafe: 7 bits per byte.
    for shift in [21, 14, 7, 0] {
        buf.push(((size >> shift) & 0x7f) as u8);
    }
    buf.extend_from_slice(&frames);

    for _ in 0..8 {
        let start = buf.len();
        buf.extend_from_slice(&TEST_MP3_FRAME);
        buf.resize(start + 417, 0);
    }
    std::fs::write(path, buf).unwrap();
}

#[cfg(test)]
pub(crate) fn test_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = std::io::Cursor::new(Vec::new());
    image::RgbImage::from_pixel(width, height, image::Rgb([200, 30, 30]))
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
