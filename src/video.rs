//! First-frame video decoding through an `ffmpeg` subprocess.
//!
//! ffmpeg writes the first frame as a PNG to stdout; the frame is then
//! converted to RGB. The child is killed if it outlives the timeout.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Output, Stdio};
use std::thread;
use std::time::Duration;

use image::{DynamicImage, ImageFormat};
use wait_timeout::ChildExt;

use crate::decode::RawImage;
use crate::error::PreviewError;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Clone, Debug)]
pub struct VideoDecoder {
    /// Explicit ffmpeg binary; `PATH` lookup when unset.
    ffmpeg: Option<PathBuf>,
    timeout: Duration,
}

impl Default for VideoDecoder {
    fn default() -> Self {
        VideoDecoder::new(None, DEFAULT_TIMEOUT)
    }
}

impl VideoDecoder {
    pub fn new(ffmpeg: Option<PathBuf>, timeout: Duration) -> Self {
        VideoDecoder { ffmpeg, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve the ffmpeg binary.
    pub fn binary(&self) -> io::Result<PathBuf> {
        match &self.ffmpeg {
            Some(p) if p.exists() => Ok(p.clone()),
            Some(p) => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("configured ffmpeg {} does not exist", p.display()),
            )),
            None => which::which("ffmpeg")
                .map_err(|e| io::Error::new(io::ErrorKind::NotFound, format!("ffmpeg: {e}"))),
        }
    }

    pub fn decode(&self, path: &Path) -> Result<RawImage, PreviewError> {
        let bin = self
            .binary()
            .map_err(|e| PreviewError::unavailable(path, e))?;

        let child = Command::new(bin)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-frames:v", "1", "-f", "image2pipe", "-vcodec", "png", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| PreviewError::unavailable(path, e))?;

        let out = run_with_timeout(child, self.timeout)
            .map_err(|e| PreviewError::unavailable(path, e))?;

        if !out.status.success() || out.stdout.is_empty() {
            let stderr = String::from_utf8_lossy(&out.stderr);
            let reason = stderr
                .lines()
                .find(|l| !l.trim().is_empty())
                .map(str::to_string)
                .unwrap_or_else(|| format!("no frame decoded ({})", out.status));
            return Err(PreviewError::decode(path, reason));
        }

        let frame = image::load_from_memory_with_format(&out.stdout, ImageFormat::Png)
            .map_err(|e| PreviewError::decode(path, e))?;
        Ok(RawImage::from_dynamic(DynamicImage::ImageRgb8(
            frame.into_rgb8(),
        )))
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut p) = pipe {
            p.read_to_end(&mut buf).ok();
        }
        buf
    })
}

/// Wait for `child`, killing it after `timeout`. Pipes are drained on
/// their own threads so a large frame cannot stall the child.
pub(crate) fn run_with_timeout(mut child: Child, timeout: Duration) -> io::Result<Output> {
    let stdout = drain(child.stdout.take());
    let stderr = drain(child.stderr.take());

    match child.wait_timeout(timeout)? {
        Some(status) => Ok(Output {
            status,
            stdout: stdout.join().unwrap_or_default(),
            stderr: stderr.join().unwrap_or_default(),
        }),
        None => {
            child.kill().ok();
            child.wait().ok();
            Err(io::Error::new(
                io::ErrorKind::TimedOut,
                format!("timed out after {:?}", timeout),
            ))
        }
    }
}
