//! ffmpeg invocations — everything the device cannot play directly gets
//! converted to the raw H.264 elementary stream it expects.
//!
//! Encoding matches the vendor software: libx264 with no B-frames (the
//! firmware decoder chokes on reordering), ultrafast preset, yuv420p, no
//! audio, bare `h264` container. Outputs land in [`tempfile::TempPath`]s
//! so they are deleted when the caller drops them.

use std::path::Path;
use std::process::{Child, Command, Stdio};

pub use tempfile::TempPath;

use crate::error::{LinxError, Result};
use crate::led::Rgb;
use crate::protocol::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// A scratch path for a generated elementary stream.
pub fn temp_stream_path() -> Result<TempPath> {
    let file = tempfile::Builder::new()
        .prefix("linx-")
        .suffix(".h264")
        .tempfile()?;
    Ok(file.into_temp_path())
}

/// Convert any image or video ffmpeg can read into a device-ready stream,
/// scaled and letterboxed to the panel.
pub fn encode_stream(input: &Path) -> Result<TempPath> {
    let out = temp_stream_path()?;
    run(encode_command(input, &out))?;
    Ok(out)
}

/// Generate a solid-colour clip.
pub fn encode_solid(color: Rgb, duration_s: u32, fps: u32) -> Result<TempPath> {
    let out = temp_stream_path()?;
    run(solid_command(color, duration_s, fps, &out))?;
    Ok(out)
}

/// Start an encoder that takes raw RGB24 frames on stdin. Used by frame
/// generators; the caller writes `width*height*3` bytes per frame and
/// closes stdin to finish the stream.
pub fn spawn_raw_encoder(fps: u32, out: &Path) -> Result<Child> {
    raw_encoder_command(fps, out)
        .spawn()
        .map_err(|e| LinxError::Transcode(format!("ffmpeg launch: {e}")))
}

fn run(mut cmd: Command) -> Result<()> {
    let output = cmd
        .output()
        .map_err(|e| LinxError::Transcode(format!("ffmpeg launch: {e}")))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let tail: String = stderr.chars().take(500).collect();
        return Err(LinxError::Transcode(format!(
            "ffmpeg exited with {}: {tail}",
            output.status
        )));
    }
    Ok(())
}

fn encode_command(input: &Path, out: &Path) -> Command {
    let scale = format!(
        "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
        w = DISPLAY_WIDTH,
        h = DISPLAY_HEIGHT
    );
    let mut cmd = Command::new("ffmpeg");
    cmd.arg("-y")
        .arg("-i")
        .arg(input)
        .args(["-vf", &scale])
        .args(x264_args())
        .args(["-an", "-f", "h264"])
        .arg(out);
    cmd
}

fn solid_command(color: Rgb, duration_s: u32, fps: u32, out: &Path) -> Command {
    let source = format!(
        "color=c=0x{:02X}{:02X}{:02X}:s={}x{}:d={duration_s}:r={fps}",
        color.r, color.g, color.b, DISPLAY_WIDTH, DISPLAY_HEIGHT
    );
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-f", "lavfi", "-i", &source])
        .args(x264_args())
        .args(["-f", "h264"])
        .arg(out);
    cmd
}

fn raw_encoder_command(fps: u32, out: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-y", "-f", "rawvideo", "-pix_fmt", "rgb24"])
        .args(["-s", &format!("{DISPLAY_WIDTH}x{DISPLAY_HEIGHT}")])
        .args(["-r", &fps.to_string(), "-i", "-"])
        .args(x264_args())
        .args(["-f", "h264"])
        .arg(out)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null());
    cmd
}

fn x264_args() -> [&'static str; 10] {
    [
        "-vcodec",
        "libx264",
        "-x264opts",
        "bframes=0",
        "-threads",
        "4",
        "-preset",
        "ultrafast",
        "-pix_fmt",
        "yuv420p",
    ]
}
