//! Decoder bridge — background ffmpeg process feeding the frame slot.
//!
//! A second ffmpeg instance decodes the same elementary stream the LCD is
//! playing, downscaled to quarter resolution along each axis at 10 fps,
//! raw RGB24 on stdout. A reader thread pulls exactly one frame's worth
//! of bytes at a time and publishes it into the latest-frame slot. The
//! LCD stream never depends on this path: if the decoder dies, the LEDs
//! simply stop updating.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use image::RgbImage;

use super::FrameSlot;
use crate::protocol::{DISPLAY_HEIGHT, DISPLAY_WIDTH};

/// Sampling resolution: quarter of the panel along each axis.
pub const SAMPLE_WIDTH: u32 = DISPLAY_WIDTH / 4;
pub const SAMPLE_HEIGHT: u32 = DISPLAY_HEIGHT / 4;

/// Bytes per decoded RGB24 frame.
pub const FRAME_BYTES: usize = (SAMPLE_WIDTH * SAMPLE_HEIGHT * 3) as usize;

/// Decode frame rate; matches the worker's ~10 Hz tick.
const DECODE_FPS: u32 = 10;

/// Grace period between SIGTERM and SIGKILL on teardown.
const KILL_GRACE: Duration = Duration::from_millis(2000);

type ChildCell = Arc<Mutex<Option<Child>>>;

/// Background decoder with a reader thread publishing into a [`FrameSlot`].
pub struct DecoderBridge {
    thread: thread::JoinHandle<()>,
    child: ChildCell,
    running: Arc<AtomicBool>,
}

impl DecoderBridge {
    /// Spawn the decoder for `stream` and start the reader. With
    /// `loop_playback` set, the decoder is respawned at EOF so the LEDs
    /// keep following each pass of the looped video.
    pub fn spawn(stream: &Path, slot: FrameSlot, loop_playback: bool) -> io::Result<Self> {
        let mut first = spawn_decoder(stream)?;
        let stdout = first
            .stdout
            .take()
            .ok_or_else(|| io::Error::other("decoder stdout was not piped"))?;
        let child: ChildCell = Arc::new(Mutex::new(Some(first)));
        let running = Arc::new(AtomicBool::new(true));

        let reader_path = stream.to_path_buf();
        let reader_child = child.clone();
        let reader_flag = running.clone();
        let thread = thread::spawn(move || {
            reader_loop(
                reader_path,
                stdout,
                slot,
                loop_playback,
                reader_flag,
                reader_child,
            )
        });

        Ok(DecoderBridge {
            thread,
            child,
            running,
        })
    }

    /// Stop the reader and tear the decoder down, escalating from SIGTERM
    /// to SIGKILL after the grace period.
    pub fn shutdown(self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(mut child) = lock_cell(&self.child).take() {
            stop_child(&mut child);
        }
        let _ = self.thread.join();
    }
}

fn reader_loop(
    stream: PathBuf,
    mut stdout: ChildStdout,
    slot: FrameSlot,
    loop_playback: bool,
    running: Arc<AtomicBool>,
    child_cell: ChildCell,
) {
    let mut buf = vec![0u8; FRAME_BYTES];
    while running.load(Ordering::SeqCst) {
        if stdout.read_exact(&mut buf).is_err() {
            // EOF or a dead decoder.
            if !(loop_playback && running.load(Ordering::SeqCst)) {
                break;
            }
            if let Some(mut old) = lock_cell(&child_cell).take() {
                stop_child(&mut old);
            }
            match spawn_decoder(&stream) {
                Ok(mut fresh) => match fresh.stdout.take() {
                    Some(out) => {
                        stdout = out;
                        *lock_cell(&child_cell) = Some(fresh);
                        continue;
                    }
                    None => break,
                },
                Err(e) => {
                    log::warn!("ambilight decoder respawn failed: {e}");
                    break;
                }
            }
        }
        match RgbImage::from_raw(SAMPLE_WIDTH, SAMPLE_HEIGHT, buf.clone()) {
            Some(frame) => slot.publish(Arc::new(frame)),
            None => break,
        }
    }
}

fn lock_cell(cell: &ChildCell) -> std::sync::MutexGuard<'_, Option<Child>> {
    cell.lock().unwrap_or_else(|e| e.into_inner())
}

/// The decode invocation: raw H.264 in, quarter-resolution RGB24 frames
/// on stdout at the worker rate.
fn decoder_command(stream: &Path) -> Command {
    let mut cmd = Command::new("ffmpeg");
    cmd.args(["-f", "h264", "-i"])
        .arg(stream)
        .args(["-f", "rawvideo", "-pix_fmt", "rgb24"])
        .args(["-s", &format!("{SAMPLE_WIDTH}x{SAMPLE_HEIGHT}")])
        .args(["-r", &DECODE_FPS.to_string()])
        .args(["-v", "error", "-"])
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::null());
    cmd
}

fn spawn_decoder(stream: &Path) -> io::Result<Child> {
    decoder_command(stream).spawn()
}

/// Terminate a child process: SIGTERM, wait out the grace period, then
/// SIGKILL. Never leaves a zombie behind.
fn stop_child(child: &mut Child) {
    #[cfg(unix)]
    {
        // SAFETY: kill(2) with a pid we own is always safe to call; a stale
        // pid at worst returns ESRCH.
        unsafe {
            libc::kill(child.id() as libc::pid_t, libc::SIGTERM);
        }
    }
    let deadline = Instant::now() + KILL_GRACE;
    while Instant::now() < deadline {
        match child.try_wait() {
            Ok(Some(_)) => return,
            Ok(None) => thread::sleep(Duration::from_millis(50)),
            Err(_) => break,
        }
    }
    let _ = child.kill();
    let _ = child.wait();
}
