//! H.264 streaming with device-side flow control.
//!
//! The raw elementary stream is read in capacity-sized chunks and each
//! chunk rides behind a start-play frame on the chosen slot. The device
//! reports a per-slot buffer depth in every reply; when it climbs past
//! the threshold the streamer stops reading file bytes and polls
//! `query_block` until the buffer drains (or the poll budget runs out).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use crate::error::{LinxError, Result};
use crate::lcd::LcdController;
use crate::protocol::{
    CHUNK_DELAY, FLOW_ENTER_DEPTH, FLOW_POLL_ATTEMPTS, FLOW_POLL_INTERVAL, FLOW_RESUME_DEPTH,
    PlaybackSlot,
};
use crate::transport::LcdLink;

/// Streaming parameters.
#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub slot: PlaybackSlot,
    /// Re-open the file and keep going at EOF.
    pub loop_playback: bool,
    /// Play-count byte forwarded in the start-play argument region.
    pub play_count: u8,
}

impl Default for StreamOptions {
    fn default() -> Self {
        StreamOptions {
            slot: PlaybackSlot::Primary,
            loop_playback: true,
            play_count: 1,
        }
    }
}

/// How a stream ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamOutcome {
    /// EOF reached with looping disabled.
    Completed,
    /// The running flag was cleared mid-stream.
    Cancelled,
    /// A chunk send failed even after the transport's reconnect retry.
    Aborted,
}

/// Stream a raw H.264 elementary stream file to the device.
///
/// Missing files fail before any USB activity. Transport failures abort
/// the stream and are reported as [`StreamOutcome::Aborted`] rather than
/// raised. On every exit path a best-effort `stop_play` is issued.
pub fn stream_file<L: LcdLink>(
    lcd: &mut LcdController<L>,
    path: &Path,
    options: &StreamOptions,
    running: &AtomicBool,
) -> Result<StreamOutcome> {
    if !path.is_file() {
        return Err(LinxError::Io(io::Error::new(
            io::ErrorKind::NotFound,
            format!("no such stream file: {}", path.display()),
        )));
    }

    let capacity = match lcd.h264_capacity() {
        Ok(capacity) => capacity,
        Err(e) => {
            log::warn!("capacity query failed ({e}), using default");
            crate::protocol::DEFAULT_H264_CAPACITY
        }
    };
    log::debug!("streaming {} in {capacity}-byte chunks", path.display());

    let mut chunk = vec![0u8; capacity as usize];
    let outcome = 'playback: loop {
        let mut file = File::open(path)?;
        loop {
            if !running.load(Ordering::SeqCst) {
                break 'playback StreamOutcome::Cancelled;
            }
            let len = read_chunk(&mut file, &mut chunk)?;
            if len == 0 {
                break;
            }
            match lcd.start_play(options.slot, &chunk[..len], options.play_count) {
                Ok(resp) => {
                    thread::sleep(CHUNK_DELAY);
                    if let Some(resp) = resp
                        && depth_of(&resp, options.slot) > FLOW_ENTER_DEPTH
                    {
                        wait_for_buffer(lcd, options.slot, running);
                    }
                }
                Err(e) => {
                    log::error!("chunk send failed: {e}");
                    break 'playback StreamOutcome::Aborted;
                }
            }
        }
        if !options.loop_playback {
            break StreamOutcome::Completed;
        }
    };

    if let Err(e) = lcd.stop_play() {
        log::warn!("stop_play after stream: {e}");
    }
    Ok(outcome)
}

/// Fill `buf` from the file, tolerating short reads. Returns the number
/// of bytes read; 0 means EOF.
fn read_chunk(file: &mut File, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = file.read(&mut buf[filled..])?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

/// The slot's buffer depth in a query/start-play response. Responses too
/// short to carry the slot byte count as depth 0.
fn depth_of(resp: &[u8], slot: PlaybackSlot) -> u8 {
    resp.get(slot.depth_offset()).copied().unwrap_or(0)
}

/// Poll `query_block` until the slot's buffer drains or the budget
/// expires. Expiry is not fatal: the device keeps consuming, so the
/// streamer resumes and lets the next reply re-enter flow control.
fn wait_for_buffer<L: LcdLink>(
    lcd: &mut LcdController<L>,
    slot: PlaybackSlot,
    running: &AtomicBool,
) {
    for _ in 0..FLOW_POLL_ATTEMPTS {
        if !running.load(Ordering::SeqCst) {
            return;
        }
        thread::sleep(FLOW_POLL_INTERVAL);
        match lcd.query_block() {
            Ok(Some(resp)) if depth_of(&resp, slot) <= FLOW_RESUME_DEPTH => return,
            Ok(_) => {}
            Err(e) => {
                log::warn!("flow-control query failed: {e}");
                thread::sleep(Duration::from_millis(500));
            }
        }
    }
    log::warn!("device buffer did not drain within budget, resuming");
}
