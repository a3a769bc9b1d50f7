//! Digital-rain frame generator.
//!
//! Renders a falling-glyph animation as raw RGB24 frames straight into
//! the encoder's stdin. Cells stand in for glyphs: a bright head, a
//! saturated neck and a fading tail per column, with per-cell brightness
//! jitter so the rain shimmers. When an ambilight slot is supplied, every
//! third frame is published so the LED ring animates during generation.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use image::{Rgb, RgbImage};
use rand::Rng;

use linx_lib::ambilight::FrameSlot;
use linx_lib::error::{LinxError, Result};
use linx_lib::protocol::{DISPLAY_HEIGHT, DISPLAY_WIDTH};
use linx_lib::transcode::{self, TempPath};

use crate::RUNNING;

/// Glyph cell geometry.
const CELL_W: u32 = 10;
const CELL_H: u32 = 16;

/// Tail length in cells, head included.
const TRAIL_CELLS: i32 = 12;

/// Generate `duration_s` seconds of rain at `fps` into a scratch
/// elementary stream.
pub fn generate(duration_s: u32, fps: u32, slot: Option<&FrameSlot>) -> Result<TempPath> {
    let out = transcode::temp_stream_path()?;
    let mut encoder = transcode::spawn_raw_encoder(fps, &out)?;
    let mut stdin = encoder
        .stdin
        .take()
        .ok_or_else(|| LinxError::Transcode("encoder stdin was not piped".into()))?;

    let cols = (DISPLAY_WIDTH / CELL_W) as usize;
    let rows = (DISPLAY_HEIGHT / CELL_H) as i32;
    let mut rng = rand::thread_rng();
    let mut drops: Vec<i32> = (0..cols).map(|_| rng.gen_range(-rows..=0)).collect();
    let mut speeds: Vec<i32> = (0..cols).map(|_| rng.gen_range(1..=3)).collect();

    let total_frames = duration_s * fps;
    for frame_no in 0..total_frames {
        if !RUNNING.load(Ordering::SeqCst) {
            break;
        }
        let mut frame = RgbImage::new(DISPLAY_WIDTH, DISPLAY_HEIGHT);
        for col in 0..cols {
            let head = drops[col];
            for trail in 0..TRAIL_CELLS {
                let row = head - trail;
                if row < 0 || row >= rows {
                    continue;
                }
                let color = trail_color(trail, rng.gen_range(0..30));
                fill_cell(&mut frame, col as u32 * CELL_W, row as u32 * CELL_H, color);
            }
            drops[col] += speeds[col];
            if drops[col] - TRAIL_CELLS > rows {
                drops[col] = rng.gen_range(-10..=0);
                speeds[col] = rng.gen_range(1..=3);
            }
        }

        stdin
            .write_all(frame.as_raw())
            .map_err(|e| LinxError::Transcode(format!("encoder pipe: {e}")))?;
        if let Some(slot) = slot
            && frame_no % 3 == 0
        {
            slot.publish(Arc::new(frame));
        }
        if (frame_no + 1) % (fps * 5) == 0 {
            log::info!("{}/{total_frames} frames", frame_no + 1);
        }
    }

    drop(stdin);
    let status = encoder
        .wait()
        .map_err(|e| LinxError::Transcode(format!("encoder wait: {e}")))?;
    if !status.success() {
        return Err(LinxError::Transcode(format!("encoder exited with {status}")));
    }
    Ok(out)
}

/// Colour of the cell `trail` positions behind the head. `jitter` dims
/// the tail a little so columns do not look machine-uniform.
fn trail_color(trail: i32, jitter: u8) -> Rgb<u8> {
    if trail == 0 {
        Rgb([200, 255, 200])
    } else if trail < 4 {
        Rgb([0, 255u8.saturating_sub(jitter / 2), 0])
    } else {
        let green = (200 - trail * 15).max(0) as u8;
        Rgb([0, green.saturating_sub(jitter), 0])
    }
}

/// Fill a glyph-sized block inset one pixel into its cell.
fn fill_cell(frame: &mut RgbImage, x0: u32, y0: u32, color: Rgb<u8>) {
    for y in y0 + 1..y0 + CELL_H - 1 {
        for x in x0 + 1..x0 + CELL_W - 1 {
            frame.put_pixel(x, y, color);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn head_is_brightest_and_tail_fades() {
        let head = trail_color(0, 0);
        let neck = trail_color(2, 0);
        let tail = trail_color(8, 0);
        let far = trail_color(11, 0);
        assert_eq!(head, Rgb([200, 255, 200]));
        assert_eq!(neck, Rgb([0, 255, 0]));
        assert!(neck.0[1] > tail.0[1]);
        assert!(tail.0[1] > far.0[1]);
    }

    #[test]
    fn jitter_only_dims() {
        for trail in 1..TRAIL_CELLS {
            let plain = trail_color(trail, 0);
            let dimmed = trail_color(trail, 29);
            assert!(dimmed.0[1] <= plain.0[1], "trail {trail}");
        }
    }

    #[test]
    fn fill_cell_stays_inside_cell() {
        let mut frame = RgbImage::new(CELL_W * 2, CELL_H * 2);
        fill_cell(&mut frame, 0, 0, Rgb([9, 9, 9]));
        // Inset border stays black.
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(frame.get_pixel(CELL_W - 1, CELL_H - 1).0, [0, 0, 0]);
        // Interior is painted; neighbouring cell untouched.
        assert_eq!(frame.get_pixel(1, 1).0, [9, 9, 9]);
        assert_eq!(frame.get_pixel(CELL_W + 1, CELL_H + 1).0, [0, 0, 0]);
    }

    #[test]
    fn cell_grid_divides_panel_exactly() {
        assert_eq!(DISPLAY_WIDTH % CELL_W, 0);
        assert_eq!(DISPLAY_HEIGHT % CELL_H, 0);
    }
}
