//! Perimeter colour sampling for LED edge-matching.
//!
//! Maps `n` positions evenly around the frame perimeter and averages a
//! small pixel block at each one. Pure: no I/O, deterministic for a given
//! frame.

use image::RgbImage;

use crate::led::Rgb;

/// Side length of the averaging window at each sample position.
const SAMPLE_WINDOW: u32 = 8;

/// Sample `count` colours clockwise around the frame perimeter, starting
/// at the bottom-left corner: bottom edge left to right, right edge bottom
/// to top, top edge right to left, left edge top to bottom.
pub fn sample_edges(frame: &RgbImage, count: usize) -> Vec<Rgb> {
    let (w, h) = frame.dimensions();
    if w == 0 || h == 0 || count == 0 {
        return vec![Rgb::OFF; count];
    }
    let perimeter = 2 * (w + h);
    let step = perimeter as f64 / count as f64;

    (0..count)
        .map(|i| {
            let pos = (i as f64 * step) as u32;
            let (cx, cy) = if pos < w {
                (pos, h - 1)
            } else if pos < w + h {
                (w - 1, h - 1 - (pos - w))
            } else if pos < 2 * w + h {
                (w - 1 - (pos - w - h), 0)
            } else {
                (0, pos - 2 * w - h)
            };
            average_block(frame, cx, cy)
        })
        .collect()
}

/// Average pixel values in a window centred on `(cx, cy)`, clipped to the
/// frame.
fn average_block(frame: &RgbImage, cx: u32, cy: u32) -> Rgb {
    let (w, h) = frame.dimensions();
    let x0 = cx.saturating_sub(SAMPLE_WINDOW / 2);
    let y0 = cy.saturating_sub(SAMPLE_WINDOW / 2);
    let x1 = (x0 + SAMPLE_WINDOW).min(w);
    let y1 = (y0 + SAMPLE_WINDOW).min(h);

    let mut sums = [0u32; 3];
    let mut pixels = 0u32;
    for y in y0..y1 {
        for x in x0..x1 {
            let p = frame.get_pixel(x, y).0;
            sums[0] += u32::from(p[0]);
            sums[1] += u32::from(p[1]);
            sums[2] += u32::from(p[2]);
            pixels += 1;
        }
    }
    if pixels == 0 {
        return Rgb::OFF;
    }
    Rgb::new(
        (sums[0] / pixels) as u8,
        (sums[1] / pixels) as u8,
        (sums[2] / pixels) as u8,
    )
}

/// Convert sampled colours to grey levels capped at `max_intensity`.
///
/// Luma is the usual BT.601 weighting, rescaled from 0..255 to
/// `0..=max_intensity` and emitted on all three channels. Used for
/// low-glare ambient modes.
pub fn grayscale(colors: &mut [Rgb], max_intensity: u8) {
    if max_intensity == 0 {
        return;
    }
    let max = f64::from(max_intensity);
    for color in colors {
        let luma =
            0.299 * f64::from(color.r) + 0.587 * f64::from(color.g) + 0.114 * f64::from(color.b);
        let level = ((luma / 255.0 * max) as u8).min(max_intensity);
        *color = Rgb::new(level, level, level);
    }
}
