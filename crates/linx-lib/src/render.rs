//! PNG generation at device resolution.
//!
//! The display-prepare sequence blanks the composite by pushing a fully
//! transparent overlay followed by an opaque black frame; both are
//! generated here rather than shipped as assets.

use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};

use crate::error::{LinxError, Result};

/// Encode a solid-colour opaque PNG.
pub fn solid_png(width: u32, height: u32, rgb: [u8; 3]) -> Result<Vec<u8>> {
    let img = RgbImage::from_pixel(width, height, Rgb(rgb));
    encode(|buf| img.write_to(buf, ImageFormat::Png))
}

/// Encode a fully transparent PNG.
pub fn transparent_png(width: u32, height: u32) -> Result<Vec<u8>> {
    let img = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    encode(|buf| img.write_to(buf, ImageFormat::Png))
}

fn encode(
    write: impl FnOnce(&mut Cursor<&mut Vec<u8>>) -> image::ImageResult<()>,
) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    write(&mut Cursor::new(&mut buf)).map_err(|e| LinxError::Image(format!("PNG encode: {e}")))?;
    Ok(buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];

    #[test]
    fn solid_png_is_valid_png() {
        let png = solid_png(32, 128, [0, 0, 0]).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn transparent_png_is_valid_png() {
        let png = transparent_png(32, 128).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }

    #[test]
    fn solid_png_round_trips_colour() {
        let png = solid_png(16, 16, [200, 100, 50]).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgb8();
        assert_eq!(decoded.dimensions(), (16, 16));
        assert_eq!(decoded.get_pixel(7, 7).0, [200, 100, 50]);
    }

    #[test]
    fn transparent_png_has_zero_alpha() {
        let png = transparent_png(8, 8).unwrap();
        let decoded = image::load_from_memory(&png).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(3, 3).0[3], 0);
    }
}
