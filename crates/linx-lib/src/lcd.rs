//! Typed command surface over the LCD transport.
//!
//! Each operation wraps a single encrypted command frame, optionally with
//! a trailing raw payload. Out-of-range levels are clamped at this
//! boundary rather than returned as errors. The controller is generic
//! over [`LcdLink`] so every operation is testable against the mock
//! transport.

use chrono::{Datelike, Timelike};
use serde::Serialize;

use crate::codec;
use crate::error;
use crate::protocol::{
    self, DISPLAY_HEIGHT, DISPLAY_WIDTH, PlaybackSlot,
};
use crate::render;
use crate::transport::{LcdLink, Result};

/// Which display layer an image push targets.
///
/// Two layers exist: an opaque background (command 101) and a transparent
/// overlay (command 102). The background command tops out around 2 KB on
/// this platform, so the overlay path is the default for everything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layer {
    Background,
    #[default]
    Overlay,
}

impl Layer {
    fn command(self) -> u8 {
        match self {
            Layer::Background => protocol::CMD_PUSH_JPG,
            Layer::Overlay => protocol::CMD_PUSH_PNG,
        }
    }
}

/// On-screen clock behaviour for [`LcdController::sync_clock`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockMode {
    Off = 0,
    On = 1,
    /// Set the device clock without changing overlay visibility.
    SyncOnly = 2,
}

/// Device information for status output.
#[derive(Debug, Clone, Serialize)]
pub struct ScreenInfo {
    pub firmware: Option<String>,
    pub width: u32,
    pub height: u32,
    pub h264_capacity: u32,
}

/// Typed surface over the encrypted command protocol.
pub struct LcdController<L: LcdLink> {
    link: L,
    h264_capacity: u32,
}

impl<L: LcdLink> LcdController<L> {
    pub fn new(link: L) -> Self {
        LcdController {
            link,
            h264_capacity: protocol::DEFAULT_H264_CAPACITY,
        }
    }

    /// The underlying link (mock inspection in tests).
    pub fn link(&self) -> &L {
        &self.link
    }

    pub fn link_mut(&mut self) -> &mut L {
        &mut self.link
    }

    pub fn into_link(self) -> L {
        self.link
    }

    fn command(&mut self, cmd: u8, args: &[u8]) -> Result<Option<Vec<u8>>> {
        self.link.send(&codec::build_frame(cmd, args), true)
    }

    /// Device init sequence after connect.
    pub fn init(&mut self) -> Result<()> {
        self.set_framerate(30)
    }

    /// Firmware version string, or `None` if the device did not answer
    /// usefully.
    pub fn version(&mut self) -> Result<Option<String>> {
        let resp = self.command(protocol::CMD_GET_VERSION, &[])?;
        Ok(resp.filter(|r| r.len() > 8).map(|r| {
            let end = r.len().min(40);
            String::from_utf8_lossy(&r[8..end])
                .trim_end_matches('\0')
                .to_string()
        }))
    }

    /// Reboot into standby mode. The monitor-mode endpoint disappears, so
    /// no response is read.
    pub fn reboot_to_standby(&mut self) -> Result<()> {
        self.link
            .send(&codec::build_frame(protocol::CMD_REBOOT, &[]), false)?;
        Ok(())
    }

    /// Set display rotation (0-3).
    pub fn set_rotation(&mut self, rotation: u8) -> Result<()> {
        self.command(protocol::CMD_SET_ROTATION, &[rotation & 0x03])?;
        Ok(())
    }

    /// Set display brightness, clamped to 0-100.
    pub fn set_brightness(&mut self, level: i32) -> Result<()> {
        self.command(protocol::CMD_SET_BRIGHTNESS, &[level.clamp(0, 100) as u8])?;
        Ok(())
    }

    /// Set display framerate, clamped to 1-99.
    pub fn set_framerate(&mut self, fps: i32) -> Result<()> {
        self.command(protocol::CMD_SET_FRAMERATE, &[fps.clamp(1, 99) as u8])?;
        Ok(())
    }

    /// Query the per-packet H.264 payload capacity. Keeps the previous (or
    /// default) value when the device cannot be queried.
    pub fn h264_capacity(&mut self) -> Result<u32> {
        let resp = self.command(protocol::CMD_GET_H264_BLOCK, &[])?;
        if let Some(r) = resp
            && r.len() >= 12
        {
            let size = u32::from_be_bytes(r[8..12].try_into().unwrap());
            if size > 0 {
                self.h264_capacity = size;
            }
        }
        Ok(self.h264_capacity)
    }

    /// Sync the device clock to the host wall clock.
    pub fn sync_clock(&mut self, mode: ClockMode) -> Result<()> {
        self.sync_clock_at(mode, chrono::Local::now())
    }

    /// Sync the device clock to an explicit timestamp.
    pub fn sync_clock_at(
        &mut self,
        mode: ClockMode,
        when: chrono::DateTime<chrono::Local>,
    ) -> Result<()> {
        let year = when.year() as u16;
        let args = [
            (year >> 8) as u8,
            (year & 0xFF) as u8,
            when.month() as u8,
            when.day() as u8,
            when.hour() as u8,
            when.minute() as u8,
            when.second() as u8,
            mode as u8,
        ];
        self.command(protocol::CMD_SET_CLOCK, &args)?;
        Ok(())
    }

    /// Stop the on-screen clock overlay.
    pub fn stop_clock(&mut self) -> Result<()> {
        self.command(protocol::CMD_STOP_CLOCK, &[0])?;
        Ok(())
    }

    /// Query the device filesystem listing.
    pub fn query_dir(&mut self) -> Result<()> {
        self.command(protocol::CMD_QUERY_DIR, &[])?;
        Ok(())
    }

    /// Delete the uploaded file from the device filesystem.
    pub fn delete_file(&mut self) -> Result<()> {
        self.command(protocol::CMD_DELETE_FILE, &[])?;
        Ok(())
    }

    /// Switch the screen to the desktop composite.
    pub fn switch_desktop(&mut self) -> Result<()> {
        self.command(protocol::CMD_SWITCH_DESKTOP, &[])?;
        Ok(())
    }

    /// Push image bytes to a display layer. The payload length is declared
    /// big-endian in the argument region and the image bytes follow the
    /// frame in the same transfer.
    pub fn push_image(&mut self, bytes: &[u8], layer: Layer) -> Result<Option<Vec<u8>>> {
        let args = (bytes.len() as u32).to_be_bytes();
        self.link
            .send(&codec::build_payload_packet(layer.command(), &args, bytes), true)
    }

    /// Push a PNG to the overlay layer.
    pub fn push_overlay_png(&mut self, png: &[u8]) -> Result<Option<Vec<u8>>> {
        self.push_image(png, Layer::Overlay)
    }

    /// Upload a file to the device filesystem (e.g. `/usr/data/boot.jpg`).
    pub fn upload_file(&mut self, data: &[u8], target_path: &str) -> Result<Option<Vec<u8>>> {
        let name = target_path.as_bytes();
        let mut args = Vec::with_capacity(8 + name.len());
        args.extend_from_slice(&(name.len() as u32).to_be_bytes());
        args.extend_from_slice(&(data.len() as u32).to_be_bytes());
        args.extend_from_slice(name);
        self.link.send(
            &codec::build_payload_packet(protocol::CMD_UPLOAD_FILE, &args, data),
            true,
        )
    }

    /// Send one H.264 chunk on a playback slot. The response carries the
    /// per-slot buffer depths used for flow control.
    pub fn start_play(
        &mut self,
        slot: PlaybackSlot,
        chunk: &[u8],
        play_count: u8,
    ) -> Result<Option<Vec<u8>>> {
        let mut args = [0u8; 6];
        args[..4].copy_from_slice(&(chunk.len() as u32).to_be_bytes());
        args[5] = play_count;
        self.link
            .send(&codec::build_payload_packet(slot.command(), &args, chunk), true)
    }

    /// Query buffer depth for all playback slots.
    pub fn query_block(&mut self) -> Result<Option<Vec<u8>>> {
        self.command(protocol::CMD_QUERY_BLOCK, &[])
    }

    /// Stop H.264 playback.
    pub fn stop_play(&mut self) -> Result<()> {
        self.command(protocol::CMD_STOP_PLAY, &[])?;
        Ok(())
    }

    /// Full display prep before pushing new content: sync the clock, stop
    /// the clock overlay, then blank both layers. Guarantees a blank
    /// composite regardless of what was showing before.
    pub fn prepare_display(&mut self) -> error::Result<()> {
        self.sync_clock(ClockMode::SyncOnly)?;
        self.stop_clock()?;
        let transparent = render::transparent_png(DISPLAY_WIDTH, DISPLAY_HEIGHT)?;
        self.push_image(&transparent, Layer::Overlay)?;
        let black = render::solid_png(DISPLAY_WIDTH, DISPLAY_HEIGHT, [0, 0, 0])?;
        self.push_image(&black, Layer::Overlay)?;
        Ok(())
    }

    /// Collected status for the CLI.
    pub fn screen_info(&mut self) -> Result<ScreenInfo> {
        let firmware = self.version()?;
        let h264_capacity = self.h264_capacity()?;
        Ok(ScreenInfo {
            firmware,
            width: DISPLAY_WIDTH,
            height: DISPLAY_HEIGHT,
            h264_capacity,
        })
    }
}
