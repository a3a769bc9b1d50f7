//! Protocol constants for the Lian Li 8.8" Universal Screen.
//!
//! All values decoded from USB captures and the L-Connect 3 `lcd207`
//! control library. The screen enumerates as three distinct USB identities:
//! a TI MCU in monitor mode (full display control over bulk endpoints), a
//! WCH HID in standby mode (accepts only the wake command), and a second
//! WCH HID for the LED ring.

use std::time::Duration;

// ── USB identities ──

/// TI MCU — monitor mode, bulk display commands.
pub const LCD_VID: u16 = 0x1CBE;
pub const LCD_PID: u16 = 0xA088;

/// WCH HID — standby/desktop mode, wake command only.
pub const STANDBY_VID: u16 = 0x1A86;
pub const STANDBY_PID: u16 = 0xAD21;

/// WCH HID — LED ring controller.
pub const LED_VID: u16 = 0x0416;
pub const LED_PID: u16 = 0x8050;

/// Monitor-mode interface and bulk endpoints.
pub const LCD_INTERFACE: u8 = 0;
pub const LCD_EP_OUT: u8 = 0x01;
pub const LCD_EP_IN: u8 = 0x81;

/// Standby-mode HID interface and interrupt OUT endpoint.
pub const STANDBY_INTERFACE: u8 = 1;
pub const STANDBY_EP_OUT: u8 = 0x02;

/// LED ring interface and interrupt endpoints.
pub const LED_INTERFACE: u8 = 0;
pub const LED_EP_OUT: u8 = 0x01;
pub const LED_EP_IN: u8 = 0x81;

// ── Display geometry ──

/// Native resolution, portrait.
pub const DISPLAY_WIDTH: u32 = 480;
pub const DISPLAY_HEIGHT: u32 = 1920;

// ── Command framing ──

/// On-the-wire control frame length.
pub const FRAME_LEN: usize = 512;

/// Pre-encryption plaintext length.
pub const PLAIN_LEN: usize = 500;

/// PKCS#7-padded ciphertext length (500 rounded up to the 8-byte block).
pub const CIPHERTEXT_LEN: usize = 504;

/// Argument region capacity: plaintext bytes 8..500.
pub const ARGS_LEN: usize = PLAIN_LEN - 8;

/// Constant marker at plaintext bytes 2..=3.
pub const HEADER_MARKER: [u8; 2] = [0x1A, 0x6D];

/// Trailer overwriting frame bytes 510..=511.
pub const TRAILER: [u8; 2] = [0xA1, 0x1A];

/// DES-CBC key and IV (the same 8 ASCII bytes). Obfuscation, not security.
pub const CIPHER_KEY: &[u8; 8] = b"slv3tuzx";

/// First 8 bytes of the standby-mode wake packet, ASCII "5f3759df".
pub const WAKE_MAGIC: &[u8; 8] = b"5f3759df";

// ── Command ids ──

pub const CMD_GET_VERSION: u8 = 10;
/// Reboots into standby mode; the monitor-mode endpoint disappears.
pub const CMD_REBOOT: u8 = 11;
pub const CMD_SET_ROTATION: u8 = 13;
pub const CMD_SET_BRIGHTNESS: u8 = 14;
pub const CMD_SET_FRAMERATE: u8 = 15;
pub const CMD_GET_H264_BLOCK: u8 = 17;
pub const CMD_UPLOAD_FILE: u8 = 40;
pub const CMD_DELETE_FILE: u8 = 42;
pub const CMD_SET_CLOCK: u8 = 51;
pub const CMD_STOP_CLOCK: u8 = 52;
pub const CMD_QUERY_DIR: u8 = 99;
/// JPG layer (opaque background). Fails for payloads above roughly 2 KB.
pub const CMD_PUSH_JPG: u8 = 101;
/// PNG layer (transparent overlay). Works at all sizes.
pub const CMD_PUSH_PNG: u8 = 102;
/// H.264 stream, slot 1.
pub const CMD_START_PLAY_1: u8 = 119;
/// H.264 stream, slot 2.
pub const CMD_START_PLAY_2: u8 = 120;
/// H.264 stream, slot 0 (primary).
pub const CMD_START_PLAY: u8 = 121;
pub const CMD_QUERY_BLOCK: u8 = 122;
pub const CMD_STOP_PLAY: u8 = 123;
pub const CMD_SWITCH_DESKTOP: u8 = 150;

/// LED ring firmware version query (first packet byte).
pub const LED_CMD_VERSION: u8 = 16;

/// LED ring colour-data packet marker (first packet byte).
pub const LED_CMD_SET_COLOR: u8 = 17;

/// LED HID packet length.
pub const LED_PACKET_LEN: usize = 64;

// ── Playback slots ──

/// One of the three independent H.264 playback buffers.
///
/// Each slot has its own start command and its own buffer-depth byte in
/// the [`CMD_QUERY_BLOCK`] response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackSlot {
    #[default]
    Primary,
    Alt1,
    Alt2,
}

impl PlaybackSlot {
    /// The start-play command id for this slot.
    pub fn command(self) -> u8 {
        match self {
            PlaybackSlot::Primary => CMD_START_PLAY,
            PlaybackSlot::Alt1 => CMD_START_PLAY_1,
            PlaybackSlot::Alt2 => CMD_START_PLAY_2,
        }
    }

    /// Byte offset of this slot's buffer depth in the query-block response.
    pub fn depth_offset(self) -> usize {
        match self {
            PlaybackSlot::Primary => 8,
            PlaybackSlot::Alt1 => 9,
            PlaybackSlot::Alt2 => 10,
        }
    }

    /// Slot by index 0..=2. Out-of-range indices fall back to the primary slot.
    pub fn from_index(index: u8) -> Self {
        match index {
            1 => PlaybackSlot::Alt1,
            2 => PlaybackSlot::Alt2,
            _ => PlaybackSlot::Primary,
        }
    }
}

// ── Streaming and flow control ──

/// Fallback per-packet payload capacity when the device cannot be queried.
pub const DEFAULT_H264_CAPACITY: u32 = 202_752;

/// Delay between streamed chunks.
pub const CHUNK_DELAY: Duration = Duration::from_millis(30);

/// Buffer depth above which the streamer enters flow-control waiting.
pub const FLOW_ENTER_DEPTH: u8 = 3;

/// Buffer depth at which flow-control waiting resumes streaming.
pub const FLOW_RESUME_DEPTH: u8 = 2;

/// Flow-control poll budget: 200 polls at 50 ms is a 10 s cap per chunk.
pub const FLOW_POLL_ATTEMPTS: u32 = 200;
pub const FLOW_POLL_INTERVAL: Duration = Duration::from_millis(50);

// ── Timeouts ──

/// Fixed bulk IN read timeout.
pub const LCD_READ_TIMEOUT: Duration = Duration::from_millis(2000);

/// Short timeout used while draining stale IN data.
pub const DRAIN_TIMEOUT: Duration = Duration::from_millis(10);

/// LED interrupt OUT timeout.
pub const LED_WRITE_TIMEOUT: Duration = Duration::from_millis(2000);

/// LED interrupt IN timeout.
pub const LED_READ_TIMEOUT: Duration = Duration::from_millis(500);

/// Pause between release and re-open during transport reconnect.
pub const RECONNECT_DELAY: Duration = Duration::from_millis(100);

/// Interrupt OUT timeout for the standby wake packet.
pub const WAKE_WRITE_TIMEOUT: Duration = Duration::from_millis(2000);

/// Re-enumeration poll schedule after the wake packet: 20 x 500 ms = 10 s.
pub const WAKE_POLL_ATTEMPTS: u32 = 20;
pub const WAKE_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Write timeout for a bulk OUT transfer of `len` bytes.
///
/// The device is USB full-speed, so the budget scales with payload size:
/// `max(2000, len/500 + 2000)` milliseconds.
pub fn write_timeout(len: usize) -> Duration {
    Duration::from_millis((len as u64 / 500 + 2000).max(2000))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_ids_distinct() {
        let cmds = [
            CMD_GET_VERSION,
            CMD_REBOOT,
            CMD_SET_ROTATION,
            CMD_SET_BRIGHTNESS,
            CMD_SET_FRAMERATE,
            CMD_GET_H264_BLOCK,
            CMD_UPLOAD_FILE,
            CMD_DELETE_FILE,
            CMD_SET_CLOCK,
            CMD_STOP_CLOCK,
            CMD_QUERY_DIR,
            CMD_PUSH_JPG,
            CMD_PUSH_PNG,
            CMD_START_PLAY_1,
            CMD_START_PLAY_2,
            CMD_START_PLAY,
            CMD_QUERY_BLOCK,
            CMD_STOP_PLAY,
            CMD_SWITCH_DESKTOP,
        ];
        for i in 0..cmds.len() {
            for j in (i + 1)..cmds.len() {
                assert_ne!(cmds[i], cmds[j], "commands at index {i} and {j} collide");
            }
        }
    }

    #[test]
    fn usb_identities_distinct() {
        let ids = [(LCD_VID, LCD_PID), (STANDBY_VID, STANDBY_PID), (LED_VID, LED_PID)];
        for i in 0..ids.len() {
            for j in (i + 1)..ids.len() {
                assert_ne!(ids[i], ids[j], "identities at index {i} and {j} collide");
            }
        }
    }

    #[test]
    fn frame_layout_consistent() {
        // 500 plaintext bytes pad to 63 DES blocks, which must fit below the
        // trailer so no ciphertext is ever clobbered.
        assert_eq!(CIPHERTEXT_LEN, PLAIN_LEN.div_ceil(8) * 8);
        assert!(CIPHERTEXT_LEN <= FRAME_LEN - TRAILER.len());
        assert_eq!(ARGS_LEN, 492);
    }

    #[test]
    fn slot_commands_match_depth_offsets() {
        assert_eq!(PlaybackSlot::Primary.command(), 121);
        assert_eq!(PlaybackSlot::Primary.depth_offset(), 8);
        assert_eq!(PlaybackSlot::Alt1.command(), 119);
        assert_eq!(PlaybackSlot::Alt1.depth_offset(), 9);
        assert_eq!(PlaybackSlot::Alt2.command(), 120);
        assert_eq!(PlaybackSlot::Alt2.depth_offset(), 10);
    }

    #[test]
    fn slot_from_index_round_trips() {
        assert_eq!(PlaybackSlot::from_index(0), PlaybackSlot::Primary);
        assert_eq!(PlaybackSlot::from_index(1), PlaybackSlot::Alt1);
        assert_eq!(PlaybackSlot::from_index(2), PlaybackSlot::Alt2);
        // Out of range falls back rather than panicking.
        assert_eq!(PlaybackSlot::from_index(7), PlaybackSlot::Primary);
    }

    #[test]
    fn write_timeout_scales_with_length() {
        assert_eq!(write_timeout(0), Duration::from_millis(2000));
        assert_eq!(write_timeout(512), Duration::from_millis(2001));
        // 1 MiB payload: 1048576/500 + 2000 = 4097 ms.
        assert_eq!(write_timeout(1_048_576), Duration::from_millis(4097));
    }

    #[test]
    fn wake_magic_is_ascii_constant() {
        assert_eq!(WAKE_MAGIC, b"5f3759df");
        assert_eq!(CIPHER_KEY.len(), 8);
    }
}
