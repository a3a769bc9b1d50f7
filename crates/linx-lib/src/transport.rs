//! LCD bulk transport — find, claim, send, reconnect.
//!
//! The monitor-mode device exposes interface 0 with bulk endpoints 0x01
//! (OUT) and 0x81 (IN). Every send first drains the IN endpoint so a stale
//! response left over from an earlier command cannot desync later reads.
//! Write failures trigger one release/reopen/retry cycle; a second failure
//! surfaces as [`TransportError::Io`].

use std::fmt;
use std::thread;
use std::time::Duration;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::mode;
use crate::protocol::{
    self, FRAME_LEN, LCD_EP_IN, LCD_EP_OUT, LCD_INTERFACE, LCD_PID, LCD_VID,
};

// ── Error type ──

/// Transport-level errors.
///
/// String payloads follow the convention **"context: details"** where
/// *context* identifies the operation (e.g. `"bulk write"`, `"claim
/// interface 0"`) and *details* describes what went wrong.
#[derive(Debug)]
pub enum TransportError {
    /// No enumeration in either monitor or standby mode.
    DeviceAbsent,
    /// Wake packet sent but monitor mode did not appear within budget.
    ModeSwitchFailed,
    /// A USB read or write failed irrecoverably after one reconnect.
    Io(String),
    /// A response was truncated or structurally unexpected.
    BadResponse(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::DeviceAbsent => write!(
                f,
                "screen not found in either mode (monitor {:04x}:{:04x}, standby {:04x}:{:04x})",
                protocol::LCD_VID,
                protocol::LCD_PID,
                protocol::STANDBY_VID,
                protocol::STANDBY_PID
            ),
            TransportError::ModeSwitchFailed => {
                write!(f, "wake sent but monitor mode did not enumerate")
            }
            TransportError::Io(e) => write!(f, "USB I/O failed: {e}"),
            TransportError::BadResponse(e) => write!(f, "Unexpected response: {e}"),
        }
    }
}

impl std::error::Error for TransportError {}

pub type Result<T> = std::result::Result<T, TransportError>;

// ── Trait ──

/// The send seam between typed commands and the USB bus.
///
/// `Ok(None)` means the write was handed to the kernel but no response
/// arrived (or none was requested) — a signal to the caller, not a fatal
/// error unless persistent.
pub trait LcdLink {
    fn send(&mut self, packet: &[u8], want_reply: bool) -> Result<Option<Vec<u8>>>;
}

// ── USB implementation ──

/// Bulk transport over the monitor-mode device.
pub struct UsbLcd {
    handle: DeviceHandle<Context>,
    context: Context,
}

impl UsbLcd {
    /// Find and claim the monitor-mode device, waking it from standby
    /// if needed.
    pub fn connect() -> Result<Self> {
        let context =
            Context::new().map_err(|e| TransportError::Io(format!("libusb context: {e}")))?;

        let handle = match context.open_device_with_vid_pid(LCD_VID, LCD_PID) {
            Some(handle) => handle,
            None => {
                if !mode::standby_present() {
                    return Err(TransportError::DeviceAbsent);
                }
                log::info!("screen is in standby mode, sending wake");
                if !mode::wake()? {
                    return Err(TransportError::ModeSwitchFailed);
                }
                context
                    .open_device_with_vid_pid(LCD_VID, LCD_PID)
                    .ok_or(TransportError::ModeSwitchFailed)?
            }
        };

        let mut lcd = UsbLcd { handle, context };
        lcd.claim()?;
        if let Ok(desc) = lcd.handle.device().device_descriptor()
            && let Ok(product) = lcd.handle.read_product_string_ascii(&desc)
        {
            log::info!("connected: {product}");
        }
        Ok(lcd)
    }

    /// Detach any bound kernel driver, set the configuration (best-effort;
    /// it may already be set) and claim interface 0.
    fn claim(&mut self) -> Result<()> {
        if self.handle.kernel_driver_active(LCD_INTERFACE).unwrap_or(false) {
            self.handle
                .detach_kernel_driver(LCD_INTERFACE)
                .map_err(|e| TransportError::Io(format!("detach kernel driver: {e}")))?;
        }
        let _ = self.handle.set_active_configuration(1);
        self.handle
            .claim_interface(LCD_INTERFACE)
            .map_err(|e| TransportError::Io(format!("claim interface 0: {e}")))
    }

    /// Drain stale data from the IN endpoint to prevent response desync.
    fn drain(&mut self) {
        let mut buf = [0u8; FRAME_LEN];
        while self
            .handle
            .read_bulk(LCD_EP_IN, &mut buf, protocol::DRAIN_TIMEOUT)
            .is_ok()
        {}
    }

    /// Release, reopen and reclaim after an I/O error. The short pause lets
    /// the kernel finish tearing down the failed transfer.
    fn reconnect(&mut self) -> Result<()> {
        let _ = self.handle.release_interface(LCD_INTERFACE);
        thread::sleep(protocol::RECONNECT_DELAY);
        self.handle = self
            .context
            .open_device_with_vid_pid(LCD_VID, LCD_PID)
            .ok_or(TransportError::DeviceAbsent)?;
        self.claim()
    }
}

impl LcdLink for UsbLcd {
    fn send(&mut self, packet: &[u8], want_reply: bool) -> Result<Option<Vec<u8>>> {
        self.drain();

        let timeout = protocol::write_timeout(packet.len());
        if let Err(first) = self.handle.write_bulk(LCD_EP_OUT, packet, timeout) {
            log::warn!("bulk write failed ({first}), reconnecting");
            self.reconnect()?;
            self.handle
                .write_bulk(LCD_EP_OUT, packet, timeout)
                .map_err(|e| TransportError::Io(format!("bulk write after reconnect: {e}")))?;
        }

        if !want_reply {
            return Ok(None);
        }

        let mut buf = [0u8; FRAME_LEN];
        match self
            .handle
            .read_bulk(LCD_EP_IN, &mut buf, protocol::LCD_READ_TIMEOUT)
        {
            Ok(n) => {
                let resp = buf[..n].to_vec();
                self.drain();
                Ok(Some(resp))
            }
            Err(rusb::Error::Timeout) => Ok(None),
            Err(e) => {
                log::debug!("bulk read failed: {e}");
                Ok(None)
            }
        }
    }
}

impl Drop for UsbLcd {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(LCD_INTERFACE);
    }
}

// ── Mock transport for testing ──

/// In-memory mock transport for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use std::collections::HashMap;

    use super::{LcdLink, Result, TransportError};
    use crate::codec;
    use crate::protocol::FRAME_LEN;

    /// A recorded outbound packet, decrypted the way the device would.
    pub struct SentPacket {
        pub cmd: u8,
        /// Decrypted argument region (492 bytes, zero-filled).
        pub args: Vec<u8>,
        /// Raw payload bytes following the 512-byte frame.
        pub payload: Vec<u8>,
    }

    /// Mock link: decrypts frames, records them, and pops scripted
    /// per-command responses in FIFO order.
    #[derive(Default)]
    pub struct MockLcd {
        pub sent: Vec<SentPacket>,
        /// Scripted responses: cmd id -> queue of `Some(response)` or
        /// `None` for a simulated read timeout.
        pub responses: HashMap<u8, Vec<Option<Vec<u8>>>>,
        /// Number of upcoming sends to fail with an I/O error.
        pub fail_sends: u32,
        /// Number of sends to let through before `fail_sends` kicks in.
        pub fail_after: u32,
    }

    impl MockLcd {
        pub fn new() -> Self {
            Self::default()
        }

        /// Queue a response for the next frame carrying `cmd`.
        pub fn push_response(&mut self, cmd: u8, response: Vec<u8>) {
            self.responses.entry(cmd).or_default().push(Some(response));
        }

        /// Queue a simulated read timeout for the next frame carrying `cmd`.
        pub fn push_silence(&mut self, cmd: u8) {
            self.responses.entry(cmd).or_default().push(None);
        }

        /// Command ids of every packet sent so far, in order.
        pub fn cmds(&self) -> Vec<u8> {
            self.sent.iter().map(|p| p.cmd).collect()
        }
    }

    impl LcdLink for MockLcd {
        fn send(&mut self, packet: &[u8], want_reply: bool) -> Result<Option<Vec<u8>>> {
            if self.fail_after > 0 {
                self.fail_after -= 1;
            } else if self.fail_sends > 0 {
                self.fail_sends -= 1;
                return Err(TransportError::Io("mock: injected send failure".into()));
            }
            let frame = packet
                .get(..FRAME_LEN)
                .ok_or_else(|| TransportError::BadResponse("mock: short frame".into()))?;
            let plain = codec::open_frame(frame)
                .ok_or_else(|| TransportError::BadResponse("mock: undecodable frame".into()))?;
            let cmd = plain.cmd;
            self.sent.push(SentPacket {
                cmd,
                args: plain.args,
                payload: packet[FRAME_LEN..].to_vec(),
            });
            if !want_reply {
                return Ok(None);
            }
            let queued = self.responses.get_mut(&cmd).and_then(|queue| {
                if queue.is_empty() { None } else { Some(queue.remove(0)) }
            });
            Ok(queued.flatten())
        }
    }
}
