//! Mode switching — detect which firmware personality is enumerated and
//! wake the screen out of standby.
//!
//! The screen has two mutually exclusive USB modes. In standby (desktop)
//! mode only the WCH HID is present and it accepts a single command: a
//! 512-byte packet beginning with the ASCII magic `"5f3759df"` on
//! interface 1. After the wake packet the HID drops off the bus and the
//! TI MCU re-enumerates in monitor mode, which takes a few seconds.

use std::thread;

use rusb::{Context, UsbContext};

use crate::protocol::{
    FRAME_LEN, LCD_PID, LCD_VID, STANDBY_EP_OUT, STANDBY_INTERFACE, STANDBY_PID, STANDBY_VID,
    WAKE_MAGIC, WAKE_POLL_ATTEMPTS, WAKE_POLL_INTERVAL, WAKE_WRITE_TIMEOUT,
};
use crate::transport::{Result, TransportError};

/// The screen's two mutually exclusive USB firmware personalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceMode {
    /// TI MCU enumerated: full display control available.
    Monitor,
    /// WCH HID enumerated: only the wake command is accepted.
    Standby,
}

/// Probe which mode is currently enumerated, if either.
pub fn probe() -> Option<DeviceMode> {
    if monitor_present() {
        Some(DeviceMode::Monitor)
    } else if standby_present() {
        Some(DeviceMode::Standby)
    } else {
        None
    }
}

pub fn monitor_present() -> bool {
    device_present(LCD_VID, LCD_PID)
}

pub fn standby_present() -> bool {
    device_present(STANDBY_VID, STANDBY_PID)
}

fn device_present(vid: u16, pid: u16) -> bool {
    let Ok(devices) = rusb::devices() else {
        return false;
    };
    devices.iter().any(|dev| {
        dev.device_descriptor()
            .map(|desc| desc.vendor_id() == vid && desc.product_id() == pid)
            .unwrap_or(false)
    })
}

/// The 512-byte wake packet: ASCII magic, zero-filled.
pub fn wake_packet() -> [u8; FRAME_LEN] {
    let mut packet = [0u8; FRAME_LEN];
    packet[..WAKE_MAGIC.len()].copy_from_slice(WAKE_MAGIC);
    packet
}

/// Send the wake command to the standby HID and wait for the monitor-mode
/// device to appear.
///
/// Returns `Ok(true)` once monitor mode enumerates, `Ok(false)` if the
/// standby HID is absent or monitor mode never appeared within the 10 s
/// budget. Safe to call when already in monitor mode.
pub fn wake() -> Result<bool> {
    if monitor_present() {
        return Ok(true);
    }

    let context = Context::new().map_err(|e| TransportError::Io(format!("libusb context: {e}")))?;
    let Some(mut handle) = context.open_device_with_vid_pid(STANDBY_VID, STANDBY_PID) else {
        return Ok(false);
    };

    if handle
        .kernel_driver_active(STANDBY_INTERFACE)
        .unwrap_or(false)
    {
        let _ = handle.detach_kernel_driver(STANDBY_INTERFACE);
    }
    let _ = handle.set_active_configuration(1);
    handle
        .claim_interface(STANDBY_INTERFACE)
        .map_err(|e| TransportError::Io(format!("claim standby interface 1: {e}")))?;

    // The write can error while the device is already flipping modes; only
    // re-enumeration below decides success.
    if let Err(e) = handle.write_interrupt(STANDBY_EP_OUT, &wake_packet(), WAKE_WRITE_TIMEOUT) {
        log::debug!("wake write: {e}");
    }
    let _ = handle.release_interface(STANDBY_INTERFACE);
    drop(handle);

    for _ in 0..WAKE_POLL_ATTEMPTS {
        thread::sleep(WAKE_POLL_INTERVAL);
        if monitor_present() {
            return Ok(true);
        }
    }
    Ok(false)
}
