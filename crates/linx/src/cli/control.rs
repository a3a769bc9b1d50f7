//! One-shot control commands — brightness, LED colour, stop, wake,
//! upload, kill.

use std::fs;
use std::path::Path;

use linx_lib::led::{self, LedRing, UsbLed};
use linx_lib::mode::{self, DeviceMode};

use super::{Result, connect};
use crate::daemon;

pub(super) fn brightness(level: i32) -> Result<()> {
    let mut lcd = connect()?;
    lcd.set_brightness(level)?;
    println!("Brightness: {}", level.clamp(0, 100));
    Ok(())
}

pub(super) fn led(spec: &str) -> Result<()> {
    let rgb = led::parse_rgb(spec)?;
    let mut ring = LedRing::new(UsbLed::connect()?);
    ring.set_all(rgb)?;
    println!("LEDs: {rgb}");
    Ok(())
}

pub(super) fn stop() -> Result<()> {
    let mut lcd = connect()?;
    lcd.stop_play()?;
    println!("Stopped");
    Ok(())
}

pub(super) fn wake() -> Result<()> {
    match mode::probe() {
        Some(DeviceMode::Monitor) => println!("Already in monitor mode"),
        _ => {
            if mode::wake()? {
                println!("Switched to monitor mode");
            } else {
                println!("Failed: device not found in either mode");
            }
        }
    }
    Ok(())
}

pub(super) fn upload(file: &Path, target: &str) -> Result<()> {
    let data = fs::read(file)?;
    println!("Uploading {} bytes to {target}...", data.len());
    let mut lcd = connect()?;
    let resp = lcd.upload_file(&data, target)?;
    println!("{}", if resp.is_some() { "Done" } else { "No response" });
    Ok(())
}

pub(super) fn kill() -> Result<()> {
    if !daemon::kill_running()? {
        println!("No linx process running (no PID file)");
    }
    // The killed process may have been mid-playback; make sure the device
    // stops decoding.
    if let Ok(mut lcd) = connect() {
        let _ = lcd.stop_play();
    }
    Ok(())
}
