//! `test` and `version` subcommands — connection check and firmware info.

use serde::Serialize;

use linx_lib::lcd::ScreenInfo;
use linx_lib::led::{LedRing, UsbLed};

use super::{Result, connect};

#[derive(Serialize)]
struct TestOutput {
    #[serde(flatten)]
    screen: ScreenInfo,
    led_firmware: Option<String>,
}

pub(super) fn test(json: bool) -> Result<()> {
    let mut lcd = connect()?;
    lcd.init()?;
    let screen = lcd.screen_info()?;

    // The LED ring is a separate device and may be absent.
    let led_firmware = match UsbLed::connect() {
        Ok(link) => LedRing::new(link).version().unwrap_or_default(),
        Err(e) => {
            log::debug!("LED ring not reachable: {e}");
            None
        }
    };

    if json {
        let output = TestOutput {
            screen,
            led_firmware,
        };
        println!("{}", serde_json::to_string_pretty(&output).unwrap());
        return Ok(());
    }

    println!("Firmware:   {}", screen.firmware.as_deref().unwrap_or("unknown"));
    println!("Resolution: {}x{}", screen.width, screen.height);
    println!("H.264 buf:  {} bytes", screen.h264_capacity);
    if let Some(version) = led_firmware {
        println!("LED ring:   {version}");
    }
    Ok(())
}

pub(super) fn version(json: bool) -> Result<()> {
    let mut lcd = connect()?;
    let firmware = lcd.version()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ "firmware": firmware })).unwrap()
        );
    } else {
        println!("{}", firmware.as_deref().unwrap_or("No response"));
    }
    Ok(())
}
