//! Content commands — image push, video playback, solid colours and the
//! digital-rain screensaver, each with optional ambilight.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::ImageFormat;
use linx_lib::ambilight::decoder::DecoderBridge;
use linx_lib::ambilight::{sampler, AmbilightOptions, AmbilightWorker, FrameSlot};
use linx_lib::lcd::LcdController;
use linx_lib::led::{self, LedRing, RING_LEDS, UsbLed};
use linx_lib::protocol::{DISPLAY_HEIGHT, DISPLAY_WIDTH, PlaybackSlot};
use linx_lib::stream::{self, StreamOptions, StreamOutcome};
use linx_lib::transcode::{self, TempPath};
use linx_lib::transport::UsbLcd;
use linx_lib::LinxError;

use super::{connect, Result, RUNNING};
use crate::daemon::PidFile;
use crate::synth;

/// Running ambilight pair: the worker owns the ring, the slot feeds it.
struct Ambilight {
    worker: AmbilightWorker<UsbLed>,
    slot: FrameSlot,
}

/// Start the ambilight worker if the LED ring is reachable. A missing
/// ring disables ambilight but never blocks playback.
fn start_ambilight(grayscale_max: u8) -> Option<Ambilight> {
    match UsbLed::connect() {
        Ok(link) => {
            let slot = FrameSlot::new();
            let worker = AmbilightWorker::spawn(
                LedRing::new(link),
                slot.clone(),
                AmbilightOptions { grayscale_max },
            );
            Some(Ambilight { worker, slot })
        }
        Err(e) => {
            log::warn!("LED device not found, ambilight disabled: {e}");
            None
        }
    }
}

/// Stop the worker and leave the ring dark.
fn finish_ambilight(ambi: Ambilight) {
    if let Some(mut ring) = ambi.worker.stop() {
        let _ = ring.off();
    }
}

/// Stream a clip, decoding it in parallel for the LED ring when ambilight
/// is active.
fn stream_with_ambilight(
    lcd: &mut LcdController<UsbLcd>,
    path: &Path,
    options: &StreamOptions,
    ambi: Option<&Ambilight>,
) -> Result<StreamOutcome> {
    let bridge = ambi.and_then(|a| {
        match DecoderBridge::spawn(path, a.slot.clone(), options.loop_playback) {
            Ok(bridge) => Some(bridge),
            Err(e) => {
                log::warn!("ambilight decoder failed to start: {e}");
                None
            }
        }
    });
    let outcome = stream::stream_file(lcd, path, options, &RUNNING);
    if let Some(bridge) = bridge {
        bridge.shutdown();
    }
    outcome
}

fn report(outcome: StreamOutcome) {
    match outcome {
        StreamOutcome::Completed => println!("Playback finished"),
        StreamOutcome::Cancelled => println!("Playback stopped"),
        StreamOutcome::Aborted => println!("Playback aborted (transport failure)"),
    }
}

// ── image ──

pub(super) fn image(file: &Path, ambilight: bool) -> Result<()> {
    let img = image::open(file)
        .map_err(|e| LinxError::Image(format!("{}: {e}", file.display())))?
        .to_rgb8();
    let resized = imageops::resize(&img, DISPLAY_WIDTH, DISPLAY_HEIGHT, FilterType::Lanczos3);

    let mut lcd = connect()?;
    lcd.init()?;
    lcd.prepare_display()?;

    // One-shot ambilight: match the ring to the pushed image edges.
    if ambilight {
        match UsbLed::connect() {
            Ok(link) => {
                let colors = sampler::sample_edges(&resized, RING_LEDS);
                if let Err(e) = LedRing::new(link).set(&colors) {
                    log::warn!("LED update failed: {e}");
                }
            }
            Err(e) => log::warn!("LED device not found, ambilight disabled: {e}"),
        }
    }

    let mut png = Vec::new();
    resized
        .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
        .map_err(|e| LinxError::Image(format!("PNG encode: {e}")))?;
    println!(
        "Pushing {} ({} bytes, {DISPLAY_WIDTH}x{DISPLAY_HEIGHT})...",
        file.display(),
        png.len()
    );
    let resp = lcd.push_overlay_png(&png)?;
    println!("{}", if resp.is_some() { "Done" } else { "No response" });
    Ok(())
}

// ── play ──

pub(super) fn play(
    file: &Path,
    no_loop: bool,
    ambilight: bool,
    grayscale: u8,
    slot: u8,
) -> Result<()> {
    let mut lcd = connect()?;
    lcd.init()?;
    lcd.prepare_display()?;

    // Raw elementary streams go straight out; everything else is encoded
    // into a scratch file that cleans itself up.
    let (path, _transcoded): (PathBuf, Option<TempPath>) =
        if file.extension().and_then(|e| e.to_str()) == Some("h264") {
            (file.to_path_buf(), None)
        } else {
            println!("Encoding {}...", file.display());
            let tmp = transcode::encode_stream(file)?;
            (tmp.to_path_buf(), Some(tmp))
        };

    let options = StreamOptions {
        slot: PlaybackSlot::from_index(slot),
        loop_playback: !no_loop,
        play_count: 1,
    };

    let _pid = PidFile::create()?;
    let ambi = if ambilight || grayscale > 0 {
        start_ambilight(grayscale)
    } else {
        None
    };
    let outcome = stream_with_ambilight(&mut lcd, &path, &options, ambi.as_ref());
    if let Some(ambi) = ambi {
        finish_ambilight(ambi);
    }
    report(outcome?);
    Ok(())
}

// ── color ──

pub(super) fn color(spec: &str, ambilight: bool) -> Result<()> {
    let rgb = led::parse_rgb(spec)?;

    let mut lcd = connect()?;
    lcd.init()?;
    lcd.prepare_display()?;

    let mut ring = if ambilight {
        match UsbLed::connect() {
            Ok(link) => {
                let mut ring = LedRing::new(link);
                if let Err(e) = ring.set_all(rgb) {
                    log::warn!("LED update failed: {e}");
                }
                Some(ring)
            }
            Err(e) => {
                log::warn!("LED device not found, ambilight disabled: {e}");
                None
            }
        }
    } else {
        None
    };

    let clip = transcode::encode_solid(rgb, 5, 30)?;
    let _pid = PidFile::create()?;
    let outcome = stream::stream_file(&mut lcd, &clip, &StreamOptions::default(), &RUNNING)?;

    if let Some(ring) = ring.as_mut() {
        let _ = ring.off();
    }
    report(outcome);
    Ok(())
}

// ── matrix ──

pub(super) fn matrix(ambilight: bool, duration: u32) -> Result<()> {
    let mut lcd = connect()?;
    lcd.init()?;
    lcd.prepare_display()?;

    // The same worker follows the generator first, then playback.
    let ambi = if ambilight { start_ambilight(0) } else { None };

    println!("Generating {duration}s of digital rain...");
    let clip = synth::generate(duration, 30, ambi.as_ref().map(|a| &a.slot))?;

    let _pid = PidFile::create()?;
    let outcome = stream_with_ambilight(&mut lcd, &clip, &StreamOptions::default(), ambi.as_ref());
    if let Some(ambi) = ambi {
        finish_ambilight(ambi);
    }
    report(outcome?);
    Ok(())
}
