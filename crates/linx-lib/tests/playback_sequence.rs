//! Integration tests: end-to-end display and playback sequences through
//! the mock transports.
//!
//! These exercise the public API the way the CLI drives it: prepare the
//! display, stream a clip with flow control, and run the ambilight
//! producer/consumer pair, verifying the exact command traffic.

use std::io::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use linx_lib::ambilight::{AmbilightOptions, AmbilightWorker, FrameSlot};
use linx_lib::lcd::LcdController;
use linx_lib::led::mock::MockLed;
use linx_lib::led::{LedRing, Rgb, RING_LEDS};
use linx_lib::protocol::*;
use linx_lib::stream::{StreamOptions, StreamOutcome, stream_file};
use linx_lib::transport::mock::MockLcd;

fn depth_response(offset: usize, depth: u8) -> Vec<u8> {
    let mut resp = vec![0u8; 512];
    resp[offset] = depth;
    resp
}

// ── Display prepare sequence ──

#[test]
fn prepare_then_push_black_frame() {
    let mut lcd = LcdController::new(MockLcd::new());
    lcd.init().unwrap();
    lcd.prepare_display().unwrap();

    let black = linx_lib::render::solid_png(DISPLAY_WIDTH, DISPLAY_HEIGHT, [0, 0, 0]).unwrap();
    lcd.push_overlay_png(&black).unwrap();

    // Framerate init, then clock-sync, stop-clock, transparent PNG, black
    // PNG, then the pushed frame. Every push declares its payload length.
    assert_eq!(
        lcd.link().cmds(),
        vec![
            CMD_SET_FRAMERATE,
            CMD_SET_CLOCK,
            CMD_STOP_CLOCK,
            CMD_PUSH_PNG,
            CMD_PUSH_PNG,
            CMD_PUSH_PNG,
        ]
    );
    for push in lcd.link().sent.iter().filter(|p| p.cmd == CMD_PUSH_PNG) {
        let declared = u32::from_be_bytes(push.args[..4].try_into().unwrap());
        assert_eq!(declared as usize, push.payload.len());
        assert!(!push.payload.is_empty());
    }
}

// ── Streaming with flow control ──

#[test]
fn stream_paces_on_reported_buffer_depth() {
    let mut clip = tempfile::NamedTempFile::new().unwrap();
    clip.write_all(&vec![0x42u8; DEFAULT_H264_CAPACITY as usize * 3])
        .unwrap();
    clip.flush().unwrap();

    let mut link = MockLcd::new();
    link.push_response(CMD_GET_H264_BLOCK, depth_response(11, 0));
    // Chunk 1 reply: buffer deep, streamer must poll.
    link.push_response(CMD_START_PLAY, depth_response(8, 4));
    // Two polls: still deep, then drained.
    link.push_response(CMD_QUERY_BLOCK, depth_response(8, 4));
    link.push_response(CMD_QUERY_BLOCK, depth_response(8, 2));
    let mut lcd = LcdController::new(link);

    let options = StreamOptions {
        loop_playback: false,
        ..StreamOptions::default()
    };
    let outcome = stream_file(&mut lcd, clip.path(), &options, &AtomicBool::new(true)).unwrap();
    assert_eq!(outcome, StreamOutcome::Completed);

    let cmds = lcd.link().cmds();
    let expected = vec![
        CMD_GET_H264_BLOCK,
        CMD_START_PLAY,
        CMD_QUERY_BLOCK,
        CMD_QUERY_BLOCK,
        CMD_START_PLAY,
        CMD_START_PLAY,
        CMD_STOP_PLAY,
    ];
    assert_eq!(cmds, expected);
}

#[test]
fn looped_stream_reopens_file_until_cancelled() {
    let mut clip = tempfile::NamedTempFile::new().unwrap();
    clip.write_all(&[0x11u8; 1024]).unwrap();
    clip.flush().unwrap();

    let flag = Arc::new(AtomicBool::new(true));
    let path = clip.path().to_path_buf();
    let stream_flag = flag.clone();
    let handle = std::thread::spawn(move || {
        let mut lcd = LcdController::new(MockLcd::new());
        let outcome = stream_file(&mut lcd, &path, &StreamOptions::default(), &stream_flag).unwrap();
        (outcome, lcd.link().cmds())
    });

    // Let a few loop iterations pass, then cancel.
    std::thread::sleep(Duration::from_millis(300));
    flag.store(false, Ordering::SeqCst);
    let (outcome, cmds) = handle.join().unwrap();

    assert_eq!(outcome, StreamOutcome::Cancelled);
    let plays = cmds.iter().filter(|&&c| c == CMD_START_PLAY).count();
    assert!(plays >= 2, "looping should have replayed the file, got {plays} sends");
    assert_eq!(*cmds.last().unwrap(), CMD_STOP_PLAY);
}

// ── Ambilight producer/consumer ──

#[test]
fn ambilight_follows_producer_and_shuts_down_dark() {
    let slot = FrameSlot::new();
    let worker = AmbilightWorker::spawn(
        LedRing::new(MockLed::new()),
        slot.clone(),
        AmbilightOptions::default(),
    );

    // Producer at ~30 fps for a third of a second; worker ticks at 10 Hz.
    for i in 0..10u8 {
        let frame = image::RgbImage::from_pixel(48, 192, image::Rgb([i * 20, 0, 0]));
        slot.publish(Arc::new(frame));
        std::thread::sleep(Duration::from_millis(33));
    }

    let mut ring = worker.stop().expect("worker returns the ring");
    let updates = ring.link().packets.len() / 3;
    assert!(updates >= 1, "at least one LED update went out");
    assert!(
        updates <= 6,
        "10 Hz worker cannot have processed all 30 fps frames, got {updates}"
    );

    // Shutdown path that owns the ring turns it off.
    ring.off().unwrap();
    let last3 = &ring.link().packets[ring.link().packets.len() - 3..];
    for packet in last3 {
        assert!(packet[4..].iter().all(|&b| b == 0));
    }
}

#[test]
fn led_colour_round_trip_through_ring() {
    let mut ring = LedRing::new(MockLed::new());
    ring.set_all(Rgb::new(200, 100, 50)).unwrap();
    ring.off().unwrap();

    let packets = &ring.link().packets;
    assert_eq!(packets.len(), 6);
    let colour_bytes: Vec<u8> = packets[..3].iter().flat_map(|p| p[4..].to_vec()).collect();
    assert_eq!(colour_bytes.len(), RING_LEDS * 3);
    for triple in colour_bytes.chunks(3) {
        assert_eq!(triple, &[200, 100, 50]);
    }
    let off_bytes: Vec<u8> = packets[3..].iter().flat_map(|p| p[4..].to_vec()).collect();
    assert!(off_bytes.iter().all(|&b| b == 0));
}
