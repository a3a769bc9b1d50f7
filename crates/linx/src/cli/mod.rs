//! CLI subcommands — status, content playback, LED ring, device control.

mod content;
mod control;
mod status;

use std::path::PathBuf;

use clap::Subcommand;

pub(super) use crate::RUNNING;
pub(super) use linx_lib::error::Result;

use linx_lib::lcd::LcdController;
use linx_lib::transport::UsbLcd;

#[derive(Subcommand)]
pub enum Command {
    /// Test the connection and show device info
    Test,
    /// Show the LCD firmware version
    Version,
    /// Display an image file (PNG/JPG)
    Image {
        /// Image file to display
        file: PathBuf,
        /// Set the LED ring to match the image edges
        #[arg(long, short)]
        ambilight: bool,
    },
    /// Play a video file (any format ffmpeg can read)
    Play {
        /// Video file to play
        file: PathBuf,
        /// Play once instead of looping
        #[arg(long)]
        no_loop: bool,
        /// Sync the LED ring to the video edges
        #[arg(long, short)]
        ambilight: bool,
        /// Ambilight grayscale mode: max LED intensity 1-255 (implies --ambilight)
        #[arg(long, short, default_value_t = 0, value_name = "MAX")]
        grayscale: u8,
        /// Playback slot (0-2)
        #[arg(long, default_value_t = 0)]
        slot: u8,
    },
    /// Show a solid colour
    Color {
        /// Colour name, R,G,B or #RRGGBB
        color: String,
        /// Set the LED ring to the same colour
        #[arg(long, short)]
        ambilight: bool,
    },
    /// Digital-rain screensaver
    Matrix {
        /// Sync the LED ring to the screen edges
        #[arg(long, short)]
        ambilight: bool,
        /// Generated clip length in seconds (playback loops)
        #[arg(long, default_value_t = 60)]
        duration: u32,
    },
    /// Set display brightness (0-100)
    Brightness { level: i32 },
    /// Set the LED ring colour
    Led {
        /// Colour name, R,G,B or #RRGGBB
        color: String,
    },
    /// Stop playback
    Stop,
    /// Wake the screen from standby mode
    Wake,
    /// Upload a file to the device filesystem
    Upload {
        /// Local file to upload
        file: PathBuf,
        /// Device path (e.g. /usr/data/boot.jpg)
        target: String,
    },
    /// Stop a running linx playback process
    Kill,
}

pub fn run(command: Command, json: bool) -> Result<()> {
    match command {
        Command::Test => status::test(json),
        Command::Version => status::version(json),
        Command::Image { file, ambilight } => content::image(&file, ambilight),
        Command::Play {
            file,
            no_loop,
            ambilight,
            grayscale,
            slot,
        } => content::play(&file, no_loop, ambilight, grayscale, slot),
        Command::Color { color, ambilight } => content::color(&color, ambilight),
        Command::Matrix {
            ambilight,
            duration,
        } => content::matrix(ambilight, duration),
        Command::Brightness { level } => control::brightness(level),
        Command::Led { color } => control::led(&color),
        Command::Stop => control::stop(),
        Command::Wake => control::wake(),
        Command::Upload { file, target } => control::upload(&file, &target),
        Command::Kill => control::kill(),
    }
}

/// Connect to the LCD. Content commands run [`LcdController::init`]
/// themselves; one-shot control commands skip it.
pub(super) fn connect() -> Result<LcdController<UsbLcd>> {
    Ok(LcdController::new(UsbLcd::connect()?))
}
