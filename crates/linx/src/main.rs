//! Linx CLI — control the Lian Li 8.8" Universal Screen.
//!
//! Thin adapter over `linx-lib`: subcommands wire files, colours and
//! signal handling to the driver components. Playback commands run until
//! interrupted; SIGINT/SIGTERM flip the shared running flag and the
//! streamer winds down cleanly.

use std::sync::atomic::{AtomicBool, Ordering};

use clap::Parser;

mod cli;
mod daemon;
mod synth;

/// Shared shutdown flag, set by the signal handler.
pub static RUNNING: AtomicBool = AtomicBool::new(true);

#[derive(Parser)]
#[command(
    name = "linx",
    version,
    about = "Driver for the Lian Li 8.8\" Universal Screen (LCD + LED ring)"
)]
struct Args {
    /// Output as JSON (for test, version)
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: cli::Command,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .format_target(false)
        .init();

    // Command-frame timestamps count from process start.
    linx_lib::codec::init_epoch();

    let args = Args::parse();

    ctrlc::set_handler(|| RUNNING.store(false, Ordering::SeqCst)).ok();

    if let Err(e) = cli::run(args.command, args.json) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
