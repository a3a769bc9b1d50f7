//! Linx — driver library for the Lian Li 8.8" Universal Screen.
//!
//! The screen is one physical peripheral behind three USB identities: a
//! 480x1920 LCD (bulk, DES-obfuscated command frames), a standby HID that
//! accepts only the wake command, and a 60-LED RGB ring on its own HID.
//! Protocol reverse-engineered from L-Connect 3; implemented on a
//! best-effort interoperability basis.

pub mod ambilight;
pub mod codec;
pub mod error;
pub mod lcd;
pub mod led;
pub mod mode;
pub mod protocol;
pub mod render;
pub mod stream;
pub mod transcode;
pub mod transport;

pub use error::LinxError;
