//! Encrypted 512-byte command frames for the LCD control channel.
//!
//! Every control packet starts life as a fixed 500-byte plaintext: command
//! id at byte 0, the `1A 6D` marker at bytes 2..=3, a little-endian
//! millisecond timestamp at bytes 4..=7, and the argument region from
//! byte 8. The plaintext is DES-CBC encrypted with PKCS#7 padding (key and
//! IV are the same fixed ASCII string), copied into a zeroed 512-byte
//! frame, and the `A1 1A` trailer is written over bytes 510..=511. The
//! cipher is an obfuscation layer inherited from the vendor software, not
//! a security measure.

use std::sync::LazyLock;
use std::time::Instant;

use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};

use crate::protocol::{
    CIPHER_KEY, CIPHERTEXT_LEN, FRAME_LEN, HEADER_MARKER, PLAIN_LEN, TRAILER,
};

type DesCbcEnc = cbc::Encryptor<des::Des>;
type DesCbcDec = cbc::Decryptor<des::Des>;

static EPOCH: LazyLock<Instant> = LazyLock::new(Instant::now);

/// Pin the timestamp epoch to now.
///
/// The epoch is fixed at first use either way; calling this early makes
/// frame timestamps count from process start rather than from the first
/// command.
pub fn init_epoch() {
    LazyLock::force(&EPOCH);
}

/// Milliseconds since the process epoch, wrapping mod 2^32.
pub fn timestamp_ms() -> u32 {
    EPOCH.elapsed().as_millis() as u32
}

/// Build an encrypted command frame stamped with the current timestamp.
pub fn build_frame(cmd: u8, args: &[u8]) -> [u8; FRAME_LEN] {
    build_frame_at(cmd, args, timestamp_ms())
}

/// Build an encrypted command frame with an explicit timestamp.
///
/// Deterministic given `(cmd, args, timestamp)`. Arguments are written
/// into the plaintext from offset 8 and silently truncated at the end of
/// the 500-byte buffer.
pub fn build_frame_at(cmd: u8, args: &[u8], timestamp: u32) -> [u8; FRAME_LEN] {
    let mut plain = [0u8; PLAIN_LEN];
    plain[0] = cmd;
    plain[2..4].copy_from_slice(&HEADER_MARKER);
    plain[4..8].copy_from_slice(&timestamp.to_le_bytes());
    let take = args.len().min(PLAIN_LEN - 8);
    plain[8..8 + take].copy_from_slice(&args[..take]);

    let encrypted =
        DesCbcEnc::new(CIPHER_KEY.into(), CIPHER_KEY.into()).encrypt_padded_vec_mut::<Pkcs7>(&plain);

    let mut frame = [0u8; FRAME_LEN];
    let take = encrypted.len().min(FRAME_LEN);
    frame[..take].copy_from_slice(&encrypted[..take]);
    frame[FRAME_LEN - 2..].copy_from_slice(&TRAILER);
    frame
}

/// Control frame followed by a raw payload, sent as one bulk transfer.
pub fn build_payload_packet(cmd: u8, args: &[u8], payload: &[u8]) -> Vec<u8> {
    let mut packet = Vec::with_capacity(FRAME_LEN + payload.len());
    packet.extend_from_slice(&build_frame(cmd, args));
    packet.extend_from_slice(payload);
    packet
}

/// A decrypted command frame, as the device firmware sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainFrame {
    pub cmd: u8,
    pub timestamp: u32,
    /// Argument region, plaintext bytes 8..500.
    pub args: Vec<u8>,
}

/// Decrypt and validate a control frame.
///
/// Returns `None` if the frame is short, the trailer is missing, the
/// padding is invalid, or the header marker does not match. This is the
/// inverse of [`build_frame_at`] and is what the mock transport uses to
/// route frames by command id.
pub fn open_frame(frame: &[u8]) -> Option<PlainFrame> {
    if frame.len() < FRAME_LEN || frame[FRAME_LEN - 2..FRAME_LEN] != TRAILER {
        return None;
    }
    let plain = DesCbcDec::new(CIPHER_KEY.into(), CIPHER_KEY.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&frame[..CIPHERTEXT_LEN])
        .ok()?;
    if plain.len() != PLAIN_LEN || plain[2..4] != HEADER_MARKER {
        return None;
    }
    Some(PlainFrame {
        cmd: plain[0],
        timestamp: u32::from_le_bytes(plain[4..8].try_into().ok()?),
        args: plain[8..].to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::ARGS_LEN;

    #[test]
    fn frame_is_512_bytes_with_trailer() {
        let frame = build_frame(10, &[]);
        assert_eq!(frame.len(), 512);
        assert_eq!(&frame[510..], &[0xA1, 0x1A]);
    }

    #[test]
    fn trailer_present_for_all_arg_sizes() {
        for len in [0usize, 1, 8, 100, ARGS_LEN] {
            let args = vec![0x55u8; len];
            let frame = build_frame(99, &args);
            assert_eq!(frame.len(), 512, "arg len {len}");
            assert_eq!(&frame[510..], &[0xA1, 0x1A], "arg len {len}");
        }
    }

    #[test]
    fn header_round_trips() {
        let frame = build_frame_at(14, &[42], 0x0102_0304);
        let plain = open_frame(&frame).expect("frame should decrypt");
        assert_eq!(plain.cmd, 14);
        assert_eq!(plain.timestamp, 0x0102_0304);
        assert_eq!(plain.args[0], 42);
    }

    #[test]
    fn args_round_trip_with_zero_fill() {
        let args: Vec<u8> = (0..=255).collect();
        let frame = build_frame_at(101, &args, 7);
        let plain = open_frame(&frame).expect("frame should decrypt");
        assert_eq!(&plain.args[..args.len()], &args[..]);
        // The rest of the argument region is zero.
        assert!(plain.args[args.len()..].iter().all(|&b| b == 0));
        assert_eq!(plain.args.len(), ARGS_LEN);
    }

    #[test]
    fn oversized_args_truncate_at_region_end() {
        let args = vec![0xABu8; ARGS_LEN + 100];
        let frame = build_frame_at(40, &args, 0);
        let plain = open_frame(&frame).expect("frame should decrypt");
        assert_eq!(plain.args.len(), ARGS_LEN);
        assert!(plain.args.iter().all(|&b| b == 0xAB));
    }

    #[test]
    fn timestamp_encodes_little_endian() {
        let frame = build_frame_at(10, &[], 0xDEAD_BEEF);
        let plain = open_frame(&frame).expect("frame should decrypt");
        assert_eq!(plain.timestamp, 0xDEAD_BEEF);
        // Marker survives encryption.
        let raw = DesCbcDec::new(CIPHER_KEY.into(), CIPHER_KEY.into())
            .decrypt_padded_vec_mut::<Pkcs7>(&frame[..CIPHERTEXT_LEN])
            .unwrap();
        assert_eq!(raw[0..8], [10, 0x00, 0x1A, 0x6D, 0xEF, 0xBE, 0xAD, 0xDE]);
    }

    #[test]
    fn timestamp_wrap_keeps_frame_valid() {
        let frame = build_frame_at(15, &[30], u32::MAX);
        let plain = open_frame(&frame).expect("frame should decrypt");
        assert_eq!(plain.timestamp, u32::MAX);
        assert_eq!(&frame[510..], &[0xA1, 0x1A]);
    }

    #[test]
    fn deterministic_for_fixed_inputs() {
        let a = build_frame_at(121, &[1, 2, 3], 1000);
        let b = build_frame_at(121, &[1, 2, 3], 1000);
        assert_eq!(a, b);
        // A different timestamp changes the ciphertext from the first block.
        let c = build_frame_at(121, &[1, 2, 3], 1001);
        assert_ne!(a, c);
    }

    #[test]
    fn open_frame_rejects_garbage() {
        assert!(open_frame(&[]).is_none());
        assert!(open_frame(&[0u8; 511]).is_none());
        // Valid length but no trailer.
        assert!(open_frame(&[0u8; 512]).is_none());
        // Trailer present but ciphertext is noise.
        let mut junk = [0x5Au8; 512];
        junk[510] = 0xA1;
        junk[511] = 0x1A;
        assert!(open_frame(&junk).is_none());
    }

    #[test]
    fn payload_packet_appends_raw_bytes() {
        let payload = [9u8; 300];
        let packet = build_payload_packet(102, &300u32.to_be_bytes(), &payload);
        assert_eq!(packet.len(), 512 + 300);
        assert_eq!(&packet[510..512], &[0xA1, 0x1A]);
        assert_eq!(&packet[512..], &payload[..]);
    }

    #[test]
    fn timestamps_are_monotonic() {
        let a = timestamp_ms();
        let b = timestamp_ms();
        assert!(b >= a);
    }
}
