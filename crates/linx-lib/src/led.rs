//! LED ring control — 60 RGB LEDs behind a WCH HID endpoint.
//!
//! The ring takes its colour data as three 64-byte packets, one per group
//! of 20 LEDs. Colour packets are fire-and-forget; only the version query
//! reads a reply. The LED controller is a separate USB device from the
//! LCD and is never serialised through the LCD control channel.

use std::fmt;

use rusb::{Context, DeviceHandle, UsbContext};

use crate::protocol::{
    LED_CMD_SET_COLOR, LED_CMD_VERSION, LED_EP_IN, LED_EP_OUT, LED_INTERFACE, LED_PACKET_LEN,
    LED_PID, LED_READ_TIMEOUT, LED_VID, LED_WRITE_TIMEOUT,
};
use crate::transport::{Result, TransportError};

/// Number of LEDs on the ring.
pub const RING_LEDS: usize = 60;

/// LEDs per colour-data packet.
pub const GROUP_LEDS: usize = 20;

/// Colour-data packets per full update.
pub const LED_GROUPS: usize = 3;

/// One LED colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const OFF: Rgb = Rgb::new(0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Rgb { r, g, b }
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.r, self.g, self.b)
    }
}

/// Parse a colour string into an [`Rgb`].
///
/// Accepts:
/// - Named: `"red"`, `"green"`, `"blue"`, `"white"`, `"cyan"`, `"magenta"`,
///   `"yellow"`, `"charcoal"`, `"off"`/`"black"`
/// - Triplet: `"255,128,0"`
/// - Hex: `"#FF8800"`, `"FF8800"`
pub fn parse_rgb(s: &str) -> crate::error::Result<Rgb> {
    let s = s.trim();

    match s.to_lowercase().as_str() {
        "red" => return Ok(Rgb::new(255, 0, 0)),
        "green" => return Ok(Rgb::new(0, 255, 0)),
        "blue" => return Ok(Rgb::new(0, 0, 255)),
        "white" => return Ok(Rgb::new(255, 255, 255)),
        "cyan" => return Ok(Rgb::new(0, 255, 255)),
        "magenta" => return Ok(Rgb::new(255, 0, 255)),
        "yellow" => return Ok(Rgb::new(255, 255, 0)),
        "charcoal" => return Ok(Rgb::new(0x8A, 0x92, 0xA4)),
        "off" | "black" => return Ok(Rgb::OFF),
        _ => {}
    }

    if s.contains(',') {
        let parts: Vec<_> = s.split(',').map(|p| p.trim().parse::<u8>()).collect();
        if let [Ok(r), Ok(g), Ok(b)] = parts[..] {
            return Ok(Rgb::new(r, g, b));
        }
        return Err(crate::LinxError::Color(format!(
            "Invalid RGB triplet: {s} (expected R,G,B e.g. 255,128,0)"
        )));
    }

    let hex = s.strip_prefix('#').unwrap_or(s);
    if hex.len() == 6
        && let Ok(val) = u32::from_str_radix(hex, 16)
    {
        return Ok(Rgb::new((val >> 16) as u8, (val >> 8) as u8, val as u8));
    }
    Err(crate::LinxError::Color(format!(
        "Invalid color: {s} (use a name, R,G,B or #RRGGBB)"
    )))
}

// ── Trait ──

/// The 64-byte packet seam between the ring logic and the HID endpoint.
pub trait LedLink {
    fn write(&mut self, packet: &[u8; LED_PACKET_LEN]) -> Result<()>;
    /// Optional reply read; `None` on timeout or error.
    fn read(&mut self) -> Option<[u8; LED_PACKET_LEN]>;
}

// ── USB implementation ──

/// Interrupt transport over the LED ring HID.
pub struct UsbLed {
    handle: DeviceHandle<Context>,
}

impl UsbLed {
    /// Find and claim the LED ring device.
    pub fn connect() -> Result<Self> {
        let context =
            Context::new().map_err(|e| TransportError::Io(format!("libusb context: {e}")))?;
        let mut handle = context
            .open_device_with_vid_pid(LED_VID, LED_PID)
            .ok_or(TransportError::DeviceAbsent)?;
        if handle.kernel_driver_active(LED_INTERFACE).unwrap_or(false) {
            handle
                .detach_kernel_driver(LED_INTERFACE)
                .map_err(|e| TransportError::Io(format!("detach kernel driver: {e}")))?;
        }
        let _ = handle.set_active_configuration(1);
        handle
            .claim_interface(LED_INTERFACE)
            .map_err(|e| TransportError::Io(format!("claim LED interface 0: {e}")))?;
        Ok(UsbLed { handle })
    }
}

impl LedLink for UsbLed {
    fn write(&mut self, packet: &[u8; LED_PACKET_LEN]) -> Result<()> {
        self.handle
            .write_interrupt(LED_EP_OUT, packet, LED_WRITE_TIMEOUT)
            .map_err(|e| TransportError::Io(format!("LED write: {e}")))?;
        Ok(())
    }

    fn read(&mut self) -> Option<[u8; LED_PACKET_LEN]> {
        let mut buf = [0u8; LED_PACKET_LEN];
        self.handle
            .read_interrupt(LED_EP_IN, &mut buf, LED_READ_TIMEOUT)
            .ok()
            .map(|_| buf)
    }
}

impl Drop for UsbLed {
    fn drop(&mut self) {
        let _ = self.handle.release_interface(LED_INTERFACE);
    }
}

// ── Ring controller ──

/// Build one colour-data packet for group `g` (0..3).
///
/// Layout: byte 0 = `17`, byte 1 = `g*20`, bytes 2..=3 = 0, then 20
/// consecutive `(r, g, b)` triples at offsets 4..=63. Missing LEDs stay
/// zero (off).
pub fn group_packet(group: usize, leds: &[Rgb]) -> [u8; LED_PACKET_LEN] {
    let mut packet = [0u8; LED_PACKET_LEN];
    packet[0] = LED_CMD_SET_COLOR;
    packet[1] = (group * GROUP_LEDS) as u8;
    for i in 0..GROUP_LEDS {
        if let Some(led) = leds.get(group * GROUP_LEDS + i) {
            let at = 4 + i * 3;
            packet[at] = led.r;
            packet[at + 1] = led.g;
            packet[at + 2] = led.b;
        }
    }
    packet
}

/// The 60-LED RGB ring.
pub struct LedRing<L: LedLink> {
    link: L,
}

impl<L: LedLink> LedRing<L> {
    pub fn new(link: L) -> Self {
        LedRing { link }
    }

    pub fn link(&self) -> &L {
        &self.link
    }

    /// Set LED colours. Groups are sent in order 0, 1, 2 for
    /// reproducibility; the device does not care about ordering.
    pub fn set(&mut self, leds: &[Rgb]) -> Result<()> {
        for group in 0..LED_GROUPS {
            self.link.write(&group_packet(group, leds))?;
        }
        Ok(())
    }

    /// Set every LED to one colour.
    pub fn set_all(&mut self, color: Rgb) -> Result<()> {
        self.set(&[color; RING_LEDS])
    }

    /// Turn every LED off.
    pub fn off(&mut self) -> Result<()> {
        self.set_all(Rgb::OFF)
    }

    /// LED controller firmware version, formatted `"major_minor"`.
    pub fn version(&mut self) -> Result<Option<String>> {
        let mut packet = [0u8; LED_PACKET_LEN];
        packet[0] = LED_CMD_VERSION;
        self.link.write(&packet)?;
        Ok(self
            .link
            .read()
            .filter(|r| r[0] == LED_CMD_VERSION && r[1] > 0)
            .map(|r| format!("{}_{}", r[1], r[2])))
    }
}

// ── Mock link for testing ──

/// In-memory mock link for unit and integration tests.
///
/// Always compiled (zero runtime cost), hidden from public docs.
#[doc(hidden)]
pub mod mock {
    use super::{LedLink, LED_PACKET_LEN, Result, TransportError};

    #[derive(Default)]
    pub struct MockLed {
        pub packets: Vec<[u8; LED_PACKET_LEN]>,
        pub replies: Vec<[u8; LED_PACKET_LEN]>,
        /// Number of upcoming writes to fail with an I/O error.
        pub fail_writes: u32,
    }

    impl MockLed {
        pub fn new() -> Self {
            Self::default()
        }
    }

    impl LedLink for MockLed {
        fn write(&mut self, packet: &[u8; LED_PACKET_LEN]) -> Result<()> {
            if self.fail_writes > 0 {
                self.fail_writes -= 1;
                return Err(TransportError::Io("mock: injected LED failure".into()));
            }
            self.packets.push(*packet);
            Ok(())
        }

        fn read(&mut self) -> Option<[u8; LED_PACKET_LEN]> {
            if self.replies.is_empty() {
                None
            } else {
                Some(self.replies.remove(0))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockLed;
    use super::*;

    fn ring() -> LedRing<MockLed> {
        LedRing::new(MockLed::new())
    }

    /// Concatenated colour regions (bytes 4..64 of each packet).
    fn colour_region(packets: &[[u8; 64]]) -> Vec<u8> {
        packets.iter().flat_map(|p| p[4..].to_vec()).collect()
    }

    // ── packet layout ──

    #[test]
    fn group_packet_header_and_offsets() {
        let leds = [Rgb::new(1, 2, 3); RING_LEDS];
        for group in 0..LED_GROUPS {
            let packet = group_packet(group, &leds);
            assert_eq!(packet[0], 17);
            assert_eq!(packet[1], (group * 20) as u8);
            assert_eq!(packet[2], 0);
            assert_eq!(packet[3], 0);
            assert_eq!(&packet[4..7], &[1, 2, 3]);
            assert_eq!(&packet[61..64], &[1, 2, 3]);
        }
    }

    #[test]
    fn group_packet_fills_missing_leds_with_zero() {
        // Only 5 LEDs provided: group 0 has 5 colours, groups 1-2 are dark.
        let leds = [Rgb::new(9, 9, 9); 5];
        let g0 = group_packet(0, &leds);
        assert_eq!(&g0[4..7], &[9, 9, 9]);
        assert!(g0[4 + 5 * 3..].iter().all(|&b| b == 0));
        let g1 = group_packet(1, &leds);
        assert!(g1[4..].iter().all(|&b| b == 0));
    }

    // ── ring operations ──

    #[test]
    fn set_all_emits_sixty_identical_triples() {
        let mut ring = ring();
        ring.set_all(Rgb::new(200, 100, 50)).unwrap();
        let packets = &ring.link().packets;
        assert_eq!(packets.len(), 3);
        assert_eq!(packets[0][1], 0);
        assert_eq!(packets[1][1], 20);
        assert_eq!(packets[2][1], 40);
        let colours = colour_region(packets);
        assert_eq!(colours.len(), 180);
        for triple in colours.chunks(3) {
            assert_eq!(triple, &[200, 100, 50]);
        }
    }

    #[test]
    fn off_zeroes_every_colour_region() {
        let mut ring = ring();
        ring.off().unwrap();
        let colours = colour_region(&ring.link().packets);
        assert!(colours.iter().all(|&b| b == 0));
    }

    #[test]
    fn set_is_idempotent() {
        let mut ring = ring();
        let leds = [Rgb::new(10, 20, 30); RING_LEDS];
        ring.set(&leds).unwrap();
        ring.set(&leds).unwrap();
        let packets = &ring.link().packets;
        assert_eq!(packets.len(), 6);
        assert_eq!(&packets[..3], &packets[3..]);
    }

    #[test]
    fn set_preserves_per_led_order() {
        let mut ring = ring();
        let leds: Vec<Rgb> = (0..RING_LEDS as u8).map(|i| Rgb::new(i, 0, 0)).collect();
        ring.set(&leds).unwrap();
        let colours = colour_region(&ring.link().packets);
        for (i, triple) in colours.chunks(3).enumerate() {
            assert_eq!(triple[0] as usize, i);
        }
    }

    #[test]
    fn write_failure_propagates() {
        let mut ring = LedRing::new(MockLed {
            fail_writes: 1,
            ..MockLed::new()
        });
        assert!(ring.off().is_err());
    }

    // ── version ──

    #[test]
    fn version_formats_major_minor() {
        let mut reply = [0u8; 64];
        reply[0] = 16;
        reply[1] = 1;
        reply[2] = 7;
        let mut ring = LedRing::new(MockLed {
            replies: vec![reply],
            ..MockLed::new()
        });
        assert_eq!(ring.version().unwrap().as_deref(), Some("1_7"));
    }

    #[test]
    fn version_none_without_reply() {
        let mut ring = ring();
        assert!(ring.version().unwrap().is_none());
    }

    // ── colour parsing ──

    #[test]
    fn parse_named_colors() {
        assert_eq!(parse_rgb("red").unwrap(), Rgb::new(255, 0, 0));
        assert_eq!(parse_rgb("OFF").unwrap(), Rgb::OFF);
        assert_eq!(parse_rgb("charcoal").unwrap(), Rgb::new(0x8A, 0x92, 0xA4));
    }

    #[test]
    fn parse_triplet() {
        assert_eq!(parse_rgb("255, 128, 0").unwrap(), Rgb::new(255, 128, 0));
        assert!(parse_rgb("300,0,0").is_err());
        assert!(parse_rgb("1,2").is_err());
    }

    #[test]
    fn parse_hex() {
        assert_eq!(parse_rgb("#FF8800").unwrap(), Rgb::new(255, 136, 0));
        assert_eq!(parse_rgb("ff8800").unwrap(), Rgb::new(255, 136, 0));
        assert!(parse_rgb("#FF88").is_err());
        assert!(parse_rgb("nonsense").is_err());
    }
}
