//! # Frame codec
//!
//! Codec between command payloads and chip-ready frames.
//!
//! On air a payload byte travels as two 5-bit groups, one per nibble
//! (high nibble first). Group bit k carries nibble bit k and the fifth
//! bit is a stop bit, always one. The resulting bit stream is
//! Manchester expanded (each logical bit becomes the pair `b, !b`),
//! packed MSB first and framed between a fixed header and a one byte
//! footer selected by payload length parity.

use heapless::Vec;

/// Fixed frame length, matching the radio FIFO transfer size
pub const MAX_FRAME_LEN: usize = 60;

/// Lead-in preceding the encoded region
pub const HEADER: [u8; 5] = [0x00, 0xB3, 0x2A, 0xAB, 0x2A];

/// Footer for even payload lengths
pub const FOOTER_EVEN: u8 = 0xAC;
/// Footer for odd payload lengths
pub const FOOTER_ODD: u8 = 0xCA;

/// Filler after the footer up to the fixed frame length
pub const POSTAMBLE: u8 = 0xAA;

/// Longest payload whose expansion still fits the fixed frame length
pub const MAX_PAYLOAD_LEN: usize = 21;

fn get_bit(bytes: &[u8], idx: usize) -> bool {
    bytes[idx / 8] & (0x80 >> (idx % 8)) != 0
}

fn set_bit(bytes: &mut [u8], idx: usize, value: bool) {
    if value {
        bytes[idx / 8] |= 0x80 >> (idx % 8);
    }
}

/// Payload recovered from one received frame
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPayload {
    bytes: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl DecodedPayload {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// An intact payload sums to zero, trailing checksum byte included
    pub fn checksum_ok(&self) -> bool {
        self.bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)) == 0
    }
}

/// A chip-ready frame, padded to the fixed length
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Packet {
    bytes: [u8; MAX_FRAME_LEN],
}

impl Packet {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Extract the payload from raw received bytes.
///
/// The encoded region runs from the end of the header to the first
/// footer byte. Manchester expansion guarantees neither footer value
/// can occur inside it, so a plain byte scan is enough. Only the even
/// bit of each pair is kept and stop bits are dropped, nothing else is
/// validated here. Returns `None` when no frame is present.
pub fn decode(raw: &[u8]) -> Option<DecodedPayload> {
    let start = raw.windows(HEADER.len()).position(|w| w == HEADER)?;
    let enc_start = start + HEADER.len();
    let enc_len = raw[enc_start..]
        .iter()
        .position(|&b| b == FOOTER_EVEN || b == FOOTER_ODD)?;
    let enc = &raw[enc_start..enc_start + enc_len];

    let groups = enc.len() * 8 / 10;
    let mut bytes = Vec::new();
    let mut group = 0;
    while group + 2 <= groups {
        let byte = group_nibble(enc, group) << 4 | group_nibble(enc, group + 1);
        if bytes.push(byte).is_err() {
            break;
        }
        group += 2;
    }
    Some(DecodedPayload { bytes })
}

fn group_nibble(enc: &[u8], group: usize) -> u8 {
    let mut nibble = 0;
    for k in 0..4 {
        if get_bit(enc, (group * 5 + k) * 2) {
            nibble |= 1 << k;
        }
    }
    nibble
}

/// Expand a payload into a transmit-ready frame.
///
/// Returns `None` when the payload is too long for the fixed frame
/// length.
pub fn encode(cmd: &[u8]) -> Option<Packet> {
    if cmd.len() > MAX_PAYLOAD_LEN {
        return None;
    }
    // Two 5-bit groups per byte, rounded up to a multiple of four so
    // the Manchester expansion fills whole bytes
    let logical_bits = (cmd.len() * 10 + 3) & !3;
    let enc_len = logical_bits / 4;

    let mut bytes = [0u8; MAX_FRAME_LEN];
    bytes[..HEADER.len()].copy_from_slice(&HEADER);
    {
        let enc = &mut bytes[HEADER.len()..HEADER.len() + enc_len];
        for i in 0..logical_bits {
            let bit = logical_bit(cmd, i);
            set_bit(enc, 2 * i, bit);
            set_bit(enc, 2 * i + 1, !bit);
        }
    }
    bytes[HEADER.len() + enc_len] = if cmd.len() % 2 == 0 { FOOTER_EVEN } else { FOOTER_ODD };
    for b in bytes.iter_mut().skip(HEADER.len() + enc_len + 1) {
        *b = POSTAMBLE;
    }
    Some(Packet { bytes })
}

/// Logical bit at `idx` of the expanded stream: nibble bits at group
/// positions 0 to 3, stop bits at position 4 and in the padding
fn logical_bit(cmd: &[u8], idx: usize) -> bool {
    let group = idx / 5;
    let k = idx % 5;
    if k == 4 || group / 2 >= cmd.len() {
        return true;
    }
    let nibble = if group % 2 == 0 { cmd[group / 2] >> 4 } else { cmd[group / 2] & 0x0F };
    nibble & (1 << k) != 0
}
