//! # Remote command payloads
//!
//! Command vocabulary of the RFT remote and payload composition
//! with the rolling counter and checksum.

use heapless::Vec;

use crate::frame::MAX_PAYLOAD_LEN;

/// First byte of every remote command payload
pub const COMMAND_INDICATOR: u8 = 0x16;

/// 24-bit address identifying a remote on the air
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RfAddress(pub [u8; 3]);

impl RfAddress {
    /// Build an address from the low 24 bits, big endian
    pub const fn from_u32(raw: u32) -> Self {
        Self([(raw >> 16) as u8, (raw >> 8) as u8, raw as u8])
    }

    pub fn as_bytes(&self) -> &[u8; 3] {
        &self.0
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for RfAddress {
    fn format(&self, fmt: defmt::Formatter) {
        defmt::write!(fmt, "{:02x}:{:02x}:{:02x}", self.0[0], self.0[1], self.0[2]);
    }
}

/// Commands understood by the fan units
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FanCommand {
    /// Lowest speed, also used as "off"
    Min,
    Low,
    /// Automatic mode on units with sensors
    Medium,
    High,
    Max,
    Timer1,
    Timer2,
    Timer3,
    /// Pair this remote with a fan
    Join,
    /// Second opcode inside the join payload
    Join2,
    /// Unpair this remote
    Leave,
}

impl FanCommand {
    /// Look up a command by its configuration name
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "min" => Some(Self::Min),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "max" => Some(Self::Max),
            "timer1" => Some(Self::Timer1),
            "timer2" => Some(Self::Timer2),
            "timer3" => Some(Self::Timer3),
            "join" => Some(Self::Join),
            "join_2" => Some(Self::Join2),
            "leave" => Some(Self::Leave),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Min => "min",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Max => "max",
            Self::Timer1 => "timer1",
            Self::Timer2 => "timer2",
            Self::Timer3 => "timer3",
            Self::Join => "join",
            Self::Join2 => "join_2",
            Self::Leave => "leave",
        }
    }

    /// Opcode bytes as they appear in the payload
    pub fn opcode(&self) -> &'static [u8] {
        match self {
            Self::Min => &[0x22, 0xF1, 0x03, 0x00, 0x01, 0x04],
            Self::Low => &[0x22, 0xF1, 0x03, 0x00, 0x02, 0x04],
            Self::Medium => &[0x22, 0xF1, 0x03, 0x00, 0x03, 0x04],
            Self::High => &[0x22, 0xF1, 0x03, 0x00, 0x04, 0x04],
            Self::Max => &[0x22, 0xF1, 0x03, 0x00, 0x05, 0x04],
            Self::Timer1 => &[0x22, 0xF3, 0x03, 0x00, 0x80, 0x01],
            Self::Timer2 => &[0x22, 0xF3, 0x03, 0x00, 0x80, 0x02],
            Self::Timer3 => &[0x22, 0xF3, 0x03, 0x00, 0x80, 0x03],
            Self::Join => &[0x1F, 0xC9, 0x0C, 0x00, 0x22, 0xF1],
            Self::Join2 => &[0x01, 0x10, 0xE0],
            Self::Leave => &[0x1F, 0xC9, 0x06, 0x00, 0x1F, 0xC9],
        }
    }
}

/// A composed command payload, checksum included
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFrame {
    bytes: Vec<u8, MAX_PAYLOAD_LEN>,
}

impl CommandFrame {
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }
}

/// Payload composer for one remote: a fixed address plus the rolling
/// counter receivers use to spot repeated frames
pub struct RftRemote {
    address: RfAddress,
    counter: u8,
}

impl RftRemote {
    pub fn new(address: RfAddress) -> Self {
        Self { address, counter: 0 }
    }

    pub fn address(&self) -> RfAddress {
        self.address
    }

    /// Build the payload for `cmd`, advancing the rolling counter.
    ///
    /// Join repeats the address around a second opcode so the fan can
    /// store the pairing, leave repeats it once.
    pub fn compose(&mut self, cmd: FanCommand) -> CommandFrame {
        let mut bytes: Vec<u8, MAX_PAYLOAD_LEN> = Vec::new();
        let _ = bytes.push(COMMAND_INDICATOR);
        let _ = bytes.extend_from_slice(self.address.as_bytes());
        let _ = bytes.push(self.counter);
        self.counter = self.counter.wrapping_add(1);
        let _ = bytes.extend_from_slice(cmd.opcode());
        match cmd {
            FanCommand::Join => {
                let _ = bytes.extend_from_slice(self.address.as_bytes());
                let _ = bytes.extend_from_slice(FanCommand::Join2.opcode());
                let _ = bytes.extend_from_slice(self.address.as_bytes());
            }
            FanCommand::Leave => {
                let _ = bytes.extend_from_slice(self.address.as_bytes());
            }
            _ => {}
        }
        let cs = checksum(&bytes);
        let _ = bytes.push(cs);
        CommandFrame { bytes }
    }
}

/// Two's complement of the byte sum, so a full payload sums to zero
pub fn checksum(bytes: &[u8]) -> u8 {
    0u8.wrapping_sub(bytes.iter().fold(0u8, |acc, &b| acc.wrapping_add(b)))
}
