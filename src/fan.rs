//! # Fan status frames
//!
//! Interpretation of received fan status payloads: shape checks,
//! sender filtering against the configured peer and speed banding.

use crate::command::RfAddress;
use crate::frame::DecodedPayload;

/// First byte of a fan status payload
pub const STATUS_INDICATOR: u8 = 0x14;

/// Fixed marker at offset 4 of every status payload
pub const STATUS_MARKER: [u8; 5] = [0x31, 0xD9, 0x03, 0x00, 0x00];

/// Status payload length, checksum included
const STATUS_FRAME_LEN: usize = 11;

/// Outcome of matching a status frame against the configured peer
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusVerdict {
    /// Status sent by the configured fan
    Accepted { sender: RfAddress, speed: u8 },
    /// Well-formed status from some other unit
    ForeignSender { sender: RfAddress, speed: u8 },
    /// No peer configured, so nothing is ever accepted
    Unfiltered { sender: RfAddress, speed: u8 },
}

impl StatusVerdict {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }

    pub fn sender(&self) -> RfAddress {
        match self {
            Self::Accepted { sender, .. }
            | Self::ForeignSender { sender, .. }
            | Self::Unfiltered { sender, .. } => *sender,
        }
    }

    pub fn speed(&self) -> u8 {
        match self {
            Self::Accepted { speed, .. }
            | Self::ForeignSender { speed, .. }
            | Self::Unfiltered { speed, .. } => *speed,
        }
    }

    /// Banded speed value
    pub fn fan_speed(&self) -> FanSpeed {
        FanSpeed::from_raw(self.speed())
    }
}

/// Check a decoded payload for the fixed status shape and extract the
/// sender address and speed value.
///
/// Returns `None` unless the checksum holds and the shape matches. A
/// matching frame is accepted only when a peer filter is configured and
/// the sender is that peer. Without a filter the frame is reported but
/// never accepted, so an unconfigured host cannot mirror a random fan.
pub fn interpret_status(payload: &DecodedPayload, peer: Option<RfAddress>) -> Option<StatusVerdict> {
    if !payload.checksum_ok() || payload.len() != STATUS_FRAME_LEN {
        return None;
    }
    let bytes = payload.bytes();
    if bytes[0] != STATUS_INDICATOR || bytes[4..9] != STATUS_MARKER {
        return None;
    }
    let sender = RfAddress([bytes[1], bytes[2], bytes[3]]);
    let speed = bytes[9];
    let verdict = match peer {
        Some(p) if p == sender => StatusVerdict::Accepted { sender, speed },
        Some(_) => StatusVerdict::ForeignSender { sender, speed },
        None => StatusVerdict::Unfiltered { sender, speed },
    };
    Some(verdict)
}

/// Speed bands encoded in the status value
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FanSpeed {
    Off,
    Low,
    Medium,
    High,
}

impl FanSpeed {
    /// Band a raw status value
    pub fn from_raw(raw: u8) -> Self {
        if raw == 0 {
            Self::Off
        } else if raw < 0x40 {
            Self::Low
        } else if raw < 0x80 {
            Self::Medium
        } else {
            Self::High
        }
    }
}
