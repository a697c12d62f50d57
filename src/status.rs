//! # Chip status and radio run states
//!
//! Every header byte written on the bus clocks back a one-byte chip
//! status: a not-ready flag, a coarse state and a FIFO fill count. The
//! fine-grained run state driving all mode transitions comes from the
//! MARCSTATE status register instead and is represented by [`MarcState`].

use crate::regs::MARCSTATE_MASK;

/// Status byte clocked out while a header byte is written
///  -    7 Chip not ready (crystal not stable yet)
///  -  6:4 Coarse state
///  -  3:0 Bytes available in the RX FIFO or free in the TX FIFO
#[derive(Default, Clone, Copy)]
pub struct ChipStatus(pub u8);

/// Coarse chip state reported in the status byte
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ChipState {
    Idle = 0,
    Rx = 1,
    Tx = 2,
    FstxOn = 3,
    Calibrate = 4,
    Settling = 5,
    RxFifoOverflow = 6,
    TxFifoUnderflow = 7,
}

impl From<u8> for ChipState {
    fn from(value: u8) -> Self {
        match value & 7 {
            0 => ChipState::Idle,
            1 => ChipState::Rx,
            2 => ChipState::Tx,
            3 => ChipState::FstxOn,
            4 => ChipState::Calibrate,
            5 => ChipState::Settling,
            6 => ChipState::RxFifoOverflow,
            _ => ChipState::TxFifoUnderflow,
        }
    }
}

impl ChipStatus {
    /// Return true once the crystal oscillator is stable
    pub fn is_ready(&self) -> bool {
        self.0 & 0x80 == 0
    }

    /// Return the coarse chip state
    pub fn state(&self) -> ChipState {
        ((self.0 >> 4) & 7).into()
    }

    /// Bytes available in the RX FIFO, or free in the TX FIFO, saturating
    /// at 15
    pub fn fifo_bytes(&self) -> u8 {
        self.0 & 0x0F
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for ChipStatus {
    fn format(&self, fmt: defmt::Formatter) {
        if !self.is_ready() {
            defmt::write!(fmt, "Chip not ready");
            return;
        }
        defmt::write!(fmt, "{} | fifo {}", self.state(), self.fifo_bytes());
    }
}

/// Radio control state machine state (MARCSTATE register, lower 5 bits)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MarcState {
    Sleep = 0x00,
    Idle = 0x01,
    Xoff = 0x02,
    VcoonMc = 0x03,
    RegonMc = 0x04,
    Mancal = 0x05,
    Vcoon = 0x06,
    Regon = 0x07,
    Startcal = 0x08,
    Bwboost = 0x09,
    FsLock = 0x0A,
    Ifadcon = 0x0B,
    Endcal = 0x0C,
    Rx = 0x0D,
    RxEnd = 0x0E,
    RxRst = 0x0F,
    TxrxSwitch = 0x10,
    RxFifoOverflow = 0x11,
    Fstxon = 0x12,
    Tx = 0x13,
    TxEnd = 0x14,
    RxtxSwitch = 0x15,
    TxFifoUnderflow = 0x16,
    Unknown = 0x1F, // Reserved values
}

impl From<u8> for MarcState {
    fn from(value: u8) -> Self {
        match value & MARCSTATE_MASK {
            0x00 => MarcState::Sleep,
            0x01 => MarcState::Idle,
            0x02 => MarcState::Xoff,
            0x03 => MarcState::VcoonMc,
            0x04 => MarcState::RegonMc,
            0x05 => MarcState::Mancal,
            0x06 => MarcState::Vcoon,
            0x07 => MarcState::Regon,
            0x08 => MarcState::Startcal,
            0x09 => MarcState::Bwboost,
            0x0A => MarcState::FsLock,
            0x0B => MarcState::Ifadcon,
            0x0C => MarcState::Endcal,
            0x0D => MarcState::Rx,
            0x0E => MarcState::RxEnd,
            0x0F => MarcState::RxRst,
            0x10 => MarcState::TxrxSwitch,
            0x11 => MarcState::RxFifoOverflow,
            0x12 => MarcState::Fstxon,
            0x13 => MarcState::Tx,
            0x14 => MarcState::TxEnd,
            0x15 => MarcState::RxtxSwitch,
            0x16 => MarcState::TxFifoUnderflow,
            _ => MarcState::Unknown,
        }
    }
}
