//! # Register map
//!
//! The chip exposes a single 6-bit address space whose meaning depends on
//! the two access-flag bits clocked with the address:
//! - 0x00-0x2E are the configuration registers, readable and writable
//! - 0x30-0x3D are command strobes when written, status registers when
//!   read with the burst flag set
//! - 0x3E is the PA power table (8 entries behind one address)
//! - 0x3F is the RX FIFO when read and the TX FIFO when written
//!
//! The three roles are kept as separate enums so a strobe can never be
//! confused with a status register despite sharing its address.

/// Burst access flag
pub const ACCESS_BURST: u8 = 0x40;
/// Read access flag
pub const ACCESS_READ: u8 = 0x80;
/// Read access flag combined with burst, also selects a status register
/// over the strobe sharing its address
pub const ACCESS_READ_BURST: u8 = 0xC0;

/// Last configuration register address
pub const CONFIG_LAST: u8 = 0x2E;
/// PA power table address
pub const PATABLE_ADDR: u8 = 0x3E;
/// Number of entries in the PA power table
pub const PATABLE_LEN: usize = 8;
/// FIFO address (RX when read, TX when written)
pub const FIFO_ADDR: u8 = 0x3F;

/// Lower 7 bits of RXBYTES/TXBYTES carry the byte count
pub const FIFO_BYTES_MASK: u8 = 0x7F;
/// Lower 5 bits of MARCSTATE carry the run state
pub const MARCSTATE_MASK: u8 = 0x1F;

/// Configuration registers (0x00-0x2E)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigReg {
    Iocfg2 = 0x00,
    Iocfg1 = 0x01,
    Iocfg0 = 0x02,
    Fifothr = 0x03,
    Sync1 = 0x04,
    Sync0 = 0x05,
    Pktlen = 0x06,
    Pktctrl1 = 0x07,
    Pktctrl0 = 0x08,
    Addr = 0x09,
    Channr = 0x0A,
    Fsctrl1 = 0x0B,
    Fsctrl0 = 0x0C,
    Freq2 = 0x0D,
    Freq1 = 0x0E,
    Freq0 = 0x0F,
    Mdmcfg4 = 0x10,
    Mdmcfg3 = 0x11,
    Mdmcfg2 = 0x12,
    Mdmcfg1 = 0x13,
    Mdmcfg0 = 0x14,
    Deviatn = 0x15,
    Mcsm2 = 0x16,
    Mcsm1 = 0x17,
    Mcsm0 = 0x18,
    Foccfg = 0x19,
    Bscfg = 0x1A,
    Agcctrl2 = 0x1B,
    Agcctrl1 = 0x1C,
    Agcctrl0 = 0x1D,
    Worevt1 = 0x1E,
    Worevt0 = 0x1F,
    Worctrl = 0x20,
    Frend1 = 0x21,
    Frend0 = 0x22,
    Fscal3 = 0x23,
    Fscal2 = 0x24,
    Fscal1 = 0x25,
    Fscal0 = 0x26,
    Rcctrl1 = 0x27,
    Rcctrl0 = 0x28,
    Fstest = 0x29,
    Ptest = 0x2A,
    Agctest = 0x2B,
    Test2 = 0x2C,
    Test1 = 0x2D,
    Test0 = 0x2E,
}

impl ConfigReg {
    /// Raw register address
    pub fn addr(self) -> u8 {
        self as u8
    }
}

/// Read-only status registers (0x30-0x3D, read with the burst flag set)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StatusReg {
    Partnum = 0x30,
    Version = 0x31,
    Freqest = 0x32,
    Lqi = 0x33,
    Rssi = 0x34,
    Marcstate = 0x35,
    Wortime1 = 0x36,
    Wortime0 = 0x37,
    Pktstatus = 0x38,
    VcoVcDac = 0x39,
    Txbytes = 0x3A,
    Rxbytes = 0x3B,
    Rcctrl1Status = 0x3C,
    Rcctrl0Status = 0x3D,
}

impl StatusReg {
    /// Raw register address
    pub fn addr(self) -> u8 {
        self as u8
    }

    /// Registers that can glitch when read while the radio core is
    /// running and need two agreeing reads to be trusted
    pub fn unstable_when_active(self) -> bool {
        matches!(
            self,
            StatusReg::Freqest
                | StatusReg::Marcstate
                | StatusReg::Wortime1
                | StatusReg::Wortime0
                | StatusReg::Txbytes
                | StatusReg::Rxbytes
        )
    }
}

/// Command strobes (0x30-0x3D, written as a bare header byte)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Strobe {
    /// Reset chip
    Sres = 0x30,
    /// Enable and calibrate the frequency synthesizer
    Sfstxon = 0x31,
    /// Turn off the crystal oscillator
    Sxoff = 0x32,
    /// Calibrate the frequency synthesizer and turn it off
    Scal = 0x33,
    /// Enable RX
    Srx = 0x34,
    /// Enable TX
    Stx = 0x35,
    /// Exit RX/TX, go to idle
    Sidle = 0x36,
    /// Start automatic wake-on-radio polling
    Swor = 0x38,
    /// Enter power-down once the select line is released
    Spwd = 0x39,
    /// Flush the RX FIFO
    Sfrx = 0x3A,
    /// Flush the TX FIFO
    Sftx = 0x3B,
    /// Reset the wake-on-radio timer
    Sworrst = 0x3C,
    /// No operation, reads back the status byte
    Snop = 0x3D,
}

impl Strobe {
    /// Raw strobe address
    pub fn addr(self) -> u8 {
        self as u8
    }
}
