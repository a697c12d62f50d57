#![cfg_attr(not(test), no_std)]

pub mod regs;
pub mod status;
pub mod radio;
pub mod frame;
pub mod command;
pub mod fan;
pub mod itho;

#[cfg(test)]
mod testutil;

use core::marker::PhantomData;

use embassy_time::{with_timeout, Duration, Instant};
use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal_async::{digital::Wait, spi::SpiBus};

use regs::{
    ConfigReg, StatusReg, Strobe, ACCESS_BURST, ACCESS_READ, ACCESS_READ_BURST, CONFIG_LAST,
    FIFO_ADDR, PATABLE_ADDR, PATABLE_LEN,
};
use status::ChipStatus;

// Re-export the protocol surface used by host components
pub use command::{FanCommand, RfAddress};
pub use fan::{FanSpeed, StatusVerdict};
pub use itho::{FrameEvents, IthoRadio, SendSession};

trait Sealed {}
#[allow(private_bounds)]
/// Sealed trait to implement two flavors of the driver where
/// the ready gate (SO line) can be either a simple input or one implementing the Wait trait
pub trait ReadyPin: Sealed {
    type Pin: InputPin;

    #[allow(async_fn_in_trait)]
    async fn wait_ready(pin: &mut Self::Pin, timeout: Duration) -> Result<(), Cc1101Error>;
}
pub struct ReadyBlocking<I> {
    _marker: PhantomData<I>,
}
pub struct ReadyAsync<I> {
    _marker: PhantomData<I>,
}
impl<I> Sealed for ReadyBlocking<I> {}
impl<I> Sealed for ReadyAsync<I> {}

impl<I: InputPin> ReadyPin for ReadyBlocking<I> {
    type Pin = I;

    /// Poll the gate until it goes low
    async fn wait_ready(pin: &mut I, timeout: Duration) -> Result<(), Cc1101Error> {
        let start = Instant::now();
        while pin.is_high().map_err(|_| Cc1101Error::Pin)? {
            if start.elapsed() >= timeout {
                return Err(Cc1101Error::ReadyTimeout);
            }
        }
        Ok(())
    }
}

impl<I: InputPin + Wait> ReadyPin for ReadyAsync<I> {
    type Pin = I;

    /// Wait for an edge on the gate to go low (if not already)
    async fn wait_ready(pin: &mut I, timeout: Duration) -> Result<(), Cc1101Error> {
        if pin.is_high().map_err(|_| Cc1101Error::Pin)? {
            match with_timeout(timeout, pin.wait_for_low()).await {
                Ok(_) => Ok(()),
                Err(_) => Err(Cc1101Error::ReadyTimeout),
            }
        } else {
            Ok(())
        }
    }
}

/// Bound on the ready gate after asserting select. The gate goes low
/// within microseconds unless the crystal is still starting up.
const READY_TIMEOUT: Duration = Duration::from_millis(100);

/// CC1101 Device
pub struct Cc1101<O,SPI, M: ReadyPin> {
    /// SPI device
    spi: SPI,
    /// Chip select output pin (active low)
    nss: O,
    /// Ready gate: the SO line, which goes low once the crystal is
    /// stable after select is asserted
    ready: M::Pin,
    /// Status byte clocked back on the last header byte
    status: ChipStatus,
}

/// Error using the CC1101
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Cc1101Error {
    /// Unable to set/get a pin level
    Pin,
    /// Unable to use SPI
    Spi,
    /// Timeout while waiting for the ready gate
    ReadyTimeout,
    /// Identification registers read back 0x00/0xFF
    ChipNotFound,
    /// Burst access to an address outside the register file, PA table and FIFO
    InvalidRegister,
}

// Create driver with ready gate not implementing wait
impl<I,O,SPI> Cc1101<O,SPI, ReadyBlocking<I>> where
    I: InputPin, O: OutputPin, SPI: SpiBus<u8>
{
    /// Create a CC1101 device with blocking access on the ready gate
    pub fn new_blocking(spi: SPI, nss: O, ready: I) -> Self {
        Self { spi, nss, ready, status: ChipStatus::default() }
    }
}

// Create driver with ready gate implementing wait
impl<I,O,SPI> Cc1101<O,SPI, ReadyAsync<I>> where
    I: InputPin + Wait, O: OutputPin, SPI: SpiBus<u8>
{
    /// Create a CC1101 device with async ready gate
    pub fn new(spi: SPI, nss: O, ready: I) -> Self {
        Self { spi, nss, ready, status: ChipStatus::default() }
    }
}

impl<O,SPI, M> Cc1101<O,SPI, M> where
    O: OutputPin, SPI: SpiBus<u8>, M: ReadyPin
{
    /// Check if the ready gate is high (debug)
    pub fn is_busy(&self) -> bool {
        self.ready.is_high().unwrap_or(false)
    }

    /// Status byte captured on the last transaction
    pub fn status(&self) -> ChipStatus {
        self.status
    }

    /// Assert the select line and wait for the ready gate before the
    /// first byte exchange
    async fn select(&mut self) -> Result<(), Cc1101Error> {
        self.nss.set_low().map_err(|_| Cc1101Error::Pin)?;
        M::wait_ready(&mut self.ready, READY_TIMEOUT).await
    }

    /// Release the select line
    fn deselect(&mut self) -> Result<(), Cc1101Error> {
        self.nss.set_high().map_err(|_| Cc1101Error::Pin)
    }

    /// One select-framed exchange, capturing the status byte clocked
    /// back on the header
    async fn transfer(&mut self, rsp: &mut [u8], req: &[u8]) -> Result<(), Cc1101Error> {
        self.select().await?;
        self.spi
            .transfer(rsp, req).await
            .map_err(|_| Cc1101Error::Spi)?;
        self.deselect()?;
        if let Some(&byte) = rsp.first() {
            self.status = ChipStatus(byte);
        }
        Ok(())
    }

    /// Write a configuration register
    pub async fn write_config(&mut self, reg: ConfigReg, value: u8) -> Result<(), Cc1101Error> {
        let req = [reg.addr(), value];
        let mut rsp = [0u8; 2];
        self.transfer(&mut rsp, &req).await
    }

    /// Read a configuration register
    pub async fn read_config(&mut self, reg: ConfigReg) -> Result<u8, Cc1101Error> {
        let req = [reg.addr() | ACCESS_READ, 0];
        let mut rsp = [0u8; 2];
        self.transfer(&mut rsp, &req).await?;
        Ok(rsp[1])
    }

    /// Read a status register.
    ///
    /// The registers that update while the radio core is running can
    /// glitch mid-read, so those are read until two consecutive reads
    /// agree. Everything else is a single read.
    pub async fn read_status(&mut self, reg: StatusReg) -> Result<u8, Cc1101Error> {
        let mut value = self.read_status_once(reg).await?;
        if reg.unstable_when_active() {
            loop {
                let again = self.read_status_once(reg).await?;
                if again == value {
                    break;
                }
                value = again;
            }
        }
        Ok(value)
    }

    async fn read_status_once(&mut self, reg: StatusReg) -> Result<u8, Cc1101Error> {
        let req = [reg.addr() | ACCESS_READ_BURST, 0];
        let mut rsp = [0u8; 2];
        self.transfer(&mut rsp, &req).await?;
        Ok(rsp[1])
    }

    /// Issue a command strobe and return the status byte
    pub async fn strobe(&mut self, strobe: Strobe) -> Result<ChipStatus, Cc1101Error> {
        let req = [strobe.addr()];
        let mut rsp = [0u8; 1];
        self.transfer(&mut rsp, &req).await?;
        Ok(self.status)
    }

    /// Burst-write `data` starting at a raw register address.
    ///
    /// A configuration write running past the register file or a PA table
    /// write longer than the table logs a warning but is still clocked
    /// out in full. Any other address is refused without a transfer.
    pub async fn burst_write(&mut self, addr: u8, data: &[u8]) -> Result<(), Cc1101Error> {
        match addr {
            0..=CONFIG_LAST => {
                if addr as usize + data.len() > CONFIG_LAST as usize + 1 {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Burst write length {} invalid for register {:02x}", data.len(), addr);
                }
            }
            PATABLE_ADDR => {
                if data.len() > PATABLE_LEN {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Burst write length {} invalid for PA table", data.len());
                }
            }
            FIFO_ADDR => {}
            _ => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Invalid burst write register {:02x}", addr);
                return Err(Cc1101Error::InvalidRegister);
            }
        }
        self.select().await?;
        let mut hdr = [0u8; 1];
        self.spi
            .transfer(&mut hdr, &[addr | ACCESS_BURST]).await
            .map_err(|_| Cc1101Error::Spi)?;
        self.status = ChipStatus(hdr[0]);
        self.spi
            .write(data).await
            .map_err(|_| Cc1101Error::Spi)?;
        self.deselect()
    }

    /// Burst-read into `buf` starting at a raw register address.
    ///
    /// Unlike the write path this one clamps: configuration reads stop at
    /// the end of the register file and PA table reads cap at 8 bytes.
    /// FIFO reads take the whole buffer. Any other address is refused.
    /// Returns the number of bytes read.
    pub async fn burst_read(&mut self, addr: u8, buf: &mut [u8]) -> Result<usize, Cc1101Error> {
        let len = match addr {
            0..=CONFIG_LAST => {
                let max = CONFIG_LAST as usize + 1 - addr as usize;
                if buf.len() > max {
                    #[cfg(feature = "defmt")]
                    defmt::warn!("Burst read length {} invalid for register {:02x}, reading {} bytes", buf.len(), addr, max);
                    max
                } else {
                    buf.len()
                }
            }
            PATABLE_ADDR => buf.len().min(PATABLE_LEN),
            FIFO_ADDR => buf.len(),
            _ => {
                #[cfg(feature = "defmt")]
                defmt::warn!("Invalid burst read register {:02x}", addr);
                return Err(Cc1101Error::InvalidRegister);
            }
        };
        self.select().await?;
        let mut hdr = [0u8; 1];
        self.spi
            .transfer(&mut hdr, &[addr | ACCESS_READ_BURST]).await
            .map_err(|_| Cc1101Error::Spi)?;
        self.status = ChipStatus(hdr[0]);
        if len > 0 {
            self.spi
                .read(&mut buf[..len]).await
                .map_err(|_| Cc1101Error::Spi)?;
        }
        self.deselect()?;
        Ok(len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{FakeChip, StuckReady};
    use embassy_futures::block_on;

    #[test]
    fn config_register_roundtrip() {
        let chip = FakeChip::new();
        let mut radio = chip.driver();
        block_on(radio.write_config(ConfigReg::Freq2, 0x21)).unwrap();
        assert_eq!(block_on(radio.read_config(ConfigReg::Freq2)).unwrap(), 0x21);
    }

    #[test]
    fn config_burst_write_past_register_file_still_clocks_out() {
        let chip = FakeChip::new();
        let mut radio = chip.driver();
        block_on(radio.burst_write(0x2D, &[0x11, 0x22, 0x33])).unwrap();
        let model = chip.model();
        assert_eq!(model.regs[0x2D], 0x11);
        assert_eq!(model.regs[0x2E], 0x22);
    }

    #[test]
    fn patable_burst_write_longer_than_table_wraps() {
        let chip = FakeChip::new();
        let mut radio = chip.driver();
        let data: Vec<u8> = (1..=10).collect();
        block_on(radio.burst_write(PATABLE_ADDR, &data)).unwrap();
        // Entries 9 and 10 wrap back onto the start of the table
        assert_eq!(chip.model().patable, [9, 10, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn config_burst_read_clamps_at_register_file_end() {
        let chip = FakeChip::new();
        chip.model().regs[0x2C] = 0xAA;
        chip.model().regs[0x2E] = 0xBB;
        let mut radio = chip.driver();
        let mut buf = [0u8; 10];
        let n = block_on(radio.burst_read(0x2C, &mut buf)).unwrap();
        assert_eq!(n, 3);
        assert_eq!(buf[0], 0xAA);
        assert_eq!(buf[2], 0xBB);
    }

    #[test]
    fn patable_burst_read_caps_at_table_length() {
        let chip = FakeChip::new();
        let mut radio = chip.driver();
        let mut buf = [0u8; 20];
        let n = block_on(radio.burst_read(PATABLE_ADDR, &mut buf)).unwrap();
        assert_eq!(n, PATABLE_LEN);
    }

    #[test]
    fn burst_access_outside_known_addresses_is_refused() {
        let chip = FakeChip::new();
        let mut radio = chip.driver();
        let mut buf = [0u8; 4];
        assert!(matches!(
            block_on(radio.burst_read(0x31, &mut buf)),
            Err(Cc1101Error::InvalidRegister)
        ));
        assert!(matches!(
            block_on(radio.burst_write(0x30, &[0x00])),
            Err(Cc1101Error::InvalidRegister)
        ));
        // Refused before any bus activity
        assert_eq!(chip.model().transactions, 0);
    }

    #[test]
    fn status_byte_is_captured_from_header() {
        let chip = FakeChip::new();
        chip.model().rx_fifo.extend([0u8; 3]);
        let mut radio = chip.driver();
        block_on(radio.strobe(Strobe::Snop)).unwrap();
        assert!(radio.status().is_ready());
        assert_eq!(radio.status().fifo_bytes(), 3);
    }

    #[test]
    fn select_times_out_when_ready_gate_stays_high() {
        let chip = FakeChip::new();
        let mut radio = chip.driver_with_ready(StuckReady);
        assert!(matches!(
            block_on(radio.strobe(Strobe::Snop)),
            Err(Cc1101Error::ReadyTimeout)
        ));
        // Select was asserted but nothing was clocked out
        assert!(chip.model().strobes.is_empty());
    }

    #[test]
    fn async_gate_times_out_without_a_falling_edge() {
        let chip = FakeChip::new();
        let mut radio = chip.driver_with_async_ready(StuckReady);
        assert!(matches!(
            block_on(radio.strobe(Strobe::Snop)),
            Err(Cc1101Error::ReadyTimeout)
        ));
    }
}
