use embassy_futures::yield_now;
use embassy_time::Timer;

use embedded_hal::digital::v2::OutputPin;
use embedded_hal_async::spi::SpiBus;

use crate::regs::{StatusReg, Strobe, FIFO_ADDR, FIFO_BYTES_MASK};
use crate::status::MarcState;
use crate::{Cc1101, Cc1101Error, ReadyPin};

/// State polls tolerated before a transition is declared stuck
const STUCK_POLL_LIMIT: u32 = 200;

/// Content of the chip identification registers
#[derive(Debug, Clone, Copy)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PartInfo {
    pub partnum: u8,
    pub version: u8,
}

/// Convert a raw RSSI register value to dBm
pub fn rssi_to_dbm(raw: u8) -> i16 {
    if raw >= 128 {
        (raw as i16 - 256) / 2 - 74
    } else {
        raw as i16 / 2 - 74
    }
}

impl<O,SPI, M> Cc1101<O,SPI, M> where
    O: OutputPin, SPI: SpiBus<u8>, M: ReadyPin
{
    /// Reset the chip and give it time to settle
    pub async fn reset(&mut self) -> Result<(), Cc1101Error> {
        self.strobe(Strobe::Sres).await?;
        Timer::after_millis(1).await;
        Ok(())
    }

    /// Read the chip identification registers
    pub async fn read_part_info(&mut self) -> Result<PartInfo, Cc1101Error> {
        let partnum = self.read_status(StatusReg::Partnum).await?;
        let version = self.read_status(StatusReg::Version).await?;
        Ok(PartInfo { partnum, version })
    }

    /// Reset the chip, check something answers and start from clean FIFOs.
    ///
    /// An absent or unpowered chip leaves the bus floating, so the version
    /// register reads back 0x00 or 0xFF.
    pub async fn init(&mut self) -> Result<(), Cc1101Error> {
        self.reset().await?;
        let info = self.read_part_info().await?;
        if info.version == 0x00 || info.version == 0xFF {
            #[cfg(feature = "defmt")]
            defmt::error!("No chip found: version {:02x}", info.version);
            return Err(Cc1101Error::ChipNotFound);
        }
        self.strobe(Strobe::Sfrx).await?;
        Timer::after_micros(100).await;
        self.strobe(Strobe::Sftx).await?;
        Timer::after_micros(100).await;
        #[cfg(feature = "defmt")]
        defmt::info!("Found CC1101: partnum {:02x} version {:02x}", info.partnum, info.version);
        Ok(())
    }

    /// Current radio control state
    pub async fn marc_state(&mut self) -> Result<MarcState, Cc1101Error> {
        Ok(self.read_status(StatusReg::Marcstate).await?.into())
    }

    /// Signal strength of the current/last reception in dBm
    pub async fn read_rssi(&mut self) -> Result<i16, Cc1101Error> {
        let raw = self.read_status(StatusReg::Rssi).await?;
        Ok(rssi_to_dbm(raw))
    }

    /// Strobe idle and wait for the state machine to land there
    pub async fn force_idle(&mut self) -> Result<(), Cc1101Error> {
        self.strobe(Strobe::Sidle).await?;
        while self.marc_state().await? != MarcState::Idle {
            yield_now().await;
        }
        Ok(())
    }

    /// Flush the receive FIFO, going through idle first
    pub async fn flush_rx_fifo(&mut self) -> Result<(), Cc1101Error> {
        self.force_idle().await?;
        self.strobe(Strobe::Sfrx).await?;
        Timer::after_micros(100).await;
        Ok(())
    }

    /// Flush the transmit FIFO, going through idle first
    pub async fn flush_tx_fifo(&mut self) -> Result<(), Cc1101Error> {
        self.force_idle().await?;
        self.strobe(Strobe::Sftx).await?;
        Timer::after_micros(100).await;
        Ok(())
    }

    /// Set chip in RX mode.
    ///
    /// An overflowed RX FIFO blocks the transition, so it is flushed as
    /// soon as it is observed. When the state machine makes no progress
    /// after enough polls the strobe is reissued from idle with a fresh
    /// FIFO and the wait starts over.
    pub async fn set_rx(&mut self) -> Result<(), Cc1101Error> {
        self.force_idle().await?;
        self.strobe(Strobe::Srx).await?;
        let mut polls: u32 = 0;
        loop {
            match self.marc_state().await? {
                MarcState::Rx => return Ok(()),
                MarcState::RxFifoOverflow => {
                    self.strobe(Strobe::Sfrx).await?;
                }
                _ => {}
            }
            polls += 1;
            if polls > STUCK_POLL_LIMIT {
                #[cfg(feature = "defmt")]
                defmt::warn!("Stuck waiting for RX, reissuing strobe");
                self.force_idle().await?;
                self.strobe(Strobe::Sfrx).await?;
                Timer::after_micros(100).await;
                self.strobe(Strobe::Srx).await?;
                polls = 0;
            }
            yield_now().await;
        }
    }

    /// Set chip in TX mode, with the same stuck recovery as
    /// [`Self::set_rx`] but flushing the TX FIFO
    pub async fn set_tx(&mut self) -> Result<(), Cc1101Error> {
        self.force_idle().await?;
        self.strobe(Strobe::Stx).await?;
        let mut polls: u32 = 0;
        loop {
            if self.marc_state().await? == MarcState::Tx {
                return Ok(());
            }
            polls += 1;
            if polls > STUCK_POLL_LIMIT {
                #[cfg(feature = "defmt")]
                defmt::warn!("Stuck waiting for TX, reissuing strobe");
                self.force_idle().await?;
                self.strobe(Strobe::Sftx).await?;
                Timer::after_micros(100).await;
                self.strobe(Strobe::Stx).await?;
                polls = 0;
            }
            yield_now().await;
        }
    }

    /// Transmit a buffer: start from a clean FIFO, enter TX, load the
    /// data and wait for the radio to drain it. Both idle and a TX FIFO
    /// underflow mean the chip is done clocking bits out.
    pub async fn send_data(&mut self, data: &[u8]) -> Result<(), Cc1101Error> {
        self.flush_tx_fifo().await?;
        self.set_tx().await?;
        self.burst_write(FIFO_ADDR, data).await?;
        loop {
            match self.marc_state().await? {
                MarcState::Idle | MarcState::TxFifoUnderflow => break,
                _ => yield_now().await,
            }
        }
        #[cfg(feature = "defmt")]
        defmt::debug!("Done sending, status {}", self.status());
        Ok(())
    }

    /// Drain the RX FIFO into `buf`, returning the number of bytes read
    pub async fn read_rx_data(&mut self, buf: &mut [u8]) -> Result<usize, Cc1101Error> {
        let available = self.read_status(StatusReg::Rxbytes).await? & FIFO_BYTES_MASK;
        let count = (available as usize).min(buf.len());
        if count == 0 {
            return Ok(0);
        }
        self.burst_read(FIFO_ADDR, &mut buf[..count]).await
    }
}
