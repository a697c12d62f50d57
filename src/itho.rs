//! # API related to the EcoFan RFT protocol
//!
//! This module binds the CC1101 driver to the radio protocol spoken by the Itho EcoFan RFT
//! ventilation fans: register preset, the receive path with its peer filter, and command
//! transmission with its retry budget.
//!
//! The host is expected to drive everything from a single task: re-arm reception with
//! [`IthoRadio::enable_receive`] after each poll or send, and schedule [`IthoRadio::attempt_send`]
//! repeats until the returned budget reaches zero.
//!
//! ## Quick Start
//!
//! Here's a typical sequence once the chip driver is created:
//!
//! ```rust,no_run
//! use ecofan_rft::{FanCommand, FanSpeed, IthoRadio, RfAddress};
//!
//! let mut fan = IthoRadio::new(radio, RfAddress::from_u32(0x5072A2));
//! fan.init().await.expect("Radio init");
//! fan.set_peer_address(Some(RfAddress::from_u32(0x1A2B3C)));
//! fan.enable_receive().await.expect("Arming reception");
//!
//! // On each notification raised by the interrupt handler
//! if events.take().is_some() {
//!     if let Some(status) = fan.poll_status().await.expect("Polling status") {
//!         if status.is_accepted() {
//!             let speed = FanSpeed::from_raw(status.speed());
//!         }
//!     }
//!     fan.enable_receive().await.expect("Arming reception");
//! }
//!
//! // Send a command, then drive the repeats on a timer tick
//! let mut left = fan.send_command(FanCommand::High).await.expect("Sending command");
//! while left > 0 {
//!     // ... wait for the next tick ...
//!     left = fan.attempt_send().await.expect("Sending command");
//!     fan.enable_receive().await.expect("Arming reception");
//! }
//! ```

use core::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use embassy_time::Timer;
use embedded_hal::digital::v2::OutputPin;
use embedded_hal_async::spi::SpiBus;

use crate::command::{CommandFrame, FanCommand, RfAddress, RftRemote};
use crate::fan::{self, StatusVerdict};
use crate::frame::{self, Packet, MAX_FRAME_LEN};
use crate::regs::{ConfigReg, Strobe, PATABLE_ADDR};
use crate::{Cc1101, Cc1101Error, ReadyPin};

/// Register preset for the fan protocol, reverse engineered from a
/// remote: 868.3 MHz carrier, 2-FSK with 50.8 kHz deviation at
/// 38.4 kBaud, hardware preamble and sync word, fixed length packets
/// smaller than the FIFO and manual calibration.
pub const RADIO_PRESET: [(ConfigReg, u8); 30] = [
    (ConfigReg::Iocfg2, 0x01),   // Assert on RX FIFO threshold or end of packet
    (ConfigReg::Iocfg0, 0x2E),   // High impedance
    (ConfigReg::Fifothr, 0x4E),  // ADC retention, RX FIFO threshold 5/60
    (ConfigReg::Sync1, 0xAB),
    (ConfigReg::Sync0, 0xFE),
    (ConfigReg::Pktlen, MAX_FRAME_LEN as u8),
    (ConfigReg::Pktctrl1, 0xA0), // Preamble quality threshold
    (ConfigReg::Pktctrl0, 0x00), // Fixed packet length, no CRC
    (ConfigReg::Fsctrl1, 0x06),
    (ConfigReg::Freq2, 0x21),
    (ConfigReg::Freq1, 0x65),
    (ConfigReg::Freq0, 0x6A),
    (ConfigReg::Mdmcfg4, 0x9A),
    (ConfigReg::Mdmcfg3, 0x83),
    (ConfigReg::Mdmcfg2, 0x06),  // 2-FSK, 16 bit sync word with carrier sense
    (ConfigReg::Mdmcfg1, 0x42),  // 8 byte preamble
    (ConfigReg::Deviatn, 0x50),
    (ConfigReg::Mcsm0, 0x18),    // Calibrate when going from idle to RX or TX
    (ConfigReg::Foccfg, 0x16),
    (ConfigReg::Agcctrl2, 0x43),
    (ConfigReg::Agcctrl1, 0x49),
    (ConfigReg::Worctrl, 0xFB),
    (ConfigReg::Frend0, 0x17),   // Use the full PA table
    (ConfigReg::Fscal3, 0xE9),
    (ConfigReg::Fscal2, 0x2A),
    (ConfigReg::Fscal1, 0x00),
    (ConfigReg::Fscal0, 0x1F),
    (ConfigReg::Test2, 0x81),
    (ConfigReg::Test1, 0x35),
    (ConfigReg::Test0, 0x09),
];

/// PA ramp for 10 dBm output
pub const PA_TABLE: [u8; 8] = [0x00, 0x03, 0x0F, 0x27, 0x50, 0xC8, 0xC3, 0xC5];

/// Transmissions per command
const SEND_TRIES: u8 = 3;

/// Receive notification shared with the FIFO-threshold interrupt.
///
/// The handler only raises a flag and bumps a wrapping counter, both
/// with relaxed plain stores so it also works on cores without atomic
/// read-modify-write. The scheduler tick drains the flag before
/// touching the radio, so edges arriving between ticks coalesce into
/// one poll.
pub struct FrameEvents {
    available: AtomicBool,
    count: AtomicU8,
}

impl FrameEvents {
    pub const fn new() -> Self {
        Self { available: AtomicBool::new(false), count: AtomicU8::new(0) }
    }

    /// Called from the interrupt handler on every edge
    pub fn notify(&self) {
        let next = self.count.load(Ordering::Relaxed).wrapping_add(1);
        self.count.store(next, Ordering::Relaxed);
        self.available.store(true, Ordering::Relaxed);
    }

    /// Clear the flag and return the edge count when anything arrived
    /// since the last call
    pub fn take(&self) -> Option<u8> {
        if self.available.load(Ordering::Relaxed) {
            self.available.store(false, Ordering::Relaxed);
            Some(self.count.load(Ordering::Relaxed))
        } else {
            None
        }
    }
}

impl Default for FrameEvents {
    fn default() -> Self {
        Self::new()
    }
}

/// In-flight outgoing frame with its remaining transmit budget. A new
/// [`Self::prepare`] overwrites whatever was still pending.
pub struct SendSession {
    packet: Option<Packet>,
    tries: u8,
}

impl SendSession {
    pub const fn new() -> Self {
        Self { packet: None, tries: 0 }
    }

    /// Stage a frame and reset the transmit budget
    pub fn prepare(&mut self, cmd: &CommandFrame) {
        self.packet = frame::encode(cmd.bytes());
        self.tries = if self.packet.is_some() { SEND_TRIES } else { 0 };
    }

    pub fn tries_left(&self) -> u8 {
        self.tries
    }

    /// Transmit the staged frame once, when budget remains, and return
    /// the budget left afterwards
    pub async fn attempt<O,SPI, M>(&mut self, radio: &mut Cc1101<O,SPI, M>) -> Result<u8, Cc1101Error>
    where
        O: OutputPin, SPI: SpiBus<u8>, M: ReadyPin,
    {
        #[cfg(feature = "defmt")]
        defmt::trace!("{} tries left for sending packet", self.tries);
        let Some(packet) = &self.packet else {
            return Ok(0);
        };
        if self.tries == 0 {
            return Ok(0);
        }
        radio.send_data(packet.as_bytes()).await?;
        self.tries -= 1;
        Ok(self.tries)
    }
}

impl Default for SendSession {
    fn default() -> Self {
        Self::new()
    }
}

/// Chip driver bound to the fan protocol
pub struct IthoRadio<O,SPI, M: ReadyPin> {
    radio: Cc1101<O,SPI, M>,
    remote: RftRemote,
    peer: Option<RfAddress>,
    session: SendSession,
}

impl<O,SPI, M> IthoRadio<O,SPI, M> where
    O: OutputPin, SPI: SpiBus<u8>, M: ReadyPin
{
    /// Bind a chip driver to the protocol, with the address this remote
    /// uses on the air
    pub fn new(radio: Cc1101<O,SPI, M>, address: RfAddress) -> Self {
        Self { radio, remote: RftRemote::new(address), peer: None, session: SendSession::new() }
    }

    /// Fan whose status frames are accepted. Without one every status
    /// is reported but ignored.
    pub fn set_peer_address(&mut self, peer: Option<RfAddress>) {
        self.peer = peer;
    }

    pub fn address(&self) -> RfAddress {
        self.remote.address()
    }

    /// Direct access to the chip driver
    pub fn radio_mut(&mut self) -> &mut Cc1101<O,SPI, M> {
        &mut self.radio
    }

    /// Bring the chip up and load the protocol preset
    pub async fn init(&mut self) -> Result<(), Cc1101Error> {
        self.radio.init().await?;
        for (reg, value) in RADIO_PRESET {
            self.radio.write_config(reg, value).await?;
        }
        self.radio.burst_write(PATABLE_ADDR, &PA_TABLE).await?;
        self.radio.strobe(Strobe::Scal).await?;
        Timer::after_millis(1).await;
        Ok(())
    }

    /// Arm reception on a clean FIFO
    pub async fn enable_receive(&mut self) -> Result<(), Cc1101Error> {
        self.radio.flush_rx_fifo().await?;
        self.radio.set_rx().await
    }

    /// Drain the RX FIFO and interpret whatever frame it held. Meant to
    /// run once per receive notification, with reception re-armed
    /// afterwards.
    pub async fn poll_status(&mut self) -> Result<Option<StatusVerdict>, Cc1101Error> {
        let _rssi = self.radio.read_rssi().await?;
        let mut buf = [0u8; MAX_FRAME_LEN];
        let n = self.radio.read_rx_data(&mut buf).await?;
        let Some(payload) = frame::decode(&buf[..n]) else {
            return Ok(None);
        };
        #[cfg(feature = "defmt")]
        defmt::debug!("Payload {:02x} ({} dBm)", payload.bytes(), _rssi);
        let verdict = fan::interpret_status(&payload, self.peer);
        #[cfg(feature = "defmt")]
        match &verdict {
            Some(StatusVerdict::Accepted { sender, speed }) => {
                defmt::debug!("Fan status: sender {} speed {:02x}", sender, speed);
            }
            Some(StatusVerdict::Unfiltered { .. }) => {
                defmt::info!("No peer address configured, ignoring status");
            }
            _ => {}
        }
        Ok(verdict)
    }

    /// Compose and transmit a command, returning the retry budget left
    /// for the host to schedule. The first transmission happens here,
    /// repeat with [`Self::attempt_send`] until it returns zero.
    pub async fn send_command(&mut self, cmd: FanCommand) -> Result<u8, Cc1101Error> {
        let cmd_frame = self.remote.compose(cmd);
        #[cfg(feature = "defmt")]
        defmt::debug!("Sending {} {:02x}", cmd, cmd_frame.bytes());
        self.session.prepare(&cmd_frame);
        self.session.attempt(&mut self.radio).await
    }

    /// Retransmit the staged command, when any budget remains
    pub async fn attempt_send(&mut self) -> Result<u8, Cc1101Error> {
        self.session.attempt(&mut self.radio).await
    }
}
