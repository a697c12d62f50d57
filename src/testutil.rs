//! In-memory chip model for driver tests. The pin and bus front-ends
//! share one model through `Rc<RefCell>` and reproduce the wire
//! behavior: a status byte on every header, register auto-increment,
//! strobe side effects and FIFO draining.

use std::cell::{RefCell, RefMut};
use std::collections::VecDeque;
use std::convert::Infallible;
use std::future::pending;
use std::rc::Rc;

use embedded_hal::digital::v2::{InputPin, OutputPin};
use embedded_hal_async::digital::Wait;
use embedded_hal_async::spi::{ErrorType, SpiBus};

use crate::regs::{ACCESS_BURST, ACCESS_READ};
use crate::{Cc1101, ReadyAsync, ReadyBlocking};

struct Access {
    addr: u8,
    read: bool,
    pos: usize,
}

pub struct ChipModel {
    pub regs: [u8; 0x2F],
    pub patable: [u8; 8],
    pub partnum: u8,
    pub version: u8,
    pub rssi: u8,
    pub marcstate: u8,
    pub rx_fifo: VecDeque<u8>,
    /// One entry per select-framed FIFO burst write
    pub tx_writes: Vec<Vec<u8>>,
    /// Strobe addresses in issue order
    pub strobes: Vec<u8>,
    /// Select-framed exchanges so far
    pub transactions: usize,
    /// Number of SRX strobes to swallow, for stuck-transition tests
    pub srx_ignores: u8,
    /// Answer the next SRX with an overflowed FIFO
    pub overflow_on_srx: bool,
    status_script: VecDeque<(u8, u8)>,
    tx_drain_reads: u8,
    selected: bool,
    header_taken: bool,
    access: Option<Access>,
    pending_fifo_write: Vec<u8>,
}

impl ChipModel {
    fn new() -> Self {
        Self {
            regs: [0; 0x2F],
            patable: [0; 8],
            partnum: 0x00,
            version: 0x14,
            rssi: 0x30,
            marcstate: 0x01,
            rx_fifo: VecDeque::new(),
            tx_writes: Vec::new(),
            strobes: Vec::new(),
            transactions: 0,
            srx_ignores: 0,
            overflow_on_srx: false,
            status_script: VecDeque::new(),
            tx_drain_reads: 0,
            selected: false,
            header_taken: false,
            access: None,
            pending_fifo_write: Vec::new(),
        }
    }

    /// Queue fixed values for coming reads of one status register,
    /// served before the live model value
    pub fn script_status(&mut self, addr: u8, values: &[u8]) {
        for &v in values {
            self.status_script.push_back((addr, v));
        }
    }

    fn begin_transaction(&mut self) {
        self.selected = true;
        self.header_taken = false;
        self.access = None;
        self.transactions += 1;
    }

    fn end_transaction(&mut self) {
        self.selected = false;
        if !self.pending_fifo_write.is_empty() {
            let data = std::mem::take(&mut self.pending_fifo_write);
            self.tx_writes.push(data);
        }
    }

    fn exchange(&mut self, mosi: u8) -> u8 {
        if !self.selected {
            return 0;
        }
        if !self.header_taken {
            self.header_taken = true;
            let status = self.status_byte();
            let addr = mosi & 0x3F;
            let burst = mosi & ACCESS_BURST != 0;
            let read = mosi & ACCESS_READ != 0;
            if !burst && (0x30..=0x3D).contains(&addr) {
                self.apply_strobe(addr);
            } else {
                self.access = Some(Access { addr, read, pos: 0 });
            }
            return status;
        }
        let (addr, read, pos) = match self.access.as_mut() {
            Some(access) => {
                let state = (access.addr, access.read, access.pos);
                access.pos += 1;
                state
            }
            None => return 0,
        };
        if read {
            self.read_data(addr, pos)
        } else {
            self.write_data(addr, pos, mosi);
            self.status_byte()
        }
    }

    fn read_data(&mut self, addr: u8, pos: usize) -> u8 {
        match addr {
            0x00..=0x2E => {
                let idx = addr as usize + pos;
                if idx <= 0x2E { self.regs[idx] } else { 0 }
            }
            0x30..=0x3D => self.status_value(addr),
            0x3E => self.patable[pos % 8],
            0x3F => self.rx_fifo.pop_front().unwrap_or(0),
            _ => 0,
        }
    }

    fn write_data(&mut self, addr: u8, pos: usize, value: u8) {
        match addr {
            0x00..=0x2E => {
                let idx = addr as usize + pos;
                if idx <= 0x2E {
                    self.regs[idx] = value;
                }
            }
            0x3E => self.patable[pos % 8] = value,
            0x3F => self.pending_fifo_write.push(value),
            _ => {}
        }
    }

    fn status_value(&mut self, addr: u8) -> u8 {
        if let Some(&(scripted_addr, value)) = self.status_script.front() {
            if scripted_addr == addr {
                self.status_script.pop_front();
                return value;
            }
        }
        match addr {
            0x30 => self.partnum,
            0x31 => self.version,
            0x34 => self.rssi,
            0x35 => self.read_marcstate(),
            0x3B => self.rx_fifo.len().min(0x7F) as u8,
            _ => 0,
        }
    }

    /// Transmissions drain on their own: a few reads after STX the
    /// state machine falls back to idle
    fn read_marcstate(&mut self) -> u8 {
        let state = self.marcstate;
        if state == 0x13 {
            if self.tx_drain_reads == 0 {
                self.marcstate = 0x01;
            } else {
                self.tx_drain_reads -= 1;
            }
        }
        state
    }

    fn apply_strobe(&mut self, addr: u8) {
        self.strobes.push(addr);
        match addr {
            0x30 => {
                self.marcstate = 0x01;
                self.rx_fifo.clear();
            }
            0x33 => self.marcstate = 0x01,
            0x34 => {
                if self.srx_ignores > 0 {
                    self.srx_ignores -= 1;
                } else if self.overflow_on_srx {
                    self.overflow_on_srx = false;
                    self.marcstate = 0x11;
                } else {
                    self.marcstate = 0x0D;
                }
            }
            0x35 => {
                self.marcstate = 0x13;
                self.tx_drain_reads = 2;
            }
            0x36 => self.marcstate = 0x01,
            0x3A => {
                self.rx_fifo.clear();
                // A flush out of overflow resumes the pending reception
                if self.marcstate == 0x11 {
                    self.marcstate = 0x0D;
                }
            }
            _ => {}
        }
    }

    fn status_byte(&self) -> u8 {
        let coarse = match self.marcstate {
            0x0D..=0x0F => 0b001,
            0x11 => 0b110,
            0x13..=0x15 => 0b010,
            0x16 => 0b111,
            _ => 0b000,
        };
        let fifo = self.rx_fifo.len().min(15) as u8;
        (coarse << 4) | fifo
    }
}

pub struct FakeChip {
    model: Rc<RefCell<ChipModel>>,
}

impl FakeChip {
    pub fn new() -> Self {
        Self { model: Rc::new(RefCell::new(ChipModel::new())) }
    }

    pub fn model(&self) -> RefMut<'_, ChipModel> {
        self.model.borrow_mut()
    }

    pub fn driver(&self) -> Cc1101<FakeNss, FakeSpi, ReadyBlocking<FakeReady>> {
        Cc1101::new_blocking(
            FakeSpi { model: self.model.clone() },
            FakeNss { model: self.model.clone() },
            FakeReady,
        )
    }

    /// Driver with a caller-supplied ready gate, for gate behavior tests
    pub fn driver_with_ready<I: InputPin>(&self, ready: I) -> Cc1101<FakeNss, FakeSpi, ReadyBlocking<I>> {
        Cc1101::new_blocking(
            FakeSpi { model: self.model.clone() },
            FakeNss { model: self.model.clone() },
            ready,
        )
    }

    /// Same, taking the gate through its wait interface
    pub fn driver_with_async_ready<I: InputPin + Wait>(&self, ready: I) -> Cc1101<FakeNss, FakeSpi, ReadyAsync<I>> {
        Cc1101::new(
            FakeSpi { model: self.model.clone() },
            FakeNss { model: self.model.clone() },
            ready,
        )
    }
}

pub struct FakeNss {
    model: Rc<RefCell<ChipModel>>,
}

impl OutputPin for FakeNss {
    type Error = Infallible;

    fn set_low(&mut self) -> Result<(), Infallible> {
        self.model.borrow_mut().begin_transaction();
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.model.borrow_mut().end_transaction();
        Ok(())
    }
}

/// Ready gate that is always asserted
pub struct FakeReady;

impl InputPin for FakeReady {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(false)
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(true)
    }
}

/// Ready gate that stays high and never produces an edge
pub struct StuckReady;

impl InputPin for StuckReady {
    type Error = Infallible;

    fn is_high(&self) -> Result<bool, Infallible> {
        Ok(true)
    }

    fn is_low(&self) -> Result<bool, Infallible> {
        Ok(false)
    }
}

impl embedded_hal_1::digital::ErrorType for StuckReady {
    type Error = Infallible;
}

impl Wait for StuckReady {
    async fn wait_for_high(&mut self) -> Result<(), Infallible> {
        Ok(())
    }

    async fn wait_for_low(&mut self) -> Result<(), Infallible> {
        pending().await
    }

    async fn wait_for_rising_edge(&mut self) -> Result<(), Infallible> {
        pending().await
    }

    async fn wait_for_falling_edge(&mut self) -> Result<(), Infallible> {
        pending().await
    }

    async fn wait_for_any_edge(&mut self) -> Result<(), Infallible> {
        pending().await
    }
}

pub struct FakeSpi {
    model: Rc<RefCell<ChipModel>>,
}

impl ErrorType for FakeSpi {
    type Error = Infallible;
}

impl SpiBus<u8> for FakeSpi {
    async fn read(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut model = self.model.borrow_mut();
        for word in words {
            *word = model.exchange(0);
        }
        Ok(())
    }

    async fn write(&mut self, words: &[u8]) -> Result<(), Infallible> {
        let mut model = self.model.borrow_mut();
        for &word in words {
            model.exchange(word);
        }
        Ok(())
    }

    async fn transfer(&mut self, read: &mut [u8], write: &[u8]) -> Result<(), Infallible> {
        let mut model = self.model.borrow_mut();
        for i in 0..read.len().max(write.len()) {
            let out = write.get(i).copied().unwrap_or(0);
            let answer = model.exchange(out);
            if let Some(slot) = read.get_mut(i) {
                *slot = answer;
            }
        }
        Ok(())
    }

    async fn transfer_in_place(&mut self, words: &mut [u8]) -> Result<(), Infallible> {
        let mut model = self.model.borrow_mut();
        for word in words {
            *word = model.exchange(*word);
        }
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Infallible> {
        Ok(())
    }
}
