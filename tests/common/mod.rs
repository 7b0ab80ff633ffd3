#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::{
    delay::DelayNs,
    spi::{self, ErrorKind, ErrorType, Operation, SpiDevice},
};
use is25lq_flashloader::{error::Error, traits::FlashChip};

pub const CAPACITY: usize = 0x80000;
pub const PAGE: usize = 256;
pub const SECTOR: usize = 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimError;

impl spi::Error for SimError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// One chip select cycle as seen by the simulated chip
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: u8,
    pub address: Option<u32>,
    pub data: Vec<u8>,
}

/// Behavioural model of an IS25LQ040B
pub struct SimChip {
    pub memory: Vec<u8>,
    pub status: u8,
    pub powered_down: bool,
    /// Status reads reporting WIP after each program or erase
    pub busy_reads: u32,
    busy_left: u32,
    /// Fail the transaction with this index, counted from 0
    pub fail_at: Option<usize>,
    pub transactions: usize,
    pub frames: Vec<Frame>,
    rx: Vec<u8>,
}

impl SimChip {
    pub fn new() -> Self {
        Self {
            memory: vec![0xFF; CAPACITY],
            status: 0,
            powered_down: false,
            busy_reads: 2,
            busy_left: 0,
            fail_at: None,
            transactions: 0,
            frames: Vec::new(),
            rx: Vec::new(),
        }
    }

    pub fn shared(self) -> Arc<Mutex<SimChip>> {
        Arc::new(Mutex::new(self))
    }

    pub fn wel(&self) -> bool {
        self.status & 0x02 != 0
    }

    fn address(&self) -> u32 {
        (self.rx[1] as u32) << 16 | (self.rx[2] as u32) << 8 | self.rx[3] as u32
    }

    /// Clock one byte in, return the byte clocked out
    fn clock(&mut self, mosi: u8) -> u8 {
        let n = self.rx.len();
        self.rx.push(mosi);
        if n == 0 || self.powered_down {
            return 0xFF;
        }
        match self.rx[0] {
            0x05 => {
                let wip = self.busy_left > 0;
                self.busy_left = self.busy_left.saturating_sub(1);
                self.status & !0x01 | wip as u8
            }
            0x03 if n >= 4 => self.memory[(self.address() as usize + n - 4) % CAPACITY],
            0x0B if n >= 5 => self.memory[(self.address() as usize + n - 5) % CAPACITY],
            0x9F => [0x00, 0x9D, 0x40, 0x13].get(n).copied().unwrap_or(0),
            0x90 => match n {
                4 => 0x9D,
                5 => 0x12,
                _ => 0,
            },
            _ => 0xFF,
        }
    }

    /// Chip select released, commit the command
    fn end(&mut self) {
        let rx = std::mem::take(&mut self.rx);
        if rx.is_empty() {
            return;
        }
        let command = rx[0];
        let address = (rx.len() >= 4 && matches!(command, 0x02 | 0x03 | 0x0B | 0x20 | 0x52 | 0xD8))
            .then(|| (rx[1] as u32) << 16 | (rx[2] as u32) << 8 | rx[3] as u32);
        let data = match command {
            0x02 => rx[4.min(rx.len())..].to_vec(),
            0x01 => rx[1..].to_vec(),
            _ => Vec::new(),
        };
        self.frames.push(Frame {
            command,
            address,
            data: data.clone(),
        });

        if self.powered_down {
            if command == 0xAB {
                self.powered_down = false;
            }
            return;
        }

        let protected = self.status & 0x3C != 0;
        match command {
            0x06 => self.status |= 0x02,
            0x04 => self.status &= !0x02,
            0xB9 => self.powered_down = true,
            0x01 if self.wel() => {
                self.status = data.first().copied().unwrap_or(0) & 0xFC;
                self.busy_left = self.busy_reads;
            }
            0x02 if self.wel() && !protected => {
                let addr = address.unwrap_or(0) as usize;
                let base = addr & !(PAGE - 1);
                let mut offset = addr & (PAGE - 1);
                for byte in data {
                    self.memory[base + offset] &= byte;
                    offset = (offset + 1) % PAGE;
                }
                self.status &= !0x02;
                self.busy_left = self.busy_reads;
            }
            0x20 | 0x52 | 0xD8 if self.wel() && !protected => {
                let size = match command {
                    0x20 => SECTOR,
                    0x52 => 0x8000,
                    _ => 0x10000,
                };
                let base = address.unwrap_or(0) as usize & !(size - 1);
                self.memory[base..base + size].fill(0xFF);
                self.status &= !0x02;
                self.busy_left = self.busy_reads;
            }
            0xC7 | 0x60 if self.wel() && !protected => {
                self.memory.fill(0xFF);
                self.status &= !0x02;
                self.busy_left = self.busy_reads;
            }
            _ => {}
        }
    }

    /// Frames of the given command
    pub fn frames_of(&self, command: u8) -> Vec<&Frame> {
        self.frames.iter().filter(|f| f.command == command).collect()
    }
}

/// Spi device in front of a shared [`SimChip`]
pub struct SimSpi(pub Arc<Mutex<SimChip>>);

impl SimSpi {
    pub fn chip(&self) -> MutexGuard<'_, SimChip> {
        lock(&self.0)
    }
}

pub fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ErrorType for SimSpi {
    type Error = SimError;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        let mut chip = lock(&self.0);
        let index = chip.transactions;
        chip.transactions += 1;
        if chip.fail_at == Some(index) {
            return Err(SimError);
        }

        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        chip.clock(b);
                    }
                }
                Operation::Read(buf) => {
                    for b in buf.iter_mut() {
                        *b = chip.clock(0x00);
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for b in buf.iter_mut() {
                        *b = chip.clock(*b);
                    }
                }
                Operation::Transfer(read, write) => {
                    for i in 0..read.len().max(write.len()) {
                        let out = chip.clock(write.get(i).copied().unwrap_or(0));
                        if let Some(r) = read.get_mut(i) {
                            *r = out;
                        }
                    }
                }
                Operation::DelayNs(_) => {}
            }
        }
        chip.end();
        Ok(())
    }
}

/// Delay that only counts how it was called
#[derive(Debug, Default)]
pub struct CountingDelay {
    pub ms_calls: Vec<u32>,
    pub total_ns: u64,
}

impl DelayNs for CountingDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
    }

    fn delay_ms(&mut self, ms: u32) {
        self.ms_calls.push(ms);
        self.total_ns += ms as u64 * 1_000_000;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MockError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Init,
    Read { addr: u32, len: usize },
    Program { addr: u32, data: Vec<u8> },
    SectorErase(u32),
    ChipErase,
}

/// A [`FlashChip`] that records what the loader asks for
pub struct RecordingChip {
    pub memory: Vec<u8>,
    pub calls: Vec<Call>,
    /// Busy answers after each program or erase
    pub busy_polls: u32,
    busy_left: u32,
    pub status_reads: u32,
    /// Fail the program call with this index, counted from 0
    pub fail_program_at: Option<usize>,
    /// Fail the sector erase call with this index, counted from 0
    pub fail_erase_at: Option<usize>,
    pub fail_read: bool,
    pub fail_init: bool,
}

impl RecordingChip {
    pub fn new() -> Self {
        Self {
            memory: vec![0xFF; CAPACITY],
            calls: Vec::new(),
            busy_polls: 0,
            busy_left: 0,
            status_reads: 0,
            fail_program_at: None,
            fail_erase_at: None,
            fail_read: false,
            fail_init: false,
        }
    }

    pub fn programs(&self) -> Vec<(u32, Vec<u8>)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Program { addr, data } => Some((*addr, data.clone())),
                _ => None,
            })
            .collect()
    }

    pub fn erases(&self) -> Vec<u32> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::SectorErase(addr) => Some(*addr),
                _ => None,
            })
            .collect()
    }

    pub fn reads(&self) -> Vec<(u32, usize)> {
        self.calls
            .iter()
            .filter_map(|c| match c {
                Call::Read { addr, len } => Some((*addr, *len)),
                _ => None,
            })
            .collect()
    }
}

impl FlashChip for RecordingChip {
    type Error = Error<MockError>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::Init);
        if self.fail_init {
            return Err(Error::Spi(MockError));
        }
        self.busy_left = self.busy_polls;
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.calls.push(Call::Read {
            addr,
            len: buf.len(),
        });
        if self.fail_read {
            return Err(Error::Spi(MockError));
        }
        let start = addr as usize;
        buf.copy_from_slice(&self.memory[start..start + buf.len()]);
        Ok(())
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
        let index = self.programs().len();
        self.calls.push(Call::Program {
            addr,
            data: data.to_vec(),
        });
        if self.fail_program_at == Some(index) {
            return Err(Error::Spi(MockError));
        }
        let start = addr as usize;
        for (cell, byte) in self.memory[start..start + data.len()].iter_mut().zip(data) {
            *cell &= byte;
        }
        self.busy_left = self.busy_polls;
        Ok(())
    }

    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error> {
        let index = self.erases().len();
        self.calls.push(Call::SectorErase(addr));
        if self.fail_erase_at == Some(index) {
            return Err(Error::Spi(MockError));
        }
        let base = addr as usize & !(SECTOR - 1);
        self.memory[base..base + SECTOR].fill(0xFF);
        self.busy_left = self.busy_polls;
        Ok(())
    }

    fn chip_erase(&mut self) -> Result<(), Self::Error> {
        self.calls.push(Call::ChipErase);
        self.memory.fill(0xFF);
        self.busy_left = self.busy_polls;
        Ok(())
    }

    fn is_busy(&mut self) -> Result<bool, Self::Error> {
        self.status_reads += 1;
        let busy = self.busy_left > 0;
        self.busy_left = self.busy_left.saturating_sub(1);
        Ok(busy)
    }
}
