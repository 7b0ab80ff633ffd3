//! Erase, program and read procedures run on behalf of the host.
//!
//! A [`FlashLoader`] is one programming session: it is created by the host's
//! `Init`, owns the chip and the delay provider, and is dropped at `UnInit`.
//! Every operation blocks until the chip reports it is no longer busy.

use embedded_hal::delay::DelayNs;

use crate::{
    address::{Address, PAGE_SIZE, PAGE_SIZE_SHIFT, SECTOR_SIZE},
    error::Error,
    traits::FlashChip,
};

/// Interval between two busy polls
pub const POLL_INTERVAL_MS: u32 = 3;

/// Size of the read back buffer used by blank check and verify
pub const BLANK_CHECK_CHUNK: usize = 256;

/// Purpose of the session, as passed by the host to `Init` and `UnInit`
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Erase = 1,
    Program = 2,
    Verify = 3,
}

impl TryFrom<u32> for Function {
    type Error = u32;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Function::Erase),
            2 => Ok(Function::Program),
            3 => Ok(Function::Verify),
            other => Err(other),
        }
    }
}

/// A programming session on one chip
pub struct FlashLoader<F, D> {
    chip: F,
    delay: D,
}

impl<F, D, E> FlashLoader<F, D>
where
    F: FlashChip<Error = Error<E>>,
    D: DelayNs,
{
    /// Initialize the chip and wait until it is ready
    pub fn new(mut chip: F, mut delay: D) -> Result<Self, Error<E>> {
        chip.init()?;
        wait_idle(&mut chip, &mut delay)?;
        Ok(Self { chip, delay })
    }

    /// End the session, giving back the chip and the delay
    pub fn release(self) -> (F, D) {
        (self.chip, self.delay)
    }

    fn wait_idle(&mut self) -> Result<(), Error<E>> {
        wait_idle(&mut self.chip, &mut self.delay)
    }

    /// Erase the sector containing `addr`
    pub fn erase_sector(&mut self, addr: u32) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("erase sector {=u32:#x}", addr);
        self.chip.sector_erase(Address::from_host(addr).0)?;
        self.wait_idle()
    }

    /// Erase the whole chip
    pub fn erase_chip(&mut self) -> Result<(), Error<E>> {
        #[cfg(feature = "defmt")]
        defmt::trace!("erase chip");
        self.chip.chip_erase()?;
        self.wait_idle()
    }

    /// Erase `count` consecutive sectors starting at `addr`.
    ///
    /// `feed_watchdog` runs once before the first erase. Stops at the first
    /// sector that fails, the sectors before it stay erased.
    pub fn erase_uniform(
        &mut self,
        addr: u32,
        count: u32,
        feed_watchdog: impl FnOnce(),
    ) -> Result<(), Error<E>> {
        feed_watchdog();

        let mut addr = Address::from_host(addr).0;
        for _ in 0..count {
            self.erase_sector(addr)?;
            addr = addr.wrapping_add(SECTOR_SIZE);
        }
        Ok(())
    }

    /// Program up to one page
    pub fn program_page(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<E>> {
        if data.len() > PAGE_SIZE as usize {
            return Err(Error::Value);
        }
        #[cfg(feature = "defmt")]
        defmt::trace!("program {=u32:#x} len {=usize}", addr, data.len());
        self.chip.page_program(Address::from_host(addr).0, data)?;
        self.wait_idle()
    }

    /// Program whole pages starting at `addr`.
    ///
    /// The length must be a multiple of the page size, anything else is
    /// rejected before the chip is touched.
    pub fn program(&mut self, addr: u32, data: &[u8]) -> Result<(), Error<E>> {
        let pages = data.len() >> PAGE_SIZE_SHIFT;
        if pages << PAGE_SIZE_SHIFT != data.len() {
            return Err(Error::NotAligned);
        }

        #[cfg(feature = "defmt")]
        defmt::trace!("program {=usize} pages", pages);
        let mut addr = addr;
        for page in data.chunks_exact(PAGE_SIZE as usize) {
            self.program_page(addr, page)?;
            addr = addr.wrapping_add(PAGE_SIZE);
        }
        Ok(())
    }

    /// Check that `size` bytes starting at `addr` all read as `blank`.
    ///
    /// Returns `Ok(false)` at the first byte that differs.
    pub fn blank_check(&mut self, addr: u32, size: u32, blank: u8) -> Result<bool, Error<E>> {
        let mut buffer = [0u8; BLANK_CHECK_CHUNK];
        let base = Address::from_host(addr).0;

        let mut done = 0;
        while done < size {
            let len = (size - done).min(BLANK_CHECK_CHUNK as u32);
            let chunk = &mut buffer[..len as usize];
            self.chip.read(base.wrapping_add(done), chunk)?;

            if chunk.iter().any(|&b| b != blank) {
                return Ok(false);
            }
            done += len;
        }
        Ok(true)
    }

    /// Read back into `buf`, returns the number of bytes read
    pub fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<usize, Error<E>> {
        self.chip.read(Address::from_host(addr).0, buf)?;
        Ok(buf.len())
    }

    /// Compare the flash content at `addr` with `expected`.
    ///
    /// Returns the host address of the first byte that differs, or
    /// `addr + expected.len()` when everything matches.
    pub fn verify(&mut self, addr: u32, expected: &[u8]) -> Result<u32, Error<E>> {
        let mut buffer = [0u8; BLANK_CHECK_CHUNK];
        let base = Address::from_host(addr).0;

        let mut offset = 0u32;
        for want in expected.chunks(BLANK_CHECK_CHUNK) {
            let got = &mut buffer[..want.len()];
            self.chip.read(base.wrapping_add(offset), got)?;

            if let Some(pos) = got.iter().zip(want).position(|(g, w)| g != w) {
                #[cfg(feature = "defmt")]
                defmt::error!("verify mismatch at {=u32:#x}", addr.wrapping_add(offset + pos as u32));
                return Ok(addr.wrapping_add(offset + pos as u32));
            }
            offset += want.len() as u32;
        }
        Ok(addr.wrapping_add(offset))
    }
}

fn wait_idle<F, D>(chip: &mut F, delay: &mut D) -> Result<(), F::Error>
where
    F: FlashChip,
    D: DelayNs,
{
    while chip.is_busy()? {
        delay.delay_ms(POLL_INTERVAL_MS);
    }
    Ok(())
}
