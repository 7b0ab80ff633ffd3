use crate::{
    address::{Address, Block32, Block64, Page, Sector, PAGE_SIZE, SECTOR_SIZE},
    command::Command,
    error::Error,
    register::*,
    traits::FlashChip,
};
use embedded_hal::spi::{Operation, SpiDevice};
use embedded_storage::nor_flash::{
    ErrorType, MultiwriteNorFlash, NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash,
};

/// Type alias for the IS25LQ040B
pub type IS25LQ040B<SPI> = Is25lq<0x07FFFF, SPI>;

/// The generic blocking IS25LQ driver, `SIZE` is the last valid address
pub struct Is25lq<const SIZE: u32, SPI>
where
    SPI: SpiDevice,
{
    spi: SPI,
}

impl<const SIZE: u32, SPI, E> Is25lq<SIZE, SPI>
where
    SPI: SpiDevice<Error = E>,
{
    pub const fn capacity() -> usize {
        SIZE as usize + 1
    }

    pub fn new(spi: SPI) -> Self {
        Self { spi }
    }

    /// Give back the spi device
    pub fn release(self) -> SPI {
        self.spi
    }

    /// Spin until the chip has no work in progress
    pub fn wait_wip(&mut self) -> Result<(), Error<E>> {
        loop {
            match self.poll_wip() {
                Ok(()) => return Ok(()),
                Err(Error::Busy) => core::hint::spin_loop(),
                err @ Err(_) => return err,
            }
        }
    }

    pub fn verify_addr(addr: Address) -> Result<u32, Error<E>> {
        let val: u32 = addr.into();
        if val > SIZE {
            return Err(Error::OutOfBounds);
        }
        Ok(val)
    }

    fn command_write(&mut self, bytes: &[u8]) -> Result<(), Error<E>> {
        self.spi.write(bytes).map_err(Error::Spi)
    }

    fn command_transfer(&mut self, bytes: &mut [u8]) -> Result<(), Error<E>> {
        self.spi.transfer_in_place(bytes).map_err(Error::Spi)
    }

    fn addr_command(&mut self, addr: Address, cmd: Command) -> Result<(), Error<E>> {
        let addr_val: u32 = Self::verify_addr(addr)?;
        let cmd: [u8; 4] = [
            cmd as u8,
            (addr_val >> 16) as u8,
            (addr_val >> 8) as u8,
            addr_val as u8,
        ];
        self.spi.write(&cmd).map_err(Error::Spi)
    }

    fn read_base(&mut self, addr: Address, cmd: &[u8], buff: &mut [u8]) -> Result<(), Error<E>> {
        // The read must stay inside the array, the chip would wrap around otherwise
        let end = addr.0 as u64 + buff.len() as u64;
        if end > Self::capacity() as u64 {
            return Err(Error::OutOfBounds);
        }
        self.spi
            .transaction(&mut [Operation::Write(cmd), Operation::Read(buff)])
            .map_err(Error::Spi)
    }

    fn write_base(&mut self, addr: Address, cmd: Command, buff: &[u8]) -> Result<(), Error<E>> {
        let addr_val: u32 = Self::verify_addr(addr)?;
        let cmd: [u8; 4] = [
            cmd as u8,
            (addr_val >> 16) as u8,
            (addr_val >> 8) as u8,
            addr_val as u8,
        ];

        self.spi
            .transaction(&mut [Operation::Write(&cmd), Operation::Write(buff)])
            .map_err(Error::Spi)
    }

    fn prepare_write(&mut self) -> Result<(), Error<E>> {
        self.poll_wip()?;
        self.write_enable()
    }

    /// Read n bytes from an addresss
    pub fn read(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        let addr_val = Self::verify_addr(addr)?;
        let cmd: [u8; 4] = [
            Command::Read as u8,
            (addr_val >> 16) as u8,
            (addr_val >> 8) as u8,
            addr_val as u8,
        ];
        self.read_base(addr, &cmd, buff)
    }

    /// Read n bytes quickly from an address, a dummy byte follows the address
    pub fn read_fast(&mut self, addr: Address, buff: &mut [u8]) -> Result<(), Error<E>> {
        let addr_val = Self::verify_addr(addr)?;
        let cmd: [u8; 5] = [
            Command::ReadF as u8,
            (addr_val >> 16) as u8,
            (addr_val >> 8) as u8,
            addr_val as u8,
            Command::Dummy as u8,
        ];
        self.read_base(addr, &cmd, buff)
    }

    /// Write n bytes to a page. [`Self::write_enable`] is called internally.
    /// Bytes past the end of the page wrap to the start of that same page.
    pub fn write_page(&mut self, addr: Address, buff: &[u8]) -> Result<(), Error<E>> {
        if buff.len() > PAGE_SIZE as usize {
            return Err(Error::Value);
        }
        self.prepare_write()?;
        self.write_base(addr, Command::ProgramPage, buff)
    }

    /// Write n bytes to a page, addressed by sector and page id
    pub fn write_sector_page(
        &mut self,
        sector: Sector,
        page: Page,
        buff: &[u8],
    ) -> Result<(), Error<E>> {
        self.write_page(Address::from_page(sector, page), buff)
    }

    /// Erase a 4kB sector. [`Self::write_enable`] is called internally
    pub fn erase_sector(&mut self, sector: Sector) -> Result<(), Error<E>> {
        let addr = Address::from_sector(sector);
        self.prepare_write()?;
        self.addr_command(addr, Command::SectorErase)
    }

    /// Erase a 64kB block. [`Self::write_enable`] is called internally
    pub fn erase_block64(&mut self, block: Block64) -> Result<(), Error<E>> {
        let addr = Address::from_block64(block);
        self.prepare_write()?;
        self.addr_command(addr, Command::BlockErase)
    }

    /// Erase a 32kB block. [`Self::write_enable`] is called internally
    pub fn erase_block32(&mut self, block: Block32) -> Result<(), Error<E>> {
        let addr = Address::from_block32(block);
        self.prepare_write()?;
        self.addr_command(addr, Command::BlockErase32)
    }

    /// Erase the whole chip. [`Self::write_enable`] is called internally
    pub fn erase_chip(&mut self) -> Result<(), Error<E>> {
        self.prepare_write()?;
        self.command_write(&[Command::ChipErase as u8])
    }

    /// Enable write operation, though you shouldn't need this function since it's already handled in the write/erase operations.
    pub fn write_enable(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::WriteEnable as u8])
    }

    /// Disable write
    pub fn write_disable(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::WriteDisable as u8])
    }

    /// Read the status register
    pub fn read_status(&mut self) -> Result<StatusRegister, Error<E>> {
        let mut command: [u8; 2] = [Command::ReadStatus as u8, 0];
        self.command_transfer(&mut command)?;
        Ok(command[1].into())
    }

    /// Write the non volatile bits of the status register. [`Self::write_enable`] is called internally
    pub fn write_status(&mut self, status: StatusRegister) -> Result<(), Error<E>> {
        if status.protected_block > 0x0F {
            return Err(Error::Value);
        }
        self.prepare_write()?;
        self.command_write(&[Command::WriteStatus as u8, status.into()])
    }

    /// Read the wip bit, just less noisy than the `read_status().unwrap().wip_bit`
    pub fn poll_wip(&mut self) -> Result<(), Error<E>> {
        if self.read_status()?.wip_bit {
            return Err(Error::Busy);
        }
        Ok(())
    }

    /// Read the JEDEC identification of the device
    pub fn read_identification(
        &mut self,
    ) -> Result<(ManufacturerId, MemoryType, MemoryDensity), Error<E>> {
        let mut command = [Command::ReadIdentification as u8, 0, 0, 0];
        self.command_transfer(&mut command)?;
        Ok((
            ManufacturerId(command[1]),
            MemoryType(command[2]),
            MemoryDensity(command[3]),
        ))
    }

    /// Read the manufacturer ID and the device ID
    pub fn read_manufacturer_id(&mut self) -> Result<(ManufacturerId, DeviceId), Error<E>> {
        let dummy = Command::Dummy as u8;
        let mut command = [Command::ReadManufacturerId as u8, dummy, dummy, 0x00, 0, 0];
        self.command_transfer(&mut command)?;
        Ok((ManufacturerId(command[4]), DeviceId(command[5])))
    }

    /// Deep powerdown the chip
    pub fn deep_power_down(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::DeepPowerDown as u8])
    }

    /// Wake the chip from deep power down
    pub fn release_power_down(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::ReleasePowerDown as u8])
    }

    /// Reset the chip. The reset enable is issued internally
    pub fn reset(&mut self) -> Result<(), Error<E>> {
        self.command_write(&[Command::ResetEnable as u8])?;
        self.command_write(&[Command::ResetMemory as u8])
    }
}

impl<const SIZE: u32, SPI: SpiDevice> FlashChip for Is25lq<SIZE, SPI> {
    type Error = Error<SPI::Error>;

    fn init(&mut self) -> Result<(), Self::Error> {
        self.release_power_down()?;
        self.wait_wip()?;

        // Block protection is kept across power cycles, erase and program are ignored while set
        let status = self.read_status()?;
        if status.protected_block != 0 {
            self.write_status(StatusRegister {
                protected_block: 0,
                ..status
            })?;
        }
        Ok(())
    }

    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.read(Address(addr), buf)
    }

    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error> {
        self.write_page(Address(addr), data)
    }

    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error> {
        self.erase_sector(Address(addr).sector())
    }

    fn chip_erase(&mut self) -> Result<(), Self::Error> {
        self.erase_chip()
    }

    fn is_busy(&mut self) -> Result<bool, Self::Error> {
        Ok(self.read_status()?.wip_bit)
    }
}

impl<E> From<NorFlashErrorKind> for Error<E> {
    fn from(e: NorFlashErrorKind) -> Self {
        match e {
            NorFlashErrorKind::NotAligned => Error::NotAligned,
            NorFlashErrorKind::OutOfBounds => Error::OutOfBounds,
            _ => Error::Value,
        }
    }
}

impl<E: core::fmt::Debug> NorFlashError for Error<E> {
    fn kind(&self) -> NorFlashErrorKind {
        match self {
            Error::OutOfBounds => NorFlashErrorKind::OutOfBounds,
            Error::NotAligned => NorFlashErrorKind::NotAligned,
            Error::Value | Error::Spi(_) | Error::Busy => NorFlashErrorKind::Other,
        }
    }
}

impl<const SIZE: u32, SPI: SpiDevice> ErrorType for Is25lq<SIZE, SPI> {
    type Error = Error<SPI::Error>;
}

impl<const SIZE: u32, SPI: SpiDevice> ReadNorFlash for Is25lq<SIZE, SPI> {
    const READ_SIZE: usize = 1;

    fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.read_fast(Address(offset), bytes)
    }

    fn capacity(&self) -> usize {
        Self::capacity()
    }
}

impl<const SIZE: u32, SPI: SpiDevice> NorFlash for Is25lq<SIZE, SPI> {
    const WRITE_SIZE: usize = 1;

    const ERASE_SIZE: usize = SECTOR_SIZE as usize;

    fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        let erase_size = Self::ERASE_SIZE as u32;
        if from > to || to as usize > Self::capacity() {
            return Err(Error::OutOfBounds);
        }
        if (from & (erase_size - 1)) != 0 || (to & (erase_size - 1)) != 0 {
            return Err(Error::NotAligned);
        }

        self.wait_wip()?;

        let mut idx = from;
        while idx < to {
            self.erase_sector(Address(idx).sector())?;
            // Wait for the erase to complete, acting like a flush
            self.wait_wip()?;
            idx += erase_size;
        }
        Ok(())
    }

    fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        let Some(end) = offset.checked_add(bytes.len() as u32) else {
            return Err(Error::OutOfBounds);
        };
        if end as usize > Self::capacity() {
            return Err(Error::OutOfBounds);
        }

        let mut cursor = offset;
        let mut bytes = bytes;

        self.wait_wip()?;

        while !bytes.is_empty() {
            // Only the bytes remaining in the current page can go in one program
            let page_remain = (PAGE_SIZE - Address(cursor).page_offset()) as usize;
            let (now, later) = bytes.split_at(page_remain.min(bytes.len()));

            self.write_page(Address(cursor), now)?;
            // Wait for the write to complete, to behave like a flush
            self.wait_wip()?;

            cursor += now.len() as u32;
            bytes = later;
        }
        Ok(())
    }
}

impl<const SIZE: u32, SPI: SpiDevice> MultiwriteNorFlash for Is25lq<SIZE, SPI> {}
