/// The operations the flash loader needs from a serial NOR chip.
///
/// Every call only issues the command. Completion is observed through
/// [`FlashChip::is_busy`], the loader does the waiting.
pub trait FlashChip {
    type Error;

    /// Bring the chip into a state where it accepts reads, programs and erases.
    fn init(&mut self) -> Result<(), Self::Error>;

    /// Reads flash contents into `buf`, starting at `addr`.
    fn read(&mut self, addr: u32, buf: &mut [u8]) -> Result<(), Self::Error>;

    /// Program at most one page of previously erased memory.
    fn page_program(&mut self, addr: u32, data: &[u8]) -> Result<(), Self::Error>;

    /// Sets the sector containing `addr` to the erased state.
    fn sector_erase(&mut self, addr: u32) -> Result<(), Self::Error>;

    /// Sets the whole array to the erased state.
    fn chip_erase(&mut self) -> Result<(), Self::Error>;

    /// True while a program or erase is in progress.
    fn is_busy(&mut self) -> Result<bool, Self::Error>;
}
