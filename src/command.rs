/// Instruction set of the IS25LQ series
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub(crate) enum Command {
    Read = 0x03,
    ReadF = 0x0B,
    ProgramPage = 0x02,
    SectorErase = 0x20,
    BlockErase32 = 0x52,
    BlockErase = 0xD8,
    ChipErase = 0xC7,
    WriteEnable = 0x06,
    WriteDisable = 0x04,
    ReadStatus = 0x05,
    WriteStatus = 0x01,
    ReadIdentification = 0x9F,
    ReadManufacturerId = 0x90,
    DeepPowerDown = 0xB9,
    ReleasePowerDown = 0xAB,
    ResetEnable = 0x66,
    ResetMemory = 0x99,
    Dummy = 0xFF,
}
