use bit::BitIndex;

/// JEDEC manufacturer id of ISSI
pub const ISSI_MANUFACTURER_ID: u8 = 0x9D;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ManufacturerId(pub u8);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryType(pub u8);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryDensity(pub u8);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceId(pub u8);

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatusRegister {
    pub status_write_disable: bool,
    pub quad_enable: bool,
    pub protected_block: u8,
    pub write_enable_latch: bool,
    pub wip_bit: bool,
}

impl From<u8> for StatusRegister {
    fn from(val: u8) -> StatusRegister {
        StatusRegister {
            status_write_disable: val.bit(7),
            quad_enable: val.bit(6),
            protected_block: val.bit_range(2..6),
            write_enable_latch: val.bit(1),
            wip_bit: val.bit(0),
        }
    }
}

impl From<StatusRegister> for u8 {
    /// Only the non volatile bits are encoded, WIP and WEL are read only.
    fn from(status: StatusRegister) -> u8 {
        let mut val = 0u8;
        val.set_bit(7, status.status_write_disable);
        val.set_bit(6, status.quad_enable);
        val.set_bit_range(2..6, status.protected_block & 0x0F);
        val
    }
}
