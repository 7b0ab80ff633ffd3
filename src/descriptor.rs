//! Device description read by the host out of the `DevDscr` section.
//!
//! The layout follows the Keil `FlashDevice` record byte for byte, so every
//! field here is `#[repr(C)]` and padding is spelled out.

use crate::address::{PAGE_SIZE, SECTOR_SIZE};

/// Version of the flash driver interface. Do not modify
pub const FLASH_DRV_VERSION: u16 = 0x0101;

/// Number of slots in the sector map, including the terminating entry
pub const MAX_SECTORS: usize = 4;

/// Length of the device name field, including the terminating NUL
pub const NAME_LEN: usize = 128;

/// Kind of flash device as reported to the host
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DeviceType {
    Unknown = 0,
    OnChip = 1,
    External8Bit = 2,
    External16Bit = 3,
    External32Bit = 4,
    ExternalSpi = 5,
}

/// A run of sectors of one size, starting at `address` relative to the base address
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FlashSector {
    pub size: u32,
    pub address: u32,
}

impl FlashSector {
    /// Marks the end of the sector map
    pub const END: FlashSector = FlashSector {
        size: 0xFFFF_FFFF,
        address: 0xFFFF_FFFF,
    };

    const UNUSED: FlashSector = FlashSector {
        size: 0,
        address: 0,
    };

    pub const fn new(size: u32, address: u32) -> Self {
        Self { size, address }
    }

    pub const fn is_end(&self) -> bool {
        self.size == Self::END.size && self.address == Self::END.address
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct FlashDevice {
    pub version: u16,
    pub name: [u8; NAME_LEN],
    pub device_type: DeviceType,
    pub base_address: u32,
    pub size: u32,
    pub page_size: u32,
    pub reserved: u32,
    pub erase_value: u8,
    _padding: [u8; 3],
    /// Page program timeout in ms
    pub program_timeout: u32,
    /// Sector erase timeout in ms
    pub erase_timeout: u32,
    pub sectors: [FlashSector; MAX_SECTORS],
}

impl FlashDevice {
    /// Build a descriptor. Panics during const evaluation when the name or the
    /// sector map does not fit.
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        name: &str,
        device_type: DeviceType,
        base_address: u32,
        size: u32,
        page_size: u32,
        erase_value: u8,
        program_timeout: u32,
        erase_timeout: u32,
        sectors: &[FlashSector],
    ) -> Self {
        let bytes = name.as_bytes();
        assert!(bytes.len() < NAME_LEN, "device name too long");
        let mut name = [0u8; NAME_LEN];
        let mut i = 0;
        while i < bytes.len() {
            name[i] = bytes[i];
            i += 1;
        }

        assert!(sectors.len() < MAX_SECTORS, "too many sector entries");
        let mut map = [FlashSector::UNUSED; MAX_SECTORS];
        let mut i = 0;
        while i < sectors.len() {
            assert!(!sectors[i].is_end(), "sector entry collides with the end marker");
            map[i] = sectors[i];
            i += 1;
        }
        map[i] = FlashSector::END;

        Self {
            version: FLASH_DRV_VERSION,
            name,
            device_type,
            base_address,
            size,
            page_size,
            reserved: 0,
            erase_value,
            _padding: [0; 3],
            program_timeout,
            erase_timeout,
            sectors: map,
        }
    }

    /// The device name without its NUL terminator
    pub fn name(&self) -> &str {
        let len = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(NAME_LEN);
        core::str::from_utf8(&self.name[..len]).unwrap_or("")
    }

    /// Iterate over the sector map up to, not including, the end marker
    pub fn sectors(&self) -> impl Iterator<Item = &FlashSector> {
        self.sectors.iter().take_while(|s| !s.is_end())
    }

    /// Number of entries before the end marker
    pub const fn sector_entries(&self) -> usize {
        let mut i = 0;
        while i < MAX_SECTORS && !self.sectors[i].is_end() {
            i += 1;
        }
        i
    }

    /// True when the whole device is covered by one sector size
    pub const fn is_uniform(&self) -> bool {
        self.sector_entries() == 1 && self.sectors[0].address == 0
    }
}

/// Descriptor of the ISSI IS25LQ040B, 512kB in 4kB sectors
pub const IS25LQ040B: FlashDevice = FlashDevice::new(
    "is25lq040b",
    DeviceType::OnChip,
    0xA000_0000,
    0x0008_0000,
    PAGE_SIZE,
    0xFF,
    20,
    3000,
    &[FlashSector::new(SECTOR_SIZE, 0x0000_0000)],
);
