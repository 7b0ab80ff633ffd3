#![cfg_attr(not(test), no_std)]
//! Open flash loader for the [ISSI IS25LQ040B](https://www.issi.com/WW/pdf/25LQ025B-512B-010B-020B-040B.pdf)
//! serial NOR flash using [embedded-hal](https://github.com/rust-embedded/embedded-hal).
//!
//! A debug probe host (J-Link open flash loader, Keil flash algorithms) loads
//! the image into target RAM and calls a fixed set of functions to erase,
//! program and read back the external flash. The crate is split in:
//! * [`blocking`]: a driver for the chip over an [`embedded_hal::spi::SpiDevice`]
//! * [`loader`]: the erase/program/verify procedures of one session
//! * [`descriptor`] and [`capability`]: the records the host reads out of the image
//! * [`abi`]: the `extern "C"` entry points, emitted by [`flash_loader!`]

pub mod abi;
pub mod address;
pub mod blocking;
pub mod capability;
mod command;
pub mod descriptor;
pub mod error;
pub mod loader;
pub mod register;
pub mod traits;

pub use address::{mask, ADDRESS_MASK, BLOCK32_SIZE, BLOCK64_SIZE, PAGE_SIZE, SECTOR_SIZE};

/// Clock polarity and phase of the bus to the chip
pub const SPI_MODE: embedded_hal::spi::Mode = embedded_hal::spi::MODE_3;

/// Bus frequency used while programming
pub const SPI_FREQUENCY_HZ: u32 = 1_000_000;
