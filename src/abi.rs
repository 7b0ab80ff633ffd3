//! Glue between the host's C calling convention and [`FlashLoader`].
//!
//! The host resolves fixed symbol names and a function table out of the
//! linked image, so a loader image is produced by invoking
//! [`flash_loader!`](crate::flash_loader) once with a [`Board`]. The macro
//! only emits the symbols; the behaviour of every entry point lives in the
//! functions of this module so it can be exercised without a host.

use core::cell::UnsafeCell;

use embedded_hal::delay::DelayNs;

use crate::{
    error::Error,
    loader::{FlashLoader, Function},
    traits::FlashChip,
};

/// Operation succeeded
pub const OK: i32 = 0;
/// Operation failed, or blank check found programmed bytes
pub const FAILED: i32 = 1;
/// Bus error while reading back
pub const READ_ERROR: i32 = -1;

/// The target specific part of a loader: clocks, pins, bus and watchdog.
pub trait Board {
    type SpiError;
    type Chip: FlashChip<Error = Error<Self::SpiError>>;
    type Delay: DelayNs;

    /// Configure wait states, clock tree, chip select and the SPI bus
    /// (mode 3, 1MHz, 8 bit words), then hand out the chip and a delay.
    ///
    /// `None` when the hardware could not be brought up.
    fn setup(address: u32, clock: u32, function: Function) -> Option<(Self::Chip, Self::Delay)>;

    /// Keep the target watchdog from firing during long operations
    fn feed_watchdog() {}

    /// Called at the end of the session with the resources from [`Board::setup`]
    fn teardown(_chip: Self::Chip, _delay: Self::Delay) {}
}

/// The session type of a board
pub type Loader<B> = FlashLoader<<B as Board>::Chip, <B as Board>::Delay>;

/// Storage for the one session living between `Init` and `UnInit`
pub struct Session<T>(UnsafeCell<Option<T>>);

// The host never calls into the loader from two threads, nor reentrantly
unsafe impl<T> Sync for Session<T> {}

impl<T> Session<T> {
    pub const fn new() -> Self {
        Session(UnsafeCell::new(None))
    }

    /// Run `f` on the session slot.
    ///
    /// # Safety
    ///
    /// No other call to `with` on the same session may be running.
    pub unsafe fn with<R>(&self, f: impl FnOnce(&mut Option<T>) -> R) -> R {
        f(&mut *self.0.get())
    }
}

impl<T> Default for Session<T> {
    fn default() -> Self {
        Self::new()
    }
}

fn status<E>(res: Result<(), Error<E>>) -> i32 {
    match res {
        Ok(()) => OK,
        Err(_) => FAILED,
    }
}

unsafe fn host_slice<'a>(data: *const u8, size: u32) -> Option<&'a [u8]> {
    if size == 0 {
        return Some(&[]);
    }
    if data.is_null() {
        return None;
    }
    Some(core::slice::from_raw_parts(data, size as usize))
}

unsafe fn host_slice_mut<'a>(data: *mut u8, size: u32) -> Option<&'a mut [u8]> {
    if size == 0 {
        return Some(&mut []);
    }
    if data.is_null() {
        return None;
    }
    Some(core::slice::from_raw_parts_mut(data, size as usize))
}

/// `FeedWatchdog()`
pub fn feed_watchdog<B: Board>() {
    B::feed_watchdog();
}

/// `Init(address, clock, function)`. A running session is replaced, unless
/// the function code is unknown.
///
/// # Safety
///
/// See [`Session::with`].
pub unsafe fn init<B: Board>(session: &Session<Loader<B>>, address: u32, clock: u32, function: u32) -> i32 {
    let Ok(function) = Function::try_from(function) else {
        return FAILED;
    };
    session.with(|slot| {
        // The previous session, if any, is done with the hardware before it is set up again
        if let Some(loader) = slot.take() {
            let (chip, delay) = loader.release();
            B::teardown(chip, delay);
        }

        let Some((chip, delay)) = B::setup(address, clock, function) else {
            return FAILED;
        };
        match FlashLoader::new(chip, delay) {
            Ok(loader) => {
                *slot = Some(loader);
                OK
            }
            Err(_) => FAILED,
        }
    })
}

/// `UnInit(function)`
///
/// # Safety
///
/// See [`Session::with`].
pub unsafe fn uninit<B: Board>(session: &Session<Loader<B>>, _function: u32) -> i32 {
    session.with(|slot| {
        if let Some(loader) = slot.take() {
            let (chip, delay) = loader.release();
            B::teardown(chip, delay);
        }
        OK
    })
}

/// `EraseSector(address)`
///
/// # Safety
///
/// See [`Session::with`].
pub unsafe fn erase_sector<B: Board>(session: &Session<Loader<B>>, address: u32) -> i32 {
    session.with(|slot| match slot {
        Some(loader) => status(loader.erase_sector(address)),
        None => FAILED,
    })
}

/// `EraseChip()`
///
/// # Safety
///
/// See [`Session::with`].
pub unsafe fn erase_chip<B: Board>(session: &Session<Loader<B>>) -> i32 {
    session.with(|slot| match slot {
        Some(loader) => status(loader.erase_chip()),
        None => FAILED,
    })
}

/// `SEGGER_OPEN_Erase(address, sector_index, count)`
///
/// # Safety
///
/// See [`Session::with`].
pub unsafe fn erase_uniform<B: Board>(
    session: &Session<Loader<B>>,
    address: u32,
    _sector_index: u32,
    count: u32,
) -> i32 {
    session.with(|slot| match slot {
        Some(loader) => status(loader.erase_uniform(address, count, B::feed_watchdog)),
        None => FAILED,
    })
}

/// `ProgramPage(address, size, data)`
///
/// # Safety
///
/// `data` must be valid for `size` bytes. See also [`Session::with`].
pub unsafe fn program_page<B: Board>(
    session: &Session<Loader<B>>,
    address: u32,
    size: u32,
    data: *const u8,
) -> i32 {
    let Some(data) = host_slice(data, size) else {
        return FAILED;
    };
    session.with(|slot| match slot {
        Some(loader) => status(loader.program_page(address, data)),
        None => FAILED,
    })
}

/// `SEGGER_OPEN_Program(address, size, data)`
///
/// # Safety
///
/// `data` must be valid for `size` bytes. See also [`Session::with`].
pub unsafe fn program<B: Board>(
    session: &Session<Loader<B>>,
    address: u32,
    size: u32,
    data: *const u8,
) -> i32 {
    let Some(data) = host_slice(data, size) else {
        return FAILED;
    };
    session.with(|slot| match slot {
        Some(loader) => status(loader.program(address, data)),
        None => FAILED,
    })
}

/// `BlankCheck(address, size, blank)`: 0 blank, 1 not blank, negative on error
///
/// # Safety
///
/// See [`Session::with`].
pub unsafe fn blank_check<B: Board>(
    session: &Session<Loader<B>>,
    address: u32,
    size: u32,
    blank: u8,
) -> i32 {
    session.with(|slot| match slot {
        Some(loader) => match loader.blank_check(address, size, blank) {
            Ok(true) => OK,
            Ok(false) => FAILED,
            Err(_) => READ_ERROR,
        },
        None => READ_ERROR,
    })
}

/// `SEGGER_OPEN_Read(address, size, data)`: number of bytes read, negative on error
///
/// # Safety
///
/// `data` must be valid for writes of `size` bytes. See also [`Session::with`].
pub unsafe fn read<B: Board>(
    session: &Session<Loader<B>>,
    address: u32,
    size: u32,
    data: *mut u8,
) -> i32 {
    let Some(data) = host_slice_mut(data, size) else {
        return READ_ERROR;
    };
    session.with(|slot| match slot {
        Some(loader) => match loader.read(address, data) {
            Ok(read) => read as i32,
            Err(_) => READ_ERROR,
        },
        None => READ_ERROR,
    })
}

/// `Verify(address, size, data)`: `address + size` when the content matches,
/// the address of the first differing byte otherwise
///
/// # Safety
///
/// `data` must be valid for `size` bytes. See also [`Session::with`].
pub unsafe fn verify<B: Board>(
    session: &Session<Loader<B>>,
    address: u32,
    size: u32,
    data: *const u8,
) -> u32 {
    let Some(data) = host_slice(data, size) else {
        return address;
    };
    session.with(|slot| match slot {
        Some(loader) => loader.verify(address, data).unwrap_or(address),
        None => address,
    })
}

/// Emit the symbols the host looks for in a loader image.
///
/// ```ignore
/// is25lq_flashloader::flash_loader! {
///     board: MyBoard,
///     device: is25lq_flashloader::descriptor::IS25LQ040B,
///     capabilities: is25lq_flashloader::capability::Capabilities::IS25LQ040B,
/// }
/// ```
///
/// The descriptor goes to `DevDscr`, the function table to `PrgCode` and the
/// data marker to `PrgData`. Must be invoked at most once per image.
#[macro_export]
macro_rules! flash_loader {
    (
        board: $board:ty,
        device: $device:expr,
        capabilities: $caps:expr $(,)?
    ) => {
        const _: () = {
            let device: $crate::descriptor::FlashDevice = $device;
            let caps: $crate::capability::Capabilities = $caps;
            assert!(
                device.page_size == $crate::address::PAGE_SIZE,
                "page size does not match the programming routine"
            );
            assert!(
                !caps.uniform_sectors
                    || (device.is_uniform()
                        && device.sectors[0].size == $crate::address::SECTOR_SIZE),
                "uniform erase needs a single sector size matching the erase routine"
            );
        };

        static _FLASH_LOADER_SESSION: $crate::abi::Session<$crate::abi::Loader<$board>> =
            $crate::abi::Session::new();

        #[used]
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        #[link_section = "DevDscr"]
        pub static FlashDevice: $crate::descriptor::FlashDevice = $device;

        #[used]
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        #[link_section = "PrgData"]
        pub static mut PRGDATA_StartMarker: u32 = 0;

        #[used]
        #[no_mangle]
        #[allow(non_upper_case_globals)]
        #[link_section = "PrgCode"]
        pub static SEGGER_OFL_Api: $crate::capability::CapabilityTable =
            $crate::capability::CapabilityTable::build(
                [
                    ($crate::capability::Capability::FeedWatchdog, Some(FeedWatchdog as *const ())),
                    ($crate::capability::Capability::Init, Some(Init as *const ())),
                    ($crate::capability::Capability::UnInit, Some(UnInit as *const ())),
                    ($crate::capability::Capability::EraseSector, Some(EraseSector as *const ())),
                    ($crate::capability::Capability::ProgramPage, Some(ProgramPage as *const ())),
                    ($crate::capability::Capability::BlankCheck, Some(BlankCheck as *const ())),
                    ($crate::capability::Capability::EraseChip, Some(EraseChip as *const ())),
                    ($crate::capability::Capability::Verify, Some(Verify as *const ())),
                    ($crate::capability::Capability::CalcCrc, None),
                    ($crate::capability::Capability::Read, Some(SEGGER_OPEN_Read as *const ())),
                    ($crate::capability::Capability::Program, Some(SEGGER_OPEN_Program as *const ())),
                    ($crate::capability::Capability::Erase, Some(SEGGER_OPEN_Erase as *const ())),
                    ($crate::capability::Capability::Start, None),
                ],
                $caps,
            );

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub extern "C" fn FeedWatchdog() {
            $crate::abi::feed_watchdog::<$board>()
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn Init(address: u32, clock: u32, function: u32) -> i32 {
            $crate::abi::init::<$board>(&_FLASH_LOADER_SESSION, address, clock, function)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn UnInit(function: u32) -> i32 {
            $crate::abi::uninit::<$board>(&_FLASH_LOADER_SESSION, function)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn EraseSector(address: u32) -> i32 {
            $crate::abi::erase_sector::<$board>(&_FLASH_LOADER_SESSION, address)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn EraseChip() -> i32 {
            $crate::abi::erase_chip::<$board>(&_FLASH_LOADER_SESSION)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn ProgramPage(address: u32, size: u32, data: *const u8) -> i32 {
            $crate::abi::program_page::<$board>(&_FLASH_LOADER_SESSION, address, size, data)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn BlankCheck(address: u32, size: u32, blank: u8) -> i32 {
            $crate::abi::blank_check::<$board>(&_FLASH_LOADER_SESSION, address, size, blank)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn Verify(address: u32, size: u32, data: *const u8) -> u32 {
            $crate::abi::verify::<$board>(&_FLASH_LOADER_SESSION, address, size, data)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn SEGGER_OPEN_Read(address: u32, size: u32, data: *mut u8) -> i32 {
            $crate::abi::read::<$board>(&_FLASH_LOADER_SESSION, address, size, data)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn SEGGER_OPEN_Program(address: u32, size: u32, data: *const u8) -> i32 {
            $crate::abi::program::<$board>(&_FLASH_LOADER_SESSION, address, size, data)
        }

        #[no_mangle]
        #[inline(never)]
        #[allow(non_snake_case)]
        pub unsafe extern "C" fn SEGGER_OPEN_Erase(address: u32, sector_index: u32, count: u32) -> i32 {
            $crate::abi::erase_uniform::<$board>(&_FLASH_LOADER_SESSION, address, sector_index, count)
        }
    };
}
