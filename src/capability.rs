//! The capability table handed to the host.
//!
//! The host reads a fixed array of function addresses and treats a null slot
//! as "not supported, fall back to the generic behaviour". The order of the
//! slots is owned by the host and is checked when the table is built.

use core::ptr;

/// Every slot of the host table, in table order
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Capability {
    FeedWatchdog = 0,
    Init = 1,
    UnInit = 2,
    EraseSector = 3,
    ProgramPage = 4,
    BlankCheck = 5,
    EraseChip = 6,
    Verify = 7,
    CalcCrc = 8,
    Read = 9,
    Program = 10,
    Erase = 11,
    Start = 12,
}

/// Number of slots in the host table
pub const SLOTS: usize = 13;

impl Capability {
    /// All slots in table order
    pub const ALL: [Capability; SLOTS] = [
        Capability::FeedWatchdog,
        Capability::Init,
        Capability::UnInit,
        Capability::EraseSector,
        Capability::ProgramPage,
        Capability::BlankCheck,
        Capability::EraseChip,
        Capability::Verify,
        Capability::CalcCrc,
        Capability::Read,
        Capability::Program,
        Capability::Erase,
        Capability::Start,
    ];

    /// Position of this capability in the table
    pub const fn index(self) -> usize {
        self as usize
    }

    /// The host refuses a loader that leaves one of these empty
    pub const fn is_mandatory(self) -> bool {
        matches!(
            self,
            Capability::Init
                | Capability::UnInit
                | Capability::EraseSector
                | Capability::ProgramPage
        )
    }
}

/// Which optional operations a loader build offers
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// The flash is memory mapped, the host reads it directly instead of calling the loader
    pub native_read: bool,
    /// The chip has a whole chip erase that beats erasing every sector
    pub chip_erase: bool,
    /// All sectors are the same size, the host may erase runs of them in one call
    pub uniform_sectors: bool,
    /// The loader verifies programmed data itself
    pub custom_verify: bool,
}

impl Capabilities {
    /// Configuration used for the IS25LQ040B
    pub const IS25LQ040B: Capabilities = Capabilities {
        native_read: false,
        chip_erase: true,
        uniform_sectors: true,
        custom_verify: false,
    };

    /// Whether the slot for `cap` gets a function in this configuration
    pub const fn supports(&self, cap: Capability) -> bool {
        match cap {
            Capability::FeedWatchdog
            | Capability::Init
            | Capability::UnInit
            | Capability::EraseSector
            | Capability::ProgramPage
            | Capability::Program => true,
            Capability::BlankCheck | Capability::Read => !self.native_read,
            Capability::EraseChip => self.chip_erase,
            Capability::Verify => self.custom_verify,
            Capability::Erase => self.uniform_sectors,
            // Neither crc offload nor turbo mode are provided
            Capability::CalcCrc | Capability::Start => false,
        }
    }
}

/// One function address in the host table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(transparent)]
pub struct Slot(*const ());

impl Slot {
    pub const NULL: Slot = Slot(ptr::null());

    pub const fn new(function: *const ()) -> Self {
        Slot(function)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_null()
    }

    pub fn address(&self) -> *const () {
        self.0
    }
}

/// The host table, laid out exactly like the array the host reads
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct CapabilityTable {
    slots: [Slot; SLOTS],
}

// The table only holds code addresses, it is never written after link time
unsafe impl Sync for CapabilityTable {}

impl CapabilityTable {
    /// Build the table from tagged entries.
    ///
    /// `entries` must list every capability in table order. Slots the
    /// configuration does not support are emptied whatever was passed in.
    /// Panics, at compile time when used in a `static`, if the order is wrong
    /// or a supported slot has no function.
    pub const fn build(
        entries: [(Capability, Option<*const ()>); SLOTS],
        caps: Capabilities,
    ) -> Self {
        let mut slots = [Slot::NULL; SLOTS];
        let mut i = 0;
        while i < SLOTS {
            let (cap, function) = entries[i];
            assert!(
                cap.index() == Capability::ALL[i].index(),
                "capability entries out of table order"
            );
            if caps.supports(cap) {
                match function {
                    Some(function) => slots[i] = Slot::new(function),
                    None => panic!("supported capability without a function"),
                }
            } else {
                assert!(!cap.is_mandatory(), "mandatory capability disabled");
            }
            i += 1;
        }
        Self { slots }
    }

    /// Address registered for `cap`, `None` when unsupported
    pub fn get(&self, cap: Capability) -> Option<*const ()> {
        let slot = self.slots[cap.index()];
        (!slot.is_null()).then(|| slot.address())
    }

    pub fn is_supported(&self, cap: Capability) -> bool {
        self.get(cap).is_some()
    }

    /// Iterate over every slot in table order
    pub fn iter(&self) -> impl Iterator<Item = (Capability, Option<*const ()>)> + '_ {
        Capability::ALL.iter().map(|&cap| (cap, self.get(cap)))
    }

    pub fn slots(&self) -> &[Slot; SLOTS] {
        &self.slots
    }
}
