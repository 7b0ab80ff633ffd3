/// All possible errors emitted by the driver and the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error<SpiError> {
    /// Internal Spi error
    Spi(SpiError),

    /// Invalid value passed
    Value,

    /// Address out of bound
    OutOfBounds,

    /// Address or length not aligned
    NotAligned,

    /// The chip has a write or erase in progress
    Busy,
}

#[cfg(feature = "defmt")]
impl<SpiError> defmt::Format for Error<SpiError> {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Error::Spi(_) => defmt::write!(fmt, "Error::Spi"),
            Error::Value => defmt::write!(fmt, "Error::Value"),
            Error::OutOfBounds => defmt::write!(fmt, "Error::OutOfBounds"),
            Error::NotAligned => defmt::write!(fmt, "Error::NotAligned"),
            Error::Busy => defmt::write!(fmt, "Error::Busy"),
        }
    }
}
