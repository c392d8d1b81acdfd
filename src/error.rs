//! Firmware-internal error types

use core::fmt;

/// Firmware operation result type
pub type Result<T> = core::result::Result<T, Error>;

/// Failure modes of the protocol engine.
///
/// The wire protocol itself never carries these: a failed CBW is reported
/// through the CSW status byte, and an exhausted hardware poll is simply
/// abandoned so the host's own USB timeout recovers the transaction. These
/// values exist so internal call chains can propagate with `?` and so the
/// main loop can log what was abandoned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A bounded spin-poll exhausted its iteration budget
    Timeout,
    /// Operation attempted in a state that cannot accept it
    InvalidState,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "poll budget exhausted"),
            Self::InvalidState => write!(f, "invalid state"),
        }
    }
}
