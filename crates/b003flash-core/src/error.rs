//! Error types for b003flash-core
//!
//! This module provides a no_std compatible error type that can be used
//! throughout the crate.

use core::fmt;

/// Core error type - no_std compatible, Copy for efficiency
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Transport send/receive exhausted its retry budget
    Io,
    /// Stub completion was never observed within the polling budget
    Timeout,
    /// Flash write readback did not match the intended data
    Verify {
        /// Address of the chunk that failed verification
        addr: u32,
    },
    /// Flash control register still reports locked after the unlock sequence
    Unlock,
    /// A required control-register write during unlock/erase/program failed
    FlashOp,
    /// Known-unsupported path (RAM partial sectors, reserved RAM window)
    NotImplemented,
    /// Provided buffer is smaller than the operation's granule
    BufferTooSmall,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io => write!(f, "transport I/O failed"),
            Self::Timeout => write!(f, "timed out waiting for stub completion"),
            Self::Verify { addr } => {
                write!(f, "flash write verify failed at 0x{:08X}", addr)
            }
            Self::Unlock => write!(f, "flash did not unlock"),
            Self::FlashOp => write!(f, "flash control-register write failed"),
            Self::NotImplemented => write!(f, "operation not supported on this target range"),
            Self::BufferTooSmall => write!(f, "buffer too small"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

/// Result type alias using the core Error type
pub type Result<T> = core::result::Result<T, Error>;
