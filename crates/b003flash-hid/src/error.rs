//! Error types for the HID feature-report transport

use std::fmt;

/// Result type for transport open/discovery operations
pub type Result<T> = std::result::Result<T, HidError>;

/// Errors that can occur while opening or driving the HID transport
#[derive(Debug)]
pub enum HidError {
    /// No device with the requested identity is connected
    DeviceNotFound {
        /// Requested vendor id
        vid: u16,
        /// Requested product id
        pid: u16,
    },
    /// Failed to open the USB device
    OpenFailed(String),
    /// Failed to claim the HID interface
    ClaimFailed(String),
    /// USB transfer or enumeration failed
    Usb(String),
}

impl fmt::Display for HidError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HidError::DeviceNotFound { vid, pid } => {
                write!(f, "no bootloader device found ({:04X}:{:04X})", vid, pid)
            }
            HidError::OpenFailed(msg) => write!(f, "failed to open device: {}", msg),
            HidError::ClaimFailed(msg) => write!(f, "failed to claim HID interface: {}", msg),
            HidError::Usb(msg) => write!(f, "USB error: {}", msg),
        }
    }
}

impl std::error::Error for HidError {}

impl From<nusb::Error> for HidError {
    fn from(e: nusb::Error) -> Self {
        HidError::Usb(e.to_string())
    }
}
