//! b003flash-hid - USB HID feature-report transport
//!
//! The b003 bootloader enumerates as a HID device and carries its whole
//! protocol in 128-byte feature reports. This crate implements the core
//! [`Transport`](b003flash_core::Transport) contract over raw USB control
//! transfers (HID `SET_REPORT` / `GET_REPORT`) using `nusb`, which avoids a
//! dependency on OS HID report parsing and works on devices whose interface
//! is still bound to the kernel HID driver.
//!
//! # Example
//!
//! ```no_run
//! use b003flash_core::B003Flasher;
//! use b003flash_hid::HidFeatureTransport;
//!
//! let mut dev = B003Flasher::new(HidFeatureTransport::with_default_id());
//! dev.init()?;
//! println!("{}", dev.chip_info()?);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
mod device;
#[cfg(feature = "std")]
mod error;

#[cfg(feature = "std")]
pub use device::{HidFeatureTransport, DEFAULT_PID, DEFAULT_VID};
#[cfg(feature = "std")]
pub use error::{HidError, Result};
