//! b003flash-core - Session engine for the b003 HID bootloader
//!
//! This crate drives the minimal USB control-channel bootloader found on
//! CH32V003-class RISC-V parts (the "b003" bootloader). The device side only
//! understands one thing: a 128-byte feature report carrying a small
//! machine-code stub, two parameters and an optional payload. Everything a
//! host wants to do - read or write arbitrary memory, erase and program
//! flash, decode the chip identity, reboot into the application - has to be
//! decomposed into sequences of those fixed-size exchanges.
//!
//! The crate is transport-agnostic: callers provide an implementation of the
//! [`Transport`] trait (USB HID feature reports in practice, an in-memory
//! emulator in tests) and get a [`B003Flasher`] session handle on top of it.
//!
//! # Features
//!
//! - `std` - Enable standard library support
//! - `is_sync` - Compile the async seams as synchronous code
//!
//! # Example
//!
//! ```ignore
//! use b003flash_core::B003Flasher;
//!
//! let mut dev = B003Flasher::new(transport);
//! dev.init()?;
//! let info = dev.chip_info()?;
//! println!("flash: {} KiB", info.flash_size_kb);
//! dev.write_image(&firmware, 0x0800_0000)?;
//! ```

#![no_std]
#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
// Allow async fn in traits - we use maybe-async for dual sync/async support
#![allow(async_fn_in_trait)]

extern crate alloc;

#[cfg(feature = "std")]
extern crate std;

pub mod chip;
pub mod chunks;
pub mod device;
pub mod error;
pub mod flash;
pub mod protocol;
pub mod stubs;
pub mod transport;

pub use chip::ChipInfo;
pub use device::{is_flash_address, B003Flasher, HaltMode};
pub use error::{Error, Result};
pub use transport::Transport;
