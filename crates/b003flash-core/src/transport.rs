//! Transport contract of the bootloader control channel
//!
//! The engine never talks to hardware directly; it drives this trait. The
//! unit of exchange is the fixed-size feature report. The trait uses
//! `maybe_async` to support both sync and async modes:
//! - By default the methods are async (suitable for WASM/web, tokio)
//! - With the `is_sync` feature they become synchronous

use crate::error::Result;
use maybe_async::maybe_async;

/// Duplex feature-report channel to one bootloader device.
///
/// A handle exclusively owns its channel; concurrent calls into the same
/// handle are a caller error and are not guarded against.
#[maybe_async(AFIT)]
pub trait Transport {
    /// Open (or re-open) the underlying device.
    async fn open(&mut self) -> Result<()>;

    /// Whether the device is currently open.
    fn is_open(&self) -> bool;

    /// Send one feature report. `data` carries the report body without the
    /// leading report id byte.
    async fn send_feature_report(&mut self, report_id: u8, data: &[u8]) -> Result<()>;

    /// Receive one feature report into `buf`, including the leading report
    /// id byte at index 0. Returns the number of bytes stored.
    async fn receive_feature_report(&mut self, report_id: u8, buf: &mut [u8]) -> Result<usize>;

    /// Suspend for a fixed number of milliseconds. This is the engine's only
    /// non-I/O suspension point (retry backoff and completion polling).
    async fn delay_ms(&mut self, ms: u32);
}
