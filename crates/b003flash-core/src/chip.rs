//! Chip identity and option-byte readout
//!
//! The identity block lives in the system memory window: four packed
//! option-byte words, the flash capacity register and the 96-bit unique id.
//! Packed words carry two logical 16-bit fields (high half / low half) and
//! are split into named sub-fields here.

use core::fmt;

use maybe_async::maybe_async;

use crate::device::{B003Flasher, HaltMode};
use crate::error::Result;
use crate::protocol::mem;
use crate::transport::Transport;

/// Decoded chip configuration and identity registers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    /// USER option half (high half of the USER/RDPR word).
    pub user: u16,
    /// Read-protection option half (low half of the USER/RDPR word).
    pub rdpr: u16,
    /// User data byte 1 (high half of the DATA word).
    pub data1: u16,
    /// User data byte 0 (low half of the DATA word).
    pub data0: u16,
    /// Write-protection half 1.
    pub wrpr1: u16,
    /// Write-protection half 0.
    pub wrpr0: u16,
    /// Write-protection half 3.
    pub wrpr3: u16,
    /// Write-protection half 2.
    pub wrpr2: u16,
    /// Flash capacity in KiB.
    pub flash_size_kb: u16,
    /// The three raw unique-id words.
    pub uid: [u32; 3],
}

/// Split a packed configuration word into its (high, low) 16-bit fields.
fn split_halves(word: u32) -> (u16, u16) {
    ((word >> 16) as u16, (word & 0xFFFF) as u16)
}

impl fmt::Display for ChipInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "USER/RDPR:  0x{:04X} / 0x{:04X}", self.user, self.rdpr)?;
        writeln!(f, "DATA1/0:    0x{:04X} / 0x{:04X}", self.data1, self.data0)?;
        writeln!(
            f,
            "WRPR:       0x{:04X} 0x{:04X} 0x{:04X} 0x{:04X}",
            self.wrpr0, self.wrpr1, self.wrpr2, self.wrpr3
        )?;
        writeln!(f, "flash size: {} KiB", self.flash_size_kb)?;
        write!(
            f,
            "unique id:  {:08X}-{:08X}-{:08X}",
            self.uid[0], self.uid[1], self.uid[2]
        )
    }
}

impl<T: Transport> B003Flasher<T> {
    /// Read and decode the chip's configuration/identity registers.
    ///
    /// Halts (without reset) first; also records the flash capacity in the
    /// session state.
    #[maybe_async]
    pub async fn chip_info(&mut self) -> Result<ChipInfo> {
        self.set_halt_mode(HaltMode::HaltButNoReset).await?;

        let user_rdpr = self.read_word(mem::OPTION_BASE).await?;
        let data = self.read_word(mem::OPTION_BASE + 0x4).await?;
        let wrpr10 = self.read_word(mem::OPTION_BASE + 0x8).await?;
        let wrpr32 = self.read_word(mem::OPTION_BASE + 0xC).await?;
        let flacap = self.read_word(mem::ESIG_FLACAP).await?;
        let mut uid = [0u32; 3];
        for (slot, reg) in uid.iter_mut().zip(mem::ESIG_UNIID) {
            *slot = self.read_word(reg).await?;
        }

        let (user, rdpr) = split_halves(user_rdpr);
        let (data1, data0) = split_halves(data);
        let (wrpr1, wrpr0) = split_halves(wrpr10);
        let (wrpr3, wrpr2) = split_halves(wrpr32);
        let flash_size_kb = (flacap & 0xFFFF) as u16;

        self.state.flash_size = flash_size_kb as u32;

        Ok(ChipInfo {
            user,
            rdpr,
            data1,
            data0,
            wrpr1,
            wrpr0,
            wrpr3,
            wrpr2,
            flash_size_kb,
            uid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_halves() {
        assert_eq!(split_halves(0x1234_5678), (0x1234, 0x5678));
        assert_eq!(split_halves(0x0000_FFFF), (0x0000, 0xFFFF));
    }
}
