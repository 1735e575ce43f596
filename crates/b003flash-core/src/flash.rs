//! Flash unlock/erase/program lifecycle
//!
//! Built on the generic memory access layer: all control-register traffic
//! goes through ordinary word writes, only the 64-byte block program uses
//! its dedicated stub. A failed multi-sector operation leaves earlier
//! sectors already erased/written and the optimistic cache entries in place;
//! callers are expected to abort the enclosing action rather than attempt
//! partial recovery.

use maybe_async::maybe_async;

use crate::device::{is_flash_address, B003Flasher, HaltMode};
use crate::error::{Error, Result};
use crate::protocol::{mem, regs, Ctlr};
use crate::transport::Transport;

impl<T: Transport> B003Flasher<T> {
    /// Word write to a FLASH peripheral register. These writes are required
    /// steps of the unlock/erase/program sequences; any failure aborts the
    /// enclosing operation.
    #[maybe_async]
    async fn flash_reg_write(&mut self, reg: u32, value: u32) -> Result<()> {
        self.write_word(reg, value).await.map_err(|e| {
            log::error!(
                "flash register write 0x{:08X} <- 0x{:08X} failed: {}",
                reg,
                value,
                e
            );
            Error::FlashOp
        })
    }

    /// Unlock the flash controller.
    ///
    /// Writes the key pair to the main, option-byte and fast-mode key
    /// registers, then re-checks the control register. Read-protection is
    /// only warned about - it cannot be lifted from here.
    #[maybe_async]
    pub async fn unlock_flash(&mut self) -> Result<()> {
        let ctlr = self.read_word(regs::CTLR).await?;
        if ctlr & Ctlr::LOCK_MASK != 0 {
            for reg in [regs::KEYR, regs::OBKEYR, regs::MODEKEYR] {
                self.flash_reg_write(reg, regs::KEY1).await?;
                self.flash_reg_write(reg, regs::KEY2).await?;
            }

            let ctlr = self.read_word(regs::CTLR).await?;
            if ctlr & Ctlr::LOCK_MASK != 0 {
                log::error!("flash did not unlock (CTLR = 0x{:08X})", ctlr);
                return Err(Error::Unlock);
            }
        }

        let obr = self.read_word(regs::OBR).await?;
        if obr & regs::OBR_RDPRT != 0 {
            log::warn!("part appears to be read-protected; programming will fail until lifted");
        }

        self.state.flash_unlocked = true;
        Ok(())
    }

    /// Erase every sector overlapping `[address, address + length)`.
    ///
    /// The start is rounded down to a sector boundary. Each main-flash
    /// sector is marked erased in the cache *before* its erase command goes
    /// out - the intent is recorded even if the erase then fails. No busy
    /// poll follows the start bit; the next operation's own retry/poll
    /// budget absorbs the residual latency.
    #[maybe_async]
    pub async fn erase(&mut self, address: u32, length: u32) -> Result<()> {
        if !self.state.flash_unlocked {
            self.unlock_flash().await?;
        }

        let sector_size = self.state.sector_size;
        let mut sector_addr = address & !(sector_size - 1);
        log::debug!("erasing {} bytes at 0x{:08X}", length, address);

        while sector_addr < address + length {
            if (sector_addr & mem::FLASH_REGION_MASK) == mem::FLASH_BASE {
                let sector = ((sector_addr & 0x00FF_FFFF) / sector_size) as usize;
                if sector < mem::MAX_FLASH_SECTORS {
                    self.state.sector_erased[sector] = true;
                }
            }

            self.flash_reg_write(regs::CTLR, Ctlr::PER.bits()).await?;
            self.flash_reg_write(regs::ADDR, sector_addr).await?;
            self.state.long_operation = true;
            self.flash_reg_write(regs::CTLR, (Ctlr::STRT | Ctlr::PER).bits())
                .await?;

            sector_addr += sector_size;
        }
        Ok(())
    }

    /// Program one 64-byte block, the device's atomic flash write granule.
    ///
    /// Flash-backed blocks are unlocked and erased as needed, then written
    /// with the dedicated stub, which polls the flash busy bit on-device.
    /// There is no host-side readback on this path. Non-flash blocks go
    /// through the generic write instead.
    #[maybe_async]
    pub async fn block_write64(&mut self, address: u32, data: &[u8]) -> Result<()> {
        if data.len() < mem::BLOCK_SIZE {
            return Err(Error::BufferTooSmall);
        }
        let data = &data[..mem::BLOCK_SIZE];

        if !is_flash_address(address) {
            return self.write_bytes(address, data).await;
        }

        if !self.state.flash_unlocked {
            self.unlock_flash().await?;
        }
        if !self.is_sector_erased(address) {
            self.erase(address, mem::BLOCK_SIZE as u32).await?;
        }

        // Prime the controller for buffered page programming.
        self.flash_reg_write(regs::CTLR, Ctlr::PG.bits()).await?;
        self.flash_reg_write(regs::CTLR, (Ctlr::PG | Ctlr::BUFLOAD).bits())
            .await?;

        self.cmd.reset();
        self.cmd.push_bytes(&crate::stubs::FLASH_WRITE64);
        self.cmd.push_word(address);
        self.cmd.push_word(regs::STATR);
        self.cmd.set_payload(data);
        self.state.long_operation = true;
        self.commit(true).await
    }

    /// Write a whole image at `offset`.
    ///
    /// Offsets below 0x01000000 are normalized into the main flash window.
    /// Sector-aligned ranges stream straight block writes; anything else is
    /// reconstructed sector by sector, splicing the new bytes into the
    /// current contents. Partial sectors outside flash are not supported -
    /// RAM targets should use [`write_bytes`](Self::write_bytes).
    #[maybe_async]
    pub async fn write_image(&mut self, data: &[u8], offset: u32) -> Result<()> {
        let mut address = offset;
        if address < 0x0100_0000 {
            address |= mem::FLASH_BASE;
        }

        if data.is_empty() {
            return Ok(());
        }

        // Replacing the resident bootloader must not reset the part halfway.
        if address == mem::BOOTLOADER_BASE {
            self.set_halt_mode(HaltMode::HaltButNoReset).await?;
        } else {
            self.set_halt_mode(HaltMode::HaltAndReset).await?;
        }

        if address > mem::RESERVED_RAM_START && address < mem::RESERVED_RAM_END {
            log::error!("refusing to write the bootloader's reserved RAM window");
            return Err(Error::NotImplemented);
        }

        let size = data.len() as u32;
        let is_flash = is_flash_address(address);
        let sector_size = self.state.sector_size;
        let sector_mask = sector_size - 1;
        log::info!("writing image: {} bytes at 0x{:08X}", size, address);

        if is_flash && address & sector_mask == 0 && size & sector_mask == 0 {
            let mut off = 0usize;
            while off < data.len() {
                self.block_write64(address + off as u32, &data[off..]).await?;
                off += mem::BLOCK_SIZE;
            }
            return Ok(());
        }

        // Unaligned: walk every sector the range touches and rebuild the
        // partially covered ones around the new bytes.
        let first_sector = address / sector_size;
        let end_sector = (address + size + sector_mask) / sector_size;
        let blocks_per_sector = (sector_size as usize) / mem::BLOCK_SIZE;
        let mut consumed = 0usize;

        for sector in first_sector..end_sector {
            let base = sector * sector_size;
            let start_in_sector = address.saturating_sub(base) as usize;
            let end_in_sector =
                core::cmp::min((address + size - base) as usize, sector_size as usize);

            if start_in_sector == 0 && end_in_sector == sector_size as usize {
                for block in 0..blocks_per_sector {
                    let block_off = block * mem::BLOCK_SIZE;
                    self.block_write64(base + block_off as u32, &data[consumed + block_off..])
                        .await?;
                }
                consumed += sector_size as usize;
            } else if is_flash {
                let mut sector_data = self.read_bytes(base, sector_size).await?;
                let tocopy = end_in_sector - start_in_sector;
                sector_data[start_in_sector..end_in_sector]
                    .copy_from_slice(&data[consumed..consumed + tocopy]);
                consumed += tocopy;

                for block in 0..blocks_per_sector {
                    let block_off = block * mem::BLOCK_SIZE;
                    self.block_write64(base + block_off as u32, &sector_data[block_off..])
                        .await?;
                }
            } else {
                log::error!("partial-sector writes outside flash are not supported");
                return Err(Error::NotImplemented);
            }
        }
        Ok(())
    }
}
