//! Bootloader session handle
//!
//! One [`B003Flasher`] owns one transport connection and all mutable
//! protocol state for it: the command/response buffers, the unlock flag, the
//! halt mode, the long-operation hint and the erased-sector cache. Sessions
//! are fully independent of each other; nothing here is shared or global.

use alloc::vec;
use alloc::vec::Vec;
use maybe_async::maybe_async;

use crate::chunks::access_chunks;
use crate::error::{Error, Result};
use crate::protocol::{self, mem, CommandBuffer, Response};
use crate::stubs::{self, StubOp, StubWidth};
use crate::transport::Transport;

/// Requested processor mode transition.
///
/// Only a subset has a real effect on this bootloader: the part is halted by
/// construction, so the halt requests are accepted no-ops, and only
/// [`HaltMode::Reboot`] actually changes anything. The remaining modes are
/// logged as unsupported. The recorded mode is updated in every case.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltMode {
    /// Reset and halt (no-op: the bootloader is always halted).
    HaltAndReset = 0,
    /// Leave the bootloader and start the application.
    Reboot = 1,
    /// Resume execution (unsupported).
    Resume = 2,
    /// Enter the bootloader (unsupported: already there).
    GoToBootloader = 3,
    /// Halt without resetting (no-op).
    HaltButNoReset = 5,
}

/// Check whether an address decodes into flash-backed memory (main flash or
/// the system/bootloader window). Writes to these ranges get readback
/// verification; erase bookkeeping applies to the main flash window only.
pub fn is_flash_address(addr: u32) -> bool {
    (addr & mem::FLASH_REGION_MASK) == mem::FLASH_BASE
        || (addr & mem::SYS_REGION_MASK) == mem::SYS_REGION_MASK
}

/// Mutable per-session protocol state.
pub(crate) struct SessionState {
    pub(crate) flash_unlocked: bool,
    pub(crate) halt_mode: HaltMode,
    /// Set before erase and flash block programming; cleared by the next
    /// successful generic write. Widens the completion polling window.
    pub(crate) long_operation: bool,
    pub(crate) sector_size: u32,
    /// Flash capacity in KiB, recorded by `chip_info`.
    pub(crate) flash_size: u32,
    pub(crate) chip_id: u32,
    pub(crate) nr_debug_registers: u32,
    /// Optimistic erased-sector cache, indexed by sector. Entries are set
    /// immediately before the erase command is issued and never invalidated
    /// except by this session's own erase calls.
    pub(crate) sector_erased: Vec<bool>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            flash_unlocked: false,
            halt_mode: HaltMode::HaltAndReset,
            long_operation: false,
            sector_size: mem::SECTOR_SIZE,
            flash_size: 0,
            chip_id: 0,
            nr_debug_registers: 32,
            sector_erased: vec![false; mem::MAX_FLASH_SECTORS],
        }
    }
}

/// Session handle for one b003 bootloader device.
pub struct B003Flasher<T: Transport> {
    pub(crate) transport: T,
    pub(crate) cmd: CommandBuffer,
    pub(crate) resp: Response,
    pub(crate) state: SessionState,
}

impl<T: Transport> B003Flasher<T> {
    /// Create a session over an unopened (or already open) transport.
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            cmd: CommandBuffer::new(),
            resp: Response::new(),
            state: SessionState::new(),
        }
    }

    /// Access the underlying transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Mutable access to the underlying transport.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Open the transport and keep the bootloader resident by halting its
    /// boot countdown.
    #[maybe_async]
    pub async fn init(&mut self) -> Result<()> {
        self.transport.open().await?;
        self.halt_boot_countdown().await
    }

    /// Chip id recorded for this session.
    pub fn chip_id(&self) -> u32 {
        self.state.chip_id
    }

    /// Number of debug registers the interface exposes.
    pub fn nr_debug_registers(&self) -> u32 {
        self.state.nr_debug_registers
    }

    /// Halt mode last requested through [`set_halt_mode`](Self::set_halt_mode).
    pub fn halt_mode(&self) -> HaltMode {
        self.state.halt_mode
    }

    /// Flash capacity in KiB, once [`chip_info`](Self::chip_info) has
    /// recorded it (0 before that).
    pub fn flash_size_kb(&self) -> u32 {
        self.state.flash_size
    }

    /// Whether this session believes the sector covering `address` is
    /// erased. Only main-flash addresses are tracked.
    pub fn is_sector_erased(&self, address: u32) -> bool {
        if (address & mem::FLASH_REGION_MASK) != mem::FLASH_BASE {
            return false;
        }
        let sector = ((address & 0x00FF_FFFF) / self.state.sector_size) as usize;
        self.state.sector_erased.get(sector).copied().unwrap_or(false)
    }

    // =======================================================================
    // Commit engine
    // =======================================================================

    /// Seal the composed command and run it on the device.
    ///
    /// With `expect_response` the same report slot is polled until the
    /// completion byte flips; without it (reboot - the device resets before
    /// it could answer) the call returns right after the send.
    #[maybe_async]
    pub(crate) async fn commit(&mut self, expect_response: bool) -> Result<()> {
        let report = self.cmd.seal();

        if !self.transport.is_open() {
            log::warn!("device not open, re-opening");
            self.transport.open().await?;
        }

        let mut sent = false;
        for attempt in 0..protocol::SEND_ATTEMPTS {
            match self
                .transport
                .send_feature_report(protocol::REPORT_ID, &report[1..])
                .await
            {
                Ok(()) => {
                    sent = true;
                    break;
                }
                Err(e) => {
                    log::warn!("feature report send failed (attempt {}): {}", attempt + 1, e);
                    self.transport.delay_ms(protocol::RETRY_DELAY_MS).await;
                }
            }
        }
        if !sent {
            log::error!("giving up after {} send attempts", protocol::SEND_ATTEMPTS);
            return Err(Error::Io);
        }

        if !expect_response {
            return Ok(());
        }

        // The stub runs as a blocking routine with no notification channel;
        // completion is observed by re-reading the report slot until the
        // sentinel flips. The long-operation hint widens the window for
        // erase and flash programming.
        let rounds = if self.state.long_operation {
            protocol::POLL_ROUNDS * 2
        } else {
            protocol::POLL_ROUNDS
        };
        let mut read_failures = 0u32;
        let mut round = 0u32;
        while round < rounds {
            self.resp.prepare();
            match self
                .transport
                .receive_feature_report(protocol::REPORT_ID, self.resp.as_mut_slice())
                .await
            {
                Ok(_) => {}
                Err(e) => {
                    read_failures += 1;
                    log::warn!("feature report receive failed ({}): {}", read_failures, e);
                    if read_failures > protocol::RECEIVE_ATTEMPTS {
                        return Err(Error::Io);
                    }
                    continue;
                }
            }

            if self.resp.is_complete() {
                return Ok(());
            }

            round += 1;
            self.transport.delay_ms(protocol::POLL_INTERVAL_MS).await;
        }

        log::error!("timed out waiting for stub completion");
        Err(Error::Timeout)
    }

    /// Compose and run one aligned transfer: stub, (address, length)
    /// parameters, optional write payload.
    #[maybe_async]
    async fn run_transfer(
        &mut self,
        op: StubOp,
        width: StubWidth,
        addr: u32,
        len: u32,
        payload: Option<&[u8]>,
    ) -> Result<()> {
        self.cmd.reset();
        self.cmd.push_bytes(stubs::transfer_stub(op, width));
        self.cmd.push_word(addr);
        self.cmd.push_word(len);
        if let Some(data) = payload {
            self.cmd.set_payload(data);
        }
        self.commit(true).await
    }

    // =======================================================================
    // Generic memory access
    // =======================================================================

    /// Read an arbitrary byte range, decomposed into aligned stub transfers.
    #[maybe_async]
    pub async fn read_bytes(&mut self, address: u32, len: u32) -> Result<Vec<u8>> {
        let mut out = vec![0u8; len as usize];
        for chunk in access_chunks(address, len) {
            self.run_transfer(StubOp::Read, chunk.width, chunk.addr, chunk.len, None)
                .await?;
            let off = (chunk.addr - address) as usize;
            let n = chunk.len as usize;
            out[off..off + n].copy_from_slice(&self.resp.payload()[..n]);
        }
        Ok(out)
    }

    /// Write an arbitrary byte range, decomposed into aligned stub
    /// transfers. Flash-range targets are verified against the stub's
    /// readback; RAM targets are not (no readback is guaranteed there).
    #[maybe_async]
    pub async fn write_bytes(&mut self, address: u32, data: &[u8]) -> Result<()> {
        let is_flash = is_flash_address(address);
        for chunk in access_chunks(address, data.len() as u32) {
            let off = (chunk.addr - address) as usize;
            let n = chunk.len as usize;
            let slice = &data[off..off + n];
            self.run_transfer(StubOp::Write, chunk.width, chunk.addr, chunk.len, Some(slice))
                .await?;
            if is_flash && &self.resp.payload()[..n] != slice {
                log::error!(
                    "write verify failed: {} bytes at 0x{:08X}",
                    chunk.len,
                    chunk.addr
                );
                return Err(Error::Verify { addr: chunk.addr });
            }
        }
        self.state.long_operation = false;
        Ok(())
    }

    /// Read a single byte.
    #[maybe_async]
    pub async fn read_byte(&mut self, address: u32) -> Result<u8> {
        let bytes = self.read_bytes(address, 1).await?;
        Ok(bytes[0])
    }

    /// Read a 16-bit half-word (little-endian).
    #[maybe_async]
    pub async fn read_half_word(&mut self, address: u32) -> Result<u16> {
        let bytes = self.read_bytes(address, 2).await?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a 32-bit word (little-endian).
    #[maybe_async]
    pub async fn read_word(&mut self, address: u32) -> Result<u32> {
        let bytes = self.read_bytes(address, 4).await?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write a single byte.
    #[maybe_async]
    pub async fn write_byte(&mut self, address: u32, value: u8) -> Result<()> {
        self.write_bytes(address, &[value]).await
    }

    /// Write a 16-bit half-word (little-endian).
    #[maybe_async]
    pub async fn write_half_word(&mut self, address: u32, value: u16) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes()).await
    }

    /// Write a 32-bit word (little-endian).
    #[maybe_async]
    pub async fn write_word(&mut self, address: u32, value: u32) -> Result<()> {
        self.write_bytes(address, &value.to_le_bytes()).await
    }

    // =======================================================================
    // Mode control
    // =======================================================================

    /// Zero the bootloader's boot countdown so it stays resident instead of
    /// launching the application.
    #[maybe_async]
    pub async fn halt_boot_countdown(&mut self) -> Result<()> {
        log::info!("halting boot countdown");
        self.cmd.reset();
        self.cmd.push_bytes(&stubs::HALT_COUNTDOWN);
        self.commit(true).await
    }

    /// Leave the bootloader and start the application, fire-and-forget.
    /// The device resets before it could answer, so no response is polled.
    #[maybe_async]
    pub async fn reboot(&mut self) -> Result<()> {
        log::info!("rebooting target");
        self.cmd.reset();
        self.cmd.push_bytes(&stubs::RUN_APP);
        self.commit(false).await
    }

    /// Apply a halt-mode transition. The recorded mode is updated even for
    /// transitions this bootloader cannot perform.
    #[maybe_async]
    pub async fn set_halt_mode(&mut self, mode: HaltMode) -> Result<()> {
        match mode {
            // The part sits halted in the bootloader already.
            HaltMode::HaltAndReset | HaltMode::HaltButNoReset => {}
            HaltMode::Reboot => self.reboot().await?,
            HaltMode::Resume => {
                log::warn!("this bootloader cannot resume the application");
            }
            HaltMode::GoToBootloader => {
                log::warn!("already running the bootloader");
            }
        }
        self.state.halt_mode = mode;
        Ok(())
    }
}
