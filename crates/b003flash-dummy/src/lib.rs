//! b003flash-dummy - In-memory bootloader emulator for testing
//!
//! This crate provides a dummy transport that emulates a b003 bootloader
//! device in memory: it dispatches uploaded stubs by their byte content,
//! models the flash controller's lock/erase/program register interface with
//! AND-style flash semantics, and offers fault injection (failed sends and
//! receives, stalled completion) plus operation counters. It is the test
//! vehicle for the session engine - no hardware required.

use b003flash_core::error::{Error, Result};
use b003flash_core::protocol::{
    mem, regs, Ctlr, COMPLETION_MARKER, COMPLETION_OFFSET, MAGIC_GO, MAGIC_GO_OFFSET, MAX_PAYLOAD,
    PAYLOAD_OFFSET, REPORT_LEN, STUB_OFFSET,
};
use b003flash_core::stubs;
use b003flash_core::Transport;
use maybe_async::maybe_async;

/// Emulated main flash size.
pub const FLASH_SIZE: usize = 16 * 1024;

/// Emulated RAM size.
pub const RAM_SIZE: usize = 2 * 1024;

/// Base address of emulated RAM.
pub const RAM_BASE: u32 = 0x2000_0000;

/// Base of the emulated system window (bootloader, signature, option bytes).
const SYS_BASE: u32 = 0x1FFF_F000;

/// Size of the emulated system window.
const SYS_SIZE: usize = 0x1000;

/// Offset of the parameter words in a command report.
const PARAM_OFFSET: usize = 52;

/// Emulated b003 bootloader behind the [`Transport`] contract.
///
/// Flash and the system window behave like NOR flash (writes can only clear
/// bits; erase sets a 64-byte page to 0xFF), RAM accepts arbitrary writes,
/// and the flash controller registers implement the key/lock, page-erase and
/// page-program sequences the driver issues.
pub struct DummyBootloader {
    open: bool,
    flash: Vec<u8>,
    sys: Vec<u8>,
    ram: Vec<u8>,

    // Flash controller model
    ctlr: u32,
    flash_addr: u32,
    obr: u32,
    keyr_first: bool,
    obkeyr_first: bool,
    modekeyr_first: bool,
    option_unlocked: bool,

    // Pending response report
    resp: [u8; REPORT_LEN],

    // Fault injection
    fail_sends: u32,
    fail_receives: u32,
    stalled: bool,
    pending_polls: u32,

    // Observability
    send_attempts: u32,
    receive_attempts: u32,
    delay_calls: u32,
    block_writes: Vec<u32>,
    erases: Vec<u32>,
    rebooted: bool,
}

impl Default for DummyBootloader {
    fn default() -> Self {
        Self::new()
    }
}

impl DummyBootloader {
    /// Create a fresh (erased, locked) emulated device.
    pub fn new() -> Self {
        let mut dev = Self {
            open: false,
            flash: vec![0xFF; FLASH_SIZE],
            sys: vec![0xFF; SYS_SIZE],
            ram: vec![0x00; RAM_SIZE],
            ctlr: Ctlr::LOCK_MASK,
            flash_addr: 0,
            obr: 0,
            keyr_first: false,
            obkeyr_first: false,
            modekeyr_first: false,
            option_unlocked: false,
            resp: [0; REPORT_LEN],
            fail_sends: 0,
            fail_receives: 0,
            stalled: false,
            pending_polls: 0,
            send_attempts: 0,
            receive_attempts: 0,
            delay_calls: 0,
            block_writes: Vec::new(),
            erases: Vec::new(),
            rebooted: false,
        };
        // Electronic signature defaults: 16 KiB part with a fixed unique id.
        dev.poke(mem::ESIG_FLACAP, &16u32.to_le_bytes());
        dev.poke(mem::ESIG_UNIID[0], &0x1111_2222u32.to_le_bytes());
        dev.poke(mem::ESIG_UNIID[1], &0x3333_4444u32.to_le_bytes());
        dev.poke(mem::ESIG_UNIID[2], &0x5555_6666u32.to_le_bytes());
        dev
    }

    // =======================================================================
    // Test setup and observation
    // =======================================================================

    /// Directly overwrite backing memory (no flash semantics), for test
    /// setup.
    pub fn poke(&mut self, addr: u32, data: &[u8]) {
        let len = data.len();
        if let Some(slice) = self.region_mut(addr, len) {
            slice[..len].copy_from_slice(data);
        } else {
            panic!("poke outside emulated memory: 0x{addr:08X}");
        }
    }

    /// Read backing memory, for test assertions.
    pub fn peek(&mut self, addr: u32, len: usize) -> Vec<u8> {
        self.read_mem(addr, len)
    }

    /// Fail the next `n` feature-report sends with a transport error.
    pub fn fail_next_sends(&mut self, n: u32) {
        self.fail_sends = n;
    }

    /// Fail the next `n` feature-report receives with a transport error.
    pub fn fail_next_receives(&mut self, n: u32) {
        self.fail_receives = n;
    }

    /// Never report stub completion.
    pub fn stall_completion(&mut self, stalled: bool) {
        self.stalled = stalled;
    }

    /// Report the next `n` polls as still-running before completing.
    pub fn complete_after_polls(&mut self, n: u32) {
        self.pending_polls = n;
    }

    /// Total send attempts observed, including injected failures.
    pub fn send_attempts(&self) -> u32 {
        self.send_attempts
    }

    /// Total receive attempts observed, including injected failures.
    pub fn receive_attempts(&self) -> u32 {
        self.receive_attempts
    }

    /// Number of delay suspension points the driver hit.
    pub fn delay_calls(&self) -> u32 {
        self.delay_calls
    }

    /// Addresses handed to the 64-byte flash-program stub, in order.
    pub fn block_write_log(&self) -> &[u32] {
        &self.block_writes
    }

    /// Page addresses erased through the controller, in order.
    pub fn erase_log(&self) -> &[u32] {
        &self.erases
    }

    /// Whether the run stub was executed.
    pub fn rebooted(&self) -> bool {
        self.rebooted
    }

    /// Whether both controller lock bits have been keyed open.
    pub fn unlocked(&self) -> bool {
        self.ctlr & Ctlr::LOCK_MASK == 0
    }

    /// Whether the option-byte key sequence has been written.
    pub fn option_bytes_unlocked(&self) -> bool {
        self.option_unlocked
    }

    // =======================================================================
    // Memory model
    // =======================================================================

    fn region_mut(&mut self, addr: u32, len: usize) -> Option<&mut [u8]> {
        let flash_end = mem::FLASH_BASE + FLASH_SIZE as u32;
        let sys_end = SYS_BASE + SYS_SIZE as u32;
        let ram_end = RAM_BASE + RAM_SIZE as u32;
        if addr >= mem::FLASH_BASE && addr + len as u32 <= flash_end {
            let off = (addr - mem::FLASH_BASE) as usize;
            Some(&mut self.flash[off..off + len])
        } else if addr >= SYS_BASE && addr + len as u32 <= sys_end {
            let off = (addr - SYS_BASE) as usize;
            Some(&mut self.sys[off..off + len])
        } else if addr >= RAM_BASE && addr + len as u32 <= ram_end {
            let off = (addr - RAM_BASE) as usize;
            Some(&mut self.ram[off..off + len])
        } else {
            None
        }
    }

    fn is_peripheral(addr: u32) -> bool {
        (addr & 0xFFFF_F000) == 0x4002_2000
    }

    fn read_peripheral(&self, addr: u32) -> u32 {
        match addr {
            regs::CTLR => self.ctlr,
            regs::ADDR => self.flash_addr,
            regs::OBR => self.obr,
            regs::STATR => 0,
            _ => 0,
        }
    }

    fn write_peripheral(&mut self, addr: u32, value: u32) {
        match addr {
            regs::KEYR => {
                if value == regs::KEY1 {
                    self.keyr_first = true;
                } else if value == regs::KEY2 && self.keyr_first {
                    self.ctlr &= !Ctlr::LOCK.bits();
                    self.keyr_first = false;
                }
            }
            regs::OBKEYR => {
                if value == regs::KEY1 {
                    self.obkeyr_first = true;
                } else if value == regs::KEY2 && self.obkeyr_first {
                    self.option_unlocked = true;
                    self.obkeyr_first = false;
                }
            }
            regs::MODEKEYR => {
                if value == regs::KEY1 {
                    self.modekeyr_first = true;
                } else if value == regs::KEY2 && self.modekeyr_first {
                    self.ctlr &= !Ctlr::FLOCK.bits();
                    self.modekeyr_first = false;
                }
            }
            regs::ADDR => self.flash_addr = value,
            regs::CTLR => {
                if self.ctlr & Ctlr::LOCK_MASK != 0 {
                    log::warn!("CTLR write 0x{value:08X} while locked, ignored");
                    return;
                }
                let lock_bits = self.ctlr & Ctlr::LOCK_MASK;
                self.ctlr = value | lock_bits;
                let start_erase = Ctlr::STRT.bits() | Ctlr::PER.bits();
                if value & start_erase == start_erase {
                    self.erase_page(self.flash_addr);
                }
            }
            _ => {}
        }
    }

    fn erase_page(&mut self, addr: u32) {
        let page = addr & !(mem::SECTOR_SIZE - 1);
        self.erases.push(page);
        if let Some(slice) = self.region_mut(page, mem::SECTOR_SIZE as usize) {
            slice.fill(0xFF);
        } else {
            log::warn!("page erase outside emulated memory: 0x{page:08X}");
        }
    }

    fn read_mem(&mut self, addr: u32, len: usize) -> Vec<u8> {
        if Self::is_peripheral(addr) {
            let word = self.read_peripheral(addr);
            let mut out = vec![0u8; len];
            let n = len.min(4);
            out[..n].copy_from_slice(&word.to_le_bytes()[..n]);
            return out;
        }
        match self.region_mut(addr, len) {
            Some(slice) => slice.to_vec(),
            None => {
                log::warn!("read outside emulated memory: 0x{addr:08X}");
                vec![0; len]
            }
        }
    }

    fn write_mem(&mut self, addr: u32, data: &[u8]) {
        if Self::is_peripheral(addr) {
            let mut word = [0u8; 4];
            word[..data.len().min(4)].copy_from_slice(&data[..data.len().min(4)]);
            self.write_peripheral(addr, u32::from_le_bytes(word));
            return;
        }
        let nor = addr < RAM_BASE;
        match self.region_mut(addr, data.len()) {
            Some(slice) => {
                if nor {
                    // NOR semantics: programming can only clear bits.
                    for (dst, src) in slice.iter_mut().zip(data) {
                        *dst &= src;
                    }
                } else {
                    slice.copy_from_slice(data);
                }
            }
            None => log::warn!("write outside emulated memory: 0x{addr:08X}"),
        }
    }

    // =======================================================================
    // Stub dispatch
    // =======================================================================

    fn param(report: &[u8; REPORT_LEN], offset: usize) -> u32 {
        u32::from_le_bytes([
            report[offset],
            report[offset + 1],
            report[offset + 2],
            report[offset + 3],
        ])
    }

    fn execute(&mut self, report: &[u8; REPORT_LEN]) {
        self.resp = [0; REPORT_LEN];
        self.resp[0] = report[0];

        let stub48 = &report[STUB_OFFSET..STUB_OFFSET + 48];
        let addr = Self::param(report, PARAM_OFFSET);
        let len = Self::param(report, PARAM_OFFSET + 4) as usize;
        let len = len.min(MAX_PAYLOAD);

        let is_read = stub48 == stubs::BYTE_READ
            || stub48 == stubs::HALF_READ
            || stub48 == stubs::WORD_READ;
        let is_write = stub48 == stubs::BYTE_WRITE
            || stub48 == stubs::HALF_WRITE
            || stub48 == stubs::WORD_WRITE;

        if is_read {
            let data = self.read_mem(addr, len);
            self.resp[PAYLOAD_OFFSET..PAYLOAD_OFFSET + len].copy_from_slice(&data);
        } else if is_write {
            let payload: Vec<u8> = report[PAYLOAD_OFFSET..PAYLOAD_OFFSET + len].to_vec();
            self.write_mem(addr, &payload);
            // The report slot retains what memory now holds; the host uses
            // this as its flash readback.
            let readback = self.read_mem(addr, len);
            self.resp[PAYLOAD_OFFSET..PAYLOAD_OFFSET + len].copy_from_slice(&readback);
        } else if stub48 == stubs::FLASH_WRITE64 {
            self.block_writes.push(addr);
            let payload: Vec<u8> =
                report[PAYLOAD_OFFSET..PAYLOAD_OFFSET + mem::BLOCK_SIZE].to_vec();
            self.write_mem(addr, &payload);
        } else if report[STUB_OFFSET..STUB_OFFSET + stubs::HALT_COUNTDOWN.len()]
            == stubs::HALT_COUNTDOWN
        {
            // Countdown cleared; the bootloader just stays resident.
        } else if report[STUB_OFFSET..STUB_OFFSET + stubs::RUN_APP.len()] == stubs::RUN_APP {
            self.rebooted = true;
        } else {
            log::warn!("unrecognized stub uploaded, ignoring");
        }

        self.resp[COMPLETION_OFFSET] = COMPLETION_MARKER;
    }
}

#[maybe_async]
impl Transport for DummyBootloader {
    async fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    async fn send_feature_report(&mut self, report_id: u8, data: &[u8]) -> Result<()> {
        self.send_attempts += 1;
        if self.fail_sends > 0 {
            self.fail_sends -= 1;
            return Err(Error::Io);
        }

        let mut report = [0u8; REPORT_LEN];
        report[0] = report_id;
        let len = data.len().min(REPORT_LEN - 1);
        report[1..1 + len].copy_from_slice(&data[..len]);

        // The device only acts once the go marker is in place.
        if report[MAGIC_GO_OFFSET..] != MAGIC_GO {
            log::warn!("report without go marker, not executed");
            return Ok(());
        }

        self.execute(&report);
        Ok(())
    }

    async fn receive_feature_report(&mut self, _report_id: u8, buf: &mut [u8]) -> Result<usize> {
        self.receive_attempts += 1;
        if self.fail_receives > 0 {
            self.fail_receives -= 1;
            return Err(Error::Io);
        }

        let mut resp = self.resp;
        if self.stalled {
            resp[COMPLETION_OFFSET] = 0;
        } else if self.pending_polls > 0 {
            self.pending_polls -= 1;
            resp[COMPLETION_OFFSET] = 0;
        }

        let len = buf.len().min(REPORT_LEN);
        buf[..len].copy_from_slice(&resp[..len]);
        Ok(len)
    }

    async fn delay_ms(&mut self, _ms: u32) {
        // No waiting needed for in-memory operations.
        self.delay_calls += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use b003flash_core::{B003Flasher, Error, HaltMode};

    fn flasher() -> B003Flasher<DummyBootloader> {
        B003Flasher::new(DummyBootloader::new())
    }

    fn pattern(len: usize, seed: u8) -> Vec<u8> {
        (0..len)
            .map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed))
            .collect()
    }

    #[test]
    fn test_ram_round_trip() {
        let mut dev = flasher();
        for &len in &[1usize, 2, 3, 4, 7, 64, 130] {
            for base in [RAM_BASE, RAM_BASE + 1] {
                let data = pattern(len, base as u8 ^ len as u8);
                dev.write_bytes(base, &data).unwrap();
                let back = dev.read_bytes(base, len as u32).unwrap();
                assert_eq!(back, data, "len {len} at 0x{base:08X}");
            }
        }
    }

    #[test]
    fn test_unlock_sequence() {
        let mut dev = flasher();
        assert!(!dev.transport().unlocked());
        dev.unlock_flash().unwrap();
        assert!(dev.transport().unlocked());
        assert!(dev.transport().option_bytes_unlocked());
    }

    #[test]
    fn test_erase_marks_cache_and_blanks_flash() {
        let mut dev = flasher();
        let addr = mem::FLASH_BASE + 0x40;
        dev.transport_mut().poke(addr, &[0u8; 64]);
        assert!(!dev.is_sector_erased(addr));
        dev.erase(addr, 64).unwrap();
        assert!(dev.is_sector_erased(addr));
        assert!(dev.transport_mut().peek(addr, 64).iter().all(|&b| b == 0xFF));
        // A second erase of the same sector must also succeed.
        dev.erase(addr, 64).unwrap();
        assert_eq!(dev.transport().erase_log(), [addr, addr]);
    }

    #[test]
    fn test_erase_rounds_down_and_spans_sectors() {
        let mut dev = flasher();
        dev.erase(mem::FLASH_BASE + 70, 60).unwrap();
        assert_eq!(
            dev.transport().erase_log(),
            [mem::FLASH_BASE + 64, mem::FLASH_BASE + 128]
        );
    }

    #[test]
    fn test_read_modify_write_preserves_neighbors() {
        let mut dev = flasher();
        let base = mem::FLASH_BASE;
        let original = pattern(64, 3);
        dev.transport_mut().poke(base, &original);
        let new = vec![0xA5u8; 10];
        dev.write_image(&new, base + 10).unwrap();
        let after = dev.transport_mut().peek(base, 64);
        assert_eq!(&after[..10], &original[..10]);
        assert_eq!(&after[10..20], &new[..]);
        assert_eq!(&after[20..], &original[20..]);
    }

    #[test]
    fn test_partial_tail_sector_is_reconstructed() {
        let mut dev = flasher();
        let image = pattern(96, 7);
        dev.write_image(&image, mem::FLASH_BASE).unwrap();
        assert_eq!(dev.transport_mut().peek(mem::FLASH_BASE, 96), image);
        assert!(dev
            .transport_mut()
            .peek(mem::FLASH_BASE + 96, 32)
            .iter()
            .all(|&b| b == 0xFF));
    }

    #[test]
    fn test_aligned_image_write_block_sequence() {
        let mut dev = flasher();
        let base = mem::FLASH_BASE;
        // Pre-erase so programming is the only remaining work.
        dev.erase(base, 256).unwrap();
        assert_eq!(dev.transport().erase_log().len(), 4);
        let image: Vec<u8> = (0..=255u8).collect();
        dev.write_image(&image, 0).unwrap();
        assert_eq!(
            dev.transport().block_write_log(),
            [base, base + 0x40, base + 0x80, base + 0xC0]
        );
        assert_eq!(dev.transport_mut().peek(base, 256), image);
        // The cache kept the pre-erased sectors from being erased again.
        assert_eq!(dev.transport().erase_log().len(), 4);
    }

    #[test]
    fn test_send_retries_then_success() {
        let mut dev = flasher();
        dev.transport_mut().fail_next_sends(3);
        dev.write_word(RAM_BASE, 0x1122_3344).unwrap();
        assert_eq!(dev.transport().send_attempts(), 4);
        assert_eq!(dev.read_word(RAM_BASE).unwrap(), 0x1122_3344);
    }

    #[test]
    fn test_send_budget_exhausted() {
        let mut dev = flasher();
        dev.transport_mut().fail_next_sends(10);
        assert_eq!(dev.write_word(RAM_BASE, 1), Err(Error::Io));
        assert_eq!(dev.transport().send_attempts(), 10);
    }

    #[test]
    fn test_poll_budget_exhausted() {
        let mut dev = flasher();
        dev.transport_mut().stall_completion(true);
        assert_eq!(dev.read_word(RAM_BASE), Err(Error::Timeout));
        assert_eq!(dev.transport().receive_attempts(), 20);
    }

    #[test]
    fn test_slow_completion_recovers() {
        let mut dev = flasher();
        dev.transport_mut().complete_after_polls(3);
        dev.read_word(RAM_BASE).unwrap();
        assert_eq!(dev.transport().receive_attempts(), 4);
    }

    #[test]
    fn test_receive_failures_within_budget() {
        let mut dev = flasher();
        dev.transport_mut().fail_next_receives(5);
        dev.read_word(RAM_BASE).unwrap();
    }

    #[test]
    fn test_receive_budget_exhausted() {
        let mut dev = flasher();
        dev.transport_mut().fail_next_receives(11);
        assert_eq!(dev.read_word(RAM_BASE), Err(Error::Io));
    }

    #[test]
    fn test_flash_write_verify_mismatch() {
        let mut dev = flasher();
        // Unerased flash cannot take new bits; the readback betrays it.
        dev.transport_mut().poke(mem::FLASH_BASE, &[0x00; 4]);
        assert_eq!(
            dev.write_bytes(mem::FLASH_BASE, &[0xAB, 0xCD, 0xEF, 0x01]),
            Err(Error::Verify {
                addr: mem::FLASH_BASE
            })
        );
    }

    #[test]
    fn test_chip_info_splits_packed_fields() {
        let mut dev = flasher();
        dev.transport_mut()
            .poke(mem::OPTION_BASE, &0x1234_5678u32.to_le_bytes());
        dev.transport_mut()
            .poke(mem::OPTION_BASE + 4, &0x00FF_0055u32.to_le_bytes());
        let info = dev.chip_info().unwrap();
        assert_eq!(info.user, 0x1234);
        assert_eq!(info.rdpr, 0x5678);
        assert_eq!(info.data1, 0x00FF);
        assert_eq!(info.data0, 0x0055);
        assert_eq!(info.flash_size_kb, 16);
        assert_eq!(info.uid, [0x1111_2222, 0x3333_4444, 0x5555_6666]);
    }

    #[test]
    fn test_reboot_is_fire_and_forget() {
        let mut dev = flasher();
        dev.init().unwrap();
        let receives = dev.transport().receive_attempts();
        dev.set_halt_mode(HaltMode::Reboot).unwrap();
        assert!(dev.transport().rebooted());
        assert_eq!(dev.transport().receive_attempts(), receives);
        assert_eq!(dev.halt_mode(), HaltMode::Reboot);
    }

    #[test]
    fn test_unsupported_modes_only_recorded() {
        let mut dev = flasher();
        dev.set_halt_mode(HaltMode::Resume).unwrap();
        assert_eq!(dev.halt_mode(), HaltMode::Resume);
        dev.set_halt_mode(HaltMode::GoToBootloader).unwrap();
        assert_eq!(dev.halt_mode(), HaltMode::GoToBootloader);
        assert_eq!(dev.transport().send_attempts(), 0);
    }

    #[test]
    fn test_reserved_ram_window_refused() {
        let mut dev = flasher();
        assert_eq!(
            dev.write_image(&[0u8; 4], 0x1FFF_F7C4),
            Err(Error::NotImplemented)
        );
    }

    #[test]
    fn test_partial_sector_outside_flash_refused() {
        let mut dev = flasher();
        assert_eq!(
            dev.write_image(&[0u8; 10], RAM_BASE),
            Err(Error::NotImplemented)
        );
    }

    #[test]
    fn test_image_offset_normalized_into_flash() {
        let mut dev = flasher();
        dev.write_image(&[0x42u8; 64], 0x1000).unwrap();
        assert_eq!(
            dev.transport().block_write_log(),
            [mem::FLASH_BASE + 0x1000]
        );
        assert!(dev
            .transport_mut()
            .peek(mem::FLASH_BASE + 0x1000, 64)
            .iter()
            .all(|&b| b == 0x42));
    }

    #[test]
    fn test_bootloader_image_write_does_not_reset() {
        let mut dev = flasher();
        dev.write_image(&[0xEEu8; 64], mem::BOOTLOADER_BASE).unwrap();
        assert!(!dev.transport().rebooted());
        assert_eq!(dev.halt_mode(), HaltMode::HaltButNoReset);
        assert_eq!(
            dev.transport().block_write_log(),
            [mem::BOOTLOADER_BASE]
        );
    }

    #[test]
    fn test_commit_reopens_closed_transport() {
        let mut dev = flasher();
        assert!(!dev.transport().is_open());
        dev.write_word(RAM_BASE, 5).unwrap();
        assert!(dev.transport().is_open());
    }

    #[test]
    fn test_block_write_erases_only_uncached_sectors() {
        let mut dev = flasher();
        let addr = mem::FLASH_BASE + 0x80;
        dev.block_write64(addr, &[0x5Au8; 64]).unwrap();
        assert_eq!(dev.transport().erase_log(), [addr]);
        // Cached as erased now: a rewrite must not trigger another erase.
        dev.block_write64(addr, &[0x18u8; 64]).unwrap();
        assert_eq!(dev.transport().erase_log(), [addr]);
    }

    #[test]
    fn test_block_write_needs_full_granule() {
        let mut dev = flasher();
        assert_eq!(
            dev.block_write64(mem::FLASH_BASE, &[0u8; 32]),
            Err(Error::BufferTooSmall)
        );
    }

    #[test]
    fn test_failed_erase_register_write_aborts() {
        let mut dev = flasher();
        dev.unlock_flash().unwrap();
        dev.transport_mut().fail_next_sends(30);
        assert_eq!(dev.erase(mem::FLASH_BASE, 64), Err(Error::FlashOp));
        // The optimistic cache entry was recorded before the failure.
        assert!(dev.is_sector_erased(mem::FLASH_BASE));
    }
}
