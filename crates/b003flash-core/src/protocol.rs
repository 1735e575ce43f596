//! Wire format of the b003 bootloader control channel
//!
//! Every exchange with the bootloader is one 128-byte feature report. The
//! host places a stub at offset 4, appends its parameters at the running
//! write cursor, copies any payload to offset 60, and finally writes a
//! 4-byte "go" marker at offset 124. The device executes the stub and flips
//! byte 1 of the same report slot to 0xFF when it is done; readback data is
//! mirrored at offset 60.

use bitflags::bitflags;

// ===========================================================================
// Report layout
// ===========================================================================

/// Report id used for every command and response.
pub const REPORT_ID: u8 = 0xAA;

/// Fixed size of command and response reports.
pub const REPORT_LEN: usize = 128;

/// Offset where the stub machine code is placed.
pub const STUB_OFFSET: usize = 4;

/// Offset of the write payload / readback data.
pub const PAYLOAD_OFFSET: usize = 60;

/// Hard limit of the payload field.
pub const MAX_PAYLOAD: usize = 64;

/// Offset of the trailer marker.
pub const MAGIC_GO_OFFSET: usize = 124;

/// Trailer marker that tells the bootloader to execute the uploaded stub.
pub const MAGIC_GO: [u8; 4] = [0xCD, 0xAB, 0x34, 0x12];

/// Response byte that signals stub completion.
pub const COMPLETION_OFFSET: usize = 1;

/// Value of the completion byte once the stub has run.
pub const COMPLETION_MARKER: u8 = 0xFF;

// ===========================================================================
// Retry / poll budgets
// ===========================================================================

/// Transport send attempts before a commit fails.
pub const SEND_ATTEMPTS: u32 = 10;

/// Transport receive failures tolerated while polling for completion.
pub const RECEIVE_ATTEMPTS: u32 = 10;

/// Completion polling rounds for a normal operation.
pub const POLL_ROUNDS: u32 = 20;

/// Fixed delay between send retries, in milliseconds.
pub const RETRY_DELAY_MS: u32 = 50;

/// Fixed delay between completion polls, in milliseconds.
pub const POLL_INTERVAL_MS: u32 = 50;

// ===========================================================================
// Memory map
// ===========================================================================

/// Memory-map constants of the supported parts.
pub mod mem {
    /// Region mask selecting the main flash window.
    pub const FLASH_REGION_MASK: u32 = 0xFF00_0000;

    /// Base address of main flash.
    pub const FLASH_BASE: u32 = 0x0800_0000;

    /// Region mask (and value) selecting the system/bootloader window.
    pub const SYS_REGION_MASK: u32 = 0x1FFF_0000;

    /// Base address of the bootloader image in system flash.
    pub const BOOTLOADER_BASE: u32 = 0x1FFF_F000;

    /// Start of the RAM window the bootloader reserves for itself
    /// (exclusive - addresses strictly above this are refused).
    pub const RESERVED_RAM_START: u32 = 0x1FFF_F7C0;

    /// End of the reserved RAM window (exclusive).
    pub const RESERVED_RAM_END: u32 = 0x2000_0000;

    /// Flash erase granularity in bytes (fast page erase).
    pub const SECTOR_SIZE: u32 = 64;

    /// Atomic flash program granule in bytes.
    pub const BLOCK_SIZE: usize = 64;

    /// Capacity of the erased-sector cache.
    pub const MAX_FLASH_SECTORS: usize = 262_144;

    /// Option byte block (USER/RDPR, DATA, WRPR words).
    pub const OPTION_BASE: u32 = 0x1FFF_F800;

    /// Electronic signature: flash capacity register.
    pub const ESIG_FLACAP: u32 = 0x1FFF_F7E0;

    /// Electronic signature: the three 32-bit unique id words.
    pub const ESIG_UNIID: [u32; 3] = [0x1FFF_F7E8, 0x1FFF_F7EC, 0x1FFF_F7F0];
}

// ===========================================================================
// FLASH peripheral registers
// ===========================================================================

/// FLASH peripheral register addresses and keys.
pub mod regs {
    /// Main flash key register.
    pub const KEYR: u32 = 0x4002_2004;

    /// Option byte key register.
    pub const OBKEYR: u32 = 0x4002_2008;

    /// Status register (polled on-device by the program stub).
    pub const STATR: u32 = 0x4002_200C;

    /// Control register.
    pub const CTLR: u32 = 0x4002_2010;

    /// Erase/program address register.
    pub const ADDR: u32 = 0x4002_2014;

    /// Option byte status register.
    pub const OBR: u32 = 0x4002_201C;

    /// Fast-mode key register.
    pub const MODEKEYR: u32 = 0x4002_2024;

    /// First unlock key word.
    pub const KEY1: u32 = 0x4567_0123;

    /// Second unlock key word.
    pub const KEY2: u32 = 0xCDEF_89AB;

    /// Read-protection flag in OBR.
    pub const OBR_RDPRT: u32 = 0x2;
}

bitflags! {
    /// Bits of the FLASH control register (CTLR)
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Ctlr: u32 {
        /// Page programming mode
        const PG = 0x0001_0000;
        /// Fast page erase mode
        const PER = 0x0002_0000;
        /// Start the pending erase
        const STRT = 1 << 6;
        /// Load the page buffer
        const BUFLOAD = 0x0008_0000;
        /// Controller locked
        const LOCK = 1 << 7;
        /// Fast-mode locked
        const FLOCK = 1 << 15;
    }
}

impl Ctlr {
    /// Both lock bits - flash is unusable while either is set.
    pub const LOCK_MASK: u32 = Self::LOCK.bits() | Self::FLOCK.bits();
}

// ===========================================================================
// Command composition
// ===========================================================================

/// Composer for the fixed 128-byte command report.
///
/// Appends past the end of the report are dropped with a diagnostic rather
/// than panicking: a malformed command is detectable at the protocol level,
/// and composition bugs are programmer errors, not runtime conditions.
#[derive(Clone)]
pub struct CommandBuffer {
    buf: [u8; REPORT_LEN],
    place: usize,
}

impl Default for CommandBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandBuffer {
    /// Create a zeroed command buffer.
    pub fn new() -> Self {
        let mut cmd = Self {
            buf: [0; REPORT_LEN],
            place: 0,
        };
        cmd.reset();
        cmd
    }

    /// Zero the buffer, set the report id and rewind the write cursor to the
    /// stub slot.
    pub fn reset(&mut self) {
        self.buf.fill(0);
        self.buf[0] = REPORT_ID;
        self.place = STUB_OFFSET;
    }

    /// Append a little-endian 32-bit parameter at the write cursor.
    pub fn push_word(&mut self, value: u32) {
        self.push_bytes(&value.to_le_bytes());
    }

    /// Append raw bytes (typically a stub blob) at the write cursor.
    pub fn push_bytes(&mut self, data: &[u8]) {
        let new_end = self.place + data.len();
        if new_end >= self.buf.len() {
            log::warn!(
                "command append of {} bytes at offset {} overflows the report, dropped",
                data.len(),
                self.place
            );
            return;
        }
        self.buf[self.place..new_end].copy_from_slice(data);
        self.place = new_end;
    }

    /// Copy a write payload into the payload field, truncated to its hard
    /// 64-byte limit.
    pub fn set_payload(&mut self, data: &[u8]) {
        if data.len() > MAX_PAYLOAD {
            log::warn!("payload of {} bytes truncated to {}", data.len(), MAX_PAYLOAD);
        }
        let len = core::cmp::min(data.len(), MAX_PAYLOAD);
        self.buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + len].copy_from_slice(&data[..len]);
    }

    /// Write the go marker and expose the finished report.
    pub fn seal(&mut self) -> &[u8; REPORT_LEN] {
        self.buf[MAGIC_GO_OFFSET..MAGIC_GO_OFFSET + MAGIC_GO.len()].copy_from_slice(&MAGIC_GO);
        &self.buf
    }

    /// Current write cursor.
    pub fn cursor(&self) -> usize {
        self.place
    }
}

// ===========================================================================
// Responses
// ===========================================================================

/// Buffer for a received 128-byte response report.
#[derive(Clone)]
pub struct Response {
    buf: [u8; REPORT_LEN],
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

impl Response {
    /// Create an empty response buffer.
    pub fn new() -> Self {
        Self {
            buf: [0; REPORT_LEN],
        }
    }

    /// Prefill before a receive. A short read must not leave stale completion
    /// state behind.
    pub fn prepare(&mut self) {
        self.buf.fill(COMPLETION_MARKER);
    }

    /// Backing storage handed to the transport.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.buf
    }

    /// Whether the device has flipped the completion byte.
    pub fn is_complete(&self) -> bool {
        self.buf[COMPLETION_OFFSET] == COMPLETION_MARKER
    }

    /// The 64-byte result/readback window.
    pub fn payload(&self) -> &[u8] {
        &self.buf[PAYLOAD_OFFSET..PAYLOAD_OFFSET + MAX_PAYLOAD]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_layout() {
        let mut cmd = CommandBuffer::new();
        cmd.push_word(0xDEAD_BEEF);
        cmd.reset();
        assert_eq!(cmd.cursor(), STUB_OFFSET);
        let report = cmd.seal();
        assert_eq!(report[0], REPORT_ID);
        assert_eq!(&report[MAGIC_GO_OFFSET..], &MAGIC_GO);
        assert!(report[1..MAGIC_GO_OFFSET].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_append_little_endian() {
        let mut cmd = CommandBuffer::new();
        cmd.push_bytes(&[0u8; 48]);
        cmd.push_word(0x0800_1234);
        assert_eq!(cmd.cursor(), 56);
        let report = cmd.seal();
        assert_eq!(&report[52..56], &[0x34, 0x12, 0x00, 0x08]);
    }

    #[test]
    fn test_overflowing_append_is_dropped() {
        let mut cmd = CommandBuffer::new();
        cmd.push_bytes(&[0xAA; 120]);
        assert_eq!(cmd.cursor(), 124);
        // Even an exactly-fitting word is refused: nothing may be composed
        // into the go-marker trailer.
        cmd.push_word(0xFFFF_FFFF);
        assert_eq!(cmd.cursor(), 124);
        cmd.push_bytes(&[0xBB; 8]);
        assert_eq!(cmd.cursor(), 124);
    }

    #[test]
    fn test_payload_truncated_to_limit() {
        let mut cmd = CommandBuffer::new();
        cmd.set_payload(&[0x55; 80]);
        let report = cmd.seal();
        assert!(report[PAYLOAD_OFFSET..PAYLOAD_OFFSET + MAX_PAYLOAD]
            .iter()
            .all(|&b| b == 0x55));
        // The go marker directly follows the payload field and must survive.
        assert_eq!(&report[MAGIC_GO_OFFSET..], &MAGIC_GO);
    }

    #[test]
    fn test_response_completion() {
        let mut resp = Response::new();
        assert!(!resp.is_complete());
        resp.prepare();
        assert!(resp.is_complete());
        resp.as_mut_slice()[COMPLETION_OFFSET] = 0x00;
        assert!(!resp.is_complete());
    }

    #[test]
    fn test_lock_mask() {
        assert_eq!(Ctlr::LOCK_MASK, 0x8080);
    }
}
