//! # 32-bit MMIO with the Write-Mask Convention
//!
//! Most control blocks on the SoC (CRU, GRF, SGRF, DDR GRF) use "hiword
//! mask" registers: the upper 16 bits of every write select which of the
//! lower 16 bits actually change.
//!
//! ```text
//!  31                  16 15                   0
//! ┌──────────────────────┬──────────────────────┐
//! │   write enable mask  │      new values      │
//! └──────────────────────┴──────────────────────┘
//! ```
//!
//! A write therefore never needs a read-modify-write cycle, so it cannot
//! race against bits the hardware updates on its own. Plain registers
//! (PMU, GPIO, UART) are accessed with [`Mmio::set_bits`] and
//! [`Mmio::clear_bits`].

use core::ptr::{read_volatile, write_volatile};

// ============================================================================
// Write-Mask Helpers
// ============================================================================

/// Write-enable for all 16 value bits
pub const WMASK_ALL: u32 = 0xffff_0000;

/// Shift of the write-enable half
pub const WMASK_SHIFT: u32 = 16;

/// Single bit helper
#[inline(always)]
pub const fn bit(n: u32) -> u32 {
    1 << n
}

/// Place `bits & mask` at `shift` and enable writes to exactly those bits
#[inline(always)]
pub const fn bits_with_wmask(bits: u32, mask: u32, shift: u32) -> u32 {
    ((bits & mask) << shift) | ((mask << shift) << WMASK_SHIFT)
}

/// Set bit `n`, touching nothing else
#[inline(always)]
pub const fn bit_with_wmask(n: u32) -> u32 {
    bit(n) | (bit(n) << WMASK_SHIFT)
}

/// Clear bit `n`, touching nothing else
#[inline(always)]
pub const fn wmask_bit(n: u32) -> u32 {
    bit(n) << WMASK_SHIFT
}

/// Clear the `mask` field at `shift`
#[inline(always)]
pub const fn bits_wmask(mask: u32, shift: u32) -> u32 {
    (mask << shift) << WMASK_SHIFT
}

/// Apply a masked write to a 16-bit register image
///
/// This is what the hardware does with a write-masked store; simulators
/// use it to model the registers.
#[inline(always)]
pub const fn apply_wmask(current: u32, write: u32) -> u32 {
    let enable = write >> WMASK_SHIFT;
    ((current & !enable) | (write & enable)) & 0xffff
}

// ============================================================================
// MMIO Trait
// ============================================================================

/// 32-bit memory-mapped register access
///
/// Addresses are physical; on the target they are identity mapped while
/// the firmware runs at EL3.
pub trait Mmio {
    /// Read a 32-bit register
    fn read32(&self, addr: usize) -> u32;

    /// Write a 32-bit register
    fn write32(&self, addr: usize, value: u32);

    /// Set bits in a plain (non write-masked) register
    #[inline(always)]
    fn set_bits(&self, addr: usize, bits: u32) {
        let value = self.read32(addr);
        self.write32(addr, value | bits);
    }

    /// Clear bits in a plain (non write-masked) register
    #[inline(always)]
    fn clear_bits(&self, addr: usize, bits: u32) {
        let value = self.read32(addr);
        self.write32(addr, value & !bits);
    }
}

impl<T: Mmio + ?Sized> Mmio for &T {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        (**self).read32(addr)
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        (**self).write32(addr, value)
    }
}

// ============================================================================
// Device Memory Implementation
// ============================================================================

/// Volatile accessor for real device memory
#[derive(Debug, Clone, Copy)]
pub struct DeviceMmio {
    _private: (),
}

impl DeviceMmio {
    /// Create the accessor
    ///
    /// # Safety
    ///
    /// Every address later passed to [`Mmio`] methods must be a mapped,
    /// 4-byte aligned device register.
    pub const unsafe fn new() -> Self {
        Self { _private: () }
    }
}

impl Mmio for DeviceMmio {
    #[inline(always)]
    fn read32(&self, addr: usize) -> u32 {
        // SAFETY: guaranteed by the contract of `DeviceMmio::new`.
        let value = unsafe { read_volatile(addr as *const u32) };
        #[cfg(feature = "debug")]
        log::trace!("mmio: read  {:#010x} -> {:#010x}", addr, value);
        value
    }

    #[inline(always)]
    fn write32(&self, addr: usize, value: u32) {
        #[cfg(feature = "debug")]
        log::trace!("mmio: write {:#010x} <- {:#010x}", addr, value);
        // SAFETY: guaranteed by the contract of `DeviceMmio::new`.
        unsafe { write_volatile(addr as *mut u32, value) }
    }
}

// ============================================================================
// TESTS
// ============================================================================
