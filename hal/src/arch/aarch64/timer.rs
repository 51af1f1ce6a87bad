//! # Generic Timer Delay
//!
//! Busy-waits on the physical system counter (CNTPCT_EL0). The counter keeps
//! running in the always-on domain, so the delay stays valid on the resume
//! path before DRAM is back.

use core::arch::asm;

use crate::delay::Delay;

/// Read CNTFRQ_EL0 (counter frequency in Hz)
#[inline(always)]
pub fn read_cntfrq_el0() -> u64 {
    let value: u64;
    // SAFETY: reading the counter frequency has no side effects.
    unsafe {
        asm!("mrs {}, cntfrq_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Read CNTPCT_EL0 (physical count)
#[inline(always)]
pub fn read_cntpct_el0() -> u64 {
    let value: u64;
    // SAFETY: reading the physical count has no side effects.
    unsafe {
        asm!("isb", "mrs {}, cntpct_el0", out(reg) value, options(nomem, nostack, preserves_flags));
    }
    value
}

/// Delay provider backed by the system counter
#[derive(Debug, Clone, Copy, Default)]
pub struct GenericTimerDelay;

impl Delay for GenericTimerDelay {
    #[inline(always)]
    fn udelay(&self, us: u32) {
        let freq = read_cntfrq_el0();
        let ticks = (freq * us as u64 + 999_999) / 1_000_000;
        let start = read_cntpct_el0();
        while read_cntpct_el0().wrapping_sub(start) < ticks {
            core::hint::spin_loop();
        }
    }
}
