//! # EL3 CPU Operations
//!
//! SCTLR_EL3 bits touched when the MMU is turned off:
//!
//! ```text
//! ┌────┬────┬────┐
//! │ 12 │  2 │  0 │
//! │  I │  C │  M │
//! └────┴────┴────┘
//! ```
//!
//! Only M and I are cleared; the data cache follows the MMU off anyway.

use core::arch::asm;

use crate::barrier::{dsb, isb};
use crate::cpu::{CpuOps, StackEntry};

/// SCTLR_EL3.M (MMU enable)
const SCTLR_M: u64 = 1 << 0;

/// SCTLR_EL3.I (instruction cache enable)
const SCTLR_I: u64 = 1 << 12;

/// Core-local operations at EL3
#[derive(Debug, Clone, Copy, Default)]
pub struct El3Cpu;

impl CpuOps for El3Cpu {
    #[inline]
    fn wait_for_interrupt(&self) {
        // SAFETY: wfi only stalls this core until an interrupt or event.
        unsafe {
            asm!("wfi", options(nomem, nostack, preserves_flags));
        }
    }

    #[inline(always)]
    fn disable_mmu_icache(&self) {
        // SAFETY: runs at EL3 from the identity-mapped arena, so the next
        // fetch resolves to the same physical address with the MMU off.
        // Invalidating the EL3 TLB and icache only drops cached state.
        unsafe {
            let mut sctlr: u64;
            asm!("mrs {}, sctlr_el3", out(reg) sctlr, options(nomem, nostack, preserves_flags));
            sctlr &= !(SCTLR_M | SCTLR_I);
            asm!("msr sctlr_el3, {}", in(reg) sctlr, options(nostack));
            isb();
            asm!("tlbi alle3", "ic iallu", options(nostack, preserves_flags));
        }
        dsb();
        isb();
    }

    #[inline(always)]
    fn power_down_wfi(&self) -> ! {
        loop {
            dsb();
            // SAFETY: wfi with auto power-down armed; the PMU cuts the core
            // here and the next instruction is the boot vector.
            unsafe {
                asm!("wfi", options(nomem, nostack, preserves_flags));
            }
        }
    }

    #[inline(always)]
    fn halt(&self) -> ! {
        loop {
            core::hint::spin_loop();
        }
    }

    unsafe fn run_on_stack(&self, sp: usize, entry: StackEntry, arg: usize) -> ! {
        // SAFETY: the caller guarantees `sp` is a valid stack top.
        unsafe {
            asm!(
                "mov sp, {sp}",
                "br {entry}",
                sp = in(reg) sp,
                entry = in(reg) entry as usize,
                in("x0") arg,
                options(noreturn)
            );
        }
    }
}
