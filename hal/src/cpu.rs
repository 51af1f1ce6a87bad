//! # CPU Control Operations
//!
//! The handful of core-local operations the power sequences need. Three of
//! them never return: a core that powers itself down only comes back
//! through a reset, and a core that halts waits for the watchdog.

/// Entry point of a function run on a dedicated stack
///
/// The `C-unwind` ABI lets host simulations model non-returning hardware
/// operations with panics.
pub type StackEntry = extern "C-unwind" fn(usize) -> !;

/// Core-local CPU primitives
pub trait CpuOps {
    /// Low-power wait until the next interrupt
    fn wait_for_interrupt(&self);

    /// Turn off address translation and the instruction cache
    ///
    /// TLBs are invalidated as part of the operation.
    fn disable_mmu_icache(&self);

    /// Enter an unbounded wait-for-interrupt loop
    ///
    /// Power is expected to be removed while the core sits here.
    fn power_down_wfi(&self) -> !;

    /// Stop forever in a tight loop
    fn halt(&self) -> !;

    /// Switch the stack pointer to `sp` and jump to `entry(arg)`
    ///
    /// # Safety
    ///
    /// `sp` must be the 16-byte aligned top of a stack that stays valid for
    /// the rest of the core's execution, and `entry` must only touch memory
    /// that is reachable without the current stack.
    unsafe fn run_on_stack(&self, sp: usize, entry: StackEntry, arg: usize) -> !;
}

impl<T: CpuOps + ?Sized> CpuOps for &T {
    #[inline(always)]
    fn wait_for_interrupt(&self) {
        (**self).wait_for_interrupt()
    }

    #[inline(always)]
    fn disable_mmu_icache(&self) {
        (**self).disable_mmu_icache()
    }

    #[inline(always)]
    fn power_down_wfi(&self) -> ! {
        (**self).power_down_wfi()
    }

    #[inline(always)]
    fn halt(&self) -> ! {
        (**self).halt()
    }

    #[inline(always)]
    unsafe fn run_on_stack(&self, sp: usize, entry: StackEntry, arg: usize) -> ! {
        // SAFETY: forwarded contract.
        unsafe { (**self).run_on_stack(sp, entry, arg) }
    }
}
