//! # Ordering Barriers
//!
//! Every device write that a later step depends on is followed by a
//! [`dsb`]; instruction-stream changes (boot vector, MMU state) add an
//! [`isb`].

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        use core::arch::asm;

        /// Data synchronisation barrier (full system)
        #[inline(always)]
        pub fn dsb() {
            // SAFETY: a barrier has no operands and no memory effects of its own.
            unsafe {
                asm!("dsb sy", options(nostack, preserves_flags));
            }
        }

        /// Instruction synchronisation barrier
        #[inline(always)]
        pub fn isb() {
            // SAFETY: flushes the pipeline only.
            unsafe {
                asm!("isb", options(nostack, preserves_flags));
            }
        }
    } else {
        use core::sync::atomic::{fence, Ordering};

        /// Data synchronisation barrier (full system)
        #[inline(always)]
        pub fn dsb() {
            fence(Ordering::SeqCst);
        }

        /// Instruction synchronisation barrier
        #[inline(always)]
        pub fn isb() {
            fence(Ordering::SeqCst);
        }
    }
}
