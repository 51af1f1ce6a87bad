//! # Platform Seam
//!
//! Everything the power controller consumes from its environment, bundled in
//! one `Copy` handle:
//!
//! ```text
//! ┌──────────────────────── Platform ────────────────────────┐
//! │  Mmio      32-bit registers, write-mask convention       │
//! │  Delay     microsecond busy-wait                         │
//! │  CpuOps    wfi, mmu off, power-down wfi, halt, stack swap│
//! │  ...       core identity, boot entries, SRAM image       │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The handle is copied into the always-on arena before system sleep, so it
//! must not refer to anything in DRAM that the resume path dereferences
//! before DRAM is back. Methods the SRAM-resident code calls are inlined
//! into it, never called out of line.

use rkpm_hal::{CpuOps, Delay, Mmio, Mpidr};

use crate::sram::image::SramImage;

/// Environment of the power controller
pub trait Platform: Mmio + Delay + CpuOps + Copy + Send + Sync + 'static {
    /// Linear index of the calling core
    fn current_core(&self) -> usize;

    /// Hardware id of the calling core
    fn current_mpidr(&self) -> Mpidr;

    /// Address of the normal warm-boot vector
    fn warm_boot_entry(&self) -> usize;

    /// Entry used by cores waking from automatic power-down
    fn secure_entry(&self) -> usize;

    /// Linked placement of the `.sram.text` code copied into the arena
    fn sram_image(&self) -> SramImage;

    /// Re-enable interrupt routing after system resume
    fn enable_interrupt_routing(&self);

    /// Continue on the runtime's warm-boot path
    fn warm_boot(&self) -> !;
}

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
pub use board::Rk3328Board;

#[cfg(all(target_arch = "aarch64", target_os = "none"))]
mod board {
    use rkpm_hal::arch::{El3Cpu, GenericTimerDelay};
    use rkpm_hal::mmio::DeviceMmio;
    use rkpm_hal::{CpuOps, Delay, Mmio, Mpidr, StackEntry};

    use super::Platform;
    use crate::sram::image::SramImage;

    /// Quad-core single-cluster board running at EL3
    #[derive(Debug, Clone, Copy)]
    pub struct Rk3328Board {
        mmio: DeviceMmio,
        warm_boot: extern "C" fn() -> !,
        secure_entry: usize,
        irq_routing: fn(),
    }

    impl Rk3328Board {
        /// Create the board handle
        ///
        /// # Safety
        ///
        /// Must only be used on the SoC whose register map is in
        /// [`crate::soc`], with device memory identity mapped.
        pub const unsafe fn new(
            warm_boot: extern "C" fn() -> !,
            secure_entry: usize,
            irq_routing: fn(),
        ) -> Self {
            Self {
                // SAFETY: forwarded contract.
                mmio: unsafe { DeviceMmio::new() },
                warm_boot,
                secure_entry,
                irq_routing,
            }
        }
    }

    impl Mmio for Rk3328Board {
        #[inline(always)]
        fn read32(&self, addr: usize) -> u32 {
            self.mmio.read32(addr)
        }

        #[inline(always)]
        fn write32(&self, addr: usize, value: u32) {
            self.mmio.write32(addr, value)
        }
    }

    impl Delay for Rk3328Board {
        #[inline(always)]
        fn udelay(&self, us: u32) {
            GenericTimerDelay.udelay(us)
        }
    }

    impl CpuOps for Rk3328Board {
        fn wait_for_interrupt(&self) {
            El3Cpu.wait_for_interrupt()
        }

        #[inline(always)]
        fn disable_mmu_icache(&self) {
            El3Cpu.disable_mmu_icache()
        }

        #[inline(always)]
        fn power_down_wfi(&self) -> ! {
            El3Cpu.power_down_wfi()
        }

        #[inline(always)]
        fn halt(&self) -> ! {
            El3Cpu.halt()
        }

        unsafe fn run_on_stack(&self, sp: usize, entry: StackEntry, arg: usize) -> ! {
            // SAFETY: forwarded contract.
            unsafe { El3Cpu.run_on_stack(sp, entry, arg) }
        }
    }

    impl Platform for Rk3328Board {
        #[inline(always)]
        fn current_core(&self) -> usize {
            Mpidr::current().linear_index(4)
        }

        fn current_mpidr(&self) -> Mpidr {
            Mpidr::current()
        }

        fn warm_boot_entry(&self) -> usize {
            self.warm_boot as usize
        }

        fn secure_entry(&self) -> usize {
            self.secure_entry
        }

        fn sram_image(&self) -> SramImage {
            SramImage::linked()
        }

        fn enable_interrupt_routing(&self) {
            (self.irq_routing)()
        }

        #[inline(always)]
        fn warm_boot(&self) -> ! {
            (self.warm_boot)()
        }
    }
}
