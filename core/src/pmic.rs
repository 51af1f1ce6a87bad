//! PMIC sleep signal.
//!
//! The companion PMIC drops its rails into sleep mode while GPIO2_D2 is
//! driven high. The pin is a normal function pin at runtime, so suspend saves
//! its mux and GPIO state into the arena and resume puts them back.
//!
//! Runs from the always-on arena: no logging, and everything the sleep and
//! wake halves call is in `.sram.text`.

use rkpm_hal::barrier::dsb;
use rkpm_hal::mmio::{bits_with_wmask, WMASK_ALL};
use rkpm_hal::{CpuOps, Delay, Mmio};

use crate::soc::{
    GPIO2_BASE, GPIO2_PMIC_SLEEP, GPIO_SWPORTA_DDR, GPIO_SWPORTA_DR, GRF_GPIO2D_IOMUX,
    PMIC_SLEEP_IOMUX_MASK, PMIC_SLEEP_IOMUX_SHIFT,
};

const GPIO2_DR: usize = GPIO2_BASE + GPIO_SWPORTA_DR;
const GPIO2_DDR: usize = GPIO2_BASE + GPIO_SWPORTA_DDR;

/// Pin state saved across sleep
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PmicContext {
    /// GRF iomux word
    pub iomux: u32,
    /// GPIO2 data
    pub dr: u32,
    /// GPIO2 direction
    pub ddr: u32,
}

/// Driver of the PMIC sleep pin
#[derive(Debug, Clone, Copy)]
pub struct PmicSleepSignal<P> {
    platform: P,
}

impl<P: Mmio + Delay + CpuOps> PmicSleepSignal<P> {
    /// Create the driver
    #[inline(always)]
    pub const fn new(platform: P) -> Self {
        Self { platform }
    }

    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    fn drive_sleep_high(&self) {
        self.platform.write32(
            GRF_GPIO2D_IOMUX,
            bits_with_wmask(0, PMIC_SLEEP_IOMUX_MASK, PMIC_SLEEP_IOMUX_SHIFT),
        );
        self.platform.set_bits(GPIO2_DDR, GPIO2_PMIC_SLEEP);
        self.platform.set_bits(GPIO2_DR, GPIO2_PMIC_SLEEP);
    }

    /// Save the pin and signal sleep
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn suspend(&self, ctx: &mut PmicContext) {
        ctx.iomux = self.platform.read32(GRF_GPIO2D_IOMUX);
        ctx.dr = self.platform.read32(GPIO2_DR);
        ctx.ddr = self.platform.read32(GPIO2_DDR);

        self.drive_sleep_high();
        dsb();
    }

    /// Restore the pin and wait for the rails to settle
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn resume(&self, ctx: &PmicContext, settle_us: u32) {
        self.platform.write32(GPIO2_DR, ctx.dr);
        self.platform.write32(GPIO2_DDR, ctx.ddr);
        self.platform
            .write32(GRF_GPIO2D_IOMUX, (ctx.iomux & 0xffff) | WMASK_ALL);
        dsb();

        self.platform.udelay(settle_us);
    }

    /// Signal the PMIC and stop; board wiring turns this into power-off
    pub fn power_off(&self) -> ! {
        self.drive_sleep_high();
        dsb();
        self.platform.halt()
    }
}
