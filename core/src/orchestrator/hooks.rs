//! Hook surface for the enclosing runtime.
//!
//! Every hook returns an errno-style status (`0` on success) or never
//! returns at all.

use rkpm_hal::Mpidr;

use super::PowerController;
use crate::error::status;
use crate::platform::Platform;

/// Power-management hooks called by the runtime
pub trait PowerHooks {
    /// Power on the core with hardware id `hw_id`, resuming at `entry`
    fn core_power_on(&self, hw_id: u64, entry: usize) -> i32;
    /// Power the calling core off
    fn core_power_off(&self) -> i32;
    /// Auto power-down of the calling core
    fn core_power_suspend(&self) -> i32;
    /// Calling core finished coming up after power-on
    fn core_power_on_finish(&self) -> i32;
    /// Calling core finished coming up after auto power-down
    fn core_power_resume(&self) -> i32;
    /// Prepare whole-system sleep
    fn system_power_suspend(&self) -> i32;
    /// Finish whole-system wake
    fn system_power_resume(&self) -> i32;
    /// Hand over to the SRAM-resident sleep sequence
    fn system_power_down_wfi(&self) -> !;
    /// Reset the SoC
    fn system_soft_reset(&self) -> !;
    /// Switch the board off
    fn system_power_off(&self) -> !;
}

impl<P: Platform> PowerHooks for PowerController<P> {
    fn core_power_on(&self, hw_id: u64, entry: usize) -> i32 {
        status(PowerController::core_power_on(self, Mpidr::from_raw(hw_id), entry))
    }

    fn core_power_off(&self) -> i32 {
        status(PowerController::core_power_off(self))
    }

    fn core_power_suspend(&self) -> i32 {
        status(self.core_suspend())
    }

    fn core_power_on_finish(&self) -> i32 {
        status(self.core_on_finish())
    }

    fn core_power_resume(&self) -> i32 {
        status(self.core_resume())
    }

    fn system_power_suspend(&self) -> i32 {
        status(self.system_suspend())
    }

    fn system_power_resume(&self) -> i32 {
        status(self.system_resume())
    }

    fn system_power_down_wfi(&self) -> ! {
        self.enter_system_sleep()
    }

    fn system_soft_reset(&self) -> ! {
        self.soft_reset()
    }

    fn system_power_off(&self) -> ! {
        self.system_off()
    }
}
