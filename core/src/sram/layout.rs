//! Resume layout shared with the boot firmware.
//!
//! After a wake reset the boot firmware finds this block at the top of the
//! arena, loads `sp`, and calls `ddr_func(ddr_data)` on the core whose MPIDR
//! is `boot_mpidr` when `ddr_flag` is set. Field order and widths are fixed.

use core::mem::{offset_of, size_of};

use static_assertions::{const_assert, const_assert_eq};

use super::LAYOUT_RESERVED;

/// Resume layout at the top of the always-on arena
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SramResumeLayout {
    /// Stack pointer of the SRAM-resident code
    pub sp: u64,
    /// Resume entry, relocated into the arena image copy
    pub ddr_func: u64,
    /// Argument to `ddr_func` (handoff block address)
    pub ddr_data: u64,
    /// Non-zero while DRAM is in retention
    pub ddr_flag: u64,
    /// Aff1:Aff0 of the core that runs the resume path
    pub boot_mpidr: u64,
}

const_assert_eq!(size_of::<SramResumeLayout>(), 40);
const_assert_eq!(offset_of!(SramResumeLayout, sp), 0x00);
const_assert_eq!(offset_of!(SramResumeLayout, ddr_func), 0x08);
const_assert_eq!(offset_of!(SramResumeLayout, ddr_data), 0x10);
const_assert_eq!(offset_of!(SramResumeLayout, ddr_flag), 0x18);
const_assert_eq!(offset_of!(SramResumeLayout, boot_mpidr), 0x20);
const_assert!(size_of::<SramResumeLayout>() <= LAYOUT_RESERVED);

impl SramResumeLayout {
    /// `ddr_flag` while the system runs normally
    pub const DDR_RUNNING: u64 = 0;
    /// `ddr_flag` once DRAM is headed into retention
    pub const DDR_RETAINED: u64 = 1;

    /// Whether the boot firmware should take the DDR resume path
    pub const fn ddr_retained(&self) -> bool {
        self.ddr_flag != Self::DDR_RUNNING
    }
}
