//! # SRAM-Resident Trampoline
//!
//! One entry, [`sram_entry`], runs both halves of system sleep from the image
//! copy in the arena. The half is picked by the phase word in the arena
//! scratch, so the suspend switch and the boot firmware's resume jump both
//! land on the same relocated address.
//!
//! ## Suspend ([`SramPhase::Suspend`])
//!
//! ```text
//!   mmu/icache off ─▶ boot vector → arena ─▶ DDR retention ─▶ PMIC sleep
//!        ─▶ UART gated ─▶ auto power-down armed ─▶ power-down wfi (never returns)
//! ```
//!
//! ## Resume ([`SramPhase::Resume`])
//!
//! ```text
//!   UART ungated ─▶ PMIC awake ─▶ DDR out of retention ─▶ boot vector restored
//!        ─▶ warm boot (back in DRAM)
//! ```
//!
//! The entry receives the address of a [`Handoff`] in the arena, never a
//! pointer into DRAM. Nothing in this file logs.

use rkpm_hal::barrier::{dsb, isb};
use rkpm_hal::mmio::WMASK_ALL;
use rkpm_hal::Mmio;

use super::{SramArena, SramScratch};
use crate::ddr::{DdrRetention, DdrTiming};
use crate::platform::Platform;
use crate::pmic::PmicSleepSignal;
use crate::soc::{pmu_cpuapm_con, sgrf_soc_con, ApmFlags, CORES_PM_DISABLE, CPU_BOOT_ADDR_ALIGN};
use crate::uart::DebugUart;

const SLEEP_APM: u32 =
    ApmFlags::PM_EN.bits() | ApmFlags::DIS_INT.bits() | ApmFlags::INT_WAKEUP_EN.bits();

/// Which half of system sleep [`sram_entry`] runs next
#[repr(u32)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SramPhase {
    /// Enter retention and power down
    #[default]
    Suspend = 0,
    /// Leave retention after the wake reset
    Resume  = 1,
}

/// Everything the SRAM-resident code needs, copied into the arena
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct Handoff<P> {
    /// Platform handle
    pub platform: P,
    /// The arena itself
    pub arena: SramArena<P>,
    /// DDR poll budgets
    pub timing: DdrTiming,
    /// PMIC settle delay on resume
    pub pmic_settle_us: u32,
    /// Boot vector restored on resume
    pub warm_boot_vector: usize,
    /// Number of clusters whose boot vector is managed
    pub clusters: usize,
}

/// Point the boot vector of every cluster at `addr`
#[cfg_attr(target_os = "none", link_section = ".sram.text")]
pub fn set_boot_vector<M: Mmio>(mmio: &M, addr: usize, clusters: usize) {
    let word = ((addr >> CPU_BOOT_ADDR_ALIGN) as u32 & 0xffff) | WMASK_ALL;
    let mut cluster = 0;
    while cluster < clusters {
        mmio.write32(sgrf_soc_con(1 + cluster), word);
        cluster += 1;
    }
    dsb();
}

#[cfg_attr(target_os = "none", link_section = ".sram.text")]
fn suspend_path<P: Platform>(h: &Handoff<P>, scratch: &mut SramScratch) {
    let p = h.platform;

    p.disable_mmu_icache();
    set_boot_vector(&p, h.arena.base(), h.clusters);

    DdrRetention::prepare(p, &mut scratch.ddr, h.timing).enter();
    PmicSleepSignal::new(p).suspend(&mut scratch.pmic);
    scratch.uart_ier = DebugUart::new(p).suspend();

    p.write32(pmu_cpuapm_con(p.current_core()), SLEEP_APM);
    dsb();
    isb();
}

#[cfg_attr(target_os = "none", link_section = ".sram.text")]
fn resume_path<P: Platform>(h: &Handoff<P>, scratch: &mut SramScratch) {
    let p = h.platform;

    DebugUart::new(p).resume(scratch.uart_ier);
    PmicSleepSignal::new(p).resume(&scratch.pmic, h.pmic_settle_us);

    // SAFETY: scratch.ddr was filled by the suspend half before this wake.
    let ddr = unsafe { DdrRetention::resume_from(p, &mut scratch.ddr, h.timing) };
    ddr.exit().finish();

    p.write32(pmu_cpuapm_con(p.current_core()), CORES_PM_DISABLE);
    set_boot_vector(&p, h.warm_boot_vector, h.clusters);
}

/// SRAM entry, run on the arena stack with the handoff address
///
/// Suspend reaches it through `run_on_stack`, resume through the boot
/// firmware calling `ddr_func(ddr_data)` from the resume layout.
#[cfg_attr(target_os = "none", link_section = ".sram.text")]
pub extern "C-unwind" fn sram_entry<P: Platform>(handoff: usize) -> ! {
    // SAFETY: write_handoff() stored a Handoff<P> here; it lives in the arena.
    let h = unsafe { *(handoff as *const Handoff<P>) };
    // SAFETY: one core at a time gets here: the core running system sleep,
    // then the core the boot firmware picked after wake.
    let scratch = unsafe { h.arena.scratch() };

    match scratch.phase {
        SramPhase::Suspend => {
            suspend_path(&h, scratch);
            scratch.phase = SramPhase::Resume;
            dsb();
            h.platform.power_down_wfi()
        }
        SramPhase::Resume => {
            resume_path(&h, scratch);
            scratch.phase = SramPhase::Suspend;
            dsb();
            h.platform.warm_boot()
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
