//! # DDR Retention Sequencer
//!
//! Puts DRAM into self-refresh with retention asserted, and brings it back.
//!
//! ```text
//!   PreRetention ──enter()──▶ InRetention ──exit()──▶ SelfRefreshExited ──finish()
//!        ▲                        ▲
//!     prepare()              resume_from()   (after the wake reset)
//! ```
//!
//! From the self-refresh entry command until the exit is confirmed, DRAM is
//! unreachable. Everything between those two points runs from the always-on
//! arena, touches only the [`DdrRetentionContext`] that lives there, and
//! never logs. Every transition consumes the sequencer, so a phase cannot be
//! skipped or repeated.
//!
//! Convergence failures inside the window halt the core: there is nowhere to
//! report them to.

use core::marker::PhantomData;

use rkpm_hal::barrier::dsb;
use rkpm_hal::mmio::{bit_with_wmask, bits_wmask, bits_with_wmask, wmask_bit};
use rkpm_hal::{CpuOps, Delay, Mmio};

use crate::clock::pll::{PllId, PllSequencer, PllWords};
use crate::config::Poll;
use crate::poll::poll_field;
use crate::soc::{
    cru_clkgate_con, SftCon, DDRGRF_CSYSREQ_OVERRIDE, DDRGRF_CSYSREQ_PMU, DDRGRF_SOC_CON0,
    DDRGRF_SOC_STATUS1, DDR_PCTL2_PWRCTL, DDR_SREF_STATE_MASK, DDR_SREF_STATE_NORMAL,
    DDR_SREF_STATE_SHIFT, DDR_SREF_STATE_SREF, PMU_SFT_CON, SELFREF_EN,
};

/// DDR-domain clock gates: `(CLKGATE_CON index, mask, shift)`
pub const DDR_GATES: [(usize, u32, u32); 4] = [(0, 0x7, 4), (7, 0x1, 4), (18, 0x1ff, 1), (27, 0x3, 0)];

/// [`DDR_GATES`] inside the SRAM image, for run-time indexing
#[cfg_attr(target_os = "none", link_section = ".sram.text")]
static SRAM_DDR_GATES: [(usize, u32, u32); DDR_GATES.len()] = DDR_GATES;

const SREF_REQ: u32 = SftCon::DDR_SREF_REQ.bits();
const RETENTION: u32 = SftCon::DDR_RETENTION.bits();

/// State carried across retention, kept in the always-on arena
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DdrRetentionContext {
    /// Self-refresh-on-idle was enabled before suspend (0 or 1)
    pub selfref_en: u32,
    /// DDR GRF CON0 before the clock-request override
    pub grf_con0: u32,
    /// DDR gate words before gating
    pub gates: [u32; DDR_GATES.len()],
    /// DDR PLL state
    pub dpll: PllWords,
}

/// Poll budgets used inside the retention window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DdrTiming {
    /// Self-refresh entry and exit confirmation
    pub self_refresh: Poll,
    /// DDR PLL relock
    pub pll_lock: Poll,
}

/// DRAM in normal operation, context saved
#[derive(Debug)]
pub struct PreRetention;

/// DRAM in self-refresh with retention asserted
#[derive(Debug)]
pub struct InRetention;

/// DRAM out of self-refresh, controller settings not yet restored
#[derive(Debug)]
pub struct SelfRefreshExited;

/// DDR retention sequencer in phase `S`
#[derive(Debug)]
pub struct DdrRetention<'a, P, S> {
    platform: P,
    ctx: &'a mut DdrRetentionContext,
    timing: DdrTiming,
    _phase: PhantomData<S>,
}

impl<'a, P, S> DdrRetention<'a, P, S>
where
    P: Mmio + Delay + CpuOps + Copy,
{
    #[inline(always)]
    fn into_phase<T>(self) -> DdrRetention<'a, P, T> {
        DdrRetention {
            platform: self.platform,
            ctx: self.ctx,
            timing: self.timing,
            _phase: PhantomData,
        }
    }

    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    fn wait_sref_state_or_halt(&self, state: u32) {
        let result = poll_field(
            &self.platform,
            self.timing.self_refresh,
            DDRGRF_SOC_STATUS1,
            DDR_SREF_STATE_MASK << DDR_SREF_STATE_SHIFT,
            state << DDR_SREF_STATE_SHIFT,
        );
        let Ok(()) = result else {
            self.platform.halt()
        };
    }
}

impl<'a, P> DdrRetention<'a, P, PreRetention>
where
    P: Mmio + Delay + CpuOps + Copy,
{
    /// Save the controller settings and make self-refresh entry explicit
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn prepare(platform: P, ctx: &'a mut DdrRetentionContext, timing: DdrTiming) -> Self {
        let pwrctl = platform.read32(DDR_PCTL2_PWRCTL);
        if pwrctl & SELFREF_EN != 0 {
            ctx.selfref_en = 1;
            platform.clear_bits(DDR_PCTL2_PWRCTL, SELFREF_EN);
        } else {
            ctx.selfref_en = 0;
        }

        ctx.grf_con0 = platform.read32(DDRGRF_SOC_CON0);
        // Only the controller may raise the clock request from here on
        platform.write32(
            DDRGRF_SOC_CON0,
            bit_with_wmask(DDRGRF_CSYSREQ_OVERRIDE) | wmask_bit(DDRGRF_CSYSREQ_PMU),
        );
        dsb();

        Self {
            platform,
            ctx,
            timing,
            _phase: PhantomData,
        }
    }

    /// Enter self-refresh, assert retention, gate the DDR clocks and stop
    /// the DDR PLL
    ///
    /// DRAM is unreachable once this starts. Halts if self-refresh is never
    /// confirmed.
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn enter(mut self) -> DdrRetention<'a, P, InRetention> {
        let p = self.platform;

        p.set_bits(PMU_SFT_CON, SREF_REQ);
        dsb();
        self.wait_sref_state_or_halt(DDR_SREF_STATE_SREF);

        p.set_bits(PMU_SFT_CON, RETENTION);
        dsb();

        let mut i = 0;
        while i < SRAM_DDR_GATES.len() {
            let (con, mask, shift) = SRAM_DDR_GATES[i];
            self.ctx.gates[i] = p.read32(cru_clkgate_con(con));
            p.write32(cru_clkgate_con(con), bits_with_wmask(mask, mask, shift));
            i += 1;
        }

        // Last: every step above still needs the DDR clock
        self.ctx.dpll = PllSequencer::new(p, self.timing.pll_lock).suspend(PllId::Dpll);
        dsb();

        self.into_phase()
    }
}

impl<'a, P> DdrRetention<'a, P, InRetention>
where
    P: Mmio + Delay + CpuOps + Copy,
{
    /// Pick the sequence up again after the wake reset
    ///
    /// # Safety
    ///
    /// `ctx` must hold what [`DdrRetention::enter`] saved before this wake,
    /// and DRAM must still be in retention.
    #[inline(always)]
    pub unsafe fn resume_from(
        platform: P,
        ctx: &'a mut DdrRetentionContext,
        timing: DdrTiming,
    ) -> Self {
        Self {
            platform,
            ctx,
            timing,
            _phase: PhantomData,
        }
    }

    /// Relock the DDR PLL, ungate, release retention and leave self-refresh
    ///
    /// Halts if the DDR PLL never locks or self-refresh exit is never
    /// confirmed.
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn exit(self) -> DdrRetention<'a, P, SelfRefreshExited> {
        let p = self.platform;

        let relock =
            PllSequencer::new(p, self.timing.pll_lock).resume(PllId::Dpll, &self.ctx.dpll);
        let Ok(()) = relock else { p.halt() };

        let mut i = 0;
        while i < SRAM_DDR_GATES.len() {
            let (con, mask, shift) = SRAM_DDR_GATES[i];
            p.write32(
                cru_clkgate_con(con),
                (self.ctx.gates[i] & 0xffff) | bits_wmask(mask, shift),
            );
            i += 1;
        }

        p.clear_bits(PMU_SFT_CON, RETENTION);
        dsb();
        p.clear_bits(PMU_SFT_CON, SREF_REQ);
        dsb();
        self.wait_sref_state_or_halt(DDR_SREF_STATE_NORMAL);

        self.into_phase()
    }
}

impl<'a, P> DdrRetention<'a, P, SelfRefreshExited>
where
    P: Mmio + Delay + CpuOps + Copy,
{
    /// Restore the clock-request routing and self-refresh-on-idle
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn finish(self) {
        let p = self.platform;
        let routing = bits_wmask(1, DDRGRF_CSYSREQ_OVERRIDE) | bits_wmask(1, DDRGRF_CSYSREQ_PMU);
        p.write32(DDRGRF_SOC_CON0, (self.ctx.grf_con0 & 0xffff) | routing);

        if self.ctx.selfref_en != 0 {
            p.set_bits(DDR_PCTL2_PWRCTL, SELFREF_EN);
        }
        dsb();
    }
}

// ============================================================================
// TESTS
// ============================================================================
