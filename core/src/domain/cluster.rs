//! # Cluster Power-Down
//!
//! A non-boot cluster whose cores are all off is quiesced before system
//! sleep: L2 flush, ACINACTM, L2 wfi, then bus idle. Resume releases
//! ACINACTM and the idle request.

use core::ops::Range;

use rkpm_hal::barrier::dsb;
use rkpm_hal::{Delay, Mmio};

use super::idle::{BusDomain, IdleNegotiator};
use crate::config::PollBudgets;
use crate::error::{PmError, PmResult};
use crate::poll::poll_with_warning;
use crate::soc::{
    l2_flush_done_bit, l2_wfi_bit, pd_core_bit, SftCon, PMU_CORE_PWR_ST, PMU_PWRDN_ST,
    PMU_SFT_CON,
};

/// Quiesces and restores CPU clusters
#[derive(Debug, Clone, Copy)]
pub struct ClusterSequencer<P> {
    platform: P,
    budgets: PollBudgets,
}

impl<P: Mmio + Delay + Copy> ClusterSequencer<P> {
    /// Create the sequencer
    pub const fn new(platform: P, budgets: PollBudgets) -> Self {
        Self { platform, budgets }
    }

    fn negotiator(&self) -> IdleNegotiator<P> {
        IdleNegotiator::new(self.platform, self.budgets.bus_idle, self.budgets.warn_every)
    }

    fn wait_core_pwr_st(&self, bit: u32, what: &str) -> PmResult<()> {
        poll_with_warning(
            &self.platform,
            self.budgets.cluster,
            self.budgets.warn_every,
            || self.platform.read32(PMU_CORE_PWR_ST) & bit != 0,
            |misses| {
                log::warn!(
                    "ClusterSequencer: waiting for {} (st={:#x}, {} reads)",
                    what,
                    self.platform.read32(PMU_CORE_PWR_ST),
                    misses
                )
            },
        )
    }

    /// Flush the L2 of a cluster
    pub fn flush_l2(&self, cluster: usize) -> PmResult<()> {
        self.platform
            .set_bits(PMU_SFT_CON, SftCon::l2_flush(cluster).bits());
        dsb();
        let flushed = self.wait_core_pwr_st(l2_flush_done_bit(cluster), "l2 flush");
        self.platform
            .clear_bits(PMU_SFT_CON, SftCon::l2_flush(cluster).bits());
        flushed
    }

    /// Quiesce a cluster whose `cores` are all off
    pub fn power_down(&self, cluster: usize, cores: Range<usize>) -> PmResult<()> {
        let domain = BusDomain::cluster(cluster).ok_or(PmError::UnsupportedRequest)?;

        let st = self.platform.read32(PMU_PWRDN_ST);
        if let Some(core) = cores.clone().find(|&c| st & pd_core_bit(c) == 0) {
            log::error!("ClusterSequencer: cluster {} core {} still on", cluster, core);
            return Err(PmError::InvalidState);
        }

        self.flush_l2(cluster)?;

        self.platform
            .set_bits(PMU_SFT_CON, SftCon::acinactm(cluster).bits());
        self.wait_core_pwr_st(l2_wfi_bit(cluster), "l2 wfi")?;

        self.negotiator().request_idle(domain, true)?;
        log::debug!("ClusterSequencer: cluster {} quiesced", cluster);
        Ok(())
    }

    /// Undo [`ClusterSequencer::power_down`]
    pub fn power_up(&self, cluster: usize) -> PmResult<()> {
        let domain = BusDomain::cluster(cluster).ok_or(PmError::UnsupportedRequest)?;
        self.platform
            .clear_bits(PMU_SFT_CON, SftCon::acinactm(cluster).bits());
        self.negotiator().request_idle(domain, false)
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{self, SimSoc};
    use crate::soc::{PMU_BUS_IDLE_REQ, PMU_PWRDN_CON};

    #[test]
    fn test_cluster_down_and_up() {
        let sim = SimSoc::new(2);
        sim.seed(PMU_PWRDN_CON, pd_core_bit(2) | pd_core_bit(3));
        let seq = ClusterSequencer::new(sim, sim::test_budgets());

        assert_eq!(seq.power_down(1, 2..4), Ok(()));
        assert_eq!(sim.peek(PMU_SFT_CON) & SftCon::L2FLUSH_CLST1.bits(), 0);
        assert_ne!(sim.peek(PMU_SFT_CON) & SftCon::ACINACTM_CLST1.bits(), 0);
        assert_eq!(sim.peek(PMU_BUS_IDLE_REQ), 1 << 1);

        assert_eq!(seq.power_up(1), Ok(()));
        assert_eq!(sim.peek(PMU_SFT_CON) & SftCon::ACINACTM_CLST1.bits(), 0);
        assert_eq!(sim.peek(PMU_BUS_IDLE_REQ), 0);
    }

    #[test]
    fn test_cluster_with_running_core_is_refused() {
        let sim = SimSoc::new(2);
        sim.seed(PMU_PWRDN_CON, pd_core_bit(2));
        let seq = ClusterSequencer::new(sim, sim::test_budgets());

        let before = sim.write_count();
        assert_eq!(seq.power_down(1, 2..4), Err(PmError::InvalidState));
        assert_eq!(sim.write_count(), before);
    }

    #[test]
    fn test_stuck_cluster_bus_reports_timeout() {
        let sim = SimSoc::new(2);
        sim.seed(PMU_PWRDN_CON, pd_core_bit(2) | pd_core_bit(3));
        sim.set_bus_stuck(BusDomain::Cluster1, true);
        let seq = ClusterSequencer::new(sim, sim::test_budgets());

        assert_eq!(seq.power_down(1, 2..4), Err(PmError::HardwareTimeoutSoft));
    }

    #[test]
    fn test_unknown_cluster() {
        let sim = SimSoc::new(2);
        let seq = ClusterSequencer::new(sim, sim::test_budgets());
        assert_eq!(seq.power_up(2), Err(PmError::UnsupportedRequest));
    }
}
