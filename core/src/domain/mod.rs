//! # Power-Domain Controller
//!
//! Turns per-core power domains on and off and keeps each core's
//! [`CorePowerRecord`].
//!
//! ## Core State Machine
//!
//! ```text
//!            power_off                       power_on
//!  Active ─────────────▶ Parking ──▶ Off ─────────────▶ WakingBoot
//!    ▲                      │         ▲                     │
//!    │     never parked     │         │                     │
//!    └──────────────────────┘         │ (permanently off)   │
//!    └────────────────────────────────┴─────────────────────┘
//!                         on_finish / resume
//! ```
//!
//! Every operation takes the target's record by `&mut`: the caller proves it
//! holds the chip-wide transition lock by having the record at all.

pub mod cluster;
pub mod idle;
pub mod policy;

use rkpm_hal::barrier::dsb;
use rkpm_hal::Mmio;

use crate::config::PollBudgets;
use crate::error::{PmError, PmResult};
use crate::platform::Platform;
use crate::poll::{absorb_soft_timeout, poll_until};
use crate::soc::{
    core_wfi_bit, pd_core_bit, pmu_cpuapm_con, ApmFlags, CORES_PM_DISABLE, PMU_CORE_PWR_ST,
    PMU_PWRDN_CON, PMU_PWRDN_ST,
};

use self::policy::{PolicyStore, PolicyTracker};

// ============================================================================
// Per-Core Record
// ============================================================================

/// Power state of one core domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CoreState {
    /// Executing
    Active = 0,
    /// Waiting for the core to park before power-down
    Parking = 1,
    /// Powered down or clock gated
    Off = 2,
    /// Power-on issued, core has not reached its first checkpoint
    WakingBoot = 3,
}

/// Why a core is coming up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum WakeReason {
    /// First boot
    ColdBoot = 0,
    /// Brought up by `power_on`
    Hotplug = 1,
    /// Woken from an automatic power-down it requested itself
    AutoPowerDown = 2,
}

/// How a core is powered down
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PowerPolicy {
    /// Remove power from the domain
    HardPowerDown = 1,
    /// Gate the clock once the core is in wfi
    ClockGatedWfi = 2,
    /// As [`PowerPolicy::ClockGatedWfi`], woken by interrupts
    ClockGatedWfiInterruptWake = 3,
}

impl PowerPolicy {
    /// Decode a stored policy value
    pub const fn from_raw(raw: u8) -> Option<Self> {
        match raw {
            1 => Some(PowerPolicy::HardPowerDown),
            2 => Some(PowerPolicy::ClockGatedWfi),
            3 => Some(PowerPolicy::ClockGatedWfiInterruptWake),
            _ => None,
        }
    }

    /// Auto-power-down bits programmed for a clock-gated policy
    pub const fn apm_flags(self) -> ApmFlags {
        match self {
            PowerPolicy::HardPowerDown => ApmFlags::empty(),
            PowerPolicy::ClockGatedWfi => ApmFlags::PM_EN.union(ApmFlags::DIS_INT),
            PowerPolicy::ClockGatedWfiInterruptWake => ApmFlags::PM_EN
                .union(ApmFlags::DIS_INT)
                .union(ApmFlags::INT_WAKEUP_EN),
        }
    }
}

impl TryFrom<u32> for PowerPolicy {
    type Error = PmError;

    fn try_from(raw: u32) -> PmResult<Self> {
        u8::try_from(raw)
            .ok()
            .and_then(PowerPolicy::from_raw)
            .ok_or(PmError::UnsupportedRequest)
    }
}

/// Bookkeeping of one core
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CorePowerRecord {
    /// Linear core index
    pub core: usize,
    /// Domain state
    pub state: CoreState,
    /// Where the core resumes, consumed exactly once
    pub entry: Option<usize>,
    /// Why the core last woke or will wake
    pub reason: WakeReason,
}

impl CorePowerRecord {
    /// Record of a core at cold boot
    pub const fn new(core: usize) -> Self {
        Self {
            core,
            state: CoreState::Active,
            entry: None,
            reason: WakeReason::ColdBoot,
        }
    }

    /// Hand the resume entry to the waking core
    pub fn take_entry(&mut self) -> PmResult<(WakeReason, usize)> {
        let entry = self.entry.take().ok_or(PmError::InvalidState)?;
        self.state = CoreState::WakingBoot;
        Ok((self.reason, entry))
    }
}

// ============================================================================
// Domain Controller
// ============================================================================

/// Per-core power-domain sequencing
#[derive(Debug)]
pub struct DomainController<P> {
    platform: P,
    budgets: PollBudgets,
    policy: PolicyTracker<P>,
}

impl<P: Platform> DomainController<P> {
    /// Create the controller
    pub fn new(platform: P, budgets: PollBudgets, policy: PolicyTracker<P>) -> Self {
        Self {
            platform,
            budgets,
            policy,
        }
    }

    /// Policy store in use
    pub fn policy_store(&self) -> &PolicyTracker<P> {
        &self.policy
    }

    /// Whether the core's domain reports powered
    pub fn is_on(&self, core: usize) -> bool {
        self.platform.read32(PMU_PWRDN_ST) & pd_core_bit(core) == 0
    }

    /// Whether the core sits in standby wfi
    pub fn is_parked(&self, core: usize) -> bool {
        self.platform.read32(PMU_CORE_PWR_ST) & core_wfi_bit(core) != 0
    }

    /// Switch a core domain and wait for the status to follow
    pub fn pd_set(&self, core: usize, on: bool) -> PmResult<()> {
        if self.is_on(core) == on {
            return Ok(());
        }

        if on {
            self.platform.clear_bits(PMU_PWRDN_CON, pd_core_bit(core));
        } else {
            self.platform.set_bits(PMU_PWRDN_CON, pd_core_bit(core));
        }
        dsb();

        poll_until(&self.platform, self.budgets.power_domain, || self.is_on(core) == on)
    }

    /// Clear the auto-power-down configuration of a core
    pub fn clear_soft_wake(&self, core: usize) {
        self.platform.write32(pmu_cpuapm_con(core), CORES_PM_DISABLE);
    }

    /// Bring an `Off` core back, resuming at `entry`
    pub fn power_on(&self, rec: &mut CorePowerRecord, entry: usize) -> PmResult<()> {
        if rec.state != CoreState::Off {
            log::warn!("DomainController: core {} is {:?}, not off", rec.core, rec.state);
            return Err(PmError::InvalidState);
        }

        let core = rec.core;
        let policy = self.policy.policy(core)?;

        if policy != PowerPolicy::HardPowerDown {
            // A clock-gated core must really be down before the soft wake
            let parked = poll_until(&self.platform, self.budgets.wake, || !self.is_on(core));
            if parked.is_err() {
                log::warn!("DomainController: core {} never went down", core);
                return Err(PmError::InvalidState);
            }
        }

        rec.state = CoreState::WakingBoot;
        rec.reason = WakeReason::Hotplug;
        rec.entry = Some(entry);
        dsb();

        match policy {
            PowerPolicy::HardPowerDown => {
                self.clear_soft_wake(core);
                if self.is_on(core) {
                    // Hard power-down and soft wake must never both be asserted
                    log::warn!("DomainController: core {} unexpectedly on, cycling", core);
                    self.clear_soft_wake(core);
                    absorb_soft_timeout(self.pd_set(core, false), "pd off")?;
                }
                absorb_soft_timeout(self.pd_set(core, true), "pd on")?;
            }
            PowerPolicy::ClockGatedWfi | PowerPolicy::ClockGatedWfiInterruptWake => {
                self.platform
                    .write32(pmu_cpuapm_con(core), ApmFlags::SFT_WAKEUP_EN.bits());
            }
        }

        log::debug!("DomainController: core {} on ({:?})", core, policy);
        Ok(())
    }

    /// Power a core down with `policy`
    pub fn power_off(&self, rec: &mut CorePowerRecord, policy: PowerPolicy) -> PmResult<()> {
        let core = rec.core;

        match rec.state {
            CoreState::Off => return Ok(()),
            CoreState::WakingBoot | CoreState::Parking => return Err(PmError::InvalidState),
            CoreState::Active => {}
        }

        if !self.is_on(core) {
            // Already down in hardware: only the bookkeeping catches up
            rec.state = CoreState::Off;
            if self.platform.read32(PMU_PWRDN_CON) & pd_core_bit(core) != 0 {
                self.policy.record(core, PowerPolicy::HardPowerDown);
            }
            return Ok(());
        }

        rec.state = CoreState::Parking;

        match policy {
            PowerPolicy::HardPowerDown => {
                if poll_until(&self.platform, self.budgets.park, || self.is_parked(core)).is_err() {
                    log::warn!("DomainController: core {} never parked in wfi", core);
                    rec.state = CoreState::Active;
                    return Err(PmError::BusyCore);
                }
                self.clear_soft_wake(core);
                self.policy.record(core, policy);
                absorb_soft_timeout(self.pd_set(core, false), "pd off")?;
            }
            PowerPolicy::ClockGatedWfi | PowerPolicy::ClockGatedWfiInterruptWake => {
                self.policy.record(core, policy);
                self.platform
                    .write32(pmu_cpuapm_con(core), policy.apm_flags().bits());
            }
        }

        rec.state = CoreState::Off;
        log::debug!("DomainController: core {} off ({:?})", core, policy);
        Ok(())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PolicyTracking;
    use crate::sim::{self, SimSoc};

    fn controller(
        sim: &'static SimSoc,
        tracking: PolicyTracking,
    ) -> DomainController<&'static SimSoc> {
        DomainController::new(sim, sim::test_budgets(), PolicyTracker::new(tracking, sim))
    }

    #[test]
    fn test_hard_power_down_then_on() {
        for tracking in [PolicyTracking::Hardware, PolicyTracking::Software] {
            let sim = SimSoc::new(4);
            let pd = controller(sim, tracking);
            let mut rec = CorePowerRecord::new(2);

            sim.park(2);
            assert_eq!(pd.power_off(&mut rec, PowerPolicy::HardPowerDown), Ok(()));
            assert_eq!(rec.state, CoreState::Off);
            assert!(!pd.is_on(2));
            assert_eq!(pd.policy_store().policy(2), Ok(PowerPolicy::HardPowerDown));

            assert_eq!(pd.power_on(&mut rec, 0x8000_0000), Ok(()));
            assert_eq!(rec.state, CoreState::WakingBoot);
            assert_eq!(rec.reason, WakeReason::Hotplug);
            assert!(pd.is_on(2));
            assert_eq!(rec.take_entry(), Ok((WakeReason::Hotplug, 0x8000_0000)));
            assert_eq!(rec.take_entry(), Err(PmError::InvalidState));
        }
    }

    #[test]
    fn test_busy_core_writes_nothing() {
        let sim = SimSoc::new(4);
        let pd = controller(sim, PolicyTracking::Software);
        let mut rec = CorePowerRecord::new(1);

        let before = sim.write_count();
        assert_eq!(
            pd.power_off(&mut rec, PowerPolicy::HardPowerDown),
            Err(PmError::BusyCore)
        );
        assert_eq!(sim.write_count(), before);
        assert_eq!(rec.state, CoreState::Active);
        assert_eq!(pd.policy_store().policy(1), Err(PmError::InvalidState));
    }

    #[test]
    fn test_power_off_when_off_is_noop() {
        let sim = SimSoc::new(4);
        let pd = controller(sim, PolicyTracking::Hardware);
        let mut rec = CorePowerRecord::new(3);

        sim.park(3);
        pd.power_off(&mut rec, PowerPolicy::HardPowerDown).unwrap();
        let before = sim.write_count();
        assert_eq!(pd.power_off(&mut rec, PowerPolicy::HardPowerDown), Ok(()));
        assert_eq!(pd.power_off(&mut rec, PowerPolicy::ClockGatedWfi), Ok(()));
        assert_eq!(sim.write_count(), before);
    }

    #[test]
    fn test_hardware_off_record_catches_up() {
        let sim = SimSoc::new(4);
        sim.seed(PMU_PWRDN_CON, pd_core_bit(1));
        let pd = controller(sim, PolicyTracking::Software);
        let mut rec = CorePowerRecord::new(1);

        let before = sim.write_count();
        assert_eq!(pd.power_off(&mut rec, PowerPolicy::HardPowerDown), Ok(()));
        assert_eq!(sim.write_count(), before);
        assert_eq!(rec.state, CoreState::Off);
        assert_eq!(pd.policy_store().policy(1), Ok(PowerPolicy::HardPowerDown));
    }

    #[test]
    fn test_clock_gated_needs_no_parking() {
        let sim = SimSoc::new(4);
        let pd = controller(sim, PolicyTracking::Hardware);
        let mut rec = CorePowerRecord::new(1);

        assert_eq!(
            pd.power_off(&mut rec, PowerPolicy::ClockGatedWfiInterruptWake),
            Ok(())
        );
        assert_eq!(
            sim.peek(pmu_cpuapm_con(1)),
            (ApmFlags::PM_EN | ApmFlags::DIS_INT | ApmFlags::INT_WAKEUP_EN).bits()
        );
        assert_eq!(
            pd.policy_store().policy(1),
            Ok(PowerPolicy::ClockGatedWfiInterruptWake)
        );
    }

    #[test]
    fn test_clock_gated_wake_waits_for_core_down() {
        let sim = SimSoc::new(4);
        let pd = controller(sim, PolicyTracking::Hardware);
        let mut rec = CorePowerRecord::new(1);

        pd.power_off(&mut rec, PowerPolicy::ClockGatedWfi).unwrap();

        // Not yet in wfi: the domain still reports on
        assert_eq!(pd.power_on(&mut rec, 0x1000), Err(PmError::InvalidState));
        assert_eq!(rec.state, CoreState::Off);

        sim.park(1);
        assert_eq!(pd.power_on(&mut rec, 0x1000), Ok(()));
        assert_eq!(sim.peek(pmu_cpuapm_con(1)), ApmFlags::SFT_WAKEUP_EN.bits());
        assert!(pd.is_on(1));
    }

    #[test]
    fn test_power_on_rejects_pending_transition() {
        let sim = SimSoc::new(4);
        let pd = controller(sim, PolicyTracking::Software);
        let mut rec = CorePowerRecord::new(2);

        // Active core
        assert_eq!(pd.power_on(&mut rec, 0x1000), Err(PmError::InvalidState));

        sim.park(2);
        pd.power_off(&mut rec, PowerPolicy::HardPowerDown).unwrap();
        pd.power_on(&mut rec, 0x1000).unwrap();
        // Already waking
        assert_eq!(pd.power_on(&mut rec, 0x2000), Err(PmError::InvalidState));
        assert_eq!(
            pd.power_off(&mut rec, PowerPolicy::HardPowerDown),
            Err(PmError::InvalidState)
        );
    }

    #[test]
    fn test_unexpectedly_on_domain_is_cycled() {
        let sim = SimSoc::new(4);
        let pd = controller(sim, PolicyTracking::Software);
        let mut rec = CorePowerRecord::new(3);

        sim.park(3);
        pd.power_off(&mut rec, PowerPolicy::HardPowerDown).unwrap();
        // Something else switched the domain back on behind our back
        sim.seed(PMU_PWRDN_CON, 0);
        sim.clear_writes();

        assert_eq!(pd.power_on(&mut rec, 0x1000), Ok(()));
        let con_writes: Vec<u32> = sim
            .writes()
            .into_iter()
            .filter(|(addr, _)| *addr == PMU_PWRDN_CON)
            .map(|(_, v)| v & pd_core_bit(3))
            .collect();
        assert_eq!(con_writes, vec![pd_core_bit(3), 0]);
        assert!(pd.is_on(3));
    }

    #[test]
    fn test_pd_set_timeout() {
        let sim = SimSoc::new(4);
        sim.set_pd_stuck(2, true);
        let pd = controller(sim, PolicyTracking::Software);
        assert_eq!(pd.pd_set(2, false), Err(PmError::HardwareTimeoutSoft));
        assert_eq!(pd.pd_set(2, true), Ok(()));
    }

    #[test]
    fn test_policy_from_raw_id() {
        assert_eq!(PowerPolicy::try_from(1), Ok(PowerPolicy::HardPowerDown));
        assert_eq!(PowerPolicy::try_from(7), Err(PmError::UnsupportedRequest));
        assert_eq!(PowerPolicy::try_from(0x101), Err(PmError::UnsupportedRequest));
    }
}
