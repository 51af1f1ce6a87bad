//! # Power-Down Policy Storage
//!
//! A core's last power-down policy decides how it is brought back. Two
//! strategies exist:
//!
//! - [`HardwarePolicyStore`]: the policy is implied by PWRDN_CON and
//!   CPUAPM_CON, nothing extra is written.
//! - [`SoftwarePolicyStore`]: a per-core array, published with release
//!   ordering and a barrier so the core that later powers the target on sees
//!   it.
//!
//! [`PolicyTracker`] picks one at configuration time.

use core::sync::atomic::{AtomicU8, Ordering};

use rkpm_hal::barrier::dsb;
use rkpm_hal::Mmio;

use super::PowerPolicy;
use crate::config::PolicyTracking;
use crate::error::{PmError, PmResult};
use crate::soc::{pd_core_bit, pmu_cpuapm_con, ApmFlags, MAX_CORES, PMU_PWRDN_CON};

/// Remembers each core's last power-down policy
pub trait PolicyStore {
    /// Policy the core was last powered down with
    fn policy(&self, core: usize) -> PmResult<PowerPolicy>;

    /// Record the policy about to be applied
    fn record(&self, core: usize, policy: PowerPolicy);
}

// ============================================================================
// Hardware-Tracked
// ============================================================================

/// Policy derived from the power-domain and auto-power-down registers
#[derive(Debug, Clone, Copy)]
pub struct HardwarePolicyStore<M> {
    mmio: M,
}

impl<M: Mmio> HardwarePolicyStore<M> {
    /// Create the store
    pub const fn new(mmio: M) -> Self {
        Self { mmio }
    }
}

impl<M: Mmio> PolicyStore for HardwarePolicyStore<M> {
    fn policy(&self, core: usize) -> PmResult<PowerPolicy> {
        let pd = self.mmio.read32(PMU_PWRDN_CON) & pd_core_bit(core) != 0;
        let apm = ApmFlags::from_bits_truncate(self.mmio.read32(pmu_cpuapm_con(core)));

        match (pd, apm.contains(ApmFlags::PM_EN)) {
            (true, false) => Ok(PowerPolicy::HardPowerDown),
            (false, true) if apm.contains(ApmFlags::INT_WAKEUP_EN) => {
                Ok(PowerPolicy::ClockGatedWfiInterruptWake)
            }
            (false, true) => Ok(PowerPolicy::ClockGatedWfi),
            _ => {
                log::error!(
                    "PolicyStore: core {} has no consistent policy (pd={}, apm={:?})",
                    core,
                    pd,
                    apm
                );
                Err(PmError::InvalidState)
            }
        }
    }

    fn record(&self, _core: usize, _policy: PowerPolicy) {}
}

// ============================================================================
// Software-Tracked
// ============================================================================

/// Per-core policy array
#[derive(Debug)]
pub struct SoftwarePolicyStore {
    slots: [AtomicU8; MAX_CORES],
}

/// Slot value before any policy was recorded
const NO_POLICY: u8 = 0;

impl SoftwarePolicyStore {
    /// Create an empty store
    pub const fn new() -> Self {
        Self {
            slots: [const { AtomicU8::new(NO_POLICY) }; MAX_CORES],
        }
    }
}

impl Default for SoftwarePolicyStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PolicyStore for SoftwarePolicyStore {
    fn policy(&self, core: usize) -> PmResult<PowerPolicy> {
        let slot = self.slots.get(core).ok_or(PmError::UnsupportedRequest)?;
        PowerPolicy::from_raw(slot.load(Ordering::Acquire)).ok_or(PmError::InvalidState)
    }

    fn record(&self, core: usize, policy: PowerPolicy) {
        if let Some(slot) = self.slots.get(core) {
            slot.store(policy as u8, Ordering::Release);
            dsb();
        }
    }
}

// ============================================================================
// Strategy Selection
// ============================================================================

/// The policy store chosen by configuration
#[derive(Debug)]
pub enum PolicyTracker<M> {
    /// Derived from hardware registers
    Hardware(HardwarePolicyStore<M>),
    /// Software array
    Software(SoftwarePolicyStore),
}

impl<M: Mmio> PolicyTracker<M> {
    /// Build the store for `tracking`
    pub fn new(tracking: PolicyTracking, mmio: M) -> Self {
        match tracking {
            PolicyTracking::Hardware => PolicyTracker::Hardware(HardwarePolicyStore::new(mmio)),
            PolicyTracking::Software => PolicyTracker::Software(SoftwarePolicyStore::new()),
        }
    }
}

impl<M: Mmio> PolicyStore for PolicyTracker<M> {
    fn policy(&self, core: usize) -> PmResult<PowerPolicy> {
        match self {
            PolicyTracker::Hardware(store) => store.policy(core),
            PolicyTracker::Software(store) => store.policy(core),
        }
    }

    fn record(&self, core: usize, policy: PowerPolicy) {
        match self {
            PolicyTracker::Hardware(store) => store.record(core, policy),
            PolicyTracker::Software(store) => store.record(core, policy),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
