//! # Power Orchestrator
//!
//! The power-controller context: one object, created at boot, that owns
//! every per-core record and every saved snapshot, and serializes all
//! transitions behind one lock.
//!
//! ## System State Machine
//!
//! ```text
//!  Running ──▶ CpusParking ──▶ SystemSuspending ──▶ Asleep
//!     ▲             │ (a core never parks)            │
//!     ├─────────────┘                                 │ enter_system_sleep()
//!     │                                               ▼
//!     └──────────────── SystemResuming ◀──── SRAM trampoline
//! ```
//!
//! ## Core Hotplug
//!
//! ```text
//!   core_power_off / core_suspend     (calling core)
//!   core_power_on(mpidr, entry)       (any core)
//!   warm_boot_entry(core)             (woken core, first instruction)
//!   core_on_finish / core_resume      (woken core, checkpoint)
//! ```

pub mod hooks;
pub mod sleep;

use core::sync::atomic::{AtomicU32, Ordering};

use rkpm_hal::barrier::dsb;
use rkpm_hal::mmio::bits_with_wmask;
use rkpm_hal::{Mmio, Mpidr, StackEntry};
use spin::Mutex;

use crate::clock::{ClockGateSnapshot, PllId, PllSequencer, PllSnapshot};
use crate::config::PmConfig;
use crate::ddr::DdrTiming;
use crate::domain::cluster::ClusterSequencer;
use crate::domain::policy::PolicyTracker;
use crate::domain::{CorePowerRecord, CoreState, DomainController, PowerPolicy, WakeReason};
use crate::error::{PmError, PmResult};
use crate::platform::Platform;
use crate::pmic::PmicSleepSignal;
use crate::poll::absorb_soft_timeout;
use crate::soc::{
    pll_mode_bit, SftCon, CRU_GLB_SRST_FST, CRU_GLB_SRST_FST_VALUE, CRU_MODE, MAX_CORES,
    PMU_PWRDN_ST, PMU_SFT_CON,
};
use crate::sram::layout::SramResumeLayout;
use crate::sram::trampoline::{set_boot_vector, Handoff};
use crate::sram::SramArena;

pub use hooks::PowerHooks;

// ============================================================================
// System State
// ============================================================================

/// Whole-system power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum SystemState {
    /// Normal operation
    Running          = 0,
    /// Powering off the non-boot cores
    CpusParking      = 1,
    /// Saving clocks and PLLs
    SystemSuspending = 2,
    /// Ready for the SRAM-resident sequence
    Asleep           = 3,
    /// Restoring clocks and PLLs after wake
    SystemResuming   = 4,
}

impl From<u32> for SystemState {
    fn from(value: u32) -> Self {
        match value {
            0 => SystemState::Running,
            1 => SystemState::CpusParking,
            2 => SystemState::SystemSuspending,
            3 => SystemState::Asleep,
            _ => SystemState::SystemResuming,
        }
    }
}

/// Everything guarded by the transition lock
#[derive(Debug)]
struct ControllerState<P> {
    cores: [CorePowerRecord; MAX_CORES],
    gates: Option<ClockGateSnapshot>,
    plls: Option<PllSnapshot>,
    arena: Option<SramArena<P>>,
}

impl<P> ControllerState<P> {
    fn new() -> Self {
        let mut cores = [CorePowerRecord::new(0); MAX_CORES];
        for (i, rec) in cores.iter_mut().enumerate() {
            rec.core = i;
        }
        Self {
            cores,
            gates: None,
            plls: None,
            arena: None,
        }
    }
}

// ============================================================================
// Power Controller
// ============================================================================

/// The power-controller context
#[derive(Debug)]
pub struct PowerController<P: Platform> {
    platform: P,
    config: PmConfig,
    domains: DomainController<P>,
    state: Mutex<ControllerState<P>>,
    system: AtomicU32,
}

impl<P: Platform> PowerController<P> {
    /// Create the controller; nothing touches hardware until [`Self::init`]
    pub fn new(platform: P, config: PmConfig) -> Self {
        let policy = PolicyTracker::new(config.policy_tracking, platform);
        Self {
            platform,
            config,
            domains: DomainController::new(platform, config.budgets, policy),
            state: Mutex::new(ControllerState::new()),
            system: AtomicU32::new(SystemState::Running as u32),
        }
    }

    /// Configuration in use
    pub fn config(&self) -> &PmConfig {
        &self.config
    }

    /// Current system state
    pub fn system_state(&self) -> SystemState {
        SystemState::from(self.system.load(Ordering::SeqCst))
    }

    fn set_system_state(&self, state: SystemState) {
        self.system.store(state as u32, Ordering::SeqCst);
    }

    fn record<'a>(
        &self,
        st: &'a mut ControllerState<P>,
        core: usize,
    ) -> PmResult<&'a mut CorePowerRecord> {
        if core >= self.config.core_count() {
            log::warn!("PowerController: no core {}", core);
            return Err(PmError::UnsupportedRequest);
        }
        Ok(&mut st.cores[core])
    }

    fn layout(&self, arena: &SramArena<P>, ddr_flag: u64) -> SramResumeLayout {
        SramResumeLayout {
            sp: arena.stack_top() as u64,
            ddr_func: arena.entry() as u64,
            ddr_data: arena.handoff_addr() as u64,
            ddr_flag,
            boot_mpidr: self.platform.current_mpidr().affinity(),
        }
    }

    fn handoff(&self, arena: SramArena<P>) -> Handoff<P> {
        Handoff {
            platform: self.platform,
            arena,
            timing: DdrTiming {
                self_refresh: self.config.budgets.self_refresh,
                pll_lock: self.config.budgets.pll_lock,
            },
            pmic_settle_us: self.config.pmic_settle_us,
            warm_boot_vector: self.platform.warm_boot_entry(),
            clusters: self.config.clusters,
        }
    }

    fn clusters(&self) -> ClusterSequencer<P> {
        ClusterSequencer::new(self.platform, self.config.budgets)
    }

    fn cluster_cores(&self, cluster: usize) -> core::ops::Range<usize> {
        let cpc = self.config.cores_per_cluster;
        cluster * cpc..(cluster + 1) * cpc
    }

    // ========================================================================
    // Initialisation
    // ========================================================================

    /// Install the arena, publish the resume layout and park secondary cores
    pub fn init(&self) -> PmResult<()> {
        let mut st = self.state.lock();
        *st = ControllerState::new();

        // SAFETY: the configured arena is reserved for the power controller.
        let arena = unsafe { SramArena::install(&self.platform, self.config.arena)? };
        arena.write_handoff(self.handoff(arena));
        arena.publish_layout(&self.layout(&arena, SramResumeLayout::DDR_RUNNING));
        set_boot_vector(&self.platform, self.platform.warm_boot_entry(), self.config.clusters);
        st.arena = Some(arena);

        for core in 0..self.config.core_count() {
            if core == self.config.boot_core {
                continue;
            }
            if let Err(e) = self.domains.power_off(&mut st.cores[core], PowerPolicy::HardPowerDown) {
                log::warn!("PowerController: core {} left on at init ({})", core, e);
            }
        }

        self.set_system_state(SystemState::Running);
        log::info!(
            "PowerController: {} cores, pd status {:#x}",
            self.config.core_count(),
            self.platform.read32(PMU_PWRDN_ST)
        );
        Ok(())
    }

    // ========================================================================
    // Core Hotplug
    // ========================================================================

    /// Power on `core`, resuming at `entry`
    pub fn power_on(&self, core: usize, entry: usize) -> PmResult<()> {
        let mut st = self.state.lock();
        let rec = self.record(&mut st, core)?;
        self.domains.power_on(rec, entry)
    }

    /// Power off `core` with `policy`
    pub fn power_off(&self, core: usize, policy: PowerPolicy) -> PmResult<()> {
        let mut st = self.state.lock();
        let rec = self.record(&mut st, core)?;
        self.domains.power_off(rec, policy)
    }

    /// Power on the core with hardware id `mpidr`
    pub fn core_power_on(&self, mpidr: Mpidr, entry: usize) -> PmResult<()> {
        let Some(core) = mpidr.core_index(self.config.clusters, self.config.cores_per_cluster)
        else {
            log::warn!("PowerController: no core with mpidr {:#x}", mpidr.value());
            return Err(PmError::UnsupportedRequest);
        };
        self.power_on(core, entry)
    }

    /// Clock-gate the calling core until it is powered on again
    pub fn core_power_off(&self) -> PmResult<()> {
        self.power_off(self.platform.current_core(), PowerPolicy::ClockGatedWfi)
    }

    /// Auto power-down of the calling core, woken by interrupts
    pub fn core_suspend(&self) -> PmResult<()> {
        let core = self.platform.current_core();
        let mut st = self.state.lock();
        let rec = self.record(&mut st, core)?;

        if rec.state != CoreState::Active {
            return Err(PmError::InvalidState);
        }
        rec.reason = WakeReason::AutoPowerDown;
        rec.entry = Some(self.platform.secure_entry());
        self.domains
            .power_off(rec, PowerPolicy::ClockGatedWfiInterruptWake)
    }

    fn checkpoint(&self) -> PmResult<()> {
        let core = self.platform.current_core();
        let mut st = self.state.lock();
        let rec = self.record(&mut st, core)?;

        // Stop the wake configuration from firing again
        self.domains.clear_soft_wake(core);

        rec.state = CoreState::Active;
        rec.entry = None;
        Ok(())
    }

    /// Calling core reached its first checkpoint after power-on
    pub fn core_on_finish(&self) -> PmResult<()> {
        self.checkpoint()
    }

    /// Calling core reached its first checkpoint after auto power-down
    pub fn core_resume(&self) -> PmResult<()> {
        self.checkpoint()
    }

    /// Where a woken core continues, handed out exactly once
    pub fn warm_boot_entry(&self, core: usize) -> PmResult<(WakeReason, usize)> {
        let mut st = self.state.lock();
        self.record(&mut st, core)?.take_entry()
    }

    /// Domain state of `core`
    pub fn core_state(&self, core: usize) -> PmResult<CoreState> {
        let mut st = self.state.lock();
        Ok(self.record(&mut st, core)?.state)
    }

    // ========================================================================
    // System Sleep
    // ========================================================================

    /// Everything before the SRAM-resident half of system sleep
    ///
    /// On return the system is [`SystemState::Asleep`] and the caller
    /// continues with [`Self::enter_system_sleep`].
    pub fn system_suspend(&self) -> PmResult<()> {
        let mut st = self.state.lock();
        if self.system_state() != SystemState::Running {
            return Err(PmError::InvalidState);
        }
        let arena = st.arena.ok_or(PmError::InvalidState)?;
        let me = self.platform.current_core();

        self.set_system_state(SystemState::CpusParking);
        for core in 0..self.config.core_count() {
            if core == me {
                continue;
            }
            if let Err(e) = self.domains.power_off(&mut st.cores[core], PowerPolicy::HardPowerDown) {
                log::warn!("PowerController: system suspend aborted, core {} ({})", core, e);
                self.set_system_state(SystemState::Running);
                return Err(e);
            }
        }

        self.set_system_state(SystemState::SystemSuspending);
        sleep::configure_sleep_mode(&self.platform, self.config.clusters);

        st.gates = Some(ClockGateSnapshot::save_and_gate(
            &self.platform,
            &self.config.ungate_mask,
        ));
        st.plls = Some(
            PllSequencer::new(self.platform, self.config.budgets.pll_lock)
                .suspend_all(self.config.noncritical_plls),
        );

        let my_cluster = self.config.cluster_of(me);
        for cluster in (0..self.config.clusters).filter(|&c| c != my_cluster) {
            let result = self.clusters().power_down(cluster, self.cluster_cores(cluster));
            if let Err(e) = absorb_soft_timeout(result, "cluster power-down") {
                log::warn!("PowerController: cluster {} stays up ({})", cluster, e);
            }
        }

        arena.write_handoff(self.handoff(arena));
        arena.publish_layout(&self.layout(&arena, SramResumeLayout::DDR_RETAINED));

        self.set_system_state(SystemState::Asleep);
        log::info!("PowerController: system suspend prepared on core {}", me);
        Ok(())
    }

    /// Switch onto the arena stack and run the SRAM-resident suspend path
    pub fn enter_system_sleep(&self) -> ! {
        let arena = {
            let st = self.state.lock();
            st.arena
        };

        match arena {
            Some(arena) if self.system_state() == SystemState::Asleep => {
                // SAFETY: install() copied the image holding sram_entry::<P>
                // to the arena, and entry() is its relocated address.
                let entry: StackEntry = unsafe { core::mem::transmute(arena.entry()) };
                // SAFETY: the arena stack and handoff were set up by
                // system_suspend(); the lock guard is already released.
                unsafe {
                    self.platform
                        .run_on_stack(arena.stack_top(), entry, arena.handoff_addr())
                }
            }
            _ => {
                log::error!(
                    "PowerController: system sleep entered in {:?}",
                    self.system_state()
                );
                self.platform.halt()
            }
        }
    }

    /// Everything after the SRAM-resident resume path
    pub fn system_resume(&self) -> PmResult<()> {
        let mut st = self.state.lock();
        if self.system_state() != SystemState::Asleep {
            return Err(PmError::InvalidState);
        }
        let arena = st.arena.ok_or(PmError::InvalidState)?;
        let (Some(gates), Some(plls)) = (st.gates.take(), st.plls.take()) else {
            return Err(PmError::InvalidState);
        };

        self.set_system_state(SystemState::SystemResuming);

        let failed = PllSequencer::new(self.platform, self.config.budgets.pll_lock).resume_all(plls);
        if !failed.is_empty() {
            log::error!("PowerController: {:?} still in slow mode", failed);
        }

        let my_cluster = self.config.cluster_of(self.platform.current_core());
        for cluster in (0..self.config.clusters).filter(|&c| c != my_cluster) {
            if let Err(e) = absorb_soft_timeout(self.clusters().power_up(cluster), "cluster power-up") {
                log::warn!("PowerController: cluster {} not restored ({})", cluster, e);
            }
        }

        gates.restore(&self.platform);
        self.platform.enable_interrupt_routing();
        self.platform
            .clear_bits(PMU_SFT_CON, SftCon::GLBL_INT_DIS.bits());
        arena.publish_layout(&self.layout(&arena, SramResumeLayout::DDR_RUNNING));

        self.set_system_state(SystemState::Running);
        log::info!("PowerController: system resumed");
        Ok(())
    }

    /// Reset the SoC
    pub fn soft_reset(&self) -> ! {
        for pll in PllId::ALL {
            self.platform
                .write32(CRU_MODE, bits_with_wmask(0, 1, pll_mode_bit(pll.index())));
        }
        dsb();
        self.platform.write32(CRU_GLB_SRST_FST, CRU_GLB_SRST_FST_VALUE);
        dsb();
        self.platform.halt()
    }

    /// Switch the board off through the PMIC
    pub fn system_off(&self) -> ! {
        PmicSleepSignal::new(self.platform).power_off()
    }
}

// ============================================================================
// TESTS
// ============================================================================
