//! # Power-Controller Configuration
//!
//! Built once at boot and never changed afterwards.
//!
//! ```ignore
//! let config = PmConfig::builder()
//!     .topology(1, 4)
//!     .boot_core(0)
//!     .policy_tracking(PolicyTracking::Hardware)
//!     .build()?;
//! ```

use core::fmt;

use crate::clock::pll::PllSet;
use crate::soc::{CLKGATE_COUNT, MAX_CLUSTERS, MAX_CORES, PMUSRAM_BASE, PMUSRAM_SIZE};

// ============================================================================
// Polling Budgets
// ============================================================================

/// One bounded poll: `count` reads spaced `delay_us` apart
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Poll {
    /// Maximum number of status reads
    pub count: u32,
    /// Delay between reads (0 = back to back)
    pub delay_us: u32,
}

impl Poll {
    /// Create a poll budget
    pub const fn new(count: u32, delay_us: u32) -> Self {
        Self { count, delay_us }
    }
}

/// Every poll budget used by the sequences
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollBudgets {
    /// Wait for a core to park in wfi before hard power-down
    pub park: Poll,
    /// Wait for a clock-gated core to drop before soft wake
    pub wake: Poll,
    /// Power-domain switch confirmation
    pub power_domain: Poll,
    /// PLL relock
    pub pll_lock: Poll,
    /// DDR self-refresh entry and exit
    pub self_refresh: Poll,
    /// Bus idle acknowledge
    pub bus_idle: Poll,
    /// Cluster L2 flush and L2 wfi
    pub cluster: Poll,
    /// Log a warning every this many unsuccessful reads
    pub warn_every: u32,
}

impl PollBudgets {
    /// Defaults calibrated to the hardware
    pub const DEFAULT: Self = Self {
        park: Poll::new(500, 1),
        wake: Poll::new(100, 2),
        power_domain: Poll::new(500, 1),
        pll_lock: Poll::new(24_000, 0),
        self_refresh: Poll::new(10_000, 1),
        bus_idle: Poll::new(100_000, 0),
        cluster: Poll::new(100_000, 0),
        warn_every: 1000,
    };
}

// ============================================================================
// Policy Tracking
// ============================================================================

/// Where a core's last power-down policy is remembered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyTracking {
    /// Derived from PWRDN_CON and CPUAPM_CON
    Hardware,
    /// Kept in a per-core software array
    Software,
}

/// Placement of the always-on arena
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaPlacement {
    /// Physical base address
    pub base: usize,
    /// Size in bytes
    pub size: usize,
    /// Bytes reserved for the trampoline stack
    pub stack_size: usize,
}

/// Default wake-capable clock-gate mask (1 = keep ungated)
pub const DEFAULT_UNGATE_MASK: [u32; CLKGATE_COUNT] = [
    0x187f, 0x0000, 0x010c, 0x0000, 0x0200, //
    0x0010, 0x0000, 0x0017, 0x001f, 0x0000, //
    0x0000, 0x0000, 0x0000, 0x0003, 0x0000, //
    0xf001, 0x27c0, 0x04d9, 0x03ff, 0x0000, //
    0x0000, 0x0000, 0x0010, 0x0000, 0x0000, //
    0x0000, 0x0000, 0x0003, 0x0008,
];

// ============================================================================
// Configuration
// ============================================================================

/// Power-controller configuration
#[derive(Debug, Clone, Copy)]
pub struct PmConfig {
    /// Number of clusters
    pub clusters: usize,
    /// Cores in each cluster
    pub cores_per_cluster: usize,
    /// Linear index of the boot core
    pub boot_core: usize,
    /// Policy storage strategy
    pub policy_tracking: PolicyTracking,
    /// Poll budgets
    pub budgets: PollBudgets,
    /// Clock-gate bits left running through system sleep
    pub ungate_mask: [u32; CLKGATE_COUNT],
    /// PLLs switched off by the orchestrator (the DDR PLL is never listed)
    pub noncritical_plls: PllSet,
    /// Supply settle time after the PMIC leaves sleep
    pub pmic_settle_us: u32,
    /// Always-on arena
    pub arena: ArenaPlacement,
}

impl PmConfig {
    /// Start a builder
    pub fn builder() -> PmConfigBuilder {
        PmConfigBuilder::new()
    }

    /// Total number of cores
    pub const fn core_count(&self) -> usize {
        self.clusters * self.cores_per_cluster
    }

    /// Cluster of a core
    pub const fn cluster_of(&self, core: usize) -> usize {
        core / self.cores_per_cluster
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// No cores or no clusters
    EmptyTopology,
    /// More cores or clusters than the controller tracks
    TopologyTooLarge,
    /// Boot core is not part of the topology
    BootCoreOutOfRange,
    /// A poll budget allows zero reads
    ZeroPollBudget(&'static str),
    /// The DDR PLL was listed as non-critical
    DdrPllListed,
    /// Arena base or size is not aligned
    ArenaMisaligned,
    /// Arena cannot hold the stack and resume layout
    ArenaTooSmall,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ZeroPollBudget(name) => write!(f, "zero poll budget: {}", name),
            other => write!(f, "{:?}", other),
        }
    }
}

/// Builder for [`PmConfig`]
#[derive(Debug, Clone, Copy)]
pub struct PmConfigBuilder {
    config: PmConfig,
}

impl PmConfigBuilder {
    /// Builder with single-cluster quad-core defaults
    pub fn new() -> Self {
        Self {
            config: PmConfig {
                clusters: 1,
                cores_per_cluster: 4,
                boot_core: 0,
                policy_tracking: PolicyTracking::Hardware,
                budgets: PollBudgets::DEFAULT,
                ungate_mask: DEFAULT_UNGATE_MASK,
                noncritical_plls: PllSet::NONCRITICAL,
                pmic_settle_us: 100,
                arena: ArenaPlacement {
                    base: PMUSRAM_BASE,
                    size: PMUSRAM_SIZE,
                    stack_size: 0x800,
                },
            },
        }
    }

    /// Set the cluster topology
    pub fn topology(mut self, clusters: usize, cores_per_cluster: usize) -> Self {
        self.config.clusters = clusters;
        self.config.cores_per_cluster = cores_per_cluster;
        self
    }

    /// Set the boot core
    pub fn boot_core(mut self, core: usize) -> Self {
        self.config.boot_core = core;
        self
    }

    /// Choose the policy storage strategy
    pub fn policy_tracking(mut self, tracking: PolicyTracking) -> Self {
        self.config.policy_tracking = tracking;
        self
    }

    /// Replace all poll budgets
    pub fn budgets(mut self, budgets: PollBudgets) -> Self {
        self.config.budgets = budgets;
        self
    }

    /// Replace the wake-capable gate mask
    pub fn ungate_mask(mut self, mask: [u32; CLKGATE_COUNT]) -> Self {
        self.config.ungate_mask = mask;
        self
    }

    /// Set the PLLs handled by the orchestrator
    pub fn noncritical_plls(mut self, plls: PllSet) -> Self {
        self.config.noncritical_plls = plls;
        self
    }

    /// Set the PMIC settle delay
    pub fn pmic_settle_us(mut self, us: u32) -> Self {
        self.config.pmic_settle_us = us;
        self
    }

    /// Place the always-on arena
    pub fn arena(mut self, base: usize, size: usize, stack_size: usize) -> Self {
        self.config.arena = ArenaPlacement {
            base,
            size,
            stack_size,
        };
        self
    }

    /// Validate and build
    pub fn build(self) -> Result<PmConfig, ConfigError> {
        let c = self.config;

        if c.clusters == 0 || c.cores_per_cluster == 0 {
            return Err(ConfigError::EmptyTopology);
        }
        if c.clusters > MAX_CLUSTERS || c.core_count() > MAX_CORES {
            return Err(ConfigError::TopologyTooLarge);
        }
        if c.boot_core >= c.core_count() {
            return Err(ConfigError::BootCoreOutOfRange);
        }

        let b = &c.budgets;
        let polls = [
            ("park", b.park),
            ("wake", b.wake),
            ("power_domain", b.power_domain),
            ("pll_lock", b.pll_lock),
            ("self_refresh", b.self_refresh),
            ("bus_idle", b.bus_idle),
            ("cluster", b.cluster),
        ];
        for (name, poll) in polls {
            if poll.count == 0 {
                return Err(ConfigError::ZeroPollBudget(name));
            }
        }
        if b.warn_every == 0 {
            return Err(ConfigError::ZeroPollBudget("warn_every"));
        }

        if c.noncritical_plls.contains(PllSet::DPLL) {
            return Err(ConfigError::DdrPllListed);
        }

        if c.arena.base % 8 != 0 || c.arena.size % 16 != 0 {
            return Err(ConfigError::ArenaMisaligned);
        }
        if c.arena.size < c.arena.stack_size + crate::sram::LAYOUT_RESERVED {
            return Err(ConfigError::ArenaTooSmall);
        }

        Ok(c)
    }
}

impl Default for PmConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_build() {
        let config = PmConfig::builder().build().unwrap();
        assert_eq!(config.core_count(), 4);
        assert_eq!(config.boot_core, 0);
        assert_eq!(config.policy_tracking, PolicyTracking::Hardware);
        assert!(!config.noncritical_plls.contains(PllSet::DPLL));
        assert_eq!(config.ungate_mask[0], 0x187f);
        assert_eq!(config.ungate_mask[28], 0x0008);
    }

    #[test]
    fn test_default_builder_is_new() {
        let a = PmConfigBuilder::default().build().unwrap();
        let b = PmConfigBuilder::new().build().unwrap();
        assert_eq!(format!("{:?}", a), format!("{:?}", b));
    }

    #[test]
    fn test_rejects_empty_topology() {
        let err = PmConfig::builder().topology(1, 0).build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyTopology);
        let err = PmConfig::builder().topology(0, 4).build().unwrap_err();
        assert_eq!(err, ConfigError::EmptyTopology);
    }

    #[test]
    fn test_rejects_oversized_topology() {
        let err = PmConfig::builder().topology(2, 5).build().unwrap_err();
        assert_eq!(err, ConfigError::TopologyTooLarge);
        let err = PmConfig::builder().topology(3, 1).build().unwrap_err();
        assert_eq!(err, ConfigError::TopologyTooLarge);
    }

    #[test]
    fn test_rejects_boot_core_outside_topology() {
        let err = PmConfig::builder()
            .topology(2, 2)
            .boot_core(4)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::BootCoreOutOfRange);
        assert!(PmConfig::builder().topology(2, 2).boot_core(3).build().is_ok());
    }

    #[test]
    fn test_rejects_zero_poll_budget() {
        let mut budgets = PollBudgets::DEFAULT;
        budgets.pll_lock = Poll::new(0, 0);
        let err = PmConfig::builder().budgets(budgets).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroPollBudget("pll_lock"));

        let mut budgets = PollBudgets::DEFAULT;
        budgets.warn_every = 0;
        let err = PmConfig::builder().budgets(budgets).build().unwrap_err();
        assert_eq!(err, ConfigError::ZeroPollBudget("warn_every"));
    }

    #[test]
    fn test_rejects_ddr_pll_as_noncritical() {
        let err = PmConfig::builder()
            .noncritical_plls(PllSet::NONCRITICAL | PllSet::DPLL)
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DdrPllListed);
    }

    #[test]
    fn test_rejects_bad_arena() {
        let err = PmConfig::builder().arena(0x1004, 0x1000, 0x100).build().unwrap_err();
        assert_eq!(err, ConfigError::ArenaMisaligned);
        let err = PmConfig::builder().arena(0x1000, 0x100, 0x100).build().unwrap_err();
        assert_eq!(err, ConfigError::ArenaTooSmall);
    }

    #[test]
    fn test_cluster_of() {
        let config = PmConfig::builder().topology(2, 2).build().unwrap();
        assert_eq!(config.cluster_of(1), 0);
        assert_eq!(config.cluster_of(2), 1);
    }
}
