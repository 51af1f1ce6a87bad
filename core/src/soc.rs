//! # SoC Register Map
//!
//! Fixed register layout of the supported SoC. Only the registers the power
//! sequences touch are listed.
//!
//! ## Blocks
//!
//! | Block     | Base          | Write convention |
//! |-----------|---------------|------------------|
//! | PMU       | `0xff14_0000` | plain            |
//! | CRU       | `0xff44_0000` | write-masked     |
//! | GRF       | `0xff10_0000` | write-masked     |
//! | SGRF      | `0xff0d_0000` | write-masked     |
//! | DDR GRF   | `0xff79_8000` | write-masked     |
//! | DDR uPCTL | `0xff40_0000` | plain            |
//! | GPIO2     | `0xff23_0000` | plain            |
//! | UART2     | `0xff13_0000` | plain            |
//! | PMU SRAM  | `0xff09_0000` | memory           |

use bitflags::bitflags;

// ============================================================================
// Topology Limits
// ============================================================================

/// Maximum number of cores handled by one controller
pub const MAX_CORES: usize = 8;

/// Maximum number of clusters
pub const MAX_CLUSTERS: usize = 2;

// ============================================================================
// Block Bases
// ============================================================================

/// Power management unit
pub const PMU_BASE: usize = 0xff14_0000;
/// Clock and reset unit
pub const CRU_BASE: usize = 0xff44_0000;
/// General register file
pub const GRF_BASE: usize = 0xff10_0000;
/// Secure general register file
pub const SGRF_BASE: usize = 0xff0d_0000;
/// DDR general register file
pub const DDR_GRF_BASE: usize = 0xff79_8000;
/// DDR protocol controller
pub const DDR_UPCTL_BASE: usize = 0xff40_0000;
/// GPIO bank 2 (PMIC sleep pin)
pub const GPIO2_BASE: usize = 0xff23_0000;
/// Debug UART
pub const UART2_BASE: usize = 0xff13_0000;
/// Always-on PMU SRAM
pub const PMUSRAM_BASE: usize = 0xff09_0000;
/// PMU SRAM size
pub const PMUSRAM_SIZE: usize = 0x2000;

// ============================================================================
// PMU
// ============================================================================

/// Wake-up source configuration
pub const PMU_WKUP_CFG2: usize = PMU_BASE + 0x08;
/// Power-domain control (1 = off)
pub const PMU_PWRDN_CON: usize = PMU_BASE + 0x0c;
/// Power-domain status (1 = off)
pub const PMU_PWRDN_ST: usize = PMU_BASE + 0x10;
/// Core power-mode word for system sleep
pub const PMU_PWRMD_CORE: usize = PMU_BASE + 0x14;
/// Common power-mode word for system sleep
pub const PMU_PWRMD_COM: usize = PMU_BASE + 0x18;
/// Software control
pub const PMU_SFT_CON: usize = PMU_BASE + 0x1c;
/// Bus idle request
pub const PMU_BUS_IDLE_REQ: usize = PMU_BASE + 0x28;
/// Bus idle status and acknowledge
pub const PMU_BUS_IDLE_ST: usize = PMU_BASE + 0x2c;
/// Core power status (WFI, L2 flush, L2 WFI)
pub const PMU_CORE_PWR_ST: usize = PMU_BASE + 0x30;
/// PLL lock counter (24 MHz cycles)
pub const PMU_PLLLOCK_CNT: usize = PMU_BASE + 0x34;
/// PLL reset counter (24 MHz cycles)
pub const PMU_PLLRST_CNT: usize = PMU_BASE + 0x38;
/// Supply stable counter (24 MHz cycles)
pub const PMU_STABLE_CNT: usize = PMU_BASE + 0x3c;

/// Per-core auto-power-down configuration
#[inline]
#[inline(always)]
pub const fn pmu_cpuapm_con(core: usize) -> usize {
    PMU_BASE + 0x40 + core * 4
}

/// Power-domain control/status bit of a core
#[inline]
pub const fn pd_core_bit(core: usize) -> u32 {
    1 << core
}

/// CORE_PWR_ST: core is in standby wfi
#[inline]
pub const fn core_wfi_bit(core: usize) -> u32 {
    1 << core
}

/// CORE_PWR_ST: cluster L2 flush done
#[inline]
pub const fn l2_flush_done_bit(cluster: usize) -> u32 {
    1 << (16 + cluster)
}

/// CORE_PWR_ST: cluster L2 in wfi
#[inline]
pub const fn l2_wfi_bit(cluster: usize) -> u32 {
    1 << (20 + cluster)
}

/// Convert a time to 24 MHz oscillator cycles
#[inline]
pub const fn cycles_24m_us(us: u32) -> u32 {
    us * 24
}

bitflags! {
    /// CPUAPM_CON: automatic power management of one core
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ApmFlags: u32 {
        /// Power the core down when it enters wfi
        const PM_EN = 1 << 0;
        /// Wake the core on an interrupt
        const INT_WAKEUP_EN = 1 << 1;
        /// Mask interrupts to the core while powered down
        const DIS_INT = 1 << 2;
        /// Software wake request
        const SFT_WAKEUP_EN = 1 << 3;
    }
}

/// CPUAPM value with every automatic power management feature off
pub const CORES_PM_DISABLE: u32 = 0;

bitflags! {
    /// PMU_SFT_CON: software overrides
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct SftCon: u32 {
        /// Request DDR self-refresh
        const DDR_SREF_REQ = 1 << 0;
        /// DDR io retention
        const DDR_RETENTION = 1 << 2;
        /// Flush L2 of cluster 0
        const L2FLUSH_CLST0 = 1 << 4;
        /// Flush L2 of cluster 1
        const L2FLUSH_CLST1 = 1 << 5;
        /// Hold ACINACTM of cluster 0
        const ACINACTM_CLST0 = 1 << 6;
        /// Hold ACINACTM of cluster 1
        const ACINACTM_CLST1 = 1 << 7;
        /// Global interrupt disable during sleep
        const GLBL_INT_DIS = 1 << 8;
    }
}

impl SftCon {
    /// L2 flush request of a cluster
    pub const fn l2_flush(cluster: usize) -> Self {
        Self::from_bits_retain(1 << (4 + cluster))
    }

    /// ACINACTM of a cluster
    pub const fn acinactm(cluster: usize) -> Self {
        Self::from_bits_retain(1 << (6 + cluster))
    }
}

bitflags! {
    /// PMU_PWRMD_CORE: what the PMU turns off around the cores
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PwrmdCore: u32 {
        /// Global interrupt disable
        const GLOBAL_INT_DIS = 1 << 0;
        /// Power down cpu0
        const CPU0_PD = 1 << 1;
        /// Power down the boot cluster SCU
        const SCU_PD = 1 << 2;
        /// Flush L2 before power down
        const L2_FLUSH = 1 << 3;
        /// Wait for L2 idle
        const L2_IDLE = 1 << 4;
        /// Clock-gate the boot cluster
        const CLR_CLST = 1 << 5;
        /// Clock-gate the core bus
        const CLR_CORE = 1 << 6;
        /// Clock-gate the interconnect
        const CLR_CCI = 1 << 7;
        /// Power down the core domain
        const CORE_PD = 1 << 8;
    }
}

bitflags! {
    /// PMU_PWRMD_COM: common sleep mode
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PwrmdCom: u32 {
        /// Enable the PMU sleep state machine
        const MODE_EN = 1 << 0;
        /// Enter DDR self-refresh from the state machine
        const SREF_ENTER = 1 << 1;
        /// Turn off the logic supply
        const PWR_OFF = 1 << 2;
    }
}

bitflags! {
    /// PMU_WKUP_CFG2: wake sources
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct WakeupCfg: u32 {
        /// Cluster 0 interrupt wake
        const CLUSTER0 = 1 << 0;
        /// Cluster 1 interrupt wake
        const CLUSTER1 = 1 << 1;
        /// GPIO wake
        const GPIO = 1 << 2;
    }
}

// ============================================================================
// CRU
// ============================================================================

/// Number of PLLs
pub const PLL_COUNT: usize = 5;
/// Control words per PLL
pub const PLL_CON_COUNT: usize = 5;
/// Number of clock-gate registers
pub const CLKGATE_COUNT: usize = 29;

/// PLL mode register (slow/normal per PLL)
pub const CRU_MODE: usize = CRU_BASE + 0xa0;
/// Global first soft reset
pub const CRU_GLB_SRST_FST: usize = CRU_BASE + 0x9c;
/// Magic value for [`CRU_GLB_SRST_FST`]
pub const CRU_GLB_SRST_FST_VALUE: u32 = 0xfdb9;

/// PLL control word `index` of `pll`
#[inline]
#[inline(always)]
pub const fn pll_con(pll: usize, index: usize) -> usize {
    CRU_BASE + pll * 0x20 + index * 4
}

/// Clock select register
#[inline]
pub const fn cru_clksel_con(index: usize) -> usize {
    CRU_BASE + 0x100 + index * 4
}

/// Clock gate register
#[inline]
#[inline(always)]
pub const fn cru_clkgate_con(index: usize) -> usize {
    CRU_BASE + 0x200 + index * 4
}

/// PLL_CON1: soft power-down control select
pub const PLL_PD_CTRL_SHIFT: u32 = 15;
/// PLL_CON1: power down
pub const PLL_PD_SHIFT: u32 = 14;
/// PLL_CON1: lock status (read only)
pub const PLL_LOCK: u32 = 1 << 10;

/// Bit of a PLL in [`CRU_MODE`] (1 = normal, 0 = slow)
#[inline]
#[inline(always)]
pub const fn pll_mode_bit(pll: usize) -> u32 {
    match pll {
        0 => 0,
        1 => 4,
        2 => 8,
        3 => 12,
        _ => 1,
    }
}

// ============================================================================
// GRF / SGRF / DDR
// ============================================================================

/// GPIO2D iomux (PMIC sleep pin)
pub const GRF_GPIO2D_IOMUX: usize = GRF_BASE + 0x34;
/// Iomux field of the PMIC sleep pin
pub const PMIC_SLEEP_IOMUX_MASK: u32 = 0x3;
/// Iomux field shift of the PMIC sleep pin
pub const PMIC_SLEEP_IOMUX_SHIFT: u32 = 4;

/// SGRF SoC control
#[inline]
#[inline(always)]
pub const fn sgrf_soc_con(index: usize) -> usize {
    SGRF_BASE + index * 4
}

/// Boot address register holds `addr >> 16`
pub const CPU_BOOT_ADDR_ALIGN: u32 = 16;

/// DDR GRF control 0
pub const DDRGRF_SOC_CON0: usize = DDR_GRF_BASE;
/// DDR GRF status 1 (self-refresh state in bits 13:12)
pub const DDRGRF_SOC_STATUS1: usize = DDR_GRF_BASE + 0x104;
/// Self-refresh state field shift
pub const DDR_SREF_STATE_SHIFT: u32 = 12;
/// Self-refresh state field mask
pub const DDR_SREF_STATE_MASK: u32 = 0x3;
/// Self-refresh state: normal operation
pub const DDR_SREF_STATE_NORMAL: u32 = 0;
/// Self-refresh state: in self-refresh
pub const DDR_SREF_STATE_SREF: u32 = 2;
/// DDR GRF con0: csysreq override enable
pub const DDRGRF_CSYSREQ_OVERRIDE: u32 = 14;
/// DDR GRF con0: csysreq from the PMU
pub const DDRGRF_CSYSREQ_PMU: u32 = 15;

/// uPCTL power control
pub const DDR_PCTL2_PWRCTL: usize = DDR_UPCTL_BASE + 0x30;
/// Self-refresh on idle
pub const SELFREF_EN: u32 = 1 << 0;

// ============================================================================
// GPIO / UART
// ============================================================================

/// GPIO data register
pub const GPIO_SWPORTA_DR: usize = 0x00;
/// GPIO direction register
pub const GPIO_SWPORTA_DDR: usize = 0x04;
/// GPIO2_D2, wired to the PMIC sleep input
pub const GPIO2_PMIC_SLEEP: u32 = 1 << 26;

/// UART interrupt enable
pub const UART_IER: usize = 0x04;
/// UART FIFO control
pub const UART_FCR: usize = 0x08;
/// Enable and clear both FIFOs
pub const UART_FIFO_RESET: u32 = 0x07;
/// All UART interrupts off
pub const UART_INT_DISABLE: u32 = 0;
/// Gate register and bit of the UART2 baud clock
pub const UART2_SCLK_GATE: (usize, u32) = (16, 13);
/// Gate register and bit of the UART2 bus clock
pub const UART2_PCLK_GATE: (usize, u32) = (2, 2);
