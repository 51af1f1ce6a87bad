//! PMU sleep-mode programming.

use rkpm_hal::barrier::dsb;
use rkpm_hal::Mmio;

use crate::soc::{
    cycles_24m_us, PwrmdCom, PwrmdCore, SftCon, WakeupCfg, PMU_PLLLOCK_CNT, PMU_PLLRST_CNT,
    PMU_PWRMD_COM, PMU_PWRMD_CORE, PMU_SFT_CON, PMU_STABLE_CNT, PMU_WKUP_CFG2,
};

/// PLL lock wait after wake
const PLL_LOCK_US: u32 = 2000;
/// PLL reset hold after wake
const PLL_RESET_US: u32 = 100;
/// Supply stable wait after wake
const STABLE_US: u32 = 2000;

/// Core-side power-mode word
pub const SLEEP_PWRMD_CORE: PwrmdCore = PwrmdCore::CPU0_PD
    .union(PwrmdCore::SCU_PD)
    .union(PwrmdCore::L2_FLUSH)
    .union(PwrmdCore::L2_IDLE)
    .union(PwrmdCore::CLR_CLST)
    .union(PwrmdCore::CLR_CORE)
    .union(PwrmdCore::CLR_CCI)
    .union(PwrmdCore::CORE_PD);

/// Common power-mode word
pub const SLEEP_PWRMD_COM: PwrmdCom = PwrmdCom::MODE_EN
    .union(PwrmdCom::SREF_ENTER)
    .union(PwrmdCom::PWR_OFF);

/// Program wake sources, counters and power modes, then mask interrupts
pub fn configure_sleep_mode<M: Mmio>(mmio: &M, clusters: usize) {
    let mut wake = WakeupCfg::CLUSTER0;
    if clusters > 1 {
        wake |= WakeupCfg::CLUSTER1;
    }
    mmio.set_bits(PMU_WKUP_CFG2, wake.bits());
    mmio.clear_bits(PMU_WKUP_CFG2, WakeupCfg::GPIO.bits());

    mmio.write32(PMU_PLLLOCK_CNT, cycles_24m_us(PLL_LOCK_US));
    mmio.write32(PMU_PLLRST_CNT, cycles_24m_us(PLL_RESET_US));
    mmio.write32(PMU_STABLE_CNT, cycles_24m_us(STABLE_US));
    mmio.write32(PMU_PWRMD_CORE, SLEEP_PWRMD_CORE.bits());
    mmio.write32(PMU_PWRMD_COM, SLEEP_PWRMD_COM.bits());
    dsb();

    mmio.set_bits(PMU_PWRMD_CORE, PwrmdCore::GLOBAL_INT_DIS.bits());
    mmio.set_bits(PMU_SFT_CON, SftCon::GLBL_INT_DIS.bits());
    dsb();
}
