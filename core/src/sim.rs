//! # Register-Level SoC Simulator
//!
//! Host stand-in for the SoC, used by the unit tests.
//!
//! Modelled:
//! - write-masked registers (CRU, GRF, SGRF, DDR GRF) and plain ones
//! - per-core power-domain status, driven by PWRDN_CON, CPUAPM_CON and
//!   whether the core sits in wfi
//! - L2 flush / L2 wfi status following the PMU soft-control word
//! - bus-idle acknowledge per domain, with polarity
//! - PLL lock and DDR self-refresh status
//!
//! - the always-on arena as leaked host memory; code "fetched" from an arena
//!   address runs the linked host function after checking the copy
//!
//! Non-returning CPU operations unwind with a marker payload; wrap them in
//! [`expect_terminal`].

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use rkpm_hal::mmio::apply_wmask;
use rkpm_hal::{CpuOps, Delay, Mmio, Mpidr, StackEntry};

use crate::clock::pll::PllId;
use crate::config::{PmConfig, Poll, PollBudgets};
use crate::domain::idle::BusDomain;
use crate::platform::Platform;
use crate::soc::*;
use crate::sram::image::SramImage;
use crate::sram::layout::SramResumeLayout;
use crate::sram::trampoline::sram_entry;

/// Warm-boot vector reported by the simulated platform
pub const WARM_BOOT_ENTRY: usize = 0x0040_0000;
/// Auto-power-down entry reported by the simulated platform
pub const SECURE_ENTRY: usize = 0x0040_1000;

/// Bytes of host code treated as `.sram.text`, starting at the entry
const SIM_IMAGE_BYTES: usize = 0x100;

/// Default image: the host-linked entry and the code after it
pub fn sram_image() -> SramImage {
    let entry: StackEntry = sram_entry::<&'static SimSoc>;
    // SAFETY: host text is readable for the length of a few functions.
    unsafe { SramImage::from_raw(entry as usize, SIM_IMAGE_BYTES) }
}

/// Data that is not code, for images that miss the entry
pub static SRAM_IMAGE_FILLER: [u32; 16] = [0xd503_201f; 16];

const HALT: &str = "sim: halt";
const POWER_DOWN_WFI: &str = "sim: power-down wfi";
const WARM_BOOT: &str = "sim: warm boot";

/// How a non-returning operation ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Terminal {
    /// `CpuOps::halt`
    Halt,
    /// `CpuOps::power_down_wfi`
    PowerDownWfi,
    /// `Platform::warm_boot`
    WarmBoot,
}

/// Run `f`, which must end in a non-returning operation
pub fn expect_terminal<F: FnOnce()>(f: F) -> Terminal {
    let payload = match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(()) => panic!("non-returning operation returned"),
        Err(payload) => payload,
    };
    match payload.downcast_ref::<&'static str>() {
        Some(&s) if s == HALT => Terminal::Halt,
        Some(&s) if s == POWER_DOWN_WFI => Terminal::PowerDownWfi,
        Some(&s) if s == WARM_BOOT => Terminal::WarmBoot,
        _ => panic::resume_unwind(payload),
    }
}

/// Small budgets so timeouts are reached quickly
pub fn test_budgets() -> PollBudgets {
    PollBudgets {
        park: Poll::new(5, 1),
        wake: Poll::new(5, 1),
        power_domain: Poll::new(5, 1),
        pll_lock: Poll::new(10, 0),
        self_refresh: Poll::new(10, 1),
        bus_idle: Poll::new(20, 0),
        cluster: Poll::new(20, 0),
        warn_every: 5,
    }
}

/// Configuration with test budgets and an arena backed by host memory
pub fn config(sim: &SimSoc, clusters: usize, cores_per_cluster: usize) -> PmConfig {
    PmConfig::builder()
        .topology(clusters, cores_per_cluster)
        .budgets(test_budgets())
        .arena(sim.arena(0x2000), 0x2000, 0x800)
        .build()
        .unwrap()
}

fn masked(addr: usize) -> bool {
    let in_block = |base: usize| (base..base + 0x1000).contains(&addr);
    addr != CRU_GLB_SRST_FST
        && (in_block(CRU_BASE) || in_block(GRF_BASE) || in_block(SGRF_BASE) || in_block(DDR_GRF_BASE))
}

fn pll_con1(addr: usize) -> Option<usize> {
    (0..PLL_COUNT).find(|&pll| pll_con(pll, 1) == addr)
}

/// The simulated SoC
#[derive(Debug)]
pub struct SimSoc {
    cores_per_cluster: usize,
    regs: Mutex<HashMap<usize, u32>>,
    writes: Mutex<Vec<(usize, u32)>>,
    parked: [AtomicBool; MAX_CORES],
    pd_stuck: [AtomicBool; MAX_CORES],
    bus_stuck: [AtomicBool; BusDomain::ALL.len()],
    pll_lock_fail: [AtomicBool; PLL_COUNT],
    ddr_stuck: AtomicBool,
    current_core: AtomicUsize,
    irq_routing: AtomicUsize,
    mmu_off: AtomicBool,
    last_stack: Mutex<Option<usize>>,
    image: Mutex<Option<SramImage>>,
    arenas: Mutex<Vec<(usize, usize)>>,
}

impl SimSoc {
    /// A fresh SoC with reset-like register contents, leaked for `'static`
    pub fn new(cores_per_cluster: usize) -> &'static SimSoc {
        let sim = Box::leak(Box::new(SimSoc {
            cores_per_cluster,
            regs: Mutex::new(HashMap::new()),
            writes: Mutex::new(Vec::new()),
            parked: Default::default(),
            pd_stuck: Default::default(),
            bus_stuck: Default::default(),
            pll_lock_fail: Default::default(),
            ddr_stuck: AtomicBool::new(false),
            current_core: AtomicUsize::new(0),
            irq_routing: AtomicUsize::new(0),
            mmu_off: AtomicBool::new(false),
            last_stack: Mutex::new(None),
            image: Mutex::new(None),
            arenas: Mutex::new(Vec::new()),
        }));
        sim.seed_defaults();
        sim
    }

    fn seed_defaults(&self) {
        for pll in 0..PLL_COUNT {
            let p = pll as u32;
            self.seed(pll_con(pll, 0), 0x1000 | (p << 4) | 0x3);
            self.seed(pll_con(pll, 1), 0x0041 + p);
            self.seed(pll_con(pll, 2), 0x0200 + p);
            self.seed(pll_con(pll, 3), 0x0007);
            self.seed(pll_con(pll, 4), 0x0000);
        }
        let normal = (0..PLL_COUNT).fold(0, |mode, pll| mode | (1 << pll_mode_bit(pll)));
        self.seed(CRU_MODE, normal);
        for (i, sel) in [0usize, 1, 18, 20, 24, 38].into_iter().enumerate() {
            self.seed(cru_clksel_con(sel), 0x0305 + i as u32);
        }
        for i in 0..CLKGATE_COUNT {
            self.seed(cru_clkgate_con(i), (0x0a0a ^ (i as u32 * 0x0111)) & 0xffff);
        }
        self.seed(DDR_PCTL2_PWRCTL, SELFREF_EN | 0x10);
        self.seed(DDRGRF_SOC_CON0, 0x0003);
        self.seed(UART2_BASE + UART_IER, 0x5);
        self.seed(GPIO2_BASE + GPIO_SWPORTA_DR, 0x0100);
        self.seed(GPIO2_BASE + GPIO_SWPORTA_DDR, 0x0300);
        self.seed(GRF_GPIO2D_IOMUX, 0x0010);
    }

    /// Set a register without side effects or logging
    pub fn seed(&self, addr: usize, value: u32) {
        self.regs.lock().unwrap().insert(addr, value);
    }

    /// Read a register as the CPU would, without logging
    pub fn peek(&self, addr: usize) -> u32 {
        let regs = self.regs.lock().unwrap();
        self.read_locked(&regs, addr)
    }

    fn raw(regs: &HashMap<usize, u32>, addr: usize) -> u32 {
        regs.get(&addr).copied().unwrap_or(0)
    }

    fn read_locked(&self, regs: &HashMap<usize, u32>, addr: usize) -> u32 {
        match addr {
            PMU_PWRDN_ST => {
                let con = Self::raw(regs, PMU_PWRDN_CON);
                (0..MAX_CORES).fold(0, |st, core| {
                    let apm = ApmFlags::from_bits_truncate(Self::raw(regs, pmu_cpuapm_con(core)));
                    let hard = con & pd_core_bit(core) != 0 && !self.pd_stuck[core].load(Ordering::SeqCst);
                    let gated = apm.contains(ApmFlags::PM_EN)
                        && !apm.contains(ApmFlags::SFT_WAKEUP_EN)
                        && self.parked[core].load(Ordering::SeqCst);
                    if hard || gated {
                        st | pd_core_bit(core)
                    } else {
                        st
                    }
                })
            }
            PMU_CORE_PWR_ST => {
                let sft = SftCon::from_bits_retain(Self::raw(regs, PMU_SFT_CON));
                let mut st = (0..MAX_CORES)
                    .filter(|&core| self.parked[core].load(Ordering::SeqCst))
                    .fold(0, |st, core| st | core_wfi_bit(core));
                for cluster in 0..MAX_CLUSTERS {
                    if sft.contains(SftCon::l2_flush(cluster)) {
                        st |= l2_flush_done_bit(cluster);
                    }
                    if sft.contains(SftCon::acinactm(cluster)) {
                        st |= l2_wfi_bit(cluster);
                    }
                }
                st
            }
            PMU_BUS_IDLE_ST => {
                let req = Self::raw(regs, PMU_BUS_IDLE_REQ);
                BusDomain::ALL.iter().fold(0, |st, &domain| {
                    let desc = domain.descriptor();
                    let idle = req & (1 << desc.req) != 0
                        && !self.bus_stuck[domain as usize].load(Ordering::SeqCst);
                    st | desc.target(idle)
                })
            }
            DDRGRF_SOC_STATUS1 => {
                if self.ddr_stuck.load(Ordering::SeqCst) {
                    1 << DDR_SREF_STATE_SHIFT
                } else if Self::raw(regs, PMU_SFT_CON) & SftCon::DDR_SREF_REQ.bits() != 0 {
                    DDR_SREF_STATE_SREF << DDR_SREF_STATE_SHIFT
                } else {
                    DDR_SREF_STATE_NORMAL << DDR_SREF_STATE_SHIFT
                }
            }
            _ => {
                let value = Self::raw(regs, addr);
                match pll_con1(addr) {
                    Some(pll)
                        if value & (1 << PLL_PD_SHIFT) == 0
                            && !self.pll_lock_fail[pll].load(Ordering::SeqCst) =>
                    {
                        value | PLL_LOCK
                    }
                    _ => value,
                }
            }
        }
    }

    /// Put a core into wfi
    pub fn park(&self, core: usize) {
        self.parked[core].store(true, Ordering::SeqCst);
    }

    /// Take a core out of wfi
    pub fn unpark(&self, core: usize) {
        self.parked[core].store(false, Ordering::SeqCst);
    }

    /// Number of register writes so far
    pub fn write_count(&self) -> usize {
        self.writes.lock().unwrap().len()
    }

    /// Register writes so far, in order
    pub fn writes(&self) -> Vec<(usize, u32)> {
        self.writes.lock().unwrap().clone()
    }

    /// Forget the write log
    pub fn clear_writes(&self) {
        self.writes.lock().unwrap().clear();
    }

    /// Make a core's power domain ignore PWRDN_CON
    pub fn set_pd_stuck(&self, core: usize, stuck: bool) {
        self.pd_stuck[core].store(stuck, Ordering::SeqCst);
    }

    /// Make a bus domain ignore idle requests
    pub fn set_bus_stuck(&self, domain: BusDomain, stuck: bool) {
        self.bus_stuck[domain as usize].store(stuck, Ordering::SeqCst);
    }

    /// Make a PLL never report lock
    pub fn set_pll_lock_fail(&self, pll: PllId, fail: bool) {
        self.pll_lock_fail[pll.index()].store(fail, Ordering::SeqCst);
    }

    /// Make the DDR self-refresh state stay in transition
    pub fn set_ddr_stuck(&self, stuck: bool) {
        self.ddr_stuck.store(stuck, Ordering::SeqCst);
    }

    /// Select the core that is "calling"
    pub fn set_current_core(&self, core: usize) {
        self.current_core.store(core, Ordering::SeqCst);
    }

    /// Times interrupt routing was re-enabled
    pub fn interrupt_routing_count(&self) -> usize {
        self.irq_routing.load(Ordering::SeqCst)
    }

    /// Whether the MMU was switched off
    pub fn mmu_off(&self) -> bool {
        self.mmu_off.load(Ordering::SeqCst)
    }

    /// Stack pointer passed to the last `run_on_stack`
    pub fn last_stack(&self) -> Option<usize> {
        *self.last_stack.lock().unwrap()
    }

    /// Zeroed host memory standing in for the always-on arena
    pub fn arena(&self, size: usize) -> usize {
        let mem: &'static mut [u64] = Box::leak(vec![0u64; size / 8].into_boxed_slice());
        let base = mem.as_mut_ptr() as usize;
        self.arenas.lock().unwrap().push((base, size));
        base
    }

    /// Report `image` from `Platform::sram_image` instead of the default
    pub fn set_sram_image(&self, image: SramImage) {
        *self.image.lock().unwrap() = Some(image);
    }

    /// Resolve a jump into an arena back to the linked host function
    ///
    /// Panics unless `addr` lies in an arena and the bytes there match the
    /// linked code they were copied from.
    pub fn fetch(&self, addr: usize) -> StackEntry {
        let image = (*self.image.lock().unwrap()).unwrap_or_else(sram_image);
        let base = self
            .arenas
            .lock()
            .unwrap()
            .iter()
            .find(|&&(base, size)| (base..base + size).contains(&addr))
            .map(|&(base, _)| base)
            .unwrap_or_else(|| panic!("sim: jump to {:#x} outside every arena", addr));

        let offset = addr - base;
        assert!(offset < image.len(), "sim: jump to {:#x} past the image copy", addr);
        let linked = image.start() + offset;
        let (copied, original) = unsafe {
            (
                (addr as *const u32).read_unaligned(),
                (linked as *const u32).read_unaligned(),
            )
        };
        assert_eq!(copied, original, "sim: image copy at {:#x} differs", addr);
        unsafe { core::mem::transmute::<usize, StackEntry>(linked) }
    }

    /// Boot firmware after a wake reset: take the DDR resume path
    pub fn wake(&self, layout: &SramResumeLayout) -> ! {
        assert!(layout.ddr_retained(), "sim: wake without DDR retained");
        let caller = Mpidr::from_raw(self.mpidr()).affinity();
        assert_eq!(layout.boot_mpidr, caller, "sim: wrong core woken");
        *self.last_stack.lock().unwrap() = Some(layout.sp as usize);
        self.fetch(layout.ddr_func as usize)(layout.ddr_data as usize)
    }

    fn mpidr(&self) -> u64 {
        let core = self.current_core.load(Ordering::SeqCst);
        let id = Mpidr::from_cluster_core(
            (core / self.cores_per_cluster) as u8,
            (core % self.cores_per_cluster) as u8,
        );
        // Bit 31 reads as one
        id.value() | (1 << 31)
    }
}

impl Mmio for SimSoc {
    fn read32(&self, addr: usize) -> u32 {
        self.peek(addr)
    }

    fn write32(&self, addr: usize, value: u32) {
        self.writes.lock().unwrap().push((addr, value));

        let mut regs = self.regs.lock().unwrap();
        let old = Self::raw(&regs, addr);
        let mut new = if masked(addr) {
            apply_wmask(old, value)
        } else {
            value
        };
        if pll_con1(addr).is_some() {
            new &= !PLL_LOCK;
        }
        regs.insert(addr, new);
        drop(regs);

        if addr == PMU_PWRDN_CON {
            for core in 0..MAX_CORES {
                if old & pd_core_bit(core) != 0 && new & pd_core_bit(core) == 0 {
                    self.unpark(core);
                }
            }
        }
        for core in 0..MAX_CORES {
            if addr == pmu_cpuapm_con(core) && new & ApmFlags::SFT_WAKEUP_EN.bits() != 0 {
                self.unpark(core);
            }
        }
    }
}

impl Delay for SimSoc {
    fn udelay(&self, _us: u32) {}
}

impl CpuOps for SimSoc {
    fn wait_for_interrupt(&self) {}

    fn disable_mmu_icache(&self) {
        self.mmu_off.store(true, Ordering::SeqCst);
    }

    fn power_down_wfi(&self) -> ! {
        panic::panic_any(POWER_DOWN_WFI)
    }

    fn halt(&self) -> ! {
        panic::panic_any(HALT)
    }

    unsafe fn run_on_stack(&self, sp: usize, entry: StackEntry, arg: usize) -> ! {
        *self.last_stack.lock().unwrap() = Some(sp);
        self.fetch(entry as usize)(arg)
    }
}

impl Platform for &'static SimSoc {
    fn current_core(&self) -> usize {
        self.current_core.load(Ordering::SeqCst)
    }

    fn current_mpidr(&self) -> Mpidr {
        Mpidr::from_raw(self.mpidr())
    }

    fn warm_boot_entry(&self) -> usize {
        WARM_BOOT_ENTRY
    }

    fn secure_entry(&self) -> usize {
        SECURE_ENTRY
    }

    fn sram_image(&self) -> SramImage {
        (*self.image.lock().unwrap()).unwrap_or_else(sram_image)
    }

    fn enable_interrupt_routing(&self) {
        self.irq_routing.fetch_add(1, Ordering::SeqCst);
    }

    fn warm_boot(&self) -> ! {
        panic::panic_any(WARM_BOOT)
    }
}
