//! # PLL Sequencer
//!
//! ## Suspend (per PLL)
//!
//! ```text
//!   normal ──▶ slow mode ──▶ save CON0..CON4 ──▶ soft power-down
//!              (24 MHz ref)                     (CON1[15], CON1[14])
//! ```
//!
//! ## Resume (per PLL)
//!
//! ```text
//!   restore CON words ──▶ CON1 (powers up) ──▶ poll lock ──▶ normal mode
//!                                                          (only if saved)
//! ```
//!
//! The DDR PLL goes through the same two operations from the SRAM-resident
//! path; every other PLL is handled by [`PllSequencer::suspend_all`] and
//! [`PllSequencer::resume_all`], which also park the clock dividers the PLLs
//! feed while they run from the reference clock.

use bitflags::bitflags;

use rkpm_hal::barrier::dsb;
use rkpm_hal::mmio::{bits_wmask, bits_with_wmask, WMASK_ALL};
use rkpm_hal::{Delay, Mmio};

use crate::config::Poll;
use crate::error::PmResult;
use crate::poll::poll_field;
use crate::soc::{
    cru_clksel_con, pll_con, pll_mode_bit, CRU_MODE, PLL_CON_COUNT, PLL_COUNT, PLL_LOCK,
    PLL_PD_CTRL_SHIFT, PLL_PD_SHIFT,
};

// ============================================================================
// Identifiers
// ============================================================================

/// PLL identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PllId {
    /// CPU PLL
    Apll = 0,
    /// DDR PLL
    Dpll = 1,
    /// Codec PLL
    Cpll = 2,
    /// General PLL
    Gpll = 3,
    /// New PLL
    Npll = 4,
}

impl PllId {
    /// All PLLs in id order
    pub const ALL: [PllId; PLL_COUNT] =
        [PllId::Apll, PllId::Dpll, PllId::Cpll, PllId::Gpll, PllId::Npll];

    /// Index into per-PLL tables
    #[inline(always)]
    pub const fn index(self) -> usize {
        self as usize
    }

    /// Set containing only this PLL
    pub const fn set(self) -> PllSet {
        PllSet::from_bits_retain(1 << self as u8)
    }
}

bitflags! {
    /// A set of PLLs
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PllSet: u8 {
        /// CPU PLL
        const APLL = 1 << 0;
        /// DDR PLL
        const DPLL = 1 << 1;
        /// Codec PLL
        const CPLL = 1 << 2;
        /// General PLL
        const GPLL = 1 << 3;
        /// New PLL
        const NPLL = 1 << 4;
        /// Everything except the DDR PLL
        const NONCRITICAL = Self::APLL.bits() | Self::CPLL.bits()
            | Self::GPLL.bits() | Self::NPLL.bits();
    }
}

// ============================================================================
// Saved State
// ============================================================================

/// Saved state of one PLL
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PllWords {
    /// CON0..CON4 as read before power-down
    pub con: [u32; PLL_CON_COUNT],
    /// PLL was in normal mode before suspend
    pub normal: bool,
}

/// A clock divider parked while its PLL is off
#[derive(Debug, Clone, Copy)]
struct ParkedDivider {
    /// CRU_CLKSEL_CON index
    sel: usize,
    /// `(value, mask, shift)` fields
    fields: &'static [(u32, u32, u32)],
}

/// Dividers fed by the non-critical PLLs, with their safe ratios
const PARKED_DIVIDERS: [ParkedDivider; 6] = [
    // core
    ParkedDivider { sel: 0, fields: &[(0, 0x1f, 0)] },
    // pclk_dbg
    ParkedDivider { sel: 1, fields: &[(0, 0xf, 0)] },
    // crypto
    ParkedDivider { sel: 20, fields: &[(0, 0x1f, 0)] },
    // pwm0
    ParkedDivider { sel: 24, fields: &[(0, 0x7f, 8)] },
    // uart2 from 24M
    ParkedDivider { sel: 18, fields: &[(2, 0x3, 8)] },
    // clk_rtc32k
    ParkedDivider { sel: 38, fields: &[(732, 0x3fff, 0), (2, 0x3, 14)] },
];

/// Saved state of all non-critical PLLs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PllSnapshot {
    plls: [Option<PllWords>; PLL_COUNT],
    clksel: [u32; PARKED_DIVIDERS.len()],
}

impl PllSnapshot {
    /// Saved words of one PLL, if it was suspended
    pub fn words(&self, pll: PllId) -> Option<&PllWords> {
        self.plls[pll.index()].as_ref()
    }

    /// PLLs that were in normal mode before suspend
    pub fn normal_mode(&self) -> PllSet {
        PllId::ALL
            .iter()
            .filter(|pll| self.words(**pll).is_some_and(|w| w.normal))
            .fold(PllSet::empty(), |set, pll| set | pll.set())
    }
}

// ============================================================================
// Sequencer
// ============================================================================

/// PLL power sequencing
#[derive(Debug, Clone, Copy)]
pub struct PllSequencer<P> {
    platform: P,
    lock: Poll,
}

impl<P: Mmio + Delay> PllSequencer<P> {
    /// Create a sequencer with the relock budget
    #[inline(always)]
    pub const fn new(platform: P, lock: Poll) -> Self {
        Self { platform, lock }
    }

    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    fn set_slow_mode(&self, pll: PllId) {
        self.platform
            .write32(CRU_MODE, bits_with_wmask(0, 1, pll_mode_bit(pll.index())));
    }

    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    fn set_normal_mode(&self, pll: PllId) {
        self.platform
            .write32(CRU_MODE, bits_with_wmask(1, 1, pll_mode_bit(pll.index())));
    }

    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    fn suspend_with_mode(&self, pll: PllId, mode: u32) -> PllWords {
        let normal = (mode >> pll_mode_bit(pll.index())) & 1 == 1;
        self.set_slow_mode(pll);

        let mut con = [0; PLL_CON_COUNT];
        let mut i = 0;
        while i < PLL_CON_COUNT {
            con[i] = self.platform.read32(pll_con(pll.index(), i));
            i += 1;
        }

        let con1 = pll_con(pll.index(), 1);
        self.platform
            .write32(con1, bits_with_wmask(1, 1, PLL_PD_CTRL_SHIFT));
        self.platform.write32(con1, bits_with_wmask(1, 1, PLL_PD_SHIFT));

        PllWords { con, normal }
    }

    /// Slow mode, save, power down
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn suspend(&self, pll: PllId) -> PllWords {
        let mode = self.platform.read32(CRU_MODE);
        self.suspend_with_mode(pll, mode)
    }

    /// Restore, power up, relock, and return to normal mode if it was
    ///
    /// On lock timeout the PLL stays in slow mode and the soft timeout is
    /// returned; the caller decides whether that is fatal. Never logs.
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn resume(&self, pll: PllId, words: &PllWords) -> PmResult<()> {
        let id = pll.index();
        let mut i = 0;
        while i < PLL_CON_COUNT {
            if i != 1 {
                self.platform
                    .write32(pll_con(id, i), (words.con[i] & 0xffff) | WMASK_ALL);
            }
            i += 1;
        }
        // CON1 last: it carries the power-down bits
        self.platform
            .write32(pll_con(id, 1), (words.con[1] & 0xffff) | WMASK_ALL);
        dsb();

        let locked = poll_field(&self.platform, self.lock, pll_con(id, 1), PLL_LOCK, PLL_LOCK);
        if matches!(locked, Ok(())) && words.normal {
            self.set_normal_mode(pll);
        }
        locked
    }

    /// Suspend every PLL in `plls`, parking the dividers they feed
    pub fn suspend_all(&self, plls: PllSet) -> PllSnapshot {
        let mode = self.platform.read32(CRU_MODE);
        let mut clksel = [0; PARKED_DIVIDERS.len()];
        for (saved, div) in clksel.iter_mut().zip(PARKED_DIVIDERS.iter()) {
            *saved = self.platform.read32(cru_clksel_con(div.sel));
        }

        let selected = || PllId::ALL.into_iter().rev().filter(move |p| plls.contains(p.set()));

        // Dependent clocks move to the reference clock before dividers park
        for pll in selected() {
            self.set_slow_mode(pll);
        }
        for div in PARKED_DIVIDERS.iter() {
            let word = div
                .fields
                .iter()
                .fold(0, |acc, &(value, mask, shift)| acc | bits_with_wmask(value, mask, shift));
            self.platform.write32(cru_clksel_con(div.sel), word);
        }

        let mut saved = [None; PLL_COUNT];
        for pll in selected() {
            saved[pll.index()] = Some(self.suspend_with_mode(pll, mode));
        }

        log::debug!("PllSequencer: suspended {:?}", plls);
        PllSnapshot { plls: saved, clksel }
    }

    /// Undo [`PllSequencer::suspend_all`], returning the PLLs that failed to lock
    pub fn resume_all(&self, snapshot: PllSnapshot) -> PllSet {
        for (saved, div) in snapshot.clksel.iter().zip(PARKED_DIVIDERS.iter()) {
            let mask = div
                .fields
                .iter()
                .fold(0, |acc, &(_, mask, shift)| acc | bits_wmask(mask, shift));
            self.platform
                .write32(cru_clksel_con(div.sel), (saved & 0xffff) | mask);
        }

        let mut failed = PllSet::empty();
        for pll in PllId::ALL {
            if let Some(words) = snapshot.words(pll) {
                if let Err(e) = self.resume(pll, words) {
                    log::error!("PllSequencer: {:?} failed to relock ({}), left in slow mode", pll, e);
                    failed |= pll.set();
                }
            }
        }
        failed
    }
}

// ============================================================================
// TESTS
// ============================================================================
