//! Clock-gate save and restore.
//!
//! On suspend every CRU_CLKGATE_CON word is saved and all gates outside the
//! wake-capable mask are closed. A set gate bit means "clock off"; mask bits
//! are left untouched.

use rkpm_hal::mmio::WMASK_ALL;
use rkpm_hal::Mmio;

use crate::soc::{cru_clkgate_con, CLKGATE_COUNT};

/// Write that gates every clock outside `ungate` and leaves `ungate` alone
#[inline]
pub const fn gating_word(ungate: u32) -> u32 {
    ((!ungate) << 16) | 0xffff
}

/// Saved clock-gate words
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClockGateSnapshot {
    words: [u32; CLKGATE_COUNT],
}

impl ClockGateSnapshot {
    /// Save every gate word, then gate all clocks outside `ungate`
    pub fn save_and_gate<M: Mmio>(mmio: &M, ungate: &[u32; CLKGATE_COUNT]) -> Self {
        let mut words = [0; CLKGATE_COUNT];
        for (i, word) in words.iter_mut().enumerate() {
            *word = mmio.read32(cru_clkgate_con(i));
            mmio.write32(cru_clkgate_con(i), gating_word(ungate[i]));
        }
        Self { words }
    }

    /// Saved words
    pub fn words(&self) -> &[u32; CLKGATE_COUNT] {
        &self.words
    }

    /// Write the saved words back
    pub fn restore<M: Mmio>(self, mmio: &M) {
        for (i, word) in self.words.iter().enumerate() {
            mmio.write32(cru_clkgate_con(i), (word & 0xffff) | WMASK_ALL);
        }
    }
}
