//! Debug UART quiescing around system sleep.
//!
//! Runs from the always-on arena: no logging.

use rkpm_hal::barrier::dsb;
use rkpm_hal::mmio::{bit_with_wmask, wmask_bit};
use rkpm_hal::Mmio;

use crate::soc::{
    cru_clkgate_con, UART2_BASE, UART2_PCLK_GATE, UART2_SCLK_GATE, UART_FCR, UART_FIFO_RESET,
    UART_IER, UART_INT_DISABLE,
};

/// The debug UART
#[derive(Debug, Clone, Copy)]
pub struct DebugUart<M> {
    mmio: M,
}

impl<M: Mmio> DebugUart<M> {
    /// Create the driver
    #[inline(always)]
    pub const fn new(mmio: M) -> Self {
        Self { mmio }
    }

    /// Mask interrupts and gate both clocks, returning the saved IER
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn suspend(&self) -> u32 {
        let ier = self.mmio.read32(UART2_BASE + UART_IER);
        self.mmio.write32(UART2_BASE + UART_IER, UART_INT_DISABLE);

        let (sclk_con, sclk_bit) = UART2_SCLK_GATE;
        let (pclk_con, pclk_bit) = UART2_PCLK_GATE;
        self.mmio
            .write32(cru_clkgate_con(sclk_con), bit_with_wmask(sclk_bit));
        self.mmio
            .write32(cru_clkgate_con(pclk_con), bit_with_wmask(pclk_bit));
        dsb();
        ier
    }

    /// Ungate, reset the FIFOs and restore `ier`
    #[cfg_attr(target_os = "none", link_section = ".sram.text")]
    pub fn resume(&self, ier: u32) {
        let (sclk_con, sclk_bit) = UART2_SCLK_GATE;
        let (pclk_con, pclk_bit) = UART2_PCLK_GATE;
        self.mmio.write32(cru_clkgate_con(sclk_con), wmask_bit(sclk_bit));
        self.mmio.write32(cru_clkgate_con(pclk_con), wmask_bit(pclk_bit));
        dsb();

        self.mmio.write32(UART2_BASE + UART_FCR, UART_FIFO_RESET);
        self.mmio.write32(UART2_BASE + UART_IER, ier);
    }
}
