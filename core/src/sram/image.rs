//! The SRAM-resident code image.
//!
//! Every function reachable from [`super::trampoline::sram_entry`] is
//! emitted into the `.sram.text` section. The linker script keeps that
//! section contiguous and brackets it with `__sram_text_start` and
//! `__sram_text_end` (`core/link/sram_text.ld`); `install()` copies it to
//! the arena base, so a linked address inside the section relocates to the
//! same offset in the arena. Tables the resident code indexes at run time
//! live in the section too, reached PC-relative from the copy.
//!
//! ```text
//!   DRAM (linked)                         arena
//!   __sram_text_start ┌──────────┐        base ┌──────────┐
//!                     │ .sram.   │  copy       │  image   │
//!      sram_entry ──▶ │  text    │ ──────▶ ──▶ │  entry   │ ◀── ddr_func
//!   __sram_text_end   └──────────┘             ├──────────┤
//! ```

/// Link-time placement of the SRAM-resident code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SramImage {
    start: usize,
    len: usize,
}

impl SramImage {
    /// Image of `len` bytes linked at `start`
    ///
    /// # Safety
    ///
    /// `start..start + len` must be readable and hold the code emitted into
    /// `.sram.text`.
    pub const unsafe fn from_raw(start: usize, len: usize) -> Self {
        Self { start, len }
    }

    /// The `.sram.text` section as placed by the linker script
    #[cfg(target_os = "none")]
    pub fn linked() -> Self {
        extern "C" {
            static __sram_text_start: u8;
            static __sram_text_end: u8;
        }
        // SAFETY: only the addresses of the linker symbols are taken.
        let (start, end) = unsafe {
            (
                core::ptr::addr_of!(__sram_text_start) as usize,
                core::ptr::addr_of!(__sram_text_end) as usize,
            )
        };
        Self {
            start,
            len: end - start,
        }
    }

    /// Linked address of the first byte
    pub const fn start(&self) -> usize {
        self.start
    }

    /// Size in bytes
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Whether the image is empty
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Offset of a linked address inside the image
    pub const fn offset_of(&self, linked: usize) -> Option<usize> {
        if linked >= self.start && linked < self.start + self.len {
            Some(linked - self.start)
        } else {
            None
        }
    }
}
