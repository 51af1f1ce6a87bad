//! # Always-On Arena
//!
//! The on-chip SRAM that keeps power while the rest of the SoC sleeps.
//!
//! ```text
//!  base                                                       base + size
//!   ┌────────────┬─────────┬─────────┬─────────────────────┬──────────┐
//!   │ SRAM image │ scratch │ handoff │        stack ▼      │  layout  │
//!   └────────────┴─────────┴─────────┴─────────────────────┴──────────┘
//!                                                         sp    (ABI)
//! ```
//!
//! - image: copy of the `.sram.text` section, see [`image`]
//! - scratch: [`SramScratch`], everything saved inside the retention window
//! - handoff: [`trampoline::Handoff`], copied platform handle and timings
//! - layout: [`layout::SramResumeLayout`], read by the boot firmware on wake
//!
//! Code running inside the retention window may only dereference addresses
//! inside this arena, and is itself fetched from the image copy. It sticks
//! to plain loops and register accesses so that nothing outside
//! `.sram.text` gets called.

pub mod image;
pub mod layout;
pub mod trampoline;

use core::marker::PhantomData;
use core::mem::{align_of, size_of};
use core::ptr;

use rkpm_hal::barrier::dsb;
use rkpm_hal::StackEntry;

use crate::config::ArenaPlacement;
use crate::ddr::DdrRetentionContext;
use crate::error::{PmError, PmResult};
use crate::platform::Platform;
use crate::pmic::PmicContext;

use self::image::SramImage;
use self::layout::SramResumeLayout;
use self::trampoline::{sram_entry, Handoff, SramPhase};

/// Bytes reserved at the top of the arena for the resume layout
pub const LAYOUT_RESERVED: usize = 0x40;

/// State saved inside the retention window
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SramScratch {
    /// DDR controller, gates and DDR PLL
    pub ddr: DdrRetentionContext,
    /// PMIC sleep pin
    pub pmic: PmicContext,
    /// Debug UART interrupt enable
    pub uart_ier: u32,
    /// Half of system sleep the next [`sram_entry`] call runs
    pub phase: SramPhase,
}

#[inline]
const fn align_up(addr: usize, align: usize) -> usize {
    (addr + align - 1) & !(align - 1)
}

/// An installed always-on arena
#[derive(Debug)]
pub struct SramArena<P> {
    base: usize,
    size: usize,
    entry: usize,
    scratch: usize,
    handoff: usize,
    layout: usize,
    _platform: PhantomData<P>,
}

impl<P> Clone for SramArena<P> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<P> Copy for SramArena<P> {}

impl<P: Platform> SramArena<P> {
    /// Copy the SRAM image into place and carve out scratch, handoff and stack
    ///
    /// # Safety
    ///
    /// `placement` must describe memory owned exclusively by the power
    /// controller that stays powered through system sleep.
    pub unsafe fn install(platform: &P, placement: ArenaPlacement) -> PmResult<Self> {
        let image: SramImage = platform.sram_image();
        let base = placement.base;
        let layout = base + placement.size - LAYOUT_RESERVED;

        let linked: StackEntry = sram_entry::<P>;
        let Some(entry_offset) = image.offset_of(linked as usize) else {
            log::error!(
                "SramArena: entry {:#x} not in .sram.text [{:#x}, {:#x})",
                linked as usize,
                image.start(),
                image.start() + image.len()
            );
            return Err(PmError::UnsupportedRequest);
        };

        let scratch = align_up(base + image.len(), 8);
        let handoff = align_up(scratch + size_of::<SramScratch>(), align_of::<Handoff<P>>());
        let handoff_end = handoff + size_of::<Handoff<P>>();

        if handoff_end + placement.stack_size > layout {
            log::error!(
                "SramArena: {:#x} image bytes need {:#x} bytes, arena has {:#x}",
                image.len(),
                handoff_end + placement.stack_size - base,
                layout - base
            );
            return Err(PmError::UnsupportedRequest);
        }

        // SAFETY: the image is readable (SramImage contract); the copy,
        // scratch and handoff lie inside the arena, which the caller
        // guarantees is ours.
        unsafe {
            ptr::copy_nonoverlapping(image.start() as *const u8, base as *mut u8, image.len());
            ptr::write(scratch as *mut SramScratch, SramScratch::default());
        }
        dsb();

        log::debug!(
            "SramArena: {:#x} image bytes at {:#x}, entry {:#x}, handoff {:#x}, layout {:#x}",
            image.len(),
            base,
            base + entry_offset,
            handoff,
            layout
        );

        Ok(Self {
            base,
            size: placement.size,
            entry: base + entry_offset,
            scratch,
            handoff,
            layout,
            _platform: PhantomData,
        })
    }
}

impl<P> SramArena<P> {
    /// Physical base, where the image starts
    #[inline(always)]
    pub const fn base(&self) -> usize {
        self.base
    }

    /// Size in bytes
    pub const fn size(&self) -> usize {
        self.size
    }

    /// Relocated address of [`sram_entry`] inside the image copy
    pub const fn entry(&self) -> usize {
        self.entry
    }

    /// Whether `addr` lies inside the arena
    pub const fn contains(&self, addr: usize) -> bool {
        addr >= self.base && addr < self.base + self.size
    }

    /// Initial stack pointer of the SRAM-resident code
    pub const fn stack_top(&self) -> usize {
        self.layout & !0xf
    }

    /// Address of the resume layout
    pub const fn layout_addr(&self) -> usize {
        self.layout
    }

    /// Address of the handoff block
    pub const fn handoff_addr(&self) -> usize {
        self.handoff
    }

    /// Scratch state
    ///
    /// # Safety
    ///
    /// Only the single core running the system sleep sequence may hold the
    /// returned reference, and not twice at once.
    #[allow(clippy::mut_from_ref)]
    #[inline(always)]
    pub unsafe fn scratch(&self) -> &'static mut SramScratch {
        // SAFETY: initialised by install(); exclusivity is the caller's.
        unsafe { &mut *(self.scratch as *mut SramScratch) }
    }

    /// Publish the resume layout
    pub fn publish_layout(&self, layout: &SramResumeLayout) {
        // SAFETY: the layout slot is reserved at the top of the arena.
        unsafe { ptr::write_volatile(self.layout as *mut SramResumeLayout, *layout) };
        dsb();
    }

    /// Read back the resume layout
    pub fn read_layout(&self) -> SramResumeLayout {
        // SAFETY: the layout slot is reserved at the top of the arena.
        unsafe { ptr::read_volatile(self.layout as *const SramResumeLayout) }
    }

    /// Store the handoff block for the SRAM-resident code
    pub fn write_handoff(&self, handoff: Handoff<P>) {
        // SAFETY: install() sized and aligned the slot for Handoff<P>.
        unsafe { ptr::write(self.handoff as *mut Handoff<P>, handoff) };
        dsb();
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::{self, SimSoc};

    fn placement(sim: &SimSoc, size: usize, stack_size: usize) -> ArenaPlacement {
        ArenaPlacement {
            base: sim.arena(size),
            size,
            stack_size,
        }
    }

    #[test]
    fn test_install_copies_image_byte_exact() {
        let sim = SimSoc::new(4);
        let placement = placement(sim, 0x2000, 0x800);
        let arena = unsafe { SramArena::install(&sim, placement) }.unwrap();

        let image = sim::sram_image();
        let (copied, linked) = unsafe {
            (
                core::slice::from_raw_parts(arena.base() as *const u8, image.len()),
                core::slice::from_raw_parts(image.start() as *const u8, image.len()),
            )
        };
        assert_eq!(copied, linked);
        assert_eq!(unsafe { *arena.scratch() }, SramScratch::default());
    }

    #[test]
    fn test_entry_relocated_into_arena() {
        let sim = SimSoc::new(4);
        let placement = placement(sim, 0x2000, 0x800);
        let arena = unsafe { SramArena::install(&sim, placement) }.unwrap();

        let linked: StackEntry = sram_entry::<&'static SimSoc>;
        let offset = sim::sram_image().offset_of(linked as usize).unwrap();
        assert_eq!(arena.entry(), arena.base() + offset);
        assert!(arena.contains(arena.entry()));
        assert_ne!(arena.entry(), linked as usize);
    }

    #[test]
    fn test_entry_outside_image_rejected() {
        let sim = SimSoc::new(4);
        let filler = sim::SRAM_IMAGE_FILLER.as_ptr() as usize;
        sim.set_sram_image(unsafe { SramImage::from_raw(filler, 0x40) });
        let placement = placement(sim, 0x2000, 0x800);
        let arena = unsafe { SramArena::install(&sim, placement) };
        assert_eq!(arena.err(), Some(PmError::UnsupportedRequest));
    }

    #[test]
    fn test_regions_are_ordered_and_aligned() {
        let sim = SimSoc::new(4);
        let placement = placement(sim, 0x2000, 0x800);
        let arena = unsafe { SramArena::install(&sim, placement) }.unwrap();

        assert!(arena.handoff_addr() > arena.base() + sim::sram_image().len());
        assert_eq!(arena.layout_addr(), placement.base + 0x2000 - LAYOUT_RESERVED);
        assert_eq!(arena.stack_top() % 16, 0);
        assert!(arena.stack_top() - placement.stack_size >= arena.handoff_addr());
    }

    #[test]
    fn test_arena_too_small_for_image() {
        let sim = SimSoc::new(4);
        let placement = placement(sim, 0x200, 0x100);
        let arena = unsafe { SramArena::install(&sim, placement) };
        assert_eq!(arena.err(), Some(PmError::UnsupportedRequest));
    }

    #[test]
    fn test_layout_publish_and_read_back() {
        let sim = SimSoc::new(4);
        let placement = placement(sim, 0x2000, 0x800);
        let arena = unsafe { SramArena::install(&sim, placement) }.unwrap();

        let layout = SramResumeLayout {
            sp: arena.stack_top() as u64,
            ddr_func: arena.entry() as u64,
            ddr_data: arena.handoff_addr() as u64,
            ddr_flag: 1,
            boot_mpidr: 0x100,
        };
        arena.publish_layout(&layout);
        assert_eq!(arena.read_layout(), layout);
    }
}
