//! Monotonic busy-wait delay.

/// Microsecond delay primitive
///
/// Implementations must not depend on interrupts or on DRAM: the delay is
/// used on the resume path before memory is back.
pub trait Delay {
    /// Busy-wait for at least `us` microseconds
    fn udelay(&self, us: u32);
}

impl<T: Delay + ?Sized> Delay for &T {
    #[inline(always)]
    fn udelay(&self, us: u32) {
        (**self).udelay(us)
    }
}
