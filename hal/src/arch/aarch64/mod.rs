//! # AArch64 EL3 Support
//!
//! Implementations used by the firmware build:
//!
//! - [`GenericTimerDelay`]: microsecond delay on the system counter
//! - [`El3Cpu`]: the core-local operations, executed at EL3

pub mod el3;
pub mod timer;

pub use el3::El3Cpu;
pub use timer::GenericTimerDelay;
