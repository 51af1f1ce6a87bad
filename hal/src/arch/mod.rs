//! Architecture-specific implementations of the hal traits.

cfg_if::cfg_if! {
    if #[cfg(target_arch = "aarch64")] {
        pub mod aarch64;
        pub use aarch64::{El3Cpu, GenericTimerDelay};
    }
}
