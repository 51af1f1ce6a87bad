//! # RKPM Hardware Abstraction Layer
//!
//! The environment primitives consumed by the power-management core.
//!
//! ## Overview
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                          rkpm-core                               │
//! └──────────┬───────────────┬───────────────┬───────────────────────┘
//!            │               │               │
//!      ┌─────▼─────┐   ┌─────▼─────┐   ┌─────▼─────┐   ┌───────────┐
//!      │   Mmio    │   │   Delay   │   │  CpuOps   │   │  barrier  │
//!      │ (wmask)   │   │   (µs)    │   │ (wfi/...) │   │ (dsb/isb) │
//!      └─────┬─────┘   └─────┬─────┘   └─────┬─────┘   └───────────┘
//!            │               │               │
//!      ┌─────▼───────────────▼───────────────▼─────┐
//!      │        arch::aarch64 (EL3 firmware)       │
//!      └───────────────────────────────────────────┘
//! ```
//!
//! The traits are deliberately small so a register-level simulator can
//! stand in for the SoC in host tests.

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]

pub mod arch;
pub mod barrier;
pub mod cpu;
pub mod delay;
pub mod mmio;
pub mod mpidr;

pub use cpu::{CpuOps, StackEntry};
pub use delay::Delay;
pub use mmio::Mmio;
pub use mpidr::Mpidr;
