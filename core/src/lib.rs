//! # RKPM Core
//!
//! Power management for a multi-core SoC running at EL3: CPU hotplug,
//! per-core auto power-down, and whole-system suspend/resume with DRAM kept
//! in self-refresh retention.
//!
//! ## Components
//!
//! - **Domain**: per-core power domains, policy tracking, bus idle, clusters
//! - **Clock**: clock-gate snapshot and PLL sequencing
//! - **DDR**: self-refresh retention, split at the DRAM-unavailable window
//! - **PMIC / UART**: board signals quiesced around sleep
//! - **SRAM**: the always-on arena, its resume layout and trampoline
//! - **Orchestrator**: the power-controller context and hook surface
//!
//! ```text
//!                     ┌────────────────────┐
//!   runtime hooks ──▶ │    Orchestrator    │
//!                     └─────────┬──────────┘
//!          ┌──────────┬─────────┼──────────┬───────────┐
//!          ▼          ▼         ▼          ▼           ▼
//!       Domain      Clock      SRAM ──▶  DDR  ──▶  PMIC / UART
//!          │          │         │          │           │
//!          └──────────┴─────────┴────┬─────┴───────────┘
//!                                    ▼
//!                          Platform (rkpm-hal)
//! ```

#![cfg_attr(not(test), no_std)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod ddr;
pub mod domain;
pub mod error;
pub mod orchestrator;
pub mod platform;
pub mod pmic;
pub mod poll;
pub mod soc;
pub mod sram;
pub mod uart;

#[cfg(test)]
mod sim;

pub use config::{PmConfig, PmConfigBuilder, PolicyTracking};
pub use domain::{CoreState, PowerPolicy, WakeReason};
pub use error::{PmError, PmResult};
pub use orchestrator::{PowerController, PowerHooks, SystemState};
pub use platform::Platform;
