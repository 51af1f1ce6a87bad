//! # Clock Sequencing
//!
//! - [`gate`]: whole-chip clock-gate snapshot around system sleep
//! - [`pll`]: PLL slow-mode, power-down and relock, plus divider parking
//!
//! Both snapshots are single-use: taken once at suspend, consumed once at
//! resume.

pub mod gate;
pub mod pll;

pub use gate::ClockGateSnapshot;
pub use pll::{PllId, PllSequencer, PllSet, PllSnapshot, PllWords};
