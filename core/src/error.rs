//! # Power-Management Errors
//!
//! | Error                  | Raised by                          | Handling           |
//! |------------------------|------------------------------------|--------------------|
//! | `InvalidState`         | caller contract violation          | returned           |
//! | `BusyCore`             | hard power-down of an unparked core| returned           |
//! | `UnsupportedRequest`   | unknown core/domain/policy id      | returned           |
//! | `HardwareTimeoutSoft`  | bounded poll on a non-critical step| logged, absorbed   |
//! | `HardwareTimeoutFatal` | bounded poll on the DDR resume path| halt, never raised |
//!
//! The hook surface converts errors to negative errno values with
//! [`PmError::status`].

use core::fmt;

/// Result type for power-management operations
pub type PmResult<T> = Result<T, PmError>;

/// Power-management error types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PmError {
    /// Core or domain is mid-transition or already in the requested state
    InvalidState,
    /// Bounded poll exceeded on a step that can be retried or skipped
    HardwareTimeoutSoft,
    /// Bounded poll exceeded where continuing is unsafe
    ///
    /// Never returned: every such poll sits on the SRAM-resident path and
    /// halts the core instead. Kept so status codes and logs can name it.
    HardwareTimeoutFatal,
    /// Hard power-down requested for a core that never parked
    BusyCore,
    /// Unrecognised core, domain or policy identifier
    UnsupportedRequest,
}

/// `EINVAL`
const EINVAL: i32 = 22;
/// `EBUSY`
const EBUSY: i32 = 16;
/// `ETIMEDOUT`
const ETIMEDOUT: i32 = 110;
/// `EOPNOTSUPP`
const EOPNOTSUPP: i32 = 95;

impl PmError {
    /// Negative errno-style status code
    pub const fn status(self) -> i32 {
        match self {
            PmError::InvalidState => -EINVAL,
            PmError::BusyCore => -EBUSY,
            PmError::HardwareTimeoutSoft | PmError::HardwareTimeoutFatal => -ETIMEDOUT,
            PmError::UnsupportedRequest => -EOPNOTSUPP,
        }
    }
}

impl fmt::Display for PmError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PmError::InvalidState => write!(f, "invalid state for this transition"),
            PmError::HardwareTimeoutSoft => write!(f, "hardware poll timed out"),
            PmError::HardwareTimeoutFatal => write!(f, "hardware poll timed out (fatal)"),
            PmError::BusyCore => write!(f, "core never parked in wfi"),
            PmError::UnsupportedRequest => write!(f, "unsupported request"),
        }
    }
}

/// Convert a result to a hook status code
pub fn status(result: PmResult<()>) -> i32 {
    match result {
        Ok(()) => 0,
        Err(e) => e.status(),
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(status(Ok(())), 0);
        assert_eq!(status(Err(PmError::InvalidState)), -22);
        assert_eq!(status(Err(PmError::BusyCore)), -16);
        assert_eq!(status(Err(PmError::HardwareTimeoutSoft)), -110);
        assert_eq!(status(Err(PmError::UnsupportedRequest)), -95);
    }

    #[test]
    fn test_fatal_timeout_still_has_a_status() {
        assert_eq!(status(Err(PmError::HardwareTimeoutFatal)), -110);
        assert_eq!(
            format!("{}", PmError::HardwareTimeoutFatal),
            "hardware poll timed out (fatal)"
        );
    }
}
