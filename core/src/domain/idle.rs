//! # Bus-Idle Negotiation
//!
//! Before power is removed from a domain, every bus master behind it must
//! acknowledge an idle request.
//!
//! ```text
//!   BUS_IDLE_REQ            BUS_IDLE_ST
//!  ┌────────────┐   ┌────────────────┬────────────────┐
//!  │ req[14:0]  │   │ ack[30:16]     │ idle[14:4]     │
//!  └────────────┘   └────────────────┴────────────────┘
//! ```
//!
//! Most acknowledge bits read 1 once the domain is idle. The interconnect
//! bridges (CXCS, CCI-400) report "active" instead, so their idle target is
//! 0. Some domains also have a separate idle status bit that must match.

use rkpm_hal::barrier::dsb;
use rkpm_hal::{Delay, Mmio};

use crate::config::Poll;
use crate::error::{PmError, PmResult};
use crate::poll::poll_with_warning;
use crate::soc::{PMU_BUS_IDLE_REQ, PMU_BUS_IDLE_ST};

/// Negotiable bus domains
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum BusDomain {
    /// CPU cluster 0
    Cluster0 = 0,
    /// CPU cluster 1
    Cluster1 = 1,
    /// CoreSight bridge
    Cxcs = 2,
    /// CCI-400 bridge
    Cci400 = 3,
    /// GPU
    Gpu = 4,
    /// Core bus
    Core = 5,
    /// System bus
    Bus = 6,
    /// DMA controllers
    Dma = 7,
    /// Peripheral bus
    Peri = 8,
    /// Video codec
    Video = 9,
    /// Video output
    Vio = 10,
    /// Always-on domain
    Alive = 11,
    /// PMU bus
    Pmu = 12,
    /// Memory scheduler
    Msch = 13,
    /// Interconnect
    Cci = 14,
}

/// Acknowledge polarity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckPolarity {
    /// Acknowledge reads 1 when idle
    IdleHigh,
    /// Acknowledge reads 0 when idle (bridge reports "active")
    IdleLow,
}

/// Request/acknowledge bits of one domain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdleDescriptor {
    /// Bit in BUS_IDLE_REQ
    pub req: u32,
    /// Acknowledge bit in BUS_IDLE_ST
    pub ack: u32,
    /// Idle status bit in BUS_IDLE_ST, if the domain has one
    pub status: Option<u32>,
    /// Polarity of the acknowledge bit
    pub polarity: AckPolarity,
}

impl IdleDescriptor {
    /// Bits of BUS_IDLE_ST compared against the target
    pub const fn ack_mask(&self) -> u32 {
        let mut mask = 1 << self.ack;
        if let Some(status) = self.status {
            mask |= 1 << status;
        }
        mask
    }

    /// Value of the masked BUS_IDLE_ST bits once `idle` has taken effect
    pub const fn target(&self, idle: bool) -> u32 {
        let ack_high = match self.polarity {
            AckPolarity::IdleHigh => idle,
            AckPolarity::IdleLow => !idle,
        };
        let mut target = (ack_high as u32) << self.ack;
        if let Some(status) = self.status {
            target |= (idle as u32) << status;
        }
        target
    }
}

impl BusDomain {
    /// Every negotiable domain
    pub const ALL: [BusDomain; 15] = [
        BusDomain::Cluster0,
        BusDomain::Cluster1,
        BusDomain::Cxcs,
        BusDomain::Cci400,
        BusDomain::Gpu,
        BusDomain::Core,
        BusDomain::Bus,
        BusDomain::Dma,
        BusDomain::Peri,
        BusDomain::Video,
        BusDomain::Vio,
        BusDomain::Alive,
        BusDomain::Pmu,
        BusDomain::Msch,
        BusDomain::Cci,
    ];

    /// Bus domain of a CPU cluster
    pub const fn cluster(cluster: usize) -> Option<Self> {
        match cluster {
            0 => Some(BusDomain::Cluster0),
            1 => Some(BusDomain::Cluster1),
            _ => None,
        }
    }

    /// Register bits of this domain
    pub const fn descriptor(self) -> IdleDescriptor {
        let n = self as u32;
        let (status, polarity) = match self {
            BusDomain::Cluster0 | BusDomain::Cluster1 => (None, AckPolarity::IdleHigh),
            BusDomain::Cxcs | BusDomain::Cci400 => (None, AckPolarity::IdleLow),
            _ => (Some(n), AckPolarity::IdleHigh),
        };
        IdleDescriptor {
            req: n,
            ack: 16 + n,
            status,
            polarity,
        }
    }
}

impl TryFrom<u8> for BusDomain {
    type Error = PmError;

    fn try_from(raw: u8) -> PmResult<Self> {
        BusDomain::ALL
            .get(raw as usize)
            .copied()
            .ok_or(PmError::UnsupportedRequest)
    }
}

// ============================================================================
// Negotiator
// ============================================================================

/// Requests and awaits bus idle
#[derive(Debug, Clone, Copy)]
pub struct IdleNegotiator<P> {
    platform: P,
    budget: Poll,
    warn_every: u32,
}

impl<P: Mmio + Delay> IdleNegotiator<P> {
    /// Create a negotiator
    pub const fn new(platform: P, budget: Poll, warn_every: u32) -> Self {
        Self {
            platform,
            budget,
            warn_every,
        }
    }

    /// Request (`idle = true`) or release idle and wait for the acknowledge
    pub fn request_idle(&self, domain: BusDomain, idle: bool) -> PmResult<()> {
        let desc = domain.descriptor();
        let mask = desc.ack_mask();
        let target = desc.target(idle);

        if idle {
            self.platform.set_bits(PMU_BUS_IDLE_REQ, 1 << desc.req);
        } else {
            self.platform.clear_bits(PMU_BUS_IDLE_REQ, 1 << desc.req);
        }
        dsb();

        poll_with_warning(
            &self.platform,
            self.budget,
            self.warn_every,
            || self.platform.read32(PMU_BUS_IDLE_ST) & mask == target,
            |misses| {
                log::warn!(
                    "IdleNegotiator: {:?} st={:#x} mask={:#x} after {} reads",
                    domain,
                    self.platform.read32(PMU_BUS_IDLE_ST),
                    mask,
                    misses
                )
            },
        )
        .map_err(|e| {
            log::error!("IdleNegotiator: {:?} never reached idle={}", domain, idle);
            e
        })
    }
}

// ============================================================================
// TESTS
// ============================================================================
