//! # MPIDR (Multiprocessor Affinity Register)
//!
//! Hardware identity of a core. The power-management core stores the boot
//! core's value in the always-on resume layout so the wake path can tell
//! which core is allowed to run the trampoline.
//!
//! ```text
//!  31 30 29   25 24 23    16 15     8 7      0
//! ┌──┬──┬───────┬──┬────────┬────────┬────────┐
//! │1 │U │ RES0  │MT│ (Aff2) │cluster │  core  │
//! └──┴──┴───────┴──┴────────┴────────┴────────┘
//! ```
//!
//! Only Aff1 (cluster) and Aff0 (core in cluster) carry meaning on the SoCs
//! handled here. The resume layout carries just those two fields
//! ([`Mpidr::affinity`]); the flag bits differ between cores and boots.

/// Core-in-cluster field
const CORE_MASK: u64 = 0xff;

/// Cluster field
const CLUSTER_SHIFT: u64 = 8;
const CLUSTER_MASK: u64 = 0xff << CLUSTER_SHIFT;

/// Aff2 and Aff3, unused on these SoCs
const UPPER_AFF_MASK: u64 = (0xff << 16) | (0xff << 32);

/// Hardware core identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(transparent)]
pub struct Mpidr(u64);

impl Mpidr {
    /// Wrap a raw register value
    #[inline]
    pub const fn from_raw(value: u64) -> Self {
        Self(value)
    }

    /// Compose from cluster and core-in-cluster
    #[inline]
    pub const fn from_cluster_core(cluster: u8, core: u8) -> Self {
        Self(core as u64 | (cluster as u64) << CLUSTER_SHIFT)
    }

    /// MPIDR_EL1 of the calling core
    #[cfg(target_arch = "aarch64")]
    #[inline(always)]
    pub fn current() -> Self {
        let value: u64;
        // SAFETY: reading MPIDR_EL1 has no side effects
        unsafe {
            core::arch::asm!(
                "mrs {}, mpidr_el1",
                out(reg) value,
                options(nomem, nostack, preserves_flags)
            );
        }
        Self(value)
    }

    /// Raw value, as published in the resume layout
    #[inline]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Aff1:Aff0, the form the boot firmware compares on wake
    #[inline]
    pub const fn affinity(self) -> u64 {
        self.0 & (CLUSTER_MASK | CORE_MASK)
    }

    /// Cluster number
    #[inline(always)]
    pub const fn cluster(self) -> usize {
        ((self.0 & CLUSTER_MASK) >> CLUSTER_SHIFT) as usize
    }

    /// Core number within its cluster
    #[inline(always)]
    pub const fn core_in_cluster(self) -> usize {
        (self.0 & CORE_MASK) as usize
    }

    /// Flat core index for a topology of `cores_per_cluster`
    ///
    /// Assumes the id belongs to that topology; see [`Mpidr::core_index`].
    #[inline(always)]
    pub const fn linear_index(self, cores_per_cluster: usize) -> usize {
        self.cluster() * cores_per_cluster + self.core_in_cluster()
    }

    /// Flat core index, or `None` if no such core exists in a topology of
    /// `clusters` x `cores_per_cluster`
    pub const fn core_index(self, clusters: usize, cores_per_cluster: usize) -> Option<usize> {
        if self.0 & UPPER_AFF_MASK != 0
            || self.cluster() >= clusters
            || self.core_in_cluster() >= cores_per_cluster
        {
            return None;
        }
        Some(self.linear_index(cores_per_cluster))
    }
}

impl core::fmt::Display for Mpidr {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "cluster{}/cpu{}", self.cluster(), self.core_in_cluster())
    }
}
