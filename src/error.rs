use compact_str::CompactString;
use thiserror::Error;

use crate::host::Stage;

/// Failures of the monotonic threshold search.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum SolveError {
    /// The requested effect cannot be reached even with the maximum thread
    /// budget. A configuration error, never retried.
    #[error(
        "requested effect {requested:.3} exceeds the {achievable:.3} \
         achievable with {max_threads} threads"
    )]
    UnreachableEffect {
        requested: f64,
        achievable: f64,
        max_threads: usize,
    },
}

/// Failures of a packing pass. A failed pass commits nothing: the caller's
/// shadow capacity map is left untouched.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum AllocationError {
    /// No single node can host the whole grow stage. Splitting grow is never
    /// acceptable, so this fails the batch outright.
    #[error(
        "cannot place {threads} grow threads on one node \
         (largest contiguous slot fits {max_single})"
    )]
    GrowContiguous {
        threads: usize,
        max_single: usize,
    },

    /// No single node can host the hack stage and the caller forbade
    /// splitting it.
    #[error("cannot place {threads} hack threads without splitting")]
    HackContiguous { threads: usize },

    /// Aggregate capacity ran out while spreading hack threads.
    #[error(
        "insufficient capacity for {threads} hack threads \
         ({unplaced} left unplaced)"
    )]
    HackCapacity {
        threads: usize,
        unplaced: usize,
    },

    /// One or both weaken stages could not be filled completely. There is no
    /// degraded mode for weaken: an under-weakened target invalidates the
    /// next cycle's assumptions.
    #[error(
        "unable to fully place weaken threads \
         (primary short {weaken_one}, secondary short {weaken_two})"
    )]
    WeakenOverflow {
        weaken_one: usize,
        weaken_two: usize,
    },
}

/// Top-level failures of the batch controller.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum BatchError {
    #[error(transparent)]
    Solve(#[from] SolveError),

    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// A placement passed allocation but the host reported no process at
    /// launch time. Indicates a race with the authoritative capacity source;
    /// the whole cycle run aborts.
    #[error("launch of {stage} payload on {node} created no process")]
    LaunchFailed {
        stage: Stage,
        node: CompactString,
    },

    #[error("no such server: {0}")]
    UnknownTarget(CompactString),
}
