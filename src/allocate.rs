use std::{
    cmp::Reverse,
    collections::HashMap,
};

use compact_str::CompactString;
use itertools::Itertools as _;
use smallvec::SmallVec;

use crate::{
    error::AllocationError,
    host::{
        HostApi,
        Stage,
    },
    machine::Node,
    planner::StageRequest,
};

/// Remaining usable RAM per node, carried across placements within one pass
/// and returned so callers can chain passes without re-querying live state.
pub type ShadowRam = HashMap<CompactString, u64>;

/// Per-thread payload RAM, queried from the host once per planning pass.
#[derive(Clone, Copy, Debug)]
pub struct StageCosts {
    pub hack: u64,
    pub grow: u64,
    pub weaken: u64,
}

impl StageCosts {
    pub fn query<H: HostApi>(host: &H) -> StageCosts {
        StageCosts {
            hack: host.script_ram_hundredths(Stage::Hack),
            grow: host.script_ram_hundredths(Stage::Grow),
            weaken: host.script_ram_hundredths(Stage::Weaken),
        }
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Placement {
    pub node: CompactString,
    pub threads: usize,
}

pub type Placements = SmallVec<[Placement; 4]>;

/// Per-stage node placements of one batch. On success the thread counts of
/// each stage sum to the originally requested count.
#[derive(Clone, Debug, Default)]
pub struct Assignment {
    pub hack: Placements,
    pub weaken_one: Placements,
    pub grow: Placements,
    pub weaken_two: Placements,
}

impl Assignment {
    pub fn stage_total(placements: &Placements) -> usize {
        placements.iter().map(|p| p.threads).sum()
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AllocationStatus {
    /// Every stage placed under its preferred rules.
    Full,
    /// The hack stage had to be split across nodes. The batch still runs
    /// correctly but with proportionally reduced efficiency; worth surfacing.
    Degraded,
}

#[derive(Clone, Debug)]
pub struct Allocation {
    pub assignment: Assignment,
    pub status: AllocationStatus,
    pub shadow: ShadowRam,
}

fn usable_ram(
    node: &Node,
    shadow: &ShadowRam,
) -> u64 {
    shadow
        .get(node.get_hostname())
        .copied()
        .unwrap_or_else(|| node.get_free_ram_hundredths())
}

/// First node, scanning the given order, with room for the whole stage.
fn fill_contiguous(
    order: &[&Node],
    shadow: &mut ShadowRam,
    threads: usize,
    cost: u64,
) -> Option<Placement> {
    let needed = threads as u64 * cost;

    for node in order {
        let available = usable_ram(node, shadow);

        if needed <= available {
            shadow.insert(
                CompactString::from(node.get_hostname()),
                available - needed,
            );

            return Some(Placement {
                node: CompactString::from(node.get_hostname()),
                threads,
            });
        }
    }

    None
}

/// Greedily fills nodes in the given order. Returns the placements and the
/// number of threads that did not fit.
fn fill_spread(
    order: &[&Node],
    shadow: &mut ShadowRam,
    mut threads: usize,
    cost: u64,
) -> (Placements, usize) {
    let mut placements = Placements::new();

    for node in order {
        if threads == 0 {
            break;
        }

        let available = usable_ram(node, shadow);
        let count = ((available / cost) as usize).min(threads);
        if count == 0 {
            continue;
        }

        threads -= count;
        shadow.insert(
            CompactString::from(node.get_hostname()),
            available - count as u64 * cost,
        );
        placements.push(Placement {
            node: CompactString::from(node.get_hostname()),
            threads: count,
        });
    }

    (placements, threads)
}

/// Packs one batch's stage requests onto the node pool.
///
/// Nodes are scanned smallest usable slot first, conserving large nodes for
/// the stages that cannot be split. Grow must land whole on one node; hack
/// prefers a single node and degrades to a greedy split when
/// `allow_split_hack` permits; both weaken stages spread freely in the same
/// final pass. A failed pass commits nothing: `shadow_in` is never mutated
/// and no allocation is returned.
pub fn allocate(
    request: &StageRequest,
    costs: StageCosts,
    nodes: &[Node],
    allow_split_hack: bool,
    shadow_in: &ShadowRam,
) -> Result<Allocation, AllocationError> {
    let mut shadow = shadow_in.clone();

    let order = nodes
        .iter()
        .sorted_by_key(|node| usable_ram(node, &shadow))
        .collect::<Vec<_>>();

    let mut assignment = Assignment::default();
    let mut status = AllocationStatus::Full;

    // grow first: it has the hardest placement constraint
    if request.grow != 0 {
        match fill_contiguous(&order, &mut shadow, request.grow, costs.grow) {
            Some(placement) => assignment.grow.push(placement),
            None => {
                let max_single = order
                    .iter()
                    .map(|node| (usable_ram(node, &shadow) / costs.grow) as usize)
                    .max()
                    .unwrap_or(0);

                return Err(AllocationError::GrowContiguous {
                    threads: request.grow,
                    max_single,
                });
            },
        }
    }

    if request.hack != 0 {
        match fill_contiguous(&order, &mut shadow, request.hack, costs.hack) {
            Some(placement) => assignment.hack.push(placement),

            None if allow_split_hack => {
                let (placements, unplaced) = fill_spread(
                    &order,
                    &mut shadow,
                    request.hack,
                    costs.hack,
                );

                if unplaced != 0 {
                    return Err(AllocationError::HackCapacity {
                        threads: request.hack,
                        unplaced,
                    });
                }

                status = AllocationStatus::Degraded;
                assignment.hack = placements;
            },

            None => {
                return Err(AllocationError::HackContiguous {
                    threads: request.hack,
                })
            },
        }
    }

    // both weaken stages pack independently over whatever capacity remains
    let (weaken_one, short_one) = fill_spread(
        &order,
        &mut shadow,
        request.weaken_one,
        costs.weaken,
    );
    let (weaken_two, short_two) = fill_spread(
        &order,
        &mut shadow,
        request.weaken_two,
        costs.weaken,
    );

    if short_one != 0 || short_two != 0 {
        return Err(AllocationError::WeakenOverflow {
            weaken_one: short_one,
            weaken_two: short_two,
        });
    }

    assignment.weaken_one = weaken_one;
    assignment.weaken_two = weaken_two;

    Ok(Allocation {
        assignment,
        status,
        shadow,
    })
}

/// Spreads as many grow threads as fit across the pool, largest node first.
///
/// Only the convergence loop uses this: splitting grow costs effectiveness,
/// which is acceptable while driving a target back to baseline but never
/// inside a steady-state batch. Returns the placements, the thread shortfall,
/// and the updated shadow map.
pub fn spread_grow(
    threads: usize,
    costs: StageCosts,
    nodes: &[Node],
    shadow_in: &ShadowRam,
) -> (Placements, usize, ShadowRam) {
    let mut shadow = shadow_in.clone();

    let order = nodes
        .iter()
        .sorted_by_key(|node| Reverse(usable_ram(node, &shadow)))
        .collect::<Vec<_>>();

    let (placements, unplaced) =
        fill_spread(&order, &mut shadow, threads, costs.grow);

    (placements, unplaced, shadow)
}
