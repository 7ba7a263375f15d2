use crate::{
    allocate::{
        Assignment,
        Placements,
    },
    error::BatchError,
    host::{
        HostApi,
        ProcessId,
        Stage,
    },
    machine::Target,
    time_consts::BATCH_STEP,
};

/// Launch delays for the four stages of one batch.
///
/// Each stage runs for a different, target-dependent duration; the offsets
/// are back-computed from the weaken duration so the completions land evenly
/// spaced, one `BATCH_STEP` apart, in the order hack, weaken-primary, grow,
/// weaken-secondary. Ordering is achieved purely by this pre-computed timing;
/// there is no coordination channel once the tasks are in flight.
#[derive(Clone, Copy, Debug)]
pub struct StageOffsets {
    pub hack: f64,
    pub weaken_one: f64,
    pub grow: f64,
    pub weaken_two: f64,

    /// Wall-clock length of the whole batch, padding included.
    pub duration: f64,
}

pub fn stage_offsets<H: HostApi>(
    host: &H,
    target: &Target,
) -> StageOffsets {
    let hack_time = target.get_hack_time(host);
    let grow_time = target.get_grow_time(host);
    let weaken_time = target.get_weaken_time(host);

    StageOffsets {
        hack: weaken_time - hack_time - BATCH_STEP,
        weaken_one: 0.,
        grow: weaken_time - grow_time + BATCH_STEP,
        weaken_two: 2. * BATCH_STEP,
        duration: weaken_time + 2. * BATCH_STEP,
    }
}

#[derive(Clone, Debug)]
pub struct DispatchedBatch {
    pub duration: f64,
    pub pids: Vec<ProcessId>,
}

/// Launches every placement of the assignment against the target.
///
/// A placement that reports no process means the authoritative capacity
/// source raced past the allocation; the batch cannot be allowed to half-run,
/// so its already-launched tasks are killed before the error surfaces.
pub fn dispatch<H: HostApi>(
    host: &H,
    assignment: &Assignment,
    target: &Target,
) -> Result<DispatchedBatch, BatchError> {
    let offsets = stage_offsets(host, target);

    let stages: [(Stage, &Placements, f64); 4] = [
        (Stage::Hack, &assignment.hack, offsets.hack),
        (Stage::Weaken, &assignment.weaken_one, offsets.weaken_one),
        (Stage::Grow, &assignment.grow, offsets.grow),
        (Stage::Weaken, &assignment.weaken_two, offsets.weaken_two),
    ];

    let mut pids = Vec::new();

    for (stage, placements, offset) in stages {
        for placement in placements.iter() {
            if placement.threads == 0 {
                continue;
            }

            let launched = host.launch(
                stage,
                &placement.node,
                placement.threads,
                target.get_hostname(),
                offset,
            );

            match launched {
                Some(pid) => pids.push(pid),
                None => {
                    for pid in pids {
                        host.kill(pid);
                    }

                    return Err(BatchError::LaunchFailed {
                        stage,
                        node: placement.node.clone(),
                    });
                },
            }
        }
    }

    Ok(DispatchedBatch {
        duration: offsets.duration,
        pids,
    })
}
