pub mod allocate;
pub mod cycle;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod machine;
pub mod planner;
pub mod solver;
pub mod stats;
#[cfg(test)]
mod testing;
pub mod time_consts;

use clap::{
    error::ErrorKind::DisplayHelp,
    Parser,
};

pub use crate::{
    allocate::{
        allocate,
        Allocation,
        AllocationStatus,
        Assignment,
        Placement,
        Placements,
        ShadowRam,
        StageCosts,
    },
    cycle::{
        BatchConfig,
        BatchCycle,
        BatchMode,
        CycleReport,
    },
    dispatch::{
        dispatch,
        stage_offsets,
        DispatchedBatch,
        StageOffsets,
    },
    error::{
        AllocationError,
        BatchError,
        SolveError,
    },
    host::{
        HostApi,
        ProcessId,
        Stage,
    },
    machine::{
        deployable_nodes,
        Node,
        Target,
    },
    planner::{
        batch_threads,
        prep_threads,
        StageRequest,
    },
    solver::threads_for_effect,
    stats::{
        survey,
        Feasibility,
        SurveyMode,
        SurveyOrder,
        TargetReport,
    },
};

/// Command dispatch for the in-game script arguments.
pub fn execute_command<H: HostApi>(
    host: &H,
    args: Vec<String>,
) {
    let mut strargs = vec!["run batch.js".to_owned()];
    strargs.extend(args);

    // if the message was matched, process the message
    match AppMode::try_parse_from(strargs) {
        Err(e) if e.kind() == DisplayHelp => {
            let error_msg =
                format!("\n{}", clap::Error::raw(e.kind().clone(), e),);

            host.tprint(&*error_msg);
        },

        Ok(AppMode::Batch(batch_mode)) => batch_mode.execute(host),

        Ok(AppMode::Survey(survey_mode)) => survey_mode.execute(host),

        Err(e) => host.tprint(&format!("unable to process message:\n{}", e)),
    }
}

#[derive(Parser)]
enum AppMode {
    Batch(BatchMode),
    Survey(SurveyMode),
}
