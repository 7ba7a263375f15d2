use clap::Args;

use crate::{
    allocate::{
        allocate,
        spread_grow,
        AllocationStatus,
        ShadowRam,
        StageCosts,
    },
    dispatch::dispatch,
    error::BatchError,
    host::HostApi,
    machine::{
        deployable_nodes,
        Target,
    },
    planner::{
        batch_threads,
        prep_threads,
        StageRequest,
    },
    time_consts::BATCH_INTERVAL,
};

/// Absolute security gap under which a target counts as weakened.
const SECURITY_READY_TOLERANCE: f64 = 0.05;

/// Money gap, as a fraction of max money, under which a target counts as
/// grown.
const MONEY_READY_FRACTION: f64 = 0.05;

#[derive(Clone, Copy, Debug)]
pub struct BatchConfig {
    /// Fraction of the target's max money each batch hacks.
    pub hack_percent: f64,
    /// Upper bound on concurrent batches per window; `None` saturates.
    pub max_batches: Option<usize>,
    pub include_reserved: bool,
    pub allow_split_hack: bool,
}

impl Default for BatchConfig {
    fn default() -> BatchConfig {
        BatchConfig {
            hack_percent: 0.5,
            max_batches: None,
            include_reserved: false,
            allow_split_hack: true,
        }
    }
}

/// Outcome of one saturation window of the cycling state.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CycleReport {
    /// How many concurrent batches the current weaken duration supports.
    pub saturation: usize,
    /// How many were actually issued after the concurrency cap.
    pub issued: usize,
    /// How many of those had to split their hack stage.
    pub degraded: usize,
}

/// Drives one target through preparation and then saturated batch cycling.
///
/// Preparation tolerates allocation failures by retrying with backoff; once
/// cycling, any failure is fatal, because a skipped batch desynchronizes the
/// security trajectory every later batch was planned against.
pub struct BatchCycle<'a, H> {
    host: &'a H,
    target: Target,
    config: BatchConfig,
}

impl<'a, H: HostApi> BatchCycle<'a, H> {
    pub fn new(
        host: &'a H,
        target: Target,
        config: BatchConfig,
    ) -> Result<BatchCycle<'a, H>, BatchError> {
        if !host.server_exists(target.get_hostname()) {
            return Err(BatchError::UnknownTarget(
                target.get_hostname().into(),
            ));
        }

        Ok(BatchCycle {
            host,
            target,
            config,
        })
    }

    /// Both gaps must close in the same check before cycling may begin.
    pub fn is_prepared(&self) -> bool {
        let security_ready =
            self.target.get_security_gap(self.host) < SECURITY_READY_TOLERANCE;

        let max_money = self.target.get_max_money(self.host);
        let money_gap = max_money - self.target.get_money_available(self.host);
        let money_ready = money_gap <= MONEY_READY_FRACTION * max_money;

        security_ready && money_ready
    }

    /// Drives the target to baseline (min security, max money).
    ///
    /// Each pass re-measures the gaps and plans a full correction. When the
    /// full correction does not fit, the pass falls back to a partial one:
    /// the primary weaken placed strictly, then as many grow threads as fit
    /// spread largest-node-first. Splitting grow costs effectiveness, which
    /// is acceptable here; the raised security it leaves behind is picked up
    /// by the next pass's weaken. If not even the weaken stage fits, the
    /// pass is retried after one weaken duration.
    pub fn prep(&self) -> Result<(), BatchError> {
        loop {
            if self.is_prepared() {
                self.host.print(&format!(
                    "INFO: {} at baseline, security {:.3}, money {:.0}",
                    self.target.get_hostname(),
                    self.target.get_security_level(self.host),
                    self.target.get_money_available(self.host),
                ));
                return Ok(());
            }

            let costs = StageCosts::query(self.host);
            let nodes =
                deployable_nodes(self.host, self.config.include_reserved);

            let request = prep_threads(self.host, &self.target)?;
            if request.is_empty() {
                return Ok(());
            }

            let shadow = ShadowRam::new();
            let assignment =
                match allocate(&request, costs, &nodes, true, &shadow) {
                    Ok(allocation) => allocation.assignment,

                    Err(_full) => {
                        let weaken_only = StageRequest {
                            weaken_one: request.weaken_one,
                            ..Default::default()
                        };

                        match allocate(
                            &weaken_only,
                            costs,
                            &nodes,
                            true,
                            &shadow,
                        ) {
                            Ok(allocation) => {
                                let (grow, unplaced, _) = spread_grow(
                                    request.grow,
                                    costs,
                                    &nodes,
                                    &allocation.shadow,
                                );

                                self.host.print(&format!(
                                    "INFO: partial correction on {}: {} \
                                     weaken, {}/{} grow threads",
                                    self.target.get_hostname(),
                                    request.weaken_one,
                                    request.grow - unplaced,
                                    request.grow,
                                ));

                                let mut assignment = allocation.assignment;
                                assignment.grow = grow;
                                assignment
                            },

                            Err(err) => {
                                let backoff =
                                    self.target.get_weaken_time(self.host);

                                self.host.print(&format!(
                                    "WARN: {}; retrying in {:.0} ms",
                                    err, backoff,
                                ));

                                self.host.sleep(backoff);
                                continue;
                            },
                        }
                    },
                };

            let batch = dispatch(self.host, &assignment, &self.target)?;
            self.host.sleep(batch.duration);
        }
    }

    /// One saturation window of the cycling state.
    ///
    /// The weaken duration is re-measured here rather than cached: it tracks
    /// external progression state, so every window recomputes how many
    /// batches fit.
    pub fn run_cycle(&self) -> Result<CycleReport, BatchError> {
        let costs = StageCosts::query(self.host);

        let weaken_time = self.target.get_weaken_time(self.host);
        let saturation = (weaken_time / BATCH_INTERVAL).floor() as usize;
        let issued = match self.config.max_batches {
            Some(cap) => saturation.min(cap),
            None => saturation,
        };

        self.host.print(&format!(
            "INFO: cycling {}: issuing {} of {} batches",
            self.target.get_hostname(),
            issued,
            saturation,
        ));

        let mut degraded = 0;

        for _ in 0 .. issued {
            // re-query the pool so this batch packs against live capacity,
            // including everything the earlier batches launched
            let nodes =
                deployable_nodes(self.host, self.config.include_reserved);

            let request = batch_threads(
                self.host,
                &self.target,
                self.config.hack_percent,
            )?;

            let allocation = allocate(
                &request,
                costs,
                &nodes,
                self.config.allow_split_hack,
                &ShadowRam::new(),
            )?;

            if allocation.status == AllocationStatus::Degraded {
                degraded += 1;
                self.host.print(&format!(
                    "WARN: hack stage split across {} nodes",
                    allocation.assignment.hack.len(),
                ));
            }

            dispatch(self.host, &allocation.assignment, &self.target)?;
            self.host.sleep(BATCH_INTERVAL);
        }

        // sleep out the rest of the window so the next pass starts against a
        // fresh weaken duration measurement
        let remaining = (saturation - issued) as f64 * BATCH_INTERVAL;
        if 0. < remaining {
            self.host.sleep(remaining);
        }

        Ok(CycleReport {
            saturation,
            issued,
            degraded,
        })
    }

    pub fn run(&self) -> Result<(), BatchError> {
        self.prep()?;

        loop {
            self.run_cycle()?;
        }
    }
}

#[derive(Args, Debug)]
pub struct BatchMode {
    /// Hostname of the machine to hack.
    target: String,
    /// Fraction of max money hacked per batch.
    #[arg(long, short = 'p', default_value_t = 0.5)]
    hack_percent: f64,
    /// Cap on concurrent batches per window.
    #[arg(long, short = 'm')]
    max_batches: Option<usize>,
    /// Also pack onto nodes that carry a reservation.
    #[arg(long)]
    include_reserved: bool,
    /// Fail instead of splitting an oversized hack stage.
    #[arg(long)]
    no_split_hack: bool,
}

impl BatchMode {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn config(&self) -> BatchConfig {
        BatchConfig {
            hack_percent: self.hack_percent,
            max_batches: self.max_batches,
            include_reserved: self.include_reserved,
            allow_split_hack: !self.no_split_hack,
        }
    }

    pub fn execute<H: HostApi>(
        &self,
        host: &H,
    ) {
        let cycle =
            BatchCycle::new(host, Target::new(&*self.target), self.config());

        let fatal = match cycle {
            Ok(cycle) => match cycle.run() {
                Ok(()) => return,
                Err(err) => err,
            },
            Err(err) => err,
        };

        host.tprint(&format!("ERROR: {}", fatal));
    }
}
