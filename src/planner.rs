use crate::{
    allocate::StageCosts,
    error::SolveError,
    host::HostApi,
    machine::Target,
    solver::{
        threads_for_effect,
        EFFECT_TOLERANCE,
    },
};

/// Compensates for the solver's coarse tolerance and discretization error
/// accumulating against the target reaching max money.
pub const GROW_SAFETY_FACTOR: f64 = 1.1;

/// Thread counts of the four stages of one batch. Zero means the stage is
/// not needed this pass.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StageRequest {
    pub hack: usize,
    pub weaken_one: usize,
    pub grow: usize,
    pub weaken_two: usize,
}

impl StageRequest {
    pub fn is_empty(&self) -> bool {
        self.hack == 0
            && self.weaken_one == 0
            && self.grow == 0
            && self.weaken_two == 0
    }

    pub fn total_ram_hundredths(
        &self,
        costs: StageCosts,
    ) -> u64 {
        self.hack as u64 * costs.hack
            + self.grow as u64 * costs.grow
            + (self.weaken_one + self.weaken_two) as u64 * costs.weaken
    }

    /// RAM of the largest single stage; the contiguous slot a batch needs.
    pub fn max_stage_ram_hundredths(
        &self,
        costs: StageCosts,
    ) -> u64 {
        [
            self.hack as u64 * costs.hack,
            self.grow as u64 * costs.grow,
            self.weaken_one as u64 * costs.weaken,
            self.weaken_two as u64 * costs.weaken,
        ]
        .into_iter()
        .max()
        .unwrap_or(0)
    }
}

/// Thread counts for one steady-state batch hacking `percent` of the
/// target's money. Assumes the target sits at baseline (min security, max
/// money), which every earlier batch of the cycle restores.
pub fn batch_threads<H: HostApi>(
    host: &H,
    target: &Target,
    percent: f64,
) -> Result<StageRequest, SolveError> {
    let hostname = target.get_hostname();
    let max_money = target.get_max_money(host);
    let hack_amount = max_money * percent;

    let hack = host
        .hack_threads_for_amount(hostname, hack_amount)
        .max(0.)
        .floor() as usize;

    let weaken_one = threads_for_effect(
        |t| host.weaken_effect(t),
        host.hack_security_effect(hack, hostname),
        EFFECT_TOLERANCE,
    )?;

    let multiplier = max_money / (max_money - hack_amount).max(1.);
    let grow = (GROW_SAFETY_FACTOR
        * host.grow_threads_for_multiplier(hostname, multiplier))
    .ceil() as usize;

    let weaken_two = threads_for_effect(
        |t| host.weaken_effect(t),
        host.grow_security_effect(grow, hostname),
        EFFECT_TOLERANCE,
    )?;

    Ok(StageRequest {
        hack,
        weaken_one,
        grow,
        weaken_two,
    })
}

/// Convergence variant: no hack; weaken and grow counts derived purely from
/// the gap between the target's current and baseline state.
pub fn prep_threads<H: HostApi>(
    host: &H,
    target: &Target,
) -> Result<StageRequest, SolveError> {
    let hostname = target.get_hostname();

    let weaken_one = threads_for_effect(
        |t| host.weaken_effect(t),
        target.get_security_gap(host),
        EFFECT_TOLERANCE,
    )?;

    let money = target.get_money_available(host);
    let max_money = target.get_max_money(host);
    let grow = if max_money <= money {
        0
    }
    else {
        host.grow_threads_for_multiplier(hostname, max_money / money.max(1.))
            .ceil() as usize
    };

    let weaken_two = threads_for_effect(
        |t| host.weaken_effect(t),
        host.grow_security_effect(grow, hostname),
        EFFECT_TOLERANCE,
    )?;

    Ok(StageRequest {
        hack: 0,
        weaken_one,
        grow,
        weaken_two,
    })
}
