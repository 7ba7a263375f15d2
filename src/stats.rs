use core::fmt;
use std::{
    cmp::Reverse,
    fmt::Write as _,
};

use clap::Args;
use compact_str::CompactString;
use decorum::N64;

use crate::{
    allocate::{
        allocate,
        AllocationStatus,
        ShadowRam,
        StageCosts,
    },
    host::HostApi,
    machine::{
        deployable_nodes,
        Node,
        Target,
    },
    planner::{
        batch_threads,
        StageRequest,
    },
    time_consts::{
        BATCH_INTERVAL,
        SECOND,
    },
};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Feasibility {
    /// A full saturation window packs without splitting any hack stage.
    Fits,
    /// The window packs, but some batches run with a split hack stage.
    Degraded,
    /// The pool cannot sustain a full window against this target.
    Oversubscribed,
}

impl fmt::Display for Feasibility {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        use Feasibility::*;

        match self {
            Fits => write!(f, "fits"),
            Degraded => write!(f, "degraded"),
            Oversubscribed => write!(f, "oversubscribed"),
        }
    }
}

/// Which yield metric ranks the survey.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SurveyOrder {
    ProfitPerSecond,
    /// Profit per GB of batch RAM; favors cheap targets on a starved pool.
    ProfitPerRam,
}

#[derive(Clone, Debug, PartialEq)]
pub struct TargetReport {
    pub target: CompactString,
    pub saturation: usize,
    pub batch_ram_hundredths: u64,
    /// RAM of the largest single stage; the contiguous slot every batch
    /// needs on one node.
    pub max_stage_ram_hundredths: u64,
    pub window_ram_hundredths: u64,
    pub money_per_batch: f64,
    pub money_per_second: f64,
    pub money_per_ram: f64,
    pub feasibility: Feasibility,
}

/// Whether the pool can sustain a full saturation window.
///
/// A dry run of `saturation` chained packing passes, carried through a shadow
/// capacity map so that no live state is touched and each simulated batch
/// sees the capacity its predecessors consumed. Windows demanding more than
/// 1.5x the pool's free capacity are rejected without simulating.
fn classify(
    request: &StageRequest,
    costs: StageCosts,
    nodes: &[Node],
    saturation: usize,
    window_ram: u64,
    total_free: u64,
) -> Feasibility {
    use Feasibility::*;

    if total_free == 0 || total_free * 3 < window_ram * 2 {
        return Oversubscribed;
    }

    let mut shadow = ShadowRam::new();
    let mut degraded = false;

    for _ in 0 .. saturation {
        match allocate(request, costs, nodes, true, &shadow) {
            Ok(allocation) => {
                degraded |= allocation.status == AllocationStatus::Degraded;
                shadow = allocation.shadow;
            },
            Err(_) => return Oversubscribed,
        }
    }

    if degraded {
        Degraded
    }
    else {
        Fits
    }
}

/// Feasibility and yield of every candidate target at the given hack
/// fraction, best earner first under the chosen ranking.
pub fn survey<H: HostApi>(
    host: &H,
    hack_percent: f64,
    include_reserved: bool,
    order: SurveyOrder,
) -> Vec<TargetReport> {
    let costs = StageCosts::query(host);
    let nodes = deployable_nodes(host, include_reserved);
    let total_free = nodes
        .iter()
        .map(|node| node.get_free_ram_hundredths())
        .sum::<u64>();

    let mut reports = Vec::new();

    for name in host.target_names() {
        let target = Target::new(name.clone());

        let request = match batch_threads(host, &target, hack_percent) {
            Ok(request) => request,
            Err(err) => {
                host.print(&format!("WARN: skipping {}: {}", name, err));
                continue;
            },
        };

        let weaken_time = target.get_weaken_time(host);
        let saturation = (weaken_time / BATCH_INTERVAL).floor() as usize;

        let batch_ram = request.total_ram_hundredths(costs);
        let max_stage_ram = request.max_stage_ram_hundredths(costs);
        let window_ram = batch_ram * saturation as u64;

        let money_per_batch = target.get_max_money(host)
            * hack_percent
            * host.hack_chance(&name);
        let money_per_second =
            money_per_batch * saturation as f64 * SECOND / weaken_time;
        let money_per_ram = if batch_ram == 0 {
            0.
        }
        else {
            money_per_batch / (batch_ram as f64 / 100.)
        };

        let feasibility = classify(
            &request,
            costs,
            &nodes,
            saturation,
            window_ram,
            total_free,
        );

        reports.push(TargetReport {
            target: name,
            saturation,
            batch_ram_hundredths: batch_ram,
            max_stage_ram_hundredths: max_stage_ram,
            window_ram_hundredths: window_ram,
            money_per_batch,
            money_per_second,
            money_per_ram,
            feasibility,
        });
    }

    {
        use SurveyOrder::*;

        match order {
            ProfitPerSecond => reports.sort_by_key(|report| {
                Reverse(N64::from_inner(report.money_per_second))
            }),
            ProfitPerRam => reports.sort_by_key(|report| {
                Reverse(N64::from_inner(report.money_per_ram))
            }),
        }
    }

    reports
}

#[derive(Args, Debug)]
pub struct SurveyMode {
    /// Fraction of max money hacked per batch.
    #[arg(long, short = 'p', default_value_t = 0.5)]
    hack_percent: f64,
    /// Also count nodes that carry a reservation.
    #[arg(long)]
    include_reserved: bool,
    /// Sort by profit per unit RAM instead of profit per second.
    #[arg(long, short = 'r')]
    per_ram: bool,
}

impl SurveyMode {
    pub fn order(&self) -> SurveyOrder {
        if self.per_ram {
            SurveyOrder::ProfitPerRam
        }
        else {
            SurveyOrder::ProfitPerSecond
        }
    }

    pub fn execute<H: HostApi>(
        &self,
        host: &H,
    ) {
        let reports = survey(
            host,
            self.hack_percent,
            self.include_reserved,
            self.order(),
        );

        if reports.is_empty() {
            host.tprint("no viable targets");
            return;
        }

        let name_len = reports
            .iter()
            .map(|report| report.target.len())
            .max()
            .unwrap_or(0);

        let mut print_str = "\n".to_owned();
        for report in reports.iter() {
            writeln!(
                &mut print_str,
                "{: <lnl$}   {: >4} batches   {: >9.2} GB each   \
                 {: >9.2} GB contiguous   {: >11.2} GB window   \
                 ${: >14.2}/s   ${: >10.2}/GB   {}",
                report.target,
                report.saturation,
                report.batch_ram_hundredths as f64 / 100.,
                report.max_stage_ram_hundredths as f64 / 100.,
                report.window_ram_hundredths as f64 / 100.,
                report.money_per_second,
                report.money_per_ram,
                report.feasibility,
                lnl = name_len,
            )
            .unwrap();
        }

        host.tprint(&print_str);
    }
}
