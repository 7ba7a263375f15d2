use core::fmt;

use compact_str::CompactString;

pub type ProcessId = usize;

/// One of the three deployable payloads. Both weaken stages of a batch run the
/// same weaken payload.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Stage {
    Hack,
    Grow,
    Weaken,
}

impl fmt::Display for Stage {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        use Stage::*;

        match self {
            Hack => write!(f, "hack"),
            Grow => write!(f, "grow"),
            Weaken => write!(f, "weaken"),
        }
    }
}

/// Capability surface the scheduler requires from the surrounding environment.
///
/// The environment owns the stage-effect simulation, process management and
/// capacity bookkeeping; the scheduler only queries and launches through this
/// trait. RAM quantities are exchanged as integer GB-hundredths so packing
/// arithmetic never accumulates float error.
pub trait HostApi {
    /// Write a line to the script log.
    fn print(
        &self,
        text: &str,
    );

    /// Write a line to the terminal.
    fn tprint(
        &self,
        text: &str,
    );

    /// Cooperatively suspend for the given number of milliseconds.
    fn sleep(
        &self,
        millis: f64,
    );

    fn server_exists(
        &self,
        hostname: &str,
    ) -> bool;

    /// Hostnames of every node the caller may launch payloads on.
    fn node_names(&self) -> Vec<CompactString>;

    /// Hostnames of every resource-bearing machine worth targeting.
    fn target_names(&self) -> Vec<CompactString>;

    fn max_ram_hundredths(
        &self,
        hostname: &str,
    ) -> u64;

    fn used_ram_hundredths(
        &self,
        hostname: &str,
    ) -> u64;

    /// Capacity this node withholds from allocation, subtracted additively
    /// from its total before any packing decision.
    fn reserved_ram_hundredths(
        &self,
        hostname: &str,
    ) -> u64;

    /// Per-thread RAM cost of the given stage payload.
    fn script_ram_hundredths(
        &self,
        stage: Stage,
    ) -> u64;

    fn security_level(
        &self,
        hostname: &str,
    ) -> f64;

    fn min_security_level(
        &self,
        hostname: &str,
    ) -> f64;

    fn money_available(
        &self,
        hostname: &str,
    ) -> f64;

    fn max_money(
        &self,
        hostname: &str,
    ) -> f64;

    fn hack_time(
        &self,
        hostname: &str,
    ) -> f64;

    fn grow_time(
        &self,
        hostname: &str,
    ) -> f64;

    /// Longest of the three stage durations: weaken >= grow >= hack always
    /// holds under the host's difficulty model.
    fn weaken_time(
        &self,
        hostname: &str,
    ) -> f64;

    /// Security decrease achieved by the given (possibly fractional) number
    /// of weaken threads. Monotonic non-decreasing.
    fn weaken_effect(
        &self,
        threads: f64,
    ) -> f64;

    /// Security increase caused by the given number of hack threads.
    fn hack_security_effect(
        &self,
        threads: usize,
        hostname: &str,
    ) -> f64;

    /// Security increase caused by the given number of grow threads.
    fn grow_security_effect(
        &self,
        threads: usize,
        hostname: &str,
    ) -> f64;

    fn hack_chance(
        &self,
        hostname: &str,
    ) -> f64;

    /// Real-valued thread count needed to hack the given amount of money.
    fn hack_threads_for_amount(
        &self,
        hostname: &str,
        amount: f64,
    ) -> f64;

    /// Real-valued thread count needed to multiply available money by the
    /// given factor.
    fn grow_threads_for_multiplier(
        &self,
        hostname: &str,
        multiplier: f64,
    ) -> f64;

    /// Stage the payload for `stage` onto `node` and start it against
    /// `target` with the given launch delay. `None` means no process was
    /// created.
    fn launch(
        &self,
        stage: Stage,
        node: &str,
        threads: usize,
        target: &str,
        offset_millis: f64,
    ) -> Option<ProcessId>;

    fn kill(
        &self,
        pid: ProcessId,
    ) -> bool;
}
