use crate::error::SolveError;

/// More threads than any stage will ever need; the search space upper bound.
pub const MAX_SOLVER_THREADS: usize = 100_000;

/// Minimum realistic per-thread effect granularity; the default overshoot
/// allowance of the search.
pub const EFFECT_TOLERANCE: f64 = 0.05;

const MAX_ITERATIONS: usize = 20;

/// Smallest integer thread count whose effect reaches `amount` without
/// undershooting, for any monotonically non-decreasing `effect` function.
///
/// Overshoot is bounded: the search accepts a midpoint once its effect lands
/// in `[amount, amount + tolerance)` and rounds it up to a whole thread. If
/// the iteration cap is exhausted before the window is hit, the midpoint of
/// the final bracket is returned, ceiling-rounded; the bracket invariant
/// (the ceiling side always satisfies the amount) keeps that error bounded.
pub fn threads_for_effect(
    effect: impl Fn(f64) -> f64,
    amount: f64,
    tolerance: f64,
) -> Result<usize, SolveError> {
    if amount <= 0. {
        return Ok(0);
    }

    let mut floor = 1.;
    let mut ceil = MAX_SOLVER_THREADS as f64;

    let achievable = effect(ceil);
    if achievable < amount {
        return Err(SolveError::UnreachableEffect {
            requested: amount,
            achievable,
            max_threads: MAX_SOLVER_THREADS,
        });
    }

    for _ in 0 .. MAX_ITERATIONS {
        let mid = (ceil + floor) / 2.;
        let over = effect(mid) - amount;

        if 0. <= over && over < tolerance {
            return Ok(mid.ceil() as usize);
        }
        else if over > 0. {
            ceil = mid;
        }
        else {
            floor = mid;
        }
    }

    Ok(((ceil + floor) / 2.).ceil() as usize)
}
