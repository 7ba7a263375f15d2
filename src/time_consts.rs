pub const MILLISECOND: f64 = 1.;
pub const SECOND: f64 = 1000. * MILLISECOND;

/// Gap between stage completions within one batch.
pub const BATCH_STEP: f64 = 75. * MILLISECOND;

/// Cadence at which consecutive batches of one cycle are issued.
pub const BATCH_INTERVAL: f64 = BATCH_STEP * 4.;
