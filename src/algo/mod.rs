pub mod rolling_zscore;

pub use rolling_zscore::{DEFAULT_THRESHOLD, DEFAULT_WINDOW_SIZE, RollingZScore, Verdict};
