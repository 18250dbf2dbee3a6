pub mod block;
pub mod report;

pub use block::{Block, BlockError};
pub use report::{HealthReport, PoolEntry, ReportError, Vitals};

/// Current wall-clock time as fractional seconds since the Unix epoch
/// (microsecond resolution).
pub fn unix_timestamp() -> f64 {
    chrono::Utc::now().timestamp_micros() as f64 / 1_000_000.0
}
