//! Engine configuration.
//!
//! One value object constructed at startup and passed by reference into the
//! orchestrator; there is no ambient settings lookup.

/// Configuration for synchronization runs.
#[derive(Debug, Clone)]
pub struct SyncSettings {
    /// How many recent posting lines to pull per accounting.
    pub posting_line_limit: u32,
    /// How far back historical budget snapshots reach, in months.
    pub historical_span_months: u32,
    /// Interval between historical budget snapshots, in months.
    pub historical_step_months: u32,
    /// A full sync is due when the last one is more than this many days in
    /// the past (date-only comparison).
    pub full_sync_interval_days: i64,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            posting_line_limit: 50,
            historical_span_months: 12,
            historical_step_months: 2,
            full_sync_interval_days: 30,
        }
    }
}
