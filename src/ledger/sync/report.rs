//! Statistics about one synchronization run.

/// Per-accounting counters for one run.
#[derive(Debug, Clone)]
pub struct AccountingReport {
    pub accounting_no: i32,
    pub entries_pushed: usize,
    pub accounts_pulled: usize,
    pub budget_snapshots_pulled: usize,
    pub address_accounts_pulled: usize,
    pub posting_lines_pulled: usize,
    /// The remaining phases of this accounting were skipped because the
    /// remote service became unreachable.
    pub aborted_offline: bool,
}

impl AccountingReport {
    pub fn new(accounting_no: i32) -> Self {
        Self {
            accounting_no,
            entries_pushed: 0,
            accounts_pulled: 0,
            budget_snapshots_pulled: 0,
            address_accounts_pulled: 0,
            posting_lines_pulled: 0,
            aborted_offline: false,
        }
    }
}

/// Summary of one synchronization run.
#[derive(Debug, Clone, Default)]
pub struct SyncReport {
    /// Historical snapshots were in scope for this run.
    pub full_sync: bool,
    pub reference_data_pulled: bool,
    /// The whole run was aborted during the reference-data pull.
    pub aborted_offline: bool,
    pub accountings: Vec<AccountingReport>,
}

impl SyncReport {
    /// Whether every phase of every accounting ran to the end.
    pub fn completed(&self) -> bool {
        !self.aborted_offline && self.accountings.iter().all(|a| !a.aborted_offline)
    }

    pub fn entries_pushed(&self) -> usize {
        self.accountings.iter().map(|a| a.entries_pushed).sum()
    }

    /// Human-readable summary for logging.
    pub fn summary(&self) -> String {
        if self.aborted_offline {
            return "Sync aborted: remote service unreachable".to_string();
        }
        let aborted = self
            .accountings
            .iter()
            .filter(|a| a.aborted_offline)
            .count();
        format!(
            "Synced {} accountings ({} entries pushed, {} accounts, {} budget snapshots, {} posting lines pulled){}{}",
            self.accountings.len(),
            self.entries_pushed(),
            self.accountings.iter().map(|a| a.accounts_pulled).sum::<usize>(),
            self.accountings
                .iter()
                .map(|a| a.budget_snapshots_pulled)
                .sum::<usize>(),
            self.accountings
                .iter()
                .map(|a| a.posting_lines_pulled)
                .sum::<usize>(),
            if self.full_sync { ", full sync" } else { "" },
            if aborted > 0 {
                format!(", {} aborted offline", aborted)
            } else {
                String::new()
            }
        )
    }
}
