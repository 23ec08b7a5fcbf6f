//! Sync orchestrator: the top-level synchronization algorithm.
//!
//! Each run pulls reference data, decides between incremental and full
//! depth, pushes locally pending journal entries in creation order, pulls
//! authoritative data back down, and persists everything through the
//! mutation committer. The per-accounting branches run concurrently and the
//! run completes only after all of them finish.
//!
//! An unreachable remote service never faults a run: during the
//! reference-data pull it aborts the whole run early and cleanly, and inside
//! a per-accounting branch it aborts only that accounting's remaining phases
//! while the other branches are allowed to finish. Already-applied local
//! mutations are always left intact.

use crate::config::SyncSettings;
use crate::ledger::store::{DocumentStore, StoreError};
use crate::ledger::sync::committer::DocumentCommitter;
use crate::ledger::sync::events::{EventSender, LedgerEvent};
use crate::ledger::sync::remote::{NewEntry, RemoteError, RemoteLedgerRepository};
use crate::ledger::sync::report::{AccountingReport, SyncReport};
use chrono::{DateTime, Months, NaiveDate, Utc};
use futures::future::join_all;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Failures that terminate a synchronization run.
///
/// An unreachable remote service is not among them; offline conditions are
/// absorbed before they reach the caller.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("remote repository failure: {0}")]
    Remote(#[from] RemoteError),
}

impl SyncError {
    fn is_offline(&self) -> bool {
        matches!(self, SyncError::Remote(RemoteError::Offline))
    }
}

/// Coordinates one synchronization run against the remote repository.
pub struct SyncOrchestrator {
    remote: Arc<dyn RemoteLedgerRepository>,
    store: DocumentStore,
    committer: Arc<DocumentCommitter>,
    settings: SyncSettings,
    events: EventSender,
    offline_notified: AtomicBool,
}

impl SyncOrchestrator {
    pub fn new(
        remote: Arc<dyn RemoteLedgerRepository>,
        store: DocumentStore,
        committer: Arc<DocumentCommitter>,
        settings: SyncSettings,
        events: EventSender,
    ) -> Self {
        Self {
            remote,
            store,
            committer,
            settings,
            events,
            offline_notified: AtomicBool::new(false),
        }
    }

    /// Execute one synchronization run.
    pub async fn run(&self) -> Result<SyncReport, SyncError> {
        info!("Starting ledger synchronization");
        self.offline_notified.store(false, Ordering::Relaxed);
        let mut report = SyncReport::default();

        match self.pull_reference_data().await {
            Ok(()) => report.reference_data_pulled = true,
            Err(error) if error.is_offline() => {
                self.notify_offline();
                report.aborted_offline = true;
                info!("{}", report.summary());
                return Ok(report);
            }
            Err(error) => return Err(error),
        }

        let now = Utc::now();
        let document = self.store.get().await?;
        report.full_sync = is_full_sync_due(
            document.last_full_sync,
            now.date_naive(),
            self.settings.full_sync_interval_days,
        );
        if report.full_sync {
            info!("Full synchronization due, historical snapshots in scope");
        }

        let accountings = match self.remote.get_accountings().await {
            Ok(accountings) => accountings,
            Err(RemoteError::Offline) => {
                self.notify_offline();
                report.aborted_offline = true;
                info!("{}", report.summary());
                return Ok(report);
            }
            Err(error) => return Err(error.into()),
        };

        for remote_accounting in &accountings {
            let letter_head = remote_accounting.letter_head.clone();
            let accounting = remote_accounting.accounting.clone();
            self.committer
                .execute(move |doc| {
                    doc.upsert_letter_head(letter_head);
                    doc.upsert_accounting(accounting);
                })
                .await?;
        }

        let branches = accountings
            .iter()
            .map(|a| self.sync_accounting(a.accounting.number, report.full_sync, now));
        for result in join_all(branches).await {
            report.accountings.push(result?);
        }

        if report.full_sync && report.completed() {
            self.committer
                .execute(move |doc| doc.last_full_sync = Some(now))
                .await?;
        } else {
            // Flush the queue so every pulled entity is durable before the
            // run reports back.
            self.committer.execute(|_| {}).await?;
        }

        info!("{}", report.summary());
        Ok(report)
    }

    /// Pull account groups and budget account groups. The first mutation on
    /// an empty document establishes its shape; afterwards the same upserts
    /// merge into the existing document.
    async fn pull_reference_data(&self) -> Result<(), SyncError> {
        let groups = self.remote.get_account_groups().await?;
        let budget_groups = self.remote.get_budget_account_groups().await?;
        debug!(
            "Pulled {} account groups, {} budget account groups",
            groups.len(),
            budget_groups.len()
        );

        for group in groups {
            self.committer.push(move |doc| doc.upsert_account_group(group));
        }
        for group in budget_groups {
            self.committer
                .push(move |doc| doc.upsert_budget_account_group(group));
        }
        Ok(())
    }

    /// Run all phases for one accounting, absorbing an offline signal.
    async fn sync_accounting(
        &self,
        accounting_no: i32,
        full_sync: bool,
        now: DateTime<Utc>,
    ) -> Result<AccountingReport, SyncError> {
        let mut report = AccountingReport::new(accounting_no);
        match self
            .run_accounting_phases(accounting_no, full_sync, now.date_naive(), &mut report)
            .await
        {
            Ok(()) => Ok(report),
            Err(error) if error.is_offline() => {
                self.notify_offline();
                warn!(
                    "Accounting {} sync aborted: remote service unreachable",
                    accounting_no
                );
                report.aborted_offline = true;
                Ok(report)
            }
            Err(error) => Err(error),
        }
    }

    async fn run_accounting_phases(
        &self,
        accounting_no: i32,
        full_sync: bool,
        status_date: NaiveDate,
        report: &mut AccountingReport,
    ) -> Result<(), SyncError> {
        self.push_pending_entries(accounting_no, report).await?;
        self.pull_current(accounting_no, status_date, report).await?;
        if full_sync {
            self.pull_historical(accounting_no, status_date, report)
                .await?;
        }
        self.pull_peripherals(accounting_no, status_date, report)
            .await?;
        Ok(())
    }

    /// Replay pending journal entries to the remote service, earliest first.
    ///
    /// Entries go out one at a time in (date, running number) order, and the
    /// acknowledgment is persisted before the next entry is even looked up,
    /// so a crash between sends loses at most the one in flight.
    async fn push_pending_entries(
        &self,
        accounting_no: i32,
        report: &mut AccountingReport,
    ) -> Result<(), SyncError> {
        loop {
            let document = self.store.get().await?;
            let Some(line) = document.earliest_pending_line(accounting_no) else {
                break;
            };

            debug!(
                "Pushing posting line #{} of accounting {} ({})",
                line.running_number, accounting_no, line.date
            );
            self.remote
                .post_entry(accounting_no, NewEntry::from(&line))
                .await?;

            let running_number = line.running_number;
            self.committer
                .execute(move |doc| doc.mark_line_synchronized(accounting_no, running_number))
                .await?;
            report.entries_pushed += 1;
        }
        Ok(())
    }

    /// Pull the account plan and budget account plan as of today.
    async fn pull_current(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
        report: &mut AccountingReport,
    ) -> Result<(), SyncError> {
        let accounts = self
            .remote
            .get_account_plan(accounting_no, status_date)
            .await?;
        report.accounts_pulled += accounts.len();
        for account in accounts {
            self.committer
                .push(move |doc| doc.upsert_account(accounting_no, account));
        }

        let budget_accounts = self
            .remote
            .get_budget_account_plan(accounting_no, status_date)
            .await?;
        report.budget_snapshots_pulled += budget_accounts.len();
        for account in budget_accounts {
            self.committer
                .push(move |doc| doc.upsert_budget_account(accounting_no, account));
        }
        Ok(())
    }

    /// Pull budget snapshots at bi-monthly intervals back through the
    /// configured span, rebuilding year-over-year trend figures.
    async fn pull_historical(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
        report: &mut AccountingReport,
    ) -> Result<(), SyncError> {
        let step = self.settings.historical_step_months.max(1);
        let mut offset = step;
        while offset <= self.settings.historical_span_months {
            let Some(historical_date) = status_date.checked_sub_months(Months::new(offset)) else {
                break;
            };

            let snapshots = self
                .remote
                .get_budget_account_plan(accounting_no, historical_date)
                .await?;
            debug!(
                "Pulled {} historical budget snapshots for accounting {} as of {}",
                snapshots.len(),
                accounting_no,
                historical_date
            );
            report.budget_snapshots_pulled += snapshots.len();
            for account in snapshots {
                self.committer
                    .push(move |doc| doc.upsert_budget_account(accounting_no, account));
            }
            offset += step;
        }
        Ok(())
    }

    /// Pull address accounts and the most recent posting lines. Pulled lines
    /// merge without disturbing lines that are still locally pending.
    async fn pull_peripherals(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
        report: &mut AccountingReport,
    ) -> Result<(), SyncError> {
        let address_accounts = self
            .remote
            .get_address_accounts(accounting_no, status_date)
            .await?;
        report.address_accounts_pulled += address_accounts.len();
        for account in address_accounts {
            self.committer
                .push(move |doc| doc.upsert_address_account(accounting_no, account));
        }

        let lines = self
            .remote
            .get_posting_lines(accounting_no, status_date, self.settings.posting_line_limit)
            .await?;
        report.posting_lines_pulled += lines.len();
        for line in lines {
            self.committer
                .push(move |doc| doc.merge_pulled_posting_line(accounting_no, line));
        }
        Ok(())
    }

    /// Publish the offline notification, at most once per run.
    fn notify_offline(&self) {
        if !self.offline_notified.swap(true, Ordering::Relaxed) {
            let _ = self.events.send(LedgerEvent::Offline);
        }
    }
}

/// A full sync is due when no marker exists or the marker is more than
/// `interval_days` in the past, comparing dates only.
fn is_full_sync_due(marker: Option<DateTime<Utc>>, today: NaiveDate, interval_days: i64) -> bool {
    match marker {
        None => true,
        Some(last) => (today - last.date_naive()).num_days() > interval_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::document::{
        Account, AccountGroup, Accounting, AddressAccount, BalanceBelowZero, BalanceSide,
        BudgetAccount, BudgetAccountGroup, LedgerDocument, LetterHead, PostingLine,
    };
    use crate::ledger::store::MemoryDocumentRepository;
    use crate::ledger::sync::events;
    use crate::ledger::sync::remote::RemoteAccounting;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Remote calls the mock answers with "offline".
    #[derive(Debug, Clone, Copy, PartialEq)]
    enum FailPoint {
        AccountGroups,
        Accountings,
        AccountPlan(i32),
        PostEntry(i32),
    }

    #[derive(Default)]
    struct MockRemote {
        account_groups: Vec<AccountGroup>,
        budget_account_groups: Vec<BudgetAccountGroup>,
        accountings: Vec<RemoteAccounting>,
        account_plans: HashMap<i32, Vec<Account>>,
        budget_plans: HashMap<i32, Vec<BudgetAccount>>,
        address_accounts: HashMap<i32, Vec<AddressAccount>>,
        posting_lines: HashMap<i32, Vec<PostingLine>>,
        fail_points: Vec<FailPoint>,
        posted: Mutex<Vec<(i32, NewEntry)>>,
        budget_plan_requests: Mutex<Vec<(i32, NaiveDate)>>,
    }

    impl MockRemote {
        fn fails_at(&self, point: FailPoint) -> bool {
            self.fail_points.contains(&point)
        }
    }

    #[async_trait::async_trait]
    impl RemoteLedgerRepository for MockRemote {
        async fn get_account_groups(&self) -> Result<Vec<AccountGroup>, RemoteError> {
            if self.fails_at(FailPoint::AccountGroups) {
                return Err(RemoteError::Offline);
            }
            Ok(self.account_groups.clone())
        }

        async fn get_budget_account_groups(&self) -> Result<Vec<BudgetAccountGroup>, RemoteError> {
            Ok(self.budget_account_groups.clone())
        }

        async fn get_accountings(&self) -> Result<Vec<RemoteAccounting>, RemoteError> {
            if self.fails_at(FailPoint::Accountings) {
                return Err(RemoteError::Offline);
            }
            Ok(self.accountings.clone())
        }

        async fn get_account_plan(
            &self,
            accounting_no: i32,
            _status_date: NaiveDate,
        ) -> Result<Vec<Account>, RemoteError> {
            if self.fails_at(FailPoint::AccountPlan(accounting_no)) {
                return Err(RemoteError::Offline);
            }
            Ok(self
                .account_plans
                .get(&accounting_no)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_budget_account_plan(
            &self,
            accounting_no: i32,
            status_date: NaiveDate,
        ) -> Result<Vec<BudgetAccount>, RemoteError> {
            self.budget_plan_requests
                .lock()
                .unwrap()
                .push((accounting_no, status_date));
            Ok(self
                .budget_plans
                .get(&accounting_no)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_address_accounts(
            &self,
            accounting_no: i32,
            _status_date: NaiveDate,
        ) -> Result<Vec<AddressAccount>, RemoteError> {
            Ok(self
                .address_accounts
                .get(&accounting_no)
                .cloned()
                .unwrap_or_default())
        }

        async fn get_posting_lines(
            &self,
            accounting_no: i32,
            _status_date: NaiveDate,
            limit: u32,
        ) -> Result<Vec<PostingLine>, RemoteError> {
            let mut lines = self
                .posting_lines
                .get(&accounting_no)
                .cloned()
                .unwrap_or_default();
            lines.truncate(limit as usize);
            Ok(lines)
        }

        async fn post_entry(&self, accounting_no: i32, entry: NewEntry) -> Result<(), RemoteError> {
            if self.fails_at(FailPoint::PostEntry(accounting_no)) {
                return Err(RemoteError::Offline);
            }
            self.posted.lock().unwrap().push((accounting_no, entry));
            Ok(())
        }
    }

    fn remote_accounting(number: i32, name: &str) -> RemoteAccounting {
        RemoteAccounting {
            accounting: Accounting {
                number,
                name: name.to_string(),
                letter_head_number: 1,
                balance_below_zero: BalanceBelowZero::Creditors,
                back_dating_days: 30,
                accounts: Vec::new(),
                budget_accounts: Vec::new(),
                address_accounts: Vec::new(),
                posting_lines: Vec::new(),
            },
            letter_head: LetterHead {
                number: 1,
                name: "Me".to_string(),
            },
        }
    }

    fn pending_line(running_number: i32, date: NaiveDate, text: &str) -> PostingLine {
        PostingLine {
            running_number,
            date,
            voucher: None,
            account_number: "DANKORT".to_string(),
            text: text.to_string(),
            budget_account_number: None,
            debit: Some(dec!(4.50)),
            credit: None,
            address_account_number: None,
            synchronized: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn seeded_with_accounting(number: i32, name: &str) -> LedgerDocument {
        let mut document = LedgerDocument::empty();
        document.upsert_letter_head(LetterHead {
            number: 1,
            name: "Me".to_string(),
        });
        document.upsert_accounting(remote_accounting(number, name).accounting);
        document
    }

    struct Harness {
        remote: Arc<MockRemote>,
        store: DocumentStore,
        committer: Arc<DocumentCommitter>,
        orchestrator: SyncOrchestrator,
        events: events::EventReceiver,
    }

    fn harness(remote: MockRemote, seed: Option<LedgerDocument>) -> Harness {
        let repository = match seed {
            Some(document) => MemoryDocumentRepository::seeded(document),
            None => MemoryDocumentRepository::new(),
        };
        let store = DocumentStore::new(Arc::new(repository));
        let (sender, events) = events::channel(64);
        let committer = Arc::new(DocumentCommitter::new(store.clone(), sender.clone()));
        let remote = Arc::new(remote);
        let orchestrator = SyncOrchestrator::new(
            Arc::clone(&remote) as Arc<dyn RemoteLedgerRepository>,
            store.clone(),
            Arc::clone(&committer),
            SyncSettings::default(),
            sender,
        );
        Harness {
            remote,
            store,
            committer,
            orchestrator,
            events,
        }
    }

    #[tokio::test]
    async fn first_sync_seeds_the_document_and_stamps_the_marker() {
        let mut remote = MockRemote::default();
        remote.account_groups.push(AccountGroup {
            number: 1,
            name: "Cash".to_string(),
            balance_side: BalanceSide::Assets,
        });
        remote.accountings.push(remote_accounting(1, "Private"));
        remote.account_plans.insert(
            1,
            vec![Account {
                account_number: "DANKORT".to_string(),
                name: "Checking".to_string(),
                balance: dec!(1500.00),
                credit_limit: dec!(0.00),
                status_date: Utc::now().date_naive(),
            }],
        );

        let h = harness(remote, None);
        let report = h.orchestrator.run().await.unwrap();

        assert!(report.completed());
        assert!(report.full_sync);
        let document = h.store.get().await.unwrap();
        assert_eq!(document.accounting(1).unwrap().name, "Private");
        assert_eq!(document.letter_heads[0].name, "Me");
        assert_eq!(document.account_groups[0].name, "Cash");
        let account = &document.accounting(1).unwrap().accounts[0];
        assert_eq!(account.account_number, "DANKORT");
        assert_eq!(account.balance, dec!(1500.00));
        assert!(document.last_full_sync.is_some());
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn pending_entry_is_posted_once_with_exact_values_and_flagged() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));

        let mut seed = seeded_with_accounting(1, "Private");
        seed.upsert_posting_line(1, pending_line(7, date(2024, 1, 5), "Coffee"));

        let h = harness(remote, Some(seed));
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.entries_pushed(), 1);

        let posted = h.remote.posted.lock().unwrap().clone();
        assert_eq!(posted.len(), 1);
        let (accounting_no, entry) = &posted[0];
        assert_eq!(*accounting_no, 1);
        assert_eq!(entry.date, date(2024, 1, 5));
        assert_eq!(entry.account_number, "DANKORT");
        assert_eq!(entry.text, "Coffee");
        assert_eq!(entry.debit, Some(dec!(4.50)));
        assert_eq!(entry.credit, None);

        let document = h.store.get().await.unwrap();
        assert!(document.pending_posting_lines(1).is_empty());
        assert!(document.accounting(1).unwrap().posting_lines[0].synchronized);
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn pending_entries_replay_in_date_then_running_number_order() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));

        let mut seed = seeded_with_accounting(1, "Private");
        for (running_number, line_date) in [
            (7, date(2024, 2, 1)),
            (5, date(2024, 2, 1)),
            (6, date(2024, 2, 1)),
            (3, date(2024, 1, 15)),
            (4, date(2024, 1, 15)),
        ] {
            seed.upsert_posting_line(1, pending_line(running_number, line_date, "entry"));
        }

        let h = harness(remote, Some(seed));
        h.orchestrator.run().await.unwrap();

        let posted: Vec<(NaiveDate, String)> = h
            .remote
            .posted
            .lock()
            .unwrap()
            .iter()
            .map(|(_, entry)| (entry.date, entry.text.clone()))
            .collect();
        let dates: Vec<NaiveDate> = posted.iter().map(|(d, _)| *d).collect();
        assert_eq!(
            dates,
            vec![
                date(2024, 1, 15),
                date(2024, 1, 15),
                date(2024, 2, 1),
                date(2024, 2, 1),
                date(2024, 2, 1),
            ]
        );

        let document = h.store.get().await.unwrap();
        assert!(document.pending_posting_lines(1).is_empty());
        h.committer.dispose().await.unwrap();
    }

    #[test]
    fn full_sync_gating_follows_the_thirty_day_boundary() {
        let today = Utc::now().date_naive();
        let days_ago = |days: i64| Utc::now() - chrono::Duration::days(days);

        assert!(is_full_sync_due(None, today, 30));
        assert!(!is_full_sync_due(Some(days_ago(29)), today, 30));
        assert!(is_full_sync_due(Some(days_ago(31)), today, 30));
    }

    #[tokio::test]
    async fn full_sync_pulls_historical_snapshots_at_bimonthly_offsets() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));

        let h = harness(remote, None);
        let report = h.orchestrator.run().await.unwrap();
        assert!(report.full_sync);

        // One current pull plus offsets 2, 4, 6, 8, 10 and 12 months back.
        let today = Utc::now().date_naive();
        let requests: Vec<NaiveDate> = h
            .remote
            .budget_plan_requests
            .lock()
            .unwrap()
            .iter()
            .map(|(_, status_date)| *status_date)
            .collect();
        assert_eq!(requests.len(), 7);
        assert!(requests.contains(&today));
        for offset in [2u32, 4, 6, 8, 10, 12] {
            assert!(requests.contains(&today.checked_sub_months(Months::new(offset)).unwrap()));
        }
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn recent_full_sync_skips_historical_snapshots() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));

        let mut seed = LedgerDocument::empty();
        seed.last_full_sync = Some(Utc::now() - chrono::Duration::days(29));

        let h = harness(remote, Some(seed));
        let report = h.orchestrator.run().await.unwrap();

        assert!(!report.full_sync);
        assert_eq!(h.remote.budget_plan_requests.lock().unwrap().len(), 1);
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn offline_during_reference_pull_aborts_the_run_cleanly() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));
        remote.fail_points.push(FailPoint::AccountGroups);

        let mut h = harness(remote, None);
        let report = h.orchestrator.run().await.unwrap();

        assert!(report.aborted_offline);
        assert!(report.accountings.is_empty());
        let document = h.store.get().await.unwrap();
        assert!(document.is_empty());
        assert!(matches!(
            h.events.recv().await.unwrap(),
            LedgerEvent::Offline
        ));
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn offline_in_one_accounting_lets_the_others_finish() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));
        remote.accountings.push(remote_accounting(2, "Office"));
        remote.account_plans.insert(
            2,
            vec![Account {
                account_number: "BANK".to_string(),
                name: "Bank".to_string(),
                balance: dec!(250.00),
                credit_limit: dec!(0.00),
                status_date: Utc::now().date_naive(),
            }],
        );
        remote.fail_points.push(FailPoint::AccountPlan(1));

        let h = harness(remote, None);
        let report = h.orchestrator.run().await.unwrap();

        let aborted = report
            .accountings
            .iter()
            .find(|a| a.accounting_no == 1)
            .unwrap();
        assert!(aborted.aborted_offline);
        let finished = report
            .accountings
            .iter()
            .find(|a| a.accounting_no == 2)
            .unwrap();
        assert!(!finished.aborted_offline);
        assert_eq!(finished.accounts_pulled, 1);

        let document = h.store.get().await.unwrap();
        assert!(document.accounting(1).unwrap().accounts.is_empty());
        assert_eq!(document.accounting(2).unwrap().accounts.len(), 1);
        // A partially-aborted full sync leaves the marker unset so the next
        // run retries the historical depth.
        assert!(document.last_full_sync.is_none());
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn offline_notification_is_published_at_most_once_per_run() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));
        remote.accountings.push(remote_accounting(2, "Office"));
        remote.fail_points.push(FailPoint::PostEntry(1));
        remote.fail_points.push(FailPoint::PostEntry(2));

        let mut seed = seeded_with_accounting(1, "Private");
        seed.upsert_accounting(remote_accounting(2, "Office").accounting);
        seed.upsert_posting_line(1, pending_line(1, date(2024, 1, 5), "a"));
        seed.upsert_posting_line(2, pending_line(1, date(2024, 1, 5), "b"));

        let mut h = harness(remote, Some(seed));
        let report = h.orchestrator.run().await.unwrap();
        assert!(report.accountings.iter().all(|a| a.aborted_offline));

        let mut offline_events = 0;
        while let Ok(event) = h.events.try_recv() {
            if matches!(event, LedgerEvent::Offline) {
                offline_events += 1;
            }
        }
        assert_eq!(offline_events, 1);
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn offline_while_posting_preserves_the_pending_entry() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));
        remote.fail_points.push(FailPoint::PostEntry(1));

        let mut seed = seeded_with_accounting(1, "Private");
        seed.upsert_posting_line(1, pending_line(7, date(2024, 1, 5), "Coffee"));

        let h = harness(remote, Some(seed));
        let report = h.orchestrator.run().await.unwrap();

        assert!(report.accountings[0].aborted_offline);
        assert_eq!(report.entries_pushed(), 0);
        let document = h.store.get().await.unwrap();
        assert_eq!(document.pending_posting_lines(1).len(), 1);
        assert!(!document.accounting(1).unwrap().posting_lines[0].synchronized);
        h.committer.dispose().await.unwrap();
    }

    #[tokio::test]
    async fn pulled_posting_lines_land_without_disturbing_pending_ones() {
        let mut remote = MockRemote::default();
        remote.accountings.push(remote_accounting(1, "Private"));
        let mut pulled = pending_line(3, date(2024, 1, 2), "from server");
        pulled.synchronized = true;
        remote.posting_lines.insert(1, vec![pulled]);

        let h = harness(remote, None);
        let report = h.orchestrator.run().await.unwrap();
        assert_eq!(report.accountings[0].posting_lines_pulled, 1);

        let document = h.store.get().await.unwrap();
        let lines = &document.accounting(1).unwrap().posting_lines;
        assert_eq!(lines.len(), 1);
        assert!(lines[0].synchronized);
        h.committer.dispose().await.unwrap();
    }
}
