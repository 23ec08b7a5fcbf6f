//! Interface to the remote accounting repository.
//!
//! The engine consumes this seam only; `crate::client` ships the default
//! HTTP implementation and tests substitute recording mocks.

use crate::ledger::document::{
    Account, AccountGroup, Accounting, AddressAccount, BudgetAccount, BudgetAccountGroup,
    LetterHead, PostingLine,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;

/// Failures raised by the remote accounting repository.
#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// The service cannot be reached. Absorbed at the orchestrator boundary;
    /// the current run ends early without faulting.
    #[error("remote accounting service is unreachable")]
    Offline,

    #[error("remote API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("malformed remote payload: {0}")]
    Payload(String),
}

impl RemoteError {
    pub fn is_offline(&self) -> bool {
        matches!(self, RemoteError::Offline)
    }
}

/// An accounting as listed by the remote service, with the letter head it
/// references.
#[derive(Debug, Clone)]
pub struct RemoteAccounting {
    pub accounting: Accounting,
    pub letter_head: LetterHead,
}

/// One journal entry to replay to the remote service.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub voucher: Option<String>,
    pub account_number: String,
    pub text: String,
    pub budget_account_number: Option<String>,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub address_account_number: Option<i32>,
}

impl From<&PostingLine> for NewEntry {
    fn from(line: &PostingLine) -> Self {
        Self {
            date: line.date,
            voucher: line.voucher.clone(),
            account_number: line.account_number.clone(),
            text: line.text.clone(),
            budget_account_number: line.budget_account_number.clone(),
            debit: line.debit,
            credit: line.credit,
            address_account_number: line.address_account_number,
        }
    }
}

/// Remote accounting repository.
///
/// Every operation may fail with [`RemoteError::Offline`] when the service
/// is unreachable.
#[async_trait::async_trait]
pub trait RemoteLedgerRepository: Send + Sync {
    async fn get_account_groups(&self) -> Result<Vec<AccountGroup>, RemoteError>;

    async fn get_budget_account_groups(&self) -> Result<Vec<BudgetAccountGroup>, RemoteError>;

    async fn get_accountings(&self) -> Result<Vec<RemoteAccounting>, RemoteError>;

    async fn get_account_plan(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
    ) -> Result<Vec<Account>, RemoteError>;

    async fn get_budget_account_plan(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
    ) -> Result<Vec<BudgetAccount>, RemoteError>;

    async fn get_address_accounts(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
    ) -> Result<Vec<AddressAccount>, RemoteError>;

    async fn get_posting_lines(
        &self,
        accounting_no: i32,
        status_date: NaiveDate,
        limit: u32,
    ) -> Result<Vec<PostingLine>, RemoteError>;

    /// Post one journal entry. Entries are always sent one at a time, never
    /// batched.
    async fn post_entry(&self, accounting_no: i32, entry: NewEntry) -> Result<(), RemoteError>;
}
