//! Typed model of the offline ledger document.
//!
//! The document is one tree-shaped artifact: a root holding flat collections of
//! accountings, letter heads and dimension groups, with accounts, budget
//! accounts, address accounts and posting lines nested under their accounting.
//! Every mutation applied to it is an idempotent upsert by natural key; the
//! only entity created locally before remote acknowledgment is the posting
//! line, tracked through its `synchronized` flag.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Serde codec for posting dates stored as `yyyyMMdd` strings.
pub mod posting_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    const FORMAT: &str = "%Y%m%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&raw, FORMAT).map_err(D::Error::custom)
    }
}

/// How an accounting presents balances that drop below zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceBelowZero {
    Debtors,
    Creditors,
}

/// Which side of the balance sheet an account group belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BalanceSide {
    Assets,
    Liabilities,
}

/// One financial ledger with its nested sync data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Accounting {
    pub number: i32,
    pub name: String,
    pub letter_head_number: i32,
    pub balance_below_zero: BalanceBelowZero,
    pub back_dating_days: i32,
    #[serde(default)]
    pub accounts: Vec<Account>,
    #[serde(default)]
    pub budget_accounts: Vec<BudgetAccount>,
    #[serde(default)]
    pub address_accounts: Vec<AddressAccount>,
    #[serde(default)]
    pub posting_lines: Vec<PostingLine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterHead {
    pub number: i32,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountGroup {
    pub number: i32,
    pub name: String,
    pub balance_side: BalanceSide,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAccountGroup {
    pub number: i32,
    pub name: String,
}

/// Snapshot of one account as of a status date, overwritten on each pull.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub account_number: String,
    pub name: String,
    pub balance: Decimal,
    pub credit_limit: Decimal,
    pub status_date: NaiveDate,
}

/// Budget figures for one status date, kept as trend history on the account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetSnapshot {
    pub status_date: NaiveDate,
    pub budget: Decimal,
    pub posted: Decimal,
}

/// Budget account snapshot plus the archived snapshots that make up its
/// year-over-year trend figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BudgetAccount {
    pub account_number: String,
    pub name: String,
    pub budget: Decimal,
    pub posted: Decimal,
    pub status_date: NaiveDate,
    #[serde(default)]
    pub history: Vec<BudgetSnapshot>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressAccount {
    pub account_number: String,
    pub name: String,
    pub balance: Decimal,
    pub status_date: NaiveDate,
}

/// One journal entry within an accounting.
///
/// `synchronized` stays `false` from local creation until the remote service
/// has acknowledged the entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingLine {
    pub running_number: i32,
    #[serde(with = "posting_date")]
    pub date: NaiveDate,
    pub voucher: Option<String>,
    pub account_number: String,
    pub text: String,
    pub budget_account_number: Option<String>,
    pub debit: Option<Decimal>,
    pub credit: Option<Decimal>,
    pub address_account_number: Option<i32>,
    pub synchronized: bool,
}

/// Reference to one node of the document by entity kind and natural key.
///
/// Validation failures name the offending node through this type, and
/// [`LedgerDocument::remove_node`] strips it before a revalidation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeRef {
    Accounting { number: i32 },
    LetterHead { number: i32 },
    AccountGroup { number: i32 },
    BudgetAccountGroup { number: i32 },
    Account { accounting: i32, account_number: String },
    BudgetAccount { accounting: i32, account_number: String },
    AddressAccount { accounting: i32, account_number: String },
    PostingLine { accounting: i32, running_number: i32 },
}

impl fmt::Display for NodeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeRef::Accounting { number } => write!(f, "accounting #{}", number),
            NodeRef::LetterHead { number } => write!(f, "letter head #{}", number),
            NodeRef::AccountGroup { number } => write!(f, "account group #{}", number),
            NodeRef::BudgetAccountGroup { number } => {
                write!(f, "budget account group #{}", number)
            }
            NodeRef::Account {
                accounting,
                account_number,
            } => write!(f, "account {} in accounting #{}", account_number, accounting),
            NodeRef::BudgetAccount {
                accounting,
                account_number,
            } => write!(
                f,
                "budget account {} in accounting #{}",
                account_number, accounting
            ),
            NodeRef::AddressAccount {
                accounting,
                account_number,
            } => write!(
                f,
                "address account {} in accounting #{}",
                account_number, accounting
            ),
            NodeRef::PostingLine {
                accounting,
                running_number,
            } => write!(
                f,
                "posting line #{} in accounting #{}",
                running_number, accounting
            ),
        }
    }
}

/// The offline ledger document.
///
/// Collections are unordered and keyed by the natural key of each entity
/// kind; upserts overwrite in place and never duplicate a key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerDocument {
    #[serde(default)]
    pub accountings: Vec<Accounting>,
    #[serde(default)]
    pub letter_heads: Vec<LetterHead>,
    #[serde(default)]
    pub account_groups: Vec<AccountGroup>,
    #[serde(default)]
    pub budget_account_groups: Vec<BudgetAccountGroup>,
    /// Timestamp of the last completed full sync, if one ever ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_full_sync: Option<DateTime<Utc>>,
}

impl LedgerDocument {
    /// A fresh, schema-valid skeleton: a root with no children.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.accountings.is_empty()
            && self.letter_heads.is_empty()
            && self.account_groups.is_empty()
            && self.budget_account_groups.is_empty()
            && self.last_full_sync.is_none()
    }

    pub fn accounting(&self, number: i32) -> Option<&Accounting> {
        self.accountings.iter().find(|a| a.number == number)
    }

    pub fn accounting_mut(&mut self, number: i32) -> Option<&mut Accounting> {
        self.accountings.iter_mut().find(|a| a.number == number)
    }

    /// Upsert an accounting. Attributes overwrite in place; the nested sync
    /// collections of an existing accounting are preserved.
    pub fn upsert_accounting(&mut self, accounting: Accounting) {
        match self.accounting_mut(accounting.number) {
            Some(existing) => {
                existing.name = accounting.name;
                existing.letter_head_number = accounting.letter_head_number;
                existing.balance_below_zero = accounting.balance_below_zero;
                existing.back_dating_days = accounting.back_dating_days;
            }
            None => self.accountings.push(accounting),
        }
    }

    pub fn upsert_letter_head(&mut self, letter_head: LetterHead) {
        match self
            .letter_heads
            .iter_mut()
            .find(|l| l.number == letter_head.number)
        {
            Some(existing) => *existing = letter_head,
            None => self.letter_heads.push(letter_head),
        }
    }

    pub fn upsert_account_group(&mut self, group: AccountGroup) {
        match self
            .account_groups
            .iter_mut()
            .find(|g| g.number == group.number)
        {
            Some(existing) => *existing = group,
            None => self.account_groups.push(group),
        }
    }

    pub fn upsert_budget_account_group(&mut self, group: BudgetAccountGroup) {
        match self
            .budget_account_groups
            .iter_mut()
            .find(|g| g.number == group.number)
        {
            Some(existing) => *existing = group,
            None => self.budget_account_groups.push(group),
        }
    }

    /// Upsert an account snapshot under its accounting. The accounting must
    /// already exist; an unknown accounting number is ignored.
    pub fn upsert_account(&mut self, accounting_no: i32, account: Account) {
        if let Some(accounting) = self.accounting_mut(accounting_no) {
            match accounting
                .accounts
                .iter_mut()
                .find(|a| a.account_number == account.account_number)
            {
                Some(existing) => *existing = account,
                None => accounting.accounts.push(account),
            }
        }
    }

    /// Upsert a budget account snapshot.
    ///
    /// A snapshot dated at or after the stored one replaces the current
    /// figures and archives the previous ones; an older-dated snapshot is
    /// recorded into the trend history only. History entries are unique per
    /// status date.
    pub fn upsert_budget_account(&mut self, accounting_no: i32, account: BudgetAccount) {
        let Some(accounting) = self.accounting_mut(accounting_no) else {
            return;
        };
        match accounting
            .budget_accounts
            .iter_mut()
            .find(|a| a.account_number == account.account_number)
        {
            Some(existing) => {
                if account.status_date >= existing.status_date {
                    let archived = BudgetSnapshot {
                        status_date: existing.status_date,
                        budget: existing.budget,
                        posted: existing.posted,
                    };
                    if archived.status_date < account.status_date {
                        Self::record_snapshot(&mut existing.history, archived);
                    }
                    existing.name = account.name;
                    existing.budget = account.budget;
                    existing.posted = account.posted;
                    existing.status_date = account.status_date;
                } else {
                    Self::record_snapshot(
                        &mut existing.history,
                        BudgetSnapshot {
                            status_date: account.status_date,
                            budget: account.budget,
                            posted: account.posted,
                        },
                    );
                }
            }
            None => accounting.budget_accounts.push(account),
        }
    }

    fn record_snapshot(history: &mut Vec<BudgetSnapshot>, snapshot: BudgetSnapshot) {
        match history
            .iter_mut()
            .find(|s| s.status_date == snapshot.status_date)
        {
            Some(existing) => *existing = snapshot,
            None => {
                history.push(snapshot);
                history.sort_by_key(|s| s.status_date);
            }
        }
    }

    pub fn upsert_address_account(&mut self, accounting_no: i32, account: AddressAccount) {
        if let Some(accounting) = self.accounting_mut(accounting_no) {
            match accounting
                .address_accounts
                .iter_mut()
                .find(|a| a.account_number == account.account_number)
            {
                Some(existing) => *existing = account,
                None => accounting.address_accounts.push(account),
            }
        }
    }

    /// Upsert a posting line by (accounting, running number), replacing any
    /// existing line with the same key.
    pub fn upsert_posting_line(&mut self, accounting_no: i32, line: PostingLine) {
        if let Some(accounting) = self.accounting_mut(accounting_no) {
            match accounting
                .posting_lines
                .iter_mut()
                .find(|l| l.running_number == line.running_number)
            {
                Some(existing) => *existing = line,
                None => accounting.posting_lines.push(line),
            }
        }
    }

    /// Merge a posting line pulled from the remote service.
    ///
    /// A local line with the same key that is still pending push is left
    /// untouched; its data and `synchronized` flag win until its own push
    /// confirms.
    pub fn merge_pulled_posting_line(&mut self, accounting_no: i32, line: PostingLine) {
        let Some(accounting) = self.accounting_mut(accounting_no) else {
            return;
        };
        match accounting
            .posting_lines
            .iter_mut()
            .find(|l| l.running_number == line.running_number)
        {
            Some(existing) if !existing.synchronized => {}
            Some(existing) => *existing = line,
            None => accounting.posting_lines.push(line),
        }
    }

    /// Flag a posting line as acknowledged by the remote service.
    pub fn mark_line_synchronized(&mut self, accounting_no: i32, running_number: i32) {
        if let Some(accounting) = self.accounting_mut(accounting_no) {
            if let Some(line) = accounting
                .posting_lines
                .iter_mut()
                .find(|l| l.running_number == running_number)
            {
                line.synchronized = true;
            }
        }
    }

    /// All pending posting lines of an accounting in replay order:
    /// date ascending, then running number ascending.
    pub fn pending_posting_lines(&self, accounting_no: i32) -> Vec<&PostingLine> {
        let mut pending: Vec<&PostingLine> = self
            .accounting(accounting_no)
            .map(|a| a.posting_lines.iter().filter(|l| !l.synchronized).collect())
            .unwrap_or_default();
        pending.sort_by_key(|l| (l.date, l.running_number));
        pending
    }

    /// The next posting line due for replay to the remote service.
    pub fn earliest_pending_line(&self, accounting_no: i32) -> Option<PostingLine> {
        self.pending_posting_lines(accounting_no)
            .first()
            .map(|l| (*l).clone())
    }

    /// Remove the node a validation failure pointed at. Returns whether a
    /// node was actually removed.
    pub fn remove_node(&mut self, node: &NodeRef) -> bool {
        match node {
            NodeRef::Accounting { number } => {
                Self::remove_where(&mut self.accountings, |a| a.number == *number)
            }
            NodeRef::LetterHead { number } => {
                Self::remove_where(&mut self.letter_heads, |l| l.number == *number)
            }
            NodeRef::AccountGroup { number } => {
                Self::remove_where(&mut self.account_groups, |g| g.number == *number)
            }
            NodeRef::BudgetAccountGroup { number } => {
                Self::remove_where(&mut self.budget_account_groups, |g| g.number == *number)
            }
            NodeRef::Account {
                accounting,
                account_number,
            } => self
                .accounting_mut(*accounting)
                .map(|a| {
                    Self::remove_where(&mut a.accounts, |x| &x.account_number == account_number)
                })
                .unwrap_or(false),
            NodeRef::BudgetAccount {
                accounting,
                account_number,
            } => self
                .accounting_mut(*accounting)
                .map(|a| {
                    Self::remove_where(&mut a.budget_accounts, |x| {
                        &x.account_number == account_number
                    })
                })
                .unwrap_or(false),
            NodeRef::AddressAccount {
                accounting,
                account_number,
            } => self
                .accounting_mut(*accounting)
                .map(|a| {
                    Self::remove_where(&mut a.address_accounts, |x| {
                        &x.account_number == account_number
                    })
                })
                .unwrap_or(false),
            NodeRef::PostingLine {
                accounting,
                running_number,
            } => self
                .accounting_mut(*accounting)
                .map(|a| {
                    Self::remove_where(&mut a.posting_lines, |l| {
                        l.running_number == *running_number
                    })
                })
                .unwrap_or(false),
        }
    }

    fn remove_where<T>(items: &mut Vec<T>, predicate: impl Fn(&T) -> bool) -> bool {
        match items.iter().position(|item| predicate(item)) {
            Some(index) => {
                items.remove(index);
                true
            }
            None => false,
        }
    }
}
