//! Wire types for the remote accounting API.

use crate::ledger::document::{
    Accounting, BalanceBelowZero, LetterHead, PostingLine, posting_date,
};
use crate::ledger::sync::remote::{NewEntry, RemoteAccounting};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Error body returned by the API on non-success statuses.
#[derive(Debug, Deserialize)]
pub struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterHeadDto {
    pub number: i32,
    pub name: String,
}

/// An accounting as listed by the API, with its letter head embedded.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountingDto {
    pub number: i32,
    pub name: String,
    pub letter_head: LetterHeadDto,
    pub balance_below_zero: BalanceBelowZero,
    pub back_dating_days: i32,
}

impl From<AccountingDto> for RemoteAccounting {
    fn from(dto: AccountingDto) -> Self {
        RemoteAccounting {
            accounting: Accounting {
                number: dto.number,
                name: dto.name,
                letter_head_number: dto.letter_head.number,
                balance_below_zero: dto.balance_below_zero,
                back_dating_days: dto.back_dating_days,
                accounts: Vec::new(),
                budget_accounts: Vec::new(),
                address_accounts: Vec::new(),
                posting_lines: Vec::new(),
            },
            letter_head: LetterHead {
                number: dto.letter_head.number,
                name: dto.letter_head.name,
            },
        }
    }
}

/// A posting line as returned by the API. Lines coming from the service are
/// acknowledged by definition, so the local `synchronized` flag is set on
/// conversion.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostingLineDto {
    pub running_number: i32,
    #[serde(with = "posting_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub voucher: Option<String>,
    pub account_number: String,
    pub text: String,
    #[serde(default)]
    pub budget_account_number: Option<String>,
    #[serde(default)]
    pub debit: Option<Decimal>,
    #[serde(default)]
    pub credit: Option<Decimal>,
    #[serde(default)]
    pub address_account_number: Option<i32>,
}

impl From<PostingLineDto> for PostingLine {
    fn from(dto: PostingLineDto) -> Self {
        PostingLine {
            running_number: dto.running_number,
            date: dto.date,
            voucher: dto.voucher,
            account_number: dto.account_number,
            text: dto.text,
            budget_account_number: dto.budget_account_number,
            debit: dto.debit,
            credit: dto.credit,
            address_account_number: dto.address_account_number,
            synchronized: true,
        }
    }
}

/// Request body for posting one journal entry.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEntryBody {
    #[serde(with = "posting_date")]
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voucher: Option<String>,
    pub account_number: String,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget_account_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debit: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address_account_number: Option<i32>,
}

impl From<NewEntry> for NewEntryBody {
    fn from(entry: NewEntry) -> Self {
        Self {
            date: entry.date,
            voucher: entry.voucher,
            account_number: entry.account_number,
            text: entry.text,
            budget_account_number: entry.budget_account_number,
            debit: entry.debit,
            credit: entry.credit,
            address_account_number: entry.address_account_number,
        }
    }
}
