//! Structural schema for the offline ledger document.
//!
//! The schema is a statically declared description of every entity kind in
//! the document: integer ranges, string-length bounds and key uniqueness.
//! It is built once on first use and cached for the lifetime of the process.
//! Validation is structural and value-range based only; business rules live
//! elsewhere. A failure names the offending node and attribute so the caller
//! can either reject the whole operation or strip the node and revalidate
//! once.

use crate::ledger::document::{Accounting, LedgerDocument, NodeRef, PostingLine};
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::OnceLock;

/// A mutation would leave the document schema-invalid.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{node}: {field} {rule}")]
pub struct ValidationError {
    /// The node that violated the schema.
    pub node: NodeRef,
    /// The attribute that violated its rule.
    pub field: &'static str,
    /// Human-readable rule text.
    pub rule: String,
}

/// Closed integer range, inclusive on both ends.
#[derive(Debug, Clone, Copy)]
pub struct IntRange {
    pub min: i64,
    pub max: i64,
}

impl IntRange {
    const fn new(min: i64, max: i64) -> Self {
        Self { min, max }
    }

    fn check(&self, value: i64) -> Result<(), String> {
        if value < self.min || value > self.max {
            Err(format!(
                "must be between {} and {}, was {}",
                self.min, self.max, value
            ))
        } else {
            Ok(())
        }
    }
}

/// Length bounds for a string attribute, in characters.
#[derive(Debug, Clone, Copy)]
pub struct TextRule {
    pub min_len: usize,
    pub max_len: usize,
}

impl TextRule {
    const fn new(min_len: usize, max_len: usize) -> Self {
        Self { min_len, max_len }
    }

    fn check(&self, value: &str) -> Result<(), String> {
        let len = value.chars().count();
        if len < self.min_len || len > self.max_len {
            Err(format!(
                "length must be between {} and {} characters, was {}",
                self.min_len, self.max_len, len
            ))
        } else {
            Ok(())
        }
    }
}

/// The compiled document schema.
///
/// Obtain the process-wide instance through [`DocumentSchema::shared`].
#[derive(Debug)]
pub struct DocumentSchema {
    accounting_number: IntRange,
    letter_head_number: IntRange,
    group_number: IntRange,
    back_dating_days: IntRange,
    running_number: IntRange,
    address_account_ref: IntRange,
    entity_name: TextRule,
    account_number: TextRule,
    posting_text: TextRule,
    voucher: TextRule,
}

static SCHEMA: OnceLock<DocumentSchema> = OnceLock::new();

impl DocumentSchema {
    /// The cached schema, built on first use.
    pub fn shared() -> &'static DocumentSchema {
        SCHEMA.get_or_init(DocumentSchema::build)
    }

    fn build() -> Self {
        Self {
            accounting_number: IntRange::new(1, 99),
            letter_head_number: IntRange::new(1, 99),
            group_number: IntRange::new(1, 99),
            back_dating_days: IntRange::new(0, 365),
            running_number: IntRange::new(1, i64::from(i32::MAX)),
            address_account_ref: IntRange::new(1, i64::from(i32::MAX)),
            entity_name: TextRule::new(1, 256),
            account_number: TextRule::new(1, 16),
            posting_text: TextRule::new(1, 256),
            voucher: TextRule::new(1, 64),
        }
    }

    /// Validate a candidate document against the schema.
    ///
    /// Stops at the first violation and reports the offending node, attribute
    /// and rule.
    pub fn validate(&self, document: &LedgerDocument) -> Result<(), ValidationError> {
        self.validate_letter_heads(document)?;
        self.validate_groups(document)?;
        self.validate_accountings(document)?;
        Ok(())
    }

    fn validate_letter_heads(&self, document: &LedgerDocument) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for letter_head in &document.letter_heads {
            let node = NodeRef::LetterHead {
                number: letter_head.number,
            };
            if !seen.insert(letter_head.number) {
                return Err(duplicate(node));
            }
            check_int(&node, "number", &self.letter_head_number, letter_head.number)?;
            check_text(&node, "name", &self.entity_name, &letter_head.name)?;
        }
        Ok(())
    }

    fn validate_groups(&self, document: &LedgerDocument) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for group in &document.account_groups {
            let node = NodeRef::AccountGroup {
                number: group.number,
            };
            if !seen.insert(group.number) {
                return Err(duplicate(node));
            }
            check_int(&node, "number", &self.group_number, group.number)?;
            check_text(&node, "name", &self.entity_name, &group.name)?;
        }

        let mut seen = HashSet::new();
        for group in &document.budget_account_groups {
            let node = NodeRef::BudgetAccountGroup {
                number: group.number,
            };
            if !seen.insert(group.number) {
                return Err(duplicate(node));
            }
            check_int(&node, "number", &self.group_number, group.number)?;
            check_text(&node, "name", &self.entity_name, &group.name)?;
        }
        Ok(())
    }

    fn validate_accountings(&self, document: &LedgerDocument) -> Result<(), ValidationError> {
        let mut seen = HashSet::new();
        for accounting in &document.accountings {
            let node = NodeRef::Accounting {
                number: accounting.number,
            };
            if !seen.insert(accounting.number) {
                return Err(duplicate(node));
            }
            check_int(&node, "number", &self.accounting_number, accounting.number)?;
            check_text(&node, "name", &self.entity_name, &accounting.name)?;
            check_int(
                &node,
                "letterHeadNumber",
                &self.letter_head_number,
                accounting.letter_head_number,
            )?;
            check_int(
                &node,
                "backDatingDays",
                &self.back_dating_days,
                accounting.back_dating_days,
            )?;

            self.validate_nested(accounting)?;
        }
        Ok(())
    }

    fn validate_nested(&self, accounting: &Accounting) -> Result<(), ValidationError> {
        let owner = accounting.number;

        let mut seen = HashSet::new();
        for account in &accounting.accounts {
            let node = NodeRef::Account {
                accounting: owner,
                account_number: account.account_number.clone(),
            };
            if !seen.insert(account.account_number.clone()) {
                return Err(duplicate(node));
            }
            check_text(&node, "accountNumber", &self.account_number, &account.account_number)?;
            check_text(&node, "name", &self.entity_name, &account.name)?;
        }

        let mut seen = HashSet::new();
        for account in &accounting.budget_accounts {
            let node = NodeRef::BudgetAccount {
                accounting: owner,
                account_number: account.account_number.clone(),
            };
            if !seen.insert(account.account_number.clone()) {
                return Err(duplicate(node));
            }
            check_text(&node, "accountNumber", &self.account_number, &account.account_number)?;
            check_text(&node, "name", &self.entity_name, &account.name)?;
        }

        let mut seen = HashSet::new();
        for account in &accounting.address_accounts {
            let node = NodeRef::AddressAccount {
                accounting: owner,
                account_number: account.account_number.clone(),
            };
            if !seen.insert(account.account_number.clone()) {
                return Err(duplicate(node));
            }
            check_text(&node, "accountNumber", &self.account_number, &account.account_number)?;
            check_text(&node, "name", &self.entity_name, &account.name)?;
        }

        let mut seen = HashSet::new();
        for line in &accounting.posting_lines {
            let node = NodeRef::PostingLine {
                accounting: owner,
                running_number: line.running_number,
            };
            if !seen.insert(line.running_number) {
                return Err(duplicate(node));
            }
            self.validate_posting_line(&node, line)?;
        }
        Ok(())
    }

    fn validate_posting_line(
        &self,
        node: &NodeRef,
        line: &PostingLine,
    ) -> Result<(), ValidationError> {
        check_int(node, "runningNumber", &self.running_number, line.running_number)?;
        check_text(node, "accountNumber", &self.account_number, &line.account_number)?;
        check_text(node, "text", &self.posting_text, &line.text)?;
        if let Some(voucher) = &line.voucher {
            check_text(node, "voucher", &self.voucher, voucher)?;
        }
        if let Some(budget_account) = &line.budget_account_number {
            check_text(node, "budgetAccountNumber", &self.account_number, budget_account)?;
        }
        check_amount(node, "debit", line.debit)?;
        check_amount(node, "credit", line.credit)?;
        if let Some(address_account) = line.address_account_number {
            check_int(node, "addressAccountNumber", &self.address_account_ref, address_account)?;
        }
        Ok(())
    }
}

fn duplicate(node: NodeRef) -> ValidationError {
    ValidationError {
        node,
        field: "key",
        rule: "duplicates another node of the same kind".to_string(),
    }
}

fn check_int(
    node: &NodeRef,
    field: &'static str,
    range: &IntRange,
    value: i32,
) -> Result<(), ValidationError> {
    range.check(i64::from(value)).map_err(|rule| ValidationError {
        node: node.clone(),
        field,
        rule,
    })
}

fn check_text(
    node: &NodeRef,
    field: &'static str,
    rule: &TextRule,
    value: &str,
) -> Result<(), ValidationError> {
    rule.check(value).map_err(|rule| ValidationError {
        node: node.clone(),
        field,
        rule,
    })
}

fn check_amount(
    node: &NodeRef,
    field: &'static str,
    amount: Option<Decimal>,
) -> Result<(), ValidationError> {
    match amount {
        Some(value) if value < Decimal::ZERO => Err(ValidationError {
            node: node.clone(),
            field,
            rule: format!("must not be negative, was {}", value),
        }),
        _ => Ok(()),
    }
}
