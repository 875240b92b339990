//! # Taxpayer Ledger Writer
//!
//! Appends lines to one account's ledger inside a change set. The writer
//! starts from the tail stored on the account row (`last_entry_no`,
//! `ledger_balance`), numbers each line, keeps the running balance, and on
//! [`finish`](LedgerWriter::finish) writes the new tail back through a
//! version-guarded account update. Two operations that post to the same
//! account therefore cannot both commit from the same tail.

use chrono::Utc;
use taxadmin_core::{AccountPosition, LedgerEntryKind, LedgerPosting, Money};
use uuid::Uuid;

use crate::changeset::ChangeSet;
use crate::records::{AccountRecord, LedgerEntryRecord};

use super::today;

/// What a line is about.
#[derive(Debug, Clone)]
pub struct LedgerLine {
    pub tax_type_id: Option<Uuid>,
    pub tax_period_id: Option<Uuid>,
    pub description: String,
    pub reference_number: Option<String>,
}

#[derive(Debug)]
pub struct LedgerWriter {
    account: AccountRecord,
    position: AccountPosition,
    entries: Vec<LedgerEntryRecord>,
}

impl LedgerWriter {
    /// Resume from the account's stored tail. The account must have been
    /// read under its row lock.
    pub fn open(account: AccountRecord) -> Self {
        let position = AccountPosition::new(account.last_entry_no, account.ledger_balance);
        Self {
            account,
            position,
            entries: Vec::new(),
        }
    }

    pub fn debit(&mut self, kind: LedgerEntryKind, amount: Money, line: LedgerLine) -> &LedgerEntryRecord {
        self.post(kind, amount, Money::ZERO, line)
    }

    pub fn credit(&mut self, kind: LedgerEntryKind, amount: Money, line: LedgerLine) -> &LedgerEntryRecord {
        self.post(kind, Money::ZERO, amount, line)
    }

    /// Credit line already counted by an earlier line of the same change
    /// set. The balance is carried forward.
    pub fn memo_credit(&mut self, kind: LedgerEntryKind, amount: Money, line: LedgerLine) -> &LedgerEntryRecord {
        let posting = self.position.memo_credit(kind, amount);
        self.record(posting, line)
    }

    fn post(&mut self, kind: LedgerEntryKind, debit: Money, credit: Money, line: LedgerLine) -> &LedgerEntryRecord {
        let posting = self.position.post(kind, debit, credit);
        self.record(posting, line)
    }

    fn record(&mut self, posting: LedgerPosting, line: LedgerLine) -> &LedgerEntryRecord {
        let index = self.entries.len();
        self.entries.push(LedgerEntryRecord {
            id: Uuid::new_v4(),
            account_id: self.account.id,
            entry_no: posting.entry_no,
            tax_type_id: line.tax_type_id,
            tax_period_id: line.tax_period_id,
            transaction_date: today(),
            transaction_type: posting.kind,
            description: line.description,
            debit_amount: posting.debit,
            credit_amount: posting.credit,
            balance: posting.balance,
            reference_number: line.reference_number,
            created_at: Utc::now(),
        });
        &self.entries[index]
    }

    /// Running balance after the last line posted so far.
    pub fn balance(&self) -> Money {
        self.position.balance
    }

    /// Queue every line and the account's new tail. Returns the lines.
    pub fn finish(self, cs: &mut ChangeSet) -> Vec<LedgerEntryRecord> {
        if self.entries.is_empty() {
            return self.entries;
        }
        for entry in &self.entries {
            cs.put(entry.clone());
        }
        let mut account = self.account;
        account.last_entry_no = self.position.last_entry_no;
        account.ledger_balance = self.position.balance;
        cs.update_account(account);
        self.entries
    }
}
