//! # Balance Engine
//!
//! Pure computations behind every write that moves money on a tax return or
//! an account ledger. Nothing here touches storage: the API layer asks for a
//! plan, turns it into a change set, and commits the change set atomically.
//!
//! ## Payment application
//!
//! [`PaymentPlan::compute`] is the single payment-apply rule used by both the
//! self-service path and the approval of pending payments:
//!
//! - amount above the due amount: due becomes zero, the return finalizes,
//!   and the excess is carried as an overpayment credit;
//! - otherwise due drops by the amount and the return finalizes only when
//!   the new due amount is exactly zero.
//!
//! Status never moves backwards.
//!
//! ## Running balance
//!
//! [`AccountPosition`] tracks the last entry number and balance of one
//! account's ledger. Each posting adds its debit and subtracts its credit.
//! A memo posting ([`AccountPosition::memo_credit`]) records a credit that
//! an earlier line already counted, such as the overpayment share of a
//! payment, and carries the balance forward unchanged.

use crate::error::LedgerError;
use crate::money::Money;
use crate::status::{LedgerEntryKind, PaymentStatus, RefundStatus, ReturnStatus};

// ── Payments ────────────────────────────────────────────────────────────────

/// Effect of applying one completed payment to a tax return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaymentPlan {
    /// The payment amount.
    pub amount: Money,
    /// Due amount before the payment.
    pub previous_due: Money,
    /// Due amount after the payment. Never negative.
    pub new_due: Money,
    /// Return status after the payment.
    pub new_status: ReturnStatus,
    /// Excess over the due amount, carried to the account as a credit.
    pub overpayment: Option<Money>,
}

impl PaymentPlan {
    /// Plan the application of `amount` to a return with `due` outstanding.
    ///
    /// Fails when the amount is not positive or the return does not accept
    /// payments (not filed yet, or already finalized).
    pub fn compute(due: Money, status: ReturnStatus, amount: Money) -> Result<Self, LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::NonPositiveAmount(amount.to_string()));
        }
        if !status.accepts_payments() {
            return Err(LedgerError::ReturnNotPayable {
                status: status.to_string(),
            });
        }

        if amount > due {
            return Ok(Self {
                amount,
                previous_due: due,
                new_due: Money::ZERO,
                new_status: ReturnStatus::Finalized,
                overpayment: Some(amount - due),
            });
        }

        let new_due = due.less_floor_zero(amount);
        let new_status = if new_due.is_zero() {
            ReturnStatus::Finalized
        } else {
            status
        };
        Ok(Self {
            amount,
            previous_due: due,
            new_due,
            new_status,
            overpayment: None,
        })
    }

    /// Whether this payment closes the return.
    pub fn finalizes(&self) -> bool {
        self.new_status == ReturnStatus::Finalized
    }
}

/// Decision on a payment awaiting confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PendingPaymentAction {
    /// Confirm and apply to the return.
    Approve,
    /// Mark as failed. The return is untouched.
    Decline,
}

impl PendingPaymentAction {
    /// Past-tense verb used in messages.
    pub fn verb(&self) -> &'static str {
        match self {
            Self::Approve => "approved",
            Self::Decline => "declined",
        }
    }

    /// Status the payment ends in.
    pub fn resulting_status(&self) -> PaymentStatus {
        match self {
            Self::Approve => PaymentStatus::Completed,
            Self::Decline => PaymentStatus::Failed,
        }
    }

    /// Only pending payments may be decided.
    pub fn check(&self, current: PaymentStatus) -> Result<(), LedgerError> {
        if current == PaymentStatus::Pending {
            Ok(())
        } else {
            Err(LedgerError::PaymentNotPending {
                status: current.to_string(),
                action: self.verb(),
            })
        }
    }
}

// ── Ledger postings ─────────────────────────────────────────────────────────

/// One computed ledger line, ready to be stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerPosting {
    /// Sequence number within the account, starting at 1.
    pub entry_no: i64,
    /// Transaction type.
    pub kind: LedgerEntryKind,
    /// Amount owed by the taxpayer.
    pub debit: Money,
    /// Amount in the taxpayer's favour.
    pub credit: Money,
    /// Running balance after this line.
    pub balance: Money,
}

/// The tail of one account's ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AccountPosition {
    /// Entry number of the last posting, 0 when the ledger is empty.
    pub last_entry_no: i64,
    /// Balance after the last posting.
    pub balance: Money,
}

impl AccountPosition {
    /// Resume from a stored tail.
    pub fn new(last_entry_no: i64, balance: Money) -> Self {
        Self {
            last_entry_no,
            balance,
        }
    }

    /// Append a line and advance the position.
    pub fn post(&mut self, kind: LedgerEntryKind, debit: Money, credit: Money) -> LedgerPosting {
        self.last_entry_no += 1;
        self.balance = self.balance + debit - credit;
        LedgerPosting {
            entry_no: self.last_entry_no,
            kind,
            debit,
            credit,
            balance: self.balance,
        }
    }

    /// Append a debit.
    pub fn debit(&mut self, kind: LedgerEntryKind, amount: Money) -> LedgerPosting {
        self.post(kind, amount, Money::ZERO)
    }

    /// Append a credit.
    pub fn credit(&mut self, kind: LedgerEntryKind, amount: Money) -> LedgerPosting {
        self.post(kind, Money::ZERO, amount)
    }

    /// Append a credit line that leaves the balance where it is.
    pub fn memo_credit(&mut self, kind: LedgerEntryKind, amount: Money) -> LedgerPosting {
        self.last_entry_no += 1;
        LedgerPosting {
            entry_no: self.last_entry_no,
            kind,
            debit: Money::ZERO,
            credit: amount,
            balance: self.balance,
        }
    }
}

// ── Refunds ─────────────────────────────────────────────────────────────────

/// Officer decision on a refund request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundAction {
    /// Accept and credit the ledger.
    Approve,
    /// Decline without a ledger entry.
    Reject,
}

/// What a refund decision does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefundDecision {
    /// The refund moves to `status`; `ledger_credit` is posted when present.
    Applied {
        /// New refund status.
        status: RefundStatus,
        /// Refund-type credit to post, for approvals.
        ledger_credit: Option<Money>,
    },
    /// The refund was already decided. Nothing changes.
    AlreadyProcessed {
        /// The status it was found in.
        status: RefundStatus,
    },
}

impl RefundAction {
    /// Decide a refund currently in `status` for `amount`.
    pub fn decide(&self, status: RefundStatus, amount: Money) -> RefundDecision {
        if status != RefundStatus::Pending {
            return RefundDecision::AlreadyProcessed { status };
        }
        match self {
            Self::Approve => RefundDecision::Applied {
                status: RefundStatus::Approved,
                ledger_credit: Some(amount),
            },
            Self::Reject => RefundDecision::Applied {
                status: RefundStatus::Rejected,
                ledger_credit: None,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn m(major: i64) -> Money {
        Money::from_major(major)
    }

    #[test]
    fn overpayment_finalizes_and_credits_excess() {
        let plan = PaymentPlan::compute(m(100), ReturnStatus::Filed, m(150)).unwrap();
        assert_eq!(plan.new_due, Money::ZERO);
        assert_eq!(plan.new_status, ReturnStatus::Finalized);
        assert_eq!(plan.overpayment, Some(m(50)));
    }

    #[test]
    fn exact_payment_finalizes_without_credit() {
        let plan = PaymentPlan::compute(m(200), ReturnStatus::Filed, m(200)).unwrap();
        assert_eq!(plan.new_due, Money::ZERO);
        assert!(plan.finalizes());
        assert_eq!(plan.overpayment, None);
    }

    #[test]
    fn partial_payment_keeps_status() {
        let plan = PaymentPlan::compute(m(300), ReturnStatus::Filed, m(100)).unwrap();
        assert_eq!(plan.new_due, m(200));
        assert_eq!(plan.new_status, ReturnStatus::Filed);

        let plan = PaymentPlan::compute(m(300), ReturnStatus::Assessed, m(100)).unwrap();
        assert_eq!(plan.new_status, ReturnStatus::Assessed);
    }

    #[test]
    fn unpayable_returns_are_rejected() {
        for status in [ReturnStatus::NotFiled, ReturnStatus::Finalized] {
            let err = PaymentPlan::compute(m(100), status, m(10)).unwrap_err();
            assert!(matches!(err, LedgerError::ReturnNotPayable { .. }), "{status}");
        }
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        assert!(matches!(
            PaymentPlan::compute(m(100), ReturnStatus::Filed, Money::ZERO),
            Err(LedgerError::NonPositiveAmount(_))
        ));
        assert!(PaymentPlan::compute(m(100), ReturnStatus::Filed, m(-5)).is_err());
    }

    #[test]
    fn pending_payment_guard() {
        assert!(PendingPaymentAction::Approve.check(PaymentStatus::Pending).is_ok());
        let err = PendingPaymentAction::Decline
            .check(PaymentStatus::Completed)
            .unwrap_err();
        assert_eq!(err.to_string(), "payment in status 'Completed' cannot be declined");
        assert_eq!(
            PendingPaymentAction::Approve.resulting_status(),
            PaymentStatus::Completed
        );
    }

    #[test]
    fn running_balance_accumulates() {
        let mut pos = AccountPosition::default();
        let a = pos.debit(LedgerEntryKind::Assessment, m(100));
        let p = pos.credit(LedgerEntryKind::Payment, m(150));
        let r = pos.credit(LedgerEntryKind::Refund, m(20));
        assert_eq!((a.entry_no, a.balance), (1, m(100)));
        assert_eq!((p.entry_no, p.balance), (2, m(-50)));
        assert_eq!((r.entry_no, r.balance), (3, m(-70)));
        assert_eq!(pos, AccountPosition::new(3, m(-70)));
    }

    #[test]
    fn overpayment_memo_keeps_balance_at_assessed_less_paid() {
        let mut pos = AccountPosition::default();
        pos.debit(LedgerEntryKind::Assessment, m(100));
        pos.credit(LedgerEntryKind::Payment, m(150));
        let c = pos.memo_credit(LedgerEntryKind::Credit, m(50));
        assert_eq!((c.entry_no, c.credit, c.balance), (3, m(50), m(-50)));
        assert_eq!(pos, AccountPosition::new(3, m(-50)));
    }

    #[test]
    fn refund_decisions() {
        assert_eq!(
            RefundAction::Approve.decide(RefundStatus::Pending, m(75)),
            RefundDecision::Applied {
                status: RefundStatus::Approved,
                ledger_credit: Some(m(75)),
            }
        );
        assert_eq!(
            RefundAction::Reject.decide(RefundStatus::Pending, m(75)),
            RefundDecision::Applied {
                status: RefundStatus::Rejected,
                ledger_credit: None,
            }
        );
    }

    #[test]
    fn refund_decision_is_idempotent() {
        for status in [RefundStatus::Approved, RefundStatus::Rejected, RefundStatus::Paid] {
            assert_eq!(
                RefundAction::Approve.decide(status, m(75)),
                RefundDecision::AlreadyProcessed { status }
            );
        }
    }

    proptest! {
        #[test]
        fn due_never_negative_and_finalized_iff_zero(
            due in 0i64..10_000_000,
            payments in proptest::collection::vec(1i64..5_000_000, 1..8),
        ) {
            let mut due = Money::from_minor(due);
            let mut status = ReturnStatus::Filed;
            for p in payments {
                let amount = Money::from_minor(p);
                match PaymentPlan::compute(due, status, amount) {
                    Ok(plan) => {
                        prop_assert!(!plan.new_due.is_negative());
                        prop_assert_eq!(plan.finalizes(), plan.new_due.is_zero());
                        let credited = plan.overpayment.unwrap_or(Money::ZERO);
                        prop_assert_eq!(plan.previous_due - plan.new_due + credited, amount);
                        due = plan.new_due;
                        status = plan.new_status;
                    }
                    Err(LedgerError::ReturnNotPayable { .. }) => {
                        prop_assert_eq!(status, ReturnStatus::Finalized);
                    }
                    Err(other) => prop_assert!(false, "unexpected error {other}"),
                }
            }
        }

        #[test]
        fn overpayment_equals_excess(due in 0i64..1_000_000, extra in 1i64..1_000_000) {
            let plan = PaymentPlan::compute(
                Money::from_minor(due),
                ReturnStatus::Filed,
                Money::from_minor(due + extra),
            ).unwrap();
            prop_assert_eq!(plan.overpayment, Some(Money::from_minor(extra)));
        }
    }
}
