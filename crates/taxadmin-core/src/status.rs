//! # Lifecycle Enums
//!
//! Every status column in the back office is a closed set of labels. Each
//! enum here serializes as its display label (`"Not Filed"`, `"In Progress"`)
//! so stored rows and API payloads read the same. Parsing also accepts the
//! snake_case spelling (`not_filed`, `in_progress`) for query strings.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::ValidationError;

/// Case-insensitive match of a label against its display or snake_case form.
fn label_matches(label: &str, input: &str) -> bool {
    if label.eq_ignore_ascii_case(input) {
        return true;
    }
    let snake: String = label
        .chars()
        .map(|c| match c {
            ' ' | '-' => '_',
            other => other.to_ascii_lowercase(),
        })
        .collect();
    snake == input.to_ascii_lowercase()
}

macro_rules! labelled_enum {
    (
        $(#[$meta:meta])*
        $name:ident, $kind:literal {
            $( $(#[$vmeta:meta])* $variant:ident => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub enum $name {
            $( $(#[$vmeta])* $variant ),+
        }

        impl $name {
            /// Every variant in declaration order.
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// The display label, as stored in the database.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = ValidationError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let trimmed = s.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| label_matches(v.as_str(), trimmed))
                    .ok_or_else(|| ValidationError::UnknownLabel {
                        kind: $kind,
                        value: s.to_string(),
                    })
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(self.as_str())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

// ── Tax returns ─────────────────────────────────────────────────────────────

labelled_enum! {
    /// Tax return lifecycle. Declaration order is the progression order.
    ReturnStatus, "return status" {
        /// Obligation exists but nothing has been filed.
        NotFiled => "Not Filed",
        /// Self-assessed return received.
        Filed => "Filed",
        /// Officially assessed.
        Assessed => "Assessed",
        /// Due amount reached zero. Terminal.
        Finalized => "Finalized",
    }
}

impl ReturnStatus {
    /// Whether the return has been filed at some point.
    pub fn is_filed(&self) -> bool {
        !matches!(self, Self::NotFiled)
    }

    /// Only filed, not yet finalized returns take payments.
    pub fn accepts_payments(&self) -> bool {
        matches!(self, Self::Filed | Self::Assessed)
    }

    /// Returns against which an objection or audit may be opened.
    pub fn is_contestable(&self) -> bool {
        matches!(self, Self::Filed | Self::Assessed)
    }
}

labelled_enum! {
    /// How the due amount of a return was established.
    AssessmentType, "assessment type" {
        /// Declared by the taxpayer.
        SelfAssessed => "Self",
        /// Raised by the administration.
        Official => "Official",
        /// Estimated in the absence of a return.
        Estimated => "Estimated",
    }
}

// ── Payments ────────────────────────────────────────────────────────────────

labelled_enum! {
    /// Payment lifecycle.
    PaymentStatus, "payment status" {
        /// Recorded, awaiting confirmation.
        Pending => "Pending",
        /// Applied to the return. Irreversible.
        Completed => "Completed",
        /// Declined.
        Failed => "Failed",
        /// Returned to the payer.
        Refunded => "Refunded",
    }
}

labelled_enum! {
    /// Payment channel.
    PaymentMethod, "payment method" {
        /// Bank transfer.
        Bank => "Bank",
        /// Cash at a counter.
        Cash => "Cash",
        /// Online card or wallet payment.
        Online => "Online",
    }
}

// ── Refunds, objections ─────────────────────────────────────────────────────

labelled_enum! {
    /// Refund request lifecycle.
    RefundStatus, "refund status" {
        /// Awaiting a decision.
        Pending => "Pending",
        /// Approved and credited to the ledger.
        Approved => "Approved",
        /// Declined.
        Rejected => "Rejected",
        /// Disbursed.
        Paid => "Paid",
    }
}

labelled_enum! {
    /// Objection lifecycle.
    ObjectionStatus, "objection status" {
        /// Filed, not yet picked up.
        Pending => "Pending",
        /// Under review by an officer.
        InProgress => "In Progress",
        /// Decided in the taxpayer's favour.
        Resolved => "Resolved",
        /// Decided against the taxpayer.
        Rejected => "Rejected",
    }
}

impl ObjectionStatus {
    /// Pending and in-progress objections are still open for a decision.
    pub fn is_open(&self) -> bool {
        matches!(self, Self::Pending | Self::InProgress)
    }
}

// ── Audits ──────────────────────────────────────────────────────────────────

labelled_enum! {
    /// Audit lifecycle.
    AuditStatus, "audit status" {
        /// Scheduled, not started.
        Planned => "Planned",
        /// Fieldwork under way.
        InProgress => "In Progress",
        /// Findings under final review.
        UnderReview => "Under Review",
        /// Closed with findings.
        Completed => "Completed",
        /// Abandoned.
        Cancelled => "Cancelled",
    }
}

labelled_enum! {
    /// Audit scope.
    AuditType, "audit type" {
        /// Document review at the office.
        Desk => "Desk",
        /// On-site visit.
        Field => "Field",
        /// Full examination.
        Comprehensive => "Comprehensive",
    }
}

labelled_enum! {
    /// Audit case lifecycle.
    CaseStatus, "case status" {
        /// Newly opened.
        Open => "Open",
        /// Being worked.
        InProgress => "In Progress",
        /// Closed.
        Closed => "Closed",
    }
}

// ── Collections ─────────────────────────────────────────────────────────────

labelled_enum! {
    /// Collection lifecycle.
    CollectionStatus, "collection status" {
        /// Nothing collected yet.
        Pending => "Pending",
        /// Partly collected.
        Partial => "Partial",
        /// Fully collected.
        Complete => "Complete",
        /// Abandoned as uncollectable.
        WrittenOff => "Written Off",
    }
}

labelled_enum! {
    /// Collection mechanism.
    CollectionType, "collection type" {
        /// Ordinary follow-up.
        Regular => "Regular",
        /// Enforced recovery.
        Enforcement => "Enforcement",
        /// Instalment plan.
        Installment => "Installment",
    }
}

// ── Ledger, notifications ───────────────────────────────────────────────────

labelled_enum! {
    /// Taxpayer ledger transaction type.
    LedgerEntryKind, "ledger entry kind" {
        /// Tax assessed (debit).
        Assessment => "Assessment",
        /// Payment received (credit).
        Payment => "Payment",
        /// Overpayment carried as credit.
        Credit => "Credit",
        /// Approved refund (credit).
        Refund => "Refund",
    }
}

labelled_enum! {
    /// Notification category, used by clients for styling.
    NotificationKind, "notification kind" {
        /// Neutral information.
        Info => "Info",
        /// Positive outcome.
        Success => "Success",
        /// Needs attention.
        Warning => "Warning",
        /// Needs action.
        Alert => "Alert",
        /// Negative outcome.
        Danger => "Danger",
        /// Tax filing activity.
        Tax => "Tax",
    }
}

// ── Registrations, requests, periods, obligations ───────────────────────────

labelled_enum! {
    /// Taxpayer registration decision state.
    RegistrationStatus, "registration status" {
        /// Submitted, awaiting review.
        Pending => "Pending",
        /// Accepted.
        Approved => "Approved",
        /// Declined.
        Rejected => "Rejected",
    }
}

labelled_enum! {
    /// Service request lifecycle.
    RequestStatus, "request status" {
        /// Submitted.
        Pending => "Pending",
        /// Being handled.
        InProgress => "In Progress",
        /// Done.
        Completed => "Completed",
        /// Declined.
        Rejected => "Rejected",
    }
}

labelled_enum! {
    /// Tax period state.
    PeriodStatus, "period status" {
        /// Accepting returns.
        Open => "Open",
        /// No longer accepting returns.
        Closed => "Closed",
        /// Due date extended.
        Extended => "Extended",
    }
}

labelled_enum! {
    /// Account registration for a tax type.
    ObligationStatus, "obligation status" {
        /// Returns are expected.
        Active => "Active",
        /// Ended.
        Inactive => "Inactive",
        /// Temporarily paused.
        Suspended => "Suspended",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_roundtrip_through_from_str() {
        for s in ReturnStatus::ALL {
            assert_eq!(s.as_str().parse::<ReturnStatus>().unwrap(), *s);
        }
        for s in AuditStatus::ALL {
            assert_eq!(s.as_str().parse::<AuditStatus>().unwrap(), *s);
        }
    }

    #[test]
    fn snake_case_and_case_insensitive_parse() {
        assert_eq!("not_filed".parse::<ReturnStatus>().unwrap(), ReturnStatus::NotFiled);
        assert_eq!("in_progress".parse::<ObjectionStatus>().unwrap(), ObjectionStatus::InProgress);
        assert_eq!("under review".parse::<AuditStatus>().unwrap(), AuditStatus::UnderReview);
        assert_eq!("written_off".parse::<CollectionStatus>().unwrap(), CollectionStatus::WrittenOff);
        assert_eq!("self".parse::<AssessmentType>().unwrap(), AssessmentType::SelfAssessed);
    }

    #[test]
    fn unknown_label_names_the_kind() {
        let err = "Archived".parse::<RefundStatus>().unwrap_err();
        assert_eq!(
            err,
            ValidationError::UnknownLabel {
                kind: "refund status",
                value: "Archived".to_string()
            }
        );
    }

    #[test]
    fn serde_uses_display_label() {
        let json = serde_json::to_string(&AuditStatus::UnderReview).unwrap();
        assert_eq!(json, "\"Under Review\"");
        let back: AuditStatus = serde_json::from_str("\"in_progress\"").unwrap();
        assert_eq!(back, AuditStatus::InProgress);
        assert!(serde_json::from_str::<AuditStatus>("\"Paused\"").is_err());
    }

    #[test]
    fn return_status_order_is_progression() {
        assert!(ReturnStatus::NotFiled < ReturnStatus::Filed);
        assert!(ReturnStatus::Filed < ReturnStatus::Assessed);
        assert!(ReturnStatus::Assessed < ReturnStatus::Finalized);
    }

    #[test]
    fn return_status_predicates() {
        assert!(!ReturnStatus::NotFiled.accepts_payments());
        assert!(ReturnStatus::Filed.accepts_payments());
        assert!(ReturnStatus::Assessed.accepts_payments());
        assert!(!ReturnStatus::Finalized.accepts_payments());
        assert!(ReturnStatus::Finalized.is_filed());
        assert!(!ReturnStatus::Finalized.is_contestable());
    }

    #[test]
    fn objection_open_states() {
        assert!(ObjectionStatus::Pending.is_open());
        assert!(ObjectionStatus::InProgress.is_open());
        assert!(!ObjectionStatus::Resolved.is_open());
        assert!(!ObjectionStatus::Rejected.is_open());
    }
}
