//! # Error Hierarchy
//!
//! Structured error types for the domain layer, built with `thiserror`.
//! The API crate maps [`ValidationError`] to 422 responses and
//! [`LedgerError`] to 409/422 depending on the variant.

use thiserror::Error;

/// Domain primitive validation failure.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The text could not be parsed as a decimal amount.
    #[error("invalid amount '{0}': expected a decimal number with at most 2 fractional digits")]
    InvalidAmount(String),

    /// The amount exceeds the `NUMERIC(14,2)` column range.
    #[error("amount '{0}' is out of range")]
    AmountOutOfRange(String),

    /// Floating-point JSON numbers are refused for currency.
    #[error("amounts must be given as decimal strings or integers, not floating-point numbers")]
    FloatAmount,

    /// An amount that must be strictly positive was zero or negative.
    #[error("{field} must be greater than zero")]
    NonPositiveAmount {
        /// Name of the offending field.
        field: &'static str,
    },

    /// An amount that must be non-negative was negative.
    #[error("{field} must not be negative")]
    NegativeAmount {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A status or enum label did not match any known variant.
    #[error("unknown {kind} '{value}'")]
    UnknownLabel {
        /// The enum being parsed (e.g. "return status").
        kind: &'static str,
        /// The rejected input.
        value: String,
    },

    /// A reference number was malformed.
    #[error("invalid reference number '{0}'")]
    InvalidReference(String),

    /// A required field was empty.
    #[error("{0} is required")]
    Required(&'static str),

    /// A field exceeded its maximum length.
    #[error("{field} must not exceed {max} characters")]
    TooLong {
        /// Name of the offending field.
        field: &'static str,
        /// Maximum permitted length.
        max: usize,
    },

    /// A date range ended before it started.
    #[error("start date {start} is after end date {end}")]
    InvertedRange {
        /// Range start as written.
        start: String,
        /// Range end as written.
        end: String,
    },
}

/// Balance-engine rejection. The caller's state is untouched when these occur.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Payments and refunds must move a positive amount.
    #[error("amount must be greater than zero, got {0}")]
    NonPositiveAmount(String),

    /// The return is not in a state that accepts payments.
    #[error("tax return in status '{status}' cannot accept payments")]
    ReturnNotPayable {
        /// Current status label.
        status: String,
    },

    /// The payment is not awaiting approval.
    #[error("payment in status '{status}' cannot be {action}")]
    PaymentNotPending {
        /// Current status label.
        status: String,
        /// The attempted action ("approved" or "declined").
        action: &'static str,
    },
}
