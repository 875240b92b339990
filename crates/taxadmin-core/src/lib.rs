#![deny(missing_docs)]

//! # taxadmin-core: Domain Types for the Tax Administration Back Office
//!
//! This crate holds every rule of the back office that can be stated without
//! touching a database or an HTTP request. The API crate composes these
//! pieces with persistence; everything here is synchronous and pure.
//!
//! ## Modules
//!
//! - [`money`]: exact two-place currency backed by `rust_decimal`. Amounts
//!   never pass through binary floating point.
//! - [`status`]: lifecycle enums for returns, payments, refunds, objections,
//!   audits, collections, registrations and service requests.
//! - [`reference`]: prefixed reference numbers (`TX-`, `PMT-`, `REF-`, ...).
//! - [`permissions`]: the user-type policy table and [`PermissionSet`].
//! - [`flagging`]: the ordered auto-flag rules evaluated at filing time.
//! - [`ledger`]: the balance engine. Payment application and refund
//!   decisions are computed here as plans and applied atomically by the
//!   caller.
//! - [`reporting`]: date ranges, calendar-month windows, rate arithmetic.
//! - [`registration`]: taxpayer registration as a tagged union.
//! - [`audit`]: audit status notices and case findings text.
//! - [`calculator`]: indicative tax-due computation per tax type.

pub mod audit;
pub mod calculator;
pub mod error;
pub mod flagging;
pub mod ledger;
pub mod money;
pub mod permissions;
pub mod reference;
pub mod registration;
pub mod reporting;
pub mod status;

pub use error::{LedgerError, ValidationError};
pub use flagging::{FlagInput, FlagOutcome};
pub use ledger::{
    AccountPosition, LedgerPosting, PaymentPlan, PendingPaymentAction, RefundAction, RefundDecision,
};
pub use money::Money;
pub use permissions::{Permission, PermissionPolicy, PermissionSet, UserType};
pub use reference::{ReferenceKind, ReferenceNumber};
pub use registration::{Registration, RegistrationType};
pub use reporting::{DateRange, MonthWindow, ReportKind};
pub use status::{
    AssessmentType, AuditStatus, AuditType, CaseStatus, CollectionStatus, CollectionType,
    LedgerEntryKind, NotificationKind, ObjectionStatus, PaymentMethod, PaymentStatus,
    ObligationStatus, PeriodStatus, RefundStatus, RegistrationStatus, RequestStatus, ReturnStatus,
};
