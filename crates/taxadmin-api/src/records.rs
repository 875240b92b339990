//! # Stored Records
//!
//! One struct per table. These are the rows held in the in-memory stores
//! and written through to PostgreSQL. Money columns are [`Money`] and every
//! status column is a closed enum from `taxadmin-core`, so a record can only
//! ever hold a label the lifecycle knows about.

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use taxadmin_core::registration::Registration;
use taxadmin_core::{
    AssessmentType, AuditStatus, AuditType, CaseStatus, CollectionStatus, CollectionType,
    LedgerEntryKind, Money, NotificationKind, ObjectionStatus, ObligationStatus, PaymentMethod,
    PaymentStatus, PeriodStatus, RefundStatus, RegistrationStatus, RequestStatus, ReturnStatus,
};

// -- Identity -----------------------------------------------------------------

/// A row of the user type directory.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserTypeRecord {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// A back office or taxpayer user.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserRecord {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub user_type_id: Option<Uuid>,
    pub is_admin: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// -- Catalog ------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaxTypeRecord {
    pub id: Uuid,
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub is_core: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaxPeriodRecord {
    pub id: Uuid,
    pub tax_type_id: Uuid,
    pub period_code: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub due_date: NaiveDate,
    #[schema(value_type = String)]
    pub status: PeriodStatus,
}

// -- Accounts -----------------------------------------------------------------

/// A taxpayer account. The ledger tail (`last_entry_no`, `ledger_balance`)
/// lives on the account row so that posting under the account lock sees a
/// consistent position.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AccountRecord {
    pub id: Uuid,
    pub account_number: String,
    pub name: String,
    pub user_id: Uuid,
    pub is_active: bool,
    #[schema(value_type = String)]
    pub ledger_balance: Money,
    pub last_entry_no: i64,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ObligationRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tax_type_id: Uuid,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = String)]
    pub status: ObligationStatus,
    pub registration_date: NaiveDate,
}

/// One line of an account's ledger.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LedgerEntryRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub entry_no: i64,
    pub tax_type_id: Option<Uuid>,
    pub tax_period_id: Option<Uuid>,
    pub transaction_date: NaiveDate,
    #[schema(value_type = String)]
    pub transaction_type: LedgerEntryKind,
    pub description: String,
    #[schema(value_type = String)]
    pub debit_amount: Money,
    #[schema(value_type = String)]
    pub credit_amount: Money,
    #[schema(value_type = String)]
    pub balance: Money,
    pub reference_number: Option<String>,
    pub created_at: DateTime<Utc>,
}

// -- Returns and money movements ----------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct TaxReturnRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tax_type_id: Uuid,
    pub tax_period_id: Uuid,
    pub reference_number: String,
    pub filing_date: Option<DateTime<Utc>>,
    #[schema(value_type = String)]
    pub due_amount: Money,
    #[schema(value_type = String)]
    pub status: ReturnStatus,
    pub assessment_date: Option<DateTime<Utc>>,
    #[schema(value_type = Option<String>)]
    pub assessment_type: Option<AssessmentType>,
    pub is_flagged: bool,
    pub flag_reason: Option<String>,
    pub filed_by: Option<Uuid>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentRecord {
    pub id: Uuid,
    pub tax_return_id: Uuid,
    pub account_id: Uuid,
    pub collection_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub amount: Money,
    pub payment_date: DateTime<Utc>,
    #[schema(value_type = String)]
    pub payment_method: PaymentMethod,
    pub reference_number: String,
    #[schema(value_type = String)]
    pub status: PaymentStatus,
    pub recorded_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RefundRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    #[schema(value_type = String)]
    pub amount: Money,
    pub reason: String,
    pub reference_number: String,
    #[schema(value_type = String)]
    pub status: RefundStatus,
    pub request_date: DateTime<Utc>,
    pub approval_date: Option<DateTime<Utc>>,
    pub payment_date: Option<DateTime<Utc>>,
    pub requested_by: Option<Uuid>,
    pub decided_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ObjectionRecord {
    pub id: Uuid,
    pub tax_return_id: Uuid,
    pub account_id: Uuid,
    pub reason: String,
    pub reference_number: String,
    #[schema(value_type = String)]
    pub status: ObjectionStatus,
    pub filing_date: DateTime<Utc>,
    pub decision: Option<String>,
    pub decision_date: Option<DateTime<Utc>>,
    pub filed_by: Option<Uuid>,
    pub decided_by: Option<Uuid>,
}

// -- Audits and collections ---------------------------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tax_type_id: Uuid,
    pub tax_return_id: Option<Uuid>,
    #[schema(value_type = String)]
    pub audit_type: AuditType,
    pub start_date: NaiveDate,
    pub end_date: Option<NaiveDate>,
    #[schema(value_type = String)]
    pub status: AuditStatus,
    pub auditor_id: Option<Uuid>,
    pub findings: Option<String>,
    #[schema(value_type = String)]
    pub additional_assessment: Money,
    pub outcome: Option<String>,
    pub reference_number: String,
    pub created_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Audits still running keep their return marked as under audit.
    pub fn is_active(&self) -> bool {
        !matches!(self.status, AuditStatus::Completed | AuditStatus::Cancelled)
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditCaseRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub audit_id: Uuid,
    pub case_number: String,
    pub tax_period: String,
    pub description: String,
    #[schema(value_type = String)]
    pub status: CaseStatus,
    pub open_date: NaiveDate,
    pub close_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CollectionRecord {
    pub id: Uuid,
    pub account_id: Uuid,
    pub tax_return_id: Uuid,
    #[schema(value_type = String)]
    pub amount_due: Money,
    #[schema(value_type = String)]
    pub collection_type: CollectionType,
    pub start_date: NaiveDate,
    pub due_date: NaiveDate,
    #[schema(value_type = String)]
    pub status: CollectionStatus,
    pub reference_number: String,
    pub created_at: DateTime<Utc>,
}

// -- Notifications, registrations, requests -----------------------------------

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    #[schema(value_type = String)]
    pub notification_type: NotificationKind,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
    pub read_at: Option<DateTime<Utc>>,
}

/// A registration envelope. The shape-specific fields are flattened into
/// the same JSON object next to `registration_type`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegistrationRecord {
    pub id: Uuid,
    pub registration_number: String,
    #[schema(value_type = String)]
    pub status: RegistrationStatus,
    pub submitted_by: Option<Uuid>,
    pub registration_date: NaiveDate,
    pub decided_at: Option<DateTime<Utc>>,
    pub decided_by: Option<Uuid>,
    #[serde(flatten)]
    #[schema(value_type = Object)]
    pub details: Registration,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ServiceRequestRecord {
    pub id: Uuid,
    pub request_type: String,
    pub account_id: Option<Uuid>,
    pub submitted_by: Option<Uuid>,
    #[schema(value_type = String)]
    pub status: RequestStatus,
    pub submission_date: DateTime<Utc>,
    pub completion_date: Option<DateTime<Utc>>,
    pub reference_number: String,
    pub details: Option<String>,
}

/// One link of the hash-chained audit trail.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuditTrailRecord {
    pub id: Uuid,
    pub seq: i64,
    pub user_id: Option<Uuid>,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub details: serde_json::Value,
    pub previous_hash: String,
    pub hash: String,
    pub created_at: DateTime<Utc>,
}
