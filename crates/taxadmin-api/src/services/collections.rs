//! Collection cases raised against unpaid returns. Payments that name a
//! collection reduce its amount due; see [`super::payments`].

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use taxadmin_core::{CollectionStatus, CollectionType, ReferenceKind, ReferenceNumber};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::CallerIdentity;
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::records::{CollectionRecord, PaymentRecord};
use crate::state::AppState;

use super::notify::notify_owner;
use super::{load_return, today};

/// Days allowed to settle a collection when no due date is given.
const DEFAULT_TERM_DAYS: i64 = 30;

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateCollection {
    pub tax_return_id: Uuid,
    #[schema(value_type = Option<String>)]
    pub collection_type: Option<CollectionType>,
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Deserialize, utoipa::IntoParams)]
pub struct CollectionFilters {
    pub status: Option<String>,
    pub collection_type: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CollectionDetail {
    pub collection: CollectionRecord,
    pub tax_return_reference: Option<String>,
    pub payments: Vec<PaymentRecord>,
}

pub fn list_collections(state: &AppState, filters: &CollectionFilters) -> Result<Vec<CollectionRecord>, AppError> {
    let status = filters
        .status
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<CollectionStatus>)
        .transpose()?;
    let kind = filters
        .collection_type
        .as_deref()
        .filter(|s| !s.is_empty())
        .map(str::parse::<CollectionType>)
        .transpose()?;
    let mut rows = state.collections.filter(|c| {
        status.map_or(true, |s| c.status == s) && kind.map_or(true, |k| c.collection_type == k)
    });
    rows.sort_by(|a, b| b.start_date.cmp(&a.start_date).then(b.created_at.cmp(&a.created_at)));
    Ok(rows)
}

pub fn collection_detail(state: &AppState, id: Uuid) -> Result<CollectionDetail, AppError> {
    let collection = state
        .collections
        .get(&id)
        .ok_or_else(|| AppError::not_found("collection", id))?;
    let mut payments = state.payments.filter(|p| p.collection_id == Some(id));
    payments.sort_by_key(|p| p.payment_date);
    let tax_return_reference = state
        .tax_returns
        .get(&collection.tax_return_id)
        .map(|r| r.reference_number);
    Ok(CollectionDetail {
        collection,
        tax_return_reference,
        payments,
    })
}

pub async fn create_collection(
    state: &AppState,
    caller: &CallerIdentity,
    request: CreateCollection,
) -> Result<CollectionRecord, AppError> {
    let _guard = state.locks.lock(&[request.tax_return_id]).await;
    let tax_return = load_return(state, request.tax_return_id)?;
    if !tax_return.status.accepts_payments() || !tax_return.due_amount.is_positive() {
        return Err(AppError::Conflict(format!(
            "tax return {} has nothing outstanding to collect",
            tax_return.reference_number
        )));
    }
    if state.collections.any(|c| {
        c.tax_return_id == tax_return.id
            && matches!(c.status, CollectionStatus::Pending | CollectionStatus::Partial)
    }) {
        return Err(AppError::Conflict(format!(
            "tax return {} already has an open collection",
            tax_return.reference_number
        )));
    }

    let start_date = today();
    let due_date = request
        .due_date
        .unwrap_or(start_date + Duration::days(DEFAULT_TERM_DAYS));
    if due_date < start_date {
        return Err(AppError::Validation("due_date must not be in the past".into()));
    }

    let reference = ReferenceNumber::generate(ReferenceKind::Collection).into_string();
    let collection = CollectionRecord {
        id: Uuid::new_v4(),
        account_id: tax_return.account_id,
        tax_return_id: tax_return.id,
        amount_due: tax_return.due_amount,
        collection_type: request.collection_type.unwrap_or(CollectionType::Regular),
        start_date,
        due_date,
        status: CollectionStatus::Pending,
        reference_number: reference.clone(),
        created_at: Utc::now(),
    };

    let mut cs = ChangeSet::new();
    cs.put(collection.clone());
    notify_owner(
        &mut cs,
        state,
        collection.account_id,
        "Collection Opened",
        format!(
            "A collection ({reference}) for ${} on tax return {} is due by {due_date}.",
            collection.amount_due, tax_return.reference_number
        ),
        taxadmin_core::NotificationKind::Warning,
    );
    cs.audit(
        caller.user_id,
        "create_collection",
        "collection",
        Some(collection.id),
        serde_json::json!({
            "reference_number": reference,
            "tax_return": tax_return.reference_number,
            "amount_due": collection.amount_due,
        }),
    );
    cs.commit(state).await?;

    tracing::info!(
        collection_id = %collection.id,
        reference = %collection.reference_number,
        amount_due = %collection.amount_due,
        "collection opened"
    );
    Ok(collection)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::TaxReturnRecord;
    use taxadmin_core::{Money, PermissionSet, ReturnStatus};

    fn caller() -> CallerIdentity {
        CallerIdentity {
            user_id: None,
            username: "admin".into(),
            is_admin: true,
            user_type: None,
            permissions: PermissionSet::new(),
        }
    }

    fn seed(state: &AppState, due: i64, status: ReturnStatus) -> Uuid {
        let record = TaxReturnRecord {
            id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            tax_type_id: Uuid::new_v4(),
            tax_period_id: Uuid::new_v4(),
            reference_number: "TX-COL00001".into(),
            filing_date: Some(Utc::now()),
            due_amount: Money::from_major(due),
            status,
            assessment_date: None,
            assessment_type: None,
            is_flagged: false,
            flag_reason: None,
            filed_by: None,
            version: 0,
            created_at: Utc::now(),
        };
        let id = record.id;
        state.tax_returns.insert(id, record);
        id
    }

    fn create(tax_return_id: Uuid) -> CreateCollection {
        CreateCollection {
            tax_return_id,
            collection_type: None,
            due_date: None,
        }
    }

    #[tokio::test]
    async fn amount_due_copies_return_due() {
        let state = AppState::new();
        let id = seed(&state, 320, ReturnStatus::Assessed);
        let collection = create_collection(&state, &caller(), create(id)).await.unwrap();
        assert_eq!(collection.amount_due, Money::from_major(320));
        assert_eq!(collection.collection_type, CollectionType::Regular);
        assert_eq!(collection.status, CollectionStatus::Pending);
        assert_eq!(collection.due_date, today() + Duration::days(30));
        assert_eq!(collection.reference_number.get(..4), Some("COL-"));

        let err = create_collection(&state, &caller(), create(id)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn paid_returns_cannot_be_collected() {
        let state = AppState::new();
        let finalized = seed(&state, 0, ReturnStatus::Finalized);
        let err = create_collection(&state, &caller(), create(finalized)).await.unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[tokio::test]
    async fn filters_parse_labels() {
        let state = AppState::new();
        let id = seed(&state, 10, ReturnStatus::Filed);
        create_collection(&state, &caller(), create(id)).await.unwrap();
        let filters = CollectionFilters {
            status: Some("pending".into()),
            collection_type: None,
        };
        assert_eq!(list_collections(&state, &filters).unwrap().len(), 1);
        let bad = CollectionFilters {
            status: Some("lost".into()),
            collection_type: None,
        };
        assert!(list_collections(&state, &bad).is_err());
    }
}
