//! # Report Aggregation
//!
//! Builds the six management reports from the in-memory stores. Date
//! arithmetic (ranges, month windows, rates, targets) comes from
//! `taxadmin_core::reporting`; this module only selects and sums rows.
//!
//! Collected money is always the sum of Completed payments. A payment
//! counts in the range when its payment date falls inside it; monthly
//! trends sum whole calendar months.
//!
//! [`analytics`] and [`dashboards`] cover the rolling year ending today.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use taxadmin_core::registration::RegistrationType;
use taxadmin_core::reporting::{
    monthly_revenue_target, rate, TargetComparison, ANALYTICS_TREND_MONTHS,
};
use taxadmin_core::{
    AuditStatus, DateRange, MonthWindow, Money, PaymentStatus, RefundStatus, RegistrationStatus, ReportKind,
};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::error::AppError;
use crate::records::{PaymentRecord, TaxReturnRecord, TaxTypeRecord};
use crate::state::AppState;

use super::today;

// -- Request / Response types --------------------------------------------------

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct ReportQuery {
    pub report_type: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub tax_type_id: Option<Uuid>,
}

/// One entry of the report catalogue.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ReportInfo {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
}

pub fn available_reports() -> Vec<ReportInfo> {
    ReportKind::ALL
        .iter()
        .map(|k| ReportInfo {
            id: k.as_str(),
            title: k.title(),
            description: k.description(),
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthAmount {
    pub month: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthCount {
    pub month: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxTypeCollection {
    pub tax_type: String,
    pub total_amount: Money,
    pub payment_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct CollectionSummary {
    pub total_collected: Money,
    pub total_payments: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxCollectionReport {
    pub summary: CollectionSummary,
    pub details: Vec<TaxTypeCollection>,
    pub monthly_breakdown: Vec<MonthAmount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceSummary {
    pub total_returns: usize,
    pub filed_on_time: usize,
    pub filed_late: usize,
    pub not_filed: usize,
    pub filing_compliance_rate: Decimal,
    pub overall_filing_rate: Decimal,
    pub payment_compliance_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxTypeCompliance {
    pub tax_type: String,
    pub total_returns: usize,
    pub filed_returns: usize,
    pub compliance_rate: Decimal,
}

#[derive(Debug, Clone, Serialize)]
pub struct ComplianceReport {
    pub summary: ComplianceSummary,
    pub tax_type_compliance: Vec<TaxTypeCompliance>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationSummary {
    pub total_registrations: usize,
    pub individual_count: usize,
    pub non_individual_count: usize,
    pub sole_proprietor_count: usize,
    pub pending_count: usize,
    pub approved_count: usize,
    pub rejected_count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationReport {
    pub summary: RegistrationSummary,
    pub monthly_trend: Vec<MonthCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditSummary {
    pub total_audits: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub additional_assessment: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct OutcomeCount {
    pub outcome: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditReport {
    pub summary: AuditSummary,
    pub outcomes: Vec<OutcomeCount>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundSummary {
    pub total_refunds: usize,
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub paid: usize,
    pub requested_amount: Money,
    pub approved_amount: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxTypeRefunds {
    pub tax_type: String,
    pub count: usize,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct RefundReport {
    pub summary: RefundSummary,
    pub tax_type_refunds: Vec<TaxTypeRefunds>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueSummary {
    pub total_revenue: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxTypeRevenue {
    pub tax_type: String,
    pub amount: Money,
}

#[derive(Debug, Clone, Serialize)]
pub struct RevenueReport {
    pub summary: RevenueSummary,
    pub tax_type_revenue: Vec<TaxTypeRevenue>,
    pub monthly_trend: Vec<MonthAmount>,
    pub target_comparison: Vec<TargetComparison>,
}

/// Report-specific body.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ReportBody {
    TaxCollection(TaxCollectionReport),
    Compliance(ComplianceReport),
    Registration(RegistrationReport),
    Audit(AuditReport),
    Refund(RefundReport),
    Revenue(RevenueReport),
}

/// A generated report: title and period plus the report body.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub report_type: ReportKind,
    pub title: &'static str,
    pub period: String,
    #[serde(flatten)]
    pub body: ReportBody,
}

// -- Generation ----------------------------------------------------------------

pub fn generate(state: &AppState, query: &ReportQuery) -> Result<Report, AppError> {
    let kind: ReportKind = query.report_type.parse()?;
    let range = DateRange::resolve(query.start_date, query.end_date, today())?;
    if let Some(id) = query.tax_type_id {
        if !state.tax_types.contains(&id) {
            return Err(AppError::not_found("tax type", id));
        }
    }
    let tax_type = query.tax_type_id;

    let _snapshot = state.snapshot();
    let body = match kind {
        ReportKind::TaxCollection => ReportBody::TaxCollection(tax_collection(state, &range, tax_type)),
        ReportKind::Compliance => ReportBody::Compliance(compliance(state, &range, tax_type)),
        ReportKind::Registration => ReportBody::Registration(registration(state, &range)),
        ReportKind::Audit => ReportBody::Audit(audit(state, &range, tax_type)),
        ReportKind::Refund => ReportBody::Refund(refund(state, &range, tax_type)),
        ReportKind::Revenue => ReportBody::Revenue(revenue(state, &range)),
    };
    tracing::info!(report = %kind, period = %range.label(), "report generated");
    Ok(Report {
        report_type: kind,
        title: kind.title(),
        period: range.label(),
        body,
    })
}

fn tax_types_by_name(state: &AppState) -> Vec<TaxTypeRecord> {
    let mut types = state.tax_types.list();
    types.sort_by(|a, b| a.name.cmp(&b.name));
    types
}

/// Completed payments dated inside `range`, each with its return.
fn completed_payments(
    state: &AppState,
    range: &DateRange,
    tax_type: Option<Uuid>,
) -> Vec<(PaymentRecord, TaxReturnRecord)> {
    completed_payments_where(state, |day| range.contains(day), tax_type)
}

fn completed_payments_where(
    state: &AppState,
    on: impl Fn(NaiveDate) -> bool,
    tax_type: Option<Uuid>,
) -> Vec<(PaymentRecord, TaxReturnRecord)> {
    state
        .payments
        .filter(|p| p.status == PaymentStatus::Completed && on(p.payment_date.date_naive()))
        .into_iter()
        .filter_map(|p| {
            let tax_return = state.tax_returns.get(&p.tax_return_id)?;
            Some((p, tax_return))
        })
        .filter(|(_, r)| tax_type.map_or(true, |t| r.tax_type_id == t))
        .collect()
}

fn sum<'a>(amounts: impl Iterator<Item = &'a Money>) -> Money {
    amounts.copied().sum()
}

/// Completed payments per calendar month. Months at either end of the
/// range are summed whole.
fn monthly_amounts(state: &AppState, months: Vec<MonthWindow>, tax_type: Option<Uuid>) -> Vec<MonthAmount> {
    let (Some(first), Some(last)) = (months.first(), months.last()) else {
        return Vec::new();
    };
    let (from, to) = (first.start, last.end);
    let payments = completed_payments_where(state, |day| from <= day && day <= to, tax_type);
    months
        .into_iter()
        .map(|window| MonthAmount {
            amount: sum(payments
                .iter()
                .filter(|(p, _)| window.contains(p.payment_date.date_naive()))
                .map(|(p, _)| &p.amount)),
            month: window.label,
        })
        .collect()
}

/// Registrations per calendar month, counted over whole months.
fn monthly_registrations(state: &AppState, months: Vec<MonthWindow>) -> Vec<MonthCount> {
    let rows = state.registrations.list();
    months
        .into_iter()
        .map(|window| MonthCount {
            count: rows.iter().filter(|r| window.contains(r.registration_date)).count(),
            month: window.label,
        })
        .collect()
}

fn tax_collection(state: &AppState, range: &DateRange, tax_type: Option<Uuid>) -> TaxCollectionReport {
    let payments = completed_payments(state, range, tax_type);
    let details = tax_types_by_name(state)
        .into_iter()
        .filter_map(|t| {
            let rows: Vec<&PaymentRecord> = payments
                .iter()
                .filter(|(_, r)| r.tax_type_id == t.id)
                .map(|(p, _)| p)
                .collect();
            (!rows.is_empty()).then(|| TaxTypeCollection {
                tax_type: t.name,
                total_amount: sum(rows.iter().map(|p| &p.amount)),
                payment_count: rows.len(),
            })
        })
        .collect();

    TaxCollectionReport {
        summary: CollectionSummary {
            total_collected: sum(payments.iter().map(|(p, _)| &p.amount)),
            total_payments: payments.len(),
        },
        details,
        monthly_breakdown: monthly_amounts(state, range.months(), tax_type),
    }
}

fn compliance(state: &AppState, range: &DateRange, tax_type: Option<Uuid>) -> ComplianceReport {
    // Returns whose period falls due inside the range, with that due date.
    let due_returns: Vec<(TaxReturnRecord, NaiveDate)> = state
        .tax_returns
        .filter(|r| tax_type.map_or(true, |t| r.tax_type_id == t))
        .into_iter()
        .filter_map(|r| {
            let due = state.tax_periods.get(&r.tax_period_id)?.due_date;
            range.contains(due).then_some((r, due))
        })
        .collect();

    let total = due_returns.len();
    let filed: Vec<&(TaxReturnRecord, NaiveDate)> =
        due_returns.iter().filter(|(r, _)| r.status.is_filed()).collect();
    let on_time = filed
        .iter()
        .filter(|(r, due)| r.filing_date.map_or(false, |f| f.date_naive() <= *due))
        .count();
    let late = filed.len() - on_time;
    let not_filed = total - filed.len();

    let paid: HashSet<Uuid> = state
        .payments
        .filter(|p| p.status == PaymentStatus::Completed)
        .into_iter()
        .map(|p| p.tax_return_id)
        .collect();
    let paid_filed = filed.iter().filter(|(r, _)| paid.contains(&r.id)).count();

    let tax_type_compliance = if tax_type.is_some() {
        Vec::new()
    } else {
        tax_types_by_name(state)
            .into_iter()
            .map(|t| {
                let of_type: Vec<_> = due_returns.iter().filter(|(r, _)| r.tax_type_id == t.id).collect();
                let filed_of_type = of_type.iter().filter(|(r, _)| r.status.is_filed()).count();
                TaxTypeCompliance {
                    tax_type: t.name,
                    total_returns: of_type.len(),
                    filed_returns: filed_of_type,
                    compliance_rate: rate(filed_of_type as u64, of_type.len() as u64),
                }
            })
            .collect()
    };

    ComplianceReport {
        summary: ComplianceSummary {
            total_returns: total,
            filed_on_time: on_time,
            filed_late: late,
            not_filed,
            filing_compliance_rate: rate(on_time as u64, total as u64),
            overall_filing_rate: rate(filed.len() as u64, total as u64),
            payment_compliance_rate: rate(paid_filed as u64, filed.len() as u64),
        },
        tax_type_compliance,
    }
}

fn registration(state: &AppState, range: &DateRange) -> RegistrationReport {
    let rows = state.registrations.filter(|r| range.contains(r.registration_date));
    let of_type = |t: RegistrationType| rows.iter().filter(|r| r.details.registration_type() == t).count();
    let of_status = |s: RegistrationStatus| rows.iter().filter(|r| r.status == s).count();
    let monthly_trend = monthly_registrations(state, range.months());

    RegistrationReport {
        summary: RegistrationSummary {
            total_registrations: rows.len(),
            individual_count: of_type(RegistrationType::Individual),
            non_individual_count: of_type(RegistrationType::NonIndividual),
            sole_proprietor_count: of_type(RegistrationType::SoleProprietor),
            pending_count: of_status(RegistrationStatus::Pending),
            approved_count: of_status(RegistrationStatus::Approved),
            rejected_count: of_status(RegistrationStatus::Rejected),
        },
        monthly_trend,
    }
}

fn audit(state: &AppState, range: &DateRange, tax_type: Option<Uuid>) -> AuditReport {
    let rows = state
        .audits
        .filter(|a| range.contains(a.start_date) && tax_type.map_or(true, |t| a.tax_type_id == t));
    let mut outcomes: BTreeMap<String, usize> = BTreeMap::new();
    for outcome in rows.iter().filter_map(|a| a.outcome.as_deref()).filter(|o| !o.is_empty()) {
        *outcomes.entry(outcome.to_string()).or_default() += 1;
    }
    AuditReport {
        summary: AuditSummary {
            total_audits: rows.len(),
            in_progress: rows.iter().filter(|a| a.status == AuditStatus::InProgress).count(),
            completed: rows.iter().filter(|a| a.status == AuditStatus::Completed).count(),
            additional_assessment: sum(rows.iter().map(|a| &a.additional_assessment)),
        },
        outcomes: outcomes
            .into_iter()
            .map(|(outcome, count)| OutcomeCount { outcome, count })
            .collect(),
    }
}

/// Accounts that have filed at least one return of `tax_type`.
fn accounts_with_tax_type(state: &AppState, tax_type: Uuid) -> HashSet<Uuid> {
    state
        .tax_returns
        .filter(|r| r.tax_type_id == tax_type)
        .into_iter()
        .map(|r| r.account_id)
        .collect()
}

fn refund(state: &AppState, range: &DateRange, tax_type: Option<Uuid>) -> RefundReport {
    let accounts = tax_type.map(|t| accounts_with_tax_type(state, t));
    let rows = state.refunds.filter(|r| {
        range.contains(r.request_date.date_naive())
            && accounts.as_ref().map_or(true, |ids| ids.contains(&r.account_id))
    });
    let of_status = |s: RefundStatus| rows.iter().filter(|r| r.status == s).count();

    let tax_type_refunds = if tax_type.is_some() {
        Vec::new()
    } else {
        tax_types_by_name(state)
            .into_iter()
            .map(|t| {
                let ids = accounts_with_tax_type(state, t.id);
                let of_type: Vec<_> = rows.iter().filter(|r| ids.contains(&r.account_id)).collect();
                TaxTypeRefunds {
                    tax_type: t.name,
                    count: of_type.len(),
                    amount: sum(of_type.iter().map(|r| &r.amount)),
                }
            })
            .collect()
    };

    RefundReport {
        summary: RefundSummary {
            total_refunds: rows.len(),
            pending: of_status(RefundStatus::Pending),
            approved: of_status(RefundStatus::Approved),
            rejected: of_status(RefundStatus::Rejected),
            paid: of_status(RefundStatus::Paid),
            requested_amount: sum(rows.iter().map(|r| &r.amount)),
            approved_amount: sum(rows
                .iter()
                .filter(|r| matches!(r.status, RefundStatus::Approved | RefundStatus::Paid))
                .map(|r| &r.amount)),
        },
        tax_type_refunds,
    }
}

fn revenue(state: &AppState, range: &DateRange) -> RevenueReport {
    let payments = completed_payments(state, range, None);
    let tax_type_revenue = tax_types_by_name(state)
        .into_iter()
        .filter_map(|t| {
            let rows: Vec<_> = payments.iter().filter(|(_, r)| r.tax_type_id == t.id).collect();
            (!rows.is_empty()).then(|| TaxTypeRevenue {
                tax_type: t.name,
                amount: sum(rows.iter().map(|(p, _)| &p.amount)),
            })
        })
        .collect();
    let monthly_trend = monthly_amounts(state, range.months(), None);
    let target = monthly_revenue_target();
    let target_comparison = monthly_trend
        .iter()
        .map(|m| TargetComparison::new(m.month.clone(), target, m.amount))
        .collect();

    RevenueReport {
        summary: RevenueSummary {
            total_revenue: sum(payments.iter().map(|(p, _)| &p.amount)),
        },
        tax_type_revenue,
        monthly_trend,
        target_comparison,
    }
}

// -- Analytics -----------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct TaxTypeAmount {
    pub name: String,
    pub amount: Money,
    pub is_core: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TaxTypeRate {
    pub name: String,
    pub compliance_rate: Decimal,
}

/// Rolling analytics over the last year: collections per tax type, a
/// twelve-month collection trend, and filing compliance per tax type.
#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub period: String,
    pub tax_collection: Vec<TaxTypeAmount>,
    pub monthly_trend: Vec<MonthAmount>,
    pub compliance: Vec<TaxTypeRate>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RegistrationCount {
    pub name: &'static str,
    pub count: usize,
}

/// [`Analytics`] plus registration counts by shape.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardAnalytics {
    #[serde(flatten)]
    pub analytics: Analytics,
    pub registrations: Vec<RegistrationCount>,
}

pub fn analytics(state: &AppState, today: NaiveDate) -> Analytics {
    let _snapshot = state.snapshot();
    collect_analytics(state, today)
}

fn collect_analytics(state: &AppState, today: NaiveDate) -> Analytics {
    let range = DateRange::last_year(today);
    let payments = completed_payments(state, &range, None);
    let returns = state.tax_returns.filter(|r| r.due_amount.is_positive());
    let types = tax_types_by_name(state);

    let tax_collection = types
        .iter()
        .map(|t| TaxTypeAmount {
            name: t.name.clone(),
            amount: sum(payments
                .iter()
                .filter(|(_, r)| r.tax_type_id == t.id)
                .map(|(p, _)| &p.amount)),
            is_core: t.is_core,
        })
        .collect();

    let compliance = types
        .iter()
        .map(|t| {
            let of_type: Vec<_> = returns.iter().filter(|r| r.tax_type_id == t.id).collect();
            let filed = of_type.iter().filter(|r| r.status.is_filed()).count();
            TaxTypeRate {
                name: t.name.clone(),
                compliance_rate: rate(filed as u64, of_type.len() as u64),
            }
        })
        .collect();

    Analytics {
        period: range.label(),
        tax_collection,
        monthly_trend: monthly_amounts(
            state,
            MonthWindow::trailing(today, ANALYTICS_TREND_MONTHS),
            None,
        ),
        compliance,
    }
}

pub fn dashboards(state: &AppState, today: NaiveDate) -> DashboardAnalytics {
    let _snapshot = state.snapshot();
    let rows = state.registrations.list();
    let count = |t: RegistrationType| rows.iter().filter(|r| r.details.registration_type() == t).count();
    DashboardAnalytics {
        analytics: collect_analytics(state, today),
        registrations: vec![
            RegistrationCount {
                name: "Individuals",
                count: count(RegistrationType::Individual),
            },
            RegistrationCount {
                name: "Non-Individuals",
                count: count(RegistrationType::NonIndividual),
            },
            RegistrationCount {
                name: "Sole Proprietors",
                count: count(RegistrationType::SoleProprietor),
            },
        ],
    }
}
