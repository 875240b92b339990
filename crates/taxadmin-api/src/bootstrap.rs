//! # Startup Seeding
//!
//! Ensures the reference data every deployment needs is present: the user
//! type directory, the system administrator, the core tax types, and four
//! quarterly periods per tax type for the seed year. Runs after hydration
//! and only inserts what is missing, so repeated startups are no-ops.

use chrono::{Datelike, NaiveDate, Utc};
use taxadmin_core::permissions::UserType;
use taxadmin_core::PeriodStatus;
use uuid::Uuid;

use crate::auth::SYSTEM_ADMIN_USERNAME;
use crate::changeset::ChangeSet;
use crate::error::AppError;
use crate::records::{TaxPeriodRecord, TaxTypeRecord, UserRecord, UserTypeRecord};
use crate::state::AppState;

/// Email of the seeded administrator.
pub const SYSTEM_ADMIN_EMAIL: &str = "admin@example.com";

/// Core tax types as `(code, name, description)`.
const CORE_TAX_TYPES: [(&str, &str, &str); 4] = [
    ("VAT", "Value Added Tax", "Tax on the value added to goods and services"),
    ("PIT", "Personal Income Tax", "Tax on individual income"),
    ("CIT", "Corporate Income Tax", "Tax on company profits"),
    ("WHT", "Withholding Tax", "Tax withheld at source"),
];

/// Rows written by [`seed`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub user_types: usize,
    pub users: usize,
    pub tax_types: usize,
    pub tax_periods: usize,
}

impl SeedReport {
    pub fn total(&self) -> usize {
        self.user_types + self.users + self.tax_types + self.tax_periods
    }
}

/// The four quarters of `year` as `(code, start, end)`.
fn quarters(year: i32) -> Vec<(String, NaiveDate, NaiveDate)> {
    [(1, 1, 3, 31), (2, 4, 6, 30), (3, 7, 9, 30), (4, 10, 12, 31)]
        .into_iter()
        .filter_map(|(q, first_month, last_month, last_day)| {
            let start = NaiveDate::from_ymd_opt(year, first_month, 1)?;
            let end = NaiveDate::from_ymd_opt(year, last_month, last_day)?;
            Some((format!("{year}-Q{q}"), start, end))
        })
        .collect()
}

/// Insert whatever reference data is missing.
pub async fn seed(state: &AppState) -> Result<SeedReport, AppError> {
    let now = Utc::now();
    let year = state.config.seed_year.unwrap_or_else(|| now.year());
    let mut report = SeedReport::default();
    let mut cs = ChangeSet::new();

    let mut admin_type_id = state
        .user_types
        .find(|t| t.name == UserType::Administrator.name())
        .map(|t| t.id);
    for kind in UserType::ALL {
        if state.user_types.any(|t| t.name == kind.name()) {
            continue;
        }
        let record = UserTypeRecord {
            id: Uuid::new_v4(),
            name: kind.name().to_string(),
            description: kind.description().to_string(),
            created_at: now,
        };
        if *kind == UserType::Administrator {
            admin_type_id = Some(record.id);
        }
        cs.put(record);
        report.user_types += 1;
    }

    if !state.users.any(|u| u.username == SYSTEM_ADMIN_USERNAME) {
        cs.put(UserRecord {
            id: Uuid::new_v4(),
            username: SYSTEM_ADMIN_USERNAME.to_string(),
            email: SYSTEM_ADMIN_EMAIL.to_string(),
            first_name: Some("System".to_string()),
            last_name: Some("Administrator".to_string()),
            phone: None,
            user_type_id: admin_type_id,
            is_admin: true,
            is_active: true,
            created_at: now,
        });
        report.users += 1;
    }

    for (code, name, description) in CORE_TAX_TYPES {
        let tax_type_id = match state.tax_types.find(|t| t.code == code) {
            Some(existing) => existing.id,
            None => {
                let record = TaxTypeRecord {
                    id: Uuid::new_v4(),
                    code: code.to_string(),
                    name: name.to_string(),
                    description: Some(description.to_string()),
                    is_core: true,
                    created_at: now,
                };
                let id = record.id;
                cs.put(record);
                report.tax_types += 1;
                id
            }
        };

        for (period_code, start_date, end_date) in quarters(year) {
            if state
                .tax_periods
                .any(|p| p.tax_type_id == tax_type_id && p.period_code == period_code)
            {
                continue;
            }
            cs.put(TaxPeriodRecord {
                id: Uuid::new_v4(),
                tax_type_id,
                period_code,
                start_date,
                end_date,
                due_date: end_date,
                status: PeriodStatus::Open,
            });
            report.tax_periods += 1;
        }
    }

    if report.total() > 0 {
        cs.commit(state).await?;
    }
    tracing::info!(
        year,
        user_types = report.user_types,
        users = report.users,
        tax_types = report.tax_types,
        tax_periods = report.tax_periods,
        "reference data seeded"
    );
    Ok(report)
}
