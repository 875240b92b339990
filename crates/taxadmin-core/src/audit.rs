//! Audit notices and case findings text.

use crate::status::{AuditStatus, AuditType, NotificationKind};

/// A notification to send to the audited account's owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Notification title.
    pub title: String,
    /// Notification body.
    pub message: String,
    /// Notification category.
    pub kind: NotificationKind,
}

/// Notice sent when an audit is opened against a return.
pub fn opened_notice(
    return_reference: &str,
    tax_type_name: &str,
    audit_type: AuditType,
    audit_reference: &str,
) -> Notice {
    Notice {
        title: "Tax Return Under Audit".to_string(),
        message: format!(
            "Your tax return {return_reference} for {tax_type_name} tax type has been selected for {audit_type} audit. Reference: {audit_reference}"
        ),
        kind: NotificationKind::Warning,
    }
}

/// Notice sent when an audit moves to `status`.
pub fn status_notice(status: AuditStatus, reference: &str) -> Notice {
    let (message, kind) = match status {
        AuditStatus::InProgress => (
            format!("Your tax audit ({reference}) has begun. An auditor will be reviewing your tax return."),
            NotificationKind::Warning,
        ),
        AuditStatus::UnderReview => (
            format!("Your tax audit ({reference}) is now under final review."),
            NotificationKind::Info,
        ),
        AuditStatus::Completed => (
            format!("Your tax audit ({reference}) has been completed. Please check your messages for any findings."),
            NotificationKind::Success,
        ),
        AuditStatus::Cancelled => (
            format!("Your tax audit ({reference}) has been cancelled."),
            NotificationKind::Info,
        ),
        AuditStatus::Planned => (
            format!("Your tax audit ({reference}) status has been updated to: {status}."),
            NotificationKind::Alert,
        ),
    };
    Notice {
        title: format!("Audit {status}"),
        message,
        kind,
    }
}

/// Append a case entry to an audit's findings, separated from earlier
/// findings by a blank line.
pub fn append_case_findings(
    existing: Option<&str>,
    case_number: &str,
    tax_period: &str,
    description: &str,
) -> String {
    let entry = format!("Case {case_number} - Tax Period: {tax_period}\n\nDescription: {description}");
    match existing.filter(|f| !f.is_empty()) {
        Some(findings) => format!("{findings}\n\n{entry}"),
        None => entry,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_notices_match_status() {
        let n = status_notice(AuditStatus::InProgress, "AUD-1234ABCD");
        assert_eq!(n.title, "Audit In Progress");
        assert_eq!(n.kind, NotificationKind::Warning);
        assert_eq!(
            n.message,
            "Your tax audit (AUD-1234ABCD) has begun. An auditor will be reviewing your tax return."
        );

        let n = status_notice(AuditStatus::Completed, "AUD-1");
        assert_eq!(n.kind, NotificationKind::Success);

        let n = status_notice(AuditStatus::Planned, "AUD-1");
        assert_eq!(n.kind, NotificationKind::Alert);
        assert_eq!(n.message, "Your tax audit (AUD-1) status has been updated to: Planned.");
    }

    #[test]
    fn opened_notice_text() {
        let n = opened_notice("TX-00000001", "Value Added Tax", AuditType::Desk, "AUD-00000002");
        assert_eq!(n.title, "Tax Return Under Audit");
        assert_eq!(
            n.message,
            "Your tax return TX-00000001 for Value Added Tax tax type has been selected for Desk audit. Reference: AUD-00000002"
        );
    }

    #[test]
    fn findings_accumulate_with_blank_line() {
        let first = append_case_findings(None, "AC-1", "2025-Q1", "Missing invoices");
        assert_eq!(first, "Case AC-1 - Tax Period: 2025-Q1\n\nDescription: Missing invoices");
        let second = append_case_findings(Some(&first), "AC-2", "2025-Q2", "Late filing");
        assert_eq!(
            second,
            format!("{first}\n\nCase AC-2 - Tax Period: 2025-Q2\n\nDescription: Late filing")
        );
        assert_eq!(append_case_findings(Some(""), "AC-3", "p", "d"), "Case AC-3 - Tax Period: p\n\nDescription: d");
    }
}
