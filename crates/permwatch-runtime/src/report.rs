//! Markdown rendering of a Findings document.

use permwatch_core::{Findings, Severity};

/// Render `findings` as a Markdown audit report.
pub fn render_markdown(findings: &Findings) -> String {
    let mut lines = vec![
        "# Security Audit Report".to_string(),
        String::new(),
        format!("**Date:** {}", findings.audit_date.to_rfc3339()),
        format!("**Total Findings:** {}", findings.len()),
        String::new(),
    ];

    if !findings.is_empty() {
        lines.push("**Severity Breakdown:**".to_string());
        for severity in Severity::DESCENDING {
            let count = findings.count_by_severity(severity);
            if count > 0 {
                lines.push(format!("- {}: {}", severity, count));
            }
        }
        lines.push(String::new());
    }

    lines.push("## Findings".to_string());
    lines.push(String::new());

    if findings.is_empty() {
        lines.push("No violations found. Database configuration is compliant.".to_string());
    }

    for finding in &findings.findings {
        lines.push(format!("### {}: {}", finding.id, finding.finding_type));
        lines.push(format!("- **Severity:** {}", finding.severity));
        lines.push(format!("- **User:** {}", finding.user));
        lines.push(format!("- **Resource:** {}", finding.resource));
        lines.push(format!("- **Action:** {}", finding.action));
        lines.push(format!("- **Description:** {}", finding.description));
        lines.push(format!("- **Recommendation:** {}", finding.recommendation));
        if !finding.affected_resources.is_empty() {
            lines.push(format!(
                "- **Affected Resources:** {}",
                finding.affected_resources.join(", ")
            ));
        }
        lines.push(String::new());
    }

    let mut report = lines.join("\n");
    report.push('\n');
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use permwatch_core::{Action, Finding, FindingType};
    use pretty_assertions::assert_eq;

    fn date() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 0).unwrap()
    }

    #[test]
    fn test_empty_report() {
        let report = render_markdown(&Findings::dated(vec![], date()));
        assert_eq!(
            report,
            "# Security Audit Report\n\n\
             **Date:** 2026-03-01T09:30:00+00:00\n\
             **Total Findings:** 0\n\n\
             ## Findings\n\n\
             No violations found. Database configuration is compliant.\n"
        );
    }

    #[test]
    fn test_breakdown_lists_present_severities_in_order() {
        let finding = |severity, action, finding_type| Finding {
            id: Finding::stable_id(finding_type, "alice", "accounts", action),
            severity,
            finding_type,
            user: "alice".to_string(),
            resource: "accounts".to_string(),
            action,
            description: "d".to_string(),
            recommendation: "r".to_string(),
            affected_resources: vec!["accounts".to_string()],
        };
        let findings = Findings::dated(
            vec![
                finding(Severity::Medium, Action::Insert, FindingType::MissingPermission),
                finding(Severity::Critical, Action::Delete, FindingType::UnauthorizedAccess),
            ],
            date(),
        );

        let report = render_markdown(&findings);
        assert!(report.contains("**Severity Breakdown:**\n- CRITICAL: 1\n- MEDIUM: 1\n\n"));
        assert!(report.contains("### find-alice-accounts-DELETE-unauthorized: unauthorized_access\n"));
        assert!(report.contains("- **Affected Resources:** accounts\n"));
        assert!(!report.contains("No violations"));
    }
}
