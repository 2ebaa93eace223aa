use std::collections::BTreeMap;

use crate::core::{PlatformTagged, RiskStatus, SecurityRisk, Severity};

/// Counts platform-tagged records per platform name.
pub fn platform_breakdown<T: PlatformTagged>(records: &[T]) -> BTreeMap<String, usize> {
    let mut counts = BTreeMap::new();
    for r in records {
        let name = match r.platform_name().trim() {
            "" => "unknown",
            n => n,
        };
        *counts.entry(name.to_string()).or_insert(0) += 1;
    }
    counts
}

pub fn highest_severity(risks: &[SecurityRisk]) -> Option<Severity> {
    risks.iter().map(|r| r.severity).max()
}

/// Filters risks the way `saasboard risks --status/--severity` does.
/// `min_severity` keeps the given level and everything above it.
pub fn filter_risks(
    risks: &[SecurityRisk],
    status: Option<RiskStatus>,
    min_severity: Option<Severity>,
) -> Vec<SecurityRisk> {
    let mut out: Vec<SecurityRisk> = risks
        .iter()
        .filter(|r| status.is_none_or(|s| r.status == s))
        .filter(|r| min_severity.is_none_or(|s| r.severity >= s))
        .cloned()
        .collect();
    out.sort_by(|a, b| b.severity.cmp(&a.severity));
    out
}

/// `1234.5` → `$1,234.50`.
pub fn format_currency(amount: f64) -> String {
    if !amount.is_finite() {
        return "$0.00".to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, ch) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{sign}${grouped}.{:02}", cents % 100)
}

pub fn format_percent(value: f64) -> String {
    if !value.is_finite() {
        return "-".to_string();
    }
    format!("{}%", value.round() as i64)
}

/// Share of `part` in `total` as a whole-number percentage string.
pub fn ratio_percent(part: u64, total: u64) -> String {
    if total == 0 {
        return "-".to_string();
    }
    format_percent(part as f64 * 100.0 / total as f64)
}

pub fn severity_badge(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "CRITICAL",
        Severity::High => "HIGH",
        Severity::Medium => "MEDIUM",
        Severity::Low => "LOW",
    }
}

pub fn status_badge(status: RiskStatus) -> &'static str {
    match status {
        RiskStatus::Open => "open",
        RiskStatus::Acknowledged => "ack",
        RiskStatus::Resolved => "resolved",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn risk(id: &str, platform: &str, severity: Severity, status: RiskStatus) -> SecurityRisk {
        SecurityRisk {
            id: id.to_string(),
            user_email: format!("{id}@acme.io"),
            platform: platform.to_string(),
            severity,
            risk_type: "no_mfa".to_string(),
            description: String::new(),
            status,
            detected_at: None,
        }
    }

    #[test]
    fn highest_severity_picks_critical() {
        let risks = vec![
            risk("1", "aws", Severity::Low, RiskStatus::Open),
            risk("2", "aws", Severity::Critical, RiskStatus::Open),
            risk("3", "slack", Severity::Medium, RiskStatus::Open),
        ];
        assert_eq!(highest_severity(&risks), Some(Severity::Critical));
        assert_eq!(highest_severity(&[]), None);
    }

    #[test]
    fn breakdown_counts_per_platform() {
        let risks = vec![
            risk("1", "aws", Severity::Low, RiskStatus::Open),
            risk("2", "aws", Severity::High, RiskStatus::Open),
            risk("3", "", Severity::Medium, RiskStatus::Open),
        ];
        let counts = platform_breakdown(&risks);
        assert_eq!(counts.get("aws"), Some(&2));
        assert_eq!(counts.get("unknown"), Some(&1));
    }

    #[test]
    fn filter_keeps_minimum_severity_and_sorts() {
        let risks = vec![
            risk("1", "aws", Severity::Low, RiskStatus::Open),
            risk("2", "aws", Severity::High, RiskStatus::Resolved),
            risk("3", "zoom", Severity::Critical, RiskStatus::Open),
        ];
        let open: Vec<String> = filter_risks(&risks, Some(RiskStatus::Open), None)
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(open, ["3", "1"]);
        assert_eq!(filter_risks(&risks, None, Some(Severity::High)).len(), 2);
    }

    #[test]
    fn currency_groups_thousands() {
        assert_eq!(format_currency(1234.56), "$1,234.56");
        assert_eq!(format_currency(0.0), "$0.00");
        assert_eq!(format_currency(1_000_000.0), "$1,000,000.00");
        assert_eq!(format_currency(-12.5), "-$12.50");
        assert_eq!(format_percent(87.6), "88%");
        assert_eq!(ratio_percent(1, 4), "25%");
    }
}
