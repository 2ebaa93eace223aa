use anyhow::Error;
use std::io::{self, Write};
use unicode_width::UnicodeWidthChar;

use crate::analytics::{
    self, format_currency, format_percent, platform_breakdown, ratio_percent, severity_badge,
    status_badge,
};
use crate::core::{
    Connection, CrossPlatformUser, DashboardData, Identity, LicenseReport, PlatformOverview,
    RiskStatus, SecurityRisk, Severity,
};
use crate::lifecycle::{DisconnectReport, StepStatus};
use crate::pages::PageState;
use crate::platform::{self, AuthMethod, PlatformSpec};
use crate::validate::FieldError;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub color: bool,
    pub stdin_is_tty: bool,
    pub stdout_is_tty: bool,
    pub stderr_is_tty: bool,
    pub max_table_rows: usize,
    pub quiet: bool,
    pub verbose: bool,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for request details");
    let _ = writeln!(
        stderr,
        "  - see `saasboard --help` for available commands and options"
    );
}

pub fn write_field_errors(out: &mut dyn Write, errors: &[FieldError]) {
    let _ = writeln!(out, "invalid credentials:");
    for e in errors {
        let _ = writeln!(out, "  - {}: {}", e.field, e.message);
    }
}

/// Error panel shown in place of a view whose fetch failed.
pub fn write_failed(out: &mut dyn Write, message: &str, retry: &str) {
    let _ = writeln!(out, "! {message}");
    let _ = writeln!(out, "  retry: {retry}");
}

pub fn write_coming_soon(out: &mut dyn Write, platform: &PlatformSpec) {
    let _ = writeln!(
        out,
        "{}  {} integration is coming soon.",
        platform.icon, platform.display_name
    );
}

/// Shared Loading / ComingSoon / Failed handling. Returns the ready value, if any.
fn page_body<'a, T>(
    out: &mut dyn Write,
    page: &'a PageState<T>,
    platform: Option<&PlatformSpec>,
    retry: &str,
) -> Option<&'a T> {
    match page {
        PageState::Loading => {
            let _ = writeln!(out, "loading...");
            None
        }
        PageState::ComingSoon => {
            match platform {
                Some(p) => write_coming_soon(out, p),
                None => {
                    let _ = writeln!(out, "coming soon.");
                }
            }
            None
        }
        PageState::Failed { message } => {
            write_failed(out, message, retry);
            None
        }
        PageState::Ready(v) => Some(v),
    }
}

pub fn write_platforms(out: &mut dyn Write, cfg: &UiConfig) {
    let rows = platform::all()
        .map(|p| {
            let methods = if p.auth_options.is_empty() {
                "-".to_string()
            } else {
                p.auth_options
                    .iter()
                    .map(|o| o.method.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            let availability = if p.is_available() {
                "available".to_string()
            } else {
                paint("coming soon", "90", cfg.color)
            };
            vec![
                format!("{} {}", p.icon, p.id.slug()),
                p.display_name.to_string(),
                availability,
                methods,
            ]
        })
        .collect();
    write_table(
        out,
        &["PLATFORM", "NAME", "STATUS", "AUTH METHODS"],
        rows,
        usize::MAX,
    );
}

pub fn write_identity(out: &mut dyn Write, identity: &Identity) {
    let _ = writeln!(out, "email: {}", identity.email);
    if let Some(name) = &identity.name {
        let _ = writeln!(out, "name:  {name}");
    }
    if let Some(role) = &identity.role {
        let _ = writeln!(out, "role:  {role}");
    }
}

pub fn write_overview(
    out: &mut dyn Write,
    platform: &PlatformSpec,
    page: &PageState<PlatformOverview>,
) {
    let retry = format!("saasboard overview {}", platform.id.slug());
    let Some(o) = page_body(out, page, Some(platform), &retry) else {
        return;
    };

    let _ = writeln!(out, "{} {} overview", platform.icon, platform.display_name);
    let _ = writeln!(
        out,
        "  users:        {} ({} active, {})",
        o.total_users,
        o.active_users,
        ratio_percent(o.active_users, o.total_users)
    );
    if let Some(cost) = o.monthly_cost {
        let _ = writeln!(out, "  monthly cost: {}", format_currency(cost));
    }
    if let Some(mfa) = o.mfa_enabled_percent {
        let _ = writeln!(out, "  MFA enabled:  {}", format_percent(mfa));
    }
    let _ = writeln!(out, "  open risks:   {}", o.open_risks);
    let _ = writeln!(
        out,
        "  last sync:    {}",
        o.last_sync_at.as_deref().unwrap_or("never")
    );
    for (name, count) in &o.resource_counts {
        let _ = writeln!(out, "  {name}: {count}");
    }
}

/// Call to action printed instead of an empty connection table.
pub fn empty_state_hint(platform: &PlatformSpec) -> String {
    let slug = platform.id.slug();
    if platform.supports(AuthMethod::OAuth) {
        format!("Run `saasboard oauth start {slug}` or `saasboard connect {slug} --method <method>` to add one.")
    } else {
        format!("Run `saasboard connect {slug} --method <method>` to add one.")
    }
}

pub fn write_connections(
    out: &mut dyn Write,
    platform: &PlatformSpec,
    page: &PageState<Vec<Connection>>,
    cfg: &UiConfig,
) {
    let retry = format!("saasboard connections {}", platform.id.slug());
    let Some(items) = page_body(out, page, Some(platform), &retry) else {
        return;
    };

    if items.is_empty() {
        let _ = writeln!(
            out,
            "{}  No {} {}s connected yet.",
            platform.icon, platform.display_name, platform.noun
        );
        let _ = writeln!(out, "   {}", empty_state_hint(platform));
        return;
    }

    let rows = items
        .iter()
        .map(|c| {
            let state = if c.is_active {
                paint("active", "32", cfg.color)
            } else {
                paint("inactive", "31", cfg.color)
            };
            vec![
                c.id.clone(),
                truncate_middle(&c.name, 32),
                c.scope.clone().unwrap_or_else(|| "-".to_string()),
                c.auth_method.clone().unwrap_or_else(|| "-".to_string()),
                state,
                c.last_sync_at.clone().unwrap_or_else(|| "never".to_string()),
            ]
        })
        .collect();
    write_table(
        out,
        &["ID", "NAME", "SCOPE", "AUTH", "STATE", "LAST SYNC"],
        rows,
        cfg.max_table_rows,
    );
}

pub fn write_dashboard(out: &mut dyn Write, page: &PageState<DashboardData>, cfg: &UiConfig) {
    let Some(d) = page_body(out, page, None, "saasboard dashboard") else {
        return;
    };

    let _ = writeln!(
        out,
        "users: {} total, {} active, {} ghost, {} duplicate",
        d.total_users, d.active_users, d.ghost_users, d.duplicate_users
    );
    let _ = writeln!(
        out,
        "cost:  {} / month, potential savings {}",
        format_currency(d.total_monthly_cost),
        format_currency(d.potential_savings)
    );
    let critical = if d.critical_risks > 0 {
        paint(&format!("{} critical", d.critical_risks), "31", cfg.color)
    } else {
        "0 critical".to_string()
    };
    let _ = writeln!(out, "risks: {} open, {critical}", d.open_risks);
    if let Some(at) = &d.generated_at {
        let _ = writeln!(out, "as of: {at}");
    }

    if d.platforms.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "No platforms connected yet. Run `saasboard platforms` to get started.");
        return;
    }

    let _ = writeln!(out);
    let rows = d
        .platforms
        .iter()
        .map(|p| {
            vec![
                p.platform.clone(),
                p.users.to_string(),
                format_currency(p.monthly_cost),
                if p.connected { "yes" } else { "no" }.to_string(),
            ]
        })
        .collect();
    write_table(
        out,
        &["PLATFORM", "USERS", "MONTHLY COST", "CONNECTED"],
        rows,
        cfg.max_table_rows,
    );
}

pub fn write_ghost_users(
    out: &mut dyn Write,
    page: &PageState<Vec<CrossPlatformUser>>,
    cfg: &UiConfig,
) {
    let Some(users) = page_body(out, page, None, "saasboard ghost-users") else {
        return;
    };
    if users.is_empty() {
        let _ = writeln!(out, "No ghost users found.");
        let _ = writeln!(out, "   Run `saasboard correlate` after syncing platforms to refresh.");
        return;
    }

    let wasted: f64 = users.iter().map(|u| u.estimated_monthly_cost).sum();
    let _ = writeln!(
        out,
        "{} ghost users, {} / month",
        users.len(),
        format_currency(wasted)
    );
    let accounts: Vec<_> = users.iter().flat_map(|u| u.platforms.iter().cloned()).collect();
    let breakdown = platform_breakdown(&accounts);
    if !breakdown.is_empty() {
        let parts: Vec<String> = breakdown.iter().map(|(p, n)| format!("{p}={n}")).collect();
        let _ = writeln!(out, "accounts by platform: {}", parts.join(" "));
    }
    let _ = writeln!(out);

    let rows = users
        .iter()
        .map(|u| {
            vec![
                u.email.clone(),
                u.platforms
                    .iter()
                    .map(|p| p.platform.as_str())
                    .collect::<Vec<_>>()
                    .join(","),
                u.last_activity_at.clone().unwrap_or_else(|| "never".to_string()),
                format_currency(u.estimated_monthly_cost),
            ]
        })
        .collect();
    write_table(
        out,
        &["EMAIL", "PLATFORMS", "LAST ACTIVE", "COST/MO"],
        rows,
        cfg.max_table_rows,
    );
}

pub fn write_risks(out: &mut dyn Write, page: &PageState<Vec<SecurityRisk>>, cfg: &UiConfig) {
    let Some(risks) = page_body(out, page, None, "saasboard risks") else {
        return;
    };
    if risks.is_empty() {
        let _ = writeln!(out, "No security risks match.");
        return;
    }

    if let Some(top) = analytics::highest_severity(risks) {
        let _ = writeln!(
            out,
            "{} risks, highest severity {}",
            risks.len(),
            format_severity(top, cfg.color)
        );
    }
    let _ = writeln!(out);

    let rows = risks
        .iter()
        .map(|r| {
            vec![
                r.id.clone(),
                format_severity(r.severity, cfg.color),
                format_status(r.status, cfg.color),
                r.platform.clone(),
                r.user_email.clone(),
                truncate_middle(&r.risk_type, 24),
            ]
        })
        .collect();
    write_table(
        out,
        &["ID", "SEVERITY", "STATUS", "PLATFORM", "USER", "TYPE"],
        rows,
        cfg.max_table_rows,
    );
}

pub fn write_licenses(out: &mut dyn Write, page: &PageState<LicenseReport>, cfg: &UiConfig) {
    let Some(report) = page_body(out, page, None, "saasboard licenses") else {
        return;
    };
    let _ = writeln!(
        out,
        "license spend {} / month, potential savings {}",
        format_currency(report.total_monthly_cost),
        format_currency(report.potential_savings)
    );
    if report.recommendations.is_empty() {
        let _ = writeln!(out, "No license recommendations right now.");
        return;
    }
    let _ = writeln!(out);

    let rows = report
        .recommendations
        .iter()
        .map(|r| {
            vec![
                r.platform.clone(),
                r.user_email.clone(),
                r.license_type.clone().unwrap_or_else(|| "-".to_string()),
                format_currency(r.monthly_cost),
                r.recommended_action.clone(),
            ]
        })
        .collect();
    write_table(
        out,
        &["PLATFORM", "USER", "LICENSE", "COST/MO", "ACTION"],
        rows,
        cfg.max_table_rows,
    );
}

pub fn write_disconnect_report(out: &mut dyn Write, report: &DisconnectReport) {
    if report.comprehensive {
        let _ = writeln!(out, "disconnected {}", report.platform);
        return;
    }
    let _ = writeln!(out, "disconnected {} (per-resource cleanup):", report.platform);
    for step in &report.steps {
        let status = match step.status {
            StepStatus::Removed => "removed",
            StepStatus::AlreadyGone => "already gone",
            StepStatus::Failed if step.optional => "skipped",
            StepStatus::Failed => "FAILED",
        };
        let _ = write!(out, "  - {} {}: {status}", step.resource, step.path);
        match &step.message {
            Some(m) => {
                let _ = writeln!(out, " ({m})");
            }
            None => {
                let _ = writeln!(out);
            }
        }
    }
}

pub fn format_severity(severity: Severity, color: bool) -> String {
    let code = match severity {
        Severity::Critical => "1;31",
        Severity::High => "31",
        Severity::Medium => "33",
        Severity::Low => "90",
    };
    paint(severity_badge(severity), code, color)
}

pub fn format_status(status: RiskStatus, color: bool) -> String {
    let code = match status {
        RiskStatus::Open => "33",
        RiskStatus::Acknowledged => "36",
        RiskStatus::Resolved => "32",
    };
    paint(status_badge(status), code, color)
}

fn paint(s: &str, code: &str, color: bool) -> String {
    if color {
        format!("\x1b[{code}m{s}\x1b[0m")
    } else {
        s.to_string()
    }
}

fn write_table(out: &mut dyn Write, headers: &[&str], rows: Vec<Vec<String>>, max_rows: usize) {
    let total = rows.len();
    let shown = total.min(max_rows.max(1));

    let mut widths: Vec<usize> = headers.iter().map(|h| visible_width_ansi(h)).collect();
    for row in rows.iter().take(shown) {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(visible_width_ansi(cell));
            }
        }
    }

    let line = |cells: Vec<String>| -> String {
        let last = cells.len().saturating_sub(1);
        cells
            .iter()
            .enumerate()
            .map(|(i, c)| {
                if i == last {
                    c.clone()
                } else {
                    pad_end_ansi(c, widths[i])
                }
            })
            .collect::<Vec<_>>()
            .join("  ")
    };

    let _ = writeln!(
        out,
        "{}",
        line(headers.iter().map(|h| h.to_string()).collect())
    );
    let _ = writeln!(
        out,
        "{}",
        line(widths.iter().map(|w| "-".repeat(*w)).collect())
    );
    for row in rows.into_iter().take(shown) {
        let _ = writeln!(out, "{}", line(row));
    }
    if total > shown {
        let _ = writeln!(out, "... ({} more)", total - shown);
    }
}

fn truncate_middle(s: &str, max_chars: usize) -> String {
    let len = s.chars().count();
    if len <= max_chars {
        return s.to_string();
    }

    let keep = max_chars.saturating_sub(3);
    let left = keep / 2;
    let right = keep.saturating_sub(left);

    let prefix: String = s.chars().take(left).collect();
    let suffix: String = s
        .chars()
        .rev()
        .take(right)
        .collect::<String>()
        .chars()
        .rev()
        .collect();

    format!("{prefix}...{suffix}")
}

fn pad_end_ansi(s: &str, width: usize) -> String {
    let w = visible_width_ansi(s);
    if w >= width {
        return s.to_string();
    }
    format!("{s}{}", " ".repeat(width - w))
}

fn visible_width_ansi(s: &str) -> usize {
    let mut width: usize = 0;
    let mut chars = s.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' && chars.peek() == Some(&'[') {
            let _ = chars.next();
            for ch2 in chars.by_ref() {
                if ch2 == 'm' {
                    break;
                }
            }
            continue;
        }
        width = width.saturating_add(UnicodeWidthChar::width(ch).unwrap_or(0));
    }
    width
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::PlatformId;

    fn cfg() -> UiConfig {
        UiConfig {
            color: false,
            stdin_is_tty: false,
            stdout_is_tty: false,
            stderr_is_tty: false,
            max_table_rows: 2,
            quiet: false,
            verbose: false,
        }
    }

    fn render(f: impl FnOnce(&mut dyn Write)) -> String {
        let mut buf = Vec::new();
        f(&mut buf);
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn table_truncates_to_max_rows() {
        let s = render(|out| {
            write_table(
                out,
                &["A", "B"],
                vec![
                    vec!["1".into(), "x".into()],
                    vec!["2".into(), "y".into()],
                    vec!["3".into(), "z".into()],
                ],
                2,
            )
        });
        assert!(s.contains("... (1 more)"));
        assert!(!s.contains('3'));
    }

    #[test]
    fn failed_page_prints_panel_with_retry() {
        let page: PageState<DashboardData> = PageState::Failed {
            message: "Failed to load dashboard data".into(),
        };
        let s = render(|out| write_dashboard(out, &page, &cfg()));
        assert!(s.contains("! Failed to load dashboard data"));
        assert!(s.contains("retry: saasboard dashboard"));
    }

    #[test]
    fn coming_soon_platform_renders_placeholder() {
        let page: PageState<Vec<Connection>> = PageState::ComingSoon;
        let s = render(|out| write_connections(out, PlatformId::Office365.spec(), &page, &cfg()));
        assert_eq!(s, "O  Office 365 integration is coming soon.\n");
    }

    #[test]
    fn visible_width_ignores_ansi() {
        assert_eq!(visible_width_ansi(&paint("HIGH", "31", true)), 4);
        assert_eq!(visible_width_ansi("日本"), 4);
    }
}
