use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::config;
use crate::lifecycle::CleanupStep;

const SCHEMA_VERSION: &str = "1.0";
const MAX_MESSAGE_BYTES: usize = 4 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
    Ok,
    Failed,
    PartialError,
}

/// One mutating action against the backend.
///
/// Only credential field *names* are kept here; values never reach the log.
#[derive(Debug, Clone)]
pub struct AuditEntry {
    pub command: &'static str,
    pub platform: Option<String>,
    pub target: Option<String>,
    pub status: AuditStatus,
    pub message: Option<String>,
    pub fields: Vec<String>,
    pub steps: Vec<CleanupStep>,
}

impl AuditEntry {
    pub fn new(command: &'static str, status: AuditStatus) -> Self {
        Self {
            command,
            platform: None,
            target: None,
            status,
            message: None,
            fields: Vec::new(),
            steps: Vec::new(),
        }
    }

    pub fn platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = Some(platform.into());
        self
    }

    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn fields<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn steps(mut self, steps: Vec<CleanupStep>) -> Self {
        self.steps = steps;
        self
    }
}

#[derive(Debug, Serialize)]
struct AuditLog<'a> {
    schema_version: &'static str,
    tool_version: &'static str,
    command: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    platform: Option<&'a str>,
    started_at: String,
    finished_at: String,
    status: AuditStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<String>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    fields: &'a [String],
    #[serde(skip_serializing_if = "<[CleanupStep]>::is_empty")]
    steps: &'a [CleanupStep],
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    config::config_dir(home_dir).join("logs")
}

pub fn write_audit_log(
    home_dir: &Path,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    entry: &AuditEntry,
) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let ts = finished_at.unix_timestamp_nanos();
    let pid = std::process::id();
    let path = dir.join(format!("{ts}-{}-{pid}.json", entry.command));

    let log = AuditLog {
        schema_version: SCHEMA_VERSION,
        tool_version: env!("CARGO_PKG_VERSION"),
        command: entry.command,
        platform: entry.platform.as_deref(),
        started_at: rfc3339(started_at),
        finished_at: rfc3339(finished_at),
        status: entry.status,
        target: entry.target.as_deref(),
        message: entry
            .message
            .as_deref()
            .map(|m| truncate_string(m, MAX_MESSAGE_BYTES)),
        fields: &entry.fields,
        steps: &entry.steps,
    };

    let json = serde_json::to_vec_pretty(&log).context("failed to serialize audit log")?;
    std::fs::write(&path, json)
        .with_context(|| format!("failed to write audit log: {}", path.display()))?;
    tracing::debug!(path = %path.display(), "audit log written");
    Ok(path)
}

fn rfc3339(t: OffsetDateTime) -> String {
    t.format(&Rfc3339).unwrap_or_else(|_| "unknown".to_string())
}

fn truncate_string(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut idx = max_bytes;
    while idx > 0 && !s.is_char_boundary(idx) {
        idx = idx.saturating_sub(1);
    }
    let head = &s[..idx];
    format!("{head}\n...(truncated, total={} bytes)", s.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::StepStatus;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_home() -> PathBuf {
        static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
        let home = std::env::temp_dir().join(format!(
            "saasboard-log-test-{}-{seq}",
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&home);
        std::fs::create_dir_all(&home).expect("create home");
        home
    }

    #[test]
    fn audit_log_records_field_names_and_steps() {
        let home = temp_home();
        let entry = AuditEntry::new("disconnect", AuditStatus::PartialError)
            .platform("aws")
            .message("1 failed step")
            .fields(["account_id", "secret_access_key"])
            .steps(vec![CleanupStep {
                resource: "accounts".to_string(),
                path: "/aws/accounts/1".to_string(),
                optional: false,
                status: StepStatus::Failed,
                message: Some("locked".to_string()),
            }]);
        let now = OffsetDateTime::now_utc();
        let path = write_audit_log(&home, now, now, &entry).expect("write log");
        assert!(path.starts_with(logs_dir(&home)));

        let v: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).expect("read log")).expect("parse");
        assert_eq!(v["command"], "disconnect");
        assert_eq!(v["status"], "partial_error");
        assert_eq!(v["fields"], serde_json::json!(["account_id", "secret_access_key"]));
        assert_eq!(v["steps"][0]["status"], "failed");
        assert!(v.get("target").is_none());

        let _ = std::fs::remove_dir_all(&home);
    }

    #[test]
    fn truncate_string_respects_char_boundaries() {
        let s = "ééééé";
        let t = truncate_string(s, 3);
        assert!(t.starts_with('é'));
        assert!(t.contains("total=10 bytes"));
    }
}
