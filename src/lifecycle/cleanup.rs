use serde::Serialize;

use crate::api::{self, ApiError, Transport};
use crate::console::Console;
use crate::core::Connection;
use crate::lifecycle::LifecycleError;
use crate::platform::{OwnedResource, PlatformSpec, ResourceCleanup};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Removed,
    /// The backend answered 404; nothing left to remove.
    AlreadyGone,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanupStep {
    pub resource: String,
    pub path: String,
    pub optional: bool,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DisconnectReport {
    pub platform: &'static str,
    /// True when the backend's single disconnect endpoint handled everything.
    pub comprehensive: bool,
    pub steps: Vec<CleanupStep>,
}

impl DisconnectReport {
    pub fn failures(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Failed && !s.optional)
            .map(|s| {
                format!(
                    "{} ({}): {}",
                    s.resource,
                    s.path,
                    s.message.as_deref().unwrap_or("failed")
                )
            })
            .collect()
    }
}

fn step(resource: &OwnedResource, path: String, result: Result<(), ApiError>) -> CleanupStep {
    let (status, message) = match result {
        Ok(()) => (StepStatus::Removed, None),
        Err(e) if e.is_not_found() => (StepStatus::AlreadyGone, None),
        Err(e) => (StepStatus::Failed, Some(e.user_message("request failed"))),
    };
    if status == StepStatus::Failed {
        tracing::warn!(
            resource = resource.name,
            path = %path,
            optional = resource.optional,
            "cleanup step failed"
        );
    }
    CleanupStep {
        resource: resource.name.to_string(),
        path,
        optional: resource.optional,
        status,
        message,
    }
}

fn run_resource<T: Transport>(console: &Console<T>, resource: &OwnedResource) -> Vec<CleanupStep> {
    match resource.cleanup {
        ResourceCleanup::Single { path } => {
            vec![step(resource, path.to_string(), console.backend().delete(path))]
        }
        ResourceCleanup::Each {
            list_path,
            item_path,
        } => {
            let listed: Result<Vec<Connection>, ApiError> = console.list(list_path, resource.name);
            match listed {
                Ok(items) => items
                    .iter()
                    .map(|item| {
                        let path = item_path.replace("{id}", &item.id);
                        let result = api::path_id(&item.id)
                            .and_then(|_| console.backend().delete(&path));
                        step(resource, path, result)
                    })
                    .collect(),
                Err(e) => vec![step(resource, list_path.to_string(), Err(e))],
            }
        }
    }
}

/// Removes everything a platform connection owns on the backend.
///
/// Tries `DELETE {prefix}/disconnect` first. When the backend does not have
/// that endpoint (404), the platform's owned resources are removed one by one.
/// Every step runs even after a failure; failed required steps are reported
/// together as [`LifecycleError::Cleanup`].
pub fn disconnect_platform<T: Transport>(
    console: &Console<T>,
    platform: &'static PlatformSpec,
) -> Result<DisconnectReport, LifecycleError> {
    if !platform.is_available() {
        return Err(LifecycleError::ComingSoon(platform.display_name));
    }

    let path = platform.disconnect_path();
    let mut report = DisconnectReport {
        platform: platform.id.slug(),
        comprehensive: true,
        steps: Vec::new(),
    };

    match console.backend().delete(&path) {
        Ok(()) => {
            report.steps.push(CleanupStep {
                resource: "all".to_string(),
                path,
                optional: false,
                status: StepStatus::Removed,
                message: None,
            });
        }
        Err(e) if e.is_not_found() => {
            tracing::debug!(
                platform = platform.id.slug(),
                "no comprehensive disconnect endpoint, removing owned resources"
            );
            report.comprehensive = false;
            for resource in platform.owned_resources {
                report.steps.extend(run_resource(console, resource));
            }
        }
        Err(e) => {
            return Err(LifecycleError::Backend {
                message: e.user_message(&format!("Failed to disconnect {}", platform.display_name)),
                source: e,
            });
        }
    }

    console.invalidate_platform(platform);

    let failures = report.failures();
    if failures.is_empty() {
        Ok(report)
    } else {
        Err(LifecycleError::Cleanup { failures, report })
    }
}
