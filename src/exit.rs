use std::fmt;

use crate::api::ApiError;
use crate::lifecycle::LifecycleError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    InvalidArgs,
    ValidationFailed,
    BackendFailed,
}

impl ExitCode {
    pub const fn as_i32(self) -> i32 {
        match self {
            ExitCode::Success => 0,
            ExitCode::InvalidArgs => 2,
            ExitCode::ValidationFailed => 3,
            ExitCode::BackendFailed => 10,
        }
    }
}

#[derive(Debug)]
pub struct ExitError {
    pub code: ExitCode,
    pub err: anyhow::Error,
}

impl ExitError {
    pub fn new(code: ExitCode, err: anyhow::Error) -> Self {
        Self { code, err }
    }
}

impl fmt::Display for ExitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.err.fmt(f)
    }
}

impl std::error::Error for ExitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(self.err.as_ref())
    }
}

pub fn exit_code(err: &anyhow::Error) -> i32 {
    if let Some(exit) = err.downcast_ref::<ExitError>() {
        return exit.code.as_i32();
    }
    if let Some(lifecycle) = err.downcast_ref::<LifecycleError>() {
        return lifecycle_code(lifecycle).as_i32();
    }
    ExitCode::BackendFailed.as_i32()
}

fn lifecycle_code(err: &LifecycleError) -> ExitCode {
    match err {
        LifecycleError::Validation(_) => ExitCode::ValidationFailed,
        LifecycleError::ComingSoon(_)
        | LifecycleError::UnsupportedAuthMethod { .. }
        | LifecycleError::InvalidTransition { .. }
        | LifecycleError::NotConnected(_) => ExitCode::InvalidArgs,
        LifecycleError::OAuth(_) | LifecycleError::Backend { .. } | LifecycleError::Cleanup { .. } => {
            ExitCode::BackendFailed
        }
    }
}

pub fn invalid_args(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, anyhow::anyhow!(message.into())).into()
}

pub fn invalid_args_err(err: anyhow::Error) -> anyhow::Error {
    ExitError::new(ExitCode::InvalidArgs, err).into()
}

pub fn backend(err: ApiError, fallback: &str) -> anyhow::Error {
    let message = err.user_message(fallback);
    ExitError::new(ExitCode::BackendFailed, anyhow::Error::new(err).context(message)).into()
}

pub fn backend_failed(message: impl Into<String>) -> anyhow::Error {
    ExitError::new(ExitCode::BackendFailed, anyhow::anyhow!(message.into())).into()
}

pub fn lifecycle(err: LifecycleError) -> anyhow::Error {
    let code = lifecycle_code(&err);
    ExitError::new(code, err.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::FieldError;

    #[test]
    fn lifecycle_errors_map_to_exit_codes() {
        let validation = lifecycle(LifecycleError::Validation(vec![FieldError::new(
            "account_id",
            "Account ID must be exactly 12 digits",
        )]));
        assert_eq!(exit_code(&validation), 3);
        assert_eq!(exit_code(&lifecycle(LifecycleError::ComingSoon("Office 365"))), 2);
        assert_eq!(exit_code(&anyhow::anyhow!("boom")), 10);
    }

    #[test]
    fn backend_error_carries_user_message() {
        let err = backend(ApiError::Transport("connection refused".into()), "Failed");
        assert_eq!(exit_code(&err), 10);
        assert_eq!(err.to_string(), "connection refused");
    }
}
