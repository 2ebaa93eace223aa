//! Bearer token storage.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::config;

pub const TOKEN_ENV: &str = "SAASBOARD_TOKEN";

pub fn token_path(home_dir: &Path) -> PathBuf {
    config::config_dir(home_dir).join("token")
}

/// `SAASBOARD_TOKEN` wins over the stored file.
pub fn load_token(home_dir: &Path) -> Result<Option<String>> {
    if let Ok(v) = std::env::var(TOKEN_ENV) {
        let v = v.trim();
        if !v.is_empty() {
            return Ok(Some(v.to_string()));
        }
    }

    let path = token_path(home_dir);
    match std::fs::read_to_string(&path) {
        Ok(s) => {
            let s = s.trim();
            Ok((!s.is_empty()).then(|| s.to_string()))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e).with_context(|| format!("failed to read token: {}", path.display())),
    }
}

pub fn save_token(home_dir: &Path, token: &str) -> Result<PathBuf> {
    let token = token.trim();
    anyhow::ensure!(!token.is_empty(), "token must not be empty");

    let path = token_path(home_dir);
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory: {}", dir.display()))?;
    }
    write_private(&path, token.as_bytes())
        .with_context(|| format!("failed to write token: {}", path.display()))?;
    Ok(path)
}

/// Returns `true` when a stored token was removed.
pub fn clear_token(home_dir: &Path) -> Result<bool> {
    let path = token_path(home_dir);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e).with_context(|| format!("failed to remove token: {}", path.display())),
    }
}

#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    f.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    f.write_all(bytes)
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_clear_round_trip() {
        let home = std::env::temp_dir().join(format!("saasboard-session-{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&home);

        let path = save_token(&home, "  abc.def  ").expect("save");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc.def");
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(clear_token(&home).unwrap());
        assert!(!clear_token(&home).unwrap());
        assert!(save_token(&home, "   ").is_err());

        let _ = std::fs::remove_dir_all(&home);
    }
}
