use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};

fn saasboard_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_saasboard"));
    cmd.env("HOME", home);
    for var in [
        "SAASBOARD_CONFIG",
        "SAASBOARD_TOKEN",
        "SAASBOARD_API_BASE_URL",
        "SAASBOARD_API_TIMEOUT_SECS",
        "SAASBOARD_UI_COLOR",
        "SAASBOARD_UI_MAX_TABLE_ROWS",
        "SAASBOARD_REFRESH_INTERVAL_MS",
        "SAASBOARD_OAUTH_REDIRECT_URI",
    ] {
        cmd.env_remove(var);
    }
    cmd.stdin(Stdio::null());
    cmd
}

fn show_config(cmd: &mut Command) -> serde_json::Value {
    let out = cmd.args(["config", "--show", "--json"]).output().expect("run saasboard");
    assert!(
        out.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&out.stderr)
    );
    serde_json::from_slice(&out.stdout).expect("parse json")
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);

    let temp = std::env::temp_dir();
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let uniq = format!("saasboard-config-test-{}-{seq}", std::process::id());
    let home = temp.join(uniq);
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn write_file(path: &Path, bytes: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("mkdirs");
    }
    std::fs::write(path, bytes).expect("write");
}

const FILE_CONFIG: &[u8] = br#"
[api]
base_url = "https://file.example/api"
timeout_secs = 5

[refresh]
interval_ms = 60000
"#;

#[test]
fn defaults_apply_without_config_file() {
    let home = make_temp_home();
    let v = show_config(&mut saasboard_cmd(&home));

    assert_eq!(v["api"]["base_url"], "http://localhost:8000/api");
    assert_eq!(v["api"]["timeout_secs"], 30);
    assert_eq!(v["refresh"]["interval_ms"], 300_000);
    assert!(v["config_path"].is_null());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn file_then_env_then_flags() {
    let home = make_temp_home();
    write_file(&home.join(".config/saasboard/config.toml"), FILE_CONFIG);

    let v = show_config(&mut saasboard_cmd(&home));
    assert_eq!(v["api"]["base_url"], "https://file.example/api");
    assert_eq!(v["api"]["timeout_secs"], 5);
    assert_eq!(v["refresh"]["interval_ms"], 60_000);

    let v = show_config(
        saasboard_cmd(&home)
            .env("SAASBOARD_API_BASE_URL", "https://env.example/api")
            .env("SAASBOARD_API_TIMEOUT_SECS", "7"),
    );
    assert_eq!(v["api"]["base_url"], "https://env.example/api");
    assert_eq!(v["api"]["timeout_secs"], 7);
    assert_eq!(v["refresh"]["interval_ms"], 60_000);

    let v = show_config(
        saasboard_cmd(&home)
            .env("SAASBOARD_API_BASE_URL", "https://env.example/api")
            .env("SAASBOARD_API_TIMEOUT_SECS", "7")
            .args(["--api-url", "https://flag.example/api", "--timeout", "9"]),
    );
    assert_eq!(v["api"]["base_url"], "https://flag.example/api");
    assert_eq!(v["api"]["timeout_secs"], 9);
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn config_env_var_points_at_another_file() {
    let home = make_temp_home();
    let path = home.join("elsewhere.toml");
    write_file(&path, b"[oauth]\nredirect_uri = \"https://console.example/callback\"\n");

    let v = show_config(saasboard_cmd(&home).env("SAASBOARD_CONFIG", &path));
    assert_eq!(v["oauth"]["redirect_uri"], "https://console.example/callback");
    assert_eq!(v["config_path"], path.display().to_string());
    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn broken_configuration_exits_2() {
    let home = make_temp_home();

    let out = saasboard_cmd(&home)
        .args(["--config", "/nonexistent/saasboard.toml", "config", "--show"])
        .output()
        .expect("run saasboard");
    assert_eq!(out.status.code(), Some(2));

    write_file(
        &home.join(".config/saasboard/config.toml"),
        b"[api]\nbase_url = \"x\"\n[scan]\ndeep = true\n",
    );
    let out = saasboard_cmd(&home)
        .args(["config", "--show"])
        .output()
        .expect("run saasboard");
    assert_eq!(out.status.code(), Some(2));

    let _ = std::fs::remove_file(home.join(".config/saasboard/config.toml"));
    let out = saasboard_cmd(&home)
        .env("SAASBOARD_UI_COLOR", "maybe")
        .args(["config", "--show"])
        .output()
        .expect("run saasboard");
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("SAASBOARD_UI_COLOR"));

    let _ = std::fs::remove_dir_all(&home);
}
