use std::collections::BTreeMap;
use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use serde::Serialize;
use time::OffsetDateTime;

use crate::api::{HttpTransport, Transport};
use crate::config::EffectiveConfig;
use crate::console::Console;
use crate::core::{Connection, RiskStatus, Severity};
use crate::exit;
use crate::lifecycle::{self, ConnectionLifecycle, LifecycleError};
use crate::logs::{AuditEntry, AuditStatus};
use crate::pages::{self, PageState};
use crate::platform::{AuthMethod, PlatformId, PlatformSpec};
use crate::refresh::AutoRefresh;
use crate::ui::{self, UiConfig};

mod interactive;

#[derive(Debug, Parser)]
#[command(
    name = "saasboard",
    version,
    about = "Admin console for SaaS platform connections and cross-platform identity analytics"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long = "no-color", global = true)]
    pub no_color: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// Request timeout in seconds (overrides `api.timeout_secs`).
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
    /// Backend base URL (overrides `api.base_url`).
    #[arg(long = "api-url", global = true)]
    pub api_url: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Store the bearer token used for backend requests.
    Login(LoginArgs),
    Logout,
    Whoami,
    /// List supported platforms and their auth methods.
    Platforms,
    Overview(PlatformArgs),
    Connections(PlatformArgs),
    /// Register static credentials for a platform.
    Connect(ConnectArgs),
    #[command(name = "oauth")]
    OAuth(OAuthArgs),
    Test(ConnectionArgs),
    Sync(SyncArgs),
    Disconnect(DisconnectArgs),
    Dashboard(DashboardArgs),
    /// Re-run cross-platform user correlation on the backend.
    Correlate,
    GhostUsers,
    Risks(RisksArgs),
    /// Change the status of one security risk.
    Risk(RiskArgs),
    Licenses,
    Ui,
    Completion(CompletionArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Args)]
pub struct LoginArgs {
    #[arg(long)]
    pub token: Option<String>,
}

#[derive(Debug, Args)]
pub struct PlatformArgs {
    pub platform: String,
}

#[derive(Debug, Args)]
pub struct ConnectArgs {
    pub platform: String,
    #[arg(long)]
    pub method: String,
    /// `key=value`; `key=@path` reads the value from a file.
    #[arg(long = "field")]
    pub fields: Vec<String>,
}

#[derive(Debug, Args)]
pub struct OAuthArgs {
    #[command(subcommand)]
    pub command: OAuthCommand,
}

#[derive(Debug, Subcommand)]
pub enum OAuthCommand {
    Start {
        platform: String,
        #[arg(long = "scope")]
        scopes: Vec<String>,
    },
    Callback {
        platform: String,
        #[arg(long)]
        url: String,
    },
}

#[derive(Debug, Args)]
pub struct ConnectionArgs {
    pub platform: String,
    pub id: String,
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    pub platform: String,
    pub id: Option<String>,
}

#[derive(Debug, Args)]
pub struct DisconnectArgs {
    pub platform: String,
    pub id: Option<String>,
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct DashboardArgs {
    #[arg(long)]
    pub watch: bool,
}

#[derive(Debug, Args)]
pub struct RisksArgs {
    #[arg(long)]
    pub status: Option<String>,
    /// Minimum severity to show.
    #[arg(long)]
    pub severity: Option<String>,
}

#[derive(Debug, Args)]
pub struct RiskArgs {
    pub id: String,
    #[arg(long)]
    pub status: String,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

struct RunContext {
    json: bool,
    ui: UiConfig,
    cfg: EffectiveConfig,
    home_dir: PathBuf,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let stdin_is_tty = io::stdin().is_terminal();
    let stdout_is_tty = io::stdout().is_terminal();
    let stderr_is_tty = io::stderr().is_terminal();

    let home_dir = crate::config::home_dir().map_err(exit::invalid_args_err)?;
    let mut cfg =
        crate::config::load(cli.config.as_deref(), &home_dir).map_err(exit::invalid_args_err)?;
    if let Some(url) = &cli.api_url {
        cfg.api.base_url = url.clone();
    }
    if let Some(timeout) = cli.timeout {
        cfg.api.timeout_secs = timeout;
    }

    let color = stdout_is_tty && cfg.ui.color && !cli.no_color;
    let ui_cfg = UiConfig {
        color,
        stdin_is_tty,
        stdout_is_tty,
        stderr_is_tty,
        max_table_rows: cfg.ui.max_table_rows,
        quiet: cli.quiet,
        verbose: cli.verbose,
    };
    let ctx = RunContext {
        json: cli.json,
        ui: ui_cfg,
        cfg,
        home_dir,
    };

    match cli.command {
        Commands::Login(args) => login(&ctx, args),
        Commands::Logout => {
            let removed = crate::session::clear_token(&ctx.home_dir)?;
            if !ctx.ui.quiet {
                if removed {
                    println!("logged out");
                } else {
                    println!("no stored token");
                }
            }
            Ok(())
        }
        Commands::Whoami => {
            let console = build_console(&ctx)?;
            let identity = console.whoami().map_err(|e| {
                if e.is_unauthorized() {
                    exit::backend(e, "Not logged in. Run `saasboard login` first.")
                } else {
                    exit::backend(e, "Failed to load identity")
                }
            })?;
            if ctx.json {
                return write_json(&identity);
            }
            ui::write_identity(&mut io::stdout().lock(), &identity);
            Ok(())
        }
        Commands::Platforms => {
            if ctx.json {
                let list: Vec<PlatformSummary> =
                    crate::platform::all().map(PlatformSummary::from).collect();
                return write_json(&list);
            }
            ui::write_platforms(&mut io::stdout().lock(), &ctx.ui);
            Ok(())
        }
        Commands::Overview(args) => {
            let platform = parse_platform(&args.platform)?;
            let page = if platform.is_available() {
                pages::overview(&build_console(&ctx)?, platform)
            } else {
                PageState::ComingSoon
            };
            render_page(&ctx, &page, |out| ui::write_overview(out, platform, &page))
        }
        Commands::Connections(args) => {
            let platform = parse_platform(&args.platform)?;
            let page = if platform.is_available() {
                pages::connections(&build_console(&ctx)?, platform)
            } else {
                PageState::ComingSoon
            };
            render_page(&ctx, &page, |out| {
                ui::write_connections(out, platform, &page, &ctx.ui)
            })
        }
        Commands::Connect(args) => connect(&ctx, args),
        Commands::OAuth(args) => match args.command {
            OAuthCommand::Start { platform, scopes } => oauth_start(&ctx, &platform, &scopes),
            OAuthCommand::Callback { platform, url } => oauth_callback(&ctx, &platform, &url),
        },
        Commands::Test(args) => test_connection(&ctx, args),
        Commands::Sync(args) => sync(&ctx, args),
        Commands::Disconnect(args) => disconnect(&ctx, args),
        Commands::Dashboard(args) => dashboard(&ctx, args),
        Commands::Correlate => {
            let console = build_console(&ctx)?;
            let started_at = OffsetDateTime::now_utc();
            let result = console.correlate();
            let entry = match &result {
                Ok(s) => AuditEntry::new("correlate", AuditStatus::Ok).message(format!(
                    "{} users correlated, {} duplicates, {} ghost users",
                    s.users_correlated, s.duplicates_found, s.ghost_users_found
                )),
                Err(e) => AuditEntry::new("correlate", AuditStatus::Failed)
                    .message(e.user_message("Correlation failed")),
            };
            audit(&ctx, started_at, &entry);
            let summary = result.map_err(|e| exit::backend(e, "Correlation failed"))?;
            if ctx.json {
                return write_json(&summary);
            }
            if !ctx.ui.quiet {
                println!(
                    "correlated {} users: {} duplicates, {} ghost users",
                    summary.users_correlated, summary.duplicates_found, summary.ghost_users_found
                );
            }
            Ok(())
        }
        Commands::GhostUsers => {
            let page = pages::ghost_users(&build_console(&ctx)?);
            render_page(&ctx, &page, |out| ui::write_ghost_users(out, &page, &ctx.ui))
        }
        Commands::Risks(args) => {
            let status = args
                .status
                .as_deref()
                .map(str::parse::<RiskStatus>)
                .transpose()
                .map_err(exit::invalid_args)?;
            let severity = args
                .severity
                .as_deref()
                .map(str::parse::<Severity>)
                .transpose()
                .map_err(exit::invalid_args)?;
            let page = pages::security_risks(&build_console(&ctx)?)
                .map(|risks| crate::analytics::filter_risks(&risks, status, severity));
            render_page(&ctx, &page, |out| ui::write_risks(out, &page, &ctx.ui))
        }
        Commands::Risk(args) => {
            let status: RiskStatus = args.status.parse().map_err(exit::invalid_args)?;
            let console = build_console(&ctx)?;
            let started_at = OffsetDateTime::now_utc();
            let result = console.update_risk_status(&args.id, status);
            let entry = AuditEntry::new(
                "risk",
                if result.is_ok() {
                    AuditStatus::Ok
                } else {
                    AuditStatus::Failed
                },
            )
            .target(&args.id)
            .message(format!("status -> {status}"));
            audit(&ctx, started_at, &entry);
            let risk = result.map_err(|e| exit::backend(e, "Failed to update risk"))?;
            if ctx.json {
                return write_json(&risk);
            }
            if !ctx.ui.quiet {
                println!("risk {} is now {}", risk.id, risk.status);
            }
            Ok(())
        }
        Commands::Licenses => {
            let page = pages::licenses(&build_console(&ctx)?);
            render_page(&ctx, &page, |out| ui::write_licenses(out, &page, &ctx.ui))
        }
        Commands::Ui => {
            if ctx.json {
                return Err(exit::invalid_args("ui cannot be combined with --json"));
            }
            if !(ctx.ui.stdin_is_tty && ctx.ui.stdout_is_tty) {
                return Err(exit::invalid_args("ui needs a TTY (stdin + stdout)"));
            }
            let console = Arc::new(build_console(&ctx)?);
            crate::tui::run(console, ctx.ui.color, ctx.cfg.refresh_interval())
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "saasboard", &mut out);
            Ok(())
        }
        Commands::Config(args) => {
            if args.show {
                if ctx.json {
                    return write_json(&ctx.cfg);
                }
                println!("{}", toml::to_string_pretty(&ctx.cfg)?);
            } else if !ctx.ui.quiet {
                eprintln!("config: use `saasboard config --show`");
            }
            Ok(())
        }
    }
}

fn init_tracing(verbose: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = if verbose {
        EnvFilter::new("saasboard=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

fn build_console(ctx: &RunContext) -> Result<Console<HttpTransport>> {
    let token = crate::session::load_token(&ctx.home_dir)?;
    if token.is_none() {
        tracing::debug!("no bearer token; requests are sent unauthenticated");
    }
    let transport = HttpTransport::new(&ctx.cfg.api.base_url, token, ctx.cfg.timeout())
        .map_err(|e| exit::invalid_args_err(e.into()))?;
    Ok(Console::new(transport).with_redirect_uri(ctx.cfg.oauth.redirect_uri.clone()))
}

fn parse_platform(name: &str) -> Result<&'static PlatformSpec> {
    name.parse::<PlatformId>()
        .map(PlatformId::spec)
        .map_err(exit::invalid_args)
}

/// Coming-soon platforms reject every mutating command before any request.
fn require_available(platform: &'static PlatformSpec) -> Result<()> {
    if platform.is_available() {
        Ok(())
    } else {
        Err(exit::lifecycle(LifecycleError::ComingSoon(
            platform.display_name,
        )))
    }
}

/// Prints a page in the selected format. Failed pages still exit non-zero.
fn render_page<T: Serialize>(
    ctx: &RunContext,
    page: &PageState<T>,
    human: impl FnOnce(&mut dyn io::Write),
) -> Result<()> {
    if ctx.json {
        match page {
            PageState::Ready(v) => write_json(v)?,
            PageState::ComingSoon => write_json(&serde_json::json!({"status": "coming_soon"}))?,
            PageState::Loading | PageState::Failed { .. } => {}
        }
    } else if !ctx.ui.quiet || matches!(page, PageState::Failed { .. }) {
        human(&mut io::stdout().lock());
    }

    match page {
        PageState::Failed { message } => Err(exit::backend_failed(message.clone())),
        _ => Ok(()),
    }
}

fn audit(ctx: &RunContext, started_at: OffsetDateTime, entry: &AuditEntry) {
    let finished_at = OffsetDateTime::now_utc();
    if let Err(err) = crate::logs::write_audit_log(&ctx.home_dir, started_at, finished_at, entry) {
        tracing::warn!(error = %err, "failed to write audit log");
    }
}

fn lifecycle_audit_status(err: &LifecycleError) -> AuditStatus {
    match err {
        LifecycleError::Cleanup { .. } => AuditStatus::PartialError,
        _ => AuditStatus::Failed,
    }
}

fn spinner(ctx: &RunContext, message: String) -> Option<indicatif::ProgressBar> {
    if !(ctx.ui.stderr_is_tty && !ctx.ui.quiet && !ctx.json) {
        return None;
    }
    let pb = indicatif::ProgressBar::new_spinner();
    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

fn login(ctx: &RunContext, args: LoginArgs) -> Result<()> {
    let token = match args.token {
        Some(t) => t,
        None if ctx.ui.stdin_is_tty => interactive::prompt_hidden("Bearer token: ")?,
        None => {
            let mut s = String::new();
            io::stdin()
                .read_to_string(&mut s)
                .context("failed to read token from stdin")?;
            s
        }
    };
    if token.trim().is_empty() {
        return Err(exit::invalid_args("token must not be empty"));
    }
    let path = crate::session::save_token(&ctx.home_dir, &token)?;
    if !ctx.ui.quiet {
        println!("token saved to {}", path.display());
    }
    Ok(())
}

/// Parses repeated `--field key=value` arguments. `key=@path` reads the file.
fn parse_field_args(args: &[String]) -> Result<BTreeMap<String, String>> {
    let mut fields = BTreeMap::new();
    for arg in args {
        let Some((key, value)) = arg.split_once('=') else {
            return Err(exit::invalid_args(format!(
                "--field expects key=value, got: {arg}"
            )));
        };
        let key = key.trim();
        if key.is_empty() {
            return Err(exit::invalid_args(format!("--field has an empty key: {arg}")));
        }
        let value = match value.strip_prefix('@') {
            Some(path) => read_field_file(Path::new(path))?,
            None => value.to_string(),
        };
        fields.insert(key.to_string(), value);
    }
    Ok(fields)
}

fn read_field_file(path: &Path) -> Result<String> {
    std::fs::read_to_string(path)
        .with_context(|| format!("failed to read field file: {}", path.display()))
        .map_err(exit::invalid_args_err)
}

fn connect(ctx: &RunContext, args: ConnectArgs) -> Result<()> {
    let platform = parse_platform(&args.platform)?;
    require_available(platform)?;
    let method: AuthMethod = args.method.parse().map_err(exit::invalid_args)?;
    if method == AuthMethod::OAuth {
        return Err(exit::invalid_args(format!(
            "OAuth connections start with `saasboard oauth start {}`",
            platform.id.slug()
        )));
    }
    let Some(option) = platform.auth_option(method) else {
        return Err(exit::lifecycle(LifecycleError::UnsupportedAuthMethod {
            platform: platform.display_name,
            method,
        }));
    };

    let mut fields = parse_field_args(&args.fields)?;
    if ctx.ui.stdin_is_tty && ctx.ui.stderr_is_tty && !ctx.json {
        for field in option.fields.iter().filter(|f| f.required) {
            let missing = fields.get(field.key).is_none_or(|v| v.trim().is_empty());
            if missing {
                let value = interactive::prompt_field(field).map_err(exit::invalid_args_err)?;
                fields.insert(field.key.to_string(), value);
            }
        }
    }

    let errors = crate::validate::validate_fields(option.fields, &fields);
    if !errors.is_empty() {
        ui::write_field_errors(&mut io::stderr().lock(), &errors);
        return Err(exit::lifecycle(LifecycleError::Validation(errors)));
    }

    let console = build_console(ctx)?;
    let mut lc = ConnectionLifecycle::new(&console, platform);
    let started_at = OffsetDateTime::now_utc();
    let result = lc.store_credentials(method, &fields);

    let entry = AuditEntry::new(
        "connect",
        if result.is_ok() {
            AuditStatus::Ok
        } else {
            AuditStatus::Failed
        },
    )
    .platform(platform.id.slug())
    .fields(fields.keys().cloned());
    let entry = match &result {
        Ok(c) => entry.target(&c.id).message(format!("auth_method={method}")),
        Err(e) => entry.message(e.to_string()),
    };
    audit(ctx, started_at, &entry);

    let connection = match result {
        Ok(c) => c,
        Err(err) => {
            if let LifecycleError::Validation(errors) = &err {
                ui::write_field_errors(&mut io::stderr().lock(), errors);
            }
            return Err(exit::lifecycle(err));
        }
    };

    if ctx.json {
        return write_json(&connection);
    }
    if !ctx.ui.quiet {
        println!(
            "connected {} {} {} (id {})",
            platform.display_name,
            platform.noun,
            display_name(&connection),
            connection.id
        );
        println!("next: saasboard sync {} {}", platform.id.slug(), connection.id);
    }
    Ok(())
}

fn display_name(c: &Connection) -> &str {
    if !c.name.is_empty() {
        &c.name
    } else {
        c.scope.as_deref().unwrap_or("-")
    }
}

fn oauth_start(ctx: &RunContext, platform: &str, scopes: &[String]) -> Result<()> {
    let platform = parse_platform(platform)?;
    require_available(platform)?;
    let console = build_console(ctx)?;
    let mut lc = ConnectionLifecycle::new(&console, platform);
    let start = lc.initiate_oauth(scopes).map_err(exit::lifecycle)?;

    if ctx.json {
        return write_json(&start);
    }
    println!("open this URL to authorize {}:", platform.display_name);
    println!("  {}", start.authorization_url);
    if !ctx.ui.quiet {
        println!("scopes: {}", start.scopes.join(" "));
        println!(
            "then run: saasboard oauth callback {} --url '<redirect URL>'",
            platform.id.slug()
        );
    }
    Ok(())
}

fn oauth_callback(ctx: &RunContext, platform: &str, url: &str) -> Result<()> {
    let platform = parse_platform(platform)?;
    require_available(platform)?;
    let mut url = reqwest::Url::parse(url)
        .with_context(|| format!("invalid callback URL: {url}"))
        .map_err(exit::invalid_args_err)?;

    let console = build_console(ctx)?;
    let mut lc = ConnectionLifecycle::new(&console, platform);
    let started_at = OffsetDateTime::now_utc();
    let result = lc.complete_oauth(&mut url);

    let outcome = match result {
        Ok(Some(outcome)) => outcome,
        Ok(None) => {
            return Err(exit::invalid_args(
                "callback URL carries no OAuth result (expected ?success=true or ?error=...)",
            ));
        }
        Err(err) => {
            let entry = AuditEntry::new("oauth-callback", AuditStatus::Failed)
                .platform(platform.id.slug())
                .message(err.to_string());
            audit(ctx, started_at, &entry);
            return Err(exit::lifecycle(err));
        }
    };

    let mut entry =
        AuditEntry::new("oauth-callback", AuditStatus::Ok).platform(platform.id.slug());
    if let Some(subject) = outcome.subject() {
        entry = entry.target(subject);
    }
    audit(ctx, started_at, &entry);

    if ctx.json {
        return write_json(&outcome);
    }
    if !ctx.ui.quiet {
        match outcome.subject() {
            Some(s) => println!("connected {} {} {s}", platform.display_name, platform.noun),
            None => println!("connected {}", platform.display_name),
        }
    }
    Ok(())
}

fn find_connection<T: Transport>(
    console: &Console<T>,
    platform: &'static PlatformSpec,
    id: &str,
) -> Result<Connection> {
    let connections = console.connections(platform).map_err(|e| {
        exit::backend(
            e,
            &format!("Failed to load {} {}s", platform.display_name, platform.noun),
        )
    })?;
    connections
        .into_iter()
        .find(|c| c.id == id)
        .ok_or_else(|| {
            exit::invalid_args(format!(
                "no {} {} with id {id} (see `saasboard connections {}`)",
                platform.display_name,
                platform.noun,
                platform.id.slug()
            ))
        })
}

fn test_connection(ctx: &RunContext, args: ConnectionArgs) -> Result<()> {
    let platform = parse_platform(&args.platform)?;
    require_available(platform)?;
    let console = build_console(ctx)?;
    let connection = find_connection(&console, platform, &args.id)?;
    let mut lc = ConnectionLifecycle::resume(&console, platform, connection);

    let started_at = OffsetDateTime::now_utc();
    let result = lc.test();
    let entry = AuditEntry::new(
        "test",
        match &result {
            Ok(o) if o.success => AuditStatus::Ok,
            _ => AuditStatus::Failed,
        },
    )
    .platform(platform.id.slug())
    .target(&args.id);
    let entry = match &result {
        Ok(o) => match &o.message {
            Some(m) => entry.message(m.clone()),
            None => entry,
        },
        Err(e) => entry.message(e.to_string()),
    };
    audit(ctx, started_at, &entry);

    let outcome = result.map_err(exit::lifecycle)?;
    if ctx.json {
        write_json(&outcome)?;
    } else if !ctx.ui.quiet || !outcome.success {
        let verdict = if outcome.success { "passed" } else { "FAILED" };
        match &outcome.message {
            Some(m) => println!("connection test {verdict}: {m}"),
            None => println!("connection test {verdict}"),
        }
    }
    if outcome.success {
        Ok(())
    } else {
        Err(exit::backend_failed(
            outcome
                .message
                .unwrap_or_else(|| "Connection test failed".to_string()),
        ))
    }
}

fn sync(ctx: &RunContext, args: SyncArgs) -> Result<()> {
    let platform = parse_platform(&args.platform)?;
    require_available(platform)?;
    let console = build_console(ctx)?;
    let started_at = OffsetDateTime::now_utc();

    let result = match &args.id {
        Some(id) => {
            let connection = find_connection(&console, platform, id)?;
            let mut lc = ConnectionLifecycle::resume(&console, platform, connection);
            let pb = spinner(ctx, format!("syncing {} {id}...", platform.display_name));
            let result = lc.sync();
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            result
        }
        None => {
            let pb = spinner(ctx, format!("syncing {}...", platform.display_name));
            let result = lifecycle::sync_platform(&console, platform);
            if let Some(pb) = pb {
                pb.finish_and_clear();
            }
            result
        }
    };

    let mut entry = AuditEntry::new(
        "sync",
        if result.is_ok() {
            AuditStatus::Ok
        } else {
            AuditStatus::Failed
        },
    )
    .platform(platform.id.slug());
    if let Some(id) = &args.id {
        entry = entry.target(id);
    }
    if let Err(e) = &result {
        entry = entry.message(e.to_string());
    }
    audit(ctx, started_at, &entry);

    let outcome = result.map_err(exit::lifecycle)?;
    if ctx.json {
        return write_json(&outcome);
    }
    if !ctx.ui.quiet {
        let mut line = format!("synced {}", platform.display_name);
        if let Some(n) = outcome.items_synced {
            line.push_str(&format!(": {n} items"));
        }
        if let Some(m) = &outcome.message {
            line.push_str(&format!(" ({m})"));
        }
        println!("{line}");
    }
    Ok(())
}

fn disconnect(ctx: &RunContext, args: DisconnectArgs) -> Result<()> {
    let platform = parse_platform(&args.platform)?;
    require_available(platform)?;

    if !args.yes {
        if !(ctx.ui.stdin_is_tty && ctx.ui.stderr_is_tty) {
            return Err(exit::invalid_args(
                "disconnect needs a TTY to confirm; pass --yes to skip the prompt",
            ));
        }
        let what = match &args.id {
            Some(id) => format!("{} {} {id}", platform.display_name, platform.noun),
            None => format!("all {} connections and stored credentials", platform.display_name),
        };
        if !interactive::confirm(&format!("Disconnect {what}?"))? {
            if !ctx.ui.quiet {
                eprintln!("cancelled");
            }
            return Ok(());
        }
    }

    let console = build_console(ctx)?;
    let started_at = OffsetDateTime::now_utc();

    let Some(id) = &args.id else {
        let result = lifecycle::disconnect_platform(&console, platform);
        let (status, steps, message) = match &result {
            Ok(report) => (AuditStatus::Ok, report.steps.clone(), None),
            Err(err @ LifecycleError::Cleanup { report, .. }) => (
                lifecycle_audit_status(err),
                report.steps.clone(),
                Some(err.to_string()),
            ),
            Err(err) => (lifecycle_audit_status(err), Vec::new(), Some(err.to_string())),
        };
        let mut entry = AuditEntry::new("disconnect", status)
            .platform(platform.id.slug())
            .steps(steps);
        if let Some(m) = message {
            entry = entry.message(m);
        }
        audit(ctx, started_at, &entry);

        return match result {
            Ok(report) => {
                if ctx.json {
                    write_json(&report)
                } else {
                    if !ctx.ui.quiet {
                        ui::write_disconnect_report(&mut io::stdout().lock(), &report);
                    }
                    Ok(())
                }
            }
            Err(err) => {
                if let LifecycleError::Cleanup { report, .. } = &err {
                    if !ctx.json {
                        ui::write_disconnect_report(&mut io::stdout().lock(), report);
                    }
                }
                Err(exit::lifecycle(err))
            }
        };
    };

    let connection = find_connection(&console, platform, id)?;
    let mut lc = ConnectionLifecycle::resume(&console, platform, connection);
    let result = lc.disconnect();
    let mut entry = AuditEntry::new(
        "disconnect",
        if result.is_ok() {
            AuditStatus::Ok
        } else {
            AuditStatus::Failed
        },
    )
    .platform(platform.id.slug())
    .target(id);
    if let Err(e) = &result {
        entry = entry.message(e.to_string());
    }
    audit(ctx, started_at, &entry);

    result.map_err(exit::lifecycle)?;
    if ctx.json {
        return write_json(&serde_json::json!({"disconnected": id, "platform": platform.id.slug()}));
    }
    if !ctx.ui.quiet {
        println!("disconnected {} {} {id}", platform.display_name, platform.noun);
    }
    Ok(())
}

fn dashboard(ctx: &RunContext, args: DashboardArgs) -> Result<()> {
    let console = Arc::new(build_console(ctx)?);
    let page = pages::dashboard(&*console);
    if !args.watch {
        return render_page(ctx, &page, |out| ui::write_dashboard(out, &page, &ctx.ui));
    }
    if ctx.json {
        return Err(exit::invalid_args("dashboard --watch cannot be combined with --json"));
    }

    ui::write_dashboard(&mut io::stdout().lock(), &page, &ctx.ui);
    let interval = ctx.cfg.refresh_interval();
    eprintln!(
        "refreshing every {}s; press Enter to stop",
        interval.as_secs()
    );

    let ui_cfg = ctx.ui.clone();
    let worker = Arc::clone(&console);
    let timer = AutoRefresh::start(interval, move || {
        worker.refresh();
        let page = pages::dashboard(&*worker);
        let mut out = io::stdout().lock();
        let _ = writeln_separator(&mut out);
        ui::write_dashboard(&mut out, &page, &ui_cfg);
    });

    let mut line = String::new();
    let _ = io::stdin().read_line(&mut line);
    drop(timer);
    Ok(())
}

fn writeln_separator(out: &mut dyn io::Write) -> io::Result<()> {
    let now = OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_default();
    writeln!(out, "\n--- {now} ---")
}

fn write_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(value)?;

    let mut stdout = io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

#[derive(Debug, Serialize)]
struct PlatformSummary {
    id: &'static str,
    name: &'static str,
    available: bool,
    auth_methods: Vec<&'static str>,
    oauth_scopes: Vec<&'static str>,
}

impl From<&'static PlatformSpec> for PlatformSummary {
    fn from(p: &'static PlatformSpec) -> Self {
        Self {
            id: p.id.slug(),
            name: p.display_name,
            available: p.is_available(),
            auth_methods: p.auth_options.iter().map(|o| o.method.as_str()).collect(),
            oauth_scopes: p.oauth_scopes.iter().map(|s| s.name).collect(),
        }
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
