//! Configuration layer: typed settings with layered precedence (file → env → CLI).

use std::{
    net::SocketAddr,
    num::NonZeroU32,
    path::PathBuf,
    str::FromStr,
    time::Duration,
};

use apalis_cron::Schedule;
use chrono_tz::Tz;
use clap::{Args, Parser, Subcommand, builder::BoolishValueParser};
use config::{Config, Environment, File};
use serde::Deserialize;
use thiserror::Error;
use time::{Time, format_description::BorrowedFormatItem, macros::format_description};
use tracing::level_filters::LevelFilter;

use crate::application::jobs::{DEFAULT_REFILL_CRON, DEFAULT_SWEEP_CRON};
use crate::application::schedule::calendar::DEFAULT_SLOT_TIMES;
use crate::application::schedule::filler::{DEFAULT_CANDIDATE_WINDOW, DEFAULT_MAX_PLATFORM_SHARE};
use crate::application::schedule::reconcile::DEFAULT_MISSED_GRACE;
use crate::domain::schedule::SLOTS_PER_DAY;

const DEFAULT_CONFIG_BASENAME: &str = "config/default";
const LOCAL_CONFIG_BASENAME: &str = "hotdog";
const DEFAULT_ADMIN_HOST: &str = "127.0.0.1";
const DEFAULT_ADMIN_PORT: u16 = 3001;
const DEFAULT_GRACEFUL_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 8;
const DEFAULT_TIMEZONE: &str = "America/New_York";

const SLOT_TIME_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[hour]:[minute]");

/// Command-line arguments for the Hotdog Diaries binary.
#[derive(Debug, Parser)]
#[command(name = "hotdog-diaries", version, about = "Hotdog Diaries scheduling service")]
pub struct CliArgs {
    /// Optional path to a configuration file.
    #[arg(long = "config-file", env = "HOTDOG_CONFIG_FILE", value_name = "PATH")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run the admin HTTP service and cron workers.
    Serve(Box<ServeArgs>),
    /// Fill empty slots for a run of days and print the report.
    Refill(RefillArgs),
    /// Print the slot forecast for one day.
    Forecast(ForecastArgs),
    /// Compare a day's slots against posted content.
    Reconcile(ReconcileArgs),
}

#[derive(Debug, Args, Default, Clone)]
pub struct DatabaseOverride {
    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeArgs {
    #[command(flatten)]
    pub overrides: ServeOverrides,
}

#[derive(Debug, Args, Default, Clone)]
pub struct ServeOverrides {
    /// Override the administrative listener host.
    #[arg(long = "server-admin-host", value_name = "HOST")]
    pub server_admin_host: Option<String>,

    /// Override the administrative listener port.
    #[arg(long = "server-admin-port", value_name = "PORT")]
    pub admin_port: Option<u16>,

    /// Override the graceful shutdown timeout.
    #[arg(long = "server-graceful-shutdown-seconds", value_name = "SECONDS")]
    pub server_graceful_shutdown_seconds: Option<u64>,

    /// Override the base log level (trace|debug|info|warn|error).
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Toggle JSON logging.
    #[arg(
        long = "log-json",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub log_json: Option<bool>,

    /// Override the database connection URL.
    #[arg(long = "database-url", value_name = "URL")]
    pub database_url: Option<String>,

    /// Override the database pool size.
    #[arg(long = "database-max-connections", value_name = "COUNT")]
    pub database_max_connections: Option<u32>,

    /// Enable or disable the refill cron worker.
    #[arg(
        long = "jobs-refill-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub jobs_refill_enabled: Option<bool>,

    /// Enable or disable the missed-slot sweep worker.
    #[arg(
        long = "jobs-sweep-enabled",
        value_name = "BOOL",
        value_parser = BoolishValueParser::new()
    )]
    pub jobs_sweep_enabled: Option<bool>,
}

#[derive(Debug, Args, Clone)]
pub struct RefillArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// First day to fill (YYYY-MM-DD); defaults to today in the posting timezone.
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,

    /// Number of consecutive days to fill.
    #[arg(long, default_value_t = 2)]
    pub days: u32,
}

#[derive(Debug, Args, Clone)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Day to forecast (YYYY-MM-DD); defaults to today in the posting timezone.
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct ReconcileArgs {
    #[command(flatten)]
    pub database: DatabaseOverride,

    /// Day to reconcile (YYYY-MM-DD); defaults to today in the posting timezone.
    #[arg(long, value_name = "DATE")]
    pub date: Option<String>,

    /// Apply repairs instead of only reporting.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub repair: bool,
}

/// Fully-resolved deployment settings after precedence resolution and validation.
#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub logging: LoggingSettings,
    pub database: DatabaseSettings,
    pub admin: AdminSettings,
    pub schedule: ScheduleSettings,
    pub jobs: JobsSettings,
}

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub admin_addr: SocketAddr,
    pub graceful_shutdown: Duration,
}

#[derive(Debug, Clone)]
pub struct LoggingSettings {
    pub level: LevelFilter,
    pub format: LogFormat,
}

#[derive(Debug, Clone, Copy)]
pub enum LogFormat {
    Json,
    Compact,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: Option<String>,
    pub max_connections: NonZeroU32,
}

#[derive(Clone)]
pub struct AdminSettings {
    pub token: Option<String>,
}

impl std::fmt::Debug for AdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminSettings")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct ScheduleSettings {
    pub timezone: Tz,
    pub slot_times: [Time; SLOTS_PER_DAY],
    pub max_platform_share: f64,
    pub candidate_window: NonZeroU32,
    pub missed_grace: time::Duration,
}

#[derive(Debug, Clone)]
pub struct JobsSettings {
    pub refill_enabled: bool,
    pub refill_schedule: Schedule,
    pub sweep_enabled: bool,
    pub sweep_schedule: Schedule,
}

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to build configuration: {0}")]
    Build(#[from] config::ConfigError),
    #[error("invalid configuration for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl LoadError {
    fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

/// Load settings using the configured precedence (file → environment → CLI).
pub fn load(cli: &CliArgs) -> Result<Settings, LoadError> {
    let mut builder = Config::builder()
        .add_source(File::with_name(DEFAULT_CONFIG_BASENAME).required(false))
        .add_source(File::with_name(LOCAL_CONFIG_BASENAME).required(false));

    if let Some(path) = cli.config_file.as_ref() {
        builder = builder.add_source(File::from(path.as_path()).required(true));
    }

    builder = builder.add_source(
        Environment::with_prefix("HOTDOG")
            .separator("__")
            .list_separator(",")
            .with_list_parse_key("schedule.slot_times")
            .try_parsing(true),
    );

    let mut raw: RawSettings = builder.build()?.try_deserialize()?;

    match cli.command.as_ref() {
        Some(Command::Serve(args)) => raw.apply_serve_overrides(&args.overrides),
        Some(Command::Refill(args)) => raw.apply_database_override(&args.database),
        Some(Command::Forecast(args)) => raw.apply_database_override(&args.database),
        Some(Command::Reconcile(args)) => raw.apply_database_override(&args.database),
        None => raw.apply_serve_overrides(&ServeOverrides::default()),
    }

    Settings::from_raw(raw)
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawSettings {
    server: RawServerSettings,
    logging: RawLoggingSettings,
    database: RawDatabaseSettings,
    admin: RawAdminSettings,
    schedule: RawScheduleSettings,
    jobs: RawJobsSettings,
}

impl RawSettings {
    fn apply_serve_overrides(&mut self, overrides: &ServeOverrides) {
        if let Some(host) = overrides.server_admin_host.as_ref() {
            self.server.admin_host = Some(host.clone());
        }
        if let Some(port) = overrides.admin_port {
            self.server.admin_port = Some(port);
        }
        if let Some(seconds) = overrides.server_graceful_shutdown_seconds {
            self.server.graceful_shutdown_seconds = Some(seconds);
        }
        if let Some(level) = overrides.log_level.as_ref() {
            self.logging.level = Some(level.clone());
        }
        if let Some(json) = overrides.log_json {
            self.logging.json = Some(json);
        }
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
        if let Some(max) = overrides.database_max_connections {
            self.database.max_connections = Some(max);
        }
        if let Some(enabled) = overrides.jobs_refill_enabled {
            self.jobs.refill_enabled = Some(enabled);
        }
        if let Some(enabled) = overrides.jobs_sweep_enabled {
            self.jobs.sweep_enabled = Some(enabled);
        }
    }

    fn apply_database_override(&mut self, overrides: &DatabaseOverride) {
        if let Some(url) = overrides.database_url.as_ref() {
            self.database.url = Some(url.clone());
        }
    }
}

impl Settings {
    fn from_raw(raw: RawSettings) -> Result<Self, LoadError> {
        let RawSettings {
            server,
            logging,
            database,
            admin,
            schedule,
            jobs,
        } = raw;

        let server = build_server_settings(server)?;
        let logging = build_logging_settings(logging)?;
        let database = build_database_settings(database)?;
        let admin = build_admin_settings(admin);
        let schedule = build_schedule_settings(schedule)?;
        let jobs = build_jobs_settings(jobs)?;

        Ok(Self {
            server,
            logging,
            database,
            admin,
            schedule,
            jobs,
        })
    }
}

fn build_server_settings(server: RawServerSettings) -> Result<ServerSettings, LoadError> {
    let admin_host = server
        .admin_host
        .unwrap_or_else(|| DEFAULT_ADMIN_HOST.to_string());

    let admin_port = server.admin_port.unwrap_or(DEFAULT_ADMIN_PORT);
    if admin_port == 0 {
        return Err(LoadError::invalid(
            "server.admin_port",
            "port must be greater than zero",
        ));
    }

    let admin_addr = parse_socket_addr(&admin_host, admin_port)
        .map_err(|reason| LoadError::invalid("server.admin_addr", reason))?;

    let graceful_secs = server
        .graceful_shutdown_seconds
        .unwrap_or(DEFAULT_GRACEFUL_SHUTDOWN_SECS);
    if graceful_secs == 0 {
        return Err(LoadError::invalid(
            "server.graceful_shutdown_seconds",
            "must be greater than zero",
        ));
    }

    Ok(ServerSettings {
        admin_addr,
        graceful_shutdown: Duration::from_secs(graceful_secs),
    })
}

fn build_logging_settings(logging: RawLoggingSettings) -> Result<LoggingSettings, LoadError> {
    let level = match logging.level {
        Some(level) => LevelFilter::from_str(level.as_str()).map_err(|err| {
            LoadError::invalid("logging.level", format!("failed to parse: {err}"))
        })?,
        None => LevelFilter::INFO,
    };

    let format = if logging.json.unwrap_or(false) {
        LogFormat::Json
    } else {
        LogFormat::Compact
    };

    Ok(LoggingSettings { level, format })
}

fn build_database_settings(database: RawDatabaseSettings) -> Result<DatabaseSettings, LoadError> {
    let url = database.url.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });

    let max_value = database
        .max_connections
        .unwrap_or(DEFAULT_DB_MAX_CONNECTIONS);
    let max_connections = non_zero_u32(max_value.into(), "database.max_connections")?;

    Ok(DatabaseSettings {
        url,
        max_connections,
    })
}

fn build_admin_settings(admin: RawAdminSettings) -> AdminSettings {
    let token = admin.token.and_then(|value| {
        let trimmed = value.trim();
        (!trimmed.is_empty()).then(|| trimmed.to_string())
    });
    AdminSettings { token }
}

fn build_schedule_settings(schedule: RawScheduleSettings) -> Result<ScheduleSettings, LoadError> {
    let timezone_name = schedule
        .timezone
        .unwrap_or_else(|| DEFAULT_TIMEZONE.to_string());
    let timezone = timezone_name
        .trim()
        .parse::<Tz>()
        .map_err(|err| LoadError::invalid("schedule.timezone", err.to_string()))?;

    let slot_times = match schedule.slot_times {
        Some(raw_times) => parse_slot_times(&raw_times)?,
        None => DEFAULT_SLOT_TIMES,
    };

    let max_platform_share = schedule
        .max_platform_share
        .unwrap_or(DEFAULT_MAX_PLATFORM_SHARE);
    if !(max_platform_share > 0.0 && max_platform_share <= 1.0) {
        return Err(LoadError::invalid(
            "schedule.max_platform_share",
            "must be in (0, 1]",
        ));
    }

    let candidate_window = non_zero_u32(
        schedule
            .candidate_window
            .unwrap_or(DEFAULT_CANDIDATE_WINDOW)
            .into(),
        "schedule.candidate_window",
    )?;

    let missed_grace = match schedule.missed_grace_minutes {
        Some(minutes) => i64::try_from(minutes)
            .map(time::Duration::minutes)
            .map_err(|_| {
                LoadError::invalid(
                    "schedule.missed_grace_minutes",
                    "value exceeds supported range",
                )
            })?,
        None => DEFAULT_MISSED_GRACE,
    };

    Ok(ScheduleSettings {
        timezone,
        slot_times,
        max_platform_share,
        candidate_window,
        missed_grace,
    })
}

fn parse_slot_times(raw: &[String]) -> Result<[Time; SLOTS_PER_DAY], LoadError> {
    if raw.len() != SLOTS_PER_DAY {
        return Err(LoadError::invalid(
            "schedule.slot_times",
            format!("expected {SLOTS_PER_DAY} times, got {}", raw.len()),
        ));
    }

    let mut times = DEFAULT_SLOT_TIMES;
    for (slot, value) in times.iter_mut().zip(raw) {
        *slot = Time::parse(value.trim(), SLOT_TIME_FORMAT).map_err(|err| {
            LoadError::invalid("schedule.slot_times", format!("`{value}`: {err}"))
        })?;
    }

    if !times.windows(2).all(|pair| pair[0] < pair[1]) {
        return Err(LoadError::invalid(
            "schedule.slot_times",
            "times must be strictly increasing",
        ));
    }

    Ok(times)
}

fn build_jobs_settings(jobs: RawJobsSettings) -> Result<JobsSettings, LoadError> {
    let refill_cron = jobs
        .refill_cron
        .unwrap_or_else(|| DEFAULT_REFILL_CRON.to_string());
    let sweep_cron = jobs
        .sweep_cron
        .unwrap_or_else(|| DEFAULT_SWEEP_CRON.to_string());

    Ok(JobsSettings {
        refill_enabled: jobs.refill_enabled.unwrap_or(true),
        refill_schedule: parse_schedule(&refill_cron, "jobs.refill_cron")?,
        sweep_enabled: jobs.sweep_enabled.unwrap_or(true),
        sweep_schedule: parse_schedule(&sweep_cron, "jobs.sweep_cron")?,
    })
}

fn parse_schedule(expression: &str, key: &'static str) -> Result<Schedule, LoadError> {
    Schedule::from_str(expression.trim())
        .map_err(|err| LoadError::invalid(key, format!("`{expression}`: {err}")))
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawServerSettings {
    admin_host: Option<String>,
    admin_port: Option<u16>,
    graceful_shutdown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawLoggingSettings {
    level: Option<String>,
    json: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawDatabaseSettings {
    url: Option<String>,
    max_connections: Option<u32>,
}

#[derive(Clone, Deserialize, Default)]
#[serde(default)]
struct RawAdminSettings {
    token: Option<String>,
}

impl std::fmt::Debug for RawAdminSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RawAdminSettings").finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawScheduleSettings {
    timezone: Option<String>,
    slot_times: Option<Vec<String>>,
    max_platform_share: Option<f64>,
    candidate_window: Option<u32>,
    missed_grace_minutes: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
struct RawJobsSettings {
    refill_enabled: Option<bool>,
    refill_cron: Option<String>,
    sweep_enabled: Option<bool>,
    sweep_cron: Option<String>,
}

fn parse_socket_addr(host: &str, port: u16) -> Result<SocketAddr, String> {
    let candidate = format!("{host}:{port}");
    candidate
        .parse()
        .map_err(|err| format!("invalid address `{candidate}`: {err}"))
}

fn non_zero_u32(value: u64, key: &'static str) -> Result<NonZeroU32, LoadError> {
    if value == 0 {
        return Err(LoadError::invalid(key, "must be greater than zero"));
    }
    let value_u32: u32 = value
        .try_into()
        .map_err(|_| LoadError::invalid(key, "value exceeds supported range for u32"))?;
    NonZeroU32::new(value_u32).ok_or_else(|| LoadError::invalid(key, "must be greater than zero"))
}

/// Resolve configuration using the supplied CLI arguments, returning both for downstream use.
pub fn load_with_cli() -> Result<(CliArgs, Settings), LoadError> {
    let args = CliArgs::parse();
    let settings = load(&args)?;
    Ok((args, settings))
}
