use std::{process, sync::Arc};

use apalis::prelude::{Monitor, WorkerBuilder, WorkerFactoryFn};
use apalis_cron::CronStream;
use hotdog_diaries::{
    application::{
        admin_auth::AdminAuth,
        error::AppError,
        jobs::{ScheduleJobContext, process_missed_sweep_job, process_refill_job},
        pool::PoolAdminService,
        repos::{ContentPoolRepo, HealthRepo, PostedContentRepo, ScheduleRepo},
        schedule::{
            DayFiller, FillerOptions, ForecastService, ReconcileService, RefillService,
            SlotCalendar, SlotOutcomeService,
        },
    },
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, AdminState},
        telemetry,
    },
    util::parse_iso_date,
};
use serde::Serialize;
use time::{Date, OffsetDateTime};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()
        .map_err(|err| AppError::unexpected(format!("failed to load configuration: {err}")))?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging).map_err(AppError::from)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Refill(args) => run_refill(settings, args).await,
        config::Command::Forecast(args) => run_forecast(settings, args).await,
        config::Command::Reconcile(args) => run_reconcile(settings, args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let token = settings
        .admin
        .token
        .as_deref()
        .ok_or_else(|| InfraError::configuration("admin token is not configured"))?;
    let auth = AdminAuth::new(token).map_err(|err| InfraError::configuration(err.to_string()))?;

    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);

    let admin_state = AdminState {
        auth: Arc::new(auth),
        calendar: app.calendar.clone(),
        forecast: app.forecast,
        refill: app.refill.clone(),
        reconcile: app.reconcile,
        outcomes: app.outcomes.clone(),
        pool: app.pool,
        health: app.health,
    };

    let job_context = ScheduleJobContext {
        refill: app.refill,
        outcomes: app.outcomes,
        calendar: app.calendar,
    };
    let monitor_handle = spawn_job_monitor(job_context, &settings.jobs);

    let result = serve_http(&settings, admin_state).await;

    if let Some(handle) = monitor_handle {
        handle.abort();
        let _ = handle.await;
    }

    result
}

async fn run_refill(settings: config::Settings, args: config::RefillArgs) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);
    let start = resolve_cli_date(args.date.as_deref(), &app.calendar)?;

    let report = app.refill.refill_days(start, args.days).await?;
    print_json(&report)
}

async fn run_forecast(
    settings: config::Settings,
    args: config::ForecastArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);
    let date = resolve_cli_date(args.date.as_deref(), &app.calendar)?;

    let forecast = app.forecast.forecast(date).await?;
    print_json(&forecast)
}

async fn run_reconcile(
    settings: config::Settings,
    args: config::ReconcileArgs,
) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;
    let app = build_application_context(repositories, &settings);
    let date = resolve_cli_date(args.date.as_deref(), &app.calendar)?;

    let report = app.reconcile.reconcile(date, args.repair).await?;
    if !report.is_clean() {
        warn!(
            target = "hotdog::reconcile",
            date = %report.date,
            missed = report.repaired.marked_missed,
            posted = report.repaired.marked_posted,
            released = report.repaired.released,
            "reconcile found inconsistencies"
        );
    }
    print_json(&report)
}

fn resolve_cli_date(raw: Option<&str>, calendar: &SlotCalendar) -> Result<Date, AppError> {
    match raw.map(str::trim).filter(|value| !value.is_empty()) {
        Some(value) => parse_iso_date(value)
            .map_err(|err| AppError::validation(format!("invalid date `{value}`: {err}"))),
        None => calendar
            .today(OffsetDateTime::now_utc())
            .map_err(|err| AppError::unexpected(err.to_string())),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    let rendered = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to encode output: {err}")))?;
    println!("{rendered}");
    Ok(())
}

struct ApplicationContext {
    calendar: SlotCalendar,
    forecast: Arc<ForecastService>,
    refill: Arc<RefillService>,
    reconcile: Arc<ReconcileService>,
    outcomes: Arc<SlotOutcomeService>,
    pool: Arc<PoolAdminService>,
    health: Arc<dyn HealthRepo>,
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)?;

    let pool = PostgresRepositories::connect(database_url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

fn build_application_context(
    repositories: Arc<PostgresRepositories>,
    settings: &config::Settings,
) -> ApplicationContext {
    let pool_repo: Arc<dyn ContentPoolRepo> = repositories.clone();
    let schedule_repo: Arc<dyn ScheduleRepo> = repositories.clone();
    let posted_repo: Arc<dyn PostedContentRepo> = repositories.clone();
    let health_repo: Arc<dyn HealthRepo> = repositories;

    let schedule = &settings.schedule;
    let calendar = SlotCalendar::new(schedule.timezone, schedule.slot_times);

    let filler = DayFiller::new(
        pool_repo.clone(),
        schedule_repo.clone(),
        calendar.clone(),
        FillerOptions {
            max_platform_share: schedule.max_platform_share,
            candidate_window: schedule.candidate_window.get(),
        },
    );

    ApplicationContext {
        forecast: Arc::new(ForecastService::new(
            pool_repo.clone(),
            schedule_repo.clone(),
            calendar.clone(),
            schedule.max_platform_share,
        )),
        refill: Arc::new(RefillService::new(filler)),
        reconcile: Arc::new(ReconcileService::new(
            schedule_repo.clone(),
            posted_repo,
            calendar.clone(),
            schedule.missed_grace,
        )),
        outcomes: Arc::new(SlotOutcomeService::new(
            schedule_repo,
            schedule.missed_grace,
        )),
        pool: Arc::new(PoolAdminService::new(pool_repo)),
        health: health_repo,
        calendar,
    }
}

fn spawn_job_monitor(
    context: ScheduleJobContext,
    jobs: &config::JobsSettings,
) -> Option<tokio::task::JoinHandle<()>> {
    if !jobs.refill_enabled && !jobs.sweep_enabled {
        info!(target = "hotdog::jobs", "cron workers disabled");
        return None;
    }

    let mut monitor = Monitor::new();

    if jobs.refill_enabled {
        let refill_worker = WorkerBuilder::new("refill-worker")
            .data(context.clone())
            .backend(CronStream::new(jobs.refill_schedule.clone()))
            .build_fn(process_refill_job);
        monitor = monitor.register(refill_worker);
    }

    if jobs.sweep_enabled {
        let sweep_worker = WorkerBuilder::new("missed-sweep-worker")
            .data(context)
            .backend(CronStream::new(jobs.sweep_schedule.clone()))
            .build_fn(process_missed_sweep_job);
        monitor = monitor.register(sweep_worker);
    }

    info!(
        target = "hotdog::jobs",
        refill = jobs.refill_enabled,
        sweep = jobs.sweep_enabled,
        "cron workers starting"
    );

    Some(tokio::spawn(async move {
        if let Err(err) = monitor.run().await {
            error!(error = %err, "job monitor stopped");
        }
    }))
}

async fn serve_http(settings: &config::Settings, admin_state: AdminState) -> Result<(), AppError> {
    let admin_router = http::build_admin_router(admin_state);

    let admin_listener = tokio::net::TcpListener::bind(settings.server.admin_addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    info!(
        target = "hotdog::http",
        addr = %settings.server.admin_addr,
        "admin listener bound"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(admin_listener, admin_router.into_make_service())
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.await;
        });
    let mut server = tokio::spawn(async move { server.await });

    tokio::select! {
        joined = &mut server => {
            return joined
                .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
                .map_err(|err| AppError::unexpected(format!("server error: {err}")));
        }
        signal = tokio::signal::ctrl_c() => {
            signal.map_err(|err| AppError::from(InfraError::from(err)))?;
        }
    }

    info!(target = "hotdog::http", "shutdown requested, draining connections");
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => joined
            .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
            .map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(_) => {
            warn!(
                target = "hotdog::http",
                timeout_secs = settings.server.graceful_shutdown.as_secs(),
                "graceful shutdown timed out"
            );
            server.abort();
            Ok(())
        }
    }
}
