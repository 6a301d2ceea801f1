use std::{future::IntoFuture, process, sync::Arc, time::Duration};

use clubsite::{
    application::{auth::AdminAuthenticator, error::AppError},
    cache::{CacheBackend, CacheConfig, CacheStore, MemoryCacheStore, ResponseCache},
    config,
    infra::{
        db::{PostgresCacheStore, PostgresRepositories},
        error::InfraError,
        http::{self, HttpState},
        memory::MemoryRepositories,
        telemetry,
    },
};
use sqlx::PgPool;
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
        config::Command::Migrate(_) => run_migrate(settings).await,
        config::Command::RefreshCache(_) => run_refresh_cache(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let pool = match settings.database.url.as_deref() {
        Some(url) => {
            let pool = connect(url, &settings).await?;
            PostgresRepositories::run_migrations(&pool)
                .await
                .map_err(|err| AppError::from(InfraError::from(err)))?;
            Some(pool)
        }
        None => None,
    };

    let cache = build_cache(&settings, pool.as_ref());
    if let Some(pool) = pool.as_ref()
        && settings.cache.backend == CacheBackend::Postgres
    {
        let period = CacheConfig::from(&settings.cache).hard_ttl;
        PostgresCacheStore::new(pool.clone()).spawn_purge_task(period);
        info!(
            target = "clubsite::startup",
            period_secs = period.as_secs(),
            "Expired cache rows are purged periodically"
        );
    }
    let auth = AdminAuthenticator::new(settings.auth.admin_tokens.iter());
    if !auth.is_configured() {
        warn!(
            target = "clubsite::auth",
            "No admin tokens configured; write endpoints will reject every request"
        );
    }

    let state = match pool {
        Some(pool) => {
            info!(target = "clubsite::startup", "Using Postgres repositories");
            HttpState::new(Arc::new(PostgresRepositories::new(pool)), cache, auth)
        }
        None => {
            info!(
                target = "clubsite::startup",
                "No database url configured; using in-memory repositories"
            );
            HttpState::new(Arc::new(MemoryRepositories::default()), cache, auth)
        }
    };

    serve_http(&settings, state).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let url = require_database_url(&settings)?;
    let pool = connect(url, &settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(target = "clubsite::migrate", "Migrations applied");
    Ok(())
}

async fn run_refresh_cache(settings: config::Settings) -> Result<(), AppError> {
    if settings.cache.backend == CacheBackend::Memory {
        warn!(
            target = "clubsite::cache",
            "The memory cache backend lives inside the server process; nothing to refresh"
        );
        return Ok(());
    }

    let url = require_database_url(&settings)?;
    let pool = connect(url, &settings).await?;
    let cache = build_cache(&settings, Some(&pool));
    let generation = cache.generation().bump().await?;
    info!(
        target = "clubsite::cache",
        generation = %generation,
        "Cache generation advanced"
    );
    Ok(())
}

fn require_database_url(settings: &config::Settings) -> Result<&str, AppError> {
    settings
        .database
        .url
        .as_deref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))
        .map_err(AppError::from)
}

async fn connect(url: &str, settings: &config::Settings) -> Result<PgPool, AppError> {
    PostgresRepositories::connect(url, settings.database.max_connections.get())
        .await
        .map_err(|err| AppError::from(InfraError::database(err.to_string())))
}

fn build_cache(settings: &config::Settings, pool: Option<&PgPool>) -> ResponseCache {
    let config = CacheConfig::from(&settings.cache);
    let store: Arc<dyn CacheStore> = match (config.backend, pool) {
        (CacheBackend::Postgres, Some(pool)) => Arc::new(PostgresCacheStore::new(pool.clone())),
        _ => Arc::new(MemoryCacheStore::new(&config)),
    };
    info!(
        target = "clubsite::startup",
        enabled = config.is_enabled(),
        backend = config.backend.as_str(),
        soft_ttl_secs = config.soft_ttl.as_secs(),
        hard_ttl_secs = config.hard_ttl.as_secs(),
        "Response cache configured"
    );
    ResponseCache::new(config, store)
}

async fn serve_http(settings: &config::Settings, state: HttpState) -> Result<(), AppError> {
    let router = http::build_router(state);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "clubsite::startup",
        addr = %settings.server.addr,
        "Listening"
    );

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server = axum::serve(listener, router.into_make_service()).with_graceful_shutdown(
        async move {
            let _ = shutdown_rx.await;
        },
    );
    let mut server = tokio::spawn(server.into_future());

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!(target = "clubsite::shutdown", "Shutdown requested; draining connections");
    let _ = shutdown_tx.send(());
    drain(server, settings.server.graceful_shutdown).await
}

async fn drain(
    server: tokio::task::JoinHandle<std::io::Result<()>>,
    grace: Duration,
) -> Result<(), AppError> {
    match tokio::time::timeout(grace, server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "clubsite::shutdown",
                grace_secs = grace.as_secs(),
                "Connections still open after the grace period; exiting"
            );
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(result) => result.map_err(|err| AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                error!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
