use actix_web::{web, App, HttpServer};
use civic_cache::{CacheMetrics, KeyValueCache, RedisCache};
use report_service::repository::{ContactDirectory, PgReportStore, ReportStore};
use report_service::services::{
    notification_queue, spawn_notification_dispatcher, LogMailer, Mailer, SmtpMailer,
};
use report_service::{handlers, Config, CoreSettings, ReportCore};
use sqlx::postgres::PgPoolOptions;
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const NOTIFICATION_DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

fn init_tracing(log_format: &str) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,report_service=debug,civic_cache=debug,sqlx=warn".into());

    if log_format.eq_ignore_ascii_case("json") {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn io_error(context: &str, e: impl std::fmt::Display) -> io::Error {
    io::Error::new(io::ErrorKind::Other, format!("{}: {}", context, e))
}

/// Report Service
///
/// Civic issue reports with cached, engagement-enriched listings and an admin dashboard.
#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();

    let config = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("ERROR: Failed to load configuration: {:#}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.app.log_format);

    tracing::info!("Starting report-service v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!("Environment: {}", config.app.env);

    if let Err(e) = CacheMetrics::register(prometheus::default_registry()) {
        tracing::warn!("Cache metrics registration failed: {}", e);
    }

    // Database
    let db_pool = PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .min_connections(config.database.min_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect(&config.database.url)
        .await
        .map_err(|e| io_error("Failed to connect to database", e))?;

    sqlx::migrate!("./migrations")
        .run(&db_pool)
        .await
        .map_err(|e| io_error("Failed to run migrations", e))?;

    tracing::info!(
        max_connections = config.database.max_connections,
        "Connected to database"
    );

    // Redis
    let redis_cache = RedisCache::connect(&config.redis.url)
        .await
        .map_err(|e| io_error("Failed to connect to Redis", e))?;
    if let Err(e) = redis_cache.ping().await {
        tracing::warn!("Redis ping failed; reads will fall through to the store: {}", e);
    }
    tracing::info!("Connected to Redis");

    let pg_store = Arc::new(PgReportStore::new(db_pool.clone()));
    let store: Arc<dyn ReportStore> = pg_store.clone();
    let cache: Arc<dyn KeyValueCache> = Arc::new(redis_cache);

    // Notifications
    let mailer: Arc<dyn Mailer> = match &config.notifications.smtp_host {
        Some(host) => {
            let credentials = config
                .notifications
                .smtp_username
                .clone()
                .zip(config.notifications.smtp_password.clone());
            let directory: Arc<dyn ContactDirectory> = pg_store.clone();
            let mailer = SmtpMailer::new(
                host,
                credentials,
                &config.notifications.smtp_from,
                directory,
            )
            .map_err(|e| io_error("Failed to configure SMTP mailer", format!("{:#}", e)))?;
            tracing::info!(smtp_host = %host, "SMTP notifications enabled");
            Arc::new(mailer)
        }
        None => {
            tracing::warn!("SMTP_HOST not set; notifications are logged only");
            Arc::new(LogMailer)
        }
    };

    let (notifications, notification_rx) =
        notification_queue(config.notifications.queue_capacity);
    let dispatcher = spawn_notification_dispatcher(
        notification_rx,
        mailer,
        config.notifications.workers,
    );

    let core = ReportCore::new(
        store,
        cache,
        notifications,
        CoreSettings {
            listing_ttl_secs: config.cache.listing_ttl_secs,
            dashboard_ttl_secs: config.cache.dashboard_ttl_secs,
            query_timeout: config.query_timeout(),
        },
    );

    let http_bind_address = format!("{}:{}", config.app.host, config.app.http_port);
    tracing::info!("Starting HTTP server at {}", http_bind_address);

    let core_data = web::Data::new(core);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(core_data.clone())
            .wrap(tracing_actix_web::TracingLogger::default())
            .configure(handlers::configure)
    })
    .bind(&http_bind_address)?
    .disable_signals()
    .shutdown_timeout(30)
    .run();

    let server_handle = server.handle();

    let mut tasks: JoinSet<io::Result<()>> = JoinSet::new();
    tasks.spawn(async move {
        tracing::info!("HTTP server is running");
        server.await
    });

    let mut first_error: Option<io::Error> = None;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = tasks.join_next() => {
                match result {
                    Some(Ok(Ok(_))) => {
                        tracing::info!("HTTP server stopped");
                    }
                    Some(Ok(Err(e))) => {
                        tracing::error!("Task returned error: {}", e);
                        first_error.get_or_insert(e);
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    Some(Err(e)) => {
                        tracing::error!("Task join error: {}", e);
                        first_error.get_or_insert_with(|| io_error("Task join error", e));
                        server_handle.stop(true).await;
                        tasks.shutdown().await;
                        break;
                    }
                    None => break,
                }
            }
            _ = &mut shutdown => {
                tracing::info!("Shutdown signal received");
                server_handle.stop(true).await;
                while tasks.join_next().await.is_some() {}
                break;
            }
        }
    }

    // The server's app factory owned the last queue senders; the dispatcher now drains and exits.
    match tokio::time::timeout(NOTIFICATION_DRAIN_TIMEOUT, dispatcher).await {
        Ok(Ok(())) => tracing::info!("Notification queue drained"),
        Ok(Err(e)) => tracing::error!("Notification dispatcher failed: {}", e),
        Err(_) => tracing::warn!(
            "Notification queue not drained within {:?}",
            NOTIFICATION_DRAIN_TIMEOUT
        ),
    }

    db_pool.close().await;
    tracing::info!("Report-service shutting down");

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
