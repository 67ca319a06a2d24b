use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use timetable_grid::api::router;
use timetable_grid::config::{BackendKind, Config};
use timetable_grid::db::{self, SqliteTimetableBackend};
use timetable_grid::persistence::{HttpTimetableBackend, TimetableBackend};
use timetable_grid::services::{RefreshScheduler, TimetableService};
use timetable_grid::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "timetable_grid=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (backend, db) = match &config.backend {
        BackendKind::Sqlite { database_url } => {
            let pool = db::connect(database_url, 5).await?;
            info!("using sqlite timetable store at {}", database_url);
            let backend: Arc<dyn TimetableBackend> =
                Arc::new(SqliteTimetableBackend::new(pool.clone()));
            (backend, Some(pool))
        }
        BackendKind::Http { base_url, .. } => {
            let http = config
                .backend
                .http_config()
                .ok_or("http backend selected without configuration")?;
            info!("using timetable service at {}", base_url);
            let backend: Arc<dyn TimetableBackend> = Arc::new(HttpTimetableBackend::new(http)?);
            (backend, None)
        }
    };

    let service = TimetableService::new(backend);

    if config.refresh_interval().is_some() {
        let scheduler = RefreshScheduler::new(service.clone(), config.refresh_interval_secs);
        tokio::spawn(scheduler.start());
    }

    let state = AppState { service, db };
    let app = router(state);

    info!("listening on http://{}", config.bind_addr);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
