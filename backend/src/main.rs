use actix_web::{web, App, HttpServer};
use anyhow::Context;
use dotenv::dotenv;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use fall_sentinel::alert::EmergencyDispatcher;
use fall_sentinel::collaborators::{LogMessageSender, StaticContacts, StaticLocation};
use fall_sentinel::config::SentinelConfig;
use fall_sentinel::logic::FallDetector;
use fall_sentinel::sensors::ChannelSensorSource;
use fall_sentinel::server::{configure, AppState};
use fall_sentinel::service::{BroadcastPresenter, FallMonitor};
use fall_sentinel::store::{IncidentStore, MemoryIncidentStore, PgIncidentStore};

/// **Application Entry Point**
///
/// Loads configuration, wires the monitor to its collaborators and starts the
/// HTTP / WebSocket gateway.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load environment variables from .env file
    dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let config = SentinelConfig::from_env().context("invalid configuration")?;

    // 2. Incident history: Postgres if configured, memory otherwise
    let incidents: Arc<dyn IncidentStore> = match &config.database_url {
        Some(url) => Arc::new(
            PgIncidentStore::connect(url)
                .await
                .context("failed to connect to Postgres")?,
        ),
        None => {
            tracing::warn!("DATABASE_URL not set, incidents are kept in memory");
            Arc::new(MemoryIncidentStore::default())
        }
    };

    if config.contacts.is_empty() {
        tracing::warn!("No EMERGENCY_CONTACTS configured, alerts will reach nobody");
    }

    // 3. Broadcast System Setup
    // Capacity = 100 events (slow clients skip the oldest)
    let (tx, _rx) = broadcast::channel(100);

    let dispatcher = EmergencyDispatcher::new(
        config.alert.clone(),
        Arc::new(StaticLocation(config.last_known_location)),
        Arc::new(StaticContacts(config.contacts.clone())),
        Arc::new(LogMessageSender),
        Arc::new(BroadcastPresenter::new(tx.clone())),
    )
    .with_incident_store(Arc::clone(&incidents));

    let monitor = Arc::new(FallMonitor::new(
        FallDetector::new(config.detector.clone()),
        dispatcher,
        tx,
    ));

    // 4. Sensor pipeline: WebSocket frames -> feed -> monitor
    let (source, feed) = ChannelSensorSource::channel();
    let runner = Arc::clone(&monitor);
    tokio::spawn(async move {
        let exit = runner.run(&source).await;
        tracing::info!(?exit, "Fall monitor exited");
    });

    let app_state = web::Data::new(AppState {
        monitor,
        feed,
        incidents,
    });

    tracing::info!(
        host = %config.host,
        port = config.port,
        contacts = config.contacts.len(),
        "🚀 SYSTEM HEALTH: Server started"
    );

    // 5. Start the HTTP Server
    HttpServer::new(move || {
        let cors = actix_cors::Cors::permissive();

        App::new()
            .wrap(cors)
            .app_data(app_state.clone())
            .configure(configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
