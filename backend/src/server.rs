use crate::sensors::SensorFeed;
use crate::service::FallMonitor;
use crate::store::IncidentStore;
use crate::websockets::ws_handler;
use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;

const HISTORY_LIMIT: usize = 20;

/// **Global Application State**
///
/// Shared by every connected client.
/// - `monitor`: the fall monitor; also the source of pushed events.
/// - `feed`: where WebSocket sensor frames are routed.
/// - `incidents`: history of dispatched and cancelled alerts.
pub struct AppState {
    pub monitor: Arc<FallMonitor>,
    pub feed: SensorFeed,
    pub incidents: Arc<dyn IncidentStore>,
}

/// **GET /api/history**
///
/// The last 20 incidents, newest first.
async fn get_history(data: web::Data<AppState>) -> impl Responder {
    match data.incidents.recent(HISTORY_LIMIT).await {
        Ok(incidents) => HttpResponse::Ok().json(incidents),
        Err(e) => {
            tracing::error!(error = %e, "❌ Failed to load incident history");
            HttpResponse::InternalServerError().body("Error fetching incidents")
        }
    }
}

/// **GET /api/state**
///
/// Current detector working set.
async fn get_state(data: web::Data<AppState>) -> impl Responder {
    HttpResponse::Ok().json(data.monitor.snapshot())
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/api/history", web::get().to(get_history))
        .route("/api/state", web::get().to(get_state))
        .route("/ws", web::get().to(ws_handler));
}
