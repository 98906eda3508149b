// Route exports
pub mod matches;
pub mod requests;
pub mod search;

use actix_web::{error, web, HttpRequest, HttpResponse, Responder};
use std::sync::Arc;
use uuid::Uuid;

use crate::config::Settings;
use crate::core::{MatchLifecycle, MatchingEngine, MatchingOptions, RequestLocks, RequestService, StoreOfferingIndex};
use crate::error::MatchError;
use crate::models::HealthResponse;
use crate::services::{PostgresStore, Stores};

/// Header carrying the authenticated client, set by the gateway in front of this service
pub const CLIENT_ID_HEADER: &str = "X-Client-Id";

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: MatchingEngine,
    pub lifecycle: MatchLifecycle,
    pub requests: RequestService,
    pub database: Option<Arc<PostgresStore>>,
}

impl AppState {
    /// Wire the core components on top of the given stores
    pub fn build(stores: Stores, settings: &Settings) -> Self {
        let matching = &settings.matching;
        let store_timeout = matching.store_timeout();
        let locks = Arc::new(RequestLocks::new());

        let index = Arc::new(StoreOfferingIndex::new(
            stores.offerings.clone(),
            stores.locations.clone(),
            matching.max_concurrent_lookups,
            store_timeout,
        ));

        let engine = MatchingEngine::new(
            stores.requests.clone(),
            stores.matches.clone(),
            index,
            locks.clone(),
            MatchingOptions {
                default_search_radius_km: matching.default_search_radius_km,
                max_radius_km: matching.max_radius_km,
                store_timeout,
            },
        );

        let lifecycle = MatchLifecycle::new(
            stores.requests.clone(),
            stores.matches.clone(),
            locks.clone(),
            store_timeout,
        );

        let requests = RequestService::new(
            stores.requests,
            stores.matches,
            stores.services,
            locks,
            matching.default_request_radius_km,
            matching.max_radius_km,
            store_timeout,
        );

        Self {
            engine,
            lifecycle,
            requests,
            database: None,
        }
    }

    pub fn with_database(mut self, database: Arc<PostgresStore>) -> Self {
        self.database = Some(database);
        self
    }
}

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health_check))
        .configure(requests::configure)
        .configure(matches::configure)
        .configure(search::configure);
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let healthy = match &state.database {
        Some(database) => database.health_check().await.unwrap_or(false),
        None => true,
    };

    let status = if healthy { "healthy" } else { "degraded" };

    HttpResponse::Ok().json(HealthResponse {
        success: healthy,
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
    })
}

/// Acting client identity from the `X-Client-Id` header
pub fn client_id(req: &HttpRequest) -> Result<Uuid, MatchError> {
    let raw = req
        .headers()
        .get(CLIENT_ID_HEADER)
        .ok_or_else(|| MatchError::BadRequest(format!("Missing {} header", CLIENT_ID_HEADER)))?;

    raw.to_str()
        .ok()
        .and_then(|value| Uuid::parse_str(value.trim()).ok())
        .ok_or_else(|| MatchError::BadRequest(format!("Malformed {} header", CLIENT_ID_HEADER)))
}

/// Handle JSON payload errors
pub fn handle_json_payload_error(err: error::JsonPayloadError, req: &HttpRequest) -> actix_web::Error {
    tracing::info!("JSON payload error on {}: {}", req.path(), err);
    MatchError::BadRequest(format!("Invalid JSON: {}", err)).into()
}

/// Handle query payload errors
pub fn handle_query_payload_error(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    MatchError::BadRequest(format!("Invalid query: {}", err)).into()
}

/// Handle malformed path segments such as a non-UUID id
pub fn handle_path_error(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
    MatchError::BadRequest(format!("Invalid path: {}", err)).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn test_client_id_header() {
        let id = Uuid::new_v4();
        let req = TestRequest::default()
            .insert_header((CLIENT_ID_HEADER, id.to_string()))
            .to_http_request();
        assert_eq!(client_id(&req).unwrap(), id);

        let missing = TestRequest::default().to_http_request();
        assert!(matches!(client_id(&missing), Err(MatchError::BadRequest(_))));

        let malformed = TestRequest::default()
            .insert_header((CLIENT_ID_HEADER, "not-a-uuid"))
            .to_http_request();
        assert!(matches!(client_id(&malformed), Err(MatchError::BadRequest(_))));
    }
}
