use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::error::MatchError;
use crate::models::{ApiResponse, CreateRequestBody, ListResponse};
use crate::routes::{client_id, AppState};

/// Configure request routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/requests", web::post().to(create_request))
        .route("/requests", web::get().to(list_requests))
        .route("/requests/{request_id}", web::get().to(get_request))
        .route("/requests/{request_id}/cancel", web::post().to(cancel_request))
        .route("/requests/{request_id}/matches", web::get().to(find_matches))
        .route("/requests/{request_id}/proposals", web::get().to(list_proposals));
}

/// Create a service request
///
/// POST /requests
///
/// Request body:
/// ```json
/// {
///   "serviceId": "uuid",
///   "packageType": "half_day_stay",
///   "latitude": 40.0,
///   "longitude": -74.0,
///   "address": "string",
///   "city": "string",
///   "radiusKm": 5,
///   "requestedDate": "2024-06-01T09:00:00Z",
///   "durationMinutes": 240,
///   "notes": "string"
/// }
/// ```
async fn create_request(
    state: web::Data<AppState>,
    body: web::Json<CreateRequestBody>,
    http_req: HttpRequest,
) -> Result<HttpResponse, MatchError> {
    let client_id = client_id(&http_req)?;
    let request = state.requests.create_request(client_id, body.into_inner()).await?;
    Ok(HttpResponse::Created().json(ApiResponse::ok(request)))
}

/// GET /requests
async fn list_requests(
    state: web::Data<AppState>,
    http_req: HttpRequest,
) -> Result<HttpResponse, MatchError> {
    let client_id = client_id(&http_req)?;
    let requests = state.requests.list_requests(client_id).await?;
    Ok(HttpResponse::Ok().json(ListResponse::ok(requests)))
}

/// GET /requests/{request_id}
async fn get_request(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, MatchError> {
    let request = state.requests.get_request(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(request)))
}

/// POST /requests/{request_id}/cancel
async fn cancel_request(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    http_req: HttpRequest,
) -> Result<HttpResponse, MatchError> {
    let client_id = client_id(&http_req)?;
    let request = state.requests.cancel_request(path.into_inner(), client_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(request)))
}

/// Run the matching engine for a request
///
/// GET /requests/{request_id}/matches
///
/// Returns the matches created by this run.
async fn find_matches(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, MatchError> {
    let request_id = path.into_inner();
    tracing::info!("Finding matches for request: {}", request_id);

    let matches = state.engine.find_matches(request_id).await?;
    Ok(HttpResponse::Ok().json(ListResponse::ok(matches)))
}

/// GET /requests/{request_id}/proposals
async fn list_proposals(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    http_req: HttpRequest,
) -> Result<HttpResponse, MatchError> {
    let client_id = client_id(&http_req)?;
    let matches = state.requests.list_proposals(path.into_inner(), client_id).await?;
    Ok(HttpResponse::Ok().json(ListResponse::ok(matches)))
}
