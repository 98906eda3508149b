use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::error::MatchError;
use crate::models::ApiResponse;
use crate::routes::{client_id, AppState};

/// Configure match lifecycle routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/matches/{match_id}/accept", web::post().to(accept_match))
        .route("/matches/{match_id}/reject", web::post().to(reject_match));
}

/// POST /matches/{match_id}/accept
async fn accept_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    http_req: HttpRequest,
) -> Result<HttpResponse, MatchError> {
    let client_id = client_id(&http_req)?;
    let accepted = state.lifecycle.accept_match(path.into_inner(), client_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(accepted)))
}

/// POST /matches/{match_id}/reject
async fn reject_match(
    state: web::Data<AppState>,
    path: web::Path<Uuid>,
    http_req: HttpRequest,
) -> Result<HttpResponse, MatchError> {
    let client_id = client_id(&http_req)?;
    let rejected = state.lifecycle.reject_match(path.into_inner(), client_id).await?;
    Ok(HttpResponse::Ok().json(ApiResponse::ok(rejected)))
}
