use actix_web::{web, HttpResponse};

use crate::error::MatchError;
use crate::models::{ListResponse, SearchParams};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/search", web::get().to(search_providers));
}

/// Browse providers without creating matches
///
/// GET /search?serviceId=&packageType=&latitude=&longitude=&radiusKm=
async fn search_providers(
    state: web::Data<AppState>,
    query: web::Query<SearchParams>,
) -> Result<HttpResponse, MatchError> {
    let hits = state.engine.search_providers(&query).await?;
    Ok(HttpResponse::Ok().json(ListResponse::ok(hits)))
}
