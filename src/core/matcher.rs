use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::core::filters::CandidateFilter;
use crate::core::index::OfferingIndex;
use crate::core::locks::RequestLocks;
use crate::error::{MatchError, StoreError};
use crate::models::{GeoPoint, Match, NewMatch, RequestStatus, SearchHit, SearchParams};
use crate::services::{with_timeout, MatchStore, RequestStore};
use validator::Validate;

/// Tunables of the matching engine
#[derive(Debug, Clone, Copy)]
pub struct MatchingOptions {
    pub default_search_radius_km: f64,
    pub max_radius_km: f64,
    pub store_timeout: Duration,
}

impl Default for MatchingOptions {
    fn default() -> Self {
        Self {
            default_search_radius_km: 10.0,
            max_radius_km: 100.0,
            store_timeout: Duration::from_secs(5),
        }
    }
}

/// Main matching orchestrator
///
/// # Pipeline
/// 1. Load the request
/// 2. Pull candidates for its service from the offering index
/// 3. Drop package mismatches, providers without a primary location and
///    providers outside the request radius
/// 4. Record a `proposed` match per surviving provider, closest first
/// 5. Move the request to `matched` when anything was proposed
#[derive(Clone)]
pub struct MatchingEngine {
    requests: Arc<dyn RequestStore>,
    matches: Arc<dyn MatchStore>,
    index: Arc<dyn OfferingIndex>,
    locks: Arc<RequestLocks>,
    options: MatchingOptions,
}

impl MatchingEngine {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        matches: Arc<dyn MatchStore>,
        index: Arc<dyn OfferingIndex>,
        locks: Arc<RequestLocks>,
        options: MatchingOptions,
    ) -> Self {
        Self {
            requests,
            matches,
            index,
            locks,
            options,
        }
    }

    /// Find providers for a request and record a proposal for each.
    ///
    /// Returns the matches created by this call. A provider that already has
    /// a match for the request is not proposed again, so repeated calls only
    /// add providers that became eligible in between. An empty result is not
    /// an error.
    pub async fn find_matches(&self, request_id: Uuid) -> Result<Vec<Match>, MatchError> {
        let _guard = self.locks.lock(request_id).await;
        let timeout = self.options.store_timeout;

        let request = with_timeout(timeout, self.requests.get(request_id))
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("Request {} not found", request_id)))?;

        if !request.status.accepts_matching() {
            return Err(MatchError::BadRequest(format!(
                "Request {} is {} and can no longer be matched",
                request_id, request.status
            )));
        }

        let candidates = self.index.offerings_for_service(request.service_id).await?;
        let total_candidates = candidates.len();

        let shortlist = CandidateFilter::for_request(&request).shortlist(candidates);

        let already_proposed: HashSet<Uuid> = with_timeout(timeout, self.matches.list_by_request(request_id))
            .await?
            .into_iter()
            .map(|m| m.provider_id)
            .collect();

        let mut created = Vec::new();
        for (candidate, distance_km) in shortlist {
            let provider_id = candidate.offering.provider_id;
            if already_proposed.contains(&provider_id) {
                continue;
            }
            let Some(distance_km) = distance_km else {
                continue;
            };

            let proposal = NewMatch {
                request_id,
                provider_id,
                distance_km,
                matched_at: Utc::now(),
            };
            if let Some(record) = with_timeout(timeout, self.matches.create(proposal)).await? {
                created.push(record);
            }
        }

        if !created.is_empty() && request.status == RequestStatus::Open {
            match with_timeout(timeout, self.requests.update_status(request_id, RequestStatus::Matched)).await {
                Ok(_) => {}
                Err(StoreError::InvalidRequestTransition { from, .. }) => {
                    tracing::warn!(
                        "Request {} moved to {} while matching, keeping its status",
                        request_id,
                        from
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::info!(
            "Created {} matches for request {} (from {} candidates)",
            created.len(),
            request_id,
            total_candidates
        );

        Ok(created)
    }

    /// Browse providers for a service without recording anything.
    ///
    /// With a point, results are limited to the radius (default 10 km) and
    /// carry their distance, closest first. Without one, every available
    /// offering of the package is returned.
    pub async fn search_providers(&self, params: &SearchParams) -> Result<Vec<SearchHit>, MatchError> {
        params
            .validate()
            .map_err(|e| MatchError::BadRequest(format!("Invalid search: {}", e)))?;

        let service_id = params
            .service_id
            .ok_or_else(|| MatchError::BadRequest("serviceId is required".to_string()))?;

        let origin = match (params.latitude, params.longitude) {
            (Some(latitude), Some(longitude)) => {
                let point = GeoPoint::new(latitude, longitude);
                if !point.is_valid() {
                    return Err(MatchError::BadRequest(
                        "latitude must be within [-90, 90] and longitude within [-180, 180]"
                            .to_string(),
                    ));
                }
                Some(point)
            }
            (None, None) => None,
            _ => {
                return Err(MatchError::BadRequest(
                    "latitude and longitude must be given together".to_string(),
                ))
            }
        };

        let radius_km = params
            .radius_km
            .unwrap_or(self.options.default_search_radius_km);
        check_radius(radius_km, self.options.max_radius_km)?;

        let candidates = self.index.offerings_for_service(service_id).await?;
        let filter = CandidateFilter::new(origin, radius_km, params.package_type);

        let hits: Vec<SearchHit> = filter
            .shortlist(candidates)
            .into_iter()
            .map(|(candidate, distance_km)| SearchHit {
                offering: candidate.offering,
                distance_km,
                location: candidate.location,
            })
            .collect();

        tracing::debug!("Search for service {} returned {} offerings", service_id, hits.len());

        Ok(hits)
    }
}

/// Radius must be positive and at most `max_radius_km`
pub fn check_radius(radius_km: f64, max_radius_km: f64) -> Result<(), MatchError> {
    if !radius_km.is_finite() || radius_km <= 0.0 || radius_km > max_radius_km {
        return Err(MatchError::BadRequest(format!(
            "radiusKm must be greater than 0 and at most {}",
            max_radius_km
        )));
    }
    Ok(())
}
