use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use validator::Validate;

use crate::core::locks::RequestLocks;
use crate::core::matcher::check_radius;
use crate::error::{MatchError, StoreError};
use crate::models::{CreateRequestBody, Match, NewServiceRequest, RequestStatus, ServiceRequest};
use crate::services::{with_timeout, MatchStore, RequestStore, ServiceCatalog};

/// Client-facing request operations: post, read, cancel, list proposals
#[derive(Clone)]
pub struct RequestService {
    requests: Arc<dyn RequestStore>,
    matches: Arc<dyn MatchStore>,
    services: Arc<dyn ServiceCatalog>,
    locks: Arc<RequestLocks>,
    default_radius_km: f64,
    max_radius_km: f64,
    store_timeout: Duration,
}

impl RequestService {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        matches: Arc<dyn MatchStore>,
        services: Arc<dyn ServiceCatalog>,
        locks: Arc<RequestLocks>,
        default_radius_km: f64,
        max_radius_km: f64,
        store_timeout: Duration,
    ) -> Self {
        Self {
            requests,
            matches,
            services,
            locks,
            default_radius_km,
            max_radius_km,
            store_timeout,
        }
    }

    /// Post a new request; it starts `open`
    pub async fn create_request(
        &self,
        client_id: Uuid,
        body: CreateRequestBody,
    ) -> Result<ServiceRequest, MatchError> {
        body.validate()
            .map_err(|e| MatchError::BadRequest(format!("Validation failed: {}", e)))?;

        let radius_km = body.radius_km.unwrap_or(self.default_radius_km);
        check_radius(radius_km, self.max_radius_km)?;

        let service = with_timeout(self.store_timeout, self.services.get(body.service_id)).await?;
        if service.is_none() {
            return Err(MatchError::NotFound(format!(
                "Service {} not found",
                body.service_id
            )));
        }

        let fields = NewServiceRequest {
            client_id,
            service_id: body.service_id,
            package_type: body.package_type,
            latitude: body.latitude,
            longitude: body.longitude,
            address: body.address,
            city: body.city,
            radius_km,
            requested_date: body.requested_date,
            duration_minutes: body.duration_minutes,
            notes: body.notes,
        };

        let request = with_timeout(self.store_timeout, self.requests.create(fields)).await?;

        tracing::info!(
            "Client {} posted request {} for service {} ({}, {} km)",
            client_id,
            request.id,
            request.service_id,
            request.package_type,
            request.radius_km
        );

        Ok(request)
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<ServiceRequest, MatchError> {
        with_timeout(self.store_timeout, self.requests.get(request_id))
            .await?
            .ok_or_else(|| MatchError::NotFound(format!("Request {} not found", request_id)))
    }

    /// Requests posted by a client, newest first
    pub async fn list_requests(&self, client_id: Uuid) -> Result<Vec<ServiceRequest>, MatchError> {
        Ok(with_timeout(self.store_timeout, self.requests.list_by_client(client_id)).await?)
    }

    /// Cancel an `open` or `matched` request owned by the client.
    ///
    /// Runs under the request lock so it never interleaves with accept/reject.
    pub async fn cancel_request(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> Result<ServiceRequest, MatchError> {
        let _guard = self.locks.lock(request_id).await;
        self.owned_request(request_id, client_id).await?;

        let cancelled = match with_timeout(
            self.store_timeout,
            self.requests.update_status(request_id, RequestStatus::Cancelled),
        )
        .await
        {
            Ok(Some(request)) => request,
            Ok(None) => {
                return Err(MatchError::NotFound(format!("Request {} not found", request_id)))
            }
            Err(StoreError::InvalidRequestTransition { from, .. }) => {
                return Err(MatchError::Conflict(format!(
                    "Request {} is {} and cannot be cancelled",
                    request_id, from
                )))
            }
            Err(e) => return Err(e.into()),
        };

        tracing::info!("Client {} cancelled request {}", client_id, request_id);

        Ok(cancelled)
    }

    /// Every match recorded for the client's request, newest first
    pub async fn list_proposals(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> Result<Vec<Match>, MatchError> {
        self.owned_request(request_id, client_id).await?;
        Ok(with_timeout(self.store_timeout, self.matches.list_by_request(request_id)).await?)
    }

    async fn owned_request(
        &self,
        request_id: Uuid,
        client_id: Uuid,
    ) -> Result<ServiceRequest, MatchError> {
        let request = self.get_request(request_id).await?;
        if !request.is_owned_by(client_id) {
            return Err(MatchError::Forbidden(
                "Request belongs to another client".to_string(),
            ));
        }
        Ok(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::PackageType;
    use crate::services::MemoryStore;
    use chrono::Utc;

    async fn service_with_catalog() -> (RequestService, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let catalog_entry = store.insert_service("Home Care").await;
        let service = RequestService::new(
            store.clone(),
            store.clone(),
            store,
            Arc::new(RequestLocks::new()),
            5.0,
            100.0,
            Duration::from_secs(1),
        );
        (service, catalog_entry.id)
    }

    fn body(service_id: Uuid) -> CreateRequestBody {
        CreateRequestBody {
            service_id,
            package_type: PackageType::FullDayStay,
            latitude: 45.76,
            longitude: 4.84,
            address: "10 Place Bellecour".to_string(),
            city: "Lyon".to_string(),
            radius_km: None,
            requested_date: Utc::now(),
            duration_minutes: 480,
            notes: Some("Ring twice".to_string()),
        }
    }

    #[tokio::test]
    async fn test_create_defaults_radius() {
        let (service, service_id) = service_with_catalog().await;

        let request = service.create_request(Uuid::new_v4(), body(service_id)).await.unwrap();

        assert_eq!(request.radius_km, 5.0);
        assert_eq!(request.status, RequestStatus::Open);
        assert_eq!(request.notes.as_deref(), Some("Ring twice"));
    }

    #[tokio::test]
    async fn test_create_unknown_service() {
        let (service, _) = service_with_catalog().await;
        let result = service.create_request(Uuid::new_v4(), body(Uuid::new_v4())).await;
        assert!(matches!(result, Err(MatchError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_create_rejects_invalid_input() {
        let (service, service_id) = service_with_catalog().await;

        let mut bad_latitude = body(service_id);
        bad_latitude.latitude = 95.0;
        assert!(matches!(
            service.create_request(Uuid::new_v4(), bad_latitude).await,
            Err(MatchError::BadRequest(_))
        ));

        let mut bad_radius = body(service_id);
        bad_radius.radius_km = Some(0.0);
        assert!(matches!(
            service.create_request(Uuid::new_v4(), bad_radius).await,
            Err(MatchError::BadRequest(_))
        ));

        let mut empty_city = body(service_id);
        empty_city.city = String::new();
        assert!(matches!(
            service.create_request(Uuid::new_v4(), empty_city).await,
            Err(MatchError::BadRequest(_))
        ));
    }

    #[tokio::test]
    async fn test_cancel_by_owner_only() {
        let (service, service_id) = service_with_catalog().await;
        let owner = Uuid::new_v4();
        let request = service.create_request(owner, body(service_id)).await.unwrap();

        let stranger = service.cancel_request(request.id, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(MatchError::Forbidden(_))));

        let cancelled = service.cancel_request(request.id, owner).await.unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_list_requests_per_client() {
        let (service, service_id) = service_with_catalog().await;
        let client = Uuid::new_v4();
        service.create_request(client, body(service_id)).await.unwrap();
        service.create_request(client, body(service_id)).await.unwrap();
        service.create_request(Uuid::new_v4(), body(service_id)).await.unwrap();

        let listed = service.list_requests(client).await.unwrap();

        assert_eq!(listed.len(), 2);
        assert!(listed.iter().all(|r| r.client_id == client));
    }

    #[tokio::test]
    async fn test_cancel_waits_for_request_lock() {
        let store = Arc::new(MemoryStore::new());
        let catalog_entry = store.insert_service("Home Care").await;
        let locks = Arc::new(RequestLocks::new());
        let service = RequestService::new(
            store.clone(),
            store.clone(),
            store.clone(),
            locks.clone(),
            5.0,
            100.0,
            Duration::from_secs(1),
        );
        let owner = Uuid::new_v4();
        let request = service.create_request(owner, body(catalog_entry.id)).await.unwrap();

        let held = locks.lock(request.id).await;
        let cancel = {
            let service = service.clone();
            tokio::spawn(async move { service.cancel_request(request.id, owner).await })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!cancel.is_finished());
        let still_open = RequestStore::get(store.as_ref(), request.id).await.unwrap().unwrap();
        assert_eq!(still_open.status, RequestStatus::Open);

        drop(held);
        let cancelled = tokio::time::timeout(Duration::from_secs(1), cancel)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(cancelled.status, RequestStatus::Cancelled);
    }
}
