use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Match, MatchStatus, NewMatch, NewServiceRequest, ProviderLocation, ProviderOffering,
    RequestStatus, Service, ServiceRequest,
};

/// Owns service-request records and their status
#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError>;

    async fn create(&self, fields: NewServiceRequest) -> Result<ServiceRequest, StoreError>;

    /// Atomically move a request to `status`.
    ///
    /// Returns `Ok(None)` when the request does not exist and
    /// `StoreError::InvalidRequestTransition` when its current status cannot
    /// reach `status`.
    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<Option<ServiceRequest>, StoreError>;

    /// Requests of one client, newest first
    async fn list_by_client(&self, client_id: Uuid) -> Result<Vec<ServiceRequest>, StoreError>;
}

/// Provider offerings, keyed by service
#[async_trait]
pub trait OfferingStore: Send + Sync {
    async fn list_by_service(
        &self,
        service_id: Uuid,
        available_only: bool,
    ) -> Result<Vec<ProviderOffering>, StoreError>;
}

/// Provider locations
#[async_trait]
pub trait LocationStore: Send + Sync {
    async fn get_primary(&self, provider_id: Uuid) -> Result<Option<ProviderLocation>, StoreError>;
}

/// Owns match records. Creation is append-only.
#[async_trait]
pub trait MatchStore: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Match>, StoreError>;

    /// Returns `Ok(None)` when the (request, provider) pair already has a match
    async fn create(&self, fields: NewMatch) -> Result<Option<Match>, StoreError>;

    /// Atomically move a match to `status`, stamping `responded_at`.
    ///
    /// Same contract as [`RequestStore::update_status`].
    async fn update_status(
        &self,
        id: Uuid,
        status: MatchStatus,
        responded_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Match>, StoreError>;

    /// Matches of one request, newest first
    async fn list_by_request(&self, request_id: Uuid) -> Result<Vec<Match>, StoreError>;
}

/// Marketplace service catalog
#[async_trait]
pub trait ServiceCatalog: Send + Sync {
    async fn get(&self, id: Uuid) -> Result<Option<Service>, StoreError>;
}

/// Store handles injected into the core components
#[derive(Clone)]
pub struct Stores {
    pub requests: Arc<dyn RequestStore>,
    pub offerings: Arc<dyn OfferingStore>,
    pub locations: Arc<dyn LocationStore>,
    pub matches: Arc<dyn MatchStore>,
    pub services: Arc<dyn ServiceCatalog>,
}

impl Stores {
    /// Use one backend for every contract
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: RequestStore + OfferingStore + LocationStore + MatchStore + ServiceCatalog + 'static,
    {
        Self {
            requests: store.clone(),
            offerings: store.clone(),
            locations: store.clone(),
            matches: store.clone(),
            services: store,
        }
    }

    pub fn with_services(mut self, services: Arc<dyn ServiceCatalog>) -> Self {
        self.services = services;
        self
    }
}

/// Bound a store call so it fails as a transient error instead of hanging
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(limit, call)
        .await
        .map_err(|_| StoreError::Timeout(limit))?
}
