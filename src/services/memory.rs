use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{
    Match, MatchStatus, NewMatch, NewServiceRequest, PackageType, ProviderLocation,
    ProviderOffering, RequestStatus, Service, ServiceRequest,
};
use crate::services::store::{LocationStore, MatchStore, OfferingStore, RequestStore, ServiceCatalog};

/// Store operations that can be made to fail on purpose
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    GetRequest,
    CreateRequest,
    UpdateRequestStatus,
    ListRequests,
    ListOfferings,
    PrimaryLocation,
    GetMatch,
    CreateMatch,
    UpdateMatchStatus,
    ListMatches,
    GetService,
}

#[derive(Default)]
struct MemoryState {
    services: HashMap<Uuid, Service>,
    requests: HashMap<Uuid, ServiceRequest>,
    offerings: HashMap<Uuid, ProviderOffering>,
    locations: Vec<ProviderLocation>,
    matches: HashMap<Uuid, Match>,
    match_pairs: HashSet<(Uuid, Uuid)>,
}

#[derive(Default)]
struct Faults {
    failing: HashSet<StoreOp>,
    latency: Option<Duration>,
}

/// In-process store with the same contracts as the Postgres backend.
///
/// Used for local runs (`storage.backend = "memory"`) and as the test double
/// for the core components.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
    faults: Mutex<Faults>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `op` fail with `StoreError::Unavailable`
    pub fn fail_on(&self, op: StoreOp) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing.insert(op);
        }
    }

    pub fn heal(&self) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.failing.clear();
            faults.latency = None;
        }
    }

    /// Delay every call by `latency`
    pub fn set_latency(&self, latency: Duration) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.latency = Some(latency);
        }
    }

    async fn enter(&self, op: StoreOp) -> Result<(), StoreError> {
        let (failing, latency) = match self.faults.lock() {
            Ok(faults) => (faults.failing.contains(&op), faults.latency),
            Err(_) => (false, None),
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if failing {
            return Err(StoreError::Unavailable(format!("{:?} is failing", op)));
        }
        Ok(())
    }

    pub async fn insert_service(&self, name: &str) -> Service {
        let service = Service {
            id: Uuid::new_v4(),
            name: name.to_string(),
            description: None,
        };
        self.state
            .write()
            .await
            .services
            .insert(service.id, service.clone());
        service
    }

    /// Register an offering; the (provider, service, package type) triple is unique
    pub async fn insert_offering(
        &self,
        provider_id: Uuid,
        service_id: Uuid,
        package_type: PackageType,
        price_per_visit: Option<f64>,
        is_available: bool,
    ) -> Result<ProviderOffering, StoreError> {
        let mut state = self.state.write().await;
        let taken = state.offerings.values().any(|o| {
            o.provider_id == provider_id && o.service_id == service_id && o.package_type == package_type
        });
        if taken {
            return Err(StoreError::Duplicate(format!(
                "provider {} already offers {} for service {}",
                provider_id, package_type, service_id
            )));
        }

        let offering = ProviderOffering {
            id: Uuid::new_v4(),
            provider_id,
            service_id,
            package_type,
            price_per_visit,
            is_available,
            created_at: Utc::now(),
        };
        state.offerings.insert(offering.id, offering.clone());
        Ok(offering)
    }

    pub async fn set_offering_available(&self, offering_id: Uuid, is_available: bool) {
        if let Some(offering) = self.state.write().await.offerings.get_mut(&offering_id) {
            offering.is_available = is_available;
        }
    }

    pub async fn insert_location(
        &self,
        provider_id: Uuid,
        latitude: f64,
        longitude: f64,
        is_primary: bool,
    ) -> ProviderLocation {
        let location = ProviderLocation {
            id: Uuid::new_v4(),
            provider_id,
            latitude,
            longitude,
            address: format!("{:.4}, {:.4}", latitude, longitude),
            city: "Testville".to_string(),
            postal_code: None,
            is_primary,
            is_home_service: true,
            created_at: Utc::now(),
        };
        self.state.write().await.locations.push(location.clone());
        location
    }
}

#[async_trait]
impl RequestStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<ServiceRequest>, StoreError> {
        self.enter(StoreOp::GetRequest).await?;
        Ok(self.state.read().await.requests.get(&id).cloned())
    }

    async fn create(&self, fields: NewServiceRequest) -> Result<ServiceRequest, StoreError> {
        self.enter(StoreOp::CreateRequest).await?;
        let now = Utc::now();
        let request = ServiceRequest {
            id: Uuid::new_v4(),
            client_id: fields.client_id,
            service_id: fields.service_id,
            package_type: fields.package_type,
            latitude: fields.latitude,
            longitude: fields.longitude,
            address: fields.address,
            city: fields.city,
            radius_km: fields.radius_km,
            requested_date: fields.requested_date,
            duration_minutes: fields.duration_minutes,
            notes: fields.notes,
            status: RequestStatus::Open,
            created_at: now,
            updated_at: now,
        };
        self.state
            .write()
            .await
            .requests
            .insert(request.id, request.clone());
        Ok(request)
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> Result<Option<ServiceRequest>, StoreError> {
        self.enter(StoreOp::UpdateRequestStatus).await?;
        let mut state = self.state.write().await;
        let Some(request) = state.requests.get_mut(&id) else {
            return Ok(None);
        };
        if !request.status.can_transition_to(status) {
            return Err(StoreError::InvalidRequestTransition {
                from: request.status,
                to: status,
            });
        }
        request.status = status;
        request.updated_at = Utc::now();
        Ok(Some(request.clone()))
    }

    async fn list_by_client(&self, client_id: Uuid) -> Result<Vec<ServiceRequest>, StoreError> {
        self.enter(StoreOp::ListRequests).await?;
        let mut requests: Vec<ServiceRequest> = self
            .state
            .read()
            .await
            .requests
            .values()
            .filter(|r| r.client_id == client_id)
            .cloned()
            .collect();
        requests.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(requests)
    }
}

#[async_trait]
impl OfferingStore for MemoryStore {
    async fn list_by_service(
        &self,
        service_id: Uuid,
        available_only: bool,
    ) -> Result<Vec<ProviderOffering>, StoreError> {
        self.enter(StoreOp::ListOfferings).await?;
        Ok(self
            .state
            .read()
            .await
            .offerings
            .values()
            .filter(|o| o.service_id == service_id)
            .filter(|o| !available_only || o.is_available)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl LocationStore for MemoryStore {
    async fn get_primary(&self, provider_id: Uuid) -> Result<Option<ProviderLocation>, StoreError> {
        self.enter(StoreOp::PrimaryLocation).await?;
        Ok(self
            .state
            .read()
            .await
            .locations
            .iter()
            .find(|l| l.provider_id == provider_id && l.is_primary)
            .cloned())
    }
}

#[async_trait]
impl MatchStore for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Match>, StoreError> {
        self.enter(StoreOp::GetMatch).await?;
        Ok(self.state.read().await.matches.get(&id).cloned())
    }

    async fn create(&self, fields: NewMatch) -> Result<Option<Match>, StoreError> {
        self.enter(StoreOp::CreateMatch).await?;
        let mut state = self.state.write().await;
        if !state.match_pairs.insert((fields.request_id, fields.provider_id)) {
            return Ok(None);
        }
        let created = Match {
            id: Uuid::new_v4(),
            request_id: fields.request_id,
            provider_id: fields.provider_id,
            status: MatchStatus::Proposed,
            distance_km: Some(fields.distance_km),
            matched_at: fields.matched_at,
            responded_at: None,
        };
        state.matches.insert(created.id, created.clone());
        Ok(Some(created))
    }

    async fn update_status(
        &self,
        id: Uuid,
        status: MatchStatus,
        responded_at: Option<DateTime<Utc>>,
    ) -> Result<Option<Match>, StoreError> {
        self.enter(StoreOp::UpdateMatchStatus).await?;
        let mut state = self.state.write().await;
        let Some(existing) = state.matches.get_mut(&id) else {
            return Ok(None);
        };
        if !existing.status.can_transition_to(status) {
            return Err(StoreError::InvalidMatchTransition {
                from: existing.status,
                to: status,
            });
        }
        existing.status = status;
        existing.responded_at = responded_at;
        Ok(Some(existing.clone()))
    }

    async fn list_by_request(&self, request_id: Uuid) -> Result<Vec<Match>, StoreError> {
        self.enter(StoreOp::ListMatches).await?;
        let mut matches: Vec<Match> = self
            .state
            .read()
            .await
            .matches
            .values()
            .filter(|m| m.request_id == request_id)
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.matched_at.cmp(&a.matched_at));
        Ok(matches)
    }
}

#[async_trait]
impl ServiceCatalog for MemoryStore {
    async fn get(&self, id: Uuid) -> Result<Option<Service>, StoreError> {
        self.enter(StoreOp::GetService).await?;
        Ok(self.state.read().await.services.get(&id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_match(request_id: Uuid, provider_id: Uuid) -> NewMatch {
        NewMatch {
            request_id,
            provider_id,
            distance_km: 1.5,
            matched_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_duplicate_offering_rejected() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        let service = Uuid::new_v4();

        store
            .insert_offering(provider, service, PackageType::HalfDayStay, Some(40.0), true)
            .await
            .unwrap();
        let second = store
            .insert_offering(provider, service, PackageType::HalfDayStay, Some(45.0), true)
            .await;

        assert!(matches!(second, Err(StoreError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_match_pair_created_once() {
        let store = MemoryStore::new();
        let request = Uuid::new_v4();
        let provider = Uuid::new_v4();

        let first = MatchStore::create(&store, new_match(request, provider)).await.unwrap();
        let second = MatchStore::create(&store, new_match(request, provider)).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(store.list_by_request(request).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_rejected_match_is_terminal() {
        let store = MemoryStore::new();
        let created = MatchStore::create(&store, new_match(Uuid::new_v4(), Uuid::new_v4()))
            .await
            .unwrap()
            .unwrap();

        MatchStore::update_status(&store, created.id, MatchStatus::Rejected, Some(Utc::now()))
            .await
            .unwrap();
        let result =
            MatchStore::update_status(&store, created.id, MatchStatus::Accepted, Some(Utc::now())).await;

        assert!(matches!(result, Err(StoreError::InvalidMatchTransition { .. })));
    }

    #[tokio::test]
    async fn test_primary_location_only() {
        let store = MemoryStore::new();
        let provider = Uuid::new_v4();
        store.insert_location(provider, 1.0, 1.0, false).await;

        assert!(store.get_primary(provider).await.unwrap().is_none());

        let primary = store.insert_location(provider, 2.0, 2.0, true).await;
        assert_eq!(store.get_primary(provider).await.unwrap(), Some(primary));
    }

    #[tokio::test]
    async fn test_fault_injection() {
        let store = MemoryStore::new();
        store.fail_on(StoreOp::ListOfferings);

        let result = store.list_by_service(Uuid::new_v4(), true).await;
        assert!(matches!(result, Err(StoreError::Unavailable(_))));

        store.heal();
        assert!(store.list_by_service(Uuid::new_v4(), true).await.unwrap().is_empty());
    }
}
