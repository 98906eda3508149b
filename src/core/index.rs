use async_trait::async_trait;
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::MatchError;
use crate::models::Candidate;
use crate::services::{with_timeout, LocationStore, OfferingStore};

/// Read-side lookup of the providers able to serve a service.
///
/// Implementations return every available offering for the service with the
/// provider's primary location resolved (or `None`). No ordering is implied.
#[async_trait]
pub trait OfferingIndex: Send + Sync {
    async fn offerings_for_service(&self, service_id: Uuid) -> Result<Vec<Candidate>, MatchError>;
}

/// Offering index backed by the offering and location stores.
///
/// Primary locations are fetched with a bounded fan-out. Any failed lookup
/// fails the whole query so callers never see a silently truncated list.
pub struct StoreOfferingIndex {
    offerings: Arc<dyn OfferingStore>,
    locations: Arc<dyn LocationStore>,
    max_concurrent_lookups: usize,
    store_timeout: Duration,
}

impl StoreOfferingIndex {
    pub fn new(
        offerings: Arc<dyn OfferingStore>,
        locations: Arc<dyn LocationStore>,
        max_concurrent_lookups: usize,
        store_timeout: Duration,
    ) -> Self {
        Self {
            offerings,
            locations,
            max_concurrent_lookups: max_concurrent_lookups.max(1),
            store_timeout,
        }
    }
}

#[async_trait]
impl OfferingIndex for StoreOfferingIndex {
    async fn offerings_for_service(&self, service_id: Uuid) -> Result<Vec<Candidate>, MatchError> {
        let offerings = with_timeout(
            self.store_timeout,
            self.offerings.list_by_service(service_id, true),
        )
        .await?;

        let width = self.max_concurrent_lookups.min(offerings.len()).max(1);
        tracing::debug!(
            "Resolving primary locations for {} offerings of service {} ({} at a time)",
            offerings.len(),
            service_id,
            width
        );

        let candidates = stream::iter(offerings)
            .map(|offering| async move {
                let location = with_timeout(
                    self.store_timeout,
                    self.locations.get_primary(offering.provider_id),
                )
                .await?;
                Ok::<_, MatchError>(Candidate { offering, location })
            })
            .buffer_unordered(width)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(candidates)
    }
}
