use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::Service;
use crate::services::store::ServiceCatalog;

/// In-memory cache in front of the service catalog.
///
/// The catalog changes rarely and every request creation looks a service up,
/// so hits are kept for `ttl`. Misses are never cached.
pub struct CatalogCache {
    inner: Arc<dyn ServiceCatalog>,
    l1_cache: moka::future::Cache<Uuid, Service>,
}

impl CatalogCache {
    pub fn new(inner: Arc<dyn ServiceCatalog>, capacity: u64, ttl: Duration) -> Self {
        let l1_cache = moka::future::CacheBuilder::new(capacity)
            .time_to_live(ttl)
            .build();

        Self { inner, l1_cache }
    }

    pub fn entry_count(&self) -> u64 {
        self.l1_cache.entry_count()
    }

    pub async fn invalidate(&self, id: Uuid) {
        self.l1_cache.invalidate(&id).await;
    }
}

#[async_trait]
impl ServiceCatalog for CatalogCache {
    async fn get(&self, id: Uuid) -> Result<Option<Service>, StoreError> {
        if let Some(service) = self.l1_cache.get(&id).await {
            tracing::trace!("Catalog cache hit: {}", id);
            return Ok(Some(service));
        }

        let service = self.inner.get(id).await?;
        if let Some(found) = &service {
            self.l1_cache.insert(id, found.clone()).await;
        }
        Ok(service)
    }
}
