// Service exports
pub mod cache;
pub mod memory;
pub mod postgres;
pub mod store;

pub use cache::CatalogCache;
pub use memory::{MemoryStore, StoreOp};
pub use postgres::PostgresStore;
pub use store::{
    with_timeout, LocationStore, MatchStore, OfferingStore, RequestStore, ServiceCatalog, Stores,
};
