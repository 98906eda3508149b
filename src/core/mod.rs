// Core algorithm exports
pub mod distance;
pub mod filters;
pub mod index;
pub mod lifecycle;
pub mod locks;
pub mod matcher;
pub mod requests;

pub use distance::{distance_between, haversine_distance};
pub use filters::{CandidateFilter, Rejection, Verdict};
pub use index::{OfferingIndex, StoreOfferingIndex};
pub use lifecycle::MatchLifecycle;
pub use locks::RequestLocks;
pub use matcher::{check_radius, MatchingEngine, MatchingOptions};
pub use requests::RequestService;
