//! CareMatch - matching engine for the home-care services marketplace
//!
//! Given a client's service request, the engine finds providers offering the
//! requested service and package near the client, records a proposal for each
//! and drives proposals through client acceptance or rejection.

pub mod config;
pub mod core;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{haversine_distance, MatchLifecycle, MatchingEngine, RequestService};
pub use error::{MatchError, StoreError};
pub use models::{Match, MatchStatus, PackageType, RequestStatus, ServiceRequest};
pub use routes::AppState;
