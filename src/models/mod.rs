// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    Candidate, GeoPoint, Match, MatchStatus, NewMatch, NewServiceRequest, PackageType,
    ProviderLocation, ProviderOffering, RequestStatus, SearchHit, Service, ServiceRequest,
};
pub use requests::{CreateRequestBody, SearchParams};
pub use responses::{ApiResponse, ErrorResponse, HealthResponse, ListResponse};
