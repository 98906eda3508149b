use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Service granularity a provider offers and a client asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "package_type")]
pub enum PackageType {
    #[serde(rename = "1_passage_per_day")]
    #[sqlx(rename = "1_passage_per_day")]
    OnePassagePerDay,
    #[serde(rename = "multiple_passages_per_day")]
    #[sqlx(rename = "multiple_passages_per_day")]
    MultiplePassagesPerDay,
    #[serde(rename = "half_day_stay")]
    #[sqlx(rename = "half_day_stay")]
    HalfDayStay,
    #[serde(rename = "full_day_stay")]
    #[sqlx(rename = "full_day_stay")]
    FullDayStay,
}

impl PackageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageType::OnePassagePerDay => "1_passage_per_day",
            PackageType::MultiplePassagesPerDay => "multiple_passages_per_day",
            PackageType::HalfDayStay => "half_day_stay",
            PackageType::FullDayStay => "full_day_stay",
        }
    }
}

impl fmt::Display for PackageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a client's service request
///
/// Moves forward only: `open -> matched -> accepted -> completed`.
/// `cancelled` is reachable from `open` or `matched`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "request_status", rename_all = "lowercase")]
pub enum RequestStatus {
    Open,
    Matched,
    Accepted,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 5] = [
        RequestStatus::Open,
        RequestStatus::Matched,
        RequestStatus::Accepted,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Open => "open",
            RequestStatus::Matched => "matched",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        }
    }

    fn rank(&self) -> Option<u8> {
        match self {
            RequestStatus::Open => Some(0),
            RequestStatus::Matched => Some(1),
            RequestStatus::Accepted => Some(2),
            RequestStatus::Completed => Some(3),
            RequestStatus::Cancelled => None,
        }
    }

    /// Whether a request in this status may move to `next`.
    /// Staying in the same status is always allowed.
    pub fn can_transition_to(&self, next: RequestStatus) -> bool {
        if *self == next {
            return true;
        }
        match (self.rank(), next.rank()) {
            (Some(current), Some(target)) => target > current,
            (Some(_), None) => matches!(self, RequestStatus::Open | RequestStatus::Matched),
            (None, _) => false,
        }
    }

    /// Statuses from which `next` is reachable
    pub fn sources_of(next: RequestStatus) -> Vec<RequestStatus> {
        Self::ALL
            .into_iter()
            .filter(|status| status.can_transition_to(next))
            .collect()
    }

    /// Matching runs only while the request is still looking for a provider
    pub fn accepts_matching(&self) -> bool {
        matches!(self, RequestStatus::Open | RequestStatus::Matched)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a proposed pairing between a request and a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "match_status", rename_all = "lowercase")]
pub enum MatchStatus {
    Proposed,
    Accepted,
    Rejected,
    Completed,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 4] = [
        MatchStatus::Proposed,
        MatchStatus::Accepted,
        MatchStatus::Rejected,
        MatchStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Proposed => "proposed",
            MatchStatus::Accepted => "accepted",
            MatchStatus::Rejected => "rejected",
            MatchStatus::Completed => "completed",
        }
    }

    /// `proposed -> {accepted, rejected}`; `accepted -> completed` once a booking concludes.
    pub fn can_transition_to(&self, next: MatchStatus) -> bool {
        if *self == next {
            return true;
        }
        matches!(
            (self, next),
            (MatchStatus::Proposed, MatchStatus::Accepted)
                | (MatchStatus::Proposed, MatchStatus::Rejected)
                | (MatchStatus::Accepted, MatchStatus::Completed)
        )
    }

    pub fn sources_of(next: MatchStatus) -> Vec<MatchStatus> {
        Self::ALL
            .into_iter()
            .filter(|status| status.can_transition_to(next))
            .collect()
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.latitude) && (-180.0..=180.0).contains(&self.longitude)
    }
}

/// A service from the marketplace catalog ("Home Care", ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
}

/// A client's posted need for a service near a point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub id: Uuid,
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub package_type: PackageType,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub city: String,
    pub radius_km: f64,
    pub requested_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ServiceRequest {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }

    pub fn is_owned_by(&self, client_id: Uuid) -> bool {
        self.client_id == client_id
    }
}

/// Fields needed to persist a new service request
#[derive(Debug, Clone, PartialEq)]
pub struct NewServiceRequest {
    pub client_id: Uuid,
    pub service_id: Uuid,
    pub package_type: PackageType,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub city: String,
    pub radius_km: f64,
    pub requested_date: DateTime<Utc>,
    pub duration_minutes: i32,
    pub notes: Option<String>,
}

/// A (provider, service, package type) triple with a price
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderOffering {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub service_id: Uuid,
    pub package_type: PackageType,
    pub price_per_visit: Option<f64>,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
}

/// Where a provider works from
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderLocation {
    pub id: Uuid,
    pub provider_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub address: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub is_primary: bool,
    /// `true` when the provider travels to the client
    pub is_home_service: bool,
    pub created_at: DateTime<Utc>,
}

impl ProviderLocation {
    pub fn point(&self) -> GeoPoint {
        GeoPoint::new(self.latitude, self.longitude)
    }
}

/// One entry of the offering index: an available offering and the
/// provider's primary location, if it has one
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub offering: ProviderOffering,
    pub location: Option<ProviderLocation>,
}

/// Proposed pairing between a request and a provider
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub id: Uuid,
    pub request_id: Uuid,
    pub provider_id: Uuid,
    pub status: MatchStatus,
    pub distance_km: Option<f64>,
    pub matched_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMatch {
    pub request_id: Uuid,
    pub provider_id: Uuid,
    pub distance_km: f64,
    pub matched_at: DateTime<Utc>,
}

/// Search result: an offering, its provider's location and, when the
/// search was anchored on a point, the distance to it
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    #[serde(flatten)]
    pub offering: ProviderOffering,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
    pub location: Option<ProviderLocation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_status_moves_forward_only() {
        assert!(RequestStatus::Open.can_transition_to(RequestStatus::Matched));
        assert!(RequestStatus::Matched.can_transition_to(RequestStatus::Accepted));
        assert!(RequestStatus::Accepted.can_transition_to(RequestStatus::Completed));
        assert!(!RequestStatus::Accepted.can_transition_to(RequestStatus::Matched));
        assert!(!RequestStatus::Completed.can_transition_to(RequestStatus::Open));
    }

    #[test]
    fn test_cancel_only_from_open_or_matched() {
        assert!(RequestStatus::Open.can_transition_to(RequestStatus::Cancelled));
        assert!(RequestStatus::Matched.can_transition_to(RequestStatus::Cancelled));
        assert!(!RequestStatus::Accepted.can_transition_to(RequestStatus::Cancelled));
        assert!(!RequestStatus::Cancelled.can_transition_to(RequestStatus::Open));
        assert_eq!(
            RequestStatus::sources_of(RequestStatus::Cancelled),
            vec![RequestStatus::Open, RequestStatus::Matched, RequestStatus::Cancelled]
        );
    }

    #[test]
    fn test_match_status_terminal() {
        assert!(MatchStatus::Proposed.can_transition_to(MatchStatus::Accepted));
        assert!(MatchStatus::Proposed.can_transition_to(MatchStatus::Rejected));
        assert!(!MatchStatus::Rejected.can_transition_to(MatchStatus::Accepted));
        assert!(!MatchStatus::Accepted.can_transition_to(MatchStatus::Rejected));
        assert!(MatchStatus::Accepted.can_transition_to(MatchStatus::Completed));
    }

    #[test]
    fn test_package_type_wire_names() {
        let json = serde_json::to_string(&PackageType::OnePassagePerDay).unwrap();
        assert_eq!(json, "\"1_passage_per_day\"");
        let parsed: PackageType = serde_json::from_str("\"half_day_stay\"").unwrap();
        assert_eq!(parsed, PackageType::HalfDayStay);
    }

    #[test]
    fn test_geo_point_validity() {
        assert!(GeoPoint::new(40.0, -74.0).is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -180.5).is_valid());
        assert!(!GeoPoint::new(f64::NAN, 0.0).is_valid());
    }
}
