use std::cmp::Ordering;

use crate::core::distance::distance_between;
use crate::models::{Candidate, GeoPoint, PackageType, ServiceRequest};

/// Why a candidate was dropped
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Rejection {
    PackageMismatch,
    NoPrimaryLocation,
    OutOfRange { distance_km: f64 },
}

/// Outcome of checking one candidate
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Kept; `distance_km` is set whenever the filter has an origin
    Keep { distance_km: Option<f64> },
    Drop(Rejection),
}

/// Package + radius filter shared by the matching engine and provider search
#[derive(Debug, Clone, Copy)]
pub struct CandidateFilter {
    origin: Option<GeoPoint>,
    radius_km: f64,
    package_type: Option<PackageType>,
}

impl CandidateFilter {
    pub fn new(origin: Option<GeoPoint>, radius_km: f64, package_type: Option<PackageType>) -> Self {
        Self {
            origin,
            radius_km,
            package_type,
        }
    }

    /// Filter for a service request: its point, radius and package type
    pub fn for_request(request: &ServiceRequest) -> Self {
        Self::new(Some(request.point()), request.radius_km, Some(request.package_type))
    }

    /// Check one candidate.
    ///
    /// Without an origin, distance is not evaluated and a missing location
    /// does not drop the candidate.
    #[inline]
    pub fn evaluate(&self, candidate: &Candidate) -> Verdict {
        if let Some(wanted) = self.package_type {
            if candidate.offering.package_type != wanted {
                return Verdict::Drop(Rejection::PackageMismatch);
            }
        }

        let Some(origin) = self.origin else {
            return Verdict::Keep { distance_km: None };
        };

        let Some(location) = &candidate.location else {
            return Verdict::Drop(Rejection::NoPrimaryLocation);
        };

        let distance_km = distance_between(origin, location.point());
        if distance_km.is_nan() || distance_km > self.radius_km {
            return Verdict::Drop(Rejection::OutOfRange { distance_km });
        }

        Verdict::Keep {
            distance_km: Some(distance_km),
        }
    }

    /// Keep the candidates that pass, closest first.
    ///
    /// Ties (and candidates without distance) are ordered by provider id so
    /// the result does not depend on the order the index returned them in.
    pub fn shortlist(&self, candidates: Vec<Candidate>) -> Vec<(Candidate, Option<f64>)> {
        let mut kept: Vec<(Candidate, Option<f64>)> = candidates
            .into_iter()
            .filter_map(|candidate| match self.evaluate(&candidate) {
                Verdict::Keep { distance_km } => Some((candidate, distance_km)),
                Verdict::Drop(reason) => {
                    tracing::trace!(
                        "Dropped offering {} of provider {}: {:?}",
                        candidate.offering.id,
                        candidate.offering.provider_id,
                        reason
                    );
                    None
                }
            })
            .collect();

        kept.sort_by(|(a, da), (b, db)| {
            compare_distance(*da, *db).then_with(|| {
                a.offering
                    .provider_id
                    .cmp(&b.offering.provider_id)
                    .then_with(|| a.offering.id.cmp(&b.offering.id))
            })
        });

        kept
    }
}

fn compare_distance(a: Option<f64>, b: Option<f64>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ProviderLocation, ProviderOffering};
    use chrono::Utc;
    use uuid::Uuid;

    fn candidate(package_type: PackageType, location: Option<(f64, f64)>) -> Candidate {
        let provider_id = Uuid::new_v4();
        Candidate {
            offering: ProviderOffering {
                id: Uuid::new_v4(),
                provider_id,
                service_id: Uuid::new_v4(),
                package_type,
                price_per_visit: Some(50.0),
                is_available: true,
                created_at: Utc::now(),
            },
            location: location.map(|(latitude, longitude)| ProviderLocation {
                id: Uuid::new_v4(),
                provider_id,
                latitude,
                longitude,
                address: "1 Main St".to_string(),
                city: "Newark".to_string(),
                postal_code: None,
                is_primary: true,
                is_home_service: true,
                created_at: Utc::now(),
            }),
        }
    }

    fn filter() -> CandidateFilter {
        CandidateFilter::new(
            Some(GeoPoint::new(40.0, -74.0)),
            10.0,
            Some(PackageType::HalfDayStay),
        )
    }

    #[test]
    fn test_keeps_nearby_candidate() {
        let verdict = filter().evaluate(&candidate(PackageType::HalfDayStay, Some((40.05, -74.0))));
        match verdict {
            Verdict::Keep { distance_km: Some(d) } => assert!((d - 5.56).abs() < 0.01, "got {}", d),
            other => panic!("expected keep, got {:?}", other),
        }
    }

    #[test]
    fn test_drops_package_mismatch() {
        let verdict = filter().evaluate(&candidate(PackageType::FullDayStay, Some((40.0, -74.0))));
        assert_eq!(verdict, Verdict::Drop(Rejection::PackageMismatch));
    }

    #[test]
    fn test_drops_missing_location() {
        let verdict = filter().evaluate(&candidate(PackageType::HalfDayStay, None));
        assert_eq!(verdict, Verdict::Drop(Rejection::NoPrimaryLocation));
    }

    #[test]
    fn test_drops_out_of_range() {
        let verdict = filter().evaluate(&candidate(PackageType::HalfDayStay, Some((41.0, -74.0))));
        assert!(matches!(verdict, Verdict::Drop(Rejection::OutOfRange { .. })));
    }

    #[test]
    fn test_radius_boundary_is_inclusive() {
        let exact = distance_between(GeoPoint::new(40.0, -74.0), GeoPoint::new(40.05, -74.0));
        let filter = CandidateFilter::new(
            Some(GeoPoint::new(40.0, -74.0)),
            exact,
            Some(PackageType::HalfDayStay),
        );
        let verdict = filter.evaluate(&candidate(PackageType::HalfDayStay, Some((40.05, -74.0))));
        assert!(matches!(verdict, Verdict::Keep { .. }));
    }

    #[test]
    fn test_without_origin_keeps_everything_of_package() {
        let filter = CandidateFilter::new(None, 10.0, Some(PackageType::HalfDayStay));
        assert_eq!(
            filter.evaluate(&candidate(PackageType::HalfDayStay, None)),
            Verdict::Keep { distance_km: None }
        );
        assert_eq!(
            filter.evaluate(&candidate(PackageType::HalfDayStay, Some((60.0, 10.0)))),
            Verdict::Keep { distance_km: None }
        );
    }

    #[test]
    fn test_shortlist_sorted_by_distance() {
        let candidates = vec![
            candidate(PackageType::HalfDayStay, Some((40.08, -74.0))),
            candidate(PackageType::HalfDayStay, Some((40.01, -74.0))),
            candidate(PackageType::FullDayStay, Some((40.0, -74.0))),
            candidate(PackageType::HalfDayStay, Some((40.04, -74.0))),
        ];

        let kept = filter().shortlist(candidates);

        assert_eq!(kept.len(), 3);
        let distances: Vec<f64> = kept.iter().filter_map(|(_, d)| *d).collect();
        assert!(distances.windows(2).all(|w| w[0] <= w[1]), "{:?}", distances);
    }

    #[test]
    fn test_nan_origin_drops_candidate() {
        let filter = CandidateFilter::new(
            Some(GeoPoint::new(f64::NAN, f64::NAN)),
            10.0,
            Some(PackageType::HalfDayStay),
        );
        let verdict = filter.evaluate(&candidate(PackageType::HalfDayStay, Some((40.0, -74.0))));
        assert!(matches!(verdict, Verdict::Drop(Rejection::OutOfRange { .. })));
    }
}
