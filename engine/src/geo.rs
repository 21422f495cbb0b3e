//! Great-circle distance for the geo-radius search filter.

use serde::{Deserialize, Serialize};

/// Mean Earth radius in kilometers.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// A WGS84 coordinate pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }

    /// Haversine great-circle distance to another point, in kilometers.
    pub fn distance_km(&self, other: &GeoPoint) -> f64 {
        let lat1 = self.lat.to_radians();
        let lat2 = other.lat.to_radians();
        let d_lat = (other.lat - self.lat).to_radians();
        let d_lon = (other.lon - self.lon).to_radians();

        let a = (d_lat / 2.0).sin().powi(2)
            + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);

        2.0 * EARTH_RADIUS_KM * a.sqrt().atan2((1.0 - a).sqrt())
    }
}

/// A radius filter around a query point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeoFilter {
    pub center: GeoPoint,
    pub radius_km: f64,
}

impl GeoFilter {
    pub fn new(lat: f64, lon: f64, radius_km: f64) -> Self {
        Self {
            center: GeoPoint::new(lat, lon),
            radius_km,
        }
    }

    /// Distance from the filter center when within the radius.
    pub fn distance_within(&self, point: &GeoPoint) -> Option<f64> {
        let distance = self.center.distance_km(point);
        (distance <= self.radius_km).then_some(distance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance() {
        let p = GeoPoint::new(48.8566, 2.3522);
        assert_eq!(p.distance_km(&p), 0.0);
    }

    #[test]
    fn paris_to_london() {
        let paris = GeoPoint::new(48.8566, 2.3522);
        let london = GeoPoint::new(51.5074, -0.1278);

        // Reference value ~343.5 km; allow 0.1% tolerance.
        let distance = paris.distance_km(&london);
        let reference = 343.5;
        assert!(
            (distance - reference).abs() / reference < 0.001,
            "got {}",
            distance
        );
    }

    #[test]
    fn new_york_to_sydney() {
        let new_york = GeoPoint::new(40.7128, -74.0060);
        let sydney = GeoPoint::new(-33.8688, 151.2093);

        // Reference value ~15_988 km; allow 0.1% tolerance.
        let distance = new_york.distance_km(&sydney);
        let reference = 15_988.0;
        assert!(
            (distance - reference).abs() / reference < 0.001,
            "got {}",
            distance
        );
    }

    #[test]
    fn symmetric() {
        let a = GeoPoint::new(10.0, 20.0);
        let b = GeoPoint::new(-30.0, 140.0);
        let d1 = a.distance_km(&b);
        let d2 = b.distance_km(&a);
        assert!((d1 - d2).abs() < 1e-9);
    }

    #[test]
    fn filter_within_radius() {
        let filter = GeoFilter::new(48.8566, 2.3522, 400.0);
        let london = GeoPoint::new(51.5074, -0.1278);
        let sydney = GeoPoint::new(-33.8688, 151.2093);

        assert!(filter.distance_within(&london).is_some());
        assert!(filter.distance_within(&sydney).is_none());
    }

    #[test]
    fn filter_boundary_inclusive() {
        let center = GeoPoint::new(0.0, 0.0);
        let point = GeoPoint::new(0.0, 1.0);
        let distance = center.distance_km(&point);

        let filter = GeoFilter {
            center,
            radius_km: distance,
        };
        assert!(filter.distance_within(&point).is_some());
    }
}
