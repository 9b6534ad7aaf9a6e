//! Great-circle distance and the rectangular pre-filter used by matching.

const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometers per degree of latitude, also per degree of longitude at the
/// equator.
const KM_PER_DEGREE: f64 = 111.045;

/// Floor for the cosine correction so a box centered at a pole stays finite.
const MIN_COS_LAT: f64 = 1e-9;

/// Haversine distance between two coordinates in kilometers, rounded to two
/// decimals. Symmetric in its arguments and finite for any pair of points,
/// antipodes included.
pub fn distance_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    // Floating error can push a past 1 for near-antipodal points.
    let a = a.min(1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    round2(EARTH_RADIUS_KM * c)
}

fn round2(km: f64) -> f64 {
    (km * 100.0).round() / 100.0
}

/// Latitude and longitude ranges guaranteed to contain every point within a
/// given radius of a center. The box is a coarse superset; callers must still
/// apply the exact distance filter to each candidate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub lat_min: f64,
    pub lat_max: f64,
    pub lon_min: f64,
    pub lon_max: f64,
}

impl BoundingBox {
    /// Builds the box for `radius_km` around a center. Latitude clamps to
    /// [-90, 90]; a box that would cross the antimeridian widens to the full
    /// longitude range, since the candidate query cannot wrap.
    pub fn around(lat: f64, lon: f64, radius_km: f64) -> Self {
        let lat_delta = radius_km / KM_PER_DEGREE;
        let lat_min = (lat - lat_delta).max(-90.0);
        let lat_max = (lat + lat_delta).min(90.0);

        // Meridians converge toward the poles, so the cosine correction uses
        // the poleward edge of the latitude range, not the center. A box that
        // reaches a pole covers every longitude.
        let worst_lat = lat_min.abs().max(lat_max.abs());
        let cos_lat = worst_lat.to_radians().cos().max(MIN_COS_LAT);
        let lon_delta = radius_km / (KM_PER_DEGREE * cos_lat);

        let (lon_min, lon_max) =
            if lon_delta >= 180.0 || lon - lon_delta < -180.0 || lon + lon_delta > 180.0 {
                (-180.0, 180.0)
            } else {
                (lon - lon_delta, lon + lon_delta)
            };

        Self {
            lat_min,
            lat_max,
            lon_min,
            lon_max,
        }
    }

    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.lat_min && lat <= self.lat_max && lon >= self.lon_min && lon <= self.lon_max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Great-circle destination point, used to walk the circle's rim and
    /// check box coverage from every bearing.
    fn destination(lat: f64, lon: f64, bearing_deg: f64, distance_km: f64) -> (f64, f64) {
        let d = distance_km / EARTH_RADIUS_KM;
        let brg = bearing_deg.to_radians();
        let lat1 = lat.to_radians();
        let lon1 = lon.to_radians();

        let lat2 = (lat1.sin() * d.cos() + lat1.cos() * d.sin() * brg.cos()).asin();
        let lon2 = lon1
            + (brg.sin() * d.sin() * lat1.cos()).atan2(d.cos() - lat1.sin() * lat2.sin());

        let lon2_deg = (lon2.to_degrees() + 540.0).rem_euclid(360.0) - 180.0;
        (lat2.to_degrees(), lon2_deg)
    }

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(distance_km(12.9716, 77.5946, 12.9716, 77.5946), 0.0);
    }

    #[test]
    fn is_symmetric() {
        let there = distance_km(51.5074, -0.1278, 40.7128, -74.0060);
        let back = distance_km(40.7128, -74.0060, 51.5074, -0.1278);
        assert_eq!(there, back);
    }

    #[test]
    fn matches_known_city_distances() {
        // Central Bengaluru, two streets apart.
        let close = distance_km(12.9716, 77.5946, 12.9750, 77.5970);
        assert!((close - 0.46).abs() <= 0.05, "got {close}");

        // Same city center to a point out past the airport.
        let far = distance_km(12.9716, 77.5946, 13.5000, 78.0000);
        assert!((far - 73.3).abs() < 0.5, "got {far}");

        // London to New York.
        let ocean = distance_km(51.5074, -0.1278, 40.7128, -74.0060);
        assert!((5560.0..5580.0).contains(&ocean), "got {ocean}");

        // One degree of longitude along the equator.
        let degree = distance_km(0.0, 0.0, 0.0, 1.0);
        assert!((111.1..111.3).contains(&degree), "got {degree}");
    }

    #[test]
    fn finite_for_antipodes() {
        let half_girth = distance_km(0.0, 0.0, 0.0, 180.0);
        assert!((half_girth - 20015.09).abs() < 1.0, "got {half_girth}");

        let pole_to_pole = distance_km(90.0, 0.0, -90.0, 0.0);
        assert!(pole_to_pole.is_finite());
        assert!((pole_to_pole - 20015.09).abs() < 1.0, "got {pole_to_pole}");
    }

    #[test]
    fn rounds_to_two_decimals() {
        let d = distance_km(12.9716, 77.5946, 12.9750, 77.5970);
        assert_eq!((d * 100.0).round() / 100.0, d);
    }

    #[test]
    fn box_covers_radius_at_all_latitudes() {
        for &radius in &[0.1, 5.0, 100.0, 1000.0] {
            for &lat in &[0.0, 45.0, 89.0] {
                let bbox = BoundingBox::around(lat, 0.0, radius);
                for bearing in (0..360).step_by(15) {
                    let (plat, plon) = destination(lat, 0.0, f64::from(bearing), radius);
                    assert!(
                        bbox.contains(plat, plon),
                        "({plat}, {plon}) at {radius} km bearing {bearing} escaped {bbox:?}"
                    );
                }
            }
        }
    }

    #[test]
    fn box_stays_tight_at_moderate_latitudes() {
        let bbox = BoundingBox::around(45.0, 0.0, 100.0);
        assert!(bbox.lat_max - bbox.lat_min < 2.0);
        assert!(bbox.lon_max - bbox.lon_min < 3.5);
    }

    #[test]
    fn box_clamps_at_the_poles() {
        let bbox = BoundingBox::around(89.9, 10.0, 500.0);
        assert!(bbox.lat_max <= 90.0);
        // The circle wraps the pole, so every longitude is in range.
        assert_eq!((bbox.lon_min, bbox.lon_max), (-180.0, 180.0));
        assert!(bbox.contains(89.0, -170.0));

        let degenerate = BoundingBox::around(90.0, 0.0, 1.0);
        assert!(degenerate.lat_min.is_finite() && degenerate.lon_min.is_finite());
        assert!(degenerate.contains(90.0, 0.0));
    }

    #[test]
    fn box_widens_across_the_antimeridian() {
        let bbox = BoundingBox::around(10.0, 179.95, 50.0);
        assert_eq!((bbox.lon_min, bbox.lon_max), (-180.0, 180.0));
        // A neighbor just across the seam is still inside the box.
        let (plat, plon) = destination(10.0, 179.95, 90.0, 40.0);
        assert!(plon < 0.0, "expected a wrapped longitude, got {plon}");
        assert!(bbox.contains(plat, plon));
    }

    #[test]
    fn zero_radius_is_a_point_box() {
        let bbox = BoundingBox::around(12.9716, 77.5946, 0.0);
        assert_eq!(bbox.lat_min, bbox.lat_max);
        assert_eq!(bbox.lon_min, bbox.lon_max);
        assert!(bbox.contains(12.9716, 77.5946));
    }
}
