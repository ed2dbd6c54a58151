use crate::models::order::GeoPoint;

const EARTH_RADIUS_KM: f64 = 6_371.0;

/// Great-circle distance between two stops.
pub fn distance_km(from: &GeoPoint, to: &GeoPoint) -> f64 {
    let (lat1, lat2) = (from.lat.to_radians(), to.lat.to_radians());
    let half_dlat = ((to.lat - from.lat).to_radians() / 2.0).sin();
    let half_dlng = ((to.lng - from.lng).to_radians() / 2.0).sin();

    let h = half_dlat.powi(2) + lat1.cos() * lat2.cos() * half_dlng.powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Rounds to 100 m, which is as precise as a route overview needs.
pub fn round_km(km: f64) -> f64 {
    (km * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::{distance_km, round_km};
    use crate::models::order::GeoPoint;

    #[test]
    fn same_stop_is_zero_km_away() {
        let dam = GeoPoint {
            lat: 52.3731,
            lng: 4.8926,
        };
        assert!(distance_km(&dam, &dam) < 1e-9);
    }

    #[test]
    fn amsterdam_to_rotterdam_is_about_57_km() {
        let amsterdam = GeoPoint {
            lat: 52.3676,
            lng: 4.9041,
        };
        let rotterdam = GeoPoint {
            lat: 51.9244,
            lng: 4.4777,
        };
        let km = distance_km(&amsterdam, &rotterdam);
        assert!((km - 57.0).abs() < 3.0, "{km}");
    }

    #[test]
    fn rounding_keeps_one_decimal() {
        assert_eq!(round_km(12.345), 12.3);
        assert_eq!(round_km(0.06), 0.1);
    }
}
