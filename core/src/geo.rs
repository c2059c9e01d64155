/// Mean Earth radius used for great-circle distances.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Haversine distance in meters between two (lat, lon) pairs given in degrees.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Round to 6 decimal places (~11 cm at the equator).
pub fn round6(value: f64) -> f64 {
    (value * 1_000_000.0).round() / 1_000_000.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_distance_for_identical_points() {
        assert_eq!(haversine_m(35.0, 135.0, 35.0, 135.0), 0.0);
    }

    #[test]
    fn one_degree_of_latitude_is_about_111_km() {
        let d = haversine_m(0.0, 0.0, 1.0, 0.0);
        assert!((d - 111_195.0).abs() < 1.0, "got {d}");
    }

    #[test]
    fn short_east_west_hop() {
        // 0.0005 deg of longitude at 35N
        let d = haversine_m(35.0, 135.0, 35.0, 135.0005);
        assert!(d > 40.0 && d < 50.0, "got {d}");
    }

    #[test]
    fn rounds_to_six_places() {
        assert_eq!(round6(35.000_000_4), 35.0);
        assert_eq!(round6(135.100_066_66), 135.100_067);
        assert_eq!(round6(-12.345_678_9), -12.345_679);
    }
}
