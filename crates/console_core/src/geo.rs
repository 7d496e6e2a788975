use shared::domain::GeoPoint;

/// Mean Earth radius, as used by Leaflet's `distanceTo`.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

pub const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Great-circle (haversine) distance in meters.
pub fn distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

pub fn centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (lat_sum, lon_sum) = points
        .iter()
        .fold((0.0, 0.0), |(lat, lon), p| (lat + p.lat, lon + p.lon));
    Some(GeoPoint::new(lat_sum / n, lon_sum / n))
}

/// Largest distance from `center` to any of `points`; 0 for an empty set.
pub fn bounding_radius(center: GeoPoint, points: &[GeoPoint]) -> f64 {
    points
        .iter()
        .map(|p| distance(center, *p))
        .fold(0.0, f64::max)
}
