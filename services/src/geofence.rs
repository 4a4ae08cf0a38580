//! Great-circle distance checks.

/// Mean Earth radius used by every distance computation.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

/// A circular allowed area.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    pub center: Coordinate,
    pub radius_meters: f64,
}

impl Geofence {
    pub fn new(center: Coordinate, radius_meters: f64) -> Self {
        Self { center, radius_meters }
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        within_radius(
            point.latitude,
            point.longitude,
            self.center.latitude,
            self.center.longitude,
            self.radius_meters,
        )
    }
}

/// Haversine distance between two points, in meters.
pub fn haversine_distance_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();

    let a = (dlat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c * 1000.0
}

/// Whether the claimed point lies within `radius_meters` of the reference point.
///
/// The boundary is inclusive: a distance exactly equal to the radius is accepted.
pub fn within_radius(
    claimed_lat: f64,
    claimed_lon: f64,
    ref_lat: f64,
    ref_lon: f64,
    radius_meters: f64,
) -> bool {
    haversine_distance_meters(claimed_lat, claimed_lon, ref_lat, ref_lon) <= radius_meters
}
