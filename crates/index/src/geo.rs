//! Geo index (spec §4.6): a point index per predicate supporting
//! bounding-box queries and nearest-k against points. Polygon/linestring
//! values are stored for round-trip retrieval but are not queryable beyond
//! that, per spec's explicit restriction ("general-purpose GIS beyond
//! bounding-box and point predicates" is a Non-goal).

use std::collections::HashMap;

use parking_lot::RwLock;

use edgegraph_types::{EntityId, GeoLineString, GeoPoint, GeoPolygon};

#[derive(Default)]
pub struct GeoIndex {
    points: RwLock<HashMap<EntityId, GeoPoint>>,
    polygons: RwLock<HashMap<EntityId, GeoPolygon>>,
    linestrings: RwLock<HashMap<EntityId, GeoLineString>>,
}

impl GeoIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn index_point(&self, subject: EntityId, point: GeoPoint) {
        self.points.write().insert(subject, point);
    }

    pub fn index_polygon(&self, subject: EntityId, polygon: GeoPolygon) {
        self.polygons.write().insert(subject, polygon);
    }

    pub fn index_linestring(&self, subject: EntityId, linestring: GeoLineString) {
        self.linestrings.write().insert(subject, linestring);
    }

    pub fn get_polygon(&self, subject: &EntityId) -> Option<GeoPolygon> {
        self.polygons.read().get(subject).cloned()
    }

    pub fn get_linestring(&self, subject: &EntityId) -> Option<GeoLineString> {
        self.linestrings.read().get(subject).cloned()
    }

    pub fn delete(&self, subject: &EntityId) {
        self.points.write().remove(subject);
        self.polygons.write().remove(subject);
        self.linestrings.write().remove(subject);
    }

    /// Every point whose `(lat, lng)` falls within the inclusive box
    /// `[min_lat, max_lat] x [min_lng, max_lng]`.
    pub fn query_bbox(&self, min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Vec<EntityId> {
        self.points
            .read()
            .iter()
            .filter(|(_, p)| p.lat >= min_lat && p.lat <= max_lat && p.lng >= min_lng && p.lng <= max_lng)
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// The `k` nearest indexed points to `(lat, lng)` by haversine great-
    /// circle distance in meters, ascending.
    pub fn nearest_k(&self, lat: f64, lng: f64, k: usize) -> Vec<(EntityId, f64)> {
        let mut scored: Vec<(EntityId, f64)> =
            self.points.read().iter().map(|(id, p)| (id.clone(), haversine_meters(lat, lng, p.lat, p.lng))).collect();
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        scored.truncate(k);
        scored
    }
}

const EARTH_RADIUS_M: f64 = 6_371_000.0;

fn haversine_meters(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let (lat1_rad, lat2_rad) = (lat1.to_radians(), lat2.to_radians());
    let d_lat = lat2_rad - lat1_rad;
    let d_lng = (lng2 - lng1).to_radians();
    let a = (d_lat / 2.0).sin().powi(2) + lat1_rad.cos() * lat2_rad.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * a.sqrt().asin()
}
