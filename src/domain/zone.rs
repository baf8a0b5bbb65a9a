//! Zone catalog and geofence resolution
//!
//! Zones are static simple polygons loaded once from configuration. Only the
//! sensor readings (noise, smoke) and capacity are mutable after load.
//!
//! Resolution walks the catalog in declaration order and returns the first
//! zone whose polygon contains the point, so overlapping zones are tie-broken
//! by catalog order.

use crate::domain::types::{Point, ZoneId};
use anyhow::bail;
use rustc_hash::FxHashMap;
use serde::Serialize;

/// A named polygonal room of the facility
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Zone {
    pub id: ZoneId,
    pub name: String,
    /// Closed ring, vertices in order. The closing edge is implicit.
    pub polygon: Vec<[f64; 2]>,
    /// Last noise reading
    pub noise: f64,
    /// Last smoke reading
    pub smoke: f64,
    /// Maximum allowed occupancy (strictly exceeding it is a violation)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<u32>,
}

impl Zone {
    pub fn new(id: impl Into<String>, name: impl Into<String>, polygon: Vec<[f64; 2]>) -> Self {
        Self {
            id: ZoneId::new(id),
            name: name.into(),
            polygon,
            noise: 0.0,
            smoke: 0.0,
            capacity: None,
        }
    }

    pub fn with_capacity(mut self, capacity: u32) -> Self {
        self.capacity = Some(capacity);
        self
    }

    /// Crossing-number test against this zone's polygon
    #[inline]
    pub fn contains(&self, point: Point) -> bool {
        point_in_polygon(point, &self.polygon)
    }

    /// Whether the given occupancy strictly exceeds the configured capacity
    #[inline]
    pub fn is_over_capacity(&self, occupancy: u32) -> bool {
        self.capacity.is_some_and(|cap| occupancy > cap)
    }
}

/// Crossing-number (ray casting) point-in-polygon test.
///
/// An edge (i, j) crosses the horizontal ray towards +x when exactly one of its
/// endpoints has y >= point.y and the edge's x at point.y lies strictly to the
/// right of point.x. Odd crossings means inside.
///
/// The half-open y rule makes a vertex touching the ray count once, and makes
/// points on an edge resolve the same way on every call.
pub fn point_in_polygon(point: Point, polygon: &[[f64; 2]]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }

    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];

        if (yi >= point.y) != (yj >= point.y) {
            // yi != yj here, so the division is safe
            let x_cross = (xj - xi) * (point.y - yi) / (yj - yi) + xi;
            if x_cross > point.x {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

/// Ordered, id-indexed set of zones
#[derive(Debug, Clone)]
pub struct ZoneCatalog {
    zones: Vec<Zone>,
    index: FxHashMap<ZoneId, usize>,
}

impl ZoneCatalog {
    /// Build a catalog, rejecting degenerate polygons, zero capacities and duplicate ids
    pub fn new(zones: Vec<Zone>) -> anyhow::Result<Self> {
        let mut index = FxHashMap::default();
        for (pos, zone) in zones.iter().enumerate() {
            if zone.polygon.len() < 3 {
                bail!("zone {} has {} vertices, need at least 3", zone.id, zone.polygon.len());
            }
            if zone.capacity == Some(0) {
                bail!("zone {} has capacity 0", zone.id);
            }
            if index.insert(zone.id.clone(), pos).is_some() {
                bail!("duplicate zone id {}", zone.id);
            }
        }
        Ok(Self { zones, index })
    }

    /// Resolve a coordinate to the first enclosing zone in catalog order
    pub fn resolve(&self, point: Point) -> Option<&Zone> {
        self.zones.iter().find(|zone| zone.contains(point))
    }

    pub fn get(&self, id: &ZoneId) -> Option<&Zone> {
        self.index.get(id).map(|&pos| &self.zones[pos])
    }

    pub fn get_mut(&mut self, id: &ZoneId) -> Option<&mut Zone> {
        self.index.get(id).map(|&pos| &mut self.zones[pos])
    }

    pub fn contains_id(&self, id: &ZoneId) -> bool {
        self.index.contains_key(id)
    }

    /// Zones in declaration order
    pub fn zones(&self) -> &[Zone] {
        &self.zones
    }

    pub fn ids(&self) -> impl Iterator<Item = &ZoneId> {
        self.zones.iter().map(|z| &z.id)
    }

    /// Id of the last zone in declaration order
    pub fn last_id(&self) -> Option<&ZoneId> {
        self.zones.last().map(|z| &z.id)
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }

    /// Zero every sensor reading. Geometry and capacity are untouched.
    pub fn reset_readings(&mut self) {
        for zone in &mut self.zones {
            zone.noise = 0.0;
            zone.smoke = 0.0;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x0: f64, y0: f64, x1: f64, y1: f64) -> Vec<[f64; 2]> {
        vec![[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
    }

    fn facility() -> ZoneCatalog {
        ZoneCatalog::new(vec![
            Zone::new("A", "Comedor", square(0.0, 0.0, 10.0, 10.0)).with_capacity(20),
            Zone::new("B", "Celdas", square(6.0, 10.0, 18.0, 20.0)),
            Zone::new("C", "Patio", square(12.0, 0.0, 22.0, 10.0)),
            Zone::new("D", "Duchas", square(3.0, 12.0, 6.0, 20.0)).with_capacity(20),
        ])
        .unwrap()
    }

    #[test]
    fn test_interior_point_resolves() {
        let catalog = facility();
        assert_eq!(catalog.resolve(Point::new(5.0, 5.0)).unwrap().name, "Comedor");
        assert_eq!(catalog.resolve(Point::new(15.0, 5.0)).unwrap().name, "Patio");
        assert_eq!(catalog.resolve(Point::new(10.0, 15.0)).unwrap().id, ZoneId::new("B"));
        assert_eq!(catalog.resolve(Point::new(4.5, 16.0)).unwrap().id, ZoneId::new("D"));
    }

    #[test]
    fn test_exterior_point_resolves_to_none() {
        let catalog = facility();
        assert!(catalog.resolve(Point::new(11.0, 5.0)).is_none());
        assert!(catalog.resolve(Point::new(-1.0, -1.0)).is_none());
        assert!(catalog.resolve(Point::new(30.0, 30.0)).is_none());
    }

    #[test]
    fn test_non_convex_polygon() {
        // U shape open at the top: the notch between x=4..6 above y=4 is outside
        let u_shape = vec![
            [0.0, 0.0],
            [10.0, 0.0],
            [10.0, 10.0],
            [6.0, 10.0],
            [6.0, 4.0],
            [4.0, 4.0],
            [4.0, 10.0],
            [0.0, 10.0],
        ];
        assert!(point_in_polygon(Point::new(2.0, 8.0), &u_shape));
        assert!(point_in_polygon(Point::new(8.0, 8.0), &u_shape));
        assert!(point_in_polygon(Point::new(5.0, 2.0), &u_shape));
        assert!(!point_in_polygon(Point::new(5.0, 8.0), &u_shape));
        assert!(!point_in_polygon(Point::new(11.0, 2.0), &u_shape));
    }

    #[test]
    fn test_triangle() {
        let triangle = vec![[0.0, 0.0], [10.0, 0.0], [5.0, 10.0]];
        assert!(point_in_polygon(Point::new(5.0, 5.0), &triangle));
        assert!(!point_in_polygon(Point::new(1.0, 8.0), &triangle));
    }

    #[test]
    fn test_overlap_tie_broken_by_catalog_order() {
        let catalog = ZoneCatalog::new(vec![
            Zone::new("X", "First", square(0.0, 0.0, 10.0, 10.0)),
            Zone::new("Y", "Second", square(5.0, 5.0, 15.0, 15.0)),
        ])
        .unwrap();
        assert_eq!(catalog.resolve(Point::new(7.0, 7.0)).unwrap().id.as_str(), "X");
        assert_eq!(catalog.resolve(Point::new(12.0, 12.0)).unwrap().id.as_str(), "Y");
    }

    #[test]
    fn test_edge_points_are_stable() {
        let catalog = facility();
        for _ in 0..3 {
            // Right edge is excluded by the strict x comparison
            assert!(catalog.resolve(Point::new(10.0, 5.0)).is_none());
            // Half-open y rule: top edge included, bottom edge excluded
            assert_eq!(catalog.resolve(Point::new(5.0, 10.0)).unwrap().id.as_str(), "A");
            assert!(catalog.resolve(Point::new(5.0, 0.0)).is_none());
        }
    }

    #[test]
    fn test_degenerate_polygon_never_contains() {
        assert!(!point_in_polygon(Point::new(0.0, 0.0), &[[0.0, 0.0], [1.0, 1.0]]));
    }

    #[test]
    fn test_catalog_rejects_invalid_zones() {
        let short = ZoneCatalog::new(vec![Zone::new("A", "a", vec![[0.0, 0.0], [1.0, 0.0]])]);
        assert!(short.is_err());

        let dup = ZoneCatalog::new(vec![
            Zone::new("A", "a", square(0.0, 0.0, 1.0, 1.0)),
            Zone::new("A", "b", square(2.0, 2.0, 3.0, 3.0)),
        ]);
        assert!(dup.is_err());

        let zero = ZoneCatalog::new(vec![Zone::new("A", "a", square(0.0, 0.0, 1.0, 1.0)).with_capacity(0)]);
        assert!(zero.is_err());
    }

    #[test]
    fn test_reset_readings_keeps_geometry() {
        let mut catalog = facility();
        let zone = catalog.get_mut(&ZoneId::new("A")).unwrap();
        zone.noise = 95.0;
        zone.smoke = 3.0;

        catalog.reset_readings();

        let zone = catalog.get(&ZoneId::new("A")).unwrap();
        assert_eq!(zone.noise, 0.0);
        assert_eq!(zone.smoke, 0.0);
        assert_eq!(zone.capacity, Some(20));
        assert_eq!(zone.polygon, square(0.0, 0.0, 10.0, 10.0));
    }

    #[test]
    fn test_rooms_json_shape() {
        let catalog = facility();
        let json = serde_json::to_value(&catalog.zones()[0]).unwrap();
        assert_eq!(json["id"], "A");
        assert_eq!(json["name"], "Comedor");
        assert_eq!(json["capacity"], 20);
        assert_eq!(json["polygon"][2][0], 10.0);

        let json = serde_json::to_value(&catalog.zones()[1]).unwrap();
        assert!(json.get("capacity").is_none());
    }

    #[test]
    fn test_last_id() {
        assert_eq!(facility().last_id().unwrap().as_str(), "D");
    }
}
