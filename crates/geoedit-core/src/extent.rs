//! Bounding boxes of features, used to fit the map view.

use crate::feature::Feature;
use kurbo::{Point, Rect};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Screen padding around fitted bounds, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub fn uniform(value: f64) -> Self {
        Self {
            top: value,
            right: value,
            bottom: value,
            left: value,
        }
    }
}

/// Where the map should open.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InitialView {
    /// Bounds in longitude/latitude (x = lng, y = lat).
    pub bounds: Rect,
    pub padding: Padding,
}

/// Bounding box of every coordinate in `features`.
pub fn extent(features: &[Feature]) -> Option<Rect> {
    let mut bounds: Option<Rect> = None;
    for feature in features {
        visit_geometry(&feature.geometry, &mut |p| {
            bounds = Some(match bounds {
                Some(rect) => rect.union_pt(p),
                None => Rect::from_points(p, p),
            });
        });
    }
    bounds
}

fn visit_geometry(geometry: &Value, f: &mut impl FnMut(Point)) {
    if let Some(geometries) = geometry.get("geometries").and_then(Value::as_array) {
        for g in geometries {
            visit_geometry(g, f);
        }
    }
    if let Some(coords) = geometry.get("coordinates") {
        visit_coords(coords, f);
    }
}

fn visit_coords(coords: &Value, f: &mut impl FnMut(Point)) {
    let Some(items) = coords.as_array() else {
        return;
    };
    match (items.first().and_then(Value::as_f64), items.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => f(Point::new(x, y)),
        _ => {
            for item in items {
                visit_coords(item, f);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extent_of_mixed_geometries() {
        let features = vec![
            Feature::new(json!({"type": "Point", "coordinates": [-1.0, 2.0]})),
            Feature::new(json!({
                "type": "Polygon",
                "coordinates": [[[0, 0], [4, 0], [4, 3], [0, 0]]]
            })),
        ];
        assert_eq!(extent(&features), Some(Rect::new(-1.0, 0.0, 4.0, 3.0)));
    }

    #[test]
    fn test_extent_of_geometry_collection() {
        let features = vec![Feature::new(json!({
            "type": "GeometryCollection",
            "geometries": [
                {"type": "Point", "coordinates": [1, 1]},
                {"type": "LineString", "coordinates": [[2, 2], [3, 5]]}
            ]
        }))];
        assert_eq!(extent(&features), Some(Rect::new(1.0, 1.0, 3.0, 5.0)));
    }

    #[test]
    fn test_extent_of_nothing() {
        assert_eq!(extent(&[]), None);
        assert_eq!(extent(&[Feature::new(Value::Null)]), None);
    }
}
