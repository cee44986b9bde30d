//! Structural GeoJSON lint for the raw text editor.
//!
//! Findings come in two levels: errors, which make the text unusable, and
//! messages, which are advice (deprecated members, winding order, overly
//! precise positions). Only errors block a commit.

use serde::Serialize;
use serde_json::{Map, Value};

/// Severity of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HintLevel {
    Error,
    Message,
}

/// A single lint finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Hint {
    pub level: HintLevel,
    pub message: String,
    /// 1-based line, known only for parse errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Hint {
    fn error(message: impl Into<String>) -> Self {
        Self {
            level: HintLevel::Error,
            message: message.into(),
            line: None,
        }
    }

    fn message(message: impl Into<String>) -> Self {
        Self {
            level: HintLevel::Message,
            message: message.into(),
            line: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.level == HintLevel::Error
    }
}

const GEOMETRY_TYPES: &[&str] = &[
    "Point",
    "MultiPoint",
    "LineString",
    "MultiLineString",
    "Polygon",
    "MultiPolygon",
    "GeometryCollection",
];

/// Lint a GeoJSON document.
pub fn hint(text: &str) -> Vec<Hint> {
    let value: Value = match serde_json::from_str(text) {
        Ok(value) => value,
        Err(e) => {
            return vec![Hint {
                level: HintLevel::Error,
                message: format!("Invalid JSON: {}", e),
                line: Some(e.line()),
            }];
        }
    };
    let mut linter = Linter::default();
    linter.root(&value);
    linter.hints
}

/// Lint and keep only the findings that block a commit.
pub fn errors(text: &str) -> Vec<Hint> {
    hint(text).into_iter().filter(Hint::is_error).collect()
}

#[derive(Default)]
struct Linter {
    hints: Vec<Hint>,
}

impl Linter {
    fn error(&mut self, message: impl Into<String>) {
        self.hints.push(Hint::error(message));
    }

    fn message(&mut self, message: impl Into<String>) {
        self.hints.push(Hint::message(message));
    }

    fn root(&mut self, value: &Value) {
        let Some(object) = self.object(value, "The root of a GeoJSON document") else {
            return;
        };
        match object.get("type").and_then(Value::as_str) {
            Some("FeatureCollection") => self.feature_collection(object),
            Some("Feature") => self.feature(object),
            Some(_) => self.geometry(value),
            None => self.error("The type property is required and was not found"),
        }
    }

    fn object<'a>(&mut self, value: &'a Value, what: &str) -> Option<&'a Map<String, Value>> {
        let object = value.as_object();
        if object.is_none() {
            self.error(format!("{} must be an object", what));
        }
        object
    }

    fn common(&mut self, object: &Map<String, Value>) {
        if object.contains_key("crs") {
            self.message("old-style crs member is not recommended, this object is equivalent to the default and should be removed");
        }
        if let Some(bbox) = object.get("bbox") {
            let valid = bbox.as_array().is_some_and(|items| {
                items.iter().all(Value::is_number) && items.len() >= 4 && items.len() % 2 == 0
            });
            if !valid {
                self.error("bbox must be an array of 2*n numbers");
            }
        }
    }

    fn feature_collection(&mut self, object: &Map<String, Value>) {
        self.common(object);
        match object.get("features").and_then(Value::as_array) {
            Some(features) => {
                for feature in features {
                    if let Some(feature) = self.object(feature, "Every feature") {
                        if feature.get("type").and_then(Value::as_str) != Some("Feature") {
                            self.error("Every member of a FeatureCollection's features array must be a Feature");
                            continue;
                        }
                        self.feature(feature);
                    }
                }
            }
            None => self.error("\"features\" member required and must be an array"),
        }
    }

    fn feature(&mut self, object: &Map<String, Value>) {
        self.common(object);
        if let Some(id) = object.get("id") {
            if !(id.is_string() || id.is_number()) {
                self.error("Feature \"id\" member must have a string or number value");
            }
        }
        if let Some(properties) = object.get("properties") {
            if !(properties.is_object() || properties.is_null()) {
                self.error("\"properties\" member must be an object or null");
            }
        }
        match object.get("geometry") {
            Some(Value::Null) => {}
            Some(geometry) => self.geometry(geometry),
            None => self.error("\"geometry\" member required"),
        }
    }

    fn geometry(&mut self, value: &Value) {
        let Some(object) = self.object(value, "A geometry") else {
            return;
        };
        self.common(object);
        let kind = match object.get("type").and_then(Value::as_str) {
            Some(kind) => kind,
            None => return self.error("The type property is required and was not found"),
        };
        if !GEOMETRY_TYPES.contains(&kind) {
            return self.error(format!("The type {} is unknown", kind));
        }

        if kind == "GeometryCollection" {
            match object.get("geometries").and_then(Value::as_array) {
                Some(geometries) => geometries.iter().for_each(|g| self.geometry(g)),
                None => self.error("\"geometries\" member required and must be an array"),
            }
            return;
        }

        let Some(coords) = object.get("coordinates") else {
            return self.error("\"coordinates\" member required");
        };
        match kind {
            "Point" => {
                self.position(coords);
            }
            "MultiPoint" => self.each(coords, "MultiPoint", |l, c| {
                l.position(c);
            }),
            "LineString" => self.line_string(coords),
            "MultiLineString" => self.each(coords, "MultiLineString", |l, c| l.line_string(c)),
            "Polygon" => self.polygon(coords),
            "MultiPolygon" => self.each(coords, "MultiPolygon", |l, c| l.polygon(c)),
            _ => unreachable!("geometry type checked above"),
        }
    }

    fn each(&mut self, coords: &Value, what: &str, mut f: impl FnMut(&mut Self, &Value)) {
        match coords.as_array() {
            Some(items) => items.iter().for_each(|item| f(self, item)),
            None => self.error(format!("{} coordinates must be an array", what)),
        }
    }

    fn position(&mut self, coords: &Value) -> Option<(f64, f64)> {
        let Some(items) = coords.as_array() else {
            self.error("position must be an array");
            return None;
        };
        if items.len() < 2 {
            self.error("position must have 2 or more elements");
            return None;
        }
        if !items.iter().all(Value::is_number) {
            self.error("each element in a position must be a number");
            return None;
        }
        if items.len() > 3 {
            self.message("position should not have more than 3 elements");
        }
        Some((items[0].as_f64()?, items[1].as_f64()?))
    }

    fn positions(&mut self, coords: &Value, min: usize, what: &str) -> Option<Vec<(f64, f64)>> {
        let Some(items) = coords.as_array() else {
            self.error(format!("{} coordinates must be an array", what));
            return None;
        };
        if items.len() < min {
            self.error(format!("{} must have {} or more positions", what, min));
        }
        let points: Vec<_> = items.iter().map(|p| self.position(p)).collect();
        points.into_iter().collect()
    }

    fn line_string(&mut self, coords: &Value) {
        self.positions(coords, 2, "a LineString");
    }

    fn polygon(&mut self, coords: &Value) {
        let Some(rings) = coords.as_array() else {
            return self.error("Polygon coordinates must be an array of rings");
        };
        for (index, ring) in rings.iter().enumerate() {
            let Some(points) = self.positions(ring, 4, "a LinearRing") else {
                continue;
            };
            if points.len() < 4 {
                continue;
            }
            if points.first() != points.last() {
                self.error("the first and last positions in a LinearRing of coordinates must be the same");
                continue;
            }
            // Exterior rings run counterclockwise, holes clockwise.
            let ccw = signed_area(&points) > 0.0;
            if ccw != (index == 0) {
                self.message("Polygons and MultiPolygons should follow the right-hand rule");
            }
        }
    }
}

fn signed_area(points: &[(f64, f64)]) -> f64 {
    points
        .windows(2)
        .map(|w| w[0].0 * w[1].1 - w[1].0 * w[0].1)
        .sum::<f64>()
        / 2.0
}
