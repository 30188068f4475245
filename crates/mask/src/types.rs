use geo_types::{Coord, LineString, Polygon};
use image::{ImageBuffer, Luma};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Integer label raster: `0` is background, every positive value is one object.
pub type LabelMask = ImageBuffer<Luma<u32>, Vec<u32>>;

/// A traced ring of `[row, column]` points, closed when first and last coincide.
pub type Contour = Vec<[f64; 2]>;

/// Attributes attached to a detected object.
///
/// The named fields serialize with the display keys clients expect
/// (`"Detection ID"`, `"Detection probability"`, `"Classification"`);
/// any other measurement an algorithm computes goes into `measurements`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionProperties {
    #[serde(rename = "Detection ID")]
    pub detection_id: u32,

    #[serde(
        rename = "Detection probability",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub detection_probability: Option<f64>,

    #[serde(
        rename = "Classification",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub classification: Option<String>,

    #[serde(flatten)]
    pub measurements: serde_json::Map<String, serde_json::Value>,
}

impl DetectionProperties {
    pub fn new(detection_id: u32) -> Self {
        Self {
            detection_id,
            detection_probability: None,
            classification: None,
            measurements: serde_json::Map::new(),
        }
    }
}

/// One detected object: a closed ring in image pixel coordinates (`[x, y]`)
/// plus its property map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PolygonFeature {
    pub ring: Vec<[f64; 2]>,
    pub properties: DetectionProperties,
}

impl PolygonFeature {
    pub fn new(label: u32, ring: Vec<[f64; 2]>) -> Self {
        Self {
            ring,
            properties: DetectionProperties::new(label),
        }
    }

    pub fn label(&self) -> u32 {
        self.properties.detection_id
    }

    pub fn vertex_count(&self) -> usize {
        self.ring.len()
    }

    /// Attach a numeric or textual measurement under `key`
    pub fn with_measurement(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.properties.measurements.insert(key.into(), value);
        self
    }

    /// Convert to geo-types Polygon for geometric operations
    pub fn to_geo_polygon(&self) -> Polygon<f64> {
        let coords: Vec<Coord<f64>> = self.ring.iter().map(|&[x, y]| Coord { x, y }).collect();
        Polygon::new(LineString::new(coords), vec![])
    }

    /// Area enclosed by the ring (shoelace formula)
    pub fn area(&self) -> f64 {
        use geo::Area;
        self.to_geo_polygon().unsigned_area()
    }

    /// Get the bounding box of the ring as (`[min_x, min_y]`, `[max_x, max_y]`)
    pub fn bounding_box(&self) -> ([f64; 2], [f64; 2]) {
        let mut min_x = f64::INFINITY;
        let mut min_y = f64::INFINITY;
        let mut max_x = f64::NEG_INFINITY;
        let mut max_y = f64::NEG_INFINITY;

        for &[x, y] in &self.ring {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        ([min_x, min_y], [max_x, max_y])
    }

    pub fn centroid(&self) -> [f64; 2] {
        use geo::Centroid;
        if let Some(centroid) = self.to_geo_polygon().centroid() {
            [centroid.x(), centroid.y()]
        } else {
            let (min, max) = self.bounding_box();
            [(min[0] + max[0]) / 2.0, (min[1] + max[1]) / 2.0]
        }
    }
}
