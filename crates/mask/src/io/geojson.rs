use geojson::{Feature, FeatureCollection, Geometry, Value};
use crate::{
    error::{MaskError, Result},
    types::{DetectionProperties, PolygonFeature},
};

impl PolygonFeature {
    /// Export as a GeoJSON Feature with a single-ring Polygon geometry
    pub fn to_geojson(&self) -> Result<Feature> {
        let ring = self.ring.iter().map(|&[x, y]| vec![x, y]).collect();
        let geometry = Geometry::new(Value::Polygon(vec![ring]));

        let properties = match serde_json::to_value(&self.properties)? {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(MaskError::GeometricComputation(format!(
                    "feature properties serialized to a non-object: {other}"
                )));
            }
        };

        Ok(Feature {
            bbox: None,
            geometry: Some(geometry),
            id: Some(geojson::feature::Id::Number(serde_json::Number::from(self.label()))),
            properties: Some(properties),
            foreign_members: None,
        })
    }

    /// Load from a GeoJSON Feature carrying a Polygon geometry (exterior ring only)
    pub fn from_geojson(feature: &Feature) -> Result<Self> {
        let ring = match feature.geometry.as_ref().map(|geometry| &geometry.value) {
            Some(Value::Polygon(rings)) if !rings.is_empty() => rings[0]
                .iter()
                .filter(|position| position.len() >= 2)
                .map(|position| [position[0], position[1]])
                .collect(),
            _ => {
                return Err(MaskError::GeometricComputation(
                    "feature geometry is not a polygon".to_string(),
                ));
            }
        };

        let properties = feature.properties.clone().unwrap_or_default();
        let properties: DetectionProperties =
            serde_json::from_value(serde_json::Value::Object(properties))?;

        Ok(Self { ring, properties })
    }
}

/// Export a feature list as a FeatureCollection
pub fn features_to_geojson(features: &[PolygonFeature]) -> Result<FeatureCollection> {
    let features = features
        .iter()
        .map(PolygonFeature::to_geojson)
        .collect::<Result<Vec<_>>>()?;

    let mut foreign_members = serde_json::Map::new();
    foreign_members.insert(
        "feature_count".to_string(),
        serde_json::Value::Number(serde_json::Number::from(features.len())),
    );

    Ok(FeatureCollection {
        bbox: None,
        features,
        foreign_members: Some(foreign_members),
    })
}

/// Export to GeoJSON and serialize to JSON string
pub fn features_to_geojson_string(features: &[PolygonFeature]) -> Result<String> {
    let collection = features_to_geojson(features)?;
    Ok(serde_json::to_string_pretty(&collection)?)
}
