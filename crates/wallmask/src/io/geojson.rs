use std::path::Path;

use geojson::{Feature, FeatureCollection, Geometry, Value};
use serde_json::{Map, Number, Value as JsonValue};

use crate::{
    error::{Result, WallMaskError},
    types::{Point, SimplifiedContour, WallOutline},
};

fn number(value: f64) -> JsonValue {
    JsonValue::Number(Number::from_f64(value).unwrap_or(Number::from(0)))
}

impl WallOutline {
    /// Export every wall polygon as a GeoJSON feature
    pub fn to_geojson(&self) -> Result<FeatureCollection> {
        let mut features = Vec::with_capacity(self.contours.len());

        for (i, contour) in self.contours.iter().enumerate() {
            let ring: Vec<Vec<f64>> = contour
                .points
                .iter()
                .map(|&[x, y]| vec![x as f64, y as f64])
                .collect();
            let geometry = Geometry::new(Value::Polygon(vec![ring]));

            let mut properties = Map::new();
            properties.insert("id".to_string(), JsonValue::Number(Number::from(i)));
            properties.insert("area".to_string(), number(contour.area()));
            properties.insert("perimeter".to_string(), number(contour.perimeter()));
            properties.insert("point_count".to_string(), JsonValue::Number(Number::from(contour.len())));

            features.push(Feature {
                bbox: None,
                geometry: Some(geometry),
                id: Some(geojson::feature::Id::Number(Number::from(i))),
                properties: Some(properties),
                foreign_members: None,
            });
        }

        let mut foreign_members = Map::new();
        foreign_members.insert("image_width".to_string(), JsonValue::Number(Number::from(self.image_width)));
        foreign_members.insert("image_height".to_string(), JsonValue::Number(Number::from(self.image_height)));
        foreign_members.insert("wall_count".to_string(), JsonValue::Number(Number::from(self.contours.len())));
        foreign_members.insert(
            "dominant_color".to_string(),
            JsonValue::Array(self.dominant_color.iter().map(|&c| number(c as f64)).collect()),
        );

        Ok(FeatureCollection {
            bbox: None,
            features,
            foreign_members: Some(foreign_members),
        })
    }

    /// Export to GeoJSON and serialize to JSON string
    pub fn to_geojson_string(&self) -> Result<String> {
        let geojson = self.to_geojson()?;
        Ok(serde_json::to_string_pretty(&geojson)?)
    }

    /// Save GeoJSON to file
    pub fn save_geojson<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_geojson_string()?)?;
        Ok(())
    }

    /// Load a WallOutline from a GeoJSON file
    pub fn from_geojson_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let geojson_str = std::fs::read_to_string(path)?;
        Self::from_geojson_string(&geojson_str)
    }

    /// Load a WallOutline from a GeoJSON string. Skipped contours are not stored.
    pub fn from_geojson_string(geojson_str: &str) -> Result<Self> {
        let geojson: FeatureCollection = geojson_str.parse()?;

        let foreign_members = geojson
            .foreign_members
            .as_ref()
            .ok_or_else(|| WallMaskError::InvalidGeoJson("missing image metadata".to_string()))?;
        let dimension = |key: &str| {
            foreign_members
                .get(key)
                .and_then(|v| v.as_u64())
                .and_then(|v| u32::try_from(v).ok())
                .ok_or_else(|| WallMaskError::InvalidGeoJson(format!("missing or invalid {key}")))
        };
        let image_width = dimension("image_width")?;
        let image_height = dimension("image_height")?;

        let mut dominant_color = [0.0f32; 3];
        if let Some(JsonValue::Array(values)) = foreign_members.get("dominant_color") {
            for (slot, value) in dominant_color.iter_mut().zip(values) {
                *slot = value.as_f64().unwrap_or(0.0) as f32;
            }
        }

        let mut contours = Vec::new();
        for feature in geojson.features {
            let Some(geometry) = feature.geometry else {
                continue;
            };
            let Value::Polygon(rings) = geometry.value else {
                return Err(WallMaskError::InvalidGeoJson("wall features must be polygons".to_string()));
            };
            let Some(exterior) = rings.first() else {
                continue;
            };

            let points = exterior
                .iter()
                .map(|position| match position.as_slice() {
                    [x, y, ..] => Ok([x.round() as i32, y.round() as i32]),
                    _ => Err(WallMaskError::InvalidGeoJson("position needs two coordinates".to_string())),
                })
                .collect::<Result<Vec<Point>>>()?;
            if points.len() < 3 {
                return Err(WallMaskError::InvalidGeoJson(format!(
                    "wall polygon has {} points",
                    points.len()
                )));
            }
            contours.push(SimplifiedContour { points });
        }

        Ok(WallOutline {
            contours,
            skipped: Vec::new(),
            dominant_color,
            image_width,
            image_height,
        })
    }
}
