use anyhow::{Context, Result, anyhow};
use geo::bounding_rect::BoundingRect;
use geo::MultiPolygon;
use geojson::{GeoJson, Value};
use shapefile::Reader;
use std::convert::TryInto;
use std::fmt::Write;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use tracing::info;

/// One feature of a boundary file. Non-polygon shapes keep their
/// attributes but carry no geometry.
#[derive(Debug, Clone)]
pub struct BoundaryFeature {
    pub attributes: String,
    pub kind: String,
    pub geometry: Option<MultiPolygon<f64>>,
}

pub fn load_features(path: &Path) -> Result<Vec<BoundaryFeature>> {
    let extension = path.extension()
        .and_then(|e| e.to_str())
        .map(|s: &str| s.to_lowercase())
        .ok_or_else(|| anyhow!("Boundary file has no extension: {:?}", path))?;

    match extension.as_str() {
        "shp" => load_shapefile(path),
        "json" | "geojson" => load_geojson(path),
        _ => Err(anyhow!("Unsupported geometry format: {}", extension)),
    }
}

/// Polygon outlines only, used as the heatmap backdrop.
pub fn load_boundaries(path: &Path) -> Result<Vec<MultiPolygon<f64>>> {
    let boundaries: Vec<_> = load_features(path)?
        .into_iter()
        .filter_map(|f| f.geometry)
        .collect();
    info!("Loaded {} boundary polygons from {:?}", boundaries.len(), path);
    Ok(boundaries)
}

fn load_shapefile(path: &Path) -> Result<Vec<BoundaryFeature>> {
    let mut reader = Reader::from_path(path)
        .with_context(|| format!("Failed to open Shapefile: {:?}", path))?;

    let mut features = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result?;
        let kind = format!("{:?}", shape.shapetype());
        let geometry: Option<MultiPolygon<f64>> = match shape {
            shapefile::Shape::Polygon(polygon) => Some(
                polygon.try_into()
                    .map_err(|e| anyhow!("Failed to convert polygon: {:?}", e))?,
            ),
            shapefile::Shape::PolygonM(polygon) => Some(
                polygon.try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonM: {:?}", e))?,
            ),
            shapefile::Shape::PolygonZ(polygon) => Some(
                polygon.try_into()
                    .map_err(|e| anyhow!("Failed to convert polygonZ: {:?}", e))?,
            ),
            _ => None,
        };
        features.push(BoundaryFeature {
            attributes: format!("{:?}", record),
            kind,
            geometry,
        });
    }

    Ok(features)
}

fn load_geojson(path: &Path) -> Result<Vec<BoundaryFeature>> {
    let file = File::open(path)
        .with_context(|| format!("Failed to open GeoJSON file: {:?}", path))?;
    let geojson = GeoJson::from_reader(BufReader::new(file)).context("Failed to parse GeoJSON")?;

    let collection = match geojson {
        GeoJson::FeatureCollection(fc) => fc,
        _ => return Err(anyhow!("GeoJSON must be a FeatureCollection")),
    };

    let mut features = Vec::new();
    for feature in collection.features {
        let attributes = match &feature.properties {
            Some(props) => serde_json::to_string(props)?,
            None => "{}".to_string(),
        };

        let (kind, geometry) = match feature.geometry {
            Some(geom) => {
                let kind = value_kind(&geom.value);
                let geometry: Option<MultiPolygon<f64>> = match geom.value {
                    Value::Polygon(_) | Value::MultiPolygon(_) => {
                        let geo_geom: geo::Geometry<f64> = geom.value.try_into()
                            .map_err(|e| anyhow!("Failed to convert geometry: {:?}", e))?;
                        match geo_geom {
                            geo::Geometry::Polygon(p) => Some(MultiPolygon::new(vec![p])),
                            geo::Geometry::MultiPolygon(mp) => Some(mp),
                            _ => None,
                        }
                    }
                    _ => None,
                };
                (kind, geometry)
            }
            None => ("Null".to_string(), None),
        };

        features.push(BoundaryFeature { attributes, kind, geometry });
    }

    Ok(features)
}

fn value_kind(value: &Value) -> String {
    match value {
        Value::Point(_) => "Point",
        Value::MultiPoint(_) => "MultiPoint",
        Value::LineString(_) => "LineString",
        Value::MultiLineString(_) => "MultiLineString",
        Value::Polygon(_) => "Polygon",
        Value::MultiPolygon(_) => "MultiPolygon",
        Value::GeometryCollection(_) => "GeometryCollection",
    }
    .to_string()
}

/// Text report printed by `inspect`: the first `rows` attribute records,
/// then one geometry line per feature.
pub fn inspect_report(features: &[BoundaryFeature], rows: usize) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} features", features.len());

    let _ = writeln!(out, "\nAttributes (first {}):", rows.min(features.len()));
    for (i, feature) in features.iter().take(rows).enumerate() {
        let _ = writeln!(out, "{:>4}  {}", i, feature.attributes);
    }

    let _ = writeln!(out, "\nGeometry:");
    for (i, feature) in features.iter().enumerate() {
        let summary = match &feature.geometry {
            Some(mp) => match mp.bounding_rect() {
                Some(rect) => format!(
                    "{} ({} polygons) bbox [{:.4}, {:.4}, {:.4}, {:.4}]",
                    feature.kind,
                    mp.0.len(),
                    rect.min().x,
                    rect.min().y,
                    rect.max().x,
                    rect.max().y
                ),
                None => format!("{} (empty)", feature.kind),
            },
            None => feature.kind.clone(),
        };
        let _ = writeln!(out, "{:>4}  {}", i, summary);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    const DIVISIONS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"NAME": "East North Central"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [[[-91.0, 37.0], [-80.0, 37.0], [-80.0, 47.0], [-91.0, 47.0], [-91.0, 37.0]]]
                }
            },
            {
                "type": "Feature",
                "properties": {"NAME": "Marker"},
                "geometry": {"type": "Point", "coordinates": [-90.0, 40.0]}
            }
        ]
    }"#;

    fn geojson_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".geojson").tempfile().unwrap();
        file.write_all(DIVISIONS.as_bytes()).unwrap();
        file
    }

    #[test]
    fn loads_geojson_features() {
        let file = geojson_file();
        let features = load_features(file.path()).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].kind, "Polygon");
        assert!(features[0].attributes.contains("East North Central"));
        assert!(features[0].geometry.is_some());
        assert_eq!(features[1].kind, "Point");
        assert!(features[1].geometry.is_none());
    }

    #[test]
    fn boundaries_keep_only_polygons() {
        let file = geojson_file();
        assert_eq!(load_boundaries(file.path()).unwrap().len(), 1);
    }

    #[test]
    fn report_lists_head_and_geometry() {
        let file = geojson_file();
        let features = load_features(file.path()).unwrap();
        let report = inspect_report(&features, 1);
        assert!(report.starts_with("2 features"));
        assert!(report.contains("East North Central"));
        assert!(!report.contains("Marker"));
        assert!(report.contains("Polygon (1 polygons) bbox [-91.0000, 37.0000, -80.0000, 47.0000]"));
    }

    #[test]
    fn rejects_unknown_extension() {
        let err = load_features(Path::new("divisions.kml")).unwrap_err();
        assert!(err.to_string().contains("Unsupported geometry format"));
    }
}
