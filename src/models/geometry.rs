//! GeoJSON-shaped geometries attached to file descriptors.

use serde::{Deserialize, Serialize};

/// `[x, y]` in the layer's coordinate reference system
pub type Position = [f64; 2];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Point(Position),
    Polygon(Vec<Vec<Position>>),
    MultiPolygon(Vec<Vec<Vec<Position>>>),
}

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    fn from_positions<'a>(positions: impl IntoIterator<Item = &'a Position>) -> Option<Self> {
        positions.into_iter().fold(None, |bbox, [x, y]| {
            Some(match bbox {
                None => Self {
                    min_x: *x,
                    min_y: *y,
                    max_x: *x,
                    max_y: *y,
                },
                Some(b) => Self {
                    min_x: b.min_x.min(*x),
                    min_y: b.min_y.min(*y),
                    max_x: b.max_x.max(*x),
                    max_y: b.max_y.max(*y),
                },
            })
        })
    }

    pub fn center(&self) -> Position {
        [
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        ]
    }
}

impl Geometry {
    pub fn bbox(&self) -> Option<BoundingBox> {
        match self {
            Self::Point(p) => BoundingBox::from_positions(std::iter::once(p)),
            Self::Polygon(rings) => BoundingBox::from_positions(rings.iter().flatten()),
            Self::MultiPolygon(polygons) => {
                BoundingBox::from_positions(polygons.iter().flatten().flatten())
            }
        }
    }

    /// Point used to place a marker for the geometry on a map
    pub fn representative_point(&self) -> Option<Geometry> {
        match self {
            Self::Point(_) => Some(self.clone()),
            _ => self.bbox().map(|b| Self::Point(b.center())),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.bbox().is_none()
    }
}

/// Geometry derived from a referenced file.
///
/// Always replaced as a unit when a file descriptor is merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedGeometry {
    pub outline: Geometry,
    pub representative_point: Geometry,
}

impl DerivedGeometry {
    /// `None` when the outline has no coordinates.
    pub fn from_outline(outline: Geometry) -> Option<Self> {
        let representative_point = outline.representative_point()?;
        Some(Self {
            outline,
            representative_point,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square() -> Geometry {
        Geometry::Polygon(vec![vec![
            [34.0, 31.0],
            [36.0, 31.0],
            [36.0, 33.0],
            [34.0, 33.0],
            [34.0, 31.0],
        ]])
    }

    #[test]
    fn test_polygon_representative_point_is_bbox_center() {
        assert_eq!(square().representative_point(), Some(Geometry::Point([35.0, 32.0])));
    }

    #[test]
    fn test_multipolygon_bbox_spans_all_parts() {
        let multi = Geometry::MultiPolygon(vec![
            vec![vec![[0.0, 0.0], [1.0, 1.0]]],
            vec![vec![[10.0, -5.0], [11.0, 2.0]]],
        ]);
        let bbox = multi.bbox().unwrap();
        assert_eq!((bbox.min_x, bbox.min_y, bbox.max_x, bbox.max_y), (0.0, -5.0, 11.0, 2.0));
    }

    #[test]
    fn test_empty_outline_has_no_derived_geometry() {
        assert!(Geometry::Polygon(vec![]).is_empty());
        assert!(DerivedGeometry::from_outline(Geometry::Polygon(vec![vec![]])).is_none());
    }

    #[test]
    fn test_geojson_shape() {
        let parsed: Geometry =
            serde_json::from_str(r#"{"type":"Point","coordinates":[1.5,2.5]}"#).unwrap();
        assert_eq!(parsed, Geometry::Point([1.5, 2.5]));
    }
}
