use geo::{BoundingRect, Geometry, MultiPolygon};
use geojson::GeoJson;
use std::collections::HashSet;
use tracing::{debug, warn};

use crate::{
    bounds::Bounds,
    data::LoadError,
    normalize::{first_non_empty, normalize_key, REGION_NAME_FIELDS},
};

/// Jeden megye: wielokąt, prostokąt i klucz.
#[derive(Clone, Debug)]
pub struct Region {
    pub key: String,
    pub display_name: String,
    pub polygon: MultiPolygon<f64>,
    pub bounds: Bounds,
    pub highlighted: bool,
}

/// To, czego potrzebuje geokodowanie z regionu.
#[derive(Clone, Copy, Debug)]
pub struct RegionTarget<'a> {
    pub key: &'a str,
    pub display_name: &'a str,
    pub bounds: Bounds,
}

impl Region {
    pub fn target(&self) -> RegionTarget<'_> {
        RegionTarget { key: &self.key, display_name: &self.display_name, bounds: self.bounds }
    }
}

/// Wszystkie megye w kolejności z pliku.
#[derive(Clone, Debug, Default)]
pub struct RegionSet {
    items: Vec<Region>,
}

impl RegionSet {
    /// Buduje regiony z FeatureCollection; podświetla klucze z `highlighted`.
    pub fn from_geojson(raw: GeoJson, highlighted: &HashSet<String>) -> Result<Self, LoadError> {
        let GeoJson::FeatureCollection(fc) = raw else {
            return Err(LoadError::NotFeatureCollection("<regions>".into()));
        };

        let mut items: Vec<Region> = Vec::new();
        for feature in fc.features {
            let display_name = feature
                .properties
                .as_ref()
                .and_then(|p| first_non_empty(p, REGION_NAME_FIELDS))
                .unwrap_or_default();
            let key = normalize_key(&display_name);
            if key.is_empty() {
                warn!("Skipping region feature without a usable name");
                continue;
            }

            let Some(gj) = feature.geometry else {
                debug!("Region {} has no geometry", display_name);
                continue;
            };
            let geom: Geometry<f64> = gj.value.try_into().map_err(|e: geojson::Error| {
                LoadError::Geometry { name: display_name.clone(), reason: e.to_string() }
            })?;
            let polygon: MultiPolygon<f64> = match geom {
                Geometry::Polygon(p) => p.into(),
                Geometry::MultiPolygon(m) => m,
                other => {
                    debug!("Region {} has non-areal geometry {:?}", display_name, other);
                    continue;
                }
            };
            let Some(rect) = polygon.bounding_rect() else {
                continue;
            };

            if items.iter().any(|r| r.key == key) {
                warn!("Duplicate region key {:?}, keeping the first feature", key);
                continue;
            }
            items.push(Region {
                highlighted: highlighted.contains(&key),
                bounds: Bounds::from_rect(rect),
                key,
                display_name,
                polygon,
            });
        }
        Ok(Self { items })
    }

    pub fn from_regions(items: Vec<Region>) -> Self {
        Self { items }
    }

    pub fn get(&self, key: &str) -> Option<&Region> {
        self.items.iter().find(|r| r.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Region> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Prostokąt obejmujący wszystkie regiony.
    pub fn union_bounds(&self) -> Option<Bounds> {
        Bounds::union_all(self.items.iter().map(|r| r.bounds))
    }

    /// Prostokąt obejmujący tylko podświetlone regiony.
    pub fn highlighted_bounds(&self) -> Option<Bounds> {
        Bounds::union_all(self.items.iter().filter(|r| r.highlighted).map(|r| r.bounds))
    }
}
