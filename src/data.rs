use geojson::GeoJson;
use serde_json::{Map, Value};
use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    bounds::LatLng,
    normalize::{first_non_empty, first_number, normalize_key, ENTRY_NAME_FIELDS, PLACE_NAME_FIELDS},
};

pub const REGIONS_FILE: &str = "hungary-counties.json";
pub const LOCATIONS_FILE: &str = "locations.json";
pub const GAZETTEER_FILE: &str = "hu-telepulesek.json";

/// Błędy ładowania danych wejściowych.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid GeoJSON in {path}: {source}")]
    GeoJson {
        path: PathBuf,
        #[source]
        source: Box<geojson::Error>,
    },
    #[error("{0} is not a FeatureCollection")]
    NotFeatureCollection(PathBuf),
    #[error("unsupported geometry in feature {name:?}: {reason}")]
    Geometry { name: String, reason: String },
    #[error("no data directory candidates for {0}")]
    NoCandidate(String),
}

/// Miasto z listy wykonanych prac.
#[derive(Clone, Debug, PartialEq)]
pub struct Place {
    pub name: String,
    pub region_key: String,
    pub completed: bool,
    pub explicit: Option<LatLng>,
}

/// Wpis megye z listy miejscowości (już po normalizacji klucza).
#[derive(Clone, Debug, PartialEq)]
pub struct RegionEntry {
    pub key: String,
    pub display_name: String,
    pub places: Vec<Place>,
    /// Liczba ukończonych prac (miasta z `completed` lub flaga całego wiersza).
    pub completed_jobs: usize,
}

/// Katalogi z danymi, przeszukiwane po kolei.
#[derive(Clone, Debug)]
pub struct DataDirs {
    candidates: Vec<PathBuf>,
}

impl DataDirs {
    pub fn new<P: AsRef<Path>>(primary: P) -> Self {
        let mut candidates = vec![primary.as_ref().to_path_buf()];
        let fallback = PathBuf::from("data");
        if !candidates.contains(&fallback) {
            candidates.push(fallback);
        }
        Self { candidates }
    }

    pub fn paths(&self, file: &str) -> Vec<PathBuf> {
        self.candidates.iter().map(|dir| dir.join(file)).collect()
    }

    /// Pierwszy kandydat, który da się przeczytać i sparsować; inaczej ostatni błąd.
    pub fn load_first_ok<T>(
        &self,
        file: &str,
        parse: impl Fn(&Path, &str) -> Result<T, LoadError>,
    ) -> Result<T, LoadError> {
        let mut last = None;
        for path in self.paths(file) {
            let attempt = fs::read_to_string(&path)
                .map_err(|source| LoadError::Io { path: path.clone(), source })
                .and_then(|txt| parse(&path, strip_bom(&txt)));
            match attempt {
                Ok(value) => {
                    debug!("Loaded {}", path.display());
                    return Ok(value);
                }
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| LoadError::NoCandidate(file.to_string())))
    }

    pub fn load_json(&self, file: &str) -> Result<Value, LoadError> {
        self.load_first_ok(file, parse_json)
    }

    pub fn load_geojson(&self, file: &str) -> Result<GeoJson, LoadError> {
        self.load_first_ok(file, |path, txt| {
            GeoJson::from_str(txt).map_err(|source| LoadError::GeoJson {
                path: path.to_path_buf(),
                source: Box::new(source),
            })
        })
    }
}

pub fn strip_bom(txt: &str) -> &str {
    txt.strip_prefix('\u{feff}').unwrap_or(txt)
}

pub fn parse_json(path: &Path, txt: &str) -> Result<Value, LoadError> {
    serde_json::from_str(txt).map_err(|source| LoadError::Json { path: path.to_path_buf(), source })
}

/// Wartość "prawdziwa": true, "true"/"1"/"yes"/"igen", liczba różna od zera.
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|v| v != 0.0),
        Value::String(s) => {
            matches!(s.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "igen")
        }
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// Lista miejscowości: `{ "counties": [...] }` albo gołą tablica wierszy.
pub fn parse_locations(raw: &Value) -> Vec<RegionEntry> {
    let rows = raw
        .get("counties")
        .and_then(Value::as_array)
        .or_else(|| raw.as_array());
    let Some(rows) = rows else {
        warn!("Location list has neither a `counties` array nor a top-level array");
        return Vec::new();
    };

    let mut entries: Vec<RegionEntry> = Vec::new();
    for row in rows.iter().filter_map(Value::as_object) {
        let Some(display_name) = first_non_empty(row, ENTRY_NAME_FIELDS) else {
            debug!("Skipping location row without a county name");
            continue;
        };
        let key = normalize_key(&display_name);
        if key.is_empty() {
            continue;
        }
        let row_completed = row.get("completed").map(is_truthy);
        let cities = row.get("cities").and_then(Value::as_array);

        let places: Vec<Place> = cities
            .into_iter()
            .flatten()
            .filter_map(|item| parse_place(item, &key, row_completed))
            .collect();
        let completed_jobs = match cities {
            Some(list) if !list.is_empty() => places.iter().filter(|p| p.completed).count(),
            _ => usize::from(row_completed == Some(true)),
        };

        // ten sam megye może wystąpić w kilku wierszach
        match entries.iter_mut().find(|e| e.key == key) {
            Some(existing) => {
                existing.places.extend(places);
                existing.completed_jobs += completed_jobs;
            }
            None => entries.push(RegionEntry { key, display_name, places, completed_jobs }),
        }
    }
    entries
}

fn parse_place(item: &Value, region_key: &str, row_completed: Option<bool>) -> Option<Place> {
    let empty = Map::new();
    let (name, props) = match item {
        Value::String(s) => (s.trim().to_string(), &empty),
        Value::Object(obj) => (first_non_empty(obj, PLACE_NAME_FIELDS)?, obj),
        _ => return None,
    };
    if normalize_key(&name).is_empty() {
        debug!("Skipping place with no usable name in {}", region_key);
        return None;
    }
    let explicit = match (first_number(props, &["lat"]), first_number(props, &["lng", "lon"])) {
        (Some(lat), Some(lng)) => LatLng::checked(lat, lng),
        _ => None,
    };
    let completed = props
        .get("completed")
        .map(is_truthy)
        .or(row_completed)
        .unwrap_or(false);
    Some(Place { name, region_key: region_key.to_string(), completed, explicit })
}
