use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::{
    bounds::LatLng,
    data::{parse_json, strip_bom, LoadError},
    normalize::{first_non_empty, first_number, normalize_key},
};

const NAME_FIELDS: &[&str] = &["name", "telepules", "varos", "nev"];
const LAT_FIELDS: &[&str] = &["lat", "latitude"];
const LNG_FIELDS: &[&str] = &["lng", "lon", "longitude"];

/// Offline spis miejscowości: klucz nazwy -> współrzędne.
/// Plik czytany najwyżej raz; błąd = pusty indeks.
pub struct GazetteerIndex {
    candidates: Vec<PathBuf>,
    entries: OnceCell<HashMap<String, LatLng>>,
}

impl GazetteerIndex {
    /// Indeks ładowany leniwie z pierwszej czytelnej ścieżki.
    pub fn from_paths(candidates: Vec<PathBuf>) -> Self {
        Self { candidates, entries: OnceCell::new() }
    }

    /// Indeks od razu załadowany podanymi wpisami (nazwy są normalizowane).
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, LatLng)>,
        S: AsRef<str>,
    {
        let map = entries
            .into_iter()
            .map(|(name, at)| (normalize_key(name.as_ref()), at))
            .filter(|(key, _)| !key.is_empty())
            .collect();
        Self { candidates: Vec::new(), entries: OnceCell::new_with(Some(map)) }
    }

    /// Bez pliku: każde wyszukiwanie daje `None`.
    pub fn disabled() -> Self {
        Self::from_paths(Vec::new())
    }

    pub async fn lookup(&self, place_key: &str) -> Option<LatLng> {
        self.entries().await.get(place_key).copied()
    }

    /// Liczba wpisów (ładuje indeks, jeśli trzeba).
    pub async fn place_count(&self) -> usize {
        self.entries().await.len()
    }

    async fn entries(&self) -> &HashMap<String, LatLng> {
        self.entries
            .get_or_init(|| async {
                match self.load().await {
                    Ok(map) => {
                        info!("Loaded gazetteer with {} places", map.len());
                        map
                    }
                    Err(e) => {
                        warn!("Gazetteer unavailable, continuing without it: {}", e);
                        HashMap::new()
                    }
                }
            })
            .await
    }

    async fn load(&self) -> Result<HashMap<String, LatLng>, LoadError> {
        let mut last = None;
        for path in &self.candidates {
            let attempt = match tokio::fs::read_to_string(path).await {
                Ok(txt) => parse_json(path, strip_bom(&txt)),
                Err(source) => Err(LoadError::Io { path: path.clone(), source }),
            };
            match attempt {
                Ok(raw) => return Ok(parse_records(&raw)),
                Err(e) => {
                    debug!("Skipping gazetteer candidate {}: {}", path.display(), e);
                    last = Some(e);
                }
            }
        }
        Err(last.unwrap_or_else(|| LoadError::NoCandidate("gazetteer".to_string())))
    }
}

/// Rekordy `{name, lat, lng}`; pola aliasowane, współrzędne tylko jako liczby.
fn parse_records(raw: &Value) -> HashMap<String, LatLng> {
    let mut index = HashMap::new();
    for record in raw.as_array().into_iter().flatten().filter_map(Value::as_object) {
        let Some(name) = first_non_empty(record, NAME_FIELDS) else {
            continue;
        };
        let (Some(lat), Some(lng)) = (first_number(record, LAT_FIELDS), first_number(record, LNG_FIELDS)) else {
            continue;
        };
        let key = normalize_key(&name);
        if !key.is_empty() {
            index.insert(key, LatLng::new(lat, lng));
        }
    }
    index
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn records_use_aliased_fields_and_skip_strings() {
        let raw = json!([
            { "name": "Iszkaszentgyörgy", "lat": 47.24, "lng": 18.29 },
            { "telepules": "Érd", "latitude": 47.38, "lon": 18.91 },
            { "varos": "Pécs", "lat": "46.07", "lng": 18.23 },
            { "lat": 1.0, "lng": 2.0 }
        ]);
        let index = parse_records(&raw);
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("iszkaszentgyorgy"), Some(&LatLng::new(47.24, 18.29)));
        assert_eq!(index.get("erd"), Some(&LatLng::new(47.38, 18.91)));
    }

    #[tokio::test]
    async fn missing_file_degrades_to_empty_index() {
        let index = GazetteerIndex::from_paths(vec![PathBuf::from("/nonexistent/hu-telepulesek.json")]);
        assert_eq!(index.lookup("erd").await, None);
        assert_eq!(index.place_count().await, 0);
    }

    #[tokio::test]
    async fn file_is_read_once_and_memoized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hu-telepulesek.json");
        std::fs::write(&path, r#"[{"nev":"Győr","lat":47.68,"lng":17.63}]"#).unwrap();
        let index = GazetteerIndex::from_paths(vec![path.clone()]);
        assert_eq!(index.lookup("gyor").await, Some(LatLng::new(47.68, 17.63)));

        std::fs::remove_file(&path).unwrap();
        assert_eq!(index.lookup("gyor").await, Some(LatLng::new(47.68, 17.63)));
    }

    #[tokio::test]
    async fn unparsable_candidate_falls_through_to_next() {
        let primary = tempfile::tempdir().unwrap();
        let fallback = tempfile::tempdir().unwrap();
        let broken = primary.path().join("hu-telepulesek.json");
        let good = fallback.path().join("hu-telepulesek.json");
        std::fs::write(&broken, "not json").unwrap();
        std::fs::write(&good, r#"[{"name":"Győr","lat":47.68,"lng":17.63}]"#).unwrap();

        let index = GazetteerIndex::from_paths(vec![broken, good]);
        assert_eq!(index.lookup("gyor").await, Some(LatLng::new(47.68, 17.63)));
    }

    #[tokio::test]
    async fn inline_entries_are_normalized() {
        let index = GazetteerIndex::from_entries([("Sopron ", LatLng::new(47.68, 16.58))]);
        assert_eq!(index.lookup("sopron").await, Some(LatLng::new(47.68, 16.58)));
    }
}
