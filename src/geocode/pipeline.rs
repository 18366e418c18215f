use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

use super::{GeocodeCache, GeocodeQuery, Geocoder, QueryGate};
use crate::{
    bounds::{clamp, LatLng},
    data::Place,
    gazetteer::GazetteerIndex,
    normalize::normalize_key,
    region::RegionTarget,
};

/// Skąd pochodzi współrzędna.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionSource {
    Explicit,
    Cache,
    Gazetteer,
    Online,
    Fallback,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Resolved {
    pub coordinate: LatLng,
    pub source: ResolutionSource,
}

/// Składanie tekstu zapytania: "miasto, region megye, kraj".
#[derive(Clone, Debug)]
pub struct QueryText {
    pub region_suffix: String,
    pub country_name: String,
}

impl Default for QueryText {
    fn default() -> Self {
        Self { region_suffix: "megye".to_string(), country_name: "Magyarország".to_string() }
    }
}

impl QueryText {
    pub fn compose(&self, place: &str, region_display: &str) -> String {
        let region = region_display.trim();
        let suffix = self.region_suffix.trim();
        let region = if suffix.is_empty()
            || region.is_empty()
            || region.to_lowercase().ends_with(&suffix.to_lowercase())
        {
            region.to_string()
        } else {
            format!("{region} {suffix}")
        };
        [place.trim(), region.as_str(), self.country_name.trim()]
            .into_iter()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Zamiana nazwy miasta na punkt wewnątrz jego megye. Zawsze coś zwraca.
pub struct GeocodePipeline {
    cache: Mutex<GeocodeCache>,
    gazetteer: GazetteerIndex,
    geocoder: Option<Arc<dyn Geocoder>>,
    gate: QueryGate,
    query_text: QueryText,
}

impl GeocodePipeline {
    /// Pipeline bez zapytań online (cache + spis + fallback).
    pub fn new(cache: GeocodeCache, gazetteer: GazetteerIndex) -> Self {
        Self {
            cache: Mutex::new(cache),
            gazetteer,
            geocoder: None,
            gate: QueryGate::new(Duration::from_millis(900)),
            query_text: QueryText::default(),
        }
    }

    pub fn with_geocoder(mut self, geocoder: Arc<dyn Geocoder>, gate: QueryGate) -> Self {
        self.geocoder = Some(geocoder);
        self.gate = gate;
        self
    }

    pub fn with_query_text(mut self, query_text: QueryText) -> Self {
        self.query_text = query_text;
        self
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    /// Kolejność: jawne współrzędne, cache, spis offline, zapytanie online, środek megye.
    pub async fn resolve(&self, place: &Place, region: &RegionTarget<'_>) -> Resolved {
        let place_key = normalize_key(&place.name);

        let early = self
            .from_explicit(place, region)
            .or_else(|| self.from_cache(region, &place_key));
        if let Some(hit) = early {
            return hit;
        }

        if let Some(at) = self.gazetteer.lookup(&place_key).await {
            let at = clamp(at, &region.bounds);
            return self.remember(region, &place_key, at, ResolutionSource::Gazetteer).await;
        }

        if let Some(at) = self.from_online(place, region).await {
            return self.remember(region, &place_key, at, ResolutionSource::Online).await;
        }

        debug!("Falling back to the centre of {} for {:?}", region.key, place.name);
        let center = region.bounds.center();
        self.remember(region, &place_key, center, ResolutionSource::Fallback).await
    }

    fn from_explicit(&self, place: &Place, region: &RegionTarget<'_>) -> Option<Resolved> {
        // nawet poprawne współrzędne z listy bywają tuż za granicą megye
        let at = place.explicit?;
        Some(Resolved { coordinate: clamp(at, &region.bounds), source: ResolutionSource::Explicit })
    }

    fn from_cache(&self, region: &RegionTarget<'_>, place_key: &str) -> Option<Resolved> {
        let hit = self.cache.lock().ok()?.get(region.key, place_key)?;
        if !region.bounds.contains(hit) {
            warn!("Ignoring cached point outside {}: {}|{}", region.key, region.key, place_key);
            return None;
        }
        Some(Resolved { coordinate: hit, source: ResolutionSource::Cache })
    }

    async fn from_online(&self, place: &Place, region: &RegionTarget<'_>) -> Option<LatLng> {
        let geocoder = self.geocoder.as_ref()?;
        let query = GeocodeQuery {
            text: self.query_text.compose(&place.name, region.display_name),
            viewbox: region.bounds,
        };
        match self.gate.run(geocoder.search(&query)).await {
            Ok(Some(at)) => Some(clamp(at, &region.bounds)),
            Ok(None) => {
                debug!("No online result for {:?}", query.text);
                None
            }
            Err(e) => {
                warn!("Online geocoding failed for {:?}: {}", query.text, e);
                None
            }
        }
    }

    /// Wpis trafia do pamięci pod blokadą; plik zapisuje wątek blokujący.
    async fn remember(
        &self,
        region: &RegionTarget<'_>,
        place_key: &str,
        at: LatLng,
        source: ResolutionSource,
    ) -> Resolved {
        let write = self
            .cache
            .lock()
            .ok()
            .and_then(|mut cache| cache.stage(region.key, place_key, at.lat, at.lng).1);
        if let Some(write) = write {
            if let Err(e) = tokio::task::spawn_blocking(move || write.write()).await {
                debug!("Geocode cache write task failed: {}", e);
            }
        }
        Resolved { coordinate: at, source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bounds::{Bounds, CLAMP_MARGIN};
    use crate::geocode::testing::FakeGeocoder;
    use crate::geocode::{GeocodeError, MemoryStore, CACHE_NAMESPACE};

    const FEJER: Bounds = Bounds { south: 46.7, west: 17.95, north: 47.45, east: 19.15 };

    fn target() -> RegionTarget<'static> {
        RegionTarget { key: "fejer", display_name: "Fejér", bounds: FEJER }
    }

    fn place(name: &str, explicit: Option<LatLng>) -> Place {
        Place { name: name.to_string(), region_key: "fejer".to_string(), completed: true, explicit }
    }

    fn pipeline_with(
        store: MemoryStore,
        gazetteer: GazetteerIndex,
        geocoder: Arc<FakeGeocoder>,
    ) -> GeocodePipeline {
        GeocodePipeline::new(GeocodeCache::open(Box::new(store)), gazetteer)
            .with_geocoder(geocoder, QueryGate::new(Duration::from_millis(900)))
    }

    fn inside_with_margin(p: LatLng) -> bool {
        FEJER.expand(CLAMP_MARGIN).contains(p)
    }

    #[tokio::test]
    async fn explicit_point_is_clamped_and_not_cached() {
        let store = MemoryStore::new();
        let geo = Arc::new(FakeGeocoder::failing());
        let p = pipeline_with(store.clone(), GazetteerIndex::disabled(), geo.clone());

        let r = p.resolve(&place("Iszkaszentgyörgy", Some(LatLng::new(47.5, 18.29))), &target()).await;
        assert_eq!(r.source, ResolutionSource::Explicit);
        assert_eq!(r.coordinate, LatLng::new(FEJER.north - CLAMP_MARGIN, 18.29));
        assert_eq!(p.cached_entries(), 0);
        assert_eq!(geo.call_count(), 0);
    }

    #[tokio::test]
    async fn explicit_point_wins_over_cache() {
        let store = MemoryStore::with_payload(CACHE_NAMESPACE, r#"{"fejer|szekesfehervar":{"lat":47.0,"lng":18.5}}"#);
        let p = pipeline_with(store, GazetteerIndex::disabled(), Arc::new(FakeGeocoder::failing()));
        let r = p.resolve(&place("Székesfehérvár", Some(LatLng::new(47.19, 18.41))), &target()).await;
        assert_eq!(r.source, ResolutionSource::Explicit);
        assert_eq!(r.coordinate, LatLng::new(47.19, 18.41));
    }

    #[tokio::test]
    async fn cache_beats_gazetteer_without_online_query() {
        let store = MemoryStore::with_payload(CACHE_NAMESPACE, r#"{"fejer|mor":{"lat":47.37,"lng":18.2}}"#);
        let gazetteer = GazetteerIndex::from_entries([("Mór", LatLng::new(47.38, 18.21))]);
        let geo = Arc::new(FakeGeocoder::new(|_| Ok(Some(LatLng::new(47.0, 18.0)))));
        let p = pipeline_with(store, gazetteer, geo.clone());

        let r = p.resolve(&place("Mór", None), &target()).await;
        assert_eq!(r, Resolved { coordinate: LatLng::new(47.37, 18.2), source: ResolutionSource::Cache });
        assert_eq!(geo.call_count(), 0);
    }

    #[tokio::test]
    async fn gazetteer_hit_is_clamped_and_cached() {
        let store = MemoryStore::new();
        let gazetteer = GazetteerIndex::from_entries([("Érd", LatLng::new(47.38, 19.3))]);
        let geo = Arc::new(FakeGeocoder::failing());
        let p = pipeline_with(store, gazetteer, geo.clone());

        let r = p.resolve(&place("Érd", None), &target()).await;
        assert_eq!(r.source, ResolutionSource::Gazetteer);
        assert_eq!(r.coordinate, LatLng::new(47.38, FEJER.east - CLAMP_MARGIN));
        assert_eq!(geo.call_count(), 0);

        let again = p.resolve(&place("Érd", None), &target()).await;
        assert_eq!(again.source, ResolutionSource::Cache);
        assert_eq!(again.coordinate, LatLng::new(47.38, 19.148));
    }

    #[tokio::test(start_paused = true)]
    async fn online_result_uses_region_viewbox_and_query_text() {
        let geo = Arc::new(FakeGeocoder::new(|_| Ok(Some(LatLng::new(47.106, 18.412)))));
        let p = pipeline_with(MemoryStore::new(), GazetteerIndex::disabled(), geo.clone());

        let r = p.resolve(&place("Seregélyes", None), &target()).await;
        assert_eq!(r.source, ResolutionSource::Online);
        assert_eq!(r.coordinate, LatLng::new(47.106, 18.412));

        let queries = geo.queries.lock().unwrap();
        assert_eq!(queries.len(), 1);
        assert_eq!(queries[0].text, "Seregélyes, Fejér megye, Magyarország");
        assert_eq!(queries[0].viewbox, FEJER);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_lookup_falls_back_to_exact_center() {
        let geo = Arc::new(FakeGeocoder::new(|_| Err(GeocodeError::Parse("boom".into()))));
        let p = pipeline_with(MemoryStore::new(), GazetteerIndex::disabled(), geo.clone());

        let r = p.resolve(&place("Nincsilyenfalu", None), &target()).await;
        assert_eq!(r.source, ResolutionSource::Fallback);
        assert_eq!(r.coordinate, FEJER.center());
        assert_eq!(geo.call_count(), 1);
        assert_eq!(p.cached_entries(), 1);

        let again = p.resolve(&place("Nincsilyenfalu", None), &target()).await;
        assert_eq!(again.source, ResolutionSource::Cache);
        assert_eq!(geo.call_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn empty_online_result_falls_back_too() {
        let geo = Arc::new(FakeGeocoder::new(|_| Ok(None)));
        let p = pipeline_with(MemoryStore::new(), GazetteerIndex::disabled(), geo);
        let r = p.resolve(&place("Sehol", None), &target()).await;
        assert_eq!(r.coordinate, FEJER.center());
    }

    #[tokio::test(start_paused = true)]
    async fn repeated_resolution_is_bit_identical() {
        let geo = Arc::new(FakeGeocoder::new(|_| Ok(Some(LatLng::new(47.123456789, 18.987654321)))));
        let p = pipeline_with(MemoryStore::new(), GazetteerIndex::disabled(), geo);
        p.resolve(&place("Bicske", None), &target()).await;

        let a = p.resolve(&place("Bicske", None), &target()).await;
        let b = p.resolve(&place("bicske", None), &target()).await;
        assert_eq!(a.coordinate.lat.to_bits(), b.coordinate.lat.to_bits());
        assert_eq!(a.coordinate.lng.to_bits(), b.coordinate.lng.to_bits());
        assert_eq!(a.coordinate, LatLng::new(47.12346, 18.98765));
    }

    #[tokio::test(start_paused = true)]
    async fn every_stage_stays_inside_region() {
        let far = LatLng::new(10.0, 80.0);
        let store = MemoryStore::with_payload(CACHE_NAMESPACE, r#"{"fejer|cached":{"lat":47.2,"lng":18.6}}"#);
        let gazetteer = GazetteerIndex::from_entries([("Offline", far)]);
        let geo = Arc::new(FakeGeocoder::new(|q| {
            if q.text.starts_with("Online") { Ok(Some(LatLng::new(-30.0, -60.0))) } else { Ok(None) }
        }));
        let p = pipeline_with(store, gazetteer, geo);

        let cases = [
            (place("Explicit", Some(far)), ResolutionSource::Explicit),
            (place("Cached", None), ResolutionSource::Cache),
            (place("Offline", None), ResolutionSource::Gazetteer),
            (place("Online", None), ResolutionSource::Online),
            (place("Fallback", None), ResolutionSource::Fallback),
        ];
        for (pl, expected) in cases {
            let r = p.resolve(&pl, &target()).await;
            assert_eq!(r.source, expected, "{}", pl.name);
            assert!(inside_with_margin(r.coordinate), "{} -> {:?}", pl.name, r.coordinate);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn cached_point_outside_region_is_ignored() {
        let store = MemoryStore::with_payload(CACHE_NAMESPACE, r#"{"fejer|dunaujvaros":{"lat":40.0,"lng":10.0}}"#);
        let gazetteer = GazetteerIndex::from_entries([("Dunaújváros", LatLng::new(46.96, 18.93))]);
        let p = pipeline_with(store, gazetteer, Arc::new(FakeGeocoder::failing()));
        let r = p.resolve(&place("Dunaújváros", None), &target()).await;
        assert_eq!(r.source, ResolutionSource::Gazetteer);
    }

    #[tokio::test]
    async fn offline_pipeline_never_queries() {
        let p = GeocodePipeline::new(GeocodeCache::open(Box::new(MemoryStore::new())), GazetteerIndex::disabled());
        let r = p.resolve(&place("Gárdony", None), &target()).await;
        assert_eq!(r.source, ResolutionSource::Fallback);
    }

    #[test]
    fn query_text_does_not_repeat_suffix() {
        let q = QueryText::default();
        assert_eq!(q.compose("Vác", "Pest megye"), "Vác, Pest megye, Magyarország");
        assert_eq!(q.compose("Vác", ""), "Vác, Magyarország");
        let plain = QueryText { region_suffix: String::new(), country_name: String::new() };
        assert_eq!(plain.compose(" Vác ", "Pest"), "Vác, Pest");
    }
}
