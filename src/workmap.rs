//! Korzeń aplikacji: dane, pipeline geokodowania i maszyna widoku w jednym miejscu.

use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::{
    camera::Camera,
    config::Settings,
    data::{parse_locations, DataDirs, LoadError, Place, RegionEntry, GAZETTEER_FILE, LOCATIONS_FILE, REGIONS_FILE},
    gazetteer::GazetteerIndex,
    geocode::{FileStore, GeocodeCache, GeocodePipeline, NominatimGeocoder, QueryGate},
    projection::Viewport,
    region::RegionSet,
    view::{Marker, Ticket, TransitionOutcome, ViewConfig, ViewError, ViewSnapshot, ViewState, ViewStateMachine},
};

/// Wiersz listy megye.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RegionSummary {
    pub key: String,
    pub display_name: String,
    pub highlighted: bool,
    pub completed_count: usize,
}

/// Wynik trybu `--dump` dla jednego megye.
#[derive(Clone, Debug, Serialize)]
pub struct RegionReport {
    #[serde(flatten)]
    pub summary: RegionSummary,
    pub markers: Vec<Marker>,
}

pub struct WorkMap {
    regions: Arc<RegionSet>,
    places: HashMap<String, Vec<Place>>,
    summaries: Vec<RegionSummary>,
    pipeline: Arc<GeocodePipeline>,
    view: ViewStateMachine,
}

impl WorkMap {
    /// Ładuje wielokąty i listę miejscowości, buduje cache, spis i geokoder.
    pub fn load(settings: &Settings, camera: Box<dyn Camera>) -> Result<Self, LoadError> {
        let dirs = DataDirs::new(&settings.data_dir);
        let entries = parse_locations(&dirs.load_json(LOCATIONS_FILE)?);
        let highlighted: HashSet<String> = entries.iter().map(|e| e.key.clone()).collect();
        let regions = RegionSet::from_geojson(dirs.load_geojson(REGIONS_FILE)?, &highlighted)?;
        info!("Loaded {} regions and {} location rows", regions.len(), entries.len());

        let geocoder = settings.geocoder();
        let cache = GeocodeCache::open(Box::new(FileStore::new(settings.cache_dir())));
        let gazetteer = GazetteerIndex::from_paths(dirs.paths(GAZETTEER_FILE));
        let mut pipeline = GeocodePipeline::new(cache, gazetteer).with_query_text(geocoder.query_text.clone());
        if geocoder.online {
            match NominatimGeocoder::new(&geocoder) {
                Ok(client) => {
                    pipeline = pipeline.with_geocoder(Arc::new(client), QueryGate::new(geocoder.min_delay));
                }
                Err(e) => warn!("Online geocoding disabled, client setup failed: {}", e),
            }
        }

        Ok(Self::from_parts(regions, entries, pipeline, camera, settings.view()))
    }

    /// Składa korzeń z gotowych części. Wpisy bez pasującego megye są pomijane.
    pub fn from_parts(
        regions: RegionSet,
        entries: Vec<RegionEntry>,
        pipeline: GeocodePipeline,
        camera: Box<dyn Camera>,
        view: ViewConfig,
    ) -> Self {
        let mut places: HashMap<String, Vec<Place>> = HashMap::new();
        let mut completed: HashMap<String, usize> = HashMap::new();
        for entry in entries {
            if regions.get(&entry.key).is_none() {
                warn!("No region matches location entry {:?}, dropping {} places", entry.display_name, entry.places.len());
                continue;
            }
            *completed.entry(entry.key.clone()).or_default() += entry.completed_jobs;
            places.entry(entry.key).or_default().extend(entry.places);
        }

        let summaries = regions
            .iter()
            .map(|r| RegionSummary {
                key: r.key.clone(),
                display_name: r.display_name.clone(),
                highlighted: r.highlighted,
                completed_count: completed.get(&r.key).copied().unwrap_or(0),
            })
            .collect();

        let regions = Arc::new(regions);
        Self {
            view: ViewStateMachine::new(regions.clone(), camera, view),
            regions,
            places,
            summaries,
            pipeline: Arc::new(pipeline),
        }
    }

    pub fn regions(&self) -> &RegionSet {
        &self.regions
    }

    pub fn summaries(&self) -> &[RegionSummary] {
        &self.summaries
    }

    pub fn places(&self, key: &str) -> &[Place] {
        self.places.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn state(&self) -> ViewState {
        self.view.state()
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        self.view.snapshot()
    }

    pub fn tick(&self, now: Instant) {
        self.view.tick(now);
    }

    pub fn resize(&self, viewport: Viewport) {
        self.view.resize(viewport);
    }

    pub async fn initialize(&self) -> Result<TransitionOutcome, ViewError> {
        self.view.initialize().await
    }

    pub async fn back(&self) -> Result<TransitionOutcome, ViewError> {
        self.view.back().await
    }

    /// Przybliża megye i równolegle rozmieszcza jego miasta.
    pub async fn show_region(&self, key: &str) -> Result<TransitionOutcome, ViewError> {
        let pending = self.view.begin_select(key)?;
        let ticket = pending.ticket();
        let (outcome, placed) = tokio::join!(self.view.complete(pending), self.place_markers(key, ticket));
        match placed {
            Some(n) => info!("Placed {} markers in {}", n, key),
            None => debug!("Marker placement for {} abandoned", key),
        }
        Ok(outcome)
    }

    /// Miasta po kolei, w kolejności z listy. `None`, gdy przejście zostało zastąpione.
    async fn place_markers(&self, key: &str, ticket: Ticket) -> Option<usize> {
        let region = self.regions.get(key)?;
        let target = region.target();
        let mut placed = 0;
        for place in self.places(key) {
            if !self.view.is_current(ticket) {
                return None;
            }
            let resolved = self.pipeline.resolve(place, &target).await;
            let marker = Marker { name: place.name.clone(), coordinate: resolved.coordinate, source: resolved.source };
            if !self.view.add_marker(ticket, marker) {
                return None;
            }
            placed += 1;
        }
        self.view.publish_count(ticket, placed).then_some(placed)
    }

    /// Geokoduje wszystkie miasta wszystkich megye, bez ruszania widoku.
    pub async fn resolve_all(&self) -> Vec<RegionReport> {
        let mut reports = Vec::with_capacity(self.summaries.len());
        for summary in &self.summaries {
            let Some(region) = self.regions.get(&summary.key) else {
                continue;
            };
            let target = region.target();
            let mut markers = Vec::new();
            for place in self.places(&summary.key) {
                let resolved = self.pipeline.resolve(place, &target).await;
                markers.push(Marker { name: place.name.clone(), coordinate: resolved.coordinate, source: resolved.source });
            }
            reports.push(RegionReport { summary: summary.clone(), markers });
        }
        reports
    }
}
