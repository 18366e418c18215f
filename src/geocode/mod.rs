//! Geokodowanie miast: cache, offline spis, zewnętrzne zapytanie, fallback.

pub mod cache;
pub mod gate;
pub mod nominatim;
pub mod pipeline;

use async_trait::async_trait;
use thiserror::Error;

use crate::bounds::{Bounds, LatLng};

pub use cache::{CacheStore, FileStore, GeocodeCache, MemoryStore, PendingWrite, CACHE_NAMESPACE};
pub use gate::QueryGate;
pub use nominatim::NominatimGeocoder;
pub use pipeline::{GeocodePipeline, QueryText, Resolved, ResolutionSource};

/// Błędy zewnętrznego geokodera. Pipeline traktuje każdy jak "brak wyniku".
#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("geocoder returned HTTP {0}")]
    Status(u16),
    #[error("failed to parse geocoder response: {0}")]
    Parse(String),
}

/// Jedno zapytanie: tekst + prostokąt, do którego wynik ma należeć.
#[derive(Clone, Debug, PartialEq)]
pub struct GeocodeQuery {
    pub text: String,
    pub viewbox: Bounds,
}

/// Zewnętrzna usługa zamieniająca tekst na współrzędne (najlepsze trafienie).
#[async_trait]
pub trait Geocoder: Send + Sync {
    async fn search(&self, query: &GeocodeQuery) -> Result<Option<LatLng>, GeocodeError>;
}
