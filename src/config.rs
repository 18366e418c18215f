//! Konfiguracja z linii poleceń / zmiennych środowiskowych.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

use crate::geocode::QueryText;
use crate::view::ViewConfig;

pub const DEFAULT_ENDPOINT: &str = "https://nominatim.openstreetmap.org/search";

/// Jaki obszar pokazuje widok ogólny.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OverviewScope {
    /// Wszystkie megye.
    #[default]
    All,
    /// Tylko podświetlone megye (z marginesem na etykiety sąsiadów).
    Highlighted,
}

#[derive(Debug, Parser)]
#[command(name = "MegyeAtlas", version, about = "Interaktywna mapa megye -> miasta")]
pub struct Settings {
    /// Katalog z hungary-counties.json, locations.json i (opcjonalnie) hu-telepulesek.json
    #[arg(long, env = "MEGYE_ATLAS_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Katalog trwałego cache geokodowania (domyślnie katalog cache użytkownika)
    #[arg(long, env = "MEGYE_ATLAS_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Plik logów w trybie interaktywnym
    #[arg(long, env = "MEGYE_ATLAS_LOG_FILE", default_value = "megye-atlas.log")]
    pub log_file: PathBuf,

    /// Wyłącza zapytania do zewnętrznego geokodera
    #[arg(long, env = "MEGYE_ATLAS_OFFLINE")]
    pub offline: bool,

    #[arg(long, env = "MEGYE_ATLAS_ENDPOINT", default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Minimalna przerwa między zapytaniami online (ms)
    #[arg(long, env = "MEGYE_ATLAS_MIN_DELAY_MS", default_value_t = 900)]
    pub min_delay_ms: u64,

    /// Limit czasu pojedynczego zapytania (s)
    #[arg(long, env = "MEGYE_ATLAS_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    #[arg(long, env = "MEGYE_ATLAS_COUNTRY_CODES", default_value = "hu")]
    pub country_codes: String,

    #[arg(long, env = "MEGYE_ATLAS_LANGUAGE", default_value = "hu")]
    pub language: String,

    #[arg(long, value_enum, env = "MEGYE_ATLAS_OVERVIEW", default_value_t = OverviewScope::All)]
    pub overview: OverviewScope,

    /// Zamiast interfejsu: geokoduje wszystko i wypisuje JSON
    #[arg(long)]
    pub dump: bool,
}

impl Settings {
    pub fn geocoder(&self) -> GeocoderConfig {
        GeocoderConfig {
            online: !self.offline,
            endpoint: self.endpoint.clone(),
            country_codes: self.country_codes.clone(),
            language: self.language.clone(),
            min_delay: Duration::from_millis(self.min_delay_ms),
            timeout: Duration::from_secs(self.timeout_secs),
            ..GeocoderConfig::default()
        }
    }

    pub fn view(&self) -> ViewConfig {
        ViewConfig { overview_scope: self.overview, ..ViewConfig::default() }
    }

    /// Katalog cache: jawny albo `<cache użytkownika>/megye-atlas`.
    pub fn cache_dir(&self) -> PathBuf {
        self.cache_dir.clone().unwrap_or_else(|| {
            dirs::cache_dir()
                .unwrap_or_else(|| PathBuf::from(".cache"))
                .join("megye-atlas")
        })
    }
}

/// Ustawienia zewnętrznego geokodowania.
#[derive(Clone, Debug)]
pub struct GeocoderConfig {
    pub online: bool,
    pub endpoint: String,
    pub country_codes: String,
    pub language: String,
    pub user_agent: String,
    pub min_delay: Duration,
    pub timeout: Duration,
    pub query_text: QueryText,
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            online: true,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            country_codes: "hu".to_string(),
            language: "hu".to_string(),
            user_agent: concat!("MegyeAtlas/", env!("CARGO_PKG_VERSION")).to_string(),
            min_delay: Duration::from_millis(900),
            timeout: Duration::from_secs(10),
            query_text: QueryText::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_config() {
        let settings = Settings::parse_from(["MegyeAtlas"]);
        let cfg = settings.geocoder();
        assert!(cfg.online);
        assert_eq!(cfg.min_delay, Duration::from_millis(900));
        assert_eq!(cfg.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(settings.overview, OverviewScope::All);
    }

    #[test]
    fn flags_override_defaults() {
        let settings = Settings::parse_from([
            "MegyeAtlas", "--offline", "--min-delay-ms", "1500", "--overview", "highlighted",
            "--cache-dir", "/tmp/atlas",
        ]);
        assert!(!settings.geocoder().online);
        assert_eq!(settings.geocoder().min_delay, Duration::from_millis(1500));
        assert_eq!(settings.overview, OverviewScope::Highlighted);
        assert_eq!(settings.view().overview_scope, OverviewScope::Highlighted);
        assert_eq!(settings.cache_dir(), PathBuf::from("/tmp/atlas"));
    }
}
