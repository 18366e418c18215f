use crossterm::event::KeyCode;
use std::sync::Arc;
use std::time::Instant;
use tokio::runtime::Handle;
use tracing::warn;

use megye_atlas::{
    data::LoadError,
    projection::Viewport,
    view::{InfoMessage, ViewSnapshot, ViewState},
    RegionSummary, WorkMap,
};

pub struct AppState {
    pub work_map: Option<Arc<WorkMap>>,
    pub load_error: Option<String>,
    pub selected: usize,
    viewport: Viewport,
    runtime: Handle,
}

impl AppState {
    pub const HELP_TEXT: &'static str = "\
↑/↓: ruch w liście
Enter: przybliż megye i pokaż miasta
Esc / Backspace: widok całego kraju
q: wyjście";

    pub fn new(loaded: Result<Arc<WorkMap>, LoadError>, runtime: Handle, viewport: Viewport) -> Self {
        let (work_map, load_error) = match loaded {
            Ok(map) => (Some(map), None),
            Err(e) => (None, Some(format!("Nie udało się wczytać mapy:\n{e}"))),
        };
        Self { work_map, load_error, selected: 0, viewport, runtime }
    }

    pub fn summaries(&self) -> &[RegionSummary] {
        self.work_map.as_deref().map(WorkMap::summaries).unwrap_or_default()
    }

    pub fn snapshot(&self) -> Option<ViewSnapshot> {
        self.work_map.as_ref().map(|m| m.snapshot())
    }

    /// Pierwsze dopasowanie widoku ogólnego.
    pub fn initialize(&self) {
        let Some(map) = self.work_map.clone() else {
            return;
        };
        self.runtime.spawn(async move {
            if let Err(e) = map.initialize().await {
                warn!("Cannot show overview: {}", e);
            }
        });
    }

    pub fn tick(&self, now: Instant) {
        if let Some(map) = &self.work_map {
            map.tick(now);
        }
    }

    /// Wywoływane przy każdym rysowaniu; przekazuje zmianę rozmiaru do kamery.
    pub fn sync_viewport(&mut self, viewport: Viewport) {
        if viewport == self.viewport {
            return;
        }
        self.viewport = viewport;
        if let Some(map) = &self.work_map {
            map.resize(viewport);
        }
    }

    /// Zwraca `true`, gdy trzeba zakończyć program.
    pub fn handle_input(&mut self, code: KeyCode) -> bool {
        use KeyCode::*;
        let len = self.summaries().len();
        match code {
            Char('q') => return true,
            Down if len > 0 => self.selected = (self.selected + 1) % len,
            Up if len > 0 => self.selected = (self.selected + len - 1) % len,
            Enter => {
                if let (Some(map), Some(summary)) = (self.work_map.clone(), self.summaries().get(self.selected)) {
                    let key = summary.key.clone();
                    self.runtime.spawn(async move {
                        if let Err(e) = map.show_region(&key).await {
                            warn!("Cannot show region {}: {}", key, e);
                        }
                    });
                }
            }
            Backspace | Esc => {
                if let Some(map) = self.work_map.clone() {
                    self.runtime.spawn(async move {
                        if let Err(e) = map.back().await {
                            warn!("Cannot return to overview: {}", e);
                        }
                    });
                }
            }
            _ => {}
        }
        false
    }

    /// Tekst panelu "Informacje".
    pub fn info_text(&self, snapshot: Option<&ViewSnapshot>) -> String {
        let Some(snap) = snapshot else {
            return self.load_error.clone().unwrap_or_default();
        };
        let summaries = self.summaries();
        let head = match &snap.state {
            ViewState::Overview => {
                let active = summaries.iter().filter(|s| s.highlighted).count();
                let done: usize = summaries.iter().map(|s| s.completed_count).sum();
                format!("Węgry – {} megye, prace w {}\nUkończone: {}", summaries.len(), active, done)
            }
            ViewState::RegionSelected(key) => {
                let name = summaries
                    .iter()
                    .find(|s| &s.key == key)
                    .map_or(key.as_str(), |s| s.display_name.as_str());
                let status = match snap.info {
                    Some(InfoMessage::Placed(n)) => format!("Oznaczone miasta: {n}"),
                    Some(InfoMessage::NoneYet) => "Brak oznaczonych miast".to_string(),
                    // licznik dopiero po rozmieszczeniu wszystkich miast
                    None => "Wyszukiwanie miast…".to_string(),
                };
                format!("{name}\n{status}")
            }
        };
        format!("{head}\n\n{}", Self::HELP_TEXT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use megye_atlas::{
        bounds::LatLng,
        camera::CameraView,
        geocode::ResolutionSource,
        view::Marker,
    };

    fn snapshot(info: Option<InfoMessage>, markers: usize) -> ViewSnapshot {
        let marker = Marker {
            name: "Sárvár".to_string(),
            coordinate: LatLng::new(47.25, 16.93),
            source: ResolutionSource::Gazetteer,
        };
        ViewSnapshot {
            state: ViewState::RegionSelected("vas".to_string()),
            lock: None,
            markers: vec![marker; markers],
            info,
            camera: CameraView { center: LatLng::new(47.1, 16.7), zoom: 9.0 },
            viewport: Viewport::new(800.0, 600.0),
        }
    }

    fn state() -> AppState {
        let missing = LoadError::NoCandidate("locations.json".to_string());
        AppState::new(Err(missing), Handle::current(), Viewport::new(800.0, 600.0))
    }

    #[tokio::test]
    async fn info_has_no_count_while_cities_resolve() {
        let text = state().info_text(Some(&snapshot(None, 1)));
        assert!(text.starts_with("vas\nWyszukiwanie miast…\n"), "{text}");
        assert!(!text.contains("(1)"));
        assert!(!text.contains('1'));
    }

    #[tokio::test]
    async fn info_shows_count_once_published() {
        let app = state();
        let placed = app.info_text(Some(&snapshot(Some(InfoMessage::Placed(2)), 2)));
        assert!(placed.contains("Oznaczone miasta: 2"));
        let none = app.info_text(Some(&snapshot(Some(InfoMessage::NoneYet), 0)));
        assert!(none.contains("Brak oznaczonych miast"));
    }

    #[tokio::test]
    async fn load_error_is_shown_without_snapshot() {
        let text = state().info_text(None);
        assert!(text.starts_with("Nie udało się wczytać mapy:"));
    }
}
