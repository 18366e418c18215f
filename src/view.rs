//! Dwa stany widoku: ogólny (cały kraj) i wybrany megye.
//!
//! Każde przejście dostaje nowy numer pokolenia. Blokada kamery z przejścia,
//! które zostało w międzyczasie zastąpione, nigdy nie jest nakładana, a znaczniki
//! z nieaktualnego przejścia są odrzucane.

use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::{
    bounds::{Bounds, LatLng},
    camera::{Camera, CameraLock, CameraView},
    config::OverviewScope,
    geocode::ResolutionSource,
    projection::{fit_zoom, FitMode, Viewport, MAX_ZOOM},
    region::RegionSet,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ViewState {
    Overview,
    RegionSelected(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ViewError {
    #[error("unknown region {0:?}")]
    UnknownRegion(String),
    #[error("no regions loaded")]
    NoRegions,
}

/// Dopasowanie: korekta zoomu, margines w px, zapas blokady (ułamek prostokąta).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FitPreset {
    pub zoom_adjust: f64,
    pub padding: f64,
    pub lock_pad: f64,
}

/// Osobne ustawienia dla wąskich (telefon) i szerokich widoków.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewPresets {
    pub region_narrow: FitPreset,
    pub region_wide: FitPreset,
    pub overview_narrow: FitPreset,
    pub overview_wide: FitPreset,
    /// Zapas wokół podświetlonych megye, żeby było widać etykiety sąsiadów.
    pub highlight_margin_narrow: f64,
    pub highlight_margin_wide: f64,
}

impl Default for ViewPresets {
    fn default() -> Self {
        Self {
            // na telefonie trochę dalej, na komputerze ledwo bliżej
            region_narrow: FitPreset { zoom_adjust: -0.15, padding: 0.0, lock_pad: 0.0015 },
            region_wide: FitPreset { zoom_adjust: 0.01, padding: 0.0, lock_pad: 0.0015 },
            overview_narrow: FitPreset { zoom_adjust: 0.4, padding: 2.0, lock_pad: 0.005 },
            overview_wide: FitPreset { zoom_adjust: 0.0, padding: 2.0, lock_pad: 0.005 },
            highlight_margin_narrow: 0.12,
            highlight_margin_wide: 0.06,
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ViewConfig {
    pub presets: ViewPresets,
    pub overview_scope: OverviewScope,
}

/// Identyfikator jednego przejścia.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Ticket(u64);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum TransitionOutcome {
    Locked(CameraLock),
    Superseded,
    Unchanged,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Marker {
    pub name: String,
    pub coordinate: LatLng,
    pub source: ResolutionSource,
}

/// Treść panelu informacyjnego po rozmieszczeniu wszystkich miast.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoMessage {
    Placed(usize),
    NoneYet,
}

/// Przejście rozpoczęte, czekające na zakończenie animacji.
pub struct PendingTransition {
    ticket: Ticket,
    lock: CameraLock,
    settle: oneshot::Receiver<()>,
}

impl PendingTransition {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }

    /// Blokada, która zostanie nałożona, jeśli przejście nie zostanie zastąpione.
    pub fn lock(&self) -> CameraLock {
        self.lock
    }
}

/// Stan do narysowania.
#[derive(Clone, Debug)]
pub struct ViewSnapshot {
    pub state: ViewState,
    pub lock: Option<CameraLock>,
    pub markers: Vec<Marker>,
    pub info: Option<InfoMessage>,
    pub camera: CameraView,
    pub viewport: Viewport,
}

struct Inner {
    state: ViewState,
    generation: u64,
    lock: Option<CameraLock>,
    markers: Vec<Marker>,
    info: Option<InfoMessage>,
    camera: Box<dyn Camera>,
}

impl Inner {
    /// Nowe przejście: unieważnia poprzednie, czyści znaczniki i zdejmuje blokadę.
    fn advance(&mut self, state: ViewState) -> Ticket {
        self.generation += 1;
        self.state = state;
        self.lock = None;
        self.markers.clear();
        self.info = None;
        self.camera.unlock();
        Ticket(self.generation)
    }
}

pub struct ViewStateMachine {
    regions: Arc<RegionSet>,
    config: ViewConfig,
    inner: Mutex<Inner>,
}

impl ViewStateMachine {
    pub fn new(regions: Arc<RegionSet>, camera: Box<dyn Camera>, config: ViewConfig) -> Self {
        Self {
            regions,
            config,
            inner: Mutex::new(Inner {
                state: ViewState::Overview,
                generation: 0,
                lock: None,
                markers: Vec::new(),
                info: None,
                camera,
            }),
        }
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn state(&self) -> ViewState {
        self.inner().state.clone()
    }

    /// Czy przejście `ticket` jest wciąż tym aktywnym.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.inner().generation == ticket.0
    }

    /// Pierwsze dopasowanie widoku ogólnego po załadowaniu danych.
    pub async fn initialize(&self) -> Result<TransitionOutcome, ViewError> {
        let pending = self.begin_overview()?;
        Ok(self.complete(pending).await)
    }

    /// Overview / inny megye -> `RegionSelected(key)`; wraca dopiero po blokadzie
    /// (albo z `Superseded`, jeśli w międzyczasie wybrano coś innego).
    pub async fn select(&self, key: &str) -> Result<TransitionOutcome, ViewError> {
        let pending = self.begin_select(key)?;
        Ok(self.complete(pending).await)
    }

    /// `RegionSelected(_)` -> Overview. Z widoku ogólnego nic nie robi.
    pub async fn back(&self) -> Result<TransitionOutcome, ViewError> {
        if self.state() == ViewState::Overview {
            return Ok(TransitionOutcome::Unchanged);
        }
        let pending = self.begin_overview()?;
        Ok(self.complete(pending).await)
    }

    pub fn begin_select(&self, key: &str) -> Result<PendingTransition, ViewError> {
        let region = self
            .regions
            .get(key)
            .ok_or_else(|| ViewError::UnknownRegion(key.to_string()))?;
        let bounds = region.bounds;

        let mut inner = self.inner();
        let ticket = inner.advance(ViewState::RegionSelected(key.to_string()));
        let viewport = inner.camera.viewport();
        let preset = if viewport.is_narrow() {
            self.config.presets.region_narrow
        } else {
            self.config.presets.region_wide
        };
        let zoom = (fit_zoom(&bounds, viewport, preset.padding, FitMode::Cover) + preset.zoom_adjust).min(MAX_ZOOM);
        let lock = CameraLock { zoom, max_bounds: bounds.pad(preset.lock_pad) };
        let settle = inner.camera.fly_to(bounds.center(), zoom);
        info!("Selecting region {} (zoom {:.2})", key, zoom);
        Ok(PendingTransition { ticket, lock, settle })
    }

    pub fn begin_overview(&self) -> Result<PendingTransition, ViewError> {
        let mut inner = self.inner();
        let viewport = inner.camera.viewport();
        let (frame, preset) = self.overview_frame(viewport).ok_or(ViewError::NoRegions)?;

        let ticket = inner.advance(ViewState::Overview);
        let zoom = (fit_zoom(&frame, viewport, preset.padding, FitMode::Contain) + preset.zoom_adjust).min(MAX_ZOOM);
        let lock = CameraLock { zoom, max_bounds: frame.pad(preset.lock_pad) };
        let settle = inner.camera.fly_to(frame.center(), zoom);
        debug!("Fitting overview (zoom {:.2})", zoom);
        Ok(PendingTransition { ticket, lock, settle })
    }

    /// Czeka na koniec animacji i nakłada blokadę, o ile przejście jest wciąż aktualne.
    pub async fn complete(&self, pending: PendingTransition) -> TransitionOutcome {
        let PendingTransition { ticket, lock, settle } = pending;
        // zamknięty kanał też oznacza, że kamera stanęła
        let _ = settle.await;

        let mut inner = self.inner();
        if inner.generation != ticket.0 {
            debug!("Dropping stale camera lock from transition {}", ticket.0);
            return TransitionOutcome::Superseded;
        }
        inner.camera.apply_lock(&lock);
        inner.camera.set_interactions(false);
        inner.lock = Some(lock);
        TransitionOutcome::Locked(lock)
    }

    /// Dodaje znacznik, jeśli `ticket` jest aktualny. `false` = przerwij rozmieszczanie.
    pub fn add_marker(&self, ticket: Ticket, marker: Marker) -> bool {
        let mut inner = self.inner();
        if inner.generation != ticket.0 {
            return false;
        }
        inner.markers.push(marker);
        true
    }

    /// Wpis do panelu informacyjnego, gdy wszystkie miasta megye są już rozmieszczone.
    pub fn publish_count(&self, ticket: Ticket, placed: usize) -> bool {
        let mut inner = self.inner();
        if inner.generation != ticket.0 {
            return false;
        }
        inner.info = Some(if placed > 0 { InfoMessage::Placed(placed) } else { InfoMessage::NoneYet });
        true
    }

    pub fn snapshot(&self) -> ViewSnapshot {
        let inner = self.inner();
        ViewSnapshot {
            state: inner.state.clone(),
            lock: inner.lock,
            markers: inner.markers.clone(),
            info: inner.info,
            camera: inner.camera.view(),
            viewport: inner.camera.viewport(),
        }
    }

    pub fn tick(&self, now: Instant) {
        self.inner().camera.tick(now);
    }

    pub fn resize(&self, viewport: Viewport) {
        self.inner().camera.set_viewport(viewport);
    }

    fn overview_frame(&self, viewport: Viewport) -> Option<(Bounds, FitPreset)> {
        let presets = &self.config.presets;
        let (preset, margin) = if viewport.is_narrow() {
            (presets.overview_narrow, presets.highlight_margin_narrow)
        } else {
            (presets.overview_wide, presets.highlight_margin_wide)
        };
        let frame = match self.config.overview_scope {
            OverviewScope::All => self.regions.union_bounds(),
            OverviewScope::Highlighted => self
                .regions
                .highlighted_bounds()
                .map(|b| b.pad(margin))
                .or_else(|| self.regions.union_bounds()),
        }?;
        Some((frame, preset))
    }
}
