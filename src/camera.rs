use std::time::{Duration, Instant};
use tokio::sync::oneshot;

use crate::bounds::{Bounds, LatLng};
use crate::projection::{Viewport, MAX_ZOOM, MIN_ZOOM};

/// Aktualny środek i zoom kamery.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraView {
    pub center: LatLng,
    pub zoom: f64,
}

/// Blokada: zoom przypięty do jednej wartości, przesuwanie tylko w `max_bounds`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraLock {
    pub zoom: f64,
    pub max_bounds: Bounds,
}

/// Kamera mapy sterowana przez [`crate::view::ViewStateMachine`].
///
/// `fly_to` zwraca odbiornik, który dostaje sygnał, gdy animacja się zakończy
/// (także gdy zostanie przerwana kolejnym `fly_to`).
pub trait Camera: Send {
    fn viewport(&self) -> Viewport;
    fn set_viewport(&mut self, viewport: Viewport);
    fn view(&self) -> CameraView;
    /// Zdejmuje limity zoomu i obszaru.
    fn unlock(&mut self);
    /// Przeciąganie, kółko, pinch, klawiatura.
    fn set_interactions(&mut self, enabled: bool);
    fn fly_to(&mut self, center: LatLng, zoom: f64) -> oneshot::Receiver<()>;
    fn apply_lock(&mut self, lock: &CameraLock);
    /// Posuwa animację do przodu; kamery bez animacji nic nie robią.
    fn tick(&mut self, _now: Instant) {}
}

struct Flight {
    from: CameraView,
    to: CameraView,
    started: Instant,
    settle: oneshot::Sender<()>,
}

impl Flight {
    fn position_at(&self, now: Instant, duration: Duration) -> CameraView {
        let t = if duration.is_zero() {
            1.0
        } else {
            (now.saturating_duration_since(self.started).as_secs_f64() / duration.as_secs_f64()).min(1.0)
        };
        let lerp = |a: f64, b: f64| a + (b - a) * t;
        CameraView {
            center: LatLng::new(lerp(self.from.center.lat, self.to.center.lat), lerp(self.from.center.lng, self.to.center.lng)),
            zoom: lerp(self.from.zoom, self.to.zoom),
        }
    }
}

/// Kamera bez silnika mapy: liniowa animacja środka i zoomu, używana przez terminalowy widok.
pub struct SimulatedCamera {
    viewport: Viewport,
    current: CameraView,
    min_zoom: f64,
    max_zoom: f64,
    max_bounds: Option<Bounds>,
    interactions: bool,
    duration: Duration,
    flight: Option<Flight>,
}

impl SimulatedCamera {
    pub fn new(viewport: Viewport, start: CameraView) -> Self {
        Self {
            viewport,
            current: start,
            min_zoom: MIN_ZOOM,
            max_zoom: MAX_ZOOM,
            max_bounds: None,
            interactions: false,
            duration: Duration::from_millis(500),
            flight: None,
        }
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = duration;
        self
    }

    pub fn interactions_enabled(&self) -> bool {
        self.interactions
    }

    pub fn zoom_range(&self) -> (f64, f64) {
        (self.min_zoom, self.max_zoom)
    }

    pub fn max_bounds(&self) -> Option<Bounds> {
        self.max_bounds
    }

    pub fn is_flying(&self) -> bool {
        self.flight.is_some()
    }

    fn finish(&mut self, flight: Flight, at: CameraView) {
        self.current = at;
        // odbiornik mógł już zniknąć (przejście zastąpione), to nie błąd
        let _ = flight.settle.send(());
    }
}

impl Camera for SimulatedCamera {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn view(&self) -> CameraView {
        match &self.flight {
            Some(f) => f.position_at(Instant::now(), self.duration),
            None => self.current,
        }
    }

    fn unlock(&mut self) {
        self.min_zoom = MIN_ZOOM;
        self.max_zoom = MAX_ZOOM;
        self.max_bounds = None;
    }

    fn set_interactions(&mut self, enabled: bool) {
        self.interactions = enabled;
    }

    fn fly_to(&mut self, center: LatLng, zoom: f64) -> oneshot::Receiver<()> {
        let now = Instant::now();
        if let Some(prev) = self.flight.take() {
            let at = prev.position_at(now, self.duration);
            self.finish(prev, at);
        }
        let (tx, rx) = oneshot::channel();
        let to = CameraView { center, zoom: zoom.clamp(self.min_zoom, self.max_zoom) };
        let flight = Flight { from: self.current, to, started: now, settle: tx };
        if self.duration.is_zero() {
            self.finish(flight, to);
        } else {
            self.flight = Some(flight);
        }
        rx
    }

    fn apply_lock(&mut self, lock: &CameraLock) {
        self.min_zoom = lock.zoom;
        self.max_zoom = lock.zoom;
        self.max_bounds = Some(lock.max_bounds);
        if self.flight.is_none() {
            self.current.zoom = lock.zoom;
        }
    }

    fn tick(&mut self, now: Instant) {
        let done = self
            .flight
            .as_ref()
            .is_some_and(|f| now.saturating_duration_since(f.started) >= self.duration);
        if done {
            if let Some(flight) = self.flight.take() {
                let to = flight.to;
                self.finish(flight, to);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn camera() -> SimulatedCamera {
        SimulatedCamera::new(
            Viewport::new(800.0, 600.0),
            CameraView { center: LatLng::new(47.0, 19.0), zoom: 6.0 },
        )
    }

    #[test]
    fn flight_settles_after_duration() {
        let mut cam = camera();
        let start = Instant::now();
        let mut rx = cam.fly_to(LatLng::new(46.0, 18.0), 9.0);
        cam.tick(start);
        assert!(rx.try_recv().is_err());
        assert!(cam.is_flying());

        cam.tick(start + Duration::from_millis(600));
        assert!(rx.try_recv().is_ok());
        assert_eq!(cam.view(), CameraView { center: LatLng::new(46.0, 18.0), zoom: 9.0 });
    }

    #[test]
    fn interrupted_flight_still_settles() {
        let mut cam = camera();
        let mut first = cam.fly_to(LatLng::new(46.0, 18.0), 9.0);
        let _second = cam.fly_to(LatLng::new(48.0, 21.0), 8.0);
        assert!(first.try_recv().is_ok());
        assert!(cam.is_flying());
    }

    #[test]
    fn lock_pins_zoom_and_unlock_releases() {
        let mut cam = camera().with_duration(Duration::ZERO);
        let bounds = Bounds::new(46.0, 18.0, 47.0, 19.0);
        let mut rx = cam.fly_to(bounds.center(), 9.3);
        assert!(rx.try_recv().is_ok());
        cam.set_interactions(true);
        cam.apply_lock(&CameraLock { zoom: 9.3, max_bounds: bounds });
        cam.set_interactions(false);
        assert!(!cam.interactions_enabled());
        assert_eq!(cam.zoom_range(), (9.3, 9.3));
        assert_eq!(cam.max_bounds(), Some(bounds));

        cam.unlock();
        assert_eq!(cam.zoom_range(), (MIN_ZOOM, MAX_ZOOM));
        assert_eq!(cam.max_bounds(), None);
    }
}
