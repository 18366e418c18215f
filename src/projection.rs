//! Web Mercator (kafelki 256 px) i dopasowanie zoomu do prostokąta.

use crate::bounds::{Bounds, LatLng};
use std::f64::consts::PI;

pub const TILE_SIZE: f64 = 256.0;
pub const MIN_ZOOM: f64 = 0.0;
pub const MAX_ZOOM: f64 = 22.0;
const MAX_LAT: f64 = 85.051_128_78;

/// Szerokość (px), poniżej której widok liczy się jako wąski (telefon).
pub const NARROW_WIDTH: f64 = 640.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width: width.max(1.0), height: height.max(1.0) }
    }

    pub fn is_narrow(&self) -> bool {
        self.width < NARROW_WIDTH
    }
}

/// Contain: cały prostokąt widoczny. Cover: prostokąt wypełnia widok.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FitMode {
    Contain,
    Cover,
}

pub fn lon_to_x(lon: f64, zoom: f64) -> f64 {
    ((lon + 180.0) / 360.0) * 2.0f64.powf(zoom) * TILE_SIZE
}

pub fn lat_to_y(lat: f64, zoom: f64) -> f64 {
    let lat_rad = lat.clamp(-MAX_LAT, MAX_LAT).to_radians();
    (1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * 2.0f64.powf(zoom) * TILE_SIZE
}

pub fn x_to_lon(x: f64, zoom: f64) -> f64 {
    (x / (TILE_SIZE * 2.0f64.powf(zoom))) * 360.0 - 180.0
}

pub fn y_to_lat(y: f64, zoom: f64) -> f64 {
    let n = PI - 2.0 * PI * y / (TILE_SIZE * 2.0f64.powf(zoom));
    n.sinh().atan().to_degrees()
}

/// Zoom (ułamkowy), przy którym `bounds` mieści się w widoku pomniejszonym o `padding` px z każdej strony.
pub fn fit_zoom(bounds: &Bounds, viewport: Viewport, padding: f64, mode: FitMode) -> f64 {
    let avail_w = (viewport.width - 2.0 * padding).max(1.0);
    let avail_h = (viewport.height - 2.0 * padding).max(1.0);
    let bw = lon_to_x(bounds.east, 0.0) - lon_to_x(bounds.west, 0.0);
    let bh = lat_to_y(bounds.south, 0.0) - lat_to_y(bounds.north, 0.0);
    if bw <= 0.0 || bh <= 0.0 {
        return MAX_ZOOM;
    }
    let (sx, sy) = (avail_w / bw, avail_h / bh);
    let scale = match mode {
        FitMode::Contain => sx.min(sy),
        FitMode::Cover => sx.max(sy),
    };
    scale.log2().clamp(MIN_ZOOM, MAX_ZOOM)
}

/// Prostokąt widoczny przy danym środku i zoomie.
pub fn visible_bounds(center: LatLng, zoom: f64, viewport: Viewport) -> Bounds {
    let cx = lon_to_x(center.lng, zoom);
    let cy = lat_to_y(center.lat, zoom);
    let (hw, hh) = (viewport.width / 2.0, viewport.height / 2.0);
    Bounds::new(
        y_to_lat(cy + hh, zoom),
        x_to_lon(cx - hw, zoom),
        y_to_lat(cy - hh, zoom),
        x_to_lon(cx + hw, zoom),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const HU: Bounds = Bounds { south: 45.6, west: 16.0, north: 48.7, east: 22.95 };

    #[test]
    fn projection_round_trips_at_fractional_zoom() {
        let lat = y_to_lat(lat_to_y(47.5, 7.3), 7.3);
        let lon = x_to_lon(lon_to_x(19.04, 7.3), 7.3);
        assert!((lat - 47.5).abs() < 1e-9);
        assert!((lon - 19.04).abs() < 1e-9);
    }

    #[test]
    fn contained_fit_shows_whole_bounds() {
        let vp = Viewport::new(800.0, 800.0);
        let z = fit_zoom(&HU, vp, 2.0, FitMode::Contain);
        let seen = visible_bounds(HU.center(), z, vp);
        assert!(seen.west <= HU.west + 1e-6 && seen.east >= HU.east - 1e-6);
        assert!(seen.south <= HU.south + 1e-6 && seen.north >= HU.north - 1e-6);
    }

    #[test]
    fn cover_fit_is_never_below_contain_fit() {
        let vp = Viewport::new(400.0, 700.0);
        let contain = fit_zoom(&HU, vp, 0.0, FitMode::Contain);
        let cover = fit_zoom(&HU, vp, 0.0, FitMode::Cover);
        assert!(cover >= contain);
        assert!(vp.is_narrow());
    }

    #[test]
    fn point_bounds_use_max_zoom() {
        let b = Bounds::new(47.0, 19.0, 47.0, 19.0);
        assert_eq!(fit_zoom(&b, Viewport::new(800.0, 600.0), 0.0, FitMode::Contain), MAX_ZOOM);
    }
}
