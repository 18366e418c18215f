use geo::Rect;
use serde::{Deserialize, Serialize};

/// Odstęp od krawędzi (w stopniach), żeby punkt nie wypadał na linii granicy.
pub const CLAMP_MARGIN: f64 = 0.002;

/// Punkt geograficzny.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Zwraca punkt tylko gdy obie współrzędne są skończonymi liczbami.
    pub fn checked(lat: f64, lng: f64) -> Option<Self> {
        (lat.is_finite() && lng.is_finite()).then_some(Self { lat, lng })
    }

    /// Zaokrąglenie do 5 miejsc po przecinku (ok. 1 m).
    pub fn rounded(self) -> Self {
        let q = |n: f64| (n * 1e5).round() / 1e5;
        Self { lat: q(self.lat), lng: q(self.lng) }
    }
}

/// Prostokąt south/west/north/east.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south: south.min(north),
            west: west.min(east),
            north: north.max(south),
            east: east.max(west),
        }
    }

    /// geo::Rect trzyma x = długość, y = szerokość geograficzna.
    pub fn from_rect(rect: Rect<f64>) -> Self {
        let (min, max) = (rect.min(), rect.max());
        Self::new(min.y, min.x, max.y, max.x)
    }

    pub fn center(&self) -> LatLng {
        LatLng::new((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    pub fn contains(&self, p: LatLng) -> bool {
        p.lat >= self.south && p.lat <= self.north && p.lng >= self.west && p.lng <= self.east
    }

    pub fn intersects(&self, other: &Bounds) -> bool {
        self.south <= other.north
            && self.north >= other.south
            && self.west <= other.east
            && self.east >= other.west
    }

    /// Powiększa prostokąt o ułamek jego wysokości/szerokości z każdej strony.
    pub fn pad(&self, ratio: f64) -> Self {
        let dlat = (self.north - self.south).abs() * ratio;
        let dlng = (self.east - self.west).abs() * ratio;
        Self::new(self.south - dlat, self.west - dlng, self.north + dlat, self.east + dlng)
    }

    /// Powiększa prostokąt o stałą liczbę stopni.
    pub fn expand(&self, degrees: f64) -> Self {
        Self::new(self.south - degrees, self.west - degrees, self.north + degrees, self.east + degrees)
    }

    pub fn union(&self, other: &Bounds) -> Self {
        Self::new(
            self.south.min(other.south),
            self.west.min(other.west),
            self.north.max(other.north),
            self.east.max(other.east),
        )
    }

    /// Suma wszystkich prostokątów; `None` dla pustej listy.
    pub fn union_all<I: IntoIterator<Item = Bounds>>(items: I) -> Option<Self> {
        items.into_iter().reduce(|acc, b| acc.union(&b))
    }
}

/// Wciska punkt do wnętrza prostokąta, z marginesem [`CLAMP_MARGIN`].
pub fn clamp(p: LatLng, bounds: &Bounds) -> LatLng {
    LatLng::new(
        clamp_axis(p.lat, bounds.south, bounds.north),
        clamp_axis(p.lng, bounds.west, bounds.east),
    )
}

fn clamp_axis(v: f64, min: f64, max: f64) -> f64 {
    let (lo, hi) = (min + CLAMP_MARGIN, max - CLAMP_MARGIN);
    if lo > hi {
        // oś węższa niż 2 marginesy
        return (min + max) / 2.0;
    }
    v.clamp(lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vas() -> Bounds {
        Bounds::new(46.75, 16.1, 47.45, 17.35)
    }

    #[test]
    fn clamp_keeps_inner_points() {
        let p = LatLng::new(47.0, 16.6);
        assert_eq!(clamp(p, &vas()), p);
    }

    #[test]
    fn clamp_pulls_outside_points_inside_margin() {
        let b = vas();
        let c = clamp(LatLng::new(50.0, 10.0), &b);
        assert_eq!(c, LatLng::new(b.north - CLAMP_MARGIN, b.west + CLAMP_MARGIN));
        assert!(b.contains(c));
    }

    #[test]
    fn degenerate_axis_snaps_to_center() {
        let b = Bounds::new(47.0, 18.0, 47.001, 19.0);
        let c = clamp(LatLng::new(40.0, 18.5), &b);
        assert!((c.lat - 47.0005).abs() < 1e-9);
        assert_eq!(c.lng, 18.5);
    }

    #[test]
    fn pad_grows_each_side_by_ratio() {
        let b = Bounds::new(0.0, 0.0, 10.0, 20.0).pad(0.1);
        assert_eq!(b, Bounds::new(-1.0, -2.0, 11.0, 22.0));
    }

    #[test]
    fn union_of_nothing_is_none() {
        assert!(Bounds::union_all(Vec::new()).is_none());
        let u = Bounds::union_all([vas(), Bounds::new(45.0, 18.0, 46.0, 19.0)]).unwrap();
        assert_eq!(u, Bounds::new(45.0, 16.1, 47.45, 19.0));
    }

    #[test]
    fn rounding_is_stable() {
        let p = LatLng::new(47.123456789, 19.987654321).rounded();
        assert_eq!(p, LatLng::new(47.12346, 19.98765));
        assert_eq!(p.rounded(), p);
    }
}
