use geo::{Area, LineString, MultiPolygon};
use ratatui::layout::Rect as TuiRect;
use ratatui::style::{Color, Style};
use ratatui::symbols::Marker as CanvasMarker;
use ratatui::text::Span;
use ratatui::widgets::canvas::{Canvas, Context, Line};
use ratatui::widgets::{Block, Borders};
use ratatui::Frame;

use megye_atlas::{
    projection::{visible_bounds, Viewport},
    region::RegionSet,
    view::{ViewSnapshot, ViewState},
};

/// Przybliżony rozmiar komórki terminala w pikselach mapy.
const CELL_WIDTH_PX: f64 = 8.0;
const CELL_HEIGHT_PX: f64 = 16.0;

/// Viewport kamery odpowiadający panelowi mapy (bez ramki).
pub fn viewport_for(area: TuiRect) -> Viewport {
    let w = area.width.saturating_sub(2).max(1);
    let h = area.height.saturating_sub(2).max(1);
    Viewport::new(f64::from(w) * CELL_WIDTH_PX, f64::from(h) * CELL_HEIGHT_PX)
}

/// Obwody do narysowania; przy wielu częściach pomijamy drobne wysepki.
fn outline_rings(mp: &MultiPolygon<f64>) -> Vec<&LineString<f64>> {
    let areas: Vec<f64> = mp.0.iter().map(|p| p.unsigned_area()).collect();
    let max_area = areas.iter().copied().fold(0.0, f64::max);
    let threshold = if mp.0.len() > 1 { max_area * 0.20 } else { 0.0 };
    mp.0.iter()
        .zip(areas)
        .filter(|(_, area)| *area >= threshold)
        .map(|(poly, _)| poly.exterior())
        .collect()
}

fn draw_ring(ctx: &mut Context<'_>, ring: &LineString<f64>, color: Color) {
    for window in ring.0.windows(2) {
        let (a, b) = (window[0], window[1]);
        ctx.draw(&Line { x1: a.x, y1: a.y, x2: b.x, y2: b.y, color });
    }
}

/// Rysuje megye i znaczniki miast z jednego zrzutu widoku.
pub struct MapView<'a> {
    regions: &'a RegionSet,
    snapshot: &'a ViewSnapshot,
}

impl<'a> MapView<'a> {
    pub fn new(regions: &'a RegionSet, snapshot: &'a ViewSnapshot) -> Self {
        Self { regions, snapshot }
    }

    pub fn render(&self, f: &mut Frame, area: TuiRect, title: &str) {
        let snap = self.snapshot;
        let visible = visible_bounds(snap.camera.center, snap.camera.zoom, snap.viewport);
        let selected = match &snap.state {
            ViewState::RegionSelected(key) => Some(key.as_str()),
            ViewState::Overview => None,
        };

        let canvas = Canvas::default()
            .block(Block::default().title(title).borders(Borders::ALL))
            .marker(CanvasMarker::Braille)
            .x_bounds([visible.west, visible.east])
            .y_bounds([visible.south, visible.north])
            .paint(|ctx| {
                // 1) granice: zwykłe na biało, z pracami na zielono
                for region in self.regions.iter().filter(|r| r.bounds.intersects(&visible)) {
                    if Some(region.key.as_str()) == selected {
                        continue;
                    }
                    let color = if region.highlighted { Color::Green } else { Color::White };
                    for ring in outline_rings(&region.polygon) {
                        draw_ring(ctx, ring, color);
                    }
                }

                // 2) wybrany megye na czerwono, na wierzchu
                if let Some(region) = selected.and_then(|key| self.regions.get(key)) {
                    ctx.layer();
                    for ring in outline_rings(&region.polygon) {
                        draw_ring(ctx, ring, Color::Red);
                    }
                }

                // 3) miasta
                ctx.layer();
                for m in &snap.markers {
                    ctx.print(
                        m.coordinate.lng,
                        m.coordinate.lat,
                        Span::styled(format!("• {}", m.name), Style::default().fg(Color::Yellow)),
                    );
                }
            });
        f.render_widget(canvas, area);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn square(x: f64, y: f64, side: f64) -> Polygon<f64> {
        polygon![(x: x, y: y), (x: x + side, y: y), (x: x + side, y: y + side), (x: x, y: y + side), (x: x, y: y)]
    }

    #[test]
    fn tiny_islands_are_skipped() {
        let mp = MultiPolygon(vec![square(0.0, 0.0, 1.0), square(5.0, 5.0, 0.1)]);
        assert_eq!(outline_rings(&mp).len(), 1);
        let single = MultiPolygon(vec![square(5.0, 5.0, 0.1)]);
        assert_eq!(outline_rings(&single).len(), 1);
    }

    #[test]
    fn viewport_excludes_border() {
        let v = viewport_for(TuiRect::new(0, 0, 82, 42));
        assert_eq!(v, Viewport::new(640.0, 640.0));
    }
}
