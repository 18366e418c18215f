use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Style},
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
    Frame,
};

use megye_atlas::view::ViewState;
use crate::map_draw::{viewport_for, MapView};
use crate::state::AppState;

fn columns(area: Rect) -> [Rect; 3] {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(20),
            Constraint::Percentage(60),
            Constraint::Percentage(20),
        ].as_ref())
        .split(area);
    [chunks[0], chunks[1], chunks[2]]
}

/// Prostokąt panelu mapy dla danego rozmiaru terminala.
pub fn map_area(area: Rect) -> Rect {
    columns(area)[1]
}

pub fn draw(f: &mut Frame, state: &mut AppState) {
    let [left, center, right] = columns(f.area());
    state.sync_viewport(viewport_for(center));
    let snapshot = state.snapshot();

    // Lewy panel: megye, podświetlone na zielono, z liczbą ukończonych prac
    let items: Vec<ListItem> = state
        .summaries()
        .iter()
        .map(|s| {
            let style = if s.highlighted { Style::default().fg(Color::Green) } else { Style::default() };
            let label = if s.completed_count > 0 {
                format!("{} ({})", s.display_name, s.completed_count)
            } else {
                s.display_name.clone()
            };
            ListItem::new(label).style(style)
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(state.selected));
    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title("Megye"))
        .highlight_symbol(">> ")
        .highlight_style(Style::default().fg(Color::Red));
    f.render_stateful_widget(list, left, &mut list_state);

    // Środek: mapa albo komunikat o błędzie danych
    match (&state.work_map, &snapshot) {
        (Some(map), Some(snap)) => {
            let title = match &snap.state {
                ViewState::Overview => "Mapa".to_string(),
                ViewState::RegionSelected(key) => map
                    .regions()
                    .get(key)
                    .map_or_else(|| key.clone(), |r| r.display_name.clone()),
            };
            MapView::new(map.regions(), snap).render(f, center, &title);
        }
        _ => {
            let txt = Paragraph::new(state.load_error.clone().unwrap_or_default())
                .block(Block::default().borders(Borders::ALL).title("Mapa"))
                .style(Style::default().fg(Color::Red))
                .wrap(Wrap { trim: true });
            f.render_widget(txt, center);
        }
    }

    // Prawy panel: informacje + miasta z bieżącego megye
    let right_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(45), Constraint::Percentage(55)].as_ref())
        .split(right);

    let info_paragraph = Paragraph::new(state.info_text(snapshot.as_ref()))
        .block(Block::default().borders(Borders::ALL).title("Informacje"))
        .wrap(Wrap { trim: true });
    f.render_widget(info_paragraph, right_chunks[0]);

    let cities: Vec<ListItem> = snapshot
        .iter()
        .flat_map(|s| s.markers.iter())
        .map(|m| ListItem::new(format!("{} [{:?}]", m.name, m.source)))
        .collect();
    let cities = List::new(cities)
        .block(Block::default().borders(Borders::ALL).title("Miasta"))
        .style(Style::default().fg(Color::White));
    f.render_widget(cities, right_chunks[1]);
}
