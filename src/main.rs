mod map_draw;
mod state;
mod ui;

use anyhow::Context;
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyEvent, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, layout::Rect, Terminal};
use std::{fs::File, io, sync::{Arc, Mutex}, time::{Duration, Instant}};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use megye_atlas::{
    bounds::LatLng,
    camera::{CameraView, SimulatedCamera},
    config::Settings,
    projection::Viewport,
    WorkMap,
};
use state::AppState;

/// Środek Węgier, zanim widok ogólny się dopasuje.
const START_VIEW: CameraView = CameraView { center: LatLng { lat: 47.16, lng: 19.5 }, zoom: 7.0 };

fn filter() -> tracing_subscriber::EnvFilter {
    tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "megye_atlas=info,MegyeAtlas=info".into())
}

fn main() -> anyhow::Result<()> {
    let settings = Settings::parse();
    // jeden wątek roboczy: geokodowanie i kamera; UI zostaje na głównym
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(1)
        .enable_all()
        .build()?;

    if settings.dump {
        tracing_subscriber::registry()
            .with(filter())
            .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
            .init();
        return runtime.block_on(dump(&settings));
    }

    let log = File::create(&settings.log_file)
        .with_context(|| format!("cannot create log file {}", settings.log_file.display()))?;
    tracing_subscriber::registry()
        .with(filter())
        .with(tracing_subscriber::fmt::layer().with_writer(Mutex::new(log)).with_ansi(false))
        .init();

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run(&mut terminal, &settings, runtime.handle().clone());

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;
    result
}

fn run(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    settings: &Settings,
    runtime: tokio::runtime::Handle,
) -> anyhow::Result<()> {
    let size = terminal.size()?;
    let viewport = map_draw::viewport_for(ui::map_area(Rect::new(0, 0, size.width, size.height)));
    let camera = SimulatedCamera::new(viewport, START_VIEW);

    let loaded = WorkMap::load(settings, Box::new(camera)).map(Arc::new);
    if let Err(e) = &loaded {
        error!("Failed to load map data: {}", e);
    }
    let mut state = AppState::new(loaded, runtime, viewport);
    state.initialize();

    loop {
        state.tick(Instant::now());
        terminal.draw(|f| ui::draw(f, &mut state))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(KeyEvent { code, kind: KeyEventKind::Press, .. }) = event::read()? {
                if state.handle_input(code) {
                    info!("Quitting");
                    break;
                }
            }
        }
    }
    Ok(())
}

/// `--dump`: geokoduje wszystkie miasta i wypisuje JSON na stdout.
async fn dump(settings: &Settings) -> anyhow::Result<()> {
    let camera = SimulatedCamera::new(Viewport::new(1024.0, 768.0), START_VIEW);
    let work_map = WorkMap::load(settings, Box::new(camera)).context("loading map data")?;
    let reports = work_map.resolve_all().await;
    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}
