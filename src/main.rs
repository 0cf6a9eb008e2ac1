mod config;
mod error;
mod observer;
mod overflight;
mod overlay;
mod satellite;
mod simulation;
mod texture;
mod ui;
mod view;

use anyhow::{Context, Result};
use chrono::{Local, Utc};
use clap::Parser;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use ratatui::{backend::CrosstermBackend, Terminal};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{Config, LocateMode};
use observer::{FixedLocation, IpLocation, LocationProvider, Observer};
use overlay::ViewFrame;
use simulation::{AnimationLoop, IntervalTimer, SimulationState};
use texture::EarthTexture;

#[derive(Parser)]
#[command(name = "overpass")]
#[command(about = "Watch imaginary satellites pass over your location")]
struct Args {
    /// Configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Observer latitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lat: Option<f64>,

    /// Observer longitude in degrees
    #[arg(long, allow_hyphen_values = true)]
    lon: Option<f64>,

    /// Location source: "fixed" or "ip"
    #[arg(long)]
    locate: Option<String>,

    /// Equirectangular Earth texture
    #[arg(long)]
    texture: Option<PathBuf>,

    /// Render frames headless into this directory instead of starting the TUI
    #[arg(long)]
    snapshot: Option<PathBuf>,

    /// Number of frames to simulate in snapshot mode
    #[arg(long, default_value_t = 1)]
    frames: u32,

    /// Log file (the terminal is taken by the UI)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

pub struct AppState {
    config: Config,
    sim: SimulationState,
    frames: Vec<ViewFrame>,
    selected_satellite: usize,
    clock_text: String,
    interval_lines: Vec<String>,
    form: Option<CustomSatelliteForm>,
    alert: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    OrbitType,
    Name,
}

pub struct CustomSatelliteForm {
    orbit_type: String,
    name: String,
    field: FormField,
}

impl CustomSatelliteForm {
    fn new() -> Self {
        Self {
            orbit_type: String::new(),
            name: String::new(),
            field: FormField::OrbitType,
        }
    }

    fn input(&mut self) -> &mut String {
        match self.field {
            FormField::OrbitType => &mut self.orbit_type,
            FormField::Name => &mut self.name,
        }
    }

    fn next_field(&mut self) {
        self.field = match self.field {
            FormField::OrbitType => FormField::Name,
            FormField::Name => FormField::OrbitType,
        };
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration, command line wins
    let mut config = Config::load(&args.config)?;
    if args.lat.is_some() {
        config.observer.latitude = args.lat;
    }
    if args.lon.is_some() {
        config.observer.longitude = args.lon;
    }
    if let Some(mode) = &args.locate {
        config.observer.locate = match mode.to_lowercase().as_str() {
            "ip" => LocateMode::Ip,
            "fixed" => LocateMode::Fixed,
            other => anyhow::bail!("Unknown location source '{}' (use fixed or ip)", other),
        };
    }
    if let Some(texture) = &args.texture {
        config.texture.path = texture.clone();
    }

    init_logging(args.log_file.as_deref())?;

    // Location and texture must both resolve before the simulation starts
    let texture = EarthTexture::load(&config.texture.path)?;
    let sim = initialize(&config, &texture)?;

    if let Some(dir) = &args.snapshot {
        return run_snapshot(sim, &config, dir, args.frames);
    }

    let frames = sim.frames();
    let mut app_state = AppState {
        config,
        sim,
        frames,
        selected_satellite: 0,
        clock_text: String::new(),
        interval_lines: Vec::new(),
        form: None,
        alert: None,
    };

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run TUI
    let res = run_app(&mut terminal, &mut app_state, &texture);

    // Restore terminal
    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        error!(error = %err, "application error");
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn init_logging(log_file: Option<&Path>) -> Result<()> {
    let path = match log_file {
        Some(path) => path.to_path_buf(),
        None => dirs::cache_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("overpass")
            .join("overpass.log"),
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating log directory {}", parent.display()))?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("opening log file {}", path.display()))?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn location_provider(config: &Config) -> Box<dyn LocationProvider> {
    match config.observer.locate {
        LocateMode::Fixed => Box::new(FixedLocation {
            latitude: config.observer.latitude,
            longitude: config.observer.longitude,
        }),
        LocateMode::Ip => Box::new(IpLocation {
            url: config.observer.locate_url.clone(),
        }),
    }
}

/// Resolves the location and builds a fresh simulation around it.
fn initialize(config: &Config, texture: &EarthTexture) -> Result<SimulationState> {
    let fix = location_provider(config).locate()?;
    let observer = Observer::new(config.observer.name.clone(), fix);
    info!(observer = %observer.name, location = %observer.location_text(), "location fixed");

    let rng = match config.simulation.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    Ok(SimulationState::initialize(observer, texture, config, rng))
}

fn run_snapshot(mut sim: SimulationState, config: &Config, dir: &Path, frames: u32) -> Result<()> {
    let dt = 1.0 / config.simulation.frame_rate.max(1.0);
    for _ in 0..frames {
        sim.tick(dt);
    }

    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;
    for (view, frame) in sim.views.iter().zip(sim.frames()) {
        let path = dir.join(format!("{}.png", view.id));
        frame
            .image
            .save(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        println!("Wrote {}", path.display());
    }

    println!("{}", sim.observer.location_text());
    println!("{}", sim.satellite_header());
    for line in sim.satellite_lines() {
        println!("  {}", line);
    }
    for (idx, interval) in sim.free_intervals(Utc::now()).iter().enumerate() {
        println!("{}", interval.describe(idx));
    }
    for entry in sim.events.entries() {
        println!("{}", entry);
    }
    Ok(())
}

fn update_clock(app_state: &mut AppState) {
    let now = Utc::now();
    app_state.clock_text = now.with_timezone(&Local).format("%I:%M:%S %p").to_string();
    app_state.interval_lines = app_state
        .sim
        .free_intervals(now)
        .iter()
        .enumerate()
        .map(|(idx, interval)| interval.describe(idx))
        .collect();
}

fn submit_form(app_state: &mut AppState) {
    let Some(form) = app_state.form.take() else {
        return;
    };
    let name = Some(form.name.as_str()).filter(|n| !n.trim().is_empty());
    if let Err(e) = app_state.sim.add_custom(&form.orbit_type, name) {
        warn!(error = %e, input = %form.orbit_type, "rejected custom satellite");
        app_state.alert = Some(e.to_string());
    }
}

fn run_app(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    app_state: &mut AppState,
    texture: &EarthTexture,
) -> Result<()> {
    let frame_interval =
        Duration::from_secs_f64(1.0 / app_state.config.simulation.frame_rate.max(1.0));
    let animation = AnimationLoop::default();
    let mut handle = animation.start(Instant::now());
    let mut clock = IntervalTimer::new(Duration::from_millis(
        app_state.config.display.interval_refresh_ms,
    ));

    loop {
        let now = Instant::now();
        if let Some(dt) = handle.next_dt(now) {
            app_state.sim.tick(dt);
            app_state.frames = app_state.sim.frames();
        }

        if clock.due(now) {
            update_clock(app_state);
        }

        let count = app_state.sim.satellites.len();
        if count > 0 && app_state.selected_satellite >= count {
            app_state.selected_satellite = count - 1;
        }

        terminal.draw(|f| {
            ui::draw_ui(f, app_state);
        })?;

        // Handle input
        if !event::poll(frame_interval)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if app_state.alert.take().is_some() {
            continue;
        }

        if let Some(form) = app_state.form.as_mut() {
            match key.code {
                KeyCode::Esc => app_state.form = None,
                KeyCode::Enter => submit_form(app_state),
                KeyCode::Tab | KeyCode::Up | KeyCode::Down => form.next_field(),
                KeyCode::Backspace => {
                    form.input().pop();
                }
                KeyCode::Char(c) => form.input().push(c),
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => {
                return Ok(());
            }
            KeyCode::Char('a') => {
                app_state.sim.add_default();
            }
            KeyCode::Char('c') => {
                app_state.form = Some(CustomSatelliteForm::new());
            }
            KeyCode::Char('d') | KeyCode::Delete => {
                app_state.sim.delete(app_state.selected_satellite);
            }
            KeyCode::Char('r') => match initialize(&app_state.config, texture) {
                Ok(sim) => {
                    app_state.sim = sim;
                    app_state.selected_satellite = 0;
                    handle = animation.start(Instant::now());
                    update_clock(app_state);
                }
                Err(e) => {
                    warn!(error = %e, "relocation failed");
                    app_state.alert = Some(e.to_string());
                }
            },
            KeyCode::Up | KeyCode::Char('k') => {
                if app_state.selected_satellite > 0 {
                    app_state.selected_satellite -= 1;
                }
            }
            KeyCode::Down | KeyCode::Char('j') => {
                if app_state.selected_satellite + 1 < app_state.sim.satellites.len() {
                    app_state.selected_satellite += 1;
                }
            }
            KeyCode::Home => {
                app_state.selected_satellite = 0;
            }
            KeyCode::End => {
                app_state.selected_satellite = app_state.sim.satellites.len().saturating_sub(1);
            }
            _ => {}
        }
    }
}
