//! The satellite/view registry and the loop that drives it.

use chrono::{DateTime, Local, Utc};
use rand::rngs::StdRng;
use std::cell::Cell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::Result;
use crate::observer::Observer;
use crate::overflight::{next_free_intervals, Interval};
use crate::overlay::{draw_markers, trajectory_layer, ViewFrame};
use crate::satellite::{demo_constellation, Dynamics, OrbitStatus, OrbitType, Satellite};
use crate::texture::{render_disc, EarthTexture, RenderedDisc};
use crate::view::{build_views, ViewConfig};

/// Terminal transition of a satellite; it has already been removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrbitEvent {
    Crashed(String),
    Escaped(String),
}

impl OrbitEvent {
    pub fn message(&self) -> String {
        match self {
            OrbitEvent::Crashed(name) => format!("{} crashed on Earth", name),
            OrbitEvent::Escaped(name) => format!("{} escaped the Earth", name),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LogEntry {
    pub time: DateTime<Local>,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.time.format("%H:%M:%S"), self.message)
    }
}

/// Bounded, oldest-first event log.
pub struct EventLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl EventLog {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, message: impl Into<String>) {
        let message = message.into();
        info!(event = %message, "simulation event");
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            time: Local::now(),
            message,
        });
    }

    pub fn entries(&self) -> impl DoubleEndedIterator<Item = &LogEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// Single owner of all mutable simulation state.
pub struct SimulationState {
    pub observer: Observer,
    pub views: Vec<ViewConfig>,
    pub satellites: Vec<Satellite>,
    pub events: EventLog,
    discs: Vec<RenderedDisc>,
    layers: Vec<ViewFrame>,
    dynamics: Dynamics,
    path_step: f64,
    rng: StdRng,
}

impl SimulationState {
    /// Builds the three views around the observer, renders their discs once
    /// and seeds the demo constellation.
    pub fn initialize(observer: Observer, texture: &EarthTexture, config: &Config, rng: StdRng) -> Self {
        let orbit = observer.frame();
        let views = build_views(&orbit, observer.latitude, observer.longitude, &config.views);
        let discs = views
            .iter()
            .map(|view| render_disc(texture, &view.projection, &view.geometry))
            .collect();
        info!(
            lat = observer.latitude,
            lon = observer.longitude,
            views = views.len(),
            "simulation initialized"
        );

        let dynamics = Dynamics {
            gm: config.simulation.gm,
            radial_damping: config.simulation.radial_damping,
            escape_radius: config.simulation.escape_radius,
        };

        let mut state = Self {
            observer,
            views,
            satellites: demo_constellation(),
            events: EventLog::new(config.display.event_log_lines),
            discs,
            layers: Vec::new(),
            dynamics,
            path_step: config.simulation.path_step,
            rng,
        };
        state.refresh_trajectories();
        state
    }

    /// Advances every satellite and removes the ones that crashed or escaped.
    ///
    /// Iterates from the back so removal never skips or repeats a satellite.
    pub fn propagate(&mut self, dt: f64) -> Vec<OrbitEvent> {
        let mut events = Vec::new();
        for i in (0..self.satellites.len()).rev() {
            if self.satellites[i].r < 1.0 {
                continue;
            }
            let status = self.satellites[i].advance(dt, &self.dynamics);
            let event = match status {
                OrbitStatus::Orbiting => continue,
                OrbitStatus::Crashed => OrbitEvent::Crashed(self.satellites[i].name.clone()),
                OrbitStatus::Escaped => OrbitEvent::Escaped(self.satellites[i].name.clone()),
            };
            self.satellites.remove(i);
            self.events.push(event.message());
            events.push(event);
        }
        events
    }

    /// One animation frame: propagate, then redraw trajectories.
    pub fn tick(&mut self, dt: f64) -> Vec<OrbitEvent> {
        let events = self.propagate(dt);
        self.refresh_trajectories();
        events
    }

    pub fn refresh_trajectories(&mut self) {
        self.layers = self
            .views
            .iter()
            .zip(&self.discs)
            .map(|(view, disc)| {
                trajectory_layer(disc, view, &self.satellites, self.dynamics.gm, self.path_step)
            })
            .collect();
    }

    /// Trajectories plus current markers for every view.
    pub fn frames(&self) -> Vec<ViewFrame> {
        self.views
            .iter()
            .zip(&self.layers)
            .map(|(view, layer)| draw_markers(layer, view, &self.satellites))
            .collect()
    }

    pub fn add_default(&mut self) -> &Satellite {
        let sat = Satellite::imaginary(&self.satellites, &mut self.rng);
        self.events
            .push(format!("Added default imaginary satellite: {}", sat.name));
        self.satellites.push(sat);
        self.refresh_trajectories();
        &self.satellites[self.satellites.len() - 1]
    }

    /// Adds a two-body satellite. An unknown orbit type leaves the registry untouched.
    pub fn add_custom(&mut self, orbit_type: &str, name: Option<&str>) -> Result<&Satellite> {
        let orbit: OrbitType = orbit_type.parse()?;
        let sat = Satellite::custom(orbit, name, self.satellites.len(), self.dynamics.gm);
        self.events
            .push(format!("Added {} with {}.", sat.name, orbit.description()));
        debug!(name = %sat.name, h = sat.h, vr = sat.vr, "custom satellite launched");
        self.satellites.push(sat);
        self.refresh_trajectories();
        Ok(&self.satellites[self.satellites.len() - 1])
    }

    /// Removes the satellite at `index`; out-of-range indices are ignored.
    pub fn delete(&mut self, index: usize) -> Option<Satellite> {
        if index >= self.satellites.len() {
            return None;
        }
        let sat = self.satellites.remove(index);
        self.events.push(format!("Deleted satellite: {}", sat.name));
        self.refresh_trajectories();
        Some(sat)
    }

    pub fn satellite_header(&self) -> String {
        format!("Active Satellites ({} Total)", self.satellites.len())
    }

    pub fn satellite_lines(&self) -> Vec<String> {
        self.satellites
            .iter()
            .map(|sat| format!("{} ({})", sat.name, sat.type_label()))
            .collect()
    }

    pub fn free_intervals(&self, now: DateTime<Utc>) -> Vec<Interval> {
        next_free_intervals(&self.satellites, now)
    }
}

/// Hands out loop handles; starting a loop cancels every earlier one.
#[derive(Default)]
pub struct AnimationLoop {
    generation: Rc<Cell<u64>>,
}

pub struct LoopHandle {
    generation: u64,
    current: Rc<Cell<u64>>,
    last: Instant,
}

impl AnimationLoop {
    pub fn start(&self, now: Instant) -> LoopHandle {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        debug!(generation, "animation loop started");
        LoopHandle {
            generation,
            current: Rc::clone(&self.generation),
            last: now,
        }
    }
}

impl LoopHandle {
    pub fn is_active(&self) -> bool {
        self.current.get() == self.generation
    }

    /// Seconds since the previous frame, or `None` once a newer loop has started.
    pub fn next_dt(&mut self, now: Instant) -> Option<f64> {
        if !self.is_active() {
            return None;
        }
        let dt = now.saturating_duration_since(self.last).as_secs_f64();
        self.last = now;
        Some(dt)
    }
}

/// Fixed-rate timer for the clock and interval display.
pub struct IntervalTimer {
    period: Duration,
    last: Option<Instant>,
}

impl IntervalTimer {
    pub fn new(period: Duration) -> Self {
        Self { period, last: None }
    }

    /// True on the first call and then at most once per period.
    pub fn due(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.period => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ViewsConfig;
    use crate::error::SimError;
    use crate::observer::GeoFix;
    use crate::satellite::Motion;
    use image::{Rgba, RgbaImage};
    use rand::SeedableRng;

    fn small_state() -> SimulationState {
        let mut config = Config::default();
        config.views = ViewsConfig {
            primary_size: 40,
            primary_radius: 15.0,
            side_size: 24,
            side_radius: 8.0,
        };
        config.display.event_log_lines = 10;
        let texture =
            EarthTexture::from_image(&RgbaImage::from_pixel(8, 4, Rgba([0, 90, 200, 255]))).unwrap();
        let observer = Observer::new("Test".to_string(), GeoFix::new(12.0, 77.0).unwrap());
        SimulationState::initialize(observer, &texture, &config, StdRng::seed_from_u64(1))
    }

    fn run_until_empty_of_custom(state: &mut SimulationState, dt: f64) -> Vec<OrbitEvent> {
        let mut events = Vec::new();
        for _ in 0..100_000 {
            events.extend(state.tick(dt));
            if state.satellites.iter().all(|s| s.motion == Motion::Demo) {
                break;
            }
        }
        events
    }

    #[test]
    fn starts_with_the_demo_constellation() {
        let state = small_state();
        assert_eq!(state.views.len(), 3);
        assert_eq!(state.frames().len(), 3);
        assert_eq!(state.satellite_header(), "Active Satellites (5 Total)");
        assert_eq!(state.satellite_lines()[1], "ISS (Default)");
    }

    #[test]
    fn crashed_satellite_is_removed_exactly_once() {
        let mut state = small_state();
        state.add_custom("crash", Some("Icarus")).unwrap();
        assert_eq!(state.satellites.len(), 6);

        let events = run_until_empty_of_custom(&mut state, 0.1);
        assert_eq!(events, vec![OrbitEvent::Crashed("Icarus".to_string())]);
        assert_eq!(state.satellites.len(), 5);

        // More stepping never brings it back
        for _ in 0..100 {
            assert!(state.tick(0.1).is_empty());
        }
        assert!(state.satellites.iter().all(|s| s.name != "Icarus"));
        let crashes = state
            .events
            .entries()
            .filter(|e| e.message == "Icarus crashed on Earth")
            .count();
        assert_eq!(crashes, 1);
    }

    #[test]
    fn escaped_satellite_is_removed_exactly_once() {
        let mut state = small_state();
        state.add_custom("escape", Some("Voyager")).unwrap();

        let events = run_until_empty_of_custom(&mut state, 0.5);
        assert_eq!(events, vec![OrbitEvent::Escaped("Voyager".to_string())]);
        assert_eq!(state.satellites.len(), 5);
    }

    #[test]
    fn frames_keep_coming_while_a_satellite_escapes() {
        let mut state = small_state();
        state.add_custom("escape", Some("Voyager")).unwrap();
        for _ in 0..300 {
            state.tick(1.0 / 30.0);
            assert_eq!(state.frames().len(), 3);
        }
    }

    #[test]
    fn removal_does_not_skip_neighbours() {
        let mut state = small_state();
        state.add_custom("crash", Some("A")).unwrap();
        state.add_default();
        state.add_custom("crash", Some("B")).unwrap();

        let before: Vec<f64> = state.satellites.iter().map(|s| s.angle).collect();
        let mut sat_a = state.satellites[5].clone();
        sat_a.r = 1.0 + 1e-9;
        sat_a.vr = -1.0;
        state.satellites[5] = sat_a;

        let events = state.propagate(0.01);
        assert_eq!(events, vec![OrbitEvent::Crashed("A".to_string())]);
        assert_eq!(state.satellites.len(), 7);

        // Every survivor advanced exactly once
        let survivors: Vec<usize> = (0..8).filter(|&i| i != 5).collect();
        for (sat, &orig) in state.satellites.iter().zip(&survivors) {
            assert!(sat.angle > before[orig]);
            assert!(sat.angle - before[orig] < 0.05);
        }
    }

    #[test]
    fn invalid_orbit_type_does_not_mutate() {
        let mut state = small_state();
        let log_len = state.events.len();
        let err = state.add_custom("sideways", Some("Nope")).err().unwrap();
        assert!(matches!(err, SimError::InvalidUserInput(_)));
        assert_eq!(state.satellites.len(), 5);
        assert_eq!(state.events.len(), log_len);
    }

    #[test]
    fn add_and_delete_log_events() {
        let mut state = small_state();
        let name = state.add_default().name.clone();
        assert_eq!(name, "Imaginary Sat 6");
        state.add_custom("stable", None).unwrap();
        assert_eq!(state.satellite_lines()[6], "Custom Sat 7 (Custom)");

        assert!(state.delete(42).is_none());
        let deleted = state.delete(0).unwrap();
        assert_eq!(deleted.name, "Starlink-1");

        let messages: Vec<&str> = state.events.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(
            messages,
            [
                "Added default imaginary satellite: Imaginary Sat 6",
                "Added Custom Sat 7 with Stable circular orbit.",
                "Deleted satellite: Starlink-1",
            ]
        );
    }

    #[test]
    fn event_log_is_bounded() {
        let mut log = EventLog::new(2);
        log.push("one");
        log.push("two");
        log.push("three");
        let messages: Vec<&str> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["two", "three"]);
        assert!(log.entries().next().unwrap().to_string().ends_with(": two"));
    }

    #[test]
    fn starting_a_loop_cancels_the_previous_one() {
        let animation = AnimationLoop::default();
        let t0 = Instant::now();
        let mut first = animation.start(t0);
        assert_eq!(first.next_dt(t0 + Duration::from_millis(500)), Some(0.5));

        let mut second = animation.start(t0);
        assert!(!first.is_active());
        assert_eq!(first.next_dt(t0 + Duration::from_secs(1)), None);
        assert!(second.is_active());
        assert_eq!(second.next_dt(t0 + Duration::from_secs(1)), Some(1.0));
    }

    #[test]
    fn interval_timer_fires_once_per_period() {
        let mut timer = IntervalTimer::new(Duration::from_secs(1));
        let t0 = Instant::now();
        assert!(timer.due(t0));
        assert!(!timer.due(t0 + Duration::from_millis(999)));
        assert!(timer.due(t0 + Duration::from_millis(1000)));
    }

    #[test]
    fn intervals_come_from_the_registry() {
        let state = small_state();
        let intervals = state.free_intervals(Utc::now());
        assert_eq!(intervals.len(), 3);
        for interval in intervals {
            assert!(interval.end > interval.start);
        }
    }
}
